use nalgebra::Vector4;
use winit::dpi::PhysicalSize;

/// 렌더 타겟과 화면의 픽셀 크기
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    // 창을 최소화하면 0x0이 들어옴
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }

    pub fn as_vec2(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }
}

impl From<PhysicalSize<u32>> for Resolution {
    fn from(size: PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

/// 선형 색공간 RGBA 픽셀들을 행 우선(row-major)으로 저장하는 CPU 쪽 이미지.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameBuffer {
    resolution: Resolution,
    pixels: Vec<Vector4<f32>>,
}

/// Path Tracer가 한 프레임에 만들어내는 노이즈 낀 이미지
pub type NoisyFrame = FrameBuffer;
/// 지금까지 누적된 평균 이미지. 다음 프레임 블렌딩의 입력으로 다시 쓰임
pub type HistoryBuffer = FrameBuffer;

impl FrameBuffer {
    pub fn new(resolution: Resolution) -> Self {
        Self::filled(resolution, Vector4::zeros())
    }

    pub fn filled(resolution: Resolution, value: Vector4<f32>) -> Self {
        Self {
            resolution,
            pixels: vec![value; resolution.pixel_count()],
        }
    }

    pub fn from_pixels(resolution: Resolution, pixels: Vec<Vector4<f32>>) -> Self {
        assert_eq!(
            pixels.len(),
            resolution.pixel_count(),
            "pixel count does not match resolution"
        );
        Self { resolution, pixels }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn pixels(&self) -> &[Vector4<f32>] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Vector4<f32>] {
        &mut self.pixels
    }

    /// 크기가 바뀌면 새로 할당하고 내용을 지움. 바뀌었으면 true.
    pub fn resize(&mut self, resolution: Resolution) -> bool {
        if self.resolution == resolution {
            return false;
        }

        self.resolution = resolution;
        self.pixels = vec![Vector4::zeros(); resolution.pixel_count()];
        true
    }

    pub fn copy_from(&mut self, other: &FrameBuffer) {
        if self.resolution != other.resolution {
            self.resolution = other.resolution;
            self.pixels = other.pixels.clone();
        } else {
            self.pixels.copy_from_slice(&other.pixels);
        }
    }
}
