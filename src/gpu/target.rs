use wgpu::{
    Device, ErrorFilter, Extent3d, ImageCopyTexture, Origin3d, Texture, TextureAspect, TextureDescriptor,
    TextureDimension, TextureFormat, TextureUsages, TextureView, TextureViewDescriptor,
};

use crate::backend::Target;
use crate::buffer::Resolution;
use crate::error::{FrameError, SetupError};

/// 선형 색공간 HDR 값을 그대로 담아야 해서 32비트 실수 포맷 사용
pub const TARGET_FORMAT: TextureFormat = TextureFormat::Rgba32Float;

/// 타겟 하나를 할당하지 못함. 시작 중이면 `SetupError`, 리사이즈 중이면 `FrameError`가 됨
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationError {
    pub target: Target,
    pub message: String,
}

impl From<AllocationError> for SetupError {
    fn from(error: AllocationError) -> Self {
        SetupError::TargetAllocation {
            target: error.target,
            message: error.message,
        }
    }
}

impl From<AllocationError> for FrameError {
    fn from(error: AllocationError) -> Self {
        FrameError::TargetAllocation {
            target: error.target,
            message: error.message,
        }
    }
}

/// 화면 밖 렌더 타겟 하나
pub struct RenderTarget {
    pub gpu_texture: Texture,
    pub view: TextureView,
}

impl RenderTarget {
    pub fn new(device: &Device, resolution: Resolution, label: &str) -> Self {
        let gpu_texture = device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                width: resolution.width.max(1),
                height: resolution.height.max(1),
                depth_or_array_layers: 1, // 단순한 2차원 이미지
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TARGET_FORMAT,
            // 그리기 대상이면서 다음 패스에서 읽히고, history끼리는 복사도 함
            usage: TextureUsages::RENDER_ATTACHMENT
                | TextureUsages::TEXTURE_BINDING
                | TextureUsages::COPY_SRC
                | TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = gpu_texture.create_view(&TextureViewDescriptor {
            label: Some(&format!("{} view", label)),
            ..Default::default() // label 뺴고 나머진 기본값 그대로
        });

        Self { gpu_texture, view }
    }

    /// 메모리 부족은 패닉 대신 에러 스코프로 받음
    fn allocate(device: &Device, resolution: Resolution, target: Target, label: &str) -> Result<Self, AllocationError> {
        device.push_error_scope(ErrorFilter::OutOfMemory);
        let render_target = Self::new(device, resolution, label);

        match pollster::block_on(device.pop_error_scope()) {
            Some(error) => Err(AllocationError {
                target,
                message: error.to_string(),
            }),
            None => Ok(render_target),
        }
    }

    pub fn copy_source(&self) -> ImageCopyTexture {
        ImageCopyTexture {
            texture: &self.gpu_texture,
            mip_level: 0,
            origin: Origin3d::ZERO,
            aspect: TextureAspect::All,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.gpu_texture.width(), self.gpu_texture.height())
    }
}

/// 노이즈 프레임과 history 두 장
pub struct RenderTargets {
    pub noisy: RenderTarget,
    pub history: RenderTarget,
    pub history_next: RenderTarget,
}

impl RenderTargets {
    pub fn allocate(device: &Device, resolution: Resolution) -> Result<Self, AllocationError> {
        Ok(Self {
            noisy: RenderTarget::allocate(device, resolution, Target::Noisy, "Noisy Frame")?,
            history: RenderTarget::allocate(device, resolution, Target::History, "History")?,
            history_next: RenderTarget::allocate(device, resolution, Target::HistoryNext, "History Next")?,
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.noisy.resolution()
    }

    pub fn size(&self) -> Extent3d {
        self.noisy.gpu_texture.size()
    }
}
