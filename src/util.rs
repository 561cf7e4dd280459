use std::path::Path;

use image::RgbaImage;
use nalgebra::Vector4;

use crate::buffer::FrameBuffer;

/// 선형 값 하나를 sRGB 감마로 인코딩
pub fn linear_to_srgb(value: f32) -> f32 {
    let value = value.clamp(0.0, 1.0);
    if value <= 0.003_130_8 {
        value * 12.92
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    }
}

/// 선형 RGBA를 8비트 sRGB RGBA로. 알파는 감마 없이 그대로
pub fn vec4_to_rgba(color: &Vector4<f32>) -> [u8; 4] {
    let encode = |value: f32| (value * 255.0).round() as u8;
    [
        encode(linear_to_srgb(color.x)),
        encode(linear_to_srgb(color.y)),
        encode(linear_to_srgb(color.z)),
        encode(color.w.clamp(0.0, 1.0)),
    ]
}

pub fn to_rgba_image(frame: &FrameBuffer) -> RgbaImage {
    let resolution = frame.resolution();
    let bytes = frame.pixels().iter().flat_map(vec4_to_rgba).collect();

    // 길이는 항상 width * height * 4라 실패하지 않음
    RgbaImage::from_raw(resolution.width, resolution.height, bytes)
        .unwrap_or_else(|| RgbaImage::new(resolution.width, resolution.height))
}

/// 화면에 보이는 것과 같은 sRGB로 PNG 저장
pub fn save_png<P: AsRef<Path>>(frame: &FrameBuffer, path: P) -> Result<(), image::ImageError> {
    to_rgba_image(frame).save_with_format(path, image::ImageFormat::Png)
}
