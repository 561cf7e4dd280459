use bytemuck::{Pod, Zeroable};

use crate::backend::Parameter;

/// `trace.wgsl`의 `@group(0) @binding(0)` 유니폼 블록과 바이트 단위로 같음.
///
/// WGSL의 정렬 규칙상 vec3 뒤에는 4바이트 스칼라를 하나 붙여야 16바이트에 맞음.
/// 그래서 필드 순서를 셰이더와 똑같이 두고 빈칸을 u32/f32로 채움.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct TraceUniforms {
    pub cam_local_to_world: [[f32; 4]; 4],
    pub camera_position: [f32; 3],
    pub num_spheres: u32,
    pub view_params: [f32; 3],
    pub frame_index: u32,
    pub resolution: [f32; 2],
    pub rays_per_pixel: u32,
    pub max_bounces: u32,
    pub ground_colour: [f32; 4],
    pub sky_colour_horizon: [f32; 4],
    pub sky_colour_zenith: [f32; 4],
    pub sun_direction: [f32; 3],
    pub sun_focus: f32,
    pub sun_intensity: f32,
    pub divergence_strength: f32,
    pub defocus_strength: f32,
    pub _padding: f32,
}

impl Default for TraceUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl TraceUniforms {
    /// 이 블록에 속한 값이면 적용하고 true
    pub fn apply(&mut self, parameter: &Parameter) -> bool {
        match *parameter {
            Parameter::Resolution(value) => self.resolution = value,
            Parameter::CameraPosition(value) => self.camera_position = value,
            Parameter::CamLocalToWorld(value) => self.cam_local_to_world = value,
            Parameter::ViewParams(value) => self.view_params = value,
            Parameter::DivergenceStrength(value) => self.divergence_strength = value,
            Parameter::DefocusStrength(value) => self.defocus_strength = value,
            Parameter::NumSpheres(value) => self.num_spheres = value,
            Parameter::RaysPerPixel(value) => self.rays_per_pixel = value,
            Parameter::MaxBounces(value) => self.max_bounces = value,
            Parameter::FrameIndex(value) => self.frame_index = value,
            Parameter::GroundColour(value) => self.ground_colour = value,
            Parameter::SkyColourHorizon(value) => self.sky_colour_horizon = value,
            Parameter::SkyColourZenith(value) => self.sky_colour_zenith = value,
            Parameter::SunFocus(value) => self.sun_focus = value,
            Parameter::SunIntensity(value) => self.sun_intensity = value,
            Parameter::SunDirection(value) => self.sun_direction = value,
            Parameter::Spheres(_) => return false,
        }

        true
    }
}

/// `accumulate.wgsl`의 유니폼 블록. 유니폼 버퍼는 최소 16바이트라 나머지는 패딩
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct AccumulateUniforms {
    pub frame_index: u32,
    pub _pad0: u32,
    pub _pad1: u32,
    pub _pad2: u32,
}

impl AccumulateUniforms {
    pub fn apply(&mut self, parameter: &Parameter) -> bool {
        match *parameter {
            Parameter::FrameIndex(value) => {
                self.frame_index = value;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::mem::{offset_of, size_of};

    use super::*;

    #[test]
    fn trace_block_matches_the_shader_layout() {
        assert_eq!(size_of::<TraceUniforms>(), 192);
        assert_eq!(offset_of!(TraceUniforms, camera_position), 64);
        assert_eq!(offset_of!(TraceUniforms, num_spheres), 76);
        assert_eq!(offset_of!(TraceUniforms, view_params), 80);
        assert_eq!(offset_of!(TraceUniforms, frame_index), 92);
        assert_eq!(offset_of!(TraceUniforms, resolution), 96);
        assert_eq!(offset_of!(TraceUniforms, rays_per_pixel), 104);
        assert_eq!(offset_of!(TraceUniforms, ground_colour), 112);
        assert_eq!(offset_of!(TraceUniforms, sky_colour_horizon), 128);
        assert_eq!(offset_of!(TraceUniforms, sky_colour_zenith), 144);
        assert_eq!(offset_of!(TraceUniforms, sun_direction), 160);
        assert_eq!(offset_of!(TraceUniforms, sun_focus), 172);
        assert_eq!(offset_of!(TraceUniforms, defocus_strength), 184);
    }

    #[test]
    fn accumulate_block_is_sixteen_bytes() {
        assert_eq!(size_of::<AccumulateUniforms>(), 16);
    }

    #[test]
    fn parameters_land_in_their_block() {
        let mut trace = TraceUniforms::default();
        let mut accumulate = AccumulateUniforms::default();

        assert!(trace.apply(&Parameter::MaxBounces(9)));
        assert!(trace.apply(&Parameter::FrameIndex(4)));
        assert!(!trace.apply(&Parameter::Spheres(&[])));
        assert_eq!(trace.max_bounces, 9);
        assert_eq!(trace.frame_index, 4);

        assert!(accumulate.apply(&Parameter::FrameIndex(4)));
        assert!(!accumulate.apply(&Parameter::SunFocus(2.0)));
        assert_eq!(accumulate.frame_index, 4);
    }
}
