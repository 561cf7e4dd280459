//! 렌더링 백엔드 추상화
//!
//! 프레임 드라이버는 셰이더 프로그램 두 개(경로 추적, 누적)와 렌더 타겟 네 개만 알고,
//! 그걸 실제로 GPU에서 돌릴지 CPU에서 돌릴지는 이 트레이트 구현이 정함.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use crate::buffer::Resolution;
use crate::error::{FrameError, SetupError};
use crate::tracer::scene::GpuSphere;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Program {
    /// 카메라 광선을 쏘아 노이즈 프레임 하나를 만듦
    PathTrace,
    /// 노이즈 프레임을 history와 평균 냄
    Accumulate,
}

impl Program {
    pub const ALL: [Program; 2] = [Program::PathTrace, Program::Accumulate];
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Program::PathTrace => write!(f, "path trace"),
            Program::Accumulate => write!(f, "accumulate"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// 이번 프레임의 경로 추적 결과
    Noisy,
    /// 지난 프레임까지의 평균
    History,
    /// 이번 프레임까지의 평균. 프레임 끝에 `History`로 복사됨
    HistoryNext,
    /// 화면
    Display,
}

impl Target {
    pub const ALL: [Target; 4] = [Target::Noisy, Target::History, Target::HistoryNext, Target::Display];

    pub(crate) fn index(self) -> usize {
        match self {
            Target::Noisy => 0,
            Target::History => 1,
            Target::HistoryNext => 2,
            Target::Display => 3,
        }
    }
}

/// 프로그램이 읽거나 쓰는 자리.
///
/// `PathTrace`는 출력 0에 쓰고, `Accumulate`는 입력 0(노이즈)과 입력 1(history)을 읽어
/// 출력 0(화면)과 출력 1(새 history)에 씀.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    Input(u32),
    Output(u32),
}

/// 셰이더 유니폼 하나. 이름은 셰이더 쪽 필드 이름과 같음
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Parameter<'a> {
    Resolution([f32; 2]),
    CameraPosition([f32; 3]),
    CamLocalToWorld([[f32; 4]; 4]),
    ViewParams([f32; 3]),
    DivergenceStrength(f32),
    DefocusStrength(f32),
    NumSpheres(u32),
    RaysPerPixel(u32),
    MaxBounces(u32),
    FrameIndex(u32),
    GroundColour([f32; 4]),
    SkyColourHorizon([f32; 4]),
    SkyColourZenith([f32; 4]),
    SunFocus(f32),
    SunIntensity(f32),
    SunDirection([f32; 3]),
    Spheres(&'a [GpuSphere]),
}

impl Parameter<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Parameter::Resolution(_) => "resolution",
            Parameter::CameraPosition(_) => "camera_position",
            Parameter::CamLocalToWorld(_) => "cam_local_to_world",
            Parameter::ViewParams(_) => "view_params",
            Parameter::DivergenceStrength(_) => "divergence_strength",
            Parameter::DefocusStrength(_) => "defocus_strength",
            Parameter::NumSpheres(_) => "num_spheres",
            Parameter::RaysPerPixel(_) => "rays_per_pixel",
            Parameter::MaxBounces(_) => "max_bounces",
            Parameter::FrameIndex(_) => "frame_index",
            Parameter::GroundColour(_) => "ground_colour",
            Parameter::SkyColourHorizon(_) => "sky_colour_horizon",
            Parameter::SkyColourZenith(_) => "sky_colour_zenith",
            Parameter::SunFocus(_) => "sun_focus",
            Parameter::SunIntensity(_) => "sun_intensity",
            Parameter::SunDirection(_) => "sun_direction",
            Parameter::Spheres(_) => "spheres",
        }
    }
}

/// 렌더링 백엔드가 구현해야 하는 연산들.
///
/// 한 프레임은 `begin_frame`으로 시작해서 `present`로 끝남. 그 사이의 `draw`와
/// `copy_texture`는 호출 순서대로 실행된다고 봐야 함.
pub trait RenderBackend {
    /// 프로그램을 빌드함. 실패하면 시작하지 않음
    fn compile_program(&mut self, program: Program) -> Result<(), SetupError>;

    /// 렌더 타겟을 `resolution` 크기로 맞춤. 새로 할당했으면 true
    fn prepare_targets(&mut self, resolution: Resolution) -> Result<bool, FrameError>;

    fn begin_frame(&mut self) -> Result<(), FrameError>;

    fn bind_target(&mut self, program: Program, slot: Slot, target: Target) -> Result<(), FrameError>;

    fn set_parameter(&mut self, program: Program, parameter: Parameter) -> Result<(), FrameError>;

    fn draw(&mut self, program: Program) -> Result<(), FrameError>;

    fn copy_texture(&mut self, src: Target, dst: Target) -> Result<(), FrameError>;

    fn present(&mut self) -> Result<(), FrameError>;
}

/// 프로그램별로 어느 자리에 어느 타겟이 묶였는지
#[derive(Debug, Default)]
pub struct Bindings {
    slots: HashMap<(Program, Slot), Target>,
}

impl Bindings {
    pub fn bind(&mut self, program: Program, slot: Slot, target: Target) {
        self.slots.insert((program, slot), target);
    }

    pub fn get(&self, program: Program, slot: Slot) -> Option<Target> {
        self.slots.get(&(program, slot)).copied()
    }

    pub fn require(&self, program: Program, slot: Slot) -> Result<Target, FrameError> {
        self.get(program, slot)
            .ok_or(FrameError::Unbound { program, slot })
    }
}
