use std::time::Instant;

use log::{debug, info, trace};
use nalgebra::Matrix4;

use crate::backend::{Parameter, Program, RenderBackend, Slot, Target};
use crate::buffer::Resolution;
use crate::camera::{view_transform_changed, CameraPose, CameraRig, InputState};
use crate::error::{FrameError, SetupError};
use crate::schedule::Scheduler;
use crate::tracer::camera::view_params;
use crate::tracer::scene::Scene;
use crate::tracer::TraceParams;

/// 리셋 이후 누적한 프레임 수와 지금 렌더 타겟 크기
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameState {
    pub frame_index: u32,
    pub resolution: Resolution,
}

impl FrameState {
    pub fn reset(&mut self) {
        self.frame_index = 0;
    }

    pub fn advance(&mut self) {
        self.frame_index = self.frame_index.saturating_add(1);
    }
}

/// 한 번의 반복 안에서 지금 어느 단계인지
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameStage {
    #[default]
    PollInput,
    UpdateCamera,
    DetectReset,
    Render,
    Accumulate,
    Present,
    Advance,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetReason {
    /// 첫 프레임
    Initial,
    /// 카메라가 움직임
    ViewChanged,
    /// 창 크기가 바뀌어 렌더 타겟을 새로 잡음
    Resized,
}

/// 렌더러가 프레임 사이에 들고 있는 상태 전부
pub struct RendererState {
    pub camera: CameraRig,
    pub frame: FrameState,
    pub previous_view: Option<Matrix4<f32>>,
    /// 커서가 창에 잡혀 있을 때만 마우스로 시점을 돌림
    pub cursor_locked: bool,
    pub stage: FrameStage,
}

impl RendererState {
    pub fn new(camera: CameraRig) -> Self {
        Self {
            camera,
            frame: FrameState::default(),
            previous_view: None,
            cursor_locked: false,
            stage: FrameStage::default(),
        }
    }

    fn enter(&mut self, stage: FrameStage) {
        trace!("frame {}: {:?}", self.frame.frame_index, stage);
        self.stage = stage;
    }

    /// 새 view 행렬을 기억하고, 누적을 버려야 하면 그 이유를 돌려줌
    fn detect_reset(&mut self, view: Matrix4<f32>, resized: bool) -> Option<ResetReason> {
        let reason = match &self.previous_view {
            None => Some(ResetReason::Initial),
            Some(previous) if view_transform_changed(previous, &view) => Some(ResetReason::ViewChanged),
            _ if resized => Some(ResetReason::Resized),
            _ => None,
        };
        self.previous_view = Some(view);

        if let Some(reason) = reason {
            debug!("accumulation reset ({reason:?}) after {} frames", self.frame.frame_index);
            self.frame.reset();
        }
        reason
    }
}

/// 한 번의 `step` 결과
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    /// 이번 프레임을 섞을 때 쓴 인덱스. 건너뛴 프레임이면 의미 없음
    pub frame_index: u32,
    pub resolution: Resolution,
    pub reset: Option<ResetReason>,
    pub rendered: bool,
}

impl FrameReport {
    /// 지금 화면에 있는 평균에 들어간 프레임 수
    pub fn frames_since_reset(&self) -> u32 {
        if self.rendered {
            self.frame_index.saturating_add(1)
        } else {
            self.frame_index
        }
    }
}

/// 입력 → 카메라 → 리셋 판단 → 경로 추적 → 누적 → 출력 → 다음 프레임 순서를 지키는 루프 본체
pub struct FrameDriver<B: RenderBackend> {
    backend: B,
    params: TraceParams,
    state: RendererState,
}

impl<B: RenderBackend> FrameDriver<B> {
    pub fn new(mut backend: B, scene: &Scene, params: TraceParams, camera: CameraRig) -> Result<Self, SetupError> {
        for program in Program::ALL {
            backend.compile_program(program)?;
        }

        // 장면과 샘플링/하늘 설정은 실행 중에 바뀌지 않으니 한 번만 올림
        let spheres = scene.gpu_spheres();
        let sampling = &params.sampling;
        let sky = &params.sky;
        let once = [
            Parameter::Spheres(&spheres),
            Parameter::NumSpheres(spheres.len() as u32),
            Parameter::RaysPerPixel(sampling.rays_per_pixel),
            Parameter::MaxBounces(sampling.max_bounces),
            Parameter::DivergenceStrength(sampling.divergence_strength),
            Parameter::DefocusStrength(sampling.defocus_strength),
            Parameter::GroundColour(sky.ground_colour.into()),
            Parameter::SkyColourHorizon(sky.sky_colour_horizon.into()),
            Parameter::SkyColourZenith(sky.sky_colour_zenith.into()),
            Parameter::SunFocus(sky.sun_focus),
            Parameter::SunIntensity(sky.sun_intensity),
            // 정규화는 셰이더에서 함
            Parameter::SunDirection(sky.sun_direction.into()),
        ];
        for parameter in once {
            backend.set_parameter(Program::PathTrace, parameter)?;
        }
        info!("uploaded scene with {} spheres", spheres.len());

        Ok(Self {
            backend,
            params,
            state: RendererState::new(camera),
        })
    }

    pub fn state(&self) -> &RendererState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut RendererState {
        &mut self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn current_pose(&self) -> CameraPose {
        self.state.camera.current_pose()
    }

    /// 한 프레임을 처음부터 끝까지 진행함.
    ///
    /// 창이 최소화되어 `resolution`이 0이면 입력과 카메라만 갱신하고 그리지 않음.
    pub fn step(&mut self, input: &mut InputState, time_step: f32, resolution: Resolution) -> Result<FrameReport, FrameError> {
        self.state.enter(FrameStage::PollInput);
        let snapshot = input.take();

        self.state.enter(FrameStage::UpdateCamera);
        if self.state.cursor_locked {
            self.state.camera.apply_look(snapshot.look.x, snapshot.look.y);
        }
        self.state.camera.apply_movement(&snapshot.movement, time_step);
        let pose = self.state.camera.current_pose();

        if resolution.is_empty() {
            return Ok(FrameReport {
                frame_index: self.state.frame.frame_index,
                resolution,
                reset: None,
                rendered: false,
            });
        }

        self.state.enter(FrameStage::DetectReset);
        let resized = self.backend.prepare_targets(resolution)?;
        let reset = self.state.detect_reset(pose.view_transform(), resized);
        self.state.frame.resolution = resolution;
        let frame_index = self.state.frame.frame_index;

        self.state.enter(FrameStage::Render);
        self.backend.begin_frame()?;
        self.render(&pose, frame_index, resolution)?;

        self.state.enter(FrameStage::Accumulate);
        self.accumulate(frame_index)?;

        self.state.enter(FrameStage::Present);
        // 이번 결과가 다음 프레임의 history가 됨
        self.backend.copy_texture(Target::HistoryNext, Target::History)?;
        self.backend.present()?;

        self.state.enter(FrameStage::Advance);
        self.state.frame.advance();

        Ok(FrameReport {
            frame_index,
            resolution,
            reset,
            rendered: true,
        })
    }

    fn render(&mut self, pose: &CameraPose, frame_index: u32, resolution: Resolution) -> Result<(), FrameError> {
        let program = Program::PathTrace;
        let parameters = [
            Parameter::Resolution(resolution.as_vec2()),
            Parameter::CameraPosition(pose.position.coords.into()),
            Parameter::CamLocalToWorld(pose.local_to_world().into()),
            Parameter::ViewParams(view_params(&self.params.view, resolution).into()),
            Parameter::FrameIndex(frame_index),
        ];
        for parameter in parameters {
            self.backend.set_parameter(program, parameter)?;
        }

        self.backend.bind_target(program, Slot::Output(0), Target::Noisy)?;
        self.backend.draw(program)
    }

    fn accumulate(&mut self, frame_index: u32) -> Result<(), FrameError> {
        let program = Program::Accumulate;
        self.backend.set_parameter(program, Parameter::FrameIndex(frame_index))?;

        self.backend.bind_target(program, Slot::Input(0), Target::Noisy)?;
        self.backend.bind_target(program, Slot::Input(1), Target::History)?;
        self.backend.bind_target(program, Slot::Output(0), Target::Display)?;
        self.backend.bind_target(program, Slot::Output(1), Target::HistoryNext)?;
        self.backend.draw(program)
    }

    /// 입력 없이 `count` 프레임을 그림. 스냅샷과 테스트용
    pub fn run_frames<S: Scheduler>(&mut self, scheduler: &mut S, count: u32, resolution: Resolution) -> Result<FrameReport, FrameError> {
        let mut input = InputState::default();
        let mut last = Instant::now();
        let mut report = FrameReport {
            frame_index: self.state.frame.frame_index,
            resolution,
            reset: None,
            rendered: false,
        };

        for _ in 0..count {
            let deadline = scheduler.next_frame_deadline(Instant::now());
            scheduler.sleep_until(deadline);

            let now = Instant::now();
            let time_step = (now - last).as_secs_f32();
            last = now;

            report = self.step(&mut input, time_step, resolution)?;
        }

        Ok(report)
    }
}
