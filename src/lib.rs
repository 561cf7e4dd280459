use std::time::Instant;

use log::{error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, Event, KeyboardInput, MouseButton, VirtualKeyCode, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{CursorGrabMode, Window, WindowBuilder};

use crate::app::Application;
use crate::backend::Target;
use crate::buffer::Resolution;
use crate::camera::{CameraRig, InputState};
use crate::config::{HeadlessSettings, Settings};
use crate::driver::FrameDriver;
use crate::error::{Error, SetupError};
use crate::gpu::WgpuBackend;
use crate::schedule::{FixedRate, Scheduler, Unpaced};
use crate::software::SoftwareBackend;
use crate::tracer::scene::Scene;

pub mod accumulate;
pub mod app;
pub mod backend;
pub mod buffer;
pub mod camera;
pub mod config;
pub mod driver;
pub mod error;
pub mod gpu;
pub mod schedule;
pub mod software;
pub mod tracer;
pub mod uniforms;
pub mod util;

pub fn run() -> Result<(), Error> {
    // 로거 초기화. RUST_LOG로 레벨 조절
    env_logger::init();

    let settings = Settings::load().map_err(SetupError::from)?;
    let scene = match &settings.scene {
        Some(path) => Scene::from_file(path),
        None => Ok(Scene::load()),
    }
    .map_err(SetupError::from)?;
    info!("scene has {} spheres", scene.len());

    let rig = CameraRig::from_settings(&settings.camera);

    match &settings.headless {
        Some(headless) => run_headless(&settings, headless, &scene, rig),
        None => run_windowed(settings, scene, rig),
    }
}

/// 창 없이 CPU로 정해진 프레임 수만큼 누적하고 결과를 PNG로 저장
fn run_headless(settings: &Settings, headless: &HeadlessSettings, scene: &Scene, rig: CameraRig) -> Result<(), Error> {
    // 0프레임이나 0픽셀이면 저장할 이미지가 없음
    settings.validate().map_err(SetupError::from)?;

    let resolution = Resolution::new(settings.window.width, settings.window.height);
    let mut driver = FrameDriver::new(SoftwareBackend::new(), scene, settings.trace.clone(), rig)?;

    let started = Instant::now();
    let report = driver.run_frames(&mut Unpaced, headless.frames, resolution)?;
    info!(
        "accumulated {} frames at {}x{} in {:.2?}",
        report.frames_since_reset(),
        resolution.width,
        resolution.height,
        started.elapsed()
    );

    util::save_png(driver.backend().target(Target::Display), &headless.output)?;
    info!("saved {}", headless.output.display());
    Ok(())
}

fn run_windowed(settings: Settings, scene: Scene, rig: CameraRig) -> Result<(), Error> {
    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title(settings.window.title.as_str())
        .with_inner_size(PhysicalSize::new(settings.window.width, settings.window.height))
        .build(&event_loop)
        .map_err(SetupError::from)?;

    let app = pollster::block_on(Application::new(window))?;
    let backend = WgpuBackend::new(app)?;
    let mut driver = FrameDriver::new(backend, &scene, settings.trace, rig)?;

    let mut scheduler = FixedRate::new(settings.target_fps);
    let mut input = InputState::default();
    let mut last_frame = Instant::now();
    let mut next_frame = last_frame;

    event_loop.run(move |event, _, control_flow| match event {
        Event::WindowEvent { ref event, window_id } if window_id == driver.backend().app().window.id() => {
            // 카메라 이동 키는 InputState가 먼저 가져감
            if input.input(event) {
                return;
            }

            match event {
                WindowEvent::CloseRequested => *control_flow = ControlFlow::ExitWithCode(0),

                // 클릭하면 커서를 가두고 시점 조작 시작
                WindowEvent::MouseInput {
                    state: ElementState::Pressed,
                    button: MouseButton::Left,
                    ..
                } => {
                    let locked = grab_cursor(&driver.backend().app().window);
                    driver.state_mut().cursor_locked = locked;
                }

                // ESC로 커서를 풀어줌
                WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Pressed,
                            virtual_keycode: Some(VirtualKeyCode::Escape),
                            ..
                        },
                    ..
                } => {
                    release_cursor(&driver.backend().app().window);
                    driver.state_mut().cursor_locked = false;
                }

                // 크기 변경은 따로 처리하지 않음. 다음 프레임에서 해상도를 다시 읽음
                _ => {}
            }
        }

        Event::DeviceEvent {
            event: DeviceEvent::MouseMotion { delta },
            ..
        } => input.accumulate_pointer(delta.0, delta.1),

        Event::MainEventsCleared => {
            let now = Instant::now();
            if now >= next_frame {
                let time_step = now.duration_since(last_frame).as_secs_f32();
                last_frame = now;

                let resolution = driver.backend().app().resolution();
                match driver.step(&mut input, time_step, resolution) {
                    Ok(_) => {}
                    Err(frame_error) if frame_error.is_recoverable() => warn!("skipping frame: {frame_error}"),
                    Err(frame_error) => {
                        error!("{frame_error}");
                        *control_flow = ControlFlow::ExitWithCode(1);
                        return;
                    }
                }

                next_frame = scheduler.next_frame_deadline(now);
            }

            *control_flow = ControlFlow::WaitUntil(next_frame);
        }

        _ => {}
    })
}

/// 커서를 창 안에 가둠. 플랫폼마다 되는 모드가 달라서 차례로 시도
fn grab_cursor(window: &Window) -> bool {
    let grabbed = window
        .set_cursor_grab(CursorGrabMode::Confined)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked));

    match grabbed {
        Ok(()) => {
            window.set_cursor_visible(false);
            true
        }
        Err(grab_error) => {
            warn!("could not grab cursor: {grab_error}");
            false
        }
    }
}

fn release_cursor(window: &Window) {
    if let Err(grab_error) = window.set_cursor_grab(CursorGrabMode::None) {
        warn!("could not release cursor: {grab_error}");
    }
    window.set_cursor_visible(true);
}
