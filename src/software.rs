use std::collections::HashSet;

use log::{debug, trace};
use nalgebra::{Vector3, Vector4};

use crate::accumulate::blend_into;
use crate::backend::{Bindings, Parameter, Program, RenderBackend, Slot, Target};
use crate::buffer::{FrameBuffer, Resolution};
use crate::error::{FrameError, SetupError};
use crate::tracer::camera::Viewport;
use crate::tracer::scene::{GpuSphere, Scene, Sphere};
use crate::tracer::sky::SkyParams;
use crate::tracer::{PathTracer, SamplingParams, TraceParams};
use crate::uniforms::{AccumulateUniforms, TraceUniforms};

/// CPU에서 도는 백엔드. GPU 백엔드와 같은 유니폼을 받아서 같은 계산을 함.
///
/// 창 없이 스냅샷을 찍을 때와 테스트에서 씀.
pub struct SoftwareBackend {
    compiled: HashSet<Program>,
    trace: TraceUniforms,
    accumulate: AccumulateUniforms,
    spheres: Vec<GpuSphere>,
    targets: [FrameBuffer; 4],
    bindings: Bindings,
    in_frame: bool,
    presented: u64,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareBackend {
    pub fn new() -> Self {
        let empty = Resolution::default();
        Self {
            compiled: HashSet::new(),
            trace: TraceUniforms::default(),
            accumulate: AccumulateUniforms::default(),
            spheres: Vec::new(),
            targets: Target::ALL.map(|_| FrameBuffer::new(empty)),
            bindings: Bindings::default(),
            in_frame: false,
            presented: 0,
        }
    }

    pub fn target(&self, target: Target) -> &FrameBuffer {
        &self.targets[target.index()]
    }

    pub fn presented_frames(&self) -> u64 {
        self.presented
    }

    pub fn trace_uniforms(&self) -> &TraceUniforms {
        &self.trace
    }

    fn ensure_compiled(&self, program: Program) -> Result<(), FrameError> {
        if self.compiled.contains(&program) {
            Ok(())
        } else {
            Err(FrameError::ProgramNotCompiled(program))
        }
    }

    fn scene(&self) -> Result<Scene, FrameError> {
        let count = (self.trace.num_spheres as usize).min(self.spheres.len());
        Scene::new(self.spheres[..count].iter().map(Sphere::from).collect()).map_err(|error| {
            FrameError::InvalidParameter {
                name: "spheres",
                message: error.to_string(),
            }
        })
    }

    fn draw_path_trace(&mut self) -> Result<(), FrameError> {
        let output = self.bindings.require(Program::PathTrace, Slot::Output(0))?;

        let scene = self.scene()?;
        let params = trace_params(&self.trace);
        let viewport = Viewport::from_uniforms(&self.trace);
        let frame = PathTracer::new(&scene, &params).render(&viewport, self.trace.frame_index);

        self.targets[output.index()] = frame;
        Ok(())
    }

    fn draw_accumulate(&mut self) -> Result<(), FrameError> {
        let program = Program::Accumulate;
        let noisy = self.bindings.require(program, Slot::Input(0))?;
        let history = self.bindings.require(program, Slot::Input(1))?;
        let display = self.bindings.require(program, Slot::Output(0))?;
        let history_next = self.bindings.get(program, Slot::Output(1));

        for output in std::iter::once(display).chain(history_next) {
            if output == noisy || output == history {
                return Err(FrameError::TargetAliased(output));
            }
        }

        let mut blended = std::mem::replace(
            &mut self.targets[display.index()],
            FrameBuffer::new(Resolution::default()),
        );
        blend_into(
            &self.targets[noisy.index()],
            &self.targets[history.index()],
            self.accumulate.frame_index,
            &mut blended,
        );
        if let Some(history_next) = history_next {
            self.targets[history_next.index()].copy_from(&blended);
        }
        self.targets[display.index()] = blended;

        Ok(())
    }
}

impl RenderBackend for SoftwareBackend {
    fn compile_program(&mut self, program: Program) -> Result<(), SetupError> {
        debug!("compiling {program} program (software)");
        self.compiled.insert(program);
        Ok(())
    }

    fn prepare_targets(&mut self, resolution: Resolution) -> Result<bool, FrameError> {
        let mut reallocated = false;
        for target in &mut self.targets {
            reallocated |= target.resize(resolution);
        }

        if reallocated {
            debug!("reallocated render targets at {}x{}", resolution.width, resolution.height);
        }
        Ok(reallocated)
    }

    fn begin_frame(&mut self) -> Result<(), FrameError> {
        self.in_frame = true;
        Ok(())
    }

    fn bind_target(&mut self, program: Program, slot: Slot, target: Target) -> Result<(), FrameError> {
        self.ensure_compiled(program)?;
        self.bindings.bind(program, slot, target);
        Ok(())
    }

    fn set_parameter(&mut self, program: Program, parameter: Parameter) -> Result<(), FrameError> {
        self.ensure_compiled(program)?;
        trace!("{program}: {}", parameter.name());

        let applied = match program {
            Program::PathTrace => {
                if let Parameter::Spheres(spheres) = parameter {
                    self.spheres = spheres.to_vec();
                    true
                } else {
                    self.trace.apply(&parameter)
                }
            }
            Program::Accumulate => self.accumulate.apply(&parameter),
        };

        if !applied {
            return Err(FrameError::InvalidParameter {
                name: parameter.name(),
                message: format!("not a parameter of the {program} program"),
            });
        }
        Ok(())
    }

    fn draw(&mut self, program: Program) -> Result<(), FrameError> {
        self.ensure_compiled(program)?;
        if !self.in_frame {
            return Err(FrameError::NoFrameInProgress);
        }

        match program {
            Program::PathTrace => self.draw_path_trace(),
            Program::Accumulate => self.draw_accumulate(),
        }
    }

    fn copy_texture(&mut self, src: Target, dst: Target) -> Result<(), FrameError> {
        if !self.in_frame {
            return Err(FrameError::NoFrameInProgress);
        }
        if src == dst {
            return Ok(());
        }

        let source = std::mem::replace(
            &mut self.targets[src.index()],
            FrameBuffer::new(Resolution::default()),
        );
        self.targets[dst.index()].copy_from(&source);
        self.targets[src.index()] = source;
        Ok(())
    }

    fn present(&mut self) -> Result<(), FrameError> {
        if !self.in_frame {
            return Err(FrameError::NoFrameInProgress);
        }

        self.in_frame = false;
        self.presented += 1;
        Ok(())
    }
}

/// 유니폼 블록에서 추적기 설정을 되살림. 시야 설정은 `view_params`에 이미 녹아 있음
fn trace_params(uniforms: &TraceUniforms) -> TraceParams {
    TraceParams {
        sampling: SamplingParams {
            rays_per_pixel: uniforms.rays_per_pixel,
            max_bounces: uniforms.max_bounces,
            divergence_strength: uniforms.divergence_strength,
            defocus_strength: uniforms.defocus_strength,
        },
        sky: SkyParams {
            ground_colour: Vector4::from(uniforms.ground_colour),
            sky_colour_horizon: Vector4::from(uniforms.sky_colour_horizon),
            sky_colour_zenith: Vector4::from(uniforms.sky_colour_zenith),
            sun_focus: uniforms.sun_focus,
            sun_intensity: uniforms.sun_intensity,
            sun_direction: Vector3::from(uniforms.sun_direction),
        },
        ..TraceParams::default()
    }
}
