//! wgpu로 두 프로그램을 돌리는 백엔드
//!
//! 두 프로그램 모두 화면 전체를 덮는 삼각형 하나를 그리는 프래그먼트 셰이더임.
//! 경로 추적은 `Noisy`에, 누적은 화면과 `HistoryNext`에 동시에 씀.

use std::iter;

use bytemuck::{bytes_of, cast_slice};
use log::{debug, info, warn};
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BindingResource, BindingType, Buffer, BufferBindingType, BufferDescriptor, BufferUsages, Color, ColorTargetState,
    ColorWrites, CommandEncoder, CommandEncoderDescriptor, ErrorFilter, FragmentState, LoadOp, MultisampleState,
    Operations, PipelineLayoutDescriptor, PrimitiveState, RenderPassColorAttachment, RenderPassDescriptor,
    RenderPipeline, RenderPipelineDescriptor, ShaderModuleDescriptor, ShaderSource, ShaderStages, SurfaceTexture,
    TextureFormat, TextureSampleType, TextureView, TextureViewDescriptor, TextureViewDimension, VertexState,
};
use winit::dpi::PhysicalSize;

use crate::app::Application;
use crate::backend::{Bindings, Parameter, Program, RenderBackend, Slot, Target};
use crate::buffer::Resolution;
use crate::error::{FrameError, SetupError};
use crate::gpu::shader::build_program_wgsl;
use crate::gpu::target::{RenderTargets, TARGET_FORMAT};
use crate::tracer::scene::{GpuSphere, MAX_SPHERES};
use crate::uniforms::{AccumulateUniforms, TraceUniforms};

mod shader;
pub mod target;

/// 경로 추적 프로그램의 유니폼 블록 자리
pub const TRACE_UNIFORM_BINDING: u32 = 0;
/// 구 목록 블록 자리
pub const SPHERE_BLOCK_BINDING: u32 = 1;
/// 누적 프로그램의 자리: 유니폼, 노이즈 프레임(`main_tex`), history(`prev_tex`)
pub const ACCUMULATE_UNIFORM_BINDING: u32 = 0;
pub const MAIN_TEX_BINDING: u32 = 1;
pub const PREV_TEX_BINDING: u32 = 2;

struct TraceProgram {
    pipeline: RenderPipeline,
    bind_group: BindGroup,
}

struct AccumulateProgram {
    pipeline: RenderPipeline,
    layout: BindGroupLayout,
}

/// `begin_frame`부터 `present`까지 살아있는 것들
struct FrameInProgress {
    surface_texture: SurfaceTexture,
    surface_view: TextureView,
    encoder: CommandEncoder,
}

pub struct WgpuBackend {
    app: Application,
    trace: Option<TraceProgram>,
    accumulate: Option<AccumulateProgram>,
    targets: RenderTargets,
    trace_uniforms: TraceUniforms,
    accumulate_uniforms: AccumulateUniforms,
    trace_buffer: Buffer,
    sphere_buffer: Buffer,
    accumulate_buffer: Buffer,
    bindings: Bindings,
    frame: Option<FrameInProgress>,
}

impl WgpuBackend {
    pub fn new(app: Application) -> Result<Self, SetupError> {
        let device = app.device();

        let uniform_buffer = |label: &str, size: usize| {
            device.create_buffer(&BufferDescriptor {
                label: Some(label),
                size: size as u64,
                usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let trace_buffer = uniform_buffer("Trace Uniforms", std::mem::size_of::<TraceUniforms>());
        // 구 블록은 항상 최대 크기로 잡고 앞에서부터 채움
        let sphere_buffer = uniform_buffer("Sphere Block", MAX_SPHERES * std::mem::size_of::<GpuSphere>());
        let accumulate_buffer = uniform_buffer("Accumulate Uniforms", std::mem::size_of::<AccumulateUniforms>());

        let targets = RenderTargets::allocate(device, app.resolution())?;

        Ok(Self {
            app,
            trace: None,
            accumulate: None,
            targets,
            trace_uniforms: TraceUniforms::default(),
            accumulate_uniforms: AccumulateUniforms::default(),
            trace_buffer,
            sphere_buffer,
            accumulate_buffer,
            bindings: Bindings::default(),
            frame: None,
        })
    }

    pub fn app(&self) -> &Application {
        &self.app
    }

    fn build_pipeline(
        &self,
        program: Program,
        layout: &BindGroupLayout,
        targets: &[Option<ColorTargetState>],
    ) -> Result<RenderPipeline, SetupError> {
        let device = self.app.device();
        let label = program.to_string();

        // 셰이더 에러는 패닉 대신 에러 스코프로 받아서 어느 프로그램이 문제인지 알려줌
        device.push_error_scope(ErrorFilter::Validation);
        let module = device.create_shader_module(ShaderModuleDescriptor {
            label: Some(&label),
            source: ShaderSource::Wgsl(build_program_wgsl(program).into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(&label),
            bind_group_layouts: &[layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(&label),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &module,
                entry_point: "vs_main",
                buffers: &[], // 정점은 셰이더에서 만듦
            },
            fragment: Some(FragmentState {
                module: &module,
                entry_point: "fs_main",
                targets,
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None, // 깊이 안씀
            multisample: MultisampleState::default(),
            multiview: None,
        });

        match pollster::block_on(device.pop_error_scope()) {
            Some(error) => Err(SetupError::ProgramCompile {
                program,
                message: error.to_string(),
            }),
            None => Ok(pipeline),
        }
    }

    fn compile_trace(&self) -> Result<TraceProgram, SetupError> {
        let device = self.app.device();
        let uniform_entry = |binding| BindGroupLayoutEntry {
            binding,
            visibility: ShaderStages::FRAGMENT,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Trace Bind Group Layout"),
            entries: &[uniform_entry(TRACE_UNIFORM_BINDING), uniform_entry(SPHERE_BLOCK_BINDING)],
        });

        let pipeline = self.build_pipeline(Program::PathTrace, &layout, &[Some(color_target(TARGET_FORMAT))])?;

        // 유니폼 버퍼는 바뀌지 않으니 바인드 그룹도 한 번만 만듦
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Trace Bind Group"),
            layout: &layout,
            entries: &[
                BindGroupEntry {
                    binding: TRACE_UNIFORM_BINDING,
                    resource: self.trace_buffer.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: SPHERE_BLOCK_BINDING,
                    resource: self.sphere_buffer.as_entire_binding(),
                },
            ],
        });

        Ok(TraceProgram { pipeline, bind_group })
    }

    fn compile_accumulate(&self) -> Result<AccumulateProgram, SetupError> {
        let device = self.app.device();
        let texture_entry = |binding| BindGroupLayoutEntry {
            binding,
            visibility: ShaderStages::FRAGMENT,
            ty: BindingType::Texture {
                // 32비트 실수 텍스쳐는 필터링이 안 되니 textureLoad로만 읽음
                sample_type: TextureSampleType::Float { filterable: false },
                view_dimension: TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Accumulate Bind Group Layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: ACCUMULATE_UNIFORM_BINDING,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(MAIN_TEX_BINDING),
                texture_entry(PREV_TEX_BINDING),
            ],
        });

        let pipeline = self.build_pipeline(
            Program::Accumulate,
            &layout,
            &[Some(color_target(self.app.format())), Some(color_target(TARGET_FORMAT))],
        )?;

        Ok(AccumulateProgram { pipeline, layout })
    }

    /// 타겟의 view. 화면은 프레임 중에만 있음
    fn view<'a>(targets: &'a RenderTargets, surface_view: &'a TextureView, target: Target) -> &'a TextureView {
        match target {
            Target::Noisy => &targets.noisy.view,
            Target::History => &targets.history.view,
            Target::HistoryNext => &targets.history_next.view,
            Target::Display => surface_view,
        }
    }

    fn draw_trace(&mut self) -> Result<(), FrameError> {
        let program = self.trace.as_ref().ok_or(FrameError::ProgramNotCompiled(Program::PathTrace))?;
        let output = self.bindings.require(Program::PathTrace, Slot::Output(0))?;
        let FrameInProgress {
            surface_view, encoder, ..
        } = self.frame.as_mut().ok_or(FrameError::NoFrameInProgress)?;

        self.app
            .queue()
            .write_buffer(&self.trace_buffer, 0, bytes_of(&self.trace_uniforms));

        let view = Self::view(&self.targets, surface_view, output);
        let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Trace Pass"),
            color_attachments: &[cleared(view)],
            depth_stencil_attachment: None,
        });
        render_pass.set_pipeline(&program.pipeline);
        render_pass.set_bind_group(0, &program.bind_group, &[]);
        render_pass.draw(0..3, 0..1);

        Ok(())
    }

    fn draw_accumulate(&mut self) -> Result<(), FrameError> {
        let program = self
            .accumulate
            .as_ref()
            .ok_or(FrameError::ProgramNotCompiled(Program::Accumulate))?;
        let accumulate = Program::Accumulate;
        let noisy = self.bindings.require(accumulate, Slot::Input(0))?;
        let history = self.bindings.require(accumulate, Slot::Input(1))?;
        let display = self.bindings.require(accumulate, Slot::Output(0))?;
        let history_next = self.bindings.require(accumulate, Slot::Output(1))?;
        let FrameInProgress {
            surface_view, encoder, ..
        } = self.frame.as_mut().ok_or(FrameError::NoFrameInProgress)?;

        for input in [noisy, history] {
            if input == Target::Display {
                return Err(FrameError::UnsupportedCopy { src: input, dst: display });
            }
            if input == display || input == history_next {
                return Err(FrameError::TargetAliased(input));
            }
        }

        self.app
            .queue()
            .write_buffer(&self.accumulate_buffer, 0, bytes_of(&self.accumulate_uniforms));

        // 묶인 타겟이 프레임마다 바뀔 수 있고 리사이즈 때 view도 새로 생기니 매번 만듦
        let bind_group = self.app.device().create_bind_group(&BindGroupDescriptor {
            label: Some("Accumulate Bind Group"),
            layout: &program.layout,
            entries: &[
                BindGroupEntry {
                    binding: ACCUMULATE_UNIFORM_BINDING,
                    resource: self.accumulate_buffer.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: MAIN_TEX_BINDING,
                    resource: BindingResource::TextureView(Self::view(&self.targets, surface_view, noisy)),
                },
                BindGroupEntry {
                    binding: PREV_TEX_BINDING,
                    resource: BindingResource::TextureView(Self::view(&self.targets, surface_view, history)),
                },
            ],
        });

        let display_view = Self::view(&self.targets, surface_view, display);
        let history_view = Self::view(&self.targets, surface_view, history_next);

        let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Accumulate Pass"),
            color_attachments: &[cleared(display_view), cleared(history_view)],
            depth_stencil_attachment: None,
        });
        render_pass.set_pipeline(&program.pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);

        Ok(())
    }
}

/// 이전 내용은 버리고 새로 씀. 두 패스 모두 모든 픽셀을 덮어씀
fn cleared(view: &TextureView) -> Option<RenderPassColorAttachment<'_>> {
    Some(RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: Operations {
            load: LoadOp::Clear(Color::BLACK),
            store: true,
        },
    })
}

fn color_target(format: TextureFormat) -> ColorTargetState {
    ColorTargetState {
        format,
        blend: None, // 섞는 건 셰이더에서 직접 함
        write_mask: ColorWrites::ALL,
    }
}

impl RenderBackend for WgpuBackend {
    fn compile_program(&mut self, program: Program) -> Result<(), SetupError> {
        match program {
            Program::PathTrace => self.trace = Some(self.compile_trace()?),
            Program::Accumulate => self.accumulate = Some(self.compile_accumulate()?),
        }
        info!("compiled {program} program");
        Ok(())
    }

    fn prepare_targets(&mut self, resolution: Resolution) -> Result<bool, FrameError> {
        self.app
            .resize(PhysicalSize::new(resolution.width, resolution.height));

        if self.targets.resolution() == resolution {
            return Ok(false);
        }

        debug!("reallocating render targets at {}x{}", resolution.width, resolution.height);
        self.targets = RenderTargets::allocate(self.app.device(), resolution)?;
        Ok(true)
    }

    fn begin_frame(&mut self) -> Result<(), FrameError> {
        if self.frame.is_some() {
            warn!("previous frame was never presented, dropping it");
            self.frame = None;
        }

        let surface_texture = match self.app.acquire() {
            Ok(texture) => texture,
            Err(error) => {
                let error = FrameError::from(error);
                if error.is_recoverable() {
                    // 다음 프레임에서 다시 얻을 수 있도록 surface를 다시 설정
                    self.app.reconfigure();
                }
                return Err(error);
            }
        };

        let surface_view = surface_texture
            .texture
            .create_view(&TextureViewDescriptor::default());
        // encoder는 GPU에 보내는 명령들을 임시적으로 저장하는 것
        let encoder = self
            .app
            .device()
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.frame = Some(FrameInProgress {
            surface_texture,
            surface_view,
            encoder,
        });
        Ok(())
    }

    fn bind_target(&mut self, program: Program, slot: Slot, target: Target) -> Result<(), FrameError> {
        let compiled = match program {
            Program::PathTrace => self.trace.is_some(),
            Program::Accumulate => self.accumulate.is_some(),
        };
        if !compiled {
            return Err(FrameError::ProgramNotCompiled(program));
        }

        self.bindings.bind(program, slot, target);
        Ok(())
    }

    fn set_parameter(&mut self, program: Program, parameter: Parameter) -> Result<(), FrameError> {
        let applied = match (program, parameter) {
            (Program::PathTrace, Parameter::Spheres(spheres)) => {
                let count = spheres.len().min(MAX_SPHERES);
                self.app
                    .queue()
                    .write_buffer(&self.sphere_buffer, 0, cast_slice(&spheres[..count]));
                true
            }
            (Program::PathTrace, parameter) => self.trace_uniforms.apply(&parameter),
            (Program::Accumulate, parameter) => self.accumulate_uniforms.apply(&parameter),
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
        match program {
            Program::PathTrace => self.draw_trace(),
            Program::Accumulate => self.draw_accumulate(),
        }
    }

    fn copy_texture(&mut self, src: Target, dst: Target) -> Result<(), FrameError> {
        let frame = self.frame.as_mut().ok_or(FrameError::NoFrameInProgress)?;
        let texture = |target| match target {
            Target::Noisy => Some(&self.targets.noisy),
            Target::History => Some(&self.targets.history),
            Target::HistoryNext => Some(&self.targets.history_next),
            // 화면 텍스쳐는 COPY_SRC/DST로 만들지 않았음
            Target::Display => None,
        };

        let (Some(source), Some(destination)) = (texture(src), texture(dst)) else {
            return Err(FrameError::UnsupportedCopy { src, dst });
        };
        if src == dst {
            return Ok(());
        }

        frame.encoder.copy_texture_to_texture(
            source.copy_source(),
            destination.copy_source(),
            self.targets.size(),
        );
        Ok(())
    }

    fn present(&mut self) -> Result<(), FrameError> {
        let frame = self.frame.take().ok_or(FrameError::NoFrameInProgress)?;

        // encoder를 마감하고 queue를 통해 device에 전송
        self.app.queue().submit(iter::once(frame.encoder.finish()));
        // 전송 끝났으면 모니터에 출력
        frame.surface_texture.present();
        Ok(())
    }
}
