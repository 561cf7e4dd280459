use thiserror::Error;

use crate::backend::{Program, Slot, Target};
use crate::config::ConfigError;
use crate::tracer::scene::SceneError;

/// 시작 단계에서 나는 에러. 하나라도 나면 렌더링을 시작하지 않음
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no compatible GPU adapter found")]
    NoAdapter,

    #[error("failed to open GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("failed to compile {program} program: {message}")]
    ProgramCompile { program: Program, message: String },

    #[error("failed to allocate {target:?} target: {message}")]
    TargetAllocation { target: Target, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error("failed to upload initial parameters: {0}")]
    Upload(#[from] FrameError),
}

/// 프레임 하나를 그리다 난 에러
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("surface was lost")]
    SurfaceLost,

    #[error("surface is outdated")]
    SurfaceOutdated,

    #[error("timed out acquiring the next surface texture")]
    Timeout,

    #[error("GPU ran out of memory")]
    OutOfMemory,

    #[error("{0} program has not been compiled")]
    ProgramNotCompiled(Program),

    #[error("no frame in progress")]
    NoFrameInProgress,

    #[error("failed to reallocate {target:?} target: {message}")]
    TargetAllocation { target: Target, message: String },

    #[error("{program} program has nothing bound to {slot:?}")]
    Unbound { program: Program, slot: Slot },

    #[error("{0:?} target is both read and written by one draw")]
    TargetAliased(Target),

    #[error("invalid {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },

    #[error("cannot copy {src:?} into {dst:?}")]
    UnsupportedCopy { src: Target, dst: Target },
}

impl FrameError {
    /// 다음 프레임에서 다시 시도해도 되는 에러인지
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SurfaceLost | Self::SurfaceOutdated | Self::Timeout)
    }
}

impl From<wgpu::SurfaceError> for FrameError {
    fn from(error: wgpu::SurfaceError) -> Self {
        match error {
            wgpu::SurfaceError::Lost => Self::SurfaceLost,
            wgpu::SurfaceError::Outdated => Self::SurfaceOutdated,
            wgpu::SurfaceError::Timeout => Self::Timeout,
            wgpu::SurfaceError::OutOfMemory => Self::OutOfMemory,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("failed to save snapshot: {0}")]
    Snapshot(#[from] image::ImageError),
}
