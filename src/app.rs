use log::info;
use wgpu::{
    Backends, CompositeAlphaMode, Device, DeviceDescriptor, Dx12Compiler, Features, Instance, InstanceDescriptor,
    Limits, PowerPreference, PresentMode, Queue, RequestAdapterOptions, Surface, SurfaceConfiguration, SurfaceError,
    SurfaceTexture, TextureFormat, TextureUsages,
};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::buffer::Resolution;
use crate::error::SetupError;

/// 창 하나와 거기에 붙은 wgpu 장치들
pub struct Application {
    surface: Surface,
    device: Device,
    queue: Queue,
    config: SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    // surface보다 나중에 해제되어야 하니 마지막에 둠. 무조건 winit의 Window를 쓸 것!
    pub window: Window,
}

impl Application {
    pub async fn new(window: Window) -> Result<Self, SetupError> {
        let size = window.inner_size();

        // instance는 Adapter와 Surface를 만들어주며 이들에 필요한 정보를 제공함.
        // 백엔드: Vulkan, Metal, DirectX 등등
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::all(),                     // 모든 종류의 백엔드 허용
            dx12_shader_compiler: Dx12Compiler::default(), // DirectX 사용시, 쉐이더 컴파일러로 FXC 사용
        });

        // 전달하는 &window가 생성하는 surface보다 오래 유지되어야 해서 unsafe.
        // 여기서 surface는 GPU가 그릴 수 있는 사각형 "표면"을 의미함.
        let surface = unsafe { instance.create_surface(&window) }?;

        // adapter는 GPU 관리자. 기기로부터 정보를 가져오거나 특정 요청을 보낼 수 있음.
        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                // 경로 추적은 무거우니 고성능 GPU를 고름
                power_preference: PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface), // 무조건 이 Surface와 호환되야 함
            })
            .await
            .ok_or(SetupError::NoAdapter)?;
        let adapter_info = adapter.get_info();
        info!("using {} ({:?})", adapter_info.name, adapter_info.backend);

        // device: GPU 장치
        // queue: GPU에 보낼 명령어들을 저장하는 큐
        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    features: Features::empty(),
                    // Rgba32Float 렌더 타겟 두 장을 동시에 쓰려면 기본 제한이 필요함
                    limits: Limits::default(),
                    label: Some("Afterglow GPU"),
                },
                None, // API 호출 기록 경로. 안 씀
            )
            .await?;

        // 해당 surface랑 adapter가 가진 기능들의 집합
        let capabilities = surface.get_capabilities(&adapter);

        // 누적 결과는 선형 값이라 sRGB 포맷에 써야 변환이 자동으로 됨
        let surface_format = capabilities
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| capabilities.formats.first())
            .copied()
            .ok_or(SetupError::NoAdapter)?;
        info!("surface format {surface_format:?}");

        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT, // 해당 surface를 이용해 화면에 작성할 것임.
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: PresentMode::AutoVsync,
            alpha_mode: CompositeAlphaMode::Auto,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            window,
        })
    }

    /// 크기가 실제로 바뀌었으면 surface를 다시 설정하고 true
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) -> bool {
        if new_size.width == 0 || new_size.height == 0 || new_size == self.size {
            return false;
        }

        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        true
    }

    /// surface를 잃어버렸을 때 같은 설정으로 다시 붙임
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    pub fn acquire(&self) -> Result<SurfaceTexture, SurfaceError> {
        self.surface.get_current_texture()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn format(&self) -> TextureFormat {
        self.config.format
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::from(self.window.inner_size())
    }
}
