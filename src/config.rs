use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::CameraSettings;
use crate::schedule::FixedRate;
use crate::tracer::TraceParams;

/// 이 환경 변수에 설정 파일 경로를 넣으면 기본값 대신 그걸 읽음
pub const CONFIG_ENV: &str = "AFTERGLOW_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid setting {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 800,
            title: String::from("Afterglow: Progressive Path Tracer"),
        }
    }
}

/// 창 없이 몇 프레임 그려서 PNG로 저장
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeadlessSettings {
    pub frames: u32,
    pub output: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub window: WindowSettings,
    pub target_fps: u32,
    pub camera: CameraSettings,
    pub trace: TraceParams,
    /// RON 장면 파일. 없으면 내장 장면
    pub scene: Option<PathBuf>,
    pub headless: Option<HeadlessSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window: WindowSettings::default(),
            target_fps: FixedRate::DEFAULT_FPS,
            camera: CameraSettings::default(),
            trace: TraceParams::default(),
            scene: None,
            headless: None,
        }
    }
}

impl Settings {
    /// `AFTERGLOW_CONFIG`가 있으면 그 파일을, 없으면 기본값
    pub fn load() -> Result<Self, ConfigError> {
        match env::var_os(CONFIG_ENV) {
            Some(path) => {
                info!("loading settings from {}", Path::new(&path).display());
                Self::load_from_file(path)
            }
            None => Ok(Self::default()),
        }
    }

    /// 확장자로 형식을 고름: `.ron` 또는 `.toml`
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;

        match path.extension().and_then(|extension| extension.to_str()) {
            Some("ron") => Self::from_ron_str(&contents),
            Some("toml") => Self::from_toml_str(&contents),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    pub fn from_ron_str(contents: &str) -> Result<Self, ConfigError> {
        let settings: Self = ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// 읽은 값으로는 아무것도 그릴 수 없는 설정을 걸러냄
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Some(headless) = &self.headless else {
            return Ok(());
        };

        if headless.frames == 0 {
            return Err(ConfigError::Invalid {
                field: "headless.frames",
                message: "at least one frame must be rendered".to_string(),
            });
        }
        // 창이 없으니 최소화로 0이 되는 일도 없음. 0이면 저장할 이미지가 없음
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid {
                field: "window",
                message: format!(
                    "snapshot size {}x{} has no pixels",
                    self.window.width, self.window.height
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn defaults_match_the_demo_program() {
        let settings = Settings::default();
        assert_eq!(settings.window.width, 800);
        assert_eq!(settings.window.height, 800);
        assert_eq!(settings.target_fps, 144);
        assert_eq!(settings.trace.sampling.rays_per_pixel, 15);
        assert_eq!(settings.trace.sampling.max_bounces, 7);
        assert_relative_eq!(settings.camera.speed, 5.5);
        assert!(settings.scene.is_none());
        assert!(settings.headless.is_none());
    }

    #[test]
    fn toml_overrides_only_what_it_names() {
        let settings = Settings::from_toml_str(
            r#"
            target_fps = 60

            [trace.sampling]
            rays_per_pixel = 4

            [headless]
            frames = 32
            output = "out.png"
            "#,
        )
        .unwrap();

        assert_eq!(settings.target_fps, 60);
        assert_eq!(settings.trace.sampling.rays_per_pixel, 4);
        assert_eq!(settings.trace.sampling.max_bounces, 7);
        assert_eq!(settings.window, WindowSettings::default());
        assert_eq!(
            settings.headless,
            Some(HeadlessSettings {
                frames: 32,
                output: PathBuf::from("out.png"),
            })
        );
    }

    #[test]
    fn ron_reads_nested_settings() {
        let settings = Settings::from_ron_str(
            r#"(
                window: (width: 320, height: 200),
                trace: (sky: (sun_intensity: 2.0)),
                scene: Some("scenes/demo.ron"),
            )"#,
        )
        .unwrap();

        assert_eq!(settings.window.width, 320);
        assert_eq!(settings.window.title, WindowSettings::default().title);
        assert_relative_eq!(settings.trace.sky.sun_intensity, 2.0);
        assert_eq!(settings.scene, Some(PathBuf::from("scenes/demo.ron")));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let path = env::temp_dir().join("afterglow-settings.yaml");
        fs::write(&path, "target_fps: 10").unwrap();

        let result = Settings::load_from_file(&path);
        let _ = fs::remove_file(&path);
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn broken_toml_is_a_parse_error() {
        assert!(matches!(
            Settings::from_toml_str("target_fps = [oops"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn headless_run_needs_at_least_one_frame() {
        let result = Settings::from_toml_str(
            r#"
            [headless]
            frames = 0
            output = "out.png"
            "#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "headless.frames",
                ..
            })
        ));
    }

    #[test]
    fn headless_snapshot_needs_pixels() {
        let result = Settings::from_ron_str(
            r#"(
                window: (width: 0, height: 200),
                headless: Some((frames: 4, output: "out.png")),
            )"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid { field: "window", .. })));

        // 창을 띄울 때는 크기가 나중에 정해지니 통과
        assert!(Settings::from_ron_str("(window: (width: 0, height: 200))").is_ok());
    }
}
