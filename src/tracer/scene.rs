use std::fs;
use std::path::Path;

use bytemuck::{Pod, Zeroable};
use nalgebra::{Vector3, Vector4};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 셰이더의 구 블록이 담을 수 있는 최대 구 개수. `trace.wgsl`의 배열 크기와 같음
pub const MAX_SPHERES: usize = 32;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("sphere {index} has non-positive radius {radius}")]
    NonPositiveRadius { index: usize, radius: f32 },

    #[error("sphere {index}: {field} = {value} is outside [0, 1]")]
    OutOfUnitRange {
        index: usize,
        field: &'static str,
        value: f32,
    },

    #[error("sphere {index} has a non-finite {field}")]
    NonFinite { index: usize, field: &'static str },

    #[error("scene has {count} spheres but at most {MAX_SPHERES} are supported")]
    TooManySpheres { count: usize },

    #[error("failed to read scene file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse scene: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub albedo: Vector4<f32>,
    pub emission_colour: Vector4<f32>,
    pub specular_colour: Vector4<f32>,
    pub emission_strength: f32,
    pub smoothness: f32,
    pub specular_probability: f32,
    // 체커 무늬 같은 셰이딩 변형용. 아직은 0만 씀
    #[serde(default)]
    pub flag: i32,
}

impl Material {
    pub fn emission(&self) -> Vector3<f32> {
        self.emission_colour.xyz() * self.emission_strength
    }

    /// 빛을 내는 재질이면 광선이 여기서 끝남
    pub fn is_emissive(&self) -> bool {
        self.emission_strength > 0.0 && self.emission_colour.xyz().max() > 0.0
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vector4::new(1.0, 1.0, 1.0, 1.0),
            emission_colour: Vector4::zeros(),
            specular_colour: Vector4::new(1.0, 1.0, 1.0, 1.0),
            emission_strength: 0.0,
            smoothness: 0.0,
            specular_probability: 0.0,
            flag: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub position: Vector3<f32>,
    pub radius: f32,
    pub material: Material,
}

impl Default for Sphere {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            radius: 1.0,
            material: Material::default(),
        }
    }
}

impl Sphere {
    fn validate(&self, index: usize) -> Result<(), SceneError> {
        let material = &self.material;
        let vectors = [
            ("position", self.position.iter().all(|v| v.is_finite())),
            ("albedo", material.albedo.iter().all(|v| v.is_finite())),
            ("emission_colour", material.emission_colour.iter().all(|v| v.is_finite())),
            ("specular_colour", material.specular_colour.iter().all(|v| v.is_finite())),
            ("emission_strength", material.emission_strength.is_finite()),
        ];
        if let Some((field, _)) = vectors.iter().find(|(_, finite)| !finite) {
            return Err(SceneError::NonFinite { index, field });
        }

        // NaN도 여기서 걸림
        if !(self.radius > 0.0) {
            return Err(SceneError::NonPositiveRadius {
                index,
                radius: self.radius,
            });
        }

        for (field, value) in [
            ("smoothness", material.smoothness),
            ("specular_probability", material.specular_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SceneError::OutOfUnitRange { index, field, value });
            }
        }

        Ok(())
    }
}

/// 셰이더의 `Sphere` 구조체와 바이트 단위로 같은 레코드. 16바이트 정렬, 80바이트.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct GpuSphere {
    pub position: [f32; 3],
    pub radius: f32,
    pub albedo: [f32; 4],
    pub emission_colour: [f32; 4],
    pub specular_colour: [f32; 4],
    pub emission_strength: f32,
    pub smoothness: f32,
    pub specular_probability: f32,
    pub flag: i32,
}

impl From<&Sphere> for GpuSphere {
    fn from(sphere: &Sphere) -> Self {
        let material = &sphere.material;
        Self {
            position: sphere.position.into(),
            radius: sphere.radius,
            albedo: material.albedo.into(),
            emission_colour: material.emission_colour.into(),
            specular_colour: material.specular_colour.into(),
            emission_strength: material.emission_strength,
            smoothness: material.smoothness,
            specular_probability: material.specular_probability,
            flag: material.flag,
        }
    }
}

impl From<&GpuSphere> for Sphere {
    fn from(record: &GpuSphere) -> Self {
        Self {
            position: record.position.into(),
            radius: record.radius,
            material: Material {
                albedo: record.albedo.into(),
                emission_colour: record.emission_colour.into(),
                specular_colour: record.specular_colour.into(),
                emission_strength: record.emission_strength,
                smoothness: record.smoothness,
                specular_probability: record.specular_probability,
                flag: record.flag,
            },
        }
    }
}

/// 렌더링 중에는 읽기만 하는 고정 크기 구 목록
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    spheres: Vec<Sphere>,
}

impl Scene {
    pub fn new(spheres: Vec<Sphere>) -> Result<Self, SceneError> {
        if spheres.len() > MAX_SPHERES {
            return Err(SceneError::TooManySpheres {
                count: spheres.len(),
            });
        }
        for (index, sphere) in spheres.iter().enumerate() {
            sphere.validate(index)?;
        }

        Ok(Self { spheres })
    }

    /// 기본 데모 장면: 빨간 공, 거울 공 둘, 청록 공, 바닥, 조명
    pub fn load() -> Self {
        let material = |albedo: [f32; 4],
                        emission_colour: [f32; 4],
                        specular_colour: [f32; 4],
                        emission_strength: f32,
                        smoothness: f32,
                        specular_probability: f32| Material {
            albedo: albedo.into(),
            emission_colour: emission_colour.into(),
            specular_colour: specular_colour.into(),
            emission_strength,
            smoothness,
            specular_probability,
            flag: 0,
        };
        let sphere = |position: [f32; 3], radius: f32, material: Material| Sphere {
            position: position.into(),
            radius,
            material,
        };

        let spheres = vec![
            // 빨간 공
            sphere(
                [0.0, 0.0, -5.0],
                1.0,
                material([1.0, 0.1, 0.1, 0.1], [0.0; 4], [1.0; 4], 1.0, 0.1, 0.0),
            ),
            // 거울 공
            sphere(
                [2.0, 0.4, -3.0],
                1.2,
                material([1.0; 4], [0.0; 4], [1.0; 4], 0.0, 1.0, 0.8),
            ),
            // 청록 공
            sphere(
                [5.0, -0.1, -3.0],
                0.7,
                material([0.0, 1.0, 1.0, 1.0], [0.0; 4], [0.4, 0.8, 0.8, 1.0], 0.0, 1.0, 0.3),
            ),
            // 큰 거울 공
            sphere(
                [3.0, 2.0, -7.0],
                2.0,
                material([1.0; 4], [0.0; 4], [1.0; 4], 0.0, 1.0, 1.0),
            ),
            // 바닥 (아주 큰 구)
            sphere(
                [5.0, -51.5, -3.0],
                50.7,
                material(
                    [1.0, 0.0, 1.0, 1.0],
                    [0.7, 0.2, 0.2, 0.0],
                    [1.0, 0.6, 1.0, 1.0],
                    0.0,
                    0.2,
                    0.7,
                ),
            ),
            // 조명
            sphere(
                [7.0, 10.0, -3.0],
                6.2,
                material([1.0; 4], [1.0; 4], [0.5, 0.5, 0.5, 1.0], 2.8, 0.2, 0.5),
            ),
        ];

        Self { spheres }
    }

    pub fn from_ron_str(source: &str) -> Result<Self, SceneError> {
        let spheres: Vec<Sphere> = ron::from_str(source)?;
        Self::new(spheres)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SceneError> {
        let source = fs::read_to_string(path)?;
        Self::from_ron_str(&source)
    }

    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    pub fn len(&self) -> usize {
        self.spheres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spheres.is_empty()
    }

    pub fn gpu_spheres(&self) -> Vec<GpuSphere> {
        self.spheres.iter().map(GpuSphere::from).collect()
    }
}
