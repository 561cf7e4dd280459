use nalgebra::{Point3, Unit, Vector3, Vector4};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::buffer::{NoisyFrame, Resolution};
use crate::camera::CameraPose;
use crate::tracer::camera::Viewport;
use crate::tracer::random::PixelRng;
use crate::tracer::ray::Ray;
use crate::tracer::scene::{Scene, Sphere};
use crate::tracer::sky::SkyParams;

pub mod camera;
pub mod random;
pub mod ray;
pub mod scene;
pub mod sky;

/// 한 프레임에서 픽셀마다 몇 개의 광선을, 몇 번까지 튕길지
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    pub rays_per_pixel: u32,
    pub max_bounces: u32,
    pub divergence_strength: f32,
    pub defocus_strength: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            rays_per_pixel: 15,
            max_bounces: 7,
            divergence_strength: 1.2,
            defocus_strength: 1.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    pub vertical_fov_degrees: f32,
    pub focus_distance: f32,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            // 거리 1에서 높이 1짜리 평면이 딱 맞게 보이는 각도
            vertical_fov_degrees: 2.0 * 0.5f32.atan().to_degrees(),
            focus_distance: 1.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceParams {
    pub sampling: SamplingParams,
    pub view: ViewSettings,
    pub sky: SkyParams,
}

/// 광선 경로가 어떻게 끝났는지
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathOutcome {
    /// 하늘로 빠져나감
    Sky,
    /// 빛을 내는 물체에 닿음
    Emission,
    /// 튕길 수 있는 횟수를 다 씀
    Exhausted,
}

#[derive(Clone, Debug)]
pub struct PathSample {
    pub radiance: Vector3<f32>,
    pub outcome: PathOutcome,
    pub bounces: u32,
    pub diffuse_bounces: u32,
    pub specular_bounces: u32,
}

pub struct PixelSample {
    pub colour: Vector4<f32>,
    pub bounces: u32,
    pub outcomes: Vec<PathOutcome>,
}

// Cherno씨와 같은 디자인 선택, HitPayload는 빛의 경로에 대한 정보만 담고
// 이를 이용해 색상을 알아내는건 나중에 함
pub struct HitPayload<'a> {
    pub distance: f32,
    pub position: Point3<f32>,
    pub normal: Unit<Vector3<f32>>,
    pub sphere: &'a Sphere,
}

pub struct PathTracer<'a> {
    scene: &'a Scene,
    params: &'a TraceParams,
}

impl<'a> PathTracer<'a> {
    // 맞은 지점에서 법선 방향으로 살짝 띄우는 거리
    const SURFACE_OFFSET: f32 = 0.0001;

    pub fn new(scene: &'a Scene, params: &'a TraceParams) -> Self {
        Self { scene, params }
    }

    /// 화면 전체를 한 번 그림. 픽셀마다 `rays_per_pixel`개 샘플의 평균.
    pub fn render(&self, viewport: &Viewport, frame_index: u32) -> NoisyFrame {
        let resolution = viewport.resolution();
        let width = resolution.width.max(1);

        // 픽셀끼리는 서로 독립이라 rayon으로 나눠서 돌림. 순서는 collect가 지켜줌
        let pixels = (0..resolution.pixel_count() as u32)
            .into_par_iter()
            .map(|index| self.per_pixel(viewport, index % width, index / width, frame_index).colour)
            .collect();

        NoisyFrame::from_pixels(resolution, pixels)
    }

    // DirectX의 RayGen 쉐이더와 같음
    pub fn per_pixel(&self, viewport: &Viewport, x: u32, y: u32, frame_index: u32) -> PixelSample {
        let pixel_index = y * viewport.resolution().width + x;
        let samples = self.params.sampling.rays_per_pixel.max(1);

        let mut total = Vector3::zeros();
        let mut bounces = 0;
        let mut outcomes = Vec::with_capacity(samples as usize);

        for sample_index in 0..samples {
            let mut rng = PixelRng::seed(pixel_index, frame_index, sample_index);
            let ray = viewport.ray(x, y, &self.params.sampling, &mut rng);
            let path = self.trace(ray, &mut rng);

            total += path.radiance;
            bounces += path.bounces;
            outcomes.push(path.outcome);
        }

        let average = total / samples as f32;
        PixelSample {
            colour: Vector4::new(average.x, average.y, average.z, 1.0),
            bounces,
            outcomes,
        }
    }

    /// 광선 하나를 최대 `max_bounces`번까지 튕기며 들어오는 빛을 모음
    pub fn trace(&self, mut ray: Ray, rng: &mut PixelRng) -> PathSample {
        let max_bounces = self.params.sampling.max_bounces;
        let mut incoming_light = Vector3::zeros();
        let mut ray_colour = Vector3::repeat(1.0);

        let mut sample = PathSample {
            radiance: Vector3::zeros(),
            outcome: PathOutcome::Exhausted,
            bounces: 0,
            diffuse_bounces: 0,
            specular_bounces: 0,
        };

        for bounce in 0..=max_bounces {
            let Some(HitPayload { position, normal, sphere, .. }) = self.trace_ray(&ray) else {
                incoming_light += self.params.sky.sample(&ray.direction).component_mul(&ray_colour);
                sample.outcome = PathOutcome::Sky;
                break;
            };
            let material = &sphere.material;

            // 빛나는 물체는 광원 취급. 여기서 끝냄
            if material.is_emissive() {
                incoming_light += material.emission().component_mul(&ray_colour);
                sample.outcome = PathOutcome::Emission;
                break;
            }

            if bounce == max_bounces {
                sample.outcome = PathOutcome::Exhausted;
                break;
            }

            let is_specular = material.specular_probability > rng.value();

            // position 자체가 구에 접하기 때문에 position을 다음 레이 트레이싱에 바로 사용하면 제대로 안할 것임.
            // 그래서 조금이라도 옮겨야 함
            ray.origin = position + normal.as_ref() * Self::SURFACE_OFFSET;

            let diffuse = Unit::try_new(normal.as_ref() + rng.direction().as_ref(), 1e-8)
                .unwrap_or(normal);
            let specular = reflect(&ray.direction, &normal);
            let t = if is_specular { material.smoothness } else { 0.0 };
            ray.direction = Unit::try_new(diffuse.lerp(&specular, t), 1e-8).unwrap_or(normal);

            let tint = if is_specular {
                material.specular_colour.xyz()
            } else {
                material.albedo.xyz()
            };
            ray_colour.component_mul_assign(&tint);

            sample.bounces += 1;
            if is_specular {
                sample.specular_bounces += 1;
            } else {
                sample.diffuse_bounces += 1;
            }
        }

        sample.radiance = incoming_light;
        sample
    }

    pub fn closest_hit<'b>(&self, ray: &Ray, distance: f32, sphere: &'b Sphere) -> HitPayload<'b> {
        let fake_origin = ray.origin - sphere.position;
        let fake_position = fake_origin + (ray.direction.as_ref() * distance);

        let mut normal = Unit::new_unchecked(fake_position.coords / sphere.radius);
        normal.renormalize_fast();
        let position = fake_position + sphere.position;

        HitPayload {
            distance,
            position,
            normal,
            sphere,
        }
    }

    pub fn trace_ray(&self, ray: &Ray) -> Option<HitPayload<'a>> {
        let mut closest: Option<(&'a Sphere, f32)> = None;
        for sphere in self.scene.spheres() {
            // a = 빔 시작, b = 빔 방향, r = 구 반지름
            // t = 빔이 구와 만날 때, 그 빔 길이. 만나지 않으면 t는 정의되지 않음.
            // (b·b) * t^2 + 2 * (a·b) * t + (a·a - r^2) = 0
            // 구가 원점에 있다고 가정한 식이라, 대신 광선을 구 위치만큼 옮겨서 풂.
            let origin = ray.origin - sphere.position;

            let first = ray.direction.magnitude_squared();
            let second = 2.0 * origin.coords.dot(&ray.direction);
            let third = origin.coords.magnitude_squared() - sphere.radius.powi(2);

            // 판별식
            let discriminant = second.powi(2) - 4.0 * first * third;
            if discriminant < 0.0 {
                continue;
            }

            let distance = (-second - discriminant.sqrt()) / (2.0 * first);
            if distance < 0.0 {
                continue;
            }

            match closest {
                Some((_, previous_distance)) if previous_distance <= distance => {}
                _ => closest = Some((sphere, distance)),
            }
        }

        closest.map(|(sphere, distance)| self.closest_hit(ray, distance, sphere))
    }
}

fn reflect(direction: &Unit<Vector3<f32>>, normal: &Unit<Vector3<f32>>) -> Vector3<f32> {
    direction.as_ref() - normal.as_ref() * (2.0 * direction.dot(normal))
}

/// 카메라 자세, 장면, 샘플링 설정, 프레임 번호만으로 결정되는 한 프레임의 노이즈 이미지.
/// 같은 입력이면 항상 같은 결과가 나옴.
pub fn render(
    pose: &CameraPose,
    scene: &Scene,
    params: &TraceParams,
    frame_index: u32,
    resolution: Resolution,
) -> NoisyFrame {
    let viewport = Viewport::new(pose, &params.view, resolution);
    PathTracer::new(scene, params).render(&viewport, frame_index)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::scene::Material;
    use super::*;

    fn pose() -> CameraPose {
        CameraPose::looking(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, -1.0))
    }

    fn params(rays_per_pixel: u32, max_bounces: u32) -> TraceParams {
        TraceParams {
            sampling: SamplingParams {
                rays_per_pixel,
                max_bounces,
                ..SamplingParams::default()
            },
            ..TraceParams::default()
        }
    }

    fn light() -> Sphere {
        Sphere {
            position: Vector3::new(0.0, 0.0, -5.0),
            radius: 1.0,
            material: Material {
                emission_colour: Vector4::new(1.0, 0.5, 0.25, 1.0),
                emission_strength: 2.0,
                ..Material::default()
            },
        }
    }

    fn ray(origin: Point3<f32>, direction: Vector3<f32>) -> Ray {
        Ray {
            origin,
            direction: Unit::new_normalize(direction),
        }
    }

    #[test]
    fn trace_ray_returns_the_closest_sphere() {
        let near = Sphere {
            position: Vector3::new(0.0, 0.0, -3.0),
            radius: 0.5,
            ..Sphere::default()
        };
        let far = Sphere {
            position: Vector3::new(0.0, 0.0, -10.0),
            radius: 2.0,
            ..Sphere::default()
        };
        // 먼 구를 먼저 넣어도 가까운 구가 나와야 함
        let scene = Scene::new(vec![far, near.clone()]).expect("valid scene");
        let params = TraceParams::default();
        let tracer = PathTracer::new(&scene, &params);

        let hit = tracer
            .trace_ray(&ray(Point3::origin(), Vector3::new(0.0, 0.0, -1.0)))
            .expect("ray should hit");
        assert_eq!(hit.sphere, &near);
        assert_relative_eq!(hit.distance, 2.5, epsilon = 1e-5);
        assert_relative_eq!(hit.normal.into_inner(), Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-4);
    }

    #[test]
    fn spheres_behind_the_ray_are_ignored() {
        let scene = Scene::new(vec![Sphere {
            position: Vector3::new(0.0, 0.0, 5.0),
            ..Sphere::default()
        }])
        .expect("valid scene");
        let params = TraceParams::default();
        let tracer = PathTracer::new(&scene, &params);

        assert!(tracer
            .trace_ray(&ray(Point3::origin(), Vector3::new(0.0, 0.0, -1.0)))
            .is_none());
    }

    #[test]
    fn direct_hit_on_a_light_returns_its_emission() {
        let scene = Scene::new(vec![light()]).expect("valid scene");
        let params = params(1, 4);
        let tracer = PathTracer::new(&scene, &params);
        let mut rng = PixelRng::seed(0, 0, 0);

        let path = tracer.trace(ray(Point3::origin(), Vector3::new(0.0, 0.0, -1.0)), &mut rng);
        assert_eq!(path.outcome, PathOutcome::Emission);
        assert_eq!(path.bounces, 0);
        assert_relative_eq!(path.radiance, Vector3::new(2.0, 1.0, 0.5));
    }

    #[test]
    fn escaping_ray_returns_the_sky() {
        let scene = Scene::default();
        let params = params(1, 4);
        let tracer = PathTracer::new(&scene, &params);
        let mut rng = PixelRng::seed(0, 0, 0);
        let direction = Unit::new_normalize(Vector3::new(0.3, 0.6, -1.0));

        let path = tracer.trace(
            Ray {
                origin: Point3::origin(),
                direction,
            },
            &mut rng,
        );
        assert_eq!(path.outcome, PathOutcome::Sky);
        assert_relative_eq!(path.radiance, params.sky.sample(&direction));
    }

    #[test]
    fn zero_bounces_resolve_to_emission_or_sky_only() {
        let scene = Scene::load();
        let params = params(1, 0);
        let resolution = Resolution::new(24, 16);
        let camera = CameraPose::looking(Point3::new(-3.2, 4.0, -7.5), Vector3::new(0.73, -0.55, 0.4));
        let viewport = Viewport::new(&camera, &params.view, resolution);
        let tracer = PathTracer::new(&scene, &params);

        let sky = params.sky.clone();
        for y in 0..resolution.height {
            for x in 0..resolution.width {
                let sample = tracer.per_pixel(&viewport, x, y, 3);
                assert_eq!(sample.bounces, 0);
                assert_eq!(sample.outcomes.len(), 1);

                // 같은 시드로 광선을 다시 만들어 결과를 직접 확인
                let mut rng = PixelRng::seed(y * resolution.width + x, 3, 0);
                let ray = viewport.ray(x, y, &params.sampling, &mut rng);
                let expected = match tracer.trace_ray(&ray) {
                    None => sky.sample(&ray.direction),
                    Some(hit) if hit.sphere.material.is_emissive() => hit.sphere.material.emission(),
                    // 튕기지 못한 비발광 표면은 빛을 주지 않음
                    Some(_) => Vector3::zeros(),
                };

                assert!(matches!(
                    sample.outcomes[0],
                    PathOutcome::Sky | PathOutcome::Emission | PathOutcome::Exhausted
                ));
                assert_relative_eq!(sample.colour.xyz(), expected, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn rendering_is_reproducible_for_the_same_frame() {
        let scene = Scene::load();
        let params = params(2, 3);
        let resolution = Resolution::new(12, 8);

        let first = render(&pose(), &scene, &params, 5, resolution);
        let second = render(&pose(), &scene, &params, 5, resolution);
        assert_eq!(first, second);
    }

    #[test]
    fn successive_frames_are_decorrelated() {
        let scene = Scene::load();
        let params = params(1, 3);
        let resolution = Resolution::new(12, 8);
        let camera = CameraPose::looking(Point3::new(-3.2, 4.0, -7.5), Vector3::new(0.73, -0.55, 0.4));

        let first = render(&camera, &scene, &params, 0, resolution);
        let second = render(&camera, &scene, &params, 1, resolution);
        assert_ne!(first, second);
    }

    #[test]
    fn bounce_counts_split_into_diffuse_and_specular() {
        let scene = Scene::load();
        let params = params(1, 7);
        let tracer = PathTracer::new(&scene, &params);

        for seed in 0..64 {
            let mut rng = PixelRng::seed(seed, 0, 0);
            let path = tracer.trace(
                ray(Point3::new(0.0, 3.0, 0.0), Vector3::new(0.1, -0.4, -1.0)),
                &mut rng,
            );
            assert_eq!(path.bounces, path.diffuse_bounces + path.specular_bounces);
            assert!(path.bounces <= params.sampling.max_bounces);
            assert!(path.radiance.iter().all(|channel| channel.is_finite() && *channel >= 0.0));
        }
    }

    #[test]
    fn dark_surfaces_still_bounce_to_the_sky() {
        // 거의 검은 구에 맞아도 경로가 중간에 끊기지 않고 하늘까지 가야 함
        let dark = Sphere {
            position: Vector3::new(0.0, 0.0, -5.0),
            radius: 1.0,
            material: Material {
                albedo: Vector4::new(0.01, 0.01, 0.01, 1.0),
                ..Material::default()
            },
        };
        let scene = Scene::new(vec![dark]).expect("valid scene");
        let params = params(1, 1);
        let tracer = PathTracer::new(&scene, &params);

        for seed in 0..64 {
            let mut rng = PixelRng::seed(seed, 0, 0);
            let path = tracer.trace(ray(Point3::origin(), Vector3::new(0.0, 0.0, -1.0)), &mut rng);
            assert_eq!(path.outcome, PathOutcome::Sky);
            assert_eq!(path.bounces, 1);
            assert!(path.radiance.iter().all(|channel| *channel > 0.0));
        }
    }

    #[test]
    fn default_sampling_matches_the_demo_program() {
        let sampling = SamplingParams::default();
        assert_eq!(sampling.rays_per_pixel, 15);
        assert_eq!(sampling.max_bounces, 7);
        assert_relative_eq!(sampling.divergence_strength, 1.2);
        assert_relative_eq!(sampling.defocus_strength, 1.5);
    }
}
