use nalgebra::{Matrix4, Point3, Unit, Vector2, Vector3, Vector4};

use crate::buffer::Resolution;
use crate::camera::CameraPose;
use crate::tracer::random::PixelRng;
use crate::tracer::ray::Ray;
use crate::tracer::{SamplingParams, ViewSettings};
use crate::uniforms::TraceUniforms;

/// 픽셀마다 카메라 광선을 만들어줌. DirectX로 치면 RayGen 쉐이더의 앞부분.
///
/// 카메라 로컬 공간에서 -z 방향, `focus_distance`만큼 떨어진 곳에 가상의 평면을 두고
/// 각 픽셀 중심을 그 평면 위 점으로 보냄.
pub struct Viewport {
    resolution: Resolution,
    position: Point3<f32>,
    local_to_world: Matrix4<f32>,
    // (평면 너비, 평면 높이, 초점 거리)
    view_params: Vector3<f32>,
}

impl Viewport {
    pub fn new(pose: &CameraPose, view: &ViewSettings, resolution: Resolution) -> Self {
        Self {
            resolution,
            position: pose.position,
            local_to_world: pose.local_to_world(),
            view_params: view_params(view, resolution),
        }
    }

    /// GPU에 올라간 것과 같은 값으로 광선을 만듦
    pub fn from_uniforms(uniforms: &TraceUniforms) -> Self {
        let [width, height] = uniforms.resolution;
        Self {
            resolution: Resolution::new(width as u32, height as u32),
            position: Point3::from(uniforms.camera_position),
            local_to_world: Matrix4::from(uniforms.cam_local_to_world),
            view_params: Vector3::from(uniforms.view_params),
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn axis(&self, local: Vector3<f32>) -> Vector3<f32> {
        (self.local_to_world * local.to_homogeneous()).xyz()
    }

    pub fn ray(&self, x: u32, y: u32, sampling: &SamplingParams, rng: &mut PixelRng) -> Ray {
        let size = Vector2::new(self.resolution.width as f32, self.resolution.height as f32);
        // 픽셀 중심 기준, v는 위로 갈수록 커짐
        let uv = Vector2::new(
            (x as f32 + 0.5) / size.x,
            1.0 - (y as f32 + 0.5) / size.y,
        );

        let local = Vector4::new(
            (uv.x - 0.5) * self.view_params.x,
            (uv.y - 0.5) * self.view_params.y,
            -self.view_params.z,
            1.0,
        );
        let view_point = Point3::from((self.local_to_world * local).xyz());

        let right = self.axis(Vector3::x());
        let up = self.axis(Vector3::y());

        // 피사계 심도: 광선 시작점을 렌즈 위에서 흔듦
        let defocus = rng.point_in_circle() * sampling.defocus_strength / size.x;
        let origin = self.position + right * defocus.x + up * defocus.y;

        // 안티 에일리어싱: 평면 위 도착점을 흔듦
        let jitter = rng.point_in_circle() * sampling.divergence_strength / size.x;
        let focus_point = view_point + right * jitter.x + up * jitter.y;

        let direction = Unit::try_new(focus_point - origin, 1e-12)
            .unwrap_or_else(|| Unit::new_normalize(view_point - self.position));

        Ray { origin, direction }
    }
}

/// 세로 시야각과 초점 거리로 가상 평면 크기를 구함
pub fn view_params(view: &ViewSettings, resolution: Resolution) -> Vector3<f32> {
    let plane_height =
        2.0 * view.focus_distance * (view.vertical_fov_degrees.to_radians() * 0.5).tan();
    let plane_width = plane_height * resolution.aspect();
    Vector3::new(plane_width, plane_height, view.focus_distance)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn still_sampling() -> SamplingParams {
        SamplingParams {
            rays_per_pixel: 1,
            max_bounces: 0,
            divergence_strength: 0.0,
            defocus_strength: 0.0,
        }
    }

    #[test]
    fn default_view_is_a_unit_plane_at_unit_distance() {
        let params = view_params(&ViewSettings::default(), Resolution::new(800, 800));
        assert_relative_eq!(params, Vector3::new(1.0, 1.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn plane_width_follows_aspect() {
        let params = view_params(&ViewSettings::default(), Resolution::new(1600, 800));
        assert_relative_eq!(params.x, 2.0 * params.y, epsilon = 1e-5);
    }

    #[test]
    fn centre_ray_points_along_forward() {
        let pose = CameraPose::looking(Point3::new(1.0, 2.0, 3.0), Vector3::new(0.0, 0.0, 1.0));
        let viewport = Viewport::new(&pose, &ViewSettings::default(), Resolution::new(3, 3));
        let mut rng = PixelRng::seed(4, 0, 0);

        let ray = viewport.ray(1, 1, &still_sampling(), &mut rng);
        assert_relative_eq!(ray.origin, pose.position, epsilon = 1e-6);
        assert_relative_eq!(ray.direction.into_inner(), *pose.forward, epsilon = 1e-5);
    }

    #[test]
    fn top_row_rays_tilt_up() {
        let pose = CameraPose::looking(Point3::origin(), Vector3::new(1.0, 0.0, 0.0));
        let viewport = Viewport::new(&pose, &ViewSettings::default(), Resolution::new(4, 4));
        let mut rng = PixelRng::seed(0, 0, 0);

        let top = viewport.ray(2, 0, &still_sampling(), &mut rng);
        let bottom = viewport.ray(2, 3, &still_sampling(), &mut rng);
        assert!(top.direction.y > 0.0);
        assert!(bottom.direction.y < 0.0);
    }

    #[test]
    fn defocus_moves_the_origin_off_the_eye() {
        let pose = CameraPose::looking(Point3::origin(), Vector3::new(0.0, 0.0, -1.0));
        let viewport = Viewport::new(&pose, &ViewSettings::default(), Resolution::new(2, 2));
        let sampling = SamplingParams {
            defocus_strength: 50.0,
            ..still_sampling()
        };

        let moved = (0..16).any(|sample| {
            let mut rng = PixelRng::seed(0, 0, sample);
            viewport.ray(0, 0, &sampling, &mut rng).origin != pose.position
        });
        assert!(moved);
    }
}
