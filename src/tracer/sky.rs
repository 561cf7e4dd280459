use nalgebra::{Unit, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// 아무것도 맞추지 못하고 빠져나간 광선이 받는 환경광
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyParams {
    pub ground_colour: Vector4<f32>,
    pub sky_colour_horizon: Vector4<f32>,
    pub sky_colour_zenith: Vector4<f32>,
    pub sun_focus: f32,
    pub sun_intensity: f32,
    // 정규화는 사용하는 쪽에서 함
    pub sun_direction: Vector3<f32>,
}

impl Default for SkyParams {
    fn default() -> Self {
        Self {
            ground_colour: Vector4::new(0.3, 0.25, 0.2, 1.0),
            sky_colour_horizon: Vector4::new(0.8, 0.6, 0.4, 1.0),
            sky_colour_zenith: Vector4::new(0.1, 0.3, 0.6, 1.0),
            sun_focus: 1.0,
            sun_intensity: 0.2,
            sun_direction: Vector3::new(-1.0, 0.7, -0.5),
        }
    }
}

impl SkyParams {
    pub fn sun_unit(&self) -> Unit<Vector3<f32>> {
        Unit::try_new(self.sun_direction, 1e-8).unwrap_or_else(|| Vector3::y_axis())
    }

    /// 지평선 아래는 땅 색, 위는 지평선에서 천정으로 가는 그라데이션에 태양 원반을 더함
    pub fn sample(&self, direction: &Unit<Vector3<f32>>) -> Vector3<f32> {
        let sky_gradient_t = smoothstep(0.0, 0.4, direction.y).powf(0.35);
        let ground_to_sky_t = smoothstep(-0.01, 0.0, direction.y);

        let horizon = self.sky_colour_horizon.xyz();
        let zenith = self.sky_colour_zenith.xyz();
        let sky_gradient = horizon.lerp(&zenith, sky_gradient_t);

        let sun = direction.dot(&self.sun_unit()).max(0.0).powf(self.sun_focus) * self.sun_intensity;
        // 태양은 지평선 위에서만 보임
        let sun_mask = if ground_to_sky_t >= 1.0 { 1.0 } else { 0.0 };

        self.ground_colour.xyz().lerp(&sky_gradient, ground_to_sky_t)
            + Vector3::repeat(sun * sun_mask)
    }
}

pub(crate) fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
