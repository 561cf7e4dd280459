use std::f32::consts::TAU;

use nalgebra::{Unit, Vector2, Vector3};
use rand::RngCore;

/// 픽셀 하나, 샘플 하나를 위한 난수열.
///
/// 셰이더(`trace.wgsl`)와 똑같은 PCG 해시를 써서, 같은 `(픽셀, 프레임, 샘플)`이면
/// CPU든 GPU든 같은 난수열이 나옴.
#[derive(Clone, Debug)]
pub struct PixelRng {
    state: u32,
}

impl PixelRng {
    const FRAME_STRIDE: u32 = 719_393;
    const SAMPLE_STRIDE: u32 = 0x9E37_79B9;

    pub fn seed(pixel_index: u32, frame_index: u32, sample_index: u32) -> Self {
        let state = pixel_index
            .wrapping_add(frame_index.wrapping_mul(Self::FRAME_STRIDE))
            .wrapping_add(sample_index.wrapping_mul(Self::SAMPLE_STRIDE));
        Self { state }
    }

    fn step(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(747_796_405)
            .wrapping_add(2_891_336_453);
        let state = self.state;
        let mut result = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
        result = (result >> 22) ^ result;
        result
    }

    /// [0, 1] 범위의 균등 분포 값
    pub fn value(&mut self) -> f32 {
        self.step() as f32 / u32::MAX as f32
    }

    /// 평균 0, 표준편차 1인 정규 분포 (Box-Muller)
    pub fn normal(&mut self) -> f32 {
        let theta = TAU * self.value();
        // ln(0) 방지
        let rho = (-2.0 * self.value().max(1e-7).ln()).sqrt();
        rho * theta.cos()
    }

    /// 구면 위에 고르게 퍼진 방향
    pub fn direction(&mut self) -> Unit<Vector3<f32>> {
        let candidate = Vector3::new(self.normal(), self.normal(), self.normal());
        Unit::try_new(candidate, 1e-8).unwrap_or_else(|| Vector3::y_axis())
    }

    /// 단위 원 안의 점
    pub fn point_in_circle(&mut self) -> Vector2<f32> {
        let angle = self.value() * TAU;
        let point = Vector2::new(angle.cos(), angle.sin());
        point * self.value().sqrt()
    }
}

impl RngCore for PixelRng {
    fn next_u32(&mut self) -> u32 {
        self.step()
    }

    fn next_u64(&mut self) -> u64 {
        let high = u64::from(self.step());
        let low = u64::from(self.step());
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.step().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    #[test]
    fn same_seed_gives_same_stream() {
        let mut first = PixelRng::seed(12, 3, 1);
        let mut second = PixelRng::seed(12, 3, 1);

        for _ in 0..32 {
            assert_eq!(first.next_u32(), second.next_u32());
        }
    }

    #[test]
    fn frame_and_sample_decorrelate_the_stream() {
        let base: Vec<u32> = {
            let mut rng = PixelRng::seed(40, 0, 0);
            (0..8).map(|_| rng.next_u32()).collect()
        };
        let next_frame: Vec<u32> = {
            let mut rng = PixelRng::seed(40, 1, 0);
            (0..8).map(|_| rng.next_u32()).collect()
        };
        let next_sample: Vec<u32> = {
            let mut rng = PixelRng::seed(40, 0, 1);
            (0..8).map(|_| rng.next_u32()).collect()
        };

        assert_ne!(base, next_frame);
        assert_ne!(base, next_sample);
    }

    #[test]
    fn values_stay_in_unit_range() {
        let mut rng = PixelRng::seed(7, 99, 2);
        for _ in 0..10_000 {
            let value = rng.value();
            assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn directions_are_unit_length() {
        let mut rng = PixelRng::seed(1, 2, 3);
        for _ in 0..1_000 {
            let direction = rng.direction();
            assert!((direction.norm() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn circle_points_stay_inside_the_unit_disc() {
        let mut rng = PixelRng::seed(5, 5, 5);
        for _ in 0..1_000 {
            assert!(rng.point_in_circle().norm() <= 1.0 + 1e-5);
        }
    }

    #[test]
    fn works_as_a_rand_generator() {
        let mut rng = PixelRng::seed(0, 0, 0);
        let mut reference = PixelRng::seed(0, 0, 0);

        let value: u32 = rng.gen();
        assert_eq!(value, reference.next_u32());

        let index = rng.gen_range(0..10usize);
        assert!(index < 10);
    }
}
