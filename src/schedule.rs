use std::thread;
use std::time::{Duration, Instant};

/// 다음 프레임을 언제 그릴지 정함.
///
/// 창 모드에서는 winit 이벤트 루프가 `ControlFlow::WaitUntil`로 기다려 주니까
/// `next_frame_deadline`만 쓰고, 창 없이 돌 때는 `sleep_until`로 직접 기다림.
pub trait Scheduler {
    fn next_frame_deadline(&mut self, now: Instant) -> Instant;

    fn sleep_until(&mut self, deadline: Instant);
}

/// 일정한 주기로 프레임을 요청함. 기본 144Hz
#[derive(Clone, Debug)]
pub struct FixedRate {
    period: Duration,
    last: Option<Instant>,
}

impl FixedRate {
    pub const DEFAULT_FPS: u32 = 144;

    pub fn new(fps: u32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            last: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Default for FixedRate {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FPS)
    }
}

impl Scheduler for FixedRate {
    fn next_frame_deadline(&mut self, now: Instant) -> Instant {
        let deadline = match self.last {
            // 한참 밀렸으면 따라잡으려고 몰아서 그리지 않고 지금부터 다시 셈
            Some(last) if last + self.period > now => last + self.period,
            _ => now,
        };
        self.last = Some(deadline);
        deadline
    }

    fn sleep_until(&mut self, deadline: Instant) {
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
    }
}

/// 기다리지 않음. 스냅샷을 뽑을 때 씀
#[derive(Clone, Copy, Debug, Default)]
pub struct Unpaced;

impl Scheduler for Unpaced {
    fn next_frame_deadline(&mut self, now: Instant) -> Instant {
        now
    }

    fn sleep_until(&mut self, _deadline: Instant) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rate_is_144_hz() {
        let rate = FixedRate::default();
        let expected = Duration::from_secs_f64(1.0 / 144.0);
        assert_eq!(rate.period(), expected);
    }

    #[test]
    fn deadlines_are_one_period_apart() {
        let mut rate = FixedRate::new(100);
        let start = Instant::now();

        let first = rate.next_frame_deadline(start);
        let second = rate.next_frame_deadline(start + Duration::from_millis(1));
        assert_eq!(first, start);
        assert_eq!(second, start + Duration::from_millis(10));
    }

    #[test]
    fn late_frames_do_not_pile_up() {
        let mut rate = FixedRate::new(100);
        let start = Instant::now();
        rate.next_frame_deadline(start);

        let late = start + Duration::from_millis(500);
        assert_eq!(rate.next_frame_deadline(late), late);
    }

    #[test]
    fn unpaced_never_waits() {
        let mut unpaced = Unpaced;
        let now = Instant::now();
        assert_eq!(unpaced.next_frame_deadline(now), now);
        unpaced.sleep_until(now + Duration::from_secs(3600));
    }
}
