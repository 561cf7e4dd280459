use nalgebra::{Isometry3, Matrix4, Point3, Unit, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use winit::event::{ElementState, KeyboardInput, VirtualKeyCode, WindowEvent};

/// 카메라의 위치와 바라보는 방향. view 행렬은 필요할 때마다 만들어 씀.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub position: Point3<f32>,
    pub forward: Unit<Vector3<f32>>,
    pub up: Unit<Vector3<f32>>,
}

impl CameraPose {
    /// 월드 y축을 위로 두고 `forward` 방향을 바라보는 자세
    pub fn looking(position: Point3<f32>, forward: Vector3<f32>) -> Self {
        Self {
            position,
            forward: Unit::new_normalize(forward),
            up: Vector3::y_axis(),
        }
    }

    fn isometry(&self) -> Isometry3<f32> {
        let target = self.position + self.forward.into_inner();
        // look-at 과정에서 up은 forward에 수직이 되도록 다시 맞춰짐
        Isometry3::look_at_rh(&self.position, &target, &self.up)
    }

    /// 월드 → 카메라
    pub fn view_transform(&self) -> Matrix4<f32> {
        self.isometry().to_homogeneous()
    }

    /// 카메라 → 월드. 셰이더의 `cam_local_to_world`
    pub fn local_to_world(&self) -> Matrix4<f32> {
        self.isometry().inverse().to_homogeneous()
    }
}

/// 누적을 초기화해야 하는지. 부동소수점 오차까지 포함해 값이 정확히 같을 때만 그대로 둠
pub fn view_transform_changed(previous: &Matrix4<f32>, current: &Matrix4<f32>) -> bool {
    previous != current
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveDirection {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

impl MoveDirection {
    pub const ALL: [MoveDirection; 6] = [
        MoveDirection::Forward,
        MoveDirection::Backward,
        MoveDirection::Left,
        MoveDirection::Right,
        MoveDirection::Up,
        MoveDirection::Down,
    ];

    fn from_key(key: VirtualKeyCode) -> Option<Self> {
        match key {
            VirtualKeyCode::W => Some(Self::Forward),
            VirtualKeyCode::S => Some(Self::Backward),
            VirtualKeyCode::A => Some(Self::Left),
            VirtualKeyCode::D => Some(Self::Right),
            VirtualKeyCode::Space => Some(Self::Up),
            VirtualKeyCode::LControl => Some(Self::Down),
            _ => None,
        }
    }
}

/// 지금 눌려 있는 이동 키들
// W S A D SPACE CTRL
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MovementKeys([bool; 6]);

impl MovementKeys {
    pub fn set(&mut self, direction: MoveDirection, pressed: bool) {
        self.0[direction as usize] = pressed;
    }

    pub fn is_pressed(&self, direction: MoveDirection) -> bool {
        self.0[direction as usize]
    }

    pub fn any(&self) -> bool {
        self.0.iter().any(|pressed| *pressed)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: [f32; 3],
    pub forward: [f32; 3],
    pub sensitivity: f32,
    pub speed: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: [-3.2, 4.0, -7.5],
            forward: [0.73, -0.55, 0.4],
            sensitivity: 0.1,
            speed: 5.5,
        }
    }
}

/// 마우스와 키보드 입력으로 움직이는 자유 비행 카메라.
///
/// 회전은 yaw/pitch(도 단위)로 들고 있고, pitch는 짐벌이 뒤집히지 않도록 ±89°로 묶음.
pub struct CameraRig {
    position: Point3<f32>,
    forward: Unit<Vector3<f32>>,
    up: Unit<Vector3<f32>>,
    yaw: f32,
    pitch: f32,
    sensitivity: f32,
    speed: f32,
}

impl CameraRig {
    pub const PITCH_LIMIT: f32 = 89.0;

    pub fn new(position: Point3<f32>, forward: Vector3<f32>) -> Self {
        let forward = Unit::try_new(forward, 1e-8).unwrap_or_else(|| Unit::new_unchecked(-Vector3::z()));
        // 처음 마우스를 움직였을 때 시점이 튀지 않도록 시작 방향에서 yaw/pitch를 거꾸로 구함
        let pitch = forward
            .y
            .clamp(-1.0, 1.0)
            .asin()
            .to_degrees()
            .clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
        let yaw = forward.z.atan2(forward.x).to_degrees();

        let mut rig = Self {
            position,
            forward,
            up: Vector3::y_axis(),
            yaw,
            pitch,
            sensitivity: 0.1,
            speed: 5.5,
        };
        rig.reevaluate_forward();
        rig
    }

    pub fn from_settings(settings: &CameraSettings) -> Self {
        let mut rig = Self::new(settings.position.into(), settings.forward.into());
        rig.sensitivity = settings.sensitivity;
        rig.speed = settings.speed;
        rig
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn right(&self) -> Unit<Vector3<f32>> {
        Unit::new_normalize(self.forward.cross(&self.up))
    }

    /// 마우스 이동량으로 시점 회전. 화면 좌표 기준이라 아래로 움직이면 `delta_y`가 양수
    pub fn apply_look(&mut self, delta_x: f32, delta_y: f32) {
        self.yaw += delta_x * self.sensitivity;
        self.pitch = (self.pitch - delta_y * self.sensitivity)
            .clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);

        self.reevaluate_forward();
    }

    pub fn apply_move(&mut self, direction: MoveDirection, time_step: f32) {
        let distance = self.speed * time_step;
        let offset = match direction {
            MoveDirection::Forward => self.forward.into_inner(),
            MoveDirection::Backward => -self.forward.into_inner(),
            MoveDirection::Left => -self.right().into_inner(),
            MoveDirection::Right => self.right().into_inner(),
            MoveDirection::Up => self.up.into_inner(),
            MoveDirection::Down => -self.up.into_inner(),
        };

        self.position += offset * distance;
    }

    /// 눌린 키 전부 적용. 하나라도 움직였으면 true
    pub fn apply_movement(&mut self, keys: &MovementKeys, time_step: f32) -> bool {
        for direction in MoveDirection::ALL {
            if keys.is_pressed(direction) {
                self.apply_move(direction, time_step);
            }
        }

        keys.any()
    }

    pub fn current_pose(&self) -> CameraPose {
        CameraPose {
            position: self.position,
            forward: self.forward,
            up: self.up,
        }
    }

    fn reevaluate_forward(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        let front = Vector3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos());
        self.forward = Unit::new_normalize(front);
    }
}

/// 한 프레임 동안 모인 입력
#[derive(Clone, Copy, Debug)]
pub struct InputSnapshot {
    pub look: Vector2<f32>,
    pub movement: MovementKeys,
}

/// 창/장치 이벤트를 모아뒀다가 프레임마다 한 번씩 넘겨줌
pub struct InputState {
    keys: MovementKeys,
    pointer_delta: Vector2<f32>,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            keys: MovementKeys::default(),
            pointer_delta: Vector2::zeros(),
        }
    }
}

impl InputState {
    // true: 여기서 처리한 이벤트
    // false: 아래 event loop에서 처리 해야 함.
    pub fn input(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state,
                        virtual_keycode: Some(key),
                        ..
                    },
                ..
            } => {
                let Some(direction) = MoveDirection::from_key(*key) else {
                    return false;
                };
                self.keys
                    .set(direction, matches!(state, ElementState::Pressed));
                true
            }
            // 포커스를 잃으면 키를 뗀 이벤트가 안 올 수 있음
            WindowEvent::Focused(false) => {
                self.keys = MovementKeys::default();
                false
            }
            _ => false,
        }
    }

    /// 커서가 잠겨 있으면 `CursorMoved`가 의미 없어서 장치의 원시 이동량을 씀
    pub fn accumulate_pointer(&mut self, delta_x: f64, delta_y: f64) {
        self.pointer_delta += Vector2::new(delta_x as f32, delta_y as f32);
    }

    pub fn press(&mut self, direction: MoveDirection, pressed: bool) {
        self.keys.set(direction, pressed);
    }

    /// 이동량은 비우고 눌린 키 상태는 그대로 둠
    pub fn take(&mut self) -> InputSnapshot {
        let look = std::mem::replace(&mut self.pointer_delta, Vector2::zeros());
        InputSnapshot {
            look,
            movement: self.keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn rig() -> CameraRig {
        CameraRig::new(Point3::origin(), Vector3::new(1.0, 0.0, 0.0))
    }

    #[test]
    fn yaw_and_pitch_follow_the_initial_direction() {
        let rig = CameraRig::new(Point3::origin(), Vector3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(rig.yaw(), 90.0, epsilon = 1e-4);
        assert_relative_eq!(rig.pitch(), 0.0, epsilon = 1e-4);
        assert_relative_eq!(
            rig.current_pose().forward.into_inner(),
            Vector3::new(0.0, 0.0, 1.0),
            epsilon = 1e-5
        );
    }

    #[test]
    fn look_uses_the_fixed_sensitivity() {
        let mut rig = rig();
        rig.apply_look(100.0, -50.0);
        assert_relative_eq!(rig.yaw(), 10.0, epsilon = 1e-4);
        assert_relative_eq!(rig.pitch(), 5.0, epsilon = 1e-4);

        let (yaw, pitch) = (10f32.to_radians(), 5f32.to_radians());
        let expected = Vector3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos());
        assert_relative_eq!(rig.current_pose().forward.into_inner(), expected, epsilon = 1e-5);
    }

    #[test]
    fn pitch_never_exceeds_the_limit() {
        let mut rig = rig();
        rig.apply_look(0.0, 100_000.0);
        assert_eq!(rig.pitch(), -89.0);

        for _ in 0..1_000 {
            rig.apply_look(0.0, 100_000.0);
        }
        assert_eq!(rig.pitch(), -89.0);

        rig.apply_look(0.0, -1_000_000.0);
        assert_eq!(rig.pitch(), 89.0);

        // 위를 끝까지 봐도 forward와 up이 평행해지지 않음
        let pose = rig.current_pose();
        assert!(pose.forward.cross(&pose.up).norm() > 1e-3);
    }

    #[test]
    fn move_forward_covers_speed_times_dt() {
        let mut rig = rig();
        rig.apply_move(MoveDirection::Forward, 0.5);
        assert_relative_eq!(rig.current_pose().position, Point3::new(2.75, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn strafing_uses_forward_cross_up() {
        let mut rig = rig();
        // forward = +x, up = +y 이면 right = +z
        rig.apply_move(MoveDirection::Right, 1.0);
        assert_relative_eq!(rig.current_pose().position, Point3::new(0.0, 0.0, 5.5), epsilon = 1e-5);

        rig.apply_move(MoveDirection::Left, 1.0);
        rig.apply_move(MoveDirection::Up, 1.0);
        assert_relative_eq!(rig.current_pose().position, Point3::new(0.0, 5.5, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn held_keys_move_every_frame() {
        let mut rig = rig();
        let mut keys = MovementKeys::default();
        assert!(!rig.apply_movement(&keys, 1.0));

        keys.set(MoveDirection::Backward, true);
        keys.set(MoveDirection::Down, true);
        assert!(rig.apply_movement(&keys, 1.0 / 5.5));
        assert_relative_eq!(rig.current_pose().position, Point3::new(-1.0, -1.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn view_transform_changes_only_when_the_pose_does() {
        let mut rig = rig();
        let before = rig.current_pose().view_transform();
        assert!(!view_transform_changed(&before, &rig.current_pose().view_transform()));

        rig.apply_look(1.0, 0.0);
        let after = rig.current_pose().view_transform();
        assert!(view_transform_changed(&before, &after));
    }

    #[test]
    fn local_to_world_inverts_the_view() {
        let pose = CameraPose::looking(Point3::new(1.0, 2.0, 3.0), Vector3::new(0.3, -0.2, 0.9));
        let product = pose.view_transform() * pose.local_to_world();
        assert_relative_eq!(product, Matrix4::identity(), epsilon = 1e-5);

        // 카메라 로컬 -z가 forward
        let forward = pose.local_to_world() * Vector3::new(0.0, 0.0, -1.0).to_homogeneous();
        assert_relative_eq!(forward.xyz(), pose.forward.into_inner(), epsilon = 1e-5);
    }

    #[test]
    fn snapshot_drains_pointer_but_keeps_keys() {
        let mut input = InputState::default();
        input.accumulate_pointer(3.0, -2.0);
        input.accumulate_pointer(1.0, 1.0);
        input.press(MoveDirection::Forward, true);

        let first = input.take();
        assert_eq!(first.look, Vector2::new(4.0, -1.0));
        assert!(first.movement.is_pressed(MoveDirection::Forward));

        let second = input.take();
        assert_eq!(second.look, Vector2::zeros());
        assert!(second.movement.is_pressed(MoveDirection::Forward));
    }
}
