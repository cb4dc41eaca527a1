use super::camera_utils::{Camera, Perspective};
use cgmath::*;

#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub distance: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub eye: Vector3<f32>,
    pub target: Vector3<f32>,
    pub up: Vector3<f32>,
    pub bounds: OrbitCameraBounds,
    pub projection: Perspective,
    /// Yaw speed in radians per second applied by `update`
    pub auto_rotate: f32,
}

impl Camera for OrbitCamera {
    fn view_matrix(&self) -> Matrix4<f32> {
        let eye = Point3::from_vec(self.eye);
        let target = Point3::from_vec(self.target);
        Matrix4::look_at_rh(eye, target, self.up)
    }

    fn projection_matrix(&self) -> Matrix4<f32> {
        self.projection.matrix()
    }

    fn position(&self) -> Point3<f32> {
        Point3::from_vec(self.eye)
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.projection.resize(width, height);
    }

    fn update(&mut self, dt: f32) {
        if self.auto_rotate != 0.0 {
            self.add_yaw(self.auto_rotate * dt);
        }
    }
}

impl OrbitCamera {
    pub fn new(
        distance: f32,
        pitch: f32,
        yaw: f32,
        target: Vector3<f32>,
        projection: Perspective,
    ) -> Self {
        let mut camera = Self {
            distance,
            pitch,
            yaw,
            eye: Vector3::zero(), // Will be auto-calculated in `update_eye()` nevertheless.
            target,
            up: Vector3::unit_y(),
            bounds: OrbitCameraBounds::default(),
            projection,
            auto_rotate: 0.0,
        };
        camera.update_eye();
        camera
    }

    pub fn reset_to_default(&mut self) {
        self.distance = 8.0;
        self.pitch = 0.4;
        self.yaw = 0.2;
        self.target = Vector3::zero();

        self.update_eye();
    }

    pub fn set_distance(&mut self, distance: f32) {
        // inverted bounds resolve to the maximum
        self.distance = distance
            .max(self.bounds.min_distance.unwrap_or(f32::EPSILON))
            .min(self.bounds.max_distance.unwrap_or(f32::MAX));
        self.update_eye();
    }

    pub fn add_distance(&mut self, delta: f32) {
        let corrected_zoom = f32::log10(self.distance.max(1.0 + f32::EPSILON)) * delta;
        self.set_distance(self.distance + corrected_zoom);
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.clamp(self.bounds.min_pitch, self.bounds.max_pitch);
        self.update_eye();
    }

    pub fn add_pitch(&mut self, delta: f32) {
        self.set_pitch(self.pitch + delta);
    }

    pub fn set_yaw(&mut self, yaw: f32) {
        let mut bounded_yaw = yaw;
        if let Some(min_yaw) = self.bounds.min_yaw {
            bounded_yaw = bounded_yaw.max(min_yaw);
        }
        if let Some(max_yaw) = self.bounds.max_yaw {
            bounded_yaw = bounded_yaw.min(max_yaw);
        }
        self.yaw = bounded_yaw;
        self.update_eye();
    }

    pub fn add_yaw(&mut self, delta: f32) {
        self.set_yaw(self.yaw + delta);
    }

    /// Pans the camera relative to the current view direction
    /// delta.0 = horizontal pan (left/right relative to camera view)
    /// delta.1 = vertical pan (up/down relative to camera view)
    pub fn pan(&mut self, delta: (f32, f32)) {
        let forward = (self.target - self.eye).normalize();
        let right = forward.cross(self.up).normalize();
        let up = right.cross(forward).normalize();

        // Scale by distance for a consistent feel at all zoom levels
        let pan_scale = self.distance * 0.1;
        let movement = right * delta.0 * pan_scale + up * delta.1 * pan_scale;

        // Move both eye and target to maintain the view direction
        self.eye += movement;
        self.target += movement;
    }

    /// Recomputes the eye after changing `distance`, `pitch` or `yaw`.
    fn update_eye(&mut self) {
        self.eye =
            calculate_cartesian_eye_position(self.pitch, self.yaw, self.distance, self.target);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OrbitCameraBounds {
    pub min_distance: Option<f32>,
    pub max_distance: Option<f32>,
    pub min_pitch: f32,
    pub max_pitch: f32,
    pub min_yaw: Option<f32>,
    pub max_yaw: Option<f32>,
}

impl Default for OrbitCameraBounds {
    fn default() -> Self {
        Self {
            min_distance: None,
            max_distance: Some(64.0),
            min_pitch: -std::f32::consts::FRAC_PI_2 + f32::EPSILON,
            max_pitch: std::f32::consts::FRAC_PI_2 - f32::EPSILON,
            min_yaw: None,
            max_yaw: None,
        }
    }
}

fn calculate_cartesian_eye_position(
    pitch: f32,
    yaw: f32,
    distance: f32,
    target: Vector3<f32>,
) -> Vector3<f32> {
    Vector3::new(
        distance * yaw.sin() * pitch.cos(),
        distance * pitch.sin(),
        distance * yaw.cos() * pitch.cos(),
    ) + target
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> OrbitCamera {
        OrbitCamera::new(5.0, 0.0, 0.0, Vector3::zero(), Perspective::default())
    }

    #[test]
    fn test_eye_sits_at_distance_from_target() {
        let cam = camera();
        assert!((cam.eye - Vector3::new(0.0, 0.0, 5.0)).magnitude() < 1e-5);
        assert_eq!(cam.position(), Point3::new(cam.eye.x, cam.eye.y, cam.eye.z));
    }

    #[test]
    fn test_inverted_distance_bounds_resolve_to_maximum() {
        let mut camera = camera();
        camera.bounds.min_distance = Some(80.0);
        camera.bounds.max_distance = Some(64.0);

        camera.set_distance(10.0);
        assert_eq!(camera.distance, 64.0);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut cam = camera();
        cam.set_pitch(10.0);
        assert!(cam.pitch < std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn test_auto_rotate_advances_yaw_by_dt() {
        let mut cam = camera();
        cam.auto_rotate = 2.0;
        cam.update(0.5);
        assert!((cam.yaw - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pan_moves_eye_and_target_together() {
        let mut cam = camera();
        let offset = cam.eye - cam.target;
        cam.pan((1.0, 0.5));
        assert!(((cam.eye - cam.target) - offset).magnitude() < 1e-5);
        assert!(cam.target.magnitude() > 0.0);
    }
}
