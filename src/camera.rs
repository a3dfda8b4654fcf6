use glam::{Mat3, Mat4, Vec3};
use thiserror::Error;

/// Right-handed perspective camera with +Y as the world up axis.
///
/// The following transforms points from local space to clip space:
///  `V_clip = M_projection * M_view * M_model * M_local`
///
/// Projection matrices map view depth into the `[0, 1]` range expected by
/// WebGPU clip space.
#[derive(Clone, Debug)]
pub struct Camera {
    /// The position of the camera in world space.
    eye: Vec3,
    /// The position the camera looks at.
    target: Vec3,
    /// The camera's up direction, orthogonal to the view direction.
    up: Vec3,
    /// Direction considered to be straight up in world space.
    world_up: Vec3,
    /// Viewport width divided by viewport height.
    aspect: f32,
    /// The vertical field of view in radians.
    fov_y: f32,
    z_near: f32,
    z_far: f32,
}

impl Camera {
    /// Create a new camera at `eye` looking at `target`.
    pub fn new(
        eye: Vec3,
        target: Vec3,
        fov_y: f32,
        z_near: f32,
        z_far: f32,
        viewport_width: u32,
        viewport_height: u32,
    ) -> Self {
        assert!(fov_y > 0.0);
        assert!(z_near > 0.0);
        assert!(z_far > z_near);
        assert!(eye != target);

        let mut camera = Self {
            eye,
            target,
            up: Vec3::Y,
            world_up: Vec3::Y,
            aspect: 1.0,
            fov_y,
            z_near,
            z_far,
        };

        camera.reorient(eye, target);
        camera
            .set_viewport_size(viewport_width, viewport_height)
            .unwrap_or_default();

        camera
    }

    /// Move the camera to `new_eye` and look at `new_target`, rebuilding the
    /// camera's up vector from the world up axis.
    pub fn reorient(&mut self, new_eye: Vec3, new_target: Vec3) {
        self.eye = new_eye;
        self.target = new_target;

        // Points from the target back to the eye, the view space +Z axis.
        let back = (self.eye - self.target).normalize();
        let right = self.world_up.cross(back);

        // Looking straight along the world up axis leaves the previous up
        // vector as the best available choice.
        if right.length_squared() > f32::EPSILON {
            self.up = back.cross(right.normalize());
        }
    }

    /// Get the camera's view matrix which transforms world space to view space.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Get the view matrix with translation removed, used for drawing geometry
    /// at infinity such as a skybox.
    pub fn rotation_only_view_matrix(&self) -> Mat4 {
        Mat4::from_mat3(Mat3::from_mat4(self.view_matrix()))
    }

    /// Get the camera's perspective projection matrix.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far)
    }

    /// Get the matrix transforming world space points to clip space.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Resize the camera's viewport.
    pub fn set_viewport_size(
        &mut self,
        new_width: u32,
        new_height: u32,
    ) -> Result<(), InvalidCameraSize> {
        if new_width > 0 && new_height > 0 {
            self.aspect = new_width as f32 / new_height as f32;
            Ok(())
        } else {
            Err(InvalidCameraSize(new_width, new_height))
        }
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }
}

#[derive(Debug, Error)]
#[error("camera viewport width and height must be larger than zero but width was {} and height was {}", .0, .1)]
pub struct InvalidCameraSize(u32, u32);

/// Orbits a camera around its target with mouse drags and zooms with the
/// scroll wheel.
#[derive(Clone, Debug)]
pub struct OrbitController {
    /// Horizontal angle around the target in radians.
    yaw: f32,
    /// Vertical angle above the target's horizon in radians.
    pitch: f32,
    distance: f32,
    is_dragging: bool,
}

impl OrbitController {
    const RADIANS_PER_PIXEL: f32 = 0.005;
    const ZOOM_PER_LINE: f32 = 0.5;
    const MIN_DISTANCE: f32 = 1.0;
    const MAX_DISTANCE: f32 = 50.0;
    const MAX_PITCH: f32 = 1.5;

    /// Create a controller matching the camera's current placement.
    pub fn new(camera: &Camera) -> Self {
        let offset = camera.eye() - camera.target();
        let distance = offset
            .length()
            .clamp(Self::MIN_DISTANCE, Self::MAX_DISTANCE);

        Self {
            yaw: offset.x.atan2(offset.z),
            pitch: (offset.y / offset.length()).asin(),
            distance,
            is_dragging: false,
        }
    }

    pub fn set_dragging(&mut self, is_dragging: bool) {
        self.is_dragging = is_dragging;
    }

    /// Rotate around the target while the mouse is being dragged.
    pub fn mouse_motion(&mut self, delta_x: f64, delta_y: f64) {
        if self.is_dragging {
            self.yaw -= delta_x as f32 * Self::RADIANS_PER_PIXEL;
            self.pitch = (self.pitch + delta_y as f32 * Self::RADIANS_PER_PIXEL)
                .clamp(-Self::MAX_PITCH, Self::MAX_PITCH);
        }
    }

    /// Move towards (positive) or away from (negative) the target.
    pub fn scroll(&mut self, lines: f32) {
        self.distance = (self.distance - lines * Self::ZOOM_PER_LINE)
            .clamp(Self::MIN_DISTANCE, Self::MAX_DISTANCE);
    }

    /// Place the camera at the controller's orbit position.
    pub fn update_camera(&self, camera: &mut Camera) {
        let offset = Vec3::new(
            self.pitch.cos() * self.yaw.sin(),
            self.pitch.sin(),
            self.pitch.cos() * self.yaw.cos(),
        ) * self.distance;

        camera.reorient(camera.target() + offset, camera.target());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_camera() -> Camera {
        Camera::new(
            Vec3::new(0.0, 0.0, 3.0),
            Vec3::ZERO,
            f32::to_radians(45.0),
            0.1,
            100.0,
            100,
            200,
        )
    }

    #[test]
    fn set_valid_viewport_size() {
        let mut camera = test_camera();
        assert_eq!(0.5, camera.aspect());

        assert!(camera.set_viewport_size(600, 300).is_ok());
        assert_eq!(2.0, camera.aspect());
    }

    #[test]
    fn set_invalid_viewport_size() {
        let mut camera = test_camera();

        let err = camera.set_viewport_size(0, 100).unwrap_err();
        assert_eq!(0, err.0);
        assert_eq!(100, err.1);

        let err = camera.set_viewport_size(600, 0).unwrap_err();
        assert_eq!(600, err.0);
        assert_eq!(0, err.1);

        // Failed resizes leave the previous aspect ratio in place.
        assert_eq!(0.5, camera.aspect());
    }

    #[test]
    fn target_projects_to_screen_center() {
        let camera = test_camera();
        let clip = camera.view_projection_matrix() * camera.target().extend(1.0);
        let ndc = clip.truncate() / clip.w;

        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn rotation_only_view_ignores_eye_position() {
        let mut camera = test_camera();
        let before = camera.rotation_only_view_matrix();

        camera.reorient(Vec3::new(0.0, 0.0, 30.0), Vec3::new(0.0, 0.0, 27.0));
        let after = camera.rotation_only_view_matrix();

        assert!(before.abs_diff_eq(after, 1e-6));
        assert_eq!(Vec3::ZERO, after.w_axis.truncate());
    }

    #[test]
    fn reorient_keeps_up_orthogonal() {
        let mut camera = test_camera();
        camera.reorient(Vec3::new(3.0, 4.0, 5.0), Vec3::ZERO);

        let forward = (camera.target() - camera.eye()).normalize();
        assert!(forward.dot(camera.up()).abs() < 1e-5);
        assert!(camera.up().y > 0.0);
    }

    #[test]
    fn orbit_controller_preserves_distance() {
        let mut camera = test_camera();
        let mut controller = OrbitController::new(&camera);

        controller.set_dragging(true);
        controller.mouse_motion(120.0, -40.0);
        controller.update_camera(&mut camera);

        assert!((camera.eye().length() - 3.0).abs() < 1e-4);
        assert_ne!(Vec3::new(0.0, 0.0, 3.0), camera.eye());
    }

    #[test]
    fn orbit_controller_ignores_motion_without_drag() {
        let mut camera = test_camera();
        let mut controller = OrbitController::new(&camera);

        controller.mouse_motion(500.0, 500.0);
        controller.update_camera(&mut camera);

        assert!(camera.eye().abs_diff_eq(Vec3::new(0.0, 0.0, 3.0), 1e-5));
    }

    #[test]
    fn orbit_zoom_is_clamped() {
        let mut camera = test_camera();
        let mut controller = OrbitController::new(&camera);

        controller.scroll(1000.0);
        controller.update_camera(&mut camera);
        assert!((camera.eye().length() - OrbitController::MIN_DISTANCE).abs() < 1e-4);

        controller.scroll(-1000.0);
        controller.update_camera(&mut camera);
        assert!((camera.eye().length() - OrbitController::MAX_DISTANCE).abs() < 1e-3);
    }
}
