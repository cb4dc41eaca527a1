use std::{cell::RefCell, rc::Rc};

use winit::{
    dpi::PhysicalPosition,
    event::{DeviceEvent, ElementState, KeyEvent, MouseScrollDelta},
    keyboard::{KeyCode, PhysicalKey},
};

use super::orbit_camera::OrbitCamera;

/// Turns raw input into orbit camera motion
///
/// Holds its own handle to the camera; the application holds another and
/// re-reads the camera state every frame.
pub struct CameraController {
    camera: Rc<RefCell<OrbitCamera>>,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    is_shift_held: bool,
    is_mouse_pressed: bool,
}

impl CameraController {
    pub fn new(camera: Rc<RefCell<OrbitCamera>>, rotate_speed: f32, zoom_speed: f32) -> Self {
        Self {
            camera,
            rotate_speed,
            zoom_speed,
            pan_speed: 0.01,
            is_shift_held: false,
            is_mouse_pressed: false,
        }
    }

    /// Returns true when the event changed the camera.
    pub fn process_device_event(&mut self, event: &DeviceEvent) -> bool {
        match event {
            DeviceEvent::Button {
                button: 0, // Left Mouse Button
                state,
            } => {
                self.is_mouse_pressed = *state == ElementState::Pressed;
                false
            }
            DeviceEvent::MouseWheel { delta } => {
                let scroll_amount = -match delta {
                    MouseScrollDelta::LineDelta(_, scroll) => *scroll,
                    MouseScrollDelta::PixelDelta(PhysicalPosition { y: scroll, .. }) => {
                        *scroll as f32
                    }
                };
                self.camera
                    .borrow_mut()
                    .add_distance(scroll_amount * self.zoom_speed);
                true
            }
            DeviceEvent::MouseMotion { delta } if self.is_mouse_pressed => {
                let mut camera = self.camera.borrow_mut();
                if self.is_shift_held {
                    camera.pan((
                        -delta.0 as f32 * self.pan_speed,
                        delta.1 as f32 * self.pan_speed,
                    ));
                } else {
                    camera.add_yaw(-delta.0 as f32 * self.rotate_speed);
                    camera.add_pitch(delta.1 as f32 * self.rotate_speed);
                }
                true
            }
            _ => false,
        }
    }

    /// Returns true when the event changed the camera.
    pub fn process_key_event(&mut self, event: &KeyEvent) -> bool {
        match event.physical_key {
            PhysicalKey::Code(KeyCode::ShiftLeft | KeyCode::ShiftRight) => {
                self.is_shift_held = event.state == ElementState::Pressed;
                false
            }
            PhysicalKey::Code(KeyCode::KeyC)
                if event.state == ElementState::Pressed && self.is_shift_held =>
            {
                log::info!("Resetting camera to default position");
                self.camera.borrow_mut().reset_to_default();
                true
            }
            _ => false,
        }
    }

    /// Returns true if currently panning
    pub fn is_panning(&self) -> bool {
        self.is_mouse_pressed && self.is_shift_held
    }

    /// Returns true if currently rotating
    pub fn is_rotating(&self) -> bool {
        self.is_mouse_pressed && !self.is_shift_held
    }

    /// Adjust panning sensitivity
    pub fn set_pan_speed(&mut self, speed: f32) {
        self.pan_speed = speed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::camera::camera_utils::Perspective;
    use cgmath::{Vector3, Zero};

    fn controller() -> (Rc<RefCell<OrbitCamera>>, CameraController) {
        let camera = Rc::new(RefCell::new(OrbitCamera::new(
            5.0,
            0.0,
            0.0,
            Vector3::zero(),
            Perspective::default(),
        )));
        let controller = CameraController::new(camera.clone(), 0.01, 0.1);
        (camera, controller)
    }

    #[test]
    fn test_motion_without_button_is_ignored() {
        let (camera, mut controller) = controller();
        let moved = controller.process_device_event(&DeviceEvent::MouseMotion { delta: (10.0, 0.0) });
        assert!(!moved);
        assert_eq!(camera.borrow().yaw, 0.0);
    }

    #[test]
    fn test_drag_rotates_shared_camera() {
        let (camera, mut controller) = controller();
        controller.process_device_event(&DeviceEvent::Button {
            button: 0,
            state: ElementState::Pressed,
        });
        assert!(controller.is_rotating());

        let moved = controller.process_device_event(&DeviceEvent::MouseMotion { delta: (10.0, 0.0) });
        assert!(moved);
        assert!((camera.borrow().yaw + 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_wheel_zooms() {
        let (camera, mut controller) = controller();
        controller.process_device_event(&DeviceEvent::MouseWheel {
            delta: MouseScrollDelta::LineDelta(0.0, 1.0),
        });
        assert!(camera.borrow().distance < 5.0);
    }
}
