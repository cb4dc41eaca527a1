use std::{cell::RefCell, rc::Rc};

use cgmath::{perspective, Deg, Matrix4, Point3, Rad};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.5,
    0.0, 0.0, 0.0, 1.0,
);

/// Camera state read by the uniform uploader every frame
///
/// The application never caches these values across frames; it re-reads the
/// camera each time the camera buffer is uploaded.
pub trait Camera {
    fn view_matrix(&self) -> Matrix4<f32>;

    fn projection_matrix(&self) -> Matrix4<f32>;

    /// World-space eye position
    fn position(&self) -> Point3<f32>;

    /// Recomputes aspect-ratio dependent state for a new viewport.
    fn set_viewport(&mut self, width: u32, height: u32);

    /// Per-frame animation hook, `dt` in seconds.
    fn update(&mut self, _dt: f32) {}

    fn view_projection_matrix(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Camera handle shared between the application and input controllers
pub type SharedCamera = Rc<RefCell<dyn Camera>>;

/// Wraps a concrete camera into a [`SharedCamera`] while keeping a typed
/// handle for whoever needs the concrete API (e.g. an input controller).
pub fn share<C: Camera + 'static>(camera: C) -> (Rc<RefCell<C>>, SharedCamera) {
    let typed = Rc::new(RefCell::new(camera));
    let shared: SharedCamera = typed.clone();
    (typed, shared)
}

/// Perspective projection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perspective {
    pub fovy: Rad<f32>,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Perspective {
    pub fn new(fovy: impl Into<Rad<f32>>, width: u32, height: u32, znear: f32, zfar: f32) -> Self {
        let mut perspective = Self {
            fovy: fovy.into(),
            aspect: 1.0,
            znear,
            zfar,
        };
        perspective.resize(width, height);
        perspective
    }

    /// Updates the aspect ratio. A zero-sized viewport (minimized window)
    /// keeps the previous ratio.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    /// Projection matrix remapped to wgpu's 0..1 depth range
    pub fn matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

impl Default for Perspective {
    fn default() -> Self {
        Self {
            fovy: Deg(45.0).into(),
            aspect: 1.0,
            znear: 0.1,
            zfar: 1000.0,
        }
    }
}

pub fn convert_matrix4_to_array(matrix4: Matrix4<f32>) -> [[f32; 4]; 4] {
    matrix4.into()
}
