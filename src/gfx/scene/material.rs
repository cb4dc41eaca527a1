/// Blinn-Phong surface parameters for a renderable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlinnPhongMaterial {
    pub diffuse: [f32; 3],
    /// Specular exponent
    pub shininess: f32,
}

impl BlinnPhongMaterial {
    pub fn new(diffuse: [f32; 3], shininess: f32) -> Self {
        Self {
            diffuse,
            shininess: shininess.max(1.0),
        }
    }

    /// Packs the material the way the instance vertex attribute expects it.
    pub fn packed(&self) -> [f32; 4] {
        [
            self.diffuse[0],
            self.diffuse[1],
            self.diffuse[2],
            self.shininess,
        ]
    }
}

impl Default for BlinnPhongMaterial {
    fn default() -> Self {
        Self::new([0.8, 0.8, 0.8], 32.0)
    }
}
