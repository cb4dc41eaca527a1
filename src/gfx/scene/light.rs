//! Point lights owned by the scene

use cgmath::Vector3;

/// Distance falloff `1 / (constant + linear * d + quadratic * d^2)`, cut off
/// at `range`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
    pub range: f32,
}

impl Attenuation {
    /// Classic falloff table values for a light reaching about `range` units.
    pub fn for_range(range: f32) -> Self {
        // fitted to the usual 7..3250 table
        let range = range.max(f32::EPSILON);
        Self {
            constant: 1.0,
            linear: 4.5 / range,
            quadratic: 75.0 / (range * range),
            range,
        }
    }

    /// No falloff at all
    pub fn none() -> Self {
        Self {
            constant: 1.0,
            linear: 0.0,
            quadratic: 0.0,
            range: f32::MAX,
        }
    }
}

impl Default for Attenuation {
    fn default() -> Self {
        Self::for_range(50.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vector3<f32>,
    pub color: [f32; 3],
    pub intensity: f32,
    pub attenuation: Attenuation,
}

impl PointLight {
    pub fn new(position: Vector3<f32>, color: [f32; 3], intensity: f32) -> Self {
        Self {
            position,
            color,
            intensity,
            attenuation: Attenuation::default(),
        }
    }

    pub fn with_attenuation(mut self, attenuation: Attenuation) -> Self {
        self.attenuation = attenuation;
        self
    }
}

impl Default for PointLight {
    fn default() -> Self {
        Self::new(Vector3::new(5.0, 10.0, 5.0), [1.0, 1.0, 1.0], 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attenuation_for_range() {
        let att = Attenuation::for_range(50.0);
        assert_eq!(att.constant, 1.0);
        assert!((att.linear - 0.09).abs() < 1e-6);
        assert!((att.quadratic - 0.03).abs() < 1e-6);
        assert_eq!(att.range, 50.0);
    }

    #[test]
    fn test_zero_range_does_not_divide_by_zero() {
        let att = Attenuation::for_range(0.0);
        assert!(att.linear.is_finite());
        assert!(att.quadratic.is_finite());
    }
}
