//! 4x4 matrix helpers
//!
//! Column-major (OpenGL convention): element (row, col) lives at `col * 4 + row`

pub type Mat4 = [f32; 16];

pub const IDENTITY: Mat4 = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Rotation about the Z axis (degrees, counter-clockwise)
pub fn z_rotation(degrees: f32) -> Mat4 {
    let (s, c) = degrees.to_radians().sin_cos();
    let mut m = IDENTITY;
    m[0] = c;
    m[1] = s;
    m[4] = -s;
    m[5] = c;
    m
}

/// Axis-aligned scale
pub fn scale(x: f32, y: f32, z: f32) -> Mat4 {
    let mut m = IDENTITY;
    m[0] = x;
    m[5] = y;
    m[10] = z;
    m
}

/// Matrix product `a * b`
pub fn multiply(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut p = [0.0; 16];
    for row in 0..4 {
        for col in 0..4 {
            p[col * 4 + row] = (0..4).map(|k| a[k * 4 + row] * b[col * 4 + k]).sum();
        }
    }
    p
}

/// Apply to a point (x, y, z, 1)
pub fn transform_point(m: &Mat4, p: [f32; 3]) -> [f32; 4] {
    let v = [p[0], p[1], p[2], 1.0];
    let mut out = [0.0; 4];
    for (row, o) in out.iter_mut().enumerate() {
        *o = (0..4).map(|k| m[k * 4 + row] * v[k]).sum();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: &[f32], b: &[f32]) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    #[test]
    fn test_zero_rotation_is_identity() {
        assert!(approx(&z_rotation(0.0), &IDENTITY));
    }

    #[test]
    fn test_quarter_turn() {
        let p = transform_point(&z_rotation(90.0), [1.0, 0.0, 0.0]);
        assert!(approx(&p, &[0.0, 1.0, 0.0, 1.0]));
    }

    #[test]
    fn test_multiply_identity() {
        let s = scale(0.5, 0.5, 0.5);
        assert!(approx(&multiply(&IDENTITY, &s), &s));
        assert!(approx(&multiply(&s, &IDENTITY), &s));
    }

    #[test]
    fn test_rotate_then_scale_order() {
        // rot * scale applied to a point scales first, then rotates
        let m = multiply(&z_rotation(90.0), &scale(2.0, 1.0, 1.0));
        let p = transform_point(&m, [1.0, 0.0, 0.0]);
        assert!(approx(&p, &[0.0, 2.0, 0.0, 1.0]));
    }

    #[test]
    fn test_not_commutative() {
        let a = multiply(&z_rotation(30.0), &scale(2.0, 1.0, 1.0));
        let b = multiply(&scale(2.0, 1.0, 1.0), &z_rotation(30.0));
        assert!(!approx(&a, &b));
    }
}
