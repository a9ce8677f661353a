use rand::Rng;
use std::f64;
use std::f64::consts::PI;
use std::ops;

fn float_equals(x: f64, y: f64) -> bool {
    (x - y).abs() < f64::EPSILON
}

#[derive(Debug, Copy, Clone)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Quaternion {
        Quaternion { w, x, y, z }
    }

    pub fn conjugate(&self) -> Quaternion {
        Quaternion::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn dot(&self, other: Quaternion) -> f64 {
        self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn norm2(&self) -> f64 {
        self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn norm(&self) -> f64 {
        self.norm2().sqrt()
    }

    pub fn normalize(&mut self) {
        let norm = self.norm();
        self.w /= norm;
        self.x /= norm;
        self.y /= norm;
        self.z /= norm;
    }

    pub fn inverse(&self) -> Quaternion {
        self.conjugate() / self.norm2()
    }

    pub fn rotate(&self, vec3: [f64; 3]) -> [f64; 3] {
        let v = Quaternion::new(0., vec3[0], vec3[1], vec3[2]);
        let r = *self * v * self.inverse();
        [r.x, r.y, r.z]
    }

    /// Equivalent rotation matrix. `m * v == q.rotate(v)` for a unit
    /// quaternion.
    pub fn to_matrix(&self) -> [[f64; 3]; 3] {
        let (w, x, y, z) = (self.w, self.x, self.y, self.z);
        [
            [
                1.0 - 2.0 * (y * y + z * z),
                2.0 * (x * y - w * z),
                2.0 * (x * z + w * y),
            ],
            [
                2.0 * (x * y + w * z),
                1.0 - 2.0 * (x * x + z * z),
                2.0 * (y * z - w * x),
            ],
            [
                2.0 * (x * z - w * y),
                2.0 * (y * z + w * x),
                1.0 - 2.0 * (x * x + y * y),
            ],
        ]
    }

    /// Uniformly distributed unit quaternion (Shoemake's method).
    pub fn random(rng: &mut rand::prelude::StdRng) -> Quaternion {
        let u1 = rng.gen::<f64>();
        let u2 = rng.gen::<f64>();
        let u3 = rng.gen::<f64>();
        Quaternion::new(
            (1.0 - u1).sqrt() * (2.0 * PI * u2).sin(),
            (1.0 - u1).sqrt() * (2.0 * PI * u2).cos(),
            u1.sqrt() * (2.0 * PI * u3).sin(),
            u1.sqrt() * (2.0 * PI * u3).cos(),
        )
    }
}

impl Default for Quaternion {
    fn default() -> Quaternion {
        Quaternion {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

impl ops::Sub for Quaternion {
    type Output = Self;

    fn sub(self, other: Quaternion) -> Self::Output {
        Quaternion::new(
            self.w - other.w,
            self.x - other.x,
            self.y - other.y,
            self.z - other.z,
        )
    }
}

impl ops::Add for Quaternion {
    type Output = Self;

    fn add(self, other: Quaternion) -> Self::Output {
        Quaternion::new(
            self.w + other.w,
            self.x + other.x,
            self.y + other.y,
            self.z + other.z,
        )
    }
}

impl PartialEq for Quaternion {
    fn eq(&self, other: &Self) -> bool {
        float_equals(self.w, other.w)
            && float_equals(self.x, other.x)
            && float_equals(self.y, other.y)
            && float_equals(self.z, other.z)
    }
}
impl Eq for Quaternion {}

impl ops::Neg for Quaternion {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Quaternion::new(-self.w, -self.x, -self.y, -self.z)
    }
}

impl ops::Mul<f64> for Quaternion {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Quaternion::new(
            scalar * self.w,
            scalar * self.x,
            scalar * self.y,
            scalar * self.z,
        )
    }
}

impl ops::Mul for Quaternion {
    type Output = Self;

    fn mul(self, other: Quaternion) -> Self::Output {
        Quaternion::new(
            self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
            self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
        )
    }
}

impl ops::Div<f64> for Quaternion {
    type Output = Self;

    fn div(self, scalar: f64) -> Self::Output {
        Quaternion::new(
            self.w / scalar,
            self.x / scalar,
            self.y / scalar,
            self.z / scalar,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quaternion_default() {
        let q1: Quaternion = Default::default();
        assert_eq!(q1.w, 1.0);
        assert_eq!(q1.x, 0.0);
        assert_eq!(q1.y, 0.0);
        assert_eq!(q1.z, 0.0);
    }

    #[test]
    fn quaternion_sub() {
        let q1 = Quaternion::new(2.0, 0.0, 2.0, 0.0);
        let q2 = Quaternion::new(1.0, 0.0, 2.0, 1.0);
        let q3 = q1 - q2;
        assert_eq!(q3.w, 1.0);
        assert_eq!(q3.x, 0.0);
        assert_eq!(q3.y, 0.0);
        assert_eq!(q3.z, -1.0);
    }

    #[test]
    fn quaternion_add() {
        let q1 = Quaternion::new(2.0, -1.0, 2.0, 0.0);
        let q2 = Quaternion::new(1.0, 0.0, 2.0, 1.0);
        let q3 = q1 + q2;
        assert_eq!(q3.w, 3.0);
        assert_eq!(q3.x, -1.0);
        assert_eq!(q3.y, 4.0);
        assert_eq!(q3.z, 1.0);
    }

    #[test]
    fn quaternion_eq() {
        let q1: Quaternion = Default::default();
        let q2: Quaternion = Default::default();
        assert!(q1 == q2);
        let q3: Quaternion = Default::default();
        let q4: Quaternion = Quaternion::new(1.000000000000001, 0.0, 0.0, 0.0);
        assert!(q3 != q4);
    }

    #[test]
    fn quaternion_neg() {
        let q1 = Quaternion::new(2.0, -1.0, 2.0, 0.0);
        let q2 = Quaternion::new(-2.0, 1.0, -2.0, 0.0);
        assert!(q2 == -q1);
    }

    #[test]
    fn quaternion_mul_scalar() {
        let q1 = Quaternion::new(2.0, -1.0, 2.0, 0.0);
        let q2 = Quaternion::new(1.0, -0.5, 1.0, 0.0);
        assert!(q2 == q1 * 0.5);
    }

    #[test]
    fn quaternion_conjugate() {
        let q1 = Quaternion::new(2.0, -1.0, 2.0, 0.0);
        let q2 = Quaternion::new(2.0, 1.0, -2.0, 0.0);
        assert!(q2 == q1.conjugate());
    }

    #[test]
    fn quaternion_mul() {
        let q1 = Quaternion::new(1.0, 0.0, 0.0, 2.0);
        let q2 = Quaternion::new(3.0, -1.0, 4.0, 3.0);
        let expected = Quaternion::new(-3.0, -9.0, 2.0, 9.0);
        assert!(expected == q1 * q2);

        let expected = Quaternion::new(-3.0, 7.0, 6.0, 9.0);
        assert!(expected == q2 * q1);
    }

    #[test]
    fn test_conjugate_and_multiplication() {
        let q1 = Quaternion::new(1.0, 0.0, 0.0, 2.0);
        let q2 = Quaternion::new(3.0, -1.0, 4.0, 3.0);
        let expected = Quaternion::new(35.0, 0.0, 0.0, 0.0);
        assert!((q1 * q2).conjugate() == q2.conjugate() * q1.conjugate());
        assert!(expected == q2.conjugate() * q2);
    }

    #[test]
    fn test_norm() {
        let q1 = Quaternion::new(1.0, -3.0, 4.0, 3.0);
        let q2 = Quaternion::new(3.0, -1.0, 4.0, 3.0);
        assert_eq!(5.916079783099616, q1.norm());
        assert_eq!((q1 * q2).norm(), q1.norm() * q2.norm());
    }

    #[test]
    fn test_normalize() {
        let mut q1 = Quaternion::new(1.0, -3.0, 4.0, 3.0);
        let expected = Quaternion::new(
            0.1690308509457033,
            -0.50709255283711,
            0.6761234037828132,
            0.50709255283711,
        );
        q1.normalize();
        assert!(expected == q1);
    }

    #[test]
    fn test_inverse() {
        let q1 = Quaternion::new(1.0, 0.0, 0.0, 2.0);
        let q2 = Quaternion::new(3.0, -1.0, 4.0, 3.0);
        let expected = Quaternion::new(-3.0 / 175.0, 9.0 / 175.0, -2.0 / 175.0, -9.0 / 175.0);
        assert!(expected == (q1 * q2).inverse());
    }

    #[test]
    fn test_rotation() {
        let q = Quaternion::new(0.707106781, 0.0, 0.707106781, 0.0);
        let v = q.rotate([1.0, 0.0, 0.0]);
        assert_eq!(0.0, v[0]);
        assert_eq!(0.0, v[1]);
        assert_eq!(-1.0, v[2]);
    }

    #[test]
    fn test_matrix_matches_rotate() {
        use rand::SeedableRng;
        let mut rng = SeedableRng::seed_from_u64(324_324);
        for _ in 0..10 {
            let q = Quaternion::random(&mut rng);
            let m = q.to_matrix();
            let v = [0.3, -1.2, 2.5];
            let rv = q.rotate(v);
            for i in 0..3 {
                let mv = m[i][0] * v[0] + m[i][1] * v[1] + m[i][2] * v[2];
                assert!((mv - rv[i]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_matrix_is_orthonormal() {
        use rand::SeedableRng;
        let mut rng = SeedableRng::seed_from_u64(42);
        let q = Quaternion::random(&mut rng);
        let m = q.to_matrix();
        for i in 0..3 {
            for j in 0..3 {
                let dot: f64 = (0..3).map(|k| m[i][k] * m[j][k]).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_random_quaternion() {
        use rand::SeedableRng;
        let mut rng = SeedableRng::seed_from_u64(324324324);
        let q = Quaternion::random(&mut rng);

        let expected = Quaternion::new(
            0.31924330894562036,
            -0.5980633213833059,
            0.5444724265858514,
            0.49391674399349367,
        );
        assert!(expected == q);
    }
}
