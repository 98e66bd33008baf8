#[macro_export]
macro_rules! assert_close {
    ($left:expr, $right:expr, $tolerance:expr) => {
        let left = $left;
        let right = $right;
        let tol = $tolerance;
        let diff = (left - right).abs();
        if diff > tol {
            panic!(
                "assertion failed: {} ~= {} \
                (tolerance: {}, difference: {})",
                left, right, tol, diff
            );
        }
    };
}

#[macro_export]
macro_rules! assert_vec_close {
    ($left:expr, $right:expr, $tolerance:expr) => {
        let left = $left;
        let right = $right;
        let tol = $tolerance;
        for (a, b) in left.iter().zip(right.iter()) {
            $crate::assert_close!(a, b, tol);
        }
    };
}

#[cfg(test)]
pub mod test_utils {
    use na::{vector, Vector3};
    use rand::{rngs::ThreadRng, Rng};

    use crate::types::Float;

    /// Build a Vector3 where each element is random between (-range, range)
    pub fn random_vector(rng: &mut ThreadRng, range: Float) -> Vector3<Float> {
        vector![
            rng.random_range(-range..range),
            rng.random_range(-range..range),
            rng.random_range(-range..range)
        ]
    }
}
