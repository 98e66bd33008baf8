/// Scalar type used throughout the crate.
///
/// Kept at f32 to match the native precision of the physics backend.
pub type Float = f32;
