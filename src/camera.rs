//! Debug viewpoint that follows a body.

use na::{vector, Vector3};

use crate::engine::{BodyId, EngineError, PhysicsEngine};
use crate::types::Float;

pub const CAMERA_DISTANCE: Float = 2.5;
pub const CAMERA_YAW_DEG: Float = 60.0;
pub const CAMERA_PITCH_DEG: Float = -25.0;

/// Orbit pose of the debug viewport around a target point.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct CameraView {
    pub distance: Float,
    pub yaw_deg: Float,
    pub pitch_deg: Float,
    pub target: Vector3<Float>,
}

impl CameraView {
    pub fn centered_on(target: Vector3<Float>) -> Self {
        CameraView {
            distance: CAMERA_DISTANCE,
            yaw_deg: CAMERA_YAW_DEG,
            pitch_deg: CAMERA_PITCH_DEG,
            target,
        }
    }

    /// Eye position implied by the orbit parameters, z-up convention.
    pub fn eye(&self) -> Vector3<Float> {
        let yaw = self.yaw_deg.to_radians();
        let pitch = self.pitch_deg.to_radians();
        let planar = self.distance * pitch.cos();
        self.target
            + vector![
                planar * yaw.cos(),
                planar * yaw.sin(),
                -self.distance * pitch.sin()
            ]
    }
}

/// Re-center the debug camera on the body. Called unconditionally every tick.
pub fn track_body<E: PhysicsEngine>(engine: &mut E, body: BodyId) -> Result<(), EngineError> {
    let focus = engine.base_position(body)?;
    engine.reset_debug_camera(&CameraView::centered_on(focus));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_close;

    #[test]
    fn eye_sits_at_the_configured_distance() {
        let view = CameraView::centered_on(vector![1.0, -2.0, 0.5]);
        let eye = view.eye();
        assert_close!((eye - view.target).norm(), CAMERA_DISTANCE, 1e-5);
    }

    #[test]
    fn negative_pitch_looks_down_from_above() {
        let view = CameraView::centered_on(vector![0.0, 0.0, 0.0]);
        assert!(view.eye().z > 0.0);
    }

    #[test]
    fn recentering_is_idempotent() {
        let target = vector![0.3, 0.3, 0.0];
        assert_eq!(
            CameraView::centered_on(target),
            CameraView::centered_on(target)
        );
    }
}
