//! Narrow interface onto the physics backend.
//!
//! The control loop only needs a handful of capabilities: advance time, read
//! poses and joint state, solve inverse kinematics, drive joint motors, query
//! contacts, and poke the debug view. Everything else the backend does stays
//! behind this boundary, so the orchestration can run against a scripted
//! engine in tests.

use na::Vector3;
use thiserror::Error;

use crate::camera::CameraView;
use crate::types::Float;

pub mod rapier;

/// Opaque reference to a body (or articulated model) owned by the backend.
///
/// Handles are only ever produced by the backend; the orchestration passes
/// them back unchanged.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BodyId(pub(crate) u32);

/// Per-joint position command. Issued every tick, never retained.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct JointCommand {
    pub target_angle: Float,
    pub target_velocity: Float,
    pub position_gain: Float,
    pub velocity_gain: Float,
    pub max_force: Float,
}

/// A touch between two bodies at a simulation instant.
#[derive(Clone, PartialEq, Debug)]
pub struct ContactPoint {
    /// Contact location in world coordinates.
    pub location: Vector3<Float>,
}

/// Debug color attached to a body, RGBA in [0, 1].
pub type Rgba = [Float; 4];

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unknown body handle {0:?}")]
    UnknownBody(BodyId),
    #[error("body {0:?} is not an articulated model")]
    NotArticulated(BodyId),
    #[error("body {0:?} has no joint with index {1}")]
    UnknownJoint(BodyId, usize),
    #[error("IK solver produced {solved} angles for a {joints}-joint arm")]
    ArityMismatch { solved: usize, joints: usize },
    #[error("joint chain rejected by the backend at `{0}`")]
    InvalidChain(String),
}

pub trait PhysicsEngine {
    /// Advance the world by one fixed timestep.
    fn step_simulation(&mut self);

    /// World position of the body base.
    fn base_position(&self, body: BodyId) -> Result<Vector3<Float>, EngineError>;

    /// Number of joints on the body. Zero for plain rigid bodies.
    fn num_joints(&self, body: BodyId) -> Result<usize, EngineError>;

    fn joint_name(&self, body: BodyId, joint: usize) -> Result<String, EngineError>;

    /// Current angle of one joint, in radians.
    fn joint_angle(&self, body: BodyId, joint: usize) -> Result<Float, EngineError>;

    /// Solve inverse kinematics so that `ee_joint` reaches `target`.
    /// Returns one target angle per joint of the body.
    fn solve_ik(
        &mut self,
        body: BodyId,
        ee_joint: usize,
        target: &Vector3<Float>,
    ) -> Result<Vec<Float>, EngineError>;

    /// Issue a position command to one joint motor.
    fn command_joint(
        &mut self,
        body: BodyId,
        joint: usize,
        command: &JointCommand,
    ) -> Result<(), EngineError>;

    /// Contact points currently active between two bodies.
    fn contact_points(
        &self,
        a: BodyId,
        b: BodyId,
    ) -> Result<Vec<ContactPoint>, EngineError>;

    fn set_body_color(&mut self, body: BodyId, color: Rgba) -> Result<(), EngineError>;

    /// Re-center the debug viewport.
    fn reset_debug_camera(&mut self, view: &CameraView);

    /// Release the backend. Safe to call more than once; later calls are
    /// no-ops.
    fn disconnect(&mut self);
}
