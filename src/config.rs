use na::{vector, Vector3};

use crate::types::Float;

/// Parameters of the reach-and-touch task.
///
/// Defaults reproduce the reference scenario: a 5 second run at 100 Hz, the
/// hand offset slightly to the side of and above the object, and slow
/// position-controlled motion.
#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Total simulated time, in seconds.
    pub sim_duration: Float,
    /// Fixed timestep, in seconds.
    pub dt: Float,
    /// Offset from the object center to the commanded end-effector position.
    pub target_offset: Vector3<Float>,
    /// Joint used as the inverse-kinematics tip.
    pub ee_joint_index: usize,
    /// Target joint velocity for smooth motion.
    pub target_velocity: Float,
    pub position_gain: Float,
    pub velocity_gain: Float,
    /// Maximum force each joint motor may apply.
    pub max_motor_force: Float,
    /// Sleep one timestep per tick so the debug view plays back in real time.
    pub real_time: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            sim_duration: 5.0,
            dt: 0.01,
            target_offset: vector![-0.05, -0.05, 0.10],
            ee_joint_index: 6,
            target_velocity: 0.05,
            position_gain: 0.2,
            velocity_gain: 1.0,
            max_motor_force: 3000.0,
            real_time: true,
        }
    }
}

impl SimConfig {
    /// Number of simulation ticks for the configured duration and timestep,
    /// rounding partial ticks up.
    pub fn num_steps(&self) -> usize {
        let steps = self.sim_duration / self.dt;
        // tolerate one part in 1e4 of binary-float division error before
        // rounding a whole quotient up
        (steps * (1.0 - 1e-4)).ceil() as usize
    }
}
