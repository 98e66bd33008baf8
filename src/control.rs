//! Reach-and-touch control loop.
//!
//! The only stateful process in the crate: it owns the trajectory buffers
//! and the contact flag for the duration of the run, then hands the buffers
//! off read-only to visualization and export.

use std::thread;
use std::time::Duration;

use na::DVector;
use tracing::info;

use crate::camera;
use crate::config::SimConfig;
use crate::engine::{BodyId, EngineError, JointCommand, PhysicsEngine};
use crate::setup::{OBJECT_BASE_COLOR, OBJECT_CONTACT_COLOR};
use crate::types::Float;

/// Joint-angle time series recorded over a run.
///
/// `times` and `angles` grow in lockstep, one entry per tick.
pub struct Trajectory {
    pub times: Vec<Float>,
    pub angles: Vec<DVector<Float>>,
}

impl Trajectory {
    pub fn with_capacity(num_steps: usize) -> Self {
        Trajectory {
            times: Vec::with_capacity(num_steps),
            angles: Vec::with_capacity(num_steps),
        }
    }

    pub fn num_ticks(&self) -> usize {
        self.times.len()
    }

    pub fn num_joints(&self) -> usize {
        self.angles.first().map_or(0, |row| row.len())
    }

    /// Angle history of a single joint.
    pub fn joint_series(&self, joint: usize) -> Vec<Float> {
        self.angles.iter().map(|row| row[joint]).collect()
    }

    fn push(&mut self, t: Float, snapshot: DVector<Float>) {
        self.times.push(t);
        self.angles.push(snapshot);
    }
}

/// Drive the arm toward the offset object position for the configured
/// duration, recording joint angles every tick.
pub fn run_simulation<E: PhysicsEngine>(
    engine: &mut E,
    robot: BodyId,
    object: BodyId,
    config: &SimConfig,
) -> Result<Trajectory, EngineError> {
    let num_steps = config.num_steps();
    let num_joints = engine.num_joints(robot)?;
    let mut trajectory = Trajectory::with_capacity(num_steps);
    let mut contact = false;

    for step in 0..num_steps {
        engine.step_simulation();
        if config.real_time {
            // pacing for the debug view, not a correctness requirement
            thread::sleep(Duration::from_secs_f64(config.dt as f64));
        }
        let t = (step + 1) as Float * config.dt;

        camera::track_body(engine, robot)?;

        let object_position = engine.base_position(object)?;
        let target = object_position + config.target_offset;

        let target_angles = engine.solve_ik(robot, config.ee_joint_index, &target)?;

        let touches = engine.contact_points(robot, object)?;
        if let Some(first) = touches.first() {
            if !contact {
                info!("contact detected at {:?}", first.location);
                engine.set_body_color(object, OBJECT_CONTACT_COLOR)?;
                contact = true;
            }
        } else {
            // The color is rewritten on every contact-free tick, not only on
            // the falling edge.
            engine.set_body_color(object, OBJECT_BASE_COLOR)?;
            contact = false;
        }

        // Command over the solver's output length; record over the arm's
        // joint count. Setup checked once that the two agree.
        for (joint, angle) in target_angles.iter().enumerate() {
            engine.command_joint(
                robot,
                joint,
                &JointCommand {
                    target_angle: *angle,
                    target_velocity: config.target_velocity,
                    position_gain: config.position_gain,
                    velocity_gain: config.velocity_gain,
                    max_force: config.max_motor_force,
                },
            )?;
        }

        let mut snapshot = Vec::with_capacity(num_joints);
        for joint in 0..num_joints {
            snapshot.push(engine.joint_angle(robot, joint)?);
        }
        trajectory.push(t, DVector::from_vec(snapshot));
    }

    Ok(trajectory)
}

#[cfg(test)]
mod tests {
    use na::vector;

    use super::*;
    use crate::engine::testing::{FakeEngine, OBJECT, ROBOT};
    use crate::util::test_utils::random_vector;
    use crate::{assert_close, assert_vec_close};

    fn test_config() -> SimConfig {
        SimConfig {
            sim_duration: 1.0,
            dt: 0.1,
            real_time: false,
            ..SimConfig::default()
        }
    }

    #[test]
    fn records_one_snapshot_per_tick() {
        let mut engine = FakeEngine::new(7);
        let config = test_config();

        let trajectory = run_simulation(&mut engine, ROBOT, OBJECT, &config).unwrap();

        assert_eq!(trajectory.num_ticks(), 10);
        assert_eq!(trajectory.num_joints(), 7);
        assert_eq!(engine.ticks, 10);
        assert_eq!(engine.camera_resets, 10);
    }

    #[test]
    fn time_buffer_increases_by_dt_each_tick() {
        let mut engine = FakeEngine::new(7);
        let config = test_config();

        let trajectory = run_simulation(&mut engine, ROBOT, OBJECT, &config).unwrap();

        for (step, t) in trajectory.times.iter().enumerate() {
            assert_close!(t, (step + 1) as Float * config.dt, 1e-5);
        }
        for pair in trajectory.times.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn target_is_object_position_plus_fixed_offset() {
        let mut engine = FakeEngine::new(7);
        engine.object_position = vector![0.5, 0.5, 0.45];
        let config = test_config();

        run_simulation(&mut engine, ROBOT, OBJECT, &config).unwrap();

        assert_eq!(engine.ik_targets.len(), 10);
        for target in &engine.ik_targets {
            assert_vec_close!(target, vector![0.45, 0.45, 0.55], 1e-6);
        }
    }

    #[test]
    fn target_offset_holds_for_any_object_position() {
        let mut rng = rand::rng();
        let config = SimConfig {
            sim_duration: 0.1,
            dt: 0.1,
            real_time: false,
            ..SimConfig::default()
        };

        for _ in 0..20 {
            let mut engine = FakeEngine::new(7);
            engine.object_position = random_vector(&mut rng, 2.0);

            run_simulation(&mut engine, ROBOT, OBJECT, &config).unwrap();

            let target = engine.ik_targets[0];
            assert_vec_close!(
                target - engine.object_position,
                config.target_offset,
                1e-5
            );
        }
    }

    #[test]
    fn contact_edges_toggle_the_object_color() {
        let mut engine = FakeEngine::new(7);
        engine.contact_script = vec![false, true, true, false, true];
        let config = SimConfig {
            sim_duration: 0.5,
            dt: 0.1,
            real_time: false,
            ..SimConfig::default()
        };

        run_simulation(&mut engine, ROBOT, OBJECT, &config).unwrap();

        // tick 3 keeps the flag set and issues no color change
        assert_eq!(
            engine.color_log,
            vec![
                crate::setup::OBJECT_BASE_COLOR,
                crate::setup::OBJECT_CONTACT_COLOR,
                crate::setup::OBJECT_BASE_COLOR,
                crate::setup::OBJECT_CONTACT_COLOR,
            ]
        );
    }

    #[test]
    fn color_reset_repeats_on_contact_free_ticks() {
        let mut engine = FakeEngine::new(7);
        engine.contact_script = vec![false, false, false];
        let config = SimConfig {
            sim_duration: 0.3,
            dt: 0.1,
            real_time: false,
            ..SimConfig::default()
        };

        run_simulation(&mut engine, ROBOT, OBJECT, &config).unwrap();

        assert_eq!(engine.color_log.len(), 3);
        assert!(engine
            .color_log
            .iter()
            .all(|c| *c == crate::setup::OBJECT_BASE_COLOR));
    }

    #[test]
    fn snapshots_follow_commanded_angles() {
        let mut engine = FakeEngine::new(7);
        engine.object_position = vector![0.5, 0.5, 0.45];
        let config = test_config();

        let trajectory = run_simulation(&mut engine, ROBOT, OBJECT, &config).unwrap();

        let expected = engine.ik_solution(&engine.ik_targets[9]);
        let last = trajectory.angles.last().unwrap();
        assert_vec_close!(last, expected, 1e-6);
    }

    #[test]
    fn commands_carry_the_configured_motor_parameters() {
        let mut engine = FakeEngine::new(7);
        let config = test_config();

        run_simulation(&mut engine, ROBOT, OBJECT, &config).unwrap();

        assert_eq!(engine.commands.len(), 10 * 7);
        for command in &engine.commands {
            assert_close!(command.target_velocity, 0.05, 1e-6);
            assert_close!(command.position_gain, 0.2, 1e-6);
            assert_close!(command.velocity_gain, 1.0, 1e-6);
            assert_close!(command.max_force, 3000.0, 1e-6);
        }
    }
}
