//! Simulated world construction: ground plane, table, arm, object.

use na::{vector, Unit, Vector3};
use tracing::info;

use crate::config::SimConfig;
use crate::engine::rapier::{ArmSegment, RapierEngine};
use crate::engine::{BodyId, EngineError, PhysicsEngine, Rgba};
use crate::types::Float;

pub const OBJECT_BASE_COLOR: Rgba = [1.0, 0.65, 0.0, 1.0];
pub const OBJECT_CONTACT_COLOR: Rgba = [1.0, 0.0, 0.0, 1.0];
const TABLE_COLOR: Rgba = [0.0, 0.0, 0.0, 0.6];

/// Seven-joint serial arm in the KUKA iiwa layout: a vertical chain with
/// alternating z/y rotation axes.
pub fn arm_segments() -> Vec<ArmSegment> {
    let segment = |name: &str, axis: Vector3<Float>, length, radius, mass| ArmSegment {
        name: name.to_string(),
        axis: Unit::new_normalize(axis),
        length,
        radius,
        mass,
    };
    vec![
        segment("lbr_iiwa_joint_1", vector![0.0, 0.0, 1.0], 0.1575, 0.07, 4.0),
        segment("lbr_iiwa_joint_2", vector![0.0, 1.0, 0.0], 0.2025, 0.07, 4.0),
        segment("lbr_iiwa_joint_3", vector![0.0, 0.0, 1.0], 0.2045, 0.06, 3.0),
        segment("lbr_iiwa_joint_4", vector![0.0, 1.0, 0.0], 0.2155, 0.06, 2.7),
        segment("lbr_iiwa_joint_5", vector![0.0, 0.0, 1.0], 0.1845, 0.05, 1.7),
        segment("lbr_iiwa_joint_6", vector![0.0, 1.0, 0.0], 0.2155, 0.05, 1.8),
        segment("lbr_iiwa_joint_7", vector![0.0, 0.0, 1.0], 0.081, 0.04, 0.3),
    ]
}

/// Build the world and return the engine plus the arm and object handles.
///
/// Also checks once that the IK solver arity matches the arm's joint count,
/// so the command loop can rely on them agreeing.
pub fn setup_simulation(
    config: &SimConfig,
) -> Result<(RapierEngine, BodyId, BodyId), EngineError> {
    let mut engine = RapierEngine::connect(config.dt);

    let _floor = engine.load_ground();

    let table = engine.load_table(vector![0.5, 0.5, 0.2], 0.2);
    engine.set_body_color(table, TABLE_COLOR)?;

    let robot = engine.load_arm(vector![0.0, 0.0, 0.0], &arm_segments())?;
    engine.enable_force_torque_sensor(robot, config.ee_joint_index)?;

    let object = engine.load_cube(vector![0.5, 0.5, 0.45], 0.05, 1.0);
    engine.set_body_color(object, OBJECT_BASE_COLOR)?;

    info!("robot joints:");
    for joint in 0..engine.num_joints(robot)? {
        info!("joint {joint}: {}", engine.joint_name(robot, joint)?);
    }

    let probe = engine.base_position(object)? + config.target_offset;
    let solved = engine.solve_ik(robot, config.ee_joint_index, &probe)?;
    let joints = engine.num_joints(robot)?;
    if solved.len() != joints {
        return Err(EngineError::ArityMismatch {
            solved: solved.len(),
            joints,
        });
    }

    Ok((engine, robot, object))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_has_seven_uniquely_named_joints() {
        let segments = arm_segments();
        assert_eq!(segments.len(), 7);

        let mut names: Vec<_> = segments.iter().map(|s| s.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 7);

        assert!(segments.iter().all(|s| s.length > 0.0 && s.mass > 0.0));
    }

    #[test]
    fn setup_builds_seven_joint_arm() {
        let config = SimConfig {
            real_time: false,
            ..SimConfig::default()
        };
        let (engine, robot, object) = setup_simulation(&config).unwrap();

        assert_eq!(engine.num_joints(robot).unwrap(), 7);
        assert_eq!(engine.num_joints(object).unwrap(), 0);
        assert_eq!(
            engine.force_torque_joint(robot).unwrap(),
            Some(config.ee_joint_index)
        );
        assert_eq!(engine.body_color(object), Some(OBJECT_BASE_COLOR));
    }
}
