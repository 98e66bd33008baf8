use std::path::Path;

use anyhow::Result;
use tracing::{error, info};

use kuka_reach::config::SimConfig;
use kuka_reach::control::run_simulation;
use kuka_reach::engine::rapier::RapierEngine;
use kuka_reach::engine::{BodyId, PhysicsEngine};
use kuka_reach::export::{save_joint_angles, SHEET_PATH};
use kuka_reach::plot::{plot_joint_angles, GRAPH_PATH};
use kuka_reach::setup::setup_simulation;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    if let Err(e) = run(&SimConfig::default()) {
        error!("simulation failed: {e:#}");
    }
}

/// Run the full pipeline, releasing the physics backend on success and
/// failure paths alike.
fn run(config: &SimConfig) -> Result<()> {
    info!("preparing simulation environment");
    let (mut engine, robot, object) = setup_simulation(config)?;

    let outcome = stages(
        &mut engine,
        robot,
        object,
        config,
        Path::new(GRAPH_PATH),
        Path::new(SHEET_PATH),
    );
    engine.disconnect();
    outcome?;

    info!("simulation completed successfully");
    Ok(())
}

/// Everything between setup and teardown: control loop, figure, export.
fn stages(
    engine: &mut RapierEngine,
    robot: BodyId,
    object: BodyId,
    config: &SimConfig,
    graph_path: &Path,
    sheet_path: &Path,
) -> Result<()> {
    info!("running simulation");
    let trajectory = run_simulation(engine, robot, object, config)?;

    let joint_names = (0..engine.num_joints(robot)?)
        .map(|joint| engine.joint_name(robot, joint))
        .collect::<Result<Vec<_>, _>>()?;
    plot_joint_angles(&trajectory, &joint_names, graph_path)?;
    save_joint_angles(&trajectory, sheet_path)?;
    Ok(())
}
