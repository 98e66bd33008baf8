//! Post-hoc figure of all joint angles over time.

use std::fs;
use std::path::Path;

use itertools::izip;
use plotters::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::control::Trajectory;
use crate::types::Float;

/// Default output path of the trajectory figure.
pub const GRAPH_PATH: &str = "./graph/joint_angle_graph.png";

#[derive(Error, Debug)]
pub enum PlotError {
    #[error("could not prepare the figure directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("chart rendering failed: {0}")]
    Render(String),
}

fn render_err<E: std::fmt::Display>(e: E) -> PlotError {
    PlotError::Render(e.to_string())
}

/// Draw one labeled curve per joint on a single figure and save it as an
/// image, creating the containing directory if absent.
///
/// Assumes the trajectory's column count equals `joint_names.len()`.
pub fn plot_joint_angles(
    trajectory: &Trajectory,
    joint_names: &[String],
    path: &Path,
) -> Result<(), PlotError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    // Determine y-axis limits across all joints
    let mut min_y = Float::INFINITY;
    let mut max_y = Float::NEG_INFINITY;
    for row in &trajectory.angles {
        for angle in row.iter() {
            min_y = min_y.min(*angle);
            max_y = max_y.max(*angle);
        }
    }
    if !(min_y.is_finite() && max_y.is_finite()) {
        min_y = -1.0;
        max_y = 1.0;
    }
    if max_y - min_y < 1e-6 {
        min_y -= 1.0;
        max_y += 1.0;
    }
    let final_time = trajectory.times.last().copied().unwrap_or(1.0);

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Joint angles over time", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..final_time, min_y..max_y)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_desc("time [s]")
        .y_desc("angle [rad]")
        .draw()
        .map_err(render_err)?;

    for (joint, name) in joint_names.iter().enumerate() {
        let color = Palette99::pick(joint).to_rgba();
        let series = trajectory.joint_series(joint);
        chart
            .draw_series(LineSeries::new(
                izip!(trajectory.times.iter().copied(), series),
                &color,
            ))
            .map_err(render_err)?
            .label(name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    info!("joint angle figure saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use na::dvector;

    use super::*;
    use crate::assert_vec_close;

    #[test]
    fn joint_series_extracts_one_column() {
        let trajectory = Trajectory {
            times: vec![0.1, 0.2],
            angles: vec![dvector![1.0, 2.0, 3.0], dvector![4.0, 5.0, 6.0]],
        };

        assert_vec_close!(trajectory.joint_series(1), vec![2.0, 5.0], 1e-6);
    }

    #[test]
    fn directory_failure_propagates() {
        let dir = std::env::temp_dir().join("kuka_reach_plot_test");
        fs::remove_dir_all(&dir).ok();
        fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();

        let trajectory = Trajectory {
            times: vec![0.1],
            angles: vec![dvector![0.0]],
        };
        let result = plot_joint_angles(
            &trajectory,
            &["joint_1".to_string()],
            &blocker.join("graph.png"),
        );
        assert!(result.is_err());
    }
}
