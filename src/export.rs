//! Spreadsheet persistence of the recorded joint angles.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::info;
use umya_spreadsheet::{new_file, reader, writer};

use crate::control::Trajectory;

/// Default workbook path.
pub const SHEET_PATH: &str = "./sheet/data.xlsx";
/// Sheet holding one row per tick and one column per joint.
pub const SHEET_NAME: &str = "joint_angles";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("could not prepare the sheet directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("spreadsheet error: {0}")]
    Xlsx(String),
}

fn xlsx_err<E: std::fmt::Display>(e: E) -> ExportError {
    ExportError::Xlsx(e.to_string())
}

/// Write the angle snapshots into the `joint_angles` sheet of the workbook
/// at `path`, replacing any previous sheet of the same name.
///
/// The workbook is created if missing; other sheets are left untouched.
pub fn save_joint_angles(trajectory: &Trajectory, path: &Path) -> Result<(), ExportError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let mut book = if path.is_file() {
        reader::xlsx::read(path).map_err(xlsx_err)?
    } else {
        new_file()
    };

    if book.get_sheet_by_name(SHEET_NAME).is_some() {
        book.remove_sheet_by_name(SHEET_NAME).map_err(xlsx_err)?;
    }
    let sheet = book.new_sheet(SHEET_NAME).map_err(xlsx_err)?;

    for (row, snapshot) in trajectory.angles.iter().enumerate() {
        for (col, angle) in snapshot.iter().enumerate() {
            sheet
                .get_cell_mut(((col + 1) as u32, (row + 1) as u32))
                .set_value_number(f64::from(*angle));
        }
    }

    writer::xlsx::write(&book, path).map_err(xlsx_err)?;
    info!("joint angle data saved to {}", path.display());
    Ok(())
}
