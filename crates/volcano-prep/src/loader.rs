//! Table loading from `.csv` and `.xlsx` sources.
//!
//! The format is chosen from the file extension and the whole table is read
//! eagerly, so a bad path or format fails at construction time.

use crate::error::{Result, ResultExt, VolcanoError};
use calamine::{DataType as Cell, Reader, Xlsx, open_workbook};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Number of rows polars inspects when inferring CSV column types.
const CSV_INFER_SCHEMA_ROWS: usize = 100;

static EMPTY_CELL: Cell = Cell::Empty;

/// Supported tabular source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Comma-delimited text with a header row.
    Csv,
    /// Excel workbook; the first worksheet is read.
    Xlsx,
}

impl SourceFormat {
    /// Detect the format from a path's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            _ => Err(VolcanoError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Reads and writes tables at the file boundary.
pub struct TableLoader;

impl TableLoader {
    /// Load a table from a `.csv` or `.xlsx` file.
    ///
    /// # Errors
    ///
    /// - [`VolcanoError::UnsupportedFormat`] for any other extension
    /// - [`VolcanoError::SourceNotFound`] if the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let format = SourceFormat::from_path(path)?;

        if !path.exists() {
            return Err(VolcanoError::SourceNotFound(path.display().to_string()));
        }

        info!("Loading table from: {}", path.display());
        let df = match format {
            SourceFormat::Csv => Self::read_csv(path)?,
            SourceFormat::Xlsx => Self::read_xlsx(path)?,
        };
        info!("Table loaded: {} rows x {} columns", df.height(), df.width());

        Ok(df)
    }

    fn read_csv(path: &Path) -> Result<DataFrame> {
        CsvReadOptions::default()
            .with_infer_schema_length(Some(CSV_INFER_SCHEMA_ROWS))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
            .finish()
            .context(format!("Reading CSV '{}'", path.display()))
    }

    fn read_xlsx(path: &Path) -> Result<DataFrame> {
        let mut workbook: Xlsx<_> = open_workbook(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| VolcanoError::SourceNotFound(format!("{} has no worksheets", path.display())))??;

        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row
                .iter()
                .enumerate()
                .map(|(idx, cell)| header_name(idx, cell))
                .collect(),
            None => return Ok(DataFrame::empty()),
        };
        debug!("Worksheet header = {:?}", headers);

        let body: Vec<&[Cell]> = rows.collect();
        let mut columns: Vec<Column> = Vec::with_capacity(headers.len());

        for (col_idx, name) in headers.iter().enumerate() {
            let cells: Vec<&Cell> = body
                .iter()
                .map(|row| row.get(col_idx).unwrap_or(&EMPTY_CELL))
                .collect();
            columns.push(Column::from(cells_to_series(name, &cells)));
        }

        DataFrame::new(columns).context(format!("Building table from '{}'", path.display()))
    }

    /// Write a table as comma-delimited text with a header row.
    pub fn write_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)
            .context(format!("Writing CSV '{}'", path.display()))?;
        debug!("Wrote {} rows to {}", df.height(), path.display());
        Ok(())
    }
}

/// Header text for a column; blank headers become `Unnamed: {idx}`.
fn header_name(idx: usize, cell: &Cell) -> String {
    let text = cell_to_string(cell);
    if text.trim().is_empty() {
        format!("Unnamed: {}", idx)
    } else {
        text
    }
}

fn cell_to_string(cell: &Cell) -> String {
    match cell {
        Cell::String(s) => s.clone(),
        Cell::Empty => String::new(),
        Cell::Bool(b) => b.to_string(),
        Cell::Error(e) => format!("{e:?}"),
        Cell::Float(n) | Cell::Duration(n) | Cell::DateTime(n) => n.to_string(),
        Cell::Int(i) => i.to_string(),
        Cell::DateTimeIso(s) | Cell::DurationIso(s) => s.clone(),
    }
}

/// The narrowest column type every present cell fits into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Int,
    Float,
    Bool,
    Text,
}

fn infer_cell_kind(cells: &[&Cell]) -> CellKind {
    let present: Vec<&&Cell> = cells
        .iter()
        .filter(|c| !matches!(c, Cell::Empty | Cell::Error(_)))
        .collect();

    if present.is_empty() {
        return CellKind::Float;
    }
    if present.iter().all(|c| matches!(c, Cell::Int(_))) {
        return CellKind::Int;
    }
    if present.iter().all(|c| matches!(c, Cell::Int(_) | Cell::Float(_))) {
        return CellKind::Float;
    }
    if present.iter().all(|c| matches!(c, Cell::Bool(_))) {
        return CellKind::Bool;
    }
    CellKind::Text
}

/// Convert one worksheet column into a typed series; empty cells become null.
fn cells_to_series(name: &str, cells: &[&Cell]) -> Series {
    match infer_cell_kind(cells) {
        CellKind::Int => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|c| match c {
                    Cell::Int(i) => Some(*i),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        CellKind::Float => {
            let values: Vec<Option<f64>> = cells
                .iter()
                .map(|c| match c {
                    Cell::Int(i) => Some(*i as f64),
                    Cell::Float(f) => Some(*f),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        CellKind::Bool => {
            let values: Vec<Option<bool>> = cells
                .iter()
                .map(|c| match c {
                    Cell::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        CellKind::Text => {
            let values: Vec<Option<String>> = cells
                .iter()
                .map(|c| match c {
                    Cell::Empty => None,
                    other => Some(cell_to_string(other)),
                })
                .collect();
            Series::new(name.into(), values)
        }
    }
}
