//! # Table Loading and Prediction
//!
//! Glue between spreadsheet files and the estimator. Excel workbooks
//! (`.xlsx`, first worksheet) and delimited text (`.csv`, `.tsv`, `.txt`) are
//! accepted; any other extension is rejected before the file is opened. Tables live in `polars`
//! DataFrames so any extra columns a user supplies (names, roll numbers) ride
//! along untouched into the output.
//!
//! - Strict schema: the eight predictor columns must be present under their
//!   exact, case-sensitive names.
//! - Whole-table semantics: either every row is predicted or an error is
//!   returned and no output table exists.
//! - Empty cells are read as NaN and propagate into the prediction for that
//!   row; a non-empty cell that is not a number is an error.

use crate::estimator::{MATH_SQ, PREDICTED_PERCENTILE, PercentileEstimator, SCI_SQ};
use crate::row::{REQUIRED_FIELDS, StudentRow};
use calamine::{Data, Reader, Xlsx, open_workbook};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or predicting a table.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to read Excel workbook: {0}")]
    ExcelReadError(#[from] calamine::XlsxError),
    #[error("Failed to write Excel workbook: {0}")]
    ExcelWriteError(#[from] rust_xlsxwriter::XlsxError),
    #[error("The Excel workbook '{0}' contains no worksheets.")]
    NoWorksheet(String),
    #[error(
        "Unsupported file type for '{0}'. Use an Excel (.xlsx), CSV (.csv) or tab-separated (.tsv, .txt) file."
    )]
    UnsupportedFormat(String),
    #[error(
        "The required column '{0}' was not found in the input table. Please check spelling and case."
    )]
    MissingField(&'static str),
    #[error(
        "The column '{field}' could not be converted to a number: row {row} holds '{value}'. (Found type: {found_type})"
    )]
    TypeCoercion {
        field: &'static str,
        row: usize,
        value: String,
        found_type: String,
    },
}

/// The on-disk layout of a table, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Xlsx,
    Csv,
    Tsv,
}

impl TableFormat {
    /// Case-insensitive match on the extension of `path`.
    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("xlsx") => Ok(TableFormat::Xlsx),
            Some("csv") => Ok(TableFormat::Csv),
            Some("tsv") | Some("txt") => Ok(TableFormat::Tsv),
            _ => Err(TableError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Field separator of the delimited formats.
    pub fn separator(self) -> Option<u8> {
        match self {
            TableFormat::Xlsx => None,
            TableFormat::Csv => Some(b','),
            TableFormat::Tsv => Some(b'\t'),
        }
    }
}

/// Reads a headered Excel, CSV or TSV file into a DataFrame.
pub fn load_table(path: impl AsRef<Path>) -> Result<DataFrame, TableError> {
    let path = path.as_ref();
    let format = TableFormat::from_path(path)?;
    log::info!("Loading {:?} data from '{}'", format, path.display());

    let df = match format.separator() {
        None => read_workbook(path)?,
        Some(separator) => {
            let file = File::open(path)?;
            CsvReadOptions::default()
                .with_has_header(true)
                .map_parse_options(|options| options.with_separator(separator))
                .into_reader_with_file_handle(file)
                .finish()?
        }
    };

    log::info!(
        "Loaded {} rows with columns {:?}",
        df.height(),
        df.get_column_names()
    );
    Ok(df)
}

/// Reads the first worksheet of an `.xlsx` workbook. The first row holds the
/// column names.
fn read_workbook(path: &Path) -> Result<DataFrame, TableError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| TableError::NoWorksheet(path.display().to_string()))??;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(DataFrame::empty());
    };
    let body: Vec<&[Data]> = rows.collect();

    let columns = header
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let text = cell.to_string();
            let name = match text.trim() {
                "" => format!("column {}", i + 1),
                trimmed => trimmed.to_string(),
            };
            let cells: Vec<Option<&Data>> = body.iter().map(|row| row.get(i)).collect();
            sheet_column(name, &cells)
        })
        .collect::<Vec<_>>();

    Ok(DataFrame::new(columns)?)
}

fn is_blank(cell: Option<&Data>) -> bool {
    match cell {
        None | Some(Data::Empty) => true,
        Some(Data::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// A Float64 column when every filled cell is a number or boolean, otherwise
/// a String column that the numeric cast later checks cell by cell.
fn sheet_column(name: String, cells: &[Option<&Data>]) -> Column {
    let numeric = cells.iter().all(|cell| {
        is_blank(*cell) || matches!(cell, Some(Data::Int(_) | Data::Float(_) | Data::Bool(_)))
    });

    if numeric {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|cell| match cell {
                Some(Data::Int(v)) => Some(*v as f64),
                Some(Data::Float(v)) => Some(*v),
                Some(Data::Bool(v)) => Some(if *v { 1.0 } else { 0.0 }),
                _ => None,
            })
            .collect();
        Series::new(name.into(), values).into()
    } else {
        let values: Vec<Option<String>> = cells
            .iter()
            .map(|cell| match *cell {
                Some(data) if !is_blank(Some(data)) => Some(data.to_string()),
                _ => None,
            })
            .collect();
        Series::new(name.into(), values).into()
    }
}

/// The four-student demonstration table.
pub fn sample_table() -> Result<DataFrame, TableError> {
    let df = DataFrame::new(vec![
        Series::new("female".into(), vec![1i64, 0, 1, 0]).into(),
        Series::new("tenth_math_final".into(), vec![95i64, 88, 76, 82]).into(),
        Series::new("tenth_sci_final".into(), vec![92i64, 85, 79, 88]).into(),
        Series::new("pcm".into(), vec![1i64, 1, 0, 1]).into(),
        Series::new("general".into(), vec![0i64, 1, 0, 0]).into(),
        Series::new("obc".into(), vec![1i64, 0, 0, 0]).into(),
        Series::new("sc".into(), vec![0i64, 0, 1, 0]).into(),
        Series::new("st".into(), vec![0i64, 0, 0, 1]).into(),
    ])?;
    Ok(df)
}

/// Reads the eight predictor columns into typed rows, in table order.
pub fn student_rows(df: &DataFrame) -> Result<Vec<StudentRow>, TableError> {
    let present: HashSet<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !present.contains(**f)) {
        return Err(TableError::MissingField(*missing));
    }

    let mut columns = Vec::with_capacity(REQUIRED_FIELDS.len());
    for field in REQUIRED_FIELDS {
        columns.push(extract_numeric_column(df, field)?);
    }

    Ok((0..df.height())
        .map(|i| {
            let mut values = [0.0; 8];
            for (value, column) in values.iter_mut().zip(&columns) {
                *value = column[i];
            }
            StudentRow::from_values(values)
        })
        .collect())
}

/// Predicts every row of `df`, returning a table with the original columns
/// followed by `math_sq`, `sci_sq` and `predicted_percentile`.
pub fn predict_table(
    estimator: &PercentileEstimator,
    df: &DataFrame,
) -> Result<DataFrame, TableError> {
    let rows = student_rows(df)?;
    let predicted = estimator.predict_rows(&rows);

    let math_sq: Vec<f64> = predicted.iter().map(|p| p.math_sq).collect();
    let sci_sq: Vec<f64> = predicted.iter().map(|p| p.sci_sq).collect();
    let percentiles: Vec<f64> = predicted.iter().map(|p| p.predicted_percentile).collect();

    let mut out = df.clone();
    out.with_column(Series::new(MATH_SQ.into(), math_sq))?;
    out.with_column(Series::new(SCI_SQ.into(), sci_sq))?;
    out.with_column(Series::new(PREDICTED_PERCENTILE.into(), percentiles))?;

    log::debug!("Predicted {} rows", out.height());
    Ok(out)
}

/// The `predicted_percentile` column of a predicted table.
pub fn predicted_values(df: &DataFrame) -> Result<Vec<f64>, TableError> {
    let column = df
        .column(PREDICTED_PERCENTILE)
        .map_err(|_| TableError::MissingField(PREDICTED_PERCENTILE))?;
    let casted = column.cast(&DataType::Float64)?;
    Ok(casted
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

fn extract_numeric_column(df: &DataFrame, field: &'static str) -> Result<Vec<f64>, TableError> {
    let column = df.column(field)?;
    let found_type = column.dtype().to_string();
    let casted = column
        .cast(&DataType::Float64)
        .map_err(|_| TableError::TypeCoercion {
            field,
            row: 0,
            value: String::new(),
            found_type: found_type.clone(),
        })?;

    // A non-strict cast turns unparseable cells into nulls; nulls that were
    // already present are empty cells and become NaN.
    if casted.null_count() > column.null_count() {
        for row in 0..column.len() {
            let original = column.get(row)?;
            if !original.is_null() && casted.get(row)?.is_null() {
                let value = match original {
                    AnyValue::String(s) => s.to_string(),
                    AnyValue::StringOwned(s) => s.to_string(),
                    other => other.to_string(),
                };
                return Err(TableError::TypeCoercion {
                    field,
                    row,
                    value,
                    found_type,
                });
            }
        }
    }

    Ok(casted
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}
