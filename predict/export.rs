//! Writing predicted tables to disk.
//!
//! Output goes to a staging file next to the destination and is renamed into
//! place only after the whole table has been written, so a failure never
//! leaves a truncated file under the requested name.
//!
//! `.xlsx` destinations get an Excel workbook with one worksheet; `.csv`,
//! `.tsv` and `.txt` get delimited text.

use crate::table::{TableError, TableFormat};
use polars::prelude::*;
use rust_xlsxwriter::{ColNum, RowNum, Workbook, XlsxError};
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_else(|| path.as_os_str()));
    name.push(".partial");
    path.with_file_name(name)
}

/// Writes `df` with a header row. The format follows the file extension.
pub fn write_table(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<(), TableError> {
    let path = path.as_ref();
    let format = TableFormat::from_path(path)?;
    let staging = staging_path(path);

    let written = File::create(&staging)
        .map_err(TableError::from)
        .and_then(|mut file| {
            match format.separator() {
                None => write_workbook(df, &mut file)?,
                Some(separator) => CsvWriter::new(&mut file)
                    .include_header(true)
                    .with_separator(separator)
                    .finish(df)?,
            }
            file.sync_all()?;
            Ok(())
        });

    if let Err(e) = written {
        let _ = fs::remove_file(&staging);
        return Err(e);
    }

    fs::rename(&staging, path)?;
    log::info!("Wrote {} rows to '{}'", df.height(), path.display());
    Ok(())
}

fn sheet_row(index: usize) -> Result<RowNum, XlsxError> {
    // Row 0 holds the header.
    RowNum::try_from(index + 1).map_err(|_| XlsxError::RowColumnLimitError)
}

/// Writes every column of `df` to the first worksheet of a new workbook.
/// String columns are written as text and everything else as numbers.
fn write_workbook(df: &DataFrame, file: &mut File) -> Result<(), TableError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (index, column) in df.get_columns().iter().enumerate() {
        let col = ColNum::try_from(index).map_err(|_| XlsxError::RowColumnLimitError)?;
        sheet.write_string(0, col, column.name().as_str())?;

        if column.dtype() == &DataType::String {
            for (row, value) in column.str()?.into_iter().enumerate() {
                if let Some(text) = value {
                    sheet.write_string(sheet_row(row)?, col, text)?;
                }
            }
        } else {
            let numbers = column.cast(&DataType::Float64)?;
            for (row, value) in numbers.f64()?.into_iter().enumerate() {
                // Excel has no NaN; nulls and non-finite values stay empty cells.
                if let Some(number) = value.filter(|v| v.is_finite()) {
                    sheet.write_number(sheet_row(row)?, col, number)?;
                }
            }
        }
    }

    workbook.save_to_writer(file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::PercentileEstimator;
    use crate::table::{load_table, predict_table, predicted_values, sample_table};
    use tempfile::tempdir;

    #[test]
    fn written_predictions_reload_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("predicted_scores.tsv");

        let mut out = predict_table(&PercentileEstimator::default(), &sample_table().unwrap())
            .unwrap();
        write_table(&mut out, &path).unwrap();

        let reloaded = load_table(&path).unwrap();
        assert_eq!(reloaded.shape(), out.shape());
        let before = predicted_values(&out).unwrap();
        let after = predicted_values(&reloaded).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-9, "{a} != {b}");
        }
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn csv_extension_writes_commas() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.csv");
        let mut df = sample_table().unwrap();
        write_table(&mut df, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(
            header,
            "female,tenth_math_final,tenth_sci_final,pcm,general,obc,sc,st"
        );
    }

    #[test]
    fn failed_write_leaves_no_file_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing_dir").join("scores.tsv");
        let mut df = sample_table().unwrap();

        assert!(write_table(&mut df, &path).is_err());
        assert!(!path.exists());
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn excel_predictions_reload_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("predicted_scores.xlsx");

        let mut students = sample_table().unwrap();
        students
            .with_column(Series::new("name".into(), ["Asha", "Ravi", "Meera", "Kabir"]))
            .unwrap();
        let mut out = predict_table(&PercentileEstimator::default(), &students).unwrap();
        write_table(&mut out, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], b"PK", "an xlsx file is a zip container");

        let reloaded = load_table(&path).unwrap();
        assert_eq!(reloaded.shape(), out.shape());
        assert_eq!(reloaded.get_column_names(), out.get_column_names());
        assert_eq!(
            reloaded.column("name").unwrap().str().unwrap().get(2),
            Some("Meera")
        );
        let before = predicted_values(&out).unwrap();
        let after = predicted_values(&reloaded).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-9, "{a} != {b}");
        }
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn unsupported_extension_is_rejected_without_writing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.json");
        let mut df = sample_table().unwrap();

        assert!(matches!(
            write_table(&mut df, &path),
            Err(TableError::UnsupportedFormat(_))
        ));
        assert!(!path.exists());
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn staging_file_is_a_hidden_sibling() {
        let staged = staging_path(Path::new("/tmp/out/scores.tsv"));
        assert_eq!(staged, Path::new("/tmp/out/.scores.tsv.partial"));
    }
}
