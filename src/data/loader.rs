//! CSV loading and saving

use crate::error::{Result, ScoreError};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;

/// Load a CSV file with a header row.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(ScoreError::DataError(format!(
            "dataset not found: {}",
            path.display()
        )));
    }

    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    Ok(df)
}

/// Save a DataFrame as CSV, creating parent directories as needed.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scores.csv");

        let mut df = df! {
            "gender" => ["female", "male"],
            "math_score" => [72i64, 69],
        }
        .unwrap();

        write_csv(&mut df, &path).unwrap();
        let loaded = read_csv(&path).unwrap();

        assert_eq!(loaded.shape(), (2, 2));
        assert_eq!(loaded.get_column_names()[0].as_str(), "gender");
    }

    #[test]
    fn test_missing_file() {
        let result = read_csv(Path::new("/definitely/not/here.csv"));
        assert!(matches!(result, Err(ScoreError::DataError(_))));
    }
}
