//! Data ingestion: read the source once, keep a raw copy, split train/test

use super::loader::{read_csv, write_csv};
use super::relational;
use crate::config::{ArtifactConfig, RelationalConfig};
use crate::error::{Result, ScoreError};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use tracing::info;

/// Where the dataset comes from.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// Flat CSV file with a header row
    Csv(PathBuf),
    /// `SELECT *` over one table of a MySQL database
    Relational(RelationalConfig),
}

/// Ingestion configuration
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub source: DataSource,
    pub artifacts: ArtifactConfig,
    /// Fraction of rows held out for testing
    pub test_ratio: f64,
    pub random_seed: u64,
}

impl IngestionConfig {
    pub fn new(source: DataSource, artifacts: ArtifactConfig) -> Self {
        Self {
            source,
            artifacts,
            test_ratio: 0.2,
            random_seed: 42,
        }
    }

    pub fn with_test_ratio(mut self, ratio: f64) -> Self {
        self.test_ratio = ratio;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }
}

/// Paths written by a successful ingestion run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionArtifacts {
    pub raw_path: PathBuf,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
}

pub struct DataIngestion {
    config: IngestionConfig,
}

impl DataIngestion {
    pub fn new(config: IngestionConfig) -> Self {
        Self { config }
    }

    /// Read the source, write `raw.csv`, then a seeded random split into
    /// `train.csv` and `test.csv`.
    pub fn split(&self) -> Result<IngestionArtifacts> {
        if !(self.config.test_ratio > 0.0 && self.config.test_ratio < 1.0) {
            return Err(ScoreError::InvalidParameter {
                name: "test_ratio".to_string(),
                value: self.config.test_ratio.to_string(),
                reason: "must lie strictly between 0 and 1".to_string(),
            });
        }

        let mut df = match &self.config.source {
            DataSource::Csv(path) => read_csv(path)?,
            DataSource::Relational(db) => relational::read_table(db)?,
        };
        info!(rows = df.height(), columns = df.width(), "Read source dataset");

        let artifacts = &self.config.artifacts;
        write_csv(&mut df, &artifacts.raw_path())?;

        let (mut train, mut test) =
            train_test_split(&df, self.config.test_ratio, self.config.random_seed)?;
        write_csv(&mut train, &artifacts.train_path())?;
        write_csv(&mut test, &artifacts.test_path())?;

        info!(
            train_rows = train.height(),
            test_rows = test.height(),
            dir = %artifacts.dir.display(),
            "Ingestion completed"
        );

        Ok(IngestionArtifacts {
            raw_path: artifacts.raw_path(),
            train_path: artifacts.train_path(),
            test_path: artifacts.test_path(),
        })
    }
}

/// Seeded random partition; the test share is rounded up.
pub fn train_test_split(df: &DataFrame, test_ratio: f64, seed: u64) -> Result<(DataFrame, DataFrame)> {
    let n = df.height();
    let n_test = (n as f64 * test_ratio).ceil() as usize;
    if n < 2 || n_test == 0 || n_test >= n {
        return Err(ScoreError::DataError(format!(
            "cannot split {} rows with test ratio {}",
            n, test_ratio
        )));
    }

    let mut indices: Vec<IdxSize> = (0..n as IdxSize).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_idx = IdxCa::from_vec("test".into(), indices[..n_test].to_vec());
    let train_idx = IdxCa::from_vec("train".into(), indices[n_test..].to_vec());

    Ok((df.take(&train_idx)?, df.take(&test_idx)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: i64) -> DataFrame {
        df! {
            "id" => (0..n).collect::<Vec<_>>(),
            "score" => (0..n).map(|v| v as f64 * 1.5).collect::<Vec<_>>(),
        }
        .unwrap()
    }

    #[test]
    fn test_split_sizes() {
        let (train, test) = train_test_split(&numbered(1000), 0.2, 42).unwrap();
        assert_eq!(train.height(), 800);
        assert_eq!(test.height(), 200);
    }

    #[test]
    fn test_split_is_seeded() {
        let df = numbered(50);
        let (a, _) = train_test_split(&df, 0.2, 7).unwrap();
        let (b, _) = train_test_split(&df, 0.2, 7).unwrap();
        assert!(a.equals(&b));
    }

    #[test]
    fn test_split_partitions_rows() {
        let (train, test) = train_test_split(&numbered(30), 0.2, 1).unwrap();
        let mut ids: Vec<i64> = train
            .column("id")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .chain(test.column("id").unwrap().i64().unwrap().into_no_null_iter())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_rejects_tiny_frames() {
        assert!(train_test_split(&numbered(1), 0.2, 42).is_err());
    }

    #[test]
    fn test_ingestion_writes_all_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.csv");
        write_csv(&mut numbered(20), &source).unwrap();

        let artifacts = ArtifactConfig::in_dir(dir.path().join("artifacts"));
        let ingestion = DataIngestion::new(IngestionConfig::new(DataSource::Csv(source), artifacts));
        let paths = ingestion.split().unwrap();

        assert!(paths.raw_path.exists());
        assert_eq!(read_csv(&paths.train_path).unwrap().height(), 16);
        assert_eq!(read_csv(&paths.test_path).unwrap().height(), 4);
    }

    #[test]
    fn test_invalid_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let config = IngestionConfig::new(
            DataSource::Csv(dir.path().join("x.csv")),
            ArtifactConfig::in_dir(dir.path()),
        )
        .with_test_ratio(1.5);
        assert!(matches!(
            DataIngestion::new(config).split(),
            Err(ScoreError::InvalidParameter { .. })
        ));
    }
}
