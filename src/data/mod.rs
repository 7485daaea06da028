//! Dataset ingestion
//!
//! Reads the source dataset (CSV or a relational table), keeps an unsplit
//! copy and writes the seeded train/test partitions used downstream.

mod ingestion;
mod loader;
mod relational;

pub use ingestion::{train_test_split, DataIngestion, DataSource, IngestionArtifacts, IngestionConfig};
pub use loader::{read_csv, write_csv};
pub use relational::read_table;
