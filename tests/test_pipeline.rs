//! Integration test: end-to-end training pipeline

mod common;

use common::{quick_roster, student_frame, write_dataset};
use polars::prelude::*;
use score_predictor::config::{ArtifactConfig, TrackerConfig};
use score_predictor::data::{read_csv, DataSource};
use score_predictor::error::ScoreError;
use score_predictor::inference::PredictionPipeline;
use score_predictor::pipeline::{pipeline_status, TrainingPipeline};
use score_predictor::tracking::{FileTracker, RecordingTracker};

#[test]
fn test_start_training_writes_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = ArtifactConfig::in_dir(dir.path().join("artifacts"));
    let data = write_dataset(dir.path());
    let tracker = RecordingTracker::new();

    assert!(!pipeline_status(&artifacts).ready_for_serving());

    let summary = TrainingPipeline::new(DataSource::Csv(data), artifacts.clone())
        .with_roster(quick_roster())
        .with_tracker(Box::new(tracker.clone()))
        .start_training()
        .unwrap();

    assert_eq!(summary.status, "completed");
    assert_eq!(summary.best_model, "Linear Regression");
    assert!(summary.r2 > 0.9);
    assert_eq!(summary.model_path, artifacts.model_path());
    assert_eq!(summary.preprocessor_path, artifacts.preprocessor_path());
    assert_eq!(summary.run_id.as_deref(), Some("run-1"));
    assert_eq!(tracker.runs().len(), 1);

    let status = pipeline_status(&artifacts);
    assert!(status.raw_data && status.train_data && status.test_data);
    assert!(status.ready_for_serving());

    assert_eq!(read_csv(&artifacts.raw_path()).unwrap().height(), 1000);
    assert_eq!(read_csv(&artifacts.train_path()).unwrap().height(), 800);
    assert_eq!(read_csv(&artifacts.test_path()).unwrap().height(), 200);
}

#[test]
fn test_same_seed_same_summary() {
    let run = || {
        let dir = tempfile::tempdir().unwrap();
        let data = write_dataset(dir.path());
        TrainingPipeline::new(DataSource::Csv(data), ArtifactConfig::in_dir(dir.path().join("a")))
            .with_roster(quick_roster())
            .with_tracker(Box::new(RecordingTracker::new()))
            .start_training()
            .unwrap()
    };

    let first = run();
    let second = run();
    assert_eq!(first.report, second.report);
    assert_eq!(first.metrics, second.metrics);
}

#[test]
fn test_below_threshold_leaves_no_model() {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = ArtifactConfig::in_dir(dir.path().join("artifacts"));
    let data = write_dataset(dir.path());
    let tracker = RecordingTracker::new();

    let err = TrainingPipeline::new(DataSource::Csv(data), artifacts.clone())
        .with_roster(quick_roster())
        .with_threshold(1.01)
        .with_tracker(Box::new(tracker.clone()))
        .start_training()
        .unwrap_err();

    assert!(matches!(err.root_cause(), ScoreError::ModelBelowThreshold { .. }));
    assert!(tracker.runs().is_empty());
    let status = pipeline_status(&artifacts);
    assert!(status.preprocessor);
    assert!(!status.model);
}

#[test]
fn test_missing_dataset_fails_in_ingestion() {
    let dir = tempfile::tempdir().unwrap();
    let err = TrainingPipeline::new(
        DataSource::Csv(dir.path().join("absent.csv")),
        ArtifactConfig::in_dir(dir.path()),
    )
    .start_training()
    .unwrap_err();

    assert!(err.to_string().contains("data ingestion"));
    assert!(matches!(err.root_cause(), ScoreError::DataError(_)));
}

#[test]
fn test_file_tracker_receives_run() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_dataset(dir.path());
    let store = dir.path().join("mlruns");

    TrainingPipeline::new(DataSource::Csv(data), ArtifactConfig::in_dir(dir.path().join("artifacts")))
        .with_roster(quick_roster())
        .with_tracker_config(TrackerConfig::new(format!("file:{}", store.display())))
        .start_training()
        .unwrap();

    let runs = FileTracker::new(&store, None).list_runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_name, "Linear Regression");
    assert!(runs[0].metrics.contains_key("rmse"));
}

#[test]
fn test_trained_pipeline_predicts_frames_and_records() {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = ArtifactConfig::in_dir(dir.path().join("artifacts"));
    let data = write_dataset(dir.path());
    TrainingPipeline::new(DataSource::Csv(data), artifacts.clone())
        .with_roster(quick_roster())
        .with_tracker(Box::new(RecordingTracker::new()))
        .start_training()
        .unwrap();

    let pipeline = PredictionPipeline::load(&artifacts).unwrap();
    let frame = student_frame(5, 99);
    let from_frame = pipeline.predict(&frame).unwrap();
    assert_eq!(from_frame.len(), 5);

    let truth = frame.column("math_score").unwrap().f64().unwrap();
    for (pred, actual) in from_frame.iter().zip(truth.into_iter()) {
        assert!((pred - actual.unwrap()).abs() < 5.0);
    }

    let info = pipeline.model_info();
    assert_eq!(info.model_name, "Linear Regression");
    assert_eq!(info.target, "math_score");
    assert_eq!(info.n_model_inputs, 17);
}
