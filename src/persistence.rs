//! Binary artifact files
//!
//! Fitted objects are written as bincode inside a small envelope that records
//! the artifact kind and a format version, so a preprocessor file is never
//! silently loaded as a model.

use crate::error::{Result, ScoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    format_version: u32,
    kind: String,
    saved_at: String,
    payload: T,
}

/// Serialize `object` to `path`, creating parent directories.
pub fn save_object<T: Serialize>(path: &Path, kind: &'static str, object: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        kind: kind.to_string(),
        saved_at: chrono::Utc::now().to_rfc3339(),
        payload: object,
    };

    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, &envelope)?;
    writer.flush()?;

    debug!(path = %path.display(), kind, "Saved artifact");
    Ok(())
}

/// Load an object written by [`save_object`]. A missing file is reported as
/// [`ScoreError::ArtifactNotFound`].
pub fn load_object<T: DeserializeOwned>(path: &Path, kind: &'static str) -> Result<T> {
    if !path.exists() {
        return Err(ScoreError::ArtifactNotFound {
            kind,
            path: path.to_path_buf(),
        });
    }

    let reader = BufReader::new(File::open(path)?);
    let envelope: Envelope<T> = bincode::deserialize_from(reader).map_err(|e| {
        ScoreError::SerializationError(format!(
            "failed to read {} artifact {}: {}",
            kind,
            path.display(),
            e
        ))
    })?;

    if envelope.kind != kind {
        return Err(ScoreError::SerializationError(format!(
            "{} holds a {} artifact, expected {}",
            path.display(),
            envelope.kind,
            kind
        )));
    }
    if envelope.format_version != FORMAT_VERSION {
        return Err(ScoreError::SerializationError(format!(
            "unsupported artifact format version {}",
            envelope.format_version
        )));
    }

    Ok(envelope.payload)
}

/// The exact bytes [`save_object`] would write, for handing an artifact to a
/// tracker before (or instead of) writing it locally.
pub fn to_bytes<T: Serialize>(kind: &'static str, object: &T) -> Result<Vec<u8>> {
    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        kind: kind.to_string(),
        saved_at: chrono::Utc::now().to_rfc3339(),
        payload: object,
    };
    Ok(bincode::serialize(&envelope)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Weights {
        values: Vec<f64>,
    }

    #[test]
    fn test_save_load_exact_floats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep").join("w.pkl");
        let weights = Weights {
            values: vec![0.1 + 0.2, std::f64::consts::PI, -1e-300],
        };

        save_object(&path, "Model", &weights).unwrap();
        let loaded: Weights = load_object(&path, "Model").unwrap();
        assert_eq!(loaded, weights);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<Weights> = load_object(&dir.path().join("model.pkl"), "Model");
        assert!(matches!(result, Err(ScoreError::ArtifactNotFound { kind: "Model", .. })));
    }

    #[test]
    fn test_kind_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preprocessor.pkl");
        save_object(&path, "Preprocessor", &Weights { values: vec![] }).unwrap();

        let result: Result<Weights> = load_object(&path, "Model");
        assert!(matches!(result, Err(ScoreError::SerializationError(_))));
    }

    #[test]
    fn test_bytes_load_like_a_saved_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pkl");
        let weights = Weights { values: vec![1.5, -2.0] };

        std::fs::write(&path, to_bytes("Model", &weights).unwrap()).unwrap();
        let loaded: Weights = load_object(&path, "Model").unwrap();
        assert_eq!(loaded, weights);
    }
}
