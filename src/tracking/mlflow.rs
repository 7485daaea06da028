//! MLflow tracking server client (REST API 2.0)

use super::{ExperimentTracker, RunInfo, RunRecord, MODEL_ARTIFACT_NAME};
use crate::config::TrackerConfig;
use crate::error::{Result, ScoreError};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_EXPERIMENT_ID: &str = "0";

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ExperimentEnvelope {
    experiment: Experiment,
}

#[derive(Debug, Deserialize)]
struct Experiment {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedExperiment {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    run: Run,
}

#[derive(Debug, Deserialize)]
struct Run {
    info: RunInfoResponse,
}

#[derive(Debug, Deserialize)]
struct RunInfoResponse {
    run_id: String,
    #[serde(default)]
    artifact_uri: String,
}

#[derive(Debug, Deserialize)]
struct ModelVersionEnvelope {
    model_version: ModelVersion,
}

#[derive(Debug, Deserialize)]
struct ModelVersion {
    version: String,
}

/// Client for a remote MLflow tracking server, with optional basic auth.
pub struct MlflowTracker {
    config: TrackerConfig,
    base_url: String,
    client: Client,
}

impl MlflowTracker {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ScoreError::TrackingError(format!("failed to build HTTP client: {}", e)))?;
        let base_url = config.uri.trim_end_matches('/').to_string();
        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    fn api(&self, endpoint: &str) -> String {
        format!("{}/api/2.0/mlflow/{}", self.base_url, endpoint)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.username {
            Some(user) => request.basic_auth(user, self.config.password.as_deref()),
            None => request,
        }
    }

    fn post<T: DeserializeOwned>(&self, endpoint: &str, body: Value) -> Result<T> {
        let response = self
            .authorized(self.client.post(self.api(endpoint)))
            .json(&body)
            .send()?;
        Self::parse(endpoint, response)
    }

    fn parse<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T> {
        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(Self::api_error(endpoint, status.as_u16(), &text));
        }
        serde_json::from_str(&text)
            .map_err(|e| ScoreError::TrackingError(format!("{}: unexpected response: {}", endpoint, e)))
    }

    fn api_error(endpoint: &str, status: u16, body: &str) -> ScoreError {
        match serde_json::from_str::<ApiError>(body) {
            Ok(err) if !err.error_code.is_empty() => ScoreError::TrackingError(format!(
                "{} failed ({}): {} {}",
                endpoint, status, err.error_code, err.message
            )),
            _ => ScoreError::TrackingError(format!("{} failed ({}): {}", endpoint, status, body)),
        }
    }

    fn experiment_id(&self) -> Result<String> {
        let Some(name) = &self.config.experiment_name else {
            return Ok(DEFAULT_EXPERIMENT_ID.to_string());
        };

        let response = self
            .authorized(self.client.get(self.api("experiments/get-by-name")))
            .query(&[("experiment_name", name)])
            .send()?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            let created: CreatedExperiment = self.post("experiments/create", json!({ "name": name }))?;
            info!(experiment = %name, id = %created.experiment_id, "Created experiment");
            return Ok(created.experiment_id);
        }
        let found: ExperimentEnvelope = Self::parse("experiments/get-by-name", response)?;
        Ok(found.experiment.experiment_id)
    }

    /// Proxied artifact upload; `artifact_uri` must be an
    /// `mlflow-artifacts:` URI for the server to accept it.
    fn upload_artifact(&self, artifact_uri: &str, relative_path: &str, bytes: &[u8]) -> Result<()> {
        let Some(root) = artifact_uri.strip_prefix("mlflow-artifacts:") else {
            return Err(ScoreError::TrackingError(format!(
                "artifact store '{}' is not served through the tracking server",
                artifact_uri
            )));
        };
        let url = format!(
            "{}/api/2.0/mlflow-artifacts/artifacts/{}/{}",
            self.base_url,
            root.trim_matches('/'),
            relative_path
        );

        let response = self
            .authorized(self.client.put(url))
            .body(bytes.to_vec())
            .send()?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().unwrap_or_default();
            return Err(Self::api_error("artifacts upload", status, &text));
        }
        Ok(())
    }

    fn register(&self, name: &str, source: &str, run_id: &str) -> Result<String> {
        match self.post::<Value>("registered-models/create", json!({ "name": name })) {
            Ok(_) => info!(model = %name, "Registered new model"),
            Err(ScoreError::TrackingError(msg)) if msg.contains("RESOURCE_ALREADY_EXISTS") => {
                debug!(model = %name, "registered model already exists")
            }
            Err(e) => return Err(e),
        }

        let created: ModelVersionEnvelope = self.post(
            "model-versions/create",
            json!({ "name": name, "source": source, "run_id": run_id }),
        )?;
        Ok(created.model_version.version)
    }

    /// Logs params and metrics, uploads the model and registers it. The run
    /// must already exist and is left open.
    fn record_run(&self, run: &RunRecord, run_id: &str, artifact_uri: &str, now: i64) -> Result<Option<String>> {
        let params: Vec<Value> = run
            .params
            .iter()
            .map(|(k, v)| json!({ "key": k, "value": v.to_string() }))
            .collect();
        let metrics: Vec<Value> = run
            .metrics
            .iter()
            .map(|(k, v)| json!({ "key": k, "value": v, "timestamp": now, "step": 0 }))
            .collect();
        self.post::<Value>(
            "runs/log-batch",
            json!({ "run_id": run_id, "params": params, "metrics": metrics }),
        )?;

        let artifact_path = format!("model/{}", MODEL_ARTIFACT_NAME);
        match self.upload_artifact(artifact_uri, &artifact_path, &run.model_artifact) {
            Ok(()) => match &run.registered_model_name {
                Some(name) => Ok(Some(self.register(name, &format!("{}/model", artifact_uri), run_id)?)),
                None => Ok(None),
            },
            Err(e) => {
                warn!(error = %e, "Model artifact not uploaded; skipping registration");
                Ok(None)
            }
        }
    }

    fn set_status(&self, run_id: &str, status: &str) -> Result<()> {
        self.post::<Value>(
            "runs/update",
            json!({
                "run_id": run_id,
                "status": status,
                "end_time": chrono::Utc::now().timestamp_millis(),
            }),
        )?;
        Ok(())
    }
}

impl ExperimentTracker for MlflowTracker {
    fn log_run(&self, run: &RunRecord) -> Result<RunInfo> {
        let experiment_id = self.experiment_id()?;
        let now = chrono::Utc::now().timestamp_millis();

        let created: RunEnvelope = self.post(
            "runs/create",
            json!({
                "experiment_id": experiment_id,
                "run_name": run.run_name,
                "start_time": now,
                "tags": [{ "key": "mlflow.runName", "value": run.run_name }],
            }),
        )?;
        let run_id = created.run.info.run_id;
        let artifact_uri = created.run.info.artifact_uri;

        let model_version = match self.record_run(run, &run_id, &artifact_uri, now) {
            Ok(version) => version,
            Err(e) => {
                if let Err(update_err) = self.set_status(&run_id, "FAILED") {
                    warn!(run_id = %run_id, error = %update_err, "Could not mark run as failed");
                }
                return Err(e);
            }
        };
        self.set_status(&run_id, "FINISHED")?;

        info!(run_id = %run_id, version = ?model_version, "Logged run to tracking server");
        Ok(RunInfo {
            run_id,
            location: artifact_uri,
            model_version,
        })
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_urls() {
        let tracker = MlflowTracker::new(TrackerConfig::new("https://tracking.example.com/")).unwrap();
        assert_eq!(
            tracker.api("runs/create"),
            "https://tracking.example.com/api/2.0/mlflow/runs/create"
        );
    }

    #[test]
    fn test_api_error_message() {
        let err = MlflowTracker::api_error(
            "registered-models/create",
            400,
            r#"{"error_code":"RESOURCE_ALREADY_EXISTS","message":"exists"}"#,
        );
        assert!(err.to_string().contains("RESOURCE_ALREADY_EXISTS"));

        let err = MlflowTracker::api_error("runs/create", 502, "bad gateway");
        assert!(err.to_string().contains("bad gateway"));
    }

    #[test]
    fn test_non_proxied_artifact_store_rejected() {
        let tracker = MlflowTracker::new(TrackerConfig::new("http://localhost:5000")).unwrap();
        let result = tracker.upload_artifact("s3://bucket/runs/1/artifacts", "model/model.pkl", &[1]);
        assert!(matches!(result, Err(ScoreError::TrackingError(_))));
    }
}
