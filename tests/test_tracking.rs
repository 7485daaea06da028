//! Integration test: MLflow REST client against a local stand-in server

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::{Json, Router};
use score_predictor::config::TrackerConfig;
use score_predictor::tracking::{ExperimentTracker, MlflowTracker, RunRecord};
use score_predictor::training::Params;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const API_PREFIX: &str = "/api/2.0/mlflow/";
const ARTIFACT_URI: &str = "mlflow-artifacts:/7/r1/artifacts";

#[derive(Debug, Clone)]
struct Call {
    method: String,
    path: String,
    body: Value,
    raw: Vec<u8>,
}

impl Call {
    fn endpoint(&self) -> &str {
        self.path.trim_start_matches(API_PREFIX)
    }
}

/// A canned error returned for one endpoint.
#[derive(Debug, Clone, Copy)]
struct Failure {
    endpoint: &'static str,
    status: StatusCode,
    error_code: &'static str,
}

#[derive(Clone)]
struct Server {
    calls: Arc<Mutex<Vec<Call>>>,
    failure: Option<Failure>,
}

async fn handle(State(server): State<Server>, method: Method, uri: Uri, body: Bytes) -> (StatusCode, Json<Value>) {
    let path = uri.path().to_string();
    server.calls.lock().unwrap().push(Call {
        method: method.to_string(),
        path: path.clone(),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
        raw: body.to_vec(),
    });

    let endpoint = path.trim_start_matches(API_PREFIX);
    if let Some(failure) = server.failure.filter(|f| f.endpoint == endpoint) {
        return (
            failure.status,
            Json(json!({ "error_code": failure.error_code, "message": "rejected" })),
        );
    }

    let reply = match endpoint {
        "experiments/get-by-name" => json!({ "experiment": { "experiment_id": "7" } }),
        "runs/create" => json!({ "run": { "info": { "run_id": "r1", "artifact_uri": ARTIFACT_URI } } }),
        "model-versions/create" => json!({ "model_version": { "version": "3" } }),
        _ => json!({}),
    };
    (StatusCode::OK, Json(reply))
}

/// Starts the stand-in server on its own runtime thread; the tracker under
/// test uses a blocking client and must stay outside any async context.
fn start_server(failure: Option<Failure>) -> (String, Arc<Mutex<Vec<Call>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let server = Server {
        calls: calls.clone(),
        failure,
    };
    let (tx, rx) = std::sync::mpsc::channel();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            let app = Router::new().fallback(handle).with_state(server);
            axum::serve(listener, app).await.unwrap();
        });
    });

    let addr = rx.recv().unwrap();
    (format!("http://{}", addr), calls)
}

fn record(registered_model_name: Option<&str>) -> RunRecord {
    RunRecord {
        run_name: "training-20261017".to_string(),
        params: Params::new()
            .with("learning_rate", 0.1)
            .with("n_estimators", 64i64),
        metrics: vec![
            ("rmse".to_string(), 5.25),
            ("r2".to_string(), 0.87),
            ("mae".to_string(), 4.1),
        ],
        model_artifact: vec![1, 2, 3, 4, 5],
        registered_model_name: registered_model_name.map(str::to_string),
    }
}

fn tracker(url: &str) -> MlflowTracker {
    MlflowTracker::new(TrackerConfig::new(url).with_experiment("student-scores")).unwrap()
}

fn find<'a>(calls: &'a [Call], endpoint: &str) -> &'a Call {
    calls
        .iter()
        .find(|c| c.endpoint() == endpoint)
        .unwrap_or_else(|| panic!("no call to {}", endpoint))
}

#[test]
fn test_run_logged_in_order() {
    let (url, calls) = start_server(None);
    let info = tracker(&url).log_run(&record(Some("StudentScorePredictor"))).unwrap();

    assert_eq!(info.run_id, "r1");
    assert_eq!(info.location, ARTIFACT_URI);
    assert_eq!(info.model_version.as_deref(), Some("3"));

    let calls = calls.lock().unwrap();
    let sequence: Vec<(&str, &str)> = calls.iter().map(|c| (c.method.as_str(), c.path.as_str())).collect();
    assert_eq!(
        sequence,
        vec![
            ("GET", "/api/2.0/mlflow/experiments/get-by-name"),
            ("POST", "/api/2.0/mlflow/runs/create"),
            ("POST", "/api/2.0/mlflow/runs/log-batch"),
            ("PUT", "/api/2.0/mlflow-artifacts/artifacts/7/r1/artifacts/model/model.pkl"),
            ("POST", "/api/2.0/mlflow/registered-models/create"),
            ("POST", "/api/2.0/mlflow/model-versions/create"),
            ("POST", "/api/2.0/mlflow/runs/update"),
        ]
    );

    let created = find(&calls, "runs/create");
    assert_eq!(created.body["experiment_id"], "7");
    assert_eq!(created.body["run_name"], "training-20261017");

    let upload = calls.iter().find(|c| c.method == "PUT").unwrap();
    assert_eq!(upload.raw, vec![1, 2, 3, 4, 5]);

    let update = find(&calls, "runs/update");
    assert_eq!(update.body["run_id"], "r1");
    assert_eq!(update.body["status"], "FINISHED");
    assert!(update.body["end_time"].is_i64());
}

#[test]
fn test_params_and_metrics_batch() {
    let (url, calls) = start_server(None);
    tracker(&url).log_run(&record(None)).unwrap();

    let calls = calls.lock().unwrap();
    let batch = &find(&calls, "runs/log-batch").body;
    assert_eq!(batch["run_id"], "r1");
    assert_eq!(
        batch["params"],
        json!([
            { "key": "learning_rate", "value": "0.1" },
            { "key": "n_estimators", "value": "64" },
        ])
    );

    let metrics: Vec<(String, f64)> = batch["metrics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| (m["key"].as_str().unwrap().to_string(), m["value"].as_f64().unwrap()))
        .collect();
    assert_eq!(
        metrics,
        vec![
            ("rmse".to_string(), 5.25),
            ("r2".to_string(), 0.87),
            ("mae".to_string(), 4.1),
        ]
    );
    assert!(batch["metrics"][0]["timestamp"].is_i64());
}

#[test]
fn test_model_version_registered_from_run_artifacts() {
    let (url, calls) = start_server(None);
    tracker(&url).log_run(&record(Some("StudentScorePredictor"))).unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(
        find(&calls, "registered-models/create").body,
        json!({ "name": "StudentScorePredictor" })
    );
    assert_eq!(
        find(&calls, "model-versions/create").body,
        json!({
            "name": "StudentScorePredictor",
            "source": "mlflow-artifacts:/7/r1/artifacts/model",
            "run_id": "r1",
        })
    );
}

#[test]
fn test_existing_registered_model_reused() {
    let (url, calls) = start_server(Some(Failure {
        endpoint: "registered-models/create",
        status: StatusCode::BAD_REQUEST,
        error_code: "RESOURCE_ALREADY_EXISTS",
    }));
    let info = tracker(&url).log_run(&record(Some("StudentScorePredictor"))).unwrap();

    assert_eq!(info.model_version.as_deref(), Some("3"));
    assert_eq!(find(&calls.lock().unwrap(), "runs/update").body["status"], "FINISHED");
}

#[test]
fn test_no_registry_calls_without_model_name() {
    let (url, calls) = start_server(None);
    let info = tracker(&url).log_run(&record(None)).unwrap();

    assert_eq!(info.model_version, None);
    let calls = calls.lock().unwrap();
    assert!(!calls.iter().any(|c| c.endpoint().starts_with("registered-models")));
    assert!(!calls.iter().any(|c| c.endpoint().starts_with("model-versions")));
}

#[test]
fn test_failed_batch_marks_run_failed() {
    let (url, calls) = start_server(Some(Failure {
        endpoint: "runs/log-batch",
        status: StatusCode::INTERNAL_SERVER_ERROR,
        error_code: "INTERNAL_ERROR",
    }));
    let err = tracker(&url).log_run(&record(Some("StudentScorePredictor"))).unwrap_err();
    assert!(err.to_string().contains("runs/log-batch"), "{}", err);

    let calls = calls.lock().unwrap();
    assert!(!calls.iter().any(|c| c.method == "PUT"));
    let last = calls.last().unwrap();
    assert_eq!(last.endpoint(), "runs/update");
    assert_eq!(last.body["run_id"], "r1");
    assert_eq!(last.body["status"], "FAILED");
    assert!(last.body["end_time"].is_i64());
}

#[test]
fn test_failed_registration_marks_run_failed() {
    let (url, calls) = start_server(Some(Failure {
        endpoint: "model-versions/create",
        status: StatusCode::INTERNAL_SERVER_ERROR,
        error_code: "INTERNAL_ERROR",
    }));
    let err = tracker(&url).log_run(&record(Some("StudentScorePredictor"))).unwrap_err();
    assert!(err.to_string().contains("model-versions/create"), "{}", err);

    let calls = calls.lock().unwrap();
    let updates: Vec<&Call> = calls.iter().filter(|c| c.endpoint() == "runs/update").collect();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].body["status"], "FAILED");
}
