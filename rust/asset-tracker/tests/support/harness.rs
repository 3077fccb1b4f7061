use async_trait::async_trait;
use asset_tracker::{
    config::AppConfig,
    db::{self, SqlitePool},
    probe::{ProbeOutcome, Prober},
    server::Server,
};
use axum::{
    body::{self, Body},
    http::{self, Request, StatusCode},
    Router,
};
use serde::Serialize;
use serde_json::Value;
use std::{
    collections::VecDeque,
    future::Future,
    net::{Ipv4Addr, SocketAddr},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, Once,
    },
    time::Duration,
};
use tempfile::TempDir;
use tower::ServiceExt;

pub const API_KEY: &str = "test-api-key";

static TRACING_INIT: Once = Once::new();

/// Answers probes from a script instead of the network. An empty script
/// answers `down`.
#[derive(Default)]
pub struct ScriptedProber {
    outcomes: Mutex<VecDeque<ProbeOutcome>>,
    calls: AtomicUsize,
}

impl ScriptedProber {
    pub fn push(&self, outcome: ProbeOutcome) {
        self.outcomes
            .lock()
            .expect("prober script lock poisoned")
            .push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, _addr: Ipv4Addr) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .outcomes
            .lock()
            .expect("prober script lock poisoned")
            .pop_front();
        next.unwrap_or_else(ProbeOutcome::down)
    }
}

/// Runs a test closure against a router backed by a fresh SQLite file.
pub async fn with_inventory_harness<F, Fut>(test: F)
where
    F: FnOnce(InventoryHarness) -> Fut,
    Fut: Future<Output = ()>,
{
    run_harness(None, test).await;
}

/// Same as [`with_inventory_harness`] but the service requires [`API_KEY`].
#[allow(dead_code)]
pub async fn with_secured_harness<F, Fut>(test: F)
where
    F: FnOnce(InventoryHarness) -> Fut,
    Fut: Future<Output = ()>,
{
    run_harness(Some(API_KEY.to_string()), test).await;
}

async fn run_harness<F, Fut>(api_key: Option<String>, test: F)
where
    F: FnOnce(InventoryHarness) -> Fut,
    Fut: Future<Output = ()>,
{
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });

    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let database_url = dir
        .path()
        .join("inventory.db")
        .to_string_lossy()
        .into_owned();
    let config = test_config(database_url, api_key.clone());

    let prober = Arc::new(ScriptedProber::default());
    let server = Server::with_prober(config.clone(), prober.clone())
        .await
        .expect("failed to boot inventory server for harness");

    let harness = InventoryHarness {
        router: server.router(),
        prober,
        config,
        api_key,
        _dir: Arc::new(dir),
    };

    test(harness).await;
}

fn test_config(database_url: String, api_key: Option<String>) -> AppConfig {
    AppConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        database_url,
        max_pool_size: 1,
        api_key,
        probe_timeout: Duration::from_millis(200),
        recent_checks_limit: 10,
    }
}

#[derive(Clone)]
pub struct InventoryHarness {
    router: Router,
    pub prober: Arc<ScriptedProber>,
    config: AppConfig,
    api_key: Option<String>,
    _dir: Arc<TempDir>,
}

#[allow(dead_code)]
impl InventoryHarness {
    pub async fn get(&self, path: &str) -> http::Response<Body> {
        self.send("GET", path, None, true).await
    }

    pub async fn get_without_api_key(&self, path: &str) -> http::Response<Body> {
        self.send("GET", path, None, false).await
    }

    pub async fn post<T>(&self, path: &str, payload: &T) -> http::Response<Body>
    where
        T: Serialize,
    {
        let body = serde_json::to_vec(payload).expect("request payload should serialize");
        self.send("POST", path, Some(body), true).await
    }

    /// Creates an asset and returns its id, failing the test on any error.
    pub async fn create_asset(&self, payload: Value) -> i32 {
        let (status, body) = read_json(self.post("/assets/add", &payload).await).await;
        assert_eq!(status, StatusCode::CREATED, "asset creation failed: {body}");
        body["id"].as_i64().expect("created asset should carry an id") as i32
    }

    /// Opens a second pool on the harness database for direct inspection.
    pub async fn store(&self) -> SqlitePool {
        db::connect_pool(&self.config)
            .await
            .expect("failed to open harness database")
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<Vec<u8>>,
        include_api_key: bool,
    ) -> http::Response<Body> {
        let mut builder = Request::builder().method(method).uri(path);

        if body.is_some() {
            builder = builder.header(http::header::CONTENT_TYPE, "application/json");
        }
        if let (true, Some(key)) = (include_api_key, &self.api_key) {
            builder = builder.header("x-api-key", key);
        }

        let request = builder
            .body(body.map(Body::from).unwrap_or_else(Body::empty))
            .expect("failed to build harness request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should handle harness request")
    }
}

pub async fn read_json(response: http::Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("response body should be readable");
    let value =
        serde_json::from_slice::<Value>(&bytes).expect("response body should be valid JSON");
    (status, value)
}
