use crate::{
    config::AppConfig,
    db,
    error::{Result, ServiceError},
    extract::{AssetId, Payload},
    forms::{AssetChanges, AssetForm, BackupForm, CapacityForm, FormChoices, SecurityNoteForm},
    models::{Asset, AssetDetail, AvailabilityLog, BackupLog, CapacityRecord, Dashboard, SecurityNote},
    probe::{self, CheckOutcome, IcmpProber, Prober},
    recorders::LogRecorder,
    registry::AssetRegistry,
    state::AppState,
};
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use http::{header::LOCATION, HeaderMap, StatusCode};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct Server {
    config: Arc<AppConfig>,
    state: AppState,
}

#[derive(Debug, Serialize)]
struct FormView {
    title: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    asset: Option<Asset>,
    choices: FormChoices,
}

impl FormView {
    fn new(title: &'static str, asset: Option<Asset>) -> Json<Self> {
        Json(Self {
            title,
            asset,
            choices: FormChoices::default(),
        })
    }
}

#[derive(Debug, Serialize)]
struct ActionResult {
    message: String,
    location: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    message: String,
    outcome: CheckOutcome,
    log: Option<AvailabilityLog>,
    location: String,
}

impl Server {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let prober = Arc::new(IcmpProber::new(config.probe_timeout));
        Self::with_prober(config, prober).await
    }

    pub async fn with_prober(config: AppConfig, prober: Arc<dyn Prober>) -> anyhow::Result<Self> {
        let pool = db::connect_pool(&config).await?;
        let config = Arc::new(config);
        let state = AppState::new(
            Arc::clone(&config),
            AssetRegistry::new(pool.clone()),
            LogRecorder::new(pool),
            prober,
        );

        Ok(Self { config, state })
    }

    pub fn router(&self) -> Router {
        let inventory = Router::new()
            .route("/", get(Self::dashboard))
            .route("/assets", get(Self::list_assets))
            .route("/assets/add", get(Self::new_asset_form).post(Self::create_asset))
            .route(
                "/assets/edit/:id",
                get(Self::edit_asset_form).post(Self::update_asset),
            )
            .route("/assets/delete/:id", get(Self::delete_asset))
            .route("/check_availability/:id", get(Self::check_availability))
            .route("/asset/:id", get(Self::asset_detail))
            .route(
                "/asset/:id/security/add",
                get(Self::security_note_form).post(Self::add_security_note),
            )
            .route(
                "/asset/:id/capacity/add",
                get(Self::capacity_form).post(Self::add_capacity_record),
            )
            .route(
                "/asset/:id/backup/add",
                get(Self::backup_form).post(Self::add_backup_log),
            )
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                require_api_key,
            ));

        Router::new()
            .route("/healthz", get(Self::health))
            .merge(inventory)
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.listen_addr;
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, database = %self.config.database_url, "asset tracker listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    async fn health() -> Json<serde_json::Value> {
        Json(json!({ "status": "ok" }))
    }

    async fn dashboard(State(state): State<AppState>) -> Result<Json<Dashboard>> {
        let dashboard = state
            .registry
            .dashboard(state.config.recent_checks_limit)
            .await?;
        Ok(Json(dashboard))
    }

    async fn list_assets(State(state): State<AppState>) -> Result<Json<Vec<Asset>>> {
        Ok(Json(state.registry.list().await?))
    }

    async fn new_asset_form() -> Json<FormView> {
        FormView::new("Add Asset", None)
    }

    async fn create_asset(
        State(state): State<AppState>,
        Payload(form): Payload<AssetForm>,
    ) -> Result<Response> {
        let asset = state.registry.create(form).await?;
        Ok(created(detail_path(asset.id), asset))
    }

    async fn edit_asset_form(
        State(state): State<AppState>,
        AssetId(id): AssetId,
    ) -> Result<Json<FormView>> {
        let asset = state.registry.get(id).await?;
        Ok(FormView::new("Edit Asset", Some(asset)))
    }

    async fn update_asset(
        State(state): State<AppState>,
        AssetId(id): AssetId,
        Payload(changes): Payload<AssetChanges>,
    ) -> Result<Json<Asset>> {
        Ok(Json(state.registry.update(id, changes).await?))
    }

    async fn delete_asset(
        State(state): State<AppState>,
        AssetId(id): AssetId,
    ) -> Result<Json<ActionResult>> {
        state.registry.delete(id).await?;
        Ok(Json(ActionResult {
            message: "Asset deleted".to_string(),
            location: "/assets".to_string(),
        }))
    }

    async fn check_availability(
        State(state): State<AppState>,
        AssetId(id): AssetId,
    ) -> Result<Json<CheckResult>> {
        let asset = state.registry.get(id).await?;
        let outcome = probe::check_asset(state.prober.as_ref(), &asset).await;

        let log = match outcome {
            CheckOutcome::NoAddress => None,
            CheckOutcome::Checked(result) => Some(state.recorder.record_check(id, result).await?),
        };

        Ok(Json(CheckResult {
            message: outcome.message(),
            outcome,
            log,
            location: detail_path(id),
        }))
    }

    async fn asset_detail(
        State(state): State<AppState>,
        AssetId(id): AssetId,
    ) -> Result<Json<AssetDetail>> {
        Ok(Json(state.registry.detail(id).await?))
    }

    async fn security_note_form(
        State(state): State<AppState>,
        AssetId(id): AssetId,
    ) -> Result<Json<FormView>> {
        let asset = state.registry.get(id).await?;
        Ok(FormView::new("Add Security Note", Some(asset)))
    }

    async fn add_security_note(
        State(state): State<AppState>,
        AssetId(id): AssetId,
        Payload(form): Payload<SecurityNoteForm>,
    ) -> Result<Response> {
        let note: SecurityNote = state.recorder.add_security_note(id, form).await?;
        Ok(created(detail_path(id), note))
    }

    async fn capacity_form(
        State(state): State<AppState>,
        AssetId(id): AssetId,
    ) -> Result<Json<FormView>> {
        let asset = state.registry.get(id).await?;
        Ok(FormView::new("Add Capacity Record", Some(asset)))
    }

    async fn add_capacity_record(
        State(state): State<AppState>,
        AssetId(id): AssetId,
        Payload(form): Payload<CapacityForm>,
    ) -> Result<Response> {
        let record: CapacityRecord = state.recorder.add_capacity_record(id, form).await?;
        Ok(created(detail_path(id), record))
    }

    async fn backup_form(
        State(state): State<AppState>,
        AssetId(id): AssetId,
    ) -> Result<Json<FormView>> {
        let asset = state.registry.get(id).await?;
        Ok(FormView::new("Add Backup Log", Some(asset)))
    }

    async fn add_backup_log(
        State(state): State<AppState>,
        AssetId(id): AssetId,
        Payload(form): Payload<BackupForm>,
    ) -> Result<Response> {
        let backup: BackupLog = state.recorder.add_backup_log(id, form).await?;
        Ok(created(detail_path(id), backup))
    }
}

fn detail_path(id: i32) -> String {
    format!("/asset/{id}")
}

fn created<T: Serialize>(location: String, body: T) -> Response {
    (StatusCode::CREATED, [(LOCATION, location)], Json(body)).into_response()
}

async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    enforce_api_key(request.headers(), &state.config)?;
    Ok(next.run(request).await)
}

fn enforce_api_key(headers: &HeaderMap, config: &AppConfig) -> Result<()> {
    if let Some(expected) = &config.api_key {
        let provided = headers
            .get("x-api-key")
            .and_then(|value| value.to_str().ok());

        if provided != Some(expected.as_str()) {
            return Err(ServiceError::Auth);
        }
    }

    Ok(())
}
