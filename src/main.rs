use airhealth_signals::api;
use airhealth_signals::api::auth::{AccessPolicy, AllowAll, SharedToken};
use airhealth_signals::config;
use airhealth_signals::engine::facade::Dashboard;
use airhealth_signals::predictor;
use airhealth_signals::state::AppState;
use airhealth_signals::store::json::JsonDatasetStore;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::Level;

fn init_tracing(level: Level) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(config.log_level());
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "airhealth-signals starting"
    );

    let store = match config.dataset_path() {
        Some(path) => JsonDatasetStore::load_from_path(path)?,
        None => {
            tracing::warn!("No dataset path configured in [data].path, serving empty dataset");
            JsonDatasetStore::default()
        }
    };

    let dashboard = Dashboard::new(Arc::new(store), config.thresholds);
    let state = Arc::new(RwLock::new(AppState::new(config.app.name.clone(), dashboard)));

    // Load predictors; a failed model leaves its endpoint unavailable
    let model_paths = [
        ("air_quality", config.air_quality_model_path()),
        ("activity", config.activity_model_path()),
    ];
    for (slot, path) in model_paths {
        let Some(path) = path else {
            tracing::info!(slot, "No model path configured, predictor disabled");
            continue;
        };
        install_predictor(&state, slot, path);
    }

    let policy: Arc<dyn AccessPolicy> = match config.auth_token() {
        Some(token) => {
            tracing::info!("Shared token authentication enabled");
            Arc::new(SharedToken::new(token))
        }
        None => {
            tracing::warn!("No [auth].token configured, API is open");
            Arc::new(AllowAll)
        }
    };

    let app = api::router(Arc::clone(&state), policy);
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn install_predictor(state: &Arc<RwLock<AppState>>, slot: &str, path: &Path) {
    let predictor = match predictor::load_predictor_from_path(path) {
        Ok(predictor) => predictor,
        Err(err) => {
            tracing::warn!(slot, path = %path.display(), error = %err, "Failed to load model");
            return;
        }
    };
    if predictor.schema().as_str() != slot {
        tracing::warn!(
            slot,
            schema = %predictor.schema(),
            path = %path.display(),
            "Model schema does not match its slot, predictor disabled"
        );
        return;
    }
    tracing::info!(slot, path = %path.display(), model = predictor.name(), "Model loaded");
    if let Ok(mut guard) = state.write() {
        guard.set_predictor(Arc::from(predictor));
    } else {
        tracing::warn!("State lock poisoned while applying model");
    }
}
