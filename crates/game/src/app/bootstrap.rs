use std::env;
use std::sync::Arc;

use lanternvale_engine::{
    load_def_database, resolve_app_paths, DefError, LoopConfig, Scene, SceneId, StartupError,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::gameplay;
use super::net::{HttpSceneFetch, SceneService};
use super::prefs::{PrefsStore, PREFS_FILE_NAME};

const SCENE_URL_ENV_VAR: &str = "LANTERNVALE_SCENE_URL";
const INITIAL_SCENE_ENV_VAR: &str = "LANTERNVALE_INITIAL_SCENE";
const DEFAULT_SCENE_URL: &str = "http://127.0.0.1:8788";
const DEFAULT_INITIAL_SCENE: &str = "village";
const DEFS_FILE_NAME: &str = "defs.json";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to load tile definition table: {0}")]
    Defs(#[from] DefError),
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Lanternvale Startup ===");

    let paths = resolve_app_paths()?;
    info!(
        root = %paths.root.display(),
        asset_dir = %paths.asset_dir.display(),
        prefs_dir = %paths.prefs_dir.display(),
        "startup"
    );

    let def_db = load_def_database(&paths.asset_dir.join(DEFS_FILE_NAME))?;
    let prefs = PrefsStore::load(paths.prefs_dir.join(PREFS_FILE_NAME));

    let base_url =
        env::var(SCENE_URL_ENV_VAR).unwrap_or_else(|_| DEFAULT_SCENE_URL.to_string());
    let initial_scene =
        env::var(INITIAL_SCENE_ENV_VAR).unwrap_or_else(|_| DEFAULT_INITIAL_SCENE.to_string());
    info!(
        scene_url = base_url.as_str(),
        initial_scene = initial_scene.as_str(),
        "scene_source"
    );

    let scene_service = SceneService::new(Arc::new(HttpSceneFetch::new(base_url)));
    let scene = gameplay::build_world_scene(def_db, prefs, scene_service, SceneId(initial_scene));

    let config = LoopConfig {
        asset_root: paths.asset_dir,
        ..LoopConfig::default()
    };

    Ok(AppWiring { config, scene })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
