use crate::config::AppConfig;
use crate::engine::EngineHandle;
use crate::presence::RtdbPresenceSource;
use crate::router::{handle, AppState};
use crate::sources::{CollectionSource, PresenceSource};
use crate::store::{init_db, Database, SqliteCollectionSource};
use astra::Server;
use std::sync::Arc;
use tracing::{error, info, warn};

mod config;
mod engine;
mod errors;
mod logging;
mod presence;
mod responses;
mod router;
mod sources;
mod store;
mod templates;

#[cfg(test)]
mod tests;

fn main() {
    logging::init();

    let cfg = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let db = Database::new(cfg.db_path.clone());
    if let Err(e) = init_db(&db) {
        error!(path = %cfg.db_path, error = %e, "database initialization failed");
        std::process::exit(1);
    }

    let store = SqliteCollectionSource::new(db);

    if let Some(seed) = &cfg.seed_file {
        let imported = std::fs::read_to_string(seed)
            .map_err(|e| e.to_string())
            .and_then(|json| store.import(&cfg.collection, &json).map_err(|e| e.to_string()));
        match imported {
            Ok(n) => info!(file = %seed.display(), count = n, "seed documents imported"),
            Err(e) => {
                error!(file = %seed.display(), error = %e, "seed import failed");
                std::process::exit(1);
            }
        }
    }

    if let Some(interval) = cfg.watch_interval {
        if let Err(e) = store.watch(interval) {
            warn!(error = %e, "store watcher not started, external edits won't show up live");
        }
    }

    let presence: Option<Arc<dyn PresenceSource>> = match &cfg.presence_url {
        Some(url) => match RtdbPresenceSource::new(url, cfg.presence_auth.clone()) {
            Ok(source) => {
                info!(url = %url, "presence store configured");
                Some(Arc::new(source))
            }
            Err(e) => {
                warn!(url = %url, error = %e, "presence store unusable, continuing without it");
                None
            }
        },
        None => None,
    };

    let collection: Arc<dyn CollectionSource> = Arc::new(store);
    let (engine, engine_thread) = match EngineHandle::spawn(&cfg.collection, collection, presence) {
        Ok(spawned) => spawned,
        Err(e) => {
            error!(error = %e, "engine failed to start");
            std::process::exit(1);
        }
    };

    let app = AppState {
        engine: engine.clone(),
        page_size: cfg.page_size,
    };

    info!(addr = %cfg.addr, workers = cfg.workers, "starting server");
    let server = Server::bind(&cfg.addr).max_workers(cfg.workers);

    let result = server.serve(move |req, _info| match handle(req, &app) {
        Ok(resp) => resp,
        Err(err) => templates::html_error_response(err),
    });

    if let Err(e) = result {
        error!(error = %e, "server ended with error");
    }

    if engine.shutdown().is_ok() && engine_thread.join().is_err() {
        warn!("engine thread panicked during shutdown");
    }
    info!("server shut down cleanly");
}
