//! pyexec server binary.
//!
//! Wires configuration, storage, the Docker runtime, the execution engine
//! and the HTTP router together, then serves until interrupted. All
//! configuration comes from `PYEXEC_*` environment variables.

use std::sync::Arc;

use anyhow::{Context, Result};
use pyexec_core::{
    Config, ConsulStore, ContainerRuntime, DockerRuntime, ExecutionEngine, JobManager, JobStore,
    MemoryStore,
};
use pyexec_server::{build_router, serve, spawn_cleanup, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(Config::from_env());

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.server.log_level),
    )
    .init();

    log::info!(
        "starting pyexec server on {} (default image {}, cleanup ttl {:?})",
        config.server.addr(),
        config.defaults.image,
        config.cleanup.ttl
    );

    let store = select_store(&config).await;

    let runtime: Arc<dyn ContainerRuntime> = Arc::new(
        DockerRuntime::new(&config.docker.socket)
            .context("connecting to the Docker daemon")?,
    );

    let engine = Arc::new(ExecutionEngine::new(runtime.clone(), config.clone()));
    let manager = JobManager::new(store.clone(), runtime, engine);

    spawn_cleanup(store, config.cleanup.ttl);

    let addr = config.server.addr();
    let router = build_router(AppState { manager, config });
    serve(router, &addr).await.context("server error")?;

    log::info!("server exited");
    Ok(())
}

/// Pick the record store: Consul when configured and reachable, the
/// in-memory map otherwise.
async fn select_store(config: &Config) -> Arc<dyn JobStore> {
    if config.consul.enabled {
        let store = ConsulStore::new(
            &config.consul.address,
            &config.consul.key_prefix,
            config.consul.token.clone(),
        );
        match store.ping().await {
            Ok(()) => {
                log::info!("using consul storage at {}", config.consul.address);
                return Arc::new(store);
            }
            Err(e) => {
                log::warn!("consul unreachable ({e}), falling back to in-memory storage");
            }
        }
    } else {
        log::info!("using in-memory storage");
    }
    Arc::new(MemoryStore::new())
}
