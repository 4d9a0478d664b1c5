use anyhow::Context;
use clap::Parser;
use scormtrack::engine::{CommitHandler, InMemoryContentPackages};
use scormtrack::store::{snapshot, TrackingStore};
use scormtrack::{ContentId, EngineConfig, ScormVersion};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// SCORM run-time tracking server.
#[derive(Debug, Parser)]
#[command(name = "scormtrack-server")]
struct Cli {
    /// Bind port (overrides SCORMTRACK_PORT).
    #[arg(long)]
    port: Option<u16>,

    /// Store snapshot file (overrides SCORMTRACK_SNAPSHOT).
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Content package registration, `<id>=<scorm_version>:<entry_file>`,
    /// e.g. `intro-course=2004:index.html`. Repeatable.
    #[arg(long = "package", value_name = "SPEC")]
    packages: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = EngineConfig::from_env().map_err(anyhow::Error::msg)?;
    if let Some(port) = cli.port {
        config = config.port(port);
    }
    if let Some(path) = cli.snapshot {
        config = config.snapshot_path(path);
    }

    let store = match &config.snapshot_path {
        Some(path) if path.exists() => {
            let state = snapshot::load(path)
                .with_context(|| format!("load snapshot from {}", path.display()))?;
            tracing::info!(path = %path.display(), "store restored from snapshot");
            TrackingStore::from_state(state)
        }
        _ => TrackingStore::new(),
    };

    let mut packages = InMemoryContentPackages::new();
    for spec in &cli.packages {
        let (content, version, entry) = parse_package_spec(spec)?;
        packages.register(content, version, &entry);
    }

    let store = Arc::new(store);
    let handler = Arc::new(CommitHandler::new(store.clone(), Arc::new(packages)));
    let app = scormtrack::web::router(handler);

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, "scormtrack listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(path) = &config.snapshot_path {
        snapshot::save(store.export_state().await, path)
            .with_context(|| format!("save snapshot to {}", path.display()))?;
    }
    Ok(())
}

fn parse_package_spec(spec: &str) -> anyhow::Result<(ContentId, ScormVersion, String)> {
    let (id, rest) = spec
        .split_once('=')
        .with_context(|| format!("package spec '{spec}' is missing '='"))?;
    let (version_tag, entry) = rest.split_once(':').unwrap_or((rest, "index.html"));
    let version = ScormVersion::from_tag(version_tag)
        .with_context(|| format!("package spec '{spec}' has unknown version '{version_tag}'"))?;
    Ok((ContentId(id.to_string()), version, entry.to_string()))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to install ctrl-c handler");
    }
}
