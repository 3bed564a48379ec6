//! Deep Zoom server - upload images and browse them as tile pyramids.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deep_zoom_server::{
    config::Config,
    server::{create_router, RouterConfig},
    storage::StorageLayout,
    tile::{PyramidEngine, TilingOptions, TilingService},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    print_banner();

    info!("Configuration:");
    info!("  Environment: {}", config.environment);
    info!("  Data directory: {}", config.data_dir.display());
    info!(
        "  Tiling: {}px tiles, {}px overlap",
        config.tile_size, config.overlap
    );
    info!(
        "  Upload limit: {}MB",
        config.max_upload_size / (1024 * 1024)
    );
    if config.environment.is_production() {
        info!("  Debug endpoints: disabled");
    } else {
        warn!("  Debug endpoints: ENABLED - set --environment production to hide them");
    }

    // Prepare storage
    let storage = StorageLayout::new(&config.data_dir);
    info!("");
    info!("Preparing storage...");
    if let Err(e) = storage.ensure_base_dirs().await {
        error!("  Failed to create data directories: {}", e);
        error!("");
        error!("  Please check:");
        error!(
            "    - The directory '{}' is writable",
            config.data_dir.display()
        );
        error!("    - There is free space on the device");
        return ExitCode::FAILURE;
    }
    info!("  Uploads: {}", storage.uploads_root().display());
    info!("  Tiles: {}", storage.tiles_root().display());
    info!("  Found {} stored image(s)", count_images(&storage).await);

    let options = TilingOptions {
        tile_size: config.tile_size,
        overlap: config.overlap,
    };
    let service = TilingService::with_options(PyramidEngine::new(), storage, options);

    let router = create_router(service, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/api/demo", addr);
    info!("");
    info!("  Upload an image:");
    info!(
        "    curl -F file=@image.png http://{}/api/images/upload",
        addr
    );
    info!("");
    info!("  Or open the viewer in your browser:");
    info!("    open http://{}/", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

/// Print the startup banner.
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("");
    info!("██████╗ ███████╗███████╗██████╗     ███████╗ ██████╗  ██████╗ ███╗   ███╗");
    info!("██╔══██╗██╔════╝██╔════╝██╔══██╗    ╚══███╔╝██╔═══██╗██╔═══██╗████╗ ████║");
    info!("██║  ██║█████╗  █████╗  ██████╔╝      ███╔╝ ██║   ██║██║   ██║██╔████╔██║");
    info!("██║  ██║██╔══╝  ██╔══╝  ██╔═══╝      ███╔╝  ██║   ██║██║   ██║██║╚██╔╝██║");
    info!("██████╔╝███████╗███████╗██║         ███████╗╚██████╔╝╚██████╔╝██║ ╚═╝ ██║");
    info!("╚═════╝ ╚══════╝╚══════╝╚═╝         ╚══════╝ ╚═════╝  ╚═════╝ ╚═╝     ╚═╝");
    info!("");
    info!("                                v{}", version);
}

/// Count image directories under the tiles root.
async fn count_images(storage: &StorageLayout) -> usize {
    let mut count = 0;
    if let Ok(mut entries) = tokio::fs::read_dir(storage.tiles_root()).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                count += 1;
            }
        }
    }
    count
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "deep_zoom_server=debug,tower_http=debug"
    } else {
        "deep_zoom_server=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_max_upload_size(config.max_upload_size)
        .with_environment(config.environment)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

/// Resolve when SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received, shutting down gracefully"),
        _ = terminate => info!("SIGTERM received, shutting down gracefully"),
    }
}
