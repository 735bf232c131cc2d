use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::sync::mpsc;

use h1_guard::config::{load_config, validate_config, ConfigError, ConfigWatcher, ServerConfig};
use h1_guard::http::HttpServer;
use h1_guard::lifecycle::signals::spawn_signal_handler;
use h1_guard::lifecycle::Shutdown;
use h1_guard::net::Listener;
use h1_guard::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "h1-guard")]
#[command(about = "HTTP/1.1 server enforcing request header limits", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,

    /// Override limits.max_request_header_count
    #[arg(long)]
    max_header_count: Option<usize>,

    /// Override limits.max_request_headers_total_size
    #[arg(long)]
    max_headers_total_size: Option<usize>,

    /// Reload the configuration file when it changes
    #[arg(long, requires = "config")]
    watch: bool,
}

impl Cli {
    fn load(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(count) = self.max_header_count {
            config.limits.max_request_header_count = Some(count);
        }
        if let Some(size) = self.max_headers_total_size {
            config.limits.max_request_headers_total_size = Some(size);
        }
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.load()?;

    logging::init(&config.observability);
    tracing::info!("h1-guard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        max_header_count = ?config.limits.max_request_header_count,
        max_headers_total_size = ?config.limits.max_request_headers_total_size,
        max_request_line_size = ?config.limits.max_request_line_size,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    // The watcher handle must outlive the server for updates to keep flowing.
    let (config_updates, _watcher) = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (updates, None)
        }
    };

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let _signals = spawn_signal_handler(shutdown);

    let server = HttpServer::with_default_handler(config);
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
