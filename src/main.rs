use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use forward_proxy::{ForwardProxy, create_default_config, load_config, logging};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "PROXY_PORT")]
    port: Option<u16>,

    /// Host to bind to (overrides config file)
    #[arg(long, env = "PROXY_HOST")]
    host: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", env = "PROXY_CONFIG")]
    config: String,

    /// Number of worker threads (defaults to number of CPU cores)
    #[arg(short, long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let num_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);
    let worker_threads = args.threads.unwrap_or(num_cpus);

    // A single-threaded runtime avoids cross-core wakeups when one core is enough
    if worker_threads == 1 {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(run_proxy(args))
    } else {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .enable_all()
            .build()?;
        rt.block_on(run_proxy(args))
    }
}

async fn run_proxy(args: Args) -> Result<()> {
    // Load configuration, creating a default file on first run
    let mut config = if std::path::Path::new(&args.config).exists() {
        match load_config(&args.config) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config file '{}': {e:#}", args.config);
                return Err(e);
            }
        }
    } else {
        let default_config = create_default_config();
        let config_toml = toml::to_string_pretty(&default_config)?;
        std::fs::write(&args.config, &config_toml)?;
        default_config
    };

    if let Some(port) = args.port {
        config.listener.port = port;
    }
    if let Some(host) = args.host {
        config.listener.host = host;
    }

    logging::init_logging(config.log_file.as_deref());

    info!(
        blocked_hosts = config.blocked_hosts.len(),
        connect_timeout_secs = config.connect_timeout_secs,
        "Configuration loaded"
    );

    let proxy = Arc::new(ForwardProxy::new(&config));

    let listen_addr = config.listen_addr();
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Proxy listening on {}", listen_addr);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let proxy_clone = proxy.clone();
                    tokio::spawn(async move {
                        proxy_clone.handle_client(stream, addr).await;
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
            () = &mut shutdown => break,
        }
    }

    let snapshot = proxy.metrics().snapshot();
    info!(
        total_connections = snapshot.total_connections,
        active_connections = snapshot.active_connections,
        client_bytes = snapshot.client_bytes,
        server_bytes = snapshot.server_bytes,
        uptime = %snapshot.format_uptime(),
        "Shutdown signal received"
    );
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
