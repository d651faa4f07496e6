mod server;

use clap::{Parser, Subcommand};
use sos_core::{config, BlobClient, Replicator, ServerRegistry};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "sos")]
#[command(about = "Simple object storage", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch a blob-server to handle the back-end storage
    BlobServer {
        /// The IP to listen upon
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// The port to bind upon
        #[arg(long, default_value_t = 3001)]
        port: u16,
        /// The location to write the data to
        #[arg(long, default_value = "data")]
        store: String,
    },
    /// Launch an API-server to handle the upload/download of objects
    ApiServer {
        /// The IP to listen upon
        #[arg(long = "api-host", default_value = "0.0.0.0")]
        host: String,
        /// Comma-separated list of blob-servers to contact
        #[arg(long = "blob-server")]
        blob_server: Option<String>,
        /// The port to bind upon for uploading objects
        #[arg(long, default_value_t = 9991)]
        upload_port: u16,
        /// The port to bind upon for downloading objects
        #[arg(long, default_value_t = 9992)]
        download_port: u16,
        /// Dump configuration and exit
        #[arg(long)]
        dump: bool,
        /// Show more output from the API-server
        #[arg(long)]
        verbose: bool,
    },
    /// Trigger a single run of the replication/balancing operation
    Replicate {
        /// Comma-separated list of blob-servers to contact
        #[arg(long = "blob-server")]
        blob_server: Option<String>,
        /// Be more verbose
        #[arg(long)]
        verbose: bool,
    },
    /// Report upon our version, and exit
    Version {
        /// Show the toolchain the binary was built with
        #[arg(long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::BlobServer { host, port, store } => {
            init_tracing(false);
            if let Err(error) = server::run_blob_server(&host, port, &store).await {
                tracing::error!("blob-server error: {}", error);
                std::process::exit(1);
            }
        }
        Commands::ApiServer {
            host,
            blob_server,
            upload_port,
            download_port,
            dump,
            verbose,
        } => {
            init_tracing(verbose);
            let registry = registry_or_exit(blob_server.as_deref());

            if dump {
                dump_registry(&registry);
                return;
            }

            if let Err(error) =
                server::run_api_server(&host, upload_port, download_port, Arc::new(registry)).await
            {
                tracing::error!("API-server error: {}", error);
                std::process::exit(1);
            }
        }
        Commands::Replicate {
            blob_server,
            verbose,
        } => {
            init_tracing(verbose);
            let registry = registry_or_exit(blob_server.as_deref());
            Replicator::new(Arc::new(registry), BlobClient::new())
                .run()
                .await;
        }
        Commands::Version { verbose } => {
            show_version(verbose);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_directives = if verbose {
        "sos_core=debug,sos_server=debug"
    } else {
        "sos_core=info,sos_server=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directives.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Servers given via `--blob-server` land in the `default` group and
/// replace config-file loading entirely; otherwise `/etc/sos.conf` and
/// `~/.sos.conf` apply.
fn registry_or_exit(blob_servers: Option<&str>) -> ServerRegistry {
    let mut registry = ServerRegistry::new();

    match blob_servers {
        Some(list) => {
            for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                registry.add_server(config::DEFAULT_GROUP, entry);
            }
        }
        None => {
            if let Err(error) = config::init_servers(&mut registry) {
                tracing::error!("failed to load server configuration: {}", error);
                std::process::exit(1);
            }
        }
    }

    registry
}

fn dump_registry(registry: &ServerRegistry) {
    println!("\t{:>10} - {}", "group", "server");
    for entry in registry.servers() {
        println!("\t{:>10} - {}", entry.group, entry.location);
    }
}

fn show_version(verbose: bool) {
    println!("{}", env!("CARGO_PKG_VERSION"));
    if verbose {
        println!("Built with {}", env!("SOS_BUILD_RUSTC"));
    }
}
