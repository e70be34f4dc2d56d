use clap::Parser;
use file_gateway::{config::FileServerConfig, server};

#[derive(Parser, Debug)]
#[command(name = "file-gateway")]
#[command(about = "HTTP file server with hierarchical path lock scheduling")]
struct Cli {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Directory served as the namespace root (must end in '/')
    #[arg(long, default_value = "./files/")]
    root_dir: String,

    /// URL prefix for all file routes (must begin and end with '/')
    #[arg(long, default_value = "/")]
    url_prefix: String,

    #[arg(long)]
    log_dir: Option<String>,

    #[arg(long)]
    log_level: Option<String>,

    /// Maximum request body size in bytes
    #[arg(long, default_value_t = 100 * 1024 * 1024)]
    max_payload_size: usize,

    #[arg(long, num_args = 0..)]
    cors_allowed_origins: Vec<String>,

    #[arg(long, default_value_t = 5)]
    shutdown_grace_period_secs: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = FileServerConfig {
        host: cli.host,
        port: cli.port,
        root_dir: cli.root_dir,
        url_prefix: cli.url_prefix,
        max_payload_size: cli.max_payload_size,
        log_dir: cli.log_dir,
        log_level: cli.log_level,
        cors_allowed_origins: cli.cors_allowed_origins,
        shutdown_grace_period_secs: cli.shutdown_grace_period_secs,
    };

    if let Err(error) = server::startup(config).await {
        eprintln!("Server failed: {error}");
        std::process::exit(1);
    }
}
