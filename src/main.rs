//! Network Interceptor - CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use http::Method;
use network_interceptor::{
    InterceptedRequest, InterceptorConfig, NetworkInterceptor, Session,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_URL: &str =
    "https://rss.itunes.apple.com/api/v1/kr/apple-music/top-songs/all/50/explicit.json";

#[derive(Parser, Debug)]
#[command(
    name = "network-interceptor",
    about = "Send a request through the network interceptor and print the stubbed response",
    version
)]
struct Args {
    /// URL to request
    #[arg(default_value = DEFAULT_URL)]
    url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    method: Method,

    /// Path to configuration file
    #[arg(short, long, default_value = "network-interceptor.yaml")]
    config: PathBuf,

    /// Read fixtures from this directory (overrides the configuration)
    #[arg(long, value_name = "DIR")]
    fixtures_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// List the installed stubs and exit
    #[arg(long)]
    list_stubs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        let default_config = include_str!("../demos/default-config.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    // Load configuration
    let mut config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        InterceptorConfig::from_file(&args.config)?
    } else if args.validate {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration (bundled fixtures)");
        InterceptorConfig::default()
    };

    if let Some(dir) = args.fixtures_dir {
        config.fixtures.dir = Some(dir);
        config.validate()?;
    }

    let interceptor = Arc::new(
        NetworkInterceptor::from_config(&config).context("failed to build stub registry")?,
    );

    if args.validate {
        println!(
            "Configuration is valid ({} stubs installed)",
            interceptor.registry().len()
        );
        return Ok(());
    }

    if args.list_stubs {
        for stub in interceptor.registry().iter() {
            let outcome = match (&stub.error, &stub.payload) {
                (Some(error), _) => format!("error {}", error),
                (None, Some(payload)) => format!("{} bytes", payload.len()),
                (None, None) => "empty body".to_string(),
            };
            println!(
                "{:<8} {:<28} {} {}",
                stub.id,
                stub.path_fragment,
                stub.status.as_u16(),
                outcome
            );
        }
        return Ok(());
    }

    let session = Session::builder()
        .register(interceptor.clone())
        .context("failed to install network interceptor")?
        .build();
    info!(handlers = ?session.handler_names(), "Network interceptor registered");

    let request = InterceptedRequest::parse(args.method, &args.url)
        .with_context(|| format!("invalid URL: {}", args.url))?;

    let outcome = session.send(request).await;
    info!(stats = ?interceptor.stats(), "Request finished");

    let response = match outcome {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, url = %args.url, "Request failed");
            return Err(e.into());
        }
    };

    println!("{:?} {}", response.head.version, response.status());
    match response.json::<serde_json::Value>() {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if response.body.is_empty() => {}
        Err(_) => println!("{}", response.text()),
    }

    Ok(())
}
