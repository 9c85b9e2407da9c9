use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use candle_core::Device;
use clap::{Args, Parser, Subcommand, ValueEnum};
use compose_core::loader::{self, ModelFiles};
use compose_core::{CancelToken, CompletionService, NoPrefixMatchPolicy};

use compose_server::api::{build_cors_layer, create_router_with_cors, AppState};
use compose_server::config::ServerConfig;
use compose_server::logging::{self, LogFormat};
use compose_server::shutdown::shutdown_signal;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;

#[derive(Parser)]
#[command(name = "compose-server", about = "Prefix-aware text completion")]
struct Cli {
    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve {
        #[command(flatten)]
        model: ModelArgs,

        /// Port to listen on [default: 8000]
        #[arg(long)]
        port: Option<u16>,

        /// Host to bind to [default: 0.0.0.0]
        #[arg(long)]
        host: Option<String>,

        /// Per-request decode deadline in milliseconds
        #[arg(long)]
        request_timeout_ms: Option<u64>,

        /// Comma-separated allowed CORS origins, or "*"
        #[arg(long)]
        allowed_origins: Option<String>,

        /// Write the effective configuration to the config file and continue
        #[arg(long)]
        save_config: bool,
    },
    /// Complete one text and print the ranked completions
    Complete {
        #[command(flatten)]
        model: ModelArgs,

        /// Text to complete; a trailing partial word constrains the first token
        #[arg(long)]
        text: String,

        /// Print the raw decoder output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Default)]
struct ModelArgs {
    /// Model directory or HuggingFace Hub id
    #[arg(long)]
    model: Option<String>,

    /// Compute device: cpu, cuda, or metal [default: cpu]
    #[arg(long)]
    device: Option<String>,

    #[arg(long)]
    beam_width: Option<usize>,

    /// Length normalization exponent; 0 ranks by raw log probability
    #[arg(long)]
    length_norm_power: Option<f32>,

    #[arg(long)]
    max_decode_length: Option<usize>,

    /// Drop sequences whose probability falls below this; 0 disables pruning
    #[arg(long)]
    min_seq_prob: Option<f32>,

    /// Behaviour when no token matches the partially typed word
    #[arg(long, value_enum)]
    no_prefix_match: Option<PolicyArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    ReturnEmpty,
    Unconstrained,
}

impl From<PolicyArg> for NoPrefixMatchPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::ReturnEmpty => NoPrefixMatchPolicy::ReturnEmpty,
            PolicyArg::Unconstrained => NoPrefixMatchPolicy::Unconstrained,
        }
    }
}

impl ModelArgs {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            model: self.model,
            device: self.device,
            beam_width: self.beam_width,
            length_norm_power: self.length_norm_power,
            max_decode_length: self.max_decode_length,
            min_seq_prob: self.min_seq_prob,
            no_prefix_match: self.no_prefix_match.map(Into::into),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, LogFormat::from_env())?;

    let mut config = ServerConfig::load();
    if let Some(path) = ServerConfig::default_path() {
        if path.exists() {
            tracing::info!(path = %path.display(), "loaded config file");
        }
    }

    match cli.command {
        Command::Serve {
            model,
            port,
            host,
            request_timeout_ms,
            allowed_origins,
            save_config,
        } => {
            config.merge(&ServerConfig {
                port,
                host,
                request_timeout_ms,
                allowed_origins,
                ..model.into_config()
            });
            if save_config {
                let path = config.save()?;
                tracing::info!(path = %path.display(), "saved config file");
            }
            serve(config).await
        }
        Command::Complete { model, text, json } => {
            config.merge(&model.into_config());
            let engine = load_service(&config)?;
            let output = tokio::task::spawn_blocking(move || {
                engine.complete(&text, &CancelToken::new())
            })
            .await??;

            if json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else if !output.exist_prefix {
                eprintln!("no vocabulary token matches the partially typed word");
            } else {
                for (rank, (text, score)) in output
                    .predicted_texts
                    .iter()
                    .zip(&output.predicted_scores)
                    .enumerate()
                {
                    println!("{:>2}. {score:>9.4}  {text}", rank + 1);
                }
            }
            Ok(())
        }
    }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let model_id = config
        .model
        .clone()
        .ok_or_else(|| anyhow::anyhow!("--model is required (or set `model` in the config file)"))?;
    let service = load_service(&config)?;

    let accepting = Arc::new(AtomicBool::new(true));
    let state = AppState::new(
        service,
        model_id,
        config.request_timeout_ms.map(Duration::from_millis),
        accepting.clone(),
    );
    let cors = build_cors_layer(config.allowed_origins.as_deref().unwrap_or("*"));
    let app = create_router_with_cors(state, cors);

    let host = config.host.as_deref().unwrap_or(DEFAULT_HOST);
    let port = config.port.unwrap_or(DEFAULT_PORT);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Serving on http://{addr}/v1");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(accepting))
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

fn load_service(config: &ServerConfig) -> anyhow::Result<Arc<dyn CompletionService>> {
    let model = config
        .model
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("--model is required (or set `model` in the config file)"))?;
    let files = resolve_model(model)?;
    let device = parse_device(config.device.as_deref().unwrap_or("cpu"))?;
    let engine = loader::load_engine(&files, config.search_config(), &device)?;
    Ok(Arc::new(engine))
}

fn resolve_model(model: &str) -> anyhow::Result<ModelFiles> {
    let path = Path::new(model);
    if path.is_dir() {
        tracing::info!(path = %path.display(), "loading model directory");
        loader::load_from_dir(path)
    } else {
        tracing::info!(model, "fetching model from HuggingFace Hub");
        loader::fetch_model(model)
    }
}

fn parse_device(name: &str) -> anyhow::Result<Device> {
    match name.to_ascii_lowercase().as_str() {
        "cpu" => Ok(Device::Cpu),
        "cuda" => Ok(Device::new_cuda(0)?),
        "metal" => Ok(Device::new_metal(0)?),
        other => anyhow::bail!("unknown device '{other}', expected cpu, cuda, or metal"),
    }
}
