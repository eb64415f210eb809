use anyhow::{Context, bail};
use cybersense::{
    AppState, CyberSenseConfig, QueryRequest, QueryResponse, build_app,
    cli::{
        Cli, Commands,
        init::{self, InitConfig, InitResult},
        output::Output,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Some(Commands::Init {
            path,
            force,
            host,
            port,
        }) => {
            let result = init::run(
                InitConfig {
                    path,
                    force,
                    host,
                    port,
                },
                &output,
            );
            match result {
                InitResult::Success | InitResult::AlreadyExists => Ok(()),
                InitResult::Error(e) => bail!("init failed: {}", e),
            }
        }
        Some(Commands::Config { full, validate }) => {
            let config = match CyberSenseConfig::load_or_default(&cli.config) {
                Ok(config) => config,
                Err(e) => {
                    output.error(&format!("Configuration is invalid: {}", e));
                    bail!("invalid configuration");
                }
            };
            show_config(&cli.config.display().to_string(), &config, full, validate, &output)
        }
        Some(Commands::Agents) => {
            let config = load_config(&cli.config, cli.verbose, cli.json_logs)?;
            let state = AppState::from_config(config).await?;
            output.header("Registered agents");
            output.newline();
            output.table_header(&["Agent", "Timeout", "Triggers"]);
            for info in state.registry.infos() {
                let timeout = format!("{}s", info.timeout_secs);
                let triggers = if info.triggers.is_empty() {
                    "(always first)".to_string()
                } else {
                    info.triggers.join(", ")
                };
                output.table_row(&[info.id.as_str(), timeout.as_str(), triggers.as_str()]);
            }
            Ok(())
        }
        Some(Commands::Ask {
            query,
            conversation_id,
            json,
        }) => {
            let config = load_config(&cli.config, cli.verbose, cli.json_logs)?;
            let state = AppState::from_config(config).await?;
            let mut request = QueryRequest::new(query);
            if let Some(id) = conversation_id {
                request = request.with_conversation_id(id);
            }

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_ctrl_c.cancel();
                }
            });

            let outcome = state.executor.run(request, cancel).await?;
            if json {
                let response = QueryResponse::from(outcome);
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                output.report(outcome.final_response().unwrap_or_default());
            }
            Ok(())
        }
        Some(Commands::Serve { host, port }) => {
            let config = load_config(&cli.config, cli.verbose, cli.json_logs)?;
            serve(config, host, port, &output).await
        }
        None => {
            let config = load_config(&cli.config, cli.verbose, cli.json_logs)?;
            serve(config, None, None, &output).await
        }
    }
}

/// Load configuration and install the tracing subscriber
fn load_config(
    path: &std::path::Path,
    verbose: bool,
    json_logs: bool,
) -> anyhow::Result<CyberSenseConfig> {
    let config = CyberSenseConfig::load_or_default(path)
        .with_context(|| format!("loading {}", path.display()))?;

    let default_level = if verbose {
        "debug".to_string()
    } else {
        config.server.log_level.clone()
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cybersense={0},tower_http={0}", default_level)));

    // stdout is reserved for reports and JSON output
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    if path.exists() {
        info!("Loaded configuration from {}", path.display());
    } else {
        info!("{} not found, using defaults", path.display());
    }
    Ok(config)
}

async fn serve(
    mut config: CyberSenseConfig,
    host: Option<String>,
    port: Option<u16>,
    output: &Output,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState::from_config(config).await?;
    let agents = state.registry.ids();
    let app = build_app(state);

    output.banner();
    output.kv("Listening", &format!("http://{}", addr));
    output.kv(
        "Agents",
        &agents
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;
    Ok(())
}

fn show_config(
    path: &str,
    config: &CyberSenseConfig,
    full: bool,
    validate: bool,
    output: &Output,
) -> anyhow::Result<()> {
    output.header("Configuration");
    output.kv("File", path);
    output.kv(
        "Server",
        &format!("{}:{}", config.server.host, config.server.port),
    );
    output.kv(
        "LLM",
        &if config.llm.enabled {
            format!("{} ({})", config.llm.provider, config.llm.model)
        } else {
            "disabled (template reports)".to_string()
        },
    );
    output.kv("Documents", &config.rag.documents_dir.display().to_string());
    output.kv(
        "Fan-out",
        if config.orchestration.parallel_fan_out {
            "parallel"
        } else {
            "sequential"
        },
    );

    if full {
        output.subheader("Full configuration");
        println!("{}", config.to_toml_string()?);
    }

    if validate {
        match config.validate() {
            Ok(()) => output.success("Configuration is valid"),
            Err(e) => {
                output.error(&format!("Configuration is invalid: {}", e));
                bail!("invalid configuration");
            }
        }
    }
    Ok(())
}
