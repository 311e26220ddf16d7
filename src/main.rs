use anyhow::Result;
use clap::{Parser, Subcommand};
use copilot_completer::auth::{self, TokenStore};
use copilot_completer::transport;
use copilot_completer::Config;
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "copilot-completer")]
#[command(author, version, about = "GitHub Copilot suggestions for interactive Python shells", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to GitHub with the device flow and store the access token
    Login,

    /// Remove the stored access token
    Logout,

    /// Show authentication status and settings
    Status,

    /// Print a suggestion for the last line of TEXT (reads stdin when omitted)
    Suggest {
        /// Buffer text to complete
        text: Option<String>,

        /// Newline-delimited session history used as context
        #[arg(long)]
        history: Option<PathBuf>,

        /// Token fragment under the cursor, prepended to the suggestion
        #[arg(long, default_value = "")]
        fragment: String,
    },

    /// Start the local HTTP server used by the shell extension
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "copilot_completer=debug"
    } else {
        "copilot_completer=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load()?;

    match cli.command {
        Commands::Login => {
            transport::cli::run_login(&config).await?;
        }
        Commands::Logout => {
            transport::cli::run_logout().await?;
        }
        Commands::Status => {
            transport::cli::run_status(&config).await?;
        }
        Commands::Suggest {
            text,
            history,
            fragment,
        } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf.trim_end_matches('\n').to_string()
                }
            };
            transport::cli::run_suggest(&config, &text, history.as_deref(), &fragment).await?;
        }
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }

            let store = TokenStore::new().ok();
            let token = auth::resolve_access_token(&config, store.as_ref()).map(|(token, source)| {
                tracing::info!("Using GitHub access token from {}", source);
                token
            });

            tracing::info!(
                "Starting HTTP server on {}:{} ({} mode)",
                config.server.host,
                config.server.port,
                config.suggest.mode
            );
            transport::http::run_http_server(&config, token).await?;
        }
    }

    Ok(())
}
