use clap::{Parser, Subcommand};
use doorbot_core::config::{AppConfig, ReplyStrategyKind};
use doorbot_core::secrets::mask_secret;
use doorbot_line::LineClient;
use doorbot_reply::openai::OpenAiProvider;
use doorbot_reply::{CompletionOptions, ReplyGenerator};
use doorbot_server::{AppState, Gateway};
use doorbot_store::{CredentialResolver, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};

const VERSION: &str = "0.1.0";

/// How long resolved webhook credentials stay cached before the next
/// delivery re-reads the tenant row.
const CREDENTIAL_TTL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "doorbot")]
#[command(version = VERSION)]
#[command(about = "Multi-tenant LINE messaging service for real-estate agencies")]
struct Cli {
    /// Path to the config file (defaults to ~/.doorbot/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook gateway server
    Serve,
    /// Show effective configuration
    Status,
    /// Manage tenants
    Tenant {
        #[command(subcommand)]
        action: TenantActions,
    },
}

#[derive(Subcommand)]
enum TenantActions {
    /// Create a tenant (or update its display name)
    Create {
        /// Tenant id, used in the webhook URL path
        id: String,
        /// Display name shown in replies
        #[arg(short, long)]
        name: String,
    },
    /// Store the LINE channel credentials for a tenant
    SetLine {
        /// Tenant id
        id: String,
        /// LINE channel secret (signs inbound webhooks)
        #[arg(long)]
        channel_secret: String,
        /// LINE channel access token (authorizes outbound replies)
        #[arg(long)]
        access_token: String,
    },
    /// Show a tenant's LINE configuration (secrets masked)
    Show {
        /// Tenant id
        id: String,
    },
}

fn build_generator(config: &AppConfig) -> ReplyGenerator {
    match config.reply.strategy {
        ReplyStrategyKind::Keyword => ReplyGenerator::Keyword,
        ReplyStrategyKind::Ai => match &config.reply.completion {
            Some(completion) => ReplyGenerator::Completion {
                provider: Arc::new(OpenAiProvider::new(
                    completion.api_key.clone(),
                    completion.api_base.clone(),
                )),
                options: CompletionOptions {
                    model: completion.model.clone(),
                    max_tokens: completion.max_tokens,
                    temperature: completion.temperature,
                },
                call_timeout: Duration::from_secs(completion.timeout_secs),
            },
            None => {
                warn!("reply.strategy is 'ai' but reply.completion is not set, using keyword rules");
                ReplyGenerator::Keyword
            }
        },
    }
}

async fn run_serve(config: AppConfig) -> anyhow::Result<()> {
    let store = SqliteStore::new(&config.database.url).await?;
    let credentials = Arc::new(CredentialResolver::new(store.clone(), CREDENTIAL_TTL));
    let sender = Arc::new(LineClient::new(config.line.api_base.clone()));
    let generator = Arc::new(build_generator(&config));

    let public_url = config
        .server
        .public_url
        .clone()
        .unwrap_or_else(|| format!("http://{}:{}", config.server.bind, config.server.port));

    let state = AppState {
        store,
        credentials,
        sender,
        generator,
        public_url,
    };

    let gateway = Gateway::new(state, config.server.bind.clone(), config.server.port);

    info!(
        bind = %config.server.bind,
        port = config.server.port,
        "starting doorbot gateway"
    );
    println!("doorbot v{} listening on {}:{}", VERSION, config.server.bind, config.server.port);
    println!("Press Ctrl+C to stop");

    tokio::select! {
        result = gateway.start() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            Ok(())
        }
    }
}

fn run_status(config: &AppConfig) {
    println!("doorbot v{}\n", VERSION);
    println!("Server:   {}:{}", config.server.bind, config.server.port);
    match &config.server.public_url {
        Some(url) => println!("Public:   {}", url),
        None => println!("Public:   not set (webhook URLs use the bind address)"),
    }
    println!("Database: {}", config.database.url);
    let strategy = match config.reply.strategy {
        ReplyStrategyKind::Keyword => "keyword",
        ReplyStrategyKind::Ai => "ai",
    };
    println!("Strategy: {}", strategy);
    if config.reply.strategy == ReplyStrategyKind::Ai {
        match &config.reply.completion {
            Some(completion) => {
                println!("Model:    {}", completion.model);
                println!("API key:  {}", mask_secret(&completion.api_key));
            }
            None => println!("Model:    not configured (will fall back to keyword rules)"),
        }
    }
}

async fn run_tenant(config: &AppConfig, action: &TenantActions) -> anyhow::Result<()> {
    let store = SqliteStore::new(&config.database.url).await?;

    match action {
        TenantActions::Create { id, name } => {
            store.create_tenant(id, name).await?;
            println!("✓ Tenant '{}' ({}) ready", name, id);
        }
        TenantActions::SetLine {
            id,
            channel_secret,
            access_token,
        } => {
            if channel_secret.is_empty() || access_token.is_empty() {
                anyhow::bail!("channel secret and access token must be non-empty");
            }
            if !store.save_line_settings(id, channel_secret, access_token).await? {
                anyhow::bail!("tenant '{}' not found; create it first", id);
            }
            println!("✓ LINE credentials stored for '{}'", id);
            println!(
                "  Webhook URL: {}/webhooks/line/{}",
                config
                    .server
                    .public_url
                    .as_deref()
                    .unwrap_or("http://<public-host>")
                    .trim_end_matches('/'),
                id
            );
        }
        TenantActions::Show { id } => {
            let name = store
                .tenant_name(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("tenant '{}' not found", id))?;
            println!("Tenant: {} ({})", name, id);
            let settings = store.line_settings(id).await?.unwrap_or_else(|| {
                doorbot_store::TenantLineSettings {
                    channel_secret: None,
                    access_token: None,
                }
            });
            match settings.channel_secret.filter(|s| !s.is_empty()) {
                Some(secret) => println!("Channel secret: {}", mask_secret(&secret)),
                None => println!("Channel secret: not set"),
            }
            match settings.access_token.filter(|s| !s.is_empty()) {
                Some(token) => println!("Access token:   {}", mask_secret(&token)),
                None => println!("Access token:   not set"),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.clone())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    match &cli.command {
        Some(Commands::Serve) | None => run_serve(config).await,
        Some(Commands::Status) => {
            run_status(&config);
            Ok(())
        }
        Some(Commands::Tenant { action }) => run_tenant(&config, action).await,
    }
}
