//! formflow - conversational form engine
//!
//! Drives per-chat form sessions over an HTTP chat transport, persists
//! completed submissions and forwards them to a webhook.

mod api;
mod config;
mod dispatch;
mod engine;
mod persistence;
mod session;
mod state_machine;
mod submission;
mod template;
mod validate;

use api::{create_router, AppState, ChatHub};
use clap::{Args, Parser, Subcommand};
use config::Config;
use dispatch::{DispatcherConfig, SubmissionDispatcher, WebhookNotifier};
use engine::FormEngine;
use persistence::{AdaptorRegistry, Persistence};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use template::{FormTemplate, TemplateError};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "formflow", version, about = "Conversational form engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the form over the HTTP chat transport
    Serve(Paths),
    /// Check a form definition and print every problem found
    Validate {
        /// Form definition (JSON)
        #[arg(short = 'f', long = "form")]
        form: PathBuf,
    },
    /// Create the form's table in the configured database
    Migrate(Paths),
}

#[derive(Args)]
struct Paths {
    /// Form definition (JSON)
    #[arg(short = 'f', long = "form")]
    form: PathBuf,
    /// Process configuration (YAML)
    #[arg(short = 'c', long = "config", default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Validate { form } => {
            init_logging(false);
            validate(&form)
        }
        Command::Migrate(paths) => {
            let config = config::load_config(&paths.config)?;
            init_logging(config.debug_mode);
            let template = load_template(&paths.form)?;
            let persistence = open_persistence(&config, &template)?;
            let outcome = persistence.migrate(&template)?;
            tracing::info!(table = template.table_name(), outcome = ?outcome, "Migration finished");
            Ok(())
        }
        Command::Serve(paths) => {
            let config = config::load_config(&paths.config)?;
            init_logging(config.debug_mode);
            let template = load_template(&paths.form)?;
            serve(&config, template).await
        }
    }
}

fn init_logging(debug_mode: bool) {
    let default_filter = if debug_mode {
        "formflow=debug,tower_http=debug"
    } else {
        "formflow=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();
}

fn validate(form: &Path) -> Result<(), Box<dyn std::error::Error>> {
    match FormTemplate::load(form) {
        Ok(template) => {
            println!(
                "{}: form '{}' with {} fields is valid",
                form.display(),
                template.form_name(),
                template.len()
            );
            Ok(())
        }
        Err(e) => {
            for problem in e.problems() {
                eprintln!("{}: {problem}", form.display());
            }
            Err(e.into())
        }
    }
}

fn load_template(form: &Path) -> Result<FormTemplate, TemplateError> {
    let template = FormTemplate::load(form).inspect_err(|e| {
        for problem in e.problems() {
            tracing::error!(form = %form.display(), problem = %problem, "Invalid form definition");
        }
    })?;
    tracing::info!(
        form = template.form_name(),
        fields = template.len(),
        review = template.review_enabled(),
        "Form loaded"
    );
    Ok(template)
}

fn open_persistence(
    config: &Config,
    template: &FormTemplate,
) -> Result<Persistence, persistence::PersistenceError> {
    persistence::check_target(&config.database, template)?;
    Persistence::open(&config.database, &AdaptorRegistry::with_builtin())
}

async fn serve(config: &Config, template: FormTemplate) -> Result<(), Box<dyn std::error::Error>> {
    let persistence = open_persistence(config, &template)?;
    let outcome = persistence.migrate(&template)?;
    tracing::info!(adaptor = ?persistence.adaptor_name(), outcome = ?outcome, "Schema ready");

    let dispatcher = if config.webhook.enabled {
        let notifier = Arc::new(WebhookNotifier::new(&config.webhook)?);
        Some(Arc::new(SubmissionDispatcher::start(
            DispatcherConfig::from(&config.webhook),
            notifier,
        )))
    } else {
        tracing::warn!("Webhook disabled, submissions are only persisted");
        None
    };

    let engine = FormEngine::new(
        Arc::new(template),
        Arc::new(ChatHub::default()),
        persistence,
        dispatcher.clone(),
        config.session_timeout(),
    );
    let state = AppState::new(engine);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("formflow listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(dispatcher) = dispatcher {
        dispatcher.shutdown().await;
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
