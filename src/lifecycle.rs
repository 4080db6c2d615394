//! Startup sequence and HTTP serving.
//!
//! Resources are loaded and the mailer is built before anything else; the
//! store connection and reminder polling start in the background and only
//! degrade the service when they fail. The listener is bound last.

use std::{error::Error, fmt, sync::Arc};

use axum::Router;
use tokio::{net::TcpListener, signal, task::JoinHandle};

use crate::{
  app::create_app,
  config::{Config, MailerServerConfig, ReminderConfig},
  domains::reminder::{
    repository::{PgStoreConnector, StoreConnector},
    service::ReminderPoller,
  },
  email::{MailConfig, Mailer, MailerError},
  resources::{load_resources, FsTemplateLoader, FsTranslatorLoader, LoadError, TemplateLoader, TranslatorLoader},
  state::SharedAppState,
};

/// Exit status for any failure before the service is listening.
pub const INIT_FAILURE_EXIT_CODE: u8 = 8;

#[derive(Debug)]
pub enum StartupError {
  Config(String),
  Resources(LoadError),
  Mailer(MailerError),
  Bind { address: String, message: String },
  Serve(String),
}

impl StartupError {
  pub fn exit_code(&self) -> u8 {
    match self {
      StartupError::Serve(_) => 1,
      _ => INIT_FAILURE_EXIT_CODE,
    }
  }
}

impl Error for StartupError {}

impl fmt::Display for StartupError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StartupError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
      StartupError::Resources(e) => write!(f, "{}", e),
      StartupError::Mailer(e) => write!(f, "Failed to create mailer: {}", e),
      StartupError::Bind { address, message } => write!(f, "Failed to bind {}: {}", address, message),
      StartupError::Serve(msg) => write!(f, "Server error: {}", msg),
    }
  }
}

/// The external services the startup sequence depends on.
pub struct Collaborators {
  pub translations: Arc<dyn TranslatorLoader>,
  pub templates: Arc<dyn TemplateLoader>,
  pub store: Arc<dyn StoreConnector>,
}

impl Collaborators {
  pub fn from_config(config: &Config) -> Self {
    Self {
      translations: Arc::new(FsTranslatorLoader::new(&config.i18n.locales_dir)),
      templates: Arc::new(FsTemplateLoader::new(&config.templates_dir)),
      store: Arc::new(PgStoreConnector::new(config.database.clone())),
    }
  }
}

/// A fully initialized service that has not bound its listener yet.
pub struct Service {
  server: MailerServerConfig,
  app: Router,
  /// Resolves to the poller's task once the store is connected, or `None`
  /// when the service runs without reminders.
  pub reminders: JoinHandle<Option<JoinHandle<()>>>,
}

impl Service {
  pub async fn initialize(config: Config, collaborators: Collaborators) -> Result<Self, StartupError> {
    let (translator, templates) = load_resources(
      collaborators.translations.as_ref(),
      collaborators.templates.as_ref(),
      &config.i18n,
    )
    .await
    .map_err(StartupError::Resources)?;

    let mail_config = MailConfig {
      smtp: config.smtp.clone(),
      content_server_url: config.content_server_url.clone(),
    };
    let mailer = Arc::new(Mailer::new(translator, templates, &mail_config).map_err(StartupError::Mailer)?);

    tracing::info!(config = ?config, "config");
    tracing::info!(mail_config = ?config.smtp, "mail_config");
    tracing::info!(mailer_server_config = ?config.server, "mailer_server_config");
    tracing::info!(templates = ?mailer.template_names(), "templates");

    let reminders = start_reminders(mailer.clone(), collaborators.store, config.reminders.clone());
    let app = create_app(SharedAppState::new(mailer));

    Ok(Service {
      server: config.server,
      app,
      reminders,
    })
  }

  pub fn router(&self) -> Router {
    self.app.clone()
  }

  pub async fn serve(self) -> Result<(), StartupError> {
    let address = self.server.address();
    let listener = TcpListener::bind(&address).await.map_err(|e| StartupError::Bind {
      address: address.clone(),
      message: e.to_string(),
    })?;

    tracing::info!(host = %self.server.host, port = self.server.port, "listening");

    axum::serve(listener, self.app)
      .with_graceful_shutdown(shutdown_signal())
      .await
      .map_err(|e| StartupError::Serve(e.to_string()))
  }
}

/// Connects to the store once and starts polling if that succeeds.
fn start_reminders(
  mailer: Arc<Mailer>,
  connector: Arc<dyn StoreConnector>,
  config: ReminderConfig,
) -> JoinHandle<Option<JoinHandle<()>>> {
  tokio::spawn(async move {
    match connector.connect().await {
      Ok(store) => Some(ReminderPoller::new(mailer, store, config).spawn()),
      Err(e) => {
        tracing::error!(op = "server", error = %e, "store connection failed, verification reminders disabled");
        None
      }
    }
  })
}

pub async fn run(config: Config, collaborators: Collaborators) -> Result<(), StartupError> {
  Service::initialize(config, collaborators).await?.serve().await
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to install Ctrl+C handler");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut stream) => {
        stream.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to install SIGTERM handler");
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

  tracing::info!("Received termination signal, shutting down gracefully...");
}
