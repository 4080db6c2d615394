use std::process::ExitCode;

use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use mailer_server::config::Config;
use mailer_server::lifecycle::{run, Collaborators, StartupError};

#[tokio::main]
async fn main() -> ExitCode {
  dotenv().ok();

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let result = match Config::from_env() {
    Ok(config) => {
      let collaborators = Collaborators::from_config(&config);
      run(config, collaborators).await
    }
    Err(e) => Err(StartupError::Config(format!("{:#}", e))),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      tracing::error!(op = "init", error = %e, "init");
      ExitCode::from(e.exit_code())
    }
  }
}
