use std::{env, fmt, str::FromStr, time::Duration};

use anyhow::{bail, Context, Result};

use crate::email::SmtpConfig;

#[derive(Debug, Clone)]
pub struct Config {
  pub server: MailerServerConfig,
  pub smtp: SmtpConfig,
  pub i18n: I18nConfig,
  pub templates_dir: String,
  pub content_server_url: String,
  pub database: DatabaseConfig,
  pub reminders: ReminderConfig,
}

#[derive(Debug, Clone)]
pub struct MailerServerConfig {
  pub host: String,
  pub port: u16,
}

impl MailerServerConfig {
  pub fn address(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }
}

#[derive(Debug, Clone)]
pub struct I18nConfig {
  pub supported_languages: Vec<String>,
  pub default_language: String,
  pub locales_dir: String,
}

#[derive(Clone)]
pub struct DatabaseConfig {
  pub url: Option<String>,
  pub max_connections: u32,
}

impl fmt::Debug for DatabaseConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DatabaseConfig")
      .field("url", &self.url.as_ref().map(|_| "<redacted>"))
      .field("max_connections", &self.max_connections)
      .finish()
  }
}

/// Timing of the verification reminder poller.
///
/// A reminder of a given kind is due once it is older than its interval and
/// is no longer sent once it is older than its outdated age. A claimed
/// reminder that was not consumed becomes claimable again after
/// `claim_timeout`.
#[derive(Debug, Clone)]
pub struct ReminderConfig {
  pub poll_interval: Duration,
  pub fetch_size: i64,
  pub first_interval: Duration,
  pub first_outdated: Duration,
  pub second_interval: Duration,
  pub second_outdated: Duration,
  pub claim_timeout: Duration,
}

impl Default for ReminderConfig {
  fn default() -> Self {
    const DAY: u64 = 24 * 60 * 60;
    ReminderConfig {
      poll_interval: Duration::from_secs(30),
      fetch_size: 20,
      first_interval: Duration::from_secs(DAY),
      first_outdated: Duration::from_secs(2 * DAY),
      second_interval: Duration::from_secs(5 * DAY),
      second_outdated: Duration::from_secs(6 * DAY),
      claim_timeout: Duration::from_secs(5 * 60),
    }
  }
}

impl Config {
  pub fn from_env() -> Result<Self> {
    let defaults = ReminderConfig::default();

    let server = MailerServerConfig {
      host: env_or("MAILER_HOST", "127.0.0.1".to_string())?,
      port: env_or("MAILER_PORT", 10136)?,
    };

    let smtp = SmtpConfig {
      host: env_or("SMTP_HOST", "localhost".to_string())?,
      port: env_or("SMTP_PORT", 25)?,
      username: env_opt("SMTP_USERNAME"),
      password: env_opt("SMTP_PASSWORD"),
      from_email: env_or("SMTP_FROM_EMAIL", "Accounts <no-reply@localhost>".to_string())?,
      secure: env_or("SMTP_SECURE", false)?,
    };

    let supported_languages: Vec<String> = env_or("I18N_SUPPORTED_LANGUAGES", "en".to_string())?
      .split(',')
      .map(|lang| lang.trim().to_string())
      .filter(|lang| !lang.is_empty())
      .collect();
    let default_language = env_or("I18N_DEFAULT_LANGUAGE", "en".to_string())?;
    if !supported_languages.contains(&default_language) {
      bail!(
        "I18N_DEFAULT_LANGUAGE {:?} is not in I18N_SUPPORTED_LANGUAGES {:?}",
        default_language,
        supported_languages
      );
    }

    let reminders = ReminderConfig {
      poll_interval: env_secs("VERIFICATION_REMINDER_POLL_SECONDS", defaults.poll_interval)?,
      fetch_size: env_or("VERIFICATION_REMINDER_FETCH_SIZE", defaults.fetch_size)?,
      first_interval: env_secs("VERIFICATION_REMINDER_FIRST_SECONDS", defaults.first_interval)?,
      first_outdated: env_secs("VERIFICATION_REMINDER_FIRST_OUTDATED_SECONDS", defaults.first_outdated)?,
      second_interval: env_secs("VERIFICATION_REMINDER_SECOND_SECONDS", defaults.second_interval)?,
      second_outdated: env_secs("VERIFICATION_REMINDER_SECOND_OUTDATED_SECONDS", defaults.second_outdated)?,
      claim_timeout: env_secs("VERIFICATION_REMINDER_CLAIM_SECONDS", defaults.claim_timeout)?,
    };
    if reminders.poll_interval.is_zero() {
      bail!("VERIFICATION_REMINDER_POLL_SECONDS must be greater than zero");
    }

    Ok(Config {
      server,
      smtp,
      i18n: I18nConfig {
        supported_languages,
        default_language,
        locales_dir: env_or("LOCALES_DIR", "./locales".to_string())?,
      },
      templates_dir: env_or("TEMPLATES_DIR", "./templates".to_string())?,
      content_server_url: env_or("CONTENT_SERVER_URL", "http://127.0.0.1:3030".to_string())?,
      database: DatabaseConfig {
        url: env_opt("DATABASE_URL"),
        max_connections: env_or("DATABASE_MAX_CONNECTIONS", 5)?,
      },
      reminders,
    })
  }
}

fn env_opt(key: &str) -> Option<String> {
  env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
  T: FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  match env_opt(key) {
    Some(raw) => raw
      .trim()
      .parse()
      .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
    None => Ok(default),
  }
}

fn env_secs(key: &str, default: Duration) -> Result<Duration> {
  env_or(key, default.as_secs()).map(Duration::from_secs)
}
