use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Deserialize)]
pub struct SmtpConfig {
  pub host: String,
  pub port: u16,
  pub username: Option<String>,
  pub password: Option<String>,
  pub from_email: String,
  pub secure: bool,
}

impl Default for SmtpConfig {
  fn default() -> Self {
    SmtpConfig {
      host: "localhost".to_string(),
      port: 25,
      username: None,
      password: None,
      from_email: "Accounts <no-reply@localhost>".to_string(),
      secure: false,
    }
  }
}

impl fmt::Debug for SmtpConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SmtpConfig")
      .field("host", &self.host)
      .field("port", &self.port)
      .field("username", &self.username)
      .field("password", &self.password.as_ref().map(|_| "<redacted>"))
      .field("from_email", &self.from_email)
      .field("secure", &self.secure)
      .finish()
  }
}

/// A fully rendered message, ready for the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMail {
  pub to: String,
  pub subject: String,
  pub text: String,
  pub html: Option<String>,
  pub template: String,
}
