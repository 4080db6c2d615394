use std::{error::Error, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
  domains::send::model::{SendFields, SendRequest},
  email::MailType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
  First,
  Second,
}

impl ReminderKind {
  pub const ALL: [ReminderKind; 2] = [ReminderKind::First, ReminderKind::Second];

  pub fn as_str(self) -> &'static str {
    match self {
      ReminderKind::First => "first",
      ReminderKind::Second => "second",
    }
  }

  pub fn mail_type(self) -> MailType {
    match self {
      ReminderKind::First => MailType::VerificationReminderFirstEmail,
      ReminderKind::Second => MailType::VerificationReminderSecondEmail,
    }
  }
}

impl fmt::Display for ReminderKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnknownReminderKind(pub String);

impl Error for UnknownReminderKind {}

impl fmt::Display for UnknownReminderKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "unknown reminder kind: {}", self.0)
  }
}

impl TryFrom<String> for ReminderKind {
  type Error = UnknownReminderKind;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    match value.as_str() {
      "first" => Ok(ReminderKind::First),
      "second" => Ok(ReminderKind::Second),
      _ => Err(UnknownReminderKind(value)),
    }
  }
}

/// An unverified account that is due a reminder, joined with what the mail needs.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ReminderRecord {
  pub id: i64,
  pub uid: String,
  #[sqlx(try_from = "String")]
  pub kind: ReminderKind,
  pub email: String,
  pub email_code: String,
  pub locale: Option<String>,
  pub created_at: DateTime<Utc>,
}

impl ReminderRecord {
  pub fn to_send_request(&self) -> SendRequest {
    SendRequest::from(SendFields {
      mail_type: self.kind.mail_type().name().to_string(),
      email: Some(self.email.clone()),
      uid: Some(self.uid.clone()),
      code: Some(self.email_code.clone()),
      accept_language: self.locale.clone(),
      ..SendFields::default()
    })
  }
}

/// Reminders of `kind` created in `(created_after, created_before]`, oldest first.
///
/// Matching reminders are claimed at `claimed_at`; a reminder already claimed
/// is only matched again when its claim is not newer than `reclaim_before`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderQuery {
  pub kind: ReminderKind,
  pub created_before: DateTime<Utc>,
  pub created_after: DateTime<Utc>,
  pub claimed_at: DateTime<Utc>,
  pub reclaim_before: DateTime<Utc>,
  pub limit: i64,
}
