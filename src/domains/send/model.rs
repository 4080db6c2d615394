use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /send`.
///
/// Only `type` is interpreted by the dispatcher; every other field is read
/// leniently by the operation that needs it, and the raw body is kept for
/// logging.
#[derive(Debug, Clone, PartialEq)]
pub struct SendRequest {
  body: Value,
}

impl SendRequest {
  pub fn mail_type(&self) -> Option<&str> {
    self.text("type")
  }

  pub fn email(&self) -> Option<&str> {
    self.text("email")
  }

  pub fn uid(&self) -> Option<&str> {
    self.text("uid")
  }

  pub fn code(&self) -> Option<&str> {
    self.text("code")
  }

  pub fn token(&self) -> Option<&str> {
    self.text("token")
  }

  pub fn service(&self) -> Option<&str> {
    self.text("service")
  }

  pub fn redirect_to(&self) -> Option<&str> {
    self.text("redirectTo")
  }

  pub fn accept_language(&self) -> Option<&str> {
    self.text("acceptLanguage")
  }

  pub fn body(&self) -> &Value {
    &self.body
  }

  fn text(&self, field: &str) -> Option<&str> {
    self.body.get(field).and_then(Value::as_str)
  }
}

impl From<Value> for SendRequest {
  fn from(body: Value) -> Self {
    SendRequest { body }
  }
}

/// Typed form of the fields the mailer understands, used when the service
/// itself originates a send.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFields {
  #[serde(rename = "type")]
  pub mail_type: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub uid: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub code: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub token: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub service: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub redirect_to: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub accept_language: Option<String>,
}

impl From<SendFields> for SendRequest {
  fn from(fields: SendFields) -> Self {
    // a struct of strings always serializes to an object
    SendRequest::from(serde_json::to_value(fields).unwrap_or(Value::Null))
  }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionResponse {
  pub version: String,
}
