use std::{
  collections::HashMap,
  sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex,
  },
};

use async_trait::async_trait;
use axum::{
  body::{Body, Bytes},
  http::{Request, StatusCode},
  Router,
};
use lettre::message::Mailbox;
use serde::Serialize;
use tokio::sync::Notify;
use tower::ServiceExt;

use crate::{
  app::create_app,
  email::{MailConfig, MailTransport, MailType, Mailer, OutgoingMail, SmtpConfig},
  resources::{Catalog, TemplateSet, Translator},
  state::SharedAppState,
};

/// Transport that keeps delivered mail in memory.
#[derive(Default)]
pub struct RecordingTransport {
  sent: Mutex<Vec<OutgoingMail>>,
  failures: AtomicU32,
  delivered: Notify,
}

impl RecordingTransport {
  pub fn sent(&self) -> Vec<OutgoingMail> {
    self.sent.lock().expect("sent lock").clone()
  }

  /// Makes the next `count` deliveries fail.
  pub fn fail_next(&self, count: u32) {
    self.failures.store(count, Ordering::SeqCst);
  }

  /// Waits until at least `count` mails were delivered.
  pub async fn wait_for(&self, count: usize) {
    loop {
      let notified = self.delivered.notified();
      if self.sent.lock().expect("sent lock").len() >= count {
        return;
      }
      notified.await;
    }
  }
}

#[async_trait]
impl MailTransport for RecordingTransport {
  async fn deliver(&self, _from: &Mailbox, mail: OutgoingMail) -> anyhow::Result<()> {
    let failing = self
      .failures
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if failing {
      anyhow::bail!("smtp connection refused");
    }

    self.sent.lock().expect("sent lock").push(mail);
    self.delivered.notify_waiters();
    Ok(())
  }
}

pub fn test_translator() -> Translator {
  let de = HashMap::from([
    ("Verify your account".to_string(), "Konto bestätigen".to_string()),
    ("Your password has been reset".to_string(), "Ihr Passwort wurde zurückgesetzt".to_string()),
  ]);
  Translator::new("en", vec![Catalog::new("en", HashMap::new()), Catalog::new("de", de)]).expect("translator")
}

/// One template per mail type: the text body is `<name> {{link}}`.
pub fn test_templates() -> TemplateSet {
  let mut templates = TemplateSet::new();
  for kind in MailType::ALL {
    templates.insert(
      kind.name(),
      &format!("{} {{{{link}}}}", kind.name()),
      Some("<a href=\"{{link}}\">{{email}}</a>"),
    );
  }
  templates
}

pub fn test_mail_config() -> MailConfig {
  MailConfig {
    smtp: SmtpConfig {
      from_email: "Accounts <no-reply@example.com>".to_string(),
      ..SmtpConfig::default()
    },
    content_server_url: "https://accounts.example.com".to_string(),
  }
}

pub fn test_mailer() -> (Arc<Mailer>, Arc<RecordingTransport>) {
  let transport = Arc::new(RecordingTransport::default());
  let mailer = Mailer::with_transport(test_translator(), test_templates(), &test_mail_config(), transport.clone())
    .expect("mailer");
  (Arc::new(mailer), transport)
}

pub fn test_app() -> (Router, Arc<RecordingTransport>) {
  let (mailer, transport) = test_mailer();
  (create_app(SharedAppState::new(mailer)), transport)
}

pub async fn post_json<T: Serialize>(app: Router, uri: &str, body: &T) -> (StatusCode, Bytes) {
  let request = Request::builder()
    .method("POST")
    .uri(uri)
    .header("content-type", "application/json")
    .body(Body::from(serde_json::to_vec(body).expect("serialize request body")))
    .expect("build request");

  send(app, request).await
}

pub async fn get(app: Router, uri: &str) -> (StatusCode, Bytes) {
  let request = Request::builder()
    .method("GET")
    .uri(uri)
    .body(Body::empty())
    .expect("build request");

  send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Bytes) {
  let response = app.oneshot(request).await.expect("handle request");
  let status = response.status();
  let body = axum::body::to_bytes(response.into_body(), usize::MAX)
    .await
    .expect("read response body");
  (status, body)
}
