use anyhow::Result;
use async_trait::async_trait;
use lettre::{
  message::{header::ContentType, Mailbox, MultiPart},
  transport::smtp::authentication::Credentials,
  AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::email::types::{OutgoingMail, SmtpConfig};

#[async_trait]
pub trait MailTransport: Send + Sync {
  async fn deliver(&self, from: &Mailbox, mail: OutgoingMail) -> Result<()>;
}

pub struct SmtpTransport {
  transporter: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
  pub fn new(smtp_config: &SmtpConfig) -> Result<Self> {
    let mut builder = if smtp_config.secure {
      AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp_config.host)?
    } else {
      AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp_config.host)
    };

    builder = builder.port(smtp_config.port);
    if let (Some(username), Some(password)) = (&smtp_config.username, &smtp_config.password) {
      builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
    }

    Ok(SmtpTransport {
      transporter: builder.build(),
    })
  }
}

#[async_trait]
impl MailTransport for SmtpTransport {
  async fn deliver(&self, from: &Mailbox, mail: OutgoingMail) -> Result<()> {
    let email = build_message(from, mail)?;
    self.transporter.send(email).await?;
    Ok(())
  }
}

fn build_message(from: &Mailbox, mail: OutgoingMail) -> Result<Message> {
  let builder = Message::builder()
    .from(from.clone())
    .to(mail.to.parse()?)
    .subject(mail.subject);

  let message = match mail.html {
    Some(html) => builder.multipart(MultiPart::alternative_plain_html(mail.text, html))?,
    None => builder.header(ContentType::TEXT_PLAIN).body(mail.text)?,
  };

  Ok(message)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_mail(html: Option<&str>) -> OutgoingMail {
    OutgoingMail {
      to: "user@example.com".to_string(),
      subject: "Verify your account".to_string(),
      text: "plain body".to_string(),
      html: html.map(str::to_string),
      template: "verifyEmail".to_string(),
    }
  }

  #[test]
  fn test_build_message_plain_text() -> Result<()> {
    let from: Mailbox = "Accounts <no-reply@example.com>".parse()?;
    let message = build_message(&from, sample_mail(None))?;
    let raw = String::from_utf8(message.formatted())?;

    assert!(raw.contains("To: user@example.com"));
    assert!(raw.contains("Subject: Verify your account"));
    assert!(raw.contains("text/plain"));
    assert!(!raw.contains("multipart/alternative"));
    Ok(())
  }

  #[test]
  fn test_build_message_with_html_is_multipart() -> Result<()> {
    let from: Mailbox = "no-reply@example.com".parse()?;
    let message = build_message(&from, sample_mail(Some("<p>html body</p>")))?;
    let raw = String::from_utf8(message.formatted())?;

    assert!(raw.contains("multipart/alternative"));
    assert!(raw.contains("text/html"));
    Ok(())
  }

  #[test]
  fn test_build_message_rejects_bad_recipient() {
    let from: Mailbox = "no-reply@example.com".parse().expect("mailbox");
    let mut mail = sample_mail(None);
    mail.to = "not an address".to_string();

    assert!(build_message(&from, mail).is_err());
  }

  #[tokio::test]
  async fn test_smtp_transport_new_with_localhost_smtp() -> Result<()> {
    let smtp_config = SmtpConfig {
      host: "localhost".to_string(),
      port: 1025,
      ..SmtpConfig::default()
    };

    SmtpTransport::new(&smtp_config)?;
    Ok(())
  }

  #[tokio::test]
  async fn test_smtp_transport_new_with_remote_smtp() -> Result<()> {
    let smtp_config = SmtpConfig {
      host: "smtp.example.com".to_string(),
      port: 587,
      username: Some("test_user".to_string()),
      password: Some("test_password".to_string()),
      secure: true,
      ..SmtpConfig::default()
    };

    SmtpTransport::new(&smtp_config)?;
    Ok(())
  }
}
