use std::{collections::HashMap, error::Error, fmt, sync::Arc};

use lettre::message::Mailbox;
use tokio::task::JoinHandle;

use crate::{
  domains::send::model::SendRequest,
  email::{
    links::LinkBuilder,
    transport::{MailTransport, SmtpTransport},
    types::{OutgoingMail, SmtpConfig},
  },
  resources::{TemplateSet, Translator},
};

/// The fixed set of send operations, addressed by wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailType {
  VerifyEmail,
  VerifyLoginEmail,
  RecoveryEmail,
  UnlockEmail,
  PasswordChangedEmail,
  PasswordReset,
  NewDeviceLoginEmail,
  PostVerifyEmail,
  VerificationReminderFirstEmail,
  VerificationReminderSecondEmail,
}

impl MailType {
  pub const ALL: [MailType; 10] = [
    MailType::VerifyEmail,
    MailType::VerifyLoginEmail,
    MailType::RecoveryEmail,
    MailType::UnlockEmail,
    MailType::PasswordChangedEmail,
    MailType::PasswordReset,
    MailType::NewDeviceLoginEmail,
    MailType::PostVerifyEmail,
    MailType::VerificationReminderFirstEmail,
    MailType::VerificationReminderSecondEmail,
  ];

  pub fn name(self) -> &'static str {
    match self {
      MailType::VerifyEmail => "verifyEmail",
      MailType::VerifyLoginEmail => "verifyLoginEmail",
      MailType::RecoveryEmail => "recoveryEmail",
      MailType::UnlockEmail => "unlockEmail",
      MailType::PasswordChangedEmail => "passwordChangedEmail",
      MailType::PasswordReset => "passwordReset",
      MailType::NewDeviceLoginEmail => "newDeviceLoginEmail",
      MailType::PostVerifyEmail => "postVerifyEmail",
      MailType::VerificationReminderFirstEmail => "verificationReminderFirstEmail",
      MailType::VerificationReminderSecondEmail => "verificationReminderSecondEmail",
    }
  }

  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|kind| kind.name() == name)
  }

  /// Subject msgid, translated per recipient.
  fn subject(self) -> &'static str {
    match self {
      MailType::VerifyEmail => "Verify your account",
      MailType::VerifyLoginEmail => "Confirm your sign-in",
      MailType::RecoveryEmail => "Reset your password",
      MailType::UnlockEmail => "Re-verify your account",
      MailType::PasswordChangedEmail => "Your password has been changed",
      MailType::PasswordReset => "Your password has been reset",
      MailType::NewDeviceLoginEmail => "New sign-in to your account",
      MailType::PostVerifyEmail => "Account verified",
      MailType::VerificationReminderFirstEmail => "Hello again",
      MailType::VerificationReminderSecondEmail => "Still there?",
    }
  }

  fn link(self, links: &LinkBuilder, request: &SendRequest) -> String {
    let verify = [
      ("uid", request.uid()),
      ("code", request.code()),
      ("service", request.service()),
      ("redirectTo", request.redirect_to()),
    ];

    match self {
      MailType::VerifyEmail => links.link("v1/verify_email", &verify),
      MailType::VerifyLoginEmail => links.link("complete_signin", &verify),
      MailType::UnlockEmail => links.link("v1/complete_unlock_account", &verify),
      MailType::RecoveryEmail => links.link(
        "v1/complete_reset_password",
        &[
          ("token", request.token()),
          ("code", request.code()),
          ("email", request.email()),
          ("service", request.service()),
          ("redirectTo", request.redirect_to()),
        ],
      ),
      MailType::PasswordChangedEmail | MailType::PasswordReset => {
        links.link("reset_password", &[("email", request.email())])
      }
      MailType::NewDeviceLoginEmail => links.link("settings/change_password", &[("email", request.email())]),
      MailType::PostVerifyEmail => links.link("connect_another_device", &[("service", request.service())]),
      MailType::VerificationReminderFirstEmail => links.link(
        "v1/verify_email",
        &[("uid", request.uid()), ("code", request.code()), ("reminder", Some("first"))],
      ),
      MailType::VerificationReminderSecondEmail => links.link(
        "v1/verify_email",
        &[("uid", request.uid()), ("code", request.code()), ("reminder", Some("second"))],
      ),
    }
  }
}

impl fmt::Display for MailType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
  pub smtp: SmtpConfig,
  pub content_server_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MailerError {
  InvalidSender(String),
  InvalidLinks(String),
  Transport(String),
  MissingTemplate(String),
  MissingRecipient(MailType),
}

impl Error for MailerError {}

impl fmt::Display for MailerError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MailerError::InvalidSender(msg) => write!(f, "Invalid sender address: {}", msg),
      MailerError::InvalidLinks(msg) => write!(f, "Invalid link configuration: {}", msg),
      MailerError::Transport(msg) => write!(f, "Failed to build mail transport: {}", msg),
      MailerError::MissingTemplate(name) => write!(f, "Missing template: {}", name),
      MailerError::MissingRecipient(kind) => write!(f, "No recipient email for {}", kind),
    }
  }
}

/// Renders and sends every supported mail type.
///
/// Built once at startup and shared read-only between the HTTP dispatcher
/// and the reminder poller.
pub struct Mailer {
  translator: Translator,
  templates: TemplateSet,
  links: LinkBuilder,
  sender: Mailbox,
  transport: Arc<dyn MailTransport>,
}

impl Mailer {
  pub fn new(translator: Translator, templates: TemplateSet, config: &MailConfig) -> Result<Self, MailerError> {
    let transport = SmtpTransport::new(&config.smtp).map_err(|e| MailerError::Transport(e.to_string()))?;
    Self::with_transport(translator, templates, config, Arc::new(transport))
  }

  pub fn with_transport(
    translator: Translator,
    templates: TemplateSet,
    config: &MailConfig,
    transport: Arc<dyn MailTransport>,
  ) -> Result<Self, MailerError> {
    let sender = config
      .smtp
      .from_email
      .parse()
      .map_err(|e| MailerError::InvalidSender(format!("{}: {}", config.smtp.from_email, e)))?;
    let links =
      LinkBuilder::new(&config.content_server_url).map_err(|e| MailerError::InvalidLinks(format!("{:#}", e)))?;

    if let Some(missing) = MailType::ALL.iter().find(|kind| templates.get(kind.name()).is_none()) {
      return Err(MailerError::MissingTemplate(missing.name().to_string()));
    }

    Ok(Mailer {
      translator,
      templates,
      links,
      sender,
      transport,
    })
  }

  /// The operation registered under `name`, if any.
  pub fn operation(&self, name: &str) -> Option<MailType> {
    MailType::from_name(name)
  }

  pub fn template_names(&self) -> Vec<&str> {
    self.templates.names()
  }

  pub fn render(&self, kind: MailType, request: &SendRequest) -> Result<OutgoingMail, MailerError> {
    let to = request.email().ok_or(MailerError::MissingRecipient(kind))?;
    let template = self
      .templates
      .get(kind.name())
      .ok_or_else(|| MailerError::MissingTemplate(kind.name().to_string()))?;
    let catalog = self.translator.negotiate(request.accept_language());

    let vars = HashMap::from([
      ("link", kind.link(&self.links, request)),
      ("email", to.to_string()),
      ("code", request.code().unwrap_or_default().to_string()),
      ("service", request.service().unwrap_or_default().to_string()),
    ]);

    Ok(OutgoingMail {
      to: to.to_string(),
      subject: catalog.gettext(kind.subject()).to_string(),
      text: template.text.render(catalog, &vars),
      html: template.html.as_ref().map(|html| html.render(catalog, &vars)),
      template: kind.name().to_string(),
    })
  }

  pub async fn send(&self, kind: MailType, request: &SendRequest) -> anyhow::Result<()> {
    let mail = self.render(kind, request)?;
    tracing::debug!(template = %kind, to = %mail.to, "sending mail");
    self.transport.deliver(&self.sender, mail).await
  }

  /// Starts `send` on its own task and returns immediately.
  ///
  /// Failures are logged by the task and never reach the caller.
  pub fn dispatch(self: &Arc<Self>, kind: MailType, request: SendRequest) -> JoinHandle<()> {
    let mailer = Arc::clone(self);
    tokio::spawn(async move {
      match mailer.send(kind, &request).await {
        Ok(()) => tracing::info!(template = %kind, uid = request.uid().unwrap_or_default(), "mail_sent"),
        Err(e) => tracing::error!(
          template = %kind,
          uid = request.uid().unwrap_or_default(),
          error = %format!("{:#}", e),
          "mail_send_failed"
        ),
      }
    })
  }
}
