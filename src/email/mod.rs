//! Email sending functionality module
//!
//! The [`Mailer`] renders one of a fixed set of mail types from the loaded
//! templates and translations, and hands the result to a [`MailTransport`]
//! (SMTP via lettre in production).

mod links;
mod mailer;
mod transport;
mod types;

pub use links::LinkBuilder;
pub use mailer::{MailConfig, MailType, Mailer, MailerError};
pub use transport::{MailTransport, SmtpTransport};
pub use types::{OutgoingMail, SmtpConfig};
