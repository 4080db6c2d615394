pub mod app;
pub mod config;
pub mod domains;
pub mod email;
pub mod error;
pub mod lifecycle;
pub mod resources;
pub mod state;

#[cfg(test)]
mod test_support;

pub use domains::send::model::SendRequest;
pub use email::{MailType, Mailer};
