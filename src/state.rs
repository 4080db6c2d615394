use std::sync::Arc;

use crate::{
  domains::send::model::SendRequest,
  email::{MailType, Mailer},
};

pub trait AppState: Clone + Send + Sync + 'static {
  fn version(&self) -> &str;

  /// Starts the operation named by the request's `type` without waiting for
  /// it, or hands the request back when no such operation exists.
  fn dispatch_mail(&self, req: SendRequest) -> Result<MailType, SendRequest>;
}

#[derive(Clone)]
pub struct SharedAppState {
  pub mailer: Arc<Mailer>,
  pub version: &'static str,
}

impl SharedAppState {
  pub fn new(mailer: Arc<Mailer>) -> Self {
    Self {
      mailer,
      version: env!("CARGO_PKG_VERSION"),
    }
  }
}

impl AppState for SharedAppState {
  fn version(&self) -> &str {
    self.version
  }

  fn dispatch_mail(&self, req: SendRequest) -> Result<MailType, SendRequest> {
    let Some(kind) = req.mail_type().and_then(|name| self.mailer.operation(name)) else {
      return Err(req);
    };

    // detached: the send task logs its own outcome
    drop(self.mailer.dispatch(kind, req));
    Ok(kind)
  }
}
