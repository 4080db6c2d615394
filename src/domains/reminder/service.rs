//! Background polling for verification reminders.
//!
//! Each cycle claims due reminders of every kind from the store, sends them
//! through the shared [`Mailer`] and consumes each reminder only after its
//! mail was sent. A reminder whose send fails stays in the store and is
//! claimed again once its claim times out. Cycles run inline on a
//! fixed-period interval with [`MissedTickBehavior::Skip`], so a cycle that
//! outlasts the period causes the overlapping ticks to be skipped rather than
//! queued.

use std::{error::Error, fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use super::{
  model::{ReminderKind, ReminderQuery},
  repository::{ReminderStore, StoreError},
};
use crate::{config::ReminderConfig, email::Mailer};

#[derive(Debug)]
pub enum PollError {
  Fetch(StoreError),
  Consume { uid: String, error: StoreError },
}

impl Error for PollError {}

impl fmt::Display for PollError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PollError::Fetch(e) => write!(f, "Failed to fetch reminders: {}", e),
      PollError::Consume { uid, error } => write!(f, "Failed to consume reminder for {}: {}", uid, error),
    }
  }
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
  pub sent: usize,
  pub failed: usize,
}

pub struct ReminderPoller {
  mailer: Arc<Mailer>,
  store: Arc<dyn ReminderStore>,
  config: ReminderConfig,
}

impl ReminderPoller {
  pub fn new(mailer: Arc<Mailer>, store: Arc<dyn ReminderStore>, config: ReminderConfig) -> Self {
    Self { mailer, store, config }
  }

  /// Runs until the process exits. The first cycle starts one period after spawning.
  pub fn spawn(self) -> JoinHandle<()> {
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(self.config.poll_interval);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
      ticker.tick().await;

      tracing::info!(
        poll_interval_secs = self.config.poll_interval.as_secs(),
        fetch_size = self.config.fetch_size,
        "verification reminder polling started"
      );

      loop {
        ticker.tick().await;
        match self.poll_once().await {
          Ok(PollReport { sent: 0, failed: 0 }) => tracing::trace!("no verification reminders due"),
          Ok(report) => tracing::info!(sent = report.sent, failed = report.failed, "verification reminders sent"),
          Err(e) => tracing::error!(op = "verificationReminders", error = %e, "poll cycle failed"),
        }
      }
    })
  }

  /// One poll cycle.
  ///
  /// A failed send is logged and counted, and the cycle moves on to the next
  /// reminder. Store errors abandon the cycle.
  pub async fn poll_once(&self) -> Result<PollReport, PollError> {
    let now = Utc::now();
    let mut report = PollReport::default();

    for kind in ReminderKind::ALL {
      let query = self.query(kind, now);
      let reminders = self
        .store
        .fetch_pending_reminders(&query)
        .await
        .map_err(PollError::Fetch)?;

      for reminder in reminders {
        if let Err(e) = self.mailer.send(kind.mail_type(), &reminder.to_send_request()).await {
          tracing::error!(
            op = "verificationReminders",
            kind = %kind,
            uid = %reminder.uid,
            error = %format!("{:#}", e),
            "reminder send failed"
          );
          report.failed += 1;
          continue;
        }

        self
          .store
          .consume_reminder(reminder.id)
          .await
          .map_err(|error| PollError::Consume {
            uid: reminder.uid.clone(),
            error,
          })?;
        report.sent += 1;
      }
    }

    Ok(report)
  }

  fn query(&self, kind: ReminderKind, now: DateTime<Utc>) -> ReminderQuery {
    let (due_after, outdated_after) = match kind {
      ReminderKind::First => (self.config.first_interval, self.config.first_outdated),
      ReminderKind::Second => (self.config.second_interval, self.config.second_outdated),
    };

    ReminderQuery {
      kind,
      created_before: age_cutoff(now, due_after),
      created_after: age_cutoff(now, outdated_after),
      claimed_at: now,
      reclaim_before: age_cutoff(now, self.config.claim_timeout),
      limit: self.config.fetch_size,
    }
  }
}

fn age_cutoff(now: DateTime<Utc>, age: Duration) -> DateTime<Utc> {
  chrono::Duration::from_std(age)
    .ok()
    .and_then(|age| now.checked_sub_signed(age))
    .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
