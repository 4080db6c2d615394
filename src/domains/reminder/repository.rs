use std::{error::Error, fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use super::model::{ReminderQuery, ReminderRecord};
use crate::{config::DatabaseConfig, impl_store_error_conversions};

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
  Unavailable(String),
  Database(String),
}

impl Error for StoreError {}

impl fmt::Display for StoreError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StoreError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
      StoreError::Database(msg) => write!(f, "{}", msg),
    }
  }
}

impl_store_error_conversions!(StoreError, Database);

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReminderStore: Send + Sync {
  /// Claims and returns the reminders matching `query`.
  ///
  /// Claimed reminders stay in the store until consumed, and are not
  /// returned again while the claim is fresh.
  async fn fetch_pending_reminders(&self, query: &ReminderQuery) -> Result<Vec<ReminderRecord>, StoreError>;

  /// Removes a reminder once its mail was sent.
  async fn consume_reminder(&self, id: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait StoreConnector: Send + Sync {
  async fn connect(&self) -> Result<Arc<dyn ReminderStore>, StoreError>;
}

const FETCH_PENDING_REMINDERS: &str = r#"
  WITH claimed AS (
    UPDATE verification_reminders
    SET claimed_at = $5
    WHERE id IN (
      SELECT reminders.id
      FROM verification_reminders reminders
      JOIN accounts ON accounts.uid = reminders.uid
      WHERE reminders.kind = $1
        AND reminders.created_at <= $2
        AND reminders.created_at > $3
        AND (reminders.claimed_at IS NULL OR reminders.claimed_at <= $6)
        AND NOT accounts.email_verified
      ORDER BY reminders.created_at
      LIMIT $4
      FOR UPDATE OF reminders SKIP LOCKED
    )
    RETURNING id, uid, kind, created_at
  )
  SELECT claimed.id, claimed.uid, claimed.kind, accounts.email, accounts.email_code, accounts.locale, claimed.created_at
  FROM claimed
  JOIN accounts ON accounts.uid = claimed.uid
  ORDER BY claimed.created_at
"#;

const CONSUME_REMINDER: &str = "DELETE FROM verification_reminders WHERE id = $1";

pub struct SqlxReminderStore {
  pub pool: PgPool,
}

impl SqlxReminderStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl ReminderStore for SqlxReminderStore {
  async fn fetch_pending_reminders(&self, query: &ReminderQuery) -> Result<Vec<ReminderRecord>, StoreError> {
    let reminders = sqlx::query_as::<_, ReminderRecord>(FETCH_PENDING_REMINDERS)
      .bind(query.kind.as_str())
      .bind(query.created_before)
      .bind(query.created_after)
      .bind(query.limit)
      .bind(query.claimed_at)
      .bind(query.reclaim_before)
      .fetch_all(&self.pool)
      .await?;

    Ok(reminders)
  }

  async fn consume_reminder(&self, id: i64) -> Result<(), StoreError> {
    sqlx::query(CONSUME_REMINDER).bind(id).execute(&self.pool).await?;
    Ok(())
  }
}

pub struct PgStoreConnector {
  database: DatabaseConfig,
}

impl PgStoreConnector {
  pub fn new(database: DatabaseConfig) -> Self {
    Self { database }
  }
}

#[async_trait]
impl StoreConnector for PgStoreConnector {
  async fn connect(&self) -> Result<Arc<dyn ReminderStore>, StoreError> {
    let url = self
      .database
      .url
      .as_deref()
      .ok_or_else(|| StoreError::Unavailable("DATABASE_URL is not set".to_string()))?;

    let pool = PgPoolOptions::new()
      .max_connections(self.database.max_connections)
      .acquire_timeout(Duration::from_secs(10))
      .connect(url)
      .await?;

    Ok(Arc::new(SqlxReminderStore::new(pool)))
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration as TimeDelta, Utc};

  use super::*;
  use crate::domains::reminder::model::ReminderKind;

  async fn insert_account(pool: &PgPool, uid: &str, email: &str, locale: Option<&str>) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO accounts (uid, email, email_code, locale) VALUES ($1, $2, $3, $4)")
      .bind(uid)
      .bind(email)
      .bind(format!("code-{}", uid))
      .bind(locale)
      .execute(pool)
      .await?;
    Ok(())
  }

  async fn count_reminders(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM verification_reminders")
      .fetch_one(pool)
      .await
  }

  async fn insert_reminder(pool: &PgPool, uid: &str, kind: ReminderKind, age_hours: i64) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO verification_reminders (uid, kind, created_at) VALUES ($1, $2, $3)")
      .bind(uid)
      .bind(kind.as_str())
      .bind(Utc::now() - TimeDelta::hours(age_hours))
      .execute(pool)
      .await?;
    Ok(())
  }

  fn first_reminders_query() -> ReminderQuery {
    let now = Utc::now();
    ReminderQuery {
      kind: ReminderKind::First,
      created_before: now - TimeDelta::hours(24),
      created_after: now - TimeDelta::hours(48),
      claimed_at: now,
      reclaim_before: now - TimeDelta::minutes(5),
      limit: 10,
    }
  }

  #[sqlx::test(migrations = "./migrations")]
  #[ignore = "requires DATABASE_URL"]
  async fn fetch_claims_only_due_reminders(pool: PgPool) -> Result<(), sqlx::Error> {
    insert_account(&pool, "due", "due@example.com", Some("de")).await?;
    insert_account(&pool, "fresh", "fresh@example.com", None).await?;
    insert_account(&pool, "stale", "stale@example.com", None).await?;
    insert_reminder(&pool, "due", ReminderKind::First, 30).await?;
    insert_reminder(&pool, "due", ReminderKind::Second, 30).await?;
    insert_reminder(&pool, "fresh", ReminderKind::First, 1).await?;
    insert_reminder(&pool, "stale", ReminderKind::First, 72).await?;

    let store = SqlxReminderStore::new(pool.clone());

    let reminders = store
      .fetch_pending_reminders(&first_reminders_query())
      .await
      .expect("fetch reminders");
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].uid, "due");
    assert_eq!(reminders[0].kind, ReminderKind::First);
    assert_eq!(reminders[0].email, "due@example.com");
    assert_eq!(reminders[0].email_code, "code-due");
    assert_eq!(reminders[0].locale.as_deref(), Some("de"));

    // claimed, but still stored until consumed
    let again = store
      .fetch_pending_reminders(&first_reminders_query())
      .await
      .expect("fetch reminders");
    assert!(again.is_empty());
    assert_eq!(count_reminders(&pool).await?, 4);

    store.consume_reminder(reminders[0].id).await.expect("consume");
    assert_eq!(count_reminders(&pool).await?, 3);

    Ok(())
  }

  #[sqlx::test(migrations = "./migrations")]
  #[ignore = "requires DATABASE_URL"]
  async fn unconsumed_reminder_is_reclaimed_after_timeout(pool: PgPool) -> Result<(), sqlx::Error> {
    insert_account(&pool, "retry", "retry@example.com", None).await?;
    insert_reminder(&pool, "retry", ReminderKind::First, 30).await?;

    let store = SqlxReminderStore::new(pool.clone());
    let first = store
      .fetch_pending_reminders(&first_reminders_query())
      .await
      .expect("fetch reminders");
    assert_eq!(first.len(), 1);

    let later = Utc::now() + TimeDelta::minutes(10);
    let query = ReminderQuery {
      claimed_at: later,
      reclaim_before: later - TimeDelta::minutes(5),
      ..first_reminders_query()
    };
    let reclaimed = store.fetch_pending_reminders(&query).await.expect("fetch reminders");
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].id, first[0].id);

    Ok(())
  }

  #[sqlx::test(migrations = "./migrations")]
  #[ignore = "requires DATABASE_URL"]
  async fn fetch_skips_verified_accounts(pool: PgPool) -> Result<(), sqlx::Error> {
    insert_account(&pool, "verified", "verified@example.com", None).await?;
    insert_account(&pool, "pending", "pending@example.com", None).await?;
    sqlx::query("UPDATE accounts SET email_verified = TRUE WHERE uid = $1")
      .bind("verified")
      .execute(&pool)
      .await?;
    insert_reminder(&pool, "verified", ReminderKind::First, 30).await?;
    insert_reminder(&pool, "pending", ReminderKind::First, 30).await?;

    let store = SqlxReminderStore::new(pool);
    let reminders = store
      .fetch_pending_reminders(&first_reminders_query())
      .await
      .expect("fetch reminders");

    let uids: Vec<&str> = reminders.iter().map(|reminder| reminder.uid.as_str()).collect();
    assert_eq!(uids, vec!["pending"]);

    Ok(())
  }

  #[sqlx::test(migrations = "./migrations")]
  #[ignore = "requires DATABASE_URL"]
  async fn fetch_honours_limit(pool: PgPool) -> Result<(), sqlx::Error> {
    for uid in ["a", "b", "c"] {
      insert_account(&pool, uid, &format!("{}@example.com", uid), None).await?;
      insert_reminder(&pool, uid, ReminderKind::First, 30).await?;
    }

    let store = SqlxReminderStore::new(pool);
    let query = ReminderQuery {
      limit: 2,
      ..first_reminders_query()
    };

    let reminders = store.fetch_pending_reminders(&query).await.expect("fetch reminders");
    assert_eq!(reminders.len(), 2);

    Ok(())
  }

  #[tokio::test]
  async fn connect_without_database_url_is_unavailable() {
    let connector = PgStoreConnector::new(DatabaseConfig {
      url: None,
      max_connections: 1,
    });

    let result = connector.connect().await;
    assert!(matches!(result, Err(StoreError::Unavailable(_))));
  }
}
