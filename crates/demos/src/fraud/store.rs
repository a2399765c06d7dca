//! Data access for the `fraud_cases` table.
//!
//! One SQLite file, one table. Cases are looked up by a case-insensitive
//! `userName` and updated by primary key.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::fmt;
use std::path::Path;
use tracing::info;

#[derive(sqlx::Type, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    PendingReview,
    ConfirmedSafe,
    ConfirmedFraud,
    VerificationFailed,
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CaseStatus::PendingReview => "pending_review",
            CaseStatus::ConfirmedSafe => "confirmed_safe",
            CaseStatus::ConfirmedFraud => "confirmed_fraud",
            CaseStatus::VerificationFailed => "verification_failed",
        };
        write!(f, "{}", label)
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize)]
#[sqlx(rename_all = "camelCase")]
pub struct FraudCase {
    pub id: i64,
    pub user_name: String,
    pub security_identifier: Option<String>,
    pub card_ending: Option<String>,
    pub merchant: Option<String>,
    pub amount: Option<String>,
    pub location: Option<String>,
    pub timestamp: Option<String>,
    pub transaction_category: Option<String>,
    pub transaction_source: Option<String>,
    pub security_question: Option<String>,
    pub security_answer: Option<String>,
    pub status: Option<CaseStatus>,
    pub note: Option<String>,
}

/// Column values for a new case.
#[derive(Debug, Clone)]
pub struct NewCase<'a> {
    pub user_name: &'a str,
    pub security_identifier: &'a str,
    pub card_ending: &'a str,
    pub merchant: &'a str,
    pub amount: &'a str,
    pub location: &'a str,
    pub timestamp: &'a str,
    pub transaction_category: &'a str,
    pub transaction_source: &'a str,
    pub security_question: &'a str,
    pub security_answer: &'a str,
}

/// The sample case the demo ships with.
pub const SAMPLE_CASE: NewCase<'static> = NewCase {
    user_name: "Raj",
    security_identifier: "12345",
    card_ending: "**** 4242",
    merchant: "ABC Industry",
    amount: "$129.99",
    location: "New York",
    timestamp: "2025-11-26 14:32",
    transaction_category: "e-commerce",
    transaction_source: "alibaba.com",
    security_question: "What is your favorite color?",
    security_answer: "blue",
};

/// A wrapper around the `SqlitePool` to provide a clear data access interface.
#[derive(Clone)]
pub struct FraudStore {
    pool: SqlitePool,
}

impl FraudStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database file and applies migrations.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open fraud database at {}", path.display()))?;
        let store = Self::new(pool);
        store.run_migrations().await?;
        Ok(store)
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts the sample case unless a case for that user already exists.
    pub async fn seed_sample(&self) -> Result<bool> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM fraud_cases WHERE userName = ?")
                .bind(SAMPLE_CASE.user_name)
                .fetch_one(&self.pool)
                .await?;
        if count > 0 {
            info!(user = SAMPLE_CASE.user_name, "Sample case already exists. Skipping insert.");
            return Ok(false);
        }
        self.insert(&SAMPLE_CASE).await?;
        info!(user = SAMPLE_CASE.user_name, "Inserted sample case");
        Ok(true)
    }

    pub async fn insert(&self, case: &NewCase<'_>) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO fraud_cases
            (userName, securityIdentifier, cardEnding, merchant, amount, location, timestamp,
             transactionCategory, transactionSource, securityQuestion, securityAnswer, status, note)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(case.user_name)
        .bind(case.security_identifier)
        .bind(case.card_ending)
        .bind(case.merchant)
        .bind(case.amount)
        .bind(case.location)
        .bind(case.timestamp)
        .bind(case.transaction_category)
        .bind(case.transaction_source)
        .bind(case.security_question)
        .bind(case.security_answer)
        .bind(CaseStatus::PendingReview)
        .bind("")
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Finds the first case whose `userName` matches, ignoring case.
    pub async fn find_by_user_name(&self, user_name: &str) -> Result<Option<FraudCase>> {
        let case = sqlx::query_as::<_, FraudCase>(
            "SELECT * FROM fraud_cases WHERE LOWER(userName) = LOWER(?) ORDER BY id LIMIT 1",
        )
        .bind(user_name.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(case)
    }

    pub async fn get(&self, id: i64) -> Result<Option<FraudCase>> {
        let case = sqlx::query_as::<_, FraudCase>("SELECT * FROM fraud_cases WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(case)
    }

    /// Writes a status transition. Returns `false` when no row matched.
    pub async fn update_status(&self, id: i64, status: CaseStatus, note: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE fraud_cases SET status = ?, note = ? WHERE id = ?")
            .bind(status)
            .bind(note)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
pub(crate) async fn temp_store(dir: &tempfile::TempDir) -> FraudStore {
    let store = FraudStore::connect(&dir.path().join("fraud.db"))
        .await
        .expect("database should open");
    store.seed_sample().await.expect("seed should succeed");
    store
}
