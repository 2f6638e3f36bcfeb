//! Account store adapter.
//!
//! Wraps the Postgres pool behind the handful of operations the lifecycle
//! needs. Every call is bounded by the configured store deadline; an expired
//! deadline surfaces like any other store failure.
//!
//! Token rotation is a single conditional `UPDATE ... RETURNING`. Postgres
//! executes it atomically server-side, which is what makes concurrent
//! presentations of the same token resolve to exactly one winner. It must
//! never be rewritten as separate read and write calls.

use anyhow::{anyhow, Context, Result};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::Instrument;

use super::types::{Account, Profile};
use super::utils::is_unique_violation;

/// Outcome when attempting to create a new account.
#[derive(Debug)]
pub(super) enum InsertOutcome {
    Created,
    Conflict,
}

const ACCOUNT_COLUMNS: &str = r#"
    id,
    otp,
    otp_attempt_count,
    otp_expiry_time,
    cooldown_time,
    token,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    first_name,
    last_name,
    interests,
    langs,
    insta_handler,
    fb_handler,
    linkedin_handler,
    mood,
    schedule
"#;

fn account_from_row(row: &PgRow) -> Account {
    Account {
        id: row.get("id"),
        otp: row.get("otp"),
        otp_attempt_count: row.get("otp_attempt_count"),
        otp_expiry_time: row.get("otp_expiry_time"),
        cooldown_time: row.get("cooldown_time"),
        token: row.get("token"),
        created_at: row.get("created_at"),
        profile: Profile {
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            interests: row.get("interests"),
            langs: row.get("langs"),
            insta_handler: row.get("insta_handler"),
            fb_handler: row.get("fb_handler"),
            linkedin_handler: row.get("linkedin_handler"),
            mood: row.get("mood"),
            schedule: row.get("schedule"),
        },
    }
}

/// Run a store call under the deadline; expiry becomes a store error.
async fn bounded<T, F>(deadline: Duration, operation: &str, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    match timeout(deadline, call).await {
        Ok(result) => result.with_context(|| format!("failed to {operation}")),
        Err(_) => Err(anyhow!(
            "{operation} exceeded the {}s store deadline",
            deadline.as_secs()
        )),
    }
}

pub(super) async fn find_account(
    pool: &PgPool,
    deadline: Duration,
    id: &str,
) -> Result<Option<Account>> {
    let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = %query
    );
    let row = bounded(
        deadline,
        "find account",
        sqlx::query(&query)
            .bind(id)
            .fetch_optional(pool)
            .instrument(span),
    )
    .await?;

    Ok(row.as_ref().map(account_from_row))
}

/// Insert-if-absent; a concurrent insert of the same id reports `Conflict`.
pub(super) async fn insert_account(
    pool: &PgPool,
    deadline: Duration,
    id: &str,
    otp: &str,
    otp_expiry_time: i64,
) -> Result<InsertOutcome> {
    let query = r"
        INSERT INTO accounts (id, otp, otp_attempt_count, otp_expiry_time)
        VALUES ($1, $2, 0, $3)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let call = sqlx::query(query)
        .bind(id)
        .bind(otp)
        .bind(otp_expiry_time)
        .execute(pool)
        .instrument(span);

    match timeout(deadline, call).await {
        Ok(Ok(_)) => Ok(InsertOutcome::Created),
        Ok(Err(err)) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
        Ok(Err(err)) => Err(err).context("failed to insert account"),
        Err(_) => Err(anyhow!(
            "account insert exceeded the {}s store deadline",
            deadline.as_secs()
        )),
    }
}

/// Re-arm the challenge while attempts remain: new code, extended expiry,
/// attempt count and cooldown untouched.
pub(super) async fn refresh_challenge(
    pool: &PgPool,
    deadline: Duration,
    id: &str,
    otp: &str,
    otp_expiry_time: i64,
) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET otp = $2,
            otp_expiry_time = $3
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    bounded(
        deadline,
        "refresh challenge",
        sqlx::query(query)
            .bind(id)
            .bind(otp)
            .bind(otp_expiry_time)
            .execute(pool)
            .instrument(span),
    )
    .await?;

    Ok(())
}

/// Start over after an elapsed cooldown: new code, attempts back to zero,
/// cooldown cleared.
pub(super) async fn reset_challenge(
    pool: &PgPool,
    deadline: Duration,
    id: &str,
    otp: &str,
    otp_expiry_time: i64,
) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET otp = $2,
            otp_attempt_count = 0,
            otp_expiry_time = $3,
            cooldown_time = NULL
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    bounded(
        deadline,
        "reset challenge",
        sqlx::query(query)
            .bind(id)
            .bind(otp)
            .bind(otp_expiry_time)
            .execute(pool)
            .instrument(span),
    )
    .await?;

    Ok(())
}

/// Count a failed attempt. When `lock_until` is set the cap was just reached:
/// the challenge is invalidated and the cooldown starts. The token column is
/// untouched either way; token validity is independent of OTP lockout.
pub(super) async fn record_failed_attempt(
    pool: &PgPool,
    deadline: Duration,
    id: &str,
    lock_until: Option<i64>,
) -> Result<()> {
    if let Some(cooldown_time) = lock_until {
        let query = r"
            UPDATE accounts
            SET otp_attempt_count = otp_attempt_count + 1,
                cooldown_time = $2,
                otp = NULL,
                otp_expiry_time = NULL
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        bounded(
            deadline,
            "record lockout",
            sqlx::query(query)
                .bind(id)
                .bind(cooldown_time)
                .execute(pool)
                .instrument(span),
        )
        .await?;
    } else {
        let query = r"
            UPDATE accounts
            SET otp_attempt_count = otp_attempt_count + 1
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        bounded(
            deadline,
            "record failed attempt",
            sqlx::query(query).bind(id).execute(pool).instrument(span),
        )
        .await?;
    }

    Ok(())
}

/// Install a freshly minted token after a successful verification and clear
/// every piece of challenge state in the same statement.
pub(super) async fn install_token(
    pool: &PgPool,
    deadline: Duration,
    id: &str,
    token: &str,
) -> Result<Option<Account>> {
    let query = format!(
        r"
        UPDATE accounts
        SET token = $2,
            otp = NULL,
            otp_attempt_count = 0,
            otp_expiry_time = NULL,
            cooldown_time = NULL
        WHERE id = $1
        RETURNING {ACCOUNT_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = %query
    );
    let row = bounded(
        deadline,
        "install token",
        sqlx::query(&query)
            .bind(id)
            .bind(token)
            .fetch_optional(pool)
            .instrument(span),
    )
    .await?;

    Ok(row.as_ref().map(account_from_row))
}

/// The atomic compare-and-swap behind token rotation: replace the token only
/// if the presented value is still current, returning the post-update row.
/// `None` means wrong token, unknown id, or a lost race against a concurrent
/// rotation.
pub(super) async fn rotate_token(
    pool: &PgPool,
    deadline: Duration,
    id: &str,
    presented: &str,
    replacement: &str,
) -> Result<Option<Account>> {
    let query = format!(
        r"
        UPDATE accounts
        SET token = $3
        WHERE id = $1
          AND token = $2
        RETURNING {ACCOUNT_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = %query
    );
    let row = bounded(
        deadline,
        "rotate token",
        sqlx::query(&query)
            .bind(id)
            .bind(presented)
            .bind(replacement)
            .fetch_optional(pool)
            .instrument(span),
    )
    .await?;

    Ok(row.as_ref().map(account_from_row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_outcome_debug_names() {
        assert_eq!(format!("{:?}", InsertOutcome::Created), "Created");
        assert_eq!(format!("{:?}", InsertOutcome::Conflict), "Conflict");
    }

    #[tokio::test]
    async fn bounded_reports_deadline_expiry() {
        let result: Result<()> = bounded(Duration::from_millis(10), "probe store", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let err = result.expect_err("deadline should expire");
        assert!(err.to_string().contains("store deadline"));
    }

    #[tokio::test]
    async fn bounded_passes_through_success() {
        let result = bounded(Duration::from_secs(1), "probe store", async { Ok(42) }).await;
        assert_eq!(result.expect("value"), 42);
    }
}
