//! Database layer — migrations and per-table queries.
//!
//! Every query helper is generic over [`sqlx::Executor`], so the same
//! function runs against the pool for single-row requests and against an
//! open transaction inside a distribution cycle.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sabil_funds::{Amount, GlobalBalance, Project, ProjectStatus, Report, Settings};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::info;

use crate::errors::{PortalError, Result};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    // Make sure the file is created if it doesn't exist yet.
    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

/// Single-connection in-memory database with the schema applied.
#[cfg(test)]
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| PortalError::Corrupt(format!("timestamp out of range: {ms}")))
}

// ─────────────────────────────────────────────────────────
// Projects
// ─────────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
struct ProjectRow {
    id: i64,
    title: String,
    description: String,
    image_url: String,
    target_cents: i64,
    current_cents: i64,
    is_important: bool,
    status: String,
    created_at: i64,
}

impl TryFrom<ProjectRow> for Project {
    type Error = PortalError;

    fn try_from(row: ProjectRow) -> Result<Self> {
        let status = ProjectStatus::parse(&row.status).ok_or_else(|| {
            PortalError::Corrupt(format!("project {} has status {:?}", row.id, row.status))
        })?;
        Ok(Project {
            id: row.id,
            title: row.title,
            description: row.description,
            image_url: row.image_url,
            target_amount: Amount::from_cents(row.target_cents),
            current_amount: Amount::from_cents(row.current_cents),
            is_important: row.is_important,
            status,
            created_at: from_millis(row.created_at)?,
        })
    }
}

/// Fields supplied when a project is created. It always starts at zero.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub target_amount: Amount,
    pub is_important: bool,
    pub created_at: DateTime<Utc>,
}

const PROJECT_COLUMNS: &str = "id, title, description, image_url, target_cents, current_cents, \
                               is_important, status, created_at";

/// Fetch projects newest first, optionally filtered by status.
pub async fn list_projects<'e, E>(exec: E, status: Option<ProjectStatus>) -> Result<Vec<Project>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {PROJECT_COLUMNS} FROM projects \
         WHERE (?1 IS NULL OR status = ?1) \
         ORDER BY created_at DESC, id DESC"
    );
    let rows = sqlx::query_as::<_, ProjectRow>(&sql)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(exec)
        .await?;
    rows.into_iter().map(Project::try_from).collect()
}

pub async fn get_project<'e, E>(exec: E, id: i64) -> Result<Option<Project>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1");
    let row = sqlx::query_as::<_, ProjectRow>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await?;
    row.map(Project::try_from).transpose()
}

pub async fn insert_project<'e, E>(exec: E, new: &NewProject) -> Result<Project>
where
    E: Executor<'e, Database = Sqlite>,
{
    let status = ProjectStatus::for_amounts(Amount::ZERO, new.target_amount);
    let sql = format!(
        "INSERT INTO projects \
             (title, description, image_url, target_cents, current_cents, is_important, status, created_at) \
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7) \
         RETURNING {PROJECT_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ProjectRow>(&sql)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.image_url)
        .bind(new.target_amount.cents())
        .bind(new.is_important)
        .bind(status.as_str())
        .bind(new.created_at.timestamp_millis())
        .fetch_one(exec)
        .await?;
    Project::try_from(row)
}

/// Write the admin-editable fields and status. `current_cents` is left alone.
pub async fn update_project_details<'e, E>(exec: E, project: &Project) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        UPDATE projects
        SET    title = ?1, description = ?2, image_url = ?3,
               target_cents = ?4, is_important = ?5, status = ?6
        WHERE  id = ?7
        "#,
    )
    .bind(&project.title)
    .bind(&project.description)
    .bind(&project.image_url)
    .bind(project.target_amount.cents())
    .bind(project.is_important)
    .bind(project.status.as_str())
    .bind(project.id)
    .execute(exec)
    .await?
    .rows_affected();
    Ok(rows > 0)
}

/// Record a distribution result for one project.
///
/// Only matches when the project is still active at `previous`, so a stale
/// outcome can never overwrite newer totals.
pub async fn set_project_progress<'e, E>(
    exec: E,
    id: i64,
    previous: Amount,
    current: Amount,
    status: ProjectStatus,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        UPDATE projects
        SET    current_cents = ?1, status = ?2
        WHERE  id = ?3 AND current_cents = ?4 AND status = 'active'
        "#,
    )
    .bind(current.cents())
    .bind(status.as_str())
    .bind(id)
    .bind(previous.cents())
    .execute(exec)
    .await?
    .rows_affected();
    Ok(rows > 0)
}

pub async fn delete_project<'e, E>(exec: E, id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("DELETE FROM projects WHERE id = ?1")
        .bind(id)
        .execute(exec)
        .await?
        .rows_affected();
    Ok(rows > 0)
}

// ─────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
struct ReportRow {
    id: i64,
    title: String,
    description: String,
    total_collected_cents: i64,
    date: i64,
}

impl TryFrom<ReportRow> for Report {
    type Error = PortalError;

    fn try_from(row: ReportRow) -> Result<Self> {
        Ok(Report {
            id: row.id,
            title: row.title,
            description: row.description,
            total_collected: Amount::from_cents(row.total_collected_cents),
            date: from_millis(row.date)?,
        })
    }
}

/// Fetch all reports, newest first.
pub async fn list_reports<'e, E>(exec: E) -> Result<Vec<Report>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, ReportRow>(
        r#"
        SELECT id, title, description, total_collected_cents, date
        FROM   reports
        ORDER  BY date DESC, id DESC
        "#,
    )
    .fetch_all(exec)
    .await?;
    rows.into_iter().map(Report::try_from).collect()
}

pub async fn get_report<'e, E>(exec: E, id: i64) -> Result<Option<Report>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, ReportRow>(
        "SELECT id, title, description, total_collected_cents, date FROM reports WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(exec)
    .await?;
    row.map(Report::try_from).transpose()
}

pub async fn insert_report<'e, E>(
    exec: E,
    title: &str,
    description: &str,
    total_collected: Amount,
    date: DateTime<Utc>,
) -> Result<Report>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, ReportRow>(
        r#"
        INSERT INTO reports (title, description, total_collected_cents, date)
        VALUES (?1, ?2, ?3, ?4)
        RETURNING id, title, description, total_collected_cents, date
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(total_collected.cents())
    .bind(date.timestamp_millis())
    .fetch_one(exec)
    .await?;
    Report::try_from(row)
}

/// Only the text of a published report can change.
pub async fn update_report_text<'e, E>(
    exec: E,
    id: i64,
    title: &str,
    description: &str,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("UPDATE reports SET title = ?1, description = ?2 WHERE id = ?3")
        .bind(title)
        .bind(description)
        .bind(id)
        .execute(exec)
        .await?
        .rows_affected();
    Ok(rows > 0)
}

pub async fn delete_report<'e, E>(exec: E, id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("DELETE FROM reports WHERE id = ?1")
        .bind(id)
        .execute(exec)
        .await?
        .rows_affected();
    Ok(rows > 0)
}

// ─────────────────────────────────────────────────────────
// Singletons
// ─────────────────────────────────────────────────────────

/// Read the settings row, falling back to defaults when it is missing.
pub async fn get_settings<'e, E>(exec: E) -> Result<Settings>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT mosque_name, rip FROM settings WHERE id = 1")
            .fetch_optional(exec)
            .await?;
    Ok(row
        .map(|(mosque_name, rip)| Settings { mosque_name, rip })
        .unwrap_or_default())
}

pub async fn save_settings<'e, E>(exec: E, settings: &Settings) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO settings (id, mosque_name, rip) VALUES (1, ?1, ?2)
        ON CONFLICT (id) DO UPDATE SET mosque_name = excluded.mosque_name, rip = excluded.rip
        "#,
    )
    .bind(&settings.mosque_name)
    .bind(&settings.rip)
    .execute(exec)
    .await?;
    Ok(())
}

/// Read the carried-over balance. Returns zero when no row has been written.
pub async fn get_balance<'e, E>(exec: E) -> Result<GlobalBalance>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<(i64,)> = sqlx::query_as("SELECT amount_cents FROM global_balance WHERE id = 1")
        .fetch_optional(exec)
        .await?;
    Ok(GlobalBalance::clamped(Amount::from_cents(
        row.map(|(v,)| v).unwrap_or(0),
    )))
}

pub async fn save_balance<'e, E>(exec: E, balance: GlobalBalance) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO global_balance (id, amount_cents) VALUES (1, ?1)
        ON CONFLICT (id) DO UPDATE SET amount_cents = excluded.amount_cents
        "#,
    )
    .bind(balance.amount.clamp_non_negative().cents())
    .execute(exec)
    .await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────────────────

pub async fn insert_session<'e, E>(
    exec: E,
    token: &str,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("INSERT INTO sessions (token, created_at, expires_at) VALUES (?1, ?2, ?3)")
        .bind(token)
        .bind(created_at.timestamp_millis())
        .bind(expires_at.timestamp_millis())
        .execute(exec)
        .await?;
    Ok(())
}

/// `true` when `token` exists and has not expired at `now`.
pub async fn session_is_live<'e, E>(exec: E, token: &str, now: DateTime<Utc>) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM sessions WHERE token = ?1 AND expires_at > ?2")
            .bind(token)
            .bind(now.timestamp_millis())
            .fetch_optional(exec)
            .await?;
    Ok(row.is_some())
}

pub async fn delete_session<'e, E>(exec: E, token: &str) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("DELETE FROM sessions WHERE token = ?1")
        .bind(token)
        .execute(exec)
        .await?;
    Ok(())
}

/// Drop every session that expired at or before `now`.
pub async fn purge_expired_sessions<'e, E>(exec: E, now: DateTime<Utc>) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
        .bind(now.timestamp_millis())
        .execute(exec)
        .await?
        .rows_affected();
    Ok(rows)
}
