use anyhow::Context;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use crate::engine::AttendanceEngine;
use crate::error::{AttendanceError, StoreError};
use crate::models::{
    parse_shift_time, AssignmentDraft, Event, Message, MessageStatus, NewSignup, Position,
    PositionStaffing, Signup, SignupPatch,
};
use crate::store::{AttendanceStore, StoreResult};

const SIGNUP_COLUMNS: &str = "s.id, s.position_id, s.volunteer_name, s.phone_number, \
     s.start_time, s.end_time, s.arrived, s.organization, s.other_notes";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed store. Counter calls go through the database functions so
/// each increment or decrement is a single statement.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn ensure_found(rows: u64, entity: &'static str, id: Uuid) -> StoreResult<()> {
    if rows == 0 {
        return Err(StoreError::NotFound { entity, id });
    }
    Ok(())
}

/// A signup write that trips the position foreign key names a missing position.
fn position_reference_error(err: sqlx::Error, position_id: Uuid) -> StoreError {
    let missing_position = matches!(
        &err,
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation()
    );
    if missing_position {
        return StoreError::NotFound {
            entity: "position",
            id: position_id,
        };
    }
    err.into()
}

#[async_trait]
impl AttendanceStore for PgStore {
    async fn update_signup_arrival(&self, signup_id: Uuid, arrived: bool) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE volunteer_dashboard.volunteer_signups SET arrived = $2 WHERE id = $1",
        )
        .bind(signup_id)
        .bind(arrived)
        .execute(&self.pool)
        .await?;
        ensure_found(result.rows_affected(), "signup", signup_id)
    }

    async fn increment_filled_count(&self, position_id: Uuid) -> StoreResult<()> {
        let found: bool =
            sqlx::query_scalar("SELECT volunteer_dashboard.increment_filled_count($1)")
                .bind(position_id)
                .fetch_one(&self.pool)
                .await?;
        ensure_found(u64::from(found), "position", position_id)
    }

    async fn decrement_filled_count(&self, position_id: Uuid) -> StoreResult<()> {
        let found: bool =
            sqlx::query_scalar("SELECT volunteer_dashboard.decrement_filled_count($1)")
                .bind(position_id)
                .fetch_one(&self.pool)
                .await?;
        ensure_found(u64::from(found), "position", position_id)
    }

    async fn insert_signup(&self, signup: &NewSignup) -> StoreResult<Uuid> {
        let id: Uuid = sqlx::query(
            r#"
            INSERT INTO volunteer_dashboard.volunteer_signups
            (id, position_id, volunteer_name, phone_number, start_time, end_time, arrived,
             organization, other_notes)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7, $8)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(signup.position_id)
        .bind(&signup.volunteer_name)
        .bind(&signup.phone_number)
        .bind(signup.start_time)
        .bind(signup.end_time)
        .bind(&signup.organization)
        .bind(&signup.other_notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| position_reference_error(err, signup.position_id))?
        .get("id");
        Ok(id)
    }

    async fn delete_signup(&self, signup_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM volunteer_dashboard.volunteer_signups WHERE id = $1")
            .bind(signup_id)
            .execute(&self.pool)
            .await?;
        ensure_found(result.rows_affected(), "signup", signup_id)
    }

    async fn update_signup(&self, signup_id: Uuid, patch: &SignupPatch) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE volunteer_dashboard.volunteer_signups
            SET position_id = COALESCE($2, position_id),
                volunteer_name = COALESCE($3, volunteer_name),
                phone_number = COALESCE($4, phone_number),
                start_time = COALESCE($5, start_time),
                end_time = COALESCE($6, end_time),
                organization = COALESCE($7, organization),
                other_notes = COALESCE($8, other_notes)
            WHERE id = $1
            "#,
        )
        .bind(signup_id)
        .bind(patch.position_id)
        .bind(&patch.volunteer_name)
        .bind(&patch.phone_number)
        .bind(patch.start_time)
        .bind(patch.end_time)
        .bind(&patch.organization)
        .bind(&patch.other_notes)
        .execute(&self.pool)
        .await
        .map_err(|err| match patch.position_id {
            Some(position_id) => position_reference_error(err, position_id),
            None => err.into(),
        })?;
        ensure_found(result.rows_affected(), "signup", signup_id)
    }

    async fn fetch_position(&self, position_id: Uuid) -> StoreResult<Option<Position>> {
        let position = sqlx::query_as::<_, Position>(
            "SELECT id, event_id, name, needed, filled, latitude, longitude \
             FROM volunteer_dashboard.volunteer_positions WHERE id = $1",
        )
        .bind(position_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(position)
    }

    async fn fetch_positions(&self, event_id: Uuid) -> StoreResult<Vec<Position>> {
        let positions = sqlx::query_as::<_, Position>(
            "SELECT id, event_id, name, needed, filled, latitude, longitude \
             FROM volunteer_dashboard.volunteer_positions WHERE event_id = $1 ORDER BY name",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(positions)
    }

    async fn fetch_signup(&self, signup_id: Uuid) -> StoreResult<Option<Signup>> {
        let query = format!(
            "SELECT {SIGNUP_COLUMNS} FROM volunteer_dashboard.volunteer_signups s WHERE s.id = $1"
        );
        let signup = sqlx::query_as::<_, Signup>(&query)
            .bind(signup_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(signup)
    }

    async fn fetch_position_signups(&self, position_id: Uuid) -> StoreResult<Vec<Signup>> {
        let query = format!(
            "SELECT {SIGNUP_COLUMNS} FROM volunteer_dashboard.volunteer_signups s \
             WHERE s.position_id = $1 ORDER BY s.start_time"
        );
        let signups = sqlx::query_as::<_, Signup>(&query)
            .bind(position_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(signups)
    }

    async fn fetch_event_signups(&self, event_id: Uuid) -> StoreResult<Vec<Signup>> {
        let query = format!(
            "SELECT {SIGNUP_COLUMNS} FROM volunteer_dashboard.volunteer_signups s \
             JOIN volunteer_dashboard.volunteer_positions p ON p.id = s.position_id \
             WHERE p.event_id = $1 ORDER BY s.start_time"
        );
        let signups = sqlx::query_as::<_, Signup>(&query)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(signups)
    }
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<Uuid> {
    let event_id = Uuid::parse_str("6a1f3c2e-8d47-4b1a-9e55-0f2b7c9d4e11")?;
    let registration = Uuid::parse_str("b2c4e6f8-1a3b-4c5d-8e7f-9a0b1c2d3e4f")?;
    let water = Uuid::parse_str("c3d5f7a9-2b4c-4d6e-9f80-a1b2c3d4e5f6")?;
    let date = NaiveDate::from_ymd_opt(2026, 10, 24).context("invalid date")?;

    sqlx::query(
        r#"
        INSERT INTO volunteer_dashboard.events (id, name, date, time, location)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(event_id)
    .bind("Riverside Fun Run")
    .bind(date)
    .bind(NaiveTime::from_hms_opt(8, 0, 0).context("invalid time")?)
    .bind("Riverside Park, North Lawn")
    .execute(pool)
    .await?;

    let positions = vec![
        (registration, "Registration", 2, 2, 41.8806, -87.6742),
        (water, "Water Station", 3, 1, 41.8841, -87.6705),
    ];

    for (id, name, needed, filled, latitude, longitude) in positions {
        sqlx::query(
            r#"
            INSERT INTO volunteer_dashboard.volunteer_positions
            (id, event_id, name, needed, filled, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(event_id)
        .bind(name)
        .bind(needed)
        .bind(filled)
        .bind(latitude)
        .bind(longitude)
        .execute(pool)
        .await?;
    }

    let volunteers = vec![
        (
            "0d7b1e52-4f6a-4c1e-a3b9-5e2f8c7d6a10",
            registration,
            "Avery Lee",
            "555-0100",
            "07:30",
            "10:30",
            Some("Lincoln High Key Club"),
        ),
        (
            "1e8c2f63-5a7b-4d2f-b4ca-6f3a9d8e7b21",
            registration,
            "Jules Moreno",
            "555-0101",
            "07:30",
            "10:30",
            None,
        ),
        (
            "2f9d3a74-6b8c-4e3a-85db-7a4b0e9f8c32",
            water,
            "Kiara Patel",
            "555-0102",
            "08:00",
            "11:00",
            Some("Riverside Runners"),
        ),
    ];

    for (id, position_id, name, phone, start, end, organization) in volunteers {
        let start_time = parse_shift_time(&format!("{date} {start}"))?;
        let end_time = parse_shift_time(&format!("{date} {end}"))?;
        sqlx::query(
            r#"
            INSERT INTO volunteer_dashboard.volunteer_signups
            (id, position_id, volunteer_name, phone_number, start_time, end_time, organization)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::parse_str(id)?)
        .bind(position_id)
        .bind(name)
        .bind(phone)
        .bind(start_time)
        .bind(end_time)
        .bind(organization)
        .execute(pool)
        .await?;
    }

    Ok(event_id)
}

pub async fn insert_event(
    pool: &PgPool,
    name: &str,
    date: NaiveDate,
    time: NaiveTime,
    location: &str,
    custom_map_url: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO volunteer_dashboard.events (id, name, date, time, location, custom_map_url)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(date)
    .bind(time)
    .bind(location)
    .bind(custom_map_url)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

pub async fn insert_position(
    pool: &PgPool,
    event_id: Uuid,
    name: &str,
    needed: i32,
    latitude: f64,
    longitude: f64,
) -> anyhow::Result<Uuid> {
    anyhow::ensure!(needed >= 1, "a position needs at least one volunteer");
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO volunteer_dashboard.volunteer_positions
        (id, event_id, name, needed, filled, latitude, longitude)
        VALUES ($1, $2, $3, $4, 0, $5, $6)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(event_id)
    .bind(name)
    .bind(needed)
    .bind(latitude)
    .bind(longitude)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

pub async fn fetch_event(pool: &PgPool, event_id: Uuid) -> anyhow::Result<Option<Event>> {
    let event = sqlx::query_as::<_, Event>(
        "SELECT id, name, date, time, location, custom_map_url \
         FROM volunteer_dashboard.events WHERE id = $1",
    )
    .bind(event_id)
    .fetch_optional(pool)
    .await?;
    Ok(event)
}

pub async fn fetch_events(pool: &PgPool) -> anyhow::Result<Vec<Event>> {
    let events = sqlx::query_as::<_, Event>(
        "SELECT id, name, date, time, location, custom_map_url \
         FROM volunteer_dashboard.events ORDER BY date, time",
    )
    .fetch_all(pool)
    .await?;
    Ok(events)
}

pub async fn fetch_staffing(pool: &PgPool, event_id: Uuid) -> anyhow::Result<Vec<PositionStaffing>> {
    let rows = sqlx::query(
        r#"
        SELECT p.name, p.needed, p.filled,
               COUNT(s.id) AS assigned,
               COUNT(s.id) FILTER (WHERE s.arrived) AS arrived
        FROM volunteer_dashboard.volunteer_positions p
        LEFT JOIN volunteer_dashboard.volunteer_signups s ON s.position_id = p.id
        WHERE p.event_id = $1
        GROUP BY p.id, p.name, p.needed, p.filled
        ORDER BY p.name
        "#,
    )
    .bind(event_id)
    .fetch_all(pool)
    .await?;

    let mut staffing = Vec::new();
    for row in rows {
        let assigned: i64 = row.get("assigned");
        let arrived: i64 = row.get("arrived");
        staffing.push(PositionStaffing {
            position_name: row.get("name"),
            needed: row.get("needed"),
            filled: row.get("filled"),
            assigned: usize::try_from(assigned).unwrap_or_default(),
            arrived: usize::try_from(arrived).unwrap_or_default(),
        });
    }

    Ok(staffing)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReconcileMode {
    /// Set `filled` to the number of arrived volunteers.
    Arrived,
    /// Reset every counter to zero.
    Zero,
}

/// Administrative repair of drifted counters. Returns the number of positions touched.
pub async fn reconcile(
    pool: &PgPool,
    event_id: Option<Uuid>,
    mode: ReconcileMode,
) -> anyhow::Result<u64> {
    let statement = match mode {
        ReconcileMode::Arrived => {
            r#"
            UPDATE volunteer_dashboard.volunteer_positions p
            SET filled = (
                SELECT COUNT(*) FROM volunteer_dashboard.volunteer_signups s
                WHERE s.position_id = p.id AND s.arrived
            )
            WHERE $1::uuid IS NULL OR p.event_id = $1
            "#
        }
        ReconcileMode::Zero => {
            r#"
            UPDATE volunteer_dashboard.volunteer_positions p
            SET filled = 0
            WHERE $1::uuid IS NULL OR p.event_id = $1
            "#
        }
    };

    let result = sqlx::query(statement).bind(event_id).execute(pool).await?;
    Ok(result.rows_affected())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub rejected: usize,
}

/// Imports assignments through the engine so every row counts toward `filled`.
pub async fn import_csv<S>(
    engine: &AttendanceEngine<S>,
    csv_path: &std::path::Path,
) -> anyhow::Result<ImportSummary>
where
    S: AttendanceStore + ?Sized,
{
    #[derive(serde::Deserialize)]
    struct CsvRow {
        position_id: Option<Uuid>,
        volunteer_name: Option<String>,
        phone_number: Option<String>,
        start_time: Option<String>,
        end_time: Option<String>,
        organization: Option<String>,
        other_notes: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut summary = ImportSummary::default();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = match result {
            Ok(row) => row,
            Err(err) if matches!(err.kind(), csv::ErrorKind::Deserialize { .. }) => {
                warn!(line, error = %err, "skipping unreadable assignment row");
                summary.rejected += 1;
                continue;
            }
            Err(err) => return Err(err).with_context(|| format!("line {line}")),
        };

        let (start_time, end_time) = match (
            parse_import_time(row.start_time.as_deref()),
            parse_import_time(row.end_time.as_deref()),
        ) {
            (Ok(start), Ok(end)) => (start, end),
            (Err(err), _) => {
                warn!(line, field = "start_time", error = %err, "skipping assignment with invalid time");
                summary.rejected += 1;
                continue;
            }
            (_, Err(err)) => {
                warn!(line, field = "end_time", error = %err, "skipping assignment with invalid time");
                summary.rejected += 1;
                continue;
            }
        };

        let draft = AssignmentDraft {
            position_id: row.position_id,
            volunteer_name: row.volunteer_name,
            phone_number: row.phone_number,
            start_time,
            end_time,
            organization: row.organization,
            other_notes: row.other_notes,
        };

        match engine.create_assignment(&draft).await {
            Ok(_) => summary.inserted += 1,
            Err(AttendanceError::Validation { field }) => {
                warn!(line, field, "skipping assignment with missing field");
                summary.rejected += 1;
            }
            Err(AttendanceError::NotFound { entity, id }) => {
                warn!(line, entity, %id, "skipping assignment for unknown position");
                summary.rejected += 1;
            }
            Err(err) => return Err(err).with_context(|| format!("line {line}")),
        }
    }

    Ok(summary)
}

/// Blank cells count as missing so validation reports them by field.
fn parse_import_time(value: Option<&str>) -> Result<Option<NaiveDateTime>, chrono::ParseError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_shift_time(value).map(Some),
    }
}

pub async fn insert_message(
    pool: &PgPool,
    event_id: Uuid,
    position_id: Uuid,
    title: &str,
    content: &str,
    volunteer_id: Option<Uuid>,
    phone_number: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO volunteer_dashboard.messages
        (id, title, content, volunteer_id, phone_number, status, position_id, event_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(title)
    .bind(content)
    .bind(volunteer_id)
    .bind(phone_number)
    .bind(MessageStatus::Pending.as_str())
    .bind(position_id)
    .bind(event_id)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

pub async fn fetch_messages(
    pool: &PgPool,
    event_id: Uuid,
    status: Option<MessageStatus>,
) -> anyhow::Result<Vec<Message>> {
    let mut query = String::from(
        "SELECT id, title, content, volunteer_id, phone_number, status, position_id, event_id \
         FROM volunteer_dashboard.messages WHERE event_id = $1",
    );
    if status.is_some() {
        query.push_str(" AND status = $2");
    }
    query.push_str(" ORDER BY created_at DESC");

    let mut rows = sqlx::query(&query).bind(event_id);
    if let Some(value) = status {
        rows = rows.bind(value.as_str());
    }

    let records = rows.fetch_all(pool).await?;
    let mut messages = Vec::new();

    for row in records {
        let status: String = row.get("status");
        messages.push(Message {
            id: row.get("id"),
            title: row.get("title"),
            content: row.get("content"),
            volunteer_id: row.get("volunteer_id"),
            phone_number: row.get("phone_number"),
            status: status.parse().map_err(anyhow::Error::msg)?,
            position_id: row.get("position_id"),
            event_id: row.get("event_id"),
        });
    }

    Ok(messages)
}

pub async fn update_message_status(
    pool: &PgPool,
    message_id: Uuid,
    status: MessageStatus,
) -> anyhow::Result<bool> {
    let result = sqlx::query("UPDATE volunteer_dashboard.messages SET status = $2 WHERE id = $1")
        .bind(message_id)
        .bind(status.as_str())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::fmt;
    use std::sync::Arc;

    use super::*;
    use crate::memory::MemoryStore;
    use crate::realtime::Notifier;

    fn write_csv(rows: &[String]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("volunteer-import-{}.csv", Uuid::new_v4()));
        let mut body = String::from(
            "position_id,volunteer_name,phone_number,start_time,end_time,organization,other_notes\n",
        );
        for row in rows {
            body.push_str(row);
            body.push('\n');
        }
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn import_rejects_bad_rows_and_keeps_going() {
        let store = MemoryStore::new();
        let engine = AttendanceEngine::new(Arc::new(store.clone()), Notifier::default());
        let position = store.add_position(Uuid::new_v4(), "Registration", 4).unwrap();
        let id = position.id;

        let path = write_csv(&[
            format!("{id},Avery Lee,555-0100,2026-10-19 09:00,2026-10-19 12:00,Rotary,"),
            format!("{id},Jules Moreno,,2026-10-19 09:00,2026-10-19 12:00,,"),
            format!("{id},Kiara Patel,555-0102,9am,2026-10-19 12:00,,"),
            format!("{id},Sam Okafor,555-0103,2026-10-19 13:00,noon,,"),
            format!("{},Rin Sato,555-0104,2026-10-19 13:00,2026-10-19 16:00,,", Uuid::new_v4()),
            format!("{id},Noor Haddad,555-0105,2026-10-19T13:00:00,2026-10-19T16:00:00,,late shift"),
        ]);
        let summary = import_csv(&engine, &path).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.rejected, 4);
        assert_eq!(store.filled(id).unwrap(), 2);

        let names: Vec<String> = store
            .fetch_position_signups(id)
            .await
            .unwrap()
            .into_iter()
            .map(|signup| signup.volunteer_name)
            .collect();
        assert_eq!(names, vec!["Avery Lee", "Noor Haddad"]);
    }

    #[tokio::test]
    async fn import_counts_unparseable_position_as_rejected() {
        let store = MemoryStore::new();
        let engine = AttendanceEngine::new(Arc::new(store.clone()), Notifier::default());
        let position = store.add_position(Uuid::new_v4(), "Parking", 1).unwrap();

        let path = write_csv(&[
            "not-a-uuid,Avery Lee,555-0100,2026-10-19 09:00,2026-10-19 12:00,,".to_string(),
            format!("{},Jules Moreno,555-0101,2026-10-19 09:00,2026-10-19 12:00,,", position.id),
        ]);
        let summary = import_csv(&engine, &path).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!((summary.inserted, summary.rejected), (1, 1));
        assert_eq!(store.filled(position.id).unwrap(), 1);
    }

    #[test]
    fn blank_import_times_read_as_missing() {
        assert_eq!(parse_import_time(None).unwrap(), None);
        assert_eq!(parse_import_time(Some("  ")).unwrap(), None);
        assert!(parse_import_time(Some("9am")).is_err());
        assert!(parse_import_time(Some("2026-10-19 09:00")).unwrap().is_some());
    }

    #[derive(Debug)]
    struct ForeignKeyViolation;

    impl fmt::Display for ForeignKeyViolation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("insert or update violates foreign key constraint")
        }
    }

    impl std::error::Error for ForeignKeyViolation {}

    impl sqlx::error::DatabaseError for ForeignKeyViolation {
        fn message(&self) -> &str {
            "insert or update violates foreign key constraint"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("23503"))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::ForeignKeyViolation
        }
    }

    #[test]
    fn foreign_key_violation_reads_as_missing_position() {
        let position_id = Uuid::new_v4();
        let err = sqlx::Error::Database(Box::new(ForeignKeyViolation));
        assert_eq!(
            position_reference_error(err, position_id),
            StoreError::NotFound {
                entity: "position",
                id: position_id
            }
        );

        let other = position_reference_error(sqlx::Error::RowNotFound, position_id);
        assert!(matches!(other, StoreError::Backend(_)));
    }
}
