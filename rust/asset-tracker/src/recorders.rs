//! Append-only log entries attached to an asset.
//!
//! Entries are only ever inserted here; they leave the store solely through
//! the cascade when their asset is deleted.

use crate::{
    db::{self, SqlitePool},
    error::{Result, ServiceError},
    forms::{BackupForm, CapacityForm, SecurityNoteForm},
    models::{AvailabilityLog, BackupLog, CapacityRecord, NewAvailabilityLog, SecurityNote},
    probe::ProbeOutcome,
    registry::find_asset,
    schema::{availability_logs, backup_logs, capacity_records, security_notes},
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, RunQueryDsl};
use tracing::info;

#[derive(Clone)]
pub struct LogRecorder {
    pool: SqlitePool,
}

impl LogRecorder {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Stores the result of a probe, stamped with the current time.
    pub async fn record_check(&self, asset_id: i32, outcome: ProbeOutcome) -> Result<AvailabilityLog> {
        let row = NewAvailabilityLog {
            asset_id,
            timestamp: Utc::now(),
            status: outcome.status,
            response_time_ms: outcome.response_time_ms,
        };

        let mut conn = db::checkout(&self.pool).await?;
        let log = diesel::insert_into(availability_logs::table)
            .values(&row)
            .returning(AvailabilityLog::as_returning())
            .get_result(&mut *conn)
            .await
            .map_err(|err| orphan_error(err, asset_id))?;

        info!(asset_id, status = %log.status, "availability check recorded");
        Ok(log)
    }

    pub async fn add_security_note(
        &self,
        asset_id: i32,
        form: SecurityNoteForm,
    ) -> Result<SecurityNote> {
        let mut conn = db::checkout(&self.pool).await?;

        let note = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    find_asset(conn, asset_id).await?;
                    let record = form.validate(asset_id, Utc::now().date_naive())?;
                    diesel::insert_into(security_notes::table)
                        .values(&record)
                        .returning(SecurityNote::as_returning())
                        .get_result(conn)
                        .await
                        .map_err(|err| orphan_error(err, asset_id))
                }
                .scope_boxed()
            })
            .await?;

        info!(asset_id, severity = %note.severity, "security note added");
        Ok(note)
    }

    pub async fn add_capacity_record(
        &self,
        asset_id: i32,
        form: CapacityForm,
    ) -> Result<CapacityRecord> {
        let mut conn = db::checkout(&self.pool).await?;

        let record = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    find_asset(conn, asset_id).await?;
                    let row = form.validate(asset_id, Utc::now().date_naive())?;
                    diesel::insert_into(capacity_records::table)
                        .values(&row)
                        .returning(CapacityRecord::as_returning())
                        .get_result(conn)
                        .await
                        .map_err(|err| orphan_error(err, asset_id))
                }
                .scope_boxed()
            })
            .await?;

        info!(
            asset_id,
            total_gb = record.total_gb,
            used_gb = record.used_gb,
            "capacity record added"
        );
        Ok(record)
    }

    pub async fn add_backup_log(&self, asset_id: i32, form: BackupForm) -> Result<BackupLog> {
        let mut conn = db::checkout(&self.pool).await?;

        let backup = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    find_asset(conn, asset_id).await?;
                    let record = form.validate(asset_id)?;
                    diesel::insert_into(backup_logs::table)
                        .values(&record)
                        .returning(BackupLog::as_returning())
                        .get_result(conn)
                        .await
                        .map_err(|err| orphan_error(err, asset_id))
                }
                .scope_boxed()
            })
            .await?;

        info!(asset_id, status = %backup.status, "backup log added");
        Ok(backup)
    }
}

fn orphan_error(err: DieselError, asset_id: i32) -> ServiceError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
            ServiceError::asset_not_found(asset_id)
        }
        other => other.into(),
    }
}
