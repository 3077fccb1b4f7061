//! Asset CRUD plus the read models built around an asset.

use crate::{
    db::{self, DbConnection, SqlitePool},
    error::{Result, ServiceError},
    forms::{AssetChanges, AssetForm, FieldErrors},
    models::{
        Asset, AssetDetail, AvailabilityLog, BackupLog, CapacityRecord, Dashboard, SecurityNote,
    },
    schema::{assets, availability_logs, backup_logs, capacity_records, security_notes},
};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, RunQueryDsl};
use tracing::info;

const IP_TAKEN: &str = "is already assigned to another asset";

#[derive(Clone)]
pub struct AssetRegistry {
    pool: SqlitePool,
}

impl AssetRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Asset>> {
        let mut conn = db::checkout(&self.pool).await?;
        load_assets(&mut conn).await
    }

    pub async fn get(&self, id: i32) -> Result<Asset> {
        let mut conn = db::checkout(&self.pool).await?;
        find_asset(&mut conn, id).await
    }

    pub async fn create(&self, form: AssetForm) -> Result<Asset> {
        let record = form.validate()?;
        let mut conn = db::checkout(&self.pool).await?;

        let asset = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    ensure_unique_ip(conn, record.ip_address.as_deref(), None).await?;
                    diesel::insert_into(assets::table)
                        .values(&record)
                        .returning(Asset::as_returning())
                        .get_result(conn)
                        .await
                        .map_err(map_write_error)
                }
                .scope_boxed()
            })
            .await?;

        info!(asset_id = asset.id, name = %asset.name, "asset created");
        Ok(asset)
    }

    pub async fn update(&self, id: i32, changes: AssetChanges) -> Result<Asset> {
        let mut conn = db::checkout(&self.pool).await?;

        let asset = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    let current = find_asset(conn, id).await?;
                    let record = changes.apply(current)?;
                    ensure_unique_ip(conn, record.ip_address.as_deref(), Some(id)).await?;
                    diesel::update(assets::table.find(id))
                        .set(&record)
                        .returning(Asset::as_returning())
                        .get_result(conn)
                        .await
                        .map_err(map_write_error)
                }
                .scope_boxed()
            })
            .await?;

        info!(asset_id = asset.id, "asset updated");
        Ok(asset)
    }

    /// Deletes the asset. The store cascades the delete to every log table.
    pub async fn delete(&self, id: i32) -> Result<()> {
        let mut conn = db::checkout(&self.pool).await?;
        let deleted = diesel::delete(assets::table.find(id))
            .execute(&mut *conn)
            .await?;

        if deleted == 0 {
            return Err(ServiceError::asset_not_found(id));
        }

        info!(asset_id = id, "asset deleted");
        Ok(())
    }

    pub async fn detail(&self, id: i32) -> Result<AssetDetail> {
        let mut conn = db::checkout(&self.pool).await?;
        let conn = &mut *conn;
        let asset = find_asset(conn, id).await?;

        let availability_logs = availability_logs::table
            .filter(availability_logs::asset_id.eq(id))
            .order((availability_logs::timestamp.desc(), availability_logs::id.desc()))
            .select(AvailabilityLog::as_select())
            .load(conn)
            .await?;

        let security_notes = security_notes::table
            .filter(security_notes::asset_id.eq(id))
            .order((security_notes::date.desc(), security_notes::id.desc()))
            .select(SecurityNote::as_select())
            .load(conn)
            .await?;

        let capacity_records = capacity_records::table
            .filter(capacity_records::asset_id.eq(id))
            .order((capacity_records::date.desc(), capacity_records::id.desc()))
            .select(CapacityRecord::as_select())
            .load(conn)
            .await?;

        let backup_logs = backup_logs::table
            .filter(backup_logs::asset_id.eq(id))
            .order((backup_logs::backup_date.desc(), backup_logs::id.desc()))
            .select(BackupLog::as_select())
            .load(conn)
            .await?;

        Ok(AssetDetail {
            asset,
            availability_logs,
            security_notes,
            capacity_records,
            backup_logs,
        })
    }

    /// Every asset plus the `recent_limit` newest availability checks across
    /// all assets.
    pub async fn dashboard(&self, recent_limit: i64) -> Result<Dashboard> {
        let mut conn = db::checkout(&self.pool).await?;
        let assets = load_assets(&mut conn).await?;

        let recent_checks = availability_logs::table
            .order((availability_logs::timestamp.desc(), availability_logs::id.desc()))
            .limit(recent_limit)
            .select(AvailabilityLog::as_select())
            .load(&mut *conn)
            .await?;

        Ok(Dashboard {
            assets,
            recent_checks,
        })
    }
}

pub(crate) async fn find_asset(conn: &mut DbConnection, id: i32) -> Result<Asset> {
    assets::table
        .find(id)
        .select(Asset::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| ServiceError::asset_not_found(id))
}

async fn load_assets(conn: &mut DbConnection) -> Result<Vec<Asset>> {
    let rows = assets::table
        .order(assets::id.asc())
        .select(Asset::as_select())
        .load(conn)
        .await?;
    Ok(rows)
}

async fn ensure_unique_ip(
    conn: &mut DbConnection,
    ip: Option<&str>,
    owner: Option<i32>,
) -> Result<()> {
    let Some(ip) = ip else {
        return Ok(());
    };

    let holder: Option<i32> = assets::table
        .filter(assets::ip_address.eq(ip))
        .select(assets::id)
        .first(conn)
        .await
        .optional()?;

    match holder {
        Some(holder) if Some(holder) != owner => {
            Err(FieldErrors::single("ip_address", IP_TAKEN).into())
        }
        _ => Ok(()),
    }
}

/// The UNIQUE constraint still guards the address if a concurrent writer
/// slips past [`ensure_unique_ip`].
fn map_write_error(err: DieselError) -> ServiceError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            FieldErrors::single("ip_address", IP_TAKEN).into()
        }
        other => other.into(),
    }
}
