//! Row types for the inventory store and the closed vocabularies they use.

use crate::schema::{assets, availability_logs, backup_logs, capacity_records, security_notes};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Declares a closed set of labels stored as `TEXT` and exchanged as the same
/// strings over JSON.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            Serialize,
            Deserialize,
            diesel::expression::AsExpression,
            diesel::deserialize::FromSqlRow,
        )]
        #[diesel(sql_type = diesel::sql_types::Text)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                match raw {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "'{other}' is not one of: {}",
                        [$($text),+].join(", ")
                    )),
                }
            }
        }

        impl diesel::serialize::ToSql<diesel::sql_types::Text, diesel::sqlite::Sqlite> for $name {
            fn to_sql<'b>(
                &'b self,
                out: &mut diesel::serialize::Output<'b, '_, diesel::sqlite::Sqlite>,
            ) -> diesel::serialize::Result {
                out.set_value(self.as_str());
                Ok(diesel::serialize::IsNull::No)
            }
        }

        impl diesel::deserialize::FromSql<diesel::sql_types::Text, diesel::sqlite::Sqlite> for $name {
            fn from_sql(
                value: <diesel::sqlite::Sqlite as diesel::backend::Backend>::RawValue<'_>,
            ) -> diesel::deserialize::Result<Self> {
                let raw = <String as diesel::deserialize::FromSql<
                    diesel::sql_types::Text,
                    diesel::sqlite::Sqlite,
                >>::from_sql(value)?;
                raw.parse::<$name>().map_err(Into::into)
            }
        }
    };
}

text_enum!(
    /// Kind of hardware an asset represents.
    AssetType {
        Server => "Server",
        Laptop => "Laptop",
        Router => "Router",
        Other => "Other",
    }
);

text_enum!(
    /// Result of a single reachability probe.
    CheckStatus {
        Up => "up",
        Down => "down",
    }
);

text_enum!(
    Severity {
        Low => "Low",
        Medium => "Medium",
        High => "High",
    }
);

text_enum!(
    BackupStatus {
        Success => "Success",
        Failed => "Failed",
    }
);

impl Default for AssetType {
    fn default() -> Self {
        AssetType::Other
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Low
    }
}

impl Default for BackupStatus {
    fn default() -> Self {
        BackupStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = assets, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Asset {
    pub id: i32,
    pub name: String,
    pub asset_type: AssetType,
    pub ip_address: Option<String>,
    pub location: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Validated column values for an asset, used for both inserts and full
/// replacement updates.
#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = assets, treat_none_as_null = true)]
pub struct AssetRecord {
    pub name: String,
    pub asset_type: AssetType,
    pub ip_address: Option<String>,
    pub location: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = availability_logs, check_for_backend(diesel::sqlite::Sqlite))]
pub struct AvailabilityLog {
    pub id: i32,
    pub asset_id: i32,
    pub timestamp: DateTime<Utc>,
    pub status: CheckStatus,
    pub response_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = availability_logs)]
pub struct NewAvailabilityLog {
    pub asset_id: i32,
    pub timestamp: DateTime<Utc>,
    pub status: CheckStatus,
    pub response_time_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = security_notes, check_for_backend(diesel::sqlite::Sqlite))]
pub struct SecurityNote {
    pub id: i32,
    pub asset_id: i32,
    pub date: NaiveDate,
    pub note: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = security_notes)]
pub struct SecurityNoteRecord {
    pub asset_id: i32,
    pub date: NaiveDate,
    pub note: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = capacity_records, check_for_backend(diesel::sqlite::Sqlite))]
pub struct CapacityRecord {
    pub id: i32,
    pub asset_id: i32,
    pub date: NaiveDate,
    pub total_gb: f64,
    pub used_gb: f64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = capacity_records)]
pub struct CapacityRecordRow {
    pub asset_id: i32,
    pub date: NaiveDate,
    pub total_gb: f64,
    pub used_gb: f64,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = backup_logs, check_for_backend(diesel::sqlite::Sqlite))]
pub struct BackupLog {
    pub id: i32,
    pub asset_id: i32,
    pub backup_date: NaiveDate,
    pub status: BackupStatus,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = backup_logs)]
pub struct BackupLogRecord {
    pub asset_id: i32,
    pub backup_date: NaiveDate,
    pub status: BackupStatus,
    pub location: Option<String>,
    pub notes: Option<String>,
}

/// An asset together with every log it owns, newest entries first.
#[derive(Debug, Clone, Serialize)]
pub struct AssetDetail {
    pub asset: Asset,
    pub availability_logs: Vec<AvailabilityLog>,
    pub security_notes: Vec<SecurityNote>,
    pub capacity_records: Vec<CapacityRecord>,
    pub backup_logs: Vec<BackupLog>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub assets: Vec<Asset>,
    pub recent_checks: Vec<AvailabilityLog>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_from_str() {
        for kind in AssetType::ALL {
            assert_eq!(kind.as_str().parse::<AssetType>(), Ok(*kind));
        }
        assert_eq!("up".parse::<CheckStatus>(), Ok(CheckStatus::Up));
    }

    #[test]
    fn unknown_label_lists_allowed_values() {
        let err = "Printer".parse::<AssetType>().unwrap_err();
        assert_eq!(err, "'Printer' is not one of: Server, Laptop, Router, Other");
    }

    #[test]
    fn labels_serialize_as_stored_text() {
        assert_eq!(
            serde_json::to_value(CheckStatus::Down).unwrap(),
            serde_json::json!("down")
        );
        assert_eq!(
            serde_json::to_value(Severity::ALL).unwrap(),
            serde_json::json!(["Low", "Medium", "High"])
        );
    }
}
