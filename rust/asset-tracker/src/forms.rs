//! Request payloads and the rules that turn them into storable rows.
//!
//! Every payload collects all of its problems before failing, so a client
//! gets the complete list of field messages in a single round trip.

use crate::models::{
    Asset, AssetRecord, AssetType, BackupLogRecord, BackupStatus, CapacityRecordRow,
    SecurityNoteRecord, Severity,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use std::{collections::BTreeMap, net::Ipv4Addr, str::FromStr};

pub const NAME_MAX_LEN: usize = 100;
pub const LOCATION_MAX_LEN: usize = 100;
pub const BACKUP_LOCATION_MAX_LEN: usize = 200;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Field name to messages, ordered by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AssetForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub asset_type: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub purchase_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl AssetForm {
    pub fn validate(self) -> Result<AssetRecord, FieldErrors> {
        let mut errors = FieldErrors::default();

        let name = optional_text(self.name);
        match &name {
            Some(name) => check_len(&mut errors, "name", name, NAME_MAX_LEN),
            None => errors.push("name", "is required"),
        }

        let asset_type = parse_choice(&mut errors, "asset_type", self.asset_type);
        let ip_address = parse_ipv4(&mut errors, self.ip_address);

        let location = optional_text(self.location);
        if let Some(location) = &location {
            check_len(&mut errors, "location", location, LOCATION_MAX_LEN);
        }

        let purchase_date = optional_text(self.purchase_date)
            .and_then(|raw| parse_date(&mut errors, "purchase_date", &raw));

        let notes = optional_text(self.notes);

        errors.finish(|| AssetRecord {
            name: name.unwrap_or_default(),
            asset_type: asset_type.unwrap_or_default(),
            ip_address,
            location,
            purchase_date,
            notes,
        })
    }
}

/// Partial asset update. Absent fields keep their stored value; an explicit
/// `null` clears a nullable column.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AssetChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub asset_type: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub ip_address: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub location: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub purchase_date: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub notes: Option<Option<String>>,
}

impl AssetChanges {
    /// Merges the changes over `current` and validates the result as a whole.
    pub fn apply(self, current: Asset) -> Result<AssetRecord, FieldErrors> {
        AssetForm {
            name: Some(self.name.unwrap_or(current.name)),
            asset_type: Some(
                self.asset_type
                    .unwrap_or_else(|| current.asset_type.as_str().to_string()),
            ),
            ip_address: self.ip_address.unwrap_or(current.ip_address),
            location: self.location.unwrap_or(current.location),
            purchase_date: self.purchase_date.unwrap_or_else(|| {
                current
                    .purchase_date
                    .map(|date| date.format(DATE_FORMAT).to_string())
            }),
            notes: self.notes.unwrap_or(current.notes),
        }
        .validate()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SecurityNoteForm {
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl SecurityNoteForm {
    pub fn validate(
        self,
        asset_id: i32,
        today: NaiveDate,
    ) -> Result<SecurityNoteRecord, FieldErrors> {
        let mut errors = FieldErrors::default();

        let note = optional_text(self.note);
        if note.is_none() {
            errors.push("note", "is required");
        }
        let severity = parse_choice(&mut errors, "severity", self.severity);
        let date = optional_text(self.date).and_then(|raw| parse_date(&mut errors, "date", &raw));

        errors.finish(|| SecurityNoteRecord {
            asset_id,
            date: date.unwrap_or(today),
            note: note.unwrap_or_default(),
            severity: severity.unwrap_or_default(),
        })
    }
}

/// Sizes are accepted as JSON numbers or numeric strings.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CapacityForm {
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub total_gb: Option<f64>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub used_gb: Option<f64>,
    #[serde(default)]
    pub date: Option<String>,
}

impl CapacityForm {
    pub fn validate(self, asset_id: i32, today: NaiveDate) -> Result<CapacityRecordRow, FieldErrors> {
        let mut errors = FieldErrors::default();

        let total_gb = require_gigabytes(&mut errors, "total_gb", self.total_gb);
        let used_gb = require_gigabytes(&mut errors, "used_gb", self.used_gb);
        if let (Some(total), Some(used)) = (total_gb, used_gb) {
            if used > total {
                errors.push("used_gb", "cannot exceed total_gb");
            }
        }
        let date = optional_text(self.date).and_then(|raw| parse_date(&mut errors, "date", &raw));

        errors.finish(|| CapacityRecordRow {
            asset_id,
            date: date.unwrap_or(today),
            total_gb: total_gb.unwrap_or_default(),
            used_gb: used_gb.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackupForm {
    #[serde(default)]
    pub backup_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BackupForm {
    pub fn validate(self, asset_id: i32) -> Result<BackupLogRecord, FieldErrors> {
        let mut errors = FieldErrors::default();

        let backup_date = match optional_text(self.backup_date) {
            Some(raw) => parse_date(&mut errors, "backup_date", &raw),
            None => {
                errors.push("backup_date", "is required");
                None
            }
        };
        let status = parse_choice(&mut errors, "status", self.status);
        let location = optional_text(self.location);
        if let Some(location) = &location {
            check_len(&mut errors, "location", location, BACKUP_LOCATION_MAX_LEN);
        }

        match backup_date {
            Some(backup_date) if errors.is_empty() => Ok(BackupLogRecord {
                asset_id,
                backup_date,
                status: status.unwrap_or_default(),
                location,
                notes: optional_text(self.notes),
            }),
            _ => Err(errors),
        }
    }
}

/// Choice lists offered to clients rendering the input forms.
#[derive(Debug, Clone, Serialize)]
pub struct FormChoices {
    pub asset_types: &'static [AssetType],
    pub severities: &'static [Severity],
    pub backup_statuses: &'static [BackupStatus],
}

impl Default for FormChoices {
    fn default() -> Self {
        Self {
            asset_types: AssetType::ALL,
            severities: Severity::ALL,
            backup_statuses: BackupStatus::ALL,
        }
    }
}

fn optional_text(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn check_len(errors: &mut FieldErrors, field: &'static str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.push(field, format!("must be at most {max} characters"));
    }
}

fn parse_choice<T>(errors: &mut FieldErrors, field: &'static str, raw: Option<String>) -> Option<T>
where
    T: FromStr<Err = String>,
{
    let raw = optional_text(raw)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(message) => {
            errors.push(field, message);
            None
        }
    }
}

fn parse_ipv4(errors: &mut FieldErrors, raw: Option<String>) -> Option<String> {
    let raw = optional_text(raw)?;
    match raw.parse::<Ipv4Addr>() {
        Ok(addr) => Some(addr.to_string()),
        Err(_) => {
            errors.push("ip_address", "must be a valid IPv4 address");
            None
        }
    }
}

fn parse_date(errors: &mut FieldErrors, field: &'static str, raw: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            errors.push(field, "must be a date in YYYY-MM-DD format");
            None
        }
    }
}

fn require_gigabytes(
    errors: &mut FieldErrors,
    field: &'static str,
    value: Option<f64>,
) -> Option<f64> {
    match value {
        None => {
            errors.push(field, "is required");
            None
        }
        Some(gb) if !gb.is_finite() || gb < 0.0 => {
            errors.push(field, "must be a non-negative number");
            None
        }
        Some(gb) => Some(gb),
    }
}
