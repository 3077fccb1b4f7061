//! Diesel schema definitions for the SQLite inventory store.

diesel::table! {
    assets (id) {
        id -> Integer,
        name -> Text,
        asset_type -> Text,
        ip_address -> Nullable<Text>,
        location -> Nullable<Text>,
        purchase_date -> Nullable<Date>,
        notes -> Nullable<Text>,
    }
}

diesel::table! {
    availability_logs (id) {
        id -> Integer,
        asset_id -> Integer,
        timestamp -> TimestamptzSqlite,
        status -> Text,
        response_time_ms -> Nullable<Double>,
    }
}

diesel::table! {
    security_notes (id) {
        id -> Integer,
        asset_id -> Integer,
        date -> Date,
        note -> Text,
        severity -> Text,
    }
}

diesel::table! {
    capacity_records (id) {
        id -> Integer,
        asset_id -> Integer,
        date -> Date,
        total_gb -> Double,
        used_gb -> Double,
    }
}

diesel::table! {
    backup_logs (id) {
        id -> Integer,
        asset_id -> Integer,
        backup_date -> Date,
        status -> Text,
        location -> Nullable<Text>,
        notes -> Nullable<Text>,
    }
}

diesel::joinable!(availability_logs -> assets (asset_id));
diesel::joinable!(security_notes -> assets (asset_id));
diesel::joinable!(capacity_records -> assets (asset_id));
diesel::joinable!(backup_logs -> assets (asset_id));

diesel::allow_tables_to_appear_in_same_query!(
    assets,
    availability_logs,
    security_notes,
    capacity_records,
    backup_logs,
);
