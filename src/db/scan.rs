//! Typed scan targets and the per-dialect type-scan tables.
//!
//! Every column is assigned a [`ScanKind`] from its declared type when the
//! cursor opens. Backends then decode each value into the matching Rust type
//! instead of a generic catch-all, so 64-bit unsigned values and decimals
//! keep their precision.

/// The typed target a column value is scanned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanKind {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    Bool,
    Text,
    Json,
    Bytes,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    TimeTz,
    Interval,
    Uuid,
    Network,
    Money,
    /// One-dimensional array; the element type is read from the column.
    Array,
    Unknown,
}

/// Type-scan table for PostgreSQL (`PgTypeInfo` names).
pub fn postgres_kind(declared: &str) -> ScanKind {
    match declared.trim().to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => ScanKind::Bool,
        "INT2" | "SMALLINT" => ScanKind::Int16,
        "INT4" | "INT" | "INTEGER" => ScanKind::Int32,
        "INT8" | "BIGINT" => ScanKind::Int64,
        "FLOAT4" | "REAL" => ScanKind::Float32,
        "FLOAT8" | "DOUBLE PRECISION" => ScanKind::Float64,
        "NUMERIC" | "DECIMAL" => ScanKind::Decimal,
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => ScanKind::Text,
        "JSON" | "JSONB" => ScanKind::Json,
        "BYTEA" => ScanKind::Bytes,
        "DATE" => ScanKind::Date,
        "TIME" => ScanKind::Time,
        "TIMESTAMP" => ScanKind::Timestamp,
        "TIMESTAMPTZ" => ScanKind::TimestampTz,
        "TIMETZ" => ScanKind::TimeTz,
        "INTERVAL" => ScanKind::Interval,
        "OID" => ScanKind::UInt32,
        "UUID" => ScanKind::Uuid,
        "INET" | "CIDR" => ScanKind::Network,
        "MONEY" => ScanKind::Money,
        t if t.ends_with("[]") => ScanKind::Array,
        _ => ScanKind::Unknown,
    }
}

/// Type-scan table for MySQL (`MySqlTypeInfo` names).
pub fn mysql_kind(declared: &str) -> ScanKind {
    match declared.trim().to_uppercase().as_str() {
        "BOOLEAN" | "BOOL" => ScanKind::Bool,
        "TINYINT UNSIGNED" => ScanKind::UInt8,
        "SMALLINT UNSIGNED" | "YEAR" => ScanKind::UInt16,
        "MEDIUMINT UNSIGNED" | "INT UNSIGNED" => ScanKind::UInt32,
        "BIGINT UNSIGNED" | "BIT" => ScanKind::UInt64,
        "TINYINT" => ScanKind::Int8,
        "SMALLINT" => ScanKind::Int16,
        "MEDIUMINT" | "INT" => ScanKind::Int32,
        "BIGINT" => ScanKind::Int64,
        "FLOAT" => ScanKind::Float32,
        "DOUBLE" => ScanKind::Float64,
        "DECIMAL" => ScanKind::Decimal,
        "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            ScanKind::Text
        }
        "JSON" => ScanKind::Json,
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            ScanKind::Bytes
        }
        "DATE" => ScanKind::Date,
        "TIME" => ScanKind::Time,
        "DATETIME" => ScanKind::Timestamp,
        "TIMESTAMP" => ScanKind::TimestampTz,
        _ => ScanKind::Unknown,
    }
}

/// Type-scan table for SQLite (`SqliteTypeInfo` names).
///
/// Expression columns report `NULL` and `NUMERIC` columns use any storage
/// class, so both stay [`ScanKind::Unknown`] and are scanned by the storage
/// class of each value.
pub fn sqlite_kind(declared: &str) -> ScanKind {
    match declared.trim().to_uppercase().as_str() {
        "INTEGER" | "INT" | "BIGINT" => ScanKind::Int64,
        "REAL" | "FLOAT" | "DOUBLE" => ScanKind::Float64,
        "TEXT" => ScanKind::Text,
        "BLOB" => ScanKind::Bytes,
        "BOOLEAN" => ScanKind::Bool,
        "DATE" => ScanKind::Date,
        "TIME" => ScanKind::Time,
        "DATETIME" => ScanKind::Timestamp,
        _ => ScanKind::Unknown,
    }
}

/// Type-scan table for ClickHouse (type names from the result header).
pub fn clickhouse_kind(declared: &str) -> ScanKind {
    let declared = unwrap_clickhouse_modifiers(declared.trim());
    match declared {
        "UInt8" => ScanKind::UInt8,
        "UInt16" => ScanKind::UInt16,
        "UInt32" => ScanKind::UInt32,
        "UInt64" => ScanKind::UInt64,
        "Int8" => ScanKind::Int8,
        "Int16" => ScanKind::Int16,
        "Int32" => ScanKind::Int32,
        "Int64" => ScanKind::Int64,
        "Float32" => ScanKind::Float32,
        "Float64" => ScanKind::Float64,
        "Bool" => ScanKind::Bool,
        "String" | "UUID" | "IPv4" | "IPv6" => ScanKind::Text,
        "Date" | "Date32" => ScanKind::Date,
        "DateTime" => ScanKind::Timestamp,
        "JSON" => ScanKind::Json,
        t if t.starts_with("FixedString(") || t.starts_with("Enum") => ScanKind::Text,
        t if t.starts_with("Decimal") => ScanKind::Decimal,
        t if t.starts_with("DateTime(") || t.starts_with("DateTime64") => ScanKind::Timestamp,
        _ => ScanKind::Unknown,
    }
}

/// Strips `Nullable(..)` and `LowCardinality(..)` wrappers.
fn unwrap_clickhouse_modifiers(mut declared: &str) -> &str {
    loop {
        let inner = ["Nullable(", "LowCardinality("]
            .iter()
            .find_map(|prefix| declared.strip_prefix(prefix))
            .and_then(|rest| rest.strip_suffix(')'));
        match inner {
            Some(inner) => declared = inner,
            None => return declared,
        }
    }
}
