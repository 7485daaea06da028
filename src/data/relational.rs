//! MySQL table source, compiled with the `mysql` feature

use crate::config::RelationalConfig;
use crate::error::{Result, ScoreError};
use polars::prelude::*;

#[cfg(feature = "mysql")]
pub fn read_table(config: &RelationalConfig) -> Result<DataFrame> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(fetch(config))
}

#[cfg(not(feature = "mysql"))]
pub fn read_table(config: &RelationalConfig) -> Result<DataFrame> {
    Err(ScoreError::ConfigError(format!(
        "cannot read table '{}': built without the `mysql` feature",
        config.table
    )))
}

#[cfg(feature = "mysql")]
async fn fetch(config: &RelationalConfig) -> Result<DataFrame> {
    use sqlx::mysql::MySqlPoolOptions;
    use sqlx::{Column as _, Row as _, TypeInfo as _};
    use tracing::info;

    if config.table.is_empty() || !config.table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ScoreError::ConfigError(format!(
            "invalid table name '{}'",
            config.table
        )));
    }

    let pool = MySqlPoolOptions::new()
        .max_connections(1)
        .connect(&config.connection_url())
        .await
        .map_err(sql_err)?;
    info!(host = %config.host, database = %config.database, "Connected to database");

    let rows = sqlx::query(&format!("SELECT * FROM `{}`", config.table))
        .fetch_all(&pool)
        .await
        .map_err(sql_err)?;
    pool.close().await;

    let Some(first) = rows.first() else {
        return Err(ScoreError::DataError(format!(
            "table '{}' is empty",
            config.table
        )));
    };

    let mut columns = Vec::with_capacity(first.columns().len());
    for (idx, col) in first.columns().iter().enumerate() {
        let name = col.name();
        let series = match column_kind(col.type_info().name()) {
            ColumnKind::Bool => Series::new(name.into(), decode_column::<bool>(&rows, idx)?),
            ColumnKind::Signed => Series::new(name.into(), decode_column::<i64>(&rows, idx)?),
            ColumnKind::Unsigned => Series::new(name.into(), decode_column::<u64>(&rows, idx)?),
            ColumnKind::Float => Series::new(name.into(), decode_column::<f64>(&rows, idx)?),
            ColumnKind::Decimal => {
                let values = decode_column::<sqlx::types::Decimal>(&rows, idx)?
                    .into_iter()
                    .map(|v| v.map(|d| decimal_to_f64(&d.to_string())).transpose())
                    .collect::<Result<Vec<Option<f64>>>>()?;
                Series::new(name.into(), values)
            }
            ColumnKind::Text => Series::new(name.into(), decode_column::<String>(&rows, idx)?),
        };
        columns.push(series.into());
    }

    let df = DataFrame::new(columns)?;
    info!(rows = df.height(), table = %config.table, "Read relational table");
    Ok(df)
}

#[cfg(feature = "mysql")]
fn sql_err(e: sqlx::Error) -> ScoreError {
    ScoreError::DataError(format!("database error: {}", e))
}

#[cfg(feature = "mysql")]
fn decode_column<T>(rows: &[sqlx::mysql::MySqlRow], idx: usize) -> Result<Vec<Option<T>>>
where
    T: for<'r> sqlx::Decode<'r, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
{
    use sqlx::Row as _;
    rows.iter()
        .map(|r| r.try_get::<Option<T>, _>(idx))
        .collect::<std::result::Result<_, _>>()
        .map_err(sql_err)
}

/// Series type a MySQL column decodes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(feature = "mysql"), allow(dead_code))]
enum ColumnKind {
    Bool,
    Signed,
    Unsigned,
    Float,
    /// Exact numerics, read as f64
    Decimal,
    Text,
}

/// Maps a type name as the driver reports it (`INT UNSIGNED`, `BOOLEAN`,
/// `DECIMAL`) to its decoding. `TINYINT(1)` is reported as `BOOLEAN`.
#[cfg_attr(not(feature = "mysql"), allow(dead_code))]
fn column_kind(type_name: &str) -> ColumnKind {
    let type_name = type_name.to_ascii_uppercase();
    if type_name == "BOOLEAN" || type_name == "BOOL" {
        ColumnKind::Bool
    } else if type_name.contains("INT") {
        if type_name.contains("UNSIGNED") {
            ColumnKind::Unsigned
        } else {
            ColumnKind::Signed
        }
    } else if type_name.starts_with("FLOAT") || type_name.starts_with("DOUBLE") {
        ColumnKind::Float
    } else if type_name.starts_with("DECIMAL") || type_name.starts_with("NUMERIC") {
        ColumnKind::Decimal
    } else {
        ColumnKind::Text
    }
}

#[cfg_attr(not(feature = "mysql"), allow(dead_code))]
fn decimal_to_f64(text: &str) -> Result<f64> {
    text.parse::<f64>()
        .map_err(|_| ScoreError::DataError(format!("decimal value '{}' is not a number", text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_columns_keep_signedness() {
        assert_eq!(column_kind("INT"), ColumnKind::Signed);
        assert_eq!(column_kind("TINYINT"), ColumnKind::Signed);
        assert_eq!(column_kind("BIGINT"), ColumnKind::Signed);
        assert_eq!(column_kind("INT UNSIGNED"), ColumnKind::Unsigned);
        assert_eq!(column_kind("BIGINT UNSIGNED"), ColumnKind::Unsigned);
        assert_eq!(column_kind("smallint unsigned"), ColumnKind::Unsigned);
    }

    #[test]
    fn test_boolean_and_exact_numeric_columns() {
        assert_eq!(column_kind("BOOLEAN"), ColumnKind::Bool);
        assert_eq!(column_kind("DECIMAL"), ColumnKind::Decimal);
        assert_eq!(column_kind("NUMERIC"), ColumnKind::Decimal);
        assert_eq!(column_kind("DOUBLE"), ColumnKind::Float);
        assert_eq!(column_kind("FLOAT"), ColumnKind::Float);
    }

    #[test]
    fn test_other_columns_read_as_text() {
        assert_eq!(column_kind("VARCHAR"), ColumnKind::Text);
        assert_eq!(column_kind("ENUM"), ColumnKind::Text);
        assert_eq!(column_kind("TEXT"), ColumnKind::Text);
    }

    #[test]
    fn test_decimal_text_to_float() {
        assert_eq!(decimal_to_f64("72.50").unwrap(), 72.5);
        assert_eq!(decimal_to_f64("-3").unwrap(), -3.0);
        assert!(matches!(decimal_to_f64("n/a"), Err(ScoreError::DataError(_))));
    }

    #[cfg(not(feature = "mysql"))]
    #[test]
    fn test_disabled_feature_reports_config_error() {
        let config = RelationalConfig {
            host: "localhost".into(),
            user: "root".into(),
            password: String::new(),
            database: "school".into(),
            table: "students".into(),
        };
        assert!(matches!(read_table(&config), Err(ScoreError::ConfigError(_))));
    }
}
