//! [`DataSource`] backed by the local SQLite database.

use async_trait::async_trait;
use serde_json::{Number, Value};
use sqlx::{Column, Row as _, TypeInfo, ValueRef, sqlite::SqliteRow};
use tracing::debug;

use crate::{
    DBService,
    source::{DataSource, DataSourceError, Direction, Row, SelectQuery, validate_identifier},
};

impl DBService {
    /// Whether `name` exists as a table or view.
    pub async fn relation_exists(&self, name: &str) -> Result<bool, DataSourceError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(count > 0)
    }
}

#[async_trait]
impl DataSource for DBService {
    async fn select(
        &self,
        resource: &str,
        query: &SelectQuery,
    ) -> Result<Vec<Row>, DataSourceError> {
        let sql = build_select_sql(resource, query)?;
        debug!(resource, sql = %sql, "sqlite select");

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn call_procedure(&self, name: &str, _args: Value) -> Result<Vec<Row>, DataSourceError> {
        Err(DataSourceError::Unsupported(format!(
            "remote procedure {} is not available in the offline database",
            name
        )))
    }

    async fn probe_rows(&self, resource: &str) -> Result<Vec<Row>, DataSourceError> {
        validate_identifier(resource)?;
        if !self.relation_exists(resource).await? {
            return Err(DataSourceError::NotFound(resource.to_string()));
        }
        self.select(resource, &SelectQuery::probe()).await
    }
}

fn build_select_sql(resource: &str, query: &SelectQuery) -> Result<String, DataSourceError> {
    let resource = validate_identifier(resource)?;
    if query.has_embedded_relations() {
        return Err(DataSourceError::Unsupported(format!(
            "embedded relations in select list: {}",
            query.select
        )));
    }

    let columns = if query.select.trim() == "*" {
        "*".to_string()
    } else {
        query
            .select
            .split(',')
            .map(|column| validate_identifier(column.trim()).map(|c| format!("\"{}\"", c)))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ")
    };

    let mut sql = format!("SELECT {} FROM \"{}\"", columns, resource);
    if let Some(order) = &query.order {
        let direction = match order.direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        sql.push_str(&format!(
            " ORDER BY \"{}\" {}",
            validate_identifier(&order.column)?,
            direction
        ));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    Ok(sql)
}

fn map_sqlx_error(e: sqlx::Error) -> DataSourceError {
    match &e {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            if message.contains("no such table") || message.contains("no such column") {
                DataSourceError::NotFound(message.to_string())
            } else {
                DataSourceError::Database(message.to_string())
            }
        }
        sqlx::Error::PoolTimedOut => DataSourceError::Timeout,
        sqlx::Error::Io(io) => DataSourceError::Transport(io.to_string()),
        _ => DataSourceError::Database(e.to_string()),
    }
}

fn row_to_json(row: &SqliteRow) -> Row {
    let mut map = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let declared = column.type_info().name().to_ascii_uppercase();
        map.insert(
            column.name().to_string(),
            column_value(row, index, &declared),
        );
    }
    map
}

// SQLite is dynamically typed: booleans are only visible in the declared column
// type, everything else is decoded by the stored value's type.
fn column_value(row: &SqliteRow, index: usize, declared: &str) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) if declared == "BOOLEAN" => declared.to_string(),
        Ok(raw) => raw.type_info().name().to_ascii_uppercase(),
        Err(_) => return Value::Null,
    };

    match type_name.as_str() {
        "BOOLEAN" => row
            .try_get_unchecked::<i64, _>(index)
            .map(|v| Value::Bool(v != 0))
            .unwrap_or(Value::Null),
        "INTEGER" | "INT" | "INT8" | "BIGINT" => row
            .try_get_unchecked::<i64, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => row
            .try_get_unchecked::<f64, _>(index)
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "BLOB" => Value::Null,
        _ => row
            .try_get_unchecked::<String, _>(index)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}
