//! Reading a registered table into a [`Dataset`].

use sea_orm::{ConnectionTrait, QueryResult, Statement, prelude::Decimal};

use crate::dataset::{Dataset, Row, Value};
use crate::dialect::Backend;
use crate::error::{Error, Result};
use crate::schema::{ColumnKind, TableSchema};

/// `SELECT <registered columns> FROM <table>`, never a wildcard.
pub fn select_sql(table: &TableSchema, backend: Backend) -> String {
    let columns: Vec<String> = table
        .columns()
        .iter()
        .map(|c| backend.quote(c.name()))
        .collect();
    format!("SELECT {} FROM {}", columns.join(", "), backend.quote(table.name()))
}

fn decode_integer(row: &QueryResult, idx: usize) -> std::result::Result<Value, sea_orm::DbErr> {
    row.try_get_by_index::<Option<i64>>(idx)
        .or_else(|_| row.try_get_by_index::<Option<i32>>(idx).map(|v| v.map(i64::from)))
        .map(Value::from)
}

fn decode_real(row: &QueryResult, idx: usize) -> std::result::Result<Value, sea_orm::DbErr> {
    row.try_get_by_index::<Option<f64>>(idx)
        .map(Value::from)
        .or_else(|_| {
            row.try_get_by_index::<Option<Decimal>>(idx).map(|v| {
                v.and_then(|d| d.to_string().parse::<f64>().ok())
                    .map(Value::Float)
                    .unwrap_or_default()
            })
        })
        .or_else(|_| row.try_get_by_index::<Option<i64>>(idx).map(|v| v.map(|i| i as f64).into()))
        .or_else(|_| {
            row.try_get_by_index::<Option<String>>(idx)
                .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok()).into())
        })
}

fn decode_text(row: &QueryResult, idx: usize) -> std::result::Result<Value, sea_orm::DbErr> {
    row.try_get_by_index::<Option<String>>(idx).map(Value::from)
}

fn decode_row(table: &TableSchema, row: &QueryResult) -> Result<Row> {
    table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let value = match column.kind() {
                ColumnKind::Integer => decode_integer(row, idx),
                ColumnKind::Real => decode_real(row, idx),
                ColumnKind::Text => decode_text(row, idx),
            }
            .map_err(|e| {
                Error::Persistence(format!(
                    "couldn't decode {}.{}: {e}",
                    table.name(),
                    column.name()
                ))
            })?;
            Ok((column.name().to_string(), value))
        })
        .collect()
}

/// Read every row of `table`. An empty table yields an empty dataset whose
/// columns are still the registered ones.
pub async fn fetch_table(db: &impl ConnectionTrait, table: &TableSchema) -> Result<Dataset> {
    let backend = Backend::from(db.get_database_backend());
    let sql = select_sql(table, backend);
    log::debug!("{sql}");

    let rows = db
        .query_all_raw(Statement::from_string(backend.database_backend(), sql))
        .await
        .map_err(Error::persistence)?;

    let mut dataset = Dataset::new(table.column_names());
    for row in &rows {
        dataset.push_row(decode_row(table, row)?);
    }
    Ok(dataset)
}
