//! Reconciling a persisted table with a desired dataset.
//!
//! Rows are compared by value over every column the two datasets share
//! (null matches null, a missing cell counts as null). A desired row with no
//! match is inserted, a persisted row with no match is deleted by primary
//! key. Changing a non-key field of a row that keeps its primary key
//! therefore surfaces as an insert that collides with the old row's key: the
//! batch fails and is rolled back. Updates in place are not supported.
//!
//! Desired cells are first coerced to what their column stores (see
//! [`coerce`]), so a dataset compares equal to its own fetched form.
//!
//! All inserts run before all deletes, inside a single transaction committed
//! once.

use std::collections::HashSet;

use sea_orm::{ConnectionTrait, DatabaseConnection, Statement, TransactionTrait};

use crate::dataset::{Dataset, MatchKey, Row, Value};
use crate::dialect::Backend;
use crate::error::{Error, Result};
use crate::fetch::fetch_table;
use crate::schema::{ColumnDefinition, ColumnKind, TableSchema};

/// Result of a successful synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The desired dataset already matched the table; nothing was written.
    NoChanges,
    /// One transaction inserted and deleted this many rows.
    Applied { inserted: usize, deleted: usize },
}

impl SyncOutcome {
    /// Rows inserted, zero for [`SyncOutcome::NoChanges`].
    pub fn inserted(&self) -> usize {
        match self {
            SyncOutcome::NoChanges => 0,
            SyncOutcome::Applied { inserted, .. } => *inserted,
        }
    }

    /// Rows deleted, zero for [`SyncOutcome::NoChanges`].
    pub fn deleted(&self) -> usize {
        match self {
            SyncOutcome::NoChanges => 0,
            SyncOutcome::Applied { deleted, .. } => *deleted,
        }
    }
}

/// Partition of an outer join between the persisted and desired datasets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff {
    /// Desired rows with no persisted match.
    pub to_insert: Vec<Row>,
    /// Persisted rows with no desired match.
    pub to_delete: Vec<Row>,
    /// Desired rows matched by at least one persisted row.
    pub unchanged: usize,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_delete.is_empty()
    }
}

fn join_key(row: &Row, shared: &[&str]) -> Vec<MatchKey> {
    shared
        .iter()
        .map(|c| row.get(*c).map(Value::match_key).unwrap_or(MatchKey::Null))
        .collect()
}

/// Full outer join of `current` and `desired` over their shared columns.
pub fn diff(current: &Dataset, desired: &Dataset) -> Diff {
    let shared: Vec<&str> = current
        .columns()
        .iter()
        .filter(|c| desired.has_column(c))
        .map(String::as_str)
        .collect();

    let current_keys: HashSet<Vec<MatchKey>> =
        current.rows().iter().map(|r| join_key(r, &shared)).collect();
    let desired_keys: HashSet<Vec<MatchKey>> =
        desired.rows().iter().map(|r| join_key(r, &shared)).collect();

    let mut out = Diff::default();
    for r in desired.rows() {
        if current_keys.contains(&join_key(r, &shared)) {
            out.unchanged += 1;
        } else {
            out.to_insert.push(r.clone());
        }
    }
    out.to_delete = current
        .rows()
        .iter()
        .filter(|r| !desired_keys.contains(&join_key(r, &shared)))
        .cloned()
        .collect();
    out
}

/// The cell `column` would store and read back for `value`. Text that does
/// not parse as a number is kept as text and left for the store to reject.
pub fn coerce(value: &Value, column: &ColumnDefinition) -> Value {
    match (column.kind(), value) {
        (_, Value::Null) => Value::Null,
        (ColumnKind::Integer, Value::Float(f)) if f.fract() == 0.0 => Value::Int(*f as i64),
        (ColumnKind::Integer, Value::Text(s)) => {
            s.trim().parse().map(Value::Int).unwrap_or_else(|_| value.clone())
        }
        (ColumnKind::Real, Value::Int(i)) => Value::Float(*i as f64),
        (ColumnKind::Real, Value::Text(s)) => {
            s.trim().parse().map(Value::Float).unwrap_or_else(|_| value.clone())
        }
        (ColumnKind::Text, Value::Int(i)) => Value::Text(i.to_string()),
        (ColumnKind::Text, Value::Float(f)) => Value::Text(f.to_string()),
        _ => value.clone(),
    }
}

/// Convert a cell into the bind value its column stores.
pub fn normalize(value: &Value, column: &ColumnDefinition) -> sea_orm::Value {
    match coerce(value, column) {
        Value::Null => match column.kind() {
            ColumnKind::Integer => Option::<i64>::None.into(),
            ColumnKind::Real => Option::<f64>::None.into(),
            ColumnKind::Text => Option::<String>::None.into(),
        },
        Value::Int(i) => Some(i).into(),
        Value::Float(f) => Some(f).into(),
        Value::Text(s) => Some(s).into(),
    }
}

/// `desired` with every cell coerced to its column. Columns the table does
/// not declare pass through unchanged.
pub fn coerce_dataset(table: &TableSchema, desired: &Dataset) -> Dataset {
    let rows = desired.rows().iter().map(|r| {
        r.iter()
            .map(|(name, value)| {
                let value = match table.column(name) {
                    Some(column) => coerce(value, column),
                    None => value.clone(),
                };
                (name.clone(), value)
            })
            .collect::<Row>()
    });
    Dataset::with_rows(desired.columns().iter().cloned(), rows)
}

/// Parameterized insert for one row, naming `columns` in the order given.
/// Null cells of columns that can self-generate are left out so the store's
/// default applies; columns the table does not declare are skipped.
pub fn insert_statement(
    table: &TableSchema,
    columns: &[String],
    row: &Row,
    backend: Backend,
) -> Statement {
    let mut names = Vec::new();
    let mut values = Vec::new();
    for column in columns.iter().filter_map(|c| table.column(c)) {
        let value = row.get(column.name()).unwrap_or(&Value::Null);
        if value.is_null() && column.can_self_generate() {
            continue;
        }
        names.push(backend.quote(column.name()));
        values.push(normalize(value, column));
    }

    let sql = if names.is_empty() {
        match backend {
            Backend::MySql => format!("INSERT INTO {} () VALUES ()", backend.quote(table.name())),
            Backend::Postgres | Backend::Sqlite => {
                format!("INSERT INTO {} DEFAULT VALUES", backend.quote(table.name()))
            }
        }
    } else {
        let placeholders: Vec<String> = (1..=names.len()).map(|n| backend.placeholder(n)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            backend.quote(table.name()),
            names.join(", "),
            placeholders.join(", ")
        )
    };

    Statement::from_sql_and_values(backend.database_backend(), sql, values)
}

/// Parameterized delete keyed by the row's primary key.
pub fn delete_statement(table: &TableSchema, row: &Row, backend: Backend) -> Result<Statement> {
    let pk = table.primary_key();
    let value = row.get(pk).filter(|v| !v.is_null()).ok_or_else(|| {
        Error::Persistence(format!("row of `{}` has no `{pk}` to delete by", table.name()))
    })?;
    let column = table
        .column(pk)
        .ok_or_else(|| Error::schema(format!("primary key `{pk}` missing from `{}`", table.name())))?;

    let sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        backend.quote(table.name()),
        backend.quote(pk),
        backend.placeholder(1)
    );
    Ok(Statement::from_sql_and_values(
        backend.database_backend(),
        sql,
        [normalize(value, column)],
    ))
}

/// Reject desired columns, or row keys, the table does not declare.
pub fn check_columns(table: &TableSchema, desired: &Dataset) -> Result<()> {
    let mut names = desired
        .columns()
        .iter()
        .chain(desired.rows().iter().flat_map(|r| r.keys()));
    match names.find(|c| table.column(c).is_none()) {
        Some(unknown) => Err(Error::schema(format!(
            "`{unknown}` is not a column of `{}`",
            table.name()
        ))),
        None => Ok(()),
    }
}

/// Fetch, diff and apply over `db`. The caller holds whatever lock keeps
/// other writers off `table` for the duration.
pub async fn synchronize_table(
    db: &DatabaseConnection,
    table: &TableSchema,
    desired: &Dataset,
) -> Result<SyncOutcome> {
    check_columns(table, desired)?;
    let desired = coerce_dataset(table, desired);

    let current = fetch_table(db, table).await?;
    let diff = diff(&current, &desired);
    if diff.is_empty() {
        log::info!("No changes detected for `{}`", table.name());
        return Ok(SyncOutcome::NoChanges);
    }

    let backend = Backend::from(db.get_database_backend());
    let mut statements = Vec::with_capacity(diff.to_insert.len() + diff.to_delete.len());
    for r in &diff.to_insert {
        statements.push(insert_statement(table, desired.columns(), r, backend));
    }
    for r in &diff.to_delete {
        statements.push(delete_statement(table, r, backend)?);
    }

    let txn = db.begin().await.map_err(Error::persistence)?;
    for stmt in statements {
        log::debug!("{stmt}");
        if let Err(e) = txn.execute_raw(stmt).await {
            log::warn!("Rolling back `{}` batch: {e}", table.name());
            if let Err(rollback) = txn.rollback().await {
                log::warn!("Rollback of `{}` failed: {rollback}", table.name());
            }
            return Err(Error::persistence(e));
        }
    }
    txn.commit().await.map_err(Error::persistence)?;

    let outcome = SyncOutcome::Applied {
        inserted: diff.to_insert.len(),
        deleted: diff.to_delete.len(),
    };
    log::info!(
        "Synchronized `{}`: {} inserted, {} deleted",
        table.name(),
        outcome.inserted(),
        outcome.deleted()
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::row;
    use crate::registry::SchemaCatalog;

    fn items() -> TableSchema {
        TableSchema::new(
            "items",
            "id",
            vec![
                ColumnDefinition::new("id", "INTEGER").not_null().auto_generate(),
                ColumnDefinition::text("name").not_null(),
                ColumnDefinition::new("stock", "INT").not_null().default_value("0"),
                ColumnDefinition::text("note"),
            ],
        )
        .unwrap()
    }

    fn names<const N: usize>(columns: [&str; N]) -> Vec<String> {
        columns.iter().map(|c| c.to_string()).collect()
    }

    fn columns() -> [&'static str; 3] {
        ["id", "name", "stock"]
    }

    #[test]
    fn test_diff_inserts_new_row_only() {
        let current = Dataset::with_rows(
            columns(),
            [row([("id", Value::Int(1)), ("name", "A".into()), ("stock", Value::Int(5))])],
        );
        let desired = Dataset::with_rows(
            columns(),
            [
                row([("id", Value::Int(1)), ("name", "A".into()), ("stock", Value::Int(5))]),
                row([("name", Value::from("B")), ("stock", Value::Int(0))]),
            ],
        );

        let diff = diff(&current, &desired);
        assert_eq!(diff.unchanged, 1);
        assert!(diff.to_delete.is_empty());
        assert_eq!(diff.to_insert.len(), 1);
        assert_eq!(diff.to_insert[0].get("name"), Some(&Value::from("B")));
    }

    #[test]
    fn test_diff_detects_deleted_row() {
        let current = Dataset::with_rows(
            ["id", "name"],
            [row([("id", 1), ("name", 0)]), row([("id", 2), ("name", 0)])],
        );
        let desired = Dataset::with_rows(["id", "name"], [row([("id", 1), ("name", 0)])]);

        let diff = diff(&current, &desired);
        assert!(diff.to_insert.is_empty());
        assert_eq!(diff.to_delete.len(), 1);
        assert_eq!(diff.to_delete[0].get("id"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_diff_only_compares_shared_columns() {
        let current = Dataset::with_rows(
            columns(),
            [row([("id", Value::Int(1)), ("name", "A".into()), ("stock", Value::Int(5))])],
        );
        // no `id` column at all: the row still matches on name and stock
        let desired = Dataset::with_rows(
            ["name", "stock"],
            [row([("name", Value::from("A")), ("stock", Value::Int(5))])],
        );
        assert!(diff(&current, &desired).is_empty());
    }

    #[test]
    fn test_non_key_change_is_delete_plus_insert() {
        let current = Dataset::with_rows(["id", "name"], [row([("id", Value::Int(1)), ("name", "A".into())])]);
        let desired = Dataset::with_rows(["id", "name"], [row([("id", Value::Int(1)), ("name", "Z".into())])]);

        let diff = diff(&current, &desired);
        assert_eq!(diff.to_insert.len(), 1);
        assert_eq!(diff.to_delete.len(), 1);
    }

    #[test]
    fn test_insert_omits_self_generating_nulls() {
        let r = row([("name", Value::from("B")), ("id", Value::Null)]);
        let stmt = insert_statement(&items(), &names(["id", "name", "stock"]), &r, Backend::MySql);
        assert_eq!(stmt.sql, "INSERT INTO `items` (`name`) VALUES (?)");
        assert_eq!(stmt.values.map(|v| v.0.len()), Some(1));
    }

    #[test]
    fn test_insert_keeps_required_nulls() {
        // `name` cannot self-generate, so its null is sent and the store rejects it
        let r = row([("stock", Value::Int(3))]);
        let stmt = insert_statement(&items(), &names(["id", "name", "stock"]), &r, Backend::Postgres);
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"items\" (\"name\", \"stock\") VALUES ($1, $2)"
        );
    }

    #[test]
    fn test_insert_all_defaults() {
        let catalog = SchemaCatalog::new(vec![
            TableSchema::new(
                "log",
                "id",
                vec![ColumnDefinition::new("id", "INTEGER").not_null().auto_generate()],
            )
            .unwrap(),
        ])
        .unwrap();
        let stmt = insert_statement(catalog.get_table("log").unwrap(), &names(["id"]), &Row::new(), Backend::Sqlite);
        assert_eq!(stmt.sql, "INSERT INTO \"log\" DEFAULT VALUES");
    }

    #[test]
    fn test_normalize_numeric_cells() {
        let stock = ColumnDefinition::new("stock", "INT");
        let price = ColumnDefinition::new("price", "DECIMAL(13,2)");
        let title = ColumnDefinition::text("title");

        assert_eq!(normalize(&Value::Float(4.0), &stock), sea_orm::Value::from(Some(4i64)));
        assert_eq!(normalize(&Value::from("7"), &stock), sea_orm::Value::from(Some(7i64)));
        assert_eq!(normalize(&Value::Int(2), &price), sea_orm::Value::from(Some(2.0f64)));
        assert_eq!(normalize(&Value::Int(9), &title), sea_orm::Value::from(Some("9".to_string())));
        assert_eq!(normalize(&Value::Null, &stock), sea_orm::Value::from(Option::<i64>::None));
        assert_eq!(normalize(&Value::Null, &title), sea_orm::Value::from(Option::<String>::None));
    }

    #[test]
    fn test_insert_follows_dataset_column_order() {
        let r = row([("id", Value::Int(4)), ("name", "D".into()), ("stock", Value::Int(1))]);
        let stmt = insert_statement(&items(), &names(["stock", "name", "id"]), &r, Backend::MySql);
        assert_eq!(stmt.sql, "INSERT INTO `items` (`stock`, `name`, `id`) VALUES (?, ?, ?)");
    }

    #[test]
    fn test_coerce_matches_stored_form() {
        let stock = ColumnDefinition::new("stock", "INT");
        let price = ColumnDefinition::new("price", "DECIMAL(13,2)");
        let title = ColumnDefinition::text("title");

        assert_eq!(coerce(&Value::from(" 5 "), &stock), Value::Int(5));
        assert_eq!(coerce(&Value::from("many"), &stock), Value::from("many"));
        assert_eq!(coerce(&Value::Float(2.5), &stock), Value::Float(2.5));
        assert_eq!(coerce(&Value::from("1.25"), &price), Value::Float(1.25));
        assert_eq!(coerce(&Value::Int(9), &title), Value::from("9"));
        assert_eq!(coerce(&Value::Float(9.5), &title), Value::from("9.5"));
        assert_eq!(coerce(&Value::Null, &title), Value::Null);
    }

    #[test]
    fn test_coerced_dataset_matches_fetched_rows() {
        let fetched = Dataset::with_rows(
            columns(),
            [row([("id", Value::Int(1)), ("name", "9".into()), ("stock", Value::Int(5))])],
        );
        let desired = Dataset::with_rows(
            columns(),
            [row([("id", Value::Int(1)), ("name", Value::Int(9)), ("stock", Value::from("5"))])],
        );
        assert!(!diff(&fetched, &desired).is_empty());
        assert!(diff(&fetched, &coerce_dataset(&items(), &desired)).is_empty());
    }

    #[test]
    fn test_delete_by_primary_key() {
        let r = row([("id", Value::Int(2)), ("name", Value::from("B"))]);
        let stmt = delete_statement(&items(), &r, Backend::MySql).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM `items` WHERE `id` = ?");

        let keyless = row([("name", Value::from("B"))]);
        assert!(delete_statement(&items(), &keyless, Backend::MySql).is_err());
    }

    #[test]
    fn test_unknown_desired_column_rejected() {
        let desired = Dataset::new(["id", "category"]);
        assert!(matches!(check_columns(&items(), &desired), Err(Error::Schema(_))));
    }

    #[test]
    fn test_undeclared_row_key_rejected() {
        let desired: Dataset = serde_json::from_value(serde_json::json!({
            "columns": ["id", "name"],
            "rows": [{"id": 1, "name": "A", "category": "Tools"}]
        }))
        .unwrap();
        assert!(matches!(check_columns(&items(), &desired), Err(Error::Schema(_))));
    }
}
