//! Creating the registered tables and their foreign keys.
//!
//! Provisioning runs in two passes over one connection: every table is
//! created first, then foreign keys are added. A foreign key may name a
//! table registered after it, so no constraint is added before all tables
//! exist.

use sea_orm::{ConnectionTrait, Statement};

use crate::config::{ConfigKey, ConfigStore};
use crate::connection::{ConnectionFactory, open_connection};
use crate::dialect::Backend;
use crate::error::{Error, Result};
use crate::registry::SchemaCatalog;
use crate::schema::{ColumnDefinition, ColumnKind, ForeignKey, TableSchema};

/// What a [`provision`] call issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionSummary {
    /// `CREATE TABLE IF NOT EXISTS` statements executed.
    pub tables: usize,
    /// Foreign keys added in pass 2. Keys already present are skipped.
    pub foreign_keys: usize,
}

/// `` `name` TYPE [NOT NULL] [AUTO_INCREMENT] [DEFAULT value] ``
pub fn column_sql(column: &ColumnDefinition, backend: Backend) -> String {
    let mut sql_type = column.sql_type();
    // only an INTEGER primary key aliases the rowid
    if backend == Backend::Sqlite
        && column.is_auto_generated()
        && column.kind() == ColumnKind::Integer
    {
        sql_type = "INTEGER";
    }

    let mut out = format!("{} {}", backend.quote(column.name()), sql_type);
    if !column.allow_nulls() {
        out.push_str(" NOT NULL");
    }
    if column.is_auto_generated() {
        if let Some(keyword) = backend.auto_generate_keyword() {
            out.push(' ');
            out.push_str(keyword);
        }
    }
    if let Some(default) = column.default_literal() {
        out.push_str(" DEFAULT ");
        out.push_str(default);
    }
    out
}

fn foreign_key_clause(fk: &ForeignKey, backend: Backend) -> String {
    format!(
        "FOREIGN KEY ({}) REFERENCES {}({})",
        backend.quote(&fk.column),
        backend.quote(&fk.ref_table),
        backend.quote(&fk.ref_column)
    )
}

/// Pass-1 statement. On SQLite the foreign key is declared inline because it
/// cannot be added afterwards.
pub fn create_table_sql(table: &TableSchema, backend: Backend) -> String {
    let mut defs: Vec<String> = table
        .columns()
        .iter()
        .map(|c| column_sql(c, backend))
        .collect();
    defs.push(format!("PRIMARY KEY ({})", backend.quote(table.primary_key())));

    if !backend.supports_alter_foreign_key() {
        if let Some(fk) = table.foreign_key() {
            defs.push(foreign_key_clause(fk, backend));
        }
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        backend.quote(table.name()),
        defs.join(", ")
    )
}

/// Pass-2 statement, `None` when the backend declares foreign keys inline.
pub fn add_foreign_key_sql(table: &TableSchema, backend: Backend) -> Option<String> {
    let fk = table.foreign_key()?;
    if !backend.supports_alter_foreign_key() {
        return None;
    }
    Some(format!(
        "ALTER TABLE {} ADD {}",
        backend.quote(table.name()),
        foreign_key_clause(fk, backend)
    ))
}

/// Every provisioning statement in execution order, without the existing
/// constraint check [`provision`] performs.
pub fn provision_plan(catalog: &SchemaCatalog, backend: Backend) -> Vec<String> {
    let creates = catalog
        .tables()
        .iter()
        .map(|t| create_table_sql(t, backend));
    let alters = catalog
        .tables()
        .iter()
        .filter_map(|t| add_foreign_key_sql(t, backend));
    creates.chain(alters).collect()
}

async fn foreign_key_exists(
    db: &impl ConnectionTrait,
    backend: Backend,
    table: &TableSchema,
    fk: &ForeignKey,
) -> Result<bool> {
    let sql = match backend {
        Backend::MySql => {
            "SELECT COUNT(*) FROM information_schema.KEY_COLUMN_USAGE \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = ? \
             AND REFERENCED_TABLE_NAME = ?"
        }
        Backend::Postgres => {
            "SELECT COUNT(*) FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
             ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
             JOIN information_schema.constraint_column_usage ccu \
             ON tc.constraint_name = ccu.constraint_name AND tc.table_schema = ccu.table_schema \
             WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_name = $1 \
             AND kcu.column_name = $2 AND ccu.table_name = $3"
        }
        Backend::Sqlite => return Ok(true),
    };

    let row = db
        .query_one_raw(Statement::from_sql_and_values(
            backend.database_backend(),
            sql,
            [
                table.name().into(),
                fk.column.clone().into(),
                fk.ref_table.clone().into(),
            ],
        ))
        .await
        .map_err(Error::persistence)?;

    let count = match row {
        Some(row) => row.try_get_by_index::<i64>(0).map_err(Error::persistence)?,
        None => 0,
    };
    Ok(count > 0)
}

/// Whether a server-only connection is opened to create the target database
/// first. Only MySQL gets `CREATE DATABASE IF NOT EXISTS`; elsewhere a
/// server-only session may land in a database that does not exist.
pub fn creates_database(backend: Option<Backend>) -> bool {
    backend == Some(Backend::MySql)
}

async fn ensure_database(
    factory: &dyn ConnectionFactory,
    config: &ConfigStore,
    database: &str,
) -> Result<()> {
    if !creates_database(factory.backend()) {
        return Ok(());
    }

    let conn = open_connection(factory, config, false).await?;
    let sql = format!("CREATE DATABASE IF NOT EXISTS {}", Backend::MySql.quote(database));
    log::debug!("{sql}");
    let result = conn.execute_unprepared(&sql).await;
    conn.release().await;
    result.map_err(Error::persistence)?;
    Ok(())
}

async fn create_tables(
    db: &impl ConnectionTrait,
    backend: Backend,
    catalog: &SchemaCatalog,
) -> Result<ProvisionSummary> {
    let mut summary = ProvisionSummary::default();

    for table in catalog.tables() {
        let sql = create_table_sql(table, backend);
        log::debug!("{sql}");
        db.execute_unprepared(&sql)
            .await
            .map_err(Error::persistence)?;
        summary.tables += 1;
    }

    for table in catalog.tables() {
        let (Some(fk), Some(sql)) = (table.foreign_key(), add_foreign_key_sql(table, backend)) else {
            continue;
        };
        if foreign_key_exists(db, backend, table, fk).await? {
            log::debug!("Foreign key {}.{} already present", table.name(), fk.column);
            continue;
        }
        log::debug!("{sql}");
        db.execute_unprepared(&sql)
            .await
            .map_err(Error::persistence)?;
        summary.foreign_keys += 1;
    }

    Ok(summary)
}

/// Create missing tables and add foreign keys.
///
/// Does nothing, and opens no connection, when no target database is
/// configured or the catalog is empty.
pub async fn provision(
    catalog: &SchemaCatalog,
    config: &ConfigStore,
    factory: &dyn ConnectionFactory,
) -> Result<ProvisionSummary> {
    let Some(database) = config.get_opt(ConfigKey::Database) else {
        log::debug!("No target database configured, skipping provisioning");
        return Ok(ProvisionSummary::default());
    };
    if catalog.is_empty() {
        log::debug!("No tables registered, skipping provisioning");
        return Ok(ProvisionSummary::default());
    }

    ensure_database(factory, config, database).await?;

    let conn = open_connection(factory, config, true).await?;
    let result = create_tables(&*conn, conn.backend(), catalog).await;
    conn.release().await;
    let summary = result?;

    log::info!(
        "Provisioned {} tables and {} foreign keys in `{database}`",
        summary.tables,
        summary.foreign_keys
    );
    Ok(summary)
}
