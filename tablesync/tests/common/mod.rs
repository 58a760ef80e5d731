#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tablesync::sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tablesync::{
    ColumnDefinition, ConfigKey, ConnectParams, ConnectionFactory, RuntimeContext, SchemaCatalog,
    TableSchema,
};

/// Hands out clones of one in-memory SQLite pool so every operation sees the
/// same database, and counts connection attempts.
pub struct SharedConnector {
    db: DatabaseConnection,
    connects: AtomicUsize,
}

impl SharedConnector {
    pub async fn new() -> Arc<Self> {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).min_connections(1);
        let db = Database::connect(opts)
            .await
            .expect("Failed to open in-memory SQLite");
        Arc::new(Self {
            db,
            connects: AtomicUsize::new(0),
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ConnectionFactory for SharedConnector {
    async fn connect(&self, _params: &ConnectParams) -> Result<DatabaseConnection, DbErr> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.db.clone())
    }
}

/// Like [`SharedConnector`], but tracks how many handles are out at once and
/// yields inside `connect` so concurrent callers interleave.
pub struct TrackingConnector {
    db: DatabaseConnection,
    open: AtomicUsize,
    peak: AtomicUsize,
}

impl TrackingConnector {
    pub async fn new() -> Arc<Self> {
        let shared = SharedConnector::new().await;
        Arc::new(Self {
            db: shared.db.clone(),
            open: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ConnectionFactory for TrackingConnector {
    async fn connect(&self, _params: &ConnectParams) -> Result<DatabaseConnection, DbErr> {
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(open, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(self.db.clone())
    }

    async fn release(&self, conn: DatabaseConnection) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        drop(conn);
    }
}

/// A server that is never reachable.
pub struct DownConnector;

#[async_trait::async_trait]
impl ConnectionFactory for DownConnector {
    async fn connect(&self, _params: &ConnectParams) -> Result<DatabaseConnection, DbErr> {
        Err(DbErr::Custom("connection refused".into()))
    }
}

/// `items(id INTEGER auto PK, name NOT NULL, stock INT NOT NULL DEFAULT 0)`
pub fn items_catalog() -> SchemaCatalog {
    SchemaCatalog::new(vec![
        TableSchema::new(
            "items",
            "id",
            vec![
                ColumnDefinition::new("id", "INTEGER").not_null().auto_generate(),
                ColumnDefinition::text("name").not_null(),
                ColumnDefinition::new("stock", "INT").not_null().default_value("0"),
            ],
        )
        .expect("valid items table"),
    ])
    .expect("valid catalog")
}

pub fn config(default_table: &str) -> Vec<(ConfigKey, String)> {
    vec![
        (ConfigKey::Host, ":memory:".into()),
        (ConfigKey::User, "test".into()),
        (ConfigKey::Database, "main".into()),
        (ConfigKey::DefaultTable, default_table.into()),
    ]
}

/// A provisioned context over a fresh in-memory database.
pub async fn context(catalog: SchemaCatalog, default_table: &str) -> (RuntimeContext, Arc<SharedConnector>) {
    let connector = SharedConnector::new().await;
    let mut ctx = RuntimeContext::new(SchemaCatalog::empty(), connector.clone());
    ctx.init([], Some(catalog), config(default_table))
        .await
        .expect("Failed to provision");
    (ctx, connector)
}
