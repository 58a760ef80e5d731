//! Opening connections from [`ConfigStore`] values.
//!
//! Connections are not pooled across operations: each component call opens a
//! [`ScopedConnection`] and hands it back through
//! [`ScopedConnection::release`] whichever way the call exits.

use std::ops::Deref;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

use crate::config::{ConfigKey, ConfigStore};
use crate::dialect::Backend;
use crate::error::{Error, Result};

/// Parameters handed to a [`ConnectionFactory`].
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: String,
    pub user: String,
    pub password: String,
    /// `None` in server-only mode.
    pub database: Option<String>,
}

impl ConnectParams {
    /// Read connection parameters. The database name is included only when
    /// `target_database` is true and it is configured.
    pub fn from_config(config: &ConfigStore, target_database: bool) -> Result<Self> {
        let database = if target_database {
            config.get_opt(ConfigKey::Database).map(str::to_string)
        } else {
            None
        };

        Ok(Self {
            host: config.get(ConfigKey::Host)?.to_string(),
            user: config.get(ConfigKey::User)?.to_string(),
            password: config
                .get_opt(ConfigKey::Password)
                .unwrap_or_default()
                .to_string(),
            database,
        })
    }
}

impl std::fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Turns [`ConnectParams`] into a live connection.
#[async_trait::async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> std::result::Result<DatabaseConnection, DbErr>;

    /// The backend every connection will speak, when known before connecting.
    fn backend(&self) -> Option<Backend> {
        None
    }

    /// Take back a connection handed out by [`connect`](Self::connect).
    /// Factories that share one pool keep the default, which only drops the
    /// handle.
    async fn release(&self, conn: DatabaseConnection) {
        drop(conn);
    }
}

/// Connects through a URL built for one [`Backend`].
///
/// For SQLite the `host` parameter is the database file path (or `:memory:`)
/// and the database name is ignored.
#[derive(Debug, Clone, Copy)]
pub struct UrlConnector {
    backend: Backend,
}

impl UrlConnector {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub fn url(&self, params: &ConnectParams) -> String {
        let scheme = match self.backend {
            Backend::MySql => "mysql",
            Backend::Postgres => "postgres",
            Backend::Sqlite => return format!("sqlite:{}?mode=rwc", params.host),
        };

        let credentials = if params.password.is_empty() {
            params.user.clone()
        } else {
            format!("{}:{}", params.user, params.password)
        };
        let database = params.database.as_deref().unwrap_or_default();

        format!("{scheme}://{credentials}@{}/{database}", params.host)
    }
}

#[async_trait::async_trait]
impl ConnectionFactory for UrlConnector {
    async fn connect(&self, params: &ConnectParams) -> std::result::Result<DatabaseConnection, DbErr> {
        let mut opts = ConnectOptions::new(self.url(params));
        opts.max_connections(1).sqlx_logging(false);
        Database::connect(opts).await
    }

    fn backend(&self) -> Option<Backend> {
        Some(self.backend)
    }

    /// The pool was opened for this one operation, so close it.
    async fn release(&self, conn: DatabaseConnection) {
        if let Err(e) = conn.close().await {
            log::warn!("Failed to close {:?} connection: {e}", self.backend);
        }
    }
}

/// Connection handle tied to the factory that opened it.
///
/// Hand it back with [`release`](Self::release). A handle that is only
/// dropped skips the factory's release hook.
pub struct ScopedConnection<'a> {
    inner: DatabaseConnection,
    backend: Backend,
    factory: &'a dyn ConnectionFactory,
}

impl ScopedConnection<'_> {
    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub async fn release(self) {
        log::debug!("Releasing {:?} connection", self.backend);
        self.factory.release(self.inner).await;
    }
}

impl Deref for ScopedConnection<'_> {
    type Target = DatabaseConnection;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Open a connection with the configured parameters. Unreachable servers are
/// reported as [`Error::Connection`] and never retried.
pub async fn open_connection<'a>(
    factory: &'a dyn ConnectionFactory,
    config: &ConfigStore,
    target_database: bool,
) -> Result<ScopedConnection<'a>> {
    let params = ConnectParams::from_config(config, target_database)?;
    log::debug!("Opening connection: {:?}", params);

    let inner = factory
        .connect(&params)
        .await
        .map_err(|e| Error::Connection(e.to_string()))?;
    let backend = Backend::from(sea_orm::ConnectionTrait::get_database_backend(&inner));

    Ok(ScopedConnection {
        inner,
        backend,
        factory,
    })
}
