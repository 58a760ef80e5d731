//! Shared runtime state handed to every component.
//!
//! Replaces process-wide globals: one [`RuntimeContext`] owns the schema
//! catalog, the configuration, the dataset cache and the connection factory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{ConfigKey, ConfigStore};
use crate::connection::{ConnectionFactory, open_connection};
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::fetch::fetch_table;
use crate::provision::{ProvisionSummary, provision};
use crate::registry::SchemaCatalog;
use crate::schema::TableSchema;
use crate::store::DataStore;
use crate::sync::{SyncOutcome, synchronize_table};

/// Everything the components share: schema, configuration, dataset cache
/// and the connection factory.
///
/// Configuration and cache sit behind locks so a context can be shared via
/// `Arc` between threads. [`synchronize`](Self::synchronize) additionally
/// holds a per-table lock for its whole fetch-diff-apply window.
pub struct RuntimeContext {
    catalog: SchemaCatalog,
    config: RwLock<ConfigStore>,
    data: RwLock<DataStore>,
    connector: Arc<dyn ConnectionFactory>,
    table_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RuntimeContext {
    pub fn new(catalog: SchemaCatalog, connector: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            catalog,
            config: RwLock::new(ConfigStore::new()),
            data: RwLock::new(DataStore::new()),
            connector,
            table_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Seed the cache, optionally replace the catalog, apply `config` with
    /// [`ConfigStore::set_if_absent`], then provision.
    pub async fn init(
        &mut self,
        initial_data: impl IntoIterator<Item = (String, Dataset)>,
        tables: Option<SchemaCatalog>,
        config: impl IntoIterator<Item = (ConfigKey, String)>,
    ) -> Result<ProvisionSummary> {
        {
            let mut data = self.data_mut();
            for (key, value) in initial_data {
                data.set(key, value, true);
            }
        }

        if let Some(catalog) = tables {
            self.catalog = catalog;
        }

        {
            let mut store = self.config_mut();
            for (key, value) in config {
                store.set_if_absent(key, value);
            }
        }

        self.provision().await
    }

    /// The registered tables.
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn get_table(&self, name: &str) -> Option<&TableSchema> {
        self.catalog.get_table(name)
    }

    fn config(&self) -> RwLockReadGuard<'_, ConfigStore> {
        self.config.read().unwrap_or_else(|e| e.into_inner())
    }

    fn config_mut(&self) -> RwLockWriteGuard<'_, ConfigStore> {
        self.config.write().unwrap_or_else(|e| e.into_inner())
    }

    fn data(&self) -> RwLockReadGuard<'_, DataStore> {
        self.data.read().unwrap_or_else(|e| e.into_inner())
    }

    fn data_mut(&self) -> RwLockWriteGuard<'_, DataStore> {
        self.data.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the configuration, so no lock is held across an await.
    pub fn config_snapshot(&self) -> ConfigStore {
        self.config().clone()
    }

    /// Overwrite a configuration value.
    pub fn config_set(&self, key: ConfigKey, value: impl Into<String>) {
        self.config_mut().set(key, value);
    }

    /// Set a configuration value unless one is already present.
    pub fn config_set_if_absent(&self, key: ConfigKey, value: impl Into<String>) {
        self.config_mut().set_if_absent(key, value);
    }

    /// A configuration value; unset is [`Error::Configuration`].
    pub fn config_get(&self, key: ConfigKey) -> Result<String> {
        self.config().get(key).map(str::to_string)
    }

    /// True when `key` holds a non-empty value.
    pub fn is_config_set(&self, key: ConfigKey) -> bool {
        self.config().is_set(key)
    }

    /// Cache `value` under `key`, replacing an existing slot only when
    /// `overwrite` is true.
    pub fn data_set(&self, key: impl Into<String>, value: Dataset, overwrite: bool) {
        self.data_mut().set(key, value, overwrite);
    }

    /// A copy of the cached dataset, or [`Error::NotFound`].
    pub fn data_get(&self, key: &str) -> Result<Dataset> {
        self.data().get(key).cloned()
    }

    /// True when slot `key` holds a dataset.
    pub fn is_data_set(&self, key: &str) -> bool {
        self.data().is_set(key)
    }

    /// Create missing tables and foreign keys for the current catalog.
    pub async fn provision(&self) -> Result<ProvisionSummary> {
        let config = self.config_snapshot();
        provision(&self.catalog, &config, self.connector.as_ref()).await
    }

    /// Explicit name, else the configured `defaultTable`.
    fn resolve_table(&self, table: Option<&str>) -> Result<&TableSchema> {
        let name = match table.filter(|t| !t.is_empty()) {
            Some(name) => name.to_string(),
            None => self.config_get(ConfigKey::DefaultTable).map_err(|_| {
                Error::configuration("no table specified and `defaultTable` is not set")
            })?,
        };
        self.catalog.require_table(&name)
    }

    /// Read the persisted contents of `table` (or the default table).
    pub async fn fetch(&self, table: Option<&str>) -> Result<Dataset> {
        let schema = self.resolve_table(table)?;
        let conn = open_connection(self.connector.as_ref(), &self.config_snapshot(), true).await?;
        let result = fetch_table(&*conn, schema).await;
        conn.release().await;
        result
    }

    fn table_lock(&self, table: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.table_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(table.to_string()).or_default().clone()
    }

    /// Make `table` (or the default table) hold exactly the rows of
    /// `desired`, with the insert/delete set computed by value.
    pub async fn synchronize(&self, desired: &Dataset, table: Option<&str>) -> Result<SyncOutcome> {
        let schema = self.resolve_table(table)?;
        let lock = self.table_lock(schema.name());
        let _guard = lock.lock().await;

        let conn = open_connection(self.connector.as_ref(), &self.config_snapshot(), true).await?;
        let result = synchronize_table(&conn, schema, desired).await;
        conn.release().await;
        result
    }

    /// Fetch `table` and store the result in the cache slot `key`.
    pub async fn refresh(&self, key: &str, table: Option<&str>) -> Result<Dataset> {
        let dataset = self.fetch(table).await?;
        self.data_set(key, dataset.clone(), true);
        Ok(dataset)
    }
}
