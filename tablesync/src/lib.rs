//! # tablesync
//!
//! Keeps an in-memory tabular [`Dataset`] consistent with a relational table.
//!
//! A [`SchemaCatalog`] describes the tables. [`provision`](provision::provision)
//! creates them (all tables first, then foreign keys), [`fetch_table`] reads a
//! table back in registry column order, and [`synchronize_table`] diffs a
//! desired dataset against the persisted rows and applies the minimal set of
//! inserts and deletes in one transaction.
//!
//! [`RuntimeContext`] ties these together with the configuration, a dataset
//! cache and a [`ConnectionFactory`].
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tablesync::{Backend, ConfigKey, RuntimeContext, SchemaCatalog, SyncOutcome, UrlConnector};
//!
//! let mut ctx = RuntimeContext::new(
//!     SchemaCatalog::product_catalog()?,
//!     Arc::new(UrlConnector::new(Backend::MySql)),
//! );
//! ctx.init(
//!     [],
//!     None,
//!     [
//!         (ConfigKey::Host, "localhost".into()),
//!         (ConfigKey::User, "root".into()),
//!         (ConfigKey::Database, "practice".into()),
//!         (ConfigKey::DefaultTable, "products".into()),
//!     ],
//! )
//! .await?;
//!
//! let products = ctx.fetch(None).await?;
//! // ... edit rows ...
//! match ctx.synchronize(&products, None).await? {
//!     SyncOutcome::NoChanges => println!("nothing to save"),
//!     SyncOutcome::Applied { inserted, deleted } => println!("{inserted} in, {deleted} out"),
//! }
//! ```

pub mod config;
pub mod connection;
pub mod context;
pub mod dataset;
pub mod dialect;
pub mod error;
pub mod fetch;
pub mod products;
pub mod provision;
pub mod registry;
pub mod schema;
pub mod store;
pub mod sync;

pub use config::{ConfigKey, ConfigStore};
pub use connection::{ConnectParams, ConnectionFactory, ScopedConnection, UrlConnector, open_connection};
pub use context::RuntimeContext;
pub use dataset::{Dataset, Row, Value, row};
pub use dialect::Backend;
pub use error::{Error, Result};
pub use fetch::fetch_table;
pub use provision::{ProvisionSummary, provision};
pub use registry::SchemaCatalog;
pub use schema::{ColumnDefinition, ColumnKind, ForeignKey, TableSchema};
pub use store::DataStore;
pub use sync::{Diff, SyncOutcome, diff, synchronize_table};

// Re-export sea-orm for implementors of `ConnectionFactory`
pub use sea_orm;
