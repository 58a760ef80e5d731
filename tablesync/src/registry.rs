//! Catalog of the tables known to the system.
//!
//! The [`SchemaCatalog`] is built once, validated as a whole, and read-only
//! afterwards. Replacing the schema means building a new catalog.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::schema::{ColumnDefinition, ForeignKey, TableSchema};

/// Validated, ordered set of [`TableSchema`]s, unique by name.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    tables: Vec<TableSchema>,
}

impl SchemaCatalog {
    /// An empty catalog.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a catalog, rejecting duplicate table names and foreign keys that
    /// point at a table or column outside the catalog.
    pub fn new(tables: Vec<TableSchema>) -> Result<Self> {
        let mut by_name: HashMap<&str, &TableSchema> = HashMap::new();
        for table in &tables {
            if by_name.insert(table.name(), table).is_some() {
                return Err(Error::schema(format!(
                    "table `{}` is registered twice",
                    table.name()
                )));
            }
        }

        for table in &tables {
            let Some(fk) = table.foreign_key() else {
                continue;
            };
            let target = by_name.get(fk.ref_table.as_str()).ok_or_else(|| {
                Error::schema(format!(
                    "foreign key of `{}` references unknown table `{}`",
                    table.name(),
                    fk.ref_table
                ))
            })?;
            if target.column(&fk.ref_column).is_none() {
                return Err(Error::schema(format!(
                    "foreign key of `{}` references unknown column `{}`",
                    table.name(),
                    fk.reference()
                )));
            }
        }

        Ok(Self { tables })
    }

    /// The registry of the product catalog application: `products` with a
    /// foreign key into `categories`.
    pub fn product_catalog() -> Result<Self> {
        let products = TableSchema::new(
            "products",
            "id_product",
            vec![
                ColumnDefinition::new("id_product", "INT")
                    .not_null()
                    .auto_generate(),
                ColumnDefinition::new("id_category", "INT").not_null(),
                ColumnDefinition::text("name").not_null(),
                ColumnDefinition::text("brand"),
                ColumnDefinition::new("stock_available", "INT")
                    .not_null()
                    .default_value("0"),
                ColumnDefinition::new("selling_price", "DECIMAL(13,2)")
                    .not_null()
                    .default_value("0.00"),
            ],
        )?
        .with_foreign_key(ForeignKey::new("id_category", "categories", "id_category"))?;

        let categories = TableSchema::new(
            "categories",
            "id_category",
            vec![
                ColumnDefinition::new("id_category", "INT")
                    .not_null()
                    .auto_generate(),
                ColumnDefinition::text("title").not_null(),
            ],
        )?;

        Self::new(vec![products, categories])
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Tables in registration order.
    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    pub fn get_table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name() == name)
    }

    /// Like [`get_table`](Self::get_table) but unknown tables are a
    /// [`Error::Schema`].
    pub fn require_table(&self, name: &str) -> Result<&TableSchema> {
        self.get_table(name)
            .ok_or_else(|| Error::schema(format!("`{name}` is not a known table")))
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.get_table(name).is_some()
    }

    /// Column names of `name` in canonical order.
    pub fn column_names(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.require_table(name)?.column_names())
    }

    pub fn columns_by_name(&self, name: &str) -> Result<HashMap<String, ColumnDefinition>> {
        Ok(self.require_table(name)?.columns_by_name())
    }
}
