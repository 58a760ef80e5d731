//! Column and table descriptions.
//!
//! A [`TableSchema`] is validated when it is built: the primary key and the
//! foreign key's local column must name one of its columns. Cross-table
//! checks (the foreign key's target) happen when the table is accepted into a
//! [`SchemaCatalog`](crate::registry::SchemaCatalog).

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};

/// Storage family of a column, derived from its SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
}

impl ColumnKind {
    /// Classify a SQL type such as `INT`, `DECIMAL(13,2)` or `VARCHAR(45)`.
    pub fn of(sql_type: &str) -> Self {
        let base = sql_type
            .trim()
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();

        match base.as_str() {
            "INT" | "INTEGER" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "BIGINT" | "SERIAL"
            | "BIGSERIAL" => ColumnKind::Integer,
            "DECIMAL" | "NUMERIC" | "FLOAT" | "DOUBLE" | "REAL" => ColumnKind::Real,
            _ => ColumnKind::Text,
        }
    }
}

/// One relational column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    name: String,
    sql_type: String,
    allow_nulls: bool,
    auto_generate: bool,
    default: Option<String>,
}

impl ColumnDefinition {
    /// A nullable column of type `sql_type` with no default.
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            allow_nulls: true,
            auto_generate: false,
            default: None,
        }
    }

    /// A nullable `VARCHAR(45)` column.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, "VARCHAR(45)")
    }

    pub fn not_null(mut self) -> Self {
        self.allow_nulls = false;
        self
    }

    /// The store assigns the value (sequence / identity / rowid).
    pub fn auto_generate(mut self) -> Self {
        self.auto_generate = true;
        self
    }

    /// Literal emitted verbatim after `DEFAULT`.
    pub fn default_value(mut self, literal: impl Into<String>) -> Self {
        self.default = Some(literal.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> &str {
        &self.sql_type
    }

    pub fn allow_nulls(&self) -> bool {
        self.allow_nulls
    }

    pub fn is_auto_generated(&self) -> bool {
        self.auto_generate
    }

    pub fn default_literal(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn kind(&self) -> ColumnKind {
        ColumnKind::of(&self.sql_type)
    }

    /// True when an insert may leave this column out and let the store
    /// supply the value.
    pub fn can_self_generate(&self) -> bool {
        self.allow_nulls || self.auto_generate || self.default.is_some()
    }
}

/// `FOREIGN KEY (column) REFERENCES ref_table(ref_column)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

impl ForeignKey {
    pub fn new(
        column: impl Into<String>,
        ref_table: impl Into<String>,
        ref_column: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            ref_table: ref_table.into(),
            ref_column: ref_column.into(),
        }
    }

    /// Parse a reference expression of the form `table(column)`.
    pub fn parse(column: impl Into<String>, reference: &str) -> Result<Self> {
        let malformed = || Error::schema(format!("malformed foreign key reference `{reference}`"));

        let (table, rest) = reference.trim().split_once('(').ok_or_else(malformed)?;
        let ref_column = rest.strip_suffix(')').ok_or_else(malformed)?;
        let (table, ref_column) = (table.trim(), ref_column.trim());
        if table.is_empty() || ref_column.is_empty() {
            return Err(malformed());
        }

        Ok(Self::new(column, table, ref_column))
    }

    /// The `table(column)` reference expression.
    pub fn reference(&self) -> String {
        format!("{}({})", self.ref_table, self.ref_column)
    }
}

/// One relational table. Column order is the canonical order for generated
/// SQL and for fetched dataset layout.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    name: String,
    primary_key: String,
    foreign_key: Option<ForeignKey>,
    columns: Vec<ColumnDefinition>,
}

impl TableSchema {
    pub fn new(
        name: impl Into<String>,
        primary_key: impl Into<String>,
        columns: Vec<ColumnDefinition>,
    ) -> Result<Self> {
        let name = name.into();
        let primary_key = primary_key.into();

        if columns.is_empty() {
            return Err(Error::schema(format!("table `{name}` has no columns")));
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name()) {
                return Err(Error::schema(format!(
                    "column `{}` is declared twice in `{name}`",
                    column.name()
                )));
            }
        }

        if !seen.contains(primary_key.as_str()) {
            return Err(Error::schema(format!(
                "primary key `{primary_key}` is not a column of `{name}`"
            )));
        }

        Ok(Self {
            name,
            primary_key,
            foreign_key: None,
            columns,
        })
    }

    /// Attach a foreign key; its local column must belong to this table.
    pub fn with_foreign_key(mut self, foreign_key: ForeignKey) -> Result<Self> {
        if self.column(&foreign_key.column).is_none() {
            return Err(Error::schema(format!(
                "foreign key column `{}` is not a column of `{}`",
                foreign_key.column, self.name
            )));
        }
        self.foreign_key = Some(foreign_key);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn foreign_key(&self) -> Option<&ForeignKey> {
        self.foreign_key.as_ref()
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn columns_by_name(&self) -> HashMap<String, ColumnDefinition> {
        self.columns
            .iter()
            .map(|c| (c.name().to_string(), c.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_self_generate() {
        let nullable = ColumnDefinition::text("brand");
        let required = ColumnDefinition::text("name").not_null();
        let auto = ColumnDefinition::new("id", "INT").not_null().auto_generate();
        let defaulted = ColumnDefinition::new("stock", "INT").not_null().default_value("0");

        assert!(nullable.can_self_generate());
        assert!(!required.can_self_generate());
        assert!(auto.can_self_generate());
        assert!(defaulted.can_self_generate());
    }

    #[test]
    fn test_column_kind() {
        assert_eq!(ColumnKind::of("INT"), ColumnKind::Integer);
        assert_eq!(ColumnKind::of("bigint unsigned"), ColumnKind::Integer);
        assert_eq!(ColumnKind::of("DECIMAL(13,2)"), ColumnKind::Real);
        assert_eq!(ColumnKind::of("VARCHAR(45)"), ColumnKind::Text);
    }

    #[test]
    fn test_parse_foreign_key() {
        let fk = ForeignKey::parse("id_category", "categories(id_category)").unwrap();
        assert_eq!(fk.ref_table, "categories");
        assert_eq!(fk.ref_column, "id_category");
        assert_eq!(fk.reference(), "categories(id_category)");

        assert!(ForeignKey::parse("x", "categories").is_err());
        assert!(ForeignKey::parse("x", "categories(").is_err());
        assert!(ForeignKey::parse("x", "(id)").is_err());
    }

    #[test]
    fn test_unknown_primary_key_rejected() {
        let result = TableSchema::new("t", "missing", vec![ColumnDefinition::text("a")]);
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let result = TableSchema::new(
            "t",
            "a",
            vec![ColumnDefinition::text("a"), ColumnDefinition::text("a")],
        );
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_foreign_key_local_column_checked() {
        let table = TableSchema::new("t", "a", vec![ColumnDefinition::text("a")]).unwrap();
        let result = table.with_foreign_key(ForeignKey::new("b", "other", "id"));
        assert!(matches!(result, Err(Error::Schema(_))));
    }
}
