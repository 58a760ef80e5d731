use sea_orm::DatabaseBackend;

/// SQL dialect differences the generated statements care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    MySql,
    Postgres,
    Sqlite,
}

impl Backend {
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("postgres") {
            Some(Backend::Postgres)
        } else if url.starts_with("mysql") {
            Some(Backend::MySql)
        } else if url.starts_with("sqlite") {
            Some(Backend::Sqlite)
        } else {
            None
        }
    }

    pub fn database_backend(&self) -> DatabaseBackend {
        match self {
            Backend::MySql => DatabaseBackend::MySql,
            Backend::Postgres => DatabaseBackend::Postgres,
            Backend::Sqlite => DatabaseBackend::Sqlite,
        }
    }

    /// Quote an identifier, doubling embedded quote characters.
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Backend::MySql => format!("`{}`", ident.replace('`', "``")),
            Backend::Postgres | Backend::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Bind placeholder for the 1-based parameter `n`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Backend::Postgres => format!("${n}"),
            Backend::MySql | Backend::Sqlite => "?".to_string(),
        }
    }

    /// Keyword appended to an auto-generated column. SQLite has none: an
    /// `INTEGER` primary key is already a rowid alias.
    pub fn auto_generate_keyword(&self) -> Option<&'static str> {
        match self {
            Backend::MySql => Some("AUTO_INCREMENT"),
            Backend::Postgres => Some("GENERATED BY DEFAULT AS IDENTITY"),
            Backend::Sqlite => None,
        }
    }

    /// Whether foreign keys can be added after `CREATE TABLE`.
    pub fn supports_alter_foreign_key(&self) -> bool {
        !matches!(self, Backend::Sqlite)
    }
}

impl From<DatabaseBackend> for Backend {
    fn from(backend: DatabaseBackend) -> Self {
        match backend {
            DatabaseBackend::MySql => Backend::MySql,
            DatabaseBackend::Postgres => Backend::Postgres,
            _ => Backend::Sqlite,
        }
    }
}
