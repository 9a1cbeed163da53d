//! Entity shapes
//!
//! Declarative descriptions of the tables the application expects. The
//! reconciler compares these against `information_schema` and adds whatever
//! is missing.

use crate::{Error, Result};

/// One column of an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnShape {
    /// Column name
    pub name: String,
    /// SQL type, e.g. `VARCHAR(255)`
    pub sql_type: String,
    /// Whether NULL is allowed
    pub nullable: bool,
    /// Part of the primary key
    pub primary_key: bool,
    /// AUTO_INCREMENT
    pub auto_increment: bool,
    /// Default value, as a string literal
    pub default: Option<String>,
}

impl ColumnShape {
    /// Nullable column of the given type
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            primary_key: false,
            auto_increment: false,
            default: None,
        }
    }

    /// Disallow NULL
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Make part of the primary key (implies NOT NULL)
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Mark AUTO_INCREMENT
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Set a default value
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Secondary index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexShape {
    /// Index name
    pub name: String,
    /// Indexed columns, in order
    pub columns: Vec<String>,
    /// UNIQUE index
    pub unique: bool,
}

impl IndexShape {
    /// Non-unique index over `columns`
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    /// Make the index unique
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Table the application expects to exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityShape {
    /// Table name
    pub table: String,
    /// Columns, in declaration order
    pub columns: Vec<ColumnShape>,
    /// Secondary indexes
    pub indexes: Vec<IndexShape>,
}

impl EntityShape {
    /// Entity with no columns yet
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Add a column
    pub fn column(mut self, column: ColumnShape) -> Self {
        self.columns.push(column);
        self
    }

    /// Add an index
    pub fn index(mut self, index: IndexShape) -> Self {
        self.indexes.push(index);
        self
    }

    /// Primary key columns, in declaration order
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Check the shape is internally consistent
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::Migration(format!("{}: {}", self.table, msg)));

        if self.table.is_empty() {
            return Err(Error::Migration("entity has an empty table name".into()));
        }
        if self.columns.is_empty() {
            return invalid("no columns declared".into());
        }

        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if column.name.is_empty() || column.sql_type.is_empty() {
                return invalid("column with empty name or type".into());
            }
            if !seen.insert(column.name.to_ascii_lowercase()) {
                return invalid(format!("duplicate column '{}'", column.name));
            }
        }

        let mut index_names = std::collections::HashSet::new();
        for index in &self.indexes {
            if index.name.is_empty() || index.columns.is_empty() {
                return invalid("index with empty name or no columns".into());
            }
            if !index_names.insert(index.name.to_ascii_lowercase()) {
                return invalid(format!("duplicate index '{}'", index.name));
            }
            if let Some(missing) = index
                .columns
                .iter()
                .find(|c| !seen.contains(&c.to_ascii_lowercase()))
            {
                return invalid(format!(
                    "index '{}' references unknown column '{}'",
                    index.name, missing
                ));
            }
        }
        Ok(())
    }
}

/// The `users` entity
pub fn users() -> EntityShape {
    EntityShape::new("users")
        .column(
            ColumnShape::new("id", "BIGINT UNSIGNED")
                .primary_key()
                .auto_increment(),
        )
        .column(ColumnShape::new("created_at", "DATETIME(3)"))
        .column(ColumnShape::new("updated_at", "DATETIME(3)"))
        .column(ColumnShape::new("deleted_at", "DATETIME(3)"))
        .column(ColumnShape::new("name", "VARCHAR(255)").not_null())
        .column(ColumnShape::new("email", "VARCHAR(255)").not_null())
        .index(IndexShape::new("idx_users_email", ["email"]).unique())
        .index(IndexShape::new("idx_users_deleted_at", ["deleted_at"]))
}

/// Every entity the application reconciles at startup
pub fn entities() -> Vec<EntityShape> {
    vec![users()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_users_shape() {
        let users = users();
        assert_eq!(users.table, "users");
        assert_eq!(users.primary_key(), vec!["id"]);
        assert!(users.validate().is_ok());

        let email = users.columns.iter().find(|c| c.name == "email").unwrap();
        assert!(!email.nullable);
        let deleted = users.columns.iter().find(|c| c.name == "deleted_at").unwrap();
        assert!(deleted.nullable);

        let unique: Vec<_> = users.indexes.iter().filter(|i| i.unique).collect();
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].name, "idx_users_email");
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        let empty = EntityShape::new("t");
        assert!(matches!(empty.validate(), Err(Error::Migration(_))));

        let dup = EntityShape::new("t")
            .column(ColumnShape::new("a", "INT"))
            .column(ColumnShape::new("A", "INT"));
        assert!(dup.validate().unwrap_err().to_string().contains("duplicate column"));

        let bad_index = EntityShape::new("t")
            .column(ColumnShape::new("a", "INT"))
            .index(IndexShape::new("idx_b", ["b"]));
        assert!(bad_index
            .validate()
            .unwrap_err()
            .to_string()
            .contains("unknown column 'b'"));
    }

    #[test]
    fn test_entities_lists_users() {
        let names: Vec<_> = entities().into_iter().map(|e| e.table).collect();
        assert_eq!(names, vec!["users"]);
    }
}
