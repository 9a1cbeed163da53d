//! DDL and catalog query generation

use super::models::{ColumnShape, EntityShape, IndexShape};

/// Quote an identifier with backticks
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

fn column_definition(column: &ColumnShape) -> String {
    let mut out = format!("{} {}", quote_ident(&column.name), column.sql_type);
    out.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
    if column.auto_increment {
        out.push_str(" AUTO_INCREMENT");
    }
    if let Some(ref default) = column.default {
        out.push_str(" DEFAULT ");
        out.push_str(&quote_literal(default));
    }
    out
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `CREATE TABLE` with every column, the primary key and all indexes
pub fn create_table(entity: &EntityShape) -> String {
    let mut parts: Vec<String> = entity.columns.iter().map(column_definition).collect();

    let pk = entity.primary_key();
    if !pk.is_empty() {
        let pk: Vec<String> = pk.into_iter().map(String::from).collect();
        parts.push(format!("PRIMARY KEY ({})", column_list(&pk)));
    }
    for index in &entity.indexes {
        parts.push(format!(
            "{}INDEX {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            quote_ident(&index.name),
            column_list(&index.columns)
        ));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(&entity.table),
        parts.join(", ")
    )
}

/// `ALTER TABLE ... ADD COLUMN`
pub fn add_column(table: &str, column: &ColumnShape) -> String {
    let mut stmt = format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote_ident(table),
        column_definition(column)
    );
    if column.primary_key {
        stmt.push_str(" PRIMARY KEY");
    }
    stmt
}

/// `CREATE [UNIQUE] INDEX`
pub fn create_index(table: &str, index: &IndexShape) -> String {
    format!(
        "CREATE {}INDEX {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        quote_ident(&index.name),
        quote_ident(table),
        column_list(&index.columns)
    )
}

/// Count of tables named `table` in the current database
pub fn table_exists(table: &str) -> String {
    format!(
        "SELECT COUNT(*) FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {}",
        quote_literal(table)
    )
}

/// Column names of `table` in the current database
pub fn existing_columns(table: &str) -> String {
    format!(
        "SELECT COLUMN_NAME FROM information_schema.COLUMNS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {}",
        quote_literal(table)
    )
}

/// Index names of `table` in the current database
pub fn existing_indexes(table: &str) -> String {
    format!(
        "SELECT DISTINCT INDEX_NAME FROM information_schema.STATISTICS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {}",
        quote_literal(table)
    )
}
