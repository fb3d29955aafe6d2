//! Small table descriptions consumed by one generic DDL routine.
//!
//! Backends and plugins describe their tables as [`TableSchema`] values instead of
//! hand-writing `CREATE TABLE` strings, so column sets stay in one place.

use rusqlite::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Blob,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Blob => "BLOB",
        }
    }
}

/// One column: name, type, primary-key membership and nullability.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub primary_key: bool,
    pub not_null: bool,
}

impl Column {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            primary_key: false,
            not_null: false,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub const fn blob(name: &'static str) -> Self {
        Self::new(name, ColumnType::Blob)
    }

    /// Marks the column as part of the primary key (implies NOT NULL).
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

/// Secondary index over one or more columns.
#[derive(Debug, Clone, Copy)]
pub struct Index {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub indexes: &'static [Index],
}

impl TableSchema {
    /// `CREATE TABLE IF NOT EXISTS` for this table. Primary key columns become a
    /// table-level constraint so composite keys need no special casing.
    pub fn create_table_sql(&self) -> String {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut def = format!("{} {}", c.name, c.ty.sql());
                if c.not_null {
                    def.push_str(" NOT NULL");
                }
                def
            })
            .collect();
        let pk: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name)
            .collect();
        if !pk.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", pk.join(", ")));
        }
        format!("CREATE TABLE IF NOT EXISTS {} ({})", self.name, parts.join(", "))
    }

    pub fn create_index_sql(&self) -> Vec<String> {
        self.indexes
            .iter()
            .map(|ix| {
                format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {}({})",
                    ix.name,
                    self.name,
                    ix.columns.join(", ")
                )
            })
            .collect()
    }

    /// Creates the table and its indexes if missing. Idempotent.
    pub fn create(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(&self.create_table_sql(), [])?;
        for sql in self.create_index_sql() {
            conn.execute(&sql, [])?;
        }
        Ok(())
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.name)
    }
}
