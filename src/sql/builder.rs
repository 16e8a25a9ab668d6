//! Builds DDL and parameterized INSERT, SELECT, UPDATE, DELETE for a physical table.
//! Identifiers come from validated descriptors only; values are always `?` parameters.

use crate::config::ColumnSpec;
use crate::sql::filter::Predicate;
use crate::sql::params::SqlValue;

/// Quote identifier for SQLite. Company table names contain `$` and may contain spaces.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: SqlValue) {
        self.params.push(v);
    }
}

/// One physical table: full `Company$Base` name and the descriptor's columns.
#[derive(Clone, Debug)]
pub struct PhysicalTable {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl PhysicalTable {
    pub fn new(name: String, columns: Vec<ColumnSpec>) -> Self {
        PhysicalTable { name, columns }
    }

    pub fn key_columns(&self) -> Vec<&ColumnSpec> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quoted(&c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn key_clause(&self, q: &mut QueryBuf, key: &[SqlValue]) -> String {
        self.key_columns()
            .iter()
            .zip(key)
            .map(|(c, v)| {
                q.push_param(v.clone());
                format!("{} = ?", quoted(&c.name))
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn order_clause(&self) -> String {
        let keys: Vec<String> = self.key_columns().iter().map(|c| quoted(&c.name)).collect();
        format!(" ORDER BY {}", keys.join(", "))
    }
}

/// Column definition. With `for_alter` the inline PRIMARY KEY is never emitted
/// (ALTER TABLE cannot add key columns) and the type default is injected when the
/// descriptor declares none.
pub fn column_definition(c: &ColumnSpec, for_alter: bool) -> String {
    let mut def = format!("{} {}", quoted(&c.name), c.sql_type);
    if !c.nullable {
        def.push_str(" NOT NULL");
    }
    match (&c.default, for_alter) {
        (Some(d), _) => {
            def.push_str(" DEFAULT ");
            def.push_str(d);
        }
        (None, true) => {
            if let Some(td) = c.type_default() {
                def.push_str(" DEFAULT ");
                def.push_str(td.literal());
            }
        }
        (None, false) => {}
    }
    if let Some(ch) = &c.check {
        def.push_str(&format!(" CHECK ({})", ch));
    }
    def
}

/// CREATE TABLE with a table-level (possibly composite) PRIMARY KEY.
pub fn create_table(table: &str, columns: &[ColumnSpec]) -> String {
    let mut defs: Vec<String> = columns.iter().map(|c| column_definition(c, false)).collect();
    let keys: Vec<String> = columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| quoted(&c.name))
        .collect();
    if !keys.is_empty() {
        defs.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }
    format!("CREATE TABLE {} (\n  {}\n)", quoted(table), defs.join(",\n  "))
}

pub fn add_column(table: &str, column: &ColumnSpec) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quoted(table),
        column_definition(column, true)
    )
}

/// Reset NULLs of one column to a literal default.
pub fn backfill_nulls(table: &str, column: &str, literal: &str) -> String {
    let col = quoted(column);
    format!(
        "UPDATE {} SET {} = {} WHERE {} IS NULL",
        quoted(table),
        col,
        literal,
        col
    )
}

/// SELECT by full primary key.
pub fn select_by_key(t: &PhysicalTable, key: &[SqlValue]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = t.key_clause(&mut q, key);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {}",
        t.column_list(),
        quoted(&t.name),
        where_clause
    );
    q
}

/// SELECT with an optional compiled filter predicate, ordered by primary key.
pub fn select_list(t: &PhysicalTable, predicate: Option<&Predicate>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = match predicate {
        Some(p) => {
            q.params.extend(p.params.iter().cloned());
            format!(" WHERE {}", p.sql)
        }
        None => String::new(),
    };
    q.sql = format!(
        "SELECT {} FROM {}{}{}",
        t.column_list(),
        quoted(&t.name),
        where_clause,
        t.order_clause()
    );
    q
}

pub fn count(t: &PhysicalTable, predicate: Option<&Predicate>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = match predicate {
        Some(p) => {
            q.params.extend(p.params.iter().cloned());
            format!(" WHERE {}", p.sql)
        }
        None => String::new(),
    };
    q.sql = format!("SELECT COUNT(*) FROM {}{}", quoted(&t.name), where_clause);
    q
}

/// INSERT every column; `values` follow the table's column order.
pub fn insert(t: &PhysicalTable, values: &[SqlValue]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let placeholders: Vec<&str> = t.columns.iter().map(|_| "?").collect();
    for v in values.iter().take(t.columns.len()) {
        q.push_param(v.clone());
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quoted(&t.name),
        t.column_list(),
        placeholders.join(", ")
    );
    q
}

/// UPDATE by primary key. Key columns are never part of the SET list; `values` follow the
/// table's column order and the entries for key columns are skipped.
/// Returns None when the table has no non-key column to set.
pub fn update(t: &PhysicalTable, values: &[SqlValue], key: &[SqlValue]) -> Option<QueryBuf> {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for (c, v) in t.columns.iter().zip(values) {
        if c.primary_key {
            continue;
        }
        q.push_param(v.clone());
        sets.push(format!("{} = ?", quoted(&c.name)));
    }
    if sets.is_empty() {
        return None;
    }
    let where_clause = t.key_clause(&mut q, key);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {}",
        quoted(&t.name),
        sets.join(", "),
        where_clause
    );
    Some(q)
}

/// UPDATE of the key columns themselves (rename).
pub fn update_key(t: &PhysicalTable, old_key: &[SqlValue], new_key: &[SqlValue]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let sets: Vec<String> = t
        .key_columns()
        .iter()
        .zip(new_key)
        .map(|(c, v)| {
            q.push_param(v.clone());
            format!("{} = ?", quoted(&c.name))
        })
        .collect();
    let where_clause = t.key_clause(&mut q, old_key);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {}",
        quoted(&t.name),
        sets.join(", "),
        where_clause
    );
    q
}

/// DELETE by primary key.
pub fn delete(t: &PhysicalTable, key: &[SqlValue]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = t.key_clause(&mut q, key);
    q.sql = format!("DELETE FROM {} WHERE {}", quoted(&t.name), where_clause);
    q
}
