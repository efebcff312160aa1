//! SQL text derived from table descriptors.
//!
//! # Responsibility
//! - Generate DDL (`CREATE TABLE IF NOT EXISTS`, `DROP TABLE IF EXISTS`).
//! - Generate parameterized DML for inserts, updates, deletes and selects.
//!
//! # Invariants
//! - Values are always bound as parameters, never spliced into SQL text.
//! - Identifiers are double-quoted; descriptors restrict them to `[A-Za-z0-9_]`.
//! - Equality filters use `IS`, so a `NULL` value matches a `NULL` column.

use super::TableDescriptor;
use crate::model::value::FieldValue;

/// Conjunction of `column IS value` terms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EqualityFilter {
    terms: Vec<(String, FieldValue)>,
}

impl EqualityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter matching a single primary key value.
    pub fn by_id(column: &str, id: i64) -> Self {
        Self::new().and(column, FieldValue::Integer(id))
    }

    pub fn and(mut self, column: &str, value: FieldValue) -> Self {
        self.terms.push((column.to_string(), value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Renders the `WHERE` body with placeholders numbered from `first_index`.
    pub fn where_sql(&self, first_index: usize) -> String {
        self.terms
            .iter()
            .enumerate()
            .map(|(offset, (column, _))| {
                format!("{} IS ?{}", quote_ident(column), first_index + offset)
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Bound values in placeholder order.
    pub fn values(&self) -> impl Iterator<Item = &FieldValue> {
        self.terms.iter().map(|(_, value)| value)
    }

    pub fn into_values(self) -> Vec<FieldValue> {
        self.terms.into_iter().map(|(_, value)| value).collect()
    }
}

pub fn quote_ident(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// `CREATE TABLE IF NOT EXISTS` for every persisted column of `descriptor`.
pub fn create_table_sql(descriptor: &TableDescriptor) -> String {
    let columns = descriptor
        .columns()
        .map(|field| {
            if field.is_primary_key {
                format!(
                    "{} INTEGER PRIMARY KEY AUTOINCREMENT",
                    quote_ident(field.name)
                )
            } else {
                format!(
                    "{} {}",
                    quote_ident(field.name),
                    field.field_type.column_type()
                )
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({columns});",
        quote_ident(descriptor.table_name())
    )
}

pub fn drop_table_sql(table_name: &str) -> String {
    format!("DROP TABLE IF EXISTS {};", quote_ident(table_name))
}

/// Insert statement binding every value column in descriptor order.
///
/// The primary key is left to SQLite so it auto-increments.
pub fn insert_sql(descriptor: &TableDescriptor) -> String {
    let columns: Vec<String> = descriptor
        .value_columns()
        .map(|field| quote_ident(field.name))
        .collect();
    if columns.is_empty() {
        return format!(
            "INSERT INTO {} DEFAULT VALUES;",
            quote_ident(descriptor.table_name())
        );
    }

    let placeholders = (1..=columns.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({placeholders});",
        quote_ident(descriptor.table_name()),
        columns.join(", ")
    )
}

/// `UPDATE table SET c1 = ?1, ... WHERE <filter>`; filter placeholders follow the set list.
pub fn update_sql(table_name: &str, columns: &[&str], filter: &EqualityFilter) -> String {
    let assignments = columns
        .iter()
        .enumerate()
        .map(|(offset, column)| format!("{} = ?{}", quote_ident(column), offset + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!("UPDATE {} SET {assignments}", quote_ident(table_name));
    if !filter.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&filter.where_sql(columns.len() + 1));
    }
    sql.push(';');
    sql
}

pub fn delete_by_id_sql(descriptor: &TableDescriptor) -> String {
    format!(
        "DELETE FROM {} WHERE {} = ?1;",
        quote_ident(descriptor.table_name()),
        quote_ident(descriptor.primary_key().name)
    )
}

/// Select `projection` columns (all persisted columns when empty), ordered by key.
pub fn select_sql(
    descriptor: &TableDescriptor,
    projection: &[&str],
    filter: &EqualityFilter,
) -> String {
    let columns = if projection.is_empty() {
        descriptor
            .columns()
            .map(|field| quote_ident(field.name))
            .collect::<Vec<_>>()
    } else {
        projection.iter().map(|column| quote_ident(column)).collect()
    };

    let mut sql = format!(
        "SELECT {} FROM {}",
        columns.join(", "),
        quote_ident(descriptor.table_name())
    );
    if !filter.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&filter.where_sql(1));
    }
    sql.push_str(&format!(
        " ORDER BY {} ASC;",
        quote_ident(descriptor.primary_key().name)
    ));
    sql
}

#[cfg(test)]
mod tests {
    use super::{
        create_table_sql, delete_by_id_sql, insert_sql, select_sql, update_sql, EqualityFilter,
    };
    use crate::model::value::FieldValue;
    use crate::schema::{FieldDescriptor, FieldType, TableDescriptor};

    fn descriptor() -> TableDescriptor {
        TableDescriptor::new(
            "apps",
            "app",
            vec![
                FieldDescriptor::primary_key("id"),
                FieldDescriptor::column("name", FieldType::Text),
                FieldDescriptor::column("enabled", FieldType::Boolean),
                FieldDescriptor::column("launches", FieldType::Long),
                FieldDescriptor::column("score", FieldType::Real),
                FieldDescriptor::excluded("cached_label", FieldType::Text),
            ],
        )
        .unwrap()
    }

    #[test]
    fn create_table_maps_types_and_skips_excluded_fields() {
        assert_eq!(
            create_table_sql(&descriptor()),
            "CREATE TABLE IF NOT EXISTS \"apps\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"name\" TEXT, \"enabled\" INTEGER, \"launches\" INTEGER, \"score\" REAL);"
        );
    }

    #[test]
    fn insert_binds_value_columns_only() {
        assert_eq!(
            insert_sql(&descriptor()),
            "INSERT INTO \"apps\" (\"name\", \"enabled\", \"launches\", \"score\") \
             VALUES (?1, ?2, ?3, ?4);"
        );
    }

    #[test]
    fn key_only_table_inserts_default_values() {
        let key_only =
            TableDescriptor::new("seq", "seq", vec![FieldDescriptor::primary_key("id")]).unwrap();
        assert_eq!(insert_sql(&key_only), "INSERT INTO \"seq\" DEFAULT VALUES;");
    }

    #[test]
    fn update_numbers_filter_placeholders_after_assignments() {
        let filter = EqualityFilter::by_id("id", 7);
        assert_eq!(
            update_sql("apps", &["name", "score"], &filter),
            "UPDATE \"apps\" SET \"name\" = ?1, \"score\" = ?2 WHERE \"id\" IS ?3;"
        );
    }

    #[test]
    fn select_with_filter_and_projection() {
        let filter = EqualityFilter::new()
            .and("name", FieldValue::Text("Mail".to_string()))
            .and("enabled", FieldValue::Boolean(true));
        assert_eq!(
            select_sql(&descriptor(), &["id"], &filter),
            "SELECT \"id\" FROM \"apps\" WHERE \"name\" IS ?1 AND \"enabled\" IS ?2 ORDER BY \"id\" ASC;"
        );
        assert_eq!(filter.values().count(), 2);
    }

    #[test]
    fn delete_is_keyed_by_primary_key() {
        assert_eq!(
            delete_by_id_sql(&descriptor()),
            "DELETE FROM \"apps\" WHERE \"id\" = ?1;"
        );
    }
}
