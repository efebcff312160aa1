//! Static table descriptors and the registry that owns them.
//!
//! # Responsibility
//! - Describe every persistable entity kind as an explicit `TableDescriptor`.
//! - Validate descriptors once at registration time.
//! - Resolve entity kinds to descriptors and table names for DDL and DML.
//!
//! # Invariants
//! - A registered descriptor has at least one field and exactly one primary key.
//! - The primary key field is integer-typed and never excluded.
//! - Entity kinds and table names are unique within one registry.
//!
//! # See also
//! - `schema::sql` for the statements derived from descriptors.

use crate::model::row::RowEntity;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sql;

/// Stable identifier of one entity kind, e.g. `"ignore_item"`.
pub type EntityKind = &'static str;

/// Semantic type of one persisted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Integer,
    Long,
    Boolean,
    Text,
    Real,
}

impl FieldType {
    /// SQLite column type used when materializing the field.
    pub fn column_type(self) -> &'static str {
        match self {
            Self::Integer | Self::Long | Self::Boolean => "INTEGER",
            Self::Text => "TEXT",
            Self::Real => "REAL",
        }
    }

    /// Whether the type may back an auto-incrementing primary key.
    pub fn is_integer(self) -> bool {
        matches!(self, Self::Integer | Self::Long)
    }
}

/// Description of one entity field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub field_type: FieldType,
    /// Excluded fields are never written to or read from storage.
    pub excluded: bool,
    pub is_primary_key: bool,
}

impl FieldDescriptor {
    /// Regular persisted column.
    pub const fn column(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            excluded: false,
            is_primary_key: false,
        }
    }

    /// Auto-incrementing integer primary key.
    pub const fn primary_key(name: &'static str) -> Self {
        Self {
            name,
            field_type: FieldType::Integer,
            excluded: false,
            is_primary_key: true,
        }
    }

    /// In-memory only field, skipped by every statement.
    pub const fn excluded(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            excluded: true,
            is_primary_key: false,
        }
    }
}

/// Validated mapping from an entity kind to its table layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    table_name: &'static str,
    entity_kind: EntityKind,
    fields: Vec<FieldDescriptor>,
    primary_key_index: usize,
}

impl TableDescriptor {
    /// Validates the field list and builds a descriptor.
    ///
    /// # Errors
    /// - `NoFields` when `fields` is empty.
    /// - `MissingPrimaryKey` / `MultiplePrimaryKeys` unless exactly one key exists.
    /// - `NonIntegerPrimaryKey` / `ExcludedPrimaryKey` for an unusable key field.
    /// - `InvalidIdentifier` / `DuplicateField` for bad or repeated names.
    pub fn new(
        table_name: &'static str,
        entity_kind: EntityKind,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Self, RegistrationError> {
        validate_identifier(table_name, table_name)?;
        if fields.is_empty() {
            return Err(RegistrationError::NoFields { table: table_name });
        }

        let mut seen = Vec::with_capacity(fields.len());
        for field in &fields {
            validate_identifier(table_name, field.name)?;
            if seen
                .iter()
                .any(|name: &&str| name.eq_ignore_ascii_case(field.name))
            {
                return Err(RegistrationError::DuplicateField {
                    table: table_name,
                    field: field.name,
                });
            }
            seen.push(field.name);
        }

        let keys: Vec<usize> = fields
            .iter()
            .enumerate()
            .filter(|(_, field)| field.is_primary_key)
            .map(|(index, _)| index)
            .collect();
        let primary_key_index = match keys.as_slice() {
            [] => return Err(RegistrationError::MissingPrimaryKey { table: table_name }),
            [index] => *index,
            _ => {
                return Err(RegistrationError::MultiplePrimaryKeys {
                    table: table_name,
                    count: keys.len(),
                })
            }
        };

        let key = &fields[primary_key_index];
        if !key.field_type.is_integer() {
            return Err(RegistrationError::NonIntegerPrimaryKey {
                table: table_name,
                field: key.name,
            });
        }
        if key.excluded {
            return Err(RegistrationError::ExcludedPrimaryKey {
                table: table_name,
                field: key.name,
            });
        }

        Ok(Self {
            table_name,
            entity_kind,
            fields,
            primary_key_index,
        })
    }

    pub fn table_name(&self) -> &'static str {
        self.table_name
    }

    pub fn entity_kind(&self) -> EntityKind {
        self.entity_kind
    }

    /// All declared fields in declaration order, excluded ones included.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn primary_key(&self) -> &FieldDescriptor {
        &self.fields[self.primary_key_index]
    }

    /// Persisted columns, primary key included.
    pub fn columns(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|field| !field.excluded)
    }

    /// Persisted columns that callers write, i.e. everything except the key.
    pub fn value_columns(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.columns().filter(|field| !field.is_primary_key)
    }

    /// Looks up a persisted column by name.
    pub fn column(&self, name: &str) -> Option<&FieldDescriptor> {
        self.columns().find(|field| field.name == name)
    }
}

/// Error raised for malformed entity descriptions. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    NoFields {
        table: &'static str,
    },
    MissingPrimaryKey {
        table: &'static str,
    },
    MultiplePrimaryKeys {
        table: &'static str,
        count: usize,
    },
    NonIntegerPrimaryKey {
        table: &'static str,
        field: &'static str,
    },
    ExcludedPrimaryKey {
        table: &'static str,
        field: &'static str,
    },
    DuplicateField {
        table: &'static str,
        field: &'static str,
    },
    InvalidIdentifier {
        table: &'static str,
        identifier: &'static str,
    },
    DuplicateKind(EntityKind),
    DuplicateTable(&'static str),
}

impl Display for RegistrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoFields { table } => write!(f, "table `{table}` declares no fields"),
            Self::MissingPrimaryKey { table } => {
                write!(f, "table `{table}` declares no primary key")
            }
            Self::MultiplePrimaryKeys { table, count } => write!(
                f,
                "table `{table}` declares {count} primary keys; exactly one is required"
            ),
            Self::NonIntegerPrimaryKey { table, field } => write!(
                f,
                "primary key `{field}` of table `{table}` must be an integer field"
            ),
            Self::ExcludedPrimaryKey { table, field } => write!(
                f,
                "primary key `{field}` of table `{table}` cannot be excluded from storage"
            ),
            Self::DuplicateField { table, field } => {
                write!(f, "table `{table}` declares field `{field}` twice")
            }
            Self::InvalidIdentifier { table, identifier } => write!(
                f,
                "invalid identifier `{identifier}` in table `{table}`"
            ),
            Self::DuplicateKind(kind) => write!(f, "entity kind `{kind}` is already registered"),
            Self::DuplicateTable(table) => write!(f, "table `{table}` is already registered"),
        }
    }
}

impl Error for RegistrationError {}

/// Registry of validated descriptors keyed by entity kind.
///
/// Built once during startup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    descriptors: Vec<TableDescriptor>,
    by_kind: HashMap<EntityKind, usize>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one descriptor.
    ///
    /// # Errors
    /// Rejects a kind or table name that is already present.
    pub fn register(&mut self, descriptor: TableDescriptor) -> Result<(), RegistrationError> {
        if self.by_kind.contains_key(descriptor.entity_kind()) {
            return Err(RegistrationError::DuplicateKind(descriptor.entity_kind()));
        }
        if self
            .descriptors
            .iter()
            .any(|existing| existing.table_name().eq_ignore_ascii_case(descriptor.table_name()))
        {
            return Err(RegistrationError::DuplicateTable(descriptor.table_name()));
        }

        self.by_kind
            .insert(descriptor.entity_kind(), self.descriptors.len());
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Builds a descriptor from raw parts and registers it.
    pub fn register_fields(
        &mut self,
        table_name: &'static str,
        entity_kind: EntityKind,
        fields: Vec<FieldDescriptor>,
    ) -> Result<(), RegistrationError> {
        self.register(TableDescriptor::new(table_name, entity_kind, fields)?)
    }

    /// Registers the static descriptor of `E`.
    pub fn register_entity<E: RowEntity>(&mut self) -> Result<(), RegistrationError> {
        self.register(E::descriptor()?)
    }

    pub fn describe(&self, kind: &str) -> Option<&TableDescriptor> {
        self.by_kind.get(kind).map(|index| &self.descriptors[*index])
    }

    pub fn table_name_for(&self, kind: &str) -> Option<&'static str> {
        self.describe(kind).map(TableDescriptor::table_name)
    }

    /// Looks a descriptor up by its table name.
    pub fn by_table(&self, table_name: &str) -> Option<&TableDescriptor> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.table_name() == table_name)
    }

    /// Registered descriptors in registration order.
    pub fn descriptors(&self) -> &[TableDescriptor] {
        &self.descriptors
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

fn validate_identifier(
    table: &'static str,
    identifier: &'static str,
) -> Result<(), RegistrationError> {
    let valid = !identifier.is_empty()
        && identifier
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        && !identifier.starts_with(|ch: char| ch.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(RegistrationError::InvalidIdentifier { table, identifier })
    }
}
