//! Ignore-list entry: an application whose notifications are suppressed.
//!
//! # Invariants
//! - Column names (`packageName`, `appName`, `description`) and the table
//!   name `ignoreitem` stay compatible with existing database files.
//! - Text fields default to the empty string, never `NULL`.

use crate::model::row::{RowEntity, RowId};
use crate::model::value::FieldValue;
use crate::schema::{EntityKind, FieldDescriptor, FieldType};

const COLUMN_ID: &str = "id";
const COLUMN_PACKAGE_NAME: &str = "packageName";
const COLUMN_APP_NAME: &str = "appName";
const COLUMN_DESCRIPTION: &str = "description";

/// One ignore-list row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IgnoreItem {
    row_id: RowId,
    pub package_name: String,
    pub app_name: String,
    pub description: String,
}

impl IgnoreItem {
    /// Creates a transient item.
    pub fn new(
        package_name: impl Into<String>,
        app_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            row_id: RowId::new(),
            package_name: package_name.into(),
            app_name: app_name.into(),
            description: description.into(),
        }
    }

    /// Creates an unloaded handle for an existing row; call `load` to fill it.
    pub fn with_id(id: i64) -> Self {
        Self {
            row_id: RowId::from_id(id),
            ..Self::default()
        }
    }

    /// Column name constants for match-column lookups.
    pub const PACKAGE_NAME: &'static str = COLUMN_PACKAGE_NAME;
    pub const APP_NAME: &'static str = COLUMN_APP_NAME;
    pub const DESCRIPTION: &'static str = COLUMN_DESCRIPTION;
}

impl RowEntity for IgnoreItem {
    const KIND: EntityKind = "ignore_item";
    const TABLE_NAME: &'static str = "ignoreitem";

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::primary_key(COLUMN_ID),
            FieldDescriptor::column(COLUMN_PACKAGE_NAME, FieldType::Text),
            FieldDescriptor::column(COLUMN_APP_NAME, FieldType::Text),
            FieldDescriptor::column(COLUMN_DESCRIPTION, FieldType::Text),
        ]
    }

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn field_value(&self, name: &str) -> Option<FieldValue> {
        match name {
            COLUMN_PACKAGE_NAME => Some(FieldValue::from(self.package_name.as_str())),
            COLUMN_APP_NAME => Some(FieldValue::from(self.app_name.as_str())),
            COLUMN_DESCRIPTION => Some(FieldValue::from(self.description.as_str())),
            _ => None,
        }
    }

    fn set_field_value(&mut self, name: &str, value: FieldValue) -> Result<(), String> {
        let target = match name {
            COLUMN_PACKAGE_NAME => &mut self.package_name,
            COLUMN_APP_NAME => &mut self.app_name,
            COLUMN_DESCRIPTION => &mut self.description,
            other => return Err(format!("ignore item has no field `{other}`")),
        };
        *target = value
            .into_text()
            .map_err(|err| format!("ignoreitem.{name}: {err}"))?;
        Ok(())
    }
}
