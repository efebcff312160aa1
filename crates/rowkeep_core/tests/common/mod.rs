#![allow(dead_code)]

use rowkeep_core::{
    EntityKind, FieldDescriptor, FieldType, FieldValue, IgnoreItem, RowEntity, RowId,
    SchemaRegistry, Store, StoreConfig,
};

/// Entity covering every field type plus one excluded field.
#[derive(Debug, Default)]
pub struct Mail {
    row_id: RowId,
    pub subject: String,
    pub size: i64,
    pub read: bool,
    pub score: f64,
    /// Never persisted.
    pub scratch: String,
}

impl Mail {
    pub fn new(subject: &str, size: i64) -> Self {
        Self {
            subject: subject.to_string(),
            size,
            ..Self::default()
        }
    }

    pub fn with_id(id: i64) -> Self {
        Self {
            row_id: RowId::from_id(id),
            ..Self::default()
        }
    }
}

impl RowEntity for Mail {
    const KIND: EntityKind = "mail";
    const TABLE_NAME: &'static str = "mail";

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::primary_key("id"),
            FieldDescriptor::column("subject", FieldType::Text),
            FieldDescriptor::column("size", FieldType::Long),
            FieldDescriptor::column("read", FieldType::Boolean),
            FieldDescriptor::column("score", FieldType::Real),
            FieldDescriptor::excluded("scratch", FieldType::Text),
        ]
    }

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn field_value(&self, name: &str) -> Option<FieldValue> {
        match name {
            "subject" => Some(self.subject.as_str().into()),
            "size" => Some(self.size.into()),
            "read" => Some(self.read.into()),
            "score" => Some(self.score.into()),
            _ => None,
        }
    }

    fn set_field_value(&mut self, name: &str, value: FieldValue) -> Result<(), String> {
        match name {
            "subject" => self.subject = value.into_text()?,
            "size" => self.size = value.as_i64().ok_or("mail.size is not an integer")?,
            "read" => self.read = value.as_bool().ok_or("mail.read is not a boolean")?,
            "score" => self.score = value.as_f64().ok_or("mail.score is not a number")?,
            other => return Err(format!("mail has no field `{other}`")),
        }
        Ok(())
    }
}

/// Second kind, so batches can span several tables.
#[derive(Debug, Default)]
pub struct Contact {
    row_id: RowId,
    pub name: String,
}

impl Contact {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl RowEntity for Contact {
    const KIND: EntityKind = "contact";
    const TABLE_NAME: &'static str = "contact";

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::primary_key("id"),
            FieldDescriptor::column("name", FieldType::Text),
        ]
    }

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn field_value(&self, name: &str) -> Option<FieldValue> {
        (name == "name").then(|| self.name.as_str().into())
    }

    fn set_field_value(&mut self, name: &str, value: FieldValue) -> Result<(), String> {
        if name != "name" {
            return Err(format!("contact has no field `{name}`"));
        }
        self.name = value.into_text()?;
        Ok(())
    }
}

pub fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.register_entity::<IgnoreItem>().unwrap();
    registry.register_entity::<Mail>().unwrap();
    registry.register_entity::<Contact>().unwrap();
    registry
}

/// In-memory store without a timer; tests flush by hand.
pub fn open_store() -> Store {
    Store::open(StoreConfig::in_memory().manual_flush(), registry()).unwrap()
}

pub fn count_rows(store: &Store, table: &str) -> i64 {
    let conn = store.engine().read_handle().unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))
        .unwrap()
}
