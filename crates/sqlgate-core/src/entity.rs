//! Entity and property descriptors.
//!
//! Descriptors are supplied by the model-definition layer and are read-only
//! to the adapter. Every entity carries an implicit `id` surrogate key that is
//! always the first column of its table.

use crate::error::{Error, Result};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name of the implicit surrogate key column.
pub const ID_COLUMN: &str = "id";

/// Logical property type as declared by the model layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    /// Short string, stored as `VARCHAR`
    String,
    /// Long text, stored as `TEXT`
    Text,
    /// Integer number, stored as `INT`
    Number,
    /// Flag, stored as `TINYINT(1)`
    Boolean,
    /// Point in time, stored as `DATETIME` (UTC)
    Date,
}

/// Default value of a property, rendered into the column's `DEFAULT` clause.
#[derive(Clone)]
pub enum DefaultValue {
    /// A fixed value
    Value(Value),
    /// A callback evaluated each time DDL is generated
    Producer(Arc<dyn Fn() -> Value + Send + Sync>),
    /// The current UTC time at DDL generation
    Now,
}

impl DefaultValue {
    /// Wrap a producer closure.
    pub fn producer<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        DefaultValue::Producer(Arc::new(f))
    }

    /// Resolve to a concrete value.
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::Producer(f) => f(),
            DefaultValue::Now => Value::from(chrono::Utc::now()),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            DefaultValue::Producer(_) => f.write_str("Producer(..)"),
            DefaultValue::Now => f.write_str("Now"),
        }
    }
}

/// One typed, named field of an entity.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    /// Column name
    pub name: String,
    /// Declared logical type
    pub logical_type: LogicalType,
    /// Width for `VARCHAR`/`INT`
    pub limit: Option<u32>,
    /// Default value, if any
    pub default: Option<DefaultValue>,
    /// Whether the column accepts NULL
    pub nullable: bool,
    /// Whether the model asked for an index (not emitted as DDL)
    pub indexed: bool,
}

impl PropertyDescriptor {
    /// Create a nullable property with no limit or default.
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            limit: None,
            default: None,
            nullable: true,
            indexed: false,
        }
    }

    /// Set the column width.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set a fixed default value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    /// Set a default producer or `DefaultValue::Now`.
    pub fn default_with(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark the column `NOT NULL`.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark the column as indexed.
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }
}

/// A named record shape mapped 1:1 to a table.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    name: String,
    table_name: String,
    properties: Vec<PropertyDescriptor>,
    key: PropertyDescriptor,
}

impl EntityDescriptor {
    /// Create an entity whose table name equals its model name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table_name: name.clone(),
            name,
            properties: Vec::new(),
            key: PropertyDescriptor::new(ID_COLUMN, LogicalType::Number).not_null(),
        }
    }

    /// Override the table name.
    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Append a property. A property named `id` replaces the implicit key descriptor.
    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        if property.name == ID_COLUMN {
            self.key = property;
        } else if let Some(existing) = self.properties.iter_mut().find(|p| p.name == property.name)
        {
            *existing = property;
        } else {
            self.properties.push(property);
        }
        self
    }

    /// Model name used to address the entity.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Declared properties in declaration order, excluding `id`.
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Look up a property by column name; `id` resolves to the key descriptor.
    pub fn get_property(&self, name: &str) -> Option<&PropertyDescriptor> {
        if name == ID_COLUMN {
            Some(&self.key)
        } else {
            self.properties.iter().find(|p| p.name == name)
        }
    }

    /// True when the column is declared (or is `id`).
    pub fn has_column(&self, name: &str) -> bool {
        self.get_property(name).is_some()
    }
}

/// Registry of defined entities keyed by model name.
#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    entities: HashMap<String, Arc<EntityDescriptor>>,
    order: Vec<String>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity, replacing any previous definition with the same name.
    pub fn define(&mut self, entity: EntityDescriptor) -> Arc<EntityDescriptor> {
        let name = entity.name().to_string();
        let entity = Arc::new(entity);
        if self.entities.insert(name.clone(), Arc::clone(&entity)).is_none() {
            self.order.push(name);
        }
        entity
    }

    /// Resolve a model name.
    #[allow(clippy::result_large_err)]
    pub fn get(&self, name: &str) -> Result<Arc<EntityDescriptor>> {
        self.entities
            .get(name)
            .cloned()
            .ok_or_else(|| Error::unknown_model(name))
    }

    /// All entities in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityDescriptor>> {
        self.order.iter().filter_map(|name| self.entities.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaErrorKind;

    fn post() -> EntityDescriptor {
        EntityDescriptor::new("Post")
            .property(PropertyDescriptor::new("title", LogicalType::String).limit(150))
            .property(PropertyDescriptor::new("body", LogicalType::Text))
    }

    #[test]
    fn test_id_resolves_to_implicit_key() {
        let entity = post();
        let key = entity.get_property("id").unwrap();
        assert_eq!(key.logical_type, LogicalType::Number);
        assert!(!key.nullable);
        assert_eq!(entity.properties().len(), 2);
    }

    #[test]
    fn test_redeclared_property_keeps_position() {
        let entity = post().property(PropertyDescriptor::new("title", LogicalType::Text));
        let names: Vec<_> = entity.properties().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["title", "body"]);
        assert_eq!(
            entity.get_property("title").unwrap().logical_type,
            LogicalType::Text
        );
    }

    #[test]
    fn test_registry_lookup_and_order() {
        let mut registry = ModelRegistry::new();
        registry.define(EntityDescriptor::new("User"));
        registry.define(post());
        registry.define(EntityDescriptor::new("User").table("users"));

        let names: Vec<_> = registry.iter().map(|e| e.name().to_string()).collect();
        assert_eq!(names, vec!["User", "Post"]);
        assert_eq!(registry.get("User").unwrap().table_name(), "users");

        match registry.get("Ghost") {
            Err(Error::Schema(e)) => assert_eq!(e.kind, SchemaErrorKind::UnknownModel),
            other => panic!("expected unknown model, got {other:?}"),
        }
    }

    #[test]
    fn test_default_producer_is_called_each_time() {
        use std::sync::atomic::{AtomicI64, Ordering};
        let counter = Arc::new(AtomicI64::new(0));
        let c = Arc::clone(&counter);
        let default = DefaultValue::producer(move || Value::BigInt(c.fetch_add(1, Ordering::SeqCst)));

        assert_eq!(default.resolve(), Value::BigInt(0));
        assert_eq!(default.resolve(), Value::BigInt(1));
    }
}
