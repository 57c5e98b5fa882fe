//! Target schema and field catalog.
//!
//! A [`Schema`] describes the models records can be imported into. It is
//! usually loaded from JSON:
//!
//! ```json
//! {
//!   "models": [
//!     { "name": "Category", "fields": [
//!         { "name": "id", "type": "AutoField" },
//!         { "name": "label", "type": "CharField" } ] },
//!     { "name": "Item", "app_label": "shop", "fields": [
//!         { "name": "id", "type": "AutoField" },
//!         { "name": "title", "type": "text" },
//!         { "name": "category", "type": "ForeignKey", "related_model": "Category" } ] }
//!   ]
//! }
//! ```
//!
//! A [`FieldCatalog`] is the per-run, read-only view of one model's fields.

pub mod catalog;

use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

use crate::error::SchemaError;

pub use catalog::{CatalogEntry, FieldCatalog, RelatedModel};

/// Position of the related model field used as lookup field for a foreign key
/// when the field definition names none: the second declared field, the first
/// being the primary key.
pub const DISPLAY_FIELD_POSITION: usize = 1;

/// Semantic type of a field, as far as coercion is concerned.
///
/// Accepts both the short snake_case names and the usual ORM class names
/// (`IntegerField`, `BooleanField`, ...). Any other name is plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Integer,
    /// Integer constrained to be non-negative.
    PositiveInteger,
    Float,
    Boolean,
    Date,
    DateTime,
    ForeignKey,
    Text,
}

impl FieldType {
    /// Type for a declared type name, falling back to [`FieldType::Text`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "integer" | "IntegerField" | "BigIntegerField" | "SmallIntegerField"
            | "AutoField" | "BigAutoField" => FieldType::Integer,
            "positive_integer" | "PositiveIntegerField" | "PositiveSmallIntegerField"
            | "PositiveBigIntegerField" => FieldType::PositiveInteger,
            "float" | "FloatField" | "DecimalField" => FieldType::Float,
            "boolean" | "BooleanField" | "NullBooleanField" => FieldType::Boolean,
            "date" | "DateField" => FieldType::Date,
            "date_time" | "DateTimeField" => FieldType::DateTime,
            "foreign_key" | "ForeignKey" => FieldType::ForeignKey,
            _ => FieldType::Text,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, FieldType::Integer | FieldType::PositiveInteger)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self == FieldType::Float
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(FieldType::from_name(&name))
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Target model of a foreign key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_model: Option<String>,
    /// Field of the related model used to look records up.
    /// Defaults to the related model's field at [`DISPLAY_FIELD_POSITION`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_field: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            related_model: None,
            lookup_field: None,
        }
    }

    pub fn foreign_key(name: impl Into<String>, related_model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::ForeignKey,
            related_model: Some(related_model.into()),
            lookup_field: None,
        }
    }

    pub fn with_lookup_field(mut self, field: impl Into<String>) -> Self {
        self.lookup_field = Some(field.into());
        self
    }
}

/// A model: a name and its fields in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_label: Option<String>,
    pub fields: Vec<FieldDef>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            app_label: None,
            fields,
        }
    }

    /// `app_label.Name` when an app label is set, else the bare name.
    pub fn qualified_name(&self) -> String {
        match &self.app_label {
            Some(app) => format!("{}.{}", app, self.name),
            None => self.name.clone(),
        }
    }
}

/// All importable models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub models: Vec<ModelDef>,
}

impl Schema {
    pub fn new(models: Vec<ModelDef>) -> Self {
        Self { models }
    }

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let schema: Schema = serde_json::from_str(json)?;
        schema.check()?;
        Ok(schema)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Find a model by `app_label.Name`, exact name, or case-insensitive name.
    pub fn model(&self, name: &str) -> Option<&ModelDef> {
        if let Some((app, model)) = name.split_once('.') {
            return self.models.iter().find(|m| {
                m.name.eq_ignore_ascii_case(model)
                    && m.app_label.as_deref().map_or(true, |a| a == app)
            });
        }
        self.models
            .iter()
            .find(|m| m.name == name)
            .or_else(|| self.models.iter().find(|m| m.name.eq_ignore_ascii_case(name)))
    }

    /// Foreign keys must name their related model.
    fn check(&self) -> Result<(), SchemaError> {
        for model in &self.models {
            for field in &model.fields {
                if field.field_type == FieldType::ForeignKey && field.related_model.is_none() {
                    return Err(SchemaError::MissingRelation {
                        model: model.name.clone(),
                        field: field.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP: &str = r#"{
        "models": [
            { "name": "Category", "fields": [
                { "name": "id", "type": "AutoField" },
                { "name": "label", "type": "CharField" } ] },
            { "name": "Item", "app_label": "shop", "fields": [
                { "name": "id", "type": "AutoField" },
                { "name": "title", "type": "text" },
                { "name": "stock", "type": "PositiveIntegerField" },
                { "name": "category", "type": "ForeignKey", "related_model": "Category" } ] }
        ]
    }"#;

    #[test]
    fn test_load_with_orm_type_names() {
        let schema = Schema::from_json(SHOP).unwrap();
        let item = schema.model("Item").unwrap();

        assert_eq!(item.fields[0].field_type, FieldType::Integer);
        assert_eq!(item.fields[2].field_type, FieldType::PositiveInteger);
        assert_eq!(item.fields[3].field_type, FieldType::ForeignKey);
        assert_eq!(item.qualified_name(), "shop.Item");
    }

    #[test]
    fn test_model_lookup_forms() {
        let schema = Schema::from_json(SHOP).unwrap();

        assert!(schema.model("shop.Item").is_some());
        assert!(schema.model("shop.item").is_some());
        assert!(schema.model("category").is_some());
        assert!(schema.model("other.Item").is_none());
        assert!(schema.model("Nope").is_none());
    }

    #[test]
    fn test_foreign_key_needs_related_model() {
        let json = r#"{ "models": [ { "name": "Item", "fields": [
            { "name": "category", "type": "ForeignKey" } ] } ] }"#;

        let err = Schema::from_json(json).unwrap_err();
        assert!(matches!(err, SchemaError::MissingRelation { .. }));
    }

    #[test]
    fn test_unknown_type_reads_as_text() {
        let json = r#"{ "models": [ { "name": "Item", "fields": [
            { "name": "opens", "type": "TimeField" },
            { "name": "token", "type": "UUIDField" },
            { "name": "owner", "type": "OneToOneField" } ] } ] }"#;
        let schema = Schema::from_json(json).unwrap();
        let item = schema.model("Item").unwrap();

        assert!(item.fields.iter().all(|f| f.field_type == FieldType::Text));
    }

    #[test]
    fn test_type_names_round_trip_through_json() {
        let def = FieldDef::new("stock", FieldType::PositiveInteger);
        let json = serde_json::to_string(&def).unwrap();
        assert!(json.contains("\"positive_integer\""));

        let back: FieldDef = serde_json::from_str(&json).unwrap();
        assert_eq!(back.field_type, FieldType::PositiveInteger);
    }
}
