//! Field catalog: the fields of the target model, built once per run.

use std::collections::HashMap;

use super::{FieldType, ModelDef, Schema, DISPLAY_FIELD_POSITION};
use crate::error::SchemaError;

/// Foreign-key target of a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedModel {
    pub model: String,
    /// Field of `model` used to look related records up.
    pub lookup_field: String,
}

/// One field of the target model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub field_type: FieldType,
    pub related: Option<RelatedModel>,
}

impl CatalogEntry {
    pub fn is_foreign_key(&self) -> bool {
        self.related.is_some()
    }
}

/// Read-only field lookup for one model.
///
/// Foreign key `x` is also reachable as `x_id`; [`FieldCatalog::resolve`]
/// tells the two apart.
#[derive(Debug, Clone)]
pub struct FieldCatalog {
    model: String,
    entries: Vec<CatalogEntry>,
    index: HashMap<String, (usize, bool)>,
}

impl FieldCatalog {
    pub fn build(schema: &Schema, model: &ModelDef) -> Result<Self, SchemaError> {
        let mut entries = Vec::with_capacity(model.fields.len());
        let mut index = HashMap::new();

        for field in &model.fields {
            let related = match (&field.field_type, &field.related_model) {
                (FieldType::ForeignKey, Some(target)) => {
                    Some(related_model(schema, model, &field.name, target, field.lookup_field.as_deref())?)
                }
                (FieldType::ForeignKey, None) => {
                    return Err(SchemaError::MissingRelation {
                        model: model.name.clone(),
                        field: field.name.clone(),
                    })
                }
                _ => None,
            };

            let pos = entries.len();
            index.insert(field.name.clone(), (pos, false));
            if related.is_some() {
                index.insert(format!("{}_id", field.name), (pos, true));
            }
            entries.push(CatalogEntry {
                name: field.name.clone(),
                field_type: field.field_type,
                related,
            });
        }

        Ok(Self {
            model: model.name.clone(),
            entries,
            index,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.resolve(name).map(|(entry, _)| entry)
    }

    /// Entry for `name`, and whether `name` was the `_id` alias of a foreign key.
    pub fn resolve(&self, name: &str) -> Option<(&CatalogEntry, bool)> {
        self.index
            .get(name)
            .map(|&(pos, alias)| (&self.entries[pos], alias))
    }
}

fn related_model(
    schema: &Schema,
    model: &ModelDef,
    field: &str,
    target: &str,
    explicit_lookup: Option<&str>,
) -> Result<RelatedModel, SchemaError> {
    let no_lookup = || SchemaError::NoLookupField {
        model: model.name.clone(),
        field: field.to_string(),
        related: target.to_string(),
    };

    let related = schema.model(target).ok_or_else(no_lookup)?;
    let lookup_field = match explicit_lookup {
        Some(name) => name.to_string(),
        None => related
            .fields
            .get(DISPLAY_FIELD_POSITION)
            .map(|f| f.name.clone())
            .ok_or_else(no_lookup)?,
    };

    Ok(RelatedModel {
        model: related.name.clone(),
        lookup_field,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDef;

    fn schema() -> Schema {
        Schema::new(vec![
            ModelDef::new(
                "Organisation",
                vec![
                    FieldDef::new("id", FieldType::Integer),
                    FieldDef::new("name", FieldType::Text),
                    FieldDef::new("code", FieldType::Text),
                ],
            ),
            ModelDef::new(
                "Item",
                vec![
                    FieldDef::new("id", FieldType::Integer),
                    FieldDef::new("name", FieldType::Text),
                    FieldDef::foreign_key("org", "Organisation"),
                    FieldDef::foreign_key("owner", "Organisation").with_lookup_field("code"),
                ],
            ),
        ])
    }

    #[test]
    fn test_second_field_is_lookup_field() {
        let schema = schema();
        let catalog = FieldCatalog::build(&schema, schema.model("Item").unwrap()).unwrap();

        let org = catalog.get("org").unwrap();
        assert_eq!(
            org.related,
            Some(RelatedModel {
                model: "Organisation".into(),
                lookup_field: "name".into(),
            })
        );
    }

    #[test]
    fn test_explicit_lookup_field_wins() {
        let schema = schema();
        let catalog = FieldCatalog::build(&schema, schema.model("Item").unwrap()).unwrap();

        let owner = catalog.get("owner").unwrap();
        assert_eq!(owner.related.as_ref().unwrap().lookup_field, "code");
    }

    #[test]
    fn test_id_alias() {
        let schema = schema();
        let catalog = FieldCatalog::build(&schema, schema.model("Item").unwrap()).unwrap();

        let (entry, alias) = catalog.resolve("org_id").unwrap();
        assert_eq!(entry.name, "org");
        assert!(alias);

        let (entry, alias) = catalog.resolve("org").unwrap();
        assert_eq!(entry.name, "org");
        assert!(!alias);

        assert!(catalog.resolve("name_id").is_none());
    }

    #[test]
    fn test_related_model_must_exist() {
        let schema = Schema::new(vec![ModelDef::new(
            "Item",
            vec![FieldDef::foreign_key("org", "Missing")],
        )]);
        let err = FieldCatalog::build(&schema, &schema.models[0]).unwrap_err();
        assert!(matches!(err, SchemaError::NoLookupField { .. }));
    }
}
