//! The schema graph describing how entity documents are shaped.
//!
//! The graph is built once at startup, usually from a JSON file, and is then shared
//! read only by every query compilation.
use std::{fs::File, io::BufReader, path::Path};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::sql::{QueryBuilderError, MAX_DEPTH};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaGraph(IndexMap<String, SchemaMeta>);

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaMeta {
    /// Backing table. Schemas only ever nested inside other documents have none.
    pub table: Option<String>,
    #[serde(default)]
    pub fields: IndexMap<String, FieldMeta>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fieldType", rename_all = "camelCase")]
pub enum FieldMeta {
    String,
    Number,
    Boolean,
    DateTime,
    /// A nested object conforming to one of the candidate schemas.
    Complex {
        schemas: Vec<String>,
        discriminator: Option<Discriminator>,
    },
    Collection {
        items: Box<FieldMeta>,
    },
    /// A reference to a document in another table, joined on `property`.
    Relationship {
        schema: String,
        property: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discriminator {
    pub property: String,
    /// Schema name to stored discriminator value, where the two differ.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub schema_mapping: IndexMap<String, String>,
}

impl Discriminator {
    pub fn value_for<'a>(&'a self, schema: &'a str) -> &'a str {
        self.schema_mapping
            .get(schema)
            .map(String::as_str)
            .unwrap_or(schema)
    }
}

impl FieldMeta {
    /// The synthetic wrapper used for the root document of a query.
    pub fn root(schema: &str) -> Self {
        FieldMeta::Complex {
            schemas: vec![schema.to_owned()],
            discriminator: None,
        }
    }
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            FieldMeta::String | FieldMeta::Number | FieldMeta::Boolean | FieldMeta::DateTime
        )
    }
}

impl SchemaGraph {
    pub fn new(schemas: IndexMap<String, SchemaMeta>) -> Self {
        Self(schemas)
    }
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
    pub fn schema(&self, name: &str) -> Result<&SchemaMeta, QueryBuilderError> {
        self.0
            .get(name)
            .ok_or_else(|| QueryBuilderError::UnknownSchema(name.to_owned()))
    }
    /// Backing table of a schema that can be queried at the root.
    pub fn table(&self, name: &str) -> Result<&str, QueryBuilderError> {
        self.schema(name)?
            .table
            .as_deref()
            .filter(|table| !table.is_empty())
            .ok_or_else(|| QueryBuilderError::TableMissing(name.to_owned()))
    }
    pub fn schema_names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Walks `path` from `field` and returns every field meta reachable at its end.
    ///
    /// More than one meta is only returned when the path crosses a complex field whose
    /// candidate schemas define the final segment differently.
    pub fn field_meta_from_query_path<'a>(
        &'a self,
        field: &'a FieldMeta,
        path: &[String],
    ) -> Result<Vec<&'a FieldMeta>, QueryBuilderError> {
        if path.len() > MAX_DEPTH {
            return Err(QueryBuilderError::MaxDepthExceeded(MAX_DEPTH));
        }
        if path.is_empty() {
            return Ok(vec![field]);
        }
        match field {
            FieldMeta::Collection { items } => self.field_meta_from_query_path(items, path),
            FieldMeta::Relationship { schema, .. } => {
                self.field_meta_in_schemas(std::slice::from_ref(schema), path)
            }
            FieldMeta::Complex { schemas, .. } => self.field_meta_in_schemas(schemas, path),
            _ => Err(QueryBuilderError::PrimitiveSubPath(path.join("/"))),
        }
    }

    fn field_meta_in_schemas<'a>(
        &'a self,
        schemas: &[String],
        path: &[String],
    ) -> Result<Vec<&'a FieldMeta>, QueryBuilderError> {
        let (segment, rest) = match path.split_first() {
            Some(split) => split,
            None => return Err(QueryBuilderError::Internal("empty path".to_owned())),
        };

        let mut found: Vec<&FieldMeta> = vec![];
        let mut first_error = None;
        for name in schemas {
            let Some(field) = self.schema(name)?.fields.get(segment) else {
                continue;
            };
            match self.field_meta_from_query_path(field, rest) {
                Ok(metas) => {
                    for meta in metas {
                        if !found.contains(&meta) {
                            found.push(meta);
                        }
                    }
                }
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        if found.is_empty() {
            return Err(first_error.unwrap_or_else(|| QueryBuilderError::UnknownField {
                field: segment.to_owned(),
                schemas: schemas.to_vec(),
            }));
        }
        Ok(found)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn car_graph() -> SchemaGraph {
        serde_json::from_str(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/car_schema.json"
        )))
        .expect("car fixture schema should deserialize")
    }

    fn path(p: &str) -> Vec<String> {
        p.split('/').map(str::to_owned).collect()
    }

    #[test]
    fn resolves_through_complex_and_relationship() {
        let graph = car_graph();
        let root = FieldMeta::root("Car");

        let metas = graph
            .field_meta_from_query_path(&root, &path("Engine/Options/Supercharger"))
            .unwrap();
        assert_eq!(metas, vec![&FieldMeta::Boolean]);

        let metas = graph
            .field_meta_from_query_path(&root, &path("Manufacturer/Address/City"))
            .unwrap();
        assert_eq!(metas, vec![&FieldMeta::String]);
    }

    #[test]
    fn collection_resolves_to_itself_or_its_items() {
        let graph = car_graph();
        let root = FieldMeta::root("Car");

        let metas = graph
            .field_meta_from_query_path(&root, &path("OtherStereos"))
            .unwrap();
        assert!(matches!(metas[..], [FieldMeta::Collection { .. }]));

        let metas = graph
            .field_meta_from_query_path(&root, &path("OtherStereos/Brand"))
            .unwrap();
        assert_eq!(metas, vec![&FieldMeta::String]);
    }

    #[test]
    fn polymorphic_fields_collect_every_candidate() {
        let graph = car_graph();
        let root = FieldMeta::root("Car");

        // only the cd player defines NumberOfDisks
        let metas = graph
            .field_meta_from_query_path(&root, &path("MainStereo/NumberOfDisks"))
            .unwrap();
        assert_eq!(metas, vec![&FieldMeta::Number]);

        // both candidates define Brand the same way
        let metas = graph
            .field_meta_from_query_path(&root, &path("MainStereo/Brand"))
            .unwrap();
        assert_eq!(metas, vec![&FieldMeta::String]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let graph = car_graph();
        let root = FieldMeta::root("Car");
        let first = graph
            .field_meta_from_query_path(&root, &path("Engine/Options/SubOptions/Name"))
            .unwrap();
        for _ in 0..10 {
            let again = graph
                .field_meta_from_query_path(&root, &path("Engine/Options/SubOptions/Name"))
                .unwrap();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn rejects_unknown_fields_and_primitive_subpaths() {
        let graph = car_graph();
        let root = FieldMeta::root("Car");

        let err = graph
            .field_meta_from_query_path(&root, &path("Engine/Wheels"))
            .unwrap_err();
        assert!(matches!(err, QueryBuilderError::UnknownField { field, .. } if field == "Wheels"));

        let err = graph
            .field_meta_from_query_path(&root, &path("ModelName/Length"))
            .unwrap_err();
        assert!(matches!(err, QueryBuilderError::PrimitiveSubPath(_)));
    }

    #[test]
    fn only_tabled_schemas_are_queryable() {
        let graph = car_graph();
        assert_eq!(graph.table("Car").unwrap(), "car_rows");
        assert!(matches!(
            graph.table("Engine"),
            Err(QueryBuilderError::TableMissing(_))
        ));
        assert!(matches!(
            graph.table("Boat"),
            Err(QueryBuilderError::UnknownSchema(_))
        ));
    }

    #[test]
    fn discriminator_mapping_defaults_to_schema_name() {
        let discriminator = Discriminator {
            property: "ObjectType".to_owned(),
            schema_mapping: IndexMap::from([("Radio".to_owned(), "FM".to_owned())]),
        };
        assert_eq!(discriminator.value_for("Radio"), "FM");
        assert_eq!(discriminator.value_for("CDPlayer"), "CDPlayer");
    }
}
