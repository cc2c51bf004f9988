//! Introspection of the schema a resolver tree was built from.
//!
//! The schema summary is rendered once per tree and shared by every `__schema` and `__type`
//! selection; each selection projects the summary onto the sub-fields it selected.
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::context::ResolutionContext;
use crate::error::FieldError;
use crate::error::ResolveError;
use crate::native::Native;
use crate::query_tree::QueryNode;
use crate::resolve::Resolver;
use crate::schema::TypeDefinition;
use crate::schema::TypeLookup;
use crate::schema::TypeRef;

/// The introspection view of a schema, as `__Schema` and `__Type` JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaIntrospection {
    query_type: String,
    types: IndexMap<String, Value>,
}

impl SchemaIntrospection {
    pub fn new(lookup: &dyn TypeLookup) -> Self {
        Self {
            query_type: lookup.query_type().to_string(),
            types: lookup
                .definitions()
                .map(|definition| {
                    (definition.name().to_string(), render_type(lookup, definition))
                })
                .collect(),
        }
    }

    /// The `__schema` value.
    pub fn schema(&self) -> Value {
        json!({
            "queryType": { "name": self.query_type },
            "types": self.types.values().cloned().collect::<Vec<_>>(),
        })
    }

    /// The `__type(name:)` value, null for unknown types.
    pub fn type_named(&self, name: &str) -> Value {
        self.types.get(name).cloned().unwrap_or(Value::Null)
    }
}

fn render_type(lookup: &dyn TypeLookup, definition: &TypeDefinition) -> Value {
    let fields = match definition {
        TypeDefinition::Object(object) => Value::Array(
            object
                .fields
                .iter()
                .map(|field| {
                    json!({ "name": field.name, "type": render_type_ref(lookup, &field.ty) })
                })
                .collect(),
        ),
        _ => Value::Null,
    };
    let enum_values = match definition {
        TypeDefinition::Enum(definition) => Value::Array(
            definition
                .values
                .iter()
                .map(|value| json!({ "name": value }))
                .collect(),
        ),
        _ => Value::Null,
    };
    json!({
        "name": definition.name(),
        "kind": definition.kind(),
        "fields": fields,
        "enumValues": enum_values,
    })
}

fn render_type_ref(lookup: &dyn TypeLookup, ty: &TypeRef) -> Value {
    match ty {
        TypeRef::Named(name) => json!({
            "kind": lookup.lookup(name).map(TypeDefinition::kind),
            "name": name,
            "ofType": null,
        }),
        TypeRef::List(inner) => json!({
            "kind": "LIST",
            "name": null,
            "ofType": render_type_ref(lookup, inner),
        }),
        TypeRef::NonNull(inner) => json!({
            "kind": "NON_NULL",
            "name": null,
            "ofType": render_type_ref(lookup, inner),
        }),
    }
}

/// Keep only what `node` selected, under the selections' response keys.
fn project(value: &Value, node: &QueryNode) -> Value {
    let children = node.children();
    if children.is_empty() {
        return value.clone();
    }
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|item| project(item, node)).collect()),
        Value::Object(object) => {
            let mut projected = Map::new();
            for child in children {
                let selected = object.get(child.field_name()).unwrap_or(&Value::Null);
                projected.insert(child.response_key().to_string(), project(selected, &child));
            }
            Value::Object(projected)
        }
        other => other.clone(),
    }
}

/// Resolves `__schema` and `__type` selections. One instance is shared by a whole tree.
#[derive(Debug)]
pub(crate) struct IntrospectionResolver;

#[async_trait]
impl Resolver for IntrospectionResolver {
    async fn execute(&self, ctx: ResolutionContext, value: Native) {
        let schema = match value {
            Native::Introspection(schema) => schema,
            other => {
                return ctx.set_error(ResolveError::UnexpectedValue {
                    expected: "the schema introspection".to_string(),
                    found: other.kind().to_string(),
                });
            }
        };
        let node = ctx.node();
        let rendered = match node.field_name() {
            "__schema" => schema.schema(),
            "__type" => match node.arguments().get("name").and_then(Value::as_str) {
                Some(name) => schema.type_named(name),
                None => {
                    return ctx.set_error(ResolveError::Field(FieldError::new(
                        "__type requires a name argument",
                    )));
                }
            },
            other => {
                return ctx.set_error(ResolveError::Field(FieldError::new(format!(
                    "{other} is not an introspection field"
                ))));
            }
        };
        ctx.set_value(project(&rendered, node));
    }
}
