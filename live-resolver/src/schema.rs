//! GraphQL type definitions consumed by the resolver builder.
use std::fmt;
use std::str::FromStr;

use apollo_compiler::ast;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::validation::Valid;
use indexmap::IndexMap;

use crate::error::SchemaError;

/// A reference to a GraphQL type, possibly wrapped in list and non-null markers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn list(inner: TypeRef) -> Self {
        TypeRef::List(Box::new(inner))
    }

    pub fn non_null(inner: TypeRef) -> Self {
        TypeRef::NonNull(Box::new(inner))
    }

    /// Whether the type is a list once a non-null marker is stripped.
    pub fn is_list(&self) -> bool {
        match self {
            TypeRef::NonNull(inner) => matches!(**inner, TypeRef::List(_)),
            TypeRef::List(_) => true,
            TypeRef::Named(_) => false,
        }
    }

    /// The innermost named type.
    pub fn inner_name(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.inner_name(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{name}"),
            TypeRef::List(ty) => write!(f, "[{ty}]"),
            TypeRef::NonNull(ty) => write!(f, "{ty}!"),
        }
    }
}

impl From<&ast::Type> for TypeRef {
    fn from(ty: &ast::Type) -> Self {
        match ty {
            ast::Type::Named(name) => TypeRef::named(name.as_str()),
            ast::Type::NonNullNamed(name) => TypeRef::non_null(TypeRef::named(name.as_str())),
            ast::Type::List(inner) => TypeRef::list(TypeRef::from(inner.as_ref())),
            ast::Type::NonNullList(inner) => {
                TypeRef::non_null(TypeRef::list(TypeRef::from(inner.as_ref())))
            }
        }
    }
}

/// A field of an object definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    pub ty: TypeRef,
}

/// An object type definition, fields in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

/// An enum type definition, values in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumDefinition {
    pub name: String,
    pub values: Vec<String>,
}

/// A type definition, by kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeDefinition {
    Object(ObjectDefinition),
    Enum(EnumDefinition),
    Scalar(String),
    /// Interfaces, unions and input objects: known, but not resolvable.
    Other { name: String, kind: &'static str },
}

impl TypeDefinition {
    pub fn name(&self) -> &str {
        match self {
            TypeDefinition::Object(object) => &object.name,
            TypeDefinition::Enum(definition) => &definition.name,
            TypeDefinition::Scalar(name) | TypeDefinition::Other { name, .. } => name,
        }
    }

    /// The introspection `__TypeKind` of the definition.
    pub fn kind(&self) -> &'static str {
        match self {
            TypeDefinition::Object(_) => "OBJECT",
            TypeDefinition::Enum(_) => "ENUM",
            TypeDefinition::Scalar(_) => "SCALAR",
            TypeDefinition::Other { kind, .. } => kind,
        }
    }
}

/// The source of type definitions for the resolver builder.
pub trait TypeLookup: Send + Sync {
    /// Look a type definition up by name.
    fn lookup(&self, name: &str) -> Option<&TypeDefinition>;

    /// The name of the query root type.
    fn query_type(&self) -> &str;

    /// Every definition, in declaration order.
    fn definitions(&self) -> Box<dyn Iterator<Item = &TypeDefinition> + '_>;
}

/// A GraphQL schema parsed and validated from SDL.
#[derive(Debug)]
pub struct Schema {
    definitions: IndexMap<String, TypeDefinition>,
    query_type: String,
    compiler_schema: Valid<apollo_compiler::Schema>,
}

impl FromStr for Schema {
    type Err = SchemaError;

    fn from_str(sdl: &str) -> Result<Self, Self::Err> {
        let compiler_schema = apollo_compiler::Schema::parse_and_validate(sdl, "schema.graphql")
            .map_err(|invalid| SchemaError::Invalid(invalid.errors))?;

        let query_type = compiler_schema
            .schema_definition
            .query
            .as_ref()
            .map(|name| name.name.to_string())
            .ok_or(SchemaError::MissingQueryType)?;

        let definitions = compiler_schema
            .types
            .iter()
            .map(|(name, ty)| (name.to_string(), definition(name.as_str(), ty)))
            .collect();

        Ok(Self {
            definitions,
            query_type,
            compiler_schema,
        })
    }
}

fn definition(name: &str, ty: &ExtendedType) -> TypeDefinition {
    match ty {
        ExtendedType::Object(object) => TypeDefinition::Object(ObjectDefinition {
            name: name.to_string(),
            fields: object
                .fields
                .iter()
                .map(|(field_name, field)| FieldDefinition {
                    name: field_name.to_string(),
                    ty: TypeRef::from(&field.ty),
                })
                .collect(),
        }),
        ExtendedType::Enum(definition) => TypeDefinition::Enum(EnumDefinition {
            name: name.to_string(),
            values: definition
                .values
                .keys()
                .map(|value| value.to_string())
                .collect(),
        }),
        ExtendedType::Scalar(_) => TypeDefinition::Scalar(name.to_string()),
        ExtendedType::Interface(_) => TypeDefinition::Other {
            name: name.to_string(),
            kind: "INTERFACE",
        },
        ExtendedType::Union(_) => TypeDefinition::Other {
            name: name.to_string(),
            kind: "UNION",
        },
        ExtendedType::InputObject(_) => TypeDefinition::Other {
            name: name.to_string(),
            kind: "INPUT_OBJECT",
        },
    }
}

impl Schema {
    pub fn read(path: impl AsRef<std::path::Path>) -> Result<Self, SchemaError> {
        std::fs::read_to_string(path)?.parse()
    }

    pub(crate) fn compiler_schema(&self) -> &Valid<apollo_compiler::Schema> {
        &self.compiler_schema
    }
}

impl TypeLookup for Schema {
    fn lookup(&self, name: &str) -> Option<&TypeDefinition> {
        self.definitions.get(name)
    }

    fn query_type(&self) -> &str {
        &self.query_type
    }

    fn definitions(&self) -> Box<dyn Iterator<Item = &TypeDefinition> + '_> {
        Box::new(self.definitions.values())
    }
}
