//! Resolver errors.
use apollo_compiler::validation::DiagnosticList;
use displaydoc::Display;
use thiserror::Error;

use crate::native::NativeType;
use crate::schema::TypeRef;

/// Error raised while building the resolver graph.
///
/// Construction errors are fatal to the resolver subtree being built and are returned to the
/// caller of [`crate::ResolverTree::build_resolver`]; nothing is memoized for the failed subtree.
#[derive(Error, Display, Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum BuildError {
    /// no field function '{field}' registered for native type {native}
    MissingFieldFunction {
        /// The native type the function was looked up on.
        native: NativeType,
        /// The field without a function.
        field: String,
    },

    /// enum {enum_name} can be represented by an integer or a string, not {native}
    UnsupportedEnumRepresentation {
        /// The GraphQL enum.
        enum_name: String,
        /// The offending native type.
        native: NativeType,
    },

    /// unknown type '{0}'
    UnknownType(String),

    /// type '{name}' is a {kind}, which cannot be resolved
    UnsupportedTypeKind {
        /// The GraphQL type.
        name: String,
        /// The kind of definition found.
        kind: &'static str,
    },

    /// scalar {scalar} cannot be rendered from native type {native}
    ScalarMismatch {
        /// The GraphQL scalar.
        scalar: String,
        /// The offending native type.
        native: NativeType,
    },

    /// list type {gql_type} requires a list native type, found {native}
    NotAList {
        /// The GraphQL list type.
        gql_type: TypeRef,
        /// The offending native type.
        native: NativeType,
    },

    /// field '{field}' of {object}: {source}
    Field {
        /// The object type owning the field.
        object: String,
        /// The field being built.
        field: String,
        /// The nested failure.
        source: Box<BuildError>,
    },
}

/// Error written on a field's context while resolving it.
///
/// These never escape the field: siblings and ancestors keep resolving.
#[derive(Error, Display, Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum ResolveError {
    /// enum value {value} is not one of the declared values of {enum_name}
    UnknownEnumValue {
        /// The enum being resolved.
        enum_name: String,
        /// The raw value.
        value: String,
    },

    /// enum ordinal {ordinal} is out of range for {enum_name} ({count} declared values)
    EnumOrdinalOutOfRange {
        /// The enum being resolved.
        enum_name: String,
        /// The raw ordinal.
        ordinal: String,
        /// How many values the enum declares.
        count: usize,
    },

    /// cannot render a non-finite float
    NonFiniteFloat,

    /// unexpected native value: expected {expected}, found {found}
    UnexpectedValue {
        /// What the resolver was built for.
        expected: String,
        /// What it received.
        found: String,
    },

    /// {0}
    Field(#[from] FieldError),
}

/// {message}
#[derive(Error, Display, Debug, Clone, Eq, PartialEq)]
pub struct FieldError {
    /// The message surfaced in the field's error entry.
    pub message: String,
}

impl FieldError {
    /// Create a field error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error loading a schema.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum SchemaError {
    /// could not read schema: {0}
    IO(#[from] std::io::Error),
    /// schema is invalid: {0}
    Invalid(DiagnosticList),
    /// schema has no query root type
    MissingQueryType,
}

/// Error applying a query document to a live query tree.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum QueryError {
    /// query is invalid: {0}
    Invalid(DiagnosticList),
    /// no operation {0} in the document
    Operation(String),
    /// {0} selections are not supported on live queries
    UnsupportedSelection(&'static str),
    /// variable '{0}' is not defined
    UnknownVariable(String),
    /// invalid argument value: {0}
    InvalidArgument(String),
    /// a field is already selected under the response key '{0}'
    DuplicateResponseKey(String),
    /// query node {0} has been deleted
    NodeDeleted(u32),
}

/// Error loading the configuration.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// could not read configuration: {0}
    IO(#[from] std::io::Error),
    /// could not deserialize configuration: {0}
    Deserialize(#[from] serde_yaml::Error),
}
