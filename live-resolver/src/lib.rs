//! Resolves GraphQL queries whose selections change while they are being resolved.
//!
//! A [`ResolverTree`] is built once from a schema ([`TypeLookup`]) and the field functions of
//! native objects ([`FieldLocator`]). An [`Executor`] then runs it over a live [`QueryTree`]:
//! fields selected later are resolved as they arrive, deselected fields are retracted from the
//! [`ResultTree`], and cancelling the [`Execution`] stops everything.

#![warn(unreachable_pub)]

mod configuration;
mod context;
pub mod error;
mod execution;
mod introspection;
mod native;
mod query_tree;
mod registry;
mod resolve;
mod result;
mod schema;

pub use configuration::Configuration;
pub use configuration::ExecutionConfig;
pub use configuration::ExecutionMode;
pub use context::CompletionGuard;
pub use context::ResolutionContext;
pub use context::Teardown;
pub use execution::Execution;
pub use execution::Executor;
pub use introspection::SchemaIntrospection;
pub use native::IntoNative;
pub use native::Native;
pub use native::NativeObject;
pub use native::NativeType;
pub use query_tree::NodeId;
pub use query_tree::Operation;
pub use query_tree::QueryNode;
pub use query_tree::QueryTree;
pub use query_tree::Subscription;
pub use registry::FieldArgs;
pub use registry::FieldFunction;
pub use registry::FieldLocator;
pub use registry::FieldOutput;
pub use registry::ObjectFields;
pub use registry::Registry;
pub use resolve::Resolver;
pub use resolve::ResolverId;
pub use resolve::ResolverTree;
pub use resolve::TypeResolverPair;
pub use result::FieldResultError;
pub use result::Path;
pub use result::PathElement;
pub use result::Response;
pub use result::ResultTree;
pub use schema::EnumDefinition;
pub use schema::FieldDefinition;
pub use schema::ObjectDefinition;
pub use schema::Schema;
pub use schema::TypeDefinition;
pub use schema::TypeLookup;
pub use schema::TypeRef;
