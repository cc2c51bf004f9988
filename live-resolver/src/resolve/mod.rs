//! Resolver construction.
//!
//! A [`ResolverTree`] turns (GraphQL type, native type) pairings into executable resolvers. It is
//! built once, single threaded, and then shared read-only by every execution.
//!
//! Resolvers live in an arena and refer to each other by [`ResolverId`]. Object resolvers reserve
//! their slot and memoize their pairing before building their fields, so self-referential and
//! mutually referential types terminate: the recursive field receives the reserved id.
mod enum_value;
mod function;
mod list;
mod object;
mod primitive;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ResolutionContext;
use crate::error::BuildError;
use crate::introspection::IntrospectionResolver;
use crate::introspection::SchemaIntrospection;
use crate::native::Native;
use crate::native::NativeType;
use crate::registry::FieldLocator;
use crate::schema::ObjectDefinition;
use crate::schema::TypeDefinition;
use crate::schema::TypeLookup;
use crate::schema::TypeRef;

pub(crate) use self::enum_value::EnumResolver;
pub(crate) use self::function::FunctionResolver;
pub(crate) use self::list::ListResolver;
pub(crate) use self::object::ObjectResolver;
pub(crate) use self::primitive::PrimitiveResolver;

/// Turns a native value into a result or an error on a resolution context.
///
/// Resolvers hold no per-call state and may run concurrently on independent contexts.
#[async_trait]
pub trait Resolver: Send + Sync + fmt::Debug {
    async fn execute(&self, ctx: ResolutionContext, value: Native);
}

/// Handle of a resolver in its tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResolverId(usize);

/// The identity of a resolver: at most one resolver exists per pairing in a tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeResolverPair {
    pub gql_type: TypeRef,
    pub native_type: NativeType,
}

impl TypeResolverPair {
    pub fn new(gql_type: TypeRef, native_type: NativeType) -> Self {
        Self {
            gql_type,
            native_type,
        }
    }
}

/// The memoizing resolver builder, and the resolver graph it produced.
pub struct ResolverTree {
    resolvers: Vec<Option<Arc<dyn Resolver>>>,
    pairs: HashMap<TypeResolverPair, ResolverId>,
    lookup: Arc<dyn TypeLookup>,
    locator: Arc<dyn FieldLocator>,
    introspection: ResolverId,
    introspection_value: Native,
}

impl fmt::Debug for ResolverTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverTree")
            .field("resolvers", &self.resolvers.len())
            .field("pairs", &self.pairs.len())
            .finish()
    }
}

impl ResolverTree {
    pub fn new(lookup: Arc<dyn TypeLookup>, locator: Arc<dyn FieldLocator>) -> Self {
        let introspection = Arc::new(SchemaIntrospection::new(lookup.as_ref()));
        let introspection_resolver: Arc<dyn Resolver> = Arc::new(IntrospectionResolver);
        Self {
            resolvers: vec![Some(introspection_resolver)],
            pairs: HashMap::new(),
            lookup,
            locator,
            introspection: ResolverId(0),
            introspection_value: Native::Introspection(introspection),
        }
    }

    pub fn get(&self, id: ResolverId) -> Option<Arc<dyn Resolver>> {
        self.resolvers.get(id.0)?.clone()
    }

    /// The number of resolvers built so far, the shared introspection resolver included.
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Build the resolver of the query root type over `native`.
    pub fn build_root(&mut self, native: NativeType) -> Result<ResolverId, BuildError> {
        let query_type = TypeRef::named(self.lookup.query_type());
        self.build_resolver(TypeResolverPair::new(query_type, native))
    }

    /// Build, or return the already built, resolver of a pairing.
    pub fn build_resolver(&mut self, pair: TypeResolverPair) -> Result<ResolverId, BuildError> {
        if let Some(id) = self.pairs.get(&pair) {
            return Ok(*id);
        }
        tracing::debug!(gql_type = %pair.gql_type, native = %pair.native_type, "building resolver");

        let id = match &pair.gql_type {
            TypeRef::NonNull(inner) => self.build_resolver(TypeResolverPair::new(
                inner.as_ref().clone(),
                pair.native_type.clone(),
            ))?,
            TypeRef::List(inner) => {
                let NativeType::List(element) = &pair.native_type else {
                    return Err(BuildError::NotAList {
                        gql_type: pair.gql_type.clone(),
                        native: pair.native_type.clone(),
                    });
                };
                let element = self.build_resolver(TypeResolverPair::new(
                    inner.as_ref().clone(),
                    element.as_ref().clone(),
                ))?;
                self.push(ListResolver::new(element))
            }
            TypeRef::Named(name) => {
                let lookup = self.lookup.clone();
                match lookup.lookup(name) {
                    Some(TypeDefinition::Object(definition)) => {
                        return self.build_object(pair.clone(), definition);
                    }
                    Some(TypeDefinition::Enum(definition)) => {
                        let resolver = EnumResolver::build(self, &pair.native_type, definition)?;
                        self.push(resolver)
                    }
                    Some(TypeDefinition::Scalar(scalar)) => {
                        self.push(PrimitiveResolver::build(scalar, &pair.native_type)?)
                    }
                    Some(TypeDefinition::Other { name, kind }) => {
                        return Err(BuildError::UnsupportedTypeKind {
                            name: name.clone(),
                            kind: *kind,
                        });
                    }
                    None => return Err(BuildError::UnknownType(name.clone())),
                }
            }
        };
        self.pairs.insert(pair, id);
        Ok(id)
    }

    fn build_object(
        &mut self,
        pair: TypeResolverPair,
        definition: &ObjectDefinition,
    ) -> Result<ResolverId, BuildError> {
        // Reserve the slot and memoize the pairing first: fields typed with this same pairing
        // get this id instead of recursing.
        let id = ResolverId(self.resolvers.len());
        self.resolvers.push(None);
        self.pairs.insert(pair.clone(), id);

        let is_query_type = definition.name == self.lookup.query_type();
        match ObjectResolver::build(self, &pair, definition, is_query_type) {
            Ok(resolver) => {
                self.resolvers[id.0] = Some(Arc::new(resolver));
                Ok(id)
            }
            Err(err) => {
                // Everything built since the reservation may point at the unfinished slot.
                self.resolvers.truncate(id.0);
                self.pairs.retain(|_, built| built.0 < id.0);
                Err(err)
            }
        }
    }

    fn push(&mut self, resolver: impl Resolver + 'static) -> ResolverId {
        let id = ResolverId(self.resolvers.len());
        self.resolvers.push(Some(Arc::new(resolver)));
        id
    }

    /// The `String` resolver over native strings, used to render type names and enum values.
    pub(crate) fn build_string(&mut self) -> ResolverId {
        let pair = TypeResolverPair::new(TypeRef::named("String"), NativeType::String);
        if let Some(id) = self.pairs.get(&pair) {
            return *id;
        }
        let id = self.push(PrimitiveResolver::string());
        self.pairs.insert(pair, id);
        id
    }

    pub(crate) fn locator(&self) -> &Arc<dyn FieldLocator> {
        &self.locator
    }

    pub(crate) fn introspection(&self) -> (ResolverId, Native) {
        (self.introspection, self.introspection_value.clone())
    }
}
