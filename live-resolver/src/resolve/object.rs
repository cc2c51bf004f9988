use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;

use super::FunctionResolver;
use super::Resolver;
use super::ResolverId;
use super::ResolverTree;
use super::TypeResolverPair;
use crate::context::ResolutionContext;
use crate::context::Teardown;
use crate::error::BuildError;
use crate::native::Native;
use crate::query_tree::NodeId;
use crate::query_tree::Operation;
use crate::query_tree::QueryNode;
use crate::schema::ObjectDefinition;

const TYPENAME: &str = "__typename";
const SCHEMA: &str = "__schema";
const TYPE: &str = "__type";

/// Fans a composite value out to the resolvers of its selected fields.
///
/// In concurrent mode the resolver keeps tracking the selection of its node: fields selected
/// later are resolved as they arrive and deselected fields are torn down.
#[derive(Debug)]
pub(crate) struct ObjectResolver {
    type_name: String,
    fields: HashMap<String, ResolverId>,
    list_fields: HashSet<String>,
    introspection: Native,
}

impl ObjectResolver {
    pub(crate) fn build(
        tree: &mut ResolverTree,
        pair: &TypeResolverPair,
        definition: &ObjectDefinition,
        is_query_type: bool,
    ) -> Result<Self, BuildError> {
        let (introspection_id, introspection) = tree.introspection();
        let mut fields = HashMap::new();
        let mut list_fields = HashSet::new();

        fields.insert(TYPENAME.to_string(), tree.build_string());
        if is_query_type {
            fields.insert(SCHEMA.to_string(), introspection_id);
            fields.insert(TYPE.to_string(), introspection_id);
        }

        for field in &definition.fields {
            match field.name.as_str() {
                TYPENAME => continue,
                SCHEMA | TYPE => {
                    fields.insert(field.name.clone(), introspection_id);
                    continue;
                }
                _ => {}
            }
            let in_field = |source: BuildError| BuildError::Field {
                object: definition.name.clone(),
                field: field.name.clone(),
                source: Box::new(source),
            };

            let function = tree
                .locator()
                .locate(&pair.native_type, &field.name)
                .ok_or_else(|| {
                    in_field(BuildError::MissingFieldFunction {
                        native: pair.native_type.clone(),
                        field: field.name.clone(),
                    })
                })?;
            let output = tree
                .build_resolver(TypeResolverPair::new(
                    field.ty.clone(),
                    function.output().clone(),
                ))
                .map_err(in_field)?;
            let id = tree.push(FunctionResolver::new(&field.name, function, output));

            if field.ty.is_list() {
                list_fields.insert(field.name.clone());
            }
            fields.insert(field.name.clone(), id);
        }

        Ok(Self {
            type_name: definition.name.clone(),
            fields,
            list_fields,
            introspection,
        })
    }

    /// The resolver, context and value a selected child is resolved with.
    ///
    /// Fields the type does not know are skipped.
    fn dispatch(
        &self,
        ctx: &ResolutionContext,
        node: Arc<QueryNode>,
        parent: &Native,
    ) -> Option<(Arc<dyn Resolver>, ResolutionContext, Native)> {
        let Some(id) = self.fields.get(node.field_name()) else {
            tracing::trace!(
                object = %self.type_name,
                field = node.field_name(),
                "skipping unknown field"
            );
            return None;
        };
        let resolver = ctx.resolver(*id)?;
        let value = match node.field_name() {
            TYPENAME => Native::String(self.type_name.clone()),
            SCHEMA | TYPE => self.introspection.clone(),
            _ => parent.clone(),
        };
        let is_array = self.list_fields.contains(node.field_name());
        Some((resolver, ctx.child(node, false, is_array), value))
    }

    fn process_child(
        &self,
        ctx: &ResolutionContext,
        node: Arc<QueryNode>,
        parent: &Native,
        teardowns: &mut HashMap<NodeId, Teardown>,
    ) {
        let id = node.id();
        if let Some((resolver, child, value)) = self.dispatch(ctx, node, parent) {
            teardowns.insert(id, child.teardown());
            child.spawn_resolver(resolver, value);
        }
    }
}

#[async_trait]
impl Resolver for ObjectResolver {
    async fn execute(&self, mut ctx: ResolutionContext, value: Native) {
        // The root object holds completion until this invocation returns, whatever the outcome.
        let _completion = if ctx.is_root() {
            ctx.take_completion()
        } else {
            None
        };

        if value.is_null() {
            ctx.set_value(Value::Null);
            return;
        }
        ctx.set_selection_set();

        if ctx.is_serial() {
            for node in ctx.node().children() {
                if ctx.is_cancelled() {
                    return;
                }
                if let Some((resolver, child, value)) = self.dispatch(&ctx, node, &value) {
                    resolver.execute(child, value).await;
                }
            }
            return;
        }

        let (children, mut changes) = ctx.node().subscribe();
        let mut teardowns = HashMap::new();
        for node in children {
            self.process_child(&ctx, node, &value, &mut teardowns);
        }

        loop {
            let operation = tokio::select! {
                biased;
                _ = ctx.cancelled() => return,
                operation = changes.next() => operation,
            };
            match operation {
                Some(Operation::AddChild(node)) => {
                    tracing::trace!(
                        object = %self.type_name,
                        field = node.field_name(),
                        "field selected"
                    );
                    self.process_child(&ctx, node, &value, &mut teardowns);
                }
                Some(Operation::DelChild(node)) => {
                    tracing::trace!(
                        object = %self.type_name,
                        field = node.field_name(),
                        "field deselected"
                    );
                    if let Some(teardown) = teardowns.remove(&node.id()) {
                        teardown.purge();
                    }
                }
                Some(Operation::Delete) | None => {
                    tracing::trace!(
                        object = %self.type_name,
                        path = %ctx.path(),
                        "selection deleted"
                    );
                    ctx.purge();
                    return;
                }
            }
        }
    }
}
