//! The live query tree.
//!
//! A [`QueryNode`] is a selected field that can gain and lose children, or be deleted, while
//! resolution is in progress. Resolvers observe those mutations through a [`Subscription`].
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::task::Context;
use std::task::Poll;

use apollo_compiler::ExecutableDocument;
use apollo_compiler::ast;
use apollo_compiler::executable::Selection;
use apollo_compiler::executable::SelectionSet;
use futures::Stream;
use parking_lot::Mutex;
use serde_json::Map;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::QueryError;
use crate::registry::FieldArgs;
use crate::schema::Schema;

/// Identifier of a node, unique within its tree.
pub type NodeId = u32;

/// A mutation of a query node, as seen by its subscribers.
#[derive(Clone, Debug)]
pub enum Operation {
    AddChild(Arc<QueryNode>),
    DelChild(Arc<QueryNode>),
    /// The node itself was deleted. Nothing is emitted after this.
    Delete,
}

/// A live query tree, owning the id sequence of its nodes.
#[derive(Debug)]
pub struct QueryTree {
    root: Arc<QueryNode>,
}

impl Default for QueryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryTree {
    pub fn new() -> Self {
        let ids = Arc::new(AtomicU32::new(1));
        Self {
            root: Arc::new(QueryNode::new(0, ids, String::new(), None, FieldArgs::new())),
        }
    }

    pub fn root(&self) -> &Arc<QueryNode> {
        &self.root
    }

    /// Add the selections of an operation to the root of the tree.
    ///
    /// Fields already selected under the same response key are merged rather than duplicated.
    /// Fragments are rejected: live selections are addressed field by field. The document is
    /// checked in full before the tree changes, so a rejected operation leaves it untouched.
    pub fn apply_operation(
        &self,
        schema: &Schema,
        query: &str,
        operation_name: Option<&str>,
        variables: &Map<String, Value>,
    ) -> Result<(), QueryError> {
        let document =
            ExecutableDocument::parse(schema.compiler_schema(), query, "query.graphql")
                .map_err(|invalid| QueryError::Invalid(invalid.errors))?;
        let operation = document
            .operations
            .get(operation_name)
            .map_err(|_| {
                QueryError::Operation(operation_name.unwrap_or("anonymous operation").to_string())
            })?;
        let selections = SelectedField::collect(&operation.selection_set, variables)?;
        apply_selections(&self.root, &selections)
    }

    /// Delete the whole tree, ending every resolution attached to it.
    pub fn dispose(&self) {
        self.root.delete();
    }
}

/// A field of an executable document with its arguments already evaluated.
#[derive(Debug)]
struct SelectedField {
    name: String,
    alias: Option<String>,
    arguments: FieldArgs,
    selections: Vec<SelectedField>,
}

impl SelectedField {
    fn collect(
        selection_set: &SelectionSet,
        variables: &Map<String, Value>,
    ) -> Result<Vec<Self>, QueryError> {
        selection_set
            .selections
            .iter()
            .map(|selection| match selection {
                Selection::Field(field) => Ok(Self {
                    name: field.name.to_string(),
                    alias: field.alias.as_ref().map(|alias| alias.to_string()),
                    arguments: field
                        .arguments
                        .iter()
                        .map(|argument| {
                            Ok((
                                argument.name.to_string(),
                                argument_value(&argument.value, variables)?,
                            ))
                        })
                        .collect::<Result<_, QueryError>>()?,
                    selections: Self::collect(&field.selection_set, variables)?,
                }),
                Selection::FragmentSpread(_) => {
                    Err(QueryError::UnsupportedSelection("fragment spread"))
                }
                Selection::InlineFragment(_) => {
                    Err(QueryError::UnsupportedSelection("inline fragment"))
                }
            })
            .collect()
    }

    fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

fn apply_selections(node: &Arc<QueryNode>, selections: &[SelectedField]) -> Result<(), QueryError> {
    for field in selections {
        let child = match node.child(field.response_key()) {
            Some(existing) => existing,
            None => node.add_child(&field.name, field.alias.clone(), field.arguments.clone())?,
        };
        apply_selections(&child, &field.selections)?;
    }
    Ok(())
}

fn argument_value(value: &ast::Value, variables: &Map<String, Value>) -> Result<Value, QueryError> {
    Ok(match value {
        ast::Value::Null => Value::Null,
        ast::Value::Enum(name) => Value::String(name.to_string()),
        ast::Value::Variable(name) => variables
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| QueryError::UnknownVariable(name.to_string()))?,
        ast::Value::String(value) => Value::String(value.clone()),
        ast::Value::Float(value) => value
            .try_to_f64()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| {
                let value = value.as_str();
                QueryError::InvalidArgument(format!("{value} is not a finite float"))
            })?,
        ast::Value::Int(value) => value.try_to_i32().map(Value::from).map_err(|_| {
            let value = value.as_str();
            QueryError::InvalidArgument(format!("{value} does not fit a 32-bit integer"))
        })?,
        ast::Value::Boolean(value) => Value::Bool(*value),
        ast::Value::List(items) => Value::Array(
            items
                .iter()
                .map(|item| argument_value(item, variables))
                .collect::<Result<_, _>>()?,
        ),
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, item)| Ok((name.to_string(), argument_value(item, variables)?)))
                .collect::<Result<_, QueryError>>()?,
        ),
    })
}

/// A selected field in a live query tree.
#[derive(Debug)]
pub struct QueryNode {
    id: NodeId,
    ids: Arc<AtomicU32>,
    field_name: String,
    alias: Option<String>,
    arguments: FieldArgs,
    state: Mutex<NodeState>,
}

#[derive(Debug, Default)]
struct NodeState {
    children: Vec<Arc<QueryNode>>,
    subscribers: HashMap<u64, mpsc::UnboundedSender<Operation>>,
    next_subscriber: u64,
    deleted: bool,
}

impl QueryNode {
    fn new(
        id: NodeId,
        ids: Arc<AtomicU32>,
        field_name: String,
        alias: Option<String>,
        arguments: FieldArgs,
    ) -> Self {
        Self {
            id,
            ids,
            field_name,
            alias,
            arguments,
            state: Default::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// The key the node's result is written under: its alias, or its field name.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.field_name)
    }

    pub fn arguments(&self) -> &FieldArgs {
        &self.arguments
    }

    pub fn is_deleted(&self) -> bool {
        self.state.lock().deleted
    }

    /// The currently selected children.
    pub fn children(&self) -> Vec<Arc<QueryNode>> {
        self.state.lock().children.clone()
    }

    /// The selected child with the given response key.
    pub fn child(&self, response_key: &str) -> Option<Arc<QueryNode>> {
        self.state
            .lock()
            .children
            .iter()
            .find(|child| child.response_key() == response_key)
            .cloned()
    }

    /// Select a new child field and notify subscribers.
    pub fn add_child(
        &self,
        field_name: &str,
        alias: Option<String>,
        arguments: FieldArgs,
    ) -> Result<Arc<QueryNode>, QueryError> {
        let mut state = self.state.lock();
        if state.deleted {
            return Err(QueryError::NodeDeleted(self.id));
        }
        let response_key = alias.as_deref().unwrap_or(field_name);
        if state
            .children
            .iter()
            .any(|child| child.response_key() == response_key)
        {
            return Err(QueryError::DuplicateResponseKey(response_key.to_string()));
        }
        let child = Arc::new(QueryNode::new(
            self.ids.fetch_add(1, Ordering::Relaxed),
            self.ids.clone(),
            field_name.to_string(),
            alias,
            arguments,
        ));
        state.children.push(child.clone());
        state.broadcast(Operation::AddChild(child.clone()));
        Ok(child)
    }

    /// Deselect a child: subscribers see it removed, then the child itself is deleted.
    ///
    /// Returns whether the child was selected.
    pub fn remove_child(&self, id: NodeId) -> bool {
        let child = {
            let mut state = self.state.lock();
            let Some(position) = state.children.iter().position(|child| child.id == id) else {
                return false;
            };
            let child = state.children.remove(position);
            state.broadcast(Operation::DelChild(child.clone()));
            child
        };
        child.delete();
        true
    }

    /// Delete the node and its whole subtree. Deleting twice is a no-op.
    pub fn delete(&self) {
        let children = {
            let mut state = self.state.lock();
            if state.deleted {
                return;
            }
            state.deleted = true;
            state.broadcast(Operation::Delete);
            state.subscribers.clear();
            std::mem::take(&mut state.children)
        };
        for child in children {
            child.delete();
        }
    }

    /// Snapshot the selected children and subscribe to further mutations, atomically.
    ///
    /// No mutation can slip between the snapshot and the subscription. Subscribing to a deleted
    /// node yields an empty snapshot and a subscription that only reports the deletion.
    pub fn subscribe(self: &Arc<Self>) -> (Vec<Arc<QueryNode>>, Subscription) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        let id = state.next_subscriber;
        state.next_subscriber += 1;
        if state.deleted {
            let _ = sender.send(Operation::Delete);
        } else {
            state.subscribers.insert(id, sender);
        }
        let children = state.children.clone();
        drop(state);

        (
            children,
            Subscription {
                node: self.clone(),
                id,
                changes: UnboundedReceiverStream::new(receiver),
            },
        )
    }
}

impl NodeState {
    fn broadcast(&mut self, operation: Operation) {
        // Subscribers whose receiver is gone are dropped on the way.
        self.subscribers
            .retain(|_, subscriber| subscriber.send(operation.clone()).is_ok());
    }
}

/// A stream of the mutations of one node. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    node: Arc<QueryNode>,
    id: u64,
    changes: UnboundedReceiverStream<Operation>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Stream for Subscription {
    type Item = Operation;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.changes).poll_next(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.node.state.lock().subscribers.remove(&self.id);
    }
}
