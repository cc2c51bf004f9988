//! Per-node resolution contexts.
//!
//! A [`ResolutionContext`] is created when a resolver starts working on a query node and is
//! moved into exactly one [`Resolver::execute`] call. It owns the node's result slot: writes
//! go through it, and once it is torn down (or its execution cancelled) nothing it writes is
//! observable any more.
//!
//! [`Resolver::execute`]: crate::Resolver::execute
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::sync::WaitForCancellationFuture;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::configuration::ExecutionMode;
use crate::native::Native;
use crate::query_tree::QueryNode;
use crate::resolve::Resolver;
use crate::resolve::ResolverId;
use crate::resolve::ResolverTree;
use crate::result::Path;
use crate::result::PathElement;
use crate::result::ResultTree;

/// State shared by every context of one execution.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) resolvers: Arc<ResolverTree>,
    pub(crate) results: Arc<ResultTree>,
    pub(crate) tasks: TaskTracker,
    pub(crate) mode: ExecutionMode,
}

/// Signals the driver when dropped.
#[derive(Debug)]
pub struct CompletionGuard(Option<oneshot::Sender<()>>);

impl CompletionGuard {
    pub(crate) fn new(sender: oneshot::Sender<()>) -> Self {
        Self(Some(sender))
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(sender) = self.0.take() {
            let _ = sender.send(());
        }
    }
}

/// The execution unit of one query node.
pub struct ResolutionContext {
    node: Arc<QueryNode>,
    path: Path,
    cancel: CancellationToken,
    purged: Arc<AtomicBool>,
    is_root: bool,
    is_array: bool,
    shared: Arc<Shared>,
    completion: Option<CompletionGuard>,
}

impl fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("node", &self.node.id())
            .field("path", &self.path)
            .field("is_root", &self.is_root)
            .field("is_array", &self.is_array)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl ResolutionContext {
    pub(crate) fn root(
        node: Arc<QueryNode>,
        cancel: CancellationToken,
        shared: Arc<Shared>,
        completion: CompletionGuard,
    ) -> Self {
        Self {
            node,
            path: Path::empty(),
            cancel,
            purged: Default::default(),
            is_root: true,
            is_array: false,
            shared,
            completion: Some(completion),
        }
    }

    pub fn node(&self) -> &Arc<QueryNode> {
        &self.node
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn is_array(&self) -> bool {
        self.is_array
    }

    pub fn is_serial(&self) -> bool {
        self.shared.mode.is_serial()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once this context is torn down or its execution cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Take the root completion guard. Completion is signalled when the guard drops.
    pub fn take_completion(&mut self) -> Option<CompletionGuard> {
        self.completion.take()
    }

    pub fn resolver(&self, id: ResolverId) -> Option<Arc<dyn Resolver>> {
        self.shared.resolvers.get(id)
    }

    /// A context for `node`, a selected child of this context's node.
    pub fn child(&self, node: Arc<QueryNode>, is_root: bool, is_array: bool) -> Self {
        let path = self.path.join(PathElement::Key(node.response_key().to_string()));
        self.derive(node, path, is_root, is_array)
    }

    /// A context for the element at `index` of this context's list.
    pub fn element(&self, index: usize) -> Self {
        let path = self.path.join(PathElement::Index(index));
        self.derive(self.node.clone(), path, false, false)
    }

    /// A fresh context for the same node and slot, torn down independently of this one.
    pub fn generation(&self) -> Self {
        self.derive(self.node.clone(), self.path.clone(), false, self.is_array)
    }

    fn derive(&self, node: Arc<QueryNode>, path: Path, is_root: bool, is_array: bool) -> Self {
        Self {
            node,
            path,
            cancel: self.cancel.child_token(),
            purged: Default::default(),
            is_root,
            is_array,
            shared: self.shared.clone(),
            completion: None,
        }
    }

    pub fn set_value(&self, value: Value) {
        let mut results = self.shared.results.lock();
        if self.cancel.is_cancelled() {
            return;
        }
        if self.is_array && !matches!(value, Value::Array(_) | Value::Null) {
            tracing::warn!(path = %self.path, "list field resolved to a non-list value");
        }
        results.set(&self.path, value);
    }

    pub fn set_error(&self, error: impl fmt::Display) {
        let mut results = self.shared.results.lock();
        if self.cancel.is_cancelled() {
            return;
        }
        tracing::warn!(path = %self.path, "field resolution failed: {error}");
        results.set_error(&self.path, error.to_string());
    }

    /// Initialize the composite result container.
    pub fn set_selection_set(&self) {
        self.set_value(Value::Object(Default::default()));
    }

    /// Initialize a list result container of `len` null elements.
    pub fn set_array(&self, len: usize) {
        self.set_value(Value::Array(vec![Value::Null; len]));
    }

    /// Run `resolver` over `value` on this context as an independent tracked task.
    pub fn spawn_resolver(self, resolver: Arc<dyn Resolver>, value: Native) {
        let tasks = self.shared.tasks.clone();
        tasks.spawn(async move { resolver.execute(self, value).await }.in_current_span());
    }

    /// A handle tearing this context down from outside its task.
    pub fn teardown(&self) -> Teardown {
        Teardown {
            path: self.path.clone(),
            cancel: self.cancel.clone(),
            purged: self.purged.clone(),
            shared: self.shared.clone(),
        }
    }

    /// Tear this context down: stop its work, release its subscriptions and retract its result.
    pub fn purge(&self) {
        self.teardown().purge();
    }
}

/// Tears a context down. Purging is idempotent.
#[derive(Debug)]
pub struct Teardown {
    path: Path,
    cancel: CancellationToken,
    purged: Arc<AtomicBool>,
    shared: Arc<Shared>,
}

impl Teardown {
    pub fn purge(&self) {
        // Writes check the token under the same lock, so none lands between cancel and remove.
        let mut results = self.shared.results.lock();
        if self.purged.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();
        results.remove(&self.path);
        tracing::trace!(path = %self.path, "context purged");
    }
}
