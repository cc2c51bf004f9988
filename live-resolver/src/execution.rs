//! Driving a resolver tree over a live query.
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::configuration::Configuration;
use crate::context::CompletionGuard;
use crate::context::ResolutionContext;
use crate::context::Shared;
use crate::native::Native;
use crate::query_tree::QueryNode;
use crate::resolve::ResolverId;
use crate::resolve::ResolverTree;
use crate::result::Response;
use crate::result::ResultTree;

/// Runs executions of a built resolver tree.
#[derive(Debug, Clone)]
pub struct Executor {
    resolvers: Arc<ResolverTree>,
    configuration: Configuration,
}

impl Executor {
    pub fn new(resolvers: Arc<ResolverTree>, configuration: Configuration) -> Self {
        Self {
            resolvers,
            configuration,
        }
    }

    /// Start resolving `value` with the `root` resolver over the query rooted at `node`.
    ///
    /// Must be called from within a tokio runtime. In concurrent mode the execution keeps
    /// tracking `node` until it is deleted or the execution is cancelled.
    pub fn execute(&self, root: ResolverId, node: &Arc<QueryNode>, value: Native) -> Execution {
        let results = Arc::new(ResultTree::new());
        let tasks = TaskTracker::new();
        let cancel = CancellationToken::new();
        let (sender, completion) = oneshot::channel();

        let shared = Arc::new(Shared {
            resolvers: self.resolvers.clone(),
            results: results.clone(),
            tasks: tasks.clone(),
            mode: self.configuration.execution.mode,
        });
        let ctx = ResolutionContext::root(
            node.clone(),
            cancel.clone(),
            shared,
            CompletionGuard::new(sender),
        );

        let span = tracing::debug_span!(
            "execution",
            root = ?root,
            mode = ?self.configuration.execution.mode
        );
        let _entered = span.enter();
        match self.resolvers.get(root) {
            Some(resolver) => ctx.spawn_resolver(resolver, value),
            // Dropping the context signals completion right away.
            None => tracing::error!(root = ?root, "root resolver is not part of the tree"),
        }

        Execution {
            results,
            cancel,
            completion,
            tasks,
        }
    }
}

/// A running execution. Dropping it cancels the execution.
#[derive(Debug)]
pub struct Execution {
    results: Arc<ResultTree>,
    cancel: CancellationToken,
    completion: oneshot::Receiver<()>,
    tasks: TaskTracker,
}

impl Execution {
    /// The live results of this execution.
    pub fn results(&self) -> &Arc<ResultTree> {
        &self.results
    }

    /// Stop every resolution of this execution. Results written so far are kept.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the root resolver to complete and every task it started to finish.
    pub async fn finished(mut self) -> Response {
        // The sender is dropped without sending only if the root task was aborted.
        let _ = (&mut self.completion).await;
        self.tasks.close();
        self.tasks.wait().await;
        self.results.snapshot()
    }
}

impl Drop for Execution {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
