use async_trait::async_trait;
use futures::StreamExt;

use super::Resolver;
use super::ResolverId;
use crate::context::ResolutionContext;
use crate::context::Teardown;
use crate::error::ResolveError;
use crate::native::Native;
use crate::registry::FieldFunction;
use crate::registry::FieldOutput;

/// Calls a field function on the parent value and resolves what it produced.
#[derive(Debug)]
pub(crate) struct FunctionResolver {
    field_name: String,
    function: FieldFunction,
    output: ResolverId,
}

impl FunctionResolver {
    pub(crate) fn new(field_name: &str, function: FieldFunction, output: ResolverId) -> Self {
        Self {
            field_name: field_name.to_string(),
            function,
            output,
        }
    }
}

#[async_trait]
impl Resolver for FunctionResolver {
    async fn execute(&self, ctx: ResolutionContext, value: Native) {
        let Some(output) = ctx.resolver(self.output) else {
            tracing::error!(field = %self.field_name, "output resolver is missing");
            return;
        };
        let args = ctx.node().arguments().clone();

        let produced = tokio::select! {
            biased;
            _ = ctx.cancelled() => return,
            produced = self.function.call(value, args) => produced,
        };
        let mut values = match produced {
            Ok(FieldOutput::Value(value)) => return output.execute(ctx, value).await,
            Ok(FieldOutput::Stream(values)) => values,
            Err(err) => return ctx.set_error(ResolveError::Field(err)),
        };

        if ctx.is_serial() {
            if let Some(value) = values.next().await {
                output.execute(ctx, value).await;
            }
            return;
        }

        let mut current: Option<Teardown> = None;
        loop {
            let value = tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                value = values.next() => value,
            };
            let Some(value) = value else {
                tracing::trace!(field = %self.field_name, path = %ctx.path(), "live field ended");
                break;
            };
            if let Some(previous) = current.take() {
                previous.purge();
            }
            let generation = ctx.generation();
            current = Some(generation.teardown());
            generation.spawn_resolver(output.clone(), value);
        }
    }
}
