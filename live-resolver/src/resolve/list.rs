use async_trait::async_trait;
use serde_json::Value;

use super::Resolver;
use super::ResolverId;
use crate::context::ResolutionContext;
use crate::error::ResolveError;
use crate::native::Native;

/// Resolves each element of a native list at its index.
#[derive(Debug)]
pub(crate) struct ListResolver {
    element: ResolverId,
}

impl ListResolver {
    pub(crate) fn new(element: ResolverId) -> Self {
        Self { element }
    }
}

#[async_trait]
impl Resolver for ListResolver {
    async fn execute(&self, ctx: ResolutionContext, value: Native) {
        let elements = match value {
            Native::Null => return ctx.set_value(Value::Null),
            Native::List(elements) => elements,
            other => {
                return ctx.set_error(ResolveError::UnexpectedValue {
                    expected: "a list".to_string(),
                    found: other.kind().to_string(),
                });
            }
        };
        let Some(resolver) = ctx.resolver(self.element) else {
            tracing::error!(path = %ctx.path(), "element resolver is missing");
            return;
        };

        ctx.set_array(elements.len());
        for (index, element) in elements.into_iter().enumerate() {
            let element_ctx = ctx.element(index);
            if ctx.is_serial() {
                resolver.execute(element_ctx, element).await;
            } else {
                element_ctx.spawn_resolver(resolver.clone(), element);
            }
        }
    }
}
