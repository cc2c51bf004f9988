//! Field functions registered for native object types.
//!
//! The builder locates one [`FieldFunction`] per object field through the [`FieldLocator`]
//! contract. [`Registry`] is the table-driven implementation: each native object type registers
//! typed closures, which are erased into [`FieldFunction`]s with a known output [`NativeType`].
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use derivative::Derivative;
use futures::FutureExt;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::Stream;
use serde_json::Map;
use serde_json::Value;

use crate::error::FieldError;
use crate::native::IntoNative;
use crate::native::Native;
use crate::native::NativeObject;
use crate::native::NativeType;

/// Arguments of a selected field, with variables already substituted.
pub type FieldArgs = Map<String, Value>;

/// What a field function produced.
pub enum FieldOutput {
    /// A single value.
    Value(Native),
    /// A live value: every item replaces the previous one.
    Stream(BoxStream<'static, Native>),
}

type FieldCall = dyn Fn(Native, FieldArgs) -> BoxFuture<'static, Result<FieldOutput, FieldError>>
    + Send
    + Sync;

/// A field's business logic, erased over the native object type it reads from.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct FieldFunction {
    output: NativeType,
    #[derivative(Debug = "ignore")]
    call: Arc<FieldCall>,
}

impl FieldFunction {
    /// The native type of the values this function produces.
    pub fn output(&self) -> &NativeType {
        &self.output
    }

    pub(crate) fn call(
        &self,
        parent: Native,
        args: FieldArgs,
    ) -> BoxFuture<'static, Result<FieldOutput, FieldError>> {
        (self.call)(parent, args)
    }
}

/// Locates the field function for a native type and field name at build time.
pub trait FieldLocator: Send + Sync {
    fn locate(&self, native: &NativeType, field: &str) -> Option<FieldFunction>;
}

/// A registration table of native objects and their field functions.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    objects: HashMap<Arc<str>, HashMap<String, FieldFunction>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start registering field functions for `T`.
    pub fn object<T: NativeObject>(&mut self) -> ObjectFields<'_, T> {
        ObjectFields {
            fields: self.objects.entry(Arc::from(T::TYPE_NAME)).or_default(),
            _object: PhantomData,
        }
    }
}

impl FieldLocator for Registry {
    fn locate(&self, native: &NativeType, field: &str) -> Option<FieldFunction> {
        match native {
            NativeType::Object(name) => self.objects.get(name)?.get(field).cloned(),
            _ => None,
        }
    }
}

/// Field function registration for one native object type.
pub struct ObjectFields<'a, T> {
    fields: &'a mut HashMap<String, FieldFunction>,
    _object: PhantomData<fn(T)>,
}

impl<T: NativeObject> ObjectFields<'_, T> {
    /// Register a plain accessor.
    pub fn field<R, F>(self, name: &str, accessor: F) -> Self
    where
        R: IntoNative,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        self.field_with_args(name, move |object, _args| Ok(accessor(object)))
    }

    /// Register a fallible accessor reading the field's arguments.
    pub fn field_with_args<R, F>(self, name: &str, accessor: F) -> Self
    where
        R: IntoNative,
        F: Fn(&T, &FieldArgs) -> Result<R, FieldError> + Send + Sync + 'static,
    {
        self.insert(name, R::native_type(), move |parent, args| {
            let result = downcast::<T>(&parent)
                .and_then(|object| accessor(&*object, &args))
                .map(|value| FieldOutput::Value(value.into_native()));
            futures::future::ready(result).boxed()
        })
    }

    /// Register an async accessor.
    pub fn field_async<R, Fut, F>(self, name: &str, accessor: F) -> Self
    where
        R: IntoNative,
        Fut: Future<Output = Result<R, FieldError>> + Send + 'static,
        F: Fn(Arc<T>, FieldArgs) -> Fut + Send + Sync + 'static,
    {
        let accessor = Arc::new(accessor);
        self.insert(name, R::native_type(), move |parent, args| {
            let accessor = accessor.clone();
            async move {
                let object = downcast::<T>(&parent)?;
                let value = accessor(object, args).await?;
                Ok(FieldOutput::Value(value.into_native()))
            }
            .boxed()
        })
    }

    /// Register a live accessor: the field re-resolves every time the stream yields.
    pub fn field_live<R, S, F>(self, name: &str, accessor: F) -> Self
    where
        R: IntoNative,
        S: Stream<Item = R> + Send + 'static,
        F: Fn(Arc<T>, FieldArgs) -> S + Send + Sync + 'static,
    {
        self.insert(name, R::native_type(), move |parent, args| {
            let result = downcast::<T>(&parent).map(|object| {
                FieldOutput::Stream(accessor(object, args).map(IntoNative::into_native).boxed())
            });
            futures::future::ready(result).boxed()
        })
    }

    fn insert<F>(self, name: &str, output: NativeType, call: F) -> Self
    where
        F: Fn(Native, FieldArgs) -> BoxFuture<'static, Result<FieldOutput, FieldError>>
            + Send
            + Sync
            + 'static,
    {
        self.fields.insert(
            name.to_string(),
            FieldFunction {
                output,
                call: Arc::new(call),
            },
        );
        self
    }
}

fn downcast<T: NativeObject>(parent: &Native) -> Result<Arc<T>, FieldError> {
    parent.downcast::<T>().ok_or_else(|| {
        FieldError::new(format!(
            "expected a {} object, found {}",
            T::TYPE_NAME,
            parent.kind()
        ))
    })
}
