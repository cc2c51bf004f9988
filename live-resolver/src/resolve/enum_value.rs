use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;

use super::Resolver;
use super::ResolverId;
use super::ResolverTree;
use crate::context::ResolutionContext;
use crate::error::BuildError;
use crate::error::ResolveError;
use crate::native::Native;
use crate::native::NativeType;
use crate::schema::EnumDefinition;

/// How an enum is represented natively, fixed at build time.
#[derive(Debug)]
enum Encoding {
    /// Native strings holding one of the declared names.
    Name(HashSet<String>),
    /// Native integers indexing the declared names.
    Ordinal {
        names: Vec<String>,
        /// Set when the native integer is not the canonical one and must be converted first.
        convert: bool,
    },
}

/// Coerces a native scalar into one of an enum's declared values.
#[derive(Debug)]
pub(crate) struct EnumResolver {
    enum_name: String,
    encoding: Encoding,
    delegate: ResolverId,
}

impl EnumResolver {
    pub(crate) fn build(
        tree: &mut ResolverTree,
        native: &NativeType,
        definition: &EnumDefinition,
    ) -> Result<Self, BuildError> {
        let encoding = match native {
            NativeType::String => Encoding::Name(definition.values.iter().cloned().collect()),
            NativeType::Int => Encoding::Ordinal {
                names: definition.values.clone(),
                convert: false,
            },
            native if native.is_int_convertible() => Encoding::Ordinal {
                names: definition.values.clone(),
                convert: true,
            },
            native => {
                return Err(BuildError::UnsupportedEnumRepresentation {
                    enum_name: definition.name.clone(),
                    native: native.clone(),
                });
            }
        };

        Ok(Self {
            enum_name: definition.name.clone(),
            encoding,
            delegate: tree.build_string(),
        })
    }

    /// The value handed to the string delegate, or why there is none.
    fn coerce(&self, value: Native) -> Result<Native, ResolveError> {
        match &self.encoding {
            Encoding::Name(names) => match value {
                Native::String(name) if names.contains(&name) => Ok(Native::String(name)),
                Native::String(name) => Err(ResolveError::UnknownEnumValue {
                    enum_name: self.enum_name.clone(),
                    value: name,
                }),
                other => Err(ResolveError::UnexpectedValue {
                    expected: "String".to_string(),
                    found: other.kind().to_string(),
                }),
            },
            Encoding::Ordinal { names, convert } => {
                let ordinal = match (&value, *convert) {
                    (Native::Int(ordinal), _) => Some(*ordinal),
                    (other, true) => other.to_canonical_int(),
                    (_, false) => None,
                };
                let Some(ordinal) = ordinal else {
                    return Err(match value {
                        // Only a u64 too large for the canonical integer fails conversion.
                        Native::U64(raw) => ResolveError::EnumOrdinalOutOfRange {
                            enum_name: self.enum_name.clone(),
                            ordinal: raw.to_string(),
                            count: names.len(),
                        },
                        other => ResolveError::UnexpectedValue {
                            expected: "an integer".to_string(),
                            found: other.kind().to_string(),
                        },
                    });
                };
                usize::try_from(ordinal)
                    .ok()
                    .and_then(|index| names.get(index))
                    .map(|name| Native::String(name.clone()))
                    .ok_or_else(|| ResolveError::EnumOrdinalOutOfRange {
                        enum_name: self.enum_name.clone(),
                        ordinal: ordinal.to_string(),
                        count: names.len(),
                    })
            }
        }
    }
}

#[async_trait]
impl Resolver for EnumResolver {
    async fn execute(&self, ctx: ResolutionContext, value: Native) {
        if value.is_null() {
            ctx.set_value(Value::Null);
            return;
        }

        let rendered = match self.coerce(value) {
            Ok(rendered) => rendered,
            Err(err) => {
                ctx.set_error(err);
                return;
            }
        };

        let Some(delegate) = ctx.resolver(self.delegate) else {
            tracing::error!(enum_name = %self.enum_name, "enum delegate resolver is missing");
            return;
        };
        // Always an independent task, serial mode included. The execution tracks it, so
        // completion still waits for the rendered value.
        ctx.spawn_resolver(delegate, rendered);
    }
}
