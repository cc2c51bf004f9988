use async_trait::async_trait;
use serde_json::Number;
use serde_json::Value;

use super::Resolver;
use crate::context::ResolutionContext;
use crate::error::BuildError;
use crate::error::ResolveError;
use crate::native::Native;
use crate::native::NativeType;

// Primitives are taken from scalars: https://spec.graphql.org/draft/#sec-Scalars
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scalar {
    String,
    Id,
    Int,
    Float,
    Boolean,
    Custom,
}

/// Renders a native leaf value as a scalar.
#[derive(Debug)]
pub(crate) struct PrimitiveResolver {
    scalar: Scalar,
}

impl PrimitiveResolver {
    pub(crate) fn build(scalar: &str, native: &NativeType) -> Result<Self, BuildError> {
        let (kind, compatible) = match scalar {
            "String" => (Scalar::String, *native == NativeType::String),
            "ID" => (
                Scalar::Id,
                *native == NativeType::String || native.is_integer(),
            ),
            "Int" => (Scalar::Int, native.is_integer()),
            "Float" => (
                Scalar::Float,
                *native == NativeType::Float || native.is_integer(),
            ),
            "Boolean" => (Scalar::Boolean, *native == NativeType::Bool),
            _ => (Scalar::Custom, native.is_scalar()),
        };
        if !compatible {
            return Err(BuildError::ScalarMismatch {
                scalar: scalar.to_string(),
                native: native.clone(),
            });
        }
        Ok(Self { scalar: kind })
    }

    pub(crate) fn string() -> Self {
        Self {
            scalar: Scalar::String,
        }
    }

    fn render(&self, value: Native) -> Result<Value, ResolveError> {
        Ok(match value {
            Native::Null => Value::Null,
            Native::Bool(v) => Value::Bool(v),
            Native::String(v) => Value::String(v),
            Native::Float(v) => {
                Value::Number(Number::from_f64(v).ok_or(ResolveError::NonFiniteFloat)?)
            }
            other => match other.to_canonical_int() {
                Some(v) if self.scalar == Scalar::Id => Value::String(v.to_string()),
                Some(v) if self.scalar == Scalar::Float => {
                    Value::Number(Number::from_f64(v as f64).ok_or(ResolveError::NonFiniteFloat)?)
                }
                Some(v) => Value::from(v),
                // u64 values beyond i64 still render as numbers.
                None => match other {
                    Native::U64(v) if self.scalar == Scalar::Id => Value::String(v.to_string()),
                    Native::U64(v) => Value::from(v),
                    other => {
                        return Err(ResolveError::UnexpectedValue {
                            expected: format!("{:?} scalar", self.scalar),
                            found: other.kind().to_string(),
                        });
                    }
                },
            },
        })
    }
}

#[async_trait]
impl Resolver for PrimitiveResolver {
    async fn execute(&self, ctx: ResolutionContext, value: Native) {
        match self.render(value) {
            Ok(value) => ctx.set_value(value),
            Err(err) => ctx.set_error(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn scalars_accept_compatible_natives_only() {
        assert!(PrimitiveResolver::build("String", &NativeType::String).is_ok());
        assert!(PrimitiveResolver::build("ID", &NativeType::U32).is_ok());
        assert!(PrimitiveResolver::build("Float", &NativeType::I16).is_ok());
        assert!(PrimitiveResolver::build("JSON", &NativeType::Bool).is_ok());
        assert_eq!(
            PrimitiveResolver::build("Int", &NativeType::String).unwrap_err(),
            BuildError::ScalarMismatch {
                scalar: "Int".to_string(),
                native: NativeType::String,
            }
        );
        assert!(PrimitiveResolver::build("JSON", &NativeType::object("Person")).is_err());
    }

    #[test]
    fn render_follows_the_scalar() {
        let id = PrimitiveResolver::build("ID", &NativeType::Int).unwrap();
        assert_eq!(id.render(Native::Int(7)).unwrap(), json!("7"));

        let float = PrimitiveResolver::build("Float", &NativeType::I32).unwrap();
        assert_eq!(float.render(Native::I32(2)).unwrap(), json!(2.0));
        assert_eq!(
            float.render(Native::Float(f64::NAN)).unwrap_err(),
            ResolveError::NonFiniteFloat
        );

        let int = PrimitiveResolver::build("Int", &NativeType::U64).unwrap();
        assert_eq!(int.render(Native::U64(u64::MAX)).unwrap(), json!(u64::MAX));
        assert_eq!(int.render(Native::Null).unwrap(), json!(null));
    }
}
