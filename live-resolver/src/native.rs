//! Native representation of the values resolvers consume.
//!
//! Resolvers are built for a pairing of a GraphQL type with a [`NativeType`], and execute
//! against [`Native`] values of that type.
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::introspection::SchemaIntrospection;

/// The shape of a native value, known at build time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NativeType {
    /// bool
    Bool,
    /// The canonical integer, `i64`.
    Int,
    /// i8
    I8,
    /// i16
    I16,
    /// i32
    I32,
    /// u8
    U8,
    /// u16
    U16,
    /// u32
    U32,
    /// u64
    U64,
    /// f64
    Float,
    /// String
    String,
    /// A list of values of the element type.
    List(Box<NativeType>),
    /// A registered [`NativeObject`], by type name.
    Object(Arc<str>),
    /// The value bound to the shared introspection resolver.
    Introspection,
}

impl NativeType {
    /// The native type of a registered object.
    pub fn object(name: impl Into<Arc<str>>) -> Self {
        NativeType::Object(name.into())
    }

    /// A list of `element`.
    pub fn list(element: NativeType) -> Self {
        NativeType::List(Box::new(element))
    }

    /// Whether this is an integer kind other than the canonical one, which values convert from.
    pub fn is_int_convertible(&self) -> bool {
        matches!(
            self,
            NativeType::I8
                | NativeType::I16
                | NativeType::I32
                | NativeType::U8
                | NativeType::U16
                | NativeType::U32
                | NativeType::U64
        )
    }

    /// Whether this is any integer kind, canonical or not.
    pub fn is_integer(&self) -> bool {
        *self == NativeType::Int || self.is_int_convertible()
    }

    /// Whether values of this type are leaves.
    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            NativeType::List(_) | NativeType::Object(_) | NativeType::Introspection
        )
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::Bool => write!(f, "bool"),
            NativeType::Int => write!(f, "i64"),
            NativeType::I8 => write!(f, "i8"),
            NativeType::I16 => write!(f, "i16"),
            NativeType::I32 => write!(f, "i32"),
            NativeType::U8 => write!(f, "u8"),
            NativeType::U16 => write!(f, "u16"),
            NativeType::U32 => write!(f, "u32"),
            NativeType::U64 => write!(f, "u64"),
            NativeType::Float => write!(f, "f64"),
            NativeType::String => write!(f, "String"),
            NativeType::List(element) => write!(f, "Vec<{element}>"),
            NativeType::Object(name) => write!(f, "{name}"),
            NativeType::Introspection => write!(f, "introspection"),
        }
    }
}

/// A native value handed to a resolver.
#[derive(Clone)]
pub enum Native {
    /// An absent value or nil reference.
    Null,
    Bool(bool),
    Int(i64),
    I8(i8),
    I16(i16),
    I32(i32),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Float(f64),
    String(String),
    List(Vec<Native>),
    /// An instance of a registered [`NativeObject`].
    Object(Arc<dyn Any + Send + Sync>),
    Introspection(Arc<SchemaIntrospection>),
}

impl Native {
    pub fn is_null(&self) -> bool {
        matches!(self, Native::Null)
    }

    /// Convert an integer value to the canonical integer.
    ///
    /// Returns `None` for non-integers and for `u64` values that do not fit.
    pub fn to_canonical_int(&self) -> Option<i64> {
        match *self {
            Native::Int(v) => Some(v),
            Native::I8(v) => Some(v.into()),
            Native::I16(v) => Some(v.into()),
            Native::I32(v) => Some(v.into()),
            Native::U8(v) => Some(v.into()),
            Native::U16(v) => Some(v.into()),
            Native::U32(v) => Some(v.into()),
            Native::U64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Downcast an object value to its concrete type.
    pub fn downcast<T: NativeObject>(&self) -> Option<Arc<T>> {
        match self {
            Native::Object(object) => object.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// A short description of the value's kind, for error messages.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Native::Null => "null",
            Native::Bool(_) => "bool",
            Native::Int(_) => "i64",
            Native::I8(_) => "i8",
            Native::I16(_) => "i16",
            Native::I32(_) => "i32",
            Native::U8(_) => "u8",
            Native::U16(_) => "u16",
            Native::U32(_) => "u32",
            Native::U64(_) => "u64",
            Native::Float(_) => "f64",
            Native::String(_) => "String",
            Native::List(_) => "list",
            Native::Object(_) => "object",
            Native::Introspection(_) => "introspection",
        }
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Native::List(items) => f.debug_list().entries(items).finish(),
            Native::Object(_) => write!(f, "Object(..)"),
            Native::Introspection(_) => write!(f, "Introspection(..)"),
            _ => write!(f, "{self}"),
        }
    }
}

impl fmt::Display for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Native::Null => write!(f, "null"),
            Native::Bool(v) => write!(f, "{v}"),
            Native::Int(v) => write!(f, "{v}"),
            Native::I8(v) => write!(f, "{v}"),
            Native::I16(v) => write!(f, "{v}"),
            Native::I32(v) => write!(f, "{v}"),
            Native::U8(v) => write!(f, "{v}"),
            Native::U16(v) => write!(f, "{v}"),
            Native::U32(v) => write!(f, "{v}"),
            Native::U64(v) => write!(f, "{v}"),
            Native::Float(v) => write!(f, "{v}"),
            Native::String(v) => write!(f, "{v}"),
            Native::List(items) => write!(f, "[{} items]", items.len()),
            Native::Object(_) => write!(f, "object"),
            Native::Introspection(_) => write!(f, "introspection"),
        }
    }
}

/// A Rust type exposed to resolvers as a GraphQL object.
pub trait NativeObject: Any + Send + Sync {
    /// The name field functions are registered under.
    const TYPE_NAME: &'static str;
}

/// Conversion of Rust values returned by field functions.
pub trait IntoNative: Send + 'static {
    /// The native type every value of `Self` converts to.
    fn native_type() -> NativeType;

    fn into_native(self) -> Native;
}

macro_rules! impl_into_native {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl IntoNative for $ty {
                fn native_type() -> NativeType {
                    NativeType::$variant
                }

                fn into_native(self) -> Native {
                    Native::$variant(self)
                }
            }
        )*
    };
}

impl_into_native! {
    bool => Bool,
    i64 => Int,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f64 => Float,
    String => String,
}

impl IntoNative for &'static str {
    fn native_type() -> NativeType {
        NativeType::String
    }

    fn into_native(self) -> Native {
        Native::String(self.to_string())
    }
}

impl<T: IntoNative> IntoNative for Option<T> {
    fn native_type() -> NativeType {
        T::native_type()
    }

    fn into_native(self) -> Native {
        self.map(IntoNative::into_native).unwrap_or(Native::Null)
    }
}

impl<T: IntoNative> IntoNative for Vec<T> {
    fn native_type() -> NativeType {
        NativeType::list(T::native_type())
    }

    fn into_native(self) -> Native {
        Native::List(self.into_iter().map(IntoNative::into_native).collect())
    }
}

impl<T: NativeObject> IntoNative for Arc<T> {
    fn native_type() -> NativeType {
        NativeType::object(T::TYPE_NAME)
    }

    fn into_native(self) -> Native {
        Native::Object(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Person;

    impl NativeObject for Person {
        const TYPE_NAME: &'static str = "Person";
    }

    #[test]
    fn integer_kinds_convert_to_the_canonical_integer() {
        assert_eq!(Native::I32(-4).to_canonical_int(), Some(-4));
        assert_eq!(Native::U8(7).to_canonical_int(), Some(7));
        assert_eq!(Native::U64(u64::MAX).to_canonical_int(), None);
        assert_eq!(Native::String("1".into()).to_canonical_int(), None);
        assert!(NativeType::U16.is_int_convertible());
        assert!(!NativeType::Int.is_int_convertible());
        assert!(!NativeType::Float.is_integer());
    }

    #[test]
    fn rust_types_map_to_native_types() {
        assert_eq!(<Option<i32>>::native_type(), NativeType::I32);
        assert_eq!(
            <Vec<Arc<Person>>>::native_type(),
            NativeType::list(NativeType::object("Person"))
        );
        assert!(None::<String>.into_native().is_null());

        let person = Arc::new(Person).into_native();
        assert!(person.downcast::<Person>().is_some());
        assert_eq!(NativeType::list(NativeType::I8).to_string(), "Vec<i8>");
    }
}
