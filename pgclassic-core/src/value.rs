use rust_decimal::Decimal;
use std::borrow::Cow;

/// A dynamically typed literal destined for generated SQL.
///
/// The set is deliberately closed and small: quoting logic in
/// [`SqlQuoter`](crate::SqlQuoter) is a total function over these variants
/// and the declared column family, with no runtime-type sniffing. `Raw`
/// splices its text verbatim in every family and is the escape hatch for
/// server-side expressions used as values.
#[derive(Default, Debug, Clone, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Raw(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value stringified without quoting or escaping.
    ///
    /// Integers go through `itoa`, floats through `ryu` (shortest
    /// round-trip), decimals through `Display` which preserves their scale
    /// (`0.00` stays `0.00`). `Null` has no text.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(v) => Cow::Borrowed(["false", "true"][*v as usize]),
            Value::Int(v) => Cow::Owned(itoa::Buffer::new().format(*v).to_owned()),
            Value::Float(v) => Cow::Owned(ryu::Buffer::new().format(*v).to_owned()),
            Value::Decimal(v) => Cow::Owned(v.to_string()),
            Value::Text(v) | Value::Raw(v) => Cow::Borrowed(v),
        })
    }

    /// True when the value is numerically zero, regardless of representation.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Int(v) => *v == 0,
            Value::Float(v) => *v == 0.0,
            Value::Decimal(v) => v.is_zero(),
            _ => false,
        }
    }
}

macro_rules! impl_from_value {
    ($source:ty, $into:path $(, $via:ty)?) => {
        impl From<$source> for Value {
            fn from(value: $source) -> Self {
                $into(value $(as $via)?)
            }
        }
    };
}

impl_from_value!(bool, Value::Bool);
impl_from_value!(i8, Value::Int, i64);
impl_from_value!(i16, Value::Int, i64);
impl_from_value!(i32, Value::Int, i64);
impl_from_value!(i64, Value::Int);
impl_from_value!(u8, Value::Int, i64);
impl_from_value!(u16, Value::Int, i64);
impl_from_value!(u32, Value::Int, i64);
impl_from_value!(f32, Value::Float, f64);
impl_from_value!(f64, Value::Float);
impl_from_value!(Decimal, Value::Decimal);
impl_from_value!(String, Value::Text);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
