use crate::{DbError, Result};

/// Semantic family of a declared column type, driving literal quoting.
///
/// Catalog type names are many; quoting rules are few. Each catalog name
/// maps to exactly one family (the match arms below are disjoint), so
/// [`SqlQuoter::write_literal`](crate::SqlQuoter::write_literal) is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    Int,
    Float,
    Money,
    Bool,
    Date,
    Text,
    Binary,
}

impl TypeFamily {
    /// Classify a catalog type name.
    ///
    /// Unrecognized names fall back to `Text` on purpose: text quoting is
    /// the safe default for any type this layer does not know (enums,
    /// domains, extension types all accept a quoted literal). Use
    /// [`TypeFamily::try_from_catalog`] to fail fast instead.
    pub fn from_catalog(type_name: &str) -> TypeFamily {
        Self::classify(type_name).unwrap_or(TypeFamily::Text)
    }

    /// Classify a catalog type name, failing on an unrecognized one.
    pub fn try_from_catalog(type_name: &str) -> Result<TypeFamily> {
        Self::classify(type_name).ok_or_else(|| {
            DbError::usage(format!("unrecognized column type `{}`", type_name)).into()
        })
    }

    fn classify(type_name: &str) -> Option<TypeFamily> {
        let name = type_name.to_ascii_lowercase();
        Some(match name.as_str() {
            "bool" | "boolean" => TypeFamily::Bool,
            "int" | "int2" | "int4" | "int8" | "smallint" | "integer" | "bigint" | "serial"
            | "smallserial" | "bigserial" | "oid" => TypeFamily::Int,
            "num" | "numeric" | "decimal" | "float" | "float4" | "float8" | "real" | "double"
            | "double precision" => TypeFamily::Float,
            "money" => TypeFamily::Money,
            "date" | "time" | "timetz" | "timestamp" | "timestamptz" | "datetime" | "abstime"
            | "reltime" | "interval" => TypeFamily::Date,
            "bytea" | "blob" => TypeFamily::Binary,
            "text" | "char" | "bpchar" | "varchar" | "name" => TypeFamily::Text,
            _ => return None,
        })
    }
}
