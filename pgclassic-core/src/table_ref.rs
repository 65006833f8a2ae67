use crate::{DbError, Result, SqlQuoter};

/// A schema qualified relation name.
///
/// Unqualified names resolve to the `public` schema so that `users` and
/// `public.users` address (and cache as) the same relation, while the same
/// table name in two schemas stays distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

pub const DEFAULT_SCHEMA: &str = "public";

impl TableRef {
    /// Parse `name` or `schema.name`. Anything else is a usage error.
    pub fn parse(qualified: &str) -> Result<TableRef> {
        let mut parts = qualified.split('.');
        let reference = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, _) if !name.is_empty() => TableRef {
                schema: DEFAULT_SCHEMA.to_owned(),
                name: name.to_owned(),
            },
            (Some(schema), Some(name), None) if !schema.is_empty() && !name.is_empty() => {
                TableRef {
                    schema: schema.to_owned(),
                    name: name.to_owned(),
                }
            }
            _ => {
                return Err(
                    DbError::usage(format!("invalid relation name `{}`", qualified)).into(),
                );
            }
        };
        Ok(reference)
    }

    pub fn full_name(&self) -> String {
        let mut result = String::with_capacity(self.schema.len() + self.name.len() + 1);
        result.push_str(&self.schema);
        result.push('.');
        result.push_str(&self.name);
        result
    }

    /// Append `"schema"."name"` with identifiers quoted.
    pub fn write_quoted(&self, quoter: &dyn SqlQuoter, out: &mut String) {
        quoter.write_identifier_quoted(out, &self.schema);
        out.push('.');
        quoter.write_identifier_quoted(out, &self.name);
    }
}
