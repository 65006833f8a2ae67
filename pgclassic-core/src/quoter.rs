use crate::{DbError, Result, TypeFamily, Value};
use atoi::FromRadix10SignedChecked;

macro_rules! write_integer {
    ($out:ident, $value:expr) => {{
        let mut buffer = itoa::Buffer::new();
        $out.push_str(buffer.format($value));
    }};
}
macro_rules! write_float {
    ($out:ident, $value:expr) => {{
        let mut buffer = ryu::Buffer::new();
        $out.push_str(buffer.format($value));
    }};
}

/// Writes SQL literal fragments by declared column family.
///
/// Default methods implement the classic PostgreSQL rules; a backend with
/// different conventions overrides the relevant method, the way drivers
/// specialize a SQL writer. All methods append to a caller supplied buffer.
pub trait SqlQuoter {
    fn as_dyn(&self) -> &dyn SqlQuoter;

    fn write_escaped(&self, out: &mut String, value: &str, search: char, replace: &str) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + 1;
            }
        }
        out.push_str(&value[position..]);
    }

    fn write_identifier_quoted(&self, out: &mut String, value: &str) {
        out.push('"');
        self.write_escaped(out, value, '"', r#""""#);
        out.push('"');
    }

    /// Append the literal for `value` in a column of the given `family`.
    ///
    /// Two rules precede the family dispatch: `Null` always becomes `NULL`
    /// and `Raw` is spliced verbatim. Numeric families validate text input
    /// and pass the original representation through unaltered, never
    /// parse-and-reformat (`0.00` must stay `0.00`).
    fn write_literal(&self, out: &mut String, value: &Value, family: TypeFamily) -> Result<()> {
        match value {
            Value::Null => self.write_value_none(out),
            Value::Raw(v) => out.push_str(v),
            _ => match family {
                TypeFamily::Int => self.write_value_int(out, value)?,
                TypeFamily::Float | TypeFamily::Money => self.write_value_numeric(out, value)?,
                TypeFamily::Bool => self.write_value_bool(out, value),
                TypeFamily::Date => self.write_value_date(out, value),
                TypeFamily::Text | TypeFamily::Binary => {
                    // as_text is Some for every non-null variant
                    if let Some(text) = value.as_text() {
                        self.write_value_string(out, &text);
                    }
                }
            },
        }
        Ok(())
    }

    fn write_value_none(&self, out: &mut String) {
        out.push_str("NULL");
    }

    fn write_value_int(&self, out: &mut String, value: &Value) -> Result<()> {
        match value {
            Value::Int(v) => write_integer!(out, *v),
            // the upper bound excludes i64::MAX + 1, the closest f64 above it
            Value::Float(v)
                if v.is_finite()
                    && v.fract() == 0.0
                    && *v >= i64::MIN as f64
                    && *v < i64::MAX as f64 =>
            {
                write_integer!(out, *v as i64)
            }
            Value::Decimal(v) if v.fract().is_zero() => out.push_str(&v.trunc().to_string()),
            Value::Text(v) if v.is_empty() => self.write_value_none(out),
            Value::Text(v) => {
                let (parsed, used) = i64::from_radix_10_signed_checked(v.as_bytes());
                if parsed.is_none() || used != v.len() {
                    return Err(
                        DbError::usage(format!("`{}` is not valid integer text", v)).into(),
                    );
                }
                out.push_str(v);
            }
            other => {
                return Err(DbError::usage(format!(
                    "cannot quote {:?} in an integer column",
                    other
                ))
                .into());
            }
        }
        Ok(())
    }

    fn write_value_numeric(&self, out: &mut String, value: &Value) -> Result<()> {
        match value {
            Value::Int(v) => write_integer!(out, *v),
            Value::Float(v) if v.is_finite() => write_float!(out, *v),
            Value::Decimal(v) => out.push_str(&v.to_string()),
            Value::Text(v) if v.is_empty() => self.write_value_none(out),
            Value::Text(v) => {
                match fast_float::parse_partial::<f64, _>(v) {
                    Ok((_, used)) if used == v.len() => out.push_str(v),
                    _ => {
                        return Err(
                            DbError::usage(format!("`{}` is not valid numeric text", v)).into(),
                        );
                    }
                };
            }
            other => {
                return Err(DbError::usage(format!(
                    "cannot quote {:?} in a numeric column",
                    other
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Tokens recognized as true in boolean columns, compared case
    /// insensitively. Anything else non-empty quotes to `'f'`.
    fn true_tokens(&self) -> &[&str] {
        &["1", "t", "true", "y", "yes", "on"]
    }

    fn write_value_bool(&self, out: &mut String, value: &Value) {
        let truthy = match value {
            Value::Bool(v) => *v,
            Value::Text(v) if v.is_empty() => {
                self.write_value_none(out);
                return;
            }
            Value::Text(v) => self
                .true_tokens()
                .iter()
                .any(|t| t.eq_ignore_ascii_case(v)),
            v => !v.is_zero(),
        };
        out.push_str(["'f'", "'t'"][truthy as usize]);
    }

    /// Keyword literals emitted bare in date/time columns.
    fn date_keywords(&self) -> &[&str] {
        &[
            "current_date",
            "current_time",
            "current_timestamp",
            "localtime",
            "localtimestamp",
        ]
    }

    fn write_value_date(&self, out: &mut String, value: &Value) {
        match value {
            Value::Bool(false) => return self.write_value_none(out),
            Value::Text(v) if v.is_empty() => return self.write_value_none(out),
            v if v.is_zero() => return self.write_value_none(out),
            _ => {}
        }
        let Some(text) = value.as_text() else {
            return self.write_value_none(out);
        };
        if self
            .date_keywords()
            .iter()
            .any(|k| k.eq_ignore_ascii_case(&text))
        {
            out.push_str(&text);
        } else {
            self.write_value_string(out, &text);
        }
    }

    /// Single quoted text with embedded `'` and `\` doubled, so the produced
    /// literal round-trips through the server's scanner.
    fn write_value_string(&self, out: &mut String, value: &str) {
        out.push('\'');
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == '\'' {
                out.push_str(&value[position..i]);
                out.push_str("''");
                position = i + 1;
            } else if c == '\\' {
                out.push_str(&value[position..i]);
                out.push_str(r"\\");
                position = i + 1;
            }
        }
        out.push_str(&value[position..]);
        out.push('\'');
    }
}

/// The stock quoter for classic PostgreSQL literal conventions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicQuoter;

impl SqlQuoter for ClassicQuoter {
    fn as_dyn(&self) -> &dyn SqlQuoter {
        self
    }
}

/// Quote a single value as a standalone literal string.
pub fn quote(value: &Value, family: TypeFamily) -> Result<String> {
    let mut out = String::with_capacity(16);
    ClassicQuoter.write_literal(&mut out, value, family)?;
    Ok(out)
}
