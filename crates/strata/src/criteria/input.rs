//! Module: criteria::input
//! Responsibility: the criterion input trichotomy and its validation.
//! Does not own: instantiation. Named specs resolve through the
//! registry's factory table.

use crate::{error::CriterionError, types::Value};
use serde_json::Map;

///
/// CriterionSpec
///
/// A criterion referenced by registered name, optionally with
/// constructor arguments. The three shapes mirror the accepted raw
/// input forms exactly: bare name, positional arguments, named
/// arguments. Not generalized further on purpose; callers rely on
/// each form.
///

#[derive(Clone, Debug, PartialEq)]
pub enum CriterionSpec {
    Name(String),
    Positional(String, Vec<Value>),
    Named(String, Map<String, Value>),
}

impl CriterionSpec {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Positional(name, _) | Self::Named(name, _) => name,
        }
    }

    /// Parse a raw JSON input into a spec.
    ///
    /// Accepted shapes: `"Name"`, `["Name"]`, `["Name", [args..]]`,
    /// `["Name", {named args}]`, `{"Name": [args..]}`,
    /// `{"Name": {named args}}`. Arrays of length zero or more than
    /// two are an arity error; for objects the first entry wins and
    /// more than two entries is the same arity error.
    pub fn parse(value: &Value) -> Result<Self, CriterionError> {
        match value {
            Value::String(name) => Ok(Self::Name(name.clone())),

            Value::Array(items) => match items.as_slice() {
                [] => Err(CriterionError::InvalidArraySignature { len: 0 }),
                [name] => Ok(Self::Name(expect_name(name)?)),
                [name, args] => Self::with_args(expect_name(name)?, args),
                items => Err(CriterionError::InvalidArraySignature { len: items.len() }),
            },

            Value::Object(map) => {
                if map.is_empty() || map.len() > 2 {
                    return Err(CriterionError::InvalidArraySignature { len: map.len() });
                }
                let (name, args) = map
                    .iter()
                    .next()
                    .map(|(name, args)| (name.clone(), args))
                    .ok_or(CriterionError::InvalidArraySignature { len: 0 })?;

                Self::with_args(name, args)
            }

            other => Err(CriterionError::InvalidType {
                actual: json_type_name(other).to_string(),
            }),
        }
    }

    fn with_args(name: String, args: &Value) -> Result<Self, CriterionError> {
        match args {
            Value::Array(list) => Ok(Self::Positional(name, list.clone())),
            Value::Object(map) => Ok(Self::Named(name, map.clone())),
            other => Err(CriterionError::InvalidType {
                actual: json_type_name(other).to_string(),
            }),
        }
    }
}

fn expect_name(value: &Value) -> Result<String, CriterionError> {
    value.as_str().map(ToString::to_string).ok_or_else(|| {
        CriterionError::InvalidType {
            actual: json_type_name(value).to_string(),
        }
    })
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_name_forms_are_equivalent() {
        let from_string = CriterionSpec::parse(&json!("Active")).expect("spec");
        let from_array = CriterionSpec::parse(&json!(["Active"])).expect("spec");
        assert_eq!(from_string, CriterionSpec::Name("Active".into()));
        assert_eq!(from_string, from_array);
    }

    #[test]
    fn positional_and_named_forms_parse() {
        let positional =
            CriterionSpec::parse(&json!(["Between", ["2016-09-01", "2016-09-30"]])).expect("spec");
        assert_eq!(
            positional,
            CriterionSpec::Positional(
                "Between".into(),
                vec![json!("2016-09-01"), json!("2016-09-30")]
            )
        );

        let named = CriterionSpec::parse(&json!({"Between": {"from": "a", "to": "b"}}))
            .expect("spec");
        match named {
            CriterionSpec::Named(name, args) => {
                assert_eq!(name, "Between");
                assert_eq!(args.get("from"), Some(&json!("a")));
            }
            other => panic!("expected named spec, got {other:?}"),
        }
    }

    #[test]
    fn arity_violations_are_signature_errors() {
        let err = CriterionSpec::parse(&json!(["A", [], []])).expect_err("three elements");
        assert_eq!(err, CriterionError::InvalidArraySignature { len: 3 });

        let err = CriterionSpec::parse(&json!([])).expect_err("empty array");
        assert_eq!(err, CriterionError::InvalidArraySignature { len: 0 });

        let err = CriterionSpec::parse(&json!({})).expect_err("empty object");
        assert_eq!(err, CriterionError::InvalidArraySignature { len: 0 });
    }

    #[test]
    fn non_structural_input_is_a_type_error() {
        let err = CriterionSpec::parse(&json!(42)).expect_err("number");
        assert_eq!(
            err,
            CriterionError::InvalidType {
                actual: "number".into()
            }
        );

        let err = CriterionSpec::parse(&json!([1, []])).expect_err("numeric name");
        assert_eq!(
            err,
            CriterionError::InvalidType {
                actual: "number".into()
            }
        );

        let err = CriterionSpec::parse(&json!(["A", "b"])).expect_err("scalar args");
        assert_eq!(
            err,
            CriterionError::InvalidType {
                actual: "string".into()
            }
        );
    }
}
