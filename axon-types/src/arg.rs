//! Scalar argument schema — declaration, validation, and coercion.
//!
//! Every unit declares its inputs as an ordered list of [`ArgSpec`] fields.
//! Callers pass a JSON object; [`validate_coerce`] checks it against the
//! schema and produces a typed [`Args`] bundle the callable reads through
//! name-keyed accessors. Typing is exact: a boolean is neither an integer
//! nor a real, and an integer is not a real. The single coercion allowed is
//! the strings `"true"`/`"false"` (case-insensitive) into booleans, since
//! models routinely quote boolean arguments.

use crate::error::AxonError;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Scalar type of a declared argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgType {
    /// UTF-8 text.
    Text,
    /// Signed integer.
    Integer,
    /// Floating-point number.
    Real,
    /// Boolean.
    Boolean,
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArgType::Text => "text",
            ArgType::Integer => "integer",
            ArgType::Real => "real",
            ArgType::Boolean => "boolean",
        };
        f.write_str(s)
    }
}

/// One declared input field of a unit.
#[derive(Debug, Clone, Serialize)]
pub struct ArgSpec {
    /// Field name, unique within a specification.
    pub name: String,
    /// Scalar type of the field.
    pub arg_type: ArgType,
    /// Human-readable description, surfaced to model backends.
    pub description: String,
    /// Whether the field may be omitted.
    pub optional: bool,
    /// Closed set of admissible values. Only valid for [`ArgType::Text`].
    pub allowed_values: Option<Vec<String>>,
}

impl ArgSpec {
    /// Declare a required field.
    pub fn new(
        name: impl Into<String>,
        arg_type: ArgType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            arg_type,
            description: description.into(),
            optional: false,
            allowed_values: None,
        }
    }

    /// Mark the field optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Restrict a text field to a closed set of values.
    #[must_use]
    pub fn allowed(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Check schema-level invariants. Called by specification constructors.
    pub fn check(&self) -> Result<(), AxonError> {
        if self.name.is_empty() {
            return Err(AxonError::InvalidSpec("argument name must be non-empty".into()));
        }
        if let Some(values) = &self.allowed_values {
            if self.arg_type != ArgType::Text {
                return Err(AxonError::InvalidSpec(format!(
                    "argument '{}': allowed_values is only valid for text fields, not {}",
                    self.name, self.arg_type
                )));
            }
            if values.is_empty() {
                return Err(AxonError::InvalidSpec(format!(
                    "argument '{}': allowed_values must be non-empty",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Validate one supplied value against this field, coercing where the
    /// schema permits. Returns a human-readable issue on rejection.
    pub fn validate_value(&self, value: &Value) -> Result<ArgValue, String> {
        match (self.arg_type, value) {
            (ArgType::Text, Value::String(s)) => {
                if let Some(values) = &self.allowed_values {
                    if !values.iter().any(|v| v == s) {
                        return Err(format!(
                            "'{}': value {s:?} not in allowed set [{}]",
                            self.name,
                            values.join(", ")
                        ));
                    }
                }
                Ok(ArgValue::Text(s.clone()))
            }
            (ArgType::Integer, Value::Number(n)) => match n.as_i64() {
                Some(i) => Ok(ArgValue::Integer(i)),
                None => Err(format!(
                    "'{}': expected integer, got non-integral number {n}",
                    self.name
                )),
            },
            // Exactness: an integral JSON number is not a real.
            (ArgType::Real, Value::Number(n)) => {
                if n.is_f64() {
                    Ok(ArgValue::Real(n.as_f64().unwrap_or_default()))
                } else {
                    Err(format!("'{}': expected real, got integer {n}", self.name))
                }
            }
            (ArgType::Boolean, Value::Bool(b)) => Ok(ArgValue::Boolean(*b)),
            (ArgType::Boolean, Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(ArgValue::Boolean(true)),
                "false" => Ok(ArgValue::Boolean(false)),
                _ => Err(format!(
                    "'{}': expected boolean, got non-coercible text {s:?}",
                    self.name
                )),
            },
            (expected, got) => Err(format!(
                "'{}': expected {expected}, got {}",
                self.name,
                json_type_name(got)
            )),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A validated scalar value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Real value.
    Real(f64),
    /// Boolean value.
    Boolean(bool),
}

impl ArgValue {
    /// The text payload, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ArgValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The integer payload, if this is an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ArgValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The real payload, if this is a real value.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            ArgValue::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// The boolean payload, if this is a boolean value.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            ArgValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert back to a JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            ArgValue::Text(s) => Value::String(s.clone()),
            ArgValue::Integer(i) => Value::from(*i),
            ArgValue::Real(r) => Value::from(*r),
            ArgValue::Boolean(b) => Value::Bool(*b),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Text(s) => f.write_str(s),
            ArgValue::Integer(i) => write!(f, "{i}"),
            ArgValue::Real(r) => write!(f, "{r}"),
            ArgValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// A validated, coerced bundle of named arguments.
///
/// Produced by [`validate_coerce`]; read by host callables through the typed
/// accessors. Absent optional fields are simply not present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Args {
    values: BTreeMap<String, ArgValue>,
}

impl Args {
    /// An empty bundle.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up a value by name.
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// Required text accessor.
    pub fn text(&self, name: &str) -> Result<&str, AxonError> {
        self.get(name)
            .and_then(ArgValue::as_text)
            .ok_or_else(|| missing(name, ArgType::Text))
    }

    /// Required integer accessor.
    pub fn integer(&self, name: &str) -> Result<i64, AxonError> {
        self.get(name)
            .and_then(ArgValue::as_integer)
            .ok_or_else(|| missing(name, ArgType::Integer))
    }

    /// Required real accessor.
    pub fn real(&self, name: &str) -> Result<f64, AxonError> {
        self.get(name)
            .and_then(ArgValue::as_real)
            .ok_or_else(|| missing(name, ArgType::Real))
    }

    /// Required boolean accessor.
    pub fn boolean(&self, name: &str) -> Result<bool, AxonError> {
        self.get(name)
            .and_then(ArgValue::as_boolean)
            .ok_or_else(|| missing(name, ArgType::Boolean))
    }

    /// Optional text accessor.
    pub fn opt_text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ArgValue::as_text)
    }

    /// Optional integer accessor.
    pub fn opt_integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ArgValue::as_integer)
    }

    /// Optional real accessor.
    pub fn opt_real(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ArgValue::as_real)
    }

    /// Optional boolean accessor.
    pub fn opt_boolean(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ArgValue::as_boolean)
    }

    /// Number of present fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no fields are present.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over present `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Render back to a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

fn missing(name: &str, expected: ArgType) -> AxonError {
    AxonError::message(format!("argument '{name}' absent or not {expected}"))
}

/// Validate a JSON input object against a schema, producing a typed bundle.
///
/// Rejects unknown keys and missing required keys; drops absent optional
/// keys (a JSON `null` for an optional field counts as absent); coerces
/// `"true"`/`"false"` text into booleans for boolean fields. All offending
/// fields are reported in one [`AxonError::ArgumentValidation`]. The
/// operation is idempotent: re-validating `Args::to_json()` of a valid
/// bundle yields an equal bundle.
pub fn validate_coerce(
    spec_name: &str,
    schema: &[ArgSpec],
    inputs: &Value,
) -> Result<Args, AxonError> {
    let object = match inputs {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => {
            return Err(AxonError::ArgumentValidation {
                spec: spec_name.into(),
                issues: vec![format!(
                    "inputs must be an object, got {}",
                    json_type_name(other)
                )],
            });
        }
    };

    let mut issues: Vec<String> = Vec::new();
    let mut values = BTreeMap::new();

    for key in object.keys() {
        if !schema.iter().any(|a| a.name == *key) {
            issues.push(format!("unknown argument '{key}'"));
        }
    }

    for arg in schema {
        match object.get(&arg.name) {
            None | Some(Value::Null) => {
                if !arg.optional {
                    issues.push(format!("missing required argument '{}'", arg.name));
                }
            }
            Some(value) => match arg.validate_value(value) {
                Ok(v) => {
                    values.insert(arg.name.clone(), v);
                }
                Err(issue) => issues.push(issue),
            },
        }
    }

    if issues.is_empty() {
        Ok(Args { values })
    } else {
        Err(AxonError::ArgumentValidation {
            spec: spec_name.into(),
            issues,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Vec<ArgSpec> {
        vec![
            ArgSpec::new("path", ArgType::Text, "file path"),
            ArgSpec::new("count", ArgType::Integer, "how many").optional(),
            ArgSpec::new("ratio", ArgType::Real, "scale factor").optional(),
            ArgSpec::new("strict", ArgType::Boolean, "strict mode").optional(),
        ]
    }

    #[test]
    fn accepts_valid_inputs() {
        let args = validate_coerce(
            "t",
            &schema(),
            &json!({"path": "/tmp/x", "count": 3, "ratio": 0.5, "strict": true}),
        )
        .unwrap();
        assert_eq!(args.text("path").unwrap(), "/tmp/x");
        assert_eq!(args.integer("count").unwrap(), 3);
        assert_eq!(args.real("ratio").unwrap(), 0.5);
        assert!(args.boolean("strict").unwrap());
    }

    #[test]
    fn rejects_unknown_argument() {
        let err = validate_coerce("t", &schema(), &json!({"path": "/x", "bogus": 1})).unwrap_err();
        assert!(err.to_string().contains("unknown argument 'bogus'"));
    }

    #[test]
    fn rejects_missing_required() {
        let err = validate_coerce("t", &schema(), &json!({})).unwrap_err();
        assert!(err.to_string().contains("missing required argument 'path'"));
    }

    #[test]
    fn drops_absent_optional() {
        let args = validate_coerce("t", &schema(), &json!({"path": "/x"})).unwrap();
        assert!(args.get("count").is_none());
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn null_counts_as_absent_for_optional() {
        let args = validate_coerce("t", &schema(), &json!({"path": "/x", "count": null})).unwrap();
        assert!(args.get("count").is_none());
    }

    #[test]
    fn null_rejected_for_required() {
        let err = validate_coerce("t", &schema(), &json!({"path": null})).unwrap_err();
        assert!(err.to_string().contains("missing required argument 'path'"));
    }

    #[test]
    fn coerces_boolean_strings() {
        for (text, expected) in [("true", true), ("FALSE", false), ("True", true)] {
            let args =
                validate_coerce("t", &schema(), &json!({"path": "/x", "strict": text})).unwrap();
            assert_eq!(args.boolean("strict").unwrap(), expected);
        }
    }

    #[test]
    fn rejects_non_coercible_boolean_string() {
        let err =
            validate_coerce("t", &schema(), &json!({"path": "/x", "strict": "yes"})).unwrap_err();
        assert!(err.to_string().contains("non-coercible"));
    }

    #[test]
    fn boolean_is_not_integer() {
        let err =
            validate_coerce("t", &schema(), &json!({"path": "/x", "count": true})).unwrap_err();
        assert!(err.to_string().contains("expected integer"));
    }

    #[test]
    fn integer_is_not_real() {
        let err = validate_coerce("t", &schema(), &json!({"path": "/x", "ratio": 2})).unwrap_err();
        assert!(err.to_string().contains("expected real"));
    }

    #[test]
    fn real_is_not_integer() {
        let err =
            validate_coerce("t", &schema(), &json!({"path": "/x", "count": 2.5})).unwrap_err();
        assert!(err.to_string().contains("expected integer"));
    }

    #[test]
    fn enum_membership_enforced() {
        let schema = vec![
            ArgSpec::new("mode", ArgType::Text, "mode").allowed(["fast", "slow"]),
        ];
        assert!(validate_coerce("t", &schema, &json!({"mode": "fast"})).is_ok());
        let err = validate_coerce("t", &schema, &json!({"mode": "warp"})).unwrap_err();
        assert!(err.to_string().contains("not in allowed set"));
        assert!(err.to_string().contains("fast"));
    }

    #[test]
    fn enum_only_for_text() {
        let bad = ArgSpec::new("n", ArgType::Integer, "n").allowed(["1"]);
        assert!(bad.check().is_err());
        let empty = ArgSpec::new("m", ArgType::Text, "m").allowed(Vec::<String>::new());
        assert!(empty.check().is_err());
    }

    #[test]
    fn all_issues_reported_together() {
        let err = validate_coerce(
            "t",
            &schema(),
            &json!({"bogus": 1, "count": "three"}),
        )
        .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("unknown argument 'bogus'"));
        assert!(text.contains("missing required argument 'path'"));
        assert!(text.contains("'count'"));
    }

    #[test]
    fn validation_is_idempotent() {
        let inputs = json!({"path": "/x", "count": 7, "strict": "true"});
        let once = validate_coerce("t", &schema(), &inputs).unwrap();
        let twice = validate_coerce("t", &schema(), &once.to_json()).unwrap();
        assert_eq!(once, twice);
    }
}
