//! Parameter validation against per-kind schemas.
//!
//! Schemas are supplied by the embedding application; a kind without a
//! registered schema is accepted as-is.

use std::collections::HashMap;

use serde_json::Value;
use txwatch_core::TxKind;

/// One violated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    NonEmptyString,
    /// Even-length hexadecimal string (hashes, policy ids, CBOR).
    Hex,
    Integer,
    Number,
    Bool,
    Array,
    NonEmptyArray,
    Object,
}

impl FieldType {
    fn check(self, value: &Value) -> Result<(), &'static str> {
        let ok = match self {
            Self::String => value.is_string(),
            Self::NonEmptyString => value.as_str().is_some_and(|s| !s.trim().is_empty()),
            Self::Hex => value
                .as_str()
                .is_some_and(|s| !s.is_empty() && s.len() % 2 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit())),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::NonEmptyArray => value.as_array().is_some_and(|a| !a.is_empty()),
            Self::Object => value.is_object(),
        };
        if ok {
            Ok(())
        } else {
            Err(self.expectation())
        }
    }

    fn expectation(self) -> &'static str {
        match self {
            Self::String => "must be a string",
            Self::NonEmptyString => "must be a non-empty string",
            Self::Hex => "must be a hex string",
            Self::Integer => "must be an integer",
            Self::Number => "must be a number",
            Self::Bool => "must be a boolean",
            Self::Array => "must be an array",
            Self::NonEmptyArray => "must be a non-empty array",
            Self::Object => "must be an object",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
}

/// Expected shape of a kind's build parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSchema {
    rules: Vec<FieldRule>,
}

impl ParamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.rules.push(FieldRule { name: name.into(), ty, required: true });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.rules.push(FieldRule { name: name.into(), ty, required: false });
        self
    }

    /// Check `params`, collecting one violation per offending field.
    pub fn validate(&self, params: &Value) -> Result<(), Vec<FieldViolation>> {
        let Some(obj) = params.as_object() else {
            return Err(vec![FieldViolation::new("params", "must be a JSON object")]);
        };

        let violations: Vec<FieldViolation> = self
            .rules
            .iter()
            .filter_map(|rule| match obj.get(&rule.name) {
                None | Some(Value::Null) if rule.required => {
                    Some(FieldViolation::new(&rule.name, "is required"))
                }
                None | Some(Value::Null) => None,
                Some(value) => rule
                    .ty
                    .check(value)
                    .err()
                    .map(|msg| FieldViolation::new(&rule.name, msg)),
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// Schemas keyed by transaction kind.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<TxKind, ParamSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: TxKind, schema: ParamSchema) -> &mut Self {
        self.schemas.insert(kind, schema);
        self
    }

    pub fn get(&self, kind: TxKind) -> Option<&ParamSchema> {
        self.schemas.get(&kind)
    }

    pub fn validate(&self, kind: TxKind, params: &Value) -> Result<(), Vec<FieldViolation>> {
        match self.schemas.get(&kind) {
            Some(schema) => schema.validate(params),
            None => {
                tracing::debug!(kind = %kind, "no parameter schema registered");
                Ok(())
            }
        }
    }
}
