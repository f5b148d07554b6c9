//! Schema Validator
//!
//! Checks a raw argument mapping against a capability's `ParameterSchema`,
//! coercing values where the declared type allows it (numeric strings to
//! integers, `"yes"` to `true`, ...).
//!
//! Validation never stops at the first problem. Every violated field is
//! reported in a single pass so one repair round can fix everything, and the
//! returned mapping always contains every input field (coerced where
//! possible, untouched otherwise).
//!
//! Field paths are dotted for nested objects (`user.name`) and bracket-indexed
//! for array elements (`numbers[1]`).

use std::collections::BTreeMap;
use std::fmt;
use std::num::IntErrorKind;

use serde::{Deserialize, Serialize};

use toolgate_core::schema::{ParameterSchema, PropertySchema, SchemaType};
use toolgate_core::value::{ArgMap, ArgValue};

// ============================================================================
// Error Types
// ============================================================================

/// Closed set of validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorCode {
    Required,
    TypeMismatch,
    CoercionFailed,
    EnumViolation,
    UnknownField,
    Overflow,
    UnknownType,
    ToolNotFound,
}

impl ValidationErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::TypeMismatch => "type_mismatch",
            Self::CoercionFailed => "coercion_failed",
            Self::EnumViolation => "enum_violation",
            Self::UnknownField => "unknown_field",
            Self::Overflow => "overflow",
            Self::UnknownType => "unknown_type",
            Self::ToolNotFound => "tool_not_found",
        }
    }
}

impl fmt::Display for ValidationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field-level violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Path of the offending field; empty for call-level errors
    pub field: String,
    pub message: String,
    pub code: ValidationErrorCode,
    /// The raw offending value, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ArgValue>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, code: ValidationErrorCode, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
            value: None,
        }
    }

    pub fn with_value(mut self, value: ArgValue) -> Self {
        self.value = Some(value);
        self
    }

    /// Render the error as guidance for the calling model.
    pub fn to_llm_message(&self) -> String {
        let mut out = String::new();
        if !self.field.is_empty() {
            out.push_str(&format!("Field '{}': ", self.field));
        }
        out.push_str(&self.message);
        if let Some(value) = &self.value {
            out.push_str(&format!(" Got value: {}", value));
        }
        out
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Every violation found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn has_code(&self, code: ValidationErrorCode) -> bool {
        self.0.iter().any(|e| e.code == code)
    }

    /// Paths of all offending fields, in report order.
    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.field.as_str()).collect()
    }

    /// One line per error, for inclusion in a model prompt.
    pub fn to_llm_message(&self) -> String {
        self.0
            .iter()
            .map(ValidationError::to_llm_message)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

impl std::error::Error for ValidationErrors {}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }
}

impl FromIterator<ValidationError> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = ValidationError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::ops::Index<usize> for ValidationErrors {
    type Output = ValidationError;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

// ============================================================================
// Validator
// ============================================================================

/// Validator behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Convert values into the declared type when a lossless reading exists
    #[serde(default = "default_coerce_types")]
    pub coerce_types: bool,
    /// Report fields absent from the schema as `unknown_field`
    #[serde(default)]
    pub reject_unknown_fields: bool,
}

fn default_coerce_types() -> bool {
    true
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            coerce_types: default_coerce_types(),
            reject_unknown_fields: false,
        }
    }
}

/// Output of a validation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    /// Coerced/validated arguments; always contains every input field
    pub arguments: ArgMap,
    pub errors: ValidationErrors,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Recursive schema checker and coercer.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn with_coerce_types(mut self, coerce: bool) -> Self {
        self.config.coerce_types = coerce;
        self
    }

    pub fn with_reject_unknown_fields(mut self, reject: bool) -> Self {
        self.config.reject_unknown_fields = reject;
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate `params` against a top-level schema.
    pub fn validate(&self, schema: &ParameterSchema, params: &ArgMap) -> ValidationOutcome {
        let mut errors = ValidationErrors::new();
        let arguments = self.validate_fields(
            None,
            &schema.properties,
            &schema.required,
            params,
            &mut errors,
        );
        ValidationOutcome { arguments, errors }
    }

    /// Validate a single value against a property schema, rooted at `path`.
    pub fn validate_value(
        &self,
        path: &str,
        value: &ArgValue,
        schema: &PropertySchema,
    ) -> (ArgValue, ValidationErrors) {
        let mut errors = ValidationErrors::new();
        let validated = self.validate_property(path, value, schema, &mut errors);
        (validated, errors)
    }

    fn validate_fields(
        &self,
        prefix: Option<&str>,
        properties: &BTreeMap<String, PropertySchema>,
        required: &[String],
        input: &ArgMap,
        errors: &mut ValidationErrors,
    ) -> ArgMap {
        let field_path = |name: &str| match prefix {
            Some(p) => format!("{}.{}", p, name),
            None => name.to_string(),
        };

        for name in required {
            if !input.contains_key(name) {
                errors.push(ValidationError::new(
                    field_path(name),
                    ValidationErrorCode::Required,
                    "required field is missing",
                ));
            }
        }

        let mut result = ArgMap::new();
        for (key, value) in input {
            let path = field_path(key);
            let validated = match properties.get(key) {
                Some(prop) => self.validate_property(&path, value, prop, errors),
                None => {
                    if self.config.reject_unknown_fields {
                        errors.push(
                            ValidationError::new(
                                path,
                                ValidationErrorCode::UnknownField,
                                "unknown field not allowed by schema",
                            )
                            .with_value(value.clone()),
                        );
                    }
                    value.clone()
                }
            };
            result.insert(key.clone(), validated);
        }
        result
    }

    fn validate_property(
        &self,
        path: &str,
        value: &ArgValue,
        schema: &PropertySchema,
        errors: &mut ValidationErrors,
    ) -> ArgValue {
        match schema.kind() {
            Some(SchemaType::String) => self.validate_string(path, value, schema, errors),
            Some(SchemaType::Integer) => self.validate_integer(path, value, schema, errors),
            Some(SchemaType::Number) => self.validate_number(path, value, schema, errors),
            Some(SchemaType::Boolean) => self.validate_boolean(path, value, errors),
            Some(SchemaType::Array) => self.validate_array(path, value, schema, errors),
            Some(SchemaType::Object) => self.validate_object(path, value, schema, errors),
            None => {
                if !schema.schema_type.is_empty() {
                    errors.push(
                        ValidationError::new(
                            path,
                            ValidationErrorCode::UnknownType,
                            format!("unknown type '{}'", schema.schema_type),
                        )
                        .with_value(value.clone()),
                    );
                }
                value.clone()
            }
        }
    }

    fn validate_string(
        &self,
        path: &str,
        value: &ArgValue,
        schema: &PropertySchema,
        errors: &mut ValidationErrors,
    ) -> ArgValue {
        let s = match value {
            ArgValue::String(s) => s.clone(),
            // null has no meaningful string form, even when coercing
            ArgValue::Null => {
                errors.push(type_mismatch(path, "expected string, got null", value));
                return value.clone();
            }
            other if self.config.coerce_types => other.to_string(),
            other => {
                errors.push(type_mismatch(
                    path,
                    format!("expected string, got {}", other.type_name()),
                    value,
                ));
                return value.clone();
            }
        };

        let validated = ArgValue::String(s.clone());
        check_enum(path, &s, &validated, schema, errors);
        validated
    }

    fn validate_integer(
        &self,
        path: &str,
        value: &ArgValue,
        schema: &PropertySchema,
        errors: &mut ValidationErrors,
    ) -> ArgValue {
        let result: i64 = match value {
            ArgValue::Integer(i) => *i,
            ArgValue::Unsigned(_) => {
                errors.push(overflow(path, value));
                return value.clone();
            }
            ArgValue::Float(f) => {
                if !(self.config.coerce_types && is_whole_number(*f)) {
                    errors.push(type_mismatch(
                        path,
                        format!("expected integer, got float {}", f),
                        value,
                    ));
                    return value.clone();
                }
                // 2^63 is exactly representable; anything at or above it overflows
                if *f < i64::MIN as f64 || *f >= i64::MAX as f64 {
                    errors.push(overflow(path, value));
                    return value.clone();
                }
                *f as i64
            }
            ArgValue::String(s) => {
                if !self.config.coerce_types {
                    errors.push(type_mismatch(
                        path,
                        format!("expected integer, got string '{}'", s),
                        value,
                    ));
                    return value.clone();
                }
                match s.parse::<i64>() {
                    Ok(parsed) => parsed,
                    Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
                        errors.push(overflow(path, value));
                        return value.clone();
                    }
                    Err(_) => {
                        errors.push(
                            ValidationError::new(
                                path,
                                ValidationErrorCode::CoercionFailed,
                                format!("cannot coerce string '{}' to integer", s),
                            )
                            .with_value(value.clone()),
                        );
                        return value.clone();
                    }
                }
            }
            ArgValue::Bool(_) => {
                errors.push(type_mismatch(path, "cannot convert boolean to integer", value));
                return value.clone();
            }
            other => {
                errors.push(type_mismatch(
                    path,
                    format!("expected integer, got {}", other.type_name()),
                    value,
                ));
                return value.clone();
            }
        };

        let validated = ArgValue::Integer(result);
        check_enum(path, &result.to_string(), &validated, schema, errors);
        validated
    }

    fn validate_number(
        &self,
        path: &str,
        value: &ArgValue,
        schema: &PropertySchema,
        errors: &mut ValidationErrors,
    ) -> ArgValue {
        let result: f64 = match value {
            ArgValue::Integer(i) => *i as f64,
            ArgValue::Unsigned(u) => *u as f64,
            ArgValue::Float(f) => *f,
            ArgValue::String(s) => {
                if !self.config.coerce_types {
                    errors.push(type_mismatch(
                        path,
                        format!("expected number, got string '{}'", s),
                        value,
                    ));
                    return value.clone();
                }
                match s.parse::<f64>() {
                    Ok(parsed) => parsed,
                    Err(_) => {
                        errors.push(
                            ValidationError::new(
                                path,
                                ValidationErrorCode::CoercionFailed,
                                format!("cannot coerce string '{}' to number", s),
                            )
                            .with_value(value.clone()),
                        );
                        return value.clone();
                    }
                }
            }
            ArgValue::Bool(_) => {
                errors.push(type_mismatch(path, "cannot convert boolean to number", value));
                return value.clone();
            }
            other => {
                errors.push(type_mismatch(
                    path,
                    format!("expected number, got {}", other.type_name()),
                    value,
                ));
                return value.clone();
            }
        };

        let validated = ArgValue::Float(result);
        check_enum(path, &result.to_string(), &validated, schema, errors);
        validated
    }

    fn validate_boolean(&self, path: &str, value: &ArgValue, errors: &mut ValidationErrors) -> ArgValue {
        let coerce = self.config.coerce_types;
        match value {
            ArgValue::Bool(b) => ArgValue::Bool(*b),
            ArgValue::String(s) if coerce => match parse_bool(s) {
                Some(b) => ArgValue::Bool(b),
                None => {
                    errors.push(
                        ValidationError::new(
                            path,
                            ValidationErrorCode::CoercionFailed,
                            format!("cannot coerce string '{}' to boolean", s),
                        )
                        .with_value(value.clone()),
                    );
                    value.clone()
                }
            },
            ArgValue::Integer(i) if coerce => ArgValue::Bool(*i != 0),
            ArgValue::Unsigned(u) if coerce => ArgValue::Bool(*u != 0),
            ArgValue::Float(f) if coerce => ArgValue::Bool(*f != 0.0),
            ArgValue::String(s) => {
                errors.push(type_mismatch(
                    path,
                    format!("expected boolean, got string '{}'", s),
                    value,
                ));
                value.clone()
            }
            ArgValue::Integer(_) | ArgValue::Unsigned(_) => {
                errors.push(type_mismatch(
                    path,
                    format!("expected boolean, got integer '{}'", value),
                    value,
                ));
                value.clone()
            }
            ArgValue::Float(_) => {
                errors.push(type_mismatch(
                    path,
                    format!("expected boolean, got number '{}'", value),
                    value,
                ));
                value.clone()
            }
            other => {
                errors.push(type_mismatch(
                    path,
                    format!("expected boolean, got {}", other.type_name()),
                    value,
                ));
                value.clone()
            }
        }
    }

    fn validate_array(
        &self,
        path: &str,
        value: &ArgValue,
        schema: &PropertySchema,
        errors: &mut ValidationErrors,
    ) -> ArgValue {
        let items = match value {
            ArgValue::Array(items) => items,
            other => {
                errors.push(type_mismatch(
                    path,
                    format!("expected array, got {}", other.type_name()),
                    value,
                ));
                return value.clone();
            }
        };

        match schema.items.as_deref() {
            None => ArgValue::Array(items.clone()),
            Some(item_schema) => ArgValue::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        self.validate_property(&format!("{}[{}]", path, i), item, item_schema, errors)
                    })
                    .collect(),
            ),
        }
    }

    fn validate_object(
        &self,
        path: &str,
        value: &ArgValue,
        schema: &PropertySchema,
        errors: &mut ValidationErrors,
    ) -> ArgValue {
        let obj = match value {
            ArgValue::Object(obj) => obj,
            other => {
                errors.push(type_mismatch(
                    path,
                    format!("expected object, got {}", other.type_name()),
                    value,
                ));
                return value.clone();
            }
        };

        if schema.properties.is_empty() {
            return ArgValue::Object(obj.clone());
        }

        ArgValue::Object(self.validate_fields(
            Some(path),
            &schema.properties,
            &schema.required,
            obj,
            errors,
        ))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn type_mismatch(path: &str, message: impl Into<String>, value: &ArgValue) -> ValidationError {
    ValidationError::new(path, ValidationErrorCode::TypeMismatch, message).with_value(value.clone())
}

fn overflow(path: &str, value: &ArgValue) -> ValidationError {
    ValidationError::new(
        path,
        ValidationErrorCode::Overflow,
        "integer value exceeds the signed 64-bit range",
    )
    .with_value(value.clone())
}

/// Push an `enum_violation` when the schema declares allowed values and
/// `repr` is not one of them.
fn check_enum(
    path: &str,
    repr: &str,
    value: &ArgValue,
    schema: &PropertySchema,
    errors: &mut ValidationErrors,
) {
    if schema.enum_values.is_empty() || schema.enum_values.iter().any(|e| e == repr) {
        return;
    }
    errors.push(
        ValidationError::new(
            path,
            ValidationErrorCode::EnumViolation,
            format!("value must be one of: {}", schema.enum_values.join(", ")),
        )
        .with_value(value.clone()),
    );
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn is_whole_number(f: f64) -> bool {
    f.is_finite() && f.trunc() == f
}
