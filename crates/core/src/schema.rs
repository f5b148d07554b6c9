//! Parameter Schema Model
//!
//! The declared argument contract of a capability. Shapes are a pragmatic
//! JSON-Schema subset: a top-level object with typed properties, required
//! names, enum constraints and recursive array/object nesting.
//!
//! Types are stored as the raw declared string so that a capability declaring
//! a type outside the supported set is still representable; the validator
//! reports it as `unknown_type` rather than the schema failing to load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The closed set of property types the validator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl SchemaType {
    /// Parse a declared type string. Returns `None` for unsupported types.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// Top-level schema of a capability's arguments.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
}

impl ParameterSchema {
    /// Create an object schema with the given properties and required names.
    pub fn object(properties: BTreeMap<String, PropertySchema>, required: Vec<String>) -> Self {
        Self {
            schema_type: "object".to_string(),
            properties,
            required,
            items: None,
        }
    }

    /// An object schema that declares no properties.
    pub fn empty() -> Self {
        Self::object(BTreeMap::new(), Vec::new())
    }

    /// Add a property (builder style).
    pub fn with_property(mut self, name: impl Into<String>, schema: PropertySchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Add a property and mark it required (builder style).
    pub fn with_required(mut self, name: impl Into<String>, schema: PropertySchema) -> Self {
        let name = name.into();
        if !self.required.contains(&name) {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
        self
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

/// Schema of a single property (recursive for arrays and objects).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type", default)]
    pub schema_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
}

impl PropertySchema {
    fn typed(schema_type: &str, description: &str) -> Self {
        Self {
            schema_type: schema_type.to_string(),
            description: description.to_string(),
            ..Self::default()
        }
    }

    /// Create a string schema
    pub fn string(description: &str) -> Self {
        Self::typed("string", description)
    }

    /// Create an integer schema
    pub fn integer(description: &str) -> Self {
        Self::typed("integer", description)
    }

    /// Create a number schema
    pub fn number(description: &str) -> Self {
        Self::typed("number", description)
    }

    /// Create a boolean schema
    pub fn boolean(description: &str) -> Self {
        Self::typed("boolean", description)
    }

    /// Create an array schema with an optional item schema
    pub fn array(description: &str, items: Option<PropertySchema>) -> Self {
        Self {
            items: items.map(Box::new),
            ..Self::typed("array", description)
        }
    }

    /// Create an object schema
    pub fn object(
        description: &str,
        properties: BTreeMap<String, PropertySchema>,
        required: Vec<String>,
    ) -> Self {
        Self {
            properties,
            required,
            ..Self::typed("object", description)
        }
    }

    /// Create a schema with an arbitrary declared type string.
    pub fn of_type(schema_type: &str) -> Self {
        Self::typed(schema_type, "")
    }

    /// Restrict the allowed values (compared by string form).
    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// The parsed declared type, or `None` when empty or unsupported.
    pub fn kind(&self) -> Option<SchemaType> {
        SchemaType::parse(&self.schema_type)
    }

    /// Human-readable type label, e.g. `array of integer`.
    pub fn type_label(&self) -> String {
        match (&self.items, self.kind()) {
            (Some(items), Some(SchemaType::Array)) if !items.schema_type.is_empty() => {
                format!("array of {}", items.schema_type)
            }
            _ if self.schema_type.is_empty() => "any".to_string(),
            _ => self.schema_type.clone(),
        }
    }
}
