use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as Json;

use super::value::{Value, ValueKind};
use crate::db::{GraphTx, NodeId, Properties};
use crate::error::{CatalogError, Result};

/// Configuration of a new attribute type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeDefinition {
    /// Display unit, e.g. `kg` or `EUR`.
    pub unit: Option<String>,
    pub kind: ValueKind,
    /// Inclusive lower bound for numeric kinds.
    pub min: Option<f64>,
    /// Inclusive upper bound for numeric kinds.
    pub max: Option<f64>,
    /// Maximum number of characters for text.
    pub max_length: Option<usize>,
}

impl TypeDefinition {
    const OPTIONS: &'static [&'static str] = &["unit", "kind", "min", "max", "max_length"];

    /// An unconstrained text type.
    pub fn new(unit: Option<&str>) -> Self {
        Self {
            unit: unit.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Build a definition from textual options. Unknown keys or unparsable
    /// values are rejected with `UnsupportedConfiguration`.
    pub fn from_options(options: &BTreeMap<String, String>) -> Result<Self> {
        reject_unknown(options, Self::OPTIONS, "attribute type")?;

        let kind = match options.get("kind") {
            Some(raw) => ValueKind::from_str(raw).ok_or_else(|| {
                CatalogError::UnsupportedConfiguration(format!("unknown kind {raw:?}"))
            })?,
            None => ValueKind::default(),
        };
        let definition = Self {
            unit: options.get("unit").cloned(),
            kind,
            min: parse_option(options, "min")?,
            max: parse_option(options, "max")?,
            max_length: parse_option(options, "max_length")?,
        };
        Ok(definition)
    }

    pub(crate) fn to_properties(&self, name: &str) -> Properties {
        let mut props = Properties::new();
        props.insert("name".into(), Json::from(name));
        props.insert("kind".into(), Json::from(self.kind.as_str()));
        if let Some(unit) = &self.unit {
            props.insert("unit".into(), Json::from(unit.as_str()));
        }
        if let Some(min) = self.min {
            props.insert("min".into(), Json::from(min));
        }
        if let Some(max) = self.max {
            props.insert("max".into(), Json::from(max));
        }
        if let Some(max_length) = self.max_length {
            props.insert("max_length".into(), Json::from(max_length));
        }
        props
    }

    pub(crate) fn from_properties(props: &Properties) -> Result<Self> {
        let kind = match props.get("kind").and_then(Json::as_str) {
            Some(kind) => ValueKind::from_str(kind)
                .ok_or_else(|| CatalogError::Integrity(format!("unknown stored kind {kind:?}")))?,
            None => ValueKind::Text,
        };
        Ok(Self {
            unit: props.get("unit").and_then(Json::as_str).map(str::to_string),
            kind,
            min: props.get("min").and_then(Json::as_f64),
            max: props.get("max").and_then(Json::as_f64),
            max_length: props
                .get("max_length")
                .and_then(Json::as_u64)
                .map(|n| n as usize),
        })
    }
}

fn reject_unknown(
    options: &BTreeMap<String, String>,
    allowed: &[&str],
    what: &str,
) -> Result<()> {
    let unknown: Vec<&str> = options
        .keys()
        .map(String::as_str)
        .filter(|key| !allowed.contains(key))
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(CatalogError::UnsupportedConfiguration(format!(
            "unknown {what} option(s): {}",
            unknown.join(", ")
        )))
    }
}

fn parse_option<T: std::str::FromStr>(
    options: &BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>> {
    options
        .get(key)
        .map(|raw| {
            raw.trim().parse().map_err(|_| {
                CatalogError::UnsupportedConfiguration(format!(
                    "invalid value {raw:?} for option {key}"
                ))
            })
        })
        .transpose()
}

/// A named, reusable value type shared by attribute descriptors.
///
/// One instance exists per persisted type node; see
/// [`AttributeTypes`](crate::catalog::AttributeTypes).
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeType {
    id: NodeId,
    name: String,
    definition: TypeDefinition,
}

impl AttributeType {
    pub(crate) fn new(id: NodeId, name: String, definition: TypeDefinition) -> Self {
        Self {
            id,
            name,
            definition,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> Option<&str> {
        self.definition.unit.as_deref()
    }

    pub fn kind(&self) -> ValueKind {
        self.definition.kind
    }

    pub fn definition(&self) -> &TypeDefinition {
        &self.definition
    }

    pub fn to_storage(&self, value: &Value) -> Result<Json> {
        self.definition.kind.to_storage(value)
    }

    pub fn from_storage(&self, raw: &Json) -> Result<Value> {
        self.definition.kind.from_storage(raw)
    }

    /// Check a raw stored value against this type's domain constraints.
    pub fn check(&self, raw: &Json) -> Result<()> {
        let value = self.from_storage(raw)?;
        let def = &self.definition;

        if let Some(n) = value.as_f64() {
            if let Some(min) = def.min.filter(|min| n < *min) {
                return Err(CatalogError::Validation(format!(
                    "{}: {n} is below the minimum {min}",
                    self.name
                )));
            }
            if let Some(max) = def.max.filter(|max| n > *max) {
                return Err(CatalogError::Validation(format!(
                    "{}: {n} is above the maximum {max}",
                    self.name
                )));
            }
        }

        if let (Value::Text(s), Some(max_length)) = (&value, def.max_length) {
            if s.chars().count() > max_length {
                return Err(CatalogError::Validation(format!(
                    "{}: text is longer than {max_length} characters",
                    self.name
                )));
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.unit() {
            Some(unit) => write!(f, "{} ({}, {unit})", self.name, self.kind().as_str()),
            None => write!(f, "{} ({})", self.name, self.kind().as_str()),
        }
    }
}

/// Binds an attribute type to a key within one category.
///
/// Descriptors read and write the product node's property under `key`,
/// converting through the attribute type.
#[derive(Debug, Clone)]
pub struct AttributeDescriptor {
    key: String,
    attr_type: Arc<AttributeType>,
    default: Option<Value>,
    required: bool,
}

impl AttributeDescriptor {
    const OPTIONS: &'static [&'static str] = &["default", "required"];

    pub fn new(key: impl Into<String>, attr_type: Arc<AttributeType>) -> Self {
        Self {
            key: key.into(),
            attr_type,
            default: None,
            required: false,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Build a descriptor from textual options (`default`, `required`).
    pub fn from_options(
        key: impl Into<String>,
        attr_type: Arc<AttributeType>,
        options: &BTreeMap<String, String>,
    ) -> Result<Self> {
        reject_unknown(options, Self::OPTIONS, "attribute")?;

        let mut descriptor = Self::new(key, attr_type);
        if let Some(raw) = options.get("default") {
            let default = descriptor.attr_type.kind().parse(raw).map_err(|_| {
                CatalogError::UnsupportedConfiguration(format!(
                    "default {raw:?} is not a valid {}",
                    descriptor.attr_type.kind().as_str()
                ))
            })?;
            descriptor.default = Some(default);
        }
        if let Some(required) = parse_option(options, "required")? {
            descriptor.required = required;
        }
        Ok(descriptor)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn attr_type(&self) -> &Arc<AttributeType> {
        &self.attr_type
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Edge properties declaring this descriptor on its category.
    pub(crate) fn to_edge_properties(&self) -> Result<Properties> {
        let mut props = Properties::new();
        props.insert("key".into(), Json::from(self.key.as_str()));
        props.insert("required".into(), Json::Bool(self.required));
        if let Some(default) = &self.default {
            props.insert("default".into(), self.attr_type.to_storage(default)?);
        }
        Ok(props)
    }

    /// Rebuild a descriptor from its declaring edge's properties.
    pub(crate) fn from_edge_properties(
        props: &Properties,
        attr_type: Arc<AttributeType>,
    ) -> Result<Self> {
        let key = props
            .get("key")
            .and_then(Json::as_str)
            .ok_or_else(|| CatalogError::Integrity("attribute edge without a key".into()))?;
        let default = props
            .get("default")
            .map(|raw| attr_type.from_storage(raw))
            .transpose()?;
        let required = props.get("required").and_then(Json::as_bool).unwrap_or(false);
        Ok(Self {
            key: key.to_string(),
            attr_type,
            default,
            required,
        })
    }

    /// The product's value, or the default when nothing is stored.
    pub fn get(&self, tx: &GraphTx<'_>, product: NodeId) -> Result<Option<Value>> {
        match tx.property(product, &self.key)? {
            Some(raw) => self.attr_type.from_storage(&raw).map(Some),
            None => Ok(self.default.clone()),
        }
    }

    pub fn set(&self, tx: &GraphTx<'_>, product: NodeId, value: &Value) -> Result<()> {
        let raw = self.attr_type.to_storage(value)?;
        tx.set_property(product, &self.key, &raw)
    }

    pub fn delete(&self, tx: &GraphTx<'_>, product: NodeId) -> Result<()> {
        tx.remove_property(product, &self.key)?;
        Ok(())
    }

    /// Fail unless a required attribute has a stored value that satisfies
    /// the type's constraints. Defaults do not satisfy a required attribute;
    /// optional attributes are not checked.
    pub fn verify(&self, tx: &GraphTx<'_>, product: NodeId) -> Result<()> {
        if !self.required {
            return Ok(());
        }
        let raw = tx.property(product, &self.key)?.ok_or_else(|| {
            CatalogError::Validation(format!("required attribute '{}' is missing", self.key))
        })?;
        self.attr_type.check(&raw).map_err(|e| match e {
            CatalogError::Validation(msg) => {
                CatalogError::Validation(format!("attribute '{}': {msg}", self.key))
            }
            other => other,
        })
    }
}
