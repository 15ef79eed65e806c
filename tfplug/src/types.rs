//! Core value types for tfplug
//!
//! Terraform sends configuration, plan and state as msgpack-encoded cty
//! values. `Dynamic` is the in-memory form of such a value and `DynamicValue`
//! wraps it with path-based accessors and the wire codecs.

use crate::error::{Result, TfplugError};
use serde::de::{self, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// msgpack extension name rmp-serde maps onto ext markers
const MSGPACK_EXT_STRUCT_NAME: &str = "_ExtStruct";

/// Extension type cty uses for unknown values
const UNKNOWN_EXT_TYPE: i8 = 0;

/// Dynamic represents Terraform values that can be of any type
/// Objects and maps are both represented as `Map`
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    Null,
    Bool(bool),
    /// All numbers are f64 to match Terraform
    Number(f64),
    String(String),
    List(Vec<Dynamic>),
    Map(HashMap<String, Dynamic>),
    /// Value not yet known (during planning)
    Unknown,
}

impl Dynamic {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Dynamic::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Dynamic::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Dynamic>> {
        match self {
            Dynamic::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Dynamic>> {
        match self {
            Dynamic::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Dynamic::Unknown)
    }

    /// True when neither this value nor anything nested in it is unknown
    pub fn is_fully_known(&self) -> bool {
        match self {
            Dynamic::Unknown => false,
            Dynamic::List(items) => items.iter().all(Dynamic::is_fully_known),
            Dynamic::Map(fields) => fields.values().all(Dynamic::is_fully_known),
            _ => true,
        }
    }

    /// Replaces every nested unknown with null
    pub fn null_unknowns(self) -> Dynamic {
        match self {
            Dynamic::Unknown => Dynamic::Null,
            Dynamic::List(items) => {
                Dynamic::List(items.into_iter().map(Dynamic::null_unknowns).collect())
            }
            Dynamic::Map(fields) => Dynamic::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, v.null_unknowns()))
                    .collect(),
            ),
            other => other,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "map",
            Dynamic::Unknown => "unknown",
        }
    }

    /// Builds a list of strings
    pub fn string_list<I, S>(items: I) -> Dynamic
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Dynamic::List(
            items
                .into_iter()
                .map(|s| Dynamic::String(s.into()))
                .collect(),
        )
    }

    /// Builds a map of strings
    pub fn string_map<I, K, V>(items: I) -> Dynamic
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Dynamic::Map(
            items
                .into_iter()
                .map(|(k, v)| (k.into(), Dynamic::String(v.into())))
                .collect(),
        )
    }
}

impl From<&str> for Dynamic {
    fn from(value: &str) -> Self {
        Dynamic::String(value.to_string())
    }
}

impl From<String> for Dynamic {
    fn from(value: String) -> Self {
        Dynamic::String(value)
    }
}

impl From<f64> for Dynamic {
    fn from(value: f64) -> Self {
        Dynamic::Number(value)
    }
}

impl From<i64> for Dynamic {
    fn from(value: i64) -> Self {
        Dynamic::Number(value as f64)
    }
}

impl From<bool> for Dynamic {
    fn from(value: bool) -> Self {
        Dynamic::Bool(value)
    }
}

impl<T: Into<Dynamic>> From<Option<T>> for Dynamic {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Dynamic::Null)
    }
}

/// Payload of the msgpack extension, written as raw bytes
struct ExtPayload<'a>(&'a [u8]);

impl Serialize for ExtPayload<'_> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(self.0)
    }
}

impl Serialize for Dynamic {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Dynamic::Null => serializer.serialize_unit(),
            Dynamic::Bool(b) => serializer.serialize_bool(*b),
            Dynamic::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Dynamic::String(s) => serializer.serialize_str(s),
            Dynamic::List(l) => l.serialize(serializer),
            Dynamic::Map(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Dynamic::Unknown => serializer.serialize_newtype_struct(
                MSGPACK_EXT_STRUCT_NAME,
                &(UNKNOWN_EXT_TYPE, ExtPayload(&[0])),
            ),
        }
    }
}

impl<'de> Deserialize<'de> for Dynamic {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct DynamicVisitor;

        impl<'de> Visitor<'de> for DynamicVisitor {
            type Value = Dynamic;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a Terraform value")
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_none<E: de::Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_some<D>(self, deserializer: D) -> std::result::Result<Dynamic, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                Dynamic::deserialize(deserializer)
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Bool(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::String(value.to_string()))
            }

            fn visit_string<E: de::Error>(self, value: String) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::String(value))
            }

            // cty encodes large numbers as decimal strings inside bin payloads
            fn visit_bytes<E: de::Error>(self, value: &[u8]) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::String(String::from_utf8_lossy(value).into_owned()))
            }

            // rmp-serde surfaces msgpack extensions as a newtype struct
            fn visit_newtype_struct<D>(
                self,
                deserializer: D,
            ) -> std::result::Result<Dynamic, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                de::IgnoredAny::deserialize(deserializer)?;
                Ok(Dynamic::Unknown)
            }

            fn visit_seq<V>(self, mut seq: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::SeqAccess<'de>,
            {
                let mut vec = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(elem) = seq.next_element()? {
                    vec.push(elem);
                }
                Ok(Dynamic::List(vec))
            }

            fn visit_map<V>(self, mut map: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::MapAccess<'de>,
            {
                let mut fields = HashMap::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry()? {
                    fields.insert(key, value);
                }
                Ok(Dynamic::Map(fields))
            }
        }

        deserializer.deserialize_any(DynamicVisitor)
    }
}

/// DynamicValue wraps Dynamic and provides encoding/decoding capabilities
/// This is what gets passed between Terraform and the provider
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    pub value: Dynamic,
}

impl DynamicValue {
    pub fn new(value: Dynamic) -> Self {
        Self { value }
    }

    /// Empty object, the usual starting point for building state
    pub fn object() -> Self {
        Self {
            value: Dynamic::Map(HashMap::new()),
        }
    }

    pub fn null() -> Self {
        Self {
            value: Dynamic::Null,
        }
    }

    pub fn unknown() -> Self {
        Self {
            value: Dynamic::Unknown,
        }
    }

    /// Null encodes as the msgpack nil byte, never as an empty buffer
    pub fn encode_msgpack(&self) -> Result<Vec<u8>> {
        rmp_serde::encode::to_vec(&self.value)
            .map_err(|e| TfplugError::EncodingError(format!("msgpack encoding failed: {}", e)))
    }

    pub fn decode_msgpack(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::null());
        }

        let value = rmp_serde::decode::from_slice::<Dynamic>(data)
            .map_err(|e| TfplugError::DecodingError(format!("msgpack decoding failed: {}", e)))?;
        Ok(Self { value })
    }

    pub fn encode_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.value)
            .map_err(|e| TfplugError::EncodingError(format!("json encoding failed: {}", e)))
    }

    pub fn decode_json(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::null());
        }

        let value = serde_json::from_slice(data)
            .map_err(|e| TfplugError::DecodingError(format!("json decoding failed: {}", e)))?;
        Ok(Self { value })
    }

    /// Raw value at `path`, including null and unknown
    pub fn get(&self, path: &AttributePath) -> Result<&Dynamic> {
        self.navigate_path(path)
    }

    /// Value at `path`, or null when any step is missing
    pub fn get_or_null(&self, path: &AttributePath) -> Dynamic {
        self.navigate_path(path).cloned().unwrap_or(Dynamic::Null)
    }

    /// Type-safe accessors; these fail on null, unknown or a missing attribute
    pub fn get_string(&self, path: &AttributePath) -> Result<String> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::String(s) => Ok(s.clone()),
            _ => Err(mismatch("string", value)),
        }
    }

    pub fn get_number(&self, path: &AttributePath) -> Result<f64> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::Number(n) => Ok(*n),
            _ => Err(mismatch("number", value)),
        }
    }

    pub fn get_bool(&self, path: &AttributePath) -> Result<bool> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::Bool(b) => Ok(*b),
            _ => Err(mismatch("bool", value)),
        }
    }

    pub fn get_list(&self, path: &AttributePath) -> Result<Vec<Dynamic>> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::List(l) => Ok(l.clone()),
            _ => Err(mismatch("list", value)),
        }
    }

    pub fn get_map(&self, path: &AttributePath) -> Result<HashMap<String, Dynamic>> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::Map(m) => Ok(m.clone()),
            _ => Err(mismatch("map", value)),
        }
    }

    /// Optional accessors treat null, unknown and missing attributes as `None`
    /// and still fail when a value of the wrong type is present
    pub fn get_optional_string(&self, path: &AttributePath) -> Result<Option<String>> {
        match self.optional(path)? {
            None => Ok(None),
            Some(Dynamic::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(mismatch("string", other)),
        }
    }

    pub fn get_optional_number(&self, path: &AttributePath) -> Result<Option<f64>> {
        match self.optional(path)? {
            None => Ok(None),
            Some(Dynamic::Number(n)) => Ok(Some(*n)),
            Some(other) => Err(mismatch("number", other)),
        }
    }

    pub fn get_optional_bool(&self, path: &AttributePath) -> Result<Option<bool>> {
        match self.optional(path)? {
            None => Ok(None),
            Some(Dynamic::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(mismatch("bool", other)),
        }
    }

    pub fn get_optional_list(&self, path: &AttributePath) -> Result<Option<Vec<Dynamic>>> {
        match self.optional(path)? {
            None => Ok(None),
            Some(Dynamic::List(l)) => Ok(Some(l.clone())),
            Some(other) => Err(mismatch("list", other)),
        }
    }

    pub fn get_optional_map(
        &self,
        path: &AttributePath,
    ) -> Result<Option<HashMap<String, Dynamic>>> {
        match self.optional(path)? {
            None => Ok(None),
            Some(Dynamic::Map(m)) => Ok(Some(m.clone())),
            Some(other) => Err(mismatch("map", other)),
        }
    }

    /// Type-safe setters - Use for building state/config objects
    pub fn set_string(&mut self, path: &AttributePath, value: String) -> Result<()> {
        self.set_value(path, Dynamic::String(value))
    }

    pub fn set_number(&mut self, path: &AttributePath, value: f64) -> Result<()> {
        self.set_value(path, Dynamic::Number(value))
    }

    pub fn set_bool(&mut self, path: &AttributePath, value: bool) -> Result<()> {
        self.set_value(path, Dynamic::Bool(value))
    }

    pub fn set_list(&mut self, path: &AttributePath, value: Vec<Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::List(value))
    }

    pub fn set_map(&mut self, path: &AttributePath, value: HashMap<String, Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::Map(value))
    }

    pub fn set_null(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Null)
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn is_unknown(&self) -> bool {
        self.value.is_unknown()
    }

    /// Mark computed values as unknown during planning
    pub fn mark_unknown(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Unknown)
    }

    fn optional(&self, path: &AttributePath) -> Result<Option<&Dynamic>> {
        match self.navigate_path(path) {
            Ok(Dynamic::Null) | Ok(Dynamic::Unknown) => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_missing_attribute() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn navigate_path<'a>(&'a self, path: &AttributePath) -> Result<&'a Dynamic> {
        let mut current = &self.value;

        for step in &path.steps {
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => m
                    .get(name)
                    .ok_or_else(|| TfplugError::AttributeNotFound(name.clone()))?,
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                    l.get(*idx as usize).ok_or_else(|| {
                        TfplugError::AttributeNotFound(format!("{}[{}]", path, idx))
                    })?
                }
                (Dynamic::Null, _) | (Dynamic::Unknown, _) => {
                    return Err(TfplugError::AttributeNotFound(path.to_string()))
                }
                _ => return Err(TfplugError::InvalidPath(path.to_string())),
            };
        }

        Ok(current)
    }

    pub fn set_value(&mut self, path: &AttributePath, new_value: Dynamic) -> Result<()> {
        if path.steps.is_empty() {
            self.value = new_value;
            return Ok(());
        }

        if !matches!(self.value, Dynamic::Map(_)) {
            self.value = Dynamic::Map(HashMap::new());
        }

        let mut current = &mut self.value;
        let last_idx = path.steps.len() - 1;

        for (idx, step) in path.steps.iter().enumerate() {
            if idx == last_idx {
                return match (current, step) {
                    (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                    | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                        m.insert(name.clone(), new_value);
                        Ok(())
                    }
                    (Dynamic::List(l), AttributePathStep::ElementKeyInt(i)) => {
                        let i = *i as usize;
                        match l.get_mut(i) {
                            Some(slot) => {
                                *slot = new_value;
                                Ok(())
                            }
                            None => Err(TfplugError::InvalidPath(format!(
                                "list index {} out of bounds in {}",
                                i, path
                            ))),
                        }
                    }
                    _ => Err(TfplugError::InvalidPath(path.to_string())),
                };
            }

            let next_container = match path.steps.get(idx + 1) {
                Some(AttributePathStep::ElementKeyInt(_)) => Dynamic::List(Vec::new()),
                _ => Dynamic::Map(HashMap::new()),
            };

            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                    let slot = m.entry(name.clone()).or_insert(Dynamic::Null);
                    if matches!(slot, Dynamic::Null | Dynamic::Unknown) {
                        *slot = next_container;
                    }
                    slot
                }
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(i)) => {
                    let i = *i as usize;
                    l.get_mut(i).ok_or_else(|| {
                        TfplugError::InvalidPath(format!("list index {} out of bounds in {}", i, path))
                    })?
                }
                _ => return Err(TfplugError::InvalidPath(path.to_string())),
            };
        }

        Err(TfplugError::InvalidPath(path.to_string()))
    }
}

fn mismatch(expected: &str, actual: &Dynamic) -> TfplugError {
    TfplugError::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.type_name().to_string(),
    }
}

/// AttributePath represents a path to an attribute within a DynamicValue
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePath {
    pub steps: Vec<AttributePathStep>,
}

impl AttributePath {
    pub fn new(name: &str) -> Self {
        Self {
            steps: vec![AttributePathStep::AttributeName(name.to_string())],
        }
    }

    pub fn root() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.steps
            .push(AttributePathStep::AttributeName(name.to_string()));
        self
    }

    pub fn index(mut self, idx: i64) -> Self {
        self.steps.push(AttributePathStep::ElementKeyInt(idx));
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.steps
            .push(AttributePathStep::ElementKeyString(key.to_string()));
        self
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                AttributePathStep::AttributeName(name) if i == 0 => write!(f, "{}", name)?,
                AttributePathStep::AttributeName(name) => write!(f, ".{}", name)?,
                AttributePathStep::ElementKeyString(key) => write!(f, "[{:?}]", key)?,
                AttributePathStep::ElementKeyInt(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

/// Individual step in an AttributePath
#[derive(Debug, Clone, PartialEq)]
pub enum AttributePathStep {
    /// Access attribute by name in object
    AttributeName(String),
    /// Access element by string key (for maps)
    ElementKeyString(String),
    /// Access element by integer index (for lists)
    ElementKeyInt(i64),
}

/// RawState holds the stored state for a resource to be upgraded
#[derive(Debug, Clone, Default)]
pub struct RawState {
    pub json: Option<Vec<u8>>,
    pub flatmap: Option<HashMap<String, String>>,
}

/// Diagnostic represents a warning or error from the provider
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<AttributePath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, path: AttributePath) -> Self {
        self.attribute = Some(path);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// True when any diagnostic in the slice is an error
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosticSeverity {
    Invalid,
    Error,
    Warning,
}

/// ClientCapabilities indicates Terraform client capabilities
#[derive(Debug, Clone, Default)]
pub struct ClientCapabilities {
    pub deferral_allowed: bool,
    pub write_only_attributes_allowed: bool,
}

/// Config represents configuration values
pub type Config = DynamicValue;

/// State represents resource state values
pub type State = DynamicValue;
