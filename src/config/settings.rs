//! Cascading settings store
//!
//! Settings live in two YAML layers: a defaults file and an instance file
//! that overrides it. Keys are slash-separated paths such as
//! `page/body/menu`, and either layer may spell them nested or flat.

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigParseError;

/// A scalar setting
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => f.write_str(s),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Result of a settings lookup
///
/// Call sites branch on the tag instead of relying on implicit coercion.
/// `Absent` serializes to `null` so templates see it as falsy.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SettingValue {
    #[default]
    Absent,
    Scalar(Scalar),
    List(Vec<SettingValue>),
    Mapping(IndexMap<String, SettingValue>),
}

impl SettingValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, SettingValue::Absent)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Scalar(Scalar::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SettingValue]> {
        match self {
            SettingValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, SettingValue>> {
        match self {
            SettingValue::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Follow a key path into nested mappings
    fn lookup<'a, I>(&self, mut segments: I) -> Option<&SettingValue>
    where
        I: Iterator<Item = &'a str>,
    {
        match segments.next() {
            None => (!self.is_absent()).then_some(self),
            Some(segment) => self.as_mapping()?.get(segment)?.lookup(segments),
        }
    }

    /// Overlay `other` on top of `self`; mappings merge key by key,
    /// everything else is replaced wholesale.
    fn overlay(&mut self, other: &SettingValue) {
        match (self, other) {
            (_, SettingValue::Absent) => {}
            (SettingValue::Mapping(base), SettingValue::Mapping(top)) => {
                for (key, value) in top {
                    base.entry(key.clone()).or_default().overlay(value);
                }
            }
            (this, other) => *this = other.clone(),
        }
    }

    /// Convert to a template-friendly JSON value
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::Scalar(Scalar::String(s.to_string()))
    }
}

impl Serialize for SettingValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SettingValue::Absent => serializer.serialize_unit(),
            SettingValue::Scalar(Scalar::String(s)) => serializer.serialize_str(s),
            SettingValue::Scalar(Scalar::Integer(i)) => serializer.serialize_i64(*i),
            SettingValue::Scalar(Scalar::Float(x)) => serializer.serialize_f64(*x),
            SettingValue::Scalar(Scalar::Bool(b)) => serializer.serialize_bool(*b),
            SettingValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            SettingValue::Mapping(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

/// Insert `value` at a slash-separated key, creating intermediate mappings.
/// A later scalar or list replaces the earlier one; mappings merge key by key.
fn insert_path(map: &mut IndexMap<String, SettingValue>, key: &str, value: SettingValue) {
    let mut segments: Vec<&str> = key.split('/').filter(|s| !s.is_empty()).collect();
    let Some(last) = segments.pop() else {
        return;
    };

    let mut current = map;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| SettingValue::Mapping(IndexMap::new()));
        if !matches!(entry, SettingValue::Mapping(_)) {
            *entry = SettingValue::Mapping(IndexMap::new());
        }
        let SettingValue::Mapping(inner) = entry else {
            return;
        };
        current = inner;
    }
    match current.get_mut(last) {
        Some(existing) => merge_definition(existing, value),
        None => {
            current.insert(last.to_string(), value);
        }
    }
}

/// Later definition of a key within one file
fn merge_definition(existing: &mut SettingValue, value: SettingValue) {
    match (existing, value) {
        (SettingValue::Mapping(base), SettingValue::Mapping(top)) => {
            for (key, value) in top {
                match base.get_mut(&key) {
                    Some(entry) => merge_definition(entry, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (this, value) => *this = value,
    }
}

impl<'de> Deserialize<'de> for SettingValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SettingVisitor;

        impl<'de> Visitor<'de> for SettingVisitor {
            type Value = SettingValue;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a scalar, a list or a mapping")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(SettingValue::Scalar(Scalar::Bool(v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(SettingValue::Scalar(Scalar::Integer(v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(SettingValue::Scalar(match i64::try_from(v) {
                    Ok(i) => Scalar::Integer(i),
                    Err(_) => Scalar::Float(v as f64),
                }))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(SettingValue::Scalar(Scalar::Float(v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(SettingValue::Scalar(Scalar::String(v.to_string())))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(SettingValue::Scalar(Scalar::String(v)))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(SettingValue::Absent)
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(SettingValue::Absent)
            }

            fn visit_some<D2: Deserializer<'de>>(self, d: D2) -> Result<Self::Value, D2::Error> {
                SettingValue::deserialize(d)
            }

            fn visit_seq<S: SeqAccess<'de>>(self, mut seq: S) -> Result<Self::Value, S::Error> {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element::<SettingValue>()? {
                    items.push(item);
                }
                Ok(SettingValue::List(items))
            }

            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
                let mut map = IndexMap::new();
                while let Some(key) = access.next_key::<SettingValue>()? {
                    let key = match key {
                        SettingValue::Scalar(scalar) => scalar.to_string(),
                        _ => return Err(de::Error::custom("setting keys must be scalars")),
                    };
                    let value = access.next_value::<SettingValue>()?;
                    insert_path(&mut map, &key, value);
                }
                Ok(SettingValue::Mapping(map))
            }
        }

        deserializer.deserialize_any(SettingVisitor)
    }
}

/// One settings file
#[derive(Debug, Clone, Default)]
struct Layer {
    source: Option<PathBuf>,
    root: SettingValue,
}

impl Layer {
    fn parse(source: Option<&Path>, content: &str) -> Result<Self, ConfigParseError> {
        let origin = source.map(Path::to_path_buf).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self {
                source: source.map(Path::to_path_buf),
                root: SettingValue::Mapping(IndexMap::new()),
            });
        }

        let root: SettingValue = serde_yaml::from_str(content)
            .map_err(|e| ConfigParseError::new(&origin, e))?;
        let root = match root {
            SettingValue::Absent => SettingValue::Mapping(IndexMap::new()),
            SettingValue::Mapping(_) => root,
            _ => {
                return Err(ConfigParseError::new(
                    &origin,
                    "document root must be a mapping",
                ))
            }
        };

        Ok(Self {
            source: source.map(Path::to_path_buf),
            root,
        })
    }

    fn load(path: &Path) -> Result<Self, ConfigParseError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(Some(path), &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Settings file {:?} not found, using an empty layer", path);
                Ok(Self {
                    source: Some(path.to_path_buf()),
                    root: SettingValue::Mapping(IndexMap::new()),
                })
            }
            Err(e) => Err(ConfigParseError::new(path, e)),
        }
    }
}

/// Two-level settings cascade: instance overrides defaults
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    /// Most specific layer first
    layers: Vec<Layer>,
}

impl SettingsStore {
    /// Load the defaults and instance files; either may be missing
    pub fn load(defaults: Option<&Path>, instance: Option<&Path>) -> Result<Self, ConfigParseError> {
        let mut layers = Vec::with_capacity(2);
        if let Some(path) = instance {
            layers.push(Layer::load(path)?);
        }
        if let Some(path) = defaults {
            layers.push(Layer::load(path)?);
        }
        tracing::debug!("Loaded {} settings layer(s)", layers.len());
        Ok(Self { layers })
    }

    /// Build a store from in-memory YAML documents
    pub fn from_yaml(defaults: &str, instance: &str) -> Result<Self, ConfigParseError> {
        Ok(Self {
            layers: vec![Layer::parse(None, instance)?, Layer::parse(None, defaults)?],
        })
    }

    /// Look up a key, most specific layer first
    ///
    /// Scalars and lists come wholesale from the first layer that defines
    /// them. Mappings are merged key by key with the same rule, so
    /// `get("a")` always agrees with `get("a/b")`.
    pub fn get(&self, key: &str) -> SettingValue {
        let mut resolved = SettingValue::Absent;
        for layer in self.layers.iter().rev() {
            if let Some(value) = layer.root.lookup(key.split('/').filter(|s| !s.is_empty())) {
                resolved.overlay(value);
            }
        }
        resolved
    }

    /// Look up a repeated setting such as a menu
    pub fn get_all(&self, key: &str) -> Vec<SettingValue> {
        match self.get(key) {
            SettingValue::Absent => Vec::new(),
            SettingValue::List(items) => items,
            other => vec![other],
        }
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).as_str().map(str::to_string)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).as_bool()
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).as_i64()
    }

    pub fn is_defined(&self, key: &str) -> bool {
        !self.get(key).is_absent()
    }

    /// Files backing this store, most specific first
    pub fn sources(&self) -> impl Iterator<Item = &Path> {
        self.layers.iter().filter_map(|l| l.source.as_deref())
    }
}
