use serde::Serialize;
use serde_json::{Map, Value};

/// Claims of a token whose signature has been verified.
///
/// Only built from the segments a `TokenDecoder` returned, so holding one
/// means verification already succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DecodedClaims(Map<String, Value>);

impl DecodedClaims {
    /// Last-write-wins merge: a claim in a later segment replaces the same
    /// claim from an earlier one.
    pub(crate) fn from_segments<I>(segments: I) -> Self
    where
        I: IntoIterator<Item = Map<String, Value>>,
    {
        let merged = segments
            .into_iter()
            .fold(Map::new(), |mut merged, segment| {
                merged.extend(segment);
                merged
            });
        Self(merged)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

/// A value that carries nothing: null, false, whitespace-only text or an
/// empty collection.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Number(_) => false,
    }
}
