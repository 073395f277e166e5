//! Normalized sensor readings published to the telemetry bus.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Typed scalar carried by one reading field.
///
/// Flags serialize as `1`/`0` rather than booleans to keep byte-level
/// parity with the integer-flag payloads the platform's telemetry
/// consumers already parse.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Flag(bool),
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Value::Int(v) => serializer.serialize_i64(v),
            Value::Float(v) => serializer.serialize_f64(v),
            Value::Flag(v) => serializer.serialize_u8(v as u8),
        }
    }
}

/// Which sensor produced a reading
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    /// Satellite-positioning receiver
    Positioning,
    /// Ultra-wideband ranging module
    Ranging,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Positioning => "positioning",
            Source::Ranging => "ranging",
        }
    }
}

/// One normalized sensor reading: named typed fields in a fixed order,
/// tagged with the producing source.
///
/// Immutable once built; published fire-and-forget, never persisted. Field
/// names come from the per-message schemas, so they are static and the JSON
/// key order is deterministic.
#[derive(Clone, Debug, PartialEq)]
pub struct Reading {
    source: Source,
    fields: Vec<(&'static str, Value)>,
}

impl Reading {
    pub fn new(source: Source) -> Self {
        Reading {
            source,
            fields: Vec::new(),
        }
    }

    /// Append a field; order is preserved in the JSON encoding
    pub fn push(&mut self, name: &'static str, value: Value) {
        self.fields.push((name, value));
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| *value)
    }

    /// Encode the fields as a flat JSON object
    pub fn to_json(&self) -> crate::error::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_lookup() {
        let mut reading = Reading::new(Source::Ranging);
        reading.push("px", Value::Float(1.5));
        reading.push("qf", Value::Int(42));
        assert_eq!(reading.get("px"), Some(Value::Float(1.5)));
        assert_eq!(reading.get("qf"), Some(Value::Int(42)));
        assert_eq!(reading.get("missing"), None);
        assert_eq!(reading.len(), 2);
        assert_eq!(reading.source(), Source::Ranging);
    }

    #[test]
    fn test_json_value_forms() {
        // Floats keep a decimal form, ints do not, flags render as 1/0.
        let mut reading = Reading::new(Source::Positioning);
        reading.push("lat", Value::Float(61.123456));
        reading.push("numSV", Value::Int(12));
        reading.push("gnssFixOk", Value::Flag(true));
        reading.push("diffSoln", Value::Flag(false));
        let json = String::from_utf8(reading.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"lat":61.123456,"numSV":12,"gnssFixOk":1,"diffSoln":0}"#
        );
    }

    #[test]
    fn test_json_preserves_insertion_order() {
        let mut reading = Reading::new(Source::Ranging);
        reading.push("px", Value::Float(1.0));
        reading.push("py", Value::Float(2.0));
        reading.push("pz", Value::Float(3.0));
        let json = String::from_utf8(reading.to_json().unwrap()).unwrap();
        assert_eq!(json, r#"{"px":1.0,"py":2.0,"pz":3.0}"#);
    }

    #[test]
    fn test_source_names() {
        assert_eq!(Source::Positioning.as_str(), "positioning");
        assert_eq!(Source::Ranging.as_str(), "ranging");
    }
}
