//! JSON mapping for value trees.
//!
//! The mapping is lossless for the JSON-typeable variants and explicit
//! about the rest:
//!
//! | variant | JSON form |
//! |---------|-----------|
//! | `Invalid` | `null` |
//! | `Bool` | bool |
//! | integers | number (parse always yields `Int64`/`UInt64`) |
//! | floats | number (parse always yields `Float64`) |
//! | `String` | string |
//! | `Buf` | `"@buf:<base16>"` |
//! | `Ptr` | omitted from objects, `null` elsewhere, with a warning |
//! | `Array` / `Object` | array / object (key order preserved) |
//!
//! Narrow integer and `Float32` variants come back as their widened
//! forms; pin widths with a schema when they matter.

use crate::error::ValueError;
use crate::value::{ObjectMap, Value};
use tracing::warn;

/// Prefix marking a byte buffer serialised into a JSON string.
pub(crate) const BUF_PREFIX: &str = "@buf:";

impl Value {
    /// Parses JSON text into a value tree.
    ///
    /// Integers widen to `Int64` (or `UInt64` beyond `i64::MAX`), floats
    /// to `Float64`. Strings carrying the `@buf:` prefix followed by valid
    /// base16 decode into buffers.
    ///
    /// # Example
    ///
    /// ```
    /// use weft_value::Value;
    ///
    /// let v = Value::from_json(r#"{"n": 3, "tags": ["x"]}"#).unwrap();
    /// assert_eq!(v.peek_path("n").unwrap().get_int64().unwrap(), 3);
    /// ```
    pub fn from_json(text: &str) -> Result<Value, ValueError> {
        let parsed: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ValueError::Parse(e.to_string()))?;
        Ok(Self::from_serde_json(parsed))
    }

    /// Serialises this value tree to JSON text with stable key order.
    #[must_use]
    pub fn to_json(&self) -> String {
        self.to_serde_json().to_string()
    }

    /// Converts from an already-parsed `serde_json` tree.
    #[must_use]
    pub fn from_serde_json(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Invalid,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt64(u)
                } else {
                    Value::Float64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => match decode_buf_string(&s) {
                Some(bytes) => Value::Buf(bytes),
                None => Value::String(s),
            },
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Self::from_serde_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_serde_json(v)))
                    .collect::<ObjectMap>(),
            ),
        }
    }

    /// Converts into a `serde_json` tree.
    ///
    /// Pointer values cannot be represented: they are dropped from objects
    /// and rendered as `null` elsewhere, each with a warning.
    #[must_use]
    pub fn to_serde_json(&self) -> serde_json::Value {
        match self {
            Value::Invalid => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int8(n) => serde_json::Value::from(*n),
            Value::Int16(n) => serde_json::Value::from(*n),
            Value::Int32(n) => serde_json::Value::from(*n),
            Value::Int64(n) => serde_json::Value::from(*n),
            Value::UInt8(n) => serde_json::Value::from(*n),
            Value::UInt16(n) => serde_json::Value::from(*n),
            Value::UInt32(n) => serde_json::Value::from(*n),
            Value::UInt64(n) => serde_json::Value::from(*n),
            Value::Float32(x) => float_to_json(f64::from(*x)),
            Value::Float64(x) => float_to_json(*x),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Buf(bytes) => {
                serde_json::Value::String(format!("{BUF_PREFIX}{}", encode_hex(bytes)))
            }
            Value::Ptr(_) => {
                warn!("pointer value is not representable in JSON, emitting null");
                serde_json::Value::Null
            }
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_serde_json).collect())
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map.iter() {
                    if matches!(v, Value::Ptr(_)) {
                        warn!(key = k, "omitting pointer value from JSON object");
                        continue;
                    }
                    out.insert(k.to_string(), v.to_serde_json());
                }
                serde_json::Value::Object(out)
            }
        }
    }
}

fn float_to_json(x: f64) -> serde_json::Value {
    match serde_json::Number::from_f64(x) {
        Some(n) => serde_json::Value::Number(n),
        None => {
            warn!("non-finite float is not representable in JSON, emitting null");
            serde_json::Value::Null
        }
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn decode_buf_string(s: &str) -> Option<Vec<u8>> {
    let hex = s.strip_prefix(BUF_PREFIX)?;
    if hex.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(hex.len() / 2);
    for i in (0..hex.len()).step_by(2) {
        out.push(u8::from_str_radix(&hex[i..i + 2], 16).ok()?);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_json_typeable_values() {
        let mut v = Value::object();
        v.set_path("flag", Value::from(true)).unwrap();
        v.set_path("count", Value::from(42i64)).unwrap();
        v.set_path("ratio", Value::from(0.5f64)).unwrap();
        v.set_path("name", Value::from("weft")).unwrap();
        v.set_path("tags.0", Value::from("a")).unwrap();
        v.set_path("tags.1", Value::from("b")).unwrap();

        let back = Value::from_json(&v.to_json()).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn round_trip_preserves_key_order() {
        let mut v = Value::object();
        v.set_path("zebra", Value::from(1i64)).unwrap();
        v.set_path("apple", Value::from(2i64)).unwrap();
        v.set_path("mango", Value::from(3i64)).unwrap();

        let text = v.to_json();
        assert!(text.find("zebra").unwrap() < text.find("apple").unwrap());
        assert!(text.find("apple").unwrap() < text.find("mango").unwrap());

        let back = Value::from_json(&text).unwrap();
        let keys: Vec<&str> = back.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["zebra", "apple", "mango"]);
    }

    #[test]
    fn integers_widen_to_int64_on_parse() {
        let v = Value::from_json("{\"n\": 5}").unwrap();
        assert_eq!(v.peek_path("n").unwrap().value_type().as_str(), "int64");
    }

    #[test]
    fn huge_unsigned_becomes_uint64() {
        let v = Value::from_json("{\"n\": 18446744073709551615}").unwrap();
        assert_eq!(
            v.peek_path("n").unwrap().get_uint64().unwrap(),
            u64::MAX
        );
    }

    #[test]
    fn buf_round_trips_through_the_marker_string() {
        let mut v = Value::object();
        v.set_path("payload", Value::buf(vec![0xde, 0xad, 0xbe, 0xef]))
            .unwrap();

        let text = v.to_json();
        assert!(text.contains("@buf:deadbeef"));

        let back = Value::from_json(&text).unwrap();
        assert_eq!(
            back.peek_path("payload").unwrap().get_buf().unwrap(),
            &[0xde, 0xad, 0xbe, 0xef]
        );
    }

    #[test]
    fn ordinary_strings_are_not_mistaken_for_buffers() {
        // Odd-length hex after the prefix stays a plain string.
        let v = Value::from_json(r#"{"s": "@buf:abc"}"#).unwrap();
        assert_eq!(v.peek_path("s").unwrap().get_string().unwrap(), "@buf:abc");
    }

    #[test]
    fn ptr_is_omitted_from_objects() {
        let mut v = Value::object();
        v.set_path("keep", Value::from(1i64)).unwrap();
        v.set_path("handle", Value::ptr(7u32)).unwrap();

        let back = Value::from_json(&v.to_json()).unwrap();
        assert!(back.peek_path("keep").is_some());
        assert!(back.peek_path("handle").is_none());
    }

    #[test]
    fn invalid_maps_to_null_and_back() {
        let v = Value::from_json("{\"x\": null}").unwrap();
        assert!(v.peek_path("x").unwrap().is_invalid());
        assert_eq!(v.to_json(), "{\"x\":null}");
    }

    #[test]
    fn parse_error_is_reported() {
        let err = Value::from_json("{not json").unwrap_err();
        assert!(matches!(err, ValueError::Parse(_)));
    }

    #[test]
    fn empty_buf_round_trips() {
        let v = Value::buf(Vec::new());
        let text = v.to_json();
        assert_eq!(text, "\"@buf:\"");
        assert_eq!(Value::from_json(&text).unwrap().get_buf().unwrap(), &[] as &[u8]);
    }
}
