//! The tagged value union and its containers.

use crate::error::ValueError;
use std::any::Any;
use std::sync::Arc;

/// The closed set of tags a [`Value`] can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Zero state, only meaningful during construction.
    Invalid,
    /// Boolean.
    Bool,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// UTF-8 string.
    String,
    /// Owned byte buffer.
    Buf,
    /// Opaque shared host object.
    Ptr,
    /// Ordered sequence of values.
    Array,
    /// Insertion-ordered string-keyed map.
    Object,
}

impl ValueType {
    /// The descriptor name of this tag (as used by schemas).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::String => "string",
            Self::Buf => "buf",
            Self::Ptr => "ptr",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Parses a descriptor name back into a tag.
    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "invalid" => Self::Invalid,
            "bool" => Self::Bool,
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint8" => Self::UInt8,
            "uint16" => Self::UInt16,
            "uint32" => Self::UInt32,
            "uint64" => Self::UInt64,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            "string" => Self::String,
            "buf" => Self::Buf,
            "ptr" => Self::Ptr,
            "array" => Self::Array,
            "object" => Self::Object,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insertion-ordered string-keyed map of values.
///
/// Preserving insertion order is what makes the JSON round-trip stable:
/// serialising and re-parsing an object yields the same key sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectMap {
    entries: Vec<(String, Value)>,
}

impl ObjectMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns a mutable reference to the value stored under `key`.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Inserts `value` under `key`, replacing in place (order preserved) if
    /// the key already exists. Returns the previous value, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        if let Some(slot) = self.get_mut(&key) {
            Some(std::mem::replace(slot, value))
        } else {
            self.entries.push((key, value));
            None
        }
    }

    /// Returns a mutable reference to the value stored under `key`,
    /// inserting [`Value::Invalid`] first when the key is absent.
    pub fn entry(&mut self, key: &str) -> &mut Value {
        let idx = match self.entries.iter().position(|(k, _)| k == key) {
            Some(idx) => idx,
            None => {
                self.entries.push((key.to_string(), Value::Invalid));
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates entries mutably in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl FromIterator<(String, Value)> for ObjectMap {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// An opaque, shared reference to a host object.
///
/// Cloning shares the pointee; the pointee is released when the last
/// clone is dropped. Equality is identity: two handles are equal only
/// when they point at the same object.
#[derive(Clone)]
pub struct PtrValue {
    inner: Arc<dyn Any + Send + Sync>,
}

impl PtrValue {
    /// Wraps a host object.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    /// Borrows the pointee as `T`, if it is one.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Number of live handles to the pointee.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl std::fmt::Debug for PtrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PtrValue(refs={})", self.ref_count())
    }
}

impl PartialEq for PtrValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A polymorphic value.
///
/// See the [crate docs](crate) for the cloning discipline and the JSON
/// mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Zero state used only during construction; also what
    /// [`take`](Self::take) leaves behind.
    #[default]
    Invalid,
    /// Boolean.
    Bool(bool),
    /// Signed 8-bit integer.
    Int8(i8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 8-bit integer.
    UInt8(u8),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Owned byte buffer.
    Buf(Vec<u8>),
    /// Opaque shared host object.
    Ptr(PtrValue),
    /// Ordered sequence.
    Array(Vec<Value>),
    /// Insertion-ordered map.
    Object(ObjectMap),
}

impl Value {
    /// Creates an empty object value.
    #[must_use]
    pub fn object() -> Self {
        Self::Object(ObjectMap::new())
    }

    /// Creates an empty array value.
    #[must_use]
    pub fn array() -> Self {
        Self::Array(Vec::new())
    }

    /// Creates a byte-buffer value.
    #[must_use]
    pub fn buf(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Buf(bytes.into())
    }

    /// Wraps a host object as a pointer value.
    #[must_use]
    pub fn ptr<T: Any + Send + Sync>(value: T) -> Self {
        Self::Ptr(PtrValue::new(value))
    }

    /// The tag of this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Invalid => ValueType::Invalid,
            Self::Bool(_) => ValueType::Bool,
            Self::Int8(_) => ValueType::Int8,
            Self::Int16(_) => ValueType::Int16,
            Self::Int32(_) => ValueType::Int32,
            Self::Int64(_) => ValueType::Int64,
            Self::UInt8(_) => ValueType::UInt8,
            Self::UInt16(_) => ValueType::UInt16,
            Self::UInt32(_) => ValueType::UInt32,
            Self::UInt64(_) => ValueType::UInt64,
            Self::Float32(_) => ValueType::Float32,
            Self::Float64(_) => ValueType::Float64,
            Self::String(_) => ValueType::String,
            Self::Buf(_) => ValueType::Buf,
            Self::Ptr(_) => ValueType::Ptr,
            Self::Array(_) => ValueType::Array,
            Self::Object(_) => ValueType::Object,
        }
    }

    /// Returns `true` in the zero state.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid)
    }

    /// Replaces `self` with [`Invalid`](Self::Invalid) and returns the
    /// previous contents.
    pub fn take(&mut self) -> Value {
        std::mem::take(self)
    }

    fn mismatch(&self, expected: ValueType) -> ValueError {
        ValueError::TypeMismatch {
            expected,
            found: self.value_type(),
        }
    }

    /// Reads a boolean.
    pub fn get_bool(&self) -> Result<bool, ValueError> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(self.mismatch(ValueType::Bool)),
        }
    }

    /// Reads a signed 8-bit integer (exact variant only).
    pub fn get_int8(&self) -> Result<i8, ValueError> {
        match self {
            Self::Int8(n) => Ok(*n),
            _ => Err(self.mismatch(ValueType::Int8)),
        }
    }

    /// Reads a signed 16-bit integer, widening from narrower signed
    /// variants.
    pub fn get_int16(&self) -> Result<i16, ValueError> {
        match self {
            Self::Int8(n) => Ok(i16::from(*n)),
            Self::Int16(n) => Ok(*n),
            _ => Err(self.mismatch(ValueType::Int16)),
        }
    }

    /// Reads a signed 32-bit integer, widening from narrower signed
    /// variants.
    pub fn get_int32(&self) -> Result<i32, ValueError> {
        match self {
            Self::Int8(n) => Ok(i32::from(*n)),
            Self::Int16(n) => Ok(i32::from(*n)),
            Self::Int32(n) => Ok(*n),
            _ => Err(self.mismatch(ValueType::Int32)),
        }
    }

    /// Reads a signed 64-bit integer, widening from narrower signed
    /// variants.
    pub fn get_int64(&self) -> Result<i64, ValueError> {
        match self {
            Self::Int8(n) => Ok(i64::from(*n)),
            Self::Int16(n) => Ok(i64::from(*n)),
            Self::Int32(n) => Ok(i64::from(*n)),
            Self::Int64(n) => Ok(*n),
            _ => Err(self.mismatch(ValueType::Int64)),
        }
    }

    /// Reads an unsigned 8-bit integer (exact variant only).
    pub fn get_uint8(&self) -> Result<u8, ValueError> {
        match self {
            Self::UInt8(n) => Ok(*n),
            _ => Err(self.mismatch(ValueType::UInt8)),
        }
    }

    /// Reads an unsigned 16-bit integer, widening from narrower unsigned
    /// variants.
    pub fn get_uint16(&self) -> Result<u16, ValueError> {
        match self {
            Self::UInt8(n) => Ok(u16::from(*n)),
            Self::UInt16(n) => Ok(*n),
            _ => Err(self.mismatch(ValueType::UInt16)),
        }
    }

    /// Reads an unsigned 32-bit integer, widening from narrower unsigned
    /// variants.
    pub fn get_uint32(&self) -> Result<u32, ValueError> {
        match self {
            Self::UInt8(n) => Ok(u32::from(*n)),
            Self::UInt16(n) => Ok(u32::from(*n)),
            Self::UInt32(n) => Ok(*n),
            _ => Err(self.mismatch(ValueType::UInt32)),
        }
    }

    /// Reads an unsigned 64-bit integer, widening from narrower unsigned
    /// variants.
    pub fn get_uint64(&self) -> Result<u64, ValueError> {
        match self {
            Self::UInt8(n) => Ok(u64::from(*n)),
            Self::UInt16(n) => Ok(u64::from(*n)),
            Self::UInt32(n) => Ok(u64::from(*n)),
            Self::UInt64(n) => Ok(*n),
            _ => Err(self.mismatch(ValueType::UInt64)),
        }
    }

    /// Reads a 32-bit float. Integers up to 16 bits widen losslessly
    /// (f32 carries a 24-bit mantissa).
    pub fn get_float32(&self) -> Result<f32, ValueError> {
        match self {
            Self::Float32(x) => Ok(*x),
            Self::Int8(n) => Ok(f32::from(*n)),
            Self::Int16(n) => Ok(f32::from(*n)),
            Self::UInt8(n) => Ok(f32::from(*n)),
            Self::UInt16(n) => Ok(f32::from(*n)),
            _ => Err(self.mismatch(ValueType::Float32)),
        }
    }

    /// Reads a 64-bit float. `Float32` and integers up to 32 bits widen
    /// losslessly (f64 carries a 53-bit mantissa).
    pub fn get_float64(&self) -> Result<f64, ValueError> {
        match self {
            Self::Float64(x) => Ok(*x),
            Self::Float32(x) => Ok(f64::from(*x)),
            Self::Int8(n) => Ok(f64::from(*n)),
            Self::Int16(n) => Ok(f64::from(*n)),
            Self::Int32(n) => Ok(f64::from(*n)),
            Self::UInt8(n) => Ok(f64::from(*n)),
            Self::UInt16(n) => Ok(f64::from(*n)),
            Self::UInt32(n) => Ok(f64::from(*n)),
            _ => Err(self.mismatch(ValueType::Float64)),
        }
    }

    /// Borrows the string contents.
    pub fn get_string(&self) -> Result<&str, ValueError> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(self.mismatch(ValueType::String)),
        }
    }

    /// Borrows the buffer contents.
    pub fn get_buf(&self) -> Result<&[u8], ValueError> {
        match self {
            Self::Buf(b) => Ok(b),
            _ => Err(self.mismatch(ValueType::Buf)),
        }
    }

    /// Borrows the pointer handle.
    pub fn get_ptr(&self) -> Result<&PtrValue, ValueError> {
        match self {
            Self::Ptr(p) => Ok(p),
            _ => Err(self.mismatch(ValueType::Ptr)),
        }
    }

    /// Borrows the object map, if this is an object.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Mutably borrows the object map, if this is an object.
    pub fn as_object_mut(&mut self) -> Option<&mut ObjectMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Borrows the array, if this is an array.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Mutably borrows the array, if this is an array.
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Self::Int8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::Int16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::UInt8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::UInt16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::UInt32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_invalid() {
        assert!(Value::default().is_invalid());
        assert_eq!(Value::default().value_type(), ValueType::Invalid);
    }

    #[test]
    fn take_leaves_invalid_behind() {
        let mut v = Value::from(42i64);
        let taken = v.take();
        assert_eq!(taken.get_int64().unwrap(), 42);
        assert!(v.is_invalid());
    }

    #[test]
    fn object_map_preserves_insertion_order() {
        let mut map = ObjectMap::new();
        map.insert("z", Value::from(1i64));
        map.insert("a", Value::from(2i64));
        map.insert("m", Value::from(3i64));
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, ["z", "a", "m"]);

        // Replacing an existing key keeps its position.
        map.insert("a", Value::from(9i64));
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, ["z", "a", "m"]);
        assert_eq!(map.get("a").unwrap().get_int64().unwrap(), 9);
    }

    #[test]
    fn object_map_remove() {
        let mut map = ObjectMap::new();
        map.insert("k", Value::from(true));
        assert!(map.contains_key("k"));
        assert_eq!(map.remove("k").unwrap().get_bool().unwrap(), true);
        assert!(map.remove("k").is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn integer_widening_same_signedness() {
        let v = Value::from(7i8);
        assert_eq!(v.get_int16().unwrap(), 7);
        assert_eq!(v.get_int32().unwrap(), 7);
        assert_eq!(v.get_int64().unwrap(), 7);

        let u = Value::from(7u16);
        assert_eq!(u.get_uint32().unwrap(), 7);
        assert_eq!(u.get_uint64().unwrap(), 7);
    }

    #[test]
    fn no_cross_signedness_widening() {
        let v = Value::from(7u8);
        assert!(v.get_int64().is_err());
        let v = Value::from(7i8);
        assert!(v.get_uint64().is_err());
    }

    #[test]
    fn no_narrowing() {
        let v = Value::from(300i64);
        assert!(v.get_int8().is_err());
        assert!(v.get_int32().is_err());
    }

    #[test]
    fn float_widening_rules() {
        assert_eq!(Value::from(1.5f32).get_float64().unwrap(), 1.5);
        assert_eq!(Value::from(12i16).get_float32().unwrap(), 12.0);
        assert_eq!(Value::from(12i32).get_float64().unwrap(), 12.0);
        // 32-bit integers do not fit f32's mantissa.
        assert!(Value::from(12i32).get_float32().is_err());
        // 64-bit integers do not fit f64's mantissa.
        assert!(Value::from(12i64).get_float64().is_err());
        // Floats never narrow.
        assert!(Value::from(1.5f64).get_float32().is_err());
    }

    #[test]
    fn type_mismatch_reports_both_sides() {
        let err = Value::from("hi").get_int64().unwrap_err();
        match err {
            ValueError::TypeMismatch { expected, found } => {
                assert_eq!(expected, ValueType::Int64);
                assert_eq!(found, ValueType::String);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn ptr_clone_shares_and_releases() {
        let v = Value::ptr(String::from("host object"));
        let ptr = v.get_ptr().unwrap();
        assert_eq!(ptr.ref_count(), 1);

        let clone = v.clone();
        assert_eq!(v.get_ptr().unwrap().ref_count(), 2);
        assert_eq!(
            clone.get_ptr().unwrap().downcast_ref::<String>().unwrap(),
            "host object"
        );

        drop(clone);
        assert_eq!(v.get_ptr().unwrap().ref_count(), 1);
    }

    #[test]
    fn ptr_equality_is_identity() {
        let a = Value::ptr(1u32);
        let b = Value::ptr(1u32);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn buf_clone_copies_bytes() {
        let original = Value::buf(vec![1, 2, 3]);
        let mut copy = original.clone();
        if let Value::Buf(bytes) = &mut copy {
            bytes[0] = 99;
        }
        assert_eq!(original.get_buf().unwrap(), &[1, 2, 3]);
        assert_eq!(copy.get_buf().unwrap(), &[99, 2, 3]);
    }

    #[test]
    fn value_type_names_round_trip() {
        for ty in [
            ValueType::Invalid,
            ValueType::Bool,
            ValueType::Int8,
            ValueType::Int64,
            ValueType::UInt32,
            ValueType::Float64,
            ValueType::String,
            ValueType::Buf,
            ValueType::Ptr,
            ValueType::Array,
            ValueType::Object,
        ] {
            assert_eq!(ValueType::from_str_opt(ty.as_str()), Some(ty));
        }
        assert_eq!(ValueType::from_str_opt("int128"), None);
    }
}
