//! Dotted-path access into value trees.
//!
//! Paths are dot-separated segments: `"a.b.0.c"`. A segment is applied
//! according to the container it lands on: a key lookup on an object, an
//! index on an array. When writing, missing intermediate nodes are created:
//! an object for a named segment, an array for a numeric one.

use crate::error::ValueError;
use crate::value::{ObjectMap, Value};

fn split_path(path: &str) -> Result<Vec<&str>, ValueError> {
    if path.is_empty() {
        return Err(ValueError::path(path, "empty path"));
    }
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ValueError::path(path, "empty segment"));
    }
    Ok(segments)
}

fn as_index(segment: &str) -> Option<usize> {
    segment.parse().ok()
}

impl Value {
    /// Borrows the value at `path` without copying.
    ///
    /// Returns `None` when any segment fails to resolve.
    ///
    /// # Example
    ///
    /// ```
    /// use weft_value::Value;
    ///
    /// let mut v = Value::object();
    /// v.set_path("a.b", Value::from(1i64)).unwrap();
    /// assert!(v.peek_path("a.b").is_some());
    /// assert!(v.peek_path("a.missing").is_none());
    /// ```
    #[must_use]
    pub fn peek_path(&self, path: &str) -> Option<&Value> {
        let segments = split_path(path).ok()?;
        let mut current = self;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(as_index(segment)?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Returns a deep clone of the value at `path`.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<Value> {
        self.peek_path(path).cloned()
    }

    /// Writes `value` at `path`, creating intermediate containers.
    ///
    /// A named segment creates an object, a numeric one creates an array.
    /// Array indices must fall inside the array or directly at its end
    /// (append). Writing through a scalar segment fails with a path error.
    ///
    /// # Example
    ///
    /// ```
    /// use weft_value::Value;
    ///
    /// let mut v = Value::object();
    /// v.set_path("servers.0.port", Value::from(8001i64)).unwrap();
    /// assert_eq!(
    ///     v.peek_path("servers.0.port").unwrap().get_int64().unwrap(),
    ///     8001
    /// );
    ///
    /// // Writing through the scalar fails.
    /// assert!(v.set_path("servers.0.port.x", Value::from(1i64)).is_err());
    /// ```
    pub fn set_path(&mut self, path: &str, value: Value) -> Result<(), ValueError> {
        let segments = split_path(path)?;
        let mut current = self;

        for (pos, segment) in segments.iter().enumerate() {
            let walked = || segments[..=pos].join(".");
            let last = pos == segments.len() - 1;
            // A fresh node takes its container kind from the segment that
            // addresses it.
            if current.is_invalid() {
                *current = if as_index(segment).is_some() {
                    Value::array()
                } else {
                    Value::Object(ObjectMap::new())
                };
            }

            match current {
                Value::Object(map) => {
                    if last {
                        map.insert(*segment, value);
                        return Ok(());
                    }
                    current = map.entry(segment);
                }
                Value::Array(items) => {
                    let Some(idx) = as_index(segment) else {
                        return Err(ValueError::path(
                            walked(),
                            "non-numeric segment applied to array",
                        ));
                    };
                    if idx > items.len() {
                        return Err(ValueError::path(
                            walked(),
                            format!("index {idx} out of range (len {})", items.len()),
                        ));
                    }
                    if idx == items.len() {
                        items.push(Value::Invalid);
                    }
                    if last {
                        items[idx] = value;
                        return Ok(());
                    }
                    current = &mut items[idx];
                }
                _ => {
                    return Err(ValueError::path(
                        walked(),
                        format!("cannot traverse {} value", current.value_type()),
                    ));
                }
            }
        }

        unreachable!("set_path returns from the last segment")
    }
}
