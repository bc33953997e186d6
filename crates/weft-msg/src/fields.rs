//! Generic field iteration over a message.
//!
//! [`Message::for_each_field`] visits every header field and every user
//! property as a `(name, &mut Value, is_user_defined)` triple, then writes
//! the (possibly modified) values back. This is the hook generic
//! serialisers and validators use; the envelope codec and schema layers
//! never hard-code the header shape.

use crate::error::MsgError;
use crate::message::{Message, Payload};
use weft_types::{Location, MsgType};
use weft_value::{ObjectMap, Value};

/// One field visited by the iterator.
#[derive(Debug)]
pub struct MsgField<'a> {
    /// Field name (header names are fixed; property names are user-chosen).
    pub name: &'a str,
    /// The field's value, materialised as a [`Value`]. Mutations are
    /// written back after the callback returns.
    pub value: &'a mut Value,
    /// `true` for user properties, `false` for header fields.
    pub user_defined: bool,
}

fn location_to_value(loc: &Location) -> Value {
    let json = serde_json::to_value(loc).unwrap_or(serde_json::Value::Null);
    Value::from_serde_json(json)
}

fn location_from_value(name: &str, value: &Value) -> Result<Location, MsgError> {
    serde_json::from_value(value.to_serde_json())
        .map_err(|e| MsgError::field(name, format!("not a location: {e}")))
}

/// The payload class of a message type; field write-back may retarget the
/// type tag only within its class.
fn payload_class(ty: MsgType) -> u8 {
    match ty {
        MsgType::CmdResult => 1,
        MsgType::Data => 2,
        MsgType::AudioFrame => 3,
        MsgType::VideoFrame => 4,
        _ => 0,
    }
}

impl Message {
    /// Invokes `f` once per field, header fields first, then user
    /// properties in insertion order. Modified values are written back.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `f`, or a
    /// [`MsgError::Field`] when a written-back value no longer fits its
    /// field.
    ///
    /// # Example
    ///
    /// ```
    /// use weft_msg::Message;
    ///
    /// let mut cmd = Message::cmd("ping");
    /// let mut names = Vec::new();
    /// cmd.for_each_field(|field| {
    ///     names.push(field.name.to_string());
    ///     Ok(())
    /// })
    /// .unwrap();
    /// assert!(names.contains(&"cmd_id".to_string()));
    /// assert!(names.contains(&"name".to_string()));
    /// ```
    pub fn for_each_field<F>(&mut self, mut f: F) -> Result<(), MsgError>
    where
        F: FnMut(&mut MsgField<'_>) -> Result<(), MsgError>,
    {
        let mut fields = self.materialize_fields();

        for (name, value, user_defined) in &mut fields {
            let mut field = MsgField {
                name: name.as_str(),
                value,
                user_defined: *user_defined,
            };
            f(&mut field)?;
        }

        self.apply_fields(fields)
    }

    pub(crate) fn materialize_fields(&self) -> Vec<(String, Value, bool)> {
        let mut fields: Vec<(String, Value, bool)> = vec![
            (
                "type".into(),
                Value::from(self.msg_type().as_str()),
                false,
            ),
            ("name".into(), Value::from(self.name()), false),
            ("src".into(), location_to_value(self.src()), false),
            (
                "dest".into(),
                Value::Array(self.dests().iter().map(location_to_value).collect()),
                false,
            ),
            ("timestamp".into(), Value::from(self.timestamp_us()), false),
        ];

        match self.payload() {
            Payload::None => {}
            Payload::Cmd(c) => {
                fields.push(("cmd_id".into(), Value::from(c.cmd_id.as_str()), false));
                fields.push(("seq_id".into(), Value::from(c.seq_id.as_str()), false));
            }
            Payload::CmdResult(r) => {
                fields.push(("cmd_id".into(), Value::from(r.cmd_id.as_str()), false));
                fields.push(("seq_id".into(), Value::from(r.seq_id.as_str()), false));
                fields.push(("status_code".into(), Value::from(r.status.as_u8()), false));
                fields.push(("is_final".into(), Value::from(r.is_final), false));
            }
            Payload::Data(d) => {
                fields.push(("buf".into(), Value::buf(d.buf.clone()), false));
            }
            Payload::AudioFrame(a) => {
                fields.push(("frame_timestamp".into(), Value::from(a.timestamp), false));
                fields.push(("sample_rate".into(), Value::from(a.sample_rate), false));
                fields.push(("channels".into(), Value::from(a.channels), false));
                fields.push((
                    "bytes_per_sample".into(),
                    Value::from(a.bytes_per_sample),
                    false,
                ));
                fields.push((
                    "samples_per_channel".into(),
                    Value::from(a.samples_per_channel),
                    false,
                ));
                fields.push(("buf".into(), Value::buf(a.buf.clone()), false));
            }
            Payload::VideoFrame(v) => {
                fields.push(("frame_timestamp".into(), Value::from(v.timestamp), false));
                fields.push(("width".into(), Value::from(v.width), false));
                fields.push(("height".into(), Value::from(v.height), false));
                fields.push((
                    "pixel_format".into(),
                    Value::from(v.pixel_format.as_str()),
                    false,
                ));
                fields.push(("buf".into(), Value::buf(v.buf.clone()), false));
            }
        }

        if let Some(props) = self.properties().as_object() {
            for (key, value) in props.iter() {
                fields.push((key.to_string(), value.clone(), true));
            }
        }

        fields
    }

    fn apply_fields(&mut self, fields: Vec<(String, Value, bool)>) -> Result<(), MsgError> {
        let mut properties = ObjectMap::new();

        for (name, value, user_defined) in fields {
            if user_defined {
                properties.insert(name, value);
                continue;
            }
            self.apply_header_field(&name, value)?;
        }

        self.set_properties(Value::Object(properties));
        Ok(())
    }

    fn apply_header_field(&mut self, name: &str, value: Value) -> Result<(), MsgError> {
        let string = |v: &Value| {
            v.get_string()
                .map(str::to_string)
                .map_err(|e| MsgError::field(name, e.to_string()))
        };
        let int32 = |v: &Value| {
            v.get_int32()
                .map_err(|e| MsgError::field(name, e.to_string()))
        };

        match name {
            "type" => {
                let tag = string(&value)?;
                let ty = MsgType::from_str_opt(&tag).ok_or_else(|| MsgError::UnknownType(tag))?;
                if payload_class(ty) != payload_class(self.msg_type()) {
                    return Err(MsgError::field(
                        name,
                        format!("cannot retype {} as {ty}", self.msg_type()),
                    ));
                }
                self.set_msg_type(ty);
            }
            "name" => {
                let s = string(&value)?;
                self.set_name(s);
            }
            "src" => self.set_src(location_from_value(name, &value)?),
            "dest" => {
                let Some(items) = value.as_array() else {
                    return Err(MsgError::field(name, "not an array"));
                };
                let mut dests = Vec::with_capacity(items.len());
                for item in items {
                    dests.push(location_from_value(name, item)?);
                }
                self.set_dests(dests);
            }
            "timestamp" => {
                let us = value
                    .get_int64()
                    .map_err(|e| MsgError::field(name, e.to_string()))?;
                self.set_timestamp_us(us);
            }
            "cmd_id" => {
                let s = string(&value)?;
                self.set_cmd_id(s);
            }
            "seq_id" => {
                let s = string(&value)?;
                self.set_seq_id(s);
            }
            "status_code" => {
                let code = value
                    .get_uint8()
                    .map_err(|e| MsgError::field(name, e.to_string()))?;
                let status = weft_types::StatusCode::try_from(code)
                    .map_err(|e| MsgError::field(name, e))?;
                if let Payload::CmdResult(r) = self.payload_mut() {
                    r.status = status;
                }
            }
            "is_final" => {
                let b = value
                    .get_bool()
                    .map_err(|e| MsgError::field(name, e.to_string()))?;
                if let Payload::CmdResult(r) = self.payload_mut() {
                    r.is_final = b;
                }
            }
            "buf" => {
                let bytes = value
                    .get_buf()
                    .map_err(|e| MsgError::field(name, e.to_string()))?
                    .to_vec();
                self.set_buf(bytes);
            }
            "frame_timestamp" => {
                let us = value
                    .get_int64()
                    .map_err(|e| MsgError::field(name, e.to_string()))?;
                match self.payload_mut() {
                    Payload::AudioFrame(a) => a.timestamp = us,
                    Payload::VideoFrame(v) => v.timestamp = us,
                    _ => {}
                }
            }
            "sample_rate" => {
                let n = int32(&value)?;
                if let Payload::AudioFrame(a) = self.payload_mut() {
                    a.sample_rate = n;
                }
            }
            "channels" => {
                let n = int32(&value)?;
                if let Payload::AudioFrame(a) = self.payload_mut() {
                    a.channels = n;
                }
            }
            "bytes_per_sample" => {
                let n = int32(&value)?;
                if let Payload::AudioFrame(a) = self.payload_mut() {
                    a.bytes_per_sample = n;
                }
            }
            "samples_per_channel" => {
                let n = int32(&value)?;
                if let Payload::AudioFrame(a) = self.payload_mut() {
                    a.samples_per_channel = n;
                }
            }
            "width" => {
                let n = int32(&value)?;
                if let Payload::VideoFrame(v) = self.payload_mut() {
                    v.width = n;
                }
            }
            "height" => {
                let n = int32(&value)?;
                if let Payload::VideoFrame(v) = self.payload_mut() {
                    v.height = n;
                }
            }
            "pixel_format" => {
                let s = string(&value)?;
                let fmt = crate::message::PixelFormat::from_str_opt(&s)
                    .ok_or_else(|| MsgError::field(name, format!("unknown pixel format '{s}'")))?;
                if let Payload::VideoFrame(v) = self.payload_mut() {
                    v.pixel_format = fmt;
                }
            }
            other => return Err(MsgError::field(other, "unknown header field")),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_types::StatusCode;

    #[test]
    fn visits_header_then_properties() {
        let mut cmd = Message::cmd("ping");
        cmd.set_property("retries", Value::from(3i64)).unwrap();
        cmd.set_property("mode", Value::from("fast")).unwrap();

        let mut seen = Vec::new();
        cmd.for_each_field(|field| {
            seen.push((field.name.to_string(), field.user_defined));
            Ok(())
        })
        .unwrap();

        let header: Vec<&str> = seen
            .iter()
            .filter(|(_, user)| !user)
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(
            header,
            ["type", "name", "src", "dest", "timestamp", "cmd_id", "seq_id"]
        );

        let user: Vec<&str> = seen
            .iter()
            .filter(|(_, user)| *user)
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(user, ["retries", "mode"]);
    }

    #[test]
    fn mutations_are_written_back() {
        let mut cmd = Message::cmd("ping");
        cmd.set_seq_id("1");
        cmd.for_each_field(|field| {
            if field.name == "seq_id" {
                *field.value = Value::from("42");
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(cmd.seq_id(), Some("42"));
    }

    #[test]
    fn property_mutations_survive_write_back() {
        let mut cmd = Message::cmd("ping");
        cmd.set_property("n", Value::from(1i64)).unwrap();
        cmd.for_each_field(|field| {
            if field.user_defined && field.name == "n" {
                *field.value = Value::from(2i64);
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(cmd.peek_property("n").unwrap().get_int64().unwrap(), 2);
    }

    #[test]
    fn result_fields_are_visited() {
        let mut result = Message::cmd_result(StatusCode::Timeout).with_is_final(false);
        let mut saw_status = false;
        let mut saw_final = false;
        result
            .for_each_field(|field| {
                match field.name {
                    "status_code" => {
                        saw_status = true;
                        assert_eq!(field.value.get_uint8().unwrap(), 5);
                    }
                    "is_final" => {
                        saw_final = true;
                        assert_eq!(field.value.get_bool().unwrap(), false);
                    }
                    _ => {}
                }
                Ok(())
            })
            .unwrap();
        assert!(saw_status && saw_final);
    }

    #[test]
    fn invalid_write_back_is_rejected() {
        let mut cmd = Message::cmd("ping");
        let err = cmd
            .for_each_field(|field| {
                if field.name == "name" {
                    *field.value = Value::from(1i64);
                }
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, MsgError::Field { .. }));
    }

    #[test]
    fn callback_errors_propagate() {
        let mut cmd = Message::cmd("ping");
        let err = cmd
            .for_each_field(|field| {
                if field.name == "cmd_id" {
                    Err(MsgError::field("cmd_id", "rejected"))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();
        assert!(matches!(err, MsgError::Field { .. }));
    }

    #[test]
    fn data_frame_buf_is_visited_as_buf_value() {
        let mut data = Message::data("d").with_buf(vec![1, 2]);
        data.for_each_field(|field| {
            if field.name == "buf" {
                assert_eq!(field.value.get_buf().unwrap(), &[1, 2]);
            }
            Ok(())
        })
        .unwrap();
    }
}
