//! JSON and JSON-lines.
//!
//! A `json` file is one array of objects. A `jsonl` file holds one object
//! per line; blank lines are skipped. Keys become columns in first-seen
//! order.

use ferry_convert::{Codec, CodecError, EngineBuilder, Params, Plugin};
use ferry_resource::{FormatId, Records};
use serde_json::{Map, Value};

/// The `json` format.
pub const JSON: FormatId = FormatId::new("json");
/// The `jsonl` format.
pub const JSON_LINES: FormatId = FormatId::new("jsonl");

fn syntax(format: FormatId, line: Option<usize>, message: impl Into<String>) -> CodecError {
    CodecError::Syntax {
        format,
        line,
        message: message.into(),
    }
}

fn from_serde(format: FormatId, err: &serde_json::Error) -> CodecError {
    syntax(format, Some(err.line()).filter(|&l| l > 0), err.to_string())
}

/// [`Codec`] for a JSON array of objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn format(&self) -> FormatId {
        JSON
    }

    fn extensions(&self) -> &[&'static str] {
        &["json"]
    }

    fn decode(&self, bytes: &[u8], _params: &Params) -> Result<Records, CodecError> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| from_serde(JSON, &e))?;
        let Value::Array(items) = value else {
            return Err(syntax(JSON, None, "expected an array of objects"));
        };
        let mut records = Records::default();
        for (i, item) in items.iter().enumerate() {
            let Value::Object(object) = item else {
                return Err(syntax(JSON, None, format!("element {i} is not an object")));
            };
            records.push_object(object);
        }
        Ok(records)
    }

    fn encode(&self, records: &Records, params: &Params) -> Result<Vec<u8>, CodecError> {
        let maps = records.to_maps();
        let pretty = params.get("pretty").is_some_and(|v| v == "true");
        let encoded = if pretty {
            serde_json::to_vec_pretty(&maps)
        } else {
            serde_json::to_vec(&maps)
        };
        encoded.map_err(|err| CodecError::Unrepresentable {
            format: JSON,
            message: err.to_string(),
        })
    }
}

/// [`Codec`] for newline-delimited JSON objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesCodec;

impl Codec for JsonLinesCodec {
    fn format(&self) -> FormatId {
        JSON_LINES
    }

    fn extensions(&self) -> &[&'static str] {
        &["jsonl", "ndjson"]
    }

    fn decode(&self, bytes: &[u8], _params: &Params) -> Result<Records, CodecError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|err| syntax(JSON_LINES, None, err.to_string()))?;
        let mut records = Records::default();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let object: Map<String, Value> = serde_json::from_str(line)
                .map_err(|err| syntax(JSON_LINES, Some(i + 1), err.to_string()))?;
            records.push_object(&object);
        }
        Ok(records)
    }

    fn encode(&self, records: &Records, _params: &Params) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        for map in records.to_maps() {
            serde_json::to_writer(&mut out, &map).map_err(|err| CodecError::Unrepresentable {
                format: JSON_LINES,
                message: err.to_string(),
            })?;
            out.push(b'\n');
        }
        Ok(out)
    }
}

/// Registers [`JsonCodec`] and [`JsonLinesCodec`].
#[derive(Debug, Default)]
pub struct JsonPlugin;

impl Plugin for JsonPlugin {
    fn build(&self, builder: &mut EngineBuilder) {
        builder
            .register_codec(JsonCodec)
            .register_codec(JsonLinesCodec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_array_of_objects() {
        let records = JsonCodec
            .decode(br#"[{"a": 1, "b": "x"}, {"b": "y", "c": null}]"#, &Params::new())
            .unwrap();
        assert_eq!(records.columns(), ["a", "b", "c"]);
        assert_eq!(records.rows()[1], vec![Value::Null, json!("y"), Value::Null]);

        let out = JsonCodec.encode(&records, &Params::new()).unwrap();
        let back = JsonCodec.decode(&out, &Params::new()).unwrap();
        assert_eq!(back.to_maps(), records.to_maps());
    }

    #[test]
    fn json_rejects_non_arrays() {
        assert!(matches!(
            JsonCodec.decode(br#"{"a": 1}"#, &Params::new()),
            Err(CodecError::Syntax { .. })
        ));
        assert!(matches!(
            JsonCodec.decode(b"[1, 2]", &Params::new()),
            Err(CodecError::Syntax { .. })
        ));
        let err = JsonCodec.decode(b"[\n{\"a\": }\n]", &Params::new()).unwrap_err();
        assert!(matches!(err, CodecError::Syntax { line: Some(2), .. }), "{err}");
    }

    #[test]
    fn json_lines_skip_blank_lines() {
        let records = JsonLinesCodec
            .decode(b"{\"name\":\"Alice\",\"balance\":100}\n\n{\"name\":\"Bob\",\"balance\":200}\n", &Params::new())
            .unwrap();
        assert_eq!(records.len(), 2);
        let out = JsonLinesCodec.encode(&records, &Params::new()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"name\":\"Alice\",\"balance\":100}\n{\"name\":\"Bob\",\"balance\":200}\n"
        );
    }

    #[test]
    fn json_lines_report_the_bad_line() {
        let err = JsonLinesCodec
            .decode(b"{\"a\":1}\nnot json\n", &Params::new())
            .unwrap_err();
        assert!(matches!(err, CodecError::Syntax { line: Some(2), .. }));
    }
}
