//! Comma-separated values.
//!
//! Cells are typed on decode: empty cells become null, then integers,
//! finite floats and `true`/`false` are recognized, and anything else stays
//! a string. Encoding writes scalars as their text form and nested values as
//! JSON.
//!
//! Parameters:
//!
//! | name        | default | meaning                                   |
//! |-------------|---------|-------------------------------------------|
//! | `delimiter` | `,`     | single ASCII field separator; `\t` is tab |
//! | `header`    | `true`  | first line holds column names             |

use ferry_convert::{Codec, CodecError, EngineBuilder, Params, Plugin};
use ferry_resource::{FormatId, Records};
use serde_json::{Number, Value};

/// The `csv` format.
pub const CSV: FormatId = FormatId::new("csv");

/// [`Codec`] for CSV.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvCodec;

struct Dialect {
    delimiter: u8,
    header: bool,
}

impl Dialect {
    fn from_params(params: &Params) -> Result<Self, CodecError> {
        let delimiter = match params.get("delimiter").map(String::as_str) {
            None => b',',
            Some("\\t" | "tab") => b'\t',
            Some(value) => match value.as_bytes() {
                [byte] if byte.is_ascii() => *byte,
                _ => {
                    return Err(CodecError::Parameter {
                        name: "delimiter".into(),
                        message: format!("expected one ASCII character, got '{value}'"),
                    });
                }
            },
        };
        let header = match params.get("header").map(|v| v.to_ascii_lowercase()) {
            None => true,
            Some(value) => match value.as_str() {
                "true" | "yes" | "1" => true,
                "false" | "no" | "0" => false,
                _ => {
                    return Err(CodecError::Parameter {
                        name: "header".into(),
                        message: format!("expected true or false, got '{value}'"),
                    });
                }
            },
        };
        Ok(Self { delimiter, header })
    }
}

fn syntax(err: &::csv::Error) -> CodecError {
    CodecError::Syntax {
        format: CSV,
        line: err
            .position()
            .and_then(|pos| usize::try_from(pos.line()).ok()),
        message: err.to_string(),
    }
}

/// Types one cell.
fn parse_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = cell.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = cell.parse::<f64>()
        && let Some(number) = Number::from_f64(float)
    {
        return Value::Number(number);
    }
    match cell {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested @ (Value::Array(_) | Value::Object(_)) => nested.to_string(),
    }
}

impl Codec for CsvCodec {
    fn format(&self) -> FormatId {
        CSV
    }

    fn extensions(&self) -> &[&'static str] {
        &["csv"]
    }

    fn decode(&self, bytes: &[u8], params: &Params) -> Result<Records, CodecError> {
        let dialect = Dialect::from_params(params)?;
        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(dialect.delimiter)
            .has_headers(dialect.header)
            .flexible(true)
            .from_reader(bytes);

        let mut records = if dialect.header {
            let headers = reader.headers().map_err(|e| syntax(&e))?;
            Records::new(headers.iter())
        } else {
            Records::default()
        };

        for row in reader.records() {
            let row = row.map_err(|e| syntax(&e))?;
            // Headerless rows widen the table with positional column names.
            records.push_row(row.iter().map(parse_cell).collect());
        }
        Ok(records)
    }

    fn encode(&self, records: &Records, params: &Params) -> Result<Vec<u8>, CodecError> {
        let dialect = Dialect::from_params(params)?;
        let mut writer = ::csv::WriterBuilder::new()
            .delimiter(dialect.delimiter)
            .from_writer(Vec::new());
        let unrepresentable = |err: ::csv::Error| CodecError::Unrepresentable {
            format: CSV,
            message: err.to_string(),
        };

        if dialect.header {
            writer.write_record(records.columns()).map_err(unrepresentable)?;
        }
        for row in records.rows() {
            writer
                .write_record(row.iter().map(render_cell))
                .map_err(unrepresentable)?;
        }
        writer.into_inner().map_err(|err| CodecError::Unrepresentable {
            format: CSV,
            message: err.error().to_string(),
        })
    }
}

/// Registers [`CsvCodec`].
#[derive(Debug, Default)]
pub struct CsvPlugin;

impl Plugin for CsvPlugin {
    fn build(&self, builder: &mut EngineBuilder) {
        builder.register_codec(CsvCodec);
    }
}
