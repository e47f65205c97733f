//! The structured form (spec §4.1.1): a `serde_json::Value` object with
//! short keys (`"i"` items, `"r"` reftime, `"s"` source, `"n"` notes),
//! each item rendered as its `Display` string and parsed back through
//! the same per-style parsers [`crate::codec::text`] uses. Meant for
//! embedding metadata in JSON-based tooling rather than for the wire.

use serde_json::{json, Map, Value};

use crate::codec::text;
use crate::error::{Error, Result};
use crate::metadata::{Metadata, Note, Reftime, Source};
use crate::types::{Code, Item};

fn encode_item_value(item: &Item) -> Value {
    Value::String(item.to_string())
}

fn decode_item_value(code: Code, value: &str) -> Result<Item> {
    // delegate to the text codec's style parsers by reconstructing the
    // "Key: value" line they expect.
    let line = format!("{}: {}", capitalize(code.name()), value);
    let md = text::decode_record(&line)?;
    md.items()
        .first()
        .cloned()
        .ok_or_else(|| Error::Codec(format!("structured item decoded to nothing: {:?}", value)))
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        Some(first) => first.to_uppercase().collect::<String>() + c.as_str(),
        None => String::new(),
    }
}

fn encode_reftime_value(r: &Reftime) -> Value {
    match r {
        Reftime::Position(t) => Value::String(t.to_string()),
        Reftime::Period(a, b) => json!([a.to_string(), b.to_string()]),
    }
}

fn decode_reftime_value(value: &Value) -> Result<Reftime> {
    match value {
        Value::String(s) => text::decode_record(&format!("Reftime: {}", s))?
            .reftime()
            .cloned()
            .ok_or_else(|| Error::Codec("missing reftime after decode".into())),
        Value::Array(items) if items.len() == 2 => {
            let a = items[0]
                .as_str()
                .ok_or_else(|| Error::Codec("reftime period bound must be a string".into()))?;
            let b = items[1]
                .as_str()
                .ok_or_else(|| Error::Codec("reftime period bound must be a string".into()))?;
            text::decode_record(&format!("Reftime: {} to {}", a, b))?
                .reftime()
                .cloned()
                .ok_or_else(|| Error::Codec("missing reftime after decode".into()))
        }
        other => Err(Error::Codec(format!("malformed reftime value {:?}", other))),
    }
}

fn encode_source_value(s: &Source) -> Value {
    // reuse the text codec's own Source rendering by round-tripping
    // through a one-field record.
    let mut md = Metadata::new();
    md.set_source(s.clone());
    let line = text::encode_record(&md);
    let rendered = line
        .lines()
        .find_map(|l| l.strip_prefix("Source: "))
        .unwrap_or("")
        .to_string();
    Value::String(rendered)
}

fn decode_source_value(value: &Value) -> Result<Source> {
    let s = value
        .as_str()
        .ok_or_else(|| Error::Codec("source value must be a string".into()))?;
    text::decode_record(&format!("Source: {}", s))?
        .source()
        .cloned()
        .ok_or_else(|| Error::Codec("missing source after decode".into()))
}

/// Encode a record as a `serde_json::Value` object.
pub fn encode_metadata(md: &Metadata) -> Value {
    let mut obj = Map::new();
    if let Some(reftime) = md.reftime() {
        obj.insert("r".into(), encode_reftime_value(reftime));
    }
    if let Some(source) = md.source() {
        obj.insert("s".into(), encode_source_value(source));
    }
    if !md.notes().is_empty() {
        obj.insert(
            "n".into(),
            Value::Array(
                md.notes()
                    .iter()
                    .map(|note| json!({"t": note.time.to_string(), "v": note.text}))
                    .collect(),
            ),
        );
    }
    let mut items = Map::new();
    for item in md.items() {
        items.insert(item.code().name().to_string(), encode_item_value(item));
    }
    obj.insert("i".into(), Value::Object(items));
    Value::Object(obj)
}

/// Decode a record from its `serde_json::Value` object form.
pub fn decode_metadata(value: &Value) -> Result<Metadata> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::Codec("structured metadata must be a JSON object".into()))?;
    let mut md = Metadata::new();

    if let Some(r) = obj.get("r") {
        md.set_reftime(decode_reftime_value(r)?);
    }
    if let Some(s) = obj.get("s") {
        md.set_source(decode_source_value(s)?);
    }
    if let Some(Value::Array(notes)) = obj.get("n") {
        for note in notes {
            let time_str = note
                .get("t")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Codec("note missing \"t\"".into()))?;
            let text = note
                .get("v")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Codec("note missing \"v\"".into()))?;
            let time = text::decode_record(&format!("Reftime: {}", time_str))?
                .reftime()
                .cloned()
                .ok_or_else(|| Error::Codec("malformed note timestamp".into()))?
                .sort_key();
            md.add_note(Note::new(time, text));
        }
    }
    if let Some(Value::Object(items)) = obj.get("i") {
        for (code_name, value) in items {
            let code = Code::from_name(code_name)
                .ok_or_else(|| Error::Codec(format!("unknown structured item key {:?}", code_name)))?;
            let rendered = value
                .as_str()
                .ok_or_else(|| Error::Codec("structured item value must be a string".into()))?;
            md.set(decode_item_value(code, rendered)?);
        }
    }
    Ok(md)
}

#[path = "structured_test.rs"]
#[cfg(test)]
mod structured_test;
