//! Convenience integration with [`serde_json`], enabled via the `serde_json`
//! feature. This is not part of the no-allocation hot path: it builds a full
//! [`Value`] tree and allocates freely. It exists for testing against
//! `serde_json` itself and for callers who don't need buffer-resident
//! parsing and just want a quick, allocating convenience function.

use serde_json::{Map, Number, Value};

use crate::{JsonContext, JsonEvent, ParseErrorKind, ValueType};

/// The input could not be parsed as JSON.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("invalid JSON input")]
pub struct ParserError;

/// Parse a byte slice into a Serde JSON [`Value`].
///
/// ```
/// use serde_json::json;
/// use arenajson::serde_json::from_slice;
///
/// let json = r#"{"name": "Elvis"}"#.as_bytes();
/// let expected = json!({
///     "name": "Elvis"
/// });
/// let actual = from_slice(json).unwrap();
/// assert_eq!(expected, actual);
/// ```
pub fn from_slice(v: &[u8]) -> Result<Value, ParserError> {
    from_slice_with_capacity(v, v.len().max(64) + 64)
}

/// Retries with a doubled buffer on `InsufficientMemory` rather than growing
/// the existing one in place -- simpler than threading a second buffer
/// binding through for a convenience function that already holds the whole
/// input in memory.
fn from_slice_with_capacity(v: &[u8], capacity: usize) -> Result<Value, ParserError> {
    let mut buf = vec![0u8; capacity];
    let mut ctx = JsonContext::new(&mut buf);

    let mut stack: Vec<(Option<String>, Value)> = vec![];
    let mut result = None;

    loop {
        match ctx.parse(v) {
            JsonEvent::Error(ParseErrorKind::InsufficientMemory) => {
                return from_slice_with_capacity(v, capacity * 2);
            }
            JsonEvent::Error(_) => return Err(ParserError),

            JsonEvent::Name => {}

            JsonEvent::ObjectBegin => stack.push((name_of(&ctx), Value::Object(Map::new()))),
            JsonEvent::ArrayBegin => stack.push((name_of(&ctx), Value::Array(vec![]))),

            JsonEvent::ObjectEnd | JsonEvent::ArrayEnd => {
                let (key, finished) = stack.pop().expect("container end without a begin");
                push_value(&mut stack, &mut result, key, finished)?;
            }

            JsonEvent::Value => {
                let key = name_of(&ctx);
                let value = to_value(&ctx).ok_or(ParserError)?;
                push_value(&mut stack, &mut result, key, value)?;
            }

            JsonEvent::EndOfDocument => break,
        }
    }

    result.ok_or(ParserError)
}

fn name_of(ctx: &JsonContext) -> Option<String> {
    ctx.name().and_then(Result::ok).map(str::to_owned)
}

fn to_value(ctx: &JsonContext) -> Option<Value> {
    match ctx.value_type() {
        ValueType::String => ctx
            .string_value()
            .and_then(Result::ok)
            .map(|s| Value::String(s.to_owned())),
        ValueType::Integer => ctx
            .integer_value::<i64>()
            .ok()
            .map(|i| Value::Number(Number::from(i))),
        ValueType::Float => Number::from_f64(ctx.float_value()).map(Value::Number),
        ValueType::Bool => Some(Value::Bool(ctx.bool_value())),
        ValueType::Null => Some(Value::Null),
        ValueType::None => None,
    }
}

fn push_value(
    stack: &mut Vec<(Option<String>, Value)>,
    result: &mut Option<Value>,
    key: Option<String>,
    value: Value,
) -> Result<(), ParserError> {
    match stack.last_mut() {
        Some((_, Value::Object(m))) => {
            m.insert(key.ok_or(ParserError)?, value);
        }
        Some((_, Value::Array(a))) => a.push(value),
        Some(_) => unreachable!("stack only ever holds objects and arrays"),
        None => *result = Some(value),
    }
    Ok(())
}
