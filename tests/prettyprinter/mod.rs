use std::str::Utf8Error;

use arenajson::{InvalidIntValueError, JsonContext, JsonEvent, ValueType};
use thiserror::Error;

enum Type {
    Object,
    Array,
}

/// An error that can happen when pretty-printing a JSON string: either a
/// name/string value isn't valid UTF-8 in the active encoding, or an integer
/// value doesn't fit the target type.
#[derive(Error, Debug)]
pub enum PrettyPrintError {
    #[error("{0}")]
    InvalidUtf8(#[from] Utf8Error),

    #[error("{0}")]
    InvalidIntValue(#[from] InvalidIntValueError),
}

/// Demonstrates how you can use [`JsonContext`] to pretty-print a JSON
/// object or array. Note: this is not a perfect implementation of a
/// pretty-printer. The output could still be nicer.
pub struct PrettyPrinter {
    result: String,
    types: Vec<Type>,
    element_counts: Vec<i32>,
    level: i32,
}

impl PrettyPrinter {
    pub fn new() -> Self {
        PrettyPrinter {
            result: String::new(),
            types: vec![],
            element_counts: vec![],
            level: 0,
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.level {
            self.result.push_str("  ");
        }
    }

    fn on_start_object(&mut self) {
        self.on_value();
        self.result.push_str("{\n");
        self.level += 1;
        self.indent();
        self.element_counts.push(0);
        self.types.push(Type::Object);
    }

    fn on_end_object(&mut self) {
        self.level -= 1;
        self.result.push('\n');
        self.indent();
        self.result.push('}');
        self.element_counts.pop();
        self.types.pop();
    }

    fn on_start_array(&mut self) {
        self.on_value();
        self.result.push_str("[\n");
        self.level += 1;
        self.indent();
        self.element_counts.push(0);
        self.types.push(Type::Array);
    }

    fn on_end_array(&mut self) {
        self.level -= 1;
        self.result.push('\n');
        self.indent();
        self.result.push(']');
        self.element_counts.pop();
        self.types.pop();
    }

    fn on_field_name(&mut self, name: &str) {
        if let Some(last) = self.element_counts.last() {
            if *last > 0 {
                self.result.push_str(",\n");
                self.indent();
            }
        }

        self.result.push('"');
        self.result.push_str(name);
        self.result.push_str("\": ");

        if let Some(last) = self.element_counts.pop() {
            self.element_counts.push(last + 1);
        }
    }

    fn on_value(&mut self) {
        if let Some(Type::Array) = self.types.last() {
            if let Some(last) = self.element_counts.pop() {
                if last > 0 {
                    self.result.push_str(", ");
                }
                self.element_counts.push(last + 1);
            }
        }
    }

    fn on_value_string(&mut self, value: &str) {
        self.on_value();
        self.result.push('"');
        self.result.push_str(value);
        self.result.push('"');
    }

    fn on_value_int<I>(&mut self, value: I)
    where
        I: ToString,
    {
        self.on_value();
        self.result.push_str(&value.to_string());
    }

    fn on_value_float(&mut self, value: f64) {
        self.on_value();
        let mut buf = dtoa::Buffer::new();
        self.result.push_str(buf.format(value));
    }

    fn on_value_bool(&mut self, value: bool) {
        self.on_value();
        self.result.push_str(&value.to_string());
    }

    fn on_value_null(&mut self) {
        self.on_value();
        self.result.push_str("null");
    }

    pub fn on_event(
        &mut self,
        event: JsonEvent,
        ctx: &JsonContext,
    ) -> Result<(), PrettyPrintError> {
        if matches!(
            event,
            JsonEvent::Name
                | JsonEvent::Value
                | JsonEvent::ObjectBegin
                | JsonEvent::ArrayBegin
                | JsonEvent::ObjectEnd
                | JsonEvent::ArrayEnd
        ) {
            if let Some(name) = ctx.name() {
                if !matches!(event, JsonEvent::Name) {
                    self.on_field_name(name?);
                }
            }
        }

        match event {
            JsonEvent::Name => {}
            JsonEvent::ObjectBegin => self.on_start_object(),
            JsonEvent::ObjectEnd => self.on_end_object(),
            JsonEvent::ArrayBegin => self.on_start_array(),
            JsonEvent::ArrayEnd => self.on_end_array(),
            JsonEvent::Value => match ctx.value_type() {
                ValueType::String => self.on_value_string(ctx.string_value().unwrap()?),
                ValueType::Integer => self.on_value_int(ctx.integer_value::<i64>()?),
                ValueType::Float => self.on_value_float(ctx.float_value()),
                ValueType::Bool => self.on_value_bool(ctx.bool_value()),
                ValueType::Null => self.on_value_null(),
                ValueType::None => {}
            },
            JsonEvent::EndOfDocument | JsonEvent::Error(_) => {}
        }
        Ok(())
    }

    pub fn get_result(&self) -> &str {
        &self.result
    }
}
