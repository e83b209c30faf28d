//! # arenajson
//!
//! An incremental, pull-style JSON parser with no internal dynamic
//! allocation. All working memory -- the nesting stack, and the bytes of
//! whatever name or value is currently being read -- lives inside a single
//! buffer the caller supplies and can grow on demand. This makes it a good
//! fit for constrained environments where a `Vec`-backed parser is
//! undesirable, and for any caller that wants full control over when and how
//! memory is allocated.
//!
//! ## Example
//!
//! ```
//! use arenajson::{JsonContext, JsonEvent, ValueType};
//!
//! let json = r#"{"name": "Elvis", "age": 42}"#.as_bytes();
//!
//! let mut buf = [0u8; 256];
//! let mut ctx = JsonContext::new(&mut buf);
//!
//! loop {
//!     match ctx.parse(json) {
//!         JsonEvent::EndOfDocument => break,
//!         JsonEvent::Error(kind) => panic!("parse error: {kind:?}"),
//!         JsonEvent::Value if ctx.value_type() == ValueType::String => {
//!             println!("{} = {}", ctx.name().unwrap().unwrap(), ctx.string_value().unwrap().unwrap());
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Feeding chunks incrementally
//!
//! A caller that only has part of the document at a time keeps calling
//! [`JsonContext::parse`] with the same slice until it reports
//! [`ParseErrorKind::UnexpectedEof`](event::ParseErrorKind::UnexpectedEof),
//! then supplies a new slice with more bytes:
//!
//! ```
//! use arenajson::{JsonContext, JsonEvent, ParseErrorKind};
//!
//! let chunks: [&[u8]; 2] = [br#"{"a":"#, br#"1}"#];
//! let mut buf = [0u8; 64];
//! let mut ctx = JsonContext::new(&mut buf);
//!
//! let mut events = vec![];
//! for chunk in chunks {
//!     loop {
//!         match ctx.parse(chunk) {
//!             JsonEvent::Error(ParseErrorKind::UnexpectedEof) => break,
//!             JsonEvent::EndOfDocument => break,
//!             ev => events.push(ev),
//!         }
//!     }
//! }
//! assert_eq!(events, vec![JsonEvent::ObjectBegin, JsonEvent::Name, JsonEvent::Value]);
//! ```
//!
//! ## Growing the buffer on demand
//!
//! If the buffer is too small for the document at hand, `parse` reports
//! [`ParseErrorKind::InsufficientMemory`](event::ParseErrorKind::InsufficientMemory).
//! The caller heals this by calling [`JsonContext::reallocate`] with a
//! strictly larger buffer and retrying the same input:
//!
//! ```
//! use arenajson::{JsonContext, JsonEvent, ParseErrorKind};
//!
//! let json = br#"{"a": "a string longer than the tiny initial buffer"}"#;
//! let mut small = [0u8; 8];
//! let mut ctx = JsonContext::new(&mut small);
//!
//! let mut big = [0u8; 256];
//! loop {
//!     match ctx.parse(json) {
//!         JsonEvent::Error(ParseErrorKind::InsufficientMemory) => {
//!             ctx.reallocate(&mut big).unwrap();
//!         }
//!         JsonEvent::EndOfDocument => break,
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Parsing into a Serde JSON Value
//!
//! For testing and compatibility reasons, arenajson is able to parse a byte
//! slice into a [Serde JSON](https://github.com/serde-rs/json) `Value`, for
//! callers who don't need buffer-resident parsing and just want a quick,
//! allocating convenience function.
//!
//! Heads up: you need to enable the `serde_json` feature for this.
//!
//! ```
//! use arenajson::serde_json::from_slice;
//!
//! let json = r#"{"name": "Elvis"}"#.as_bytes();
//! let value = from_slice(json).unwrap();
//!
//! assert!(value.is_object());
//! assert_eq!(value["name"], "Elvis");
//! ```
//!
//! However, if you find yourself doing this, you're most likely better off
//! using Serde JSON directly -- the whole point of arenajson is to avoid
//! building a `Value` tree in the first place.

mod arena;
mod codec;
mod event;
mod options;
mod parser;

#[cfg(feature = "serde_json")]
pub mod serde_json;

pub use arena::GrowError;
pub use codec::Encoding;
pub use event::{JsonEvent, ParseErrorKind, ValueType};
pub use options::{JsonParserOptions, JsonParserOptionsBuilder};
pub use parser::{InvalidIntValueError, JsonContext};
