/// The type tag of the value currently held by a [`JsonContext`](crate::JsonContext).
///
/// Set together with the corresponding `*_value` accessor whenever a
/// [`JsonEvent::Value`] is emitted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ValueType {
    /// No value is currently held (e.g. right after a container event).
    #[default]
    None,
    /// [`JsonContext::string_value`](crate::JsonContext::string_value) is set.
    String,
    /// [`JsonContext::integer_value`](crate::JsonContext::integer_value) is set.
    Integer,
    /// [`JsonContext::float_value`](crate::JsonContext::float_value) is set.
    Float,
    /// [`JsonContext::bool_value`](crate::JsonContext::bool_value) is set.
    Bool,
    /// The value is the JSON literal `null`.
    Null,
}

/// The reason parsing cannot continue right now, or cannot continue at all.
///
/// The first two kinds are recoverable: the caller heals them by supplying
/// more input ([`UnexpectedEof`](ParseErrorKind::UnexpectedEof)) or a larger
/// buffer ([`InsufficientMemory`](ParseErrorKind::InsufficientMemory)) and
/// calling [`JsonContext::parse`](crate::JsonContext::parse) again. The
/// remaining kinds are terminal: the context keeps returning the same error
/// event forever after.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The context was asked to parse a zero-length input window. Terminal.
    InvalidInput,

    /// The arena is full: a new frame or a token byte doesn't fit. Recoverable
    /// by calling [`JsonContext::reallocate`](crate::JsonContext::reallocate)
    /// with a strictly larger buffer.
    InsufficientMemory,

    /// The input window was exhausted in the middle of the document, or in
    /// the middle of a multi-byte code unit. Recoverable by calling
    /// [`JsonContext::parse`](crate::JsonContext::parse) again with the next
    /// chunk of input.
    UnexpectedEof,

    /// A container's closing token doesn't match how it was opened (`]`
    /// closing `{`, or vice versa). Terminal.
    TokenMismatch,

    /// Any other structural violation: an unexpected character, a stray
    /// sign, a second decimal point, a trailing comma, a malformed escape.
    /// Terminal.
    Syntax,

    /// An invariant was violated (e.g. a state that expects a frame on the
    /// stack found none). Indicates a bug in the parser itself. Terminal.
    Internal,
}

/// The return value of [`JsonContext::parse`](crate::JsonContext::parse),
/// the parser's only output channel besides the mutated context fields.
///
/// Events are emitted in strict document order: opens before contents before
/// closes, and for every name/value pair, [`Name`](JsonEvent::Name) precedes
/// [`Value`](JsonEvent::Value).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JsonEvent {
    /// The root container has been closed. Parsing is complete; further
    /// calls to `parse` keep returning this event.
    EndOfDocument,

    /// `name` is set. Always followed by a [`Value`](JsonEvent::Value) or a
    /// container-begin event for the same name.
    Name,

    /// `value_type` plus the matching typed accessor is set. `name` is set
    /// if the value lives inside an object, `None` inside an array.
    Value,

    /// A new object has begun. `name` is set iff the object is named.
    ObjectBegin,

    /// An object has been closed. `name` is set iff the object was named.
    ObjectEnd,

    /// A new array has begun. `name` is set iff the array is named.
    ArrayBegin,

    /// An array has been closed. `name` is set iff the array was named.
    ArrayEnd,

    /// Parsing cannot proceed; see [`ParseErrorKind`] for whether it can be
    /// recovered from.
    Error(ParseErrorKind),
}

impl JsonEvent {
    /// `true` if this event is an error that the caller can heal by
    /// supplying more input or a larger buffer and calling `parse` again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            JsonEvent::Error(ParseErrorKind::InsufficientMemory)
                | JsonEvent::Error(ParseErrorKind::UnexpectedEof)
        )
    }
}
