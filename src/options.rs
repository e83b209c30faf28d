use crate::codec::Encoding;

/// Options for [`JsonContext`](crate::JsonContext). Use
/// [`JsonParserOptionsBuilder`] to create instances of this struct.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JsonParserOptions {
    /// The maximum stack depth, i.e. the maximum nesting level of objects
    /// and arrays. Guards against unbounded recursion on deeply nested or
    /// adversarial input regardless of how large the caller's buffer is.
    pub(super) max_depth: usize,

    /// The encoding to assume if the input does not start with a BOM. `None`
    /// means the parser falls back to [`Encoding::Unknown`] (ASCII-compatible
    /// passthrough), matching the plain BOM-sniffing rule.
    pub(super) assumed_encoding: Option<Encoding>,
}

/// A builder for [`JsonParserOptions`]
///
/// ```rust
/// use arenajson::JsonParserOptionsBuilder;
///
/// let options = JsonParserOptionsBuilder::default()
///     .with_max_depth(16)
///     .build();
/// assert_eq!(options.max_depth(), 16);
/// ```
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct JsonParserOptionsBuilder {
    options: JsonParserOptions,
}

impl Default for JsonParserOptions {
    /// Returns default JSON parser options
    fn default() -> Self {
        Self {
            max_depth: 2048,
            assumed_encoding: None,
        }
    }
}

impl JsonParserOptions {
    /// Returns the maximum stack depth
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns the encoding assumed in the absence of a BOM
    pub fn assumed_encoding(&self) -> Option<Encoding> {
        self.assumed_encoding
    }
}

impl JsonParserOptionsBuilder {
    /// Set the maximum stack depth. Pushing a frame past this depth is
    /// treated the same as the arena running out of room: the context
    /// transitions to [`ParseErrorKind::InsufficientMemory`](crate::ParseErrorKind::InsufficientMemory),
    /// even though growing the buffer will not help; only a caller willing
    /// to raise `max_depth` can recover.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.options.max_depth = max_depth;
        self
    }

    /// Assume the given encoding when no BOM is present, instead of falling
    /// back to [`Encoding::Unknown`].
    pub fn with_assumed_encoding(mut self, encoding: Encoding) -> Self {
        self.options.assumed_encoding = Some(encoding);
        self
    }

    /// Create a new [`JsonParserOptions`] object
    pub fn build(self) -> JsonParserOptions {
        self.options
    }
}
