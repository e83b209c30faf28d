//! The state machine that drives [`JsonContext`], the parser's entry point.

use std::fmt;

use btoi::btoi;
use num_traits::FromPrimitive;

use crate::arena::{flags, Arena, ArenaFull, FrameRef, GrowError};
use crate::codec::{self, DecodeOutcome, Encoding, MAX_CODE_UNIT_LEN};
use crate::event::{JsonEvent, ParseErrorKind, ValueType};
use crate::options::JsonParserOptions;

/// Distinguishes `true` from `false` while either literal chain is being
/// matched; both end up in the same [`State::PostValue`] shape, so this is
/// the only place the two chains need to be told apart.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Literal {
    True,
    False,
}

/// The parser's state. Unlike a table-driven transition matrix keyed by
/// small integers, every case here is a named variant so the match arms in
/// [`JsonContext::step`] read like the grammar they implement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    /// No content seen yet; still deciding on an encoding.
    Start,
    Utf8Bom1,
    Utf8Bom2,
    Utf16BeBom,
    Utf16LeBom,

    NameExpected,
    Name,
    PostName,
    ValueExpected,

    StringValue,
    Escape,
    Unicode1,
    Unicode2,
    Unicode3,
    Unicode4,

    NumberValue,

    TrueR,
    TrueU,
    TrueE,
    FalseA,
    FalseL,
    FalseS,
    FalseE,
    NullU,
    NullL1,
    NullL2,

    PostValue,

    Done,
    Error(ParseErrorKind),
}

/// Error raised when a number token's digits do not fit the target integer
/// type. Mirrors the teacher's dedicated integer/float conversion errors.
#[derive(Debug, thiserror::Error)]
#[error("invalid integer value")]
pub struct InvalidIntValueError;

/// An incremental, buffer-resident JSON parser.
///
/// `JsonContext` never allocates on the [`parse`](JsonContext::parse) path.
/// All working memory -- the nesting stack, and the bytes of whatever name
/// or value is currently being read -- lives in the caller-supplied buffer
/// passed to [`new`](JsonContext::new). When that buffer is too small for
/// the document at hand, `parse` returns
/// [`JsonEvent::Error(ParseErrorKind::InsufficientMemory)`] and the caller
/// heals it by calling [`reallocate`](JsonContext::reallocate) with a larger
/// buffer and trying again.
pub struct JsonContext<'buf> {
    arena: Arena<'buf>,
    options: JsonParserOptions,

    encoding: Encoding,
    state: State,
    literal: Literal,
    escape_return_state: State,
    error_return_state: State,

    /// Bytes of a code unit split across two `parse` calls, plus how many
    /// of them are filled in.
    stream: [u8; MAX_CODE_UNIT_LEN],
    stream_len: usize,
    /// Stream carry-over length as of the most recent `fill_window` call;
    /// used to split a just-decoded scalar's length between the stream and
    /// the current `input` slice.
    pre_consume_stream_len: usize,

    /// Identity (as an address, never dereferenced) of the input slice the
    /// previous call left off in the middle of, so a same-pointer re-entry
    /// can resume mid-slice instead of restarting at the front.
    last_input_ptr: Option<usize>,
    input_pos: usize,

    depth: u32,
    line: u32,
    column: u32,
    /// Tracks `\r\n` so it is counted as a single line break.
    last_was_cr: bool,

    /// `\uXXXX` escape accumulator.
    unicode_accum: u32,

    published_name: Option<(u32, u32)>,
    value_type: ValueType,
    published_string: Option<(u32, u32)>,
    integer_value: i64,
    float_value: f64,
    bool_value: bool,
}

impl fmt::Debug for JsonContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonContext")
            .field("state", &self.state)
            .field("depth", &self.depth)
            .field("line", &self.line)
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

impl<'buf> JsonContext<'buf> {
    /// Create a new context over `buffer`, using default options.
    pub fn new(buffer: &'buf mut [u8]) -> Self {
        Self::with_options(buffer, JsonParserOptions::default())
    }

    /// Create a new context over `buffer` with custom options.
    pub fn with_options(buffer: &'buf mut [u8], options: JsonParserOptions) -> Self {
        JsonContext {
            arena: Arena::new(buffer),
            options,
            encoding: Encoding::Unknown,
            state: State::Start,
            literal: Literal::True,
            escape_return_state: State::StringValue,
            error_return_state: State::Start,
            stream: [0; MAX_CODE_UNIT_LEN],
            stream_len: 0,
            pre_consume_stream_len: 0,
            last_input_ptr: None,
            input_pos: 0,
            depth: 0,
            line: 1,
            column: 0,
            last_was_cr: false,
            unicode_accum: 0,
            published_name: None,
            value_type: ValueType::None,
            published_string: None,
            integer_value: 0,
            float_value: 0.0,
            bool_value: false,
        }
    }

    /// Adopt a strictly larger buffer after an
    /// [`InsufficientMemory`](ParseErrorKind::InsufficientMemory) error,
    /// copying the in-progress nesting stack and token bytes across, and
    /// resuming the state the error interrupted.
    pub fn reallocate(&mut self, new_buffer: &'buf mut [u8]) -> Result<(), GrowError> {
        self.arena.grow(new_buffer)?;
        if self.state == State::Error(ParseErrorKind::InsufficientMemory) {
            self.state = self.error_return_state;
        }
        Ok(())
    }

    /// The current buffer's capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// The options this context was created with.
    pub fn options(&self) -> &JsonParserOptions {
        &self.options
    }

    /// The nesting depth of the container currently being parsed (0 at the
    /// document root, before the first `{`/`[`).
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// The 1-based line of the last code point consumed.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// The 1-based column, within the current line, of the last code point
    /// consumed. Counts code points, not bytes, and does not count the BOM.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// The encoding detected (or assumed) for this document. Unset
    /// ([`Encoding::Unknown`]) until the first byte past a possible BOM has
    /// been examined, and invariant afterwards.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// The type of the value most recently published via
    /// [`JsonEvent::Value`].
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// The raw bytes of the name published alongside the most recent event,
    /// in the document's active encoding. Valid only until the next call to
    /// `parse`.
    pub fn name_bytes(&self) -> Option<&[u8]> {
        self.published_name.map(|(s, l)| self.slice(s, l))
    }

    /// [`name_bytes`](Self::name_bytes) decoded as UTF-8. Fails if the
    /// active encoding is UTF-16; use [`name_bytes`](Self::name_bytes) and
    /// decode with [`encoding`](Self::encoding) in that case.
    pub fn name(&self) -> Option<Result<&str, std::str::Utf8Error>> {
        self.name_bytes().map(std::str::from_utf8)
    }

    /// The raw bytes of the string value published via
    /// [`JsonEvent::Value`], in the document's active encoding.
    pub fn string_value_bytes(&self) -> Option<&[u8]> {
        self.published_string.map(|(s, l)| self.slice(s, l))
    }

    /// [`string_value_bytes`](Self::string_value_bytes) decoded as UTF-8.
    pub fn string_value(&self) -> Option<Result<&str, std::str::Utf8Error>> {
        self.string_value_bytes().map(std::str::from_utf8)
    }

    /// The integer value published via [`JsonEvent::Value`], converted to
    /// `T`. Only meaningful when [`value_type`](Self::value_type) is
    /// [`ValueType::Integer`].
    pub fn integer_value<T: FromPrimitive>(&self) -> Result<T, InvalidIntValueError> {
        T::from_i64(self.integer_value).ok_or(InvalidIntValueError)
    }

    /// The float value published via [`JsonEvent::Value`]. Only meaningful
    /// when [`value_type`](Self::value_type) is [`ValueType::Float`].
    pub fn float_value(&self) -> f64 {
        self.float_value
    }

    /// The bool value published via [`JsonEvent::Value`]. Only meaningful
    /// when [`value_type`](Self::value_type) is [`ValueType::Bool`].
    pub fn bool_value(&self) -> bool {
        self.bool_value
    }

    fn slice(&self, start: u32, len: u32) -> &[u8] {
        &self.arena.raw()[start as usize..(start + len) as usize]
    }

    /// Turn a data sub-slice borrowed from the arena back into an
    /// (offset, len) pair that can outlive the borrow, by comparing
    /// addresses against the arena's own base pointer.
    fn offset_len(&self, data: &[u8]) -> (u32, u32) {
        let base = self.arena.raw().as_ptr() as usize;
        let start = data.as_ptr() as usize - base;
        (start as u32, data.len() as u32)
    }

    /// Feed `input` to the parser and advance until exactly one event can
    /// be reported.
    ///
    /// `input` may be the same slice as the previous call (to keep
    /// consuming a chunk that produced more than one event) or a new one
    /// (once the previous chunk has been fully consumed, signalled by an
    /// [`UnexpectedEof`](ParseErrorKind::UnexpectedEof) error). Passing an
    /// empty slice is a programmer error and returns
    /// [`InvalidInput`](ParseErrorKind::InvalidInput) without touching any
    /// state.
    pub fn parse(&mut self, input: &[u8]) -> JsonEvent {
        if input.is_empty() {
            return JsonEvent::Error(ParseErrorKind::InvalidInput);
        }

        self.run_deferred_actions();

        if self.state == State::Done {
            return JsonEvent::EndOfDocument;
        }
        if let State::Error(kind) = self.state {
            return JsonEvent::Error(kind);
        }

        let mut pos = self.resolve_cursor(input);

        loop {
            let window_len = self.fill_window(input, pos);
            let encoding = self.effective_decode_encoding();
            let window = self.stream;

            match codec::decode_scalar(&window[..window_len], encoding) {
                DecodeOutcome::Scalar(decoded) => {
                    let counts_as_column = !matches!(
                        self.state,
                        State::Utf8Bom1 | State::Utf8Bom2 | State::Utf16BeBom | State::Utf16LeBom
                    );

                    // Position is only bumped once a scalar is actually
                    // consumed. `Replay`/`ArenaFull` leave it unconsumed, to
                    // be re-decoded (and counted) on a later call or loop
                    // iteration -- bumping here too would double-count it.
                    match self.step(decoded.scalar) {
                        StepOutcome::Continue => {
                            self.bump_position(decoded.scalar, counts_as_column);
                            let from_input = decoded.len.saturating_sub(self.pre_consume_stream_len);
                            self.commit(decoded.len);
                            pos += from_input;
                        }
                        StepOutcome::Event(ev) => {
                            self.bump_position(decoded.scalar, counts_as_column);
                            let from_input = decoded.len.saturating_sub(self.pre_consume_stream_len);
                            self.commit(decoded.len);
                            pos += from_input;
                            self.remember_cursor(input, pos);
                            return ev;
                        }
                        StepOutcome::Replay(ev) => {
                            // The scalar just decoded belongs to the *next*
                            // token; leave it unconsumed so the next call
                            // (or the next loop iteration, for states that
                            // reprocess within the same call) sees it again.
                            self.remember_cursor(input, pos);
                            return ev;
                        }
                        StepOutcome::ArenaFull => {
                            // Nothing was consumed; retry the same scalar
                            // after the caller grows the buffer.
                            self.remember_cursor(input, pos);
                            return JsonEvent::Error(ParseErrorKind::InsufficientMemory);
                        }
                    }
                }
                DecodeOutcome::Invalid => {
                    self.latch_error(ParseErrorKind::Syntax);
                    self.remember_cursor(input, pos);
                    return JsonEvent::Error(ParseErrorKind::Syntax);
                }
                DecodeOutcome::NeedMoreBytes => {
                    self.stream_len = window_len;
                    pos = input.len();
                    self.remember_cursor(input, pos);
                    return JsonEvent::Error(ParseErrorKind::UnexpectedEof);
                }
            }
        }
    }

    /// Stashed at the start of each window fill so `parse` can work out how
    /// many of the just-decoded scalar's bytes came from `input` versus the
    /// stream carry-over.
    fn resolve_cursor(&mut self, input: &[u8]) -> usize {
        if self.stream_len > 0 {
            return 0;
        }
        let ptr = input.as_ptr() as usize;
        if self.last_input_ptr == Some(ptr) {
            self.input_pos.min(input.len())
        } else {
            0
        }
    }

    fn remember_cursor(&mut self, input: &[u8], pos: usize) {
        self.last_input_ptr = Some(input.as_ptr() as usize);
        self.input_pos = pos;
    }

    /// Bytes of carry-over present before this window was filled; used to
    /// split a just-consumed scalar's length between the stream and the
    /// current `input` slice.
    fn fill_window(&mut self, input: &[u8], pos: usize) -> usize {
        self.pre_consume_stream_len = self.stream_len;
        let mut len = self.stream_len;
        let from_input = (MAX_CODE_UNIT_LEN - len).min(input.len().saturating_sub(pos));
        self.stream[len..len + from_input].copy_from_slice(&input[pos..pos + from_input]);
        len += from_input;
        len
    }

    /// Drop `n` bytes from the front of the combined stream+input window,
    /// shifting any leftover stream bytes down.
    fn commit(&mut self, n: usize) {
        if n >= self.stream_len {
            self.stream_len = 0;
        } else {
            self.stream.copy_within(n..MAX_CODE_UNIT_LEN, 0);
            self.stream_len -= n;
        }
    }

    /// While a BOM candidate byte is still being matched, decoding must stay
    /// byte-at-a-time regardless of what's already been guessed; `Start`
    /// itself is revisited after a BOM resolves (to skip leading whitespace
    /// before the first token), at which point `self.encoding` already
    /// holds the real answer and must be used instead of re-forcing
    /// `Unknown`.
    fn effective_decode_encoding(&self) -> Encoding {
        match self.state {
            State::Utf8Bom1 | State::Utf8Bom2 | State::Utf16BeBom | State::Utf16LeBom => {
                Encoding::Unknown
            }
            _ => self.encoding,
        }
    }

    fn latch_error(&mut self, kind: ParseErrorKind) {
        self.state = State::Error(kind);
    }

    /// Runs at the top of every `parse` call: increments/decrements depth,
    /// pops frames whose closing event was already reported, and clears
    /// data that a just-reported event made stale. Loops because popping a
    /// frame can reveal a parent with its own pending cleanup.
    fn run_deferred_actions(&mut self) {
        loop {
            let Some(top) = self.arena.top() else { break };
            let f = self.arena.flags(top);
            if f == 0 {
                break;
            }
            if f & flags::INCREMENT_DEPTH != 0 {
                self.depth += 1;
                self.arena.clear_flag(top, flags::INCREMENT_DEPTH);
            }
            if f & flags::DECREMENT_DEPTH != 0 {
                self.depth = self.depth.saturating_sub(1);
                self.arena.clear_flag(top, flags::DECREMENT_DEPTH);
            }
            if f & flags::MUST_POP != 0 {
                self.arena.pop_frame();
                if self.arena.is_empty() {
                    self.state = State::Done;
                    break;
                }
                continue;
            }
            if f & flags::POST_VALUE_CLEANUP != 0 {
                self.arena.clear_data(top);
            }
            break;
        }
    }

    fn bump_position(&mut self, scalar: u32, counts_as_column: bool) {
        if !counts_as_column {
            return;
        }
        if scalar == u32::from(b'\n') {
            if self.last_was_cr {
                self.last_was_cr = false;
            } else {
                self.line += 1;
                self.column = 0;
            }
        } else if scalar == u32::from(b'\r') {
            self.line += 1;
            self.column = 0;
            self.last_was_cr = true;
        } else {
            self.last_was_cr = false;
            self.column += 1;
        }
    }

    fn is_whitespace(scalar: u32) -> bool {
        matches!(scalar, 0x20 | 0x09 | 0x0A | 0x0D)
    }

    fn append_current(&mut self, scalar: u32) -> Result<(), ArenaFull> {
        let top = self.arena.top().expect("append_current without a frame");
        let mut buf = [0u8; MAX_CODE_UNIT_LEN];
        let n = codec::encode_scalar(scalar, self.encoding, &mut buf);
        if n == 0 {
            return Ok(());
        }
        self.arena.append_bytes(top, &buf[..n])
    }

    /// Advance the state machine by exactly one decoded scalar.
    fn step(&mut self, scalar: u32) -> StepOutcome {
        match self.state {
            State::Start => self.step_start(scalar),
            State::Utf8Bom1 => self.step_bom_byte(scalar, 0xBB, Encoding::Unknown, State::Utf8Bom2),
            State::Utf8Bom2 => self.step_bom_byte(scalar, 0xBF, Encoding::Utf8, State::Start),
            State::Utf16BeBom => self.step_bom_byte(scalar, 0xFF, Encoding::Utf16Be, State::Start),
            State::Utf16LeBom => self.step_bom_byte(scalar, 0xFE, Encoding::Utf16Le, State::Start),

            State::NameExpected => self.step_name_expected(scalar),
            State::Name => self.step_name(scalar),
            State::PostName => self.step_post_name(scalar),
            State::ValueExpected => self.step_value_expected(scalar),

            State::StringValue => self.step_string_value(scalar),
            State::Escape => self.step_escape(scalar),
            State::Unicode1 => self.step_unicode(scalar, State::Unicode2, 12),
            State::Unicode2 => self.step_unicode(scalar, State::Unicode3, 8),
            State::Unicode3 => self.step_unicode(scalar, State::Unicode4, 4),
            State::Unicode4 => self.step_unicode_last(scalar),

            State::NumberValue => self.step_number_value(scalar),

            State::TrueR => self.step_literal_char(scalar, b'r', State::TrueU),
            State::TrueU => self.step_literal_char(scalar, b'u', State::TrueE),
            State::TrueE => self.step_literal_last(scalar, b'e', ValueType::Bool),
            State::FalseA => self.step_literal_char(scalar, b'a', State::FalseL),
            State::FalseL => self.step_literal_char(scalar, b'l', State::FalseS),
            State::FalseS => self.step_literal_char(scalar, b's', State::FalseE),
            State::FalseE => self.step_literal_last(scalar, b'e', ValueType::Bool),
            State::NullU => self.step_literal_char(scalar, b'u', State::NullL1),
            State::NullL1 => self.step_literal_char(scalar, b'l', State::NullL2),
            State::NullL2 => self.step_literal_last(scalar, b'l', ValueType::Null),

            State::PostValue => self.step_post_value(scalar),

            State::Done => {
                if Self::is_whitespace(scalar) {
                    StepOutcome::Continue
                } else {
                    self.fail_syntax()
                }
            }
            State::Error(kind) => StepOutcome::Event(JsonEvent::Error(kind)),
        }
    }

    fn step_bom_byte(
        &mut self,
        scalar: u32,
        expect: u32,
        encoding: Encoding,
        next: State,
    ) -> StepOutcome {
        if scalar == expect {
            self.encoding = encoding;
            self.state = next;
            StepOutcome::Continue
        } else {
            self.fail_syntax()
        }
    }

    fn fail_syntax(&mut self) -> StepOutcome {
        self.latch_error(ParseErrorKind::Syntax);
        StepOutcome::Event(JsonEvent::Error(ParseErrorKind::Syntax))
    }

    fn fail_token_mismatch(&mut self) -> StepOutcome {
        self.latch_error(ParseErrorKind::TokenMismatch);
        StepOutcome::Event(JsonEvent::Error(ParseErrorKind::TokenMismatch))
    }

    fn fail_internal(&mut self) -> StepOutcome {
        self.latch_error(ParseErrorKind::Internal);
        StepOutcome::Event(JsonEvent::Error(ParseErrorKind::Internal))
    }

    fn step_start(&mut self, scalar: u32) -> StepOutcome {
        match scalar {
            0xEF => {
                self.state = State::Utf8Bom1;
                StepOutcome::Continue
            }
            0xFE => {
                self.state = State::Utf16BeBom;
                StepOutcome::Continue
            }
            0xFF => {
                self.state = State::Utf16LeBom;
                StepOutcome::Continue
            }
            _ if Self::is_whitespace(scalar) => {
                self.fix_encoding_if_unset();
                StepOutcome::Continue
            }
            _ if scalar == u32::from(b'{') => {
                self.fix_encoding_if_unset();
                self.begin_root_container(false)
            }
            _ if scalar == u32::from(b'[') => {
                self.fix_encoding_if_unset();
                self.begin_root_container(true)
            }
            _ => {
                self.fix_encoding_if_unset();
                self.fail_syntax()
            }
        }
    }

    fn fix_encoding_if_unset(&mut self) {
        if self.encoding == Encoding::Unknown {
            self.encoding = self.options.assumed_encoding().unwrap_or(Encoding::Utf8);
        }
    }

    fn begin_root_container(&mut self, is_array: bool) -> StepOutcome {
        if let Some(outcome) = self.check_max_depth() {
            return outcome;
        }
        match self.arena.push_frame(is_array) {
            Ok(frame) => {
                self.arena.set_flag(frame, flags::INCREMENT_DEPTH);
                self.published_name = None;
                self.state = if is_array {
                    State::ValueExpected
                } else {
                    State::NameExpected
                };
                StepOutcome::Event(if is_array {
                    JsonEvent::ArrayBegin
                } else {
                    JsonEvent::ObjectBegin
                })
            }
            Err(ArenaFull) => self.arena_full(),
        }
    }

    fn arena_full(&mut self) -> StepOutcome {
        self.error_return_state = self.state;
        self.latch_error(ParseErrorKind::InsufficientMemory);
        StepOutcome::ArenaFull
    }

    /// Guards against nesting past `options.max_depth()`, independent of how
    /// much room the buffer has left. Reported the same way as an arena
    /// that's actually full, since from the caller's point of view both mean
    /// "this push cannot proceed"; [`reallocate`](Self::reallocate) alone
    /// won't heal it, only a context built with a larger `max_depth` will.
    fn check_max_depth(&mut self) -> Option<StepOutcome> {
        if (self.depth as usize + 1) > self.options.max_depth() {
            Some(self.arena_full())
        } else {
            None
        }
    }

    fn step_name_expected(&mut self, scalar: u32) -> StepOutcome {
        if Self::is_whitespace(scalar) {
            return StepOutcome::Continue;
        }
        let top = self.arena.top();
        if scalar == u32::from(b'}') {
            return self.close_container(false);
        }
        if scalar == u32::from(b'"') {
            if let Some(t) = top {
                self.arena.clear_flag(t, flags::COMMA_PENDING);
            }
            self.state = State::Name;
            return StepOutcome::Continue;
        }
        if scalar == u32::from(b',') {
            let comma_ok = top.is_some_and(|t| self.arena.has_flag(t, flags::COMMA_PENDING));
            if comma_ok {
                return StepOutcome::Continue;
            }
            return self.fail_syntax();
        }
        self.fail_syntax()
    }

    fn step_name(&mut self, scalar: u32) -> StepOutcome {
        if scalar == u32::from(b'"') {
            let top = self.arena.top().expect("Name state without a frame");
            self.arena.commit_name(top);
            self.published_name = Some(self.offset_len(self.arena.name_data(top)));
            self.state = State::PostName;
            return StepOutcome::Event(JsonEvent::Name);
        }
        self.append_string_char(scalar, State::Name)
    }

    fn step_post_name(&mut self, scalar: u32) -> StepOutcome {
        if Self::is_whitespace(scalar) {
            return StepOutcome::Continue;
        }
        if scalar == u32::from(b':') {
            self.state = State::ValueExpected;
            return StepOutcome::Continue;
        }
        self.fail_syntax()
    }

    fn step_value_expected(&mut self, scalar: u32) -> StepOutcome {
        if Self::is_whitespace(scalar) {
            return StepOutcome::Continue;
        }
        if scalar == u32::from(b']') {
            return self.close_container(true);
        }

        let top = self.arena.top();
        if let Some(t) = top {
            self.arena.clear_flag(t, flags::COMMA_PENDING);
        }

        if scalar == u32::from(b'"') {
            self.state = State::StringValue;
            return StepOutcome::Continue;
        }
        if scalar == u32::from(b'{') {
            return self.open_container(false);
        }
        if scalar == u32::from(b'[') {
            return self.open_container(true);
        }
        if scalar == u32::from(b't') {
            self.literal = Literal::True;
            self.state = State::TrueR;
            return StepOutcome::Continue;
        }
        if scalar == u32::from(b'f') {
            self.literal = Literal::False;
            self.state = State::FalseA;
            return StepOutcome::Continue;
        }
        if scalar == u32::from(b'n') {
            self.state = State::NullU;
            return StepOutcome::Continue;
        }
        if scalar == u32::from(b'-') || is_ascii_digit(scalar) {
            if top.is_none() {
                return self.fail_internal();
            }
            return match self.append_current(scalar) {
                Ok(()) => {
                    self.state = State::NumberValue;
                    StepOutcome::Continue
                }
                Err(ArenaFull) => self.arena_full(),
            };
        }
        self.fail_syntax()
    }

    fn open_container(&mut self, is_array: bool) -> StepOutcome {
        if let Some(outcome) = self.check_max_depth() {
            return outcome;
        }
        let parent = self.arena.top();
        match self.arena.push_frame(is_array) {
            Ok(frame) => {
                self.arena.set_flag(frame, flags::INCREMENT_DEPTH);
                if let Some(p) = parent {
                    if self.arena.has_flag(p, flags::HAS_NAME) {
                        self.arena.set_flag(p, flags::POST_VALUE_CLEANUP);
                    }
                }
                self.publish_name_from(parent);
                self.state = if is_array {
                    State::ValueExpected
                } else {
                    State::NameExpected
                };
                StepOutcome::Event(if is_array {
                    JsonEvent::ArrayBegin
                } else {
                    JsonEvent::ObjectBegin
                })
            }
            Err(ArenaFull) => self.arena_full(),
        }
    }

    fn close_container(&mut self, expect_array: bool) -> StepOutcome {
        let Some(top) = self.arena.top() else {
            return self.fail_internal();
        };
        let is_array = self.arena.has_flag(top, flags::IS_ARRAY);
        if is_array != expect_array {
            return self.fail_token_mismatch();
        }
        if self.arena.has_flag(top, flags::COMMA_PENDING) {
            return self.fail_syntax();
        }

        let parent = self.arena.parent(top);
        self.publish_name_from(parent);

        self.arena.set_flag(top, flags::MUST_POP);
        self.arena.set_flag(top, flags::DECREMENT_DEPTH);
        self.state = State::PostValue;

        StepOutcome::Event(if is_array {
            JsonEvent::ArrayEnd
        } else {
            JsonEvent::ObjectEnd
        })
    }

    /// Publish `self.published_name` by reading the name bytes off
    /// `parent`. A container's name lives in its parent frame, since it was
    /// appended before the container itself was pushed; a scalar value's
    /// name lives in the same frame as the value, so `parent` there is the
    /// frame itself.
    fn publish_name_from(&mut self, parent: Option<FrameRef>) {
        self.published_name = parent.and_then(|p| {
            if self.arena.has_flag(p, flags::HAS_NAME) {
                Some(self.offset_len(self.arena.name_data(p)))
            } else {
                None
            }
        });
    }

    fn append_string_char(&mut self, scalar: u32, back_to: State) -> StepOutcome {
        if scalar == u32::from(b'\\') {
            self.escape_return_state = back_to;
            self.state = State::Escape;
            return StepOutcome::Continue;
        }
        if scalar < 0x20 {
            return self.fail_syntax();
        }
        match self.append_current(scalar) {
            Ok(()) => {
                self.state = back_to;
                StepOutcome::Continue
            }
            Err(ArenaFull) => self.arena_full(),
        }
    }

    fn step_string_value(&mut self, scalar: u32) -> StepOutcome {
        if scalar == u32::from(b'"') {
            let top = self.arena.top().expect("StringValue without a frame");
            self.published_string = Some(self.offset_len(self.arena.value_data(top)));
            self.value_type = ValueType::String;
            self.publish_name_from(Some(top));
            self.arena.set_flag(top, flags::POST_VALUE_CLEANUP);
            self.state = State::PostValue;
            return StepOutcome::Event(JsonEvent::Value);
        }
        self.append_string_char(scalar, State::StringValue)
    }

    fn step_escape(&mut self, scalar: u32) -> StepOutcome {
        let literal = match scalar {
            _ if scalar == u32::from(b'"') => Some(u32::from(b'"')),
            _ if scalar == u32::from(b'\\') => Some(u32::from(b'\\')),
            _ if scalar == u32::from(b'/') => Some(u32::from(b'/')),
            _ if scalar == u32::from(b'b') => Some(0x08),
            _ if scalar == u32::from(b'f') => Some(0x0C),
            _ if scalar == u32::from(b'n') => Some(u32::from(b'\n')),
            _ if scalar == u32::from(b'r') => Some(u32::from(b'\r')),
            _ if scalar == u32::from(b't') => Some(u32::from(b'\t')),
            _ if scalar == u32::from(b'u') => None,
            _ => return self.fail_syntax(),
        };
        match literal {
            Some(cp) => self.emit_escaped_scalar(cp),
            None => {
                self.unicode_accum = 0;
                self.state = State::Unicode1;
                StepOutcome::Continue
            }
        }
    }

    fn step_unicode(&mut self, scalar: u32, next: State, shift: u32) -> StepOutcome {
        match hex_digit(scalar) {
            Some(v) => {
                self.unicode_accum |= v << shift;
                self.state = next;
                StepOutcome::Continue
            }
            None => self.fail_syntax(),
        }
    }

    /// Two consecutive `\uXXXX` escapes are never coalesced into a single
    /// surrogate pair, even when they form one: each 16-bit unit is
    /// re-encoded into the active encoding on its own. Under UTF-16 this is
    /// simply the code unit; under UTF-8/Unknown a lone surrogate half
    /// produces non-minimal, technically invalid UTF-8 rather than a
    /// replacement character. This is a pinned quirk, not an oversight.
    fn step_unicode_last(&mut self, scalar: u32) -> StepOutcome {
        let v = match hex_digit(scalar) {
            Some(v) => v,
            None => return self.fail_syntax(),
        };
        let unit = self.unicode_accum | v;

        let top = self.arena.top().expect("escape without a frame");
        let mut buf = [0u8; MAX_CODE_UNIT_LEN];
        let n = codec::encode_raw_unit(unit, self.encoding, &mut buf);
        match self.arena.append_bytes(top, &buf[..n]) {
            Ok(()) => {
                self.state = self.escape_return_state;
                StepOutcome::Continue
            }
            Err(ArenaFull) => self.arena_full(),
        }
    }

    fn emit_escaped_scalar(&mut self, scalar: u32) -> StepOutcome {
        match self.append_current(scalar) {
            Ok(()) => {
                self.state = self.escape_return_state;
                StepOutcome::Continue
            }
            Err(ArenaFull) => self.arena_full(),
        }
    }

    fn step_number_value(&mut self, scalar: u32) -> StepOutcome {
        let top = self.arena.top().expect("NumberValue without a frame");

        if is_ascii_digit(scalar) {
            return match self.append_current(scalar) {
                Ok(()) => StepOutcome::Continue,
                Err(ArenaFull) => self.arena_full(),
            };
        }
        if scalar == u32::from(b'.') {
            if self.arena.has_flag(top, flags::DECIMAL_SEEN)
                || self.arena.has_flag(top, flags::EXPONENT_SEEN)
            {
                return self.fail_syntax();
            }
            self.arena.set_flag(top, flags::DECIMAL_SEEN);
            return match self.append_current(scalar) {
                Ok(()) => StepOutcome::Continue,
                Err(ArenaFull) => self.arena_full(),
            };
        }
        if scalar == u32::from(b'e') || scalar == u32::from(b'E') {
            if self.arena.has_flag(top, flags::EXPONENT_SEEN) {
                return self.fail_syntax();
            }
            self.arena.set_flag(top, flags::EXPONENT_SEEN);
            return match self.append_current(scalar) {
                Ok(()) => StepOutcome::Continue,
                Err(ArenaFull) => self.arena_full(),
            };
        }
        if scalar == u32::from(b'+') || scalar == u32::from(b'-') {
            let prev = self.last_appended_scalar(top);
            if prev != Some(u32::from(b'e')) && prev != Some(u32::from(b'E')) {
                return self.fail_syntax();
            }
            return match self.append_current(scalar) {
                Ok(()) => StepOutcome::Continue,
                Err(ArenaFull) => self.arena_full(),
            };
        }

        // Any other character ends the number; it belongs to whatever
        // follows (`,`, `}`, `]`, whitespace) and must be reprocessed under
        // `PostValue` rather than being treated as part of the number.
        match self.finish_number(top) {
            Ok(()) => {
                self.value_type = if self.arena.has_flag(top, flags::DECIMAL_SEEN)
                    || self.arena.has_flag(top, flags::EXPONENT_SEEN)
                {
                    ValueType::Float
                } else {
                    ValueType::Integer
                };
                self.publish_name_from(Some(top));
                self.arena.set_flag(top, flags::POST_VALUE_CLEANUP);
                self.state = State::PostValue;
                StepOutcome::Replay(JsonEvent::Value)
            }
            Err(kind) => {
                self.latch_error(kind);
                StepOutcome::Event(JsonEvent::Error(kind))
            }
        }
    }

    /// Decode the last code unit appended to `frame`'s value. The exponent
    /// marker and its sign are always ASCII, so this is always a fixed-width
    /// lookback for the active encoding, never a surrogate pair -- unlike
    /// `finish_number`, which has to walk the whole value.
    fn last_appended_scalar(&self, frame: FrameRef) -> Option<u32> {
        let unit_len = match self.encoding {
            Encoding::Utf8 | Encoding::Unknown => 1,
            Encoding::Utf16Le | Encoding::Utf16Be => 2,
        };
        let data = self.arena.value_data(frame);
        let start = data.len().checked_sub(unit_len)?;
        match codec::decode_scalar(&data[start..], self.encoding) {
            DecodeOutcome::Scalar(decoded) => Some(decoded.scalar),
            _ => None,
        }
    }

    /// Decode the number's digits (stored in the active encoding) back to
    /// ASCII and parse them, using a fixed-size stack buffer -- no
    /// allocation, matching the no-internal-allocation invariant of the
    /// hot path.
    fn finish_number(&mut self, top: FrameRef) -> Result<(), ParseErrorKind> {
        let mut ascii = [0u8; 64];
        let mut n = 0;
        let data = self.arena.value_data(top);
        let mut i = 0;
        while i < data.len() {
            let decoded = match codec::decode_scalar(&data[i..], self.encoding) {
                DecodeOutcome::Scalar(d) => d,
                _ => return Err(ParseErrorKind::Internal),
            };
            if n >= ascii.len() {
                return Err(ParseErrorKind::Syntax);
            }
            ascii[n] = decoded.scalar as u8;
            n += 1;
            i += decoded.len;
        }

        let is_float = self.arena.has_flag(top, flags::DECIMAL_SEEN)
            || self.arena.has_flag(top, flags::EXPONENT_SEEN);
        if is_float {
            let s = std::str::from_utf8(&ascii[..n]).map_err(|_| ParseErrorKind::Syntax)?;
            self.float_value = s.parse::<f64>().map_err(|_| ParseErrorKind::Syntax)?;
        } else {
            self.integer_value = btoi(&ascii[..n]).map_err(|_| ParseErrorKind::Syntax)?;
        }
        Ok(())
    }

    fn step_literal_char(&mut self, scalar: u32, expect: u8, next: State) -> StepOutcome {
        if scalar == u32::from(expect) {
            self.state = next;
            StepOutcome::Continue
        } else {
            self.fail_syntax()
        }
    }

    fn step_literal_last(&mut self, scalar: u32, expect: u8, value_type: ValueType) -> StepOutcome {
        if scalar != u32::from(expect) {
            return self.fail_syntax();
        }
        let top = self.arena.top().expect("literal without a frame");
        self.value_type = value_type;
        if value_type == ValueType::Bool {
            self.bool_value = self.literal == Literal::True;
        }
        self.publish_name_from(Some(top));
        self.arena.set_flag(top, flags::POST_VALUE_CLEANUP);
        self.state = State::PostValue;
        StepOutcome::Event(JsonEvent::Value)
    }

    fn step_post_value(&mut self, scalar: u32) -> StepOutcome {
        if Self::is_whitespace(scalar) {
            return StepOutcome::Continue;
        }
        let Some(top) = self.arena.top() else {
            // Only reachable transiently; `run_deferred_actions` moves the
            // state to `Done` as soon as the root frame pops.
            return self.fail_internal();
        };
        let is_array = self.arena.has_flag(top, flags::IS_ARRAY);

        if scalar == u32::from(b',') {
            self.arena.set_flag(top, flags::COMMA_PENDING);
            self.state = if is_array {
                State::ValueExpected
            } else {
                State::NameExpected
            };
            return StepOutcome::Continue;
        }
        if scalar == u32::from(b'}') && !is_array {
            return self.close_container(false);
        }
        if scalar == u32::from(b']') && is_array {
            return self.close_container(true);
        }
        self.fail_syntax()
    }
}

fn is_ascii_digit(scalar: u32) -> bool {
    (u32::from(b'0')..=u32::from(b'9')).contains(&scalar)
}

fn hex_digit(scalar: u32) -> Option<u32> {
    match scalar {
        0x30..=0x39 => Some(scalar - 0x30),
        0x41..=0x46 => Some(scalar - 0x41 + 10),
        0x61..=0x66 => Some(scalar - 0x61 + 10),
        _ => None,
    }
}

enum StepOutcome {
    /// The scalar was consumed; no event yet.
    Continue,
    /// The scalar was consumed and produced an event.
    Event(JsonEvent),
    /// The scalar was *not* consumed (it starts the next token); produced
    /// an event anyway. The caller must not advance past it.
    Replay(JsonEvent),
    /// The scalar was not consumed because the arena has no room for it;
    /// produces `InsufficientMemory`. The caller must not advance past it.
    ArenaFull,
}
