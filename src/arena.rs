//! Buffer/stack manager.
//!
//! The nesting stack is a singly linked chain of frames laid out back to
//! back inside the caller's buffer (per the REDESIGN note in the
//! specification this crate was built from: offsets replace pointers, which
//! turns growth into a plain `copy_from_slice` with no rebasing pass). Each
//! frame is a fixed [`HEADER_LEN`]-byte header followed immediately by the
//! data bytes of the name or value token it currently owns.
//!
//! Frame layout (little-endian):
//!
//! ```text
//! byte 0..4    parent offset (u32), NO_PARENT for the root
//! byte 4..8    end offset (u32): offset of the last used data byte
//! byte 8..10   flags (u16)
//! byte 10..14  name length (u32): how many bytes at the front of the data
//!              region are the frame's completed name, 0 if unnamed. A
//!              name and its (scalar) value share one frame's data region
//!              so both stay readable together while a `Value` event for a
//!              named entry is being reported.
//! byte 14..    data bytes (name and/or value token, in progress or complete)
//! ```

pub(crate) const HEADER_LEN: u32 = 14;
pub(crate) const NO_PARENT: u32 = u32::MAX;

pub(crate) mod flags {
    pub const IS_ARRAY: u16 = 1 << 0;
    pub const HAS_NAME: u16 = 1 << 1;
    pub const COMMA_PENDING: u16 = 1 << 2;
    pub const DECIMAL_SEEN: u16 = 1 << 3;
    pub const EXPONENT_SEEN: u16 = 1 << 4;
    pub const MUST_POP: u16 = 1 << 5;
    pub const POST_VALUE_CLEANUP: u16 = 1 << 6;
    pub const INCREMENT_DEPTH: u16 = 1 << 7;
    pub const DECREMENT_DEPTH: u16 = 1 << 8;
}

/// An offset-addressed frame on the nesting stack. Cheap, `Copy`, and valid
/// only against the [`Arena`] it came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct FrameRef(pub u32);

/// Raised when the arena cannot satisfy a request with the buffer it
/// currently has. The caller heals this by calling
/// [`Arena::grow`] with a larger buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct ArenaFull;

/// The byte arena plus the nesting stack threaded through it.
pub(crate) struct Arena<'buf> {
    buffer: &'buf mut [u8],
    top: Option<FrameRef>,
}

impl<'buf> Arena<'buf> {
    pub fn new(buffer: &'buf mut [u8]) -> Self {
        buffer.fill(0);
        Arena { buffer, top: None }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// The whole backing buffer, for callers that need to turn a data
    /// sub-slice back into an offset (see `JsonContext::offset_len`).
    pub fn raw(&self) -> &[u8] {
        self.buffer
    }

    pub fn top(&self) -> Option<FrameRef> {
        self.top
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_none()
    }

    fn data_start(frame: FrameRef) -> u32 {
        frame.0 + HEADER_LEN
    }

    pub fn parent(&self, frame: FrameRef) -> Option<FrameRef> {
        let raw = self.read_u32(frame.0);
        if raw == NO_PARENT {
            None
        } else {
            Some(FrameRef(raw))
        }
    }

    pub fn end(&self, frame: FrameRef) -> u32 {
        self.read_u32(frame.0 + 4)
    }

    fn set_end(&mut self, frame: FrameRef, end: u32) {
        self.write_u32(frame.0 + 4, end);
    }

    pub fn flags(&self, frame: FrameRef) -> u16 {
        self.read_u16(frame.0 + 8)
    }

    fn set_flags(&mut self, frame: FrameRef, flags: u16) {
        self.write_u16(frame.0 + 8, flags);
    }

    pub fn has_flag(&self, frame: FrameRef, mask: u16) -> bool {
        self.flags(frame) & mask != 0
    }

    pub fn set_flag(&mut self, frame: FrameRef, mask: u16) {
        let f = self.flags(frame);
        self.set_flags(frame, f | mask);
    }

    pub fn clear_flag(&mut self, frame: FrameRef, mask: u16) {
        let f = self.flags(frame);
        self.set_flags(frame, f & !mask);
    }

    /// How many bytes at the front of the frame's data region are a
    /// completed name, as opposed to the value that follows them.
    pub fn name_len(&self, frame: FrameRef) -> u32 {
        self.read_u32(frame.0 + 8 + 2)
    }

    pub fn set_name_len(&mut self, frame: FrameRef, len: u32) {
        self.write_u32(frame.0 + 8 + 2, len);
    }

    /// The frame's data bytes: a completed name/value token, or the
    /// in-progress prefix of one.
    pub fn data(&self, frame: FrameRef) -> &[u8] {
        let start = Self::data_start(frame) as usize;
        let end = self.end(frame) as usize;
        if end < start {
            &[]
        } else {
            &self.buffer[start..=end]
        }
    }

    /// The completed name portion of the frame's data, if any.
    pub fn name_data(&self, frame: FrameRef) -> &[u8] {
        let n = self.name_len(frame) as usize;
        &self.data(frame)[..n.min(self.data(frame).len())]
    }

    /// The value portion of the frame's data, i.e. everything after the
    /// name.
    pub fn value_data(&self, frame: FrameRef) -> &[u8] {
        let n = self.name_len(frame) as usize;
        let d = self.data(frame);
        &d[n.min(d.len())..]
    }

    /// Mark everything currently in the frame's data region as a completed
    /// name. Any bytes appended afterwards become the value that follows it.
    pub fn commit_name(&mut self, frame: FrameRef) {
        let len = self.data(frame).len() as u32;
        self.set_name_len(frame, len);
        self.set_flag(frame, flags::HAS_NAME);
    }

    /// Push a new frame as a child of the current top (or as the root if
    /// the stack is empty). The new frame starts right after the current
    /// top's last used byte.
    pub fn push_frame(&mut self, is_array: bool) -> Result<FrameRef, ArenaFull> {
        let start = match self.top {
            None => 0,
            Some(top) => self.end(top) + 1,
        };

        let header_end = start as usize + HEADER_LEN as usize;
        if header_end > self.buffer.len() {
            return Err(ArenaFull);
        }

        let parent_raw = self.top.map(|t| t.0).unwrap_or(NO_PARENT);
        self.write_u32(start, parent_raw);
        self.write_u32(start + 4, start + HEADER_LEN - 1);
        self.write_u16(start + 8, if is_array { flags::IS_ARRAY } else { 0 });
        self.write_u32(start + 8 + 2, 0);

        let frame = FrameRef(start);
        self.top = Some(frame);
        Ok(frame)
    }

    /// Pop the current top frame: zero its bytes and rewire the top to its
    /// parent. The caller must have already read out anything it needs
    /// (name, flags) from the frame before popping.
    pub fn pop_frame(&mut self) -> Option<FrameRef> {
        let frame = self.top?;
        let parent = self.parent(frame);
        let start = frame.0 as usize;
        let end = self.end(frame) as usize;
        self.buffer[start..=end].fill(0);
        self.top = parent;
        parent
    }

    /// Append one byte to the frame's data region. On overflow the caller
    /// is responsible for rewinding the input by one code point before
    /// retrying after growth, per the insufficient-memory contract.
    pub fn append_byte(&mut self, frame: FrameRef, byte: u8) -> Result<(), ArenaFull> {
        let pos = self.end(frame) as usize + 1;
        if pos >= self.buffer.len() {
            return Err(ArenaFull);
        }
        self.buffer[pos] = byte;
        self.set_end(frame, pos as u32);
        Ok(())
    }

    /// Append several bytes at once (used when re-encoding a decoded scalar
    /// back into the active encoding). Fails atomically: either all bytes
    /// are appended or none are.
    pub fn append_bytes(&mut self, frame: FrameRef, bytes: &[u8]) -> Result<(), ArenaFull> {
        let start = self.end(frame) as usize + 1;
        let end = start + bytes.len();
        if end > self.buffer.len() {
            return Err(ArenaFull);
        }
        self.buffer[start..end].copy_from_slice(bytes);
        self.set_end(frame, (end - 1) as u32);
        Ok(())
    }

    /// Reclaim the space used by a frame's just-surrendered name/value:
    /// zero the data region and reset `end` and `name_len` back to empty.
    pub fn clear_data(&mut self, frame: FrameRef) {
        let start = Self::data_start(frame) as usize;
        let end = self.end(frame) as usize;
        if end >= start {
            self.buffer[start..=end].fill(0);
        }
        self.set_end(frame, start as u32 - 1);
        self.set_name_len(frame, 0);
        self.clear_flag(frame, flags::HAS_NAME);
        self.clear_flag(frame, flags::POST_VALUE_CLEANUP);
    }

    /// Adopt a strictly larger buffer: copy the old content verbatim and
    /// zero the new tail. No pointer rebasing is needed because every
    /// stored reference is a relative offset, not a pointer.
    pub fn grow(&mut self, new_buffer: &'buf mut [u8]) -> Result<(), GrowError> {
        if new_buffer.len() <= self.buffer.len() {
            return Err(GrowError::NotLarger);
        }
        let old_len = self.buffer.len();
        new_buffer[..old_len].copy_from_slice(self.buffer);
        new_buffer[old_len..].fill(0);
        self.buffer = new_buffer;
        Ok(())
    }

    fn read_u32(&self, at: u32) -> u32 {
        let at = at as usize;
        u32::from_le_bytes(self.buffer[at..at + 4].try_into().unwrap())
    }

    fn write_u32(&mut self, at: u32, value: u32) {
        let at = at as usize;
        self.buffer[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn read_u16(&self, at: u32) -> u16 {
        let at = at as usize;
        u16::from_le_bytes(self.buffer[at..at + 2].try_into().unwrap())
    }

    fn write_u16(&mut self, at: u32, value: u16) {
        let at = at as usize;
        self.buffer[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }
}

/// Raised by [`Arena::grow`] when the new buffer isn't strictly larger than
/// the one currently in use.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GrowError {
    #[error("new buffer must be strictly larger than the current one")]
    NotLarger,
}
