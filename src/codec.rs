//! Encoding detection and per-scalar decode/encode.
//!
//! The parser never transcodes a whole document. It decodes exactly one
//! scalar value at a time from a short window of input bytes, and for
//! escape sequences it encodes exactly one scalar back into the active
//! encoding before appending it to the current frame. Structural bytes
//! (`{`, `"`, digits, ...) flow through the same decode/encode round trip as
//! ordinary string contents, which is what lets a single state machine drive
//! all three encodings without special-casing any of them.

/// The maximum number of bytes [`decode_scalar`] ever needs to look at.
pub const MAX_CODE_UNIT_LEN: usize = 4;

/// A character encoding recognized by the parser.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    /// No BOM was found and no encoding was assumed. Bytes are treated as
    /// single-byte, ASCII-compatible code units, i.e. passed through as-is.
    Unknown,
}

/// One decoded scalar value, together with how many bytes of the window it
/// consumed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    pub scalar: u32,
    pub len: usize,
}

/// The outcome of attempting to decode a scalar from a byte window.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A full scalar was decoded.
    Scalar(Decoded),
    /// The window is shorter than the code point it starts needs; the
    /// caller should supply more bytes and retry with a longer window.
    NeedMoreBytes,
    /// The window starts with a byte sequence that is not valid under this
    /// encoding (a stray UTF-8 continuation byte, an unpaired surrogate, ...).
    Invalid,
}

const HIGH_SURROGATE_START: u32 = 0xD800;
const HIGH_SURROGATE_END: u32 = 0xDBFF;
const LOW_SURROGATE_START: u32 = 0xDC00;
const LOW_SURROGATE_END: u32 = 0xDFFF;

/// Sniff a byte-order mark at the very start of the document. Only called
/// from the initial "no content yet" state; the result is fixed for the
/// rest of the document's lifetime. Returns the encoding and the number of
/// BOM bytes consumed (0 if none was recognized).
pub fn sniff_bom(window: &[u8]) -> Option<(Encoding, usize)> {
    if window.starts_with(&[0xEF, 0xBB, 0xBF]) {
        Some((Encoding::Utf8, 3))
    } else if window.starts_with(&[0xFE, 0xFF]) {
        Some((Encoding::Utf16Be, 2))
    } else if window.starts_with(&[0xFF, 0xFE]) {
        Some((Encoding::Utf16Le, 2))
    } else {
        None
    }
}

/// Decode one scalar value from the front of `window` under `encoding`.
pub fn decode_scalar(window: &[u8], encoding: Encoding) -> DecodeOutcome {
    match encoding {
        Encoding::Utf8 => decode_utf8(window),
        Encoding::Utf16Le => decode_utf16(window, u16::from_le_bytes),
        Encoding::Utf16Be => decode_utf16(window, u16::from_be_bytes),
        Encoding::Unknown => decode_unknown(window),
    }
}

fn decode_unknown(window: &[u8]) -> DecodeOutcome {
    match window.first() {
        Some(&b) => DecodeOutcome::Scalar(Decoded {
            scalar: b as u32,
            len: 1,
        }),
        None => DecodeOutcome::NeedMoreBytes,
    }
}

fn decode_utf8(window: &[u8]) -> DecodeOutcome {
    let Some(&lead) = window.first() else {
        return DecodeOutcome::NeedMoreBytes;
    };

    let (needed, initial) = if lead & 0x80 == 0x00 {
        (1, (lead & 0x7F) as u32)
    } else if lead & 0xE0 == 0xC0 {
        (2, (lead & 0x1F) as u32)
    } else if lead & 0xF0 == 0xE0 {
        (3, (lead & 0x0F) as u32)
    } else if lead & 0xF8 == 0xF0 {
        (4, (lead & 0x07) as u32)
    } else {
        return DecodeOutcome::Invalid;
    };

    if window.len() < needed {
        return DecodeOutcome::NeedMoreBytes;
    }

    let mut scalar = initial;
    for &cont in &window[1..needed] {
        if cont & 0xC0 != 0x80 {
            return DecodeOutcome::Invalid;
        }
        scalar = (scalar << 6) | (cont & 0x3F) as u32;
    }

    DecodeOutcome::Scalar(Decoded {
        scalar,
        len: needed,
    })
}

fn decode_utf16(window: &[u8], read: fn([u8; 2]) -> u16) -> DecodeOutcome {
    if window.len() < 2 {
        return DecodeOutcome::NeedMoreBytes;
    }
    let first = read([window[0], window[1]]) as u32;

    if (HIGH_SURROGATE_START..=HIGH_SURROGATE_END).contains(&first) {
        if window.len() < 4 {
            return DecodeOutcome::NeedMoreBytes;
        }
        let second = read([window[2], window[3]]) as u32;
        if !(LOW_SURROGATE_START..=LOW_SURROGATE_END).contains(&second) {
            return DecodeOutcome::Invalid;
        }
        let scalar =
            0x10000 + ((first - HIGH_SURROGATE_START) << 10) + (second - LOW_SURROGATE_START);
        DecodeOutcome::Scalar(Decoded { scalar, len: 4 })
    } else if (LOW_SURROGATE_START..=LOW_SURROGATE_END).contains(&first) {
        DecodeOutcome::Invalid
    } else {
        DecodeOutcome::Scalar(Decoded {
            scalar: first,
            len: 2,
        })
    }
}

/// Encode `scalar` into `encoding`, writing into the front of `out` and
/// returning the number of bytes written. Returns `0` for scalars in the
/// surrogate range (`0xD800..=0xDFFF`) or above `0x10FFFF`, which cannot be
/// encoded as a single Unicode scalar value.
///
/// `out` must be at least [`MAX_CODE_UNIT_LEN`] bytes long.
pub fn encode_scalar(scalar: u32, encoding: Encoding, out: &mut [u8]) -> usize {
    if (HIGH_SURROGATE_START..=LOW_SURROGATE_END).contains(&scalar) || scalar > 0x10FFFF {
        return 0;
    }
    encode_raw_unit(scalar, encoding, out)
}

/// Encode a raw 16-bit `\uXXXX` unit into `encoding`, without rejecting the
/// surrogate range. Used only for re-encoding `\uXXXX` escapes, which are
/// never combined into a surrogate pair (see the crate's escape handling) --
/// a lone surrogate half re-encoded under UTF-8/Unknown this way produces
/// non-minimal, technically invalid UTF-8 rather than a replacement
/// character, matching each half being treated as its own scalar.
///
/// `out` must be at least [`MAX_CODE_UNIT_LEN`] bytes long.
pub fn encode_raw_unit(unit: u32, encoding: Encoding, out: &mut [u8]) -> usize {
    match encoding {
        Encoding::Utf8 | Encoding::Unknown => encode_utf8(unit, out),
        Encoding::Utf16Le => encode_utf16(unit, out, u16::to_le_bytes),
        Encoding::Utf16Be => encode_utf16(unit, out, u16::to_be_bytes),
    }
}

fn encode_utf8(scalar: u32, out: &mut [u8]) -> usize {
    if scalar < 0x80 {
        out[0] = scalar as u8;
        1
    } else if scalar < 0x800 {
        out[0] = 0xC0 | (scalar >> 6) as u8;
        out[1] = 0x80 | (scalar & 0x3F) as u8;
        2
    } else if scalar < 0x10000 {
        out[0] = 0xE0 | (scalar >> 12) as u8;
        out[1] = 0x80 | ((scalar >> 6) & 0x3F) as u8;
        out[2] = 0x80 | (scalar & 0x3F) as u8;
        3
    } else {
        out[0] = 0xF0 | (scalar >> 18) as u8;
        out[1] = 0x80 | ((scalar >> 12) & 0x3F) as u8;
        out[2] = 0x80 | ((scalar >> 6) & 0x3F) as u8;
        out[3] = 0x80 | (scalar & 0x3F) as u8;
        4
    }
}

fn encode_utf16(scalar: u32, out: &mut [u8], write: fn(u16) -> [u8; 2]) -> usize {
    if scalar < 0x10000 {
        out[0..2].copy_from_slice(&write(scalar as u16));
        2
    } else {
        let v = scalar - 0x10000;
        let high = HIGH_SURROGATE_START + (v >> 10);
        let low = LOW_SURROGATE_START + (v & 0x3FF);
        out[0..2].copy_from_slice(&write(high as u16));
        out[2..4].copy_from_slice(&write(low as u16));
        4
    }
}
