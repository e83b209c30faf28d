use arenajson::{
    Encoding, JsonContext, JsonEvent, JsonParserOptionsBuilder, ParseErrorKind, ValueType,
};

mod prettyprinter;

use prettyprinter::PrettyPrinter;

/// Drives a fresh context over `json` in one shot and renders it with
/// [`PrettyPrinter`], panicking on any error. Only meaningful for documents
/// in an encoding `str::from_utf8` can read back, i.e. ASCII/UTF-8 content.
fn render(json: &[u8], buf_len: usize) -> String {
    let mut buf = vec![0u8; buf_len];
    let mut ctx = JsonContext::new(&mut buf);
    let mut pp = PrettyPrinter::new();
    loop {
        match ctx.parse(json) {
            JsonEvent::EndOfDocument => break,
            JsonEvent::Error(kind) => panic!("parse error: {kind:?}"),
            ev => pp.on_event(ev, &ctx).unwrap(),
        }
    }
    pp.get_result().to_owned()
}

fn expect_error(json: &[u8], buf_len: usize) -> ParseErrorKind {
    let mut buf = vec![0u8; buf_len];
    let mut ctx = JsonContext::new(&mut buf);
    loop {
        match ctx.parse(json) {
            JsonEvent::Error(kind) => return kind,
            JsonEvent::EndOfDocument => {
                panic!("expected an error, but the document parsed cleanly")
            }
            _ => {}
        }
    }
}

/// A simplified, comparable projection of an event, for tests that check a
/// whole parse against another (e.g. the same document fed in different
/// chunks).
#[derive(Debug, Clone, PartialEq)]
enum Ev {
    ObjectBegin(Option<String>),
    ObjectEnd(Option<String>),
    ArrayBegin(Option<String>),
    ArrayEnd(Option<String>),
    Name(String),
    Value(Option<String>, String),
    End,
}

fn name_of(ctx: &JsonContext) -> Option<String> {
    ctx.name().map(|r| r.expect("valid utf-8 name").to_owned())
}

fn value_repr(ctx: &JsonContext) -> String {
    match ctx.value_type() {
        ValueType::String => ctx.string_value().unwrap().unwrap().to_owned(),
        ValueType::Integer => ctx.integer_value::<i64>().unwrap().to_string(),
        ValueType::Float => ctx.float_value().to_string(),
        ValueType::Bool => ctx.bool_value().to_string(),
        ValueType::Null => "null".to_owned(),
        ValueType::None => "none".to_owned(),
    }
}

/// Feeds `chunks` one at a time, looping each one until `UnexpectedEof`
/// (meaning: give me the next chunk) or `EndOfDocument`.
fn drive(buf: &mut [u8], chunks: &[&[u8]]) -> Vec<Ev> {
    let mut ctx = JsonContext::new(buf);
    let mut out = vec![];
    for chunk in chunks {
        loop {
            match ctx.parse(chunk) {
                JsonEvent::Error(ParseErrorKind::UnexpectedEof) => break,
                JsonEvent::Error(kind) => panic!("unexpected parse error: {kind:?}"),
                JsonEvent::EndOfDocument => {
                    out.push(Ev::End);
                    return out;
                }
                JsonEvent::Name => out.push(Ev::Name(name_of(&ctx).unwrap())),
                JsonEvent::ObjectBegin => out.push(Ev::ObjectBegin(name_of(&ctx))),
                JsonEvent::ObjectEnd => out.push(Ev::ObjectEnd(name_of(&ctx))),
                JsonEvent::ArrayBegin => out.push(Ev::ArrayBegin(name_of(&ctx))),
                JsonEvent::ArrayEnd => out.push(Ev::ArrayEnd(name_of(&ctx))),
                JsonEvent::Value => out.push(Ev::Value(name_of(&ctx), value_repr(&ctx))),
            }
        }
    }
    out
}

#[test]
fn simple_object() {
    let json = br#"{"a":1,"b":null}"#;
    assert_eq!(render(json, 256), "{\n  \"a\": 1,\n  \"b\": null\n}");
}

#[test]
fn array_of_mixed_values() {
    let json = br#"[true,false,0.5,1e2]"#;
    assert_eq!(render(json, 256), "[\n  true, false, 0.5, 100\n]");
}

#[test]
fn two_chunk_split_matches_single_chunk() {
    let json = br#"{"a":1,"b":[2,3]}"#;
    let whole = drive(&mut [0u8; 256], &[json]);
    let chunked = drive(&mut [0u8; 256], &[&json[..7], &json[7..]]);
    assert_eq!(chunked, whole);
}

#[test]
fn chunking_is_invariant_to_split_point() {
    let json = br#"{"a":[1,2,true,null,"x"],"b":{"c":3,"d":[4,5]}}"#;
    let baseline = drive(&mut [0u8; 1024], &[json]);

    for split in 1..json.len() {
        let got = drive(&mut [0u8; 1024], &[&json[..split], &json[split..]]);
        assert_eq!(got, baseline, "split at byte {split} diverged");
    }
}

#[test]
fn growth_to_completion() {
    let json = br#"{"a": "a string longer than the tiny initial buffer allows"}"#;
    let mut small = [0u8; 8];
    let mut ctx = JsonContext::new(&mut small);

    let mut big = [0u8; 256];
    let mut healed = false;
    loop {
        match ctx.parse(json) {
            JsonEvent::Error(ParseErrorKind::InsufficientMemory) => {
                ctx.reallocate(&mut big).unwrap();
                healed = true;
            }
            JsonEvent::Error(kind) => panic!("unexpected error: {kind:?}"),
            JsonEvent::EndOfDocument => break,
            _ => {}
        }
    }
    assert!(
        healed,
        "the tiny buffer should have triggered at least one growth"
    );
}

#[test]
fn leading_comma_is_a_syntax_error() {
    assert_eq!(expect_error(br#"[,1]"#, 64), ParseErrorKind::Syntax);
}

#[test]
fn trailing_comma_is_a_syntax_error() {
    assert_eq!(expect_error(br#"[1,]"#, 64), ParseErrorKind::Syntax);
}

#[test]
fn bracket_brace_mismatch_is_a_token_mismatch() {
    assert_eq!(expect_error(br#"[1}"#, 64), ParseErrorKind::TokenMismatch);
}

#[test]
fn utf16_be_with_bom() {
    let mut json = vec![0xFEu8, 0xFF];
    for unit in r#"{"a":1}"#.encode_utf16() {
        json.extend_from_slice(&unit.to_be_bytes());
    }

    let mut buf = [0u8; 256];
    let mut ctx = JsonContext::new(&mut buf);

    let mut name = None;
    loop {
        match ctx.parse(&json) {
            JsonEvent::Name => {
                let units: Vec<u16> = ctx
                    .name_bytes()
                    .unwrap()
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                name = Some(String::from_utf16(&units).unwrap());
            }
            JsonEvent::Value => {
                assert_eq!(ctx.integer_value::<i64>().unwrap(), 1);
            }
            JsonEvent::EndOfDocument => break,
            JsonEvent::Error(kind) => panic!("parse error: {kind:?}"),
            _ => {}
        }
    }

    assert_eq!(ctx.encoding(), Encoding::Utf16Be);
    assert_eq!(name.as_deref(), Some("a"));
}

#[test]
fn unexpected_eof_mid_multibyte_char_then_resumes() {
    let mut buf = [0u8; 64];
    let mut ctx = JsonContext::new(&mut buf);

    // {"s":"<first byte of the euro sign>
    let chunk1: Vec<u8> = br#"{"s":""#.iter().copied().chain([0xE2]).collect();
    assert_eq!(ctx.parse(&chunk1), JsonEvent::ObjectBegin);
    assert_eq!(ctx.parse(&chunk1), JsonEvent::Name);
    assert_eq!(
        ctx.parse(&chunk1),
        JsonEvent::Error(ParseErrorKind::UnexpectedEof)
    );

    let chunk2: Vec<u8> = [0x82u8, 0xAC]
        .into_iter()
        .chain(br#""}"#.iter().copied())
        .collect();

    assert_eq!(ctx.parse(&chunk2), JsonEvent::Value);
    assert_eq!(ctx.string_value().unwrap().unwrap(), "\u{20AC}");
    assert_eq!(ctx.parse(&chunk2), JsonEvent::ObjectEnd);
    assert_eq!(ctx.parse(&chunk2), JsonEvent::EndOfDocument);
}

#[test]
fn new_pointer_after_eof_with_pending_carryover() {
    let mut buf = [0u8; 64];
    let mut ctx = JsonContext::new(&mut buf);

    let chunk1: Vec<u8> = br#"{"s":""#.iter().copied().chain([0xE2]).collect();
    assert_eq!(ctx.parse(&chunk1), JsonEvent::ObjectBegin);
    assert_eq!(ctx.parse(&chunk1), JsonEvent::Name);
    assert_eq!(
        ctx.parse(&chunk1),
        JsonEvent::Error(ParseErrorKind::UnexpectedEof)
    );

    // A completely separate allocation -- pointer identity must not matter
    // while a code unit is pending in the stream carry-over.
    let chunk2: Vec<u8> = [0x82u8, 0xAC]
        .into_iter()
        .chain(br#""}"#.iter().copied())
        .collect();
    assert_ne!(chunk1.as_ptr(), chunk2.as_ptr());

    assert_eq!(ctx.parse(&chunk2), JsonEvent::Value);
    assert_eq!(ctx.string_value().unwrap().unwrap(), "\u{20AC}");
}

#[test]
fn depth_returns_to_zero_at_end_of_document() {
    let json = br#"{"a":[1,[2,3],4]}"#;
    let mut buf = [0u8; 256];
    let mut ctx = JsonContext::new(&mut buf);

    loop {
        match ctx.parse(json) {
            JsonEvent::EndOfDocument => break,
            JsonEvent::Error(kind) => panic!("parse error: {kind:?}"),
            _ => {}
        }
    }
    assert_eq!(ctx.depth(), 0);
}

#[test]
fn max_depth_is_enforced_independent_of_buffer_size() {
    let options = JsonParserOptionsBuilder::default()
        .with_max_depth(1)
        .build();
    let mut buf = [0u8; 256];
    let mut ctx = JsonContext::with_options(&mut buf, options);

    let json = br#"[[1]]"#;
    assert_eq!(ctx.parse(json), JsonEvent::ArrayBegin);
    assert_eq!(
        ctx.parse(json),
        JsonEvent::Error(ParseErrorKind::InsufficientMemory)
    );
}

#[test]
fn line_and_column_are_monotonic_across_a_multiline_document() {
    let json = b"{\n  \"a\": 1,\n  \"b\": 2\n}";
    let mut buf = [0u8; 256];
    let mut ctx = JsonContext::new(&mut buf);

    let mut last_line = ctx.line();
    loop {
        match ctx.parse(json) {
            JsonEvent::EndOfDocument => break,
            JsonEvent::Error(kind) => panic!("parse error: {kind:?}"),
            _ => {}
        }
        assert!(ctx.line() >= last_line, "line number went backwards");
        last_line = ctx.line();
    }
    assert_eq!(last_line, 4);
}

#[test]
fn leading_zero_is_accepted() {
    let json = br#"[00]"#;
    let mut buf = [0u8; 64];
    let mut ctx = JsonContext::new(&mut buf);

    let mut seen = None;
    loop {
        match ctx.parse(json) {
            JsonEvent::Value if ctx.value_type() == ValueType::Integer => {
                seen = Some(ctx.integer_value::<i64>().unwrap());
            }
            JsonEvent::EndOfDocument => break,
            JsonEvent::Error(kind) => panic!("parse error: {kind:?}"),
            _ => {}
        }
    }
    assert_eq!(seen, Some(0));
}

#[test]
fn bare_minus_is_a_syntax_error_at_the_terminator() {
    assert_eq!(expect_error(br#"[-]"#, 64), ParseErrorKind::Syntax);
}

/// Pins the decision recorded for the surrogate-pair open question: two
/// consecutive `\uXXXX` escapes are never combined into one scalar, even
/// when they form a valid surrogate pair. Each half is re-encoded on its
/// own, which under UTF-8 yields non-minimal, technically invalid bytes
/// rather than a single 4-byte encoding of the combined code point.
#[test]
fn surrogate_pair_escapes_are_not_coalesced() {
    let json = br#"{"s":"\uD83D\uDE00"}"#;
    let mut buf = [0u8; 128];
    let mut ctx = JsonContext::new(&mut buf);

    let mut value = None;
    loop {
        match ctx.parse(json) {
            JsonEvent::Value if ctx.value_type() == ValueType::String => {
                value = Some(ctx.string_value_bytes().unwrap().to_vec());
            }
            JsonEvent::EndOfDocument => break,
            JsonEvent::Error(kind) => panic!("parse error: {kind:?}"),
            _ => {}
        }
    }

    let value = value.expect("string value was published");
    assert_eq!(
        value,
        vec![0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80],
        "each \\uXXXX half must be encoded independently rather than coalesced"
    );
}
