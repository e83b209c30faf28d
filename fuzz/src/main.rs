use arenajson::{JsonContext, JsonEvent};

#[macro_use]
extern crate afl;

/// A single fixed-size arena per run. Growing the buffer mid-parse is
/// exercised by the unit/integration tests already; the fuzz target only
/// cares about finding panics and logic bugs in the state machine, so a
/// buffer too small for the input is just a clean, expected stop.
const BUF_LEN: usize = 1 << 20;

fn main() {
    fuzz!(|data: &[u8]| {
        if data.is_empty() {
            return;
        }

        let mut buf = [0u8; BUF_LEN];
        let mut ctx = JsonContext::new(&mut buf);

        loop {
            match ctx.parse(data) {
                JsonEvent::EndOfDocument => break,
                JsonEvent::Error(_) => break,
                _ => {}
            }
        }
    });
}
