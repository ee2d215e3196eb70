#![allow(missing_docs, dead_code)]

/// Mixed-width text: every UTF-8 length class, repeated so that chunk
/// boundaries land at every offset of each sequence.
pub const SAMPLE: &str = "plain ascii, café, naïve, 日本語テキスト, ∑ ≠ ∞, 🦀🚀😀 and back to ascii.\n";

pub fn sample(repeats: usize) -> String {
    SAMPLE.repeat(repeats)
}

/// Invalid and truncated sequences mixed with valid text.
pub const MALFORMED: &[u8] = b"ok \xFF bad lead, \xC3( broken pair, \xE2\x82 short, \xF4\x90\x80\x80 too big, end \xF0\x9F";

/// What the decoder makes of [`MALFORMED`].
pub const MALFORMED_DECODED: &str =
    "ok \u{FFFD} bad lead, \u{FFFD} broken pair, \u{FFFD}short, \u{FFFD} too big, end ";
