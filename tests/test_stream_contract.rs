//! Stream accumulation contract, end to end over the SSE decoder and
//! token scanner: the assembled output must equal the concatenation of all
//! non-sentinel text fields received before the terminator, in arrival
//! order, regardless of how the transport slices the bytes.

use quillpad::llm::stream::{Scan, SseDecoder, TokenScanner};
use quillpad::llm::StopReason;

fn frame(text: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({ "choices": [ { "text": text } ] })
    )
}

fn wire(tokens: &[&str], terminator: &str) -> Vec<u8> {
    let mut s = String::new();
    for t in tokens {
        s.push_str(&frame(t));
    }
    s.push_str(terminator);
    s.into_bytes()
}

/// Run the full decode+scan pipeline over `bytes` delivered in chunks of
/// `chunk_size`, returning the accumulated text and the stop reason.
fn consume(bytes: &[u8], chunk_size: usize, sentinels: Vec<String>) -> (String, Option<StopReason>) {
    let mut decoder = SseDecoder::new();
    let scanner = TokenScanner::new(sentinels);
    let mut out = String::new();

    for chunk in bytes.chunks(chunk_size) {
        for payload in decoder.feed(chunk) {
            for scan in scanner.scan(&payload) {
                match scan {
                    Scan::Token(t) => out.push_str(&t),
                    Scan::Skip => {}
                    Scan::Finished(reason) => return (out, Some(reason)),
                }
            }
        }
    }
    (out, None)
}

#[test]
fn accumulation_is_chunking_invariant() {
    let tokens = ["The ", "quick ", "brown ", "fox ", "jumps."];
    let bytes = wire(&tokens, "data: [DONE]\n\n");
    let expected: String = tokens.concat();

    for chunk_size in 1..=bytes.len() {
        let (out, reason) = consume(&bytes, chunk_size, vec![]);
        assert_eq!(out, expected, "lost or duplicated tokens at chunk size {chunk_size}");
        assert_eq!(reason, Some(StopReason::Done));
    }
}

#[test]
fn sentinel_terminates_and_is_not_emitted() {
    let mut s = String::new();
    s.push_str(&frame("Hello "));
    s.push_str(&frame("world.<|eot_id|>"));
    s.push_str(&frame("after the end"));
    let bytes = s.into_bytes();

    for chunk_size in [1, 3, 7, bytes.len()] {
        let (out, reason) = consume(&bytes, chunk_size, vec!["<|eot_id|>".into()]);
        assert_eq!(out, "Hello world.");
        assert_eq!(reason, Some(StopReason::Sentinel));
    }
}

#[test]
fn tokens_after_done_are_never_seen() {
    let mut s = String::new();
    s.push_str(&frame("kept"));
    s.push_str("data: [DONE]\n\n");
    s.push_str(&frame("dropped"));
    let (out, reason) = consume(s.as_bytes(), 5, vec![]);
    assert_eq!(out, "kept");
    assert_eq!(reason, Some(StopReason::Done));
}

#[test]
fn malformed_frames_are_skipped_without_loss() {
    let mut s = String::new();
    s.push_str(&frame("a"));
    s.push_str("data: {broken json\n\n");
    s.push_str(&frame("b"));
    s.push_str("data: [DONE]\n\n");
    let (out, reason) = consume(s.as_bytes(), 4, vec![]);
    assert_eq!(out, "ab");
    assert_eq!(reason, Some(StopReason::Done));
}

#[test]
fn multibyte_tokens_survive_any_split() {
    let tokens = ["na\u{ef}ve ", "caf\u{e9} ", "\u{201c}done\u{201d}"];
    let bytes = wire(&tokens, "data: [DONE]\n\n");
    let expected: String = tokens.concat();

    for chunk_size in 1..=8 {
        let (out, _) = consume(&bytes, chunk_size, vec![]);
        assert_eq!(out, expected);
    }
}
