//! Context-aware prompt assembly.
//!
//! The prompt sent to the completion endpoint is built from free-text
//! fields around the user's draft in a fixed interleaving order:
//!
//! ```text
//! memory
//! lorebook
//! draft            ← author note spliced before the last two sentences
//! ```
//!
//! Memory and lorebook are prepended with `"\n"` separators (empty fields
//! are omitted together with their separator). The author note is spliced
//! before the last two sentence-boundary segments of the assembled text,
//! or prepended when fewer than two segments exist.

/// Free-text context fields that surround the draft.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    /// Always-present background, highest in the prompt.
    pub memory: String,
    /// World/lore entries, between memory and the draft.
    pub lorebook: String,
    /// Instruction spliced near the end, where models attend most.
    pub author_note: String,
}

impl PromptContext {
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty() && self.lorebook.is_empty() && self.author_note.is_empty()
    }
}

/// Assemble the full prompt from context fields and the draft.
pub fn compose(ctx: &PromptContext, draft: &str) -> String {
    let mut base = String::new();
    for part in [ctx.memory.as_str(), ctx.lorebook.as_str(), draft] {
        if part.is_empty() {
            continue;
        }
        if !base.is_empty() {
            base.push('\n');
        }
        base.push_str(part);
    }

    if ctx.author_note.is_empty() {
        return base;
    }
    splice_author_note(&base, &ctx.author_note)
}

/// Insert `note` before the last two sentence segments of `text`.
/// With fewer than two segments the note is prepended instead.
fn splice_author_note(text: &str, note: &str) -> String {
    let segments = split_sentences(text);
    if segments.len() < 2 {
        let mut out = String::with_capacity(note.len() + 1 + text.len());
        out.push_str(note);
        out.push('\n');
        out.push_str(text);
        return out;
    }

    let split_at = segments.len() - 2;
    let mut out = String::with_capacity(text.len() + note.len() + 1);
    for seg in &segments[..split_at] {
        out.push_str(seg);
    }
    out.push_str(note);
    out.push('\n');
    for seg in &segments[split_at..] {
        out.push_str(seg);
    }
    out
}

/// Split `text` into sentence-boundary segments.
///
/// A segment ends after `.`, `!` or `?` (plus any immediately following
/// closing quotes) and absorbs the whitespace that follows, so the
/// segments always concatenate back to the exact input.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let mut end = i + c.len_utf8();
        // Closing quotes belong to the sentence they end.
        while let Some(&(j, q)) = chars.peek() {
            if matches!(q, '"' | '\u{2019}' | '\u{201d}' | '\'') {
                end = j + q.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        // Only treat this as a boundary at end-of-text or before whitespace;
        // "3.5" or "e.g.x" stay intact.
        match chars.peek() {
            None => {
                segments.push(&text[start..]);
                start = text.len();
            }
            Some(&(_, w)) if w.is_whitespace() => {
                while let Some(&(j, w)) = chars.peek() {
                    if w.is_whitespace() {
                        end = j + w.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                segments.push(&text[start..end]);
                start = end;
            }
            Some(_) => {}
        }
    }

    if start < text.len() {
        segments.push(&text[start..]);
    }
    segments
}
