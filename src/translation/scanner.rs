//! Lexical scan that finds bare `?` placeholders.
//!
//! Quoted literals, identifiers, comments and dollar-quoted bodies are skipped so a `?` that
//! belongs to the SQL text itself is never treated as a bind position.

#[derive(Clone, Copy)]
enum State<'a> {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(&'a [u8]),
}

/// Byte offsets of every bare `?` in `sql`, in order of appearance.
pub(crate) fn placeholder_positions(sql: &str) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let mut positions = Vec::new();
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'?' => positions.push(idx),
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                    state = State::LineComment;
                    idx += 1;
                }
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some(tag_end) = dollar_tag_end(bytes, idx) {
                        state = State::DollarQuoted(&bytes[idx..=tag_end]);
                        idx = tag_end;
                    }
                }
                _ => {}
            },
            State::SingleQuoted | State::DoubleQuoted => {
                let quote = if matches!(state, State::SingleQuoted) { b'\'' } else { b'"' };
                if b == quote {
                    if bytes.get(idx + 1) == Some(&quote) {
                        idx += 1; // doubled quote is an escape
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if b == b'/' && bytes.get(idx + 1) == Some(&b'*') {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(tag) => {
                if bytes[idx..].starts_with(tag) {
                    state = State::Normal;
                    idx += tag.len() - 1;
                }
            }
        }
        idx += 1;
    }

    positions
}

/// Index of the closing `$` of a `$tag$` opener starting at `start`, if there is one.
fn dollar_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut idx = start + 1;
    while let Some(&b) = bytes.get(idx) {
        if b == b'$' {
            return Some(idx);
        }
        if !(b.is_ascii_alphabetic() || b == b'_' || (idx > start + 1 && b.is_ascii_digit())) {
            return None;
        }
        idx += 1;
    }
    None
}
