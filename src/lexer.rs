//! Lexical analysis (tokenization) for shell input lines.

/// Characters that separate tokens outside of quoted blocks.
const DELIMITERS: &str = " \t\r\n\x07";

/// Block-open characters. A block suppresses delimiter handling until the
/// corresponding entry of [`BLOCK_CLOSE`] (same index) is seen.
const BLOCK_OPEN: &str = "'\"";
const BLOCK_CLOSE: &str = "'\"";

/// Comment marker. Only recognized at the start of a token.
const COMMENT: char = '#';

/// A restartable tokenizer over one input line.
///
/// Each call to [`Iterator::next`] consumes one token. Tokens borrow from the
/// line, so they never outlive it. Scanning rules:
///
/// - a backslash escapes the next character; both are kept verbatim in the
///   token (this also applies inside quoted blocks),
/// - a quote character opens a block in which delimiters are ordinary
///   characters; the block ends at the matching quote, which is consumed as
///   part of the token,
/// - a token that both starts and ends with a quote character has those two
///   characters stripped,
/// - a token starting with `#` ends the whole pass; neither it nor anything
///   after it is produced.
///
/// An unterminated block or a trailing backslash is accepted silently: the
/// rest of the line becomes part of the token.
pub struct Tokenizer<'a> {
    line: &'a str,
    pos: usize,
    done: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            line,
            pos: 0,
            done: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.line[self.pos..].chars().next()
    }

    /// Cut the next raw token out of the line, or `None` at end of input.
    fn scan_token(&mut self) -> Option<&'a str> {
        while let Some(ch) = self.peek() {
            if !is_delimiter(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        if self.pos >= self.line.len() {
            return None;
        }

        let start = self.pos;
        let mut in_block: Option<char> = None;
        let mut escaped = false;

        while let Some(ch) = self.peek() {
            self.pos += ch.len_utf8();

            if escaped {
                escaped = false;
                continue;
            }
            if ch == '\\' {
                escaped = true;
                continue;
            }
            if let Some(close) = in_block {
                if ch == close {
                    in_block = None;
                }
                continue;
            }
            if let Some(idx) = BLOCK_OPEN.find(ch) {
                in_block = Some(BLOCK_CLOSE.as_bytes()[idx] as char);
                continue;
            }
            if is_delimiter(ch) {
                let end = self.pos - ch.len_utf8();
                return Some(&self.line[start..end]);
            }
        }

        Some(&self.line[start..])
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.done {
            return None;
        }
        let token = self.scan_token()?;
        if token.starts_with(COMMENT) {
            self.done = true;
            return None;
        }
        Some(strip_quotes(token))
    }
}

fn is_delimiter(ch: char) -> bool {
    DELIMITERS.contains(ch)
}

/// Strip surrounding quote characters from a token.
///
/// Both ends must be members of the quote set, but they are not required to
/// match each other: `'abc"` is stripped the same way `"abc"` is.
fn strip_quotes(token: &str) -> &str {
    let bytes = token.as_bytes();
    if bytes.len() >= 2
        && BLOCK_OPEN.contains(bytes[0] as char)
        && BLOCK_OPEN.contains(bytes[bytes.len() - 1] as char)
    {
        &token[1..token.len() - 1]
    } else {
        token
    }
}
