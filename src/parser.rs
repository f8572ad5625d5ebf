//! Line-oriented parsing of plaintext address lists.
//!
//! Lists are read lazily, one physical line at a time, so a multi-megabyte
//! list never has to be held in memory as parsed tokens.
//!
//! A line yields at most one token:
//! - a trailing `\r` is dropped (Windows line endings)
//! - blank lines and lines starting with `#` (after leading whitespace) are skipped
//! - the line is cut at the first `#` or `;` (inline comment)
//! - the rest is cut at the first whitespace (trailing label)
//! - an empty result yields nothing

use std::io::{self, BufRead};

/// Markers that start an inline comment or annotation.
const COMMENT_MARKERS: [char; 2] = ['#', ';'];

/// Extract the address token from a single line, if any.
///
/// # Examples
/// ```
/// use listsync::parser::extract_token;
/// assert_eq!(extract_token("1.2.3.0/24 # China block"), Some("1.2.3.0/24"));
/// assert_eq!(extract_token("1.2.3.0/24\tCN"), Some("1.2.3.0/24"));
/// assert_eq!(extract_token("   "), None);
/// ```
pub fn extract_token(line: &str) -> Option<&str> {
    let line = line.strip_suffix('\r').unwrap_or(line).trim_start();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let uncommented = line.split(COMMENT_MARKERS).next().unwrap_or("");
    let token = uncommented
        .split(char::is_whitespace)
        .next()
        .unwrap_or("");

    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Lazy iterator over the tokens of a list.
///
/// Invalid UTF-8 is decoded lossily; such lines are still handed out and
/// left to address validation to reject.
pub struct Tokens<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> Tokens<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(128),
        }
    }
}

impl<R: BufRead> Iterator for Tokens<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    if self.buf.last() == Some(&b'\n') {
                        self.buf.pop();
                    }
                    let line = String::from_utf8_lossy(&self.buf);
                    if let Some(token) = extract_token(&line) {
                        return Some(Ok(token.to_string()));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Convenience constructor for [`Tokens`].
pub fn tokens<R: BufRead>(reader: R) -> Tokens<R> {
    Tokens::new(reader)
}
