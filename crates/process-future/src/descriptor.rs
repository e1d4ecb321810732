//! Splitting process descriptors into words
//!
//! Descriptors are shell-like strings such as `jobs/report.sh --since today`
//! or `https://example.com -H 'Accept: text/html'`. This is not a shell: there
//! is no expansion, only whitespace splitting with quoting.

use crate::error::{Error, Result};

/// Split `descriptor` into words.
///
/// Single quotes keep everything literally. Double quotes keep whitespace and
/// allow `\"` and `\\` escapes. Outside quotes a backslash escapes the next
/// character.
pub fn split(descriptor: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = descriptor.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => word.push(c),
                        None => return Err(unterminated('\'')),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\')) => word.push(c),
                            Some(c) => {
                                word.push('\\');
                                word.push(c);
                            }
                            None => return Err(unterminated('"')),
                        },
                        Some(c) => word.push(c),
                        None => return Err(unterminated('"')),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(c) = chars.next() {
                    word.push(c);
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                word.push(c);
            }
        }
    }
    if in_word {
        words.push(word);
    }

    Ok(words)
}

fn unterminated(quote: char) -> Error {
    Error::InvalidDescriptor {
        reason: format!("unterminated {} quote", quote),
    }
}
