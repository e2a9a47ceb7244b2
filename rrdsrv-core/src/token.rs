//! Quote-aware tokenization of raw export queries

use crate::error::{SanitizeError, SanitizeResult};

/// One syntactic unit of the raw query.
///
/// `offset` is the byte offset of the token's first character in the raw
/// input, kept for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub offset: usize,
}

/// Split a raw query into tokens.
///
/// Whitespace outside quotes separates tokens and collapses; a `"` or `'`
/// opens a quoted span in which whitespace is literal. A backslash consumes
/// the following character only when it escapes something the tokenizer
/// itself interprets: a quote, whitespace, or another backslash. Any other
/// backslash sequence is kept verbatim, so clause-level escapes such as the
/// `\:` inside a DEF path field reach the clause parser intact.
///
/// Empty input yields an empty token list. An unterminated quote or a
/// trailing backslash is a `MalformedQuery` error.
pub fn tokenize(input: &str) -> SanitizeResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut start = 0usize;
    let mut in_token = false;
    // (quote char, byte offset where it opened)
    let mut quote: Option<(char, usize)> = None;
    let mut chars = input.char_indices();

    while let Some((i, ch)) = chars.next() {
        if let Some((open, _)) = quote {
            match ch {
                '\\' => match chars.next() {
                    Some((_, next)) if next == open || next == '\\' => text.push(next),
                    Some((_, next)) => {
                        text.push('\\');
                        text.push(next);
                    }
                    None => {
                        return Err(SanitizeError::malformed_query(format!(
                            "dangling escape at offset {i}"
                        )))
                    }
                },
                c if c == open => quote = None,
                c => text.push(c),
            }
            continue;
        }

        match ch {
            '\\' => {
                if !in_token {
                    in_token = true;
                    start = i;
                }
                match chars.next() {
                    Some((_, next))
                        if next.is_whitespace()
                            || next == '"'
                            || next == '\''
                            || next == '\\' =>
                    {
                        text.push(next)
                    }
                    Some((_, next)) => {
                        text.push('\\');
                        text.push(next);
                    }
                    None => {
                        return Err(SanitizeError::malformed_query(format!(
                            "dangling escape at offset {i}"
                        )))
                    }
                }
            }
            '"' | '\'' => {
                if !in_token {
                    in_token = true;
                    start = i;
                }
                quote = Some((ch, i));
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(Token {
                        text: std::mem::take(&mut text),
                        offset: start,
                    });
                    in_token = false;
                }
            }
            c => {
                if !in_token {
                    in_token = true;
                    start = i;
                }
                text.push(c);
            }
        }
    }

    if let Some((_, offset)) = quote {
        return Err(SanitizeError::malformed_query(format!(
            "unterminated quote at offset {offset}"
        )));
    }
    if in_token {
        tokens.push(Token {
            text,
            offset: start,
        });
    }

    Ok(tokens)
}
