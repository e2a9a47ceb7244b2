//! Sanitizer facade
//!
//! The single entry point the HTTP handler calls. Stateless across
//! requests: each call is a pure transformation from (query, root) to an
//! argument list or the first error encountered.

use tracing::debug;

use crate::clause::{self, ClauseKind};
use crate::confine::RrdRoot;
use crate::error::{SanitizeError, SanitizeResult};
use crate::token::tokenize;

/// Sanitize a raw export query into an ordered argument list.
///
/// Tokenizes once, then per token: classify; `DEF` clauses get their path
/// field extracted, confined to `root`, and rewritten to the canonical
/// absolute form; the always-safe kinds pass through unchanged; everything
/// else fails the whole request. Fail-fast: no partial result is returned.
///
/// An empty result for non-empty input is not an error at this layer; the
/// caller decides whether an empty argument list is acceptable.
pub fn sanitize_xport(query: &str, root: &RrdRoot) -> SanitizeResult<Vec<String>> {
    let tokens = tokenize(query)?;
    let mut args = Vec::with_capacity(tokens.len());

    for token in tokens {
        let kind = clause::classify(&token.text);
        match kind {
            ClauseKind::Def => {
                let field = clause::extract_path_field(&token.text)?;
                let confined = root.confine(&field.text)?;
                debug!(
                    file = %confined.relative().display(),
                    "confined DEF clause reference"
                );
                args.push(clause::rewrite_path_field(
                    &token.text,
                    &field,
                    confined.absolute(),
                ));
            }
            kind if kind.is_always_safe() => args.push(token.text),
            _ => {
                debug!(token = %token.text, offset = token.offset, "rejected token");
                return Err(SanitizeError::rejected_token(format!(
                    "{:?} at offset {}",
                    token.text, token.offset
                )));
            }
        }
    }

    Ok(args)
}
