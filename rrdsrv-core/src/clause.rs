//! Clause classification, path-field extraction, and rewriting
//!
//! The export language is a sequence of colon-delimited clauses. Only a
//! closed set of clause kinds is recognized; only `DEF` clauses embed a
//! filesystem reference, in the shape `DEF:name=path:dsname:cf...` where a
//! `\:` inside the path field is a literal colon.

use std::path::Path;

use crate::error::{SanitizeError, SanitizeResult};

/// The recognized clause kinds of the export language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    /// `DEF:name=path:dsname:cf...`, the only kind that names a file
    Def,
    /// `CDEF:name=rpn-expression`, a computed variable
    Cdef,
    /// `VDEF:name=rpn-expression`, a variable definition
    Vdef,
    /// `XPORT:name[:legend]`, an export column
    Xport,
    /// `--flag`, never permitted to originate from the query
    Flag,
    Unrecognized,
}

impl ClauseKind {
    /// Whether a clause of this kind passes through the sanitizer without
    /// confinement. These kinds reference only previously defined symbolic
    /// names, never filesystem paths.
    pub fn is_always_safe(self) -> bool {
        matches!(self, ClauseKind::Cdef | ClauseKind::Vdef | ClauseKind::Xport)
    }
}

/// Classify a token by its leading keyword, case-sensitively.
///
/// The keyword is everything up to the first `:` or `=`. The sanitizer is
/// deny-by-default: anything not in the recognized set is `Unrecognized`.
pub fn classify(text: &str) -> ClauseKind {
    if text.starts_with("--") {
        return ClauseKind::Flag;
    }
    let keyword = text
        .split(|c| c == ':' || c == '=')
        .next()
        .unwrap_or_default();
    match keyword {
        "DEF" => ClauseKind::Def,
        "CDEF" => ClauseKind::Cdef,
        "VDEF" => ClauseKind::Vdef,
        "XPORT" => ClauseKind::Xport,
        _ => ClauseKind::Unrecognized,
    }
}

/// The path sub-field of a `DEF` clause.
///
/// `text` is the unescaped path; `start..end` is the byte range of the raw
/// (still escaped) field within the clause, used by [`rewrite_path_field`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathField {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Locate the path sub-field of a `DEF` clause.
///
/// Expects the shape `DEF:name=path:dsname:cf...`; the path runs from the
/// first `=` to the next unescaped `:`. Returns `MalformedClause` when the
/// shape is wrong or the path field is empty.
pub fn extract_path_field(clause: &str) -> SanitizeResult<PathField> {
    let body = clause.strip_prefix("DEF:").ok_or_else(|| {
        SanitizeError::malformed_clause(format!("not a DEF clause: {clause}"))
    })?;

    let eq = body
        .find('=')
        .ok_or_else(|| SanitizeError::malformed_clause(format!("missing '=' in {clause}")))?;
    let name = &body[..eq];
    if name.is_empty() || name.contains(':') {
        return Err(SanitizeError::malformed_clause(format!(
            "bad variable name in {clause}"
        )));
    }

    // Byte positions below are relative to `clause`, not `body`.
    let start = "DEF:".len() + eq + 1;
    let end = match find_unescaped_colon(&clause[start..]) {
        Some(pos) => start + pos,
        None => {
            return Err(SanitizeError::malformed_clause(format!(
                "missing data source name in {clause}"
            )))
        }
    };

    let raw = &clause[start..end];
    if raw.is_empty() {
        return Err(SanitizeError::malformed_clause(format!(
            "empty path field in {clause}"
        )));
    }

    let rest: Vec<&str> = split_unescaped_colons(&clause[end + 1..]);
    if rest.len() < 2 || rest[0].is_empty() || rest[1].is_empty() {
        return Err(SanitizeError::malformed_clause(format!(
            "missing data source name or consolidation function in {clause}"
        )));
    }

    Ok(PathField {
        text: unescape_field(raw),
        start,
        end,
    })
}

/// Splice a confined absolute path into a `DEF` clause in place of the
/// original path field, leaving every other sub-field untouched.
///
/// Colons and backslashes in the substituted path are re-escaped so the
/// rewritten clause parses identically downstream.
pub fn rewrite_path_field(clause: &str, field: &PathField, confined: &Path) -> String {
    let mut rewritten = String::with_capacity(clause.len());
    rewritten.push_str(&clause[..field.start]);
    rewritten.push_str(&escape_field(&confined.to_string_lossy()));
    rewritten.push_str(&clause[field.end..]);
    rewritten
}

/// Byte position of the first `:` not preceded by a `\`.
fn find_unescaped_colon(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, ch) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            ':' => return Some(i),
            _ => {}
        }
    }
    None
}

fn split_unescaped_colons(s: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut base = 0;
    while let Some(pos) = find_unescaped_colon(&s[base..]) {
        fields.push(&s[base..base + pos]);
        base += pos + 1;
    }
    fields.push(&s[base..]);
    fields
}

fn unescape_field(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;
    for ch in s.chars() {
        if escaped {
            out.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else {
            out.push(ch);
        }
    }
    out
}

fn escape_field(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch == '\\' || ch == ':' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_classify_recognized_kinds() {
        assert_eq!(classify("DEF:a=x.rrd:ds0:AVERAGE"), ClauseKind::Def);
        assert_eq!(classify("CDEF:b=a,100,*"), ClauseKind::Cdef);
        assert_eq!(classify("VDEF:m=a,MAXIMUM"), ClauseKind::Vdef);
        assert_eq!(classify("XPORT:a:load"), ClauseKind::Xport);
    }

    #[test]
    fn test_classify_is_case_sensitive() {
        assert_eq!(classify("def:a=x.rrd:ds0:AVERAGE"), ClauseKind::Unrecognized);
        assert_eq!(classify("Xport:a"), ClauseKind::Unrecognized);
    }

    #[test]
    fn test_classify_flags_and_garbage() {
        assert_eq!(classify("--daemon"), ClauseKind::Flag);
        assert_eq!(classify("--json"), ClauseKind::Flag);
        assert_eq!(classify("GRAPH:x"), ClauseKind::Unrecognized);
        assert_eq!(classify(""), ClauseKind::Unrecognized);
    }

    #[test]
    fn test_always_safe_set() {
        assert!(ClauseKind::Cdef.is_always_safe());
        assert!(ClauseKind::Vdef.is_always_safe());
        assert!(ClauseKind::Xport.is_always_safe());
        assert!(!ClauseKind::Def.is_always_safe());
        assert!(!ClauseKind::Flag.is_always_safe());
        assert!(!ClauseKind::Unrecognized.is_always_safe());
    }

    #[test]
    fn test_extract_simple_path() {
        let field = extract_path_field("DEF:a=data.rrd:ds0:AVERAGE").unwrap();
        assert_eq!(field.text, "data.rrd");
        assert_eq!(&"DEF:a=data.rrd:ds0:AVERAGE"[field.start..field.end], "data.rrd");
    }

    #[test]
    fn test_extract_escaped_colon_is_literal() {
        let field = extract_path_field(r"DEF:a=odd\:name.rrd:ds0:MAX").unwrap();
        assert_eq!(field.text, "odd:name.rrd");
    }

    #[test]
    fn test_extract_rejects_missing_equals() {
        let err = extract_path_field("DEF:a:ds0:AVERAGE").unwrap_err();
        assert_eq!(err.category(), "malformed_clause");
    }

    #[test]
    fn test_extract_rejects_empty_path() {
        let err = extract_path_field("DEF:a=:ds0:AVERAGE").unwrap_err();
        assert_eq!(err.category(), "malformed_clause");
    }

    #[test]
    fn test_extract_rejects_missing_ds_or_cf() {
        assert!(extract_path_field("DEF:a=data.rrd").is_err());
        assert!(extract_path_field("DEF:a=data.rrd:ds0").is_err());
        assert!(extract_path_field("DEF:a=data.rrd::AVERAGE").is_err());
    }

    #[test]
    fn test_extract_allows_trailing_def_options() {
        let field = extract_path_field("DEF:a=data.rrd:ds0:AVERAGE:step=300").unwrap();
        assert_eq!(field.text, "data.rrd");
    }

    #[test]
    fn test_rewrite_preserves_other_fields() {
        let clause = "DEF:a=data.rrd:ds0:AVERAGE:step=300";
        let field = extract_path_field(clause).unwrap();
        let rewritten =
            rewrite_path_field(clause, &field, &PathBuf::from("/srv/rrd/data.rrd"));
        assert_eq!(rewritten, "DEF:a=/srv/rrd/data.rrd:ds0:AVERAGE:step=300");
    }

    #[test]
    fn test_rewrite_reescapes_colons() {
        let clause = r"DEF:a=odd\:name.rrd:ds0:MAX";
        let field = extract_path_field(clause).unwrap();
        let rewritten =
            rewrite_path_field(clause, &field, &PathBuf::from("/srv/rrd/odd:name.rrd"));
        assert_eq!(rewritten, r"DEF:a=/srv/rrd/odd\:name.rrd:ds0:MAX");
    }
}
