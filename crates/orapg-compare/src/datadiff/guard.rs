//! Lexical modifying-statement guard.
//!
//! A query is rejected if it contains, as a whole word and regardless of
//! case, any of `INSERT`, `UPDATE`, `DELETE`, `CREATE`. This is a
//! conservative lexical check, not a parser: a SELECT whose string literal
//! contains one of the keywords is rejected (false positive), and
//! vendor-specific DDL outside the four keywords passes (false negative).
//! Both behaviors are intentional and kept as-is pending a policy decision;
//! do not "fix" one without deciding the other.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CompareError, Result};

fn modifying_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(INSERT|UPDATE|DELETE|CREATE)\b").expect("valid regex")
    })
}

/// Whether the lexical guard classifies this query as modifying.
pub fn is_modifying_statement(query: &str) -> bool {
    modifying_re().is_match(query)
}

/// Reject modifying statements with [`CompareError::NotAllowed`].
pub fn ensure_read_only(query: &str) -> Result<()> {
    if let Some(m) = modifying_re().find(query) {
        return Err(CompareError::NotAllowed(format!(
            "query contains {}",
            m.as_str().to_uppercase()
        )));
    }
    Ok(())
}
