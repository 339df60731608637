//! Identifier folding, quoting, and literal escaping.
//!
//! SQL identifiers cannot be passed as parameters in prepared statements,
//! so the comparators build catalog queries and sampled-key predicates by
//! quoting identifiers and values per target dialect instead of splicing
//! raw strings. Oracle folds unquoted identifiers to upper case, PostgreSQL
//! to lower case; every cross-engine join happens on the upper-cased form.

use crate::core::Engine;
use crate::error::{CompareError, Result};

/// Maximum identifier length (conservative limit across both engines).
/// - PostgreSQL: 63 bytes
/// - Oracle: 128 bytes since 12.2
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Suffix convention on Postgres-side index names, stripped before the
/// cross-engine index-name join.
const PG_INDEX_SUFFIX: &str = "_IDX";

/// Validate an identifier before quoting.
///
/// Rejects empty identifiers, identifiers containing null bytes, and
/// identifiers exceeding the maximum length.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CompareError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(CompareError::Config(format!(
            "Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(CompareError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier: double quotes, inner quotes doubled.
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote an Oracle identifier: double quotes around the upper-cased name.
///
/// Oracle's data dictionary stores unquoted identifiers in upper case, so
/// quoting the folded form preserves the behavior of an unquoted reference.
pub fn quote_oracle(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", fold_upper(name).replace('"', "\"\"")))
}

/// Quote an identifier for the given engine.
pub fn quote_ident(engine: Engine, name: &str) -> Result<String> {
    match engine {
        Engine::Oracle => quote_oracle(name),
        Engine::Postgres => quote_pg(name),
    }
}

/// Quote a string literal for either engine: single quotes doubled.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Fold an identifier to the upper-case canonical comparison form.
pub fn fold_upper(name: &str) -> String {
    name.to_uppercase()
}

/// Strip the Postgres-side index naming suffix, if present, after folding.
pub fn strip_index_suffix(name: &str) -> String {
    let folded = fold_upper(name);
    match folded.strip_suffix(PG_INDEX_SUFFIX) {
        Some(base) => base.to_string(),
        None => folded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_pg() {
        assert_eq!(quote_pg("users").unwrap(), "\"users\"");
        assert_eq!(quote_pg("tab\"le").unwrap(), "\"tab\"\"le\"");
    }

    #[test]
    fn test_quote_oracle_folds_upper() {
        assert_eq!(quote_oracle("order_head").unwrap(), "\"ORDER_HEAD\"");
    }

    #[test]
    fn test_validate_rejects_bad_identifiers() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("a\0b").is_err());
        assert!(validate_identifier(&"x".repeat(200)).is_err());
        assert!(validate_identifier("tb_order_head").is_ok());
    }

    #[test]
    fn test_quote_literal_doubles_quotes() {
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
        assert_eq!(quote_literal("plain"), "'plain'");
    }

    #[test]
    fn test_strip_index_suffix() {
        assert_eq!(strip_index_suffix("tb_order_pk_idx"), "TB_ORDER_PK");
        assert_eq!(strip_index_suffix("TB_ORDER_PK"), "TB_ORDER_PK");
        // Only the suffix position is stripped
        assert_eq!(strip_index_suffix("idx_orders"), "IDX_ORDERS");
    }
}
