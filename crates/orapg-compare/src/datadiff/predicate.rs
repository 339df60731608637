//! Sampled-key predicate building.
//!
//! The random-sample flow draws N rows from one engine and derives an
//! OR-of-AND equality predicate over the primary key from the sampled key
//! values, so the other engine is queried for exactly the same key set.
//! Key values are quoted as string literals (both engines coerce in key
//! comparisons, matching the exported rendering); a NULL key part becomes
//! an `IS NULL` term. Column identifiers are validated and emitted in the
//! engine's fold, unquoted, as the surrounding queries reference them.

use crate::core::identifier::{fold_upper, quote_literal, validate_identifier};
use crate::core::{Engine, SqlValue};
use crate::error::{CompareError, Result};

/// Fold a predicate column name for the engine it will run against.
fn fold_for(engine: Engine, name: &str) -> String {
    match engine {
        Engine::Oracle => fold_upper(name),
        Engine::Postgres => name.to_lowercase(),
    }
}

/// Build the OR-of-AND equality predicate for a set of sampled keys.
///
/// For keys `(1,'x')`, `(2,'y')` over PK `(A, B)` the Oracle-side result is
/// `(A = '1' AND B = 'x') OR (A = '2' AND B = 'y')`.
pub fn sampled_key_predicate(
    engine: Engine,
    pk_columns: &[String],
    keys: &[Vec<SqlValue>],
) -> Result<String> {
    if pk_columns.is_empty() {
        return Err(CompareError::Config(
            "cannot build a key predicate without primary key columns".to_string(),
        ));
    }
    if keys.is_empty() {
        return Err(CompareError::Config(
            "cannot build a key predicate from zero sampled rows".to_string(),
        ));
    }
    for col in pk_columns {
        validate_identifier(col)?;
    }

    let mut disjuncts = Vec::with_capacity(keys.len());
    for key in keys {
        if key.len() != pk_columns.len() {
            return Err(CompareError::Config(format!(
                "sampled key has {} values for {} primary key columns",
                key.len(),
                pk_columns.len()
            )));
        }
        let terms: Vec<String> = pk_columns
            .iter()
            .zip(key)
            .map(|(col, value)| {
                let col = fold_for(engine, col);
                match value {
                    SqlValue::Null => format!("{} IS NULL", col),
                    other => format!("{} = {}", col, quote_literal(&other.render())),
                }
            })
            .collect();
        disjuncts.push(format!("({})", terms.join(" AND ")));
    }

    Ok(disjuncts.join(" OR "))
}

/// Build the random-sample query for the side keys are drawn from.
///
/// The sample is re-sorted by primary key in an outer select so the export
/// lines up positionally with the other side.
pub fn sample_query(engine: Engine, table: &str, pk_columns: &[String], rows: usize) -> Result<String> {
    validate_identifier(table)?;
    let order_by = order_by_clause(engine, pk_columns)?;
    let query = match engine {
        Engine::Postgres => format!(
            "SELECT * FROM (SELECT * FROM {} ORDER BY RANDOM() LIMIT {}) sample ORDER BY {}",
            table.to_lowercase(),
            rows,
            order_by
        ),
        Engine::Oracle => format!(
            "SELECT * FROM (SELECT * FROM {} ORDER BY dbms_random.value) WHERE ROWNUM <= {} ORDER BY {}",
            fold_upper(table),
            rows,
            order_by
        ),
    };
    Ok(query)
}

/// Build the matching-key query for the opposite side.
pub fn keyed_query(
    engine: Engine,
    table: &str,
    pk_columns: &[String],
    predicate: &str,
) -> Result<String> {
    validate_identifier(table)?;
    let table = fold_for(engine, table);
    let order_by = order_by_clause(engine, pk_columns)?;
    Ok(format!(
        "SELECT * FROM {} WHERE {} ORDER BY {}",
        table, predicate, order_by
    ))
}

fn order_by_clause(engine: Engine, pk_columns: &[String]) -> Result<String> {
    if pk_columns.is_empty() {
        return Err(CompareError::Config(
            "cannot order a sample without primary key columns".to_string(),
        ));
    }
    for col in pk_columns {
        validate_identifier(col)?;
    }
    Ok(pk_columns
        .iter()
        .map(|c| fold_for(engine, c))
        .collect::<Vec<_>>()
        .join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_two_column_key_predicate() {
        // Three rows keyed by (A, B): the exact OR-of-AND shape.
        let keys = vec![
            vec![SqlValue::Int(1), SqlValue::Text("x".into())],
            vec![SqlValue::Int(2), SqlValue::Text("y".into())],
            vec![SqlValue::Int(3), SqlValue::Text("z".into())],
        ];
        let predicate =
            sampled_key_predicate(Engine::Oracle, &pk(&["A", "B"]), &keys).unwrap();
        assert_eq!(
            predicate,
            "(A = '1' AND B = 'x') OR (A = '2' AND B = 'y') OR (A = '3' AND B = 'z')"
        );
    }

    #[test]
    fn test_null_key_part_becomes_is_null() {
        let keys = vec![vec![SqlValue::Null, SqlValue::Text("x".into())]];
        let predicate =
            sampled_key_predicate(Engine::Oracle, &pk(&["A", "B"]), &keys).unwrap();
        assert_eq!(predicate, "(A IS NULL AND B = 'x')");
    }

    #[test]
    fn test_literal_quotes_are_escaped() {
        let keys = vec![vec![SqlValue::Text("O'Brien".into())]];
        let predicate = sampled_key_predicate(Engine::Oracle, &pk(&["NAME"]), &keys).unwrap();
        assert_eq!(predicate, "(NAME = 'O''Brien')");
    }

    #[test]
    fn test_postgres_fold_is_lower() {
        let keys = vec![vec![SqlValue::Int(5)]];
        let predicate = sampled_key_predicate(Engine::Postgres, &pk(&["ID"]), &keys).unwrap();
        assert_eq!(predicate, "(id = '5')");
    }

    #[test]
    fn test_key_arity_checked() {
        let keys = vec![vec![SqlValue::Int(1)]];
        assert!(sampled_key_predicate(Engine::Oracle, &pk(&["A", "B"]), &keys).is_err());
        assert!(sampled_key_predicate(Engine::Oracle, &pk(&[]), &keys).is_err());
        assert!(sampled_key_predicate(Engine::Oracle, &pk(&["A"]), &[]).is_err());
    }

    #[test]
    fn test_sample_and_keyed_queries() {
        let q = sample_query(Engine::Postgres, "TB_ORDER", &pk(&["ID"]), 3).unwrap();
        assert!(q.contains("ORDER BY RANDOM() LIMIT 3"));
        assert!(q.ends_with("ORDER BY id"));

        let q = sample_query(Engine::Oracle, "tb_order", &pk(&["ID"]), 3).unwrap();
        assert!(q.contains("dbms_random.value"));
        assert!(q.contains("ROWNUM <= 3"));

        let q = keyed_query(Engine::Oracle, "tb_order", &pk(&["ID"]), "(ID = '1')").unwrap();
        assert_eq!(
            q,
            "SELECT * FROM TB_ORDER WHERE (ID = '1') ORDER BY ID"
        );
    }
}
