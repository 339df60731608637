//! Type mapping between Oracle and PostgreSQL.
//!
//! Maps Oracle's scalar type taxonomy onto the PostgreSQL type a converted
//! schema is expected to carry. `NUMBER` is the one Oracle type that fans
//! out into several plausible targets; the tie-break uses the declared
//! precision and scale.

/// Map an Oracle data type to the expected PostgreSQL type.
///
/// Returns `None` for types outside the mapping table; the column
/// comparator reports those as unmapped rather than guessing.
///
/// `NUMBER` tie-break: precision and scale both present (scale non-zero)
/// maps to `numeric`; otherwise precision <= 4 maps to `smallint`,
/// precision < 10 to `integer`, precision < 19 to `bigint`, and anything
/// larger (or no precision at all) to `numeric`. A declared scale of 0 is
/// treated the same as no scale, so `NUMBER(5,0)` maps to `integer`.
pub fn oracle_to_postgres(
    oracle_type: &str,
    precision: Option<i32>,
    scale: Option<i32>,
) -> Option<String> {
    let mapped = match oracle_type.to_uppercase().as_str() {
        "BLOB" => "bytea",
        "RAW" => "bytea",
        "CHAR" => "character",
        "NCHAR" => "character",
        "CLOB" | "NCLOB" | "LONG" => "text",
        "VARCHAR2" | "NVARCHAR2" => "character varying",
        "DATE" => "timestamp without time zone",
        "BINARY_FLOAT" => "real",
        "BINARY_DOUBLE" => "double precision",
        "FLOAT" => "double precision",
        "NUMBER" => return Some(map_number(precision, scale)),
        t if t.starts_with("TIMESTAMP") => {
            if t.ends_with("WITH TIME ZONE") && !t.ends_with("LOCAL TIME ZONE") {
                "timestamp with time zone"
            } else {
                "timestamp without time zone"
            }
        }
        _ => return None,
    };
    Some(mapped.to_string())
}

/// `NUMBER` precision/scale tie-break.
fn map_number(precision: Option<i32>, scale: Option<i32>) -> String {
    let has_scale = matches!(scale, Some(s) if s != 0);
    let target = match precision {
        Some(p) if p > 0 => {
            if has_scale {
                "numeric"
            } else if p <= 4 {
                "smallint"
            } else if p < 10 {
                "integer"
            } else if p < 19 {
                "bigint"
            } else {
                "numeric"
            }
        }
        _ => "numeric",
    };
    target.to_string()
}

/// Whether a mapped PostgreSQL type carries a declared character length
/// that must also match the Oracle side.
pub fn is_character_type(pg_type: &str) -> bool {
    matches!(pg_type, "character varying" | "character")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_mappings() {
        assert_eq!(
            oracle_to_postgres("VARCHAR2", None, None).as_deref(),
            Some("character varying")
        );
        assert_eq!(oracle_to_postgres("CLOB", None, None).as_deref(), Some("text"));
        assert_eq!(oracle_to_postgres("BLOB", None, None).as_deref(), Some("bytea"));
        assert_eq!(oracle_to_postgres("RAW", None, None).as_deref(), Some("bytea"));
        assert_eq!(
            oracle_to_postgres("DATE", None, None).as_deref(),
            Some("timestamp without time zone")
        );
    }

    #[test]
    fn test_timestamp_variants() {
        assert_eq!(
            oracle_to_postgres("TIMESTAMP(6)", None, None).as_deref(),
            Some("timestamp without time zone")
        );
        assert_eq!(
            oracle_to_postgres("TIMESTAMP(6) WITH TIME ZONE", None, None).as_deref(),
            Some("timestamp with time zone")
        );
        assert_eq!(
            oracle_to_postgres("TIMESTAMP(6) WITH LOCAL TIME ZONE", None, None).as_deref(),
            Some("timestamp without time zone")
        );
    }

    #[test]
    fn test_number_tie_break() {
        // Both precision and (non-zero) scale present
        assert_eq!(
            oracle_to_postgres("NUMBER", Some(10), Some(2)).as_deref(),
            Some("numeric")
        );
        // Scale 0 is treated as absent: NUMBER(5,0) is an integer class
        assert_eq!(
            oracle_to_postgres("NUMBER", Some(5), Some(0)).as_deref(),
            Some("integer")
        );
        assert_eq!(
            oracle_to_postgres("NUMBER", Some(4), None).as_deref(),
            Some("smallint")
        );
        assert_eq!(
            oracle_to_postgres("NUMBER", Some(9), None).as_deref(),
            Some("integer")
        );
        assert_eq!(
            oracle_to_postgres("NUMBER", Some(18), None).as_deref(),
            Some("bigint")
        );
        assert_eq!(
            oracle_to_postgres("NUMBER", Some(20), None).as_deref(),
            Some("numeric")
        );
        // No precision at all
        assert_eq!(
            oracle_to_postgres("NUMBER", None, None).as_deref(),
            Some("numeric")
        );
    }

    #[test]
    fn test_unmapped_type() {
        assert_eq!(oracle_to_postgres("SDO_GEOMETRY", None, None), None);
    }

    #[test]
    fn test_character_type_check() {
        assert!(is_character_type("character varying"));
        assert!(is_character_type("character"));
        assert!(!is_character_type("text"));
        assert!(!is_character_type("integer"));
    }
}
