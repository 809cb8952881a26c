//! # topofilter
//!
//! Dialecte de filtre attributaire partagé par les backends de
//! validation topographique (PostGIS, GeoPackage, Parquet).
//!
//! Le dialecte est un sous-ensemble de SQL qui s'exécute tel quel sur
//! les deux backends SQL et s'évalue en mémoire pour le backend
//! Parquet. Il couvre :
//!
//! - comparaisons colonne/littéral (`=`, `!=`, `<`, `<=`, `>`, `>=`)
//! - tests de nullité (`IS NULL`, `IS NOT NULL`)
//! - appartenance (`IN (...)`, `NOT IN (...)`)
//! - conjonctions et disjonctions, avec parenthèses
//! - littéraux date (`date('YYYY-MM-DD')`)
//!
//! ## Exemple
//!
//! ```
//! use topofilter::{parse, Value};
//!
//! let expr = parse("feature_type = 'river' AND name IS NOT NULL").unwrap();
//! let name = Value::Text("Clutha".into());
//! let kind = Value::Text("river".into());
//! let row = |col: &str| match col {
//!     "feature_type" => Some(&kind),
//!     "name" => Some(&name),
//!     _ => None,
//! };
//! assert!(expr.matches(&row));
//! ```

mod error;
mod lexer;
mod parser;
mod types;

pub use error::FilterError;
pub use parser::parse;
pub use types::{CompareOp, Expr, Value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recency_composes_with_rule_filter() {
        // Un filtre de règle combiné à la borne de récence doit garder
        // exactement les lignes qui passent les deux clauses.
        let src = "(feature_type = 'road') AND (update_date >= date('2025-08-22'))";
        let expr = parse(src).unwrap();

        let road = Value::Text("road".into());
        let river = Value::Text("river".into());
        let recent = Value::Text("2025-08-25".into());
        let stale = Value::Text("2025-07-01".into());

        fn row<'a>(kind: &'a Value, date: &'a Value) -> impl Fn(&str) -> Option<&'a Value> {
            move |col: &str| match col {
                "feature_type" => Some(kind),
                "update_date" => Some(date),
                _ => None,
            }
        }

        // La seule combinaison retenue : bon type ET assez récent
        assert!(expr.matches(&row(&road, &recent)));
        assert!(!expr.matches(&row(&road, &stale)));
        assert!(!expr.matches(&row(&river, &recent)));
        assert!(!expr.matches(&row(&river, &stale)));
    }

    #[test]
    fn test_missing_column_behaves_as_null() {
        let expr = parse("ghost = 1").unwrap();
        let lookup = |_: &str| -> Option<&Value> { None };
        assert!(!expr.matches(&lookup));

        let expr = parse("ghost IS NULL").unwrap();
        assert!(expr.matches(&lookup));
    }

    #[test]
    fn test_columns_listing() {
        let expr = parse("a = 1 AND (b IS NULL OR a > 2)").unwrap();
        assert_eq!(expr.columns(), vec!["a", "b"]);
    }
}
