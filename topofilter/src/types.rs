//! Types du dialecte de filtre partagé
//!
//! Le dialecte couvre ce que les trois backends savent exprimer :
//! comparaisons colonne/littéral, tests de nullité, `IN (...)`,
//! conjonctions et disjonctions. Les backends SQL transmettent
//! l'expression telle quelle ; le backend Parquet l'évalue en mémoire
//! via [`Expr::matches`].

use std::cmp::Ordering;
use std::fmt;

/// Valeur d'attribut typée
///
/// Remplace l'accès duck-typé aux colonnes : une valeur absente est
/// explicitement `Null`, jamais un attribut manquant silencieux.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Vrai si la valeur est `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Rendu textuel (pour clés primaires, exports, messages)
    pub fn as_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
        }
    }

    /// Comparaison SQL : `None` si l'un des deux côtés est `Null`
    /// ou si les types sont incomparables.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            // Les dates ISO transitent en texte et se comparent lexicographiquement
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// Opérateur de comparaison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

/// Expression de filtre analysée
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `colonne op littéral`
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    /// `colonne IS NULL` / `colonne IS NOT NULL`
    IsNull { column: String, negated: bool },
    /// `colonne [NOT] IN (...)`
    InList {
        column: String,
        negated: bool,
        values: Vec<Value>,
    },
    /// Conjonction
    And(Box<Expr>, Box<Expr>),
    /// Disjonction
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Évalue l'expression contre une ligne.
    ///
    /// `lookup` retourne la valeur d'une colonne, ou `None` si la colonne
    /// n'existe pas (traitée comme `Null`, sémantique SQL).
    pub fn matches<'a, F>(&self, lookup: &F) -> bool
    where
        F: Fn(&str) -> Option<&'a Value>,
    {
        match self {
            Expr::Compare { column, op, value } => {
                let null = Value::Null;
                let cell = lookup(column).unwrap_or(&null);
                match cell.compare(value) {
                    Some(ord) => match op {
                        CompareOp::Eq => ord == Ordering::Equal,
                        CompareOp::NotEq => ord != Ordering::Equal,
                        CompareOp::Lt => ord == Ordering::Less,
                        CompareOp::LtEq => ord != Ordering::Greater,
                        CompareOp::Gt => ord == Ordering::Greater,
                        CompareOp::GtEq => ord != Ordering::Less,
                    },
                    None => false,
                }
            }
            Expr::IsNull { column, negated } => {
                let is_null = lookup(column).map_or(true, Value::is_null);
                is_null != *negated
            }
            Expr::InList {
                column,
                negated,
                values,
            } => {
                let null = Value::Null;
                let cell = lookup(column).unwrap_or(&null);
                if cell.is_null() {
                    return false;
                }
                let found = values
                    .iter()
                    .any(|v| cell.compare(v) == Some(Ordering::Equal));
                found != *negated
            }
            Expr::And(a, b) => a.matches(lookup) && b.matches(lookup),
            Expr::Or(a, b) => a.matches(lookup) || b.matches(lookup),
        }
    }

    /// Colonnes référencées par l'expression (dans l'ordre d'apparition)
    pub fn columns(&self) -> Vec<&str> {
        fn walk<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) {
            match expr {
                Expr::Compare { column, .. }
                | Expr::IsNull { column, .. }
                | Expr::InList { column, .. } => {
                    if !out.contains(&column.as_str()) {
                        out.push(column);
                    }
                }
                Expr::And(a, b) | Expr::Or(a, b) => {
                    walk(a, out);
                    walk(b, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }
}

impl fmt::Display for Expr {
    /// Rendu SQL de l'expression (aller-retour avec le parser)
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Compare { column, op, value } => {
                write!(f, "{} {} {}", column, op.as_sql(), value)
            }
            Expr::IsNull { column, negated } => {
                if *negated {
                    write!(f, "{} IS NOT NULL", column)
                } else {
                    write!(f, "{} IS NULL", column)
                }
            }
            Expr::InList {
                column,
                negated,
                values,
            } => {
                write!(f, "{}{} IN (", column, if *negated { " NOT" } else { "" })?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
            Expr::And(a, b) => write!(f, "({}) AND ({})", a, b),
            Expr::Or(a, b) => write!(f, "({}) OR ({})", a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_compare_numeric_coercion() {
        assert_eq!(
            Value::Int(3).compare(&Value::Float(3.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Value::Float(2.5).compare(&Value::Int(3)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_value_compare_null_is_unknown() {
        assert_eq!(Value::Null.compare(&Value::Int(1)), None);
        assert_eq!(Value::Text("a".into()).compare(&Value::Null), None);
    }

    #[test]
    fn test_iso_dates_compare_as_text() {
        let a = Value::Text("2025-01-31".into());
        let b = Value::Text("2025-02-01".into());
        assert_eq!(a.compare(&b), Some(Ordering::Less));
    }

    #[test]
    fn test_display_roundtrip_quotes() {
        assert_eq!(Value::Text("it's".into()).to_string(), "'it''s'");
    }
}
