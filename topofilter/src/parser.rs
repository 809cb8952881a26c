//! Analyse syntaxique du dialecte de filtre
//!
//! Grammaire (descente récursive) :
//!
//! ```text
//! expr      := and_expr ( OR and_expr )*
//! and_expr  := primary ( AND primary )*
//! primary   := '(' expr ')' | predicate
//! predicate := column compare_op literal
//!            | column IS [NOT] NULL
//!            | column [NOT] IN '(' literal ( ',' literal )* ')'
//! literal   := number | string | TRUE | FALSE | date '(' string ')'
//! ```
//!
//! `date('YYYY-MM-DD')` est accepté comme littéral texte : les deux
//! backends SQL l'exécutent nativement et l'évaluation en mémoire
//! compare les dates ISO lexicographiquement.

use crate::lexer::{tokenize, Token};
use crate::types::{CompareOp, Expr, Value};
use crate::FilterError;

/// Analyse une expression de filtre complète
pub fn parse(input: &str) -> Result<Expr, FilterError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(FilterError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if let Some(extra) = parser.peek() {
        return Err(FilterError::unexpected(
            "end of expression",
            extra.describe(),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    /// Consomme un identifiant égal (insensible à la casse) à `kw`
    fn eat_keyword(&mut self, kw: &str) -> bool {
        if let Some(Token::Ident(s)) = self.peek() {
            if s.eq_ignore_ascii_case(kw) {
                self.pos += 1;
                return true;
            }
        }
        false
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), FilterError> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            match self.peek() {
                Some(t) => Err(FilterError::unexpected(kw, t.describe())),
                None => Err(FilterError::UnexpectedEnd(kw.to_string())),
            }
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), FilterError> {
        match self.next() {
            Some(t) if t == token => Ok(()),
            Some(t) => Err(FilterError::unexpected(token.describe(), t.describe())),
            None => Err(FilterError::UnexpectedEnd(token.describe())),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, FilterError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("OR") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, FilterError> {
        let mut left = self.parse_primary()?;
        while self.eat_keyword("AND") {
            let right = self.parse_primary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr, FilterError> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.parse_or()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> Result<Expr, FilterError> {
        let column = match self.next() {
            Some(Token::Ident(name)) => name,
            Some(t) => return Err(FilterError::unexpected("column name", t.describe())),
            None => return Err(FilterError::UnexpectedEnd("column name".into())),
        };

        match self.peek() {
            Some(Token::Eq) => self.finish_compare(column, CompareOp::Eq),
            Some(Token::NotEq) => self.finish_compare(column, CompareOp::NotEq),
            Some(Token::Lt) => self.finish_compare(column, CompareOp::Lt),
            Some(Token::LtEq) => self.finish_compare(column, CompareOp::LtEq),
            Some(Token::Gt) => self.finish_compare(column, CompareOp::Gt),
            Some(Token::GtEq) => self.finish_compare(column, CompareOp::GtEq),
            Some(Token::Ident(kw)) if kw.eq_ignore_ascii_case("IS") => {
                self.pos += 1;
                let negated = self.eat_keyword("NOT");
                self.expect_keyword("NULL")?;
                Ok(Expr::IsNull { column, negated })
            }
            Some(Token::Ident(kw))
                if kw.eq_ignore_ascii_case("IN") || kw.eq_ignore_ascii_case("NOT") =>
            {
                let negated = self.eat_keyword("NOT");
                self.expect_keyword("IN")?;
                self.expect(Token::LParen)?;
                let mut values = vec![self.parse_literal()?];
                while self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    values.push(self.parse_literal()?);
                }
                self.expect(Token::RParen)?;
                Ok(Expr::InList {
                    column,
                    negated,
                    values,
                })
            }
            Some(t) => Err(FilterError::unexpected(
                "comparison operator, IS or IN",
                t.describe(),
            )),
            None => Err(FilterError::UnexpectedEnd(
                "comparison operator, IS or IN".into(),
            )),
        }
    }

    fn finish_compare(&mut self, column: String, op: CompareOp) -> Result<Expr, FilterError> {
        self.pos += 1;
        let value = self.parse_literal()?;
        Ok(Expr::Compare { column, op, value })
    }

    fn parse_literal(&mut self) -> Result<Value, FilterError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Value::Text(s)),
            Some(Token::Number(n)) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    Ok(Value::Int(n as i64))
                } else {
                    Ok(Value::Float(n))
                }
            }
            Some(Token::Ident(kw)) if kw.eq_ignore_ascii_case("TRUE") => Ok(Value::Bool(true)),
            Some(Token::Ident(kw)) if kw.eq_ignore_ascii_case("FALSE") => Ok(Value::Bool(false)),
            Some(Token::Ident(kw)) if kw.eq_ignore_ascii_case("NULL") => Ok(Value::Null),
            Some(Token::Ident(kw)) if kw.eq_ignore_ascii_case("date") => {
                self.expect(Token::LParen)?;
                let inner = match self.next() {
                    Some(Token::Str(s)) => s,
                    Some(t) => {
                        return Err(FilterError::unexpected("date string", t.describe()))
                    }
                    None => return Err(FilterError::UnexpectedEnd("date string".into())),
                };
                self.expect(Token::RParen)?;
                Ok(Value::Text(inner))
            }
            Some(t) => Err(FilterError::unexpected("literal value", t.describe())),
            None => Err(FilterError::UnexpectedEnd("literal value".into())),
        }
    }
}
