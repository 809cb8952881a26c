//! Types d'erreurs pour le crate topofilter

use thiserror::Error;

/// Erreurs pouvant survenir lors de l'analyse d'un filtre
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    /// Caractère inattendu dans l'expression
    #[error("Unexpected character '{ch}' at byte {offset}")]
    UnexpectedCharacter { ch: char, offset: usize },

    /// Chaîne de caractères non terminée
    #[error("Unterminated string literal starting at byte {0}")]
    UnterminatedString(usize),

    /// Jeton inattendu pendant le parsing
    #[error("Unexpected token at '{found}': expected {expected}")]
    UnexpectedToken { expected: String, found: String },

    /// Fin d'expression prématurée
    #[error("Unexpected end of filter expression: expected {0}")]
    UnexpectedEnd(String),

    /// Expression vide
    #[error("Empty filter expression")]
    Empty,
}

impl FilterError {
    /// Crée une erreur de jeton inattendu avec contexte
    pub fn unexpected(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
        }
    }
}
