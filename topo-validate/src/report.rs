//! Rapport de synthèse de validation
//!
//! Un drapeau booléen par catégorie de contrôle, tous faux au départ et
//! basculés à vrai dès qu'une règle de la catégorie produit au moins un
//! résultat. Le rapport est écrit en JSON plat, chaque catégorie
//! accompagnée de sa description `_about`.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde_json::{Map, Value};
use tracing::warn;

/// Catégories du rapport et leurs descriptions
pub const CATEGORIES: [(&str, &str); 9] = [
    (
        "feature_not_on_layers",
        "If True - a feature is found that does not lie on the specified layer.",
    ),
    (
        "feature_in_layers",
        "If True - a feature is found that does not lie within the specified layer.",
    ),
    (
        "line_not_on_feature_layers",
        "If True - a line is found that does not lie on the specified feature layer.",
    ),
    (
        "line_not_touches_feature_layers",
        "If True - a line is found that does not touch the specified feature layer.",
    ),
    (
        "feature_not_contains_layers",
        "If True - a feature is found that does not contain the specified feature layer.",
    ),
    (
        "self_intersect_layers",
        "If True - a feature is found that self-intersects.",
    ),
    (
        "null_columns",
        "If True - a feature is found that has null values in the specified column.",
    ),
    (
        "query_rules",
        "If True - a feature is found that meets the specified query rule.",
    ),
    (
        "evaluation_errors",
        "If True - at least one rule could not be evaluated.",
    ),
];

/// Rapport de synthèse d'une exécution
#[derive(Debug, Clone)]
pub struct SummaryReport {
    flags: BTreeMap<&'static str, bool>,
    duration_secs: f64,
}

impl Default for SummaryReport {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryReport {
    pub fn new() -> Self {
        Self {
            flags: CATEGORIES.iter().map(|(name, _)| (*name, false)).collect(),
            duration_secs: 0.0,
        }
    }

    /// Bascule une catégorie à vrai
    pub fn flip(&mut self, category: &str) {
        match CATEGORIES.iter().find(|(name, _)| *name == category) {
            Some(&(name, _)) => {
                self.flags.insert(name, true);
            }
            None => warn!(category, "Unknown summary category"),
        }
    }

    pub fn is_flagged(&self, category: &str) -> bool {
        self.flags.get(category).copied().unwrap_or(false)
    }

    pub fn any_flagged(&self) -> bool {
        self.flags.values().any(|v| *v)
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    pub fn completed_message(&self) -> String {
        format!(
            "All processes completed. Total time taken: {:.2} seconds ({:.2} minutes)",
            self.duration_secs,
            self.duration_secs / 60.0
        )
    }

    /// Rapport sous forme de carte JSON plate, catégories dans l'ordre
    /// de déclaration
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (name, about) in CATEGORIES {
            map.insert(name.to_string(), Value::Bool(self.is_flagged(name)));
            map.insert(format!("{}_about", name), Value::String(about.to_string()));
        }
        map.insert(
            "validation_completed_message".to_string(),
            Value::String(self.completed_message()),
        );
        Value::Object(map)
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.to_json())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("VALIDATION SUMMARY");
        println!("{}", "=".repeat(60));
        for (name, _) in CATEGORIES {
            println!("  {}: {}", name, self.is_flagged(name));
        }
        println!("\n{}", self.completed_message());
        println!("{}", "=".repeat(60));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_starts_all_false() {
        let report = SummaryReport::new();
        assert!(!report.any_flagged());
        for (name, _) in CATEGORIES {
            assert!(!report.is_flagged(name));
        }
    }

    #[test]
    fn test_flip_single_category() {
        let mut report = SummaryReport::new();
        report.flip("null_columns");

        assert!(report.is_flagged("null_columns"));
        assert!(!report.is_flagged("query_rules"));
        assert!(report.any_flagged());
    }

    #[test]
    fn test_flip_unknown_category_is_ignored() {
        let mut report = SummaryReport::new();
        report.flip("no_such_category");
        assert!(!report.any_flagged());
    }

    #[test]
    fn test_json_shape() {
        let mut report = SummaryReport::new();
        report.flip("self_intersect_layers");
        report.set_duration(Duration::from_secs_f64(90.0));

        let json = report.to_json();
        assert_eq!(json["self_intersect_layers"], Value::Bool(true));
        assert_eq!(json["feature_in_layers"], Value::Bool(false));
        assert_eq!(
            json["self_intersect_layers_about"],
            Value::String("If True - a feature is found that self-intersects.".to_string())
        );
        assert_eq!(
            json["validation_completed_message"],
            Value::String(
                "All processes completed. Total time taken: 90.00 seconds (1.50 minutes)"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validation_summary_report.json");

        let report = SummaryReport::new();
        report.save_to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["query_rules"], Value::Bool(false));
    }
}
