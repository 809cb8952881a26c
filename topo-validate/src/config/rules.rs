//! Modèle de règles typé et clause de récence
//!
//! Le fichier de règles JSON garde les noms de sections historiques ;
//! les cinq sections de relations entre couches se réduisent toutes au
//! même évaluateur, seul change le triplet (prédicat, attente, tampon).

use chrono::{Duration, NaiveDate};
use serde::Deserialize;

use crate::checks::relation::{Expectation, Relation};

fn default_message() -> String {
    "validation error".to_string()
}

/// Règle : aucune valeur NULL dans la colonne
#[derive(Debug, Clone, Deserialize)]
pub struct NullCheckRule {
    pub table: String,
    pub column: String,
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
    pub date: Option<String>,
    pub weeks: Option<i64>,
    #[serde(default = "default_message")]
    pub message: String,
}

/// Règle : aucune ligne ne doit satisfaire l'expression `rule`
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRule {
    pub table: String,
    /// Colonne visée, utilisée pour nommer la couche de sortie
    pub column: String,
    /// Expression booléenne du dialecte partagé
    pub rule: String,
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
    pub date: Option<String>,
    pub weeks: Option<i64>,
    #[serde(default = "default_message")]
    pub message: String,
}

/// Règle : aucune paire d'entités de la couche ne doit se recouvrir
#[derive(Debug, Clone, Deserialize)]
pub struct SelfIntersectRule {
    pub table: String,
    pub layername: Option<String>,
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
    pub date: Option<String>,
    pub weeks: Option<i64>,
    #[serde(default = "default_message")]
    pub message: String,
}

impl SelfIntersectRule {
    pub fn layername(&self) -> &str {
        self.layername.as_deref().unwrap_or(&self.table)
    }
}

/// Section de relation telle qu'écrite dans le fichier de règles
#[derive(Debug, Clone, Deserialize)]
pub struct RelationSpec {
    #[serde(alias = "line_table")]
    pub table: String,
    #[serde(rename = "intersection_table")]
    pub other_table: String,
    pub layername: Option<String>,
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
    pub date: Option<String>,
    pub weeks: Option<i64>,
    #[serde(default = "default_message")]
    pub message: String,
}

impl RelationSpec {
    pub fn layername(&self) -> &str {
        self.layername.as_deref().unwrap_or(&self.table)
    }
}

/// Règle de relation résolue : spec + triplet d'évaluation + catégorie
#[derive(Debug, Clone)]
pub struct RelationRule {
    pub spec: RelationSpec,
    pub relation: Relation,
    pub expect: Expectation,
    pub buffer_lines: bool,
    /// Catégorie du rapport de synthèse (= nom de section)
    pub category: &'static str,
}

/// Fichier de règles complet
#[derive(Debug, Default, Deserialize)]
pub struct RulesFile {
    #[serde(default)]
    pub null_columns: Vec<NullCheckRule>,
    #[serde(default)]
    pub query_rules: Vec<QueryRule>,
    #[serde(default)]
    pub self_intersect_layers: Vec<SelfIntersectRule>,
    #[serde(default)]
    pub feature_in_layers: Vec<RelationSpec>,
    #[serde(default)]
    pub feature_not_on_layers: Vec<RelationSpec>,
    #[serde(default)]
    pub line_not_on_feature_layers: Vec<RelationSpec>,
    #[serde(default)]
    pub line_not_touches_feature_layers: Vec<RelationSpec>,
    #[serde(default)]
    pub feature_not_contains_layers: Vec<RelationSpec>,
}

impl RulesFile {
    /// Aplatit les cinq sections de relations en une liste homogène
    pub fn relation_rules(&self) -> Vec<RelationRule> {
        let mut rules = Vec::new();

        for spec in &self.feature_in_layers {
            rules.push(RelationRule {
                spec: spec.clone(),
                relation: Relation::Intersects,
                expect: Expectation::Present,
                buffer_lines: false,
                category: "feature_in_layers",
            });
        }
        for spec in &self.feature_not_on_layers {
            rules.push(RelationRule {
                spec: spec.clone(),
                relation: Relation::Intersects,
                expect: Expectation::Absent,
                buffer_lines: false,
                category: "feature_not_on_layers",
            });
        }
        for spec in &self.line_not_on_feature_layers {
            rules.push(RelationRule {
                spec: spec.clone(),
                relation: Relation::Intersects,
                expect: Expectation::Absent,
                buffer_lines: true,
                category: "line_not_on_feature_layers",
            });
        }
        for spec in &self.line_not_touches_feature_layers {
            rules.push(RelationRule {
                spec: spec.clone(),
                relation: Relation::Touches,
                expect: Expectation::Absent,
                buffer_lines: true,
                category: "line_not_touches_feature_layers",
            });
        }
        for spec in &self.feature_not_contains_layers {
            rules.push(RelationRule {
                spec: spec.clone(),
                relation: Relation::Contains,
                expect: Expectation::Absent,
                buffer_lines: false,
                category: "feature_not_contains_layers",
            });
        }

        rules
    }
}

/// Clause de récence `update_date >= date('YYYY-MM-DD')`.
///
/// `date` explicite gagne sur `weeks` ; `"today"` est résolu à la date
/// du jour. Retourne `None` si aucune restriction n'est demandée.
pub fn recency_clause(date: Option<&str>, weeks: Option<i64>, today: NaiveDate) -> Option<String> {
    let resolved = match (date, weeks) {
        (Some("today"), _) => today.format("%Y-%m-%d").to_string(),
        (Some(d), _) => d.to_string(),
        (None, Some(w)) => (today - Duration::weeks(w)).format("%Y-%m-%d").to_string(),
        (None, None) => return None,
    };
    Some(format!("update_date >= date('{}')", resolved))
}

/// Combine le `where` statique d'une règle avec la clause de récence
pub fn compose_where(static_where: Option<&str>, recency: Option<&str>) -> Option<String> {
    match (static_where, recency) {
        (Some(w), Some(r)) => Some(format!("({}) AND ({})", w, r)),
        (Some(w), None) => Some(w.to_string()),
        (None, Some(r)) => Some(r.to_string()),
        (None, None) => None,
    }
}
