//! Configuration de la validation
//!
//! Les réglages viennent de la ligne de commande et des variables
//! d'environnement ; les règles elles-mêmes sont chargées depuis un
//! fichier JSON séparé.

pub mod rules;

use std::path::{Path, PathBuf};

use anyhow::Context;
use geo::Rect;

pub use rules::{
    compose_where, recency_clause, NullCheckRule, QueryRule, RelationRule, RelationSpec, RulesFile,
    SelfIntersectRule,
};

/// CRS métrique par défaut pour les calculs de surface (NZTM)
pub const DEFAULT_AREA_CRS: u32 = 2193;

/// Réglages d'une exécution de validation
#[derive(Debug, Clone)]
pub struct Settings {
    /// Source de données : URL `postgres://`, fichier `.gpkg` ou
    /// répertoire de fichiers Parquet
    pub source: String,
    /// Répertoire racine des sorties
    pub output_dir: PathBuf,
    /// CRS utilisé pour les calculs de surface
    pub area_crs: u32,
    pub export_gpkg: bool,
    pub export_parquet: bool,
    pub export_parquet_by_geometry_type: bool,
    /// Range les sorties dans un sous-répertoire `YYYY-MM-DD`
    pub use_date_folder: bool,
    pub process_queries: bool,
    pub process_layer_relations: bool,
    pub process_self_intersections: bool,
    /// Conserve les géométries d'erreur invalides au lieu de les écarter
    pub keep_invalid_geometries: bool,
    /// Date de récence globale (`YYYY-MM-DD` ou `today`)
    pub update_date: Option<String>,
    /// Récence globale en semaines, ignorée si une date est donnée
    pub weeks: Option<i64>,
    /// Emprise de travail optionnelle
    pub bbox: Option<Rect<f64>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: String::new(),
            output_dir: PathBuf::from("output"),
            area_crs: DEFAULT_AREA_CRS,
            export_gpkg: true,
            export_parquet: false,
            export_parquet_by_geometry_type: false,
            use_date_folder: false,
            process_queries: true,
            process_layer_relations: true,
            process_self_intersections: true,
            keep_invalid_geometries: false,
            update_date: None,
            weeks: None,
            bbox: None,
        }
    }
}

/// Charge et désérialise un fichier de règles JSON
pub fn load_rules(path: &Path) -> anyhow::Result<RulesFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read rules file: {}", path.display()))?;
    let rules: RulesFile = serde_json::from_str(&content)
        .with_context(|| format!("Invalid rules file: {}", path.display()))?;
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.area_crs, 2193);
        assert!(settings.export_gpkg);
        assert!(!settings.export_parquet);
        assert!(settings.process_queries);
        assert!(settings.process_layer_relations);
        assert!(settings.process_self_intersections);
    }

    #[test]
    fn test_load_rules_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"null_columns": [{{"table": "roads", "column": "name"}}],
                "self_intersect_layers": [{{"table": "lakes", "layername": "lakes"}}]}}"#
        )
        .unwrap();

        let rules = load_rules(file.path()).unwrap();
        assert_eq!(rules.null_columns.len(), 1);
        assert_eq!(rules.self_intersect_layers.len(), 1);
        assert!(rules.query_rules.is_empty());
    }

    #[test]
    fn test_load_rules_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(load_rules(file.path()).is_err());
    }
}
