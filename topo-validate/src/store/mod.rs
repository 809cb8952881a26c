//! Lecture des entités : contrat commun et trois backends
//!
//! Un seul modèle de règles pilote trois backends interchangeables :
//! PostGIS (relationnel), GeoPackage (fichier unique) et GeoParquet
//! (répertoire, un fichier par table). Le backend est choisi par la forme
//! du descripteur de source (`postgres://…`, `*.gpkg`, répertoire).

pub mod feature;
pub mod gpkg;
pub mod parquet;
pub mod pool;
pub mod postgis;

use std::path::Path;

use geo::Rect;
use thiserror::Error;

use feature::FeatureCollection;

/// Emprise de filtrage `(minx, miny, maxx, maxy)`
pub type Bbox = Rect<f64>;

/// Erreurs de lecture d'un backend.
///
/// Toutes sont fatales pour la règle en cours seulement : le contrôleur
/// les journalise et poursuit avec les règles suivantes.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Table ou couche inconnue du backend
    #[error("Table or layer not found: {0}")]
    NotFound(String),

    /// Prédicat rejeté (analyse ou traduction impossible)
    #[error("Invalid filter expression: {0}")]
    InvalidFilter(String),

    /// Connexion ou ouverture impossible
    #[error("Data source unavailable: {0}")]
    SourceUnavailable(String),

    /// Erreur interne du backend
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<topofilter::FilterError> for StoreError {
    fn from(e: topofilter::FilterError) -> Self {
        StoreError::InvalidFilter(e.to_string())
    }
}

/// Adaptateur de lecture, un par backend de stockage
#[derive(Debug)]
pub enum FeatureStore {
    Postgis(postgis::PostgisStore),
    Gpkg(gpkg::GpkgStore),
    Parquet(parquet::ParquetStore),
}

impl FeatureStore {
    /// Ouvre le backend correspondant à la forme du descripteur :
    /// URL PostgreSQL, fichier `.gpkg`, ou répertoire de fichiers Parquet.
    pub async fn open(source: &str) -> Result<Self, StoreError> {
        if source.starts_with("postgres://") || source.starts_with("postgresql://") {
            return Ok(Self::Postgis(postgis::PostgisStore::connect(source).await?));
        }

        let path = Path::new(source);
        if source.ends_with(".gpkg") {
            return Ok(Self::Gpkg(gpkg::GpkgStore::open(path)?));
        }
        if path.is_dir() {
            return Ok(Self::Parquet(parquet::ParquetStore::open(path)?));
        }

        Err(StoreError::SourceUnavailable(format!(
            "Unrecognized source '{}': expected a postgres:// URL, a .gpkg file or a parquet directory",
            source
        )))
    }

    /// Nom lisible du backend, pour les logs
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Postgis(_) => "postgis",
            Self::Gpkg(_) => "geopackage",
            Self::Parquet(_) => "parquet",
        }
    }

    /// Lit toutes les entités d'une table, filtrées par prédicat et emprise
    pub async fn read(
        &self,
        table: &str,
        where_clause: Option<&str>,
        bbox: Option<&Bbox>,
    ) -> Result<FeatureCollection, StoreError> {
        match self {
            Self::Postgis(s) => s.read(table, where_clause, bbox).await,
            Self::Gpkg(s) => s.read(table, where_clause, bbox),
            Self::Parquet(s) => s.read(table, where_clause, bbox),
        }
    }

    /// Lit deux tables ; le prédicat ne s'applique qu'à la première
    pub async fn read_pair(
        &self,
        table_a: &str,
        table_b: &str,
        where_clause: Option<&str>,
        bbox: Option<&Bbox>,
    ) -> Result<(FeatureCollection, FeatureCollection), StoreError> {
        let a = self.read(table_a, where_clause, bbox).await?;
        let b = self.read(table_b, None, bbox).await?;
        Ok((a, b))
    }

    /// Projection réduite clé + géométrie, pour les règles sans calcul
    /// géométrique (null / query)
    pub async fn read_sparse(
        &self,
        table: &str,
        where_clause: Option<&str>,
        bbox: Option<&Bbox>,
    ) -> Result<FeatureCollection, StoreError> {
        match self {
            Self::Postgis(s) => s.read_sparse(table, where_clause, bbox).await,
            Self::Gpkg(s) => s.read_sparse(table, where_clause, bbox),
            Self::Parquet(s) => s.read_sparse(table, where_clause, bbox),
        }
    }

    /// Nom de la colonne clé primaire de la table
    pub async fn primary_key_of(&self, table: &str) -> Result<String, StoreError> {
        match self {
            Self::Postgis(s) => s.primary_key_of(table).await,
            Self::Gpkg(s) => Ok(s.primary_key_of()),
            Self::Parquet(s) => Ok(s.primary_key_of()),
        }
    }
}

/// Valide un prédicat du dialecte partagé avant de le pousser au backend
pub(crate) fn validate_filter(where_clause: &str) -> Result<topofilter::Expr, StoreError> {
    topofilter::parse(where_clause).map_err(StoreError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_rejects_unknown_source() {
        let err = FeatureStore::open("/nonexistent/whatever.xyz")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SourceUnavailable(_)));
    }

    #[test]
    fn test_validate_filter_maps_to_invalid_filter() {
        let err = validate_filter("this is ; not a filter").unwrap_err();
        assert!(matches!(err, StoreError::InvalidFilter(_)));
    }
}
