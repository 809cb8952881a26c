//! Backend colonne GeoParquet (répertoire, un fichier par table)
//!
//! Pas de pushdown de prédicat : le fichier est lu en entier puis le
//! filtre du dialecte est évalué en mémoire sur chaque ligne, ainsi que
//! l'emprise. Clé primaire `topo_id`, colonne géométrie `geom` (WKB).

use std::fs::File;
use std::path::{Path, PathBuf};

use geozero::ToGeo;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use tracing::debug;

use super::feature::{Feature, FeatureCollection};
use super::gpkg::FILE_PRIMARY_KEY;
use super::{validate_filter, Bbox, StoreError};
use topofilter::Value;

/// Nom conventionnel de la colonne géométrie des fichiers Parquet
pub const PARQUET_GEOM_COLUMN: &str = "geom";

#[derive(Debug)]
pub struct ParquetStore {
    dir: PathBuf,
}

impl ParquetStore {
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        if !dir.is_dir() {
            return Err(StoreError::SourceUnavailable(format!(
                "Parquet directory not found: {}",
                dir.display()
            )));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn primary_key_of(&self) -> String {
        FILE_PRIMARY_KEY.to_string()
    }

    pub fn read(
        &self,
        table: &str,
        where_clause: Option<&str>,
        bbox: Option<&Bbox>,
    ) -> Result<FeatureCollection, StoreError> {
        self.read_inner(table, where_clause, bbox, false)
    }

    pub fn read_sparse(
        &self,
        table: &str,
        where_clause: Option<&str>,
        bbox: Option<&Bbox>,
    ) -> Result<FeatureCollection, StoreError> {
        self.read_inner(table, where_clause, bbox, true)
    }

    fn read_inner(
        &self,
        table: &str,
        where_clause: Option<&str>,
        bbox: Option<&Bbox>,
        sparse: bool,
    ) -> Result<FeatureCollection, StoreError> {
        let path = self.dir.join(format!("{}.parquet", table));
        if !path.is_file() {
            return Err(StoreError::NotFound(table.to_string()));
        }

        // Filtre traduit en évaluation mémoire, pas de pushdown
        let filter = where_clause.map(validate_filter).transpose()?;

        let file = File::open(&path)
            .map_err(|e| StoreError::SourceUnavailable(format!("Cannot open parquet: {}", e)))?;
        let reader = SerializedFileReader::new(file)
            .map_err(|e| StoreError::Backend(format!("Parquet reader failed: {}", e)))?;
        let row_iter = reader
            .get_row_iter(None)
            .map_err(|e| StoreError::Backend(format!("Parquet row iterator failed: {}", e)))?;

        let mut features = Vec::new();
        let mut fallback_id: u64 = 0;

        for row in row_iter {
            let row = row.map_err(|e| StoreError::Backend(format!("Parquet row error: {}", e)))?;

            let mut geometry = None;
            let mut attributes: Vec<(String, Value)> = Vec::new();

            for (name, field) in row.get_column_iter() {
                if name == PARQUET_GEOM_COLUMN {
                    if let Field::Bytes(bytes) = field {
                        let geom = geozero::wkb::Wkb(bytes.data().to_vec())
                            .to_geo()
                            .map_err(|e| {
                                StoreError::Backend(format!("WKB decode failed: {}", e))
                            })?;
                        geometry = Some(geom);
                    }
                    continue;
                }
                attributes.push((name.clone(), field_to_value(field)));
            }

            let Some(geometry) = geometry else {
                continue;
            };

            fallback_id += 1;
            let id = attributes
                .iter()
                .find(|(n, v)| n == FILE_PRIMARY_KEY && !v.is_null())
                .map(|(_, v)| v.as_text())
                .unwrap_or_else(|| fallback_id.to_string());

            let feature = Feature {
                id,
                attributes,
                geometry,
            };
            if let Some(expr) = &filter {
                if !feature.matches(expr) {
                    continue;
                }
            }

            features.push(if sparse {
                Feature {
                    attributes: Vec::new(),
                    ..feature
                }
            } else {
                feature
            });
        }

        // SRID non porté par la convention de fichier : les données sont
        // attendues dans le CRS de travail (NZTM)
        let mut collection = FeatureCollection::new(
            table,
            2193,
            PARQUET_GEOM_COLUMN,
            FILE_PRIMARY_KEY,
            features,
        );
        if let Some(rect) = bbox {
            collection.retain_in_bbox(rect);
        }

        debug!(table, rows = collection.len(), "Parquet read");
        Ok(collection)
    }
}

fn field_to_value(field: &Field) -> Value {
    match field {
        Field::Null => Value::Null,
        Field::Bool(b) => Value::Bool(*b),
        Field::Byte(n) => Value::Int(*n as i64),
        Field::Short(n) => Value::Int(*n as i64),
        Field::Int(n) => Value::Int(*n as i64),
        Field::Long(n) => Value::Int(*n),
        Field::UByte(n) => Value::Int(*n as i64),
        Field::UShort(n) => Value::Int(*n as i64),
        Field::UInt(n) => Value::Int(*n as i64),
        // Au-delà de i64::MAX la valeur passe en texte plutôt que de
        // déborder en négatif
        Field::ULong(n) => match i64::try_from(*n) {
            Ok(v) => Value::Int(v),
            Err(_) => Value::Text(n.to_string()),
        },
        Field::Float(f) => Value::Float(*f as f64),
        Field::Double(f) => Value::Float(*f),
        Field::Str(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_missing_dir() {
        let err = ParquetStore::open(Path::new("/nonexistent/parquet")).unwrap_err();
        assert!(matches!(err, StoreError::SourceUnavailable(_)));
    }

    #[test]
    fn test_missing_table_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::open(dir.path()).unwrap();
        let err = store.read("ghost_table", None, None).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_field_to_value_mapping() {
        assert_eq!(field_to_value(&Field::Null), Value::Null);
        assert_eq!(field_to_value(&Field::Long(7)), Value::Int(7));
        assert_eq!(field_to_value(&Field::Double(1.5)), Value::Float(1.5));
        assert_eq!(
            field_to_value(&Field::Str("x".into())),
            Value::Text("x".into())
        );
    }

    #[test]
    fn test_field_to_value_ulong_overflow() {
        assert_eq!(
            field_to_value(&Field::ULong(i64::MAX as u64)),
            Value::Int(i64::MAX)
        );
        assert_eq!(
            field_to_value(&Field::ULong(u64::MAX)),
            Value::Text(u64::MAX.to_string())
        );
    }
}
