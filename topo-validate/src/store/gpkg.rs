//! Backend GeoPackage (fichier SQLite unique)
//!
//! La clé primaire suit la convention fixe `topo_id`. Le dialecte de
//! filtre est du SQL SQLite valide, il est donc poussé tel quel après
//! validation ; seule l'emprise est appliquée en post-filtre. Les blobs
//! géométrie GeoPackage (en-tête `GP` + WKB) sont lus et écrits à la main.

use std::path::Path;

use geo::Geometry;
use geozero::{CoordDimensions, ToGeo, ToWkb};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use super::feature::{Feature, FeatureCollection};
use super::{validate_filter, Bbox, StoreError};
use topofilter::Value;

/// Convention de clé primaire des backends fichiers
pub const FILE_PRIMARY_KEY: &str = "topo_id";

#[derive(Debug)]
pub struct GpkgStore {
    conn: Connection,
}

impl GpkgStore {
    /// Ouvre un GeoPackage existant en lecture seule
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if !path.is_file() {
            return Err(StoreError::SourceUnavailable(format!(
                "GeoPackage not found: {}",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| StoreError::SourceUnavailable(format!("Cannot open GeoPackage: {}", e)))?;
        Ok(Self { conn })
    }

    pub fn primary_key_of(&self) -> String {
        FILE_PRIMARY_KEY.to_string()
    }

    /// Colonne géométrie et SRID depuis `gpkg_geometry_columns`
    fn layer_info(&self, table: &str) -> Result<(String, u32), StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT column_name, srs_id FROM gpkg_geometry_columns WHERE table_name = ?1")
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut rows = stmt
            .query([table])
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match rows.next().map_err(|e| StoreError::Backend(e.to_string()))? {
            Some(row) => {
                let geom_col: String = row.get(0).map_err(|e| StoreError::Backend(e.to_string()))?;
                let srid: i64 = row.get(1).map_err(|e| StoreError::Backend(e.to_string()))?;
                Ok((geom_col, srid.max(0) as u32))
            }
            None => Err(StoreError::NotFound(table.to_string())),
        }
    }

    fn columns_of(&self, table: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info(\"{}\")", table))
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if names.is_empty() {
            return Err(StoreError::NotFound(table.to_string()));
        }
        Ok(names)
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
        let (geom_col, srid) = self.layer_info(table)?;
        let columns = self.columns_of(table)?;
        let attr_columns: Vec<&String> = columns.iter().filter(|c| **c != geom_col).collect();

        let mut select = String::from("SELECT ");
        select.push_str(&format!("\"{}\"", geom_col));
        for col in &attr_columns {
            select.push_str(&format!(", \"{}\"", col));
        }
        select.push_str(&format!(" FROM \"{}\"", table));
        if let Some(filter) = where_clause {
            validate_filter(filter)?;
            select.push_str(&format!(" WHERE ({})", filter));
        }

        let mut stmt = self.conn.prepare(&select).map_err(|e| {
            // Un échec de préparation avec filtre vient du filtre
            // (colonne inconnue par exemple)
            if where_clause.is_some() {
                StoreError::InvalidFilter(e.to_string())
            } else {
                StoreError::Backend(e.to_string())
            }
        })?;

        let mut features = Vec::new();
        let mut rows = stmt
            .query([])
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let mut fallback_id: u64 = 0;

        while let Some(row) = rows.next().map_err(|e| StoreError::Backend(e.to_string()))? {
            let blob = match row
                .get_ref(0)
                .map_err(|e| StoreError::Backend(e.to_string()))?
            {
                ValueRef::Blob(b) => b.to_vec(),
                _ => continue,
            };
            let geometry = decode_gpkg_geometry(&blob)?;

            let mut attributes = Vec::with_capacity(attr_columns.len());
            for (i, col) in attr_columns.iter().enumerate() {
                let value = match row
                    .get_ref(i + 1)
                    .map_err(|e| StoreError::Backend(e.to_string()))?
                {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(n) => Value::Int(n),
                    ValueRef::Real(f) => Value::Float(f),
                    ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
                    ValueRef::Blob(_) => Value::Null,
                };
                attributes.push(((*col).clone(), value));
            }

            fallback_id += 1;
            let id = attributes
                .iter()
                .find(|(n, v)| n == FILE_PRIMARY_KEY && !v.is_null())
                .map(|(_, v)| v.as_text())
                .unwrap_or_else(|| fallback_id.to_string());

            features.push(Feature {
                id,
                attributes: if sparse { Vec::new() } else { attributes },
                geometry,
            });
        }

        let mut collection =
            FeatureCollection::new(table, srid, geom_col, FILE_PRIMARY_KEY, features);
        if let Some(rect) = bbox {
            collection.retain_in_bbox(rect);
        }

        debug!(table, rows = collection.len(), "GeoPackage read");
        Ok(collection)
    }
}

/// Décode un blob géométrie GeoPackage (en-tête `GP` + WKB)
pub fn decode_gpkg_geometry(blob: &[u8]) -> Result<Geometry<f64>, StoreError> {
    if blob.len() < 8 || blob[0] != b'G' || blob[1] != b'P' {
        return Err(StoreError::Backend(
            "Not a GeoPackage geometry blob".to_string(),
        ));
    }
    let flags = blob[3];
    if flags & 0b0001_0000 != 0 {
        return Err(StoreError::Backend("Empty geometry blob".to_string()));
    }
    // Taille de l'enveloppe selon l'indicateur (bits 1 à 3)
    let envelope_len = match (flags >> 1) & 0x07 {
        0 => 0,
        1 => 32,
        2 | 3 => 48,
        4 => 64,
        other => {
            return Err(StoreError::Backend(format!(
                "Invalid envelope indicator: {}",
                other
            )))
        }
    };
    let wkb_start = 8 + envelope_len;
    if blob.len() <= wkb_start {
        return Err(StoreError::Backend("Truncated geometry blob".to_string()));
    }

    geozero::wkb::Wkb(blob[wkb_start..].to_vec())
        .to_geo()
        .map_err(|e| StoreError::Backend(format!("WKB decode failed: {}", e)))
}

/// Encode une géométrie en blob GeoPackage (en-tête minimal, sans enveloppe)
pub fn encode_gpkg_geometry(geom: &Geometry<f64>, srid: u32) -> Result<Vec<u8>, StoreError> {
    let wkb = geom
        .to_wkb(CoordDimensions::xy())
        .map_err(|e| StoreError::Backend(format!("WKB encode failed: {}", e)))?;

    let mut out = Vec::with_capacity(8 + wkb.len());
    out.extend_from_slice(b"GP");
    out.push(0); // version
    out.push(0b0000_0001); // little-endian, pas d'enveloppe
    out.extend_from_slice(&(srid as i32).to_le_bytes());
    out.extend_from_slice(&wkb);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Point};

    #[test]
    fn test_geometry_blob_roundtrip() {
        let geom = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0)
        ]);

        let blob = encode_gpkg_geometry(&geom, 2193).unwrap();
        assert_eq!(&blob[0..2], b"GP");
        assert_eq!(i32::from_le_bytes(blob[4..8].try_into().unwrap()), 2193);

        let decoded = decode_gpkg_geometry(&blob).unwrap();
        assert_eq!(decoded, geom);
    }

    #[test]
    fn test_decode_skips_envelope() {
        let geom = Geometry::Point(Point::new(3.0, 4.0));
        let wkb = geom.to_wkb(CoordDimensions::xy()).unwrap();

        // Blob avec enveloppe XY (indicateur 1, 32 octets)
        let mut blob = Vec::new();
        blob.extend_from_slice(b"GP");
        blob.push(0);
        blob.push(0b0000_0011);
        blob.extend_from_slice(&2193i32.to_le_bytes());
        for v in [3.0f64, 3.0, 4.0, 4.0] {
            blob.extend_from_slice(&v.to_le_bytes());
        }
        blob.extend_from_slice(&wkb);

        let decoded = decode_gpkg_geometry(&blob).unwrap();
        assert_eq!(decoded, geom);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_gpkg_geometry(b"not a blob").is_err());
        assert!(decode_gpkg_geometry(&[]).is_err());
    }
}
