//! Writer GeoPackage minimal (rusqlite)
//!
//! Crée les tables de métadonnées requises par le format puis ajoute
//! les couches d'erreurs en append. Les géométries sont encodées avec
//! l'en-tête blob GeoPackage partagé avec le backend de lecture.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use super::{ColumnKind, ErrorLayer};
use crate::store::gpkg::encode_gpkg_geometry;
use topofilter::Value;

pub struct GpkgWriter {
    conn: Connection,
}

impl GpkgWriter {
    /// Ouvre ou crée un GeoPackage en écriture
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Cannot open GeoPackage for writing: {}", path.display()))?;

        // Signature du format
        conn.execute_batch(
            "PRAGMA application_id = 0x47504B47;
             PRAGMA user_version = 10300;",
        )?;
        ensure_metadata_tables(&conn)?;

        Ok(Self { conn })
    }

    /// Écrit une couche, créée au premier passage puis complétée
    pub fn write_layer(&mut self, layer: &ErrorLayer) -> Result<()> {
        if layer.is_empty() {
            return Ok(());
        }

        self.ensure_layer(layer)?;

        let placeholders: Vec<&str> = std::iter::repeat("?")
            .take(layer.columns.len() + 1)
            .collect();
        let insert = format!(
            "INSERT INTO \"{}\" (geom{}) VALUES ({})",
            layer.name,
            layer
                .columns
                .iter()
                .map(|c| format!(", \"{}\"", c.name))
                .collect::<String>(),
            placeholders.join(", ")
        );

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&insert)?;
            for row in &layer.rows {
                let blob = encode_gpkg_geometry(&row.geometry, layer.srid)
                    .map_err(|e| anyhow::anyhow!("Geometry encoding failed: {}", e))?;
                let mut params = vec![SqlValue::Blob(blob)];
                params.extend(row.values.iter().map(sql_value));
                stmt.execute(params_from_iter(params))?;
            }
        }
        tx.commit()?;

        debug!(layer = layer.name.as_str(), rows = layer.rows.len(), "GeoPackage write");
        Ok(())
    }

    fn ensure_layer(&self, layer: &ErrorLayer) -> Result<()> {
        let mut create = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (fid INTEGER PRIMARY KEY AUTOINCREMENT, geom BLOB",
            layer.name
        );
        for column in &layer.columns {
            let sql_type = match column.kind {
                ColumnKind::Text => "TEXT",
                ColumnKind::Bool => "INTEGER",
                ColumnKind::Float => "REAL",
            };
            create.push_str(&format!(", \"{}\" {}", column.name, sql_type));
        }
        create.push(')');
        self.conn.execute(&create, [])?;

        ensure_srs(&self.conn, layer.srid)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO gpkg_contents
             (table_name, data_type, identifier, srs_id) VALUES (?1, 'features', ?1, ?2)",
            rusqlite::params![layer.name, layer.srid as i64],
        )?;
        self.conn.execute(
            "INSERT OR IGNORE INTO gpkg_geometry_columns
             (table_name, column_name, geometry_type_name, srs_id, z, m)
             VALUES (?1, 'geom', 'GEOMETRY', ?2, 0, 0)",
            rusqlite::params![layer.name, layer.srid as i64],
        )?;
        Ok(())
    }
}

fn ensure_metadata_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS gpkg_spatial_ref_sys (
             srs_name TEXT NOT NULL,
             srs_id INTEGER NOT NULL PRIMARY KEY,
             organization TEXT NOT NULL,
             organization_coordsys_id INTEGER NOT NULL,
             definition TEXT NOT NULL,
             description TEXT
         );
         CREATE TABLE IF NOT EXISTS gpkg_contents (
             table_name TEXT NOT NULL PRIMARY KEY,
             data_type TEXT NOT NULL,
             identifier TEXT UNIQUE,
             description TEXT DEFAULT '',
             last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
             min_x DOUBLE, min_y DOUBLE, max_x DOUBLE, max_y DOUBLE,
             srs_id INTEGER
         );
         CREATE TABLE IF NOT EXISTS gpkg_geometry_columns (
             table_name TEXT NOT NULL,
             column_name TEXT NOT NULL,
             geometry_type_name TEXT NOT NULL,
             srs_id INTEGER NOT NULL,
             z TINYINT NOT NULL,
             m TINYINT NOT NULL,
             CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name)
         );",
    )?;

    // Entrées obligatoires du registre des CRS
    conn.execute(
        "INSERT OR IGNORE INTO gpkg_spatial_ref_sys
         (srs_name, srs_id, organization, organization_coordsys_id, definition)
         VALUES ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined'),
                ('Undefined geographic SRS', 0, 'NONE', 0, 'undefined'),
                ('WGS 84', 4326, 'EPSG', 4326, 'undefined')",
        [],
    )?;
    Ok(())
}

fn ensure_srs(conn: &Connection, srid: u32) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO gpkg_spatial_ref_sys
         (srs_name, srs_id, organization, organization_coordsys_id, definition)
         VALUES (?1, ?2, 'EPSG', ?2, 'undefined')",
        rusqlite::params![format!("EPSG:{}", srid), srid as i64],
    )?;
    Ok(())
}

fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Int(n) => SqlValue::Integer(*n),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(t) => SqlValue::Text(t.clone()),
    }
}
