//! Construction des couches d'erreurs et conventions de sortie
//!
//! Chaque contrôle produit une `ErrorLayer` : un nom de couche, un SRID
//! et des lignes géométrie + attributs estampillées (`warning`, `open`,
//! `val_date`, `notes`). Les writers GeoPackage et Parquet consomment
//! cette forme commune.

pub mod gpkg;
pub mod parquet;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use geo::{Area, Geometry};
use tracing::warn;

use crate::checks::{IntersectionBuckets, PairEntry};
use crate::reproject::Reprojector;
use crate::store::feature::FeatureCollection;
use topofilter::Value;

/// Type d'une colonne de sortie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Bool,
    Float,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    fn text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ColumnKind::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorRow {
    pub geometry: Geometry<f64>,
    pub values: Vec<Value>,
}

/// Couche d'erreurs prête à exporter
#[derive(Debug, Clone)]
pub struct ErrorLayer {
    pub name: String,
    pub srid: u32,
    pub columns: Vec<Column>,
    pub rows: Vec<ErrorRow>,
}

impl ErrorLayer {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Bucket géométrique des recouvrements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketKind {
    Areas,
    Points,
    Lines,
    Multipolygon,
}

impl BucketKind {
    /// Suffixe du nom de couche GeoPackage
    pub fn layer_suffix(&self) -> &'static str {
        match self {
            BucketKind::Areas => "areas",
            BucketKind::Points => "points",
            BucketKind::Lines => "lines",
            BucketKind::Multipolygon => "multipolygon",
        }
    }

    /// Suffixe du nom de fichier Parquet
    pub fn parquet_suffix(&self) -> &'static str {
        match self {
            BucketKind::Areas => "poly",
            BucketKind::Points => "point",
            BucketKind::Lines => "line",
            BucketKind::Multipolygon => "multipolygon",
        }
    }
}

/// Colonnes d'estampillage communes à toutes les couches
fn stamp_columns() -> Vec<Column> {
    vec![
        Column::text("warning"),
        Column {
            name: "open".to_string(),
            kind: ColumnKind::Bool,
        },
        Column::text("val_date"),
        Column::text("notes"),
    ]
}

fn stamp_values(message: &str, today: NaiveDate) -> Vec<Value> {
    vec![
        Value::Text(message.to_string()),
        Value::Bool(true),
        Value::Text(today.format("%Y-%m-%d").to_string()),
        Value::Text(String::new()),
    ]
}

/// Nom de couche d'une règle de relation :
/// `{layername}_{intersect|not_intersect}_{autre table}`
pub fn relation_layer_name(layername: &str, validation_type: &str, other_table: &str) -> String {
    format!(
        "{}_{}_{}",
        layername,
        validation_type,
        other_table.replace('.', "_")
    )
}

/// Nom de couche d'un contrôle de colonne : `{layername}_null_{colonne}`
/// ou `{layername}_query_{colonne}`
pub fn column_layer_name(layername: &str, validation_type: &str, column: &str) -> String {
    format!("{}_{}_{}", layername, validation_type, column)
}

/// Nom du fichier GeoPackage d'un type de validation
pub fn gpkg_file_name(validation_type: &str) -> String {
    format!("topology_{}.gpkg", validation_type)
}

/// Couche clé + géométrie estampillée (contrôles null et query)
pub fn sparse_layer(
    name: &str,
    collection: &FeatureCollection,
    message: &str,
    today: NaiveDate,
) -> ErrorLayer {
    let mut columns = vec![Column::text(&collection.primary_key)];
    columns.extend(stamp_columns());

    let rows = collection
        .features
        .iter()
        .map(|f| {
            let mut values = vec![Value::Text(f.id.clone())];
            values.extend(stamp_values(message, today));
            ErrorRow {
                geometry: f.geometry.clone(),
                values,
            }
        })
        .collect();

    ErrorLayer {
        name: name.to_string(),
        srid: collection.srid,
        columns,
        rows,
    }
}

/// Couche des entités signalées par une règle de relation.
///
/// Colonnes retenues : clé primaire, puis `topo_id` et `name` si la
/// table les porte. Les colonnes absentes sont simplement omises.
pub fn flagged_layer(
    name: &str,
    collection: &FeatureCollection,
    flagged: &[usize],
    message: &str,
    today: NaiveDate,
) -> ErrorLayer {
    let mut attr_names: Vec<String> = Vec::new();
    for wanted in ["topo_id", "name"] {
        if wanted == collection.primary_key {
            continue;
        }
        let present = collection
            .features
            .iter()
            .any(|f| f.attributes.iter().any(|(n, _)| n == wanted));
        if present {
            attr_names.push(wanted.to_string());
        }
    }

    let mut columns = vec![Column::text(&collection.primary_key)];
    columns.extend(attr_names.iter().map(|n| Column::text(n)));
    columns.extend(stamp_columns());

    let rows = flagged
        .iter()
        .filter_map(|&idx| collection.features.get(idx))
        .map(|f| {
            let mut values = vec![Value::Text(f.id.clone())];
            for attr in &attr_names {
                values.push(f.attribute(attr).cloned().unwrap_or(Value::Null));
            }
            values.extend(stamp_values(message, today));
            ErrorRow {
                geometry: f.geometry.clone(),
                values,
            }
        })
        .collect();

    ErrorLayer {
        name: name.to_string(),
        srid: collection.srid,
        columns,
        rows,
    }
}

fn pair_columns(with_area: bool) -> Vec<Column> {
    let mut columns = vec![
        Column::text("pair_keys"),
        Column::text("pair_names"),
        Column::text("pair_feature_types"),
    ];
    if with_area {
        columns.push(Column {
            name: "Area".to_string(),
            kind: ColumnKind::Float,
        });
    }
    columns.extend(stamp_columns());
    columns
}

fn pair_row(
    entry: &PairEntry,
    area: Option<Option<f64>>,
    message: &str,
    today: NaiveDate,
) -> ErrorRow {
    let mut values = vec![
        Value::Text(entry.pair_keys.clone()),
        Value::Text(entry.pair_names.clone()),
        Value::Text(entry.pair_feature_types.clone()),
    ];
    if let Some(area) = area {
        values.push(area.map(Value::Float).unwrap_or(Value::Null));
    }
    values.extend(stamp_values(message, today));
    ErrorRow {
        geometry: entry.geometry.clone(),
        values,
    }
}

/// Surface d'une géométrie mesurée dans le CRS de calcul
fn area_in_crs(geom: &Geometry<f64>, srid: u32, area_crs: u32) -> Option<f64> {
    if srid == area_crs {
        return Some(geom.unsigned_area());
    }
    let reproj = match Reprojector::new(srid, area_crs) {
        Ok(r) => r,
        Err(e) => {
            warn!(srid, area_crs, error = %e, "Area reprojection unavailable");
            return None;
        }
    };
    match reproj.transform_geometry(geom) {
        Ok(projected) => Some(projected.unsigned_area()),
        Err(e) => {
            warn!(error = %e, "Geometry reprojection failed");
            None
        }
    }
}

/// Couches d'erreurs d'un jeu de recouvrements, une par bucket non vide.
///
/// La colonne `Area` n'est portée que par le bucket des polygones
/// simples, mesurée dans `area_crs`.
pub fn bucket_layers(
    layername: &str,
    buckets: &IntersectionBuckets,
    srid: u32,
    area_crs: u32,
    message: &str,
    today: NaiveDate,
) -> Vec<(BucketKind, ErrorLayer)> {
    let mut layers = Vec::new();

    let groups: [(BucketKind, &Vec<PairEntry>); 4] = [
        (BucketKind::Areas, &buckets.polygons),
        (BucketKind::Points, &buckets.points),
        (BucketKind::Lines, &buckets.lines),
        (BucketKind::Multipolygon, &buckets.multipolygon_parts),
    ];

    for (kind, entries) in groups {
        if entries.is_empty() {
            continue;
        }
        let with_area = kind == BucketKind::Areas;
        let rows = entries
            .iter()
            .map(|entry| {
                let area =
                    with_area.then(|| area_in_crs(&entry.geometry, srid, area_crs));
                pair_row(entry, area, message, today)
            })
            .collect();

        layers.push((
            kind,
            ErrorLayer {
                name: format!("{}_errors_{}", layername, kind.layer_suffix()),
                srid,
                columns: pair_columns(with_area),
                rows,
            },
        ));
    }

    layers
}

/// Couche combinée de tous les buckets pour l'export Parquet unique.
/// Pas de colonne de surface : seule la couche du bucket des polygones
/// simples en porte une.
pub fn combined_bucket_layer(
    layername: &str,
    buckets: &IntersectionBuckets,
    srid: u32,
    message: &str,
    today: NaiveDate,
) -> ErrorLayer {
    let mut rows = Vec::with_capacity(buckets.total());

    for entries in [
        &buckets.polygons,
        &buckets.points,
        &buckets.lines,
        &buckets.multipolygon_parts,
    ] {
        for entry in entries {
            rows.push(pair_row(entry, None, message, today));
        }
    }

    ErrorLayer {
        name: format!("{}_topology_self_intersect", layername),
        srid,
        columns: pair_columns(false),
        rows,
    }
}

/// Prépare le répertoire de sortie : sous-répertoire daté optionnel,
/// contenu précédent supprimé puis recréé
pub fn prepare_output_dir(
    base: &Path,
    use_date_folder: bool,
    today: NaiveDate,
) -> Result<PathBuf> {
    let dir = if use_date_folder {
        base.join(today.format("%Y-%m-%d").to_string())
    } else {
        base.to_path_buf()
    };

    if dir.exists() {
        std::fs::remove_dir_all(&dir)
            .with_context(|| format!("Cannot clear output directory: {}", dir.display()))?;
    }
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Cannot create output directory: {}", dir.display()))?;
    Ok(dir)
}
