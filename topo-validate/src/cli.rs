//! Définition de la ligne de commande

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use geo::{Coord, Rect};

use crate::config::Settings;

/// Valider la topologie d'un jeu de données topographique
#[derive(Parser, Debug)]
#[command(name = "topo-validate")]
#[command(author, version)]
#[command(about = "Valide la topologie d'un jeu de données topographique")]
#[command(
    long_about = "Exécute les règles de validation (colonnes nulles, requêtes attributaires, \
relations entre couches, recouvrements internes) sur une source PostGIS, GeoPackage ou Parquet, \
et exporte les entités en erreur en GeoPackage et Parquet."
)]
pub struct Args {
    /// Fichier de règles JSON
    #[arg(short, long)]
    pub config: PathBuf,

    /// Source de données : URL postgres://, fichier .gpkg ou répertoire Parquet
    #[arg(short, long)]
    pub source: String,

    /// Répertoire de sortie
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,

    /// CRS des calculs de surface
    #[arg(long, default_value_t = 2193)]
    pub area_crs: u32,

    /// Désactive l'export GeoPackage
    #[arg(long)]
    pub no_gpkg: bool,

    /// Active l'export Parquet
    #[arg(long)]
    pub parquet: bool,

    /// Export Parquet séparé par type de géométrie (recouvrements)
    #[arg(long)]
    pub parquet_by_type: bool,

    /// Range les sorties dans un sous-répertoire daté
    #[arg(long)]
    pub use_date_folder: bool,

    /// Saute l'étape des règles null et query
    #[arg(long)]
    pub skip_queries: bool,

    /// Saute l'étape des relations entre couches
    #[arg(long)]
    pub skip_relations: bool,

    /// Saute l'étape des recouvrements internes
    #[arg(long)]
    pub skip_self_intersections: bool,

    /// Emprise de travail : minx,miny,maxx,maxy
    #[arg(long)]
    pub bbox: Option<String>,

    /// Récence globale : date YYYY-MM-DD ou `today`
    #[arg(long)]
    pub date: Option<String>,

    /// Récence globale en semaines
    #[arg(long)]
    pub weeks: Option<i64>,

    /// Conserve les géométries d'erreur invalides
    #[arg(long)]
    pub keep_invalid: bool,

    /// Augmenter la verbosité (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Mode silencieux
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Construit les réglages d'exécution à partir des arguments
    pub fn to_settings(&self) -> Result<Settings> {
        if let Some(date) = &self.date {
            validate_date(date)?;
        }
        let bbox = self
            .bbox
            .as_deref()
            .map(parse_bbox)
            .transpose()
            .context("Invalid --bbox")?;

        Ok(Settings {
            source: self.source.clone(),
            output_dir: self.output.clone(),
            area_crs: self.area_crs,
            export_gpkg: !self.no_gpkg,
            export_parquet: self.parquet,
            export_parquet_by_geometry_type: self.parquet_by_type,
            use_date_folder: self.use_date_folder,
            process_queries: !self.skip_queries,
            process_layer_relations: !self.skip_relations,
            process_self_intersections: !self.skip_self_intersections,
            keep_invalid_geometries: self.keep_invalid,
            update_date: self.date.clone(),
            weeks: self.weeks,
            bbox,
        })
    }
}

/// Analyse une emprise `minx,miny,maxx,maxy`
pub fn parse_bbox(s: &str) -> Result<Rect<f64>> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        bail!("Expected 4 comma-separated values, got {}", parts.len());
    }
    let coords: Vec<f64> = parts
        .iter()
        .map(|p| p.parse::<f64>().with_context(|| format!("Invalid number: {}", p)))
        .collect::<Result<_>>()?;

    if coords[0] >= coords[2] || coords[1] >= coords[3] {
        bail!("Bounding box minimums must be strictly below maximums");
    }
    Ok(Rect::new(
        Coord {
            x: coords[0],
            y: coords[1],
        },
        Coord {
            x: coords[2],
            y: coords[3],
        },
    ))
}

/// Vérifie le format d'une date de récence (`YYYY-MM-DD` ou `today`)
pub fn validate_date(s: &str) -> Result<()> {
    if s == "today" {
        return Ok(());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date (expected YYYY-MM-DD or 'today'): {}", s))?;
    Ok(())
}
