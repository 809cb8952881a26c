//! # topo-validate
//!
//! Validation topologique d'un jeu de données topographique.
//!
//! ## Features
//!
//! - Contrôles attributaires (colonnes nulles, règles de requête)
//! - Relations entre couches (intersecte, touche, contient)
//! - Recouvrements internes d'une couche, classés par type de géométrie
//! - Sources PostGIS, GeoPackage et Parquet derrière un store commun
//! - Exports GeoPackage et Parquet estampillés, rapport de synthèse JSON
//!
//! ## Usage CLI
//!
//! ```bash
//! # Valider une base PostGIS
//! topo-validate --config rules.json --source postgres://user@host/topo
//!
//! # Valider un GeoPackage avec sortie datée
//! topo-validate --config rules.json --source data.gpkg --use-date-folder
//! ```

pub mod checks;
pub mod cli;
pub mod config;
pub mod controller;
pub mod geomops;
pub mod output;
pub mod report;
pub mod reproject;
pub mod store;

pub use config::Settings;
pub use controller::ValidationController;
pub use report::SummaryReport;
pub use store::FeatureStore;
