//! Orchestration d'une exécution de validation
//!
//! Enchaîne les trois étapes (requêtes, relations entre couches,
//! recouvrements internes) sur la source configurée. Une règle en
//! échec est journalisée et bascule `evaluation_errors`, elle
//! n'interrompt jamais l'exécution.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use tracing::{error, info, warn};

use crate::checks::relation::{self, Expectation};
use crate::checks::self_intersect;
use crate::config::{
    compose_where, recency_clause, NullCheckRule, QueryRule, RelationRule, RulesFile, SelfIntersectRule,
    Settings,
};
use crate::output::{self, gpkg::GpkgWriter, ErrorLayer};
use crate::report::SummaryReport;
use crate::store::FeatureStore;

/// Rayon du tampon appliqué aux lignes avant les prédicats tolérants
const LINE_BUFFER_RADIUS: f64 = 1e-6;

pub struct ValidationController {
    settings: Settings,
    rules: RulesFile,
    store: FeatureStore,
    report: SummaryReport,
    out_dir: PathBuf,
    today: NaiveDate,
}

impl ValidationController {
    /// Exécute la validation complète et retourne le rapport de synthèse
    pub async fn run(settings: Settings, rules: RulesFile) -> Result<SummaryReport> {
        let started = Instant::now();

        let store = FeatureStore::open(&settings.source).await?;
        info!(
            source = settings.source.as_str(),
            backend = store.backend_name(),
            "Data source opened"
        );

        let today = Local::now().date_naive();
        let out_dir =
            output::prepare_output_dir(&settings.output_dir, settings.use_date_folder, today)?;

        let mut controller = Self {
            settings,
            rules,
            store,
            report: SummaryReport::new(),
            out_dir,
            today,
        };

        if controller.settings.process_queries {
            info!("Stage: attribute queries");
            controller.run_queries().await;
        }
        if controller.settings.process_layer_relations {
            info!("Stage: layer relations");
            controller.run_layer_relations().await;
        }
        if controller.settings.process_self_intersections {
            info!("Stage: self intersections");
            controller.run_self_intersections().await;
        }

        controller.report.set_duration(started.elapsed());
        info!("{}", controller.report.completed_message());

        let report_path = controller.out_dir.join("validation_summary_report.json");
        controller.report.save_to_file(&report_path)?;
        info!(path = %report_path.display(), "Summary report written");

        Ok(controller.report)
    }

    /// Règles null et query
    async fn run_queries(&mut self) {
        let null_rules = self.rules.null_columns.clone();
        for rule in &null_rules {
            if let Err(e) = self.run_null_rule(rule).await {
                error!(table = rule.table.as_str(), column = rule.column.as_str(),
                       error = %e, "Null check failed");
                self.report.flip("evaluation_errors");
            }
        }

        let query_rules = self.rules.query_rules.clone();
        for rule in &query_rules {
            if let Err(e) = self.run_query_rule(rule).await {
                error!(table = rule.table.as_str(), rule = rule.rule.as_str(),
                       error = %e, "Query rule failed");
                self.report.flip("evaluation_errors");
            }
        }
    }

    async fn run_null_rule(&mut self, rule: &NullCheckRule) -> Result<()> {
        let condition = format!("{} IS NULL", rule.column);
        let filter = self.rule_filter(
            rule.where_clause.as_deref(),
            rule.date.as_deref(),
            rule.weeks,
            Some(&condition),
        );

        let collection = self
            .store
            .read_sparse(&rule.table, filter.as_deref(), self.settings.bbox.as_ref())
            .await?;

        if collection.is_empty() {
            return Ok(());
        }
        info!(
            table = rule.table.as_str(),
            column = rule.column.as_str(),
            count = collection.len(),
            "Null values found"
        );
        self.report.flip("null_columns");

        let name = output::column_layer_name(&rule.table, "null", &rule.column);
        let layer = output::sparse_layer(&name, &collection, &rule.message, self.today);
        self.export_layer(&layer, &output::gpkg_file_name("null"))
    }

    async fn run_query_rule(&mut self, rule: &QueryRule) -> Result<()> {
        let filter = self.rule_filter(
            rule.where_clause.as_deref(),
            rule.date.as_deref(),
            rule.weeks,
            Some(&rule.rule),
        );

        let collection = self
            .store
            .read_sparse(&rule.table, filter.as_deref(), self.settings.bbox.as_ref())
            .await?;

        if collection.is_empty() {
            return Ok(());
        }
        info!(
            table = rule.table.as_str(),
            rule = rule.rule.as_str(),
            count = collection.len(),
            "Query rule matches found"
        );
        self.report.flip("query_rules");

        let name = output::column_layer_name(&rule.table, "query", &rule.column);
        let layer = output::sparse_layer(&name, &collection, &rule.message, self.today);
        self.export_layer(&layer, &output::gpkg_file_name("query"))
    }

    /// Règles de relation entre deux couches
    async fn run_layer_relations(&mut self) {
        for rule in self.rules.relation_rules() {
            if let Err(e) = self.run_relation_rule(&rule).await {
                error!(table = rule.spec.table.as_str(),
                       other = rule.spec.other_table.as_str(),
                       category = rule.category,
                       error = %e, "Relation rule failed");
                self.report.flip("evaluation_errors");
            }
        }
    }

    async fn run_relation_rule(&mut self, rule: &RelationRule) -> Result<()> {
        let spec = &rule.spec;
        let filter = self.rule_filter(
            spec.where_clause.as_deref(),
            spec.date.as_deref(),
            spec.weeks,
            None,
        );

        let (primary, other) = self
            .store
            .read_pair(
                &spec.table,
                &spec.other_table,
                filter.as_deref(),
                self.settings.bbox.as_ref(),
            )
            .await?;

        // Le tampon ne transforme que les géométries linéaires de la
        // collection jointe ; la primaire reste intacte pour l'export
        let other = if rule.buffer_lines {
            other.with_buffered_lines(LINE_BUFFER_RADIUS)
        } else {
            other
        };

        let flagged = relation::evaluate(&primary, &other, rule.relation, rule.expect);

        if flagged.is_empty() {
            return Ok(());
        }
        info!(
            table = spec.table.as_str(),
            other = spec.other_table.as_str(),
            category = rule.category,
            count = flagged.len(),
            "Relation violations found"
        );
        self.report.flip(rule.category);

        let validation_type = match rule.expect {
            Expectation::Present => "intersect",
            Expectation::Absent => "not_intersect",
        };
        let name = output::relation_layer_name(spec.layername(), validation_type, &spec.other_table);
        let layer = output::flagged_layer(&name, &primary, &flagged, &spec.message, self.today);
        self.export_layer(&layer, &output::gpkg_file_name(validation_type))
    }

    /// Recouvrements internes d'une couche
    async fn run_self_intersections(&mut self) {
        let rules = self.rules.self_intersect_layers.clone();
        for rule in &rules {
            if let Err(e) = self.run_self_intersect_rule(rule).await {
                error!(table = rule.table.as_str(), error = %e,
                       "Self intersection check failed");
                self.report.flip("evaluation_errors");
            }
        }
    }

    async fn run_self_intersect_rule(&mut self, rule: &SelfIntersectRule) -> Result<()> {
        let filter = self.rule_filter(
            rule.where_clause.as_deref(),
            rule.date.as_deref(),
            rule.weeks,
            None,
        );

        let primary = self
            .store
            .read(&rule.table, filter.as_deref(), self.settings.bbox.as_ref())
            .await?;

        let buckets = self_intersect::find_intersections(
            &primary,
            None,
            self.settings.keep_invalid_geometries,
        );
        if buckets.is_empty() {
            return Ok(());
        }
        info!(
            table = rule.table.as_str(),
            count = buckets.total(),
            "Overlapping pairs found"
        );
        self.report.flip("self_intersect_layers");

        let layername = rule.layername();
        let layers = output::bucket_layers(
            layername,
            &buckets,
            primary.srid,
            self.settings.area_crs,
            &rule.message,
            self.today,
        );

        if self.settings.export_gpkg {
            let path = self.out_dir.join(output::gpkg_file_name("self_intersect"));
            let mut writer = GpkgWriter::open(&path)?;
            for (_, layer) in &layers {
                writer.write_layer(layer)?;
            }
        }
        if self.settings.export_parquet {
            let combined = output::combined_bucket_layer(
                layername,
                &buckets,
                primary.srid,
                &rule.message,
                self.today,
            );
            let path = self.out_dir.join(format!("{}.parquet", combined.name));
            output::parquet::write_layer(&path, &combined)?;
        }
        if self.settings.export_parquet_by_geometry_type {
            for (kind, layer) in &layers {
                let path = self.out_dir.join(format!(
                    "{}_topology_self_intersect_{}.parquet",
                    layername,
                    kind.parquet_suffix()
                ));
                output::parquet::write_layer(&path, layer)?;
            }
        }

        Ok(())
    }

    /// Filtre complet d'une règle : where statique, récence, condition
    /// propre au contrôle
    fn rule_filter(
        &self,
        static_where: Option<&str>,
        rule_date: Option<&str>,
        rule_weeks: Option<i64>,
        condition: Option<&str>,
    ) -> Option<String> {
        // La récence de la règle gagne sur celle des réglages globaux
        let recency = if rule_date.is_some() || rule_weeks.is_some() {
            recency_clause(rule_date, rule_weeks, self.today)
        } else {
            recency_clause(
                self.settings.update_date.as_deref(),
                self.settings.weeks,
                self.today,
            )
        };

        let base = compose_where(static_where, recency.as_deref());
        compose_where(base.as_deref(), condition)
    }

    fn export_layer(&self, layer: &ErrorLayer, gpkg_file: &str) -> Result<()> {
        if layer.is_empty() {
            return Ok(());
        }
        if self.settings.export_gpkg {
            let mut writer = GpkgWriter::open(&self.out_dir.join(gpkg_file))?;
            writer.write_layer(layer)?;
        }
        if self.settings.export_parquet {
            let name = format!("{}.parquet", layer.name);
            output::parquet::write_layer(&self.out_dir.join(name), layer)?;
        }
        if !self.settings.export_gpkg && !self.settings.export_parquet {
            warn!(layer = layer.name.as_str(), "All export formats disabled, layer dropped");
        }
        Ok(())
    }
}
