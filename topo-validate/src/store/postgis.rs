//! Backend relationnel PostGIS
//!
//! Le prédicat du dialecte et l'emprise se composent dans une seule
//! requête SQL ; la géométrie transite en WKB via `ST_AsBinary`. La clé
//! primaire est introspectée depuis `information_schema` (repli sur `id`),
//! la colonne géométrie et le SRID depuis `geometry_columns`.

use deadpool_postgres::Pool;
use geozero::ToGeo;
use tracing::debug;

use super::feature::{Feature, FeatureCollection};
use super::pool::{create_pool, test_connection, DatabaseConfig};
use super::{validate_filter, Bbox, StoreError};
use topofilter::Value;

#[derive(Debug)]
pub struct PostgisStore {
    pool: Pool,
}

impl PostgisStore {
    /// Se connecte à partir d'une URL `postgres://…`
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let config = DatabaseConfig::from_url(url)?;
        let pool = create_pool(&config).await?;
        test_connection(&pool).await?;
        debug!(
            host = config.host.as_str(),
            dbname = config.dbname.as_str(),
            "Connected to PostGIS"
        );
        Ok(Self { pool })
    }

    /// Clé primaire déclarée de la table, repli sur `id`
    pub async fn primary_key_of(&self, table: &str) -> Result<String, StoreError> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT kcu.column_name \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name \
                  AND tc.table_schema = kcu.table_schema \
                 WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_name = $1",
                &[&table],
            )
            .await
            .map_err(backend_err)?;

        Ok(rows
            .first()
            .map(|r| r.get::<_, String>(0))
            .unwrap_or_else(|| "id".to_string()))
    }

    /// Colonne géométrie et SRID depuis `geometry_columns`,
    /// repli sur (`geom`, 4326)
    async fn geometry_info(&self, table: &str) -> Result<(String, u32), StoreError> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT f_geometry_column, srid FROM geometry_columns WHERE f_table_name = $1",
                &[&table],
            )
            .await
            .map_err(backend_err)?;

        Ok(rows
            .first()
            .map(|r| (r.get::<_, String>(0), r.get::<_, i32>(1) as u32))
            .unwrap_or_else(|| ("geom".to_string(), 4326)))
    }

    async fn columns_of(&self, table: &str) -> Result<Vec<String>, StoreError> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT column_name FROM information_schema.columns \
                 WHERE table_name = $1 ORDER BY ordinal_position",
                &[&table],
            )
            .await
            .map_err(backend_err)?;

        if rows.is_empty() {
            return Err(StoreError::NotFound(table.to_string()));
        }
        Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
    }

    pub async fn read(
        &self,
        table: &str,
        where_clause: Option<&str>,
        bbox: Option<&Bbox>,
    ) -> Result<FeatureCollection, StoreError> {
        let columns = self.columns_of(table).await?;
        let (geom_col, srid) = self.geometry_info(table).await?;
        let primary_key = self.primary_key_of(table).await?;

        let attr_columns: Vec<&String> = columns.iter().filter(|c| **c != geom_col).collect();

        let mut select = format!(
            "SELECT \"{}\"::text, ST_AsBinary(\"{}\")",
            primary_key, geom_col
        );
        for col in &attr_columns {
            select.push_str(&format!(", \"{}\"::text", col));
        }
        select.push_str(&format!(" FROM \"{}\"", table));
        select.push_str(&build_where_sql(where_clause, bbox, &geom_col, srid)?);

        let client = self.client().await?;
        let rows = client.query(&select, &[]).await.map_err(backend_err)?;

        let mut features = Vec::with_capacity(rows.len());
        for row in &rows {
            let Some(id) = row.get::<_, Option<String>>(0) else {
                continue;
            };
            let Some(wkb) = row.get::<_, Option<Vec<u8>>>(1) else {
                continue;
            };
            let geometry = geozero::wkb::Wkb(wkb)
                .to_geo()
                .map_err(|e| StoreError::Backend(format!("WKB decode failed: {}", e)))?;

            let attributes = attr_columns
                .iter()
                .enumerate()
                .map(|(i, col)| {
                    let value = match row.get::<_, Option<String>>(i + 2) {
                        Some(text) => Value::Text(text),
                        None => Value::Null,
                    };
                    ((*col).clone(), value)
                })
                .collect();

            features.push(Feature {
                id,
                attributes,
                geometry,
            });
        }

        debug!(table, rows = features.len(), "PostGIS read");
        Ok(FeatureCollection::new(
            table,
            srid,
            geom_col,
            primary_key,
            features,
        ))
    }

    /// Projection clé + géométrie uniquement
    pub async fn read_sparse(
        &self,
        table: &str,
        where_clause: Option<&str>,
        bbox: Option<&Bbox>,
    ) -> Result<FeatureCollection, StoreError> {
        // Vérifie l'existence de la table avant d'émettre la requête
        self.columns_of(table).await?;
        let (geom_col, srid) = self.geometry_info(table).await?;
        let primary_key = self.primary_key_of(table).await?;

        let mut select = format!(
            "SELECT \"{}\"::text, ST_AsBinary(\"{}\") FROM \"{}\"",
            primary_key, geom_col, table
        );
        select.push_str(&build_where_sql(where_clause, bbox, &geom_col, srid)?);

        let client = self.client().await?;
        let rows = client.query(&select, &[]).await.map_err(backend_err)?;

        let mut features = Vec::with_capacity(rows.len());
        for row in &rows {
            let (Some(id), Some(wkb)) = (
                row.get::<_, Option<String>>(0),
                row.get::<_, Option<Vec<u8>>>(1),
            ) else {
                continue;
            };
            let geometry = geozero::wkb::Wkb(wkb)
                .to_geo()
                .map_err(|e| StoreError::Backend(format!("WKB decode failed: {}", e)))?;
            features.push(Feature {
                id,
                attributes: Vec::new(),
                geometry,
            });
        }

        Ok(FeatureCollection::new(
            table,
            srid,
            geom_col,
            primary_key,
            features,
        ))
    }

    async fn client(&self) -> Result<deadpool_postgres::Client, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::SourceUnavailable(format!("Pool exhausted: {}", e)))
    }
}

/// Compose la clause WHERE : prédicat du dialecte (validé) + emprise
fn build_where_sql(
    where_clause: Option<&str>,
    bbox: Option<&Bbox>,
    geom_col: &str,
    srid: u32,
) -> Result<String, StoreError> {
    let mut clauses: Vec<String> = Vec::new();

    if let Some(filter) = where_clause {
        // Le dialecte est du SQL valide : on valide l'analyse puis on
        // pousse le texte tel quel
        validate_filter(filter)?;
        clauses.push(format!("({})", filter));
    }
    if let Some(rect) = bbox {
        clauses.push(format!(
            "\"{}\" && ST_MakeEnvelope({}, {}, {}, {}, {})",
            geom_col,
            rect.min().x,
            rect.min().y,
            rect.max().x,
            rect.max().y,
            srid
        ));
    }

    if clauses.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {}", clauses.join(" AND ")))
    }
}

fn backend_err(e: tokio_postgres::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}
