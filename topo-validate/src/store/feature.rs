//! Modèle de données : entités et collections indexées
//!
//! Une [`Feature`] porte des attributs typés ([`topofilter::Value`]) au lieu
//! d'un accès duck-typé aux colonnes : un attribut absent est une absence
//! explicite, jamais une valeur devinée.

use std::sync::OnceLock;

use geo::{BoundingRect, Geometry, Rect};
use rstar::{RTree, RTreeObject, AABB};
use topofilter::{Expr, Value};

use crate::geomops;

/// Une entité vectorielle : clé primaire, attributs, géométrie
#[derive(Debug, Clone)]
pub struct Feature {
    /// Clé primaire (rendu texte, unique dans la collection)
    pub id: String,
    /// Attributs ordonnés (nom, valeur)
    pub attributes: Vec<(String, Value)>,
    pub geometry: Geometry<f64>,
}

impl Feature {
    /// Valeur d'un attribut par nom
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Attribut rendu en texte, `None` si absent ou NULL
    pub fn attribute_text(&self, name: &str) -> Option<String> {
        match self.attribute(name) {
            Some(v) if !v.is_null() => Some(v.as_text()),
            _ => None,
        }
    }

    /// Évalue un filtre du dialecte partagé contre cette entité
    pub fn matches(&self, expr: &Expr) -> bool {
        expr.matches(&|col| self.attribute(col))
    }

    /// Emprise de la géométrie
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }
}

/// Entrée de l'index spatial : emprise + position dans la collection
#[derive(Debug, Clone)]
struct IndexedEnvelope {
    idx: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Résultat d'une lecture : entités d'une table, un CRS, un index spatial
///
/// La collection est en lecture seule après construction. La seule
/// transformation autorisée est [`FeatureCollection::with_buffered_lines`],
/// qui consomme la collection et en retourne une nouvelle (index reconstruit).
#[derive(Debug)]
pub struct FeatureCollection {
    /// Table ou couche source
    pub table: String,
    /// SRID des géométries
    pub srid: u32,
    /// Nom de la colonne géométrie du backend
    pub geom_column: String,
    /// Nom de la colonne clé primaire
    pub primary_key: String,
    pub features: Vec<Feature>,
    index: OnceLock<RTree<IndexedEnvelope>>,
}

impl FeatureCollection {
    pub fn new(
        table: impl Into<String>,
        srid: u32,
        geom_column: impl Into<String>,
        primary_key: impl Into<String>,
        features: Vec<Feature>,
    ) -> Self {
        Self {
            table: table.into(),
            srid,
            geom_column: geom_column.into(),
            primary_key: primary_key.into(),
            features,
            index: OnceLock::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Index spatial construit paresseusement à la première requête
    fn index(&self) -> &RTree<IndexedEnvelope> {
        self.index.get_or_init(|| {
            let envelopes: Vec<IndexedEnvelope> = self
                .features
                .iter()
                .enumerate()
                .filter_map(|(idx, f)| {
                    f.bounding_rect().map(|r| IndexedEnvelope {
                        idx,
                        aabb: AABB::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]),
                    })
                })
                .collect();
            RTree::bulk_load(envelopes)
        })
    }

    /// Indices des entités dont l'emprise intersecte `rect`
    pub fn candidates(&self, rect: &Rect<f64>) -> Vec<usize> {
        let query = AABB::from_corners(
            [rect.min().x, rect.min().y],
            [rect.max().x, rect.max().y],
        );
        self.index()
            .locate_in_envelope_intersecting(&query)
            .map(|e| e.idx)
            .collect()
    }

    /// Remplace les géométries linéaires par de fins polygones tampons.
    ///
    /// Convertit « touche une ligne » en « intersecte un polygone mince »
    /// pour que les prédicats de jointure spatiale ordinaires s'appliquent.
    /// Consomme la collection : l'index sera reconstruit à la demande.
    pub fn with_buffered_lines(self, radius: f64) -> Self {
        let features = self
            .features
            .into_iter()
            .map(|mut f| {
                if geomops::is_line_like(&f.geometry) {
                    f.geometry = Geometry::MultiPolygon(geomops::buffer_lines(&f.geometry, radius));
                }
                f
            })
            .collect();

        Self {
            table: self.table,
            srid: self.srid,
            geom_column: self.geom_column,
            primary_key: self.primary_key,
            features,
            index: OnceLock::new(),
        }
    }

    /// Post-filtre par emprise (intersection d'emprises, pas test exact)
    pub fn retain_in_bbox(&mut self, bbox: &Rect<f64>) {
        self.features.retain(|f| match f.bounding_rect() {
            Some(r) => {
                r.min().x <= bbox.max().x
                    && r.max().x >= bbox.min().x
                    && r.min().y <= bbox.max().y
                    && r.max().y >= bbox.min().y
            }
            None => false,
        });
        self.index = OnceLock::new();
    }
}
