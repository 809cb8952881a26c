//! Algorithmes de validation : auto-intersections et relations entre couches

pub mod relation;
pub mod self_intersect;

use geo::Geometry;

use crate::geomops;

/// Valeurs par défaut quand une colonne attendue est absente
pub const NO_NAME: &str = "noname";
pub const NO_FEATURE_TYPE: &str = "nofeaturetype";

/// Une intersection classée : géométrie + identité de la paire d'entités
#[derive(Debug, Clone)]
pub struct PairEntry {
    pub geometry: Geometry<f64>,
    /// `"cle_a-cle_b"`
    pub pair_keys: String,
    /// `"nom_a-nom_b"` (ou `noname`)
    pub pair_names: String,
    /// `"type_a-type_b"` (ou `nofeaturetype`)
    pub pair_feature_types: String,
}

/// Seaux de résultats par type de géométrie d'intersection
#[derive(Debug, Default)]
pub struct IntersectionBuckets {
    pub points: Vec<PairEntry>,
    pub lines: Vec<PairEntry>,
    /// Membres de MultiPolygons décomposés (une entrée par polygone membre)
    pub multipolygon_parts: Vec<PairEntry>,
    /// Seau générique : Polygon simple et tout le reste
    pub polygons: Vec<PairEntry>,
}

impl IntersectionBuckets {
    pub fn total(&self) -> usize {
        self.points.len() + self.lines.len() + self.multipolygon_parts.len() + self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Classe une géométrie d'intersection dans les seaux.
    ///
    /// MultiPolygon : un membre = une entrée. GeometryCollection : chaque
    /// partie est redispatche récursivement. Les géométries invalides sont
    /// écartées sauf si `keep_invalid` est levé.
    pub fn classify(
        &mut self,
        geometry: Geometry<f64>,
        pair_keys: &str,
        pair_names: &str,
        pair_feature_types: &str,
        keep_invalid: bool,
    ) {
        match geometry {
            Geometry::GeometryCollection(gc) => {
                for part in gc {
                    self.classify(part, pair_keys, pair_names, pair_feature_types, keep_invalid);
                }
            }
            Geometry::MultiPolygon(mp) => {
                for poly in mp {
                    self.push(
                        Bucket::MultipolygonParts,
                        Geometry::Polygon(poly),
                        pair_keys,
                        pair_names,
                        pair_feature_types,
                        keep_invalid,
                    );
                }
            }
            geom @ (Geometry::Point(_) | Geometry::MultiPoint(_)) => {
                self.push(
                    Bucket::Points,
                    geom,
                    pair_keys,
                    pair_names,
                    pair_feature_types,
                    keep_invalid,
                );
            }
            geom @ (Geometry::LineString(_) | Geometry::MultiLineString(_) | Geometry::Line(_)) => {
                self.push(
                    Bucket::Lines,
                    geom,
                    pair_keys,
                    pair_names,
                    pair_feature_types,
                    keep_invalid,
                );
            }
            geom => {
                self.push(
                    Bucket::Polygons,
                    geom,
                    pair_keys,
                    pair_names,
                    pair_feature_types,
                    keep_invalid,
                );
            }
        }
    }

    fn push(
        &mut self,
        bucket: Bucket,
        geometry: Geometry<f64>,
        pair_keys: &str,
        pair_names: &str,
        pair_feature_types: &str,
        keep_invalid: bool,
    ) {
        if !keep_invalid && !geomops::is_valid(&geometry) {
            return;
        }
        let entry = PairEntry {
            geometry,
            pair_keys: pair_keys.to_string(),
            pair_names: pair_names.to_string(),
            pair_feature_types: pair_feature_types.to_string(),
        };
        match bucket {
            Bucket::Points => self.points.push(entry),
            Bucket::Lines => self.lines.push(entry),
            Bucket::MultipolygonParts => self.multipolygon_parts.push(entry),
            Bucket::Polygons => self.polygons.push(entry),
        }
    }
}

enum Bucket {
    Points,
    Lines,
    MultipolygonParts,
    Polygons,
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, polygon, GeometryCollection, MultiPolygon, Point};

    fn classify_one(geom: Geometry<f64>) -> IntersectionBuckets {
        let mut buckets = IntersectionBuckets::default();
        buckets.classify(geom, "a-b", "x-y", "t-u", false);
        buckets
    }

    #[test]
    fn test_collection_dispatches_each_part() {
        let gc = Geometry::GeometryCollection(GeometryCollection::from(vec![
            Geometry::Point(Point::new(0.0, 0.0)),
            Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]),
            Geometry::Polygon(polygon![
                (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)
            ]),
        ]));

        let buckets = classify_one(gc);
        assert_eq!(buckets.points.len(), 1);
        assert_eq!(buckets.lines.len(), 1);
        assert_eq!(buckets.polygons.len(), 1);
        assert_eq!(buckets.multipolygon_parts.len(), 0);
    }

    #[test]
    fn test_multipolygon_fan_out() {
        let mp = Geometry::MultiPolygon(MultiPolygon::new(vec![
            polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)],
            polygon![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0), (x: 6.0, y: 6.0), (x: 5.0, y: 5.0)],
            polygon![(x: 9.0, y: 9.0), (x: 10.0, y: 9.0), (x: 10.0, y: 10.0), (x: 9.0, y: 9.0)],
        ]));

        let buckets = classify_one(mp);
        assert_eq!(buckets.multipolygon_parts.len(), 3);
        assert!(buckets
            .multipolygon_parts
            .iter()
            .all(|e| e.pair_keys == "a-b"));
        assert_eq!(buckets.polygons.len(), 0);
    }

    #[test]
    fn test_single_polygon_goes_to_generic_bucket() {
        let poly = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)
        ]);
        let buckets = classify_one(poly);
        assert_eq!(buckets.polygons.len(), 1);
        assert_eq!(buckets.total(), 1);
    }

    #[test]
    fn test_invalid_geometry_dropped() {
        // Polygone papillon : auto-intersection, invalide
        let bowtie = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0), (x: 2.0, y: 2.0), (x: 2.0, y: 0.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0)
        ]);

        let dropped = classify_one(bowtie.clone());
        assert_eq!(dropped.total(), 0);

        let mut kept = IntersectionBuckets::default();
        kept.classify(bowtie, "a-b", "x-y", "t-u", true);
        assert_eq!(kept.total(), 1);
    }
}
