//! Détection d'auto-intersections par jointure spatiale en deux phases
//!
//! Phase 1 : préfiltre par emprises via l'index R-tree. Phase 2 : test
//! exact `intersects` puis calcul de l'intersection exacte. C'est le seul
//! chemin critique en performance du moteur : coût O(entités × candidats
//! moyens par requête d'emprise).

use geo::Intersects;
use tracing::debug;

use super::{IntersectionBuckets, NO_FEATURE_TYPE, NO_NAME};
use crate::geomops;
use crate::store::feature::{Feature, FeatureCollection};

/// Paires candidates entre `primary` et `other`.
///
/// En mode mono-table (`other = None`), chaque paire non ordonnée `{i, j}`
/// n'est produite qu'une fois (`i < j`) et jamais `i` avec lui-même.
pub fn candidate_pairs(
    primary: &FeatureCollection,
    other: Option<&FeatureCollection>,
) -> Vec<(usize, usize)> {
    let target = other.unwrap_or(primary);
    let one_table = other.is_none();
    let mut pairs = Vec::new();

    for (i, feature) in primary.features.iter().enumerate() {
        let Some(rect) = feature.bounding_rect() else {
            continue;
        };
        for j in target.candidates(&rect) {
            if one_table && j <= i {
                continue;
            }
            pairs.push((i, j));
        }
    }

    pairs
}

/// Recherche les intersections entre entités et les classe par type.
///
/// Mode mono-table : `other = None`, les entités de `primary` sont testées
/// entre elles. Mode deux-tables : chaque entité de `primary` est testée
/// contre les candidates de `other`.
pub fn find_intersections(
    primary: &FeatureCollection,
    other: Option<&FeatureCollection>,
    keep_invalid: bool,
) -> IntersectionBuckets {
    let target = other.unwrap_or(primary);
    let mut buckets = IntersectionBuckets::default();
    let pairs = candidate_pairs(primary, other);

    debug!(
        table = primary.table.as_str(),
        candidates = pairs.len(),
        "Candidate pairs from envelope query"
    );

    for (i, j) in pairs {
        let a = &primary.features[i];
        let b = &target.features[j];

        if !a.geometry.intersects(&b.geometry) {
            continue;
        }
        let Some(geometry) = geomops::intersection(&a.geometry, &b.geometry) else {
            continue;
        };

        buckets.classify(
            geometry,
            &pair_label(a, b, |f| Some(f.id.clone()), ""),
            &pair_label(a, b, |f| f.attribute_text("name"), NO_NAME),
            &pair_label(a, b, |f| f.attribute_text("feature_type"), NO_FEATURE_TYPE),
            keep_invalid,
        );
    }

    buckets
}

fn pair_label<F>(a: &Feature, b: &Feature, get: F, fallback: &str) -> String
where
    F: Fn(&Feature) -> Option<String>,
{
    let left = get(a).unwrap_or_else(|| fallback.to_string());
    let right = get(b).unwrap_or_else(|| fallback.to_string());
    format!("{}-{}", left, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Geometry};
    use std::collections::HashSet;
    use topofilter::Value;

    fn square_feature(id: &str, x0: f64, y0: f64, size: f64) -> Feature {
        Feature {
            id: id.to_string(),
            attributes: vec![("name".to_string(), Value::Text(id.to_string()))],
            geometry: Geometry::Polygon(polygon![
                (x: x0, y: y0),
                (x: x0 + size, y: y0),
                (x: x0 + size, y: y0 + size),
                (x: x0, y: y0 + size),
                (x: x0, y: y0),
            ]),
        }
    }

    fn collection(features: Vec<Feature>) -> FeatureCollection {
        FeatureCollection::new("buildings", 2193, "geom", "topo_id", features)
    }

    #[test]
    fn test_pairs_deduplicated_and_no_self_pairing() {
        // Trois carrés qui se recouvrent tous
        let coll = collection(vec![
            square_feature("a", 0.0, 0.0, 3.0),
            square_feature("b", 1.0, 1.0, 3.0),
            square_feature("c", 2.0, 2.0, 3.0),
        ]);

        let pairs = candidate_pairs(&coll, None);
        let mut seen: HashSet<(usize, usize)> = HashSet::new();
        for (i, j) in &pairs {
            assert!(i < j, "pair ({}, {}) not ordered", i, j);
            assert!(seen.insert((*i, *j)), "pair ({}, {}) duplicated", i, j);
        }
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn test_overlapping_squares_scenario() {
        let coll = collection(vec![
            square_feature("a", 0.0, 0.0, 2.0),
            square_feature("b", 1.0, 1.0, 2.0),
        ]);

        let buckets = find_intersections(&coll, None, false);
        assert_eq!(buckets.total(), 1);
        assert_eq!(buckets.polygons.len(), 1);

        let entry = &buckets.polygons[0];
        assert_eq!(entry.pair_keys, "a-b");
        assert_eq!(entry.pair_names, "a-b");
        assert_eq!(entry.pair_feature_types, "nofeaturetype-nofeaturetype");

        use geo::Area;
        match &entry.geometry {
            Geometry::Polygon(p) => assert!((p.unsigned_area() - 1.0).abs() < 1e-9),
            other => panic!("expected Polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_disjoint_features_yield_nothing() {
        let coll = collection(vec![
            square_feature("a", 0.0, 0.0, 1.0),
            square_feature("b", 10.0, 10.0, 1.0),
        ]);

        let buckets = find_intersections(&coll, None, false);
        assert!(buckets.is_empty());
    }

    #[test]
    fn test_two_table_mode_pairs_across_collections() {
        let primary = collection(vec![square_feature("p1", 0.0, 0.0, 2.0)]);
        let other = collection(vec![
            square_feature("o1", 1.0, 1.0, 2.0),
            square_feature("o2", 10.0, 10.0, 1.0),
        ]);

        let buckets = find_intersections(&primary, Some(&other), false);
        assert_eq!(buckets.total(), 1);
        assert_eq!(buckets.polygons[0].pair_keys, "p1-o1");
    }
}
