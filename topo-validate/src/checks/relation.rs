//! Évaluation des règles de relation entre couches
//!
//! Jointure spatiale unilatérale de la couche primaire contre l'autre
//! couche : `Present` retient les entités qui ont trouvé une
//! correspondance (violation d'une règle « ne doit pas »), `Absent`
//! celles qui n'en ont pas (violation d'une règle « doit être sur /
//! dans / au contact de »).

use geo::{Intersects, Relate};
use serde::Deserialize;

use crate::store::feature::FeatureCollection;

/// Prédicat spatial de la jointure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Intersects,
    Touches,
    Contains,
}

/// Sens de la règle : les correspondances sont-elles fautives ou requises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// Les entités appariées sont les résultats signalés
    Present,
    /// Les entités sans appariement sont les résultats signalés
    Absent,
}

/// Indices des entités primaires signalées par la règle.
///
/// Pour un couple de collections fixé, `Present` et `Absent` partitionnent
/// exactement la collection primaire : union = toutes les entités,
/// intersection vide.
pub fn evaluate(
    primary: &FeatureCollection,
    other: &FeatureCollection,
    relation: Relation,
    expect: Expectation,
) -> Vec<usize> {
    let mut flagged = Vec::new();

    for (i, feature) in primary.features.iter().enumerate() {
        let matched = match feature.bounding_rect() {
            Some(rect) => other.candidates(&rect).into_iter().any(|j| {
                let candidate = &other.features[j].geometry;
                match relation {
                    Relation::Intersects => feature.geometry.intersects(candidate),
                    Relation::Touches => feature.geometry.relate(candidate).is_touches(),
                    Relation::Contains => feature.geometry.relate(candidate).is_contains(),
                }
            }),
            None => false,
        };

        let flag = match expect {
            Expectation::Present => matched,
            Expectation::Absent => !matched,
        };
        if flag {
            flagged.push(i);
        }
    }

    flagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::feature::Feature;
    use geo::{line_string, polygon, Geometry, Point};
    use std::collections::HashSet;
    use topofilter::Value;

    fn feature(id: &str, geometry: Geometry<f64>) -> Feature {
        Feature {
            id: id.to_string(),
            attributes: vec![("name".to_string(), Value::Text(id.to_string()))],
            geometry,
        }
    }

    fn collection(table: &str, features: Vec<Feature>) -> FeatureCollection {
        FeatureCollection::new(table, 2193, "geom", "topo_id", features)
    }

    fn square(x0: f64, y0: f64, size: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ])
    }

    fn fixtures() -> (FeatureCollection, FeatureCollection) {
        // p1 recouvre o1, p2 est isolé
        let primary = collection(
            "buildings",
            vec![
                feature("p1", square(0.0, 0.0, 2.0)),
                feature("p2", square(10.0, 10.0, 1.0)),
            ],
        );
        let other = collection("sites", vec![feature("o1", square(1.0, 1.0, 2.0))]);
        (primary, other)
    }

    #[test]
    fn test_present_keeps_matched() {
        let (primary, other) = fixtures();
        let flagged = evaluate(&primary, &other, Relation::Intersects, Expectation::Present);
        assert_eq!(flagged, vec![0]);
    }

    #[test]
    fn test_absent_keeps_unmatched() {
        let (primary, other) = fixtures();
        let flagged = evaluate(&primary, &other, Relation::Intersects, Expectation::Absent);
        assert_eq!(flagged, vec![1]);
    }

    #[test]
    fn test_present_absent_partition_primary() {
        let (primary, other) = fixtures();
        let present: HashSet<usize> =
            evaluate(&primary, &other, Relation::Intersects, Expectation::Present)
                .into_iter()
                .collect();
        let absent: HashSet<usize> =
            evaluate(&primary, &other, Relation::Intersects, Expectation::Absent)
                .into_iter()
                .collect();

        assert!(present.is_disjoint(&absent));
        let union: HashSet<usize> = present.union(&absent).copied().collect();
        assert_eq!(union.len(), primary.len());
    }

    #[test]
    fn test_touches_relation() {
        // t1 partage un bord avec o1, t2 le recouvre franchement
        let primary = collection(
            "parcels",
            vec![
                feature("t1", square(2.0, 0.0, 2.0)),
                feature("t2", square(1.0, 1.0, 2.0)),
            ],
        );
        let other = collection("sites", vec![feature("o1", square(0.0, 0.0, 2.0))]);

        let flagged = evaluate(&primary, &other, Relation::Touches, Expectation::Present);
        assert_eq!(flagged, vec![0]);
    }

    #[test]
    fn test_contains_relation() {
        let primary = collection("lakes", vec![feature("big", square(0.0, 0.0, 10.0))]);
        let other = collection(
            "islands",
            vec![feature("inner", square(4.0, 4.0, 1.0))],
        );

        let flagged = evaluate(&primary, &other, Relation::Contains, Expectation::Present);
        assert_eq!(flagged, vec![0]);
    }

    #[test]
    fn test_buffer_leaves_polygonal_other_untouched() {
        // Ligne posée sur le bord supérieur d'un polygone : touches est
        // vrai, la règle Absent ne la signale pas. Le tampon appliqué à
        // la collection jointe ne change rien quand elle est surfacique,
        // et la ligne primaire n'est jamais transformée.
        let primary = collection(
            "tracks",
            vec![feature(
                "t1",
                Geometry::LineString(line_string![(x: 0.5, y: 2.0), (x: 1.5, y: 2.0)]),
            )],
        );
        let other = collection("parcels", vec![feature("o1", square(0.0, 0.0, 2.0))])
            .with_buffered_lines(1e-6);

        let flagged = evaluate(&primary, &other, Relation::Touches, Expectation::Absent);
        assert!(flagged.is_empty());
    }

    #[test]
    fn test_buffered_lines_turn_touch_into_intersect() {
        // Un point posé exactement sur une ligne : après tampon, la ligne
        // devient un polygone mince et le prédicat intersects suffit
        let primary = collection(
            "poles",
            vec![feature("pt", Geometry::Point(Point::new(5.0, 0.0)))],
        );
        let other = collection(
            "wires",
            vec![feature(
                "w1",
                Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]),
            )],
        )
        .with_buffered_lines(1e-6);

        let flagged = evaluate(&primary, &other, Relation::Intersects, Expectation::Present);
        assert_eq!(flagged, vec![0]);
    }
}
