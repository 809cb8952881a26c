//! Opérations géométriques d'orchestration
//!
//! Ce module ne calcule aucun prédicat géométrique lui-même : il décompose,
//! dispatche et réassemble autour des algorithmes de `geo` (BooleanOps,
//! clip, line_intersection, Validation).

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{
    BooleanOps, Coord, Geometry, GeometryCollection, Intersects, LineString, MultiLineString,
    MultiPoint, MultiPolygon, Point, Polygon, Validation,
};

/// Vrai si la géométrie est linéaire (candidate au tampon de lignes)
pub fn is_line_like(geom: &Geometry<f64>) -> bool {
    matches!(
        geom,
        Geometry::LineString(_) | Geometry::MultiLineString(_) | Geometry::Line(_)
    )
}

/// Validité déléguée à la bibliothèque de géométrie
pub fn is_valid(geom: &Geometry<f64>) -> bool {
    geom.is_valid()
}

/// Nom du type de géométrie, pour les logs
pub fn kind_name(geom: &Geometry<f64>) -> &'static str {
    match geom {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Décomposition en primitives homogènes (récursive pour les collections)
#[derive(Debug, Default)]
struct Primitives {
    points: Vec<Point<f64>>,
    lines: Vec<LineString<f64>>,
    polys: Vec<Polygon<f64>>,
}

fn collect_primitives(geom: &Geometry<f64>, out: &mut Primitives) {
    match geom {
        Geometry::Point(p) => out.points.push(*p),
        Geometry::MultiPoint(mp) => out.points.extend(mp.iter().copied()),
        Geometry::Line(l) => out.lines.push(LineString::from(vec![l.start, l.end])),
        Geometry::LineString(ls) => out.lines.push(ls.clone()),
        Geometry::MultiLineString(mls) => out.lines.extend(mls.iter().cloned()),
        Geometry::Polygon(p) => out.polys.push(p.clone()),
        Geometry::MultiPolygon(mp) => out.polys.extend(mp.iter().cloned()),
        Geometry::Rect(r) => out.polys.push(r.to_polygon()),
        Geometry::Triangle(t) => out.polys.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for g in gc {
                collect_primitives(g, out);
            }
        }
    }
}

fn primitives(geom: &Geometry<f64>) -> Primitives {
    let mut out = Primitives::default();
    collect_primitives(geom, &mut out);
    out
}

/// Intersection exacte de deux géométries.
///
/// Retourne `None` quand l'intersection est vide, y compris pour deux
/// surfaces qui ne partagent qu'un point ou un bord (l'intersection
/// surfacique est alors vide). Le résultat est normalisé : un Multi à un
/// seul membre redevient scalaire, des types mixtes donnent une
/// GeometryCollection.
pub fn intersection(a: &Geometry<f64>, b: &Geometry<f64>) -> Option<Geometry<f64>> {
    let pa = primitives(a);
    let pb = primitives(b);

    let mut out_points: Vec<Point<f64>> = Vec::new();
    let mut out_lines: Vec<LineString<f64>> = Vec::new();
    let mut out_polys: Vec<Polygon<f64>> = Vec::new();

    // Surface × surface
    if !pa.polys.is_empty() && !pb.polys.is_empty() {
        let mpa = MultiPolygon::new(pa.polys.clone());
        let mpb = MultiPolygon::new(pb.polys.clone());
        let inter = mpa.intersection(&mpb);
        out_polys.extend(inter.0.into_iter().filter(|p| p.exterior().0.len() >= 4));
    }

    // Ligne × surface, dans les deux sens
    if !pa.lines.is_empty() && !pb.polys.is_empty() {
        let mpb = MultiPolygon::new(pb.polys.clone());
        let clipped = mpb.clip(&MultiLineString::new(pa.lines.clone()), false);
        out_lines.extend(clipped.0.into_iter().filter(|ls| ls.0.len() >= 2));
    }
    if !pb.lines.is_empty() && !pa.polys.is_empty() {
        let mpa = MultiPolygon::new(pa.polys.clone());
        let clipped = mpa.clip(&MultiLineString::new(pb.lines.clone()), false);
        out_lines.extend(clipped.0.into_iter().filter(|ls| ls.0.len() >= 2));
    }

    // Ligne × ligne : croisements propres et recouvrements colinéaires.
    // Un simple contact d'extrémités n'est pas retenu.
    for la in &pa.lines {
        for lb in &pb.lines {
            for sa in la.lines() {
                for sb in lb.lines() {
                    match line_intersection(sa, sb) {
                        Some(LineIntersection::SinglePoint {
                            intersection,
                            is_proper: true,
                        }) => out_points.push(Point::from(intersection)),
                        Some(LineIntersection::Collinear { intersection }) => {
                            if intersection.start != intersection.end {
                                out_lines.push(LineString::from(vec![
                                    intersection.start,
                                    intersection.end,
                                ]));
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    // Points contre l'autre géométrie entière
    for p in &pa.points {
        if p.intersects(b) {
            out_points.push(*p);
        }
    }
    for p in &pb.points {
        if p.intersects(a) {
            out_points.push(*p);
        }
    }
    out_points.dedup_by(|x, y| x == y);

    assemble(out_points, out_lines, out_polys)
}

/// Réassemble les primitives en une géométrie normalisée
fn assemble(
    points: Vec<Point<f64>>,
    lines: Vec<LineString<f64>>,
    polys: Vec<Polygon<f64>>,
) -> Option<Geometry<f64>> {
    let mut parts: Vec<Geometry<f64>> = Vec::new();

    match polys.len() {
        0 => {}
        1 => parts.push(Geometry::Polygon(polys.into_iter().next().unwrap())),
        _ => parts.push(Geometry::MultiPolygon(MultiPolygon::new(polys))),
    }
    match lines.len() {
        0 => {}
        1 => parts.push(Geometry::LineString(lines.into_iter().next().unwrap())),
        _ => parts.push(Geometry::MultiLineString(MultiLineString::new(lines))),
    }
    match points.len() {
        0 => {}
        1 => parts.push(Geometry::Point(points.into_iter().next().unwrap())),
        _ => parts.push(Geometry::MultiPoint(MultiPoint::new(points))),
    }

    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(Geometry::GeometryCollection(GeometryCollection::from(
            parts,
        ))),
    }
}

/// Tampon mince autour d'une géométrie linéaire.
///
/// Arithmétique de coordonnées pure : un rectangle par segment plus un
/// carré par sommet. L'union n'est pas calculée, les prédicats spatiaux
/// se comportent pareil sur le MultiPolygon de morceaux.
pub fn buffer_lines(geom: &Geometry<f64>, radius: f64) -> MultiPolygon<f64> {
    let prims = primitives(geom);
    let mut polys: Vec<Polygon<f64>> = Vec::new();

    for line in &prims.lines {
        for seg in line.lines() {
            let dx = seg.end.x - seg.start.x;
            let dy = seg.end.y - seg.start.y;
            let len = (dx * dx + dy * dy).sqrt();
            if len == 0.0 {
                continue;
            }
            // Normale unitaire au segment, mise à l'échelle du rayon
            let nx = -dy / len * radius;
            let ny = dx / len * radius;
            polys.push(Polygon::new(
                LineString::from(vec![
                    Coord {
                        x: seg.start.x + nx,
                        y: seg.start.y + ny,
                    },
                    Coord {
                        x: seg.end.x + nx,
                        y: seg.end.y + ny,
                    },
                    Coord {
                        x: seg.end.x - nx,
                        y: seg.end.y - ny,
                    },
                    Coord {
                        x: seg.start.x - nx,
                        y: seg.start.y - ny,
                    },
                    Coord {
                        x: seg.start.x + nx,
                        y: seg.start.y + ny,
                    },
                ]),
                vec![],
            ));
        }
        // Carrés aux sommets pour couvrir les jonctions entre segments
        for c in &line.0 {
            polys.push(Polygon::new(
                LineString::from(vec![
                    Coord {
                        x: c.x - radius,
                        y: c.y - radius,
                    },
                    Coord {
                        x: c.x + radius,
                        y: c.y - radius,
                    },
                    Coord {
                        x: c.x + radius,
                        y: c.y + radius,
                    },
                    Coord {
                        x: c.x - radius,
                        y: c.y + radius,
                    },
                    Coord {
                        x: c.x - radius,
                        y: c.y - radius,
                    },
                ]),
                vec![],
            ));
        }
    }

    MultiPolygon::new(polys)
}
