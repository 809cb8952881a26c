//! Reprojection légère en Rust pur (sans dépendances externes)
//!
//! Couvre les besoins du calcul de surface : amener une géométrie
//! d'erreur dans un CRS métrique avant de mesurer son aire.
//!
//! Sources supportées :
//! - WGS84 (EPSG:4326)
//! - Web Mercator (EPSG:3857)
//! - NZTM 2000 (EPSG:2193)
//! - Zones UTM (EPSG:326xx / 327xx)
//!
//! Cibles supportées :
//! - WGS84 (EPSG:4326)
//! - NZTM 2000 et zones UTM

mod ellipsoid;
mod mercator;
mod tmerc;

pub use ellipsoid::{GRS80, WGS84};

use anyhow::{bail, Result};
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convertit en degrés
    pub fn to_degrees(self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }

    /// Crée depuis des degrés
    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon: lon_deg.to_radians(),
            lat: lat_deg.to_radians(),
        }
    }
}

/// Reprojection entre deux codes EPSG supportés
pub struct Reprojector {
    source_epsg: u32,
    target_epsg: u32,
}

impl Reprojector {
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        if !Self::is_supported_source(source_epsg) {
            bail!(
                "EPSG:{} not supported as source. Supported: 4326, 3857, 2193, UTM zones",
                source_epsg
            );
        }
        if !Self::is_supported_target(target_epsg) {
            bail!(
                "EPSG:{} not supported as target. Supported: 4326, 2193, UTM zones",
                target_epsg
            );
        }

        Ok(Self {
            source_epsg,
            target_epsg,
        })
    }

    pub fn is_supported_source(epsg: u32) -> bool {
        epsg == 4326 || epsg == 3857 || tmerc::params_for_epsg(epsg).is_some()
    }

    pub fn is_supported_target(epsg: u32) -> bool {
        epsg == 4326 || tmerc::params_for_epsg(epsg).is_some()
    }

    /// Transforme un point (x, y) de la source vers la cible
    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if self.source_epsg == self.target_epsg {
            return Ok((x, y));
        }
        let geo = self.source_to_geographic(x, y)?;
        self.geographic_to_target(geo)
    }

    fn source_to_geographic(&self, x: f64, y: f64) -> Result<Geographic> {
        match self.source_epsg {
            4326 => Ok(Geographic::from_degrees(x, y)),
            3857 => mercator::web_mercator_to_geographic(x, y),
            epsg => {
                let params = tmerc::params_for_epsg(epsg)
                    .ok_or_else(|| anyhow::anyhow!("EPSG:{} not supported", epsg))?;
                tmerc::projected_to_geographic(x, y, &params)
            }
        }
    }

    fn geographic_to_target(&self, geo: Geographic) -> Result<(f64, f64)> {
        match self.target_epsg {
            4326 => Ok(geo.to_degrees()),
            epsg => {
                let params = tmerc::params_for_epsg(epsg)
                    .ok_or_else(|| anyhow::anyhow!("EPSG:{} not supported", epsg))?;
                tmerc::geographic_to_projected(geo, &params)
            }
        }
    }

    fn transform_coords(&self, ls: &LineString) -> Result<LineString> {
        let coords: Result<Vec<Coord>> = ls
            .coords()
            .map(|c| {
                let (x, y) = self.transform_point(c.x, c.y)?;
                Ok(Coord { x, y })
            })
            .collect();
        Ok(LineString::new(coords?))
    }

    fn transform_polygon(&self, poly: &Polygon) -> Result<Polygon> {
        let exterior = self.transform_coords(poly.exterior())?;
        let interiors: Result<Vec<LineString>> = poly
            .interiors()
            .iter()
            .map(|ring| self.transform_coords(ring))
            .collect();
        Ok(Polygon::new(exterior, interiors?))
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        match geom {
            Geometry::Point(p) => {
                let (x, y) = self.transform_point(p.x(), p.y())?;
                Ok(Geometry::Point(Point::new(x, y)))
            }
            Geometry::Line(line) => {
                let (x0, y0) = self.transform_point(line.start.x, line.start.y)?;
                let (x1, y1) = self.transform_point(line.end.x, line.end.y)?;
                Ok(Geometry::Line(geo::Line::new(
                    Coord { x: x0, y: y0 },
                    Coord { x: x1, y: y1 },
                )))
            }
            Geometry::LineString(ls) => Ok(Geometry::LineString(self.transform_coords(ls)?)),
            Geometry::Polygon(poly) => Ok(Geometry::Polygon(self.transform_polygon(poly)?)),
            Geometry::MultiPoint(mp) => {
                let points: Result<Vec<Point>> = mp
                    .iter()
                    .map(|p| {
                        let (x, y) = self.transform_point(p.x(), p.y())?;
                        Ok(Point::new(x, y))
                    })
                    .collect();
                Ok(Geometry::MultiPoint(MultiPoint::new(points?)))
            }
            Geometry::MultiLineString(mls) => {
                let lines: Result<Vec<LineString>> =
                    mls.iter().map(|ls| self.transform_coords(ls)).collect();
                Ok(Geometry::MultiLineString(MultiLineString::new(lines?)))
            }
            Geometry::MultiPolygon(mp) => {
                let polys: Result<Vec<Polygon>> =
                    mp.iter().map(|poly| self.transform_polygon(poly)).collect();
                Ok(Geometry::MultiPolygon(MultiPolygon::new(polys?)))
            }
            Geometry::GeometryCollection(gc) => {
                let members: Result<Vec<Geometry>> =
                    gc.iter().map(|g| self.transform_geometry(g)).collect();
                Ok(Geometry::GeometryCollection(geo::GeometryCollection::from(
                    members?,
                )))
            }
            _ => bail!("Unsupported geometry type for reprojection"),
        }
    }
}
