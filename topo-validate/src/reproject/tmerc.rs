//! Projection Mercator transverse (NZTM et zones UTM)
//!
//! Formules en séries de Snyder, identiques dans les deux sens à celles
//! des implémentations de référence. NZTM (EPSG:2193) utilise GRS80,
//! les zones UTM (EPSG:326xx/327xx) utilisent WGS84.

use anyhow::Result;

use super::ellipsoid::{GRS80, WGS84};
use super::Geographic;

/// Paramètres d'une projection Mercator transverse
#[derive(Debug, Clone, Copy)]
pub struct TmercParams {
    /// Demi-grand axe de l'ellipsoïde
    pub a: f64,
    /// Première excentricité au carré
    pub e2: f64,
    /// Deuxième excentricité au carré
    pub ep2: f64,
    /// Facteur d'échelle au méridien central
    pub k0: f64,
    /// Longitude du méridien central en radians
    pub lon0: f64,
    /// False easting
    pub fe: f64,
    /// False northing
    pub fn_: f64,
}

/// Paramètres de la projection pour un code EPSG connu
pub fn params_for_epsg(epsg: u32) -> Option<TmercParams> {
    match epsg {
        // NZTM 2000
        2193 => Some(TmercParams {
            a: GRS80::A,
            e2: GRS80::E2,
            ep2: GRS80::EP2,
            k0: 0.9996,
            lon0: 173.0_f64.to_radians(),
            fe: 1_600_000.0,
            fn_: 10_000_000.0,
        }),
        // UTM nord, zones 1 à 60
        32601..=32660 => Some(utm_params(epsg - 32600, false)),
        // UTM sud, zones 1 à 60
        32701..=32760 => Some(utm_params(epsg - 32700, true)),
        _ => None,
    }
}

fn utm_params(zone: u32, south: bool) -> TmercParams {
    TmercParams {
        a: WGS84::A,
        e2: WGS84::E2,
        ep2: WGS84::EP2,
        k0: 0.9996,
        lon0: ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians(),
        fe: 500_000.0,
        fn_: if south { 10_000_000.0 } else { 0.0 },
    }
}

/// Longueur d'arc de méridien de l'équateur à la latitude donnée
fn meridian_arc(lat: f64, a: f64, e2: f64) -> f64 {
    a * ((1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0) * lat
        - (3.0 * e2 / 8.0 + 3.0 * e2.powi(2) / 32.0 + 45.0 * e2.powi(3) / 1024.0)
            * (2.0 * lat).sin()
        + (15.0 * e2.powi(2) / 256.0 + 45.0 * e2.powi(3) / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e2.powi(3) / 3072.0) * (6.0 * lat).sin())
}

/// Convertit des coordonnées géographiques en coordonnées projetées
pub fn geographic_to_projected(geo: Geographic, p: &TmercParams) -> Result<(f64, f64)> {
    let sin_lat = geo.lat.sin();
    let cos_lat = geo.lat.cos();
    let tan_lat = geo.lat.tan();

    let n = p.a / (1.0 - p.e2 * sin_lat.powi(2)).sqrt();
    let t = tan_lat.powi(2);
    let c = p.ep2 * cos_lat.powi(2);
    let a_coef = (geo.lon - p.lon0) * cos_lat;
    let m = meridian_arc(geo.lat, p.a, p.e2);

    let x = p.fe
        + p.k0
            * n
            * (a_coef
                + (1.0 - t + c) * a_coef.powi(3) / 6.0
                + (5.0 - 18.0 * t + t.powi(2) + 72.0 * c - 58.0 * p.ep2) * a_coef.powi(5) / 120.0);

    let y = p.fn_
        + p.k0
            * (m + n
                * tan_lat
                * (a_coef.powi(2) / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c.powi(2)) * a_coef.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t.powi(2) + 600.0 * c - 330.0 * p.ep2)
                        * a_coef.powi(6)
                        / 720.0));

    Ok((x, y))
}

/// Convertit des coordonnées projetées en coordonnées géographiques
pub fn projected_to_geographic(x: f64, y: f64, p: &TmercParams) -> Result<Geographic> {
    let x = x - p.fe;
    let y = y - p.fn_;

    // Latitude du pied de la perpendiculaire
    let m = y / p.k0;
    let mu = m
        / (p.a * (1.0 - p.e2 / 4.0 - 3.0 * p.e2.powi(2) / 64.0 - 5.0 * p.e2.powi(3) / 256.0));

    let e1 = (1.0 - (1.0 - p.e2).sqrt()) / (1.0 + (1.0 - p.e2).sqrt());

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let n1 = p.a / (1.0 - p.e2 * sin_phi1.powi(2)).sqrt();
    let t1 = tan_phi1.powi(2);
    let c1 = p.ep2 * cos_phi1.powi(2);
    let r1 = p.a * (1.0 - p.e2) / (1.0 - p.e2 * sin_phi1.powi(2)).powf(1.5);
    let d = x / (n1 * p.k0);

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d.powi(2) / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1.powi(2) - 9.0 * p.ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1.powi(2)
                    - 252.0 * p.ep2
                    - 3.0 * c1.powi(2))
                    * d.powi(6)
                    / 720.0);

    let lon = p.lon0
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1.powi(2) + 8.0 * p.ep2 + 24.0 * t1.powi(2))
                * d.powi(5)
                / 120.0)
            / cos_phi1;

    Ok(Geographic::new(lon, lat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nztm_wellington() {
        // Wellington approximativement: 174.777°E, -41.289°S
        // NZTM attendu: E ~1748700, N ~5427900
        let p = params_for_epsg(2193).unwrap();
        let geo = Geographic::from_degrees(174.777, -41.289);
        let (x, y) = geographic_to_projected(geo, &p).unwrap();

        assert!((x - 1_748_700.0).abs() < 5000.0, "x={}", x);
        assert!((y - 5_427_900.0).abs() < 5000.0, "y={}", y);
    }

    #[test]
    fn test_nztm_central_meridian() {
        // Sur le méridien central l'abscisse vaut le false easting
        let p = params_for_epsg(2193).unwrap();
        let geo = Geographic::from_degrees(173.0, -41.0);
        let (x, _) = geographic_to_projected(geo, &p).unwrap();
        assert!((x - 1_600_000.0).abs() < 1e-3, "x={}", x);
    }

    #[test]
    fn test_nztm_roundtrip() {
        let p = params_for_epsg(2193).unwrap();
        let geo = Geographic::from_degrees(172.64, -43.53);
        let (x, y) = geographic_to_projected(geo, &p).unwrap();
        let back = projected_to_geographic(x, y, &p).unwrap();
        let (lon, lat) = back.to_degrees();

        assert!((lon - 172.64).abs() < 1e-6, "lon={}", lon);
        assert!((lat - (-43.53)).abs() < 1e-6, "lat={}", lat);
    }

    #[test]
    fn test_utm_zone_60s_roundtrip() {
        let p = params_for_epsg(32760).unwrap();
        let geo = Geographic::from_degrees(176.2, -38.1);
        let (x, y) = geographic_to_projected(geo, &p).unwrap();
        let back = projected_to_geographic(x, y, &p).unwrap();
        let (lon, lat) = back.to_degrees();

        assert!((lon - 176.2).abs() < 1e-6, "lon={}", lon);
        assert!((lat - (-38.1)).abs() < 1e-6, "lat={}", lat);
    }

    #[test]
    fn test_unknown_epsg_has_no_params() {
        assert!(params_for_epsg(4326).is_none());
        assert!(params_for_epsg(9999).is_none());
    }
}
