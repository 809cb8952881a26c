//! Projection Web Mercator (EPSG:3857)

use anyhow::Result;

use super::ellipsoid::WGS84;
use super::Geographic;

/// Convertit Web Mercator vers coordonnées géographiques
pub fn web_mercator_to_geographic(x: f64, y: f64) -> Result<Geographic> {
    let r = WGS84::A;

    let lon = x / r;
    let lat = 2.0 * (y / r).exp().atan() - std::f64::consts::FRAC_PI_2;

    Ok(Geographic::new(lon, lat))
}

/// Convertit coordonnées géographiques vers Web Mercator
pub fn geographic_to_web_mercator(geo: Geographic) -> Result<(f64, f64)> {
    let r = WGS84::A;

    // Limiter la latitude pour éviter l'infini
    let lat = geo.lat.clamp(-85.0_f64.to_radians(), 85.0_f64.to_radians());

    let x = r * geo.lon;
    let y = r * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();

    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let geo = Geographic::from_degrees(174.78, -41.29);
        let (x, y) = geographic_to_web_mercator(geo).unwrap();
        let geo2 = web_mercator_to_geographic(x, y).unwrap();
        let (lon, lat) = geo2.to_degrees();

        assert!((lon - 174.78).abs() < 0.001, "lon={}", lon);
        assert!((lat - (-41.29)).abs() < 0.001, "lat={}", lat);
    }
}
