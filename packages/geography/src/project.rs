//! WGS84 to Mexico ITRF2008 / LCC forward projection.
//!
//! Spatial predicates and area sums require planar metric coordinates,
//! so geographic longitude/latitude inputs are projected to EPSG:6372
//! before they reach the overlay engine. The projection is a Lambert
//! Conformal Conic with two standard parallels on the GRS80 ellipsoid
//! (Snyder 1987, eqs. 15-1 through 15-10). Only the forward direction
//! is needed; boundary artifacts arrive already projected.

use std::f64::consts::FRAC_PI_4;

/// GRS80 semi-major axis in metres.
const SEMI_MAJOR: f64 = 6_378_137.0;

/// GRS80 inverse flattening.
const INV_FLATTENING: f64 = 298.257_222_101;

/// First standard parallel, degrees.
const STD_PARALLEL_1: f64 = 17.5;

/// Second standard parallel, degrees.
const STD_PARALLEL_2: f64 = 29.5;

/// Latitude of projection origin, degrees.
const LAT_ORIGIN: f64 = 12.0;

/// Central meridian, degrees.
const LON_ORIGIN: f64 = -102.0;

/// False easting, metres.
const FALSE_EASTING: f64 = 2_500_000.0;

/// False northing, metres.
const FALSE_NORTHING: f64 = 0.0;

/// Projects a WGS84 longitude/latitude pair (degrees) to EPSG:6372
/// easting/northing (metres).
#[must_use]
pub fn wgs84_to_mexico_lcc(lon: f64, lat: f64) -> (f64, f64) {
    let f = 1.0 / INV_FLATTENING;
    let e_sq = f.mul_add(-f, 2.0 * f);
    let e = e_sq.sqrt();

    let m = |phi: f64| phi.cos() / e_sq.mul_add(-phi.sin().powi(2), 1.0).sqrt();
    let t = |phi: f64| {
        let es = e * phi.sin();
        (FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
    };

    let phi1 = STD_PARALLEL_1.to_radians();
    let phi2 = STD_PARALLEL_2.to_radians();
    let phi0 = LAT_ORIGIN.to_radians();

    let n = (m(phi1).ln() - m(phi2).ln()) / (t(phi1).ln() - t(phi2).ln());
    let big_f = m(phi1) / (n * t(phi1).powf(n));
    let rho0 = SEMI_MAJOR * big_f * t(phi0).powf(n);

    let phi = lat.to_radians();
    let rho = SEMI_MAJOR * big_f * t(phi).powf(n);
    let theta = n * (lon - LON_ORIGIN).to_radians();

    (
        rho.mul_add(theta.sin(), FALSE_EASTING),
        FALSE_NORTHING + rho.mul_add(-theta.cos(), rho0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: (f64, f64), expected: (f64, f64)) {
        assert!(
            (actual.0 - expected.0).abs() < 0.01 && (actual.1 - expected.1).abs() < 0.01,
            "got {actual:?}, expected {expected:?}"
        );
    }

    #[test]
    fn projection_origin_maps_to_false_offsets() {
        assert_close(
            wgs84_to_mexico_lcc(LON_ORIGIN, LAT_ORIGIN),
            (FALSE_EASTING, FALSE_NORTHING),
        );
    }

    #[test]
    fn mexico_city_reference_point() {
        assert_close(
            wgs84_to_mexico_lcc(-99.1332, 19.4326),
            (2_800_163.325_8, 829_057.519_4),
        );
    }

    #[test]
    fn monterrey_reference_point() {
        assert_close(
            wgs84_to_mexico_lcc(-100.3161, 25.6866),
            (2_668_225.457_8, 1_516_270.507_2),
        );
    }

    #[test]
    fn east_of_central_meridian_increases_easting() {
        let (west, _) = wgs84_to_mexico_lcc(-103.0, 20.0);
        let (east, _) = wgs84_to_mexico_lcc(-101.0, 20.0);
        assert!(west < FALSE_EASTING);
        assert!(east > FALSE_EASTING);
    }
}
