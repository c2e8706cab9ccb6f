use std::fmt;

use crate::predict::EcefPosition;
use crate::utils::coords;

// WGS-84
const EARTH_EQUATORIAL_RADIUS_KM: f64 = 6378.137;
const EARTH_ECCENTRICITY_SQ: f64 = 0.006_694_379_990_14;

/// Observer location on the WGS-84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundStation {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
}

impl GroundStation {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_m: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            altitude_m,
        }
    }

    /// Parses `"lat, lon"` as found in the config file.
    pub fn from_coordinates(coordinates: &str, altitude_m: Option<f64>) -> Option<Self> {
        let parts: Vec<_> = coordinates.split(',').map(|s| s.trim()).collect();
        if parts.len() != 2 {
            return None;
        }
        let lat: f64 = parts[0].parse().ok()?;
        let lon: f64 = parts[1].parse().ok()?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=360.0).contains(&lon) {
            return None;
        }
        Some(Self::new(lat, lon, altitude_m.unwrap_or(0.0)))
    }

    pub fn lat_rad(&self) -> f64 {
        self.latitude_deg.to_radians()
    }

    pub fn lon_rad(&self) -> f64 {
        self.longitude_deg.to_radians()
    }

    pub fn position_ecef_km(&self) -> [f64; 3] {
        let lat = self.lat_rad();
        let lon = self.lon_rad();
        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let n = EARTH_EQUATORIAL_RADIUS_KM / (1.0 - EARTH_ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt();
        let alt_km = self.altitude_m / 1000.0;
        [
            (n + alt_km) * cos_lat * lon.cos(),
            (n + alt_km) * cos_lat * lon.sin(),
            (n * (1.0 - EARTH_ECCENTRICITY_SQ) + alt_km) * sin_lat,
        ]
    }

    /// Look angles towards `position`: azimuth in [0, 360), elevation in [-90, 90].
    pub fn azimuth_elevation_deg(&self, position: &EcefPosition) -> (f64, f64) {
        let station = self.position_ecef_km();
        let dr = [
            position.0[0] - station[0],
            position.0[1] - station[1],
            position.0[2] - station[2],
        ];
        let range_km = (dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2]).sqrt();

        let (east, north, up) = ecef_to_enu(dr, self.lat_rad(), self.lon_rad());
        let mut azimuth = east.atan2(north).to_degrees().rem_euclid(360.0);
        if azimuth >= 360.0 {
            azimuth -= 360.0;
        }
        let elevation = if range_km > 0.0 {
            (up / range_km).clamp(-1.0, 1.0).asin().to_degrees()
        } else {
            0.0
        };
        (azimuth, elevation)
    }
}

impl fmt::Display for GroundStation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&coords(
            self.latitude_deg,
            self.longitude_deg,
            Some(self.altitude_m),
        ))
    }
}

pub fn ecef_to_enu(dr: [f64; 3], lat_rad: f64, lon_rad: f64) -> (f64, f64, f64) {
    let sin_lat = lat_rad.sin();
    let cos_lat = lat_rad.cos();
    let sin_lon = lon_rad.sin();
    let cos_lon = lon_rad.cos();

    let east = -sin_lon * dr[0] + cos_lon * dr[1];
    let north = -sin_lat * cos_lon * dr[0] - sin_lat * sin_lon * dr[1] + cos_lat * dr[2];
    let up = cos_lat * cos_lon * dr[0] + cos_lat * sin_lon * dr[1] + sin_lat * dr[2];
    (east, north, up)
}
