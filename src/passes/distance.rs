/// Angular separation in degrees between two az/el pointings.
///
/// Uses the haversine great-circle formula on the unit sphere, so azimuth
/// wraparound needs no special casing: `distance(350, 0, 10, 0) == 20`.
pub fn distance(az1: f64, el1: f64, az2: f64, el2: f64) -> f64 {
    let (az1, el1, az2, el2) = (
        az1.to_radians(),
        el1.to_radians(),
        az2.to_radians(),
        el2.to_radians(),
    );
    let half_del = ((el2 - el1) / 2.0).sin();
    let half_daz = ((az2 - az1) / 2.0).sin();
    let a = half_del * half_del + el1.cos() * el2.cos() * half_daz * half_daz;
    (2.0 * a.sqrt().min(1.0).asin()).to_degrees()
}
