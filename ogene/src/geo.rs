use serde::{Deserialize, Serialize};

/// A WGS84 coordinate in degrees. Ranges are not enforced here; callers
/// pass through whatever the participant submitted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

/// Geographic center of a set of coordinates, by averaging their unit
/// vectors on the sphere. Close enough to pick a neighborhood to search,
/// not geodesically exact.
///
/// A single point is returned as-is rather than round-tripped through the
/// trigonometry, so the trivial case carries no floating-point drift.
pub fn centroid(coords: &[LatLng]) -> Option<LatLng> {
    match coords {
        [] => None,
        [only] => Some(*only),
        _ => {
            let mut x = 0.0;
            let mut y = 0.0;
            let mut z = 0.0;

            for coord in coords {
                let latitude = coord.latitude.to_radians();
                let longitude = coord.longitude.to_radians();

                x += latitude.cos() * longitude.cos();
                y += latitude.cos() * longitude.sin();
                z += latitude.sin();
            }

            let total = coords.len() as f64;
            x /= total;
            y /= total;
            z /= total;

            let central_longitude = y.atan2(x);
            let central_latitude = z.atan2((x * x + y * y).sqrt());

            Some(LatLng {
                latitude: central_latitude.to_degrees(),
                longitude: central_longitude.to_degrees(),
            })
        }
    }
}
