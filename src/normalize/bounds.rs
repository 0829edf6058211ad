use serde::Serialize;

use crate::geofile::feature::Coordinates;

/// Latitude/longitude extent of a set of accepted features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl From<&Coordinates> for Bounds {
    fn from(coordinates: &Coordinates) -> Self {
        Self {
            min_lat: coordinates.lat(),
            max_lat: coordinates.lat(),
            min_lng: coordinates.lng(),
            max_lng: coordinates.lng(),
        }
    }
}

impl Bounds {
    /// Smallest bounds containing both `self` and `coordinates`.
    pub fn extended(self, coordinates: &Coordinates) -> Self {
        Self {
            min_lat: self.min_lat.min(coordinates.lat()),
            max_lat: self.max_lat.max(coordinates.lat()),
            min_lng: self.min_lng.min(coordinates.lng()),
            max_lng: self.max_lng.max(coordinates.lng()),
        }
    }

    /// Center of the extent as `(lat, lng)`, e.g. to frame a map view on an import.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Fold `coordinates` into the running accumulator, starting it on the first coordinate.
pub fn accumulate(bounds: Option<Bounds>, coordinates: &Coordinates) -> Option<Bounds> {
    Some(match bounds {
        Some(bounds) => bounds.extended(coordinates),
        None => Bounds::from(coordinates),
    })
}

#[cfg(test)]
mod tests {
    use super::{accumulate, Bounds};
    use crate::geofile::feature::Coordinates;

    #[test]
    fn test_accumulate_bounds() {
        let coordinates = [
            Coordinates::new(10.0, -50.0).unwrap(),
            Coordinates::new(-5.0, -40.0).unwrap(),
            Coordinates::new(2.0, -60.0).unwrap(),
        ];
        let bounds = coordinates.iter().fold(None, accumulate).unwrap();
        assert_eq!(
            Bounds {
                min_lat: -5.0,
                max_lat: 10.0,
                min_lng: -60.0,
                max_lng: -40.0,
            },
            bounds
        );
        assert_eq!((2.5, -50.0), bounds.center());
    }
}
