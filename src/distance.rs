//! Precomputed great-circle distances between every location of an instance.

use crate::error::{Result, SolverError};
use crate::locations::{Coordinates, EntityId};
use std::collections::HashMap;
use std::fmt;

/// Mean earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LocationKind {
    Job,
    Store,
    Deliverer,
}

/// Identity of a location in the distance table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationKey {
    pub kind: LocationKind,
    pub id: EntityId,
}

impl LocationKey {
    pub fn new(kind: LocationKind, id: EntityId) -> Self {
        LocationKey { kind, id }
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            LocationKind::Job => "job",
            LocationKind::Store => "store",
            LocationKind::Deliverer => "deliverer",
        };
        write!(f, "{}#{}", kind, self.id)
    }
}

/// Great-circle distance in kilometers between two points given in degrees.
pub fn haversine(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lon1) = (a.latitude.to_radians(), a.longitude.to_radians());
    let (lat2, lon2) = (b.latitude.to_radians(), b.longitude.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push antipodal points a hair above 1.
    2.0 * h.clamp(0.0, 1.0).sqrt().asin() * EARTH_RADIUS_KM
}

/// Square, symmetric distance matrix keyed by [`LocationKey`].
#[derive(Debug, Clone, Default)]
pub struct DistanceTable {
    index: HashMap<LocationKey, usize>,
    matrix: Vec<Vec<f64>>,
}

impl DistanceTable {
    /// Computes all pairwise distances eagerly.
    ///
    /// A key that appears twice keeps its first coordinates.
    pub fn build<I>(locations: I) -> Self
    where
        I: IntoIterator<Item = (LocationKey, Coordinates)>,
    {
        let mut index = HashMap::new();
        let mut coords = Vec::new();
        for (key, c) in locations {
            if index.contains_key(&key) {
                log::warn!("Location {} registered twice, keeping the first one", key);
                continue;
            }
            index.insert(key, coords.len());
            coords.push(c);
        }

        let n = coords.len();
        let mut matrix = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i + 1..n {
                let d = haversine(coords[i], coords[j]);
                matrix[i][j] = d;
                matrix[j][i] = d;
            }
        }

        DistanceTable { index, matrix }
    }

    /// Distance in kilometers between two registered locations.
    #[inline]
    pub fn distance(&self, a: LocationKey, b: LocationKey) -> Result<f64> {
        let i = self.slot(a)?;
        let j = self.slot(b)?;
        Ok(self.matrix[i][j])
    }

    pub fn contains(&self, key: LocationKey) -> bool {
        self.index.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.matrix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    /// Every distance between distinct locations, each pair once.
    pub fn pairwise(&self) -> impl Iterator<Item = f64> + '_ {
        let n = self.matrix.len();
        (0..n).flat_map(move |i| (i + 1..n).map(move |j| self.matrix[i][j]))
    }

    fn slot(&self, key: LocationKey) -> Result<usize> {
        self.index.get(&key).copied().ok_or(SolverError::UnknownEntity(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(kind: LocationKind, id: EntityId) -> LocationKey {
        LocationKey::new(kind, id)
    }

    fn sample_table() -> DistanceTable {
        DistanceTable::build(vec![
            (key(LocationKind::Deliverer, 1), Coordinates::new(52.37, 4.89)),
            (key(LocationKind::Store, 1), Coordinates::new(52.09, 5.12)),
            (key(LocationKind::Job, 1), Coordinates::new(51.92, 4.48)),
            (key(LocationKind::Job, 2), Coordinates::new(52.37, 4.89)),
        ])
    }

    #[test]
    fn test_identical_points_are_zero_apart() {
        let p = Coordinates::new(48.85, 2.35);
        assert_eq!(haversine(p, p), 0.0);
    }

    #[test]
    fn test_antipodal_points() {
        let d = haversine(Coordinates::new(0.0, 0.0), Coordinates::new(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
        assert!((d - 20015.0).abs() < 1.0);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = haversine(Coordinates::new(0.0, 0.0), Coordinates::new(1.0, 0.0));
        assert!((d - 111.195).abs() < 0.01);
    }

    #[test]
    fn test_table_is_symmetric_with_zero_diagonal() {
        let table = sample_table();
        let keys: Vec<LocationKey> = table.index.keys().copied().collect();
        for &a in &keys {
            assert_eq!(table.distance(a, a).unwrap(), 0.0);
            for &b in &keys {
                let ab = table.distance(a, b).unwrap();
                assert_eq!(ab, table.distance(b, a).unwrap());
                assert!(ab >= 0.0);
            }
        }
    }

    #[test]
    fn test_ids_are_scoped_by_kind() {
        let table = sample_table();
        // Job 2 sits on the deliverer, store 1 does not.
        let d_job = table.distance(key(LocationKind::Deliverer, 1), key(LocationKind::Job, 2)).unwrap();
        let d_store = table.distance(key(LocationKind::Deliverer, 1), key(LocationKind::Store, 1)).unwrap();
        assert_eq!(d_job, 0.0);
        assert!(d_store > 30.0);
    }

    #[test]
    fn test_unknown_entity() {
        let table = sample_table();
        let missing = key(LocationKind::Store, 99);
        match table.distance(missing, key(LocationKind::Job, 1)) {
            Err(SolverError::UnknownEntity(k)) => assert_eq!(k, missing),
            other => panic!("expected UnknownEntity, got {:?}", other),
        }
    }

    #[test]
    fn test_pairwise_count() {
        let table = sample_table();
        assert_eq!(table.len(), 4);
        assert_eq!(table.pairwise().count(), 6);
    }
}
