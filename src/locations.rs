//! Entity model for the delivery problem.
//!
//! Jobs (drop-offs), stores (pickups) and the deliverer are immutable once an
//! instance is loaded. Tours never hold entities directly; they hold [`Stop`]
//! values that name an entity by id, so copying a tour only copies ids.

use crate::distance::{LocationKey, LocationKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier shared by jobs, stores and deliverers. Ids are only unique
/// within one entity kind.
pub type EntityId = u64;

/// A point on the earth in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Coordinates { latitude, longitude }
    }
}

/// Half-open time interval `[start, end)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        TimeWindow { start, end }
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }
}

/// Anything that occupies a position in the distance table.
pub trait Located {
    fn key(&self) -> LocationKey;
    fn coordinates(&self) -> Coordinates;
}

/// A delivery to a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: EntityId,
    pub fulfillment_id: String,
    pub label: String,
    pub location: Coordinates,
    pub delivery_time_window: TimeWindow,
    /// Id of the store the goods are picked up at.
    pub store_id: EntityId,
    /// Opening hours of the origin store, when the instance declares them.
    pub store_time_window: Option<TimeWindow>,
    pub expected_eta: Option<f64>,
    pub pickup_time: Option<f64>,
    pub status: Option<String>,
    pub customer_id: Option<String>,
    pub address: Option<String>,
}

impl Job {
    /// Job with only the fields the solver reads; metadata stays empty.
    pub fn new(
        id: EntityId,
        fulfillment_id: impl Into<String>,
        label: impl Into<String>,
        location: Coordinates,
        delivery_time_window: TimeWindow,
        store_id: EntityId,
    ) -> Self {
        Job {
            id,
            fulfillment_id: fulfillment_id.into(),
            label: label.into(),
            location,
            delivery_time_window,
            store_id,
            store_time_window: None,
            expected_eta: None,
            pickup_time: None,
            status: None,
            customer_id: None,
            address: None,
        }
    }

    #[inline]
    pub fn time_start(&self) -> f64 {
        self.delivery_time_window.start
    }

    #[inline]
    pub fn time_end(&self) -> f64 {
        self.delivery_time_window.end
    }
}

impl Located for Job {
    fn key(&self) -> LocationKey {
        LocationKey::new(LocationKind::Job, self.id)
    }

    fn coordinates(&self) -> Coordinates {
        self.location
    }
}

/// A pickup location. Equality compares id, label, coordinates and address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: EntityId,
    pub label: String,
    pub location: Coordinates,
    pub address: String,
}

impl Store {
    pub fn new(id: EntityId, label: impl Into<String>, location: Coordinates, address: impl Into<String>) -> Self {
        Store {
            id,
            label: label.into(),
            location,
            address: address.into(),
        }
    }
}

impl Located for Store {
    fn key(&self) -> LocationKey {
        LocationKey::new(LocationKind::Store, self.id)
    }

    fn coordinates(&self) -> Coordinates {
        self.location
    }
}

/// The single driver of a route. Its position is the implicit start and end
/// of every tour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deliverer {
    pub id: EntityId,
    pub label: String,
    pub location: Coordinates,
    pub shift: TimeWindow,
    pub capacity: Option<f64>,
    pub vehicle_type: Option<String>,
}

impl Deliverer {
    pub fn new(id: EntityId, label: impl Into<String>, location: Coordinates, shift: TimeWindow) -> Self {
        Deliverer {
            id,
            label: label.into(),
            location,
            shift,
            capacity: None,
            vehicle_type: None,
        }
    }

    #[inline]
    pub fn shift_start(&self) -> f64 {
        self.shift.start
    }
}

impl Located for Deliverer {
    fn key(&self) -> LocationKey {
        LocationKey::new(LocationKind::Deliverer, self.id)
    }

    fn coordinates(&self) -> Coordinates {
        self.location
    }
}

/// A store occurrence inside a tour.
///
/// With time windows a physical store is visited once per job it serves; the
/// `job` field names that job. The canonical [`Store`] never carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreVisit {
    pub store: EntityId,
    pub job: Option<EntityId>,
}

/// One position of a tour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stop {
    Job(EntityId),
    Store(StoreVisit),
}

impl Stop {
    /// Plain store visit, as used by tours without time windows.
    pub fn store(id: EntityId) -> Self {
        Stop::Store(StoreVisit { store: id, job: None })
    }

    /// Store visit dedicated to one job.
    pub fn store_for(id: EntityId, job: EntityId) -> Self {
        Stop::Store(StoreVisit { store: id, job: Some(job) })
    }

    pub fn id(&self) -> EntityId {
        match self {
            Stop::Job(id) => *id,
            Stop::Store(visit) => visit.store,
        }
    }

    pub fn is_job(&self) -> bool {
        matches!(self, Stop::Job(_))
    }

    pub fn is_store(&self) -> bool {
        matches!(self, Stop::Store(_))
    }

    /// Distance-table key of the physical location behind the stop.
    pub fn key(&self) -> LocationKey {
        match self {
            Stop::Job(id) => LocationKey::new(LocationKind::Job, *id),
            Stop::Store(visit) => LocationKey::new(LocationKind::Store, visit.store),
        }
    }

    /// The job attached to a store visit, if any.
    pub fn attached_job(&self) -> Option<EntityId> {
        match self {
            Stop::Job(_) => None,
            Stop::Store(visit) => visit.job,
        }
    }
}

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stop::Job(id) => write!(f, "Job({})", id),
            Stop::Store(StoreVisit { store, job: None }) => write!(f, "Store({})", store),
            Stop::Store(StoreVisit { store, job: Some(job) }) => {
                write!(f, "Store({} for job {})", store, job)
            }
        }
    }
}

/// Pairing of a pickup store with the job it supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub pickup: EntityId,
    pub drop_off: EntityId,
}

impl Request {
    /// The two stops a time-window tour needs for this request.
    pub fn stops(&self) -> [Stop; 2] {
        [Stop::store_for(self.pickup, self.drop_off), Stop::Job(self.drop_off)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_equality_ignores_visits() {
        let a = Store::new(1, "Bakery", Coordinates::new(52.0, 4.0), "Main st 1");
        let b = a.clone();
        assert_eq!(a, b);

        let moved = Store { location: Coordinates::new(52.1, 4.0), ..a.clone() };
        assert_ne!(a, moved);

        // Visits of the same store for different jobs are distinct stops
        // while sharing one distance-table location.
        let v1 = Stop::store_for(1, 10);
        let v2 = Stop::store_for(1, 11);
        assert_ne!(v1, v2);
        assert_eq!(v1.key(), v2.key());
        assert_eq!(v1.key(), a.key());
    }

    #[test]
    fn test_stop_accessors() {
        let job = Stop::Job(5);
        assert!(job.is_job());
        assert_eq!(job.id(), 5);
        assert_eq!(job.attached_job(), None);

        let visit = Stop::store_for(2, 5);
        assert!(visit.is_store());
        assert_eq!(visit.id(), 2);
        assert_eq!(visit.attached_job(), Some(5));
        assert_eq!(visit.to_string(), "Store(2 for job 5)");
    }

    #[test]
    fn test_request_stops() {
        let request = Request { pickup: 3, drop_off: 9 };
        assert_eq!(request.stops(), [Stop::store_for(3, 9), Stop::Job(9)]);
    }

    #[test]
    fn test_time_window_is_half_open() {
        let tw = TimeWindow::new(10.0, 20.0);
        assert!(tw.contains(10.0));
        assert!(!tw.contains(20.0));
    }
}
