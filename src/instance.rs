//! Module for loading and representing delivery problem instances.
//!
//! An instance owns every entity, the id lookup tables, the pickup/delivery
//! requests and the distance table. It is built once and only read afterwards,
//! so it can be shared freely between worker threads.

use crate::distance::{DistanceTable, LocationKey, LocationKind};
use crate::error::{Result, SolverError};
use crate::locations::{Coordinates, Deliverer, EntityId, Job, Located, Request, Store, TimeWindow};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// A complete single-driver pickup and delivery instance.
#[derive(Debug, Clone)]
pub struct ProblemInstance {
    /// Name of the instance (file stem when loaded from disk)
    pub name: String,
    jobs: Vec<Job>,
    stores: Vec<Store>,
    deliverer: Deliverer,
    requests: Vec<Request>,
    unmatched_jobs: Vec<EntityId>,
    job_index: HashMap<EntityId, usize>,
    store_index: HashMap<EntityId, usize>,
    distances: DistanceTable,
}

impl ProblemInstance {
    pub fn new(name: impl Into<String>, jobs: Vec<Job>, stores: Vec<Store>, deliverer: Deliverer) -> Self {
        let job_index = index_by_id(jobs.iter().map(|j| j.id), "job");
        let store_index = index_by_id(stores.iter().map(|s| s.id), "store");
        let requests = match_requests(&jobs, &stores);
        let matched: HashSet<EntityId> = requests.iter().map(|r| r.drop_off).collect();
        let unmatched_jobs = jobs.iter().map(|j| j.id).filter(|id| !matched.contains(id)).collect();

        let distances = DistanceTable::build(
            jobs.iter()
                .map(|j| (j.key(), j.coordinates()))
                .chain(stores.iter().map(|s| (s.key(), s.coordinates())))
                .chain(std::iter::once((deliverer.key(), deliverer.coordinates()))),
        );

        ProblemInstance {
            name: name.into(),
            jobs,
            stores,
            deliverer,
            requests,
            unmatched_jobs,
            job_index,
            store_index,
            distances,
        }
    }

    /// Parse an instance from a JSON document with `jobs`, `stores` and
    /// `drivers` arrays.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            log::warn!("Instance file {:?} does not have a .json extension", path);
        }
        let file = File::open(path)?;
        let document: RawDocument = serde_json::from_reader(BufReader::new(file))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        document.into_instance(name)
    }

    pub fn from_json_str(name: impl Into<String>, json: &str) -> Result<Self> {
        let document: RawDocument = serde_json::from_str(json)?;
        document.into_instance(name.into())
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn stores(&self) -> &[Store] {
        &self.stores
    }

    pub fn deliverer(&self) -> &Deliverer {
        &self.deliverer
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn distances(&self) -> &DistanceTable {
        &self.distances
    }

    pub fn job(&self, id: EntityId) -> Result<&Job> {
        self.job_index
            .get(&id)
            .map(|&i| &self.jobs[i])
            .ok_or(SolverError::UnknownEntity(LocationKey::new(LocationKind::Job, id)))
    }

    pub fn store(&self, id: EntityId) -> Result<&Store> {
        self.store_index
            .get(&id)
            .map(|&i| &self.stores[i])
            .ok_or(SolverError::UnknownEntity(LocationKey::new(LocationKind::Store, id)))
    }

    #[inline]
    pub fn distance(&self, a: LocationKey, b: LocationKey) -> Result<f64> {
        self.distances.distance(a, b)
    }

    #[inline]
    pub fn deliverer_key(&self) -> LocationKey {
        self.deliverer.key()
    }

    /// Jobs whose goods are picked up at the given store, in instance order.
    pub fn jobs_for_store(&self, store_id: EntityId) -> impl Iterator<Item = &Job> + '_ {
        self.jobs.iter().filter(move |j| j.store_id == store_id)
    }

    /// Jobs whose declared store is not part of the instance.
    pub fn unmatched_jobs(&self) -> &[EntityId] {
        &self.unmatched_jobs
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let distances: Vec<f64> = self.distances.pairwise().collect();
        let avg_distance = if distances.is_empty() {
            0.0
        } else {
            distances.iter().sum::<f64>() / distances.len() as f64
        };
        let max_distance = distances.iter().cloned().fold(0.0, f64::max);

        InstanceStatistics {
            name: self.name.clone(),
            num_jobs: self.jobs.len(),
            num_stores: self.stores.len(),
            num_requests: self.requests.len(),
            unmatched_jobs: self.unmatched_jobs().len(),
            earliest_window_start: self.jobs.iter().map(|j| j.time_start()).reduce(f64::min),
            latest_window_end: self.jobs.iter().map(|j| j.time_end()).reduce(f64::max),
            shift_start: self.deliverer.shift.start,
            avg_distance,
            max_distance,
        }
    }
}

fn index_by_id(ids: impl Iterator<Item = EntityId>, kind: &str) -> HashMap<EntityId, usize> {
    let mut index = HashMap::new();
    for (i, id) in ids.enumerate() {
        if index.contains_key(&id) {
            log::warn!("Duplicate {} id {}, keeping the first occurrence", kind, id);
            continue;
        }
        index.insert(id, i);
    }
    index
}

/// Pair every job with the first store carrying its declared store id.
fn match_requests(jobs: &[Job], stores: &[Store]) -> Vec<Request> {
    let mut requests = Vec::with_capacity(jobs.len());
    for job in jobs {
        match stores.iter().find(|s| s.id == job.store_id) {
            Some(store) => requests.push(Request { pickup: store.id, drop_off: job.id }),
            None => log::warn!("Job {} refers to unknown store {}", job.id, job.store_id),
        }
    }
    requests
}

/// Statistics about an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub num_jobs: usize,
    pub num_stores: usize,
    pub num_requests: usize,
    pub unmatched_jobs: usize,
    pub earliest_window_start: Option<f64>,
    pub latest_window_end: Option<f64>,
    pub shift_start: f64,
    pub avg_distance: f64,
    pub max_distance: f64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Jobs: {}", self.num_jobs)?;
        writeln!(f, "  Stores: {}", self.num_stores)?;
        writeln!(f, "  Requests: {} ({} unmatched jobs)", self.num_requests, self.unmatched_jobs)?;
        writeln!(f, "  Shift start: {}", self.shift_start)?;
        if let (Some(start), Some(end)) = (self.earliest_window_start, self.latest_window_end) {
            writeln!(f, "  Delivery windows: {} .. {}", start, end)?;
        }
        writeln!(f, "  Avg distance: {:.3} km", self.avg_distance)?;
        writeln!(f, "  Max distance: {:.3} km", self.max_distance)
    }
}

#[derive(Deserialize)]
struct RawDocument {
    jobs: Vec<RawJob>,
    stores: Vec<RawStore>,
    #[serde(alias = "deliverers")]
    drivers: Vec<RawDriver>,
}

/// Ids and labels show up both as numbers and as strings in exports.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawText {
    Text(String),
    Number(serde_json::Number),
}

impl RawText {
    fn into_string(self) -> String {
        match self {
            RawText::Text(s) => s,
            RawText::Number(n) => n.to_string(),
        }
    }

    fn into_id(self) -> Result<EntityId> {
        let text = self.into_string();
        text.trim()
            .parse()
            .map_err(|_| SolverError::InvalidConfig(format!("Invalid entity id {:?}", text)))
    }
}

/// Epoch seconds or an RFC 3339 timestamp.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTime {
    Seconds(f64),
    Timestamp(String),
}

impl RawTime {
    fn seconds(&self) -> Result<f64> {
        match self {
            RawTime::Seconds(s) => Ok(*s),
            RawTime::Timestamp(text) => DateTime::parse_from_rfc3339(text)
                .map(|t| t.timestamp_millis() as f64 / 1000.0)
                .map_err(|e| SolverError::InvalidConfig(format!("Invalid timestamp {:?}: {}", text, e))),
        }
    }
}

fn window(raw: &[RawTime; 2]) -> Result<TimeWindow> {
    Ok(TimeWindow::new(raw[0].seconds()?, raw[1].seconds()?))
}

fn coordinates(raw: [f64; 2]) -> Coordinates {
    Coordinates::new(raw[0], raw[1])
}

fn address_text(raw: Option<serde_json::Value>) -> Option<String> {
    match raw? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[derive(Deserialize)]
struct RawStoreRef {
    id: RawText,
    #[serde(default)]
    time_window: Option<[RawTime; 2]>,
}

#[derive(Deserialize)]
struct RawJob {
    id: RawText,
    fulfillment_id: RawText,
    #[serde(default)]
    label: Option<String>,
    location: [f64; 2],
    delivery_time_window: [RawTime; 2],
    store: RawStoreRef,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    expected_eta: Option<RawTime>,
    #[serde(default)]
    pickup_time: Option<RawTime>,
    #[serde(default)]
    customer_id: Option<RawText>,
    #[serde(default)]
    address: Option<serde_json::Value>,
}

impl RawJob {
    fn into_job(self) -> Result<Job> {
        let mut job = Job::new(
            self.id.into_id()?,
            self.fulfillment_id.into_string(),
            self.label.unwrap_or_default(),
            coordinates(self.location),
            window(&self.delivery_time_window)?,
            self.store.id.into_id()?,
        );
        job.store_time_window = self.store.time_window.as_ref().map(window).transpose()?;
        job.expected_eta = self.expected_eta.as_ref().map(RawTime::seconds).transpose()?;
        job.pickup_time = self.pickup_time.as_ref().map(RawTime::seconds).transpose()?;
        job.status = self.status;
        job.customer_id = self.customer_id.map(RawText::into_string);
        job.address = address_text(self.address);
        Ok(job)
    }
}

#[derive(Deserialize)]
struct RawStore {
    id: RawText,
    #[serde(default)]
    label: Option<String>,
    location: [f64; 2],
    #[serde(default)]
    address: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawDriver {
    id: RawText,
    #[serde(default)]
    label: Option<String>,
    start_shift: RawTime,
    end_shift: RawTime,
    location: [f64; 2],
    #[serde(default)]
    capacity: Option<f64>,
    #[serde(default)]
    vehicle_type: Option<String>,
}

impl RawDocument {
    fn into_instance(self, name: String) -> Result<ProblemInstance> {
        let jobs = self.jobs.into_iter().map(RawJob::into_job).collect::<Result<Vec<_>>>()?;

        let mut stores = Vec::with_capacity(self.stores.len());
        for raw in self.stores {
            stores.push(Store::new(
                raw.id.into_id()?,
                raw.label.unwrap_or_default(),
                coordinates(raw.location),
                address_text(raw.address).unwrap_or_default(),
            ));
        }

        let drivers = self.drivers.len();
        let raw = self
            .drivers
            .into_iter()
            .next()
            .ok_or_else(|| SolverError::InvalidConfig("Instance has no driver".to_string()))?;
        if drivers > 1 {
            log::warn!("Instance has {} drivers, routing for the first one only", drivers);
        }
        let mut deliverer = Deliverer::new(
            raw.id.into_id()?,
            raw.label.unwrap_or_default(),
            coordinates(raw.location),
            TimeWindow::new(raw.start_shift.seconds()?, raw.end_shift.seconds()?),
        );
        deliverer.capacity = raw.capacity;
        deliverer.vehicle_type = raw.vehicle_type;

        log::info!(
            "Loaded instance {}: {} jobs, {} stores",
            name,
            jobs.len(),
            stores.len()
        );
        Ok(ProblemInstance::new(name, jobs, stores, deliverer))
    }
}
