//! Route dumps and run statistics.

use crate::error::{Result, SolverError};
use crate::locations::{Coordinates, Stop};
use crate::route::Route;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

pub const START_LABEL: &str = "init_loc";
pub const END_LABEL: &str = "end_loc";

/// One visited location of a dumped route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub label: String,
    pub lat: f64,
    pub lon: f64,
    pub fulfillment_id: Option<String>,
}

impl RouteRecord {
    fn new(label: impl Into<String>, location: Coordinates, fulfillment_id: Option<String>) -> Self {
        RouteRecord {
            label: label.into(),
            lat: location.latitude,
            lon: location.longitude,
            fulfillment_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDump {
    pub route: Vec<RouteRecord>,
}

/// Records of a route, bracketed by the deliverer position.
///
/// Without time windows a store is visited once for all its jobs and
/// expands into one record per job it supplies. With time windows every
/// store visit carries the fulfillment id of its attached job.
pub fn route_records(route: &Route<'_>, time_windows: bool) -> Result<Vec<RouteRecord>> {
    let instance = route.instance();
    let home = instance.deliverer().location;

    let mut records = vec![RouteRecord::new(START_LABEL, home, None)];
    for stop in &route.tour {
        match stop {
            Stop::Job(id) => {
                let job = instance.job(*id)?;
                records.push(RouteRecord::new(
                    job.label.clone(),
                    job.location,
                    Some(job.fulfillment_id.clone()),
                ));
            }
            Stop::Store(visit) => {
                let store = instance.store(visit.store)?;
                if time_windows {
                    let job_id = visit.job.ok_or_else(|| {
                        SolverError::malformed(format!("{} has no attached job to dump", stop))
                    })?;
                    let job = instance.job(job_id)?;
                    records.push(RouteRecord::new(
                        store.label.clone(),
                        store.location,
                        Some(job.fulfillment_id.clone()),
                    ));
                } else {
                    for job in instance.jobs_for_store(store.id) {
                        records.push(RouteRecord::new(
                            store.label.clone(),
                            store.location,
                            Some(job.fulfillment_id.clone()),
                        ));
                    }
                }
            }
        }
    }
    records.push(RouteRecord::new(END_LABEL, home, None));
    Ok(records)
}

/// `<sum of stop ids>.json`, or `<sum>_<suffix>.json`.
pub fn route_file_name(route: &Route<'_>, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("{}_{}.json", route.id_sum(), suffix),
        None => format!("{}.json", route.id_sum()),
    }
}

/// Write the route as pretty JSON into `dir`, creating it when missing.
pub fn write_route<P: AsRef<Path>>(
    dir: P,
    route: &Route<'_>,
    time_windows: bool,
    suffix: Option<&str>,
) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = dir.join(route_file_name(route, suffix));

    let dump = RouteDump {
        route: route_records(route, time_windows)?,
    };
    let file = File::create(&path)?;
    serde_json::to_writer_pretty(file, &dump)?;
    log::info!("Route written to {:?}", path);
    Ok(path)
}

pub fn read_route<P: AsRef<Path>>(path: P) -> Result<RouteDump> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// One row of the run statistics file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub timestamp: String,
    pub problem: String,
    pub run: usize,
    pub score: f64,
    pub iterations: usize,
    pub tabu_size: usize,
}

impl RunStatistics {
    /// Row stamped with the current UTC time.
    pub fn now(problem: impl Into<String>, run: usize, score: f64, iterations: usize, tabu_size: usize) -> Self {
        RunStatistics {
            timestamp: Utc::now().to_rfc3339(),
            problem: problem.into(),
            run,
            score,
            iterations,
            tabu_size,
        }
    }
}

/// Append rows to a CSV file. The header is only written to new or empty files.
pub fn append_statistics<P: AsRef<Path>>(path: P, rows: &[RunStatistics]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(is_new).from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_statistics<P: AsRef<Path>>(path: P) -> Result<Vec<RunStatistics>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}
