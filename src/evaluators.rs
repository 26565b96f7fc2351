//! Scoring strategies that turn a tour into a scalar cost (lower is better).

use crate::error::{Result, SolverError};
use crate::instance::ProblemInstance;
use crate::locations::{EntityId, Stop};
use serde::{Deserialize, Serialize};

/// Penalty for a job visited before its store. Added as kilometers by the
/// distance evaluator, used as a distance multiplier by the time evaluator.
pub const PRECEDENCE_PENALTY: f64 = 1000.0;

/// Driver speed in meters per second.
pub const SPEED_M_PER_S: f64 = 4.1;

/// Time spent at a customer after arrival, in seconds.
pub const SERVICE_TIME_S: f64 = 250.0;

/// A pluggable scoring function over tours.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, instance: &ProblemInstance, tour: &[Stop], driver_returns_to_start: bool) -> Result<f64>;
    fn name(&self) -> &str;
}

/// Which evaluator a search uses.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorKind {
    Distance,
    TimeWindow,
}

static DISTANCE_EVALUATOR: DistanceEvaluator = DistanceEvaluator;
static TIME_WINDOW_EVALUATOR: TimeWindowEvaluator = TimeWindowEvaluator;

impl EvaluatorKind {
    pub fn for_time_windows(with_time_windows: bool) -> Self {
        if with_time_windows {
            EvaluatorKind::TimeWindow
        } else {
            EvaluatorKind::Distance
        }
    }

    pub fn evaluator(self) -> &'static dyn Evaluator {
        match self {
            EvaluatorKind::Distance => &DISTANCE_EVALUATOR,
            EvaluatorKind::TimeWindow => &TIME_WINDOW_EVALUATOR,
        }
    }
}

/// Total travel distance in kilometers plus [`PRECEDENCE_PENALTY`] per job
/// visited before its store.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceEvaluator;

impl DistanceEvaluator {
    /// Travel distance of the tour without any penalty.
    pub fn travel_distance(instance: &ProblemInstance, tour: &[Stop], driver_returns_to_start: bool) -> Result<f64> {
        let start = instance.deliverer_key();
        let mut total = 0.0;
        let mut prev = start;
        for stop in tour {
            total += instance.distance(prev, stop.key())?;
            prev = stop.key();
        }
        if driver_returns_to_start && !tour.is_empty() {
            total += instance.distance(prev, start)?;
        }
        Ok(total)
    }

    /// Number of jobs that come before the store they are picked up at.
    pub fn precedence_violations(instance: &ProblemInstance, tour: &[Stop]) -> Result<usize> {
        let mut violations = 0;
        for (i, stop) in tour.iter().enumerate() {
            if let Stop::Job(id) = stop {
                let job = instance.job(*id)?;
                match last_store_position(tour, job.store_id) {
                    Some(store_pos) if store_pos > i => violations += 1,
                    Some(_) => {}
                    None => log::warn!("Couldn't find store {} for job {}", job.store_id, id),
                }
            }
        }
        Ok(violations)
    }
}

impl Evaluator for DistanceEvaluator {
    fn evaluate(&self, instance: &ProblemInstance, tour: &[Stop], driver_returns_to_start: bool) -> Result<f64> {
        let distance = Self::travel_distance(instance, tour, driver_returns_to_start)?;
        let violations = Self::precedence_violations(instance, tour)?;
        Ok(distance + violations as f64 * PRECEDENCE_PENALTY)
    }

    fn name(&self) -> &str {
        "Distance"
    }
}

/// Sum of squared deviations between arrival time and window start.
///
/// A single clock starts at the deliverer's shift start. Store visits take no
/// time, jobs add [`SERVICE_TIME_S`]. A job reached before its store visit has
/// the distance of the leg into it inflated by [`PRECEDENCE_PENALTY`]. The way
/// back to the deliverer has no window and is not scored.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeWindowEvaluator;

impl TimeWindowEvaluator {
    #[inline]
    pub fn travel_time(distance_km: f64) -> f64 {
        distance_km * 1000.0 / SPEED_M_PER_S
    }

    /// Arrival time at every stop of the tour.
    pub fn arrival_times(instance: &ProblemInstance, tour: &[Stop]) -> Result<Vec<f64>> {
        let mut arrivals = Vec::with_capacity(tour.len());
        simulate(instance, tour, |_, arrival| arrivals.push(arrival))?;
        Ok(arrivals)
    }
}

impl Evaluator for TimeWindowEvaluator {
    fn evaluate(&self, instance: &ProblemInstance, tour: &[Stop], _driver_returns_to_start: bool) -> Result<f64> {
        let mut score = 0.0;
        simulate(instance, tour, |window_start, arrival| {
            let deviation = arrival - window_start;
            score += deviation * deviation;
        })?;
        Ok(score)
    }

    fn name(&self) -> &str {
        "TimeWindow"
    }
}

/// Walk the tour with the time-window clock, reporting `(window_start,
/// arrival)` for every stop.
fn simulate<F>(instance: &ProblemInstance, tour: &[Stop], mut visit: F) -> Result<()>
where
    F: FnMut(f64, f64),
{
    let mut clock = instance.deliverer().shift_start();
    let mut prev = instance.deliverer_key();

    for (i, stop) in tour.iter().enumerate() {
        let mut distance = instance.distance(prev, stop.key())?;
        let (window_start, service) = match stop {
            Stop::Store(store_visit) => {
                let job_id = store_visit.job.ok_or_else(|| {
                    SolverError::malformed(format!("{} has no attached job to take a time window from", stop))
                })?;
                (instance.job(job_id)?.time_start(), 0.0)
            }
            Stop::Job(id) => {
                match last_visit_position(tour, *id) {
                    Some(store_pos) if store_pos > i => distance *= PRECEDENCE_PENALTY,
                    Some(_) => {}
                    None => log::warn!("Couldn't find store visit for job {}", id),
                }
                (instance.job(*id)?.time_start(), SERVICE_TIME_S)
            }
        };

        let arrival = clock + TimeWindowEvaluator::travel_time(distance);
        visit(window_start, arrival);
        clock = arrival + service;
        prev = stop.key();
    }
    Ok(())
}

/// Rightmost position of a visit to the given store.
fn last_store_position(tour: &[Stop], store_id: EntityId) -> Option<usize> {
    tour.iter()
        .rposition(|s| matches!(s, Stop::Store(visit) if visit.store == store_id))
}

/// Rightmost position of the store visit dedicated to the given job.
fn last_visit_position(tour: &[Stop], job_id: EntityId) -> Option<usize> {
    tour.iter().rposition(|s| s.attached_job() == Some(job_id))
}
