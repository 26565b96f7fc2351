use crate::error::{Result, SolverError};
use crate::evaluators::Evaluator;
use crate::instance::ProblemInstance;
use crate::locations::Stop;
use crate::route::Route;
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub trait ConstructionHeuristic {
    /// Stops a tour of this kind is made of, in canonical order.
    fn stops(&self, instance: &ProblemInstance) -> Vec<Stop>;

    /// A fresh tour: the stops in a seeded random order.
    fn construct(&self, instance: &ProblemInstance, seed: u64) -> Vec<Stop> {
        shuffled(&self.stops(instance), seed)
    }

    fn name(&self) -> &str;
}

/// Copy of `stops` in the order drawn by a [`ChaCha8Rng`] seeded with `seed`.
pub fn shuffled(stops: &[Stop], seed: u64) -> Vec<Stop> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut tour = stops.to_vec();
    tour.shuffle(&mut rng);
    tour
}

/// How the first tour of a search is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InitializationMethod {
    /// Every job and every store once, shuffled.
    #[default]
    Random,
    /// One store visit per job plus the job itself, shuffled.
    RelaxedRandom,
    Greedy,
    #[serde(alias = "GRASP")]
    Grasp,
}

impl InitializationMethod {
    /// Heuristic implementing the method, or `NotImplemented`.
    pub fn heuristic(self) -> Result<Box<dyn ConstructionHeuristic + Send + Sync>> {
        match self {
            InitializationMethod::Random => Ok(Box::new(RandomConstruction)),
            InitializationMethod::RelaxedRandom => Ok(Box::new(RelaxedRandomConstruction)),
            InitializationMethod::Greedy | InitializationMethod::Grasp => {
                Err(SolverError::NotImplemented(format!("{} initialization", self)))
            }
        }
    }
}

impl fmt::Display for InitializationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InitializationMethod::Random => "random",
            InitializationMethod::RelaxedRandom => "relaxed_random",
            InitializationMethod::Greedy => "greedy",
            InitializationMethod::Grasp => "grasp",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for InitializationMethod {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "random" => Ok(InitializationMethod::Random),
            "relaxed_random" => Ok(InitializationMethod::RelaxedRandom),
            "greedy" => Ok(InitializationMethod::Greedy),
            "grasp" => Ok(InitializationMethod::Grasp),
            other => Err(SolverError::InvalidConfig(format!("unknown initialization method '{}'", other))),
        }
    }
}

/// All jobs followed by all stores.
pub struct RandomConstruction;

impl ConstructionHeuristic for RandomConstruction {
    fn stops(&self, instance: &ProblemInstance) -> Vec<Stop> {
        instance
            .jobs()
            .iter()
            .map(|j| Stop::Job(j.id))
            .chain(instance.stores().iter().map(|s| Stop::store(s.id)))
            .collect()
    }

    fn name(&self) -> &str {
        "Random"
    }
}

/// Store visit and job for every request. Jobs without a known store stay
/// in the tour as standalone stops.
pub struct RelaxedRandomConstruction;

impl ConstructionHeuristic for RelaxedRandomConstruction {
    fn stops(&self, instance: &ProblemInstance) -> Vec<Stop> {
        let mut stops: Vec<Stop> = instance.requests().iter().flat_map(|r| r.stops()).collect();
        stops.extend(instance.unmatched_jobs().iter().map(|&id| Stop::Job(id)));
        stops
    }

    fn name(&self) -> &str {
        "RelaxedRandom"
    }
}

/// Multi-start construction: build `size` tours with consecutive seeds and
/// keep the lowest-scoring one.
#[derive(Debug, Clone, Copy)]
pub struct InitialPool {
    pub method: InitializationMethod,
    pub size: usize,
    pub seed: u64,
    pub driver_returns_to_start: bool,
}

impl InitialPool {
    pub fn new(method: InitializationMethod, size: usize, seed: u64) -> Self {
        InitialPool {
            method,
            size,
            seed,
            driver_returns_to_start: true,
        }
    }

    /// Best route of the pool and its score. Ties keep the earliest seed.
    pub fn build<'a>(&self, instance: &'a ProblemInstance, evaluator: &'a dyn Evaluator) -> Result<(f64, Route<'a>)> {
        if self.size == 0 {
            return Err(SolverError::InvalidConfig("initial pool size must be at least 1".to_string()));
        }
        let heuristic = self.method.heuristic()?;
        let start = std::time::Instant::now();

        let mut best: Option<(f64, Route<'a>)> = None;
        for i in 0..self.size {
            let seed = self.seed + i as u64;
            let route = Route::from_tour(instance, evaluator, heuristic.construct(instance, seed));
            let score = route.score(self.driver_returns_to_start)?;
            if best.as_ref().map_or(true, |(b, _)| OrderedFloat(score) < OrderedFloat(*b)) {
                best = Some((score, route));
            }
        }

        let (score, route) = best.ok_or_else(|| SolverError::InvalidConfig("empty initial pool".to_string()))?;
        log::info!(
            "{} initial pool of {} routes: best score {:.4} in {:?}",
            heuristic.name(),
            self.size,
            score,
            start.elapsed()
        );
        Ok((score, with_pool(route, heuristic.stops(instance))))
    }
}

/// Re-attach the canonical stop list so pair generation does not depend on
/// which pool member won.
fn with_pool<'a>(route: Route<'a>, pool: Vec<Stop>) -> Route<'a> {
    let mut canonical = Route::from_tour(route.instance(), route.evaluator(), pool);
    canonical.tour = route.tour;
    canonical
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluators::EvaluatorKind;
    use crate::instance::test_instances::small_city;

    #[test]
    fn test_random_stops() {
        let instance = small_city();
        let stops = RandomConstruction.stops(&instance);
        assert_eq!(
            stops,
            vec![Stop::Job(10), Stop::Job(11), Stop::Job(12), Stop::store(1), Stop::store(2)]
        );
    }

    #[test]
    fn test_relaxed_random_stops() {
        let instance = small_city();
        let stops = RelaxedRandomConstruction.stops(&instance);
        assert_eq!(stops.len(), 6);
        assert!(stops.contains(&Stop::store_for(1, 10)));
        assert!(stops.contains(&Stop::store_for(1, 11)));
        assert!(stops.contains(&Stop::store_for(2, 12)));
    }

    #[test]
    fn test_relaxed_random_keeps_unmatched_jobs() {
        use crate::locations::{Coordinates, Deliverer, Job, Store, TimeWindow};

        let window = TimeWindow::new(0.0, 3_600.0);
        let instance = ProblemInstance::new(
            "orphan",
            vec![
                Job::new(1, "F-1", "a", Coordinates::new(0.0, 0.01), window, 5),
                Job::new(2, "F-2", "b", Coordinates::new(0.0, 0.02), window, 9),
            ],
            vec![Store::new(5, "store", Coordinates::new(0.0, 0.0), "Dock 5")],
            Deliverer::new(100, "driver", Coordinates::new(0.0, 0.0), window),
        );
        assert_eq!(instance.unmatched_jobs(), &[2]);

        let stops = RelaxedRandomConstruction.stops(&instance);
        assert_eq!(stops.len(), 3);
        assert_eq!(stops.iter().filter(|s| **s == Stop::Job(2)).count(), 1);
        assert!(stops.iter().all(|s| s.attached_job() != Some(2) || *s == Stop::Job(2)));
    }

    #[test]
    fn test_construct_is_seeded() {
        let instance = small_city();
        let a = RandomConstruction.construct(&instance, 11);
        let b = RandomConstruction.construct(&instance, 11);
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort();
        let mut expected = RandomConstruction.stops(&instance);
        expected.sort();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("relaxed-random".parse::<InitializationMethod>().unwrap(), InitializationMethod::RelaxedRandom);
        assert_eq!("GRASP".parse::<InitializationMethod>().unwrap(), InitializationMethod::Grasp);
        assert!("nearest".parse::<InitializationMethod>().is_err());
        let json: InitializationMethod = serde_json::from_str("\"relaxed_random\"").unwrap();
        assert_eq!(json, InitializationMethod::RelaxedRandom);
    }

    #[test]
    fn test_greedy_is_not_implemented() {
        assert!(matches!(
            InitializationMethod::Greedy.heuristic(),
            Err(SolverError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_pool_keeps_best_member() {
        let instance = small_city();
        let evaluator = EvaluatorKind::Distance.evaluator();
        let pool = InitialPool::new(InitializationMethod::Random, 50, 1);
        let (score, route) = pool.build(&instance, evaluator).unwrap();

        assert_eq!(score, route.score(true).unwrap());
        assert_eq!(route.pool(), RandomConstruction.stops(&instance).as_slice());
        for seed in 1..51 {
            let member = Route::from_tour(&instance, evaluator, RandomConstruction.construct(&instance, seed));
            assert!(score <= member.score(true).unwrap());
        }
    }

    #[test]
    fn test_pool_of_one_is_first_seed() {
        let instance = small_city();
        let evaluator = EvaluatorKind::Distance.evaluator();
        let (_, route) = InitialPool::new(InitializationMethod::Random, 1, 9).build(&instance, evaluator).unwrap();
        assert_eq!(route.tour, RandomConstruction.construct(&instance, 9));
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        let instance = small_city();
        let evaluator = EvaluatorKind::Distance.evaluator();
        let pool = InitialPool::new(InitializationMethod::Random, 0, 1);
        assert!(matches!(pool.build(&instance, evaluator), Err(SolverError::InvalidConfig(_))));
    }
}
