//! Route representation and the move operators used by the local search.
//!
//! A [`Route`] is one candidate solution: an ordered list of [`Stop`]s plus
//! shared references to the instance and the evaluator that scores it. The
//! deliverer is never a stop; it is the implicit start and end of the tour.

use crate::codec::Codec;
use crate::error::{Result, SolverError};
use crate::evaluators::Evaluator;
use crate::heuristics::construction::{shuffled, InitializationMethod};
use crate::instance::ProblemInstance;
use crate::locations::Stop;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::sync::Arc;

/// A candidate tour for the single deliverer of an instance.
///
/// Cloning is the `copy` of the search: the stop list is duplicated, the
/// instance, evaluator and stop pool are shared.
#[derive(Clone)]
pub struct Route<'a> {
    instance: &'a ProblemInstance,
    evaluator: &'a dyn Evaluator,
    /// Stops the route was generated from, in canonical order.
    pool: Arc<[Stop]>,
    /// The tour as visited after leaving the deliverer
    pub tour: Vec<Stop>,
}

impl<'a> Route<'a> {
    /// Route visiting `tour` in the given order; the tour also becomes the pool.
    pub fn from_tour(instance: &'a ProblemInstance, evaluator: &'a dyn Evaluator, tour: Vec<Stop>) -> Self {
        Route {
            instance,
            evaluator,
            pool: tour.clone().into(),
            tour,
        }
    }

    /// Build a first tour with the given initialization method.
    pub fn generate_initial(
        instance: &'a ProblemInstance,
        evaluator: &'a dyn Evaluator,
        method: InitializationMethod,
        seed: u64,
    ) -> Result<Self> {
        let heuristic = method.heuristic()?;
        let pool = heuristic.stops(instance);
        let tour = shuffled(&pool, seed);
        Ok(Route {
            instance,
            evaluator,
            pool: pool.into(),
            tour,
        })
    }

    pub fn instance(&self) -> &'a ProblemInstance {
        self.instance
    }

    pub fn evaluator(&self) -> &'a dyn Evaluator {
        self.evaluator
    }

    pub fn pool(&self) -> &[Stop] {
        &self.pool
    }

    pub fn len(&self) -> usize {
        self.tour.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tour.is_empty()
    }

    /// Score the tour with the route's evaluator.
    pub fn score(&self, driver_returns_to_start: bool) -> Result<f64> {
        self.evaluator.evaluate(self.instance, &self.tour, driver_returns_to_start)
    }

    /// Score the tour with another evaluator.
    pub fn score_with(&self, evaluator: &dyn Evaluator, driver_returns_to_start: bool) -> Result<f64> {
        evaluator.evaluate(self.instance, &self.tour, driver_returns_to_start)
    }

    /// First position holding exactly `stop`.
    pub fn position(&self, stop: &Stop) -> Result<usize> {
        self.tour
            .iter()
            .position(|s| s == stop)
            .ok_or_else(|| SolverError::invalid_move(format!("{} is not in the route", stop)))
    }

    /// Position lookup for tours with duplicated stores.
    ///
    /// Jobs match on id. Stores match on store id and on the id of the
    /// attached job. When several positions match, the rightmost one wins.
    pub fn position_time_window(&self, stop: &Stop) -> Result<usize> {
        self.tour
            .iter()
            .rposition(|s| match (s, stop) {
                (Stop::Job(a), Stop::Job(b)) => a == b,
                (Stop::Store(a), Stop::Store(b)) => a.store == b.store && a.job == b.job,
                _ => false,
            })
            .ok_or_else(|| SolverError::invalid_move(format!("{} is not in the route", stop)))
    }

    pub fn locate(&self, stop: &Stop, mode: LocateMode) -> Result<usize> {
        match mode {
            LocateMode::Exact => self.position(stop),
            LocateMode::TimeWindow => self.position_time_window(stop),
        }
    }

    /// Reverse the closed segment between two positions.
    pub fn two_opt_by_index(&mut self, index1: usize, index2: usize) -> Result<()> {
        let n = self.tour.len();
        let low = index1.min(index2);
        let high = index1.max(index2);
        if n < 2 || low > n - 2 || high <= low || high > n - 1 {
            return Err(SolverError::invalid_move(format!(
                "degenerate 2-opt bounds ({}, {}) on a tour of {} stops",
                low, high, n
            )));
        }
        self.tour[low..=high].reverse();
        Ok(())
    }

    /// Classic 2-opt between the positions of two stops.
    pub fn two_opt(&mut self, a: &Stop, b: &Stop) -> Result<()> {
        let i = self.position(a)?;
        let j = self.position(b)?;
        self.two_opt_by_index(i, j)
    }

    /// Exchange the positions of two stops.
    pub fn swap(&mut self, a: &Stop, b: &Stop) -> Result<()> {
        let i = self.position(a)?;
        let j = self.position(b)?;
        self.tour.swap(i, j);
        Ok(())
    }

    /// 2-opt for tours holding one store visit per job.
    pub fn two_opt_time_window(&mut self, a: &Stop, b: &Stop) -> Result<()> {
        let i = self.locate(a, LocateMode::TimeWindow)?;
        let j = self.locate(b, LocateMode::TimeWindow)?;
        self.two_opt_by_index(i, j)
    }

    /// Swap for tours holding one store visit per job.
    pub fn swap_time_window(&mut self, a: &Stop, b: &Stop) -> Result<()> {
        let i = self.locate(a, LocateMode::TimeWindow)?;
        let j = self.locate(b, LocateMode::TimeWindow)?;
        self.tour.swap(i, j);
        Ok(())
    }

    pub fn apply(&mut self, mv: &Move) -> Result<()> {
        match mv {
            Move::TwoOpt(a, b) => self.two_opt(a, b),
            Move::Swap(a, b) => self.swap(a, b),
            Move::TwoOptTimeWindow(a, b) => self.two_opt_time_window(a, b),
            Move::SwapTimeWindow(a, b) => self.swap_time_window(a, b),
        }
    }

    /// Collapse the tour through the codec and rebuild it, restoring
    /// store-before-job order inside every request group.
    pub fn repair(&mut self, codec: &Codec, exhaustive: bool) -> Result<()> {
        let encoded = codec.encode(&self.tour)?;
        self.tour = if exhaustive {
            codec.decode_exhaustive(&encoded, self.instance, self.evaluator)?
        } else {
            codec.decode(&encoded)?
        };
        log::debug!("Repaired route to {}", self.pretty_print());
        Ok(())
    }

    /// Every pair of distinct pool positions, after shuffling the pool with
    /// `seed`. Pairs are ordered `(earlier, later)` in the shuffled pool.
    pub fn generate_pairs(&self, seed: u64) -> Vec<(Stop, Stop)> {
        let mut stops = self.pool.to_vec();
        stops.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

        let n = stops.len();
        let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in i + 1..n {
                pairs.push((stops[i], stops[j]));
            }
        }
        pairs
    }

    /// Whether the tour is a reordering of the pool.
    pub fn is_permutation_of_pool(&self) -> bool {
        let mut tour = self.tour.clone();
        let mut pool = self.pool.to_vec();
        tour.sort();
        pool.sort();
        tour == pool
    }

    /// Sum of the stop ids, used to name dumped routes.
    pub fn id_sum(&self) -> u64 {
        self.tour.iter().map(|s| s.id()).sum()
    }

    pub fn pretty_print(&self) -> String {
        let ids: Vec<String> = self.tour.iter().map(|s| s.id().to_string()).collect();
        format!("Route[{}]", ids.join(", "))
    }
}

impl fmt::Debug for Route<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("evaluator", &self.evaluator.name())
            .field("tour", &self.tour)
            .finish()
    }
}

impl fmt::Display for Route<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stops: Vec<String> = self.tour.iter().map(|s| s.to_string()).collect();
        write!(f, "Route[{}]", stops.join(", "))
    }
}

/// How move operators find the positions of their stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateMode {
    /// First position holding an equal stop.
    Exact,
    /// Rightmost position matching kind, id and attached job.
    TimeWindow,
}

/// A move of the local search, named by the stops it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    TwoOpt(Stop, Stop),
    Swap(Stop, Stop),
    TwoOptTimeWindow(Stop, Stop),
    SwapTimeWindow(Stop, Stop),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluators::{DistanceEvaluator, EvaluatorKind, TimeWindowEvaluator};
    use crate::instance::test_instances::small_city;

    fn route<'a>(instance: &'a ProblemInstance, tour: Vec<Stop>) -> Route<'a> {
        Route::from_tour(instance, &DistanceEvaluator, tour)
    }

    fn city_tour() -> Vec<Stop> {
        vec![Stop::store(1), Stop::Job(10), Stop::Job(11), Stop::store(2), Stop::Job(12)]
    }

    #[test]
    fn test_two_opt_reverses_closed_segment() {
        let instance = small_city();
        let mut r = route(&instance, city_tour());
        r.two_opt(&Stop::Job(11), &Stop::Job(10)).unwrap();
        assert_eq!(r.tour, vec![Stop::store(1), Stop::Job(11), Stop::Job(10), Stop::store(2), Stop::Job(12)]);

        r.two_opt_by_index(0, 4).unwrap();
        assert_eq!(r.tour, vec![Stop::Job(12), Stop::store(2), Stop::Job(10), Stop::Job(11), Stop::store(1)]);
    }

    #[test]
    fn test_two_opt_is_an_involution() {
        let instance = small_city();
        let original = city_tour();
        for i in 0..original.len() {
            for j in i + 1..original.len() {
                let mut r = route(&instance, original.clone());
                let (a, b) = (original[i], original[j]);
                r.two_opt(&a, &b).unwrap();
                r.two_opt(&a, &b).unwrap();
                assert_eq!(r.tour, original);
            }
        }
    }

    #[test]
    fn test_two_opt_rejects_degenerate_bounds() {
        let instance = small_city();
        let mut r = route(&instance, city_tour());
        let same = Stop::Job(10);
        assert!(matches!(r.two_opt(&same, &same), Err(SolverError::InvalidMove { .. })));
        assert!(matches!(r.two_opt_by_index(2, 9), Err(SolverError::InvalidMove { .. })));
        assert!(matches!(r.two_opt(&Stop::Job(99), &same), Err(SolverError::InvalidMove { .. })));
        assert_eq!(r.tour, city_tour());
    }

    #[test]
    fn test_swap() {
        let instance = small_city();
        let mut r = route(&instance, city_tour());
        r.swap(&Stop::store(1), &Stop::Job(12)).unwrap();
        assert_eq!(r.tour[0], Stop::Job(12));
        assert_eq!(r.tour[4], Stop::store(1));
        assert!(r.swap(&Stop::store(7), &Stop::Job(12)).is_err());
    }

    #[test]
    fn test_time_window_lookup_takes_rightmost_match() {
        let instance = small_city();
        // Two identical visits of store 1 for job 10.
        let tour = vec![Stop::store_for(1, 10), Stop::Job(10), Stop::store_for(1, 10), Stop::Job(12)];
        let r = Route::from_tour(&instance, &TimeWindowEvaluator, tour);
        assert_eq!(r.position_time_window(&Stop::store_for(1, 10)).unwrap(), 2);
        assert_eq!(r.locate(&Stop::store_for(1, 10), LocateMode::Exact).unwrap(), 0);
        // Same store, different job does not match.
        assert!(r.position_time_window(&Stop::store_for(1, 11)).is_err());
    }

    #[test]
    fn test_time_window_moves() {
        let instance = small_city();
        let tour = vec![Stop::store_for(1, 10), Stop::Job(10), Stop::store_for(1, 11), Stop::Job(11)];
        let mut r = Route::from_tour(&instance, &TimeWindowEvaluator, tour);
        r.swap_time_window(&Stop::store_for(1, 11), &Stop::Job(10)).unwrap();
        assert_eq!(r.tour[1], Stop::store_for(1, 11));
        assert_eq!(r.tour[2], Stop::Job(10));

        r.two_opt_time_window(&Stop::store_for(1, 10), &Stop::Job(11)).unwrap();
        assert_eq!(r.tour[0], Stop::Job(11));
        assert_eq!(r.tour[3], Stop::store_for(1, 10));
    }

    #[test]
    fn test_apply_dispatches_moves() {
        let instance = small_city();
        let mut r = route(&instance, city_tour());
        r.apply(&Move::Swap(Stop::Job(10), Stop::Job(11))).unwrap();
        assert_eq!(r.tour[1], Stop::Job(11));
        r.apply(&Move::TwoOpt(Stop::Job(10), Stop::Job(11))).unwrap();
        assert_eq!(r.tour, city_tour());
    }

    #[test]
    fn test_clone_detaches_tour() {
        let instance = small_city();
        let r = route(&instance, city_tour());
        let mut copy = r.clone();
        copy.swap(&Stop::store(1), &Stop::Job(12)).unwrap();
        assert_eq!(r.tour, city_tour());
        assert_ne!(copy.tour, r.tour);
        assert_eq!(copy.pool(), r.pool());
    }

    #[test]
    fn test_generate_pairs() {
        let instance = small_city();
        let r = route(&instance, city_tour());
        let pairs = r.generate_pairs(7);
        assert_eq!(pairs.len(), 10);
        assert!(pairs.iter().all(|(a, b)| a != b));
        assert_eq!(pairs, r.generate_pairs(7));

        let mut unordered: Vec<(Stop, Stop)> = pairs.iter().map(|&(a, b)| (a.min(b), a.max(b))).collect();
        unordered.sort();
        unordered.dedup();
        assert_eq!(unordered.len(), 10);
    }

    #[test]
    fn test_generate_initial_random() {
        let instance = small_city();
        let evaluator = EvaluatorKind::Distance.evaluator();
        let r = Route::generate_initial(&instance, evaluator, InitializationMethod::Random, 3).unwrap();
        assert_eq!(r.len(), 5);
        assert!(r.is_permutation_of_pool());
        assert_eq!(r.tour.iter().filter(|s| s.is_store()).count(), 2);

        let again = Route::generate_initial(&instance, evaluator, InitializationMethod::Random, 3).unwrap();
        assert_eq!(r.tour, again.tour);
    }

    #[test]
    fn test_generate_initial_relaxed_random() {
        let instance = small_city();
        let evaluator = EvaluatorKind::TimeWindow.evaluator();
        let r = Route::generate_initial(&instance, evaluator, InitializationMethod::RelaxedRandom, 3).unwrap();
        // |jobs| + |requests|
        assert_eq!(r.len(), 6);
        for job in [10, 11, 12] {
            assert_eq!(r.tour.iter().filter(|s| s.attached_job() == Some(job)).count(), 1);
        }
        assert!(r.score(true).is_ok());
    }

    #[test]
    fn test_unimplemented_initialization() {
        let instance = small_city();
        let evaluator = EvaluatorKind::Distance.evaluator();
        for method in [InitializationMethod::Greedy, InitializationMethod::Grasp] {
            assert!(matches!(
                Route::generate_initial(&instance, evaluator, method, 1),
                Err(SolverError::NotImplemented(_))
            ));
        }
    }

    #[test]
    fn test_score_with_other_evaluator() {
        let instance = small_city();
        let r = route(&instance, vec![Stop::store(1), Stop::Job(10)]);
        assert_eq!(r.score(false).unwrap(), r.score_with(&DistanceEvaluator, false).unwrap());
        // Plain store stops carry no job to take a window from.
        assert!(r.score_with(&TimeWindowEvaluator, false).is_err());
    }

    #[test]
    fn test_display_helpers() {
        let instance = small_city();
        let r = route(&instance, vec![Stop::store(1), Stop::Job(10)]);
        assert_eq!(r.pretty_print(), "Route[1, 10]");
        assert_eq!(r.to_string(), "Route[Store(1), Job(10)]");
        assert_eq!(r.id_sum(), 11);
    }
}
