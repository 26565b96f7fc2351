//! Hill climbing over 2-opt and swap moves with an optional tabu list.
//!
//! Every outer iteration enumerates all pairs of stops of the initial route
//! in a seeded order. For each pair a coin flip picks the move, the move is
//! applied to a copy of the best route and the copy replaces the best route
//! when it scores strictly lower and the tabu list admits it.

use crate::codec::Codec;
use crate::config::SearchConfig;
use crate::error::{Result, SolverError};
use crate::evaluators::{Evaluator, PRECEDENCE_PENALTY};
use crate::heuristics::construction::InitialPool;
use crate::heuristics::tabu::TabuList;
use crate::instance::ProblemInstance;
use crate::locations::Stop;
use crate::route::{Move, Route};
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared flag asking a running search to stop after its current iteration.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of one search run.
#[derive(Debug, Clone)]
pub struct SearchOutcome<'a> {
    pub score: f64,
    pub route: Route<'a>,
    /// Last outer iteration that improved the best route
    pub improved_at: Option<usize>,
    pub iterations_run: usize,
    pub cancelled: bool,
    /// Best score after each completed outer iteration
    pub score_history: Vec<f64>,
}

/// A move together with the pair of stops it was drawn for.
#[derive(Debug, Clone, Copy)]
struct PlannedMove {
    pair: (Stop, Stop),
    mv: Move,
}

enum TabuState {
    Off,
    /// Recently accepted scores
    Scores(TabuList<OrderedFloat<f64>>),
    /// Stops moved by recently accepted candidates
    Stops(TabuList<Stop>),
}

impl TabuState {
    fn new(config: &SearchConfig) -> Self {
        if !config.tabu {
            TabuState::Off
        } else if config.with_time_windows {
            TabuState::Scores(TabuList::new(config.tabu_size))
        } else {
            TabuState::Stops(TabuList::new(config.tabu_size))
        }
    }

    /// Admit an improving candidate and record it.
    fn admit(&mut self, score: f64, (a, b): (Stop, Stop)) -> bool {
        match self {
            TabuState::Off => true,
            TabuState::Scores(list) => {
                let key = OrderedFloat(score);
                if list.contains(&key) {
                    return false;
                }
                list.push(key);
                true
            }
            TabuState::Stops(list) => {
                if list.contains(&a) && list.contains(&b) {
                    return false;
                }
                list.push(a);
                list.push(b);
                true
            }
        }
    }
}

pub struct HillClimbing<'a> {
    instance: &'a ProblemInstance,
    evaluator: &'a dyn Evaluator,
    codec: &'a Codec,
    config: SearchConfig,
    solution: Option<(f64, Route<'a>)>,
}

impl<'a> HillClimbing<'a> {
    /// Engine scoring with the evaluator matching `config.with_time_windows`.
    pub fn new(instance: &'a ProblemInstance, codec: &'a Codec, config: SearchConfig) -> Result<Self> {
        let evaluator = config.evaluator_kind().evaluator();
        Self::with_evaluator(instance, evaluator, codec, config)
    }

    pub fn with_evaluator(
        instance: &'a ProblemInstance,
        evaluator: &'a dyn Evaluator,
        codec: &'a Codec,
        config: SearchConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(HillClimbing {
            instance,
            evaluator,
            codec,
            config,
            solution: None,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &'a dyn Evaluator {
        self.evaluator
    }

    pub fn initial_solution(&self) -> Option<&Route<'a>> {
        self.solution.as_ref().map(|(_, route)| route)
    }

    /// Build the initial pool and keep its best route as the starting point.
    pub fn generate_initial_solution(&mut self) -> Result<(f64, Route<'a>)> {
        let pool = InitialPool::new(
            self.config.initialization,
            self.config.initial_pool_size,
            self.config.initial_seed,
        );
        let (score, route) = pool.build(self.instance, self.evaluator)?;
        self.solution = Some((score, route.clone()));
        Ok((score, route))
    }

    /// Start from a given route instead of the initial pool.
    pub fn set_initial_solution(&mut self, route: Route<'a>) -> Result<f64> {
        let score = route.score(true)?;
        self.solution = Some((score, route));
        Ok(score)
    }

    pub fn solve(&mut self) -> Result<SearchOutcome<'a>> {
        self.solve_with_signal(&StopSignal::new())
    }

    /// Run the search, checking `signal` and the time limit before every
    /// outer iteration.
    pub fn solve_with_signal(&mut self, signal: &StopSignal) -> Result<SearchOutcome<'a>> {
        let init_route = match &self.solution {
            Some((_, route)) => route.clone(),
            None => self.generate_initial_solution()?.1,
        };
        let returns = self.config.driver_returns_to_start;

        let mut best_route = init_route.clone();
        let mut best_score = best_route.score(returns)?;
        let mut tabu = TabuState::new(&self.config);
        let mut shuffle_rng = ChaCha8Rng::seed_from_u64(self.config.pair_seed);
        let mut move_rng = ChaCha8Rng::seed_from_u64(self.config.move_seed);
        let mut pair_seed = self.config.pair_seed;

        let mut improved_at = None;
        let mut score_history = Vec::with_capacity(self.config.iterations);
        let mut cancelled = false;
        let start = Instant::now();

        for iteration in 0..self.config.iterations {
            if signal.is_stopped() || self.out_of_time(start) {
                log::info!("Search stopped after {} iterations", iteration);
                cancelled = true;
                break;
            }

            let mut pairs = init_route.generate_pairs(pair_seed);
            pairs.shuffle(&mut shuffle_rng);
            pair_seed += 1;
            let moves = self.plan_moves(pairs, &mut move_rng)?;

            let batch_len = if self.config.parallel { self.config.batch_size } else { 1 };
            let mut cursor = 0;
            while cursor < moves.len() {
                let batch = &moves[cursor..(cursor + batch_len).min(moves.len())];
                let candidates: Vec<Option<(f64, Route<'a>)>> = if self.config.parallel {
                    batch
                        .par_iter()
                        .map(|planned| self.candidate(&best_route, planned))
                        .collect::<Result<_>>()?
                } else {
                    batch
                        .iter()
                        .map(|planned| self.candidate(&best_route, planned))
                        .collect::<Result<_>>()?
                };

                let batch_start = cursor;
                cursor += batch.len();
                for (offset, candidate) in candidates.into_iter().enumerate() {
                    if let Some((score, route)) = candidate {
                        if score < best_score && tabu.admit(score, batch[offset].pair) {
                            best_route = route;
                            best_score = score;
                            improved_at = Some(iteration);
                            // Later candidates of the batch were built from the old best.
                            cursor = batch_start + offset + 1;
                            break;
                        }
                    }
                }
            }

            score_history.push(best_score);
            log::info!("Iteration {}: best score {:.4}", iteration + 1, best_score);
        }

        Ok(SearchOutcome {
            score: best_score,
            route: best_route,
            improved_at,
            iterations_run: score_history.len(),
            cancelled,
            score_history,
        })
    }

    fn out_of_time(&self, start: Instant) -> bool {
        self.config
            .time_limit
            .map_or(false, |limit| start.elapsed().as_secs_f64() >= limit)
    }

    /// Draw a move for every pair, in pair order. With time windows only
    /// pairs whose second stop opens earlier than the first are kept.
    fn plan_moves(&self, pairs: Vec<(Stop, Stop)>, rng: &mut ChaCha8Rng) -> Result<Vec<PlannedMove>> {
        let mut moves = Vec::with_capacity(pairs.len());
        for (a, b) in pairs {
            let mv = if self.config.with_time_windows {
                match self.opens_earlier(&b, &a) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) if e.is_candidate_local() => {
                        log::debug!("Skipping pair ({}, {}): {}", a, b, e);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
                if rng.gen_bool(0.5) {
                    Move::SwapTimeWindow(a, b)
                } else {
                    Move::TwoOptTimeWindow(a, b)
                }
            } else if rng.gen_bool(0.5) {
                Move::TwoOpt(b, a)
            } else {
                Move::Swap(a, b)
            };
            moves.push(PlannedMove { pair: (a, b), mv });
        }
        Ok(moves)
    }

    fn opens_earlier(&self, a: &Stop, b: &Stop) -> Result<bool> {
        Ok(self.time_start(a)? < self.time_start(b)?)
    }

    /// Start of the delivery window behind a stop. A store visit takes the
    /// window of its attached job.
    fn time_start(&self, stop: &Stop) -> Result<f64> {
        let job = match stop {
            Stop::Job(id) => *id,
            Stop::Store(visit) => visit
                .job
                .ok_or_else(|| SolverError::malformed(format!("{} has no attached job", stop)))?,
        };
        Ok(self.instance.job(job)?.time_start())
    }

    /// Apply a move to a copy of `best` and score it. Candidate-local
    /// failures reject the candidate, anything else aborts the run.
    fn candidate(&self, best: &Route<'a>, planned: &PlannedMove) -> Result<Option<(f64, Route<'a>)>> {
        let mut route = best.clone();
        match self.apply_and_score(&mut route, &planned.mv) {
            Ok(score) => Ok(Some((score, route))),
            Err(e) if e.is_candidate_local() => {
                log::debug!("Rejected {:?}: {}", planned.mv, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn apply_and_score(&self, route: &mut Route<'a>, mv: &Move) -> Result<f64> {
        let returns = self.config.driver_returns_to_start;
        route.apply(mv)?;
        let mut score = route.score(returns)?;
        if !self.config.allow_infeasibilities && !self.config.with_time_windows && score > PRECEDENCE_PENALTY {
            route.repair(self.codec, false)?;
            score = route.score(returns)?;
        }
        Ok(score)
    }
}
