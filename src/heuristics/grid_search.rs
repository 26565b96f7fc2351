//! Sweep over iteration counts and tabu list sizes.

use crate::codec::Codec;
use crate::config::GridSearchConfig;
use crate::error::{Result, SolverError};
use crate::evaluators::Evaluator;
use crate::heuristics::hill_climbing::{HillClimbing, StopSignal};
use crate::instance::ProblemInstance;
use crate::route::Route;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Score of one `(iterations, tabu_size)` combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridTrial {
    pub iterations: usize,
    pub tabu_size: usize,
    pub score: f64,
    pub improved_at: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct GridSearchResult<'a> {
    pub score: f64,
    pub route: Route<'a>,
    pub iterations: usize,
    pub tabu_size: usize,
    pub trials: Vec<GridTrial>,
}

/// Spread of trial scores across the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridSummary {
    pub trials: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub best: f64,
    pub worst: f64,
}

impl GridSearchResult<'_> {
    pub fn summary(&self) -> GridSummary {
        let scores: Vec<f64> = self.trials.iter().map(|t| t.score).collect();
        let std_dev = if scores.len() > 1 { scores.iter().std_dev() } else { 0.0 };
        GridSummary {
            trials: scores.len(),
            mean: scores.iter().mean(),
            std_dev,
            best: Statistics::min(scores.iter()),
            worst: Statistics::max(scores.iter()),
        }
    }
}

pub struct GridSearch<'a> {
    instance: &'a ProblemInstance,
    evaluator: &'a dyn Evaluator,
    codec: &'a Codec,
    config: GridSearchConfig,
    show_progress: bool,
}

impl<'a> GridSearch<'a> {
    pub fn new(instance: &'a ProblemInstance, codec: &'a Codec, config: GridSearchConfig) -> Result<Self> {
        config.validate()?;
        Ok(GridSearch {
            instance,
            evaluator: config.search.evaluator_kind().evaluator(),
            codec,
            config,
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &GridSearchConfig {
        &self.config
    }

    pub fn run(&self) -> Result<GridSearchResult<'a>> {
        self.run_with_signal(&StopSignal::new())
    }

    /// Run every combination from a fresh initial solution and keep the
    /// strictly best one. A stop request ends the sweep after the running
    /// combination.
    pub fn run_with_signal(&self, signal: &StopSignal) -> Result<GridSearchResult<'a>> {
        let combinations = self.config.combinations();
        let progress = self.progress_bar(combinations.len() as u64);

        let mut best: Option<GridSearchResult<'a>> = None;
        let mut trials = Vec::with_capacity(combinations.len());

        for (iterations, tabu_size) in combinations {
            log::info!("Testing {} iterations with tabu list size {}", iterations, tabu_size);
            progress.set_message(format!("{} it / tabu {}", iterations, tabu_size));

            let mut hc = HillClimbing::with_evaluator(
                self.instance,
                self.evaluator,
                self.codec,
                self.config.search_config(iterations, tabu_size),
            )?;
            hc.generate_initial_solution()?;
            let outcome = hc.solve_with_signal(signal)?;

            trials.push(GridTrial {
                iterations,
                tabu_size,
                score: outcome.score,
                improved_at: outcome.improved_at,
            });
            if best.as_ref().map_or(true, |b| outcome.score < b.score) {
                best = Some(GridSearchResult {
                    score: outcome.score,
                    route: outcome.route,
                    iterations,
                    tabu_size,
                    trials: Vec::new(),
                });
            }
            progress.inc(1);

            if outcome.cancelled {
                log::warn!("Grid search stopped after {} combinations", trials.len());
                break;
            }
        }
        progress.finish_and_clear();

        let mut result =
            best.ok_or_else(|| SolverError::InvalidConfig("grid search has no combinations".to_string()))?;
        log::info!(
            "Best results with score {:.4}: {} iterations, tabu list size {}",
            result.score,
            result.iterations,
            result.tabu_size
        );
        result.trials = trials;
        Ok(result)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}") {
            bar.set_style(style);
        }
        bar
    }
}
