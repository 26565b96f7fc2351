//! Search parameters, loadable from JSON files.

use crate::error::{Result, SolverError};
use crate::evaluators::EvaluatorKind;
use crate::heuristics::construction::InitializationMethod;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Parameters of one hill-climbing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of outer iterations
    pub iterations: usize,
    /// Enable the tabu list
    pub tabu: bool,
    pub tabu_size: usize,
    /// Keep routes that break precedence instead of repairing them
    pub allow_infeasibilities: bool,
    /// Score with arrival times and duplicate stores per job
    pub with_time_windows: bool,
    /// Score the leg back to the deliverer
    pub driver_returns_to_start: bool,
    pub initialization: InitializationMethod,
    /// Number of candidate routes built before the search
    pub initial_pool_size: usize,
    /// Seed of the first pool member; member `i` uses `initial_seed + i`
    pub initial_seed: u64,
    /// Seed of the pair enumeration, incremented per iteration
    pub pair_seed: u64,
    /// Seed of the move coin flips
    pub move_seed: u64,
    /// Score candidate batches with rayon
    pub parallel: bool,
    pub batch_size: usize,
    /// Wall-clock limit in seconds, checked between iterations
    pub time_limit: Option<f64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            iterations: 5,
            tabu: false,
            tabu_size: 5,
            allow_infeasibilities: false,
            with_time_windows: false,
            driver_returns_to_start: true,
            initialization: InitializationMethod::Random,
            initial_pool_size: 2000,
            initial_seed: 1,
            pair_seed: 1000,
            move_seed: 42,
            parallel: false,
            batch_size: 64,
            time_limit: None,
        }
    }
}

impl SearchConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: SearchConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_pool_size == 0 {
            return Err(SolverError::InvalidConfig("initial_pool_size must be at least 1".to_string()));
        }
        if self.parallel && self.batch_size == 0 {
            return Err(SolverError::InvalidConfig("batch_size must be at least 1".to_string()));
        }
        if let Some(limit) = self.time_limit {
            if !(limit > 0.0) {
                return Err(SolverError::InvalidConfig(format!("time_limit must be positive, got {}", limit)));
            }
        }
        self.initialization.heuristic()?;
        match (self.with_time_windows, self.initialization) {
            (true, InitializationMethod::Random) => Err(SolverError::InvalidConfig(
                "time-window scoring needs one store visit per job, use relaxed_random initialization".to_string(),
            )),
            (false, InitializationMethod::RelaxedRandom) => Err(SolverError::InvalidConfig(
                "relaxed_random initialization visits stores once per job and needs time-window scoring".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn evaluator_kind(&self) -> EvaluatorKind {
        EvaluatorKind::for_time_windows(self.with_time_windows)
    }

    /// Copy with every seed shifted for repeated run `run`. Run 0 keeps the
    /// configured seeds; initial pools of different runs do not overlap.
    pub fn for_run(&self, run: usize) -> SearchConfig {
        let run = run as u64;
        SearchConfig {
            initial_seed: self.initial_seed + run * self.initial_pool_size as u64,
            pair_seed: self.pair_seed + run * self.iterations.max(1) as u64 * 1_000,
            move_seed: self.move_seed + run,
            ..self.clone()
        }
    }

    /// Tabu capacity in effect; 0 when the tabu list is disabled.
    pub fn effective_tabu_size(&self) -> usize {
        if self.tabu {
            self.tabu_size
        } else {
            0
        }
    }
}

/// Ranges swept by the grid search. Ends are exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSearchConfig {
    pub iterations_start: usize,
    pub iterations_end: usize,
    pub iterations_step: usize,
    pub tabu_size_start: usize,
    pub tabu_size_end: usize,
    /// Settings shared by every combination
    pub search: SearchConfig,
}

impl Default for GridSearchConfig {
    fn default() -> Self {
        GridSearchConfig {
            iterations_start: 10,
            iterations_end: 51,
            iterations_step: 10,
            tabu_size_start: 1,
            tabu_size_end: 6,
            search: SearchConfig::default(),
        }
    }
}

impl GridSearchConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: GridSearchConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations_step == 0 {
            return Err(SolverError::InvalidConfig("iterations_step must be at least 1".to_string()));
        }
        if self.iterations_start >= self.iterations_end {
            return Err(SolverError::InvalidConfig(format!(
                "empty iteration range {}..{}",
                self.iterations_start, self.iterations_end
            )));
        }
        if self.tabu_size_start >= self.tabu_size_end {
            return Err(SolverError::InvalidConfig(format!(
                "empty tabu size range {}..{}",
                self.tabu_size_start, self.tabu_size_end
            )));
        }
        self.search.validate()
    }

    pub fn iteration_values(&self) -> impl Iterator<Item = usize> {
        (self.iterations_start..self.iterations_end).step_by(self.iterations_step.max(1))
    }

    pub fn tabu_size_values(&self) -> impl Iterator<Item = usize> {
        self.tabu_size_start..self.tabu_size_end
    }

    /// `(iterations, tabu_size)` for every combination, iterations outermost.
    pub fn combinations(&self) -> Vec<(usize, usize)> {
        self.iteration_values()
            .flat_map(|i| self.tabu_size_values().map(move |t| (i, t)))
            .collect()
    }

    /// Search settings for one combination.
    pub fn search_config(&self, iterations: usize, tabu_size: usize) -> SearchConfig {
        SearchConfig {
            iterations,
            tabu_size,
            ..self.search.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.iterations, 5);
        assert_eq!(config.tabu_size, 5);
        assert_eq!(config.pair_seed, 1000);
        assert!(config.driver_returns_to_start);
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_tabu_size(), 0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SearchConfig =
            serde_json::from_str(r#"{"iterations": 12, "tabu": true, "initialization": "relaxed_random"}"#).unwrap();
        assert_eq!(config.iterations, 12);
        assert_eq!(config.effective_tabu_size(), 5);
        assert_eq!(config.initialization, InitializationMethod::RelaxedRandom);
        assert_eq!(config.initial_pool_size, 2000);
    }

    #[test]
    fn test_validation() {
        let empty_pool = SearchConfig {
            initial_pool_size: 0,
            ..SearchConfig::default()
        };
        assert!(matches!(empty_pool.validate(), Err(SolverError::InvalidConfig(_))));

        let greedy = SearchConfig {
            initialization: InitializationMethod::Greedy,
            ..SearchConfig::default()
        };
        assert!(matches!(greedy.validate(), Err(SolverError::NotImplemented(_))));

        let no_batch = SearchConfig {
            parallel: true,
            batch_size: 0,
            ..SearchConfig::default()
        };
        assert!(no_batch.validate().is_err());
    }

    #[test]
    fn test_initialization_must_match_scoring_mode() {
        let time_windows_random = SearchConfig {
            with_time_windows: true,
            ..SearchConfig::default()
        };
        assert!(matches!(time_windows_random.validate(), Err(SolverError::InvalidConfig(_))));

        let distance_relaxed = SearchConfig {
            initialization: InitializationMethod::RelaxedRandom,
            ..SearchConfig::default()
        };
        assert!(matches!(distance_relaxed.validate(), Err(SolverError::InvalidConfig(_))));

        let time_windows_relaxed = SearchConfig {
            with_time_windows: true,
            initialization: InitializationMethod::RelaxedRandom,
            ..SearchConfig::default()
        };
        assert!(time_windows_relaxed.validate().is_ok());
    }

    #[test]
    fn test_for_run_shifts_seeds() {
        let config = SearchConfig {
            initial_pool_size: 10,
            ..SearchConfig::default()
        };
        assert_eq!(config.for_run(0), config);
        let second = config.for_run(1);
        assert_eq!(second.initial_seed, 11);
        assert_eq!(second.move_seed, 43);
        assert!(second.pair_seed > config.pair_seed);
        assert_eq!(second.iterations, config.iterations);
    }

    #[test]
    fn test_grid_combinations() {
        let grid = GridSearchConfig {
            iterations_start: 10,
            iterations_end: 31,
            iterations_step: 10,
            tabu_size_start: 2,
            tabu_size_end: 4,
            ..GridSearchConfig::default()
        };
        assert!(grid.validate().is_ok());
        assert_eq!(grid.combinations(), vec![(10, 2), (10, 3), (20, 2), (20, 3), (30, 2), (30, 3)]);

        let config = grid.search_config(20, 3);
        assert_eq!((config.iterations, config.tabu_size), (20, 3));
        assert_eq!(config.pair_seed, grid.search.pair_seed);
    }

    #[test]
    fn test_grid_validation() {
        let zero_step = GridSearchConfig {
            iterations_step: 0,
            ..GridSearchConfig::default()
        };
        assert!(zero_step.validate().is_err());

        let empty_tabu = GridSearchConfig {
            tabu_size_start: 3,
            tabu_size_end: 3,
            ..GridSearchConfig::default()
        };
        assert!(empty_tabu.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("pd_tour_grid_{}.json", std::process::id()));
        fs::write(&path, r#"{"iterations_start": 1, "iterations_end": 3, "search": {"tabu": true}}"#).unwrap();
        let grid = GridSearchConfig::from_file(&path).unwrap();
        assert_eq!(grid.combinations().len(), 5);
        assert!(grid.search.tabu);
        fs::remove_file(&path).ok();
    }
}
