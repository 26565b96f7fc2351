//! PD Tour Solver Library
//!
//! Local search for the single-driver pickup and delivery problem: one
//! deliverer collects goods at stores and drops them at customers, visiting
//! every store before the jobs it supplies.
//!
//! # Features
//!
//! - Haversine distance table over jobs, stores and the deliverer
//! - Distance scoring with precedence penalties, and arrival-time scoring
//!   for routes with delivery windows
//! - Hill climbing over 2-opt and swap moves with an optional tabu list,
//!   sequential or batched with rayon
//! - Route repair through an integer codec of request groups
//! - Grid search over iteration counts and tabu list sizes
//!
//! # Example
//!
//! ```no_run
//! use pd_tour_solver::codec::Codec;
//! use pd_tour_solver::config::SearchConfig;
//! use pd_tour_solver::heuristics::hill_climbing::HillClimbing;
//! use pd_tour_solver::instance::ProblemInstance;
//!
//! let instance = ProblemInstance::from_file("problem.json").unwrap();
//! let codec = Codec::new(&instance);
//!
//! let config = SearchConfig { iterations: 20, tabu: true, ..SearchConfig::default() };
//! let mut hc = HillClimbing::new(&instance, &codec, config).unwrap();
//! hc.generate_initial_solution().unwrap();
//! let outcome = hc.solve().unwrap();
//!
//! println!("Best score: {:.2}", outcome.score);
//! println!("{}", outcome.route.pretty_print());
//! ```

pub mod codec;
pub mod config;
pub mod distance;
pub mod error;
pub mod evaluators;
pub mod heuristics;
pub mod instance;
pub mod locations;
pub mod output;
pub mod route;

pub use error::{Result, SolverError};
pub use instance::ProblemInstance;
pub use route::Route;
