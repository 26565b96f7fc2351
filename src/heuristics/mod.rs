//! Construction and improvement heuristics.
//!
//! Routes are built by random construction over an initial pool, then
//! improved by hill climbing. Grid search tunes the climber's iteration
//! count and tabu list size.

pub mod construction;
pub mod grid_search;
pub mod hill_climbing;
pub mod tabu;

pub use construction::*;
pub use grid_search::*;
pub use hill_climbing::*;
pub use tabu::TabuList;
