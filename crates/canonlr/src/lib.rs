//! Canonical LR(1) automaton construction, parse table generation and
//! table-driven parse simulation.

pub mod analysis;
pub mod first_sets;
pub mod grammar;
pub mod item;
pub mod item_automaton;
pub mod simulator;
pub mod state_automaton;
pub mod table;
pub mod types;
pub mod util;
