//! sminalib: smina-style molecular docking behind a single configuration-driven call
//!
//! [`run`] takes the smina option set as a key/value mapping and returns the
//! docked (or scored, minimized, randomized) poses as multi-record SDF text.
//! The engine underneath reads PDBQT, types atoms for the Vina family of
//! scoring functions, precomputes receptor grids, and searches with Monte
//! Carlo plus BFGS refinement.

pub mod atom;
pub mod config;
pub mod docking;
pub mod error;
pub mod forcefield;
pub mod grid;
pub mod io;
pub mod math;
pub mod molecule;
pub mod optimization;
pub mod scoring;
pub mod search_space;

#[cfg(feature = "python")]
mod python;

// Re-export commonly used types and functions
pub use atom::Atom;
pub use config::{ConfigMap, ConfigValue, DockingConfig};
pub use docking::{run, run_config};
pub use error::{Error, Result};
pub use molecule::Molecule;
pub use optimization::DockingResult;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
