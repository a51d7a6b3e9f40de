//! Memory footprint and reclamation demonstrations.
//!
//! This module makes two memory behaviors measurable:
//!
//! - **Layout cost**: [`layout`] compares dynamic, map-backed records against
//!   fixed-field structs across large populations and reports per-instance
//!   and total footprint alongside build times.
//!
//! - **Reclamation**: [`cycles`] builds reference-counted node graphs and
//!   reports which nodes actually ran their destructors, showing how a strong
//!   cycle keeps unreachable nodes alive until a link is weakened or severed.
//!
//! # Example
//!
//! ```
//! use glassbox::memory::{benchmark_layouts, run_cycle_demo};
//!
//! let layouts = benchmark_layouts(1_000);
//! assert!(layouts.ratio() > 1.0);
//!
//! let cycles = run_cycle_demo();
//! assert!(cycles.strong.leaked());
//! assert!(!cycles.weak.leaked());
//! ```

pub mod cycles;
pub mod layout;

pub use cycles::{run_cycle_demo, CycleDemo, CycleReport, DropTally, StrongNode, WeakNode};
pub use layout::{benchmark_layouts, DeepSize, DynPoint, FixedPoint, LayoutReport};
