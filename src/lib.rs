#![warn(missing_docs)]

//! Orientation core for X-ray and neutron diffractometers. \
//! Converts between reciprocal-space coordinates (pseudo axes, e.g. `h, k, l` or `q`) and
//! motor angles (real axes) for a chosen diffractometer geometry, keeps the samples with
//! their lattices, reflections and orientation matrices, and persists all of it as a
//! configuration document.
//!
//! ## Interface
//! The central struct of this library is [`Core`]. It binds the declared axes of one
//! diffractometer ([`Positioners`]) to a [`Solver`] backend and translates every call
//! between the diffractometer's axis names and the solver's. \
//! In most cases, it is created through a [`DiffractometerConfig`], which picks the solver
//! from a [`SolverRegistry`] and assigns the axes in declaration order.
//! Additional parameters are set via `DiffractometerConfig::with_*()` functions.
//!
//! Example:
//! ```rust
//! use hklrs::{DiffractometerConfig, SolverRegistry};
//!
//! let mut powder = DiffractometerConfig::new("th_tth", "TH TTH Q")
//!     .with_wavelength(1.)
//!     .build(&SolverRegistry::default())?;
//! let reals = powder.move_to([1.095231])?;
//! assert!((reals["tth"] - 10.).abs() < 1e-4);
//! # Ok::<(), hklrs::Error>(())
//! ```
//!
//! After constructing, the typical orientation workflow on [`Core`] is:
//! - add a [`Sample`] with its [`Lattice`],
//! - record reflections with [`Core::add_reflection`],
//! - compute UB with [`Core::calc_ub`] (optionally [`Core::refine_lattice`]),
//! - move in reciprocal space with [`Core::forward`] and read back with [`Core::inverse`].
//!
//! ## Solvers
//! - `th_tth`: `TH TTH Q` geometry, pseudo axis `q`, real axes `th, tth`.
//! - `fourc`: Eulerian four-circle `E4CV`, engine `hkl`, real axes `omega, chi, phi, tth`.
//! - `no_op`: accepts any geometry and never finds a solution.
//!
//! Further backends are added with [`SolverRegistry::register`].

pub mod configure;
pub mod constraints;
pub(crate) mod core;
pub mod diffractometer;
pub mod error;
pub(crate) mod geometry;
pub mod lattice;
pub(crate) mod ndarray_utils;
pub mod ordered_map;
pub mod reflection;
pub mod sample;
pub mod selection;
pub mod solvers;

pub use configure::{Configuration, RestoreOptions};
pub use constraints::{Constraint, LimitsConstraint, RealAxisConstraints};
pub use crate::core::{Core, DEFAULT_SAMPLE_NAME, DEFAULT_WAVELENGTH, Positioners};
pub use diffractometer::{Diffractometer, DiffractometerConfig};
pub use error::{Error, Result};
pub use lattice::{CrystalSystem, Lattice};
pub use ordered_map::{AxisInput, OrderedMap, Positions};
pub use reflection::{Reflection, ReflectionsDict};
pub use sample::Sample;
pub use selection::{Selector, pick_closest_solution, pick_first_solution};
pub use solvers::{Solver, SolverError, SolverRegistry};
