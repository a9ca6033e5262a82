//! Export and restore of the complete orientation state.
//!
//! [`Configuration`] is the serialized form of a [`Core`]: solver identity, axis
//! assignment, samples with their reflections and orientation matrices, constraints
//! and the beam wavelength. It maps one-to-one onto the YAML document written by
//! [`Diffractometer::export`](crate::Diffractometer::export).

use chrono::Utc;
use log::{debug, info};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::constraints::Constraint;
use crate::core::Core;
use crate::error::{Error, Result};
use crate::lattice::Lattice;
use crate::ordered_map::{OrderedMap, Positions};
use crate::reflection::Reflection;
use crate::sample::Sample;

/// `class` of every constraint record.
pub const LIMITS_CONSTRAINT_CLASS: &str = "LimitsConstraint";
/// `order` of a reflection not used for orientation.
pub const UNUSED_REFLECTION: &str = "unused";

/// Serialized [`Core`].
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(rename = "_header")]
    pub header: Header,
    pub name: String,
    pub axes: AxesRecord,
    pub sample_name: String,
    pub samples: OrderedMap<SampleRecord>,
    pub constraints: OrderedMap<ConstraintRecord>,
    pub solver: SolverRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beam: Option<BeamRecord>,
}

/// Informational only; ignored on restore. Missing fields read as empty.
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Header {
    pub datetime: String,
    pub version: String,
    pub class_name: String,
}

/// Axis assignment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxesRecord {
    /// Assigned pseudo axes, diffractometer names.
    pub pseudo_axes: Vec<String>,
    /// Assigned real axes, diffractometer names.
    pub real_axes: Vec<String>,
    /// Diffractometer name to solver name.
    pub axes_xref: OrderedMap<String>,
    /// Extra-axis values, solver names.
    #[serde(default)]
    pub extra_axes: Positions,
}

/// One sample.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub name: String,
    pub lattice: Lattice,
    pub reflections: OrderedMap<ReflectionRecord>,
    #[serde(rename = "U")]
    pub u: [[f64; 3]; 3],
    #[serde(rename = "UB")]
    pub ub: [[f64; 3]; 3],
    pub digits: u32,
}

/// One reflection, axes under solver names.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReflectionRecord {
    pub name: String,
    pub geometry: String,
    pub pseudos: Positions,
    pub reals: Positions,
    pub wavelength: f64,
    pub digits: u32,
    pub order: OrderSlot,
}

/// Position of a reflection in the orientation order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderSlot {
    /// Index into the orientation order.
    Index(usize),
    /// [`UNUSED_REFLECTION`].
    Label(String),
}

/// One real-axis constraint, labelled with the solver's axis name.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRecord {
    pub class: String,
    pub label: String,
    pub low_limit: f64,
    pub high_limit: f64,
}

/// Solver identity.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverRecord {
    pub name: String,
    pub geometry: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default)]
    pub mode: String,
    pub real_axes: Vec<String>,
    #[serde(default)]
    pub version: String,
}

/// Incident beam.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeamRecord {
    pub wavelength: f64,
}

/// What [`Core::restore`] does besides restoring samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestoreOptions {
    /// Reset constraints and drop all samples first.
    pub clear: bool,
    /// Apply the stored constraints.
    pub restore_constraints: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            clear: true,
            restore_constraints: true,
        }
    }
}

impl RestoreOptions {
    /// Set whether to clear existing state first.
    pub fn with_clear(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    /// Set whether to apply the stored constraints.
    pub fn with_restore_constraints(mut self, restore_constraints: bool) -> Self {
        self.restore_constraints = restore_constraints;
        self
    }
}

fn to_rows(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    std::array::from_fn(|i| std::array::from_fn(|j| m[(i, j)]))
}

fn from_rows(rows: &[[f64; 3]; 3]) -> Matrix3<f64> {
    Matrix3::from_fn(|i, j| rows[i][j])
}

impl SampleRecord {
    fn from_sample(sample: &Sample) -> Self {
        let order = sample.reflections.order();
        let reflections = sample
            .reflections
            .iter()
            .map(|r| {
                let slot = match order.iter().position(|n| n == r.name()) {
                    Some(i) => OrderSlot::Index(i),
                    None => OrderSlot::Label(UNUSED_REFLECTION.into()),
                };
                let record = ReflectionRecord {
                    name: r.name().to_string(),
                    geometry: r.geometry().to_string(),
                    pseudos: r.pseudos().clone(),
                    reals: r.reals().clone(),
                    wavelength: r.wavelength(),
                    digits: r.digits,
                    order: slot,
                };
                (r.name(), record)
            })
            .collect();
        Self {
            name: sample.name().to_string(),
            lattice: sample.lattice.clone(),
            reflections,
            u: to_rows(sample.u()),
            ub: to_rows(sample.ub()),
            digits: sample.digits(),
        }
    }
}

impl Core {
    /// Snapshot of the orientation state.
    pub fn configuration(&self) -> Configuration {
        let solver = self.solver();
        let constraints = self
            .constraints()
            .iter()
            .map(|c| {
                let label = self.solver_name(c.label()).to_string();
                let record = ConstraintRecord {
                    class: LIMITS_CONSTRAINT_CLASS.into(),
                    label: label.clone(),
                    low_limit: c.low_limit(),
                    high_limit: c.high_limit(),
                };
                (label, record)
            })
            .collect();

        Configuration {
            header: Header {
                datetime: Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").into(),
                class_name: self.class_name().into(),
            },
            name: self.name().into(),
            axes: AxesRecord {
                pseudo_axes: self.pseudo_axes().to_vec(),
                real_axes: self.real_axes().to_vec(),
                axes_xref: self.axes_xref().clone(),
                extra_axes: solver.extras(),
            },
            sample_name: self.sample_name().into(),
            samples: self
                .samples()
                .iter()
                .map(|(name, sample)| (name, SampleRecord::from_sample(sample)))
                .collect(),
            constraints,
            solver: SolverRecord {
                name: solver.name().into(),
                geometry: solver.geometry().into(),
                engine: solver.engine().map(str::to_string),
                mode: solver.mode().into(),
                real_axes: solver.real_axis_names(),
                version: solver.version().into(),
            },
            beam: Some(BeamRecord {
                wavelength: self.wavelength(),
            }),
        }
    }

    /// Check that `config` was exported from a diffractometer like this one.
    fn validate(&self, config: &Configuration) -> Result<()> {
        let solver = self.solver();
        let mismatch = |field: &'static str, incoming: &str, existing: &str| {
            if incoming == existing {
                Ok(())
            } else {
                Err(Error::ConfigurationMismatch {
                    field,
                    incoming: incoming.to_string(),
                    existing: existing.to_string(),
                })
            }
        };
        mismatch("solver.name", &config.solver.name, solver.name())?;
        if let Some(engine) = solver.engine() {
            mismatch(
                "solver.engine",
                config.solver.engine.as_deref().unwrap_or_default(),
                engine,
            )?;
        }
        mismatch("solver.geometry", &config.solver.geometry, solver.geometry())?;
        mismatch(
            "solver.real_axes",
            &config.solver.real_axes.join(", "),
            &solver.real_axis_names().join(", "),
        )?;

        let existing = if self.axes_assigned() {
            self.pseudo_axes().to_vec()
        } else {
            self.positioners().pseudo_axes().to_vec()
        };
        let incoming = &config.axes.pseudo_axes;
        let n = existing.len().min(incoming.len());
        mismatch("axes.pseudo_axes", &incoming[..n].join(", "), &existing[..n].join(", "))?;

        if config.samples.is_empty() {
            return Err(Error::Configuration("no samples".into()));
        }
        if let Some(c) = config
            .constraints
            .values()
            .find(|c| c.class != LIMITS_CONSTRAINT_CLASS)
        {
            return Err(Error::Configuration(format!(
                "constraint {:?} has unknown class {:?}",
                c.label, c.class
            )));
        }
        Ok(())
    }

    /// Restore the orientation state from `config`.
    ///
    /// The document must describe the same solver, geometry and real axes as this
    /// core, otherwise [`Error::ConfigurationMismatch`] is returned before anything
    /// changes. Later steps are not transactional: an error while restoring samples
    /// or selecting the current sample leaves the earlier steps applied.
    pub fn restore(&mut self, config: &Configuration, options: RestoreOptions) -> Result<()> {
        self.validate(config)?;

        if !self.axes_assigned() {
            // Extra axes exist only in the stored mode.
            self.set_mode(&config.solver.mode)?;
            let axes = &config.axes;
            let extras: Vec<&str> = axes
                .axes_xref
                .keys()
                .filter(|k| !axes.pseudo_axes.iter().chain(&axes.real_axes).any(|a| a == *k))
                .collect();
            let pseudos: Vec<&str> = axes.pseudo_axes.iter().map(String::as_str).collect();
            let reals: Vec<&str> = axes.real_axes.iter().map(String::as_str).collect();
            self.assign_axes(pseudos.as_slice(), reals.as_slice(), extras.as_slice())?;
        }

        if options.clear {
            self.constraints_mut().reset();
            self.reset_samples()?;
        }

        if options.restore_constraints {
            for record in config.constraints.values() {
                let local = self.local_name(&record.label).to_string();
                self.constraints_mut()
                    .get_mut(&local)?
                    .set_limits(record.low_limit, record.high_limit);
            }
        }

        for record in config.samples.values() {
            let sample = self.restore_sample(record)?;
            debug!("restored {sample}");
            self.add_sample(sample, true)?;
        }

        self.set_sample(&config.sample_name)?;
        self.set_mode(&config.solver.mode)?;
        self.set_extras(&config.axes.extra_axes)?;
        if let Some(beam) = &config.beam {
            self.set_wavelength(beam.wavelength)?;
        }
        info!(
            "{}: restored {} samples, current {:?}",
            self.name(),
            config.samples.len(),
            config.sample_name
        );
        Ok(())
    }

    /// Rebuild a sample. Real-axis values are assigned by position to the solver's
    /// real axes, whatever their stored names.
    fn restore_sample(&self, record: &SampleRecord) -> Result<Sample> {
        let solver = self.solver();
        let pseudo_names = solver.pseudo_axis_names();
        let real_names = solver.real_axis_names();

        let mut sample = Sample::new(Some(record.name.as_str()), record.lattice.clone())?;
        sample.set_digits(record.digits);

        let mut order: Vec<(usize, &str)> = Vec::new();
        for r in record.reflections.values() {
            let reals = Positions::from_names(&real_names, &r.reals.to_vec());
            let mut reflection = Reflection::new(
                r.name.as_str(),
                r.pseudos.clone(),
                reals,
                r.wavelength,
                r.geometry.as_str(),
                &pseudo_names,
                &real_names,
            )?;
            reflection.digits = r.digits;
            sample.reflections.add(reflection, false)?;
            match &r.order {
                OrderSlot::Index(i) => order.push((*i, r.name.as_str())),
                OrderSlot::Label(label) if label == UNUSED_REFLECTION => {}
                OrderSlot::Label(label) => {
                    return Err(Error::Configuration(format!(
                        "reflection {:?} has order {label:?}, \
                         expected an index or {UNUSED_REFLECTION:?}",
                        r.name
                    )));
                }
            }
        }
        order.sort_by_key(|(i, _)| *i);
        let order: Vec<&str> = order.into_iter().map(|(_, n)| n).collect();
        sample.reflections.set_orientation_reflections(order.as_slice())?;

        sample.set_u(from_rows(&record.u))?;
        sample.set_ub(from_rows(&record.ub))?;
        Ok(sample)
    }
}
