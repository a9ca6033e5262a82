//! Acceptance windows on real axes, used to filter forward solutions.

use std::fmt;

use itertools::Itertools;

use crate::error::{Error, Result};
use crate::ordered_map::{OrderedMap, Positions};

/// Default lower limit of a real axis.
pub const DEFAULT_LOW_LIMIT: f64 = -180.;
/// Default upper limit of a real axis.
pub const DEFAULT_HIGH_LIMIT: f64 = 180.;

/// A condition a set of real-axis values must satisfy.
pub trait Constraint: fmt::Debug + fmt::Display {
    /// Axis the constraint applies to.
    fn label(&self) -> &str;

    /// Whether `values` satisfy the constraint.
    ///
    /// Errors if `values` lacks the constrained axis.
    fn valid(&self, values: &Positions) -> Result<bool>;
}

/// Closed range `[low_limit, high_limit]` on one axis.
#[derive(Clone, Debug, PartialEq)]
pub struct LimitsConstraint {
    label: String,
    low_limit: f64,
    high_limit: f64,
}

impl LimitsConstraint {
    /// Create a constraint. The limits are sorted, so their order does not matter.
    pub fn new(label: impl Into<String>, low_limit: f64, high_limit: f64) -> Self {
        let (low_limit, high_limit) = sorted(low_limit, high_limit);
        Self {
            label: label.into(),
            low_limit,
            high_limit,
        }
    }

    /// Constraint spanning the default range.
    pub fn full_range(label: impl Into<String>) -> Self {
        Self::new(label, DEFAULT_LOW_LIMIT, DEFAULT_HIGH_LIMIT)
    }

    /// Lower limit.
    pub fn low_limit(&self) -> f64 {
        self.low_limit
    }

    /// Upper limit.
    pub fn high_limit(&self) -> f64 {
        self.high_limit
    }

    /// `(low_limit, high_limit)`.
    pub fn limits(&self) -> (f64, f64) {
        (self.low_limit, self.high_limit)
    }

    /// Set both limits, in either order.
    pub fn set_limits(&mut self, low_limit: f64, high_limit: f64) {
        (self.low_limit, self.high_limit) = sorted(low_limit, high_limit);
    }

    /// Set the lower limit. If it exceeds the upper limit the two are swapped.
    pub fn set_low_limit(&mut self, low_limit: f64) {
        self.set_limits(low_limit, self.high_limit)
    }

    /// Set the upper limit. If it is below the lower limit the two are swapped.
    pub fn set_high_limit(&mut self, high_limit: f64) {
        self.set_limits(self.low_limit, high_limit)
    }
}

fn sorted(x: f64, y: f64) -> (f64, f64) {
    if x <= y { (x, y) } else { (y, x) }
}

impl Constraint for LimitsConstraint {
    fn label(&self) -> &str {
        &self.label
    }

    fn valid(&self, values: &Positions) -> Result<bool> {
        let value = values.get(&self.label).ok_or_else(|| {
            Error::Constraints(format!(
                "{:?} is not among the supplied axes {:?}",
                self.label,
                values.key_names()
            ))
        })?;
        Ok(self.low_limit <= *value && *value <= self.high_limit)
    }
}

impl fmt::Display for LimitsConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <= {} <= {}", self.low_limit, self.label, self.high_limit)
    }
}

/// One [`LimitsConstraint`] per real axis, keyed by axis name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RealAxisConstraints {
    constraints: OrderedMap<LimitsConstraint>,
}

impl RealAxisConstraints {
    /// Full-range constraints for each of `axes`.
    pub fn new<S: AsRef<str>>(axes: &[S]) -> Self {
        Self {
            constraints: axes
                .iter()
                .map(|a| (a.as_ref(), LimitsConstraint::full_range(a.as_ref())))
                .collect(),
        }
    }

    /// Number of constrained axes.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Whether no axis is constrained.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Constrained axis names.
    pub fn axes(&self) -> Vec<String> {
        self.constraints.key_names()
    }

    /// Constraint of `axis`.
    pub fn get(&self, axis: &str) -> Option<&LimitsConstraint> {
        self.constraints.get(axis)
    }

    /// Mutable constraint of `axis`, or an error listing the constrained axes.
    pub fn get_mut(&mut self, axis: &str) -> Result<&mut LimitsConstraint> {
        let known = self.constraints.key_names();
        self.constraints
            .get_mut(axis)
            .ok_or_else(|| Error::unknown("constrained axis", axis, known))
    }

    /// Replace the constraint of its label's axis.
    pub fn set(&mut self, constraint: LimitsConstraint) {
        self.constraints.insert(constraint.label().to_string(), constraint);
    }

    /// Constraints in axis order.
    pub fn iter(&self) -> impl Iterator<Item = &LimitsConstraint> {
        self.constraints.values()
    }

    /// Restore every axis to the default range.
    pub fn reset(&mut self) {
        for c in self.constraints.values_mut() {
            c.set_limits(DEFAULT_LOW_LIMIT, DEFAULT_HIGH_LIMIT);
        }
    }

    /// Whether every constraint is satisfied by `reals`.
    pub fn valid(&self, reals: &Positions) -> Result<bool> {
        for c in self.constraints.values() {
            if !c.valid(reals)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Display for RealAxisConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.iter().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_are_sorted() {
        let mut c = LimitsConstraint::new("th", 10., -5.);
        assert_eq!(c.limits(), (-5., 10.));

        c.set_high_limit(-20.);
        assert_eq!(c.limits(), (-20., -5.));
        assert_eq!(c.to_string(), "-20 <= th <= -5");
    }

    #[test]
    fn valid_requires_label() {
        let c = LimitsConstraint::new("th", 0., 10.);
        let reals = Positions::from_names(&["th", "tth"], &[5., 10.]);
        assert!(c.valid(&reals).unwrap());
        assert!(!c.valid(&Positions::from_names(&["th"], &[11.])).unwrap());
        assert!(matches!(
            c.valid(&Positions::from_names(&["tth"], &[5.])),
            Err(Error::Constraints(_))
        ));
    }

    #[test]
    fn all_axes_must_pass() {
        let mut constraints = RealAxisConstraints::new(&["th", "tth"]);
        let reals = Positions::from_names(&["th", "tth"], &[5., 170.]);
        assert!(constraints.valid(&reals).unwrap());

        constraints.get_mut("tth").unwrap().set_limits(0., 120.);
        assert!(!constraints.valid(&reals).unwrap());

        constraints.reset();
        assert!(constraints.valid(&reals).unwrap());
        assert!(constraints.get_mut("chi").is_err());
    }

    #[test]
    fn display() {
        let constraints = RealAxisConstraints::new(&["th"]);
        assert_eq!(constraints.to_string(), "[-180 <= th <= 180]");
    }
}
