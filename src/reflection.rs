//! Measured reflections and the per-sample collection of them.
//!
//! A [`Reflection`] pairs a point in reciprocal space (pseudo axes) with the motor
//! position (real axes) at which it was observed. Axis names are the solver's
//! canonical names so stored reflections do not depend on how a particular
//! diffractometer names its motors.

use itertools::Itertools;
use log::debug;

use crate::error::{Error, Result};
use crate::geometry::round_to;
use crate::lattice::DEFAULT_DIGITS;
use crate::ordered_map::{OrderedMap, Positions};

/// One observed correspondence between pseudo and real axes.
#[derive(Clone, Debug)]
pub struct Reflection {
    name: String,
    pseudos: Positions,
    reals: Positions,
    wavelength: f64,
    geometry: String,
    pseudo_axis_names: Vec<String>,
    real_axis_names: Vec<String>,
    /// Number of decimal places used for display and comparison.
    pub digits: u32,
}

impl Reflection {
    /// Create a reflection, validating both axis maps against the expected names.
    ///
    /// # Arguments
    /// - `pseudos`, `reals`: must contain exactly the names in
    ///   `pseudo_axis_names`/`real_axis_names`. They are stored in that order.
    /// - `wavelength`: must be strictly positive.
    pub fn new(
        name: impl Into<String>,
        pseudos: Positions,
        reals: Positions,
        wavelength: f64,
        geometry: impl Into<String>,
        pseudo_axis_names: &[String],
        real_axis_names: &[String],
    ) -> Result<Self> {
        let name = name.into();
        let pseudos = validated("pseudos", &name, pseudos, pseudo_axis_names)?;
        let reals = validated("reals", &name, reals, real_axis_names)?;
        check_wavelength(&name, wavelength)?;
        Ok(Self {
            name,
            pseudos,
            reals,
            wavelength,
            geometry: geometry.into(),
            pseudo_axis_names: pseudo_axis_names.to_vec(),
            real_axis_names: real_axis_names.to_vec(),
            digits: DEFAULT_DIGITS,
        })
    }

    /// Name, unique within a [`ReflectionsDict`].
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pseudo-axis values in solver order.
    pub fn pseudos(&self) -> &Positions {
        &self.pseudos
    }

    /// Real-axis values in solver order.
    pub fn reals(&self) -> &Positions {
        &self.reals
    }

    /// Wavelength at which the reflection was observed.
    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    /// Geometry tag of the solver that produced the axis names.
    pub fn geometry(&self) -> &str {
        &self.geometry
    }

    /// Expected pseudo-axis names.
    pub fn pseudo_axis_names(&self) -> &[String] {
        &self.pseudo_axis_names
    }

    /// Expected real-axis names.
    pub fn real_axis_names(&self) -> &[String] {
        &self.real_axis_names
    }

    /// Replace the pseudo-axis values.
    pub fn set_pseudos(&mut self, pseudos: Positions) -> Result<()> {
        self.pseudos = validated("pseudos", &self.name, pseudos, &self.pseudo_axis_names)?;
        Ok(())
    }

    /// Replace the real-axis values.
    pub fn set_reals(&mut self, reals: Positions) -> Result<()> {
        self.reals = validated("reals", &self.name, reals, &self.real_axis_names)?;
        Ok(())
    }

    /// Replace the wavelength.
    pub fn set_wavelength(&mut self, wavelength: f64) -> Result<()> {
        check_wavelength(&self.name, wavelength)?;
        self.wavelength = wavelength;
        Ok(())
    }
}

fn check_wavelength(name: &str, wavelength: f64) -> Result<()> {
    if wavelength > 0. && wavelength.is_finite() {
        Ok(())
    } else {
        Err(Error::Reflection(format!(
            "{name}: wavelength must be positive, received {wavelength}"
        )))
    }
}

/// Check that `values` has exactly the `expected` keys and return it in `expected` order.
fn validated(kind: &str, name: &str, values: Positions, expected: &[String]) -> Result<Positions> {
    let missing = expected.iter().filter(|n| !values.contains_key(n)).collect_vec();
    if !missing.is_empty() {
        return Err(Error::Reflection(format!(
            "{name}: missing {kind} {missing:?}, expected {expected:?}"
        )));
    }
    let unexpected = values
        .keys()
        .filter(|k| !expected.iter().any(|n| n.as_str() == *k))
        .collect_vec();
    if !unexpected.is_empty() {
        return Err(Error::Reflection(format!(
            "{name}: unexpected {kind} {unexpected:?}, expected {expected:?}"
        )));
    }
    if let Some((axis, value)) = values.iter().find(|(_, v)| !v.is_finite()) {
        return Err(Error::Reflection(format!(
            "{name}: {kind} {axis} is not a finite number ({value})"
        )));
    }
    Ok(expected.iter().map(|n| (n.clone(), values[n.as_str()])).collect())
}

fn positions_close(p1: &Positions, p2: &Positions, digits: u32) -> bool {
    p1.len() == p2.len()
        && p1.iter().all(|(k, v)| {
            p2.get(k)
                .is_some_and(|w| round_to(*v, digits) == round_to(*w, digits))
        })
}

impl PartialEq for Reflection {
    /// Same pseudos, reals and wavelength after rounding. The name is ignored.
    fn eq(&self, other: &Self) -> bool {
        let digits = self.digits.min(other.digits);
        positions_close(&self.pseudos, &other.pseudos, digits)
            && positions_close(&self.reals, &other.reals, digits)
            && round_to(self.wavelength, digits) == round_to(other.wavelength, digits)
    }
}

/// Reflections of one sample, plus the subset designated for orientation.
///
/// `order` is independent of insertion order: it lists the reflections used, in turn,
/// by the orientation calculation.
#[derive(Clone, Debug, Default)]
pub struct ReflectionsDict {
    reflections: OrderedMap<Reflection>,
    order: Vec<String>,
    geometry: Option<String>,
}

impl ReflectionsDict {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Geometry shared by all reflections, fixed by the first one added.
    pub fn geometry(&self) -> Option<&str> {
        self.geometry.as_deref()
    }

    /// Number of reflections.
    pub fn len(&self) -> usize {
        self.reflections.len()
    }

    /// Whether there are no reflections.
    pub fn is_empty(&self) -> bool {
        self.reflections.is_empty()
    }

    /// Reflection names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.reflections.key_names()
    }

    /// Reflections in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Reflection> {
        self.reflections.values()
    }

    /// Reflection called `name`.
    pub fn get(&self, name: &str) -> Option<&Reflection> {
        self.reflections.get(name)
    }

    /// Reflection called `name`, or an error listing the known names.
    pub fn require(&self, name: &str) -> Result<&Reflection> {
        self.get(name)
            .ok_or_else(|| Error::unknown("reflection", name, self.reflections.keys()))
    }

    /// Names designated for the orientation calculation.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Add a reflection.
    ///
    /// A reflection with the same name, or with the same content under another name,
    /// is rejected unless `replace` is set, in which case those entries are dropped first.
    pub fn add(&mut self, reflection: Reflection, replace: bool) -> Result<()> {
        if let Some(geometry) = &self.geometry {
            if geometry != reflection.geometry() {
                return Err(Error::Reflection(format!(
                    "{}: geometry {:?} does not match {:?}",
                    reflection.name(),
                    reflection.geometry(),
                    geometry
                )));
            }
        }

        if self.reflections.contains_key(reflection.name()) && !replace {
            return Err(Error::Reflection(format!(
                "{} already exists, use replace to overwrite it",
                reflection.name()
            )));
        }

        let duplicates = self
            .iter()
            .filter(|r| r.name() != reflection.name() && *r == &reflection)
            .map(|r| r.name().to_string())
            .collect_vec();
        if !duplicates.is_empty() {
            if !replace {
                return Err(Error::Reflection(format!(
                    "{} matches existing {duplicates:?}, use replace to overwrite",
                    reflection.name()
                )));
            }
            for name in &duplicates {
                debug!("Replacing reflection {name} with {}.", reflection.name());
                self.reflections.remove(name);
            }
        }

        if self.geometry.is_none() {
            self.geometry = Some(reflection.geometry().to_string());
        }
        let name = reflection.name().to_string();
        self.reflections.insert(name.clone(), reflection);
        if !self.order.contains(&name) {
            self.order.push(name);
        }
        self.prune();
        Ok(())
    }

    /// Remove and return the reflection called `name`.
    pub fn remove(&mut self, name: &str) -> Result<Reflection> {
        self.require(name)?;
        let removed = self.reflections.remove(name);
        self.prune();
        if self.reflections.is_empty() {
            self.geometry = None;
        }
        removed.ok_or_else(|| Error::unknown("reflection", name, self.reflections.keys()))
    }

    /// Remove every reflection.
    pub fn clear(&mut self) {
        self.reflections.clear();
        self.order.clear();
        self.geometry = None;
    }

    /// Designate the reflections used by the orientation calculation, in order.
    pub fn set_orientation_reflections<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        for name in names {
            self.require(name.as_ref())?;
        }
        if let Some(dup) = names.iter().map(AsRef::as_ref).duplicates().next() {
            return Err(Error::Reflection(format!("{dup} appears twice in the order")));
        }
        self.order = names.iter().map(|n| n.as_ref().to_string()).collect();
        Ok(())
    }

    /// Exchange the first two orientation reflections and return the new order.
    pub fn swap(&mut self) -> Result<&[String]> {
        if self.order.len() < 2 {
            return Err(Error::Reflection(format!(
                "need at least two orientation reflections to swap, have {:?}",
                self.order
            )));
        }
        self.order.swap(0, 1);
        Ok(self.order.as_slice())
    }

    /// Drop names from `order` that no longer refer to a reflection.
    pub fn prune(&mut self) {
        let reflections = &self.reflections;
        self.order.retain(|n| reflections.contains_key(n));
    }
}

impl PartialEq for ReflectionsDict {
    fn eq(&self, other: &Self) -> bool {
        self.order() == other.order()
            && self.names() == other.names()
            && self.iter().zip(other.iter()).all(|(r1, r2)| r1 == r2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn reflection(name: &str, q: f64, th: f64) -> Result<Reflection> {
        Reflection::new(
            name,
            Positions::from_names(&["q"], &[q]),
            [("tth", 2. * th), ("th", th)].into_iter().collect(),
            1.,
            "TH TTH Q",
            &names(&["q"]),
            &names(&["th", "tth"]),
        )
    }

    #[test]
    fn stored_in_expected_order() {
        let r = reflection("r1", 1., 5.).unwrap();
        assert_eq!(r.reals().key_names(), names(&["th", "tth"]));
    }

    #[test]
    fn rejects_wrong_keys() {
        let missing = Reflection::new(
            "r1",
            Positions::new(),
            Positions::from_names(&["th", "tth"], &[1., 2.]),
            1.,
            "TH TTH Q",
            &names(&["q"]),
            &names(&["th", "tth"]),
        );
        assert!(matches!(missing, Err(Error::Reflection(_))));

        let mut r = reflection("r1", 1., 5.).unwrap();
        let extra = Positions::from_names(&["th", "tth", "chi"], &[1., 2., 3.]);
        assert!(r.set_reals(extra).is_err());
        assert_eq!(r.reals()["th"], 5.);
    }

    #[test]
    fn rejects_bad_wavelength() {
        let mut r = reflection("r1", 1., 5.).unwrap();
        assert!(r.set_wavelength(0.).is_err());
        assert!(r.set_wavelength(-1.).is_err());
        assert!(r.set_wavelength(1.5).is_ok());
    }

    #[test]
    fn equality_ignores_name() {
        let r1 = reflection("r1", 1., 5.).unwrap();
        let r2 = reflection("r2", 1.00000001, 5.).unwrap();
        let r3 = reflection("r3", 1., 6.).unwrap();
        assert_eq!(r1, r2);
        assert_ne!(r1, r3);
    }

    #[test]
    fn add_rejects_collisions() {
        let mut dict = ReflectionsDict::new();
        dict.add(reflection("r1", 1., 5.).unwrap(), false).unwrap();

        assert!(dict.add(reflection("r1", 2., 7.).unwrap(), false).is_err());
        assert!(dict.add(reflection("r9", 1., 5.).unwrap(), false).is_err());

        dict.add(reflection("r9", 1., 5.).unwrap(), true).unwrap();
        assert_eq!(dict.names(), names(&["r9"]));
        assert_eq!(dict.order(), names(&["r9"]).as_slice());
    }

    #[test]
    fn add_rejects_other_geometry() {
        let mut dict = ReflectionsDict::new();
        dict.add(reflection("r1", 1., 5.).unwrap(), false).unwrap();
        let other = Reflection::new(
            "r2",
            Positions::from_names(&["q"], &[2.]),
            Positions::from_names(&["th", "tth"], &[1., 2.]),
            1.,
            "OTHER",
            &names(&["q"]),
            &names(&["th", "tth"]),
        )
        .unwrap();
        assert!(dict.add(other, false).is_err());
    }

    #[test]
    fn swap_is_an_involution() {
        let mut dict = ReflectionsDict::new();
        for (i, th) in [5., 10., 15.].into_iter().enumerate() {
            dict.add(reflection(&format!("r{i}"), th / 5., th).unwrap(), false)
                .unwrap();
        }
        assert_eq!(dict.swap().unwrap(), names(&["r1", "r0", "r2"]).as_slice());
        assert_eq!(dict.swap().unwrap(), names(&["r0", "r1", "r2"]).as_slice());
    }

    #[test]
    fn swap_needs_two() {
        let mut dict = ReflectionsDict::new();
        assert!(dict.swap().is_err());
        dict.add(reflection("r1", 1., 5.).unwrap(), false).unwrap();
        assert!(dict.swap().is_err());
    }

    #[test]
    fn order_is_pruned() {
        let mut dict = ReflectionsDict::new();
        dict.add(reflection("r1", 1., 5.).unwrap(), false).unwrap();
        dict.add(reflection("r2", 2., 10.).unwrap(), false).unwrap();
        dict.add(reflection("r3", 3., 15.).unwrap(), false).unwrap();
        dict.set_orientation_reflections(&["r3", "r1"]).unwrap();

        dict.remove("r3").unwrap();
        assert_eq!(dict.order(), names(&["r1"]).as_slice());
        assert!(dict.set_orientation_reflections(&["r3"]).is_err());
        assert!(dict.remove("r3").is_err());
    }
}
