//! Insertion-ordered maps keyed by axis (or reflection, sample) name.
//!
//! Axis order is defined by the solver and carries meaning, so none of these maps
//! are ever sorted.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use itertools::Itertools;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Map from names to values that remembers insertion order.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
}

/// Axis values keyed by axis name.
pub type Positions = OrderedMap<f64>;

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    /// Insert a value. An existing key keeps its place and gets the new value,
    /// which is returned alongside the old one.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.position(&key) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Mutable value stored under `key`.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Remove `key`, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear()
    }

    /// Keep only the entries for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&str, &V) -> bool) {
        self.entries.retain(|(k, v)| f(k, v))
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Values in order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Mutable values in order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.iter_mut().map(|(_, v)| v)
    }

    /// Entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys in order, as owned strings.
    pub fn key_names(&self) -> Vec<String> {
        self.keys().map(str::to_string).collect()
    }
}

impl OrderedMap<f64> {
    /// Build positions by zipping names with values.
    pub fn from_names<S: AsRef<str>>(names: &[S], values: &[f64]) -> Self {
        names
            .iter()
            .zip(values)
            .map(|(n, v)| (n.as_ref().to_string(), *v))
            .collect()
    }

    /// Values in order as a vector.
    pub fn to_vec(&self) -> Vec<f64> {
        self.values().copied().collect()
    }
}

impl<V> Index<&str> for OrderedMap<V> {
    type Output = V;

    fn index(&self, key: &str) -> &Self::Output {
        self.get(key)
            .unwrap_or_else(|| panic!("no entry named {key:?}"))
    }
}

impl<V> IndexMut<&str> for OrderedMap<V> {
    fn index_mut(&mut self, key: &str) -> &mut Self::Output {
        self.get_mut(key)
            .unwrap_or_else(|| panic!("no entry named {key:?}"))
    }
}

impl<S: Into<String>, V> FromIterator<(S, V)> for OrderedMap<V> {
    fn from_iter<T: IntoIterator<Item = (S, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V> IntoIterator for OrderedMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<V: fmt::Display> fmt::Display for OrderedMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.iter().map(|(k, v)| format!("{k}: {v}")).join(", ")
        )
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping with string keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = OrderedMap::new();
                while let Some((k, v)) = access.next_entry::<String, V>()? {
                    map.insert(k, v);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// Axis values as accepted by forward, inverse and reflection calls.
///
/// Either named (any order, matched by name) or ordered (matched by position
/// against the assigned axes).
#[derive(Clone, Debug, PartialEq)]
pub enum AxisInput {
    /// Values keyed by diffractometer axis name.
    Named(Positions),
    /// Values in axis order.
    Ordered(Vec<f64>),
}

impl From<Positions> for AxisInput {
    fn from(value: Positions) -> Self {
        AxisInput::Named(value)
    }
}

impl From<&Positions> for AxisInput {
    fn from(value: &Positions) -> Self {
        AxisInput::Named(value.clone())
    }
}

impl From<Vec<f64>> for AxisInput {
    fn from(value: Vec<f64>) -> Self {
        AxisInput::Ordered(value)
    }
}

impl From<&[f64]> for AxisInput {
    fn from(value: &[f64]) -> Self {
        AxisInput::Ordered(value.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for AxisInput {
    fn from(value: [f64; N]) -> Self {
        AxisInput::Ordered(value.to_vec())
    }
}

impl<const N: usize> From<[(&str, f64); N]> for AxisInput {
    fn from(value: [(&str, f64); N]) -> Self {
        AxisInput::Named(value.into_iter().collect())
    }
}

impl From<Vec<(&str, f64)>> for AxisInput {
    fn from(value: Vec<(&str, f64)>) -> Self {
        AxisInput::Named(value.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let mut map: Positions = [("tth", 10.), ("th", 5.), ("chi", 0.)]
            .into_iter()
            .collect();
        map.insert("th", 6.);
        assert_eq!(map.key_names(), vec!["tth", "th", "chi"]);
        assert_eq!(map["th"], 6.);

        map.remove("tth");
        assert_eq!(map.key_names(), vec!["th", "chi"]);
    }

    #[test]
    fn yaml_preserves_order() {
        let map: Positions = [("omega", 1.), ("chi", 2.), ("phi", 3.), ("tth", 4.)]
            .into_iter()
            .collect();
        let text = serde_yaml::to_string(&map).unwrap();
        assert!(text.find("omega").unwrap() < text.find("tth").unwrap());

        let back: Positions = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn axis_input_conversions() {
        assert_eq!(AxisInput::from([1., 2.]), AxisInput::Ordered(vec![1., 2.]));
        let named = AxisInput::from([("h", 1.), ("k", 0.)]);
        match named {
            AxisInput::Named(p) => assert_eq!(p.key_names(), vec!["h", "k"]),
            AxisInput::Ordered(_) => panic!("expected named input"),
        }
    }

    #[test]
    fn display() {
        let map = Positions::from_names(&["q"], &[1.5]);
        assert_eq!(map.to_string(), "{q: 1.5}");
    }
}
