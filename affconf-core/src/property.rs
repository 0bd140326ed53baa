//! Property bag exchanged with the backing store.
//!
//! Keys compare case-insensitively but keep the spelling they were first
//! stored under. Values are arbitrary JSON; `Value::Null` marks a name that
//! is known (declared in the schema) but has no value.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PropertyEntry {
    name: String,
    value: Value,
}

/// Case-insensitive name → value dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyBag {
    entries: HashMap<String, PropertyEntry>,
}

/// Canonical form under which property names compare equal.
pub fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

/// Whether two property names denote the same property.
pub fn names_match(a: &str, b: &str) -> bool {
    fold_name(a) == fold_name(b)
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bag holding every name with a `null` value.
    pub fn seeded<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut bag = Self::new();
        for name in names {
            bag.set(name.as_ref(), Value::Null);
        }
        bag
    }

    /// Value stored under `name`, including explicit nulls.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(&fold_name(name)).map(|e| &e.value)
    }

    /// Value stored under `name`, treating `null` as absent.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).filter(|v| !v.is_null())
    }

    /// Insert or overwrite. An existing entry keeps its original spelling.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.entries.entry(fold_name(name)) {
            Entry::Occupied(mut occupied) => occupied.get_mut().value = value,
            Entry::Vacant(vacant) => {
                vacant.insert(PropertyEntry {
                    name: name.to_string(),
                    value,
                });
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.entries.remove(&fold_name(name)).map(|e| e.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&fold_name(name))
    }

    /// Property names in their stored spelling.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|e| e.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.values().map(|e| (e.name.as_str(), &e.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reset every value to `null`, keeping the names.
    pub fn clear_values(&mut self) {
        for entry in self.entries.values_mut() {
            entry.value = Value::Null;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<S: AsRef<str>, V: Into<Value>> FromIterator<(S, V)> for PropertyBag {
    fn from_iter<T: IntoIterator<Item = (S, V)>>(iter: T) -> Self {
        let mut bag = PropertyBag::new();
        for (name, value) in iter {
            bag.set(name.as_ref(), value);
        }
        bag
    }
}
