use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::scenario::ScenarioName;
use crate::domain::value::{FieldValue, ScenarioValue, ZERO_SCENARIO_VALUE};

const KEY_SEPARATOR: &str = " / ";

/// Natural key of a planning item. Single-part keys are plain names
/// (`"Data Center Expansion"`); composite keys carry one part per key field
/// (`["Engineering", "Cloud Hosting"]`).
/// Parts are trimmed however the key is built, deserialization included.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "RawItemKey")]
pub struct ItemKey(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawItemKey {
    Single(String),
    Parts(Vec<String>),
}

impl From<RawItemKey> for ItemKey {
    fn from(raw: RawItemKey) -> Self {
        match raw {
            RawItemKey::Single(name) => Self::single(name),
            RawItemKey::Parts(parts) => Self::composite(parts),
        }
    }
}

impl ItemKey {
    pub fn single(name: impl Into<String>) -> Self {
        Self(vec![name.into().trim().to_string()])
    }

    pub fn composite<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(|part| part.into().trim().to_string()).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(KEY_SEPARATOR))
    }
}

impl From<&str> for ItemKey {
    fn from(value: &str) -> Self {
        Self::single(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningItem {
    pub key: ItemKey,
    #[serde(default)]
    pub attributes: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub scenarios: BTreeMap<ScenarioName, ScenarioValue>,
}

impl PlanningItem {
    pub fn new(key: impl Into<ItemKey>) -> Self {
        Self { key: key.into(), attributes: BTreeMap::new(), scenarios: BTreeMap::new() }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_scenario(mut self, scenario: impl Into<ScenarioName>, value: ScenarioValue) -> Self {
        self.scenarios.insert(scenario.into(), value);
        self
    }

    /// Value for `scenario`, or the shared zero value when the item has no
    /// entry for it. Never fails.
    pub fn value_or_zero(&self, scenario: &ScenarioName) -> &ScenarioValue {
        self.scenarios.get(scenario).unwrap_or(&ZERO_SCENARIO_VALUE)
    }

    pub fn attribute(&self, name: &str) -> Option<&FieldValue> {
        self.attributes.get(name)
    }
}
