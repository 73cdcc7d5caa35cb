//! Simulation statistics reporting.
//!
//! Every component keeps plain counter fields while running and contributes
//! them to a [`StatsReport`] at finalize time. The report is a tree of
//! sections, each a `name → value` map in insertion order, printable as a
//! text banner and serializable to JSON for downstream tooling.

use std::fmt;

use serde::Serialize;

/// A single reported value.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    /// Integer counter.
    Int(i64),
    /// Derived ratio or average.
    Float(f64),
}

impl From<u64> for StatValue {
    fn from(v: u64) -> Self {
        StatValue::Int(v as i64)
    }
}

impl From<i64> for StatValue {
    fn from(v: i64) -> Self {
        StatValue::Int(v)
    }
}

impl From<usize> for StatValue {
    fn from(v: usize) -> Self {
        StatValue::Int(v as i64)
    }
}

impl From<f64> for StatValue {
    fn from(v: f64) -> Self {
        StatValue::Float(v)
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Int(v) => write!(f, "{}", v),
            StatValue::Float(v) => write!(f, "{:.4}", v),
        }
    }
}

/// One named section of the report.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StatSection {
    /// Section name (component plus instance, e.g. `controller_0`).
    pub name: String,
    /// Counters in insertion order.
    pub entries: Vec<(String, StatValue)>,
}

impl StatSection {
    /// Adds one counter to the section.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<StatValue>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Looks a counter up by name.
    pub fn get(&self, name: &str) -> Option<StatValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

/// The full finalize-time report.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StatsReport {
    sections: Vec<StatSection>,
}

impl StatsReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (or reopens) a section and returns it for population.
    pub fn section(&mut self, name: impl Into<String>) -> &mut StatSection {
        let name = name.into();
        if let Some(pos) = self.sections.iter().position(|s| s.name == name) {
            return &mut self.sections[pos];
        }
        self.sections.push(StatSection {
            name,
            entries: Vec::new(),
        });
        self.sections.last_mut().expect("section just pushed")
    }

    /// All sections in insertion order.
    pub fn sections(&self) -> &[StatSection] {
        &self.sections
    }

    /// Looks up `name` inside the section called `section`.
    pub fn get(&self, section: &str, name: &str) -> Option<StatValue> {
        self.sections
            .iter()
            .find(|s| s.name == section)
            .and_then(|s| s.get(name))
    }

    /// Renders the report as a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        let mut root = serde_json::Map::new();
        for section in &self.sections {
            let mut map = serde_json::Map::new();
            for (name, value) in &section.entries {
                let v = match value {
                    StatValue::Int(i) => serde_json::Value::from(*i),
                    StatValue::Float(f) => serde_json::Value::from(*f),
                };
                map.insert(name.clone(), v);
            }
            root.insert(section.name.clone(), serde_json::Value::Object(map));
        }
        serde_json::Value::Object(root)
    }

    /// Prints the report to stdout.
    pub fn print(&self) {
        println!("\n==========================================================");
        println!("DRAM SUBSYSTEM SIMULATION STATISTICS");
        println!("==========================================================");
        for section in &self.sections {
            println!("{}", section.name.to_uppercase());
            for (name, value) in &section.entries {
                println!("  {:<32} {}", name, value);
            }
            println!("----------------------------------------------------------");
        }
    }
}
