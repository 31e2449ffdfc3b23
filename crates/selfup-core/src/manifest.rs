use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DependencyGroup {
    Runtime,
    Development,
    Optional,
    Scripts,
}

impl DependencyGroup {
    pub fn manifest_key(self) -> &'static str {
        match self {
            Self::Runtime => "dependencies",
            Self::Development => "devDependencies",
            Self::Optional => "optionalDependencies",
            Self::Scripts => "scripts",
        }
    }

    fn declares_packages(self) -> bool {
        !matches!(self, Self::Scripts)
    }
}

pub const DEPENDENCY_GROUPS: [DependencyGroup; 4] = [
    DependencyGroup::Runtime,
    DependencyGroup::Development,
    DependencyGroup::Optional,
    DependencyGroup::Scripts,
];

/// The dependency-relevant slice of a `package.json`.
///
/// Groups are stored as sorted maps, so two manifests compare equal per group
/// when they declare the same entries regardless of key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyManifest {
    groups: BTreeMap<DependencyGroup, BTreeMap<String, Value>>,
    engines: BTreeMap<String, String>,
}

impl DependencyManifest {
    pub fn from_json_str(input: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(input).context("failed to parse package manifest")?;
        let Value::Object(root) = root else {
            return Err(anyhow!("package manifest must be a JSON object"));
        };

        let mut groups = BTreeMap::new();
        for group in DEPENDENCY_GROUPS {
            let entries = match root.get(group.manifest_key()) {
                None | Some(Value::Null) => BTreeMap::new(),
                Some(Value::Object(map)) => map
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect(),
                Some(_) => {
                    return Err(anyhow!(
                        "package manifest field '{}' must be an object",
                        group.manifest_key()
                    ));
                }
            };
            groups.insert(group, entries);
        }

        let engines = match root.get("engines") {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(name, value)| value.as_str().map(|v| (name.clone(), v.to_string())))
                .collect(),
            _ => BTreeMap::new(),
        };

        Ok(Self { groups, engines })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read package manifest: {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("failed parsing package manifest: {}", path.display()))
    }

    pub fn group(&self, group: DependencyGroup) -> Option<&BTreeMap<String, Value>> {
        self.groups.get(&group)
    }

    /// Union of names declared across the runtime, development and optional
    /// groups.
    pub fn declared_package_names(&self) -> BTreeSet<&str> {
        self.groups
            .iter()
            .filter(|(group, _)| group.declares_packages())
            .flat_map(|(_, entries)| entries.keys().map(String::as_str))
            .collect()
    }

    pub fn engine_requirement(&self, engine: &str) -> Option<&str> {
        self.engines.get(engine).map(String::as_str)
    }
}
