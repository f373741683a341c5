//! Dependency manifest reading.
//!
//! Supported manifests: `package.json`, `Cargo.toml`, `pyproject.toml`,
//! `requirements.txt` and `go.mod`. Lists are sorted and de-duplicated.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ContextError, ContextResult};

/// Dependency names declared by a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    pub dependencies: Vec<String>,
    pub dev_dependencies: Vec<String>,
}

impl Dependencies {
    pub fn contains(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d == name) || self.dev_dependencies.iter().any(|d| d == name)
    }

    fn normalize(mut self) -> Self {
        self.dependencies.sort();
        self.dependencies.dedup();
        self.dev_dependencies.sort();
        self.dev_dependencies.dedup();
        self
    }
}

/// The parts of `package.json` the engine cares about.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(default)]
    pub dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
    #[serde(default)]
    pub workspaces: Option<serde_json::Value>,
}

impl PackageJson {
    pub fn read(root: &Path) -> ContextResult<Option<Self>> {
        let path = root.join("package.json");
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| manifest_error("package.json", e))
    }

    pub fn has(&self, name: &str) -> bool {
        self.dependencies.contains_key(name) || self.dev_dependencies.contains_key(name)
    }
}

/// Read a TOML manifest as a generic table.
pub fn read_toml(root: &Path, file: &str) -> ContextResult<Option<toml::Table>> {
    let path = root.join(file);
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    content
        .parse::<toml::Table>()
        .map(Some)
        .map_err(|e| manifest_error(file, e))
}

/// Collect dependency names from every manifest found at `root`.
pub fn read_dependencies(root: &Path) -> ContextResult<Dependencies> {
    let mut deps = Dependencies::default();

    if let Some(pkg) = PackageJson::read(root)? {
        deps.dependencies.extend(pkg.dependencies.into_keys());
        deps.dev_dependencies.extend(pkg.dev_dependencies.into_keys());
    }

    if let Some(cargo) = read_toml(root, "Cargo.toml")? {
        deps.dependencies.extend(table_keys(&cargo, "dependencies"));
        deps.dev_dependencies.extend(table_keys(&cargo, "dev-dependencies"));
    }

    if let Some(pyproject) = read_toml(root, "pyproject.toml")? {
        if let Some(list) = pyproject
            .get("project")
            .and_then(|p| p.get("dependencies"))
            .and_then(|d| d.as_array())
        {
            deps.dependencies
                .extend(list.iter().filter_map(|v| v.as_str()).map(requirement_name));
        }
        if let Some(poetry) = pyproject.get("tool").and_then(|t| t.get("poetry")) {
            if let Some(table) = poetry.get("dependencies").and_then(|d| d.as_table()) {
                deps.dependencies
                    .extend(table.keys().filter(|k| *k != "python").cloned());
            }
        }
    }

    let requirements = root.join("requirements.txt");
    if requirements.is_file() {
        let content = fs::read_to_string(&requirements)?;
        deps.dependencies.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('-'))
                .map(requirement_name),
        );
    }

    let go_mod = root.join("go.mod");
    if go_mod.is_file() {
        let content = fs::read_to_string(&go_mod)?;
        deps.dependencies.extend(go_requires(&content));
    }

    Ok(deps.normalize())
}

fn table_keys(table: &toml::Table, key: &str) -> Vec<String> {
    table
        .get(key)
        .and_then(|v| v.as_table())
        .map(|t| t.keys().cloned().collect())
        .unwrap_or_default()
}

/// `requests>=2.0 ; python_version > "3"` → `requests`
fn requirement_name(spec: &str) -> String {
    spec.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_' || c == '.'))
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

fn go_requires(content: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut in_block = false;

    for line in content.lines().map(str::trim) {
        if line.starts_with("require (") {
            in_block = true;
            continue;
        }
        if in_block && line == ")" {
            in_block = false;
            continue;
        }
        let spec = if in_block {
            Some(line)
        } else {
            line.strip_prefix("require ")
        };
        if let Some(module) = spec.and_then(|s| s.split_whitespace().next()) {
            if !module.starts_with("//") {
                names.push(module.to_string());
            }
        }
    }

    names
}

fn manifest_error(file: &str, err: impl std::fmt::Display) -> ContextError {
    ContextError::Manifest {
        file: file.to_string(),
        message: err.to_string(),
    }
}
