//! Framework, language and build-system detection from project manifests.

use std::path::Path;

use tracing::debug;

use crate::error::{ContextError, ContextResult};
use crate::manifest::{read_toml, PackageJson};
use crate::project::{ProjectType, UNKNOWN};

/// Detects what kind of project lives at a path.
#[cfg_attr(test, mockall::automock)]
pub trait ProjectDetector: Send + Sync {
    fn detect(&self, path: &Path) -> ContextResult<ProjectType>;
}

/// Manifest-based detector.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsProjectDetector;

impl FsProjectDetector {
    pub fn new() -> Self {
        Self
    }
}

impl ProjectDetector for FsProjectDetector {
    fn detect(&self, path: &Path) -> ContextResult<ProjectType> {
        if !path.is_dir() {
            return Err(ContextError::PathNotFound(path.display().to_string()));
        }

        let detected = if let Some(pkg) = PackageJson::read(path)? {
            detect_node(path, &pkg)
        } else if path.join("Cargo.toml").is_file() {
            detect_rust(path)?
        } else if ["pyproject.toml", "requirements.txt", "setup.py"]
            .iter()
            .any(|f| path.join(f).is_file())
        {
            detect_python(path)?
        } else if path.join("go.mod").is_file() {
            detect_go(path)?
        } else {
            ProjectType::unknown()
        };

        debug!(
            "Detected {} / {} / {} at {}",
            detected.framework,
            detected.language,
            detected.build_system,
            path.display()
        );
        Ok(detected)
    }
}

fn detect_node(root: &Path, pkg: &PackageJson) -> ProjectType {
    let language = if root.join("tsconfig.json").is_file() || pkg.has("typescript") {
        "typescript"
    } else {
        "javascript"
    };

    let framework = [
        ("next", "next"),
        ("react-native", "react-native"),
        ("react", "react"),
        ("vue", "vue"),
        ("@angular/core", "angular"),
        ("svelte", "svelte"),
        ("@nestjs/core", "nest"),
        ("express", "express"),
    ]
    .iter()
    .find(|(dep, _)| pkg.has(dep))
    .map(|(_, name)| *name)
    .unwrap_or("node");

    let build_system = if root.join("pnpm-lock.yaml").is_file() {
        "pnpm"
    } else if root.join("yarn.lock").is_file() {
        "yarn"
    } else if root.join("bun.lockb").is_file() || root.join("bun.lock").is_file() {
        "bun"
    } else {
        "npm"
    };

    let test_framework = ["vitest", "jest", "mocha", "@playwright/test", "cypress"]
        .iter()
        .find(|t| pkg.has(t))
        .map(|t| t.trim_start_matches('@').split('/').next().unwrap_or_default().to_string());

    let mut patterns = Vec::new();
    if matches!(framework, "react" | "next" | "react-native") {
        patterns.push("hooks".to_string());
    }
    if framework == "next" && (root.join("app").is_dir() || root.join("src/app").is_dir()) {
        patterns.push("app-router".to_string());
    }
    if pkg.workspaces.is_some() {
        patterns.push("monorepo".to_string());
    }
    if pkg.scripts.contains_key("lint") {
        patterns.push("lint-script".to_string());
    }

    ProjectType {
        framework: framework.to_string(),
        language: language.to_string(),
        build_system: build_system.to_string(),
        test_framework,
        patterns,
    }
}

fn detect_rust(root: &Path) -> ContextResult<ProjectType> {
    let cargo = read_toml(root, "Cargo.toml")?.unwrap_or_default();
    let has_dep = |name: &str| {
        cargo
            .get("dependencies")
            .and_then(|d| d.as_table())
            .map(|t| t.contains_key(name))
            .unwrap_or(false)
    };

    let framework = ["axum", "actix-web", "rocket", "tauri", "tokio"]
        .into_iter()
        .find(|f| has_dep(f))
        .unwrap_or(UNKNOWN);

    let mut patterns = Vec::new();
    if cargo.contains_key("workspace") {
        patterns.push("workspace".to_string());
    }

    Ok(ProjectType {
        framework: framework.to_string(),
        language: "rust".to_string(),
        build_system: "cargo".to_string(),
        test_framework: Some("cargo-test".to_string()),
        patterns,
    })
}

fn detect_python(root: &Path) -> ContextResult<ProjectType> {
    let deps = crate::manifest::read_dependencies(root)?;

    let framework = ["django", "flask", "fastapi"]
        .into_iter()
        .find(|f| deps.contains(f))
        .unwrap_or(UNKNOWN);

    let pyproject = read_toml(root, "pyproject.toml")?;
    let has_tool = |name: &str| {
        pyproject
            .as_ref()
            .and_then(|p| p.get("tool"))
            .and_then(|t| t.get(name))
            .is_some()
    };

    let build_system = if has_tool("poetry") {
        "poetry"
    } else if root.join("uv.lock").is_file() {
        "uv"
    } else {
        "pip"
    };

    let test_framework = if deps.contains("pytest")
        || has_tool("pytest")
        || root.join("pytest.ini").is_file()
        || root.join("conftest.py").is_file()
    {
        Some("pytest".to_string())
    } else {
        None
    };

    Ok(ProjectType {
        framework: framework.to_string(),
        language: "python".to_string(),
        build_system: build_system.to_string(),
        test_framework,
        patterns: Vec::new(),
    })
}

fn detect_go(root: &Path) -> ContextResult<ProjectType> {
    let deps = crate::manifest::read_dependencies(root)?;
    let framework = [
        ("github.com/gin-gonic/gin", "gin"),
        ("github.com/labstack/echo/v4", "echo"),
        ("github.com/gofiber/fiber/v2", "fiber"),
    ]
    .iter()
    .find(|(module, _)| deps.contains(module))
    .map(|(_, name)| *name)
    .unwrap_or(UNKNOWN);

    Ok(ProjectType {
        framework: framework.to_string(),
        language: "go".to_string(),
        build_system: "go".to_string(),
        test_framework: Some("go-test".to_string()),
        patterns: Vec::new(),
    })
}
