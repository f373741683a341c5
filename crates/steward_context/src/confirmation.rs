//! Confirmation dialog classification.
//!
//! Decides whether a yes/no prompt from the assistant can be answered
//! automatically. A push intent is refused before anything else. Otherwise
//! families are tried in a fixed order and the first match wins; text that
//! fits no family is never confirmed.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::project::ProjectContext;

const CONFIDENCE_THRESHOLD: f64 = 0.7;
const DEFAULT_RESPONSE: &str = "1";

/// Dialog family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DialogType {
    TestExecution,
    FileCreation,
    PackageInstallation,
    BuildScript,
    GitOperation,
    Unknown,
}

impl DialogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TestExecution => "test-execution",
            Self::FileCreation => "file-creation",
            Self::PackageInstallation => "package-installation",
            Self::BuildScript => "build-script",
            Self::GitOperation => "git-operation",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DialogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auto-confirm verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationDecision {
    pub should_confirm: bool,
    pub confidence: f64,
    pub reasoning: String,
    pub dialog_type: DialogType,
    /// Text to type into the session when confirming
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl ConfirmationDecision {
    fn scored(dialog_type: DialogType, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self::gated(dialog_type, confidence, true, reasoning)
    }

    fn gated(dialog_type: DialogType, confidence: f64, allowed: bool, reasoning: impl Into<String>) -> Self {
        let should_confirm = allowed && confidence >= CONFIDENCE_THRESHOLD;
        Self {
            should_confirm,
            confidence,
            reasoning: reasoning.into(),
            dialog_type,
            response: should_confirm.then(|| DEFAULT_RESPONSE.to_string()),
        }
    }

    fn unknown() -> Self {
        Self {
            should_confirm: false,
            confidence: 0.0,
            reasoning: "Not a recognized confirmation dialog".to_string(),
            dialog_type: DialogType::Unknown,
            response: None,
        }
    }
}

struct Matchers {
    test: Regex,
    file: Regex,
    file_name: Regex,
    useful_name: Regex,
    package: Regex,
    build: Regex,
    build_strong: Regex,
    build_dev: Regex,
    git: Regex,
    push: Regex,
}

fn matchers() -> Option<&'static Matchers> {
    static MATCHERS: OnceLock<Option<Matchers>> = OnceLock::new();
    MATCHERS.get_or_init(compile_matchers).as_ref()
}

fn compile_matchers() -> Option<Matchers> {
    let re = |s: &str| Regex::new(s).ok();
    Some(Matchers {
        test: re(r"(?i)\b(run|execute|start)\b.{0,40}\b(tests?|specs?|test suite|jest|vitest|pytest|mocha)\b|\b(npm|yarn|pnpm|bun) (run )?test\b|\b(cargo|go) test\b")?,
        file: re(r"(?i)\b(create|write|generate|add|make)\b.{0,40}\bfile\b|\b(create|write|generate)\s+[`'\x22]?[\w./-]+\.[A-Za-z0-9]{1,6}\b")?,
        file_name: re(r"([\w./-]*[\w-]\.([A-Za-z0-9]{1,6}))(?:[`'\x22?,;:]|\s|$)")?,
        useful_name: re(r"(?i)(service|util|helper|config|type|component|hook|debug|logger)")?,
        package: re(r"(?i)\b((npm|pnpm|yarn|bun)\s+(install|add|i)|pip3?\s+install|cargo\s+add|go\s+get|install)\b")?,
        build: re(r"(?i)\b(build|compile|bundle|dev|watch|serve|script|make)\b|\b(npm|yarn|pnpm|bun) run\b")?,
        build_strong: re(r"(?i)\b(build|compile|bundle)\b")?,
        build_dev: re(r"(?i)\b(dev|watch|serve)\b")?,
        git: re(r"(?i)\bgit\s+(add|stage|commit|push)\b|\b(stage|commit|push)\b.{0,30}\b(changes|files|commit|branch|remote|origin)\b")?,
        push: re(r"(?i)\bgit\s+push\b|\bpush\b.{0,30}\b(origin|remote|branch|changes|commits?)\b")?,
    })
}

const CROSS_CUTTING_PACKAGES: &[&str] = &[
    "eslint", "prettier", "jest", "vitest", "typescript", "@types/node", "ts-node", "husky", "lint-staged",
    "pytest", "ruff", "black", "mypy", "isort",
];

fn framework_packages(framework: &str) -> &'static [&'static str] {
    match framework {
        "react" | "next" | "react-native" => &[
            "react-router-dom", "@tanstack/react-query", "zustand", "axios", "clsx", "tailwindcss",
            "@testing-library/react", "@testing-library/jest-dom",
        ],
        "vue" => &["vue-router", "pinia", "axios", "@vue/test-utils"],
        "express" | "nest" => &["cors", "helmet", "dotenv", "morgan", "zod", "supertest"],
        "django" => &["djangorestframework", "django-environ", "pytest-django"],
        "flask" | "fastapi" => &["uvicorn", "pydantic", "python-dotenv", "httpx"],
        _ => &[],
    }
}

fn language_packages(language: &str) -> &'static [&'static str] {
    match language {
        "rust" => &["serde", "serde_json", "tokio", "anyhow", "thiserror", "tracing", "clap"],
        "python" => &["requests", "pydantic", "python-dotenv", "httpx"],
        "go" => &["github.com/stretchr/testify"],
        _ => &[],
    }
}

fn compatible_extensions(context: &ProjectContext) -> Vec<&'static str> {
    let mut exts: Vec<&'static str> = match context.language() {
        "typescript" => vec!["ts", "tsx", "js", "jsx", "json", "css", "scss"],
        "javascript" => vec!["js", "jsx", "mjs", "cjs", "json", "css", "scss"],
        "rust" => vec!["rs", "toml"],
        "python" => vec!["py", "toml", "cfg", "txt"],
        "go" => vec!["go", "mod"],
        _ => vec!["json", "txt"],
    };
    match context.framework() {
        "vue" => exts.push("vue"),
        "svelte" => exts.push("svelte"),
        _ => {}
    }
    exts.push("md");
    exts
}

const PACKAGE_FILLER: &[&str] = &[
    "the", "a", "an", "and", "or", "with", "plus", "also", "including", "like", "such", "as", "e.g", "for",
    "to", "of", "in", "this", "that", "these", "your", "my", "our", "project", "package", "packages",
    "dependency", "module", "modules", "new", "dev", "missing", "required", "now", "first", "then",
    "too", "globally", "locally",
];
const DECLARED_DEPS: &[&str] = &["dependencies", "deps", "requirements", "everything", "all"];

/// Heuristic auto-confirm classifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfirmationDialogHandler;

impl ConfirmationDialogHandler {
    pub fn new() -> Self {
        Self
    }

    /// Minimum confidence for an automatic answer.
    pub fn get_confidence_threshold(&self) -> f64 {
        CONFIDENCE_THRESHOLD
    }

    pub fn should_auto_confirm(&self, text: &str, context: &ProjectContext) -> ConfirmationDecision {
        let Some(m) = matchers() else {
            return ConfirmationDecision::unknown();
        };

        let decision = if m.push.is_match(text) {
            refuse_push()
        } else if m.test.is_match(text) {
            classify_tests(context)
        } else if m.file.is_match(text) {
            classify_file(m, text, context)
        } else if m.package.is_match(text) {
            classify_package(m, text, context)
        } else if m.build.is_match(text) {
            classify_build(m, text)
        } else if m.git.is_match(text) {
            classify_git(text, context)
        } else {
            ConfirmationDecision::unknown()
        };

        debug!(
            "Confirmation dialog {} (confidence {:.2}, confirm {})",
            decision.dialog_type, decision.confidence, decision.should_confirm
        );
        decision
    }
}

fn classify_tests(context: &ProjectContext) -> ConfirmationDecision {
    if context.has_tests {
        ConfirmationDecision::scored(DialogType::TestExecution, 0.9, "Running the existing test suite is safe")
    } else {
        ConfirmationDecision::scored(DialogType::TestExecution, 0.7, "Running tests is safe, though none were detected")
    }
}

fn classify_file(m: &Matchers, text: &str, context: &ProjectContext) -> ConfirmationDecision {
    let Some(caps) = m.file_name.captures(text) else {
        return ConfirmationDecision::scored(DialogType::FileCreation, 0.2, "File type could not be determined");
    };
    let name = caps.get(1).map(|c| c.as_str()).unwrap_or_default();
    let ext = caps.get(2).map(|c| c.as_str().to_lowercase()).unwrap_or_default();

    let ext_ok = compatible_extensions(context).contains(&ext.as_str());
    let file_stem = name.rsplit('/').next().unwrap_or(name);
    let name_ok = m.useful_name.is_match(file_stem);

    let (confidence, reasoning) = match (ext_ok, name_ok) {
        (true, true) => (0.85, format!("{} fits the project and follows a known naming pattern", name)),
        (true, false) => (0.75, format!(".{} files fit a {} project", ext, context.language())),
        (false, true) => (0.5, format!("{} has a familiar name but an unexpected extension", name)),
        (false, false) => (0.2, format!("{} is not a recognized file type for this project", name)),
    };
    ConfirmationDecision::scored(DialogType::FileCreation, confidence, reasoning)
}

fn classify_package(m: &Matchers, text: &str, context: &ProjectContext) -> ConfirmationDecision {
    let packages = package_names(&m.package, text);
    if packages.is_empty() {
        return ConfirmationDecision::scored(
            DialogType::PackageInstallation,
            0.8,
            "Installing the project's declared dependencies",
        );
    }

    match packages.iter().find(|p| !is_allowed_package(p, context)) {
        Some(unknown) => ConfirmationDecision::scored(
            DialogType::PackageInstallation,
            0.3,
            format!("{} is not on the allow-list", unknown),
        ),
        None => ConfirmationDecision::scored(
            DialogType::PackageInstallation,
            0.8,
            format!("{} is a known package for this project", packages.join(", ")),
        ),
    }
}

fn is_allowed_package(package: &str, context: &ProjectContext) -> bool {
    CROSS_CUTTING_PACKAGES.contains(&package)
        || framework_packages(context.framework()).contains(&package)
        || language_packages(context.language()).contains(&package)
        || (context.project_type.is_language("typescript") && package.starts_with("@types/"))
        || context.depends_on(package)
}

/// Every package named in the sentence after the install verb, versions
/// stripped. Empty means the prompt installs the already-declared
/// dependencies.
fn package_names(install: &Regex, text: &str) -> Vec<String> {
    let Some(found) = install.find(text) else {
        return Vec::new();
    };

    let mut names = Vec::new();
    for raw in text[found.end()..].split_whitespace() {
        let token = raw.trim_matches(|c: char| matches!(c, '?' | '.' | ',' | '!' | '`' | '\'' | '"' | ':' | ';' | '(' | ')'));
        let lower = token.to_lowercase();
        if !token.is_empty()
            && !token.starts_with('-')
            && !PACKAGE_FILLER.contains(&lower.as_str())
            && !DECLARED_DEPS.contains(&lower.as_str())
        {
            names.push(strip_version(&lower));
        }
        if raw.ends_with(['?', '.', '!']) {
            break;
        }
    }
    names
}

fn strip_version(spec: &str) -> String {
    let spec = spec.split(['=', '<', '>', '~', '^']).next().unwrap_or(spec);
    match spec.rfind('@') {
        Some(i) if i > 0 => spec[..i].to_string(),
        _ => spec.to_string(),
    }
}

fn classify_build(m: &Matchers, text: &str) -> ConfirmationDecision {
    if m.build_strong.is_match(text) {
        ConfirmationDecision::scored(DialogType::BuildScript, 0.85, "Building the project does not change sources")
    } else if m.build_dev.is_match(text) {
        ConfirmationDecision::scored(DialogType::BuildScript, 0.8, "Starting a dev/watch process is low risk")
    } else {
        ConfirmationDecision::scored(DialogType::BuildScript, 0.4, "Unrecognized script")
    }
}

/// Pushing publishes work; it is refused whatever else the prompt mentions.
fn refuse_push() -> ConfirmationDecision {
    ConfirmationDecision::gated(
        DialogType::GitOperation,
        0.3,
        false,
        "Pushing publishes changes and is never confirmed automatically",
    )
}

fn classify_git(text: &str, context: &ProjectContext) -> ConfirmationDecision {
    let lower = text.to_lowercase();
    if lower.contains("push") {
        refuse_push()
    } else if lower.contains("commit") {
        if context.has_pending_changes() {
            ConfirmationDecision::scored(
                DialogType::GitOperation,
                0.75,
                format!("Committing {} pending changes", context.changed_file_count()),
            )
        } else {
            ConfirmationDecision::scored(DialogType::GitOperation, 0.4, "No pending changes to commit")
        }
    } else {
        ConfirmationDecision::scored(DialogType::GitOperation, 0.9, "Staging changes is reversible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::GitStatus;
    use crate::project::ProjectType;

    fn context(framework: &str, language: &str, has_tests: bool) -> ProjectContext {
        let mut ctx = ProjectContext::minimal("/tmp/p");
        ctx.project_type = ProjectType {
            framework: framework.to_string(),
            language: language.to_string(),
            ..ProjectType::unknown()
        };
        ctx.has_tests = has_tests;
        ctx
    }

    fn confirm(text: &str, ctx: &ProjectContext) -> ConfirmationDecision {
        ConfirmationDialogHandler::new().should_auto_confirm(text, ctx)
    }

    #[test]
    fn test_threshold() {
        assert_eq!(ConfirmationDialogHandler::new().get_confidence_threshold(), 0.7);
    }

    #[test]
    fn test_unrecognized_dialog_is_refused() {
        let d = confirm("Do you want to format your hard drive?", &context("react", "typescript", true));
        assert!(!d.should_confirm);
        assert_eq!(d.confidence, 0.0);
        assert_eq!(d.dialog_type, DialogType::Unknown);
        assert!(d.response.is_none());
    }

    #[test]
    fn test_run_tests_with_suite() {
        let d = confirm("Do you want me to run npm test?", &context("react", "typescript", true));
        assert!(d.should_confirm);
        assert_eq!(d.confidence, 0.9);
        assert_eq!(d.dialog_type, DialogType::TestExecution);
        assert_eq!(d.response.as_deref(), Some("1"));
    }

    #[test]
    fn test_run_tests_without_suite() {
        let d = confirm("Should I run the tests?", &context("unknown", "unknown", false));
        assert!(d.should_confirm);
        assert_eq!(d.confidence, 0.7);
    }

    #[test]
    fn test_unknown_package_rejected() {
        let d = confirm("Do you want to install suspicious-package?", &context("react", "typescript", true));
        assert!(!d.should_confirm);
        assert_eq!(d.dialog_type, DialogType::PackageInstallation);
        assert!(d.confidence < 0.5);
    }

    #[test]
    fn test_allow_listed_packages() {
        let react = context("react", "typescript", true);
        assert!(confirm("Do you want me to npm install zustand?", &react).should_confirm);
        assert!(confirm("Install eslint as a dev dependency?", &react).should_confirm);
        assert!(confirm("Do you want to run pnpm add -D @types/lodash?", &react).should_confirm);

        let rust = context("unknown", "rust", true);
        assert!(confirm("Should I cargo add serde?", &rust).should_confirm);
        assert!(!confirm("Should I cargo add left-pad-rs?", &rust).should_confirm);
    }

    #[test]
    fn test_install_declared_dependencies() {
        let d = confirm("Do you want me to run npm install?", &context("react", "typescript", true));
        assert!(d.should_confirm);
        assert_eq!(d.dialog_type, DialogType::PackageInstallation);
    }

    #[test]
    fn test_file_creation_scoring() {
        let ts = context("react", "typescript", true);

        let d = confirm("Do you want to create userService.ts?", &ts);
        assert_eq!(d.dialog_type, DialogType::FileCreation);
        assert_eq!(d.confidence, 0.85);
        assert!(d.should_confirm);

        let d = confirm("Do you want to create the file src/App.tsx?", &ts);
        assert_eq!(d.confidence, 0.75);
        assert!(d.should_confirm);

        let d = confirm("Do you want to create logger.py?", &ts);
        assert_eq!(d.confidence, 0.5);
        assert!(!d.should_confirm);

        let d = confirm("Do you want to create payload.exe?", &ts);
        assert_eq!(d.confidence, 0.2);
        assert!(!d.should_confirm);
    }

    #[test]
    fn test_build_scripts() {
        let ctx = context("next", "typescript", true);
        let d = confirm("Do you want me to build the project?", &ctx);
        assert_eq!(d.dialog_type, DialogType::BuildScript);
        assert_eq!(d.confidence, 0.85);

        let d = confirm("Should I start the dev server?", &ctx);
        assert_eq!(d.confidence, 0.8);
        assert!(d.should_confirm);

        let d = confirm("Do you want me to run the migration script?", &ctx);
        assert_eq!(d.confidence, 0.4);
        assert!(!d.should_confirm);
    }

    #[test]
    fn test_git_operations() {
        let mut ctx = context("unknown", "rust", true);

        let d = confirm("Do you want me to git add the changes?", &ctx);
        assert_eq!(d.dialog_type, DialogType::GitOperation);
        assert_eq!(d.confidence, 0.9);

        assert!(!confirm("Should I git commit now?", &ctx).should_confirm);
        ctx.git_status = Some(GitStatus {
            staged_files: vec!["src/main.rs".to_string()],
            ..Default::default()
        });
        let d = confirm("Should I git commit now?", &ctx);
        assert_eq!(d.confidence, 0.75);
        assert!(d.should_confirm);

        let d = confirm("Do you want me to git push to origin?", &ctx);
        assert!(!d.should_confirm);
        assert!(d.confidence < 0.5);
        assert!(d.response.is_none());
    }

    #[test]
    fn test_push_refused_whatever_else_is_mentioned() {
        let mut ctx = context("next", "typescript", true);
        ctx.git_status = Some(GitStatus {
            staged_files: vec!["src/app.ts".to_string()],
            ..Default::default()
        });

        for prompt in [
            "Do you want me to push the build to origin?",
            "Should I push to the dev branch?",
            "Do you want me to push the changes and run the tests?",
            "Build the project and git push?",
            "Should I commit and push the commits?",
        ] {
            let d = confirm(prompt, &ctx);
            assert!(!d.should_confirm, "{prompt:?} was confirmed");
            assert_eq!(d.dialog_type, DialogType::GitOperation, "{prompt:?}");
            assert!(d.confidence < 0.5, "{prompt:?}");
            assert!(d.response.is_none(), "{prompt:?}");
        }
    }

    #[test]
    fn test_mixed_family_prompts_are_refused() {
        let ctx = context("react", "typescript", true);
        for prompt in [
            "Should I install the dev dependencies including evil-pkg?",
            "Install dependencies and left-pad-ng?",
            "Do you want me to npm install zustand and totally-safe-lib?",
            "Should I install all packages plus crypto-miner for the build?",
        ] {
            let d = confirm(prompt, &ctx);
            assert!(!d.should_confirm, "{prompt:?} was confirmed");
            assert_eq!(d.dialog_type, DialogType::PackageInstallation, "{prompt:?}");
            assert!(d.confidence < 0.5, "{prompt:?}");
        }
    }

    #[test]
    fn test_declared_dependencies_with_known_extras() {
        let ctx = context("react", "typescript", true);

        let d = confirm("Should I install the project dependencies for this project?", &ctx);
        assert!(d.should_confirm);
        assert_eq!(d.confidence, 0.8);

        let d = confirm("Install the dependencies and eslint?", &ctx);
        assert!(d.should_confirm);
        assert!(d.reasoning.contains("eslint"));
    }

    #[test]
    fn test_package_names_stop_at_sentence_end() {
        let install = &matchers().unwrap().package;
        assert_eq!(
            package_names(install, "npm install zustand@4 axios. Then run it"),
            vec!["zustand", "axios"]
        );
        assert!(package_names(install, "Run npm install?").is_empty());
    }

    #[test]
    fn test_strip_version() {
        assert_eq!(strip_version("react@18.2.0"), "react");
        assert_eq!(strip_version("@types/node@20"), "@types/node");
        assert_eq!(strip_version("django>=4.2"), "django");
    }

    #[test]
    fn test_dialog_type_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(DialogType::TestExecution).unwrap(),
            serde_json::json!("test-execution")
        );
    }
}
