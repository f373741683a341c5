//! Context builder - cached project snapshots.
//!
//! Snapshots are keyed by absolute project path and reused while
//! `now - cache_timestamp < cacheIntervalMinutes`. The cache is the only state
//! shared across sessions working in the same project, so it sits behind a
//! read/write lock and every TTL check is made on a cloned entry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{Duration, Utc};
use parking_lot::RwLock;
use regex::Regex;
use steward_core::ContextConfig;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::detector::{FsProjectDetector, ProjectDetector};
use crate::error::{ContextError, ContextResult};
use crate::git::{GitCli, GitStatusProvider};
use crate::manifest::read_dependencies;
use crate::patterns::{GuidancePattern, PatternCategory};
use crate::project::{ProjectContext, ProjectType};

const RECENT_FILE_COUNT: usize = 2;

const TEST_DIRS: &[&str] = &["test", "tests", "__tests__", "spec", "specs", "e2e"];
const DOC_ENTRIES: &[&str] = &["docs", "doc", "claude.md", "changelog.md", "contributing.md"];
const SKIP_DIRS: &[&str] = &["node_modules", "target", "dist", "build", "vendor", "__pycache__", "venv"];

/// Builds and caches [`ProjectContext`] snapshots.
pub struct ContextBuilder {
    config: RwLock<ContextConfig>,
    detector: Arc<dyn ProjectDetector>,
    git: Arc<dyn GitStatusProvider>,
    cache: RwLock<HashMap<PathBuf, ProjectContext>>,
}

impl ContextBuilder {
    /// Builder with the filesystem detector and the git CLI.
    pub fn new(config: ContextConfig) -> Self {
        Self::with_collaborators(config, Arc::new(FsProjectDetector::new()), Arc::new(GitCli::new()))
    }

    pub fn with_collaborators(
        config: ContextConfig,
        detector: Arc<dyn ProjectDetector>,
        git: Arc<dyn GitStatusProvider>,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            detector,
            git,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Apply new settings. Cached snapshots built under other settings are dropped.
    pub fn update_config(&self, config: ContextConfig) {
        let mut current = self.config.write();
        if *current != config {
            *current = config;
            drop(current);
            self.clear_cache();
        }
    }

    pub fn clear_cache(&self) {
        let mut cache = self.cache.write();
        debug!("Clearing {} cached project contexts", cache.len());
        cache.clear();
    }

    pub fn cached_paths(&self) -> Vec<PathBuf> {
        self.cache.read().keys().cloned().collect()
    }

    /// Snapshot for `path`, from cache when fresh.
    ///
    /// Never fails: a scan error yields [`ProjectContext::minimal`].
    pub async fn build_project_context(&self, path: &Path) -> ProjectContext {
        let key = absolute(path);
        let config = self.config.read().clone();

        if let Some(cached) = self.fresh_entry(&key, &config) {
            debug!("Project context cache hit: {}", key.display());
            return cached;
        }

        debug!("Project context cache miss: {}", key.display());
        let detector = Arc::clone(&self.detector);
        let git = Arc::clone(&self.git);
        let scan_path = key.clone();
        let scan_config = config.clone();

        let scanned = tokio::task::spawn_blocking(move || {
            scan_project(&scan_path, &scan_config, detector.as_ref(), git.as_ref())
        })
        .await
        .map_err(|e| ContextError::Join(e.to_string()))
        .and_then(|r| r);

        match scanned {
            Ok(context) => {
                self.cache.write().insert(key, context.clone());
                context
            }
            Err(e) => {
                warn!("Project scan failed for {}: {}", key.display(), e);
                ProjectContext::minimal(key)
            }
        }
    }

    fn fresh_entry(&self, key: &Path, config: &ContextConfig) -> Option<ProjectContext> {
        let entry = self.cache.read().get(key).cloned()?;
        let ttl = Duration::minutes(config.cache_interval_minutes as i64);
        if Utc::now() - entry.cache_timestamp < ttl {
            Some(entry)
        } else {
            None
        }
    }

    /// Project-derived rules the assistant is expected to follow.
    pub async fn get_compliance_patterns(&self, path: &Path) -> Vec<GuidancePattern> {
        let context = self.build_project_context(path).await;
        compliance_patterns(&context)
    }

    /// Short text summary for LLM prompts.
    pub fn summarize(context: &ProjectContext) -> String {
        let pt = &context.project_type;
        let mut lines = vec![format!(
            "Framework: {}, language: {}, build system: {}",
            pt.framework, pt.language, pt.build_system
        )];

        if let Some(tf) = &pt.test_framework {
            lines.push(format!("Test framework: {}", tf));
        }
        lines.push(format!(
            "Has tests: {}, has documentation: {}",
            yes_no(context.has_tests),
            yes_no(context.has_documentation)
        ));
        if let Some(git) = &context.git_status {
            lines.push(format!(
                "Git: branch {}, {} changed files",
                git.branch.as_deref().unwrap_or("(detached)"),
                git.changed_count()
            ));
        }
        if !context.recent_files.is_empty() {
            lines.push(format!("Recently modified: {}", context.recent_files.join(", ")));
        }
        if !context.dependencies.is_empty() {
            let shown: Vec<&str> = context.dependencies.iter().take(15).map(String::as_str).collect();
            lines.push(format!("Dependencies: {}", shown.join(", ")));
        }

        lines.join("\n")
    }

    #[cfg(test)]
    fn backdate(&self, path: &Path, minutes: i64) {
        if let Some(entry) = self.cache.write().get_mut(&absolute(path)) {
            entry.cache_timestamp = entry.cache_timestamp - Duration::minutes(minutes);
        }
    }
}

impl std::fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("config", &*self.config.read())
            .field("cached", &self.cache.read().len())
            .finish()
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn scan_project(
    root: &Path,
    config: &ContextConfig,
    detector: &dyn ProjectDetector,
    git: &dyn GitStatusProvider,
) -> ContextResult<ProjectContext> {
    if !root.is_dir() {
        return Err(ContextError::PathNotFound(root.display().to_string()));
    }

    let project_type = if config.enable_framework_detection {
        detector.detect(root).unwrap_or_else(|e| {
            debug!("Framework detection unavailable: {}", e);
            ProjectType::unknown()
        })
    } else {
        ProjectType::unknown()
    };

    let git_status = if config.enable_git_integration {
        git.status(root)
            .map_err(|e| debug!("Git status unavailable: {}", e))
            .ok()
    } else {
        None
    };

    let mut has_tests = false;
    let mut has_documentation = false;
    for entry in std::fs::read_dir(root)? {
        let name = entry?.file_name().to_string_lossy().to_lowercase();
        if is_test_entry(&name) {
            has_tests = true;
        }
        if name.starts_with("readme") || DOC_ENTRIES.contains(&name.as_str()) {
            has_documentation = true;
        }
    }

    let deps = read_dependencies(root)?;

    Ok(ProjectContext {
        project_path: root.to_path_buf(),
        project_type,
        git_status,
        recent_files: recent_files(root, RECENT_FILE_COUNT),
        has_tests,
        has_documentation,
        dependencies: deps.dependencies,
        dev_dependencies: deps.dev_dependencies,
        cache_timestamp: Utc::now(),
    })
}

fn is_test_entry(name: &str) -> bool {
    TEST_DIRS.contains(&name)
        || name.contains(".test.")
        || name.contains(".spec.")
        || name.contains("_test.")
        || (name.starts_with("test_") && name.ends_with(".py"))
}

/// Most recently modified files across the root and one level of subdirectories.
fn recent_files(root: &Path, count: usize) -> Vec<String> {
    let mut files: Vec<(SystemTime, String)> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(2)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !(name.starts_with('.') || (e.file_type().is_dir() && SKIP_DIRS.contains(&name.as_ref())))
        })
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let modified = e.metadata().ok()?.modified().ok()?;
            let rel = e.path().strip_prefix(root).ok()?.to_string_lossy().to_string();
            Some((modified, rel))
        })
        .collect();

    files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    files.into_iter().take(count).map(|(_, path)| path).collect()
}

fn compliance_patterns(context: &ProjectContext) -> Vec<GuidancePattern> {
    let mut patterns = Vec::new();
    let pt = &context.project_type;
    let root = &context.project_path;

    let mut push = |id: &str, regex: &str, priority: u8, guidance: String| {
        if let Ok(pattern) = Regex::new(regex) {
            patterns.push(GuidancePattern::new(id, pattern, priority, guidance, PatternCategory::Compliance));
        }
    };

    if root.join("CLAUDE.md").is_file() {
        push(
            "compliance-claude-md",
            r"(?i)\b(ignor(e|ing)|skip(ping)?)\b.{0,40}\b(convention|guideline|instruction)s?\b",
            7,
            "Re-read CLAUDE.md and follow the project conventions it lists.".to_string(),
        );
    }

    let has_eslint = std::fs::read_dir(root)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .any(|e| e.file_name().to_string_lossy().starts_with(".eslintrc")
                    || e.file_name().to_string_lossy().starts_with("eslint.config"))
        })
        .unwrap_or(false);
    if has_eslint || pt.has_pattern("lint-script") {
        push(
            "compliance-lint",
            r"(?i)(\d+ problems?|eslint.*error|lint(ing)? (failed|errors?))",
            6,
            "Run the linter and fix the reported problems before moving on.".to_string(),
        );
    }

    if pt.is_language("typescript") {
        push(
            "compliance-ts-any",
            r":\s*any\b|as any\b|@ts-ignore",
            6,
            "Avoid `any` and `@ts-ignore`; keep the code type-safe.".to_string(),
        );
    }

    if let Some(tf) = &pt.test_framework {
        push(
            "compliance-test-framework",
            r"(?i)(skip(ped|ping)? (the )?tests|without (running )?tests|\.only\()",
            7,
            format!("Keep the {} suite green; do not skip or focus tests.", tf),
        );
    }

    patterns.sort_by(|a, b| b.priority.cmp(&a.priority));
    patterns
}
