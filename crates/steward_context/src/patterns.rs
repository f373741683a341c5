//! Context pattern library.
//!
//! A fixed table of regex rules, each scoped to the projects it applies to.
//! [`PatternLibrary::patterns_for`] selects the rules whose scope fits a
//! [`ProjectContext`] and ranks them by priority, highest first.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::project::ProjectContext;

/// What a pattern is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternCategory {
    Confirmation,
    FrameworkHooks,
    FrameworkIdiom,
    GitWorkflow,
    Testing,
    Dependencies,
    Security,
    Compliance,
}

impl PatternCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmation => "confirmation",
            Self::FrameworkHooks => "framework-hooks",
            Self::FrameworkIdiom => "framework-idiom",
            Self::GitWorkflow => "git-workflow",
            Self::Testing => "testing",
            Self::Dependencies => "dependencies",
            Self::Security => "security",
            Self::Compliance => "compliance",
        }
    }
}

impl fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One matchable rule. `priority` runs 1-10, higher is more important.
#[derive(Debug, Clone)]
pub struct GuidancePattern {
    pub id: String,
    pub pattern: Regex,
    pub priority: u8,
    pub guidance: String,
    pub category: PatternCategory,
}

impl GuidancePattern {
    pub fn new(
        id: impl Into<String>,
        pattern: Regex,
        priority: u8,
        guidance: impl Into<String>,
        category: PatternCategory,
    ) -> Self {
        Self {
            id: id.into(),
            pattern,
            priority: priority.min(10),
            guidance: guidance.into(),
            category,
        }
    }

    pub fn is_match(&self, output: &str) -> bool {
        self.pattern.is_match(output)
    }
}

/// Which projects a rule applies to.
#[derive(Debug, Clone, Copy)]
enum Scope {
    Always,
    Framework(&'static [&'static str]),
    Language(&'static [&'static str]),
    HasTests(bool),
    DirtyTree,
}

impl Scope {
    fn applies(&self, context: &ProjectContext) -> bool {
        match self {
            Scope::Always => true,
            Scope::Framework(names) => names.iter().any(|n| context.project_type.is_framework(n)),
            Scope::Language(names) => names.iter().any(|n| context.project_type.is_language(n)),
            Scope::HasTests(expected) => context.has_tests == *expected,
            Scope::DirtyTree => context.has_pending_changes(),
        }
    }
}

struct RuleDef {
    id: &'static str,
    scope: Scope,
    category: PatternCategory,
    priority: u8,
    regex: &'static str,
    guidance: &'static str,
}

const REACT_LIKE: &[&str] = &["react", "next", "react-native"];
const JS_LIKE: &[&str] = &["javascript", "typescript"];

const RULES: &[RuleDef] = &[
    RuleDef {
        id: "confirm-run-tests",
        scope: Scope::HasTests(true),
        category: PatternCategory::Confirmation,
        priority: 6,
        regex: r"(?i)\b(run|execute)\b.{0,30}\btests?\b.{0,20}\?",
        guidance: "Yes, run the tests.",
    },
    RuleDef {
        id: "confirm-run-lint",
        scope: Scope::Always,
        category: PatternCategory::Confirmation,
        priority: 5,
        regex: r"(?i)\brun\b.{0,30}\b(lint(er)?|formatter|prettier|rustfmt|clippy)\b.{0,20}\?",
        guidance: "Yes, run the linter and fix what it reports.",
    },
    RuleDef {
        id: "react-effect-deps",
        scope: Scope::Framework(REACT_LIKE),
        category: PatternCategory::FrameworkHooks,
        priority: 8,
        regex: r"React Hook use(Effect|Callback|Memo) has (a )?missing dependenc(y|ies)|react-hooks/exhaustive-deps",
        guidance: "List every value the hook reads in its dependency array instead of silencing exhaustive-deps.",
    },
    RuleDef {
        id: "react-hook-rules",
        scope: Scope::Framework(REACT_LIKE),
        category: PatternCategory::FrameworkHooks,
        priority: 9,
        regex: r#"React Hook "?\w+"? is called conditionally|Invalid hook call|Rendered (more|fewer) hooks than"#,
        guidance: "Call hooks unconditionally at the top level of the component.",
    },
    RuleDef {
        id: "react-class-component",
        scope: Scope::Framework(REACT_LIKE),
        category: PatternCategory::FrameworkIdiom,
        priority: 5,
        regex: r"class \w+ extends (React\.)?(Pure)?Component\b",
        guidance: "Prefer function components with hooks over class components.",
    },
    RuleDef {
        id: "next-use-client",
        scope: Scope::Framework(&["next"]),
        category: PatternCategory::FrameworkIdiom,
        priority: 8,
        regex: r"(?i)needs? (useState|useEffect|useRef|useContext)[^\n]*server component|only works in a client component",
        guidance: "Add \"use client\" to components that use state or effects.",
    },
    RuleDef {
        id: "vue-options-api",
        scope: Scope::Framework(&["vue"]),
        category: PatternCategory::FrameworkIdiom,
        priority: 4,
        regex: r"export default \{\s*data\s*\(\)",
        guidance: "Prefer the Composition API with <script setup> for new components.",
    },
    RuleDef {
        id: "express-body-parser",
        scope: Scope::Framework(&["express", "nest"]),
        category: PatternCategory::FrameworkIdiom,
        priority: 4,
        regex: r#"require\(['"]body-parser['"]\)|from ['"]body-parser['"]"#,
        guidance: "Use the built-in express.json() middleware instead of body-parser.",
    },
    RuleDef {
        id: "rust-unwrap",
        scope: Scope::Language(&["rust"]),
        category: PatternCategory::FrameworkIdiom,
        priority: 5,
        regex: r"\.unwrap\(\)|panicked at",
        guidance: "Propagate errors with `?` instead of calling unwrap() outside tests.",
    },
    RuleDef {
        id: "rust-borrow-errors",
        scope: Scope::Language(&["rust"]),
        category: PatternCategory::FrameworkIdiom,
        priority: 7,
        regex: r"error\[E0(382|499|502|505|597)\]",
        guidance: "Restructure ownership rather than sprinkling clone() to satisfy the borrow checker.",
    },
    RuleDef {
        id: "python-bare-except",
        scope: Scope::Language(&["python"]),
        category: PatternCategory::FrameworkIdiom,
        priority: 5,
        regex: r"(?m)^\s*except\s*:",
        guidance: "Catch specific exceptions instead of a bare except.",
    },
    RuleDef {
        id: "go-empty-err-check",
        scope: Scope::Language(&["go"]),
        category: PatternCategory::FrameworkIdiom,
        priority: 6,
        regex: r"if err != nil \{\s*\}",
        guidance: "Handle or return the error instead of leaving the err check empty.",
    },
    RuleDef {
        id: "git-commit-after-green",
        scope: Scope::DirtyTree,
        category: PatternCategory::GitWorkflow,
        priority: 6,
        regex: r"(?i)all tests? pass(ed)?|\d+ (tests? )?pass(ed|ing)\b|test result: ok",
        guidance: "Tests are green; commit the pending changes with a descriptive message.",
    },
    RuleDef {
        id: "git-force-push",
        scope: Scope::Always,
        category: PatternCategory::GitWorkflow,
        priority: 9,
        regex: r"git push\s+(.*\s)?(-f|--force)(\s|$)",
        guidance: "Avoid force-pushing; use --force-with-lease if history must be rewritten.",
    },
    RuleDef {
        id: "git-merge-conflict",
        scope: Scope::Always,
        category: PatternCategory::GitWorkflow,
        priority: 8,
        regex: r"CONFLICT \(|Automatic merge failed",
        guidance: "Resolve the merge conflicts before making further changes.",
    },
    RuleDef {
        id: "testing-missing",
        scope: Scope::HasTests(false),
        category: PatternCategory::Testing,
        priority: 5,
        regex: r"(?i)\b(created|added|implemented|wrote)\b.{0,60}\b(function|component|module|endpoint|class|service)\b",
        guidance: "Add tests for the new code; the project has no test suite yet.",
    },
    RuleDef {
        id: "testing-failures",
        scope: Scope::HasTests(true),
        category: PatternCategory::Testing,
        priority: 8,
        regex: r"(?i)\d+ (tests? )?(failed|failing|failures?)\b|\bFAIL\s|test result: FAILED|AssertionError",
        guidance: "Fix the failing tests before adding new features.",
    },
    RuleDef {
        id: "deps-missing-module",
        scope: Scope::Always,
        category: PatternCategory::Dependencies,
        priority: 7,
        regex: r"(?i)cannot find module|module not found|ModuleNotFoundError|no matching package named|unresolved import",
        guidance: "Install the missing dependency or fix the import path.",
    },
    RuleDef {
        id: "deps-peer-conflict",
        scope: Scope::Language(JS_LIKE),
        category: PatternCategory::Dependencies,
        priority: 6,
        regex: r"ERESOLVE|(?i)conflicting peer dependency",
        guidance: "Resolve the peer dependency conflict instead of forcing --legacy-peer-deps.",
    },
    RuleDef {
        id: "security-hardcoded-secret",
        scope: Scope::Always,
        category: PatternCategory::Security,
        priority: 9,
        regex: r#"(?i)(api[_-]?key|secret|password|access[_-]?token)\s*[:=]\s*['"][A-Za-z0-9_\-]{12,}['"]"#,
        guidance: "Move the credential into an environment variable; never hardcode secrets.",
    },
    RuleDef {
        id: "security-eval",
        scope: Scope::Language(JS_LIKE),
        category: PatternCategory::Security,
        priority: 7,
        regex: r"\beval\(|new Function\(",
        guidance: "Avoid eval and new Function; parse or dispatch explicitly.",
    },
];

/// Precompiled, scoped rule table.
pub struct PatternLibrary {
    rules: Vec<(Scope, GuidancePattern)>,
}

impl PatternLibrary {
    pub fn new() -> Self {
        let rules = RULES
            .iter()
            .filter_map(|def| match Regex::new(def.regex) {
                Ok(regex) => Some((
                    def.scope,
                    GuidancePattern::new(def.id, regex, def.priority, def.guidance, def.category),
                )),
                Err(e) => {
                    warn!("Skipping pattern {}: {}", def.id, e);
                    None
                }
            })
            .collect();
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Patterns applicable to `context`, highest priority first.
    ///
    /// Confirmation rules are only offered when `output` contains a question.
    /// Callers still test each pattern against the output.
    pub fn patterns_for(&self, context: &ProjectContext, output: &str) -> Vec<GuidancePattern> {
        if output.trim().is_empty() {
            return Vec::new();
        }
        let asks = output.contains('?');

        let mut selected: Vec<GuidancePattern> = self
            .rules
            .iter()
            .filter(|(scope, p)| scope.applies(context) && (asks || p.category != PatternCategory::Confirmation))
            .map(|(_, p)| p.clone())
            .collect();

        selected.sort_by(|a, b| b.priority.cmp(&a.priority));
        selected
    }

    /// Applicable patterns that actually match `output`, highest priority first.
    pub fn matching(&self, context: &ProjectContext, output: &str) -> Vec<GuidancePattern> {
        self.patterns_for(context, output)
            .into_iter()
            .filter(|p| p.is_match(output))
            .collect()
    }
}

impl Default for PatternLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PatternLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternLibrary").field("rules", &self.rules.len()).finish()
    }
}
