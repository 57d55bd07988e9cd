//! Rule categories and the content predicates used to target files.
//!
//! A rule resolves to exactly one [`RuleCategory`]: an explicit `category`
//! field wins, then the canonical default rule ids, then a keyword scan of the
//! rule's prose. Each category owns a pure predicate over file content.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::types::Rule;

/// Files longer than this many lines are candidates for function splitting.
pub const LONG_FILE_LINES: usize = 80;
/// Minimum conditional count for the complexity predicate.
pub const MIN_CONDITIONALS: usize = 4;
/// Minimum loop count for the performance predicate.
pub const MIN_LOOPS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    RedundantGuards,
    Dry,
    ErrorHandling,
    EnvGating,
    SplitFunctions,
    Naming,
    Complexity,
    Performance,
    General,
}

static ALWAYS_TRUE_GUARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)\bif\s*(?:\(\s*(?:true|True)\s*\)|(?:true|True))\s*[{:]")
        .expect("guard regex should be valid")
});

static FUNCTION_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(?:(?:pub(?:\([^)]*\))?|export|async|static|private|public)\s+)*(?:fn|func|def|function)\b",
    )
    .expect("function regex should be valid")
});

static CONDITIONAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:if|elif|else if|switch|case|match)\b").expect("conditional regex should be valid")
});

static LOOP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:for|while|loop)\b|\.forEach\(").expect("loop regex should be valid"));

const ERROR_IDIOMS: &[&str] = &[
    "err != nil",
    "catch",
    "except",
    "raise ",
    "throw ",
    "Result<",
    "unwrap()",
    "expect(",
    "panic(",
    "errors.New",
    "fmt.Errorf",
];

const ENV_IDIOMS: &[&str] = &[
    "os.Getenv",
    "os.LookupEnv",
    "process.env",
    "os.environ",
    "os.getenv",
    "env::var",
    "std::env",
];

impl RuleCategory {
    /// Resolve the category for a rule.
    pub fn resolve(rule: &Rule) -> Self {
        if let Some(category) = rule.category {
            return category;
        }
        if let Some(category) = Self::from_canonical_id(&rule.id) {
            return category;
        }
        Self::from_keywords(rule)
    }

    fn from_canonical_id(id: &str) -> Option<Self> {
        let category = match id {
            "remove_redundant_guards" => Self::RedundantGuards,
            "refactor_dry" => Self::Dry,
            "harden_error_handling" => Self::ErrorHandling,
            "gate_features_env" => Self::EnvGating,
            "split_functions" => Self::SplitFunctions,
            "standardize_naming" => Self::Naming,
            "simplify_complex_logic" => Self::Complexity,
            "detect_expensive_functions" => Self::Performance,
            _ => return None,
        };
        Some(category)
    }

    fn from_keywords(rule: &Rule) -> Self {
        let text = format!(
            "{} {} {} {}",
            rule.id, rule.title, rule.description, rule.details
        )
        .to_lowercase();
        let has = |needle: &str| text.contains(needle);

        if has("redundant guard") {
            Self::RedundantGuards
        } else if has("dry") || has("duplicate") {
            Self::Dry
        } else if has("error handling") {
            Self::ErrorHandling
        } else if has("environment variable") || has("env-guard") || has("gate features") {
            Self::EnvGating
        } else if has("split") && has("function") {
            Self::SplitFunctions
        } else if has("naming") {
            Self::Naming
        } else if has("simplify complex") || has("reduce complexity") || has("complexity") {
            Self::Complexity
        } else if has("expensive") || has("performance") || has("hot path") {
            Self::Performance
        } else {
            Self::General
        }
    }

    /// True if a file with `content` is a target for this category.
    pub fn matches(self, content: &str) -> bool {
        match self {
            Self::RedundantGuards => ALWAYS_TRUE_GUARD.is_match(content),
            Self::Dry => FUNCTION_DEF.find_iter(content).take(2).count() > 1,
            Self::ErrorHandling => ERROR_IDIOMS.iter().any(|idiom| content.contains(idiom)),
            Self::EnvGating => ENV_IDIOMS.iter().any(|idiom| content.contains(idiom)),
            Self::SplitFunctions => content.lines().count() > LONG_FILE_LINES,
            Self::Complexity => CONDITIONAL.find_iter(content).count() >= MIN_CONDITIONALS,
            Self::Performance => LOOP.find_iter(content).count() >= MIN_LOOPS,
            Self::Naming | Self::General => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RedundantGuards => "redundant_guards",
            Self::Dry => "dry",
            Self::ErrorHandling => "error_handling",
            Self::EnvGating => "env_gating",
            Self::SplitFunctions => "split_functions",
            Self::Naming => "naming",
            Self::Complexity => "complexity",
            Self::Performance => "performance",
            Self::General => "general",
        }
    }
}
