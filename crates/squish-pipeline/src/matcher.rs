//! Asset selection: match specs compiled into a reusable predicate

use std::fmt;
use std::sync::Arc;

use globset::GlobBuilder;
use regex::Regex;
use squish_core::config::{MatchRule, TestOption};

/// Predicate over an asset name
pub type NameFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Errors raised while compiling a match spec
#[derive(Debug, thiserror::Error)]
pub enum InvalidSpecError {
    /// Glob string could not be parsed
    #[error("Invalid glob '{glob}': {source}")]
    Glob {
        glob: String,
        #[source]
        source: globset::Error,
    },

    /// Regular expression could not be compiled
    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// How to select assets by name
#[derive(Clone)]
pub enum MatchSpec {
    /// Regular expression searched anywhere in the name
    Pattern(Regex),
    /// Glob matched against the whole name
    Glob(String),
    /// Custom function
    Predicate(NameFn),
    /// Any of the nested specs
    List(Vec<MatchSpec>),
}

impl MatchSpec {
    /// Match names with a glob such as `**/*.png`
    pub fn glob(glob: impl Into<String>) -> Self {
        Self::Glob(glob.into())
    }

    /// Match names with a custom function
    pub fn predicate(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    /// Match every name
    pub fn any() -> Self {
        Self::predicate(|_| true)
    }

    /// Build a spec from configuration rules
    pub fn from_config(test: &TestOption) -> Result<Self, InvalidSpecError> {
        let specs = test
            .rules()
            .into_iter()
            .map(|rule| match rule {
                MatchRule::Glob(glob) => Ok(Self::Glob(glob)),
                MatchRule::Regex { regex } => Regex::new(&regex)
                    .map(Self::Pattern)
                    .map_err(|source| InvalidSpecError::Pattern {
                        pattern: regex,
                        source,
                    }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::List(specs))
    }
}

impl fmt::Debug for MatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Glob(glob) => f.debug_tuple("Glob").field(glob).finish(),
            Self::Predicate(_) => f.write_str("Predicate(<fn>)"),
            Self::List(specs) => f.debug_tuple("List").field(specs).finish(),
        }
    }
}

impl From<&str> for MatchSpec {
    fn from(glob: &str) -> Self {
        Self::Glob(glob.to_string())
    }
}

impl From<Regex> for MatchSpec {
    fn from(re: Regex) -> Self {
        Self::Pattern(re)
    }
}

impl From<Vec<MatchSpec>> for MatchSpec {
    fn from(specs: Vec<MatchSpec>) -> Self {
        Self::List(specs)
    }
}

/// A single compiled name test
#[derive(Clone)]
enum NameMatcher {
    Pattern(Regex),
    // globset emits byte-oriented regexes
    Glob(regex::bytes::Regex),
    Predicate(NameFn),
}

impl NameMatcher {
    /// Compile a spec, flattening nested lists into `out`
    fn compile_into(spec: MatchSpec, out: &mut Vec<Self>) -> Result<(), InvalidSpecError> {
        match spec {
            MatchSpec::Pattern(re) => out.push(Self::Pattern(re)),
            MatchSpec::Predicate(f) => out.push(Self::Predicate(f)),
            MatchSpec::Glob(glob) => out.push(Self::compile_glob(glob)?),
            MatchSpec::List(specs) => {
                for spec in specs {
                    Self::compile_into(spec, out)?;
                }
            }
        }
        Ok(())
    }

    fn compile_glob(glob: String) -> Result<Self, InvalidSpecError> {
        let compiled = match GlobBuilder::new(&glob).literal_separator(true).build() {
            Ok(compiled) => compiled,
            Err(source) => return Err(InvalidSpecError::Glob { glob, source }),
        };
        let pattern = compiled.regex().to_string();
        regex::bytes::Regex::new(&pattern)
            .map(Self::Glob)
            .map_err(|source| InvalidSpecError::Pattern { pattern, source })
    }

    fn is_match(&self, name: &str) -> bool {
        match self {
            Self::Pattern(re) => re.is_match(name),
            Self::Glob(re) => re.is_match(name.as_bytes()),
            Self::Predicate(f) => f(name),
        }
    }
}

/// Compiled asset filter over name and content length.
///
/// Matches when any name matcher accepts the name and
/// `min_size < len <= max_size`.
#[derive(Clone)]
pub struct Predicate {
    matchers: Vec<NameMatcher>,
    min_size: u64,
    max_size: Option<u64>,
}

impl Predicate {
    /// Compile a match spec with size bounds.
    ///
    /// `min_size` is exclusive and `max_size` inclusive; `None` means
    /// unbounded.
    pub fn compile(
        spec: impl Into<MatchSpec>,
        min_size: u64,
        max_size: Option<u64>,
    ) -> Result<Self, InvalidSpecError> {
        let mut matchers = Vec::new();
        NameMatcher::compile_into(spec.into(), &mut matchers)?;

        Ok(Self {
            matchers,
            min_size,
            max_size,
        })
    }

    /// Test an asset
    pub fn matches(&self, name: &str, len: u64) -> bool {
        if !self.matchers.iter().any(|m| m.is_match(name)) {
            return false;
        }
        len > self.min_size && self.max_size.map_or(true, |max| len <= max)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("matchers", &self.matchers.len())
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .finish()
    }
}
