//! Filter resolution: turning name patterns and attribute clauses into a
//! per-test [`Verdict`].
//!
//! Name filters gate existence: a test whose name matches no pattern is
//! hidden and never reaches the event stream. Attribute filters gate
//! execution state: they can only force a test to run or to skip, and only
//! when one of their groups applies.

use std::fmt;
use std::ops::Not;

use miette::Diagnostic;
use regex::Regex;
use thiserror::Error;

use crate::attributes::{Action, AttrInstance, AttributeSet};
use crate::suite::{TestDescriptor, TestName};

/// The decision a filter makes for one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Run,
    /// Skip, carrying the attribute that triggered it when there is one.
    Skip(Option<AttrInstance>),
    Hide,
    /// The filter has no opinion. Never the final verdict.
    Indeterminate,
}

impl Verdict {
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Verdict::Indeterminate)
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum FilterError {
    #[error("invalid test name pattern '{pattern}'")]
    #[diagnostic(code(crucible::filters::pattern))]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid attribute clause '{text}': {reason}")]
    #[diagnostic(
        code(crucible::filters::clause),
        help("clauses look like `name`, `name=value`, `!name` or `!name=value`")
    )]
    InvalidClause { text: String, reason: &'static str },
}

/// Verdict from the attributes' own actions: the first attribute (in name
/// order) whose action is skip skips the test.
pub fn intrinsic_verdict(attrs: &AttributeSet) -> Verdict {
    attrs
        .iter()
        .find(|instance| instance.attribute().action() == Action::Skip)
        .map_or(Verdict::Run, |instance| Verdict::Skip(Some(instance.clone())))
}

// ============================================================================
// NAME FILTER
// ============================================================================

/// Inclusion patterns over a test's full name. Any match admits the test.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    patterns: Vec<Regex>,
}

impl NameFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::new();
        for pattern in patterns {
            filter.insert_pattern(pattern.as_ref())?;
        }
        Ok(filter)
    }

    pub fn insert(&mut self, pattern: Regex) {
        self.patterns.push(pattern);
    }

    pub fn insert_pattern(&mut self, pattern: &str) -> Result<(), FilterError> {
        let regex = Regex::new(pattern).map_err(|source| FilterError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.insert(regex);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// `Hide` when patterns exist and none matches; otherwise the test's
    /// intrinsic verdict.
    pub fn verdict(&self, name: &TestName, attrs: &AttributeSet) -> Verdict {
        if self.patterns.is_empty() {
            return intrinsic_verdict(attrs);
        }
        let full_name = name.full_name();
        if self.patterns.iter().any(|p| p.is_match(&full_name)) {
            intrinsic_verdict(attrs)
        } else {
            Verdict::Hide
        }
    }
}

// ============================================================================
// ATTRIBUTE CLAUSES AND GROUPS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Present,
    HasValue(String),
}

/// A boolean test over one attribute of a test's effective set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrClause {
    attribute: String,
    predicate: Predicate,
    negated: bool,
}

impl AttrClause {
    /// Holds when the attribute is present.
    pub fn has(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            predicate: Predicate::Present,
            negated: false,
        }
    }

    /// Holds when the attribute is present and carries `value`.
    pub fn has_value(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            predicate: Predicate::HasValue(value.into()),
            negated: false,
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn holds(&self, attrs: &AttributeSet) -> bool {
        let instance = attrs.get(&self.attribute);
        let matched = match (&self.predicate, instance) {
            (_, None) => false,
            (Predicate::Present, Some(_)) => true,
            (Predicate::HasValue(value), Some(instance)) => instance.has_value(value),
        };
        matched != self.negated
    }

    /// Parses `name`, `name=value`, `!name` or `!name=value`.
    pub fn parse(text: &str) -> Result<Self, FilterError> {
        let invalid = |reason| FilterError::InvalidClause {
            text: text.to_string(),
            reason,
        };
        let trimmed = text.trim();
        let (negated, body) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };
        let clause = match body.split_once('=') {
            Some((name, value)) => {
                if value.is_empty() {
                    return Err(invalid("missing value after '='"));
                }
                Self::has_value(name.trim(), value)
            }
            None => Self::has(body),
        };
        if clause.attribute.is_empty() {
            return Err(invalid("missing attribute name"));
        }
        Ok(if negated { !clause } else { clause })
    }
}

impl Not for AttrClause {
    type Output = Self;

    fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }
}

impl fmt::Display for AttrClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("!")?;
        }
        f.write_str(&self.attribute)?;
        if let Predicate::HasValue(value) = &self.predicate {
            write!(f, "={value}")?;
        }
        Ok(())
    }
}

/// The verdict a group asserts when it applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAction {
    Run,
    Skip,
}

/// A conjunction of clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrFilterGroup {
    clauses: Vec<AttrClause>,
    action: GroupAction,
}

impl AttrFilterGroup {
    pub fn new(action: GroupAction, clauses: impl IntoIterator<Item = AttrClause>) -> Self {
        Self {
            clauses: clauses.into_iter().collect(),
            action,
        }
    }

    pub fn skip(clauses: impl IntoIterator<Item = AttrClause>) -> Self {
        Self::new(GroupAction::Skip, clauses)
    }

    pub fn run(clauses: impl IntoIterator<Item = AttrClause>) -> Self {
        Self::new(GroupAction::Run, clauses)
    }

    /// Parses comma-separated clauses into one group.
    pub fn parse(text: &str, action: GroupAction) -> Result<Self, FilterError> {
        let clauses = text
            .split(',')
            .map(AttrClause::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(action, clauses))
    }

    pub fn action(&self) -> GroupAction {
        self.action
    }

    pub fn clauses(&self) -> &[AttrClause] {
        &self.clauses
    }

    /// The group's action when every clause holds, `Indeterminate` otherwise.
    pub fn verdict(&self, attrs: &AttributeSet) -> Verdict {
        if !self.clauses.iter().all(|clause| clause.holds(attrs)) {
            return Verdict::Indeterminate;
        }
        match self.action {
            GroupAction::Run => Verdict::Run,
            GroupAction::Skip => {
                let trigger = self
                    .clauses
                    .iter()
                    .find_map(|clause| attrs.get(clause.attribute()))
                    .cloned();
                Verdict::Skip(trigger)
            }
        }
    }
}

/// A disjunction of groups, evaluated in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrFilterSet {
    groups: Vec<AttrFilterGroup>,
}

impl AttrFilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, group: AttrFilterGroup) {
        self.groups.push(group);
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// First applicable group's verdict, or `Indeterminate`.
    pub fn verdict(&self, attrs: &AttributeSet) -> Verdict {
        self.groups
            .iter()
            .map(|group| group.verdict(attrs))
            .find(|verdict| !verdict.is_indeterminate())
            .unwrap_or(Verdict::Indeterminate)
    }
}

impl FromIterator<AttrFilterGroup> for AttrFilterSet {
    fn from_iter<T: IntoIterator<Item = AttrFilterGroup>>(iter: T) -> Self {
        Self {
            groups: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// COMBINED FILTER
// ============================================================================

/// Name filter first, then attribute filters.
#[derive(Debug, Clone, Default)]
pub struct CombinedFilter {
    pub by_name: NameFilter,
    pub by_attr: AttrFilterSet,
}

impl CombinedFilter {
    pub fn new(by_name: NameFilter, by_attr: AttrFilterSet) -> Self {
        Self { by_name, by_attr }
    }

    pub fn verdict_for(&self, name: &TestName, attrs: &AttributeSet) -> Verdict {
        let first = self.by_name.verdict(name, attrs);
        if first == Verdict::Hide {
            return first;
        }
        match self.by_attr.verdict(attrs) {
            Verdict::Indeterminate => first,
            second => second,
        }
    }

    /// Final verdict for `test`; never `Indeterminate`.
    pub fn verdict(&self, test: &TestDescriptor) -> Verdict {
        self.verdict_for(&test.name, &test.attrs)
    }
}
