//! Composable test attributes.
//!
//! An [`Attribute`] is an identity: a name, the action it requests for the
//! tests it tags, and a kind that decides how two instances of it merge.
//! Suites and tests carry [`AttrInstance`]s, collected into an
//! [`AttributeSet`] ordered by attribute name. Attributes inherited from
//! enclosing suites are folded into each test's own set with [`unite`].
//!
//! Identity is pointer identity of the shared [`Attribute`]: two attributes
//! that happen to share a name are still different attributes, and composing
//! their instances is a usage error.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use miette::Diagnostic;
use once_cell::sync::Lazy;
use thiserror::Error;

// ============================================================================
// ATTRIBUTE IDENTITY
// ============================================================================

/// What an attribute asks the driver to do with the tests it tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Run,
    Skip,
    /// Only ever produced by filters; an attribute can't carry it.
    Hide,
}

/// Composition rule of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKind {
    /// A flag, optionally with a comment. Left-biased.
    Bool,
    /// A single value. Left-biased.
    Scalar,
    /// A set of values. Composes by union.
    List,
}

impl AttrKind {
    fn compose(self, lhs: &AttrInstance, rhs: &AttrInstance) -> AttrInstance {
        match self {
            AttrKind::Bool | AttrKind::Scalar => lhs.clone(),
            AttrKind::List => AttrInstance {
                attribute: Arc::clone(&lhs.attribute),
                values: lhs.values.union(&rhs.values).cloned().collect(),
            },
        }
    }
}

/// Errors raised by misuse of the attribute algebra.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum AttributeError {
    #[error("attribute '{name}': action can't be \"hide\"")]
    #[diagnostic(
        code(crucible::attributes::hide_action),
        help("hide is a filter verdict; declare the attribute with run or skip")
    )]
    HideAction { name: String },

    #[error("mismatched attributes: '{lhs}' and '{rhs}' are different attributes")]
    #[diagnostic(
        code(crucible::attributes::mismatched),
        help("two distinct attributes share a name; declare the attribute once and reuse it")
    )]
    Mismatched { lhs: String, rhs: String },
}

/// A named, composable tag definition.
pub struct Attribute {
    name: String,
    action: Action,
    kind: AttrKind,
}

impl Attribute {
    /// Declares a new attribute.
    ///
    /// Fails with [`AttributeError::HideAction`] when `action` is
    /// [`Action::Hide`].
    pub fn new(
        name: impl Into<String>,
        kind: AttrKind,
        action: Action,
    ) -> Result<Arc<Self>, AttributeError> {
        let name = name.into();
        if action == Action::Hide {
            return Err(AttributeError::HideAction { name });
        }
        Ok(Arc::new(Self { name, action, kind }))
    }

    /// A flag attribute. Pass [`Action::Skip`] to declare a skipping tag.
    pub fn boolean(name: impl Into<String>, action: Action) -> Result<Arc<Self>, AttributeError> {
        Self::new(name, AttrKind::Bool, action)
    }

    pub fn scalar(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            action: Action::Run,
            kind: AttrKind::Scalar,
        })
    }

    pub fn list(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            action: Action::Run,
            kind: AttrKind::List,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn kind(&self) -> AttrKind {
        self.kind
    }

    /// An instance with no values (a bare flag).
    pub fn tag(self: &Arc<Self>) -> AttrInstance {
        AttrInstance::new(self, std::iter::empty::<String>())
    }

    /// An instance with a single value: a comment for flags, the value for
    /// scalars, a one-element list otherwise.
    pub fn with(self: &Arc<Self>, value: impl Into<String>) -> AttrInstance {
        AttrInstance::new(self, std::iter::once(value.into()))
    }

    pub fn with_all<I, S>(self: &Arc<Self>, values: I) -> AttrInstance
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AttrInstance::new(self, values)
    }

    /// Merges two instances of this attribute according to its kind.
    ///
    /// Both instances must reference `self`; anything else is a usage error.
    pub fn compose(
        self: &Arc<Self>,
        lhs: &AttrInstance,
        rhs: &AttrInstance,
    ) -> Result<AttrInstance, AttributeError> {
        for other in [lhs, rhs] {
            if !Arc::ptr_eq(self, &other.attribute) {
                return Err(AttributeError::Mismatched {
                    lhs: self.name.clone(),
                    rhs: other.attribute.name.clone(),
                });
            }
        }
        Ok(self.kind.compose(lhs, rhs))
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("action", &self.action)
            .field("kind", &self.kind)
            .finish()
    }
}

/// The built-in `skip` flag. Tests tagged with it are skipped unless a filter
/// forces them to run.
pub static SKIP: Lazy<Arc<Attribute>> = Lazy::new(|| {
    Arc::new(Attribute {
        name: "skip".to_string(),
        action: Action::Skip,
        kind: AttrKind::Bool,
    })
});

/// `skip` with no reason.
pub fn skip() -> AttrInstance {
    SKIP.tag()
}

/// `skip` with a reason shown in the Skipped event.
pub fn skip_because(reason: impl Into<String>) -> AttrInstance {
    SKIP.with(reason)
}

// ============================================================================
// INSTANCES
// ============================================================================

/// One attribute attached to a suite or test, with its values.
#[derive(Clone)]
pub struct AttrInstance {
    attribute: Arc<Attribute>,
    values: BTreeSet<String>,
}

impl AttrInstance {
    pub fn new<I, S>(attribute: &Arc<Attribute>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attribute: Arc::clone(attribute),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn attribute(&self) -> &Arc<Attribute> {
        &self.attribute
    }

    pub fn name(&self) -> &str {
        self.attribute.name()
    }

    pub fn values(&self) -> &BTreeSet<String> {
        &self.values
    }

    pub fn has_value(&self, value: &str) -> bool {
        self.values.contains(value)
    }

    /// Orders instances by attribute name only.
    pub fn cmp_by_name(&self, other: &Self) -> Ordering {
        self.name().cmp(other.name())
    }
}

impl PartialEq for AttrInstance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.attribute, &other.attribute) && self.values == other.values
    }
}

impl Eq for AttrInstance {}

impl fmt::Debug for AttrInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.name(), self.values)
    }
}

impl fmt::Display for AttrInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        if !self.values.is_empty() {
            let joined: Vec<&str> = self.values.iter().map(String::as_str).collect();
            write!(f, "({})", joined.join(", "))?;
        }
        Ok(())
    }
}

/// Merges two instances of the same attribute.
pub fn unite_instances(
    lhs: &AttrInstance,
    rhs: &AttrInstance,
) -> Result<AttrInstance, AttributeError> {
    lhs.attribute.compose(lhs, rhs)
}

// ============================================================================
// ATTRIBUTE SETS
// ============================================================================

/// Attribute instances ordered by name, with at most one instance per name.
///
/// Backed by a sorted vector; lookups by bare name are binary searches.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    items: Vec<AttrInstance>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `instance` unless an instance with the same name is already
    /// present. Returns whether it was inserted.
    pub fn insert(&mut self, instance: AttrInstance) -> bool {
        match self.position(instance.name()) {
            Ok(_) => false,
            Err(at) => {
                self.items.insert(at, instance);
                true
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttrInstance> {
        self.position(name).ok().map(|at| &self.items[at])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_ok()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AttrInstance> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn position(&self, name: &str) -> Result<usize, usize> {
        self.items.binary_search_by(|item| item.name().cmp(name))
    }
}

impl FromIterator<AttrInstance> for AttributeSet {
    fn from_iter<T: IntoIterator<Item = AttrInstance>>(iter: T) -> Self {
        let mut set = Self::new();
        for instance in iter {
            set.insert(instance);
        }
        set
    }
}

impl<const N: usize> From<[AttrInstance; N]> for AttributeSet {
    fn from(items: [AttrInstance; N]) -> Self {
        items.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a AttributeSet {
    type Item = &'a AttrInstance;
    type IntoIter = std::slice::Iter<'a, AttrInstance>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Debug for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.items.iter()).finish()
    }
}

/// Merges two name-ordered sets in one linear pass.
///
/// Names present in only one set pass through; names present in both are
/// composed with `lhs`'s instance on the left.
pub fn unite(lhs: &AttributeSet, rhs: &AttributeSet) -> Result<AttributeSet, AttributeError> {
    let mut merged = Vec::with_capacity(lhs.len() + rhs.len());
    let (mut i, mut j) = (0, 0);

    while i < lhs.items.len() && j < rhs.items.len() {
        let (l, r) = (&lhs.items[i], &rhs.items[j]);
        match l.cmp_by_name(r) {
            Ordering::Less => {
                merged.push(l.clone());
                i += 1;
            }
            Ordering::Greater => {
                merged.push(r.clone());
                j += 1;
            }
            Ordering::Equal => {
                merged.push(unite_instances(l, r)?);
                i += 1;
                j += 1;
            }
        }
    }
    merged.extend_from_slice(&lhs.items[i..]);
    merged.extend_from_slice(&rhs.items[j..]);

    Ok(AttributeSet { items: merged })
}
