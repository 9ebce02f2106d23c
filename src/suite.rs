//! The test tree handed to the driver.
//!
//! Suites are assembled with a small builder and then flattened into an
//! ordered list of [`TestDescriptor`]s. Flattening folds every enclosing
//! suite's attributes into each test's effective [`AttributeSet`].

use std::fmt;

use crate::attributes::{unite, AttrInstance, AttributeError, AttributeSet};
use crate::expect::TestResult;

/// Position of a test in the flattened tree. Stable for a given program, so
/// it is how a child process is told which test to run.
pub type TestId = usize;

/// Invocable test body.
pub type TestBody = Box<dyn Fn() -> TestResult>;

/// Hierarchical name of a test.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestName {
    pub suites: Vec<String>,
    pub test: String,
    pub id: TestId,
}

impl TestName {
    pub fn full_name(&self) -> String {
        let mut parts: Vec<&str> = self.suites.iter().map(String::as_str).collect();
        parts.push(&self.test);
        parts.join(" > ")
    }
}

impl fmt::Display for TestName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// One runnable test with its effective attributes.
pub struct TestDescriptor {
    pub name: TestName,
    pub attrs: AttributeSet,
    body: TestBody,
}

impl TestDescriptor {
    pub fn invoke(&self) -> TestResult {
        (self.body)()
    }
}

impl fmt::Debug for TestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestDescriptor")
            .field("name", &self.name)
            .field("attrs", &self.attrs)
            .finish_non_exhaustive()
    }
}

struct TestCase {
    name: String,
    attrs: AttributeSet,
    body: TestBody,
}

/// A named group of tests and nested suites.
///
/// Tests run in declaration order, followed by subsuites in declaration
/// order.
pub struct Suite {
    name: String,
    attrs: AttributeSet,
    tests: Vec<TestCase>,
    subsuites: Vec<Suite>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: AttributeSet::new(),
            tests: Vec::new(),
            subsuites: Vec::new(),
        }
    }

    /// Attributes inherited by every test in this suite and its subsuites.
    pub fn with_attrs(mut self, attrs: impl IntoIterator<Item = AttrInstance>) -> Self {
        self.attrs = attrs.into_iter().collect();
        self
    }

    pub fn test<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn() -> TestResult + 'static,
    {
        self.test_with(name, std::iter::empty::<AttrInstance>(), body)
    }

    pub fn test_with<A, F>(mut self, name: impl Into<String>, attrs: A, body: F) -> Self
    where
        A: IntoIterator<Item = AttrInstance>,
        F: Fn() -> TestResult + 'static,
    {
        self.tests.push(TestCase {
            name: name.into(),
            attrs: attrs.into_iter().collect(),
            body: Box::new(body),
        });
        self
    }

    pub fn subsuite(mut self, suite: Suite) -> Self {
        self.subsuites.push(suite);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The flattened, ordered tree.
#[derive(Debug, Default)]
pub struct TestTree {
    tests: Vec<TestDescriptor>,
}

impl TestTree {
    /// Flattens `suites` in declaration order.
    ///
    /// Fails when two distinct attributes with the same name meet on the
    /// way down the tree.
    pub fn build(suites: Vec<Suite>) -> Result<Self, AttributeError> {
        let mut tree = Self::default();
        let inherited = AttributeSet::new();
        for suite in suites {
            tree.flatten(suite, &[], &inherited)?;
        }
        Ok(tree)
    }

    fn flatten(
        &mut self,
        suite: Suite,
        parents: &[String],
        inherited: &AttributeSet,
    ) -> Result<(), AttributeError> {
        let suite_attrs = unite(&suite.attrs, inherited)?;
        let mut path = parents.to_vec();
        path.push(suite.name);

        for case in suite.tests {
            let attrs = unite(&case.attrs, &suite_attrs)?;
            let name = TestName {
                suites: path.clone(),
                test: case.name,
                id: self.tests.len(),
            };
            self.tests.push(TestDescriptor {
                name,
                attrs,
                body: case.body,
            });
        }
        for child in suite.subsuites {
            self.flatten(child, &path, &suite_attrs)?;
        }
        Ok(())
    }

    pub fn get(&self, id: TestId) -> Option<&TestDescriptor> {
        self.tests.get(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestDescriptor> {
        self.tests.iter()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

impl<'a> IntoIterator for &'a TestTree {
    type Item = &'a TestDescriptor;
    type IntoIter = std::slice::Iter<'a, TestDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.tests.iter()
    }
}
