use crate::error::ExpectError;
use serde::Serialize;

/// Occurrence constraint on an expectation, with its running match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quantifier {
    label: &'static str,
    min: usize,
    max: usize,
    count: usize,
}

impl Quantifier {
    fn new(label: &'static str, min: usize, max: usize) -> Self {
        Self {
            label,
            min,
            max,
            count: 0,
        }
    }

    pub fn never() -> Self {
        Self::new("never", 0, 0)
    }

    pub fn once() -> Self {
        Self::new("once", 1, 1)
    }

    pub fn exactly(n: usize) -> Self {
        Self::new("exactly", n, n)
    }

    /// No upper bound.
    pub fn at_least(n: usize) -> Self {
        Self::new("at least", n, usize::MAX)
    }

    pub fn at_most(n: usize) -> Self {
        Self::new("at most", 0, n)
    }

    /// An inclusive range. Fails when `min > max`, since no count could satisfy it.
    pub fn between(min: usize, max: usize) -> Result<Self, ExpectError> {
        if min > max {
            return Err(ExpectError::InvalidQuantifier { min, max });
        }
        Ok(Self::new("between", min, max))
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_unbounded(&self) -> bool {
        self.max == usize::MAX
    }

    pub(crate) fn record(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    pub fn is_satisfied(&self) -> bool {
        self.min <= self.count && self.count <= self.max
    }

    /// The expected side of a failure reason, e.g. `1`, `2..5` or `at least 3`.
    pub fn describe_expected(&self) -> String {
        if self.is_unbounded() {
            format!("at least {}", self.min)
        } else if self.min == self.max {
            self.min.to_string()
        } else {
            format!("{}..{}", self.min, self.max)
        }
    }
}
