//! String-keyed metadata tags for error values.

use std::borrow::Cow;
use std::fmt;

/// A string-keyed metadata tag attached to an error value.
///
/// Traits survive rewrapping: a trait set on the deepest error of a chain is
/// readable through [`crate::propagated_trait`] no matter how many wrappers
/// were added above it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Trait(Cow<'static, str>);

impl Trait {
    /// Create a trait key from an owned or borrowed name.
    pub fn new(name: impl Into<String>) -> Self {
        Trait(Cow::Owned(name.into()))
    }

    /// Create a trait key from a static name, usable in `const` contexts.
    pub const fn from_static(name: &'static str) -> Self {
        Trait(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
