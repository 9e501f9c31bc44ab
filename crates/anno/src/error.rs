//! The annotated error value and its cause chain.

use std::collections::BTreeMap;
use std::fmt;

use crate::Trait;

/// The field layout of an error kind: ordered `(name, type)` pairs, recorded
/// by generated constructors so chains can be searched by shape.
pub type Shape = &'static [(&'static str, &'static str)];

/// One link below an error: either another annotated error or a foreign
/// error that was produced outside this model.
pub enum Cause {
    /// A cause that is itself an annotated error; the chain continues.
    Annotated(Box<Error>),
    /// A foreign error; the chain ends here.
    Foreign(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Cause {
    pub fn annotated(err: Error) -> Self {
        Cause::Annotated(Box::new(err))
    }

    pub fn foreign<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Cause::Foreign(Box::new(err))
    }

    /// View this cause as a plain `std::error::Error`.
    pub fn as_std(&self) -> &(dyn std::error::Error + 'static) {
        match self {
            Cause::Annotated(err) => err.as_ref(),
            Cause::Foreign(err) => err.as_ref(),
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Annotated(err) => fmt::Display::fmt(err, f),
            Cause::Foreign(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Annotated(err) => fmt::Debug::fmt(err, f),
            Cause::Foreign(err) => fmt::Debug::fmt(err, f),
        }
    }
}

/// An annotated error: a kind tag, a message, an optional wrapped cause, an
/// optional operation label and a trait map.
///
/// Constructed once at the failure site, enriched by the immediate caller via
/// the fluent `add_*` mutators, then either rewrapped further up the stack or
/// terminally reported. Each instance is owned by exactly one holder at a
/// time; wrapping transfers ownership, so chains are finite and acyclic.
pub struct Error {
    kind: String,
    message: String,
    op: Option<String>,
    traits: BTreeMap<Trait, String>,
    shape: Shape,
    cause: Option<Box<Cause>>,
}

impl Error {
    /// Create an error with an explicit kind tag and a message that carries
    /// no kind prefix. This is the entry point used by generated constructors.
    pub fn kinded(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            op: None,
            traits: BTreeMap::new(),
            shape: &[],
            cause: None,
        }
    }

    /// Create an error from an already formatted message, parsing a leading
    /// `Name: ` prefix into the kind tag when present. The message text is
    /// kept intact either way. This is the entry point used by [`errorf!`].
    ///
    /// [`errorf!`]: crate::errorf
    pub fn adhoc(message: String) -> Self {
        let kind = parse_kind_prefix(&message)
            .map(|(kind, _)| kind.to_string())
            .unwrap_or_default();
        Self {
            kind,
            message,
            op: None,
            traits: BTreeMap::new(),
            shape: &[],
            cause: None,
        }
    }

    /// The kind tag, empty for untagged errors.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Attach an annotated cause. Write-once per hop: callers are expected
    /// not to overwrite an existing cause.
    pub fn add_error(mut self, cause: Error) -> Self {
        debug_assert!(self.cause.is_none(), "cause already set");
        self.cause = Some(Box::new(Cause::annotated(cause)));
        self
    }

    /// Attach a foreign cause produced outside this model.
    pub fn add_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        debug_assert!(self.cause.is_none(), "cause already set");
        self.cause = Some(Box::new(Cause::foreign(source)));
        self
    }

    /// Set the operation label identifying the logical operation that was
    /// active when this error was produced.
    pub fn add_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Attach a trait to this error instance.
    pub fn add_trait(mut self, key: Trait, value: impl Into<String>) -> Self {
        self.traits.insert(key, value.into());
        self
    }

    /// Read a trait attached to this instance. Only locally attached traits
    /// are visible here; see [`crate::propagated_trait`] for the
    /// root-oriented read.
    pub fn get_trait(&self, key: &Trait) -> Option<&str> {
        self.traits.get(key).map(String::as_str)
    }

    /// Read-only view of every trait attached to this instance.
    pub fn traits(&self) -> &BTreeMap<Trait, String> {
        &self.traits
    }

    /// Record the field layout of this error's kind.
    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// The immediate cause, or `None` at the chain's end.
    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_deref()
    }

    /// Follow the chain to its terminal value: the first foreign error, or
    /// `None` when the chain ends without one.
    pub fn root_cause(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let mut cur = self.cause()?;
        loop {
            match cur {
                Cause::Annotated(err) => cur = err.cause()?,
                Cause::Foreign(err) => return Some(err.as_ref()),
            }
        }
    }

    /// The deepest annotated error in the chain; the receiver itself when it
    /// wraps no annotated cause.
    pub fn bottom_annotated(&self) -> &Error {
        let mut cur = self;
        while let Some(Cause::Annotated(next)) = cur.cause() {
            cur = next;
        }
        cur
    }

    /// Search the cause chain, starting one hop below the receiver, for the
    /// first annotated ancestor with the given kind tag. The search stops
    /// without a match at a foreign link or at the chain's end.
    pub fn find_kind(&self, kind: &str) -> Option<&Error> {
        let mut cur = self.cause()?;
        loop {
            match cur {
                Cause::Annotated(err) => {
                    if err.kind() == kind {
                        return Some(err);
                    }
                    cur = err.cause()?;
                }
                Cause::Foreign(_) => return None,
            }
        }
    }

    /// True iff [`find_kind`](Self::find_kind) succeeds.
    pub fn has_kind(&self, kind: &str) -> bool {
        self.find_kind(kind).is_some()
    }

    /// Compatibility search matching ancestors by recorded field layout
    /// rather than by kind tag, starting one hop below the receiver.
    ///
    /// Sharp edge, preserved deliberately: semantically unrelated kinds that
    /// happen to share a layout (any two zero-field kinds, for instance)
    /// match each other. Prefer [`find_kind`](Self::find_kind).
    pub fn find_shape(&self, shape: &[(&str, &str)]) -> Option<&Error> {
        let mut cur = self.cause()?;
        loop {
            match cur {
                Cause::Annotated(err) => {
                    if shape_matches(err.shape(), shape) {
                        return Some(err);
                    }
                    cur = err.cause()?;
                }
                Cause::Foreign(_) => return None,
            }
        }
    }

    /// Render the full chain, innermost entry first. See [`crate::strace`].
    pub fn strace(&self) -> String {
        crate::strace(self)
    }

    /// Print the rendered chain to stdout.
    pub fn trace(&self) {
        crate::trace(self)
    }
}

fn shape_matches(have: Shape, want: &[(&str, &str)]) -> bool {
    have.len() == want.len()
        && have
            .iter()
            .zip(want)
            .all(|((an, at), (bn, bt))| an == bn && at == bt)
}

/// Split a `Name: rest` prefix off a message. The name must be a PascalCase
/// word: an uppercase ASCII letter followed by one or more letters.
pub(crate) fn parse_kind_prefix(message: &str) -> Option<(&str, &str)> {
    let (head, tail) = message.split_once(':')?;
    let mut chars = head.chars();
    let first = chars.next()?;
    if !first.is_ascii_uppercase() || head.len() < 2 {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let rest = tail.strip_prefix(|c: char| c.is_whitespace())?;
    Some((head, rest))
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_empty() {
            writeln!(f, "{}", self.message)?;
        } else {
            writeln!(f, "{} => {}", self.kind, self.message)?;
        }

        if let Some(op) = &self.op {
            writeln!(f, "    Op: {}", op)?;
        }

        if !self.traits.is_empty() {
            writeln!(f, "    Traits:")?;
            for (key, value) in &self.traits {
                writeln!(f, "        {}: {}", key, value)?;
            }
        }

        if let Some(cause) = &self.cause {
            writeln!(f, "    Cause: {:?}", cause)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_deref().map(Cause::as_std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errorf;

    fn io_err(msg: &str) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, msg.to_string())
    }

    #[test]
    fn test_kinded_keeps_message_unprefixed() {
        let err = Error::kinded("FileNotFound", "file config.toml missing");
        assert_eq!(err.kind(), "FileNotFound");
        assert_eq!(err.message(), "file config.toml missing");
    }

    #[test]
    fn test_errorf_parses_kind_and_keeps_full_message() {
        let err = errorf!("FileNotFound: file {} missing", "config.toml");
        assert_eq!(err.kind(), "FileNotFound");
        assert_eq!(err.message(), "FileNotFound: file config.toml missing");
    }

    #[test]
    fn test_errorf_without_kind_prefix() {
        let err = errorf!("something broke at {}", 42);
        assert_eq!(err.kind(), "");
        assert_eq!(err.message(), "something broke at 42");
    }

    #[test]
    fn test_kind_prefix_rejects_non_pascal_heads() {
        assert!(parse_kind_prefix("fileNotFound: x").is_none());
        assert!(parse_kind_prefix("F: x").is_none());
        assert!(parse_kind_prefix("File_Not: x").is_none());
        assert!(parse_kind_prefix("NoColonHere").is_none());
        assert!(parse_kind_prefix("Tight:no-space").is_none());
        assert_eq!(parse_kind_prefix("Conflict: boom"), Some(("Conflict", "boom")));
    }

    #[test]
    fn test_fluent_mutators_chain() {
        let err = errorf!("Conflict: kind clash")
            .add_op("GenerateKind")
            .add_trait(Trait::new("IsInternal"), "false")
            .add_source(io_err("disk gone"));

        assert_eq!(err.op(), Some("GenerateKind"));
        assert_eq!(err.get_trait(&Trait::new("IsInternal")), Some("false"));
        assert!(err.cause().is_some());
    }

    #[test]
    fn test_root_cause_finds_foreign_terminal() {
        let root = io_err("disk gone");
        let err = errorf!("Outer: outer")
            .add_error(errorf!("Inner: inner").add_source(root));

        let terminal = err.root_cause().unwrap();
        assert_eq!(terminal.to_string(), "disk gone");
    }

    #[test]
    fn test_root_cause_absent_on_pure_chain() {
        let err = errorf!("Outer: outer").add_error(errorf!("Inner: inner"));
        assert!(err.root_cause().is_none());
    }

    #[test]
    fn test_find_kind_starts_one_hop_below() {
        let err = errorf!("Target: outer")
            .add_error(errorf!("Middle: mid").add_error(errorf!("Target: deep")));

        // The receiver's own kind tag is not part of the search.
        let hit = err.find_kind("Target").unwrap();
        assert_eq!(hit.message(), "Target: deep");
        assert!(err.find_kind("Missing").is_none());
        assert!(err.has_kind("Middle"));
    }

    #[test]
    fn test_find_kind_stops_at_foreign_link() {
        let err = errorf!("Outer: outer")
            .add_error(errorf!("Middle: mid").add_source(io_err("boom")));

        // "Target" never appears, and the walk must not look past the
        // foreign link even if it did.
        assert!(err.find_kind("Target").is_none());
        assert!(err.has_kind("Middle"));
    }

    #[test]
    fn test_find_shape_matches_layout() {
        static SHAPE: &[(&str, &str)] = &[("path", "String")];
        let err = errorf!("Outer: outer")
            .add_error(Error::kinded("FileNotFound", "file x missing").with_shape(SHAPE));

        let hit = err.find_shape(&[("path", "String")]).unwrap();
        assert_eq!(hit.kind(), "FileNotFound");
        assert!(err.find_shape(&[("path", "PathBuf")]).is_none());
    }

    #[test]
    fn test_find_shape_false_positive_on_shared_layout() {
        // Two unrelated zero-field kinds share the empty layout; the
        // compatibility search cannot tell them apart.
        let err = errorf!("Outer: outer").add_error(Error::kinded("Unrelated", "boom"));
        let hit = err.find_shape(&[]).unwrap();
        assert_eq!(hit.kind(), "Unrelated");
    }

    #[test]
    fn test_bottom_annotated() {
        let err = errorf!("Outer: outer")
            .add_error(errorf!("Inner: inner").add_source(io_err("root")));
        assert_eq!(err.bottom_annotated().kind(), "Inner");

        let lone = errorf!("Lone: nothing below");
        assert_eq!(lone.bottom_annotated().kind(), "Lone");
    }

    #[test]
    fn test_std_error_source() {
        let err = errorf!("Outer: outer").add_error(errorf!("Inner: inner"));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "Inner: inner");
    }
}
