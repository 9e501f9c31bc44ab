//! The catalog: previously generated and freshly derived kind signatures,
//! plus the template grammar that turns a message into a kind name.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use strum_macros::{Display, IntoStaticStr};

use anno::{Result, errorf};

/// One constructor parameter of a generated kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: String,
}

/// The identity of one derived error kind: its name, message template and
/// positional field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSignature {
    /// Declaration name, e.g. `ErrFileNotFound`.
    pub name: String,
    /// Message template, verbatim literal text without the kind prefix.
    pub message: String,
    pub fields: Vec<Field>,
}

impl KindSignature {
    /// The kind tag carried by values of this kind at runtime.
    pub fn word(&self) -> &str {
        self.name.strip_prefix("Err").unwrap_or(&self.name)
    }

    /// Signature equality is positional: same message, same field names
    /// and types in the same order.
    fn matches(&self, other: &KindSignature) -> bool {
        self.message == other.message && self.fields == other.fields
    }
}

/// Outcome of resolving a derived signature against the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum Resolution {
    /// New kind; generate a declaration and rewrite the call site.
    Accept,
    /// Identical signature already exists; the call site stays as written.
    AlreadyDefined,
    /// Same name, different signature; the call site is skipped.
    Conflict,
}

/// Kind signatures known for one logical module: those re-derived from
/// previously generated output plus those accepted during this run.
#[derive(Debug, Default)]
pub struct Catalog {
    previous: BTreeMap<String, KindSignature>,
    fresh: BTreeMap<String, KindSignature>,
}

impl Catalog {
    pub fn new(previous: BTreeMap<String, KindSignature>) -> Self {
        Catalog {
            previous,
            fresh: BTreeMap::new(),
        }
    }

    /// Classify a derived signature against everything known so far.
    pub fn resolve(&self, sig: &KindSignature) -> Resolution {
        let existing = self
            .fresh
            .get(&sig.name)
            .or_else(|| self.previous.get(&sig.name));
        match existing {
            None => Resolution::Accept,
            Some(known) if known.matches(sig) => Resolution::AlreadyDefined,
            Some(_) => Resolution::Conflict,
        }
    }

    /// Record an accepted signature so later call sites resolve against it.
    pub fn accept(&mut self, sig: KindSignature) {
        self.fresh.insert(sig.name.clone(), sig);
    }

    /// Signatures accepted during this run, in name order.
    pub fn fresh(&self) -> impl Iterator<Item = &KindSignature> {
        self.fresh.values()
    }

    pub fn has_fresh(&self) -> bool {
        !self.fresh.is_empty()
    }
}

fn template_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([A-Z][a-zA-Z]+):\s(.*)$").unwrap())
}

/// Split a template into the kind name and the message body.
///
/// The leading word must be PascalCase and separated from the message by a
/// colon and whitespace; the derived declaration name is the word with an
/// `Err` prefix.
pub fn parse_template(template: &str) -> Result<(String, String)> {
    if template.is_empty() {
        return Err(errorf!("NoErrorMessage: error message not found"));
    }
    let caps = template_pattern().captures(template).ok_or_else(|| {
        errorf!("NoErrorName: message {:?} does not start with a kind name", template)
    })?;
    let word = &caps[1];
    let message = caps[2].trim();
    Ok((format!("Err{word}"), message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sig(name: &str, message: &str, fields: &[(&str, &str)]) -> KindSignature {
        KindSignature {
            name: name.to_string(),
            message: message.to_string(),
            fields: fields
                .iter()
                .map(|(name, ty)| Field {
                    name: name.to_string(),
                    ty: ty.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_parse_template() {
        let (name, message) = parse_template("FileNotFound: file {} missing").unwrap();
        assert_eq!(name, "ErrFileNotFound");
        assert_eq!(message, "file {} missing");
    }

    #[test]
    fn test_parse_template_rejects_missing_name() {
        let err = parse_template("just a message").unwrap_err();
        assert_eq!(err.kind(), "NoErrorName");

        // Lowercase leading word is not a kind name.
        let err = parse_template("fileNotFound: nope").unwrap_err();
        assert_eq!(err.kind(), "NoErrorName");

        // A single capital letter is not enough.
        let err = parse_template("X: nope").unwrap_err();
        assert_eq!(err.kind(), "NoErrorName");
    }

    #[test]
    fn test_parse_template_rejects_empty() {
        let err = parse_template("").unwrap_err();
        assert_eq!(err.kind(), "NoErrorMessage");
    }

    #[test]
    fn test_fresh_signature_accepted_once() {
        let mut catalog = Catalog::default();
        let first = sig("ErrFileNotFound", "file {} missing", &[("path", "String")]);
        assert_eq!(catalog.resolve(&first), Resolution::Accept);
        catalog.accept(first.clone());
        assert_eq!(catalog.resolve(&first), Resolution::AlreadyDefined);
        assert_eq!(catalog.fresh().count(), 1);
    }

    #[test]
    fn test_previous_signature_already_defined() {
        let first = sig("ErrFileNotFound", "file {} missing", &[("path", "String")]);
        let mut previous = BTreeMap::new();
        previous.insert(first.name.clone(), first.clone());
        let catalog = Catalog::new(previous);

        assert_eq!(catalog.resolve(&first), Resolution::AlreadyDefined);
        // Nothing fresh to emit.
        assert!(!catalog.has_fresh());
    }

    #[test]
    fn test_conflict_on_message_or_fields() {
        let mut catalog = Catalog::default();
        catalog.accept(sig("ErrFileNotFound", "file {} missing", &[("path", "String")]));

        let other_message = sig("ErrFileNotFound", "no such file {}", &[("path", "String")]);
        assert_eq!(catalog.resolve(&other_message), Resolution::Conflict);

        let other_field = sig("ErrFileNotFound", "file {} missing", &[("name", "String")]);
        assert_eq!(catalog.resolve(&other_field), Resolution::Conflict);

        let other_ty = sig("ErrFileNotFound", "file {} missing", &[("path", "&str")]);
        assert_eq!(catalog.resolve(&other_ty), Resolution::Conflict);

        let extra_field = sig(
            "ErrFileNotFound",
            "file {} missing",
            &[("path", "String"), ("mode", "i32")],
        );
        assert_eq!(catalog.resolve(&extra_field), Resolution::Conflict);
    }

    #[test]
    fn test_word_strips_declaration_prefix() {
        let sig = sig("ErrFileNotFound", "file {} missing", &[]);
        assert_eq!(sig.word(), "FileNotFound");
    }
}
