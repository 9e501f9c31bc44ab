//! The synthesizer: renders accepted kind signatures into a generated
//! declarations file and validates the result before it touches disk.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use anno::{Result, errorf};

use crate::catalog::KindSignature;
use crate::parse::parse_str;

/// Name of the generated declarations file, one per source directory.
pub const GENERATED_FILE: &str = "anno_gen.rs";

/// Side file holding output that failed validation, kept for inspection.
pub const FAILED_FILE: &str = "anno_gen.failed.rs";

/// Import every generated file needs.
pub const DEFAULT_IMPORT: &str = "anno::Error";

/// Render the banner comment for a fresh generated file.
pub fn render_header() -> String {
    let mut out = String::new();
    out.push_str("// Generated by anno. DO NOT EDIT.\n");
    out.push_str("//\n");
    out.push_str("// Register this file in the enclosing module tree,\n");
    out.push_str("// e.g. `mod anno_gen;` plus a `use` of the constructors.\n");
    out
}

/// Render `use` lines for the collected import paths, sorted and deduped.
pub fn render_use_lines(imports: &BTreeSet<String>) -> Vec<String> {
    imports.iter().map(|path| format!("use {path};")).collect()
}

/// Render one kind signature as a constructor function.
pub fn render_kind(sig: &KindSignature) -> String {
    let word = sig.word();
    let message = escape_message(&sig.message);
    let mut out = String::new();
    let _ = writeln!(out, "/// `{}`: {}", word, message);
    let params = sig
        .fields
        .iter()
        .map(|f| format!("{}: {}", f.name, f.ty))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "pub fn err_{}({}) -> Error {{", pascal_to_snake(word), params);

    // The template is carried as its decoded value; re-encoding it here
    // keeps quotes and backslashes intact whichever literal flavor the
    // call site used.
    if sig.fields.is_empty() {
        let _ = writeln!(out, "    Error::kinded(\"{}\", \"{}\")", word, message);
    } else {
        let args = sig
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            out,
            "    Error::kinded(\"{}\", format!(\"{}\", {}))",
            word, message, args
        );
        let shape = sig
            .fields
            .iter()
            .map(|f| format!("({:?}, {:?})", f.name, f.ty))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "        .with_shape(&[{shape}])");
    }
    out.push_str("}\n");
    out
}

/// Render a complete generated file: header, imports, then one constructor
/// per signature in the given order.
pub fn render_file<'s>(
    imports: &BTreeSet<String>,
    sigs: impl Iterator<Item = &'s KindSignature>,
) -> String {
    let mut out = render_header();
    out.push('\n');
    for line in render_use_lines(imports) {
        out.push_str(&line);
        out.push('\n');
    }
    for sig in sigs {
        out.push('\n');
        out.push_str(&render_kind(sig));
    }
    out
}

/// Reject generated text that does not parse as Rust. Nothing invalid may
/// be written over a source tree.
pub fn validate(text: &str) -> Result<()> {
    let unit = parse_str(text)?;
    if unit.tree.root_node().has_error() {
        return Err(errorf!("FailedToFormat: generated output does not parse"));
    }
    Ok(())
}

/// Encode a message value as a cooked string-literal body. Format
/// placeholders pass through untouched; the extractor's decoding is the
/// exact inverse.
fn escape_message(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    for ch in message.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.extend(c.escape_default()),
            c => out.push(c),
        }
    }
    out
}

/// `FileNotFound` → `file_not_found`.
pub(crate) fn pascal_to_snake(word: &str) -> String {
    let mut out = String::with_capacity(word.len() + 4);
    for (idx, ch) in word.char_indices() {
        if ch.is_ascii_uppercase() {
            if idx > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// `file_not_found` → `FileNotFound`.
pub(crate) fn snake_to_pascal(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
