//! Re-derivation of kind signatures from a previously generated file.
//!
//! The generated file itself is the catalog's persistent form: rather than
//! keeping a separate manifest, the signatures are parsed back out of the
//! constructor functions on every run.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;
use tree_sitter::Node;

use anno::Result;

use crate::catalog::{Field, KindSignature};
use crate::extract::literal_value;
use crate::file::SourceFile;
use crate::parse::{SourceUnit, parse_source};
use crate::synth::snake_to_pascal;

/// Load the signatures declared in the generated file at `path`. A missing
/// file means a first run: the result is empty, not an error.
pub fn load_previous(path: &Path) -> Result<BTreeMap<String, KindSignature>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let unit = parse_source(SourceFile::new_path(path)?)?;
    let sigs = collect_signatures(&unit);
    debug!(
        file = %path.display(),
        kinds = sigs.len(),
        "re-derived previously generated kinds"
    );
    Ok(sigs)
}

fn collect_signatures(unit: &SourceUnit) -> BTreeMap<String, KindSignature> {
    let mut sigs = BTreeMap::new();
    let root = unit.tree.root_node();
    for idx in 0..root.child_count() {
        let Some(item) = root.child(idx) else {
            continue;
        };
        if item.kind() != "function_item" {
            continue;
        }
        if let Some(sig) = signature_of(unit, item) {
            sigs.insert(sig.name.clone(), sig);
        }
    }
    sigs
}

/// Rebuild one signature from a constructor function, or `None` when the
/// item is not one (hand-edited files degrade gracefully to fewer kinds).
fn signature_of(unit: &SourceUnit, item: Node<'_>) -> Option<KindSignature> {
    let name_node = item.child_by_field_name("name")?;
    let fn_name = unit.node_text(&name_node);
    let suffix = fn_name.strip_prefix("err_")?;

    let fields = parameter_fields(unit, item);
    let template = second_string_literal(unit, item.child_by_field_name("body")?)?;

    Some(KindSignature {
        name: format!("Err{}", snake_to_pascal(suffix)),
        message: template,
        fields,
    })
}

fn parameter_fields(unit: &SourceUnit, item: Node<'_>) -> Vec<Field> {
    let Some(params) = item.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut fields = Vec::new();
    for idx in 0..params.child_count() {
        let Some(param) = params.child(idx) else {
            continue;
        };
        if param.kind() != "parameter" {
            continue;
        }
        let (Some(pattern), Some(ty)) = (
            param.child_by_field_name("pattern"),
            param.child_by_field_name("type"),
        ) else {
            continue;
        };
        fields.push(Field {
            name: unit.node_text(&pattern),
            ty: unit.node_text(&ty),
        });
    }
    fields
}

/// The second string literal in document order inside a constructor body:
/// the first is the kind tag, the second the message template.
fn second_string_literal(unit: &SourceUnit, body: Node<'_>) -> Option<String> {
    let mut seen = 0usize;
    let mut stack = vec![body];
    let mut ordered = Vec::new();
    while let Some(node) = stack.pop() {
        ordered.push(node);
        for idx in (0..node.child_count()).rev() {
            if let Some(child) = node.child(idx) {
                stack.push(child);
            }
        }
    }
    for node in ordered {
        if matches!(node.kind(), "string_literal" | "raw_string_literal") {
            seen += 1;
            if seen == 2 {
                return literal_value(&unit.node_text(&node));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_str;
    use pretty_assertions::assert_eq;

    fn derive(source: &str) -> BTreeMap<String, KindSignature> {
        collect_signatures(&parse_str(source).unwrap())
    }

    #[test]
    fn test_rederives_constructor_with_fields() {
        let sigs = derive(
            "use anno::Error;\n\n\
             /// `FileNotFound`: file {} missing\n\
             pub fn err_file_not_found(path: String) -> Error {\n\
             \x20   Error::kinded(\"FileNotFound\", format!(\"file {} missing\", path))\n\
             \x20       .with_shape(&[(\"path\", \"String\")])\n\
             }\n",
        );
        let sig = &sigs["ErrFileNotFound"];
        assert_eq!(sig.message, "file {} missing");
        assert_eq!(sig.fields.len(), 1);
        assert_eq!(sig.fields[0].name, "path");
        assert_eq!(sig.fields[0].ty, "String");
    }

    #[test]
    fn test_rederives_zero_field_constructor() {
        let sigs = derive(
            "use anno::Error;\n\n\
             pub fn err_storage_full() -> Error {\n\
             \x20   Error::kinded(\"StorageFull\", \"no space left\")\n\
             }\n",
        );
        let sig = &sigs["ErrStorageFull"];
        assert_eq!(sig.message, "no space left");
        assert!(sig.fields.is_empty());
    }

    #[test]
    fn test_ignores_non_constructor_items() {
        let sigs = derive(
            "use anno::Error;\n\n\
             pub fn helper() -> i32 { 1 }\n\n\
             pub fn err_real() -> Error {\n\
             \x20   Error::kinded(\"Real\", \"exists\")\n\
             }\n",
        );
        assert_eq!(sigs.len(), 1);
        assert!(sigs.contains_key("ErrReal"));
    }

    #[test]
    fn test_round_trip_with_synthesizer() {
        use crate::catalog::Catalog;
        use crate::synth::{DEFAULT_IMPORT, render_file};
        use std::collections::BTreeSet;

        let mut catalog = Catalog::default();
        catalog.accept(KindSignature {
            name: "ErrFileNotFound".to_string(),
            message: "file {} missing".to_string(),
            fields: vec![Field {
                name: "path".to_string(),
                ty: "String".to_string(),
            }],
        });
        let mut imports = BTreeSet::new();
        imports.insert(DEFAULT_IMPORT.to_string());
        let rendered = render_file(&imports, catalog.fresh());

        let rederived = derive(&rendered);
        let sig = &rederived["ErrFileNotFound"];
        assert_eq!(sig.message, "file {} missing");
        assert_eq!(sig.fields[0].ty, "String");
    }

    #[test]
    fn test_round_trip_escaped_templates() {
        use crate::synth::render_kind;

        // Quotes and backslashes re-derive to the exact same value, so a
        // second run classifies the kind as already defined.
        for message in ["file \"{}\" missing", "target C:\\new under {}"] {
            let sig = KindSignature {
                name: "ErrTricky".to_string(),
                message: message.to_string(),
                fields: vec![Field {
                    name: "path".to_string(),
                    ty: "String".to_string(),
                }],
            };
            let rederived = derive(&format!("use anno::Error;\n\n{}", render_kind(&sig)));
            assert_eq!(rederived["ErrTricky"].message, message);
        }
    }

    #[test]
    fn test_missing_file_yields_empty_catalog() {
        let sigs = load_previous(Path::new("/nonexistent/anno_gen.rs")).unwrap();
        assert!(sigs.is_empty());
    }
}
