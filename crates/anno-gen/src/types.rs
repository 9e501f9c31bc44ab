//! The type-resolution table: explicitly annotated bindings and `use`
//! declarations collected in one pass over a file's syntax tree.

use std::collections::BTreeMap;
use std::ops::Range;

use tree_sitter::{Node, Tree};

use crate::file::SourceFile;

/// Fallback type for expressions the table cannot resolve; the Rust
/// analogue of an untyped `any` argument.
pub const DISPLAY_FALLBACK: &str = "impl std::fmt::Display";

#[derive(Debug, Clone)]
struct Binding {
    name: String,
    ty: String,
    /// Byte range in which the binding is visible.
    scope: Range<usize>,
}

/// Per-file static type information.
///
/// Resolution is deliberately shallow: only bindings with an explicit type
/// annotation (`let x: T`, fn params, `const`/`static` items) are recorded.
/// Everything else falls back to [`DISPLAY_FALLBACK`].
#[derive(Debug, Default)]
pub struct TypeTable {
    bindings: Vec<Binding>,
    /// Local name → full import path, from `use` declarations.
    uses: BTreeMap<String, String>,
    /// Prefixes imported wholesale via `use path::*;`.
    globs: Vec<String>,
}

impl TypeTable {
    pub fn build(file: &SourceFile, tree: &Tree) -> Self {
        let mut table = TypeTable::default();
        let file_len = file.content().len();

        let mut stack = vec![tree.root_node()];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "let_declaration" => table.record_let(file, node, file_len),
                "parameter" => table.record_param(file, node, file_len),
                "const_item" | "static_item" => table.record_item(file, node, file_len),
                "use_declaration" => table.record_use(&file.node_text(&node)),
                _ => {}
            }
            for idx in (0..node.child_count()).rev() {
                if let Some(child) = node.child(idx) {
                    stack.push(child);
                }
            }
        }
        table
    }

    /// Innermost visible binding for `name` at byte offset `at`.
    pub fn lookup(&self, name: &str, at: usize) -> Option<&str> {
        self.bindings
            .iter()
            .filter(|b| b.name == name && b.scope.contains(&at))
            .max_by_key(|b| b.scope.start)
            .map(|b| b.ty.as_str())
    }

    /// Full import path a local name was bound to by a `use` declaration.
    pub fn resolve_use(&self, name: &str) -> Option<&str> {
        self.uses.get(name).map(String::as_str)
    }

    /// True when `use prefix::*;` appears in this file.
    pub fn has_glob(&self, prefix: &str) -> bool {
        self.globs.iter().any(|g| g == prefix)
    }

    /// The `use` path a type text depends on, if its leading segment was
    /// imported in this file. `std`-family and crate-relative paths need no
    /// import in generated output.
    pub fn import_of(&self, ty: &str) -> Option<String> {
        let ty = ty.trim().trim_start_matches('&').trim();
        let base = ty.split('<').next().unwrap_or(ty).trim();
        let first = base.split("::").next().unwrap_or(base).trim();
        if matches!(first, "std" | "core" | "alloc" | "crate" | "self" | "super") {
            return None;
        }
        self.uses.get(first).cloned()
    }

    fn record_let(&mut self, file: &SourceFile, node: Node<'_>, file_len: usize) {
        let Some(pattern) = node.child_by_field_name("pattern") else {
            return;
        };
        let Some(ty) = node.child_by_field_name("type") else {
            return;
        };
        if pattern.kind() != "identifier" {
            return;
        }
        let scope_end = enclosing(node, "block")
            .map(|b| b.end_byte())
            .unwrap_or(file_len);
        self.bindings.push(Binding {
            name: file.node_text(&pattern),
            ty: file.node_text(&ty),
            scope: node.end_byte()..scope_end,
        });
    }

    fn record_param(&mut self, file: &SourceFile, node: Node<'_>, file_len: usize) {
        let Some(pattern) = node.child_by_field_name("pattern") else {
            return;
        };
        let Some(ty) = node.child_by_field_name("type") else {
            return;
        };
        if pattern.kind() != "identifier" {
            return;
        }
        let scope = enclosing(node, "function_item")
            .or_else(|| enclosing(node, "closure_expression"))
            .map(|f| f.byte_range())
            .unwrap_or(0..file_len);
        self.bindings.push(Binding {
            name: file.node_text(&pattern),
            ty: file.node_text(&ty),
            scope,
        });
    }

    fn record_item(&mut self, file: &SourceFile, node: Node<'_>, file_len: usize) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let Some(ty) = node.child_by_field_name("type") else {
            return;
        };
        let scope = enclosing(node, "block")
            .map(|b| b.byte_range())
            .unwrap_or(0..file_len);
        self.bindings.push(Binding {
            name: file.node_text(&name),
            ty: file.node_text(&ty),
            scope,
        });
    }

    fn record_use(&mut self, text: &str) {
        let Some(rest) = text.split("use ").nth(1) else {
            return;
        };
        let spec = rest.trim_end().trim_end_matches(';').trim();
        self.record_spec(spec, "");
    }

    fn record_spec(&mut self, spec: &str, prefix: &str) {
        let spec = spec.trim();
        if spec.is_empty() {
            return;
        }

        // Grouped imports: `a::b::{c, d as e, f::g}`.
        if let Some(open) = spec.find("::{") {
            if spec.ends_with('}') {
                let head = join_path(prefix, &spec[..open]);
                let inner = &spec[open + 3..spec.len() - 1];
                for item in split_top_level(inner, ',', '{', '}') {
                    self.record_spec(&item, &head);
                }
                return;
            }
        } else if let Some(inner) = spec.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            for item in split_top_level(inner, ',', '{', '}') {
                self.record_spec(&item, prefix);
            }
            return;
        }

        // Globs: a whole-path `a::b::*` or a bare `*` inside a group.
        if let Some(head) = spec.strip_suffix("::*") {
            self.globs.push(join_path(prefix, head));
            return;
        }
        if spec == "*" {
            self.globs.push(prefix.to_string());
            return;
        }

        if spec == "self" {
            if let Some(name) = prefix.rsplit("::").next() {
                self.uses.insert(name.to_string(), prefix.to_string());
            }
            return;
        }

        if let Some((path, alias)) = spec.split_once(" as ") {
            self.uses
                .insert(alias.trim().to_string(), join_path(prefix, path.trim()));
            return;
        }

        let full = join_path(prefix, spec);
        if let Some(name) = full.rsplit("::").next() {
            self.uses.insert(name.to_string(), full.clone());
        }
    }
}

fn join_path(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{prefix}::{path}")
    }
}

/// Nearest ancestor of the given node kind.
fn enclosing<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cur = node.parent();
    while let Some(parent) = cur {
        if parent.kind() == kind {
            return Some(parent);
        }
        cur = parent.parent();
    }
    None
}

/// Split on a separator, ignoring separators nested inside `open`/`close`.
fn split_top_level(text: &str, sep: char, open: char, close: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut cur = String::new();
    for ch in text.chars() {
        if ch == open {
            depth += 1;
        } else if ch == close {
            depth = depth.saturating_sub(1);
        }
        if ch == sep && depth == 0 {
            parts.push(cur.trim().to_string());
            cur = String::new();
        } else {
            cur.push(ch);
        }
    }
    if !cur.trim().is_empty() {
        parts.push(cur.trim().to_string());
    }
    parts
}

#[cfg(test)]
mod tests {
    use crate::parse::parse_str;

    #[test]
    fn test_lookup_let_binding() {
        let unit = parse_str(
            "fn main() {\n    let path: String = make();\n    use_it(path);\n}\n",
        )
        .unwrap();
        let at = unit.file.get_full_text().find("use_it").unwrap();
        assert_eq!(unit.types.lookup("path", at), Some("String"));
        assert_eq!(unit.types.lookup("missing", at), None);
    }

    #[test]
    fn test_lookup_param_binding() {
        let unit = parse_str("fn handle(count: usize) {\n    touch(count);\n}\n").unwrap();
        let at = unit.file.get_full_text().find("touch").unwrap();
        assert_eq!(unit.types.lookup("count", at), Some("usize"));
    }

    #[test]
    fn test_binding_not_visible_before_declaration() {
        let unit = parse_str("fn main() {\n    early(x);\n    let x: u8 = 0;\n}\n").unwrap();
        let at = unit.file.get_full_text().find("early").unwrap();
        assert_eq!(unit.types.lookup("x", at), None);
    }

    #[test]
    fn test_shadowing_picks_innermost() {
        let unit = parse_str(
            "fn main() {\n    let v: i32 = 1;\n    {\n        let v: &str = \"s\";\n        probe(v);\n    }\n}\n",
        )
        .unwrap();
        let at = unit.file.get_full_text().find("probe").unwrap();
        assert_eq!(unit.types.lookup("v", at), Some("&str"));
    }

    #[test]
    fn test_use_declarations() {
        let unit = parse_str(
            "use std::path::PathBuf;\nuse anno::{errorf, Error as AnnoError};\nuse anno::prelude::*;\n",
        )
        .unwrap();
        assert_eq!(unit.types.resolve_use("PathBuf"), Some("std::path::PathBuf"));
        assert_eq!(unit.types.resolve_use("errorf"), Some("anno::errorf"));
        assert_eq!(unit.types.resolve_use("AnnoError"), Some("anno::Error"));
        assert!(unit.types.has_glob("anno::prelude"));
    }

    #[test]
    fn test_glob_forms() {
        let unit = parse_str(
            "use anno::*;\nuse std::collections::{HashMap, *};\n",
        )
        .unwrap();
        assert!(unit.types.has_glob("anno"));
        assert!(unit.types.has_glob("std::collections"));
        // The glob itself must not register as a named import.
        assert_eq!(unit.types.resolve_use("*"), None);
    }

    #[test]
    fn test_import_of_skips_std_paths() {
        let unit = parse_str("use serde_json::Value;\n").unwrap();
        assert_eq!(
            unit.types.import_of("Value"),
            Some("serde_json::Value".to_string())
        );
        assert_eq!(unit.types.import_of("std::string::String"), None);
        assert_eq!(unit.types.import_of("String"), None);
    }
}
