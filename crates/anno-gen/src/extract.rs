//! The call-site extractor: finds qualifying `errorf!` invocations, pulls
//! the template literal and names the remaining argument expressions.

use std::ops::Range;

use tracing::debug;
use tree_sitter::Node;

use anno::{Result, errorf};

use crate::name::FieldNamer;
use crate::parse::SourceUnit;
use crate::types::DISPLAY_FALLBACK;

/// Import paths the construction macro may resolve to. Guards against
/// unrelated `errorf!` macros from other crates.
pub const ACCEPTED_IMPORT_PATHS: &[&str] = &["anno", "anno::errorf", "anno::prelude"];

/// The macro name a qualifying call must end with.
pub const ERRORF: &str = "errorf";

/// Classification of one argument expression, input to the naming engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgClass {
    /// A bare identifier.
    Ident(String),
    /// A literal; the payload is its lowercase kind name.
    Literal(&'static str),
    /// A composite/aggregate literal; the payload is its static type text.
    Composite(String),
    /// Anything else.
    Opaque,
}

/// One extracted argument: derived field name, exact source text and the
/// resolved static type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgField {
    pub name: String,
    pub expr: String,
    pub ty: String,
}

/// One qualifying call, ready for catalog resolution and rewriting.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// Byte range of the whole macro invocation in the source file.
    pub range: Range<usize>,
    pub row: usize,
    pub column: usize,
    /// Decoded value of the template literal.
    pub template: String,
    pub fields: Vec<ArgField>,
    /// `use` paths implied by the argument types.
    pub imports: Vec<String>,
}

/// Walk a unit's tree in document order and extract every qualifying call.
///
/// A qualifying call with a missing or non-literal template is a local
/// fatal error: extraction of the whole unit is aborted.
pub fn extract_call_sites(unit: &SourceUnit) -> Result<Vec<CallSite>> {
    let mut sites = Vec::new();
    for node in macro_invocations(unit.tree.root_node()) {
        if !qualifies(unit, node) {
            continue;
        }
        let pos = node.start_position();
        debug!(
            row = pos.row + 1,
            column = pos.column + 1,
            file = unit.file.path().unwrap_or("<memory>"),
            "found errorf! call"
        );
        sites.push(extract_one(unit, node)?);
    }
    Ok(sites)
}

/// Pre-order collection of `macro_invocation` nodes.
fn macro_invocations(root: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == "macro_invocation" {
            out.push(node);
        }
        for idx in (0..node.child_count()).rev() {
            if let Some(child) = node.child(idx) {
                stack.push(child);
            }
        }
    }
    out
}

/// A call qualifies iff the macro's last path segment is `errorf` and its
/// qualifier resolves to one of the accepted import paths.
fn qualifies(unit: &SourceUnit, node: Node<'_>) -> bool {
    let Some(mac) = node.child_by_field_name("macro") else {
        return false;
    };
    let path = unit.node_text(&mac);
    let Some((qualifier, last)) = split_macro_path(&path) else {
        return false;
    };
    if last != ERRORF {
        return false;
    }

    match qualifier {
        // Bare `errorf!`: must be imported from an accepted path.
        None => {
            if let Some(full) = unit.types.resolve_use(ERRORF) {
                return ACCEPTED_IMPORT_PATHS.contains(&full);
            }
            ACCEPTED_IMPORT_PATHS.iter().any(|p| unit.types.has_glob(p))
        }
        // Qualified `q::errorf!`: the qualifier (or its `use` alias target)
        // must be an accepted path.
        Some(qualifier) => {
            let resolved = unit
                .types
                .resolve_use(qualifier.split("::").next().unwrap_or(qualifier))
                .map(|head| {
                    match qualifier.split_once("::") {
                        Some((_, rest)) => format!("{head}::{rest}"),
                        None => head.to_string(),
                    }
                })
                .unwrap_or_else(|| qualifier.to_string());
            ACCEPTED_IMPORT_PATHS.contains(&resolved.as_str())
        }
    }
}

fn split_macro_path(path: &str) -> Option<(Option<&str>, &str)> {
    match path.rsplit_once("::") {
        Some((qualifier, last)) => Some((Some(qualifier), last)),
        None => Some((None, path)),
    }
}

fn extract_one(unit: &SourceUnit, node: Node<'_>) -> Result<CallSite> {
    let pos = node.start_position();
    let args = split_arguments(node);

    let Some(template_nodes) = args.first() else {
        return Err(errorf!("NoErrorMessage: error message not found")
            .add_trait(crate::TR_IS_INTERNAL, "false"));
    };
    let template = template_literal(unit, template_nodes).ok_or_else(|| {
        errorf!(
            "NoErrorMessage: template at {}:{} is not a string literal",
            pos.row + 1,
            pos.column + 1
        )
    })?;

    let mut namer = FieldNamer::new();
    let mut fields = Vec::new();
    let mut imports = Vec::new();
    for arg_nodes in &args[1..] {
        if arg_nodes.is_empty() {
            continue;
        }
        let (class, ty) = classify(unit, arg_nodes);
        if let Some(import) = unit.types.import_of(&ty) {
            imports.push(import);
        }
        let start = arg_nodes[0].start_byte();
        let end = arg_nodes[arg_nodes.len() - 1].end_byte();
        fields.push(ArgField {
            name: namer.name_for(&class),
            expr: unit.file.get_text(start, end).unwrap_or_default(),
            ty,
        });
    }

    Ok(CallSite {
        range: node.byte_range(),
        row: pos.row + 1,
        column: pos.column + 1,
        template,
        fields,
        imports,
    })
}

/// Split the macro token tree into argument token groups at top-level
/// commas. Nested token trees are single children, so their commas never
/// appear at this level.
fn split_arguments(node: Node<'_>) -> Vec<Vec<Node<'_>>> {
    let Some(tokens) = (0..node.child_count())
        .filter_map(|idx| node.child(idx))
        .find(|child| child.kind() == "token_tree")
    else {
        return Vec::new();
    };

    let count = tokens.child_count();
    let mut groups = Vec::new();
    let mut current = Vec::new();
    for idx in 0..count {
        let Some(child) = tokens.child(idx) else {
            continue;
        };
        // The first and last children are the macro delimiters.
        if idx == 0 || idx == count - 1 {
            continue;
        }
        if child.kind() == "," {
            groups.push(std::mem::take(&mut current));
        } else {
            current.push(child);
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Decoded value of the template string literal.
fn template_literal(unit: &SourceUnit, nodes: &[Node<'_>]) -> Option<String> {
    if nodes.len() != 1 {
        return None;
    }
    let node = nodes[0];
    if !matches!(node.kind(), "string_literal" | "raw_string_literal") {
        return None;
    }
    literal_value(&unit.node_text(&node))
}

/// Decode a string or raw-string literal's source text into its value.
/// Cooked escapes are resolved; raw bodies are their value already. The
/// synthesizer re-encodes the value on emission, so quotes and backslashes
/// round-trip regardless of the flavor the author wrote.
pub(crate) fn literal_value(text: &str) -> Option<String> {
    if let Some(rest) = text.strip_prefix('"') {
        return unescape(rest.strip_suffix('"')?);
    }
    let rest = text.strip_prefix('r')?;
    let hashes = rest.chars().take_while(|c| *c == '#').count();
    let rest = &rest[hashes..];
    let rest = rest.strip_prefix('"')?;
    let rest = rest.strip_suffix(&"#".repeat(hashes))?;
    rest.strip_suffix('"').map(str::to_string)
}

/// Resolve the escape sequences of a cooked string-literal body.
fn unescape(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            'x' => {
                let hi = chars.next()?;
                let lo = chars.next()?;
                let code = u8::from_str_radix(&format!("{hi}{lo}"), 16).ok()?;
                out.push(code as char);
            }
            'u' => {
                if chars.next()? != '{' {
                    return None;
                }
                let mut digits = String::new();
                loop {
                    match chars.next()? {
                        '}' => break,
                        digit => digits.push(digit),
                    }
                }
                let code = u32::from_str_radix(&digits, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            // Line continuation: the backslash-newline and the following
            // indentation vanish from the value.
            '\n' => {
                while chars.as_str().starts_with([' ', '\t']) {
                    chars.next();
                }
            }
            _ => return None,
        }
    }
    Some(out)
}

/// Classify one argument token group and resolve its static type.
fn classify(unit: &SourceUnit, nodes: &[Node<'_>]) -> (ArgClass, String) {
    if nodes.len() == 1 {
        let node = nodes[0];
        let text = unit.node_text(&node);
        match node.kind() {
            "identifier" if text == "true" || text == "false" => {
                return (ArgClass::Literal("bool"), "bool".to_string());
            }
            "identifier" => {
                let ty = unit
                    .types
                    .lookup(&text, node.start_byte())
                    .unwrap_or(DISPLAY_FALLBACK)
                    .to_string();
                return (ArgClass::Ident(text), ty);
            }
            "string_literal" | "raw_string_literal" => {
                return (ArgClass::Literal("string"), "&'static str".to_string());
            }
            "integer_literal" => return (ArgClass::Literal("int"), "i32".to_string()),
            "float_literal" => return (ArgClass::Literal("float"), "f64".to_string()),
            "char_literal" => return (ArgClass::Literal("char"), "char".to_string()),
            "true" | "false" | "boolean_literal" => {
                return (ArgClass::Literal("bool"), "bool".to_string());
            }
            "token_tree" if text.starts_with('[') => {
                return sequence_composite(unit, node);
            }
            _ => return (ArgClass::Opaque, DISPLAY_FALLBACK.to_string()),
        }
    }

    // `vec![...]` sequence literal.
    if nodes.len() == 3
        && nodes[0].kind() == "identifier"
        && unit.node_text(&nodes[0]) == "vec"
        && nodes[1].kind() == "!"
        && nodes[2].kind() == "token_tree"
    {
        return sequence_composite(unit, nodes[2]);
    }

    // `Name { .. }` struct literal.
    if nodes.len() == 2
        && nodes[0].kind() == "identifier"
        && nodes[1].kind() == "token_tree"
        && unit.node_text(&nodes[1]).starts_with('{')
    {
        return (
            ArgClass::Composite(unit.node_text(&nodes[0])),
            unit.node_text(&nodes[0]),
        );
    }

    // `HashMap::from([...])` / `BTreeMap::from([...])` associative literal.
    if nodes.len() == 4
        && nodes[0].kind() == "identifier"
        && matches!(unit.node_text(&nodes[0]).as_str(), "HashMap" | "BTreeMap")
        && unit.node_text(&nodes[2]) == "from"
        && nodes[3].kind() == "token_tree"
    {
        if let Some((key, value)) = map_entry_types(unit, nodes[3]) {
            let ty = format!("{}<{}, {}>", unit.node_text(&nodes[0]), key, value);
            return (ArgClass::Composite(ty.clone()), ty);
        }
    }

    (ArgClass::Opaque, DISPLAY_FALLBACK.to_string())
}

/// Type a `[...]` or `vec![...]` sequence from its first element.
fn sequence_composite(unit: &SourceUnit, tokens: Node<'_>) -> (ArgClass, String) {
    match first_element_type(unit, tokens) {
        Some(elem) => {
            let ty = format!("Vec<{elem}>");
            (ArgClass::Composite(ty.clone()), ty)
        }
        None => (ArgClass::Opaque, DISPLAY_FALLBACK.to_string()),
    }
}

/// Static type of the first token inside a delimited token tree, when it is
/// a literal or a resolvable identifier.
fn first_element_type(unit: &SourceUnit, tokens: Node<'_>) -> Option<String> {
    let count = tokens.child_count();
    for idx in 1..count.saturating_sub(1) {
        let child = tokens.child(idx)?;
        let text = unit.node_text(&child);
        let ty = match child.kind() {
            "string_literal" | "raw_string_literal" => Some("&'static str".to_string()),
            "integer_literal" => Some("i32".to_string()),
            "float_literal" => Some("f64".to_string()),
            "char_literal" => Some("char".to_string()),
            "identifier" if text == "true" || text == "false" => Some("bool".to_string()),
            "identifier" => unit
                .types
                .lookup(&text, child.start_byte())
                .map(str::to_string),
            "token_tree" => None,
            _ => None,
        };
        return ty;
    }
    None
}

/// Key/value types of the first `(k, v)` tuple inside a
/// `HashMap::from([...])` argument list.
fn map_entry_types(unit: &SourceUnit, tokens: Node<'_>) -> Option<(String, String)> {
    // tokens is `([ (k, v), ... ])`; descend two levels of token trees.
    let outer = child_token_tree(tokens)?;
    let tuple = child_token_tree(outer)?;
    let mut elem_types = Vec::new();
    let count = tuple.child_count();
    for idx in 1..count.saturating_sub(1) {
        let child = tuple.child(idx)?;
        if child.kind() == "," {
            continue;
        }
        let text = unit.node_text(&child);
        let ty = match child.kind() {
            "string_literal" | "raw_string_literal" => "&'static str".to_string(),
            "integer_literal" => "i32".to_string(),
            "float_literal" => "f64".to_string(),
            "char_literal" => "char".to_string(),
            "identifier" if text == "true" || text == "false" => "bool".to_string(),
            "identifier" => unit.types.lookup(&text, child.start_byte())?.to_string(),
            _ => return None,
        };
        elem_types.push(ty);
    }
    if elem_types.len() == 2 {
        let value = elem_types.pop().unwrap_or_default();
        let key = elem_types.pop().unwrap_or_default();
        Some((key, value))
    } else {
        None
    }
}

fn child_token_tree<'t>(node: Node<'t>) -> Option<Node<'t>> {
    let count = node.child_count();
    for idx in 1..count.saturating_sub(1) {
        let child = node.child(idx)?;
        if child.kind() == "token_tree" {
            return Some(child);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_str;
    use pretty_assertions::assert_eq;

    fn extract(source: &str) -> Vec<CallSite> {
        let unit = parse_str(source).unwrap();
        extract_call_sites(&unit).unwrap()
    }

    #[test]
    fn test_qualified_call_extracted() {
        let sites = extract(
            "fn run(path: &str) -> anno::Error {\n    anno::errorf!(\"FileNotFound: file {} missing\", path)\n}\n",
        );
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].template, "FileNotFound: file {} missing");
        assert_eq!(
            sites[0].fields,
            vec![ArgField {
                name: "path".to_string(),
                expr: "path".to_string(),
                ty: "&str".to_string(),
            }]
        );
    }

    #[test]
    fn test_bare_call_requires_import() {
        let no_import = extract("fn run() { errorf!(\"Oops: nope\"); }\n");
        assert!(no_import.is_empty());

        let with_import =
            extract("use anno::errorf;\nfn run() { errorf!(\"Oops: yes\"); }\n");
        assert_eq!(with_import.len(), 1);
        assert_eq!(with_import[0].template, "Oops: yes");
    }

    #[test]
    fn test_foreign_errorf_is_ignored() {
        let sites = extract(
            "use other::errorf;\nfn run() { errorf!(\"Oops: nope\"); other::errorf!(\"X: y\"); }\n",
        );
        assert!(sites.is_empty());
    }

    #[test]
    fn test_aliased_crate_qualifier() {
        let sites = extract(
            "use anno as a;\nfn run() { a::errorf!(\"Oops: aliased\"); }\n",
        );
        assert_eq!(sites.len(), 1);
    }

    #[test]
    fn test_literal_args_named_by_kind() {
        let sites = extract(
            "use anno::errorf;\nfn run() { errorf!(\"Weird: {} {} {}\", \"lit\", 42, 1.5); }\n",
        );
        let fields = &sites[0].fields;
        assert_eq!(fields[0].name, "string");
        assert_eq!(fields[0].ty, "&'static str");
        assert_eq!(fields[1].name, "int");
        assert_eq!(fields[1].ty, "i32");
        assert_eq!(fields[2].name, "float");
        assert_eq!(fields[2].ty, "f64");
    }

    #[test]
    fn test_opaque_args_counted() {
        let sites = extract(
            "use anno::errorf;\nfn run() { errorf!(\"Weird: {} {}\", a + b, c * d); }\n",
        );
        let fields = &sites[0].fields;
        assert_eq!(fields[0].name, "arg");
        assert_eq!(fields[0].expr, "a + b");
        assert_eq!(fields[1].name, "arg2");
        assert_eq!(fields[1].expr, "c * d");
    }

    #[test]
    fn test_vec_composite_named_as_slice() {
        let sites = extract(
            "use anno::errorf;\nfn run() { errorf!(\"Weird: {:?}\", vec![1, 2, 3]); }\n",
        );
        let fields = &sites[0].fields;
        assert_eq!(fields[0].name, "i32Slice");
        assert_eq!(fields[0].ty, "Vec<i32>");
        assert_eq!(fields[0].expr, "vec![1, 2, 3]");
    }

    #[test]
    fn test_non_literal_template_is_local_fatal() {
        let unit = parse_str(
            "use anno::errorf;\nfn run(msg: &str) { errorf!(msg); }\n",
        )
        .unwrap();
        let err = extract_call_sites(&unit).unwrap_err();
        assert_eq!(err.kind(), "NoErrorMessage");
    }

    #[test]
    fn test_commas_inside_nested_calls_do_not_split() {
        let sites = extract(
            "use anno::errorf;\nfn run() { errorf!(\"Weird: {}\", join(a, b)); }\n",
        );
        let fields = &sites[0].fields;
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].expr, "join(a, b)");
    }

    #[test]
    fn test_raw_string_template() {
        let sites = extract(
            "use anno::errorf;\nfn run() { errorf!(r#\"Quoted: has \"quotes\"\"#); }\n",
        );
        assert_eq!(sites[0].template, "Quoted: has \"quotes\"");
    }

    #[test]
    fn test_cooked_escapes_are_decoded() {
        let sites = extract(
            r#"use anno::errorf;
fn run() { errorf!("Quoted: saw \"x\" at C:\\new\t{}", 1); }
"#,
        );
        assert_eq!(sites[0].template, "Quoted: saw \"x\" at C:\\new\t{}");
    }

    #[test]
    fn test_raw_backslashes_kept_literal() {
        let sites = extract(
            r#"use anno::errorf;
fn run() { errorf!(r"Copy: target C:\new"); }
"#,
        );
        assert_eq!(sites[0].template, "Copy: target C:\\new");
    }

    #[test]
    fn test_bare_call_under_glob_import() {
        let sites = extract("use anno::*;\nfn run() { errorf!(\"Oops: glob\"); }\n");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].template, "Oops: glob");
    }
}
