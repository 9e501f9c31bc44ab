//! The naming engine: derives short, collision-free field identifiers for
//! call-site argument expressions.

use std::collections::HashMap;

use crate::extract::ArgClass;

/// Names argument fields within the scope of one call site.
///
/// Counters are seeded with the runtime model's reserved field names so a
/// generated field can never shadow `err`, `traits` or `op`. A repeated base
/// name gets the next counter value as a numeric suffix (`arg`, `arg2`,
/// `arg3`, …). Counters reset per call site: a fresh namer is built for each.
pub struct FieldNamer {
    counts: HashMap<String, u32>,
}

impl FieldNamer {
    pub fn new() -> Self {
        let mut counts = HashMap::new();
        counts.insert("err".to_string(), 1);
        counts.insert("traits".to_string(), 1);
        counts.insert("op".to_string(), 1);
        Self { counts }
    }

    pub fn name_for(&mut self, class: &ArgClass) -> String {
        let base = match class {
            ArgClass::Ident(name) => name.clone(),
            ArgClass::Literal(kind) => (*kind).to_string(),
            ArgClass::Composite(ty) => structural_name(ty),
            ArgClass::Opaque => "arg".to_string(),
        };
        self.unique(base)
    }

    fn unique(&mut self, base: String) -> String {
        match self.counts.get_mut(&base) {
            Some(count) => {
                *count += 1;
                format!("{}{}", base, count)
            }
            None => {
                self.counts.insert(base.clone(), 1);
                base
            }
        }
    }
}

impl Default for FieldNamer {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural name for a composite literal, derived from its static type:
/// sequences become `<elem>Slice`, associative containers become
/// `<key><value>Map`, anything else a camel-cased simplification.
pub(crate) fn structural_name(ty: &str) -> String {
    let ty = ty.trim().trim_start_matches('&').trim();

    if let Some(inner) = ty.strip_prefix("Vec<").and_then(|s| s.strip_suffix('>')) {
        return format!("{}Slice", simplify_type_name(inner.trim()));
    }
    if let Some(inner) = ty.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let elem = inner.split(';').next().unwrap_or(inner).trim();
        return format!("{}Slice", simplify_type_name(elem));
    }
    if let Some(open) = ty.find('<') {
        let base = ty[..open].rsplit("::").next().unwrap_or(&ty[..open]);
        if matches!(base, "HashMap" | "BTreeMap") && ty.ends_with('>') {
            let inner = &ty[open + 1..ty.len() - 1];
            if let Some((key, value)) = split_pair(inner) {
                return format!(
                    "{}{}Map",
                    simplify_type_name(key.trim()),
                    simplify_type_name(value.trim())
                );
            }
        }
    }

    simplify_type_name(ty)
}

/// Simplify a type name: strip generics, then camel-case the qualifier and
/// the final segment (`foo::Bar` → `fooBar`, `String` → `string`).
fn simplify_type_name(ty: &str) -> String {
    let base = ty.split('<').next().unwrap_or(ty).trim();
    let parts: Vec<&str> = base.split("::").collect();
    if parts.len() > 1 {
        let qualifier = parts[0].to_lowercase();
        let last = parts[parts.len() - 1];
        format!("{}{}", qualifier, title_case(last))
    } else {
        base.to_lowercase()
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Split `K, V` at the top-level comma, ignoring commas nested in generics.
fn split_pair(text: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (idx, ch) in text.char_indices() {
        match ch {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some((&text[..idx], &text[idx + 1..])),
            _ => {}
        }
    }
    None
}
