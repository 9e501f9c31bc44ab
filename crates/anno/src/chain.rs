//! Chain traversal and rendering that operate on whole chains rather than a
//! single error instance.

use crate::{Cause, Error, Trait};

enum Entry<'a> {
    Chain(&'a Error),
    Foreign(&'a (dyn std::error::Error + 'static)),
}

/// Render an error chain, one line per entry.
///
/// Entries are collected outward-in (`[receiver, cause, …]`) down to a
/// foreign value (which is included) or an absent cause, then rendered from
/// the innermost entry to the outermost: the innermost message first with no
/// prefix, each more-outer message on its own line behind a `|- ` marker.
/// Annotated entries carrying a non-empty op label append `; op: <label>`.
pub fn strace(err: &Error) -> String {
    let mut entries: Vec<Entry<'_>> = vec![Entry::Chain(err)];
    let mut cur = err;
    loop {
        match cur.cause() {
            Some(Cause::Annotated(next)) => {
                entries.push(Entry::Chain(next));
                cur = next;
            }
            Some(Cause::Foreign(foreign)) => {
                entries.push(Entry::Foreign(foreign.as_ref()));
                break;
            }
            None => break,
        }
    }

    let innermost = entries.len() - 1;
    let mut out = String::new();
    for (idx, entry) in entries.iter().enumerate().rev() {
        if idx != innermost {
            out.push_str("|- ");
        }
        match entry {
            Entry::Chain(err) => {
                out.push_str(err.message());
                if let Some(op) = err.op()
                    && !op.is_empty()
                {
                    out.push_str("; op: ");
                    out.push_str(op);
                }
            }
            Entry::Foreign(foreign) => out.push_str(&foreign.to_string()),
        }
        out.push('\n');
    }
    out
}

/// Print the rendered chain to stdout.
pub fn trace(err: &Error) {
    println!("{}", strace(err));
}

/// Root-oriented trait read: descend to the bottom-most annotated error of
/// the chain and read that error's trait map.
///
/// Intentionally asymmetric with [`Error::get_trait`], which only ever sees
/// the instance's own traits: a trait set at the deepest wrapping stays
/// visible here through any number of outer wrappers.
pub fn propagated_trait<'a>(err: &'a Error, key: &Trait) -> Option<&'a str> {
    err.bottom_annotated().get_trait(key)
}
