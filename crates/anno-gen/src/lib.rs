//! Call-site analyzer and code synthesizer for annotated errors.
//!
//! The pipeline runs once per logical module (one source directory):
//! front end → extractor → naming engine → catalog/conflict resolver →
//! synthesizer → source patcher. The catalog is loaded once per module
//! before the walk begins and owned by the generation invocation.
//!
//! The tool reports its own failures through the [`anno`] error model it
//! generates code for.

pub mod catalog;
pub mod clean;
pub mod extract;
pub mod file;
pub mod generate;
pub mod name;
pub mod parse;
pub mod patch;
pub mod prev;
pub mod synth;
pub mod types;

pub use anno::{Error, Result, Trait, errorf};
pub use catalog::{Catalog, Field, KindSignature, Resolution, parse_template};
pub use clean::clean_dir;
pub use extract::{ArgField, CallSite, extract_call_sites};
pub use generate::{Report, generate_dir, generate_module};
pub use parse::{Module, SourceUnit, parse_module, parse_source};
pub use synth::GENERATED_FILE;

/// Marks errors raised by the generator's own machinery rather than by the
/// analyzed source.
pub const TR_IS_INTERNAL: Trait = Trait::from_static("IsInternal");

/// Marks informational conditions that callers may log and skip.
pub const TR_IS_NON_FATAL: Trait = Trait::from_static("IsNonFatal");
