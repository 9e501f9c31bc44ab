//! # anno
//!
//! Annotated error values for Rust: a cause chain, an operation label and
//! string-keyed traits on every error.
//!
//! ## Design Philosophy
//!
//! - **Kind**: a short PascalCase name identifying what went wrong
//! - **Chain**: causes are wrapped, never flattened; the chain is finite,
//!   acyclic and exclusively owned
//! - **Op label**: names the logical operation active when the error was made
//! - **Traits**: string-keyed metadata that outlives rewrapping
//!
//! ## Usage
//!
//! ```rust
//! use anno::{errorf, Error};
//!
//! fn example() -> Result<(), Error> {
//!     Err(errorf!("FileNotFound: file {} missing", "config.toml")
//!         .add_op("load_config")
//!         .add_trait(anno::Trait::new("IsNonFatal"), "true"))
//! }
//! ```
//!
//! ## Principles
//!
//! - Functions return `Result<T, anno::Error>`
//! - External errors are wrapped with `add_source(err)`, chain-model causes
//!   with `add_error(err)`
//! - Every error instance has exactly one owner as it moves up the stack

mod chain;
mod error;
mod traits;

pub use chain::{propagated_trait, strace, trace};
pub use error::{Cause, Error, Shape};
pub use traits::Trait;

/// Result type alias using the annotated [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Build an annotated error from a printf-style template, evaluated eagerly.
///
/// The template should begin with a PascalCase kind name followed by a colon,
/// e.g. `"FileNotFound: file {} missing"`. The leading name becomes the
/// error's kind tag; the full formatted text stays as the message.
#[macro_export]
macro_rules! errorf {
    ($fmt:expr $(, $arg:expr)* $(,)?) => {
        $crate::Error::adhoc(::std::format!($fmt $(, $arg)*))
    };
}
