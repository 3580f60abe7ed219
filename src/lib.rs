//! # failtrace - Error annotation with merged stack traces
//!
//! Attach contextual metadata to an error as it propagates (messages, a
//! status code, tags, key/value params, a reportability flag) together
//! with **one** stack trace, reconciled across every wrap site instead of
//! re-captured wholesale at each one.
//!
//! ```text
//! loading profile: record not found
//! at handlers::profile (myapp/src/handlers.rs:142)
//! at router::dispatch (myapp/src/router.rs:89)
//! at main (myapp/src/main.rs:23)
//! ```
//!
//! ## Wrapping
//!
//! Create errors with [`Fail::new`] or [`errorf!`], add context with
//! [`wrap`] and annotators, and read it back with [`unwrap_fail`]:
//!
//! ```rust
//! use failtrace::{Fail, unwrap_fail, wrap, with_code, with_message};
//!
//! fn load() -> Result<(), Fail> {
//!     Err(Fail::new("record not found"))
//! }
//!
//! let err = load().unwrap_err();
//! let err = wrap(err, [with_message("loading profile"), with_code(404)]).unwrap();
//!
//! let fail = unwrap_fail(err).unwrap();
//! assert_eq!(fail.to_string(), "loading profile: record not found");
//! assert_eq!(fail.last_message(), Some("loading profile"));
//! ```
//!
//! Wrapping never mutates its input and `wrap(None, ..) == None`: "no
//! error" propagates unchanged, with the annotators discarded.
//!
//! ## Stack reconciliation
//!
//! Every wrap captures the stack at its own call site. Because an error
//! propagates up a single physical call stack, consecutive captures share
//! a tail; the shared seam is collapsed so each frame appears once no
//! matter how many times the error is wrapped on the way up.
//!
//! ## Foreign chains
//!
//! Errors wrapped by another annotation library, one that exposes a cause
//! chain with per-level stack captures and `": "`-joined messages, fold
//! into a [`Fail`] through the [`ChainedError`] capability trait:
//!
//! ```rust,ignore
//! let fail = wrap(Source::foreign(foreign_err), [with_message("outer")]).unwrap();
//! ```
//!
//! Per-level message increments are recovered by trimming the delimiter-
//! joined suffixes the foreign library concatenates, and the per-level
//! stacks reduce into one seam-free trace. Folding is idempotent in shape:
//! alternating wraps between the two libraries never duplicates frames or
//! message segments.
//!
//! ## Plain errors
//!
//! Any other `std::error::Error` enters as an opaque root cause:
//!
//! ```rust
//! use failtrace::{Source, wrap, with_message};
//!
//! let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
//! let fail = wrap(Source::opaque(io), [with_message("reading config")]).unwrap();
//! assert_eq!(fail.to_string(), "reading config: missing");
//! ```

mod annotate;
mod error;
mod foreign;
mod stack;

pub use annotate::{
    Annotator, with_code, with_ignorable, with_message, with_param, with_params, with_tags,
};
pub use error::{BoxError, Fail, IntoSource, Params, Source, unwrap_fail, wrap};
pub use foreign::ChainedError;
pub use stack::{Frame, StackTrace};

use std::sync::OnceLock;

// ============================================================================
// Process-wide default reportability
// ============================================================================

static DEFAULT_IGNORABLE: OnceLock<bool> = OnceLock::new();

/// Set the process-wide default for the ignorable flag, resolved once at
/// startup. Constructors read it when building a record; nothing else
/// touches it. The first call wins, later calls are ignored.
pub fn set_default_ignorable(ignorable: bool) {
    let _ = DEFAULT_IGNORABLE.set(ignorable);
}

/// The current default for the ignorable flag; `false` until configured.
pub(crate) fn default_ignorable() -> bool {
    DEFAULT_IGNORABLE.get().copied().unwrap_or(false)
}

/// Create a [`Fail`] from a format string, recording the stack trace at
/// the point of the call.
///
/// ## Example
///
/// ```rust
/// use failtrace::errorf;
///
/// let err = errorf!("no such user: {}", 42);
/// assert_eq!(err.to_string(), "no such user: 42");
/// assert!(!err.stack_trace().is_empty());
/// ```
#[macro_export]
macro_rules! errorf {
    ($($arg:tt)*) => {
        $crate::Fail::__errorf(::core::format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests;
