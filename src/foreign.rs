//! Foreign cause-chain extraction.
//!
//! Other annotation libraries wrap errors in their own layers, each layer
//! optionally capturing a stack and concatenating its message onto the
//! cause's with a `": "` delimiter. [`extract_chain`] walks such a chain
//! once and folds it into a single normalized root text, ordered message
//! increments, and one merged stack trace.

use std::error::Error as StdError;

use crate::error::MESSAGE_DELIMITER;
use crate::stack::{StackTrace, convert_pcs, reduce};

/// One level of a foreign-wrapped error chain.
///
/// Two independent capabilities, both optional: exposing the wrapped cause
/// and exposing the program counters captured when this level wrapped. A
/// foreign type implements whichever accessors it actually has; the
/// defaults answer `None`.
///
/// Cause chains must be acyclic. A cycle is a precondition violation and
/// the walk over it will not terminate.
///
/// ## Example
///
/// ```rust
/// use std::fmt;
/// use failtrace::ChainedError;
///
/// #[derive(Debug)]
/// struct Layer {
///     text: String,
///     pcs: Vec<usize>,
///     cause: Option<Box<Layer>>,
/// }
///
/// impl fmt::Display for Layer {
///     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
///         write!(f, "{}", self.text)
///     }
/// }
///
/// impl std::error::Error for Layer {}
///
/// impl ChainedError for Layer {
///     fn chain_cause(&self) -> Option<&dyn ChainedError> {
///         self.cause.as_deref().map(|c| c as &dyn ChainedError)
///     }
///     fn stack_pcs(&self) -> Option<&[usize]> {
///         Some(self.pcs.as_slice())
///     }
/// }
/// ```
pub trait ChainedError: StdError + Send + Sync {
    /// The error wrapped at the next level down. `None` marks the root
    /// cause. Named apart from the deprecated `Error::cause` so calls on
    /// a trait object resolve unambiguously.
    fn chain_cause(&self) -> Option<&dyn ChainedError> {
        None
    }

    /// Program counters recorded when this level captured its stack,
    /// convertible to frames by the runtime's standard symbolication.
    fn stack_pcs(&self) -> Option<&[usize]> {
        None
    }
}

/// The normalized result of one chain walk. Consumed immediately by error
/// aggregation, never persisted.
pub(crate) struct Extraction {
    /// Text of the innermost error, the one with no further cause.
    pub(crate) root_text: String,
    /// Per-wrap message increments, outermost first.
    pub(crate) messages: Vec<String>,
    /// All per-level traces reduced into one.
    pub(crate) trace: StackTrace,
}

/// Walk a foreign chain and extract its accumulated context.
///
/// Every level, the root included, contributes its stack when it exposes
/// one. Every level above the root contributes its full text, unless it
/// repeats the previous level's verbatim (a stack-only wrap that added no
/// message). Returns `None` when the walk collected zero stack traces:
/// "nothing foreign found" is distinct from "foreign chain with no stacks",
/// and only the former falls back to opaque handling.
pub(crate) fn extract_chain(err: &dyn ChainedError) -> Option<Extraction> {
    let mut traces: Vec<StackTrace> = Vec::new();
    let mut texts: Vec<String> = Vec::new();

    let mut current = err;
    loop {
        if let Some(pcs) = current.stack_pcs() {
            traces.push(convert_pcs(pcs));
        }
        match current.chain_cause() {
            Some(cause) => {
                let text = current.to_string();
                if texts.last() != Some(&text) {
                    texts.push(text);
                }
                current = cause;
            }
            None => break,
        }
    }

    if traces.is_empty() {
        return None;
    }

    let root_text = current.to_string();
    let messages = trim_increments(texts, &root_text);

    Some(Extraction {
        root_text,
        messages,
        trace: reduce(traces),
    })
}

/// Recover per-wrap message increments from delimiter-joined level texts.
///
/// A foreign wrap renders as `message + ": " + causeText`, so only the
/// outermost text is directly observable per level; the increment each
/// level added is recovered by stripping the accumulated inner text as a
/// suffix. `texts` is outermost-first; trimming runs innermost-first, and
/// the trailing suffix advances to the *untrimmed* text just processed so
/// the next, more outer, level trims against the full accumulated text.
///
/// A text equal to the current suffix added nothing and is dropped, as is
/// an increment that trims to the empty string (a wrap annotated with an
/// empty message, the foreign analog of `with_message("")`). A text that
/// matches neither way is kept whole: malformed levels are retained
/// untouched rather than failing the walk.
pub(crate) fn trim_increments(mut texts: Vec<String>, root_text: &str) -> Vec<String> {
    let mut suffix = root_text.to_string();
    let mut keep = vec![true; texts.len()];
    for i in (0..texts.len()).rev() {
        let full = texts[i].clone();
        let joined = format!("{MESSAGE_DELIMITER}{suffix}");
        if texts[i] == suffix {
            keep[i] = false;
        } else if let Some(head) = texts[i].strip_suffix(&joined) {
            if head.is_empty() {
                keep[i] = false;
            } else {
                texts[i] = head.to_string();
            }
        }
        suffix = full;
    }
    texts
        .into_iter()
        .zip(keep)
        .filter_map(|(text, kept)| kept.then_some(text))
        .collect()
}
