//! The annotated error record and its entry points.
//!
//! [`Fail`] carries a shared root cause plus the context accumulated over
//! wraps: messages, a status code, tags, params, a reportability flag, and
//! one merged stack trace. [`wrap`] and [`unwrap_fail`] accept native,
//! foreign, and opaque inputs through [`Source`].

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::annotate::Annotator;
use crate::foreign::{ChainedError, Extraction, extract_chain};
use crate::stack::{StackTrace, capture_stack, merge};

/// Delimiter joining message segments, shared with the foreign convention.
pub(crate) const MESSAGE_DELIMITER: &str = ": ";

/// Boxed error alias used at the opaque boundary.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// JSON-like key/value parameters attached to a [`Fail`]. Keys are unique;
/// later writes overwrite earlier ones.
pub type Params = serde_json::Map<String, Value>;

/// Primitive text-only root cause, used by [`Fail::new`] / [`errorf!`](crate::errorf)
/// and for roots recovered from foreign chains.
#[derive(Debug)]
struct TextError(String);

impl fmt::Display for TextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for TextError {}

// ============================================================================
// Fail
// ============================================================================

/// An error annotated with contextual metadata and a merged stack trace.
///
/// A `Fail` exclusively owns its messages, tags, params, and trace; the
/// root cause is shared and never mutated. Wrapping always produces a new
/// record, so a clone taken at any point shows the state as of that
/// observation no matter how the error is wrapped later.
///
/// ## Example
///
/// ```rust
/// use failtrace::{Fail, wrap, with_code, with_message};
///
/// let err = Fail::new("record not found");
/// let err = wrap(err, [with_message("loading profile"), with_code(404)]).unwrap();
///
/// assert_eq!(err.to_string(), "loading profile: record not found");
/// assert_eq!(err.code(), Some(&404.into()));
/// assert!(!err.stack_trace().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct Fail {
    /// The original error; shared, never mutated.
    pub(crate) cause: Arc<dyn StdError + Send + Sync + 'static>,
    /// Annotated descriptions, newest first.
    pub(crate) messages: Vec<String>,
    /// Status code desired in responses, such as an HTTP status.
    pub(crate) code: Option<Value>,
    /// Whether the error should be kept from administrators.
    pub(crate) ignorable: bool,
    /// Classification tags, insertion-ordered, duplicates allowed.
    pub(crate) tags: Vec<String>,
    /// Annotated parameters of the error.
    pub(crate) params: Params,
    /// Merged stack trace from the point the error was created.
    pub(crate) trace: StackTrace,
}

impl Fail {
    /// Create an error with the given text, recording the stack trace at
    /// the point of the call.
    pub fn new(text: impl Into<String>) -> Fail {
        let mut fail = Fail::from_cause(Arc::new(TextError(text.into())));
        fail.trace = capture_stack(0);
        fail
    }

    /// Implementation detail of [`errorf!`](crate::errorf).
    #[doc(hidden)]
    pub fn __errorf(args: fmt::Arguments<'_>) -> Fail {
        let mut fail = Fail::from_cause(Arc::new(TextError(args.to_string())));
        fail.trace = capture_stack(0);
        fail
    }

    /// A bare record around `cause`: no messages, no trace, process-wide
    /// default reportability.
    fn from_cause(cause: Arc<dyn StdError + Send + Sync + 'static>) -> Fail {
        Fail {
            cause,
            messages: Vec::new(),
            code: None,
            ignorable: crate::default_ignorable(),
            tags: Vec::new(),
            params: Params::new(),
            trace: StackTrace::new(),
        }
    }

    fn from_extraction(extraction: Extraction) -> Fail {
        let mut fail = Fail::from_cause(Arc::new(TextError(extraction.root_text)));
        fail.messages = extraction.messages;
        fail.trace = extraction.trace;
        fail
    }

    /// The original error at the bottom of the chain.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        &*self.cause
    }

    /// Annotated messages, newest first.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// The most recently added message, if any.
    pub fn last_message(&self) -> Option<&str> {
        self.messages.first().map(String::as_str)
    }

    /// All messages joined with `": "`, newest first. Empty when the error
    /// carries no messages.
    pub fn full_message(&self) -> String {
        self.messages.join(MESSAGE_DELIMITER)
    }

    /// The status code, if one was annotated.
    pub fn code(&self) -> Option<&Value> {
        self.code.as_ref()
    }

    /// Whether the error should be kept from administrators.
    pub fn ignorable(&self) -> bool {
        self.ignorable
    }

    /// Classification tags, in insertion order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Annotated parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The merged stack trace, innermost frame first.
    pub fn stack_trace(&self) -> &StackTrace {
        &self.trace
    }
}

impl fmt::Display for Fail {
    /// The composed message: annotations newest first, then the root cause
    /// text, joined with `": "`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.messages.is_empty() {
            write!(f, "{}", self.cause)
        } else {
            write!(f, "{}{}{}", self.full_message(), MESSAGE_DELIMITER, self.cause)
        }
    }
}

impl StdError for Fail {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.root_cause())
    }
}

// ============================================================================
// Source - input unification for wrap / unwrap_fail
// ============================================================================

/// An error value accepted by [`wrap`] and [`unwrap_fail`].
///
/// Rust has no runtime type switch over arbitrary errors, so the three
/// kinds of input are unified here: [`Fail`] converts directly, foreign
/// chains enter through [`Source::foreign`] (or a boxed trait object), and
/// anything else through [`Source::opaque`].
pub enum Source {
    /// An error produced by this library.
    Native(Fail),
    /// An error from a foreign annotation library.
    Foreign(Box<dyn ChainedError>),
    /// Any other error; becomes the root cause as-is.
    Opaque(BoxError),
}

impl Source {
    /// Wrap a foreign chained error.
    pub fn foreign(err: impl ChainedError + 'static) -> Source {
        Source::Foreign(Box::new(err))
    }

    /// Wrap a plain error with no recoverable context.
    pub fn opaque(err: impl StdError + Send + Sync + 'static) -> Source {
        Source::Opaque(Box::new(err))
    }
}

impl From<Fail> for Source {
    fn from(fail: Fail) -> Source {
        Source::Native(fail)
    }
}

impl From<Box<dyn ChainedError>> for Source {
    fn from(err: Box<dyn ChainedError>) -> Source {
        Source::Foreign(err)
    }
}

impl From<BoxError> for Source {
    fn from(err: BoxError) -> Source {
        Source::Opaque(err)
    }
}

/// Conversion into an optional [`Source`], the input contract of [`wrap`]
/// and [`unwrap_fail`].
///
/// A dedicated trait rather than `Into<Option<Source>>`: the orphan rule
/// rejects `From` impls for `Option<Source>` from non-local types like
/// `Option<Fail>`, and a generic `S: Into<Source>` hop leaves
/// `wrap(None::<Fail>, ..)` unable to infer `S`. Concrete impls keep every
/// call site inference-free, and external error types may implement it to
/// enter [`wrap`] directly.
pub trait IntoSource {
    /// The source to wrap, or `None` for "no error".
    fn into_source(self) -> Option<Source>;
}

impl IntoSource for Source {
    fn into_source(self) -> Option<Source> {
        Some(self)
    }
}

impl IntoSource for Option<Source> {
    fn into_source(self) -> Option<Source> {
        self
    }
}

impl IntoSource for Fail {
    fn into_source(self) -> Option<Source> {
        Some(Source::Native(self))
    }
}

impl IntoSource for Option<Fail> {
    fn into_source(self) -> Option<Source> {
        self.map(Source::Native)
    }
}

impl IntoSource for Box<dyn ChainedError> {
    fn into_source(self) -> Option<Source> {
        Some(Source::Foreign(self))
    }
}

impl IntoSource for BoxError {
    fn into_source(self) -> Option<Source> {
        Some(Source::Opaque(self))
    }
}

// ============================================================================
// wrap / unwrap_fail
// ============================================================================

/// Annotate an error with a stack trace from the point of the call and the
/// given annotators, applied in argument order.
///
/// `None` in means `None` out: "no error" propagates unchanged and the
/// annotators are discarded silently. Every non-`None` input produces a
/// record: a native [`Fail`] is carried over as a new record, a foreign
/// chain is folded into one ([`ChainedError`]), and anything else becomes
/// an opaque root cause. The freshly captured trace is merged seam-free
/// into whatever trace the input already carried.
///
/// ## Example
///
/// ```rust
/// use failtrace::{Fail, wrap, with_message, with_tags};
///
/// let err = Fail::new("boom");
/// let err = wrap(err, [with_message("starting engine"), with_tags(["engine"])]);
/// assert_eq!(err.unwrap().to_string(), "starting engine: boom");
///
/// assert!(wrap(None::<Fail>, [with_message("ignored")]).is_none());
/// ```
pub fn wrap(
    err: impl IntoSource,
    annotators: impl IntoIterator<Item = Annotator>,
) -> Option<Fail> {
    let source = err.into_source()?;
    let mut fail = wrap_source(source);
    for annotator in annotators {
        annotator.apply(&mut fail);
    }
    Some(fail)
}

fn wrap_source(source: Source) -> Fail {
    let mut fail = match source {
        Source::Native(fail) => fail,
        Source::Foreign(err) => match extract_chain(err.as_ref()) {
            Some(extraction) => Fail::from_extraction(extraction),
            None => {
                // Chain without stacks: nothing foreign to recover, treat
                // the whole error as an opaque root cause.
                let err: BoxError = err;
                Fail::from_cause(Arc::from(err))
            }
        },
        Source::Opaque(err) => Fail::from_cause(Arc::from(err)),
    };
    fail.trace = merge(std::mem::take(&mut fail.trace), capture_stack(0));
    fail
}

/// Extract the annotated record from an error, without capturing a stack.
///
/// Returns `None` for `None` input or input with no recoverable context:
/// opaque errors, and foreign chains that carried no stack traces. A
/// native [`Fail`] passes through unchanged; a foreign chain is folded the
/// same way [`wrap`] folds it. This is a read-only probe, not a wrap
/// point.
pub fn unwrap_fail(err: impl IntoSource) -> Option<Fail> {
    match err.into_source()? {
        Source::Native(fail) => Some(fail),
        Source::Foreign(err) => extract_chain(err.as_ref()).map(Fail::from_extraction),
        Source::Opaque(_) => None,
    }
}
