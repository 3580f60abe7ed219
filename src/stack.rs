//! Stack capture and reconciliation.
//!
//! This module provides [`Frame`] and [`StackTrace`], the bounded capture
//! primitive [`capture_stack`], and the seam-collapsing [`merge`]/[`reduce`]
//! operations that keep traces free of duplicated frames when an error is
//! wrapped at several depths of the same physical call stack.

use std::ffi::c_void;
use std::fmt;

// ============================================================================
// FrameVec - configurable storage for trace frames
// ============================================================================
//
// When the smallvec feature is enabled, the first 8 frames live inline and
// the vector spills to the heap past that. Captures are bounded either way.

/// Inline-first frame storage with 8 inline slots (smallvec feature).
#[cfg(feature = "smallvec")]
type FrameVec = smallvec::SmallVec<[Frame; 8]>;

/// Heap-allocated frame storage (default).
#[cfg(not(feature = "smallvec"))]
type FrameVec = Vec<Frame>;

/// Upper bound on frames retained in a captured trace.
pub(crate) const STACK_MAX_SIZE: usize = 32;

/// Extra raw pointers collected beyond the cap so that capture machinery
/// dropped before conversion does not eat into the budget.
const RAW_SLACK: usize = 16;

/// Qualified-name prefixes of capture machinery. Frames matching these are
/// dropped from the top of every raw capture before `skip` is applied, so
/// the first surviving frame is the caller of the library entry point.
const INTERNAL_PREFIXES: &[&str] = &[
    "backtrace::",
    concat!(env!("CARGO_CRATE_NAME"), "::stack::"),
    concat!(env!("CARGO_CRATE_NAME"), "::error::"),
    concat!(env!("CARGO_CRATE_NAME"), "::foreign::"),
];

/// File prefix of toolchain-internal sources. Frames from there carry no
/// diagnostic value and would pollute every trace.
const RUSTC_SRC_PREFIX: &str = "/rustc/";

// ============================================================================
// Frame / StackTrace
// ============================================================================

/// One recorded call site: function, file, and line.
///
/// The function name is crate-local (leading crate segment and trailing
/// symbol hash stripped); the file path is trimmed relative to the source
/// root inferred from the qualified symbol name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Crate-local, receiver-qualified function name.
    pub func: String,
    /// Source file path, trimmed to the inferred source root.
    pub file: String,
    /// Line number of the call site.
    pub line: u32,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.func, self.file, self.line)
    }
}

/// An ordered sequence of [`Frame`], innermost (deepest call) first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackTrace {
    frames: FrameVec,
}

impl StackTrace {
    /// Create an empty trace.
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            frames: FrameVec::new(),
        }
    }

    /// All frames, innermost first.
    #[inline]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Number of frames in the trace.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the trace is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }
}

impl From<Vec<Frame>> for StackTrace {
    fn from(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl fmt::Display for StackTrace {
    /// One `at func (file:line)` row per frame, innermost first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, frame) in self.frames.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "at {frame}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Capture
// ============================================================================

/// A symbolicated frame before name/path normalization.
struct RawFrame {
    name: String,
    file: String,
    line: u32,
}

/// File placeholder for frames resolved without debug info.
const UNKNOWN_FILE: &str = "<unknown>";

/// Convert one resolved symbol. A frame without a resolvable name is
/// omitted; a missing file or line (symbol table present, debug info
/// absent) degrades to placeholders so captures stay non-empty.
fn raw_frame_from_symbol(symbol: &backtrace::Symbol) -> Option<RawFrame> {
    let name = symbol.name()?.to_string();
    let file = symbol
        .filename()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| UNKNOWN_FILE.to_string());
    let line = symbol.lineno().unwrap_or(0);
    Some(RawFrame { name, file, line })
}

/// Capture the current call stack, starting `skip` frames above the caller
/// of the library entry point that invoked this.
///
/// Capture machinery (the resolver's own frames and this crate's entry
/// points) is dropped by qualified-name prefix rather than a fixed offset;
/// frame counts under inlining are not stable enough for offset arithmetic.
/// Toolchain-internal frames are dropped by file prefix. At most
/// [`STACK_MAX_SIZE`] frames survive.
#[inline(never)]
pub(crate) fn capture_stack(skip: usize) -> StackTrace {
    let mut ips: Vec<*mut c_void> = Vec::with_capacity(STACK_MAX_SIZE + RAW_SLACK);
    backtrace::trace(|frame| {
        ips.push(frame.ip());
        ips.len() < STACK_MAX_SIZE + RAW_SLACK
    });

    let mut raw: Vec<RawFrame> = Vec::with_capacity(ips.len());
    for &ip in &ips {
        // Each ip may expand to several frames when calls were inlined.
        backtrace::resolve(ip, |symbol| {
            if let Some(frame) = raw_frame_from_symbol(symbol) {
                raw.push(frame);
            }
        });
    }

    let mut trace = StackTrace::new();
    let visible = raw
        .into_iter()
        .skip_while(|f| INTERNAL_PREFIXES.iter().any(|p| f.name.starts_with(p)))
        .skip(skip);
    for frame in visible {
        if frame.file.starts_with(RUSTC_SRC_PREFIX) {
            continue;
        }
        trace.push(Frame {
            func: funcname(&frame.name),
            file: trim_source_path(&frame.name, &frame.file),
            line: frame.line,
        });
        if trace.len() == STACK_MAX_SIZE {
            break;
        }
    }
    trace
}

/// Symbolicate foreign-supplied program counters into a trace, with the
/// same frame conversion and filtering as [`capture_stack`] but no leading
/// skip: the foreign library already chose where its capture started.
pub(crate) fn convert_pcs(pcs: &[usize]) -> StackTrace {
    let mut trace = StackTrace::new();
    for &pc in pcs {
        backtrace::resolve(pc as *mut c_void, |symbol| {
            if trace.len() >= STACK_MAX_SIZE {
                return;
            }
            if let Some(raw) = raw_frame_from_symbol(symbol) {
                if raw.file.starts_with(RUSTC_SRC_PREFIX) {
                    return;
                }
                trace.push(Frame {
                    func: funcname(&raw.name),
                    file: trim_source_path(&raw.name, &raw.file),
                    line: raw.line,
                });
            }
        });
    }
    trace
}

// ============================================================================
// Name and path normalization
// ============================================================================

/// Strip the trailing `::h<16 hex>` disambiguator rustc appends to symbols.
fn strip_hash(name: &str) -> &str {
    if let Some((head, tail)) = name.rsplit_once("::") {
        if tail.len() == 17
            && tail.starts_with('h')
            && tail[1..].chars().all(|c| c.is_ascii_hexdigit())
        {
            return head;
        }
    }
    name
}

/// Keep only the crate-local part of a qualified symbol name: hash and
/// leading crate segment removed, module path and receiver kept.
pub(crate) fn funcname(name: &str) -> String {
    let name = strip_hash(name);
    match name.split_once("::") {
        Some((_, rest)) => rest.to_string(),
        None => name.to_string(),
    }
}

/// Make `file` relative to the source-root boundary implied by the
/// qualified symbol name.
///
/// The name does not include the source root, so its separator count bounds
/// the interesting path depth: keep one more `/`-component than the name
/// has `::` separators, counting from the right. Module depth approximates
/// source-tree depth because modules map to files under `src/`. A path with
/// too few separators is returned unmodified.
pub(crate) fn trim_source_path(name: &str, file: &str) -> String {
    let keep = strip_hash(name).matches("::").count() + 1;
    let mut idx = file.len();
    for _ in 0..keep {
        match file[..idx].rfind('/') {
            Some(i) => idx = i,
            None => return file.to_string(),
        }
    }
    file[idx + 1..].to_string()
}

// ============================================================================
// Reconciliation
// ============================================================================

/// Merge two traces captured from the same physical call stack at
/// different depths.
///
/// `inner` was captured deeper (earlier, closer to the root cause); `outer`
/// at a shallower, later wrap site. Their shared tail is collapsed so the
/// seam holds no duplicated frames. Overlap is only possible when `inner`
/// is the longer trace; otherwise the traces are simply concatenated. This
/// is a suffix/prefix seam match, not a general diff: traces are monotonic
/// call chains, never reordered.
pub(crate) fn merge(inner: StackTrace, outer: StackTrace) -> StackTrace {
    let inner_len = inner.frames.len();
    let outer_len = outer.frames.len();

    let mut frames = inner.frames;
    if inner_len > outer_len {
        let mut overlap = 0;
        while overlap < outer_len
            && frames[inner_len - overlap - 1] == outer.frames[outer_len - overlap - 1]
        {
            overlap += 1;
        }
        if overlap > 0 {
            frames.truncate(inner_len - overlap);
        }
    }
    frames.extend(outer.frames);
    StackTrace { frames }
}

/// Fold a sequence of traces, ordered outermost-first (the order a foreign
/// chain walk visits them), into one. The accumulator is always the inner
/// side, so folding runs right-to-left: the innermost trace seeds the
/// result and each progressively outer trace is merged atop it.
pub(crate) fn reduce(traces: Vec<StackTrace>) -> StackTrace {
    let mut merged = StackTrace::new();
    for trace in traces.into_iter().rev() {
        merged = merge(merged, trace);
    }
    merged
}
