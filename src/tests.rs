//! Unit tests for failtrace.
//!
//! These tests are in a separate file for organization but remain in the
//! `src/` directory to retain access to `pub(crate)` items like `merge`
//! and `extract_chain`.

use std::fmt;

use crate::foreign::{ChainedError, extract_chain, trim_increments};
use crate::stack::{Frame, StackTrace, capture_stack, funcname, merge, reduce, trim_source_path};
use crate::{Fail, unwrap_fail, with_code, with_message, with_param, with_params, with_tags, wrap};

fn frame(func: &str) -> Frame {
    Frame {
        func: func.to_string(),
        file: format!("{func}.rs"),
        line: 1,
    }
}

fn trace_of(funcs: &[&str]) -> StackTrace {
    StackTrace::from(funcs.iter().map(|f| frame(f)).collect::<Vec<_>>())
}

// ============================================================================
// Stack reconciliation
// ============================================================================

#[test]
fn merge_collapses_overlap() {
    let inner = trace_of(&["a", "b", "c", "d"]);
    let outer = trace_of(&["c", "d"]);
    assert_eq!(merge(inner, outer), trace_of(&["a", "b", "c", "d"]));
}

#[test]
fn merge_without_overlap_concatenates() {
    let inner = trace_of(&["a", "b", "c", "d"]);
    let outer = trace_of(&["x", "y"]);
    assert_eq!(merge(inner, outer), trace_of(&["a", "b", "c", "d", "x", "y"]));
}

#[test]
fn merge_empty_is_identity() {
    let t = trace_of(&["a", "b"]);
    assert_eq!(merge(t.clone(), StackTrace::from(vec![])), t);
    assert_eq!(merge(StackTrace::from(vec![]), t.clone()), t);
}

#[test]
fn merge_never_collapses_when_outer_is_longer() {
    // An outer trace longer than the inner cannot overlap from the end.
    let inner = trace_of(&["c", "d"]);
    let outer = trace_of(&["a", "b", "c", "d"]);
    assert_eq!(merge(inner, outer), trace_of(&["c", "d", "a", "b", "c", "d"]));
}

#[test]
fn merge_partial_overlap_stops_at_mismatch() {
    let inner = trace_of(&["a", "b", "c", "d"]);
    let outer = trace_of(&["x", "c", "d"]);
    assert_eq!(merge(inner, outer), trace_of(&["a", "b", "x", "c", "d"]));
}

#[test]
fn reduce_folds_outermost_first() {
    // Visit order of a chain walk: shallowest wrap first, creation site
    // last. The reduced trace equals the deepest capture.
    let traces = vec![
        trace_of(&["f1", "main"]),
        trace_of(&["f2", "f1", "main"]),
        trace_of(&["f3", "f2", "f1", "main"]),
    ];
    assert_eq!(reduce(traces), trace_of(&["f3", "f2", "f1", "main"]));
}

#[test]
fn reduce_of_nothing_is_empty() {
    assert!(reduce(Vec::new()).is_empty());
}

// ============================================================================
// Name and path normalization
// ============================================================================

#[test]
fn funcname_strips_crate_and_hash() {
    assert_eq!(
        funcname("myapp::db::fetch_user::h0123456789abcdef"),
        "db::fetch_user"
    );
    assert_eq!(funcname("myapp::db::fetch_user"), "db::fetch_user");
    assert_eq!(funcname("main"), "main");
}

#[test]
fn funcname_keeps_non_hash_tail() {
    // A final segment that merely looks hash-ish must survive.
    assert_eq!(funcname("myapp::handle"), "handle");
    assert_eq!(funcname("myapp::h123"), "h123");
}

#[test]
fn trim_source_path_keeps_one_more_component_than_name_separators() {
    assert_eq!(
        trim_source_path("myapp::db::fetch_user", "/home/u/work/myapp/src/db.rs"),
        "myapp/src/db.rs"
    );
    assert_eq!(trim_source_path("main", "/home/u/work/myapp/src/main.rs"), "main.rs");
}

#[test]
fn trim_source_path_leaves_short_paths_alone() {
    assert_eq!(trim_source_path("a::b::c", "db.rs"), "db.rs");
}

// ============================================================================
// Foreign message trimming
// ============================================================================

#[test]
fn trim_increments_recovers_per_wrap_messages() {
    let texts = vec!["m2: m1: root".to_string(), "m1: root".to_string()];
    assert_eq!(trim_increments(texts, "root"), vec!["m2", "m1"]);
}

#[test]
fn trim_increments_keeps_malformed_levels_whole() {
    let texts = vec!["totally different".to_string()];
    assert_eq!(trim_increments(texts, "root"), vec!["totally different"]);
}

#[test]
fn trim_increments_drops_stack_only_wraps() {
    // A wrap that captured a stack but added no text repeats the root's
    // message verbatim; keeping it would duplicate the root in rendering.
    let texts = vec!["m1: root".to_string(), "root".to_string()];
    assert_eq!(trim_increments(texts, "root"), vec!["m1"]);
}

#[test]
fn trim_increments_drops_empty_messages() {
    // A wrap annotated with an empty message renders as ": cause"; its
    // increment trims to nothing and must not survive into the list.
    let texts = vec![
        "m3: : m1: root".to_string(),
        ": m1: root".to_string(),
        "m1: root".to_string(),
    ];
    assert_eq!(trim_increments(texts, "root"), vec!["m3", "m1"]);
}

#[test]
fn trim_increments_of_empty_is_empty() {
    assert!(trim_increments(Vec::new(), "root").is_empty());
}

// ============================================================================
// Foreign chain extraction
// ============================================================================

#[derive(Debug)]
struct FakeForeign {
    text: String,
    pcs: Option<Vec<usize>>,
    cause: Option<Box<FakeForeign>>,
}

impl FakeForeign {
    fn root(text: &str, pcs: Option<Vec<usize>>) -> FakeForeign {
        FakeForeign {
            text: text.to_string(),
            pcs,
            cause: None,
        }
    }

    fn wrap(self, msg: &str, pcs: Option<Vec<usize>>) -> FakeForeign {
        FakeForeign {
            text: format!("{msg}: {}", self.text),
            pcs,
            cause: Some(Box::new(self)),
        }
    }

    /// A wrap that captured a stack but added no message, so its text
    /// repeats the cause's verbatim.
    fn wrap_stack_only(self, pcs: Vec<usize>) -> FakeForeign {
        FakeForeign {
            text: self.text.clone(),
            pcs: Some(pcs),
            cause: Some(Box::new(self)),
        }
    }
}

impl fmt::Display for FakeForeign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl std::error::Error for FakeForeign {}

impl ChainedError for FakeForeign {
    fn chain_cause(&self) -> Option<&dyn ChainedError> {
        self.cause.as_deref().map(|c| c as &dyn ChainedError)
    }

    fn stack_pcs(&self) -> Option<&[usize]> {
        self.pcs.as_deref()
    }
}

#[test]
fn chain_walks_through_trait_objects() {
    let chain = FakeForeign::root("root", None).wrap("m1", None);
    let level: &dyn ChainedError = &chain;

    let root = level.chain_cause().expect("wrapped level has a cause");
    assert!(root.chain_cause().is_none());
    assert_eq!(root.to_string(), "root");
}

#[test]
fn extract_chain_collects_messages_and_root() {
    let chain = FakeForeign::root("root", Some(Vec::new()))
        .wrap("m1", None)
        .wrap("m2", Some(Vec::new()));

    let extraction = extract_chain(&chain).expect("chain carries stacks");
    assert_eq!(extraction.root_text, "root");
    assert_eq!(extraction.messages, vec!["m2", "m1"]);
}

#[test]
fn extract_chain_drops_empty_foreign_messages() {
    let chain = FakeForeign::root("root", Some(Vec::new()))
        .wrap("m1", None)
        .wrap("", Some(Vec::new()));

    let extraction = extract_chain(&chain).expect("chain carries stacks");
    assert_eq!(extraction.messages, vec!["m1"]);
    assert_eq!(extraction.root_text, "root");
}

#[test]
fn extract_chain_without_stacks_is_absent() {
    // "Nothing foreign found" must be distinguishable from "foreign chain
    // with no stacks"; a chain that never captured is not foreign context.
    let chain = FakeForeign::root("root", None).wrap("m1", None);
    assert!(extract_chain(&chain).is_none());
}

#[test]
fn extract_chain_skips_text_repeated_by_stack_only_wraps() {
    let chain = FakeForeign::root("root", Some(Vec::new()))
        .wrap("m1", None)
        .wrap_stack_only(Vec::new());

    let extraction = extract_chain(&chain).expect("chain carries stacks");
    assert_eq!(extraction.messages, vec!["m1"]);
    assert_eq!(extraction.root_text, "root");
}

// ============================================================================
// Capture
// ============================================================================

#[inline(never)]
fn capture_here(skip: usize) -> StackTrace {
    capture_stack(skip)
}

#[test]
fn capture_starts_at_the_caller() {
    let trace = capture_here(0);
    assert!(!trace.is_empty());
    assert!(
        trace.frames()[0].func.contains("capture_here"),
        "first frame was {}",
        trace.frames()[0].func
    );
}

#[test]
fn capture_skip_drops_frames() {
    let trace = capture_here(1);
    assert!(!trace.is_empty());
    assert!(
        trace.frames()[0].func.contains("capture_skip_drops_frames"),
        "first frame was {}",
        trace.frames()[0].func
    );
}

// ============================================================================
// Aggregation
// ============================================================================

#[test]
fn new_has_no_messages_and_a_trace() {
    let fail = Fail::new("boom");
    assert_eq!(fail.to_string(), "boom");
    assert!(fail.messages().is_empty());
    assert!(fail.last_message().is_none());
    assert!(!fail.stack_trace().is_empty());
}

#[test]
fn wrap_of_none_is_none() {
    assert!(wrap(None::<Fail>, [with_code(500)]).is_none());
    assert!(unwrap_fail(None::<Fail>).is_none());
}

#[test]
fn wrap_prepends_messages_newest_first() {
    let fail = wrap(Fail::new("boom"), [with_message("inner")]).unwrap();
    let fail = wrap(fail, [with_message("outer")]).unwrap();
    assert_eq!(fail.messages(), ["outer", "inner"]);
    assert_eq!(fail.last_message(), Some("outer"));
    assert_eq!(fail.full_message(), "outer: inner");
    assert_eq!(fail.to_string(), "outer: inner: boom");
}

#[test]
fn empty_message_is_a_noop() {
    let fail = wrap(Fail::new("boom"), [with_message("")]).unwrap();
    assert!(fail.messages().is_empty());
    assert_eq!(fail.to_string(), "boom");
}

#[test]
fn newest_code_wins() {
    let fail = wrap(Fail::new("boom"), [with_code(500), with_code(503)]).unwrap();
    assert_eq!(fail.code(), Some(&503.into()));
}

#[test]
fn tags_append_in_order_with_duplicates() {
    let fail = wrap(Fail::new("boom"), [with_tags(["db", "retry"]), with_tags(["db"])]).unwrap();
    assert_eq!(fail.tags(), ["db", "retry", "db"]);
}

#[test]
fn params_merge_newest_wins() {
    let mut params = crate::Params::new();
    params.insert("a".to_string(), 1.into());
    params.insert("b".to_string(), 2.into());

    let fail = wrap(
        Fail::new("boom"),
        [with_params(params), with_param("a", 9)],
    )
    .unwrap();
    assert_eq!(fail.params().get("a"), Some(&9.into()));
    assert_eq!(fail.params().get("b"), Some(&2.into()));
}

#[test]
fn wrapping_preserves_the_root_cause() {
    let fail = Fail::new("boom");
    let root_before = unwrap_fail(fail.clone()).unwrap().root_cause().to_string();

    let wrapped = wrap(fail, [with_message("ctx")]).unwrap();
    let root_after = unwrap_fail(wrapped).unwrap().root_cause().to_string();
    assert_eq!(root_before, root_after);
    assert_eq!(root_after, "boom");
}

#[test]
fn sibling_wraps_are_isolated() {
    let parent = wrap(Fail::new("boom"), [with_tags(["base"])]).unwrap();

    let a = wrap(parent.clone(), [with_tags(["a"])]).unwrap();
    let b = wrap(parent.clone(), [with_tags(["b"])]).unwrap();

    assert_eq!(a.tags(), ["base", "a"]);
    assert_eq!(b.tags(), ["base", "b"]);
    assert_eq!(parent.tags(), ["base"]);
}

#[test]
fn unwrap_fail_of_opaque_is_none() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    assert!(unwrap_fail(crate::Source::opaque(io)).is_none());
}

#[test]
fn errorf_formats_the_root_text() {
    let fail = errorf!("no such user: {}", 42);
    assert_eq!(fail.to_string(), "no such user: 42");
    assert!(!fail.stack_trace().is_empty());
}
