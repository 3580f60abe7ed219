//! Annotator constructors, one per annotated field.

use serde_json::Value;

use crate::error::{Fail, Params};

/// A single annotation applied to a [`Fail`] by [`wrap`](crate::wrap).
///
/// Annotators are pure field mutators; [`wrap`](crate::wrap) applies them
/// in argument order after the stack trace has been merged in.
pub struct Annotator(Box<dyn FnOnce(&mut Fail) + Send>);

impl Annotator {
    fn new(f: impl FnOnce(&mut Fail) + Send + 'static) -> Annotator {
        Annotator(Box::new(f))
    }

    pub(crate) fn apply(self, fail: &mut Fail) {
        (self.0)(fail);
    }
}

/// Annotate with a message. The newest message reads first in the composed
/// rendering; an empty message is a no-op.
pub fn with_message(msg: impl Into<String>) -> Annotator {
    let msg = msg.into();
    Annotator::new(move |fail| {
        if msg.is_empty() {
            return;
        }
        fail.messages.insert(0, msg);
    })
}

/// Annotate with a status code, such as an HTTP status. Overwrites any
/// code set earlier.
pub fn with_code(code: impl Into<Value>) -> Annotator {
    let code = code.into();
    Annotator::new(move |fail| fail.code = Some(code))
}

/// Mark the error as ignorable: it should not be reported to
/// administrators.
pub fn with_ignorable() -> Annotator {
    Annotator::new(|fail| fail.ignorable = true)
}

/// Annotate with classification tags. Tags append in order; duplicates are
/// kept.
pub fn with_tags<I, T>(tags: I) -> Annotator
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
    Annotator::new(move |fail| fail.tags.extend(tags))
}

/// Annotate with a single key/value pair.
pub fn with_param(key: impl Into<String>, value: impl Into<Value>) -> Annotator {
    let (key, value) = (key.into(), value.into());
    Annotator::new(move |fail| {
        fail.params.insert(key, value);
    })
}

/// Annotate with key/value pairs. On key collision the newest value wins.
pub fn with_params(params: Params) -> Annotator {
    Annotator::new(move |fail| fail.params.extend(params))
}
