//! Fan-out subject helpers (one logical topic per source).

use std::borrow::Cow;

/// Normalizes identifiers to be subject-safe (replace spaces, trim).
fn norm<S: AsRef<str>>(s: S) -> Cow<'static, str> {
    let mut t = s
        .as_ref()
        .trim()
        .replace([' ', '\t', '\n', '\r', '*', '>', '/'], "-");
    if t.is_empty() {
        t = "unknown".into();
    }
    Cow::Owned(t)
}

/// Topic a verified webhook is republished on, namespaced by project.
///
/// ```
/// use hookrelay_core::fanout_subject;
///
/// assert_eq!(fanout_subject("fourkeys", "github"), "fourkeys.github");
/// ```
pub fn fanout_subject(project: &str, source: &str) -> String {
    format!("{}.{}", norm(project), norm(source))
}
