//! Fragment classifier: decides whether and how a test-case string is spliced
//! into the composed unit.
//!
//! Rules, applied to each fragment in order:
//! 1. Trim surrounding whitespace; an empty result is excluded.
//! 2. A fragment starting with `#` is documentation and is excluded.
//! 3. If it parses as a standalone expression → [`FragmentKind::Expression`].
//! 4. Else if it parses as a statement sequence → [`FragmentKind::Statement`].
//! 5. Otherwise it is silently excluded. A malformed test case never aborts an
//!    otherwise valid execution.
//!
//! Classification is parse-only and never evaluates the fragment.

use rustpython_parser::Mode;
use serde::{Deserialize, Serialize};

use crate::cache::{cache_key, ClassificationCache};
use crate::validator::check_syntax;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FragmentKind {
    /// Evaluated and its value printed.
    Expression,
    /// Executed verbatim.
    Statement,
}

/// A fragment that survived classification, already trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedFragment {
    pub text: String,
    pub kind: FragmentKind,
}

/// Classify one fragment. `None` means the fragment is excluded.
pub fn classify(fragment: &str) -> Option<ClassifiedFragment> {
    let text = fragment.trim();
    if text.is_empty() || text.starts_with('#') {
        return None;
    }

    let key = cache_key(text);
    let cache = ClassificationCache::global();
    let kind = match cache.get(&key) {
        Some(verdict) => verdict,
        None => {
            let verdict = parse_kind(text);
            cache.insert(key, verdict);
            verdict
        }
    }?;

    Some(ClassifiedFragment {
        text: text.to_string(),
        kind,
    })
}

/// Classify every fragment, keeping survivors in submission order.
pub fn classify_all<S: AsRef<str>>(fragments: &[S]) -> Vec<ClassifiedFragment> {
    let classified: Vec<ClassifiedFragment> =
        fragments.iter().filter_map(|f| classify(f.as_ref())).collect();
    if classified.len() < fragments.len() {
        log::debug!(
            "excluded {} of {} test-case fragments",
            fragments.len() - classified.len(),
            fragments.len()
        );
    }
    classified
}

fn parse_kind(text: &str) -> Option<FragmentKind> {
    if check_syntax(text, Mode::Expression).is_ok() {
        Some(FragmentKind::Expression)
    } else if check_syntax(text, Mode::Module).is_ok() {
        Some(FragmentKind::Statement)
    } else {
        None
    }
}
