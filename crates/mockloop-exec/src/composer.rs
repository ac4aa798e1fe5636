//! Script composer: appends classified test-case fragments to the submitted
//! source, producing the composed unit handed to the runner.
//!
//! The base source is never validated here; its syntax errors surface at run
//! time on the process's stderr.

use crate::classifier::{ClassifiedFragment, FragmentKind};

/// Separator line written before the first appended fragment.
pub const TEST_CASE_HEADER: &str = "# Test cases";

/// Build the composed unit.
///
/// With no surviving fragments the source is returned unchanged. Otherwise a
/// blank line and [`TEST_CASE_HEADER`] follow the source, then one entry per
/// fragment in the given order: expressions are printed, statements run as-is.
///
/// An expression is placed on its own line inside `print(...)` so that a
/// trailing comment in the fragment cannot swallow the closing parenthesis.
///
/// # Examples
/// ```
/// use mockloop_exec::{classify_all, compose};
/// let unit = compose("x = 2", &classify_all(&["x * 2"]));
/// assert_eq!(unit, "x = 2\n\n# Test cases\nprint(\nx * 2\n)\n");
/// ```
pub fn compose(source: &str, fragments: &[ClassifiedFragment]) -> String {
    let mut unit = source.to_string();
    if fragments.is_empty() {
        return unit;
    }

    unit.push_str("\n\n");
    unit.push_str(TEST_CASE_HEADER);
    unit.push('\n');
    for fragment in fragments {
        match fragment.kind {
            FragmentKind::Expression => {
                unit.push_str("print(\n");
                unit.push_str(&fragment.text);
                unit.push_str("\n)\n");
            }
            FragmentKind::Statement => {
                unit.push_str(&fragment.text);
                unit.push('\n');
            }
        }
    }
    unit
}
