//! Parse-only syntax checks.
//!
//! Both the [`validate`] entry point and the fragment classifier go through
//! [`check_syntax`]. It runs RustPython's parser and never generates code or
//! creates an interpreter, so constructs the parser understands (`match`,
//! `except*`) are accepted even where RustPython cannot yet compile them.
//!
//! ## Nesting
//!
//! A pre-scan rejects more than [`MAX_NESTING`] levels of brackets with
//! `too many nested parentheses` before the parser sees the input. The parse
//! itself runs on a dedicated thread whose stack grows with the source length,
//! so deeply nested operator chains cannot exhaust the caller's stack.
//!
//! ## Line numbers
//!
//! When parsing fails at end of input with a bracket still open, the
//! diagnostic points at the line of the innermost unclosed bracket
//! (`'(' was never closed`). Every other error uses the parser's own offset.

use std::thread;

use rustpython_parser::{parse, Mode};

use crate::types::ValidationResult;

/// Filename reported by the parser for in-memory sources.
const SOURCE_PATH: &str = "<string>";

/// Deepest bracket nesting accepted.
pub const MAX_NESTING: usize = 200;

const PARSE_STACK_MIN: usize = 8 * 1024 * 1024;
const PARSE_STACK_MAX: usize = 256 * 1024 * 1024;
const PARSE_STACK_PER_SOURCE_BYTE: usize = 128;

/// Location and description of a rejected source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyntaxDiagnostic {
    /// 1-based line number, or 0 if no position is known.
    pub line: usize,
    pub message: String,
}

/// Outcome of the bracket pre-scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BracketScan {
    Balanced,
    /// Innermost bracket still open at end of input.
    Unclosed { bracket: char, line: usize },
    /// Opening bracket number `MAX_NESTING + 1`.
    TooDeep { line: usize },
    /// Unterminated string or mismatched closer; the parser reports it.
    Undetermined,
}

/// Parse `source` in `mode` and discard the tree.
pub(crate) fn check_syntax(source: &str, mode: Mode) -> Result<(), SyntaxDiagnostic> {
    let brackets = scan_brackets(source);
    if let BracketScan::TooDeep { line } = brackets {
        return Err(SyntaxDiagnostic {
            line,
            message: "too many nested parentheses".to_string(),
        });
    }

    let stack_size = source
        .len()
        .saturating_mul(PARSE_STACK_PER_SOURCE_BYTE)
        .saturating_add(PARSE_STACK_MIN)
        .min(PARSE_STACK_MAX);

    thread::scope(|scope| {
        let worker = thread::Builder::new()
            .name("mockloop-parse".to_string())
            .stack_size(stack_size)
            .spawn_scoped(scope, || parse_in_place(source, mode, brackets));
        match worker {
            Ok(handle) => handle.join().unwrap_or_else(|_| {
                log::error!("parser thread panicked");
                Err(SyntaxDiagnostic {
                    line: 0,
                    message: "parser failure".to_string(),
                })
            }),
            Err(e) => {
                log::warn!("failed to start parser thread: {e}");
                Err(SyntaxDiagnostic {
                    line: 0,
                    message: format!("parser unavailable: {e}"),
                })
            }
        }
    })
}

// The syntax tree is dropped here, on the parser thread's stack.
fn parse_in_place(source: &str, mode: Mode, brackets: BracketScan) -> Result<(), SyntaxDiagnostic> {
    let err = match parse(source, mode, SOURCE_PATH) {
        Ok(_) => return Ok(()),
        Err(err) => err,
    };

    let offset = (u32::from(err.offset) as usize).min(source.len());
    if let BracketScan::Unclosed { bracket, line } = brackets {
        if offset >= source.trim_end().len() {
            return Err(SyntaxDiagnostic {
                line,
                message: format!("'{bracket}' was never closed"),
            });
        }
    }
    Err(SyntaxDiagnostic {
        line: line_at(source, offset),
        message: err.error.to_string(),
    })
}

fn line_at(source: &str, offset: usize) -> usize {
    source.as_bytes()[..offset]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// Track bracket nesting outside comments and string literals.
///
/// Works on bytes: every byte it matches is ASCII and never part of a
/// multi-byte UTF-8 sequence.
fn scan_brackets(source: &str) -> BracketScan {
    let bytes = source.as_bytes();
    let mut open: Vec<(u8, usize)> = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => line += 1,
            b'#' => {
                while i + 1 < bytes.len() && bytes[i + 1] != b'\n' {
                    i += 1;
                }
            }
            quote @ (b'\'' | b'"') => match skip_string(bytes, i, quote, &mut line) {
                Some(end) => {
                    i = end;
                    continue;
                }
                None => return BracketScan::Undetermined,
            },
            opener @ (b'(' | b'[' | b'{') => {
                if open.len() == MAX_NESTING {
                    return BracketScan::TooDeep { line };
                }
                open.push((opener, line));
            }
            closer @ (b')' | b']' | b'}') => match open.pop() {
                Some((opener, _)) if closer_for(opener) == closer => {}
                _ => return BracketScan::Undetermined,
            },
            _ => {}
        }
        i += 1;
    }

    match open.pop() {
        Some((opener, line)) => BracketScan::Unclosed {
            bracket: opener as char,
            line,
        },
        None => BracketScan::Balanced,
    }
}

/// Index just past the string literal opening at `start`, or `None` when the
/// literal is never terminated.
fn skip_string(bytes: &[u8], start: usize, quote: u8, line: &mut usize) -> Option<usize> {
    let triple = bytes.get(start + 1) == Some(&quote) && bytes.get(start + 2) == Some(&quote);
    let mut i = start + if triple { 3 } else { 1 };

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                if bytes.get(i + 1) == Some(&b'\n') {
                    *line += 1;
                }
                i += 2;
                continue;
            }
            b'\n' => {
                if !triple {
                    return None;
                }
                *line += 1;
            }
            b if b == quote => {
                if !triple {
                    return Some(i + 1);
                }
                if bytes.get(i + 1) == Some(&quote) && bytes.get(i + 2) == Some(&quote) {
                    return Some(i + 3);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn closer_for(opener: u8) -> u8 {
    match opener {
        b'(' => b')',
        b'[' => b']',
        _ => b'}',
    }
}

/// Report whether `source` is a well-formed Python module.
///
/// On failure the message is `"Syntax error on line N: <parser message>"`.
///
/// # Examples
/// ```
/// use mockloop_exec::validate;
/// assert!(validate("print(1 + 1)").is_valid);
/// assert!(!validate("def f(:").is_valid);
/// ```
pub fn validate(source: &str) -> ValidationResult {
    match check_syntax(source, Mode::Module) {
        Ok(()) => ValidationResult::valid(),
        Err(diagnostic) => ValidationResult::invalid(format!(
            "Syntax error on line {}: {}",
            diagnostic.line, diagnostic.message
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested(depth: usize) -> String {
        format!("x = {}1{}", "[".repeat(depth), "]".repeat(depth))
    }

    #[test]
    fn test_valid_source_has_empty_message() {
        let result = validate("def add(a, b):\n    return a + b\n\nprint(add(2, 3))\n");
        assert!(result.is_valid);
        assert_eq!(result.error_message, "");
    }

    #[test]
    fn test_empty_source_is_valid() {
        assert!(validate("").is_valid);
    }

    #[test]
    fn test_broken_signature_reports_line_one() {
        let result = validate("def f(:");
        assert!(!result.is_valid);
        assert!(
            result.error_message.starts_with("Syntax error on line 1: "),
            "unexpected message: {}",
            result.error_message
        );
        assert!(result.error_message.len() > "Syntax error on line 1: ".len());
    }

    #[test]
    fn test_error_on_second_line_reports_line_two() {
        let result = validate("x = 1\ndef g(:\n    pass\n");
        assert!(!result.is_valid);
        assert!(
            result.error_message.starts_with("Syntax error on line 2: "),
            "unexpected message: {}",
            result.error_message
        );
    }

    #[test]
    fn test_validate_is_idempotent() {
        let first = validate("def f(:");
        let second = validate("def f(:");
        assert_eq!(first, second);
    }

    #[test]
    fn test_validate_never_runs_code() {
        // A runtime error is not a syntax error.
        assert!(validate("x = 1/0").is_valid);
        assert!(validate("while True: pass").is_valid);
    }

    #[test]
    fn test_check_syntax_distinguishes_modes() {
        assert!(check_syntax("add(2, 3)", Mode::Expression).is_ok());
        assert!(check_syntax("x = 5", Mode::Expression).is_err());
        assert!(check_syntax("x = 5", Mode::Module).is_ok());
    }

    #[test]
    fn test_match_statement_is_valid() {
        let result = validate("match x:\n    case 1:\n        pass\n    case _:\n        pass\n");
        assert!(result.is_valid, "{}", result.error_message);
    }

    #[test]
    fn test_except_star_is_valid() {
        let result = validate("try:\n    pass\nexcept* ValueError:\n    pass\n");
        assert!(result.is_valid, "{}", result.error_message);
    }

    #[test]
    fn test_nesting_at_limit_is_valid() {
        assert!(validate(&nested(MAX_NESTING)).is_valid);
    }

    #[test]
    fn test_nesting_past_limit_is_rejected() {
        let result = validate(&nested(MAX_NESTING + 1));
        assert!(!result.is_valid);
        assert_eq!(
            result.error_message,
            "Syntax error on line 1: too many nested parentheses"
        );
    }

    #[test]
    fn test_very_deep_nesting_is_rejected_without_parsing() {
        let result = validate(&nested(100_000));
        assert!(!result.is_valid);
        assert!(result.error_message.ends_with("too many nested parentheses"));
    }

    #[test]
    fn test_too_deep_reports_line_of_offending_bracket() {
        let source = format!("a = 1\nb = 2\nc = {}", "(".repeat(MAX_NESTING + 1));
        let result = validate(&source);
        assert_eq!(
            result.error_message,
            "Syntax error on line 3: too many nested parentheses"
        );
    }

    #[test]
    fn test_brackets_inside_strings_and_comments_are_ignored() {
        let deep = "[".repeat(MAX_NESTING + 50);
        let source = format!(
            "a = '{deep}'\nb = \"{deep}\"\nc = '''\n{deep}\n'''\n# {deep}\nprint(a, b, c)\n"
        );
        let result = validate(&source);
        assert!(result.is_valid, "{}", result.error_message);
    }

    #[test]
    fn test_unclosed_bracket_reports_opening_line() {
        let result = validate("x = (1,\n2,\n");
        assert_eq!(
            result.error_message,
            "Syntax error on line 1: '(' was never closed"
        );
    }

    #[test]
    fn test_unclosed_inner_bracket_is_reported() {
        let result = validate("total = sum(\n    [1,\n     2,\n");
        assert_eq!(
            result.error_message,
            "Syntax error on line 2: '[' was never closed"
        );
    }

    #[test]
    fn test_scan_brackets() {
        assert_eq!(scan_brackets("f(a[1], {2: 3})"), BracketScan::Balanced);
        assert_eq!(
            scan_brackets("f(\n  a["),
            BracketScan::Unclosed {
                bracket: '[',
                line: 2
            }
        );
        assert_eq!(scan_brackets("f(]"), BracketScan::Undetermined);
        assert_eq!(scan_brackets("s = 'open"), BracketScan::Undetermined);
        assert_eq!(scan_brackets(r#"s = 'it\'s (' "#), BracketScan::Balanced);
        assert_eq!(scan_brackets("s = ''\nt = (1"), BracketScan::Unclosed {
            bracket: '(',
            line: 2
        });
    }
}
