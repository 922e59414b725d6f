//! Structured error extraction from Python tracebacks.
//!
//! Two independent scans over captured stderr: the exception type comes from
//! the last line shaped like `NameError: ...`, the failing line number from
//! the first `File "...", line N` frame. Either can be absent; this parser
//! never fails.

use std::sync::OnceLock;

use regex::Regex;

fn error_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Z][a-zA-Z]*Error):").expect("error type pattern"))
}

fn error_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"File ".*", line (\d+)"#).expect("error line pattern"))
}

/// Extract `(error_type, error_line)` from stderr of a failed script.
/// Missing pieces come back as an empty string and 0 respectively.
pub fn parse_stderr(stderr: &str) -> (String, u32) {
    let lines: Vec<&str> = stderr.lines().collect();

    let mut error_type = String::new();
    for line in lines.iter().rev() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(captures) = error_type_re().captures(line) {
            error_type = captures[1].to_string();
            break;
        }
    }

    let mut error_line = 0;
    for line in &lines {
        if let Some(captures) = error_line_re().captures(line) {
            if let Ok(n) = captures[1].parse() {
                error_line = n;
                break;
            }
        }
    }

    (error_type, error_line)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME_ERROR: &str = concat!(
        "Traceback (most recent call last):\n",
        "  File \"main.py\", line 1, in <module>\n",
        "    print(undefined_var)\n",
        "NameError: name 'undefined_var' is not defined\n",
    );

    #[test]
    fn parses_type_and_line() {
        let (error_type, error_line) = parse_stderr(NAME_ERROR);
        assert_eq!(error_type, "NameError");
        assert_eq!(error_line, 1);
    }

    #[test]
    fn takes_first_frame_line_and_last_error_type() {
        let stderr = concat!(
            "Traceback (most recent call last):\n",
            "  File \"main.py\", line 3, in <module>\n",
            "  File \"helper.py\", line 7, in greet\n",
            "ZeroDivisionError: division by zero\n",
        );
        let (error_type, error_line) = parse_stderr(stderr);
        assert_eq!(error_type, "ZeroDivisionError");
        assert_eq!(error_line, 3);
    }

    #[test]
    fn type_without_frame() {
        let (error_type, error_line) = parse_stderr("MemoryError: out of memory\n");
        assert_eq!(error_type, "MemoryError");
        assert_eq!(error_line, 0);
    }

    #[test]
    fn noise_yields_nothing() {
        let (error_type, error_line) = parse_stderr("warning: something unrelated\n");
        assert_eq!(error_type, "");
        assert_eq!(error_line, 0);
    }

    #[test]
    fn non_error_suffix_is_ignored() {
        // "Exception" and bare words do not match the Error-suffix shape.
        let (error_type, _) = parse_stderr("KeyboardInterrupt\n");
        assert_eq!(error_type, "");
    }
}
