//! In-container command construction.
//!
//! The sandbox runs a single `sh -c` string assembled from caller input, so
//! everything user-controlled passes through `shell_quote` before it touches
//! the shell. Pre-commands are the deliberate exception: they are a
//! privileged capability and run verbatim.

use crate::types::Metadata;

/// Prefix of the stdout line carrying the captured final-expression value.
pub const RESULT_MARKER: &str = "__PYEXEC_RESULT__:";

/// Where the expression-capturing wrapper is materialized inside the sandbox.
pub const EVAL_WRAPPER_PATH: &str = "/tmp/pyexec_eval.py";

/// Python wrapper that runs an entrypoint and, when the final top-level
/// statement is an expression, prints its `repr()` behind `RESULT_MARKER`.
pub const EVAL_WRAPPER_CODE: &str = r#"import ast
import sys

path = sys.argv[1]
sys.argv = sys.argv[1:]
with open(path) as fh:
    source = fh.read()
tree = ast.parse(source, path)
namespace = {"__name__": "__main__", "__file__": path}
if tree.body and isinstance(tree.body[-1], ast.Expr):
    last = tree.body.pop()
    exec(compile(tree, path, "exec"), namespace)
    value = eval(compile(ast.Expression(last.value), path, "eval"), namespace)
    print("__PYEXEC_RESULT__:" + repr(value))
else:
    exec(compile(tree, path, "exec"), namespace)
"#;

/// Quote `s` for safe interpolation into a POSIX shell command line.
pub fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | '@' | '%' | ',' | '+')
        });
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

/// Assemble the shell command the sandbox runs: pre-commands, then the
/// optional dependency install, then the interpreter invocation. Parts are
/// joined with ` && ` so any failing step aborts the job.
pub fn build_command(metadata: &Metadata) -> String {
    let mut parts: Vec<String> = Vec::new();

    for pre in &metadata.pre_commands {
        parts.push(pre.clone());
    }

    if !metadata.requirements.is_empty() {
        parts.push(format!(
            "printf '%s\\n' {} > /work/requirements.txt",
            shell_quote(&metadata.requirements)
        ));
        parts.push("pip install --no-cache-dir -r /work/requirements.txt".to_string());
    }

    let entrypoint = shell_quote(&format!("/work/{}", metadata.entrypoint));
    let mut python = if metadata.eval_last_expr {
        parts.push(format!(
            "printf '%s' {} > {}",
            shell_quote(EVAL_WRAPPER_CODE),
            EVAL_WRAPPER_PATH
        ));
        format!("python {EVAL_WRAPPER_PATH} {entrypoint}")
    } else {
        format!("python {entrypoint}")
    };
    for arg in &metadata.script_args {
        python.push(' ');
        python.push_str(&shell_quote(arg));
    }
    parts.push(python);

    parts.join(" && ")
}

/// Pull the marker line out of captured stdout. Returns the stdout with the
/// marker line removed and, when present, the captured `repr()` text.
pub fn split_result(stdout: &str) -> (String, Option<String>) {
    if !stdout.contains(RESULT_MARKER) {
        return (stdout.to_string(), None);
    }

    let mut result = None;
    let mut kept = Vec::new();
    for line in stdout.lines() {
        match line.strip_prefix(RESULT_MARKER) {
            Some(rest) => result = Some(rest.to_string()),
            None => kept.push(line),
        }
    }
    let mut cleaned = kept.join("\n");
    if stdout.ends_with('\n') && !cleaned.is_empty() {
        cleaned.push('\n');
    }
    (cleaned, result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(entrypoint: &str) -> Metadata {
        Metadata {
            entrypoint: entrypoint.to_string(),
            ..Metadata::default()
        }
    }

    #[test]
    fn quotes_spaces_dollars_and_quotes() {
        assert_eq!(shell_quote("plain-arg.py"), "plain-arg.py");
        assert_eq!(shell_quote("has space"), "'has space'");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
        assert_eq!(shell_quote("it's"), r#"'it'\''s'"#);
        assert_eq!(shell_quote("a\nb"), "'a\nb'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn plain_command() {
        let cmd = build_command(&meta("main.py"));
        assert_eq!(cmd, "python /work/main.py");
    }

    #[test]
    fn script_args_are_quoted() {
        let mut m = meta("main.py");
        m.script_args = vec!["--name".to_string(), "two words".to_string(), "$X".to_string()];
        let cmd = build_command(&m);
        assert_eq!(cmd, "python /work/main.py --name 'two words' '$X'");
    }

    #[test]
    fn pre_commands_run_first_and_verbatim() {
        let mut m = meta("main.py");
        m.pre_commands = vec!["apt-get update".to_string(), "echo $READY".to_string()];
        let cmd = build_command(&m);
        assert_eq!(
            cmd,
            "apt-get update && echo $READY && python /work/main.py"
        );
    }

    #[test]
    fn requirements_install_before_python() {
        let mut m = meta("main.py");
        m.requirements = "numpy\nrequests".to_string();
        let cmd = build_command(&m);
        let write = cmd.find("requirements.txt").unwrap();
        let install = cmd.find("pip install --no-cache-dir").unwrap();
        let python = cmd.find("python /work/main.py").unwrap();
        assert!(write < install && install < python);
    }

    #[test]
    fn requirements_with_single_quotes_stay_quoted() {
        let mut m = meta("main.py");
        m.requirements = "pkg; extra == 'fast'".to_string();
        let cmd = build_command(&m);
        assert!(cmd.contains(r#"'pkg; extra == '\''fast'\'''"#));
    }

    #[test]
    fn entrypoint_with_spaces_is_quoted() {
        let cmd = build_command(&meta("my script.py"));
        assert!(cmd.contains("python '/work/my script.py'"));
    }

    #[test]
    fn eval_wrapper_runs_entrypoint_through_wrapper() {
        let mut m = meta("main.py");
        m.eval_last_expr = true;
        let cmd = build_command(&m);
        assert!(cmd.contains(EVAL_WRAPPER_PATH));
        let wrapper = cmd.rfind(&format!("python {EVAL_WRAPPER_PATH}")).unwrap();
        let entry = cmd.rfind("/work/main.py").unwrap();
        assert!(wrapper < entry);
    }

    #[test]
    fn no_wrapper_without_eval_flag() {
        let cmd = build_command(&meta("main.py"));
        assert!(!cmd.contains(EVAL_WRAPPER_PATH));
    }

    #[test]
    fn wrapper_code_parses_and_marks_results() {
        assert!(EVAL_WRAPPER_CODE.contains("import ast"));
        assert!(EVAL_WRAPPER_CODE.contains("ast.parse"));
        assert!(EVAL_WRAPPER_CODE.contains("ast.Expr"));
        assert!(EVAL_WRAPPER_CODE.contains(RESULT_MARKER));
    }

    #[test]
    fn split_result_extracts_and_strips_marker() {
        let stdout = format!("hello\n{RESULT_MARKER}42\n");
        let (cleaned, result) = split_result(&stdout);
        assert_eq!(cleaned, "hello\n");
        assert_eq!(result.as_deref(), Some("42"));
    }

    #[test]
    fn split_result_without_marker_is_identity() {
        let (cleaned, result) = split_result("hello world\n");
        assert_eq!(cleaned, "hello world\n");
        assert!(result.is_none());
    }

    #[test]
    fn split_result_marker_only() {
        let (cleaned, result) = split_result(&format!("{RESULT_MARKER}'text'\n"));
        assert_eq!(cleaned, "");
        assert_eq!(result.as_deref(), Some("'text'"));
    }
}
