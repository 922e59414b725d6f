//! Static detection of third-party Python dependencies.
//!
//! Submitted source is scanned lexically - string literals and comments are
//! stripped first so the word `import` inside them never matches. Detected
//! top-level modules are filtered against the embedded standard-library set
//! and mapped to their pip package names. Scanning never fails; unparseable
//! input simply detects nothing.

mod mapping;
mod stdlib;

pub use mapping::package_name;
pub use stdlib::is_stdlib;

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

fn import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*import[ \t]+([^\n#]+)").expect("import pattern"))
}

fn from_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*from[ \t]+(\S+)[ \t]+import\b").expect("from pattern"))
}

fn string_literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)'''.*?'''|""".*?"""|'[^'\n]*'|"[^"\n]*""#).expect("string pattern")
    })
}

fn comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)#.*$").expect("comment pattern"))
}

/// Top-level modules imported by `code`, deduplicated, in no particular order.
pub fn parse_imports(code: &str) -> Vec<String> {
    let cleaned = string_literal_re().replace_all(code, "");
    let cleaned = comment_re().replace_all(&cleaned, "");

    let mut modules = HashSet::new();

    for captures in import_re().captures_iter(&cleaned) {
        if let Some(list) = captures.get(1) {
            // "import a, b as c" names several modules on one line.
            for part in list.as_str().split(',') {
                let mut name = part.trim();
                if let Some(idx) = name.find(" as ") {
                    name = name[..idx].trim();
                }
                if is_valid_module_name(name) {
                    modules.insert(top_level(name).to_string());
                }
            }
        }
    }

    for captures in from_import_re().captures_iter(&cleaned) {
        if let Some(module) = captures.get(1) {
            let name = module.as_str().trim();
            if is_valid_module_name(name) {
                modules.insert(top_level(name).to_string());
            }
        }
    }

    modules.into_iter().collect()
}

fn top_level(module: &str) -> &str {
    match module.find('.') {
        Some(idx) if idx > 0 => &module[..idx],
        _ => module,
    }
}

fn is_valid_module_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Scan `code` and produce requirements.txt content for every third-party
/// package it imports: unique pip names, one per line, sorted. Empty string
/// when nothing is detected.
pub fn detect_requirements(code: &str) -> String {
    let mut packages: Vec<String> = parse_imports(code)
        .into_iter()
        .filter(|module| !is_stdlib(module))
        .map(|module| package_name(&module).to_string())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    packages.sort();
    packages.join("\n")
}

/// Merge detected requirements under user-provided ones. User lines appear
/// first and verbatim; a detected package is appended only when no user line
/// names the same package (compared by bare lowercased name, version pins
/// and extras stripped).
pub fn merge_requirements(detected: &str, user_provided: &str) -> String {
    if user_provided.is_empty() {
        return detected.to_string();
    }
    if detected.is_empty() {
        return user_provided.to_string();
    }

    let user_packages: HashSet<String> = user_provided
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| bare_package_name(line).to_lowercase())
        .collect();

    let mut merged = user_provided.to_string();
    for line in detected.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !user_packages.contains(&bare_package_name(line).to_lowercase()) {
            merged.push('\n');
            merged.push_str(line);
        }
    }
    merged
}

/// Package name before any version specifier, extras bracket or marker.
fn bare_package_name(line: &str) -> &str {
    match line.find(|c| matches!(c, '=' | '>' | '<' | '!' | '[' | ';')) {
        Some(idx) => line[..idx].trim(),
        None => line.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_plain_and_aliased_imports() {
        let detected = detect_requirements("import numpy as np\nimport requests, httpx\n");
        assert_eq!(detected, "httpx\nnumpy\nrequests");
    }

    #[test]
    fn detects_from_imports_top_level_only() {
        let detected = detect_requirements("from sklearn.model_selection import train_test_split\n");
        assert_eq!(detected, "scikit-learn");
    }

    #[test]
    fn maps_import_names_to_package_names() {
        let detected = detect_requirements("import PIL\nimport cv2\nimport yaml\n");
        assert_eq!(detected, "Pillow\nPyYAML\nopencv-python");
    }

    #[test]
    fn filters_standard_library() {
        let detected = detect_requirements("import os\nimport sys, json\nfrom pathlib import Path\n");
        assert_eq!(detected, "");
    }

    #[test]
    fn ignores_imports_in_strings_and_comments() {
        let code = concat!(
            "# import fake_comment\n",
            "doc = '''\nimport fake_docstring\n'''\n",
            "msg = 'import fake_inline'\n",
            "import requests\n",
        );
        assert_eq!(detect_requirements(code), "requests");
    }

    #[test]
    fn indented_imports_are_found() {
        let code = "def load():\n    import pandas\n    return pandas\n";
        assert_eq!(detect_requirements(code), "pandas");
    }

    #[test]
    fn detection_is_sorted_unique_and_non_stdlib() {
        let code = "import requests\nimport requests\nimport numpy\nimport os\n";
        let detected = detect_requirements(code);
        assert_eq!(detected, "numpy\nrequests");
        // Merging with empty user input is the identity.
        assert_eq!(merge_requirements(&detected, ""), detected);
    }

    #[test]
    fn merge_keeps_user_lines_verbatim_and_first() {
        let merged = merge_requirements("PyYAML\nnumpy", "numpy==1.24.0");
        assert_eq!(merged, "numpy==1.24.0\nPyYAML");
        assert_eq!(merged.matches("numpy").count(), 1);
    }

    #[test]
    fn merge_compares_names_case_insensitively() {
        let merged = merge_requirements("PyYAML", "pyyaml>=6.0");
        assert_eq!(merged, "pyyaml>=6.0");
    }

    #[test]
    fn merge_strips_extras_and_markers_when_comparing() {
        let merged = merge_requirements("requests\nuvicorn", "requests[socks]; python_version > '3'");
        assert_eq!(merged, "requests[socks]; python_version > '3'\nuvicorn");
    }

    #[test]
    fn bare_name_extraction() {
        assert_eq!(bare_package_name("requests>=2.28.0"), "requests");
        assert_eq!(bare_package_name("uvicorn[standard]"), "uvicorn");
        assert_eq!(bare_package_name("plain"), "plain");
    }
}
