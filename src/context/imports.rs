//! Import extraction and best-effort resolution to repository paths.

use std::collections::HashSet;
use std::sync::LazyLock;

use indexmap::IndexSet;
use regex::Regex;

use crate::models::language::Language;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?m){p}")).expect("valid import regex"))
        .collect()
}

static PYTHON: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r"^import\s+([\w.]+)", r"^from\s+([\w.]+)\s+import"]));
static ECMASCRIPT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#"import\s+.*?\s+from\s+['"]([^'"]+)['"]"#,
        r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#,
    ])
});
static JAVA: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(&[r"^import\s+([\w.]+);"]));
static GO: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r#"import\s+"([^"]+)""#, r#"import\s+\(\s*"([^"]+)""#]));
static RUBY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[r#"require\s+['"]([^'"]+)['"]"#, r#"load\s+['"]([^'"]+)['"]"#])
});
static RUBY_RELATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"require_relative\s+['"]([^'"]+)['"]"#).expect("valid regex"));
static DIFF_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^diff --git a/.+ b/(.+)$").expect("valid regex"));

fn patterns(language: Language) -> &'static [Regex] {
    match language {
        Language::Python => &PYTHON,
        Language::JavaScript | Language::TypeScript => &ECMASCRIPT,
        Language::Java => &JAVA,
        Language::Go => &GO,
        Language::Ruby => &RUBY,
        _ => &[],
    }
}

/// Import targets named in `content`, in first-seen order without duplicates.
pub fn extract_imports(content: &str, language: Language) -> Vec<String> {
    let mut found: IndexSet<String> = IndexSet::new();
    for re in patterns(language) {
        for caps in re.captures_iter(content) {
            if let Some(m) = caps.get(1) {
                found.insert(m.as_str().to_string());
            }
        }
    }
    // Relative requires are marked so resolution anchors them at the source file.
    if language == Language::Ruby {
        for caps in RUBY_RELATIVE.captures_iter(content) {
            if let Some(m) = caps.get(1) {
                found.insert(format!("./{}", m.as_str()));
            }
        }
    }
    found.into_iter().collect()
}

/// Imports on added (`+`) lines of a diff, paired with the file they were added to.
pub fn added_imports(diff: &str) -> Vec<(String, String)> {
    let mut current: Option<(String, Language)> = None;
    let mut found: IndexSet<(String, String)> = IndexSet::new();

    for line in diff.lines() {
        let new_file = DIFF_FILE_RE
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .or_else(|| line.strip_prefix("+++ b/").map(str::to_string));
        if let Some(path) = new_file {
            current = Language::from_path(&path).map(|lang| (path, lang));
            continue;
        }
        // File headers only; `+++i;` is an added `++i;`.
        if line.starts_with("+++ ") {
            continue;
        }
        let (Some(added), Some((path, lang))) = (line.strip_prefix('+'), current.as_ref()) else {
            continue;
        };
        for import in extract_imports(added.trim_start(), *lang) {
            found.insert((path.clone(), import));
        }
    }
    found.into_iter().collect()
}

/// Resolve an import to a path present in `repo_files`. Unresolvable imports yield `None`.
pub fn resolve_import(
    import: &str,
    source_file: &str,
    language: Language,
    repo_files: &HashSet<String>,
) -> Option<String> {
    candidates(import, source_file, language)
        .into_iter()
        .filter_map(|c| normalize(&c))
        .find(|c| repo_files.contains(c))
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn candidates(import: &str, source_file: &str, language: Language) -> Vec<String> {
    let dir = parent_dir(source_file);
    match language {
        Language::Python => {
            let dots = import.chars().take_while(|&c| c == '.').count();
            let module = import[dots..].replace('.', "/");
            if dots > 0 {
                let mut base = dir.to_string();
                for _ in 1..dots {
                    base.push_str("/..");
                }
                vec![
                    format!("{base}/{module}.py"),
                    format!("{base}/{module}/__init__.py"),
                ]
            } else {
                vec![
                    format!("{module}.py"),
                    format!("{module}/__init__.py"),
                    format!("{dir}/{module}.py"),
                ]
            }
        }
        Language::JavaScript | Language::TypeScript => {
            let base = if import.starts_with('.') {
                format!("{dir}/{import}")
            } else {
                format!("src/{import}")
            };
            let mut out = vec![base.clone()];
            for ext in [".js", ".ts", ".tsx", ".jsx", "/index.js", "/index.ts"] {
                out.push(format!("{base}{ext}"));
            }
            out
        }
        Language::Java => {
            let path = import.replace('.', "/");
            vec![format!("{path}.java"), format!("src/main/java/{path}.java")]
        }
        Language::Go => vec![format!("{import}.go")],
        Language::Ruby => match import.strip_prefix("./") {
            Some(rel) => vec![format!("{dir}/{rel}.rb"), format!("{dir}/{rel}")],
            None => vec![format!("lib/{import}.rb"), format!("{import}.rb")],
        },
        _ => Vec::new(),
    }
}

/// Collapse `.`/`..`/empty segments. Paths escaping the root yield `None`.
fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    (!parts.is_empty()).then(|| parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(paths: &[&str]) -> HashSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn python_imports() {
        let src = "import os\nfrom app.models import User\n  import indented\nfrom .utils import x\n";
        assert_eq!(
            extract_imports(src, Language::Python),
            ["os", "app.models", ".utils"]
        );
    }

    #[test]
    fn ecmascript_imports() {
        let src = "import React from 'react';\nimport { api } from \"./api\";\nconst fs = require('fs');\n";
        assert_eq!(
            extract_imports(src, Language::TypeScript),
            ["react", "./api", "fs"]
        );
    }

    #[test]
    fn go_and_java_imports() {
        assert_eq!(
            extract_imports("import \"fmt\"\nimport (\n\t\"net/http\"\n)", Language::Go),
            ["fmt", "net/http"]
        );
        assert_eq!(
            extract_imports("import com.acme.Widget;\n", Language::Java),
            ["com.acme.Widget"]
        );
    }

    #[test]
    fn ruby_relative_requires_are_marked() {
        let src = "require 'json'\nrequire_relative 'helpers'\n";
        assert_eq!(extract_imports(src, Language::Ruby), ["json", "./helpers"]);
    }

    #[test]
    fn unsupported_language_has_no_imports() {
        assert!(extract_imports("use std::io;", Language::Rust).is_empty());
    }

    #[test]
    fn resolve_python_module_and_package() {
        let files = repo(&["app/models.py", "app/services/__init__.py", "app/utils.py"]);
        assert_eq!(
            resolve_import("app.models", "app/views.py", Language::Python, &files).as_deref(),
            Some("app/models.py")
        );
        assert_eq!(
            resolve_import("app.services", "app/views.py", Language::Python, &files).as_deref(),
            Some("app/services/__init__.py")
        );
        assert_eq!(
            resolve_import(".utils", "app/views.py", Language::Python, &files).as_deref(),
            Some("app/utils.py")
        );
        assert_eq!(resolve_import("os", "app/views.py", Language::Python, &files), None);
    }

    #[test]
    fn resolve_relative_ecmascript() {
        let files = repo(&["web/components/Button.tsx", "web/lib/index.ts", "src/store.ts"]);
        assert_eq!(
            resolve_import("./components/Button", "web/App.tsx", Language::TypeScript, &files)
                .as_deref(),
            Some("web/components/Button.tsx")
        );
        assert_eq!(
            resolve_import("../lib", "web/components/Button.tsx", Language::TypeScript, &files)
                .as_deref(),
            Some("web/lib/index.ts")
        );
        assert_eq!(
            resolve_import("store", "web/App.tsx", Language::TypeScript, &files).as_deref(),
            Some("src/store.ts")
        );
        assert_eq!(resolve_import("react", "web/App.tsx", Language::TypeScript, &files), None);
    }

    #[test]
    fn resolve_java_and_ruby() {
        let files = repo(&["src/main/java/com/acme/Widget.java", "lib/helpers.rb"]);
        assert_eq!(
            resolve_import("com.acme.Widget", "x/Main.java", Language::Java, &files).as_deref(),
            Some("src/main/java/com/acme/Widget.java")
        );
        assert_eq!(
            resolve_import("./helpers", "lib/app.rb", Language::Ruby, &files).as_deref(),
            Some("lib/helpers.rb")
        );
    }

    #[test]
    fn escaping_paths_do_not_resolve() {
        let files = repo(&["secret.ts"]);
        assert_eq!(resolve_import("../../secret", "a.ts", Language::TypeScript, &files), None);
    }

    #[test]
    fn added_imports_only_from_plus_lines() {
        let diff = "diff --git a/app/views.py b/app/views.py
--- a/app/views.py
+++ b/app/views.py
@@ -1,2 +1,3 @@
-import legacy
+from app.models import User
 import os
diff --git a/web/App.tsx b/web/App.tsx
--- a/web/App.tsx
+++ b/web/App.tsx
@@ -1 +1,2 @@
+import { Button } from './components/Button';
";
        let found = added_imports(diff);
        assert_eq!(
            found,
            vec![
                ("app/views.py".to_string(), "app.models".to_string()),
                ("web/App.tsx".to_string(), "./components/Button".to_string()),
            ]
        );
    }

    #[test]
    fn added_lines_starting_with_increment_are_scanned() {
        let diff = "diff --git a/web/counter.js b/web/counter.js
--- a/web/counter.js
+++ b/web/counter.js
@@ -1 +1,3 @@
+++loads; const api = require('./api');
+--retries;
 export default api;
diff --git a/old.js b/old.js
deleted file mode 100644
--- a/old.js
+++ /dev/null
@@ -1 +0,0 @@
-const x = require('./x');
";
        assert_eq!(
            added_imports(diff),
            vec![("web/counter.js".to_string(), "./api".to_string())]
        );
    }
}
