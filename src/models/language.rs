//! Source language detection by file extension.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A language tag attached to fetched files.
///
/// The lowercase display form doubles as the markdown code-fence tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Go,
    Rust,
    Ruby,
    Php,
    C,
    Cpp,
    CSharp,
    Swift,
    Kotlin,
    Scala,
    R,
    Sql,
    Bash,
    Yaml,
    Json,
    Xml,
    Html,
    Css,
    Scss,
    Markdown,
}

impl Language {
    /// Detect the language of `path` from its extension.
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = extension(path)?;
        let lang = match ext.as_str() {
            "py" => Language::Python,
            "js" | "jsx" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "java" => Language::Java,
            "go" => Language::Go,
            "rs" => Language::Rust,
            "rb" => Language::Ruby,
            "php" => Language::Php,
            "c" | "h" => Language::C,
            "cpp" | "hpp" => Language::Cpp,
            "cs" => Language::CSharp,
            "swift" => Language::Swift,
            "kt" => Language::Kotlin,
            "scala" => Language::Scala,
            "r" => Language::R,
            "sql" => Language::Sql,
            "sh" => Language::Bash,
            "yml" | "yaml" => Language::Yaml,
            "json" => Language::Json,
            "xml" => Language::Xml,
            "html" => Language::Html,
            "css" => Language::Css,
            "scss" => Language::Scss,
            "md" => Language::Markdown,
            _ => return None,
        };
        Some(lang)
    }

    /// Whether the static analyzer has rules worth running for this language.
    pub fn is_analyzable(self) -> bool {
        matches!(
            self,
            Language::Python
                | Language::JavaScript
                | Language::TypeScript
                | Language::Java
                | Language::Go
                | Language::Rust
                | Language::Ruby
                | Language::Php
                | Language::C
                | Language::Cpp
                | Language::CSharp
                | Language::Swift
                | Language::Kotlin
        )
    }
}

/// Lowercased extension of `path` without the dot.
pub fn extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
