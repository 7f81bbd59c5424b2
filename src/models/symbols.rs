//! Symbol-table types produced by symbol extraction.

use serde::{Deserialize, Serialize};
use strum::Display;

use super::language::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SymbolKind {
    Class,
    Interface,
    /// Type alias.
    Type,
    Function,
    Method,
    Variable,
    Constant,
}

/// A symbol defined in a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: SymbolKind,
    /// 1-based line of the definition.
    pub line: u32,
    /// Public/exported visibility.
    pub exported: bool,
    /// Enclosing class or receiver type, for methods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub parameters: Vec<String>,
}

/// Symbols extracted from one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileSymbols {
    pub path: String,
    pub language: Option<Language>,
    pub symbols: Vec<SymbolInfo>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl FileSymbols {
    pub fn empty(path: impl Into<String>, language: Option<Language>) -> Self {
        Self {
            path: path.into(),
            language,
            ..Self::default()
        }
    }
}
