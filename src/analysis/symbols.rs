//! Tree-sitter symbol extraction for cross-file validation.

use std::cell::RefCell;

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, warn};
use tree_sitter::{Node, Parser, Tree};

use crate::models::language::{Language, extension};
use crate::models::symbols::{FileSymbols, SymbolInfo, SymbolKind};

/// At most this many files are parsed per review.
pub const MAX_SYMBOL_FILES: usize = 30;
/// Files larger than this are not parsed.
pub const MAX_SYMBOL_FILE_BYTES: usize = 50_000;

const MAX_TYPES_SHOWN: usize = 10;
const MAX_CALLABLES_SHOWN: usize = 20;
const MAX_VALUES_SHOWN: usize = 15;
const MAX_PARAMS_SHOWN: usize = 5;

/// Extracts defined symbols from source text.
pub trait SymbolExtractor: Send + Sync {
    fn is_available(&self) -> bool;

    /// Symbols of one file. Unsupported languages yield an empty result.
    fn extract(&self, path: &str, content: &str) -> FileSymbols;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grammar {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
    Rust,
}

impl Grammar {
    fn for_path(path: &str) -> Option<Self> {
        match Language::from_path(path)? {
            Language::Python => Some(Grammar::Python),
            Language::JavaScript => Some(Grammar::JavaScript),
            Language::TypeScript if extension(path).as_deref() == Some("tsx") => Some(Grammar::Tsx),
            Language::TypeScript => Some(Grammar::TypeScript),
            Language::Go => Some(Grammar::Go),
            Language::Rust => Some(Grammar::Rust),
            _ => None,
        }
    }
}

/// A per-thread parser with the outcome of loading its grammar.
struct GrammarParser {
    parser: Parser,
    setup_error: Option<String>,
}

impl GrammarParser {
    fn new(grammar: Grammar, language: tree_sitter::Language) -> RefCell<Self> {
        let mut parser = Parser::new();
        let setup_error = parser.set_language(&language).err().map(|e| {
            warn!(?grammar, error = %e, "tree-sitter grammar failed to load");
            format!("{grammar:?} grammar unavailable: {e}")
        });
        RefCell::new(Self {
            parser,
            setup_error,
        })
    }

    fn parse(&mut self, content: &str, path: &str) -> Result<Tree, String> {
        if let Some(e) = &self.setup_error {
            return Err(e.clone());
        }
        self.parser
            .parse(content, None)
            .ok_or_else(|| format!("failed to parse {path}"))
    }
}

thread_local! {
    static PYTHON_PARSER: RefCell<GrammarParser> =
        GrammarParser::new(Grammar::Python, tree_sitter_python::LANGUAGE.into());
    static JS_PARSER: RefCell<GrammarParser> =
        GrammarParser::new(Grammar::JavaScript, tree_sitter_javascript::LANGUAGE.into());
    static TS_PARSER: RefCell<GrammarParser> = GrammarParser::new(
        Grammar::TypeScript,
        tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
    );
    static TSX_PARSER: RefCell<GrammarParser> =
        GrammarParser::new(Grammar::Tsx, tree_sitter_typescript::LANGUAGE_TSX.into());
    static GO_PARSER: RefCell<GrammarParser> =
        GrammarParser::new(Grammar::Go, tree_sitter_go::LANGUAGE.into());
    static RUST_PARSER: RefCell<GrammarParser> =
        GrammarParser::new(Grammar::Rust, tree_sitter_rust::LANGUAGE.into());
}

fn with_parser<R>(grammar: Grammar, f: impl FnOnce(&mut GrammarParser) -> R) -> R {
    let pool = match grammar {
        Grammar::Python => &PYTHON_PARSER,
        Grammar::JavaScript => &JS_PARSER,
        Grammar::TypeScript => &TS_PARSER,
        Grammar::Tsx => &TSX_PARSER,
        Grammar::Go => &GO_PARSER,
        Grammar::Rust => &RUST_PARSER,
    };
    pool.with(|p| f(&mut p.borrow_mut()))
}

/// Tree-sitter extractor for Python, JavaScript, TypeScript/TSX, Go and Rust.
///
/// Parsers are kept per thread so rayon workers reuse them across files.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeSitterExtractor;

impl SymbolExtractor for TreeSitterExtractor {
    fn is_available(&self) -> bool {
        true
    }

    fn extract(&self, path: &str, content: &str) -> FileSymbols {
        let mut out = FileSymbols::empty(path, Language::from_path(path));
        let Some(grammar) = Grammar::for_path(path) else {
            return out;
        };
        let tree = match with_parser(grammar, |p| p.parse(content, path)) {
            Ok(tree) => tree,
            Err(e) => {
                out.errors.push(e);
                return out;
            }
        };

        let root = tree.root_node();
        if root.has_error() {
            out.errors.push("syntax errors present".to_string());
        }
        let mut walker = Walker {
            src: content,
            symbols: &mut out.symbols,
        };
        match grammar {
            Grammar::Python => walker.python(root, None),
            Grammar::JavaScript | Grammar::TypeScript | Grammar::Tsx => {
                walker.ecmascript(root, None, false)
            }
            Grammar::Go => walker.go(root),
            Grammar::Rust => walker.rust(root, None),
        }
        out
    }
}

/// Parse up to [`MAX_SYMBOL_FILES`] files in parallel, keeping input order.
pub fn extract_from_files(
    extractor: &dyn SymbolExtractor,
    files: &IndexMap<String, String>,
) -> IndexMap<String, FileSymbols> {
    let selected: Vec<(&String, &String)> = files
        .iter()
        .filter(|(path, content)| {
            let keep = content.len() <= MAX_SYMBOL_FILE_BYTES;
            if !keep {
                debug!(path = %path, size = content.len(), "skipping large file for symbols");
            }
            keep
        })
        .take(MAX_SYMBOL_FILES)
        .collect();

    let extracted: Vec<FileSymbols> = selected
        .par_iter()
        .map(|(path, content)| extractor.extract(path, content))
        .collect();

    extracted.into_iter().map(|s| (s.path.clone(), s)).collect()
}

struct Walker<'a> {
    src: &'a str,
    symbols: &'a mut Vec<SymbolInfo>,
}

fn line_of(node: Node) -> u32 {
    u32::try_from(node.start_position().row + 1).unwrap_or(u32::MAX)
}

fn children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

impl Walker<'_> {
    fn text(&self, node: Node) -> String {
        node.utf8_text(self.src.as_bytes())
            .unwrap_or_default()
            .to_string()
    }

    fn field_text(&self, node: Node, field: &str) -> Option<String> {
        node.child_by_field_name(field).map(|n| self.text(n))
    }

    fn push(&mut self, name: String, kind: SymbolKind, node: Node, exported: bool) {
        self.push_with(name, kind, node, exported, None, Vec::new());
    }

    fn push_with(
        &mut self,
        name: String,
        kind: SymbolKind,
        node: Node,
        exported: bool,
        parent: Option<String>,
        parameters: Vec<String>,
    ) {
        self.symbols.push(SymbolInfo {
            name,
            kind,
            line: line_of(node),
            exported,
            parent,
            parameters,
        });
    }

    fn python(&mut self, node: Node, class: Option<&str>) {
        match node.kind() {
            "class_definition" => {
                if let Some(name) = self.field_text(node, "name") {
                    self.push(name.clone(), SymbolKind::Class, node, !name.starts_with('_'));
                    for child in children(node) {
                        self.python(child, Some(&name));
                    }
                }
                return;
            }
            "function_definition" => {
                if let Some(name) = self.field_text(node, "name") {
                    let params = self.python_params(node);
                    let kind = if class.is_some() {
                        SymbolKind::Method
                    } else {
                        SymbolKind::Function
                    };
                    let exported = !name.starts_with('_');
                    self.push_with(name, kind, node, exported, class.map(str::to_string), params);
                }
                return;
            }
            "assignment" if is_module_level(node) => {
                let left = node
                    .child_by_field_name("left")
                    .filter(|l| l.kind() == "identifier");
                if let Some(left) = left {
                    let name = self.text(left);
                    let kind = if is_constant_name(&name) {
                        SymbolKind::Constant
                    } else {
                        SymbolKind::Variable
                    };
                    let exported = !name.starts_with('_');
                    self.push(name, kind, node, exported);
                }
                return;
            }
            _ => {}
        }
        for child in children(node) {
            self.python(child, class);
        }
    }

    fn python_params(&self, func: Node) -> Vec<String> {
        let Some(params) = func.child_by_field_name("parameters") else {
            return Vec::new();
        };
        children(params)
            .into_iter()
            .filter_map(|p| match p.kind() {
                "identifier" => Some(self.text(p)),
                "default_parameter" | "typed_default_parameter" => self.field_text(p, "name"),
                "typed_parameter" => p
                    .named_child(0)
                    .filter(|n| n.kind() == "identifier")
                    .map(|n| self.text(n)),
                _ => None,
            })
            .collect()
    }

    fn ecmascript(&mut self, node: Node, class: Option<&str>, exported: bool) {
        match node.kind() {
            "export_statement" => {
                for child in children(node) {
                    self.ecmascript(child, class, true);
                }
                return;
            }
            "class_declaration" | "abstract_class_declaration" | "class" => {
                if let Some(name) = self.field_text(node, "name") {
                    self.push(name.clone(), SymbolKind::Class, node, exported);
                    if let Some(body) = node.child_by_field_name("body") {
                        for child in children(body) {
                            self.ecmascript(child, Some(&name), exported);
                        }
                    }
                }
                return;
            }
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = self.field_text(node, "name") {
                    let params = self.ecmascript_params(node);
                    self.push_with(name, SymbolKind::Function, node, exported, None, params);
                }
                return;
            }
            "method_definition" => {
                if let Some(name) = self.field_text(node, "name") {
                    let params = self.ecmascript_params(node);
                    let private = name.starts_with('#')
                        || children(node)
                            .iter()
                            .any(|c| c.kind() == "accessibility_modifier" && self.text(*c) == "private");
                    self.push_with(
                        name,
                        SymbolKind::Method,
                        node,
                        !private,
                        class.map(str::to_string),
                        params,
                    );
                }
                return;
            }
            "lexical_declaration" | "variable_declaration" => {
                let is_const = node.child(0).is_some_and(|c| c.kind() == "const");
                let kind = if is_const {
                    SymbolKind::Constant
                } else {
                    SymbolKind::Variable
                };
                for declarator in children(node) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    let name = declarator
                        .child_by_field_name("name")
                        .filter(|n| n.kind() == "identifier");
                    if let Some(name) = name {
                        let name = self.text(name);
                        self.push(name, kind, node, exported);
                    }
                }
                return;
            }
            "interface_declaration" => {
                if let Some(name) = self.field_text(node, "name") {
                    self.push(name, SymbolKind::Interface, node, exported);
                }
                return;
            }
            "type_alias_declaration" => {
                if let Some(name) = self.field_text(node, "name") {
                    self.push(name, SymbolKind::Type, node, exported);
                }
                return;
            }
            _ => {}
        }
        for child in children(node) {
            self.ecmascript(child, class, exported);
        }
    }

    fn ecmascript_params(&self, func: Node) -> Vec<String> {
        let Some(params) = func.child_by_field_name("parameters") else {
            return Vec::new();
        };
        children(params)
            .into_iter()
            .filter_map(|p| match p.kind() {
                "identifier" => Some(self.text(p)),
                "required_parameter" | "optional_parameter" => p
                    .child_by_field_name("pattern")
                    .filter(|n| n.kind() == "identifier")
                    .map(|n| self.text(n)),
                "assignment_pattern" => p
                    .child_by_field_name("left")
                    .filter(|n| n.kind() == "identifier")
                    .map(|n| self.text(n)),
                _ => None,
            })
            .collect()
    }

    fn go(&mut self, node: Node) {
        match node.kind() {
            "function_declaration" => {
                if let Some(name) = self.field_text(node, "name") {
                    let params = self.go_params(node);
                    let exported = is_go_exported(&name);
                    self.push_with(name, SymbolKind::Function, node, exported, None, params);
                }
                return;
            }
            "method_declaration" => {
                if let Some(name) = self.field_text(node, "name") {
                    let receiver = node.child_by_field_name("receiver").and_then(|r| {
                        children(r)
                            .into_iter()
                            .find(|c| c.kind() == "parameter_declaration")
                            .and_then(|c| self.field_text(c, "type"))
                            .map(|t| t.trim_start_matches('*').to_string())
                    });
                    let params = self.go_params(node);
                    let exported = is_go_exported(&name);
                    self.push_with(name, SymbolKind::Method, node, exported, receiver, params);
                }
                return;
            }
            "type_declaration" => {
                for spec in children(node) {
                    if spec.kind() != "type_spec" {
                        continue;
                    }
                    if let Some(name) = self.field_text(spec, "name") {
                        let is_interface = spec
                            .child_by_field_name("type")
                            .is_some_and(|t| t.kind() == "interface_type");
                        let kind = if is_interface {
                            SymbolKind::Interface
                        } else {
                            SymbolKind::Class
                        };
                        let exported = is_go_exported(&name);
                        self.push(name, kind, node, exported);
                    }
                }
                return;
            }
            "const_declaration" | "var_declaration" => {
                let kind = if node.kind() == "const_declaration" {
                    SymbolKind::Constant
                } else {
                    SymbolKind::Variable
                };
                for spec in children(node) {
                    if !matches!(spec.kind(), "const_spec" | "var_spec") {
                        continue;
                    }
                    if let Some(name) = self.field_text(spec, "name") {
                        let exported = is_go_exported(&name);
                        self.push(name, kind, node, exported);
                    }
                }
                return;
            }
            _ => {}
        }
        for child in children(node) {
            self.go(child);
        }
    }

    fn go_params(&self, func: Node) -> Vec<String> {
        let Some(params) = func.child_by_field_name("parameters") else {
            return Vec::new();
        };
        children(params)
            .into_iter()
            .filter(|p| p.kind() == "parameter_declaration")
            .filter_map(|p| self.field_text(p, "name"))
            .collect()
    }

    fn rust(&mut self, node: Node, owner: Option<&str>) {
        let public = has_visibility(node);
        match node.kind() {
            "function_item" | "function_signature_item" => {
                if let Some(name) = self.field_text(node, "name") {
                    let params = self.rust_params(node);
                    let kind = if owner.is_some() {
                        SymbolKind::Method
                    } else {
                        SymbolKind::Function
                    };
                    self.push_with(name, kind, node, public, owner.map(str::to_string), params);
                }
                return;
            }
            "struct_item" | "enum_item" | "union_item" => {
                if let Some(name) = self.field_text(node, "name") {
                    self.push(name, SymbolKind::Class, node, public);
                }
                return;
            }
            "trait_item" => {
                if let Some(name) = self.field_text(node, "name") {
                    self.push(name.clone(), SymbolKind::Interface, node, public);
                    if let Some(body) = node.child_by_field_name("body") {
                        for child in children(body) {
                            self.rust(child, Some(&name));
                        }
                    }
                }
                return;
            }
            "type_item" => {
                if let Some(name) = self.field_text(node, "name") {
                    self.push(name, SymbolKind::Type, node, public);
                }
                return;
            }
            "impl_item" => {
                let target = self.field_text(node, "type");
                if let Some(body) = node.child_by_field_name("body") {
                    for child in children(body) {
                        self.rust(child, target.as_deref());
                    }
                }
                return;
            }
            "const_item" | "static_item" => {
                if let Some(name) = self.field_text(node, "name") {
                    self.push(name, SymbolKind::Constant, node, public);
                }
                return;
            }
            _ => {}
        }
        for child in children(node) {
            self.rust(child, owner);
        }
    }

    fn rust_params(&self, func: Node) -> Vec<String> {
        let Some(params) = func.child_by_field_name("parameters") else {
            return Vec::new();
        };
        children(params)
            .into_iter()
            .filter_map(|p| match p.kind() {
                "self_parameter" => Some("self".to_string()),
                "parameter" => self.field_text(p, "pattern"),
                _ => None,
            })
            .collect()
    }
}

fn is_module_level(node: Node) -> bool {
    node.parent()
        .filter(|p| p.kind() == "expression_statement")
        .and_then(|p| p.parent())
        .is_some_and(|p| p.kind() == "module")
}

fn is_constant_name(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn is_go_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

fn has_visibility(node: Node) -> bool {
    children(node)
        .iter()
        .any(|c| c.kind() == "visibility_modifier")
}

fn mark(exported: bool) -> char {
    if exported { '+' } else { '-' }
}

/// Render a symbol table for the synthesis prompt, bounded by `max_total` bytes.
///
/// Returns an empty string when no file has symbols.
pub fn format_symbol_table(files: &IndexMap<String, FileSymbols>, max_total: usize) -> String {
    if files.values().all(|f| f.symbols.is_empty()) {
        return String::new();
    }

    let mut sections = vec![
        "## Symbol Table (for cross-file validation)\n".to_string(),
        "Use this to verify imports and API calls reference actually defined symbols.\n"
            .to_string(),
    ];
    let mut size: usize = sections.iter().map(String::len).sum();
    let mut included = 0;

    for (path, file) in files {
        if file.symbols.is_empty() {
            continue;
        }
        if size + 200 >= max_total {
            sections.push(format!(
                "\n... [{} more files not shown]",
                files.len() - included
            ));
            break;
        }

        let block = file_block(path, file);
        if size + block.len() > max_total {
            if size + 50 < max_total {
                sections.push(format!("\n### {path} (truncated)"));
            }
            break;
        }
        size += block.len();
        sections.push(block);
        included += 1;
    }

    sections.push("\nLegend: + = exported/public, - = private/internal".to_string());
    sections.join("\n")
}

fn file_block(path: &str, file: &FileSymbols) -> String {
    let mut lines = vec![format!("\n### {path}")];

    let mut by_kind: IndexMap<SymbolKind, Vec<&SymbolInfo>> = IndexMap::new();
    for symbol in &file.symbols {
        by_kind.entry(symbol.kind).or_default().push(symbol);
    }

    for (kind, symbols) in by_kind {
        match kind {
            SymbolKind::Class | SymbolKind::Interface | SymbolKind::Type => {
                for s in symbols.iter().take(MAX_TYPES_SHOWN) {
                    lines.push(format!("  {} {kind} {}", mark(s.exported), s.name));
                }
            }
            SymbolKind::Function | SymbolKind::Method => {
                for s in symbols.iter().take(MAX_CALLABLES_SHOWN) {
                    let mut params: Vec<&str> = s
                        .parameters
                        .iter()
                        .take(MAX_PARAMS_SHOWN)
                        .map(String::as_str)
                        .collect();
                    if s.parameters.len() > MAX_PARAMS_SHOWN {
                        params.push("...");
                    }
                    let parent = s.parent.as_deref().map(|p| format!("{p}.")).unwrap_or_default();
                    lines.push(format!(
                        "  {} {parent}{}({})",
                        mark(s.exported),
                        s.name,
                        params.join(", ")
                    ));
                }
            }
            SymbolKind::Variable | SymbolKind::Constant => {
                let names: Vec<&str> = symbols
                    .iter()
                    .filter(|s| s.exported)
                    .take(MAX_VALUES_SHOWN)
                    .map(|s| s.name.as_str())
                    .collect();
                if !names.is_empty() {
                    lines.push(format!("  {kind}s: {}", names.join(", ")));
                }
            }
        }
    }
    lines.join("\n")
}
