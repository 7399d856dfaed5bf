use std::path::Path;

use tracing::trace;
use tree_sitter::{Language as Grammar, Node, Parser, Tree};

use crate::model::FileKind;

use super::{ExtractError, Extraction, SpecifierExtractor};

/// Callee names treated as a CommonJS-style inclusion.
const REQUIRE_NAMES: &[&str] = &["require"];

/// Namespace objects whose `.require(...)` member counts as an inclusion.
const MODULE_NAMESPACES: &[&str] = &["module"];

/// Specifier extractor backed by a tree-sitter grammar.
///
/// One instance handles either plain JavaScript or TypeScript. Parsers are
/// created per call since `tree_sitter::Parser` is not reusable across grammars.
pub struct TreeSitterExtractor {
    kinds: &'static [FileKind],
}

impl TreeSitterExtractor {
    pub fn plain() -> Self {
        Self {
            kinds: &[FileKind::Plain],
        }
    }

    pub fn typed() -> Self {
        Self {
            kinds: &[FileKind::Typed],
        }
    }

    fn grammar_for(path: &Path) -> Grammar {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsx") => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Some("ts" | "mts" | "cts") => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            _ => tree_sitter_javascript::LANGUAGE.into(),
        }
    }

    fn parse_tree(source: &str, path: &Path) -> Result<Option<Tree>, ExtractError> {
        let mut parser = Parser::new();
        parser
            .set_language(&Self::grammar_for(path))
            .map_err(|e| ExtractError::Grammar(e.to_string()))?;
        Ok(parser.parse(source, None))
    }
}

impl SpecifierExtractor for TreeSitterExtractor {
    fn extract(&self, source: &str, path: &Path) -> Result<Extraction, ExtractError> {
        let tree = match Self::parse_tree(source, path)? {
            Some(tree) => tree,
            None => return Ok(Extraction::SyntaxError("parser produced no tree".to_string())),
        };

        let root = tree.root_node();
        if root.has_error() {
            return Ok(Extraction::SyntaxError(describe_first_error(root)));
        }

        let mut walker = SpecifierWalker::new(source);
        walker.visit_children(root);
        trace!(path = %path.display(), count = walker.specifiers.len(), "extracted specifiers");
        Ok(Extraction::Specifiers(walker.specifiers))
    }

    fn supported_kinds(&self) -> &[FileKind] {
        self.kinds
    }
}

/// Locate the first error or missing node and describe its position.
fn describe_first_error(root: Node) -> String {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            let what = if node.is_missing() {
                format!("missing `{}`", node.kind())
            } else {
                "unexpected token".to_string()
            };
            return format!(
                "syntax error: {} at line {}, column {}",
                what,
                pos.row + 1,
                pos.column + 1
            );
        }
        if !node.has_error() {
            continue;
        }
        // Push in reverse so the leftmost child is visited first.
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    "syntax error".to_string()
}

/// Walks a tree-sitter CST and collects module specifiers.
struct SpecifierWalker<'a> {
    source: &'a str,
    specifiers: Vec<String>,
}

impl<'a> SpecifierWalker<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            specifiers: Vec::new(),
        }
    }

    fn node_text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit_node(child);
        }
    }

    fn visit_node(&mut self, node: Node) {
        match node.kind() {
            "import_statement" => self.extract_import(node),
            "export_statement" => {
                // export { a } from '...', export * from '...', export * as ns from '...'
                if let Some(source) = node.child_by_field_name("source") {
                    self.push_literal(source);
                }
                self.visit_children(node);
            }
            "call_expression" => {
                self.extract_call(node);
                // Nested calls: require(require.resolve('./x')) etc.
                self.visit_children(node);
            }
            _ => self.visit_children(node),
        }
    }

    fn extract_import(&mut self, node: Node) {
        if let Some(source) = node.child_by_field_name("source") {
            self.push_literal(source);
            return;
        }

        // TypeScript: import foo = require('./foo')
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "import_require_clause" {
                if let Some(source) = child.child_by_field_name("source") {
                    self.push_literal(source);
                }
            }
        }
    }

    fn extract_call(&mut self, node: Node) {
        let Some(callee) = node.child_by_field_name("function") else {
            return;
        };

        let is_inclusion = match callee.kind() {
            "identifier" => REQUIRE_NAMES.contains(&self.node_text(callee)),
            "member_expression" => self.is_namespace_require(callee),
            // import('./lazy')
            "import" => true,
            _ => false,
        };
        if !is_inclusion {
            return;
        }

        let Some(args) = node.child_by_field_name("arguments") else {
            return;
        };
        let mut cursor = args.walk();
        let values: Vec<Node> = args
            .named_children(&mut cursor)
            .filter(|c| c.kind() != "comment")
            .collect();

        // Only a single literal argument is statically resolvable; anything
        // else (variables, concatenation, interpolation) is skipped silently.
        if let [arg] = values.as_slice() {
            self.push_literal(*arg);
        }
    }

    /// `module.require('./x')`
    fn is_namespace_require(&self, callee: Node) -> bool {
        let object = callee.child_by_field_name("object");
        let property = callee.child_by_field_name("property");
        match (object, property) {
            (Some(object), Some(property)) => {
                object.kind() == "identifier"
                    && MODULE_NAMESPACES.contains(&self.node_text(object))
                    && REQUIRE_NAMES.contains(&self.node_text(property))
            }
            _ => false,
        }
    }

    fn push_literal(&mut self, node: Node) {
        if let Some(value) = self.literal_value(node) {
            self.specifiers.push(value);
        }
    }

    /// Text of a string literal, or of a template literal with no substitutions.
    fn literal_value(&self, node: Node) -> Option<String> {
        match node.kind() {
            "string" => {
                Some(unescape(strip_delimiters(self.node_text(node))))
            }
            "template_string" => {
                let mut cursor = node.walk();
                let interpolated = node
                    .named_children(&mut cursor)
                    .any(|c| c.kind() == "template_substitution");
                if interpolated {
                    None
                } else {
                    Some(unescape(strip_delimiters(self.node_text(node))))
                }
            }
            _ => None,
        }
    }
}

fn strip_delimiters(text: &str) -> &str {
    if text.len() >= 2 {
        &text[1..text.len() - 1]
    } else {
        ""
    }
}

/// Decode the escape sequences of a string or template literal body.
///
/// Unknown escapes yield the escaped character itself and malformed numeric
/// escapes are kept verbatim.
fn unescape(body: &str) -> String {
    if !body.contains('\\') {
        return body.to_string();
    }
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escaped) = chars.next() else {
            out.push(c);
            break;
        };
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            // line continuation
            '\n' | '\u{2028}' | '\u{2029}' => {}
            '\r' => {
                chars.next_if_eq(&'\n');
            }
            'x' => match hex_value(chars.clone(), 2).and_then(char::from_u32) {
                Some(ch) => {
                    chars.nth(1);
                    out.push(ch);
                }
                None => out.push('x'),
            },
            'u' => match unicode_escape(&mut chars) {
                Some(ch) => out.push(ch),
                None => out.push('u'),
            },
            other => out.push(other),
        }
    }
    out
}

type Chars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

/// Value of exactly `len` hex digits at the front of `chars`.
fn hex_value(chars: Chars<'_>, len: usize) -> Option<u32> {
    let digits: String = chars.take(len).collect();
    if digits.chars().count() != len || !digits.chars().all(|d| d.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(&digits, 16).ok()
}

/// `XXXX`, `{X...}`, or a `XXXX\uXXXX` surrogate pair following `\u`.
fn unicode_escape(chars: &mut Chars<'_>) -> Option<char> {
    if chars.peek() == Some(&'{') {
        let digits: String = chars.clone().skip(1).take_while(|&d| d != '}').collect();
        if digits.is_empty() || !digits.chars().all(|d| d.is_ascii_hexdigit()) {
            return None;
        }
        if chars.clone().nth(1 + digits.len()) != Some('}') {
            return None;
        }
        let ch = u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32)?;
        chars.nth(digits.len() + 1);
        return Some(ch);
    }

    let code = hex_value(chars.clone(), 4)?;
    chars.nth(3);
    if !(0xD800..0xDC00).contains(&code) {
        return Some(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
    }
    let mut rest = chars.clone();
    if rest.next() == Some('\\') && rest.next() == Some('u') {
        if let Some(low) = hex_value(rest, 4).filter(|low| (0xDC00..0xE000).contains(low)) {
            chars.nth(5);
            return char::from_u32(0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00));
        }
    }
    Some(char::REPLACEMENT_CHARACTER)
}
