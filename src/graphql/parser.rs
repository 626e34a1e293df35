//! GraphQL query parser — turns raw query text into a selection tree.
//!
//! Hand-rolled scanner and recursive descent over the subset of GraphQL the
//! commons submission API accepts: named or anonymous operations, nested
//! selection sets, scalar arguments, aliases, comments. Fragments,
//! variables, and directives are outside that subset and are reported as
//! parse errors with a pointed message rather than silently dropped.

use serde::{Deserialize, Serialize};

/// A single argument on a selection, value kept as raw text.
///
/// Only `first` is ever interpreted semantically; everything else is carried
/// through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub value: String,
}

/// A parsed unit of a GraphQL query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionNode {
    /// Field or entity name as written (alias stripped).
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub arguments: Vec<Argument>,
    /// Empty for scalar leaves.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<SelectionNode>,
}

impl SelectionNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// The `first: N` pagination argument, when present and numeric.
    pub fn first_limit(&self) -> Option<u64> {
        self.arguments
            .iter()
            .find(|a| a.name == "first")
            .and_then(|a| a.value.parse().ok())
    }
}

/// A syntax error with its location in the query text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at line {}, column {}", self.message, self.line, self.column)
    }
}

/// Parse query text into top-level selection nodes.
pub fn parse_query(text: &str) -> Result<Vec<SelectionNode>, ParseError> {
    let mut lexer = Lexer::new(text);
    lexer.skip_trivia();

    // Optional operation header: `query` / `mutation`, optionally named.
    if let Some(word) = lexer.peek_name() {
        match word.as_str() {
            "query" | "mutation" => {
                lexer.read_name();
                lexer.skip_trivia();
                if lexer.peek() != Some('{') {
                    lexer.read_name_or_err("operation name")?;
                    lexer.skip_trivia();
                }
            }
            "fragment" => {
                return Err(lexer.error("fragments are not supported by this validator"));
            }
            _ => {}
        }
    }

    lexer.expect('{')?;
    let selections = parse_selection_set(&mut lexer, 0)?;
    lexer.skip_trivia();
    if let Some(c) = lexer.peek() {
        return Err(lexer.error(format!("unexpected trailing '{}' after query", c)));
    }
    Ok(selections)
}

const MAX_DEPTH: usize = 64;

/// Parse the inside of a selection set; the opening brace is already consumed.
fn parse_selection_set(lexer: &mut Lexer, depth: usize) -> Result<Vec<SelectionNode>, ParseError> {
    if depth > MAX_DEPTH {
        return Err(lexer.error("selection sets nested too deeply"));
    }

    let mut selections = Vec::new();
    loop {
        lexer.skip_trivia();
        match lexer.peek() {
            Some('}') => {
                lexer.bump();
                if selections.is_empty() {
                    return Err(lexer.error("empty selection set"));
                }
                return Ok(selections);
            }
            Some('.') => {
                return Err(lexer.error("fragment spreads ('...') are not supported"));
            }
            Some('$') => {
                return Err(lexer.error("variables ('$') are not supported"));
            }
            Some('@') => {
                return Err(lexer.error("directives ('@') are not supported"));
            }
            Some(c) if is_name_start(c) => {
                selections.push(parse_selection(lexer, depth)?);
            }
            Some(c) => {
                return Err(lexer.error(format!("expected field name, found '{}'", c)));
            }
            None => {
                return Err(lexer.error("unbalanced braces: selection set never closed"));
            }
        }
    }
}

fn parse_selection(lexer: &mut Lexer, depth: usize) -> Result<SelectionNode, ParseError> {
    let mut name = lexer.read_name();
    lexer.skip_trivia();

    // `alias: field` — keep the real field name, drop the alias.
    if lexer.peek() == Some(':') {
        lexer.bump();
        lexer.skip_trivia();
        name = lexer.read_name_or_err("field name after alias")?;
        lexer.skip_trivia();
    }

    let arguments = if lexer.peek() == Some('(') {
        parse_arguments(lexer)?
    } else {
        Vec::new()
    };
    lexer.skip_trivia();

    if lexer.peek() == Some('@') {
        return Err(lexer.error("directives ('@') are not supported"));
    }

    let children = if lexer.peek() == Some('{') {
        lexer.bump();
        parse_selection_set(lexer, depth + 1)?
    } else {
        Vec::new()
    };

    Ok(SelectionNode {
        name,
        arguments,
        children,
    })
}

fn parse_arguments(lexer: &mut Lexer) -> Result<Vec<Argument>, ParseError> {
    lexer.expect('(')?;
    let mut args = Vec::new();
    loop {
        lexer.skip_trivia();
        match lexer.peek() {
            Some(')') => {
                lexer.bump();
                if args.is_empty() {
                    return Err(lexer.error("empty argument list"));
                }
                return Ok(args);
            }
            Some(c) if is_name_start(c) => {
                let name = lexer.read_name();
                lexer.skip_trivia();
                lexer.expect(':')?;
                lexer.skip_trivia();
                let value = lexer.read_value()?;
                args.push(Argument { name, value });
            }
            Some('$') => {
                return Err(lexer.error("variables ('$') are not supported"));
            }
            Some(c) => {
                return Err(lexer.error(format!("expected argument name, found '{}'", c)));
            }
            None => {
                return Err(lexer.error("unbalanced parentheses in arguments"));
            }
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Character-level scanner with line/column tracking.
struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        match c {
            Some('\n') => {
                self.line += 1;
                self.column = 1;
            }
            Some(_) => self.column += 1,
            None => {}
        }
        c
    }

    /// Skip whitespace, commas (insignificant in GraphQL), and `#` comments.
    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn peek_name(&mut self) -> Option<String> {
        // Clone is cheap: Chars is a view into the source.
        let mut lookahead = self.chars.clone();
        let first = *lookahead.peek()?;
        if !is_name_start(first) {
            return None;
        }
        let mut name = String::new();
        while let Some(&c) = lookahead.peek() {
            if is_name_continue(c) {
                name.push(c);
                lookahead.next();
            } else {
                break;
            }
        }
        Some(name)
    }

    fn read_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if is_name_continue(c) {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        name
    }

    fn read_name_or_err(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek() {
            Some(c) if is_name_start(c) => Ok(self.read_name()),
            Some(c) => Err(self.error(format!("expected {}, found '{}'", what, c))),
            None => Err(self.error(format!("expected {}, found end of query", what))),
        }
    }

    /// Read one argument value as raw text: number, string, name, or a
    /// balanced list/object literal.
    fn read_value(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some('"') => self.read_string(),
            Some('$') => Err(self.error("variables ('$') are not supported")),
            Some('[') => self.read_balanced('[', ']'),
            Some('{') => self.read_balanced('{', '}'),
            Some(c) if is_name_start(c) => Ok(self.read_name()),
            Some(c) if c.is_ascii_digit() || c == '-' => {
                let mut value = String::new();
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() || c == '.' || c == '-' || c == '+' || c == 'e' || c == 'E'
                    {
                        value.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                Ok(value)
            }
            Some(c) => Err(self.error(format!("expected argument value, found '{}'", c))),
            None => Err(self.error("expected argument value, found end of query")),
        }
    }

    fn read_string(&mut self) -> Result<String, ParseError> {
        let mut value = String::new();
        value.push('"');
        self.bump();
        loop {
            match self.bump() {
                Some('\\') => {
                    value.push('\\');
                    if let Some(c) = self.bump() {
                        value.push(c);
                    }
                }
                Some('"') => {
                    value.push('"');
                    return Ok(value);
                }
                Some('\n') | None => {
                    return Err(self.error("unterminated string literal"));
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn read_balanced(&mut self, open: char, close: char) -> Result<String, ParseError> {
        let mut value = String::new();
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Some(c) if c == open => {
                    depth += 1;
                    value.push(c);
                    self.bump();
                }
                Some(c) if c == close => {
                    depth -= 1;
                    value.push(c);
                    self.bump();
                    if depth == 0 {
                        return Ok(value);
                    }
                }
                Some('"') => {
                    value.push_str(&self.read_string()?);
                }
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
                None => return Err(self.error("unterminated list or object literal")),
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: self.line,
            column: self.column,
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_trivia();
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of query", expected))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_query() {
        let nodes = parse_query("{ subject { id gender } }").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "subject");
        let names: Vec<&str> = nodes[0].children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "gender"]);
    }

    #[test]
    fn test_named_operation_and_nesting() {
        let nodes = parse_query(
            "query SubjectStudies {\n  subject {\n    id\n    studies {\n      id\n      submitter_id\n    }\n  }\n}",
        )
        .unwrap();
        let studies = &nodes[0].children[1];
        assert_eq!(studies.name, "studies");
        assert_eq!(studies.children.len(), 2);
    }

    #[test]
    fn test_first_argument() {
        let nodes = parse_query("{ subject(first: 10) { id } }").unwrap();
        assert_eq!(nodes[0].first_limit(), Some(10));
    }

    #[test]
    fn test_nested_first_argument() {
        let nodes = parse_query("{ subject { id samples(first: 3) { id } } }").unwrap();
        assert_eq!(nodes[0].children[1].first_limit(), Some(3));
    }

    #[test]
    fn test_other_arguments_passed_through() {
        let nodes =
            parse_query(r#"{ subject(first: 5, gender: "female", quick_json: {k: 1}) { id } }"#)
                .unwrap();
        let args = &nodes[0].arguments;
        assert_eq!(args.len(), 3);
        assert_eq!(args[1].value, r#""female""#);
        assert_eq!(args[2].value, "{k: 1}");
        assert_eq!(nodes[0].first_limit(), Some(5));
    }

    #[test]
    fn test_comments_and_commas_ignored() {
        let nodes = parse_query(
            "{\n  # the subject entity\n  subject {\n    id, submitter_id, # trailing\n  }\n}",
        )
        .unwrap();
        assert_eq!(nodes[0].children.len(), 2);
    }

    #[test]
    fn test_alias_resolves_to_field_name() {
        let nodes = parse_query("{ s: subject { the_id: id } }").unwrap();
        assert_eq!(nodes[0].name, "subject");
        assert_eq!(nodes[0].children[0].name, "id");
    }

    #[test]
    fn test_underscores_and_digits_in_names() {
        let nodes = parse_query("{ aligned_reads_file_2 { file_size_mb_v2 } }").unwrap();
        assert_eq!(nodes[0].name, "aligned_reads_file_2");
    }

    #[test]
    fn test_multiple_roots() {
        let nodes = parse_query("{ subject { id } study { id } }").unwrap();
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_unbalanced_braces() {
        let err = parse_query("{ subject { id ").unwrap_err();
        assert!(err.message.contains("unbalanced"));
    }

    #[test]
    fn test_empty_selection_set() {
        let err = parse_query("{ subject { } }").unwrap_err();
        assert!(err.message.contains("empty selection set"));
    }

    #[test]
    fn test_empty_query() {
        assert!(parse_query("").is_err());
        assert!(parse_query("   \n  ").is_err());
        assert!(parse_query("{}").is_err());
    }

    #[test]
    fn test_fragments_rejected() {
        let err = parse_query("{ subject { ...fields } }").unwrap_err();
        assert!(err.message.contains("fragment"));

        let err = parse_query("fragment fields on subject { id }").unwrap_err();
        assert!(err.message.contains("fragment"));
    }

    #[test]
    fn test_variables_rejected() {
        let err = parse_query("{ subject(first: $n) { id } }").unwrap_err();
        assert!(err.message.contains("variables"));
    }

    #[test]
    fn test_directives_rejected() {
        let err = parse_query("{ subject @include(if: true) { id } }").unwrap_err();
        assert!(err.message.contains("directives"));
    }

    #[test]
    fn test_error_position() {
        let err = parse_query("{\n  subject {\n    id\n").unwrap_err();
        assert_eq!(err.line, 4);
    }

    #[test]
    fn test_trailing_garbage() {
        let err = parse_query("{ subject { id } } }").unwrap_err();
        assert!(err.message.contains("trailing"));
    }
}
