//! Path Queries
//!
//! A small XPath subset used to define live collections:
//!
//! - absolute `/html/body`, `//div`, relative `./p`, `.//p`, bare `p`
//! - node tests: a name, `*`, `text()`, `comment()`, `node()`
//! - predicates: `[@id]`, `[@name='x']`, `[@type!='hidden']`,
//!   `[name()='div']`, positional `[2]`, combined with `and`, `or`,
//!   `not(...)` and parentheses
//!
//! Positional predicates count siblings under the same parent, as in
//! XPath's `descendant-or-self::node()/child::x[n]`.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::node::NodeData;
use crate::tree::DocumentMode;
use crate::{DomTree, NodeId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("invalid query '{expression}' at offset {position}: {message}")]
    Parse {
        expression: String,
        position: usize,
        message: String,
    },

    #[error("query root {0} does not exist")]
    UnknownRoot(NodeId),

    /// An earlier evaluation failed; the collection never retries.
    #[error("collection poisoned by an earlier failure: {0}")]
    Poisoned(Box<QueryError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    SelfNode,
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    Name(String),
    AnyElement,
    Text,
    Comment,
    AnyNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    HasAttr(String),
    AttrEq(String, String),
    AttrNe(String, String),
    NameEq(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    /// 1-based position among the candidates of one parent
    Position(usize),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

/// A parsed path query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuery {
    source: String,
    absolute: bool,
    steps: Vec<Step>,
}

impl fmt::Display for PathQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PathQuery {
    pub fn parse(expression: &str) -> Result<Self, QueryError> {
        let tokens = tokenize(expression)?;
        Parser {
            expression,
            tokens,
            pos: 0,
        }
        .parse_path()
    }

    /// The expression text
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Narrow the last step to nodes whose `attr` equals `value`.
    pub fn with_attribute_equals(&self, attr: &str, value: &str) -> Self {
        let mut query = self.clone();
        query.push_predicate(
            Expr::AttrEq(attr.to_string(), value.to_string()),
            format!("[@{attr}={}]", quote(value)),
        );
        query
    }

    /// Narrow the last step to nodes named `name`.
    pub fn with_name(&self, name: &str) -> Self {
        let mut query = self.clone();
        query.push_predicate(
            Expr::NameEq(name.to_string()),
            format!("[name()={}]", quote(name)),
        );
        query
    }

    /// Every element below the context node (below the document when
    /// `absolute`) whose name is `tag`; `*` keeps every element. The tag
    /// is compared as a plain name and never parsed.
    pub fn elements_named(tag: &str, absolute: bool) -> Result<Self, QueryError> {
        let query = Self::parse(if absolute { "//*" } else { ".//*" })?;
        Ok(if tag == "*" { query } else { query.with_name(tag) })
    }

    fn push_predicate(&mut self, expr: Expr, text: String) {
        if let Some(step) = self.steps.last_mut() {
            step.predicates.push(Predicate::Expr(expr));
            self.source.push_str(&text);
        }
    }

    /// Evaluate against `tree` with `root` as the context node. Results
    /// are unique and in document order.
    pub fn evaluate(&self, tree: &DomTree, root: NodeId) -> Result<Vec<NodeId>, QueryError> {
        if tree.get(root).is_none() {
            return Err(QueryError::UnknownRoot(root));
        }
        let top = tree.top_ancestor(root);
        let context = if self.absolute { top } else { root };
        let mut current = vec![context];
        let mut order: Option<HashMap<NodeId, usize>> = None;

        for step in &self.steps {
            let mut next = Vec::new();
            let mut seen = HashSet::new();
            for &ctx in &current {
                match step.axis {
                    Axis::SelfNode => {
                        let group = self.filter_group(tree, step, vec![ctx]);
                        extend_unique(&mut next, &mut seen, group);
                    }
                    Axis::Child => {
                        let group = self.filter_group(tree, step, tree.children(ctx).collect());
                        extend_unique(&mut next, &mut seen, group);
                    }
                    Axis::Descendant => {
                        let parents = std::iter::once(ctx).chain(tree.descendants(ctx));
                        for parent in parents {
                            let group = self.filter_group(tree, step, tree.children(parent).collect());
                            extend_unique(&mut next, &mut seen, group);
                        }
                    }
                }
            }
            if next.len() > 1 {
                let order = order.get_or_insert_with(|| document_order(tree, top));
                next.sort_by_key(|id| order.get(id).copied().unwrap_or(usize::MAX));
            }
            current = next;
        }
        Ok(current)
    }

    fn filter_group(&self, tree: &DomTree, step: &Step, candidates: Vec<NodeId>) -> Vec<NodeId> {
        let mut group: Vec<NodeId> = candidates
            .into_iter()
            .filter(|&id| matches_test(tree, id, &step.test))
            .collect();
        for predicate in &step.predicates {
            group = match predicate {
                Predicate::Position(n) => group.get(n - 1).copied().into_iter().collect(),
                Predicate::Expr(expr) => group.into_iter().filter(|&id| eval_expr(tree, id, expr)).collect(),
            };
        }
        group
    }
}

fn extend_unique(out: &mut Vec<NodeId>, seen: &mut HashSet<NodeId>, group: Vec<NodeId>) {
    for id in group {
        if seen.insert(id) {
            out.push(id);
        }
    }
}

fn document_order(tree: &DomTree, top: NodeId) -> HashMap<NodeId, usize> {
    std::iter::once(top)
        .chain(tree.descendants(top))
        .enumerate()
        .map(|(i, id)| (id, i))
        .collect()
}

fn quote(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{value}\"")
    } else {
        format!("'{value}'")
    }
}

pub(crate) fn names_equal(tree: &DomTree, a: &str, b: &str) -> bool {
    match tree.mode() {
        DocumentMode::Html => a.eq_ignore_ascii_case(b),
        DocumentMode::Xml => a == b,
    }
}

fn matches_test(tree: &DomTree, id: NodeId, test: &NodeTest) -> bool {
    let Some(node) = tree.get(id) else {
        return false;
    };
    match (test, node.data()) {
        (NodeTest::AnyNode, _) => true,
        (NodeTest::AnyElement, NodeData::Element(_)) => true,
        (NodeTest::Name(name), NodeData::Element(e)) => names_equal(tree, name, &e.name),
        (NodeTest::Text, NodeData::Text(_)) => true,
        (NodeTest::Comment, NodeData::Comment(_)) => true,
        _ => false,
    }
}

fn eval_expr(tree: &DomTree, id: NodeId, expr: &Expr) -> bool {
    let node = tree.get(id);
    let attr = |name: &str| node.and_then(|n| n.attribute(name));
    match expr {
        Expr::Or(a, b) => eval_expr(tree, id, a) || eval_expr(tree, id, b),
        Expr::And(a, b) => eval_expr(tree, id, a) && eval_expr(tree, id, b),
        Expr::Not(inner) => !eval_expr(tree, id, inner),
        Expr::HasAttr(name) => attr(name).is_some(),
        Expr::AttrEq(name, value) => attr(name) == Some(value.as_str()),
        Expr::AttrNe(name, value) => attr(name).is_some_and(|v| v != value),
        Expr::NameEq(value) => node.is_some_and(|n| names_equal(tree, &n.data().node_name(), value)),
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    Dot,
    Star,
    At,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Eq,
    NotEq,
    Name(String),
    Literal(String),
    Number(usize),
}

fn tokenize(expression: &str) -> Result<Vec<(Token, usize)>, QueryError> {
    let error = |position: usize, message: &str| QueryError::Parse {
        expression: expression.to_string(),
        position,
        message: message.to_string(),
    };
    let bytes = expression.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        let c = bytes[i];
        let token = match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i += 2;
                Token::DoubleSlash
            }
            b'/' => {
                i += 1;
                Token::Slash
            }
            b'.' => {
                i += 1;
                Token::Dot
            }
            b'*' => {
                i += 1;
                Token::Star
            }
            b'@' => {
                i += 1;
                Token::At
            }
            b'[' => {
                i += 1;
                Token::LBracket
            }
            b']' => {
                i += 1;
                Token::RBracket
            }
            b'(' => {
                i += 1;
                Token::LParen
            }
            b')' => {
                i += 1;
                Token::RParen
            }
            b'=' => {
                i += 1;
                Token::Eq
            }
            b'!' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                Token::NotEq
            }
            b'\'' | b'"' => {
                let end = expression[i + 1..]
                    .find(c as char)
                    .ok_or_else(|| error(start, "unterminated string literal"))?;
                let literal = &expression[i + 1..i + 1 + end];
                i += end + 2;
                Token::Literal(literal.to_string())
            }
            b'0'..=b'9' => {
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let n = expression[start..i]
                    .parse()
                    .map_err(|_| error(start, "number out of range"))?;
                Token::Number(n)
            }
            c if c.is_ascii_alphabetic() || c == b'_' || c >= 0x80 => {
                while i < bytes.len() && is_name_byte(bytes[i]) {
                    i += 1;
                }
                Token::Name(expression[start..i].to_string())
            }
            _ => return Err(error(start, "unexpected character")),
        };
        tokens.push((token, start));
    }
    Ok(tokens)
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b':' | b'.') || b >= 0x80
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        token
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, p)| *p)
            .unwrap_or(self.expression.len())
    }

    fn error(&self, message: impl Into<String>) -> QueryError {
        QueryError::Parse {
            expression: self.expression.to_string(),
            position: self.offset(),
            message: message.into(),
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), QueryError> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn parse_path(mut self) -> Result<PathQuery, QueryError> {
        let mut absolute = false;
        let mut steps = Vec::new();
        let mut axis = Axis::Child;

        match self.peek() {
            None => return Err(self.error("empty query")),
            Some(Token::Slash) => {
                self.pos += 1;
                absolute = true;
                if self.peek().is_none() {
                    steps.push(self_step());
                }
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                absolute = true;
                axis = Axis::Descendant;
            }
            Some(Token::Dot) => {
                self.pos += 1;
                steps.push(self_step());
                match self.peek() {
                    None => {}
                    Some(Token::Slash) => axis = Axis::Child,
                    Some(Token::DoubleSlash) => axis = Axis::Descendant,
                    Some(_) => return Err(self.error("expected '/' or '//' after '.'")),
                }
                if self.peek().is_some() {
                    self.pos += 1;
                    if self.peek().is_none() {
                        return Err(self.error("expected a step"));
                    }
                }
            }
            Some(_) => {}
        }
        if steps.is_empty() && self.peek().is_none() {
            return Err(self.error("expected a step"));
        }

        while self.peek().is_some() {
            steps.push(self.parse_step(axis)?);
            match self.peek() {
                None => break,
                Some(Token::Slash) => axis = Axis::Child,
                Some(Token::DoubleSlash) => axis = Axis::Descendant,
                Some(_) => return Err(self.error("expected '/' or end of query")),
            }
            self.pos += 1;
            if self.peek().is_none() {
                return Err(self.error("expected a step"));
            }
        }

        Ok(PathQuery {
            source: self.expression.trim().to_string(),
            absolute,
            steps,
        })
    }

    fn parse_step(&mut self, axis: Axis) -> Result<Step, QueryError> {
        let test = match self.advance() {
            Some(Token::Star) => NodeTest::AnyElement,
            Some(Token::Name(name)) if self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                self.expect(Token::RParen, "')'")?;
                match name.as_str() {
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    "node" => NodeTest::AnyNode,
                    _ => return Err(self.error(format!("unsupported node test '{name}()'"))),
                }
            }
            Some(Token::Name(name)) => NodeTest::Name(name),
            _ => {
                self.pos -= 1;
                return Err(self.error("expected a node test"));
            }
        };

        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            self.pos += 1;
            predicates.push(self.parse_predicate()?);
            self.expect(Token::RBracket, "']'")?;
        }
        Ok(Step { axis, test, predicates })
    }

    fn parse_predicate(&mut self) -> Result<Predicate, QueryError> {
        if let (Some(Token::Number(n)), Some(Token::RBracket)) = (self.peek(), self.peek_at(1)) {
            let n = *n;
            if n == 0 {
                return Err(self.error("positions start at 1"));
            }
            self.pos += 1;
            return Ok(Predicate::Position(n));
        }
        Ok(Predicate::Expr(self.parse_or()?))
    }

    fn parse_or(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Name(n)) if n == "or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_unary()?;
        while matches!(self.peek(), Some(Token::Name(n)) if n == "and") {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, QueryError> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::At) => {
                let name = match self.advance() {
                    Some(Token::Name(name)) => name,
                    _ => {
                        self.pos -= 1;
                        return Err(self.error("expected an attribute name"));
                    }
                };
                match self.peek() {
                    Some(Token::Eq) => {
                        self.pos += 1;
                        Ok(Expr::AttrEq(name, self.parse_literal()?))
                    }
                    Some(Token::NotEq) => {
                        self.pos += 1;
                        Ok(Expr::AttrNe(name, self.parse_literal()?))
                    }
                    _ => Ok(Expr::HasAttr(name)),
                }
            }
            Some(Token::Name(name)) if name == "not" && self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "')'")?;
                Ok(Expr::Not(Box::new(inner)))
            }
            Some(Token::Name(name)) if name == "name" && self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                self.expect(Token::RParen, "')'")?;
                self.expect(Token::Eq, "'='")?;
                Ok(Expr::NameEq(self.parse_literal()?))
            }
            _ => {
                self.pos -= 1;
                Err(self.error("expected a predicate expression"))
            }
        }
    }

    fn parse_literal(&mut self) -> Result<String, QueryError> {
        match self.advance() {
            Some(Token::Literal(s)) => Ok(s),
            _ => {
                self.pos -= 1;
                Err(self.error("expected a quoted string"))
            }
        }
    }
}

fn self_step() -> Step {
    Step {
        axis: Axis::SelfNode,
        test: NodeTest::AnyNode,
        predicates: Vec::new(),
    }
}
