//! A small atom-selection language.
//!
//! Supported grammar (keywords are case-sensitive, lower case):
//!
//! ```text
//! expr    := and ("or" and)*
//! and     := not ("and" not)*
//! not     := "not" not | primary
//! primary := "(" expr ")" | "all"
//!          | "name" PATTERN+ | "resname" PATTERN+ | "element" PATTERN+
//! ```
//!
//! Patterns accept `*` (any run of characters) and `?` (exactly one character).
//! Selected atoms are always returned in topology order, never in the order the
//! patterns were written.

use crate::core::models::topology::Topology;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Empty selection string")]
    Empty,
    #[error("Unexpected token '{token}' in selection '{selection}'")]
    UnexpectedToken { token: String, selection: String },
    #[error("Keyword '{keyword}' requires at least one pattern in selection '{selection}'")]
    MissingPattern {
        keyword: &'static str,
        selection: String,
    },
    #[error("Unbalanced parentheses in selection '{0}'")]
    UnbalancedParentheses(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    All,
    Name(Vec<String>),
    ResName(Vec<String>),
    Element(Vec<String>),
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

/// A parsed, reusable atom selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    source: String,
    root: Node,
}

const KEYWORDS: [&str; 7] = ["all", "name", "resname", "element", "not", "and", "or"];

impl Selection {
    pub fn parse(source: &str) -> Result<Self, SelectionError> {
        let tokens = tokenize(source);
        if tokens.is_empty() {
            return Err(SelectionError::Empty);
        }
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            source,
        };
        let root = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(if token == ")" {
                SelectionError::UnbalancedParentheses(source.to_string())
            } else {
                SelectionError::UnexpectedToken {
                    token: token.to_string(),
                    selection: source.to_string(),
                }
            });
        }
        Ok(Self {
            source: source.trim().to_string(),
            root,
        })
    }

    /// Selection matching every atom whose name equals one of `names`.
    pub fn names<S: AsRef<str>>(names: &[S]) -> Result<Self, SelectionError> {
        let joined: Vec<&str> = names.iter().map(|n| n.as_ref()).collect();
        Self::parse(&format!("name {}", joined.join(" ")))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluates the selection over `atom_indices` of `topology`.
    ///
    /// Returns positions *within* `atom_indices` (not topology indices), in
    /// the same order as `atom_indices`, so callers can index coordinate arrays
    /// that were gathered for exactly those atoms.
    pub fn select(&self, topology: &Topology, atom_indices: &[usize]) -> Vec<usize> {
        atom_indices
            .iter()
            .enumerate()
            .filter(|&(_, &idx)| {
                topology.atom(idx).is_some_and(|atom| {
                    let residue_name = topology
                        .residue(atom.residue_index)
                        .map_or("", |r| r.name.as_str());
                    self.root.matches(&atom.name, residue_name, &atom.element)
                })
            })
            .map(|(local, _)| local)
            .collect()
    }

    /// Evaluates the selection over all atoms of `topology`.
    pub fn select_all(&self, topology: &Topology) -> Vec<usize> {
        let indices: Vec<usize> = (0..topology.atom_count()).collect();
        self.select(topology, &indices)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Node {
    fn matches(&self, name: &str, residue_name: &str, element: &str) -> bool {
        match self {
            Node::All => true,
            Node::Name(patterns) => patterns.iter().any(|p| glob_match(p, name)),
            Node::ResName(patterns) => patterns.iter().any(|p| glob_match(p, residue_name)),
            Node::Element(patterns) => patterns
                .iter()
                .any(|p| glob_match(&p.to_ascii_uppercase(), &element.to_ascii_uppercase())),
            Node::Not(inner) => !inner.matches(name, residue_name, element),
            Node::And(a, b) => {
                a.matches(name, residue_name, element) && b.matches(name, residue_name, element)
            }
            Node::Or(a, b) => {
                a.matches(name, residue_name, element) || b.matches(name, residue_name, element)
            }
        }
    }
}

fn tokenize(source: &str) -> Vec<String> {
    source
        .replace('(', " ( ")
        .replace(')', " ) ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

struct Parser<'a> {
    tokens: &'a [String],
    pos: usize,
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn next(&mut self) -> Option<&'a str> {
        let token = self.tokens.get(self.pos).map(String::as_str);
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<Node, SelectionError> {
        let mut node = self.parse_and()?;
        while self.peek() == Some("or") {
            self.pos += 1;
            let rhs = self.parse_and()?;
            node = Node::Or(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn parse_and(&mut self) -> Result<Node, SelectionError> {
        let mut node = self.parse_not()?;
        while self.peek() == Some("and") {
            self.pos += 1;
            let rhs = self.parse_not()?;
            node = Node::And(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn parse_not(&mut self) -> Result<Node, SelectionError> {
        if self.peek() == Some("not") {
            self.pos += 1;
            let inner = self.parse_not()?;
            return Ok(Node::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Node, SelectionError> {
        let source = self.source.to_string();
        match self.next() {
            Some("(") => {
                let node = self.parse_or()?;
                if self.next() != Some(")") {
                    return Err(SelectionError::UnbalancedParentheses(source));
                }
                Ok(node)
            }
            Some("all") => Ok(Node::All),
            Some("name") => Ok(Node::Name(self.patterns("name")?)),
            Some("resname") => Ok(Node::ResName(self.patterns("resname")?)),
            Some("element") => Ok(Node::Element(self.patterns("element")?)),
            Some(token) => Err(SelectionError::UnexpectedToken {
                token: token.to_string(),
                selection: source,
            }),
            None => Err(SelectionError::UnexpectedToken {
                token: "<end>".to_string(),
                selection: source,
            }),
        }
    }

    fn patterns(&mut self, keyword: &'static str) -> Result<Vec<String>, SelectionError> {
        let mut patterns = Vec::new();
        while let Some(token) = self.peek() {
            if KEYWORDS.contains(&token) || token == "(" || token == ")" {
                break;
            }
            patterns.push(token.to_string());
            self.pos += 1;
        }
        if patterns.is_empty() {
            return Err(SelectionError::MissingPattern {
                keyword,
                selection: self.source.to_string(),
            });
        }
        Ok(patterns)
    }
}

fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = star {
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
