//! Boolean requirement expressions.
//!
//! Requirement and equivalency text from the catalog is written in Spanish,
//! using `y` for AND, `o` for OR, parentheses for grouping and a `(c)`
//! suffix to mark a corequisite:
//!
//! ```text
//! (MAT1610 y IIC1103) o (MAT1610 y IIC1102) o IIC2233(c)
//! ```
//!
//! Text is turned into [`Token`]s by [`tokenize`] and into an [`Expr`] tree
//! by the recursive-descent [`Parser`].

use std::fmt;

use nonempty::NonEmpty;
use serde::Serialize;

use crate::domain::SubjectCode;

mod parser;
mod token;

pub use parser::{AmbiguousOperator, Parsed, Parser};
pub use token::{NO_REQUIREMENTS, Token, TokenKind, is_no_requirements, tokenize};

/// Default limit on how deeply parentheses may nest.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// A subject code referenced by an expression.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Atom {
    /// The referenced subject.
    pub code: SubjectCode,
    /// Whether the subject may be taken concurrently instead of beforehand.
    pub corequisite: bool,
}

impl Atom {
    /// An atom that must be satisfied beforehand.
    #[must_use]
    pub const fn new(code: SubjectCode) -> Self {
        Self {
            code,
            corequisite: false,
        }
    }

    /// An atom that may be satisfied concurrently.
    #[must_use]
    pub const fn corequisite(code: SubjectCode) -> Self {
        Self {
            code,
            corequisite: true,
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.corequisite {
            write!(f, "{}(c)", self.code)
        } else {
            write!(f, "{}", self.code)
        }
    }
}

/// A binary operator in requirement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// `y`
    And,
    /// `o`
    Or,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("y"),
            Self::Or => f.write_str("o"),
        }
    }
}

/// A boolean expression tree over subject atoms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A single subject.
    Atom(Atom),
    /// All children must hold.
    And(Box<NonEmpty<Expr>>),
    /// At least one child must hold.
    Or(Box<NonEmpty<Expr>>),
}

impl Expr {
    /// Parses requirement text into an expression.
    ///
    /// Returns `Ok(None)` for the "no requirements" sentinel (and for blank
    /// text). Ambiguous operators are logged and resolved by taking the
    /// first operator of each level.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the text is malformed or nests deeper
    /// than [`DEFAULT_MAX_DEPTH`].
    pub fn parse(text: &str) -> Result<Option<Self>, ParseError> {
        Self::parse_nested(text, DEFAULT_MAX_DEPTH)
    }

    /// Like [`parse`](Self::parse), with a custom nesting limit.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the text is malformed or its parentheses
    /// nest deeper than `max_depth`.
    pub fn parse_nested(text: &str, max_depth: usize) -> Result<Option<Self>, ParseError> {
        let tokens = tokenize(text)?;
        let parsed = Parser::new(&tokens).with_max_depth(max_depth).parse()?;
        for warning in &parsed.warnings {
            tracing::warn!(text, "{warning}");
        }
        Ok(parsed.expr)
    }

    /// Combines two expressions with the given operator.
    #[must_use]
    pub fn combine(operator: Operator, lhs: Self, rhs: Self) -> Self {
        let mut children = NonEmpty::new(lhs);
        children.push(rhs);
        match operator {
            Operator::And => Self::And(Box::new(children)),
            Operator::Or => Self::Or(Box::new(children)),
        }
    }

    /// Evaluates the expression, asking `holds` for the value of each atom.
    pub fn evaluate<F>(&self, holds: &mut F) -> bool
    where
        F: FnMut(&Atom) -> bool,
    {
        match self {
            Self::Atom(atom) => holds(atom),
            Self::And(children) => children.iter().all(|child| child.evaluate(holds)),
            Self::Or(children) => children.iter().any(|child| child.evaluate(holds)),
        }
    }

    /// Nesting depth of the tree. A lone atom has depth zero.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Atom(_) => 0,
            Self::And(children) | Self::Or(children) => {
                1 + children.iter().map(Self::depth).max().unwrap_or(0)
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (children, operator) = match self {
            Self::Atom(atom) => return write!(f, "{atom}"),
            Self::And(children) => (children, Operator::And),
            Self::Or(children) => (children, Operator::Or),
        };

        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                write!(f, " {operator} ")?;
            }
            match child {
                Self::Atom(atom) => write!(f, "{atom}")?,
                compound => write!(f, "({compound})")?,
            }
        }
        Ok(())
    }
}

/// Errors produced while reading requirement text.
///
/// Offsets are byte offsets into the original text.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    /// A character that is not part of the expression syntax.
    #[error("unexpected character '{character}' at {offset}")]
    UnexpectedCharacter {
        /// The offending character.
        character: char,
        /// Where it occurs.
        offset: usize,
    },

    /// A word that is neither an operator nor a subject code.
    #[error("'{word}' at {offset} is not a subject code")]
    InvalidAtom {
        /// The offending word.
        word: String,
        /// Where it starts.
        offset: usize,
    },

    /// A closing parenthesis without a matching opening one.
    #[error("unbalanced ')' at {offset}")]
    UnexpectedClose {
        /// Where it occurs.
        offset: usize,
    },

    /// An opening parenthesis that is never closed.
    #[error("'(' at {offset} is never closed")]
    UnclosedParen {
        /// Where the group opens.
        offset: usize,
    },

    /// A pair of parentheses with nothing inside.
    #[error("empty group at {offset}")]
    EmptyGroup {
        /// Where the group opens.
        offset: usize,
    },

    /// An operator missing one of its operands.
    #[error("operator at {offset} is missing an operand")]
    DanglingOperator {
        /// Where the operator occurs.
        offset: usize,
    },

    /// Two operands with no operator between them.
    #[error("missing operator before {offset}")]
    MissingOperator {
        /// Where the second operand starts.
        offset: usize,
    },

    /// Parentheses nest beyond the configured limit.
    #[error("'(' at {offset} nests deeper than {limit} levels")]
    TooDeep {
        /// The configured limit.
        limit: usize,
        /// The first parenthesis past the limit.
        offset: usize,
    },

    /// The disjunctive normal form grows beyond the configured limit.
    #[error("expression expands to more than {limit} groups")]
    TooManyGroups {
        /// The configured limit.
        limit: usize,
    },
}
