use std::fmt;

use nonempty::NonEmpty;
use serde::Serialize;

use crate::domain::expression::{DEFAULT_MAX_DEPTH, Expr, Operator, ParseError, Token, TokenKind};

/// Recursive-descent parser over a token slice.
///
/// Grammar:
///
/// ```text
/// group   := operand (op operand)*
/// operand := ATOM | "(" group ")"
/// op      := "y" | "o"
/// ```
///
/// Each nesting level takes one operator, the first one seen at that level.
/// A later, different operator at the same level is reported as an
/// [`AmbiguousOperator`] and treated as the first.
///
/// Parentheses may nest at most [`DEFAULT_MAX_DEPTH`] levels unless another
/// limit is set with [`with_max_depth`](Self::with_max_depth).
#[derive(Debug)]
pub struct Parser<'t> {
    tokens: &'t [Token],
    cursor: usize,
    max_depth: usize,
    warnings: Vec<AmbiguousOperator>,
}

/// The result of a successful parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    /// The expression, or `None` when there were no tokens.
    pub expr: Option<Expr>,
    /// Operators that conflicted with the operator of their level.
    pub warnings: Vec<AmbiguousOperator>,
}

/// An operator mixed into a level that already uses a different operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmbiguousOperator {
    /// Byte offset of the conflicting operator.
    pub offset: usize,
    /// The operator applied to the level.
    pub kept: Operator,
    /// The conflicting operator, which was ignored.
    pub ignored: Operator,
}

impl fmt::Display for AmbiguousOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ambiguous '{}' at {} in a '{}' group without parentheses; treating it as '{}'",
            self.ignored, self.offset, self.kept, self.kept
        )
    }
}

impl<'t> Parser<'t> {
    /// Creates a parser positioned at the first token.
    #[must_use]
    pub const fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            cursor: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            warnings: Vec::new(),
        }
    }

    /// Sets the nesting limit.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parses the whole token stream.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] for unbalanced parentheses, empty groups,
    /// operators without operands, operands without operators and nesting
    /// past the limit.
    pub fn parse(mut self) -> Result<Parsed, ParseError> {
        if self.tokens.is_empty() {
            return Ok(Parsed {
                expr: None,
                warnings: self.warnings,
            });
        }

        let expr = self.group(0)?;

        // `group` only stops early on a closing parenthesis.
        if let Some(token) = self.peek() {
            return Err(ParseError::UnexpectedClose {
                offset: token.offset,
            });
        }

        Ok(Parsed {
            expr: Some(expr),
            warnings: self.warnings,
        })
    }

    fn peek(&self) -> Option<&'t Token> {
        let tokens = self.tokens;
        tokens.get(self.cursor)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let tokens = self.tokens;
        let token = tokens.get(self.cursor)?;
        self.cursor += 1;
        Some(token)
    }

    fn group(&mut self, depth: usize) -> Result<Expr, ParseError> {
        let mut operands = NonEmpty::new(self.operand(None, depth)?);
        let mut level_operator: Option<Operator> = None;

        while let Some(token) = self.peek() {
            let operator = match &token.kind {
                TokenKind::Close => break,
                TokenKind::And => Operator::And,
                TokenKind::Or => Operator::Or,
                TokenKind::Atom(_) | TokenKind::Open => {
                    return Err(ParseError::MissingOperator {
                        offset: token.offset,
                    });
                }
            };
            self.cursor += 1;

            match level_operator {
                None => level_operator = Some(operator),
                Some(kept) if kept != operator => self.warnings.push(AmbiguousOperator {
                    offset: token.offset,
                    kept,
                    ignored: operator,
                }),
                Some(_) => {}
            }

            operands.push(self.operand(Some(token.offset), depth)?);
        }

        Ok(match level_operator {
            None => operands.head,
            Some(Operator::And) => Expr::And(Box::new(operands)),
            Some(Operator::Or) => Expr::Or(Box::new(operands)),
        })
    }

    /// Parses one operand. `after` is the offset of the operator that
    /// precedes it, if any.
    fn operand(&mut self, after: Option<usize>, depth: usize) -> Result<Expr, ParseError> {
        let Some(token) = self.advance() else {
            return Err(match after {
                Some(offset) => ParseError::DanglingOperator { offset },
                // Groups are only entered with at least one token left.
                None => ParseError::UnclosedParen {
                    offset: self.tokens.last().map_or(0, |token| token.offset),
                },
            });
        };

        match &token.kind {
            TokenKind::Atom(atom) => Ok(Expr::Atom(atom.clone())),
            TokenKind::Open => {
                match self.peek() {
                    None => {
                        return Err(ParseError::UnclosedParen {
                            offset: token.offset,
                        });
                    }
                    Some(Token {
                        kind: TokenKind::Close,
                        ..
                    }) => {
                        return Err(ParseError::EmptyGroup {
                            offset: token.offset,
                        });
                    }
                    Some(_) => {}
                }
                if depth >= self.max_depth {
                    return Err(ParseError::TooDeep {
                        limit: self.max_depth,
                        offset: token.offset,
                    });
                }
                let inner = self.group(depth + 1).map_err(|err| match err {
                    // Running out of tokens inside a group means it was never closed.
                    ParseError::DanglingOperator { .. } if self.peek().is_none() => {
                        ParseError::UnclosedParen {
                            offset: token.offset,
                        }
                    }
                    other => other,
                })?;
                match self.advance() {
                    Some(Token {
                        kind: TokenKind::Close,
                        ..
                    }) => Ok(inner),
                    _ => Err(ParseError::UnclosedParen {
                        offset: token.offset,
                    }),
                }
            }
            TokenKind::Close => Err(match after {
                Some(offset) => ParseError::DanglingOperator { offset },
                None if depth == 0 => ParseError::UnexpectedClose {
                    offset: token.offset,
                },
                None => ParseError::EmptyGroup {
                    offset: token.offset,
                },
            }),
            TokenKind::And | TokenKind::Or => Err(ParseError::DanglingOperator {
                offset: after.unwrap_or(token.offset),
            }),
        }
    }
}
