use crate::domain::{
    SubjectCode,
    expression::{Atom, ParseError},
};

/// The catalog's marker for an empty requirement list.
pub const NO_REQUIREMENTS: &str = "No tiene";

const COREQUISITE_SUFFIX: &str = "(c)";

/// A lexical token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// What the token is.
    pub kind: TokenKind,
    /// Byte offset into the source text.
    pub offset: usize,
}

/// The kinds of token in requirement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// `(`
    Open,
    /// `)`
    Close,
    /// `y`
    And,
    /// `o`
    Or,
    /// A subject code, with the corequisite marker folded in.
    Atom(Atom),
}

/// Returns `true` if the text means "no requirements".
///
/// Blank text is treated the same as the catalog's sentinel.
#[must_use]
pub fn is_no_requirements(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text == NO_REQUIREMENTS
}

/// Splits requirement text into tokens.
///
/// The sentinel [`NO_REQUIREMENTS`] yields no tokens. A `(c)` written
/// directly after a code, or a lowercase `c` glued to it, marks that atom
/// as a corequisite.
///
/// # Errors
///
/// Returns [`ParseError::UnexpectedCharacter`] for characters outside the
/// syntax and [`ParseError::InvalidAtom`] for words that are not subject
/// codes.
pub fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    if is_no_requirements(text) {
        return Ok(Vec::new());
    }

    let mut tokens = Vec::new();
    // End offset of the last atom, used to recognise a glued `(c)`.
    let mut atom_end = None;
    let mut offset = 0;

    while let Some(ch) = text[offset..].chars().next() {
        match ch {
            c if c.is_whitespace() => {
                offset += c.len_utf8();
                continue;
            }
            '(' if atom_end == Some(offset) && text[offset..].starts_with(COREQUISITE_SUFFIX) => {
                if let Some(Token {
                    kind: TokenKind::Atom(atom),
                    ..
                }) = tokens.last_mut()
                {
                    atom.corequisite = true;
                }
                offset += COREQUISITE_SUFFIX.len();
            }
            '(' => {
                tokens.push(Token {
                    kind: TokenKind::Open,
                    offset,
                });
                offset += 1;
            }
            ')' => {
                tokens.push(Token {
                    kind: TokenKind::Close,
                    offset,
                });
                offset += 1;
            }
            c if c.is_alphanumeric() => {
                let end = text[offset..]
                    .find(|c: char| !c.is_alphanumeric())
                    .map_or(text.len(), |len| offset + len);
                let kind = word(&text[offset..end], offset)?;
                let is_atom = matches!(kind, TokenKind::Atom(_));
                tokens.push(Token { kind, offset });
                offset = end;
                if is_atom {
                    atom_end = Some(end);
                }
                continue;
            }
            character => {
                return Err(ParseError::UnexpectedCharacter { character, offset });
            }
        }
        atom_end = None;
    }

    Ok(tokens)
}

fn word(word: &str, offset: usize) -> Result<TokenKind, ParseError> {
    match word {
        "y" => return Ok(TokenKind::And),
        "o" => return Ok(TokenKind::Or),
        _ => {}
    }

    let (code, corequisite) = match word.strip_suffix('c') {
        Some(code) => (code, true),
        None => (word, false),
    };

    let code = SubjectCode::new(code).map_err(|_| ParseError::InvalidAtom {
        word: word.to_string(),
        offset,
    })?;

    Ok(TokenKind::Atom(Atom { code, corequisite }))
}
