const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";

/// Positions filled with letters before switching to digits.
const LETTER_POSITIONS: usize = 3;

/// The longest prefix the space will descend to.
pub const MAX_DEPTH: usize = 7;

#[derive(Debug, Clone)]
struct Level {
    alphabet: &'static [u8],
    /// Index of the next symbol to yield. The current symbol is `next - 1`.
    next: usize,
}

impl Level {
    const fn new(depth: usize) -> Self {
        Self {
            alphabet: if depth < LETTER_POSITIONS {
                LETTERS
            } else {
                DIGITS
            },
            next: 0,
        }
    }
}

/// A depth-first walk over subject code prefixes.
///
/// The walk starts with the single letters `A` to `Z`. Calling
/// [`deepen`](Self::deepen) after a prefix has been yielded makes the walk
/// visit every one-symbol extension of that prefix before moving on. The
/// first three positions are letters and the next four are digits.
///
/// ```
/// use course_catalog::discovery::CodeSpace;
///
/// let mut space = CodeSpace::new();
/// assert_eq!(space.next().as_deref(), Some("A"));
/// assert!(space.deepen());
/// assert_eq!(space.next().as_deref(), Some("AA"));
/// ```
#[derive(Debug, Clone)]
pub struct CodeSpace {
    levels: Vec<Level>,
}

impl Default for CodeSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeSpace {
    /// A walk positioned before `A`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            levels: vec![Level::new(0)],
        }
    }

    /// The prefix most recently yielded.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.levels
            .iter()
            .map(|level| level.next.checked_sub(1).map(|i| char::from(level.alphabet[i])))
            .collect()
    }

    /// Descends below the current prefix.
    ///
    /// Returns `false`, leaving the walk unchanged, if nothing has been
    /// yielded at the current level yet or the prefix is already
    /// [`MAX_DEPTH`] long.
    pub fn deepen(&mut self) -> bool {
        let depth = self.levels.len();
        let started = self.levels.last().is_some_and(|level| level.next > 0);
        if !started || depth >= MAX_DEPTH {
            return false;
        }
        self.levels.push(Level::new(depth));
        true
    }
}

impl Iterator for CodeSpace {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let level = self.levels.last_mut()?;
            if level.next < level.alphabet.len() {
                level.next += 1;
                return self.current();
            }
            self.levels.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_walk_visits_each_letter() {
        let prefixes: Vec<_> = CodeSpace::new().collect();
        assert_eq!(prefixes.len(), 26);
        assert_eq!(prefixes.first().map(String::as_str), Some("A"));
        assert_eq!(prefixes.last().map(String::as_str), Some("Z"));
    }

    #[test]
    fn deepening_visits_extensions_before_siblings() {
        let mut space = CodeSpace::new();
        assert_eq!(space.next().as_deref(), Some("A"));
        assert_eq!(space.next().as_deref(), Some("B"));
        assert!(space.deepen());

        let children: Vec<_> = space.by_ref().take(26).collect();
        assert_eq!(children.first().map(String::as_str), Some("BA"));
        assert_eq!(children.last().map(String::as_str), Some("BZ"));
        assert_eq!(space.next().as_deref(), Some("C"));
    }

    #[test]
    fn switches_to_digits_after_three_letters() {
        let mut space = CodeSpace::new();
        space.next();
        assert!(space.deepen());
        space.next();
        assert!(space.deepen());
        assert_eq!(space.next().as_deref(), Some("AAA"));
        assert!(space.deepen());
        assert_eq!(space.next().as_deref(), Some("AAA0"));
        assert_eq!(space.next().as_deref(), Some("AAA1"));
    }

    #[test]
    fn cannot_deepen_past_max_depth() {
        let mut space = CodeSpace::new();
        for _ in 0..MAX_DEPTH - 1 {
            space.next();
            assert!(space.deepen());
        }
        assert_eq!(space.next().as_deref(), Some("AAA0000"));
        assert!(!space.deepen());
        assert_eq!(space.next().as_deref(), Some("AAA0001"));
    }

    #[test]
    fn cannot_deepen_before_first_prefix() {
        let mut space = CodeSpace::new();
        assert!(!space.deepen());
        assert_eq!(space.current(), None);
        assert_eq!(space.next().as_deref(), Some("A"));
        assert_eq!(space.current().as_deref(), Some("A"));
    }
}
