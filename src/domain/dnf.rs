//! Disjunctive normal form of requirement expressions.
//!
//! A [`Dnf`] is a list of [`Group`]s. Each group is a set of atoms that must
//! all hold; the requirement is satisfied when any one group holds. The
//! position of a group in the list is its persisted group index.

use std::{collections::HashSet, fmt};

use serde::Serialize;

use crate::domain::{
    SubjectCode,
    expression::{Atom, DEFAULT_MAX_DEPTH, Expr, NO_REQUIREMENTS, ParseError},
};

/// Default upper bound on the number of groups a normalization may produce.
pub const DEFAULT_MAX_GROUPS: usize = 4096;

/// A conjunction of atoms.
///
/// Atoms keep their first-seen order and each code appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Group(Vec<Atom>);

impl Group {
    /// Builds a group from atoms, merging repeated codes.
    #[must_use]
    pub fn from_atoms(atoms: impl IntoIterator<Item = Atom>) -> Self {
        let mut group = Self::default();
        for atom in atoms {
            group.insert(atom);
        }
        group
    }

    /// The atoms of the group.
    #[must_use]
    pub fn atoms(&self) -> &[Atom] {
        &self.0
    }

    /// Number of atoms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the group has no atoms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the atoms.
    pub fn iter(&self) -> std::slice::Iter<'_, Atom> {
        self.0.iter()
    }

    /// Returns `true` if the group references the code.
    #[must_use]
    pub fn contains(&self, code: &SubjectCode) -> bool {
        self.0.iter().any(|atom| &atom.code == code)
    }

    /// Returns `true` if every atom holds.
    pub fn is_satisfied_by<F>(&self, mut holds: F) -> bool
    where
        F: FnMut(&Atom) -> bool,
    {
        self.0.iter().all(|atom| holds(atom))
    }

    /// Adds an atom. A code already in the group stays a corequisite only
    /// if both occurrences are corequisites: passing a subject beforehand
    /// also satisfies taking it concurrently.
    fn insert(&mut self, atom: Atom) {
        match self.0.iter_mut().find(|existing| existing.code == atom.code) {
            Some(existing) => existing.corequisite &= atom.corequisite,
            None => self.0.push(atom),
        }
    }

    fn merged(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for atom in &other.0 {
            merged.insert(atom.clone());
        }
        merged
    }

    /// Order-insensitive identity of the group.
    fn key(&self) -> Vec<&Atom> {
        let mut key: Vec<_> = self.0.iter().collect();
        key.sort();
        key
    }
}

impl<'a> IntoIterator for &'a Group {
    type Item = &'a Atom;
    type IntoIter = std::slice::Iter<'a, Atom>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, atom) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" y ")?;
            }
            write!(f, "{atom}")?;
        }
        Ok(())
    }
}

/// A requirement in disjunctive normal form.
///
/// An empty `Dnf` means "no requirements" and is always satisfied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Dnf(Vec<Group>);

impl Dnf {
    /// The empty requirement.
    #[must_use]
    pub const fn none() -> Self {
        Self(Vec::new())
    }

    /// Parses requirement text with the default group limit.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the text is malformed or expands past
    /// [`DEFAULT_MAX_GROUPS`].
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Normalizer::default().parse(text)
    }

    /// Builds a `Dnf` from groups, dropping repeated groups.
    #[must_use]
    pub fn from_groups(groups: impl IntoIterator<Item = Group>) -> Self {
        Self(dedup(groups.into_iter().collect()))
    }

    /// The groups, in group-index order.
    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.0
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no requirements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the groups.
    pub fn iter(&self) -> std::slice::Iter<'_, Group> {
        self.0.iter()
    }

    /// Returns `true` if some group holds, or if there are no requirements.
    pub fn is_satisfied_by<F>(&self, mut holds: F) -> bool
    where
        F: FnMut(&Atom) -> bool,
    {
        self.is_empty() || self.0.iter().any(|group| group.is_satisfied_by(&mut holds))
    }
}

impl<'a> IntoIterator for &'a Dnf {
    type Item = &'a Group;
    type IntoIter = std::slice::Iter<'a, Group>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Dnf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(NO_REQUIREMENTS);
        }
        let parenthesise = self.0.len() > 1;
        for (i, group) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" o ")?;
            }
            if parenthesise && group.len() > 1 {
                write!(f, "({group})")?;
            } else {
                write!(f, "{group}")?;
            }
        }
        Ok(())
    }
}

/// Converts expression trees into [`Dnf`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    max_groups: usize,
    max_depth: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_GROUPS)
    }
}

impl Normalizer {
    /// A normalizer that refuses to produce more than `max_groups` groups.
    #[must_use]
    pub const fn new(max_groups: usize) -> Self {
        Self {
            max_groups,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Sets how deeply parentheses may nest in parsed text.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The configured group limit.
    #[must_use]
    pub const fn max_groups(&self) -> usize {
        self.max_groups
    }

    /// The configured nesting limit.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Parses and normalizes requirement text.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the text is malformed, nests past the
    /// depth limit or expands past the group limit.
    pub fn parse(&self, text: &str) -> Result<Dnf, ParseError> {
        match Expr::parse_nested(text, self.max_depth)? {
            Some(expr) => self.normalize(&expr),
            None => Ok(Dnf::none()),
        }
    }

    /// Normalizes an expression tree.
    ///
    /// `Or` concatenates the groups of its children; `And` takes the cross
    /// product of its children's groups with the first child varying
    /// slowest.
    ///
    /// Recursion follows the tree, so trees from [`parse`](Self::parse) are
    /// bounded by the nesting limit while hand-built trees are taken as
    /// given.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::TooManyGroups`] if the result would exceed the
    /// group limit.
    pub fn normalize(&self, expr: &Expr) -> Result<Dnf, ParseError> {
        self.groups(expr).map(Dnf)
    }

    fn groups(&self, expr: &Expr) -> Result<Vec<Group>, ParseError> {
        match expr {
            Expr::Atom(atom) => Ok(vec![Group(vec![atom.clone()])]),
            Expr::Or(children) => {
                let mut groups = Vec::new();
                for child in children.iter() {
                    groups.extend(self.groups(child)?);
                    self.check(groups.len())?;
                }
                Ok(dedup(groups))
            }
            Expr::And(children) => {
                let mut product = vec![Group::default()];
                for child in children.iter() {
                    let child_groups = self.groups(child)?;
                    self.check(product.len().saturating_mul(child_groups.len()))?;
                    product = product
                        .iter()
                        .flat_map(|left| child_groups.iter().map(move |right| left.merged(right)))
                        .collect();
                }
                Ok(dedup(product))
            }
        }
    }

    const fn check(&self, groups: usize) -> Result<(), ParseError> {
        if groups > self.max_groups {
            Err(ParseError::TooManyGroups {
                limit: self.max_groups,
            })
        } else {
            Ok(())
        }
    }
}

/// Removes groups with the same atoms as an earlier group.
fn dedup(groups: Vec<Group>) -> Vec<Group> {
    let mut seen = HashSet::with_capacity(groups.len());
    let keep: Vec<bool> = groups.iter().map(|group| seen.insert(group.key())).collect();
    drop(seen);
    groups
        .into_iter()
        .zip(keep)
        .filter_map(|(group, keep)| keep.then_some(group))
        .collect()
}

#[cfg(test)]
mod tests {
    use nonempty::NonEmpty;
    use test_case::test_case;

    use super::*;
    use crate::domain::expression::Operator;

    fn codes(dnf: &Dnf) -> Vec<Vec<String>> {
        dnf.iter()
            .map(|group| group.iter().map(ToString::to_string).collect())
            .collect()
    }

    fn sorted(mut groups: Vec<Vec<String>>) -> Vec<Vec<String>> {
        for group in &mut groups {
            group.sort();
        }
        groups
    }

    fn expected(groups: &[&[&str]]) -> Vec<Vec<String>> {
        sorted(
            groups
                .iter()
                .map(|group| group.iter().map(ToString::to_string).collect())
                .collect(),
        )
    }

    #[test_case("No tiene"; "requirements sentinel")]
    #[test_case(""; "blank")]
    fn sentinel_is_empty(text: &str) {
        let dnf = Dnf::parse(text).unwrap();
        assert!(dnf.is_empty());
        assert_eq!(dnf.to_string(), "No tiene");
    }

    #[test_case("A1", &[&["A1"]]; "single atom")]
    #[test_case("A1 y B1", &[&["A1", "B1"]]; "conjunction")]
    #[test_case("A1 o B1", &[&["A1"], &["B1"]]; "disjunction")]
    #[test_case("(A1 y B1) o (A1 y C1) o D1", &[&["A1", "B1"], &["A1", "C1"], &["D1"]]; "canonical example")]
    #[test_case("A1 y (B1 o C1)", &[&["A1", "B1"], &["A1", "C1"]]; "distribution")]
    #[test_case("(A1 o B1) y (C1 o D1)", &[&["A1", "C1"], &["A1", "D1"], &["B1", "C1"], &["B1", "D1"]]; "cross product order")]
    #[test_case("A1 y A1", &[&["A1"]]; "repeated atom")]
    #[test_case("(A1 y B1) o (B1 y A1)", &[&["A1", "B1"]]; "repeated group")]
    #[test_case("((A1 o B1) y C1) o D1", &[&["A1", "C1"], &["B1", "C1"], &["D1"]]; "three levels")]
    fn normalizes(text: &str, groups: &[&[&str]]) {
        let dnf = Dnf::parse(text).unwrap();
        assert_eq!(sorted(codes(&dnf)), expected(groups));
    }

    #[test]
    fn corequisite_flag_survives() {
        let dnf = Dnf::parse("D1(c)").unwrap();
        assert_eq!(dnf.len(), 1);
        let atom = &dnf.groups()[0].atoms()[0];
        assert_eq!(atom.code.as_str(), "D1");
        assert!(atom.corequisite);
    }

    #[test]
    fn repeated_code_keeps_the_stricter_flag() {
        let dnf = Dnf::parse("A1(c) y (A1 o B1)").unwrap();
        let groups = dnf.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].to_string(), "A1");
        assert_eq!(groups[1].to_string(), "A1(c) y B1");
    }

    #[test]
    fn display_is_readable() {
        let dnf = Dnf::parse("(A1 y B1) o D1(c)").unwrap();
        assert_eq!(dnf.to_string(), "(A1 y B1) o D1(c)");
    }

    #[test]
    fn group_limit_is_enforced() {
        let text = "(A1 o B1) y (C1 o D1) y (E1 o F1)";
        assert_eq!(
            Normalizer::new(4).parse(text).unwrap_err(),
            ParseError::TooManyGroups { limit: 4 }
        );
        assert_eq!(Normalizer::new(8).parse(text).unwrap().len(), 8);
    }

    #[test]
    fn empty_dnf_is_satisfied() {
        assert!(Dnf::none().is_satisfied_by(|_| false));
    }

    /// Small deterministic generator, enough to explore tree shapes.
    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }

        fn below(&mut self, n: u64) -> usize {
            usize::try_from(self.next() % n).unwrap()
        }
    }

    const CODES: [&str; 4] = ["A1", "B1", "C1", "D1"];

    fn random_tree(rng: &mut XorShift, depth: usize) -> Expr {
        if depth == 0 || rng.below(4) == 0 {
            let code = SubjectCode::new(CODES[rng.below(4)]).unwrap();
            let atom = if rng.below(3) == 0 {
                Atom::corequisite(code)
            } else {
                Atom::new(code)
            };
            return Expr::Atom(atom);
        }

        let mut children = NonEmpty::new(random_tree(rng, depth - 1));
        for _ in 0..rng.below(3) + 1 {
            children.push(random_tree(rng, depth - 1));
        }
        if rng.below(2) == 0 {
            Expr::And(Box::new(children))
        } else {
            Expr::Or(Box::new(children))
        }
    }

    #[test]
    fn normal_form_is_equivalent_to_tree() {
        let mut rng = XorShift(0x2545_f491_4f6c_dd1d);
        let normalizer = Normalizer::new(1 << 16);

        for _ in 0..300 {
            let tree = random_tree(&mut rng, 3);
            assert!(tree.depth() <= 3);
            let dnf = normalizer.normalize(&tree).unwrap();

            for assignment in 0..(1u32 << CODES.len()) {
                let holds = |atom: &Atom| {
                    let index = CODES.iter().position(|c| *c == atom.code.as_str()).unwrap();
                    assignment & (1 << index) != 0
                };
                let mut tree_holds = holds;
                assert_eq!(
                    dnf.is_satisfied_by(holds),
                    tree.evaluate(&mut tree_holds),
                    "tree {tree} normalized to {dnf} under assignment {assignment:04b}"
                );
            }
        }
    }

    #[test]
    fn deeply_nested_text_is_rejected() {
        let text = format!("{}IIC2233{}", "(".repeat(4000), ")".repeat(4000));
        assert!(matches!(
            Normalizer::default().parse(&text),
            Err(ParseError::TooDeep { limit: DEFAULT_MAX_DEPTH, .. })
        ));

        let shallow = Normalizer::default().with_max_depth(1);
        assert_eq!(shallow.max_depth(), 1);
        assert!(shallow.parse("(A1 y B1) o C1").is_ok());
        assert_eq!(
            shallow.parse("((A1 y B1)) o C1"),
            Err(ParseError::TooDeep { limit: 1, offset: 1 })
        );
    }

    #[test]
    fn groups_merge_repeated_codes() {
        let a = SubjectCode::new("A1").unwrap();
        let b = SubjectCode::new("B1").unwrap();
        let group = Group::from_atoms([
            Atom::corequisite(a.clone()),
            Atom::new(b.clone()),
            Atom::new(a.clone()),
        ]);

        assert_eq!(group.len(), 2);
        assert!(group.contains(&a));
        assert!(group.contains(&b));
        assert!(!group.contains(&SubjectCode::new("C1").unwrap()));
        assert!(!group.atoms()[0].corequisite);
    }

    #[test]
    fn from_groups_matches_parsed_form() {
        let code = |c: &str| Atom::new(SubjectCode::new(c).unwrap());
        let built = Dnf::from_groups([
            Group::from_atoms([code("A1"), code("B1")]),
            Group::from_atoms([code("C1")]),
            Group::from_atoms([code("B1"), code("A1")]),
        ]);

        assert_eq!(built, Dnf::parse("(A1 y B1) o C1").unwrap());
        assert_eq!(built.len(), 2);
    }

    #[test]
    fn combine_builds_binary_nodes() {
        let a = Expr::Atom(Atom::new(SubjectCode::new("A1").unwrap()));
        let b = Expr::Atom(Atom::new(SubjectCode::new("B1").unwrap()));
        let tree = Expr::combine(Operator::And, a, b);
        assert_eq!(Normalizer::default().normalize(&tree).unwrap().to_string(), "A1 y B1");
    }
}
