//! Name resolver: pattern and type based field selection
//!
//! A [`Selection`] is a list of [`Step`]s folded over an initially empty set of
//! fields. Each step tests every field against its matcher and type filter
//! and combines the outcome with the field's previous membership.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::format::DataType;
use crate::layout::{FieldDef, FieldKind, Layout};

/// Shell-style glob match, ASCII byte-wise
///
/// Supports `*`, `?`, character classes `[abc]`, ranges `[a-z]`, negated
/// classes `[!...]` or `[^...]`, and `\` to escape the next byte.
pub fn wild_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();
    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if p.get(pi) == Some(&b'*') {
            backtrack = Some((pi, ti));
            pi += 1;
            continue;
        }
        if let Some(next) = match_one(p, pi, t[ti]) {
            pi = next;
            ti += 1;
            continue;
        }
        match backtrack {
            Some((star, start)) => {
                pi = star + 1;
                ti = start + 1;
                backtrack = Some((star, start + 1));
            }
            None => return false,
        }
    }
    p[pi..].iter().all(|&c| c == b'*')
}

/// Match the single-byte token at `pi` against `c`, returning the next index
fn match_one(p: &[u8], pi: usize, c: u8) -> Option<usize> {
    match *p.get(pi)? {
        b'*' => None,
        b'?' => Some(pi + 1),
        b'\\' if pi + 1 < p.len() => (p[pi + 1] == c).then_some(pi + 2),
        b'[' => match match_class(p, pi, c) {
            Some((true, next)) => Some(next),
            Some((false, _)) => None,
            None => (c == b'[').then_some(pi + 1),
        },
        literal => (literal == c).then_some(pi + 1),
    }
}

/// Evaluate the class starting at `p[start] == b'['`
///
/// Returns `None` when the class is unterminated, in which case `[` is a
/// literal.
fn match_class(p: &[u8], start: usize, c: u8) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = matches!(p.get(i), Some(b'!' | b'^'));
    if negate {
        i += 1;
    }
    let mut matched = false;
    let mut first = true;
    loop {
        let lo = *p.get(i)?;
        if lo == b']' && !first {
            return Some((matched != negate, i + 1));
        }
        first = false;
        if p.get(i + 1) == Some(&b'-') && p.get(i + 2).is_some_and(|&hi| hi != b']') {
            let hi = p[i + 2];
            matched |= lo <= c && c <= hi;
            i += 3;
        } else {
            matched |= lo == c;
            i += 1;
        }
    }
}

/// Type predicate applied alongside the name matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    Any,
    Numeric,
    Integer,
    Float,
    Exact(DataType),
}

impl TypeFilter {
    pub fn accepts(self, data_type: DataType) -> bool {
        match self {
            TypeFilter::Any => true,
            TypeFilter::Numeric => data_type.is_numeric(),
            TypeFilter::Integer => data_type.is_integer(),
            TypeFilter::Float => data_type.is_float(),
            TypeFilter::Exact(expected) => data_type == expected,
        }
    }
}

impl core::fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TypeFilter::Any => f.write_str("any type"),
            TypeFilter::Numeric => f.write_str("a numeric type"),
            TypeFilter::Integer => f.write_str("an integer type"),
            TypeFilter::Float => f.write_str("a floating-point type"),
            TypeFilter::Exact(expected) => write!(f, "{expected}"),
        }
    }
}

/// How a step's match combines with the previous membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Logic {
    #[default]
    Or,
    And,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Every name
    Any,
    Exact(String),
    Wildcard(String),
}

impl Matcher {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Exact(expected) => expected == name,
            Matcher::Wildcard(pattern) => wild_match(pattern, name),
        }
    }
}

/// One pattern step of a [`Selection`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub logic: Logic,
    pub negate_match: bool,
    pub negate_previous: bool,
    pub negate_result: bool,
    pub matcher: Matcher,
    pub type_filter: TypeFilter,
}

impl Step {
    pub fn new(logic: Logic, matcher: Matcher) -> Self {
        Self {
            logic,
            negate_match: false,
            negate_previous: false,
            negate_result: false,
            matcher,
            type_filter: TypeFilter::Any,
        }
    }

    pub fn with_type(mut self, type_filter: TypeFilter) -> Self {
        self.type_filter = type_filter;
        self
    }

    pub fn negate_match(mut self) -> Self {
        self.negate_match = true;
        self
    }

    pub fn negate_previous(mut self) -> Self {
        self.negate_previous = true;
        self
    }

    pub fn negate_result(mut self) -> Self {
        self.negate_result = true;
        self
    }

    fn apply(&self, previous: bool, def: &FieldDef) -> bool {
        let mut matched = self.matcher.matches(&def.name) && self.type_filter.accepts(def.data_type);
        if self.negate_match {
            matched = !matched;
        }
        let previous = previous != self.negate_previous;
        let result = match self.logic {
            Logic::Or => previous || matched,
            Logic::And => previous && matched,
        };
        result != self.negate_result
    }
}

/// A sequence of steps building a set of field indices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    steps: Vec<Step>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields whose names match any of the glob `patterns`
    pub fn matching<'a, I>(patterns: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        patterns
            .into_iter()
            .fold(Self::new(), |selection, pattern| selection.or(pattern))
    }

    pub fn then(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Add fields matching `pattern`
    pub fn or(self, pattern: &str) -> Self {
        self.then(Step::new(Logic::Or, Matcher::Wildcard(pattern.into())))
    }

    /// Keep only fields that also match `pattern`
    pub fn and(self, pattern: &str) -> Self {
        self.then(Step::new(Logic::And, Matcher::Wildcard(pattern.into())))
    }

    /// Remove fields matching `pattern`
    pub fn and_not(self, pattern: &str) -> Self {
        self.then(Step::new(Logic::And, Matcher::Wildcard(pattern.into())).negate_match())
    }

    /// Keep only fields whose type passes `filter`
    pub fn of_type(self, filter: TypeFilter) -> Self {
        self.then(Step::new(Logic::And, Matcher::Any).with_type(filter))
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Selected indices of `kind`, in insertion order
    pub fn resolve(&self, layout: &Layout, kind: FieldKind) -> Vec<usize> {
        let defs = layout.fields(kind);
        let mut selected = vec![false; defs.len()];
        for step in &self.steps {
            for (flag, def) in selected.iter_mut().zip(defs) {
                *flag = step.apply(*flag, def);
            }
        }
        selected
            .iter()
            .enumerate()
            .filter_map(|(i, &s)| s.then_some(i))
            .collect()
    }

    pub fn resolve_names<'a>(&self, layout: &'a Layout, kind: FieldKind) -> Vec<&'a str> {
        self.resolve(layout, kind)
            .into_iter()
            .filter_map(|i| layout.field(kind, i))
            .map(|def| def.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wild_match() {
        assert!(wild_match("*", ""));
        assert!(wild_match("x*", "xray"));
        assert!(wild_match("*ray", "xray"));
        assert!(wild_match("x?a*", "xray"));
        assert!(!wild_match("x?a", "xray"));
        assert!(wild_match("*a*b*c", "aXbXXc"));
        assert!(!wild_match("*a*b*c", "aXbXX"));
        assert!(wild_match("[xy]ray", "yray"));
        assert!(wild_match("[a-z]1", "q1"));
        assert!(!wild_match("[!a-z]1", "q1"));
        assert!(wild_match("[^a-z]1", "Q1"));
        assert!(wild_match("[]]", "]"));
        assert!(wild_match("a\\*", "a*"));
        assert!(!wild_match("a\\*", "ab"));
        assert!(wild_match("[x", "[x"));
    }

    fn layout() -> Layout {
        let mut layout = Layout::new();
        for (name, data_type) in [
            ("x", DataType::F64),
            ("xp", DataType::F32),
            ("y", DataType::F64),
            ("n", DataType::I32),
            ("label", DataType::String),
        ] {
            layout.define(FieldDef::column(name, data_type)).unwrap();
        }
        layout
    }

    #[test]
    fn test_resolve() {
        let layout = layout();
        let selection = Selection::matching(["y", "x*"]);
        assert_eq!(selection.resolve(&layout, FieldKind::Column), [0, 1, 2]);
        assert_eq!(
            selection.resolve_names(&layout, FieldKind::Column),
            ["x", "xp", "y"]
        );

        let numeric = Selection::new().or("*").of_type(TypeFilter::Numeric);
        assert_eq!(numeric.resolve(&layout, FieldKind::Column), [0, 1, 2, 3]);

        let floats_but_x = Selection::new()
            .or("*")
            .of_type(TypeFilter::Float)
            .and_not("x");
        assert_eq!(floats_but_x.resolve_names(&layout, FieldKind::Column), ["xp", "y"]);

        assert!(Selection::new()
            .resolve(&layout, FieldKind::Column)
            .is_empty());
        assert!(Selection::matching(["*"])
            .resolve(&layout, FieldKind::Parameter)
            .is_empty());
    }

    #[test]
    fn test_negations() {
        let layout = layout();
        let complement = Selection::new()
            .or("x*")
            .then(Step::new(Logic::And, Matcher::Any).negate_previous());
        assert_eq!(complement.resolve(&layout, FieldKind::Column), [2, 3, 4]);

        let inverted = Selection::new().then(
            Step::new(Logic::Or, Matcher::Exact("n".into())).negate_result(),
        );
        assert_eq!(inverted.resolve(&layout, FieldKind::Column), [0, 1, 2, 4]);
    }
}
