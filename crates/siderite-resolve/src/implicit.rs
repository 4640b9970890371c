//! Per-scope implicit-typing dictionaries.
//!
//! A stack of letter -> type maps. Entering a module pushes a copy of the
//! enclosing frame so nested subprograms inherit their context; `implicit
//! none` clears the top frame; an `implicit <type> (a-h)` statement fills a
//! letter range.

use indexmap::IndexMap;

use siderite_asr::Ty;

#[derive(Debug, Clone)]
pub struct ImplicitStack {
    frames: Vec<IndexMap<char, Ty>>,
}

impl ImplicitStack {
    /// The base frame carries the classic default rules when implicit
    /// typing is enabled, and is empty otherwise.
    pub fn new(enabled: bool) -> Self {
        let base = if enabled {
            default_rules()
        } else {
            IndexMap::new()
        };
        Self { frames: vec![base] }
    }

    /// Enter a scope: nested subprograms inherit the enclosing dictionary.
    pub fn push(&mut self) {
        let top = self.top().clone();
        self.frames.push(top);
    }

    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1, "popping the base implicit frame");
        self.frames.pop();
    }

    /// `implicit none`.
    pub fn clear(&mut self) {
        self.top_mut().clear();
    }

    /// Fill an inclusive letter range. Returns false when the range is not
    /// a lowercase `from <= to` pair.
    pub fn set_range(&mut self, from: char, to: char, ty: Ty) -> bool {
        if !from.is_ascii_lowercase() || !to.is_ascii_lowercase() || from > to {
            return false;
        }
        for letter in from..=to {
            self.top_mut().insert(letter, ty.clone());
        }
        true
    }

    /// The type implied for a name, by its first letter.
    pub fn lookup(&self, name: &str) -> Option<&Ty> {
        let first = name.chars().next()?.to_ascii_lowercase();
        self.top().get(&first)
    }

    pub fn is_empty(&self) -> bool {
        self.top().is_empty()
    }

    fn top(&self) -> &IndexMap<char, Ty> {
        self.frames.last().expect("implicit stack keeps a base frame")
    }

    fn top_mut(&mut self) -> &mut IndexMap<char, Ty> {
        self.frames
            .last_mut()
            .expect("implicit stack keeps a base frame")
    }
}

/// `implicit real (a-h, o-z), integer (i-n)`.
fn default_rules() -> IndexMap<char, Ty> {
    let mut rules = IndexMap::new();
    for letter in 'a'..='z' {
        let ty = if ('i'..='n').contains(&letter) {
            Ty::default_int()
        } else {
            Ty::default_real()
        };
        rules.insert(letter, ty);
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_dictionary_is_empty() {
        let stack = ImplicitStack::new(false);
        assert!(stack.is_empty());
        assert_eq!(stack.lookup("x"), None);
    }

    #[test]
    fn default_rules_follow_the_first_letter() {
        let stack = ImplicitStack::new(true);
        assert_eq!(stack.lookup("index"), Some(&Ty::default_int()));
        assert_eq!(stack.lookup("n"), Some(&Ty::default_int()));
        assert_eq!(stack.lookup("x"), Some(&Ty::default_real()));
        assert_eq!(stack.lookup("Alpha"), Some(&Ty::default_real()));
    }

    #[test]
    fn implicit_none_clears_only_the_top_frame() {
        let mut stack = ImplicitStack::new(true);
        stack.push();
        stack.clear();
        assert_eq!(stack.lookup("x"), None);

        stack.pop();
        assert_eq!(stack.lookup("x"), Some(&Ty::default_real()));
    }

    #[test]
    fn nested_scopes_inherit_the_enclosing_frame() {
        let mut stack = ImplicitStack::new(false);
        assert!(stack.set_range('a', 'c', Ty::default_int()));
        stack.push();
        assert_eq!(stack.lookup("b"), Some(&Ty::default_int()));

        // Changes in the nested frame do not leak out.
        assert!(stack.set_range('x', 'z', Ty::default_real()));
        stack.pop();
        assert_eq!(stack.lookup("x"), None);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let mut stack = ImplicitStack::new(false);
        assert!(!stack.set_range('z', 'a', Ty::default_int()));
        assert!(!stack.set_range('A', 'Z', Ty::default_int()));
    }
}
