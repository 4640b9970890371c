//! Arena storage for compilation sources.
//!
//! Every source a compilation touches (files, stdin, inline test snippets)
//! lives in one shared buffer, so slices handed out all borrow from the
//! same `&SourceMap` lifetime. `SourceId` is the lightweight handle that
//! spans and diagnostics carry around.

use std::ops::Range;

/// Handle to a source registered in a [`SourceMap`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct SourceId(u32);

impl SourceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a source came from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SourceKind<'a> {
    /// A file, with its path.
    File(&'a str),
    /// Input read from stdin.
    Stdin,
    /// An inline snippet (tests, REPL).
    Inline,
}

impl SourceKind<'_> {
    /// Display name used in diagnostic headers.
    pub fn display_name(&self) -> &str {
        match self {
            SourceKind::File(path) => path,
            SourceKind::Stdin => "<stdin>",
            SourceKind::Inline => "<inline>",
        }
    }
}

/// A borrowed view of one registered source.
#[derive(Copy, Clone, Debug)]
pub struct Source<'a> {
    pub id: SourceId,
    pub kind: SourceKind<'a>,
    pub text: &'a str,
}

#[derive(Clone, Debug)]
enum KindEntry {
    File { path: Range<u32> },
    Stdin,
    Inline,
}

#[derive(Clone, Debug)]
struct Entry {
    kind: KindEntry,
    text: Range<u32>,
}

/// Registry of all sources in a compilation. Owns one contiguous buffer.
#[derive(Clone, Debug, Default)]
pub struct SourceMap {
    buffer: String,
    entries: Vec<Entry>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map holding a single inline source. Convenience for tests.
    pub fn inline(text: &str) -> Self {
        let mut map = Self::new();
        map.add_inline(text);
        map
    }

    pub fn add_file(&mut self, path: &str, text: &str) -> SourceId {
        let path = self.push(path);
        let text = self.push(text);
        self.add_entry(KindEntry::File { path }, text)
    }

    pub fn add_stdin(&mut self, text: &str) -> SourceId {
        let text = self.push(text);
        self.add_entry(KindEntry::Stdin, text)
    }

    pub fn add_inline(&mut self, text: &str) -> SourceId {
        let text = self.push(text);
        self.add_entry(KindEntry::Inline, text)
    }

    /// Text of a source. Panics on a handle from another map.
    pub fn text(&self, id: SourceId) -> &str {
        let entry = self.entry(id);
        self.slice(&entry.text)
    }

    pub fn kind(&self, id: SourceId) -> SourceKind<'_> {
        match &self.entry(id).kind {
            KindEntry::File { path } => SourceKind::File(self.slice(path)),
            KindEntry::Stdin => SourceKind::Stdin,
            KindEntry::Inline => SourceKind::Inline,
        }
    }

    /// File path of a source, when it is a file.
    pub fn path(&self, id: SourceId) -> Option<&str> {
        match &self.entry(id).kind {
            KindEntry::File { path } => Some(self.slice(path)),
            _ => None,
        }
    }

    pub fn get(&self, id: SourceId) -> Source<'_> {
        Source {
            id,
            kind: self.kind(id),
            text: self.text(id),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Source<'_>> {
        (0..self.entries.len()).map(|idx| self.get(SourceId(idx as u32)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, id: SourceId) -> &Entry {
        self.entries.get(id.index()).expect("invalid SourceId")
    }

    fn push(&mut self, text: &str) -> Range<u32> {
        let start = self.buffer.len() as u32;
        self.buffer.push_str(text);
        start..self.buffer.len() as u32
    }

    fn add_entry(&mut self, kind: KindEntry, text: Range<u32>) -> SourceId {
        let id = SourceId(self.entries.len() as u32);
        self.entries.push(Entry { kind, text });
        id
    }

    fn slice(&self, range: &Range<u32>) -> &str {
        &self.buffer[range.start as usize..range.end as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_single() {
        let map = SourceMap::inline("program p\nend program\n");
        assert_eq!(map.len(), 1);
        let id = SourceId::default();
        assert_eq!(map.text(id), "program p\nend program\n");
        assert_eq!(map.kind(id), SourceKind::Inline);
        assert_eq!(map.path(id), None);
    }

    #[test]
    fn mixed_sources() {
        let mut map = SourceMap::new();
        let a = map.add_file("m.f90", "module m\nend module\n");
        let b = map.add_stdin("print *, 1\n");
        let c = map.add_inline("x = 1\n");

        assert_eq!(map.text(a), "module m\nend module\n");
        assert_eq!(map.kind(a), SourceKind::File("m.f90"));
        assert_eq!(map.path(a), Some("m.f90"));
        assert_eq!(map.kind(b), SourceKind::Stdin);
        assert_eq!(map.kind(c), SourceKind::Inline);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn slices_share_map_lifetime() {
        let mut map = SourceMap::new();
        let a = map.add_file("a.f90", "first");
        let b = map.add_file("b.f90", "second");

        let first = map.text(a);
        let second = map.text(b);
        assert_eq!(format!("{first} {second}"), "first second");
    }

    #[test]
    fn iteration_in_registration_order() {
        let mut map = SourceMap::new();
        map.add_file("a.f90", "aaa");
        map.add_inline("bbb");

        let all: Vec<_> = map.iter().collect();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].text, "aaa");
        assert_eq!(all[1].kind, SourceKind::Inline);
    }

    #[test]
    fn display_names() {
        assert_eq!(SourceKind::File("x.f90").display_name(), "x.f90");
        assert_eq!(SourceKind::Stdin.display_name(), "<stdin>");
        assert_eq!(SourceKind::Inline.display_name(), "<inline>");
    }

    #[test]
    #[should_panic(expected = "invalid SourceId")]
    fn foreign_handle_panics() {
        let map = SourceMap::new();
        let _ = map.text(SourceId(7));
    }
}
