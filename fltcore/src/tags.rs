//! Tag storage and RIFF `INFO` list enumeration.

use std::collections::BTreeMap;

/// List type under which hosts exchange textual metadata.
pub const INFO_LIST: &str = "INFO";

/// Tag names and the RIFF `INFO` codes that carry them, ordered by tag name.
pub const INFO_TAGS: [(&str, &str); 14] = [
    ("ARTIST", "IART"),
    ("COMMENT", "ICMT"),
    ("COPYRIGHT", "ICOP"),
    ("DATE", "ICRD"),
    ("ENGINEER", "IENG"),
    ("GENRE", "IGNR"),
    ("KEYWORDS", "IKEY"),
    ("MEDIUM", "IMED"),
    ("SOFTWARE", "ISFT"),
    ("SOURCE", "ISRC"),
    ("SOURCE FORM", "ISRF"),
    ("SUBJECT", "ISBJ"),
    ("TECHNICIAN", "ITCH"),
    ("TITLE", "INAM"),
];

/// Looks up the `INFO` code for a tag name, ignoring case.
pub fn code_for_tag(name: &str) -> Option<&'static str> {
    INFO_TAGS
        .iter()
        .find(|(tag, _)| tag.eq_ignore_ascii_case(name))
        .map(|(_, code)| *code)
}

/// Looks up the tag name for an `INFO` code.
pub fn tag_for_code(code: &str) -> Option<&'static str> {
    INFO_TAGS
        .iter()
        .find(|(_, c)| c.eq_ignore_ascii_case(code))
        .map(|(tag, _)| *tag)
}

/// Case-insensitive tag map. Names are stored upper-case and the first value stored
/// under a name is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMap {
    entries: BTreeMap<String, String>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `name` unless the name is already present.
    ///
    /// Returns true if the value was stored.
    pub fn insert(&mut self, name: &str, value: &str) -> bool {
        let key = name.trim().to_ascii_uppercase();
        if key.is_empty() || self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, value.to_string());
        true
    }

    /// Parses a `NAME=value` comment and stores it. Comments without `=` are ignored.
    pub fn insert_comment(&mut self, comment: &str) -> bool {
        match comment.split_once('=') {
            Some((name, value)) => self.insert(name, value),
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_uppercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for TagMap {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut tags = TagMap::new();
        for (name, value) in iter {
            tags.insert(name, value);
        }
        tags
    }
}

/// One entry of a host-visible tag list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    pub list_type: &'static str,
    pub code: &'static str,
    pub value: String,
}

/// Position of a host walking a [`TagList`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagCursor {
    index: usize,
}

impl TagCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// The `INFO` entries derived from a decoder's tags, in tag-name order.
///
/// Tags with no `INFO` code or with an empty value are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagList {
    entries: Vec<TagEntry>,
}

impl TagList {
    pub fn from_tags(tags: &TagMap) -> Self {
        let entries = tags
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .filter_map(|(name, value)| {
                code_for_tag(name).map(|code| TagEntry {
                    list_type: INFO_LIST,
                    code,
                    value: value.to_string(),
                })
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TagEntry] {
        &self.entries
    }

    /// Rewinds `cursor` and returns the first entry.
    pub fn first(&self, cursor: &mut TagCursor) -> Option<&TagEntry> {
        cursor.index = 0;
        self.next(cursor)
    }

    /// Returns the entry at `cursor` and advances it. An exhausted cursor is left as is.
    pub fn next(&self, cursor: &mut TagCursor) -> Option<&TagEntry> {
        let entry = self.entries.get(cursor.index)?;
        cursor.index += 1;
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_wins_case_insensitively() {
        let mut tags = TagMap::new();
        assert!(tags.insert("Title", "One"));
        assert!(!tags.insert("TITLE", "Two"));
        assert_eq!(tags.get("title"), Some("One"));
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn comments_split_on_first_equals() {
        let mut tags = TagMap::new();
        assert!(tags.insert_comment("comment=a=b"));
        assert!(!tags.insert_comment("no separator"));
        assert_eq!(tags.get("COMMENT"), Some("a=b"));
    }

    #[test]
    fn info_table_is_sorted_and_bidirectional() {
        assert!(INFO_TAGS.windows(2).all(|w| w[0].0 < w[1].0));
        for (tag, code) in INFO_TAGS {
            assert_eq!(code_for_tag(tag), Some(code));
            assert_eq!(tag_for_code(code), Some(tag));
        }
        assert_eq!(code_for_tag("source form"), Some("ISRF"));
        assert_eq!(code_for_tag("ALBUM"), None);
    }

    #[test]
    fn cursor_walks_mapped_tags_only() {
        let tags: TagMap = [("ALBUM", "x"), ("TITLE", "Song"), ("ARTIST", "Band"), ("GENRE", "")]
            .into_iter()
            .collect();
        let list = TagList::from_tags(&tags);
        assert_eq!(list.len(), 2);

        let mut cursor = TagCursor::new();
        let first = list.first(&mut cursor).unwrap();
        assert_eq!((first.list_type, first.code, first.value.as_str()), ("INFO", "IART", "Band"));
        let second = list.next(&mut cursor).unwrap();
        assert_eq!((second.code, second.value.as_str()), ("INAM", "Song"));
        assert!(list.next(&mut cursor).is_none());
        assert_eq!(cursor.index(), 2);
        assert!(list.next(&mut cursor).is_none());

        assert_eq!(list.first(&mut cursor).unwrap().code, "IART");
        assert_eq!(cursor.index(), 1);
    }

    #[test]
    fn empty_list_yields_nothing() {
        let list = TagList::from_tags(&TagMap::new());
        let mut cursor = TagCursor::new();
        assert!(list.first(&mut cursor).is_none());
        assert_eq!(cursor.index(), 0);
    }
}
