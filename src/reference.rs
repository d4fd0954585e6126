//! Chapter and passage references, and the passage reference parser.
//!
//! Accepted passage forms:
//!
//! ```text
//! <book>[ <chapter>[:<verse-list>]]
//! ```
//!
//! where the book may carry a leading numeral and a parenthesised qualifier
//! ("1 John", "Daniel (Greek)"), and the verse list is comma-separated bare
//! verses or hyphen ranges ("3,6-7"). One-chapter books take the verse list
//! directly ("2 John 2"). A bare book name refers to its introduction (chapter 0).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::canon::Canon;
use crate::compare::{compare_verses, verse_number};

/// A book and chapter. Valid iff the book is non-empty; chapter 0 is the introduction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChapterReference {
    book: String,
    chapter_number: u32,
}

impl ChapterReference {
    pub fn new(book: &str, chapter_number: u32) -> Self {
        Self {
            book: book.to_string(),
            chapter_number,
        }
    }

    /// The explicit invalid reference: empty book, chapter 0.
    pub fn invalid() -> Self {
        Self {
            book: String::new(),
            chapter_number: 0,
        }
    }

    pub fn book(&self) -> &str {
        &self.book
    }

    pub fn chapter_number(&self) -> u32 {
        self.chapter_number
    }

    pub fn is_valid(&self) -> bool {
        !self.book.is_empty()
    }
}

impl fmt::Display for ChapterReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.chapter_number == 0 {
            write!(f, "{}", self.book)
        } else {
            write!(f, "{} {}", self.book, self.chapter_number)
        }
    }
}

/// A parsed passage: chapter reference, canonical display string and verse tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageReference {
    pub chapter_reference: ChapterReference,
    pub display: String,
    /// Bare verses ("3", "12b") or inclusive ranges ("6-7"), in input order.
    pub verses: Vec<String>,
}

impl PassageReference {
    pub fn invalid() -> Self {
        Self {
            chapter_reference: ChapterReference::invalid(),
            display: String::new(),
            verses: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.chapter_reference.is_valid()
    }

    /// Parse against the full canon (including the deuterocanonical books).
    pub fn parse(text: &str) -> Self {
        Self::parse_with_canon(text, Canon::with_deuterocanon())
    }

    /// Parse a passage, using `canon` to canonicalize book names and detect
    /// one-chapter books. Unparseable input yields an invalid reference.
    pub fn parse_with_canon(text: &str, canon: &Canon) -> Self {
        parse_passage(text, canon).unwrap_or_else(Self::invalid)
    }

    /// Whether a verse label falls inside this passage. A passage without verse
    /// tokens contains every verse.
    pub fn contains_verse(&self, label: &str) -> bool {
        if self.verses.is_empty() {
            return true;
        }

        self.verses.iter().any(|token| match token.split_once('-') {
            Some((first, last)) => {
                compare_verses(label, first) != Ordering::Less
                    && (compare_verses(label, last) != Ordering::Greater
                        || same_bare_number(label, last))
            }
            None => compare_verses(label, token) == Ordering::Equal || same_bare_number(label, token),
        })
    }
}

impl fmt::Display for PassageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// `label` shares the leading number of a bare-number `token` ("12b" within "12").
fn same_bare_number(label: &str, token: &str) -> bool {
    token.chars().all(|c| c.is_ascii_digit())
        && verse_number(token).is_some()
        && verse_number(label) == verse_number(token)
}

fn parse_passage(text: &str, canon: &Canon) -> Option<PassageReference> {
    let text = tighten(text);
    if text.is_empty() {
        return None;
    }

    let (book_part, locator) = match text.rfind(' ') {
        Some(pos) if text[pos + 1..].starts_with(|c: char| c.is_ascii_digit()) => {
            (text[..pos].trim(), Some(text[pos + 1..].trim()))
        }
        _ => (text.as_str(), None),
    };

    if !book_part.chars().any(char::is_alphabetic) || !balanced_parentheses(book_part) {
        return None;
    }
    let book = canon.canonical_name(book_part).unwrap_or(book_part).to_string();
    let one_chapter = canon.is_one_chapter_book(&book);

    let (chapter, verses) = match locator {
        None => (0, Vec::new()),
        Some(locator) => match locator.split_once(':') {
            Some((chapter, verse_list)) => (chapter.parse::<u32>().ok()?, parse_verse_list(verse_list)?),
            None if one_chapter => (1, parse_verse_list(locator)?),
            None => (locator.parse::<u32>().ok()?, Vec::new()),
        },
    };

    let display = if chapter == 0 {
        book.clone()
    } else if verses.is_empty() {
        format!("{} {}", book, chapter)
    } else if one_chapter && chapter == 1 {
        format!("{} {}", book, verses.join(","))
    } else {
        format!("{} {}:{}", book, chapter, verses.join(","))
    };

    Some(PassageReference {
        chapter_reference: ChapterReference::new(&book, chapter),
        display,
        verses,
    })
}

/// Collapse whitespace runs and drop whitespace around verse-list punctuation.
fn tighten(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(collapsed.len());
    let chars: Vec<char> = collapsed.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let is_separator = |c: Option<char>| matches!(c, Some(',' | ';' | ':' | '-'));
            if is_separator(prev) || is_separator(next) {
                continue;
            }
        }
        out.push(c);
    }

    out
}

fn balanced_parentheses(book: &str) -> bool {
    let mut depth = 0i32;
    for c in book.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Tokenize a verse list. Commas become semicolons before splitting.
fn parse_verse_list(list: &str) -> Option<Vec<String>> {
    let list = list.replace(',', ";");
    let mut tokens = Vec::new();

    for token in list.split(';') {
        let token = token.trim();
        if !is_verse_token(token) {
            return None;
        }
        tokens.push(token.to_string());
    }

    Some(tokens)
}

fn is_verse_token(token: &str) -> bool {
    let mut parts = token.split('-');
    let first = parts.next().unwrap_or("");
    let second = parts.next();
    if parts.next().is_some() {
        return false;
    }
    is_verse_label(first) && second.map_or(true, is_verse_label)
}

fn is_verse_label(label: &str) -> bool {
    let digits = label.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && label[digits..].chars().all(|c| c.is_ascii_alphabetic())
}
