//! Canon navigation: book ordering, chapter counts and previous/next chapter lookup.
//!
//! Canon tables are constant data, built once into immutable statics and shared
//! freely between threads.

use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

use crate::reference::ChapterReference;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CanonError {
    #[error("canon has no books")]
    Empty,
    #[error("book name is empty")]
    EmptyName,
    #[error("book {0} must have at least one chapter")]
    NoChapters(String),
    #[error("book {0} appears more than once")]
    DuplicateBook(String),
}

/// Name of the single-chapter pseudo-book that Psalm 151 is mapped onto.
pub const PSALM_151: &str = "Psalm 151";

const OLD_TESTAMENT_BOOKS: &[(&str, u32)] = &[
    ("Genesis", 50),
    ("Exodus", 40),
    ("Leviticus", 27),
    ("Numbers", 36),
    ("Deuteronomy", 34),
    ("Joshua", 24),
    ("Judges", 21),
    ("Ruth", 4),
    ("1 Samuel", 31),
    ("2 Samuel", 24),
    ("1 Kings", 22),
    ("2 Kings", 25),
    ("1 Chronicles", 29),
    ("2 Chronicles", 36),
    ("Ezra", 10),
    ("Nehemiah", 13),
    ("Esther", 10),
    ("Job", 42),
    ("Psalm", 150),
    ("Proverbs", 31),
    ("Ecclesiastes", 12),
    ("Song of Songs", 8),
    ("Isaiah", 66),
    ("Jeremiah", 52),
    ("Lamentations", 5),
    ("Ezekiel", 48),
    ("Daniel", 12),
    ("Hosea", 14),
    ("Joel", 3),
    ("Amos", 9),
    ("Obadiah", 1),
    ("Jonah", 4),
    ("Micah", 7),
    ("Nahum", 3),
    ("Habakkuk", 3),
    ("Zephaniah", 3),
    ("Haggai", 2),
    ("Zechariah", 14),
    ("Malachi", 4),
];

// NRSV order
const DEUTEROCANON_BOOKS: &[(&str, u32)] = &[
    ("Tobit", 14),
    ("Judith", 16),
    ("Esther (Greek)", 10),
    ("Wisdom", 19),
    ("Sirach", 51),
    ("Baruch", 5),
    ("Letter of Jeremiah", 1),
    ("Prayer of Azariah", 1),
    ("Susanna", 1),
    ("Bel and the Dragon", 1),
    ("1 Maccabees", 16),
    ("2 Maccabees", 15),
    ("1 Esdras", 9),
    ("Prayer of Manasseh", 1),
    (PSALM_151, 1),
    ("3 Maccabees", 7),
    ("2 Esdras", 16),
    ("4 Maccabees", 18),
    ("Daniel (Greek)", 14),
];

const NEW_TESTAMENT_BOOKS: &[(&str, u32)] = &[
    ("Matthew", 28),
    ("Mark", 16),
    ("Luke", 24),
    ("John", 21),
    ("Acts", 28),
    ("Romans", 16),
    ("1 Corinthians", 16),
    ("2 Corinthians", 13),
    ("Galatians", 6),
    ("Ephesians", 6),
    ("Philippians", 4),
    ("Colossians", 4),
    ("1 Thessalonians", 5),
    ("2 Thessalonians", 3),
    ("1 Timothy", 6),
    ("2 Timothy", 4),
    ("Titus", 3),
    ("Philemon", 1),
    ("Hebrews", 13),
    ("James", 5),
    ("1 Peter", 5),
    ("2 Peter", 3),
    ("1 John", 5),
    ("2 John", 1),
    ("3 John", 1),
    ("Jude", 1),
    ("Revelation", 22),
];

/// Alternative names, lowercased, mapped to the lowercased canonical name.
const BOOK_ALIASES: &[(&str, &str)] = &[
    ("psalms", "psalm"),
    ("song of solomon", "song of songs"),
    ("canticles", "song of songs"),
    ("revelation of john", "revelation"),
];

static PROTESTANT: LazyLock<Canon> =
    LazyLock::new(|| Canon::from_tables(&[OLD_TESTAMENT_BOOKS, NEW_TESTAMENT_BOOKS]));
static OLD_TESTAMENT: LazyLock<Canon> = LazyLock::new(|| Canon::from_tables(&[OLD_TESTAMENT_BOOKS]));
static NEW_TESTAMENT: LazyLock<Canon> = LazyLock::new(|| Canon::from_tables(&[NEW_TESTAMENT_BOOKS]));
static WITH_DEUTEROCANON: LazyLock<Canon> = LazyLock::new(|| {
    Canon::from_tables(&[OLD_TESTAMENT_BOOKS, DEUTEROCANON_BOOKS, NEW_TESTAMENT_BOOKS])
});

/// A book of a canon with its chapter count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonBook {
    pub name: String,
    pub chapters: u32,
}

/// An ordered list of books and chapter counts for one tradition.
#[derive(Debug, Clone)]
pub struct Canon {
    books: Vec<CanonBook>,
    index: HashMap<String, usize>,
}

impl Canon {
    /// Build a canon from `(name, chapter count)` pairs in canonical order.
    pub fn new<I, S>(books: I) -> Result<Self, CanonError>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut canon = Canon {
            books: Vec::new(),
            index: HashMap::new(),
        };

        for (name, chapters) in books {
            let name: String = name.into();
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(CanonError::EmptyName);
            }
            if chapters == 0 {
                return Err(CanonError::NoChapters(name));
            }
            let key = name.to_lowercase();
            if canon.index.contains_key(&key) {
                return Err(CanonError::DuplicateBook(name));
            }
            canon.index.insert(key, canon.books.len());
            canon.books.push(CanonBook { name, chapters });
        }

        if canon.books.is_empty() {
            return Err(CanonError::Empty);
        }

        Ok(canon)
    }

    /// A pseudo-canon holding a single book.
    pub fn single_book(name: &str, chapters: u32) -> Result<Self, CanonError> {
        Self::new([(name, chapters)])
    }

    fn from_tables(tables: &[&[(&str, u32)]]) -> Self {
        let mut books = Vec::new();
        let mut index = HashMap::new();
        for &(name, chapters) in tables.iter().flat_map(|t| t.iter()) {
            index.insert(name.to_lowercase(), books.len());
            books.push(CanonBook {
                name: name.to_string(),
                chapters,
            });
        }
        Canon { books, index }
    }

    /// The 66-book Protestant canon.
    pub fn protestant() -> &'static Canon {
        &PROTESTANT
    }

    pub fn old_testament() -> &'static Canon {
        &OLD_TESTAMENT
    }

    pub fn new_testament() -> &'static Canon {
        &NEW_TESTAMENT
    }

    /// Protestant Old Testament, the deuterocanonical books, then the New Testament.
    pub fn with_deuterocanon() -> &'static Canon {
        &WITH_DEUTEROCANON
    }

    pub fn books(&self) -> impl Iterator<Item = &CanonBook> {
        self.books.iter()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Zero-based position of a book in this canon, case-insensitive, aliases resolved.
    pub fn position(&self, book: &str) -> Option<usize> {
        let key = book.trim().to_lowercase();
        if let Some(&idx) = self.index.get(&key) {
            return Some(idx);
        }
        BOOK_ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .and_then(|(_, canonical)| self.index.get(*canonical).copied())
    }

    /// Canonical display name of a book.
    pub fn canonical_name(&self, book: &str) -> Option<&str> {
        self.position(book).map(|idx| self.books[idx].name.as_str())
    }

    /// 1-based book number, or 0 if the book is not in this canon.
    pub fn get_book_num(&self, book: &str) -> u32 {
        self.position(book).map(|idx| idx as u32 + 1).unwrap_or(0)
    }

    /// Chapter count of a book, or 0 if unknown.
    pub fn get_number_of_chapters(&self, book: &str) -> u32 {
        self.position(book)
            .map(|idx| self.books[idx].chapters)
            .unwrap_or(0)
    }

    pub fn is_one_chapter_book(&self, book: &str) -> bool {
        self.get_number_of_chapters(book) == 1
    }

    pub fn is_valid_chapter(&self, book: &str, chapter: u32) -> bool {
        match self.locate(book, chapter) {
            Some((idx, chapter)) => chapter >= 1 && chapter <= self.books[idx].chapters,
            None => false,
        }
    }

    /// The chapter after `(book, chapter)`, crossing into the next book at chapter 1.
    ///
    /// Returns an invalid reference past the end of the canon or for unknown books.
    pub fn get_next_chapter(&self, book: &str, chapter: u32) -> ChapterReference {
        let Some((idx, chapter)) = self.locate(book, chapter) else {
            return ChapterReference::invalid();
        };

        if chapter < self.books[idx].chapters {
            self.reference_at(idx, chapter + 1)
        } else if idx + 1 < self.books.len() {
            self.reference_at(idx + 1, 1)
        } else {
            ChapterReference::invalid()
        }
    }

    /// The chapter before `(book, chapter)`, crossing into the final chapter of the prior book.
    ///
    /// Returns an invalid reference before the start of the canon or for unknown books.
    pub fn get_previous_chapter(&self, book: &str, chapter: u32) -> ChapterReference {
        let Some((idx, chapter)) = self.locate(book, chapter) else {
            return ChapterReference::invalid();
        };

        if chapter > 1 {
            let last = self.books[idx].chapters;
            self.reference_at(idx, (chapter - 1).min(last))
        } else if idx > 0 {
            self.reference_at(idx - 1, self.books[idx - 1].chapters)
        } else {
            ChapterReference::invalid()
        }
    }

    /// Resolve a book and chapter to a book index, remapping Psalm 151 onto its pseudo-book.
    fn locate(&self, book: &str, chapter: u32) -> Option<(usize, u32)> {
        let idx = self.position(book)?;
        if self.books[idx].name == "Psalm" && chapter == 151 {
            return self.position(PSALM_151).map(|idx| (idx, 1));
        }
        Some((idx, chapter))
    }

    fn reference_at(&self, idx: usize, chapter: u32) -> ChapterReference {
        let name = &self.books[idx].name;
        if name == PSALM_151 {
            ChapterReference::new("Psalm", 151)
        } else {
            ChapterReference::new(name, chapter)
        }
    }
}
