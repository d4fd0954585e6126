//! Local chapter providers: a directory of plain-text chapters or a SQLite database.
//!
//! Both hand back chapters in the `"<verse-label>  <verse text>"` line format. A
//! chapter the provider does not hold comes back empty rather than as an error.
//! A text root or database file that does not exist is an error.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::canon::Canon;
use crate::compare::compare_verses;
use crate::models::Chapter;
use crate::reference::ChapterReference;

/// Marker file whose presence means a plain-text translation carries italics.
const ITALICS_MARKER: &str = "ITALICS";
const COPYRIGHT_FILE: &str = "COPYRIGHT";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database not found: {0}")]
    DatabaseNotFound(PathBuf),
    #[error("Text directory not found: {0}")]
    RootNotFound(PathBuf),
}

/// Where chapter text comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provider {
    /// `<root>/<translation>/<book>/<chapter>.txt`
    PlainText { root: PathBuf },
    /// Tables `verses(translation, book, chapter, verse, text)` and
    /// `translations(code, copyright, supports_italics)`.
    Sqlite { path: PathBuf },
}

impl Provider {
    /// Fetch one chapter, with previous/next references filled from `canon`.
    pub fn get_chapter(
        &self,
        translation: &str,
        book: &str,
        chapter_number: u32,
        canon: &Canon,
    ) -> Result<Chapter, ProviderError> {
        let book = canon.canonical_name(book).unwrap_or(book);
        let reference = ChapterReference::new(book, chapter_number);
        let mut chapter = Chapter::empty(translation, reference);
        chapter.previous = canon.get_previous_chapter(book, chapter_number);
        chapter.next = canon.get_next_chapter(book, chapter_number);

        match self {
            Provider::PlainText { root } => load_plain_text(root, &mut chapter)?,
            Provider::Sqlite { path } => load_sqlite(path, &mut chapter)?,
        }

        if chapter.is_empty() {
            debug!(translation, book, chapter_number, "chapter not held by provider");
        }
        Ok(chapter)
    }

    /// Translation codes this provider holds, sorted.
    pub fn translations(&self) -> Result<Vec<String>, ProviderError> {
        match self {
            Provider::PlainText { root } => {
                if !root.is_dir() {
                    return Err(ProviderError::RootNotFound(root.clone()));
                }
                let mut codes = Vec::new();
                for entry in fs::read_dir(root)? {
                    let entry = entry?;
                    if entry.file_type()?.is_dir() {
                        codes.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
                codes.sort();
                Ok(codes)
            }
            Provider::Sqlite { path } => {
                let conn = open_database(path)?;
                let mut stmt = conn.prepare("SELECT DISTINCT translation FROM verses ORDER BY translation")?;
                let codes = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(codes)
            }
        }
    }
}

fn load_plain_text(root: &Path, chapter: &mut Chapter) -> Result<(), ProviderError> {
    if !root.is_dir() {
        return Err(ProviderError::RootNotFound(root.to_path_buf()));
    }
    let translation_dir = root.join(&chapter.translation);
    let path = translation_dir
        .join(chapter.reference.book())
        .join(format!("{}.txt", chapter.reference.chapter_number()));

    if !path.is_file() {
        return Ok(());
    }

    chapter.text = fs::read_to_string(&path)?;

    let copyright = translation_dir.join(COPYRIGHT_FILE);
    if copyright.is_file() {
        chapter.copyright = fs::read_to_string(copyright)?.trim().to_string();
    }
    chapter.supports_italics = translation_dir.join(ITALICS_MARKER).exists();

    Ok(())
}

fn open_database(path: &Path) -> Result<Connection, ProviderError> {
    if !path.is_file() {
        return Err(ProviderError::DatabaseNotFound(path.to_path_buf()));
    }
    Ok(Connection::open(path)?)
}

fn load_sqlite(path: &Path, chapter: &mut Chapter) -> Result<(), ProviderError> {
    let conn = open_database(path)?;

    let mut stmt = conn.prepare(
        "SELECT verse, text FROM verses
         WHERE translation = ?1 AND book = ?2 COLLATE NOCASE AND chapter = ?3",
    )?;
    let mut verses = stmt
        .query_map(
            params![
                chapter.translation,
                chapter.reference.book(),
                chapter.reference.chapter_number()
            ],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?
        .collect::<Result<Vec<_>, _>>()?;

    if verses.is_empty() {
        return Ok(());
    }
    verses.sort_by(|a, b| compare_verses(&a.0, &b.0));

    chapter.text = verses
        .iter()
        .map(|(label, text)| format!("{}  {}", label, text))
        .collect::<Vec<_>>()
        .join("\n");

    let details: Option<(Option<String>, bool)> = conn
        .query_row(
            "SELECT copyright, supports_italics FROM translations WHERE code = ?1",
            params![chapter.translation],
            |row| Ok((row.get(0)?, row.get::<_, Option<bool>>(1)?.unwrap_or(false))),
        )
        .optional()?;
    if let Some((copyright, supports_italics)) = details {
        chapter.copyright = copyright.unwrap_or_default();
        chapter.supports_italics = supports_italics;
    }

    Ok(())
}

/// Create the provider schema in a new or existing database.
pub fn initialize_database(path: &Path) -> Result<Connection, ProviderError> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS translations (
             code TEXT PRIMARY KEY,
             copyright TEXT,
             supports_italics INTEGER NOT NULL DEFAULT 0
         );
         CREATE TABLE IF NOT EXISTS verses (
             translation TEXT NOT NULL,
             book TEXT NOT NULL,
             chapter INTEGER NOT NULL,
             verse TEXT NOT NULL,
             text TEXT NOT NULL,
             PRIMARY KEY (translation, book, chapter, verse)
         );",
    )?;
    Ok(conn)
}

/// Store one chapter's verses, replacing any verses already stored under the same labels.
pub fn insert_chapter(conn: &mut Connection, chapter: &Chapter) -> Result<usize, ProviderError> {
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO translations (code, copyright, supports_italics) VALUES (?1, ?2, ?3)
         ON CONFLICT(code) DO UPDATE SET copyright = excluded.copyright,
                                         supports_italics = excluded.supports_italics",
        params![chapter.translation, chapter.copyright, chapter.supports_italics],
    )?;

    let verses = chapter.verses();
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO verses (translation, book, chapter, verse, text)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for verse in &verses {
            stmt.execute(params![
                chapter.translation,
                chapter.reference.book(),
                chapter.reference.chapter_number(),
                verse.label,
                verse.text
            ])?;
        }
    }
    tx.commit()?;

    Ok(verses.len())
}

/// Copy every chapter a provider holds for `translations` into a SQLite database.
///
/// Returns the number of chapters and verses imported.
pub fn import_into_database(
    source: &Provider,
    translations: &[String],
    canon: &Canon,
    db_path: &Path,
    show_progress: bool,
) -> Result<(usize, usize), ProviderError> {
    let mut conn = initialize_database(db_path)?;
    let mut chapters = 0;
    let mut verses = 0;

    for translation in translations {
        if show_progress {
            eprintln!("Importing {}...", translation);
        }
        for book in canon.books() {
            for number in 1..=book.chapters {
                let chapter = source.get_chapter(translation, &book.name, number, canon)?;
                if chapter.is_empty() {
                    continue;
                }
                verses += insert_chapter(&mut conn, &chapter)?;
                chapters += 1;
            }
        }
    }

    if show_progress {
        eprintln!("  Imported {} chapters ({} verses)", chapters, verses);
    }
    Ok((chapters, verses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_chapter(root: &Path, translation: &str, book: &str, chapter: u32, text: &str) {
        let dir = root.join(translation).join(book);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.txt", chapter)), text).unwrap();
    }

    #[test]
    fn test_plain_text_chapter() {
        let dir = TempDir::new().unwrap();
        write_chapter(dir.path(), "KJV", "Jude", 1, "1  Jude, the servant\n2  Mercy unto you");
        fs::write(dir.path().join("KJV").join(COPYRIGHT_FILE), "Public domain\n").unwrap();
        fs::write(dir.path().join("KJV").join(ITALICS_MARKER), "").unwrap();

        let provider = Provider::PlainText { root: dir.path().to_path_buf() };
        let chapter = provider.get_chapter("KJV", "jude", 1, Canon::protestant()).unwrap();

        assert_eq!(chapter.reference, ChapterReference::new("Jude", 1));
        assert_eq!(chapter.verses().len(), 2);
        assert_eq!(chapter.copyright, "Public domain");
        assert!(chapter.supports_italics);
        assert_eq!(chapter.previous, ChapterReference::new("3 John", 1));
        assert_eq!(chapter.next, ChapterReference::new("Revelation", 1));
    }

    #[test]
    fn test_missing_chapter_is_empty() {
        let dir = TempDir::new().unwrap();
        let provider = Provider::PlainText { root: dir.path().to_path_buf() };
        let chapter = provider.get_chapter("KJV", "Genesis", 2, Canon::protestant()).unwrap();
        assert!(chapter.is_empty());
        assert_eq!(chapter.next, ChapterReference::new("Genesis", 3));
    }

    #[test]
    fn test_plain_text_translations() {
        let dir = TempDir::new().unwrap();
        write_chapter(dir.path(), "WEB", "Jude", 1, "1  a");
        write_chapter(dir.path(), "KJV", "Jude", 1, "1  b");
        let provider = Provider::PlainText { root: dir.path().to_path_buf() };
        assert_eq!(provider.translations().unwrap(), vec!["KJV", "WEB"]);

        let missing = Provider::PlainText { root: dir.path().join("nope") };
        assert!(matches!(missing.translations(), Err(ProviderError::RootNotFound(_))));
    }

    #[test]
    fn test_sqlite_round_trip() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("bible.db");
        let mut conn = initialize_database(&db_path).unwrap();

        let chapter = Chapter {
            text: "10  third\n2  second\n1  first".to_string(),
            copyright: "CC BY".to_string(),
            ..Chapter::empty("WEB", ChapterReference::new("Genesis", 1))
        };
        assert_eq!(insert_chapter(&mut conn, &chapter).unwrap(), 3);
        drop(conn);

        let provider = Provider::Sqlite { path: db_path };
        let loaded = provider.get_chapter("WEB", "GENESIS", 1, Canon::protestant()).unwrap();
        assert_eq!(loaded.text, "1  first\n2  second\n10  third");
        assert_eq!(loaded.copyright, "CC BY");
        assert!(!loaded.supports_italics);

        assert!(provider.get_chapter("WEB", "Genesis", 2, Canon::protestant()).unwrap().is_empty());
        assert_eq!(provider.translations().unwrap(), vec!["WEB"]);
    }

    #[test]
    fn test_missing_database() {
        let provider = Provider::Sqlite { path: PathBuf::from("/nonexistent/bible.db") };
        let err = provider.get_chapter("WEB", "Genesis", 1, Canon::protestant()).unwrap_err();
        assert!(matches!(err, ProviderError::DatabaseNotFound(_)));
    }

    #[test]
    fn test_missing_text_root() {
        let provider = Provider::PlainText { root: PathBuf::from("/nonexistent/bibles") };
        let err = provider.get_chapter("KJV", "Jude", 1, Canon::protestant()).unwrap_err();
        assert!(matches!(err, ProviderError::RootNotFound(_)));
    }

    #[test]
    fn test_missing_translation_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        write_chapter(dir.path(), "KJV", "Jude", 1, "1  Jude");
        let provider = Provider::PlainText { root: dir.path().to_path_buf() };
        let chapter = provider.get_chapter("WEB", "Jude", 1, Canon::protestant()).unwrap();
        assert!(chapter.is_empty());
    }

    #[test]
    fn test_import_plain_text_into_database() {
        let dir = TempDir::new().unwrap();
        write_chapter(dir.path(), "KJV", "Jude", 1, "1  Jude\n2  Mercy");
        write_chapter(dir.path(), "KJV", "Obadiah", 1, "1  The vision");
        let source = Provider::PlainText { root: dir.path().to_path_buf() };
        let db_path = dir.path().join("out.db");

        let (chapters, verses) = import_into_database(
            &source,
            &["KJV".to_string()],
            Canon::protestant(),
            &db_path,
            false,
        )
        .unwrap();
        assert_eq!((chapters, verses), (2, 3));

        let target = Provider::Sqlite { path: db_path };
        let jude = target.get_chapter("KJV", "Jude", 1, Canon::protestant()).unwrap();
        assert_eq!(jude.text, "1  Jude\n2  Mercy");
    }

    #[test]
    fn test_provider_config_is_tagged() {
        let provider: Provider =
            serde_json::from_str(r#"{"kind": "plain_text", "root": "/data/bibles"}"#).unwrap();
        assert_eq!(provider, Provider::PlainText { root: PathBuf::from("/data/bibles") });
    }
}
