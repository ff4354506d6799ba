//! Documentation pages.
//!
//! A sheet is a text file under the docs directory. Its slug is the path
//! relative to that directory without the extension, so `guides/setup.md`
//! is served at `/docs/guides/setup`. A leading `# ` line becomes the title.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sheet {
    pub slug: String,
    pub title: String,
    pub body: String,
}

impl Sheet {
    /// Build a sheet from raw file contents.
    pub fn parse(slug: &str, contents: &str) -> Self {
        let (title, body) = match contents.split_once('\n') {
            Some((first, rest)) if first.starts_with("# ") => {
                (first[2..].trim().to_string(), rest.trim_start().to_string())
            }
            None if contents.starts_with("# ") => (contents[2..].trim().to_string(), String::new()),
            _ => (slug.to_string(), contents.to_string()),
        };
        Self {
            slug: slug.to_string(),
            title,
            body,
        }
    }
}

pub trait SheetRepository: Send + Sync {
    /// All sheets ordered by slug.
    fn all(&self) -> Vec<Sheet>;
    fn get(&self, slug: &str) -> Option<Sheet>;
}

/// Sheets held in memory, keyed by slug.
#[derive(Debug, Default)]
pub struct InMemorySheets {
    sheets: BTreeMap<String, Sheet>,
}

impl InMemorySheets {
    pub fn new(sheets: impl IntoIterator<Item = Sheet>) -> Self {
        Self {
            sheets: sheets.into_iter().map(|s| (s.slug.clone(), s)).collect(),
        }
    }

    /// Load every `.md` and `.txt` file below `dir`.
    pub fn from_directory(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        let mut sheets = Vec::new();
        collect(dir, dir, &mut sheets)?;
        tracing::info!(directory = %dir.display(), count = sheets.len(), "Loaded documentation sheets");
        Ok(Self::new(sheets))
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<Sheet>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect(root, &path, out)?;
            continue;
        }

        let is_sheet = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("md") | Some("txt")
        );
        if !is_sheet {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(&path).with_extension("");
        let slug = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let contents = fs::read_to_string(&path)?;
        out.push(Sheet::parse(&slug, &contents));
    }
    Ok(())
}

impl SheetRepository for InMemorySheets {
    fn all(&self) -> Vec<Sheet> {
        self.sheets.values().cloned().collect()
    }

    fn get(&self, slug: &str) -> Option<Sheet> {
        self.sheets.get(slug).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_title() {
        let sheet = Sheet::parse("intro", "# Getting started\n\nHello.");
        assert_eq!(sheet.title, "Getting started");
        assert_eq!(sheet.body, "Hello.");

        let untitled = Sheet::parse("notes", "plain text");
        assert_eq!(untitled.title, "notes");
        assert_eq!(untitled.body, "plain text");
    }

    #[test]
    fn test_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("intro.md"), "# Intro\nWelcome").unwrap();
        fs::create_dir(dir.path().join("guides")).unwrap();
        fs::write(dir.path().join("guides/setup.txt"), "# Setup\nSteps").unwrap();
        fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let sheets = InMemorySheets::from_directory(dir.path()).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets.get("guides/setup").unwrap().title, "Setup");

        let slugs: Vec<_> = sheets.all().into_iter().map(|s| s.slug).collect();
        assert_eq!(slugs, vec!["guides/setup", "intro"]);
    }

    #[test]
    fn test_missing_directory_is_error() {
        assert!(InMemorySheets::from_directory("/nonexistent/docs").is_err());
    }
}
