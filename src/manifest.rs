//! The Quarto project file (`_quarto.yml`) and its `book.chapters` list.

use crate::error::ConvertError;
use serde_yaml::{Mapping, Sequence, Value};
use std::fs;
use std::path::Path;

pub const PROJECT_FILE: &str = "_quarto.yml";

/// Book title used when neither the user nor the document provides one
pub const DEFAULT_BOOK_TITLE: &str = "Converted Book";

/// Minimal book project with an empty chapter list.
pub fn default_project(title: &str) -> Value {
    let mut project = Mapping::new();
    project.insert("type".into(), "book".into());

    let mut book = Mapping::new();
    book.insert("title".into(), title.into());
    book.insert("chapters".into(), Value::Sequence(Sequence::new()));

    let mut root = Mapping::new();
    root.insert("project".into(), Value::Mapping(project));
    root.insert("book".into(), Value::Mapping(book));
    Value::Mapping(root)
}

/// Append each of `chapters` not already listed under `book.chapters`,
/// keeping the existing entries and their order. Returns how many were added.
///
/// Files listed inside Quarto parts (`- part: ...` with nested `chapters`)
/// count as present.
pub fn merge_chapters(config: &mut Value, chapters: &[String]) -> Result<usize, String> {
    if config.is_null() {
        *config = Value::Mapping(Mapping::new());
    }
    let root = config
        .as_mapping_mut()
        .ok_or_else(|| "top level is not a mapping".to_string())?;

    let book = child_or(root, "book", || Value::Mapping(Mapping::new()))
        .as_mapping_mut()
        .ok_or_else(|| "`book` is not a mapping".to_string())?;

    let list = child_or(book, "chapters", || Value::Sequence(Sequence::new()))
        .as_sequence_mut()
        .ok_or_else(|| "`book.chapters` is not a list".to_string())?;

    let mut present = Vec::new();
    collect_files(list, &mut present);

    let mut added = 0;
    for chapter in chapters {
        if present.iter().any(|p| p == chapter) {
            continue;
        }
        list.push(Value::String(chapter.clone()));
        present.push(chapter.clone());
        added += 1;
    }

    Ok(added)
}

/// Merge `chapters` into the project file at `path`, creating a default
/// project titled `title` when the file does not exist yet.
pub fn update_project_file(
    path: &Path,
    chapters: &[String],
    title: &str,
) -> Result<usize, ConvertError> {
    let mut config = if path.exists() {
        let text = fs::read_to_string(path)?;
        if text.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(&text)?
        }
    } else {
        tracing::warn!(path = %path.display(), "Project file not found, creating a basic config");
        default_project(title)
    };

    let added = merge_chapters(&mut config, chapters).map_err(|reason| {
        ConvertError::InvalidProject {
            path: path.to_path_buf(),
            reason,
        }
    })?;

    fs::write(path, serde_yaml::to_string(&config)?)?;
    tracing::info!(path = %path.display(), added, "Updated project chapters");

    Ok(added)
}

/// Mutable child `key` of `map`, inserting `default()` when it is missing or null.
fn child_or<'a>(map: &'a mut Mapping, key: &str, default: impl FnOnce() -> Value) -> &'a mut Value {
    let slot = map.entry(Value::from(key)).or_insert(Value::Null);
    if slot.is_null() {
        *slot = default();
    }
    slot
}

fn collect_files(entries: &Sequence, out: &mut Vec<String>) {
    for entry in entries {
        match entry {
            Value::String(file) => out.push(file.clone()),
            Value::Mapping(part) => {
                if let Some(Value::String(file)) = part.get("part") {
                    out.push(file.clone());
                }
                if let Some(Value::Sequence(nested)) = part.get("chapters") {
                    collect_files(nested, out);
                }
            }
            _ => {}
        }
    }
}
