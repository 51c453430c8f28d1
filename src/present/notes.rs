//! Speaker notes and console font size, kept per window on local storage.
//! Nothing here is ever sent over the bus.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const MAX_NOTE_CHARS: usize = 5000;
pub const MIN_FONT_SIZE: u32 = 12;
pub const MAX_FONT_SIZE: u32 = 48;
const FONT_SIZE_STEP: u32 = 2;
const NOTES_FILE_NAME: &str = "presenter_notes.json";

fn default_font_size() -> u32 {
    18
}

pub fn default_notes_dir() -> PathBuf {
    dirs_next::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("council_projector")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct NotesDocument {
    #[serde(default = "default_font_size")]
    font_size: u32,
    /// session id -> slide id -> note text
    #[serde(default)]
    sessions: HashMap<String, HashMap<String, String>>,
}

impl Default for NotesDocument {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            sessions: HashMap::new(),
        }
    }
}

/// Truncates to at most [`MAX_NOTE_CHARS`] characters.
pub fn cap_note(text: &str) -> &str {
    match text.char_indices().nth(MAX_NOTE_CHARS) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[derive(Debug, Clone)]
pub struct NotesStore {
    path: PathBuf,
    document: NotesDocument,
}

impl NotesStore {
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(NOTES_FILE_NAME);
        let document = load_document(&path)?;
        Ok(Self { path, document })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn note(&self, session_id: &str, slide_id: &str) -> Option<&str> {
        self.document
            .sessions
            .get(session_id)
            .and_then(|notes| notes.get(slide_id))
            .map(String::as_str)
    }

    /// Stores the note (silently capped) and persists. Empty text removes it.
    pub fn set_note(&mut self, session_id: &str, slide_id: &str, text: &str) -> Result<()> {
        let capped = cap_note(text);
        if capped.len() < text.len() {
            tracing::debug!(session_id, slide_id, "speaker note truncated to cap");
        }
        let notes = self
            .document
            .sessions
            .entry(session_id.to_string())
            .or_default();
        if capped.trim().is_empty() {
            notes.remove(slide_id);
        } else {
            notes.insert(slide_id.to_string(), capped.to_string());
        }
        self.save()
    }

    pub fn font_size(&self) -> u32 {
        self.document.font_size
    }

    pub fn set_font_size(&mut self, size: u32) -> Result<u32> {
        self.document.font_size = size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        self.save()?;
        Ok(self.document.font_size)
    }

    pub fn increase_font_size(&mut self) -> Result<u32> {
        self.set_font_size(self.document.font_size.saturating_add(FONT_SIZE_STEP))
    }

    pub fn decrease_font_size(&mut self) -> Result<u32> {
        self.set_font_size(self.document.font_size.saturating_sub(FONT_SIZE_STEP))
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create notes folder {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.document)
            .context("serialize presenter notes")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("write presenter notes {}", self.path.display()))
    }
}

fn load_document(path: &Path) -> Result<NotesDocument> {
    if !path.exists() {
        return Ok(NotesDocument::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read presenter notes {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(NotesDocument::default());
    }
    serde_json::from_str(&content)
        .with_context(|| format!("deserialize presenter notes {}", path.display()))
}
