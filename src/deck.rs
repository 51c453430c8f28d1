use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlideKind {
    Cover,
    Section,
}

/// Reference to a legislative document attached to a section slide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SlideKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<DocumentRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    pub session_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// One agenda entry of a council session, turned into a section slide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgendaItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
}

/// Ordered, immutable slide sequence. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    slides: Vec<Slide>,
}

impl Deck {
    pub fn new(slides: Vec<Slide>) -> Result<Self> {
        if slides.is_empty() {
            return Err(anyhow!("a deck needs at least one slide"));
        }
        Ok(Self { slides })
    }

    /// Cover slide built from the session metadata, then one section per agenda item.
    pub fn for_session(meta: &SessionMeta, agenda: &[AgendaItem]) -> Self {
        let mut slides = Vec::with_capacity(agenda.len() + 1);
        slides.push(Slide {
            id: format!("{}-cover", meta.session_id),
            kind: SlideKind::Cover,
            title: meta.title.clone(),
            subtitle: meta.date.clone(),
            number: None,
            documents: Vec::new(),
        });
        slides.extend(agenda.iter().map(|item| Slide {
            id: item.id.clone(),
            kind: SlideKind::Section,
            title: item.title.clone(),
            subtitle: None,
            number: item.number.clone(),
            documents: item.documents.clone(),
        }));
        Self { slides }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let slides: Vec<Slide> =
            serde_json::from_str(content).context("deserialize deck slides")?;
        Self::new(slides)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read deck file {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Slide> {
        self.slides.get(index)
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }
}
