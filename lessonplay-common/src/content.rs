//! Narratable content items and the playback queue

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Literal spoken after a narration to hand the turn to the learner
pub const REPEAT_AFTER_ME: &str = "Now your turn, Say:";

/// Kind of narratable content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentKind {
    Title,
    Prompt,
    Script,
    Narration,
    Exercise,
    Instruction,
    Writing,
    Speaking,
    #[serde(rename = "saytext")]
    SayText,
    UserPrompt,
}

impl ContentKind {
    /// Kinds whose start re-synchronizes the media panel
    pub fn drives_media(self) -> bool {
        matches!(self, Self::Exercise | Self::Narration | Self::SayText)
    }
}

/// One narratable unit of lesson text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub text: String,
    pub kind: ContentKind,
    /// Question or exercise this item was produced from
    pub source_id: String,
    /// Media hint from the owner's metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

/// Ordered, immutable playback queue
///
/// Insertion order is playback order. Item ids are unique: a colliding id is
/// suffixed with `#<n>` when the queue is assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentQueue {
    items: Vec<ContentItem>,
}

impl ContentQueue {
    /// Empty queue (playable no-op)
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a queue, renaming duplicate ids
    pub fn from_items(items: Vec<ContentItem>) -> Self {
        let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
        let items = items
            .into_iter()
            .map(|mut item| {
                if !seen.insert(item.id.clone()) {
                    let base = item.id.clone();
                    let mut n = 2;
                    while seen.contains(&format!("{}#{}", base, n)) {
                        n += 1;
                    }
                    item.id = format!("{}#{}", base, n);
                    seen.insert(item.id.clone());
                }
                item
            })
            .collect();
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ContentItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ContentItem> {
        self.items.iter()
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    /// Position of the item with the given id
    pub fn position(&self, item_id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == item_id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }
}

impl<'a> IntoIterator for &'a ContentQueue {
    type Item = &'a ContentItem;
    type IntoIter = std::slice::Iter<'a, ContentItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
