use chrono::DateTime;
use shared::error::ApiError;
use shared::models::{PageCursor, SpeechSummary};
use shared::source::SpeechSource;
use std::sync::Arc;
use tracing::debug;

use crate::render::UNTITLED;

pub const WINDOW_SIZE: usize = 10;

/// Pages through the remote list for a picker, ten speeches at a time.
///
/// Pages are loaded lazily: moving past the loaded items fetches one more
/// page unless the list already ended.
pub struct SpeechBrowser {
    source: Arc<dyn SpeechSource>,
    loaded: Vec<SpeechSummary>,
    cursor: Option<PageCursor>,
    offset: usize,
}

impl SpeechBrowser {
    pub fn new(source: Arc<dyn SpeechSource>) -> Self {
        Self {
            source,
            loaded: Vec::new(),
            cursor: None,
            offset: 0,
        }
    }

    /// Loads the first page if nothing was loaded yet.
    pub async fn open(&mut self) -> Result<&[SpeechSummary], ApiError> {
        if self.cursor.is_none() {
            self.load_more().await?;
        }
        Ok(self.window())
    }

    pub fn window(&self) -> &[SpeechSummary] {
        let start = self.offset.min(self.loaded.len());
        let end = (self.offset + WINDOW_SIZE).min(self.loaded.len());
        &self.loaded[start..end]
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn loaded(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_end(&self) -> bool {
        self.cursor.is_some_and(|c| c.end_of_list)
    }

    pub fn has_previous(&self) -> bool {
        self.offset > 0
    }

    pub fn has_next(&self) -> bool {
        !(self.is_end() && self.offset + WINDOW_SIZE >= self.loaded.len())
    }

    pub fn previous(&mut self) -> &[SpeechSummary] {
        self.offset = self.offset.saturating_sub(WINDOW_SIZE);
        self.window()
    }

    pub async fn next(&mut self) -> Result<&[SpeechSummary], ApiError> {
        if !self.has_next() {
            return Ok(self.window());
        }

        self.offset += WINDOW_SIZE;
        if !self.is_end() && self.offset >= self.loaded.len() {
            if let Err(e) = self.load_more().await {
                self.offset -= WINDOW_SIZE;
                return Err(e);
            }
        }
        Ok(self.window())
    }

    async fn load_more(&mut self) -> Result<(), ApiError> {
        let page = self.source.list_page(self.cursor).await?;
        debug!(
            "Browser loaded {} speeches (end_of_list: {})",
            page.items.len(),
            page.next_cursor.end_of_list
        );
        self.loaded.extend(page.items);
        self.cursor = Some(page.next_cursor);
        Ok(())
    }
}

/// One-line picker label: `Title - summary (2023-11-14 22:13)`.
pub fn picker_label(speech: &SpeechSummary) -> String {
    let title = if speech.title.trim().is_empty() {
        UNTITLED
    } else {
        speech.title.as_str()
    };
    let created = DateTime::from_timestamp(speech.created_at, 0)
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    format!("{} - {} ({})", title, speech.summary, created)
}
