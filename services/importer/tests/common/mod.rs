#![allow(dead_code)]

pub mod mock_forwarding;

use async_trait::async_trait;
use otter_importer::render::RenderedNote;
use otter_importer::writer::{BlockWriter, WriteError};
use otter_importer::{ImportOrchestrator, ImportTracker, MemoryBlockWriter, MemorySettings};
use shared::error::ApiError;
use shared::models::{PageCursor, SpeechDetail, SpeechPage, SpeechSummary, TranscriptSegment};
use shared::source::SpeechSource;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn summary(id: &str) -> SpeechSummary {
    SpeechSummary {
        id: id.to_string(),
        title: format!("Meeting {}", id),
        created_at: 1_700_000_000,
        summary: format!("summary {}", id),
        detail_link: SpeechSummary::link_for(&format!("ot-{}", id)),
    }
}

pub fn detail(id: &str, segments: usize) -> SpeechDetail {
    SpeechDetail {
        summary: summary(id),
        segments: (0..segments as u64)
            .map(|i| TranscriptSegment {
                text: format!("{} line {}", id, i),
                start_offset_ms: i * 1000,
                end_offset_ms: i * 1000 + 900,
                speaker_id: Some("1".to_string()),
                speaker_name: "Ada Lovelace".to_string(),
            })
            .collect(),
        speakers: BTreeMap::from([("1".to_string(), "Ada Lovelace".to_string())]),
    }
}

pub fn ids(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{}{}", prefix, i)).collect()
}

/// In-memory speech list. Page `n` hands out a cursor with `last_load_ts = n + 1`.
#[derive(Default)]
pub struct FakeSource {
    pages: Vec<Vec<SpeechSummary>>,
    details: HashMap<String, SpeechDetail>,
    failing: HashSet<String>,
    failing_page: Option<usize>,
    stuck: bool,
    list_calls: AtomicUsize,
    fetches: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn with_pages(pages: Vec<Vec<String>>) -> Self {
        let mut source = Self::default();
        for page in pages {
            for id in &page {
                source.details.insert(id.clone(), detail(id, 2));
            }
            source.pages.push(page.iter().map(|id| summary(id)).collect());
        }
        source
    }

    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    /// Listing page `index` fails.
    pub fn failing_page(mut self, index: usize) -> Self {
        self.failing_page = Some(index);
        self
    }

    /// Every listing call returns the first page and the cursor it was given.
    pub fn stuck(mut self) -> Self {
        self.stuck = true;
        self
    }

    pub fn with_detail(mut self, detail: SpeechDetail) -> Self {
        self.details.insert(detail.summary.id.clone(), detail);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSource for FakeSource {
    async fn list_page(&self, cursor: Option<PageCursor>) -> Result<SpeechPage, ApiError> {
        if let Some(cursor) = cursor.filter(|c| c.end_of_list) {
            return Ok(SpeechPage::exhausted(cursor));
        }
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if self.stuck {
            return Ok(SpeechPage {
                items: self.pages.first().cloned().unwrap_or_default(),
                next_cursor: cursor.unwrap_or_default(),
            });
        }

        let index = cursor.map(|c| c.last_load_ts as usize).unwrap_or(0);
        if self.failing_page == Some(index) {
            return Err(ApiError::with_status(502, format!("Page {} is unavailable", index)));
        }
        let items = self.pages.get(index).cloned().unwrap_or_default();
        let position = (index + 1) as f64;
        Ok(SpeechPage {
            items,
            next_cursor: cursor.unwrap_or_default().advance(
                position,
                position,
                index + 1 >= self.pages.len(),
            ),
        })
    }

    async fn fetch_detail(&self, speech_id: &str) -> Result<SpeechDetail, ApiError> {
        self.fetches.lock().unwrap().push(speech_id.to_string());
        if self.failing.contains(speech_id) {
            return Err(ApiError::with_status(500, format!("Speech {} is unavailable", speech_id)));
        }
        self.details
            .get(speech_id)
            .cloned()
            .ok_or_else(|| ApiError::with_status(404, format!("Speech {} not found", speech_id)))
    }
}

/// Writer that rejects blocks whose label contains a marker.
pub struct RejectingWriter {
    pub inner: MemoryBlockWriter,
    pub marker: String,
}

#[async_trait]
impl BlockWriter for RejectingWriter {
    async fn child_count(&self, parent: &str) -> Result<usize, WriteError> {
        self.inner.child_count(parent).await
    }

    async fn write_block(&self, parent: &str, order: usize, note: &RenderedNote) -> Result<String, WriteError> {
        if note.text.contains(&self.marker) {
            return Err(WriteError::Rejected(format!("refusing {}", note.text)));
        }
        self.inner.write_block(parent, order, note).await
    }
}

pub struct Harness {
    pub source: Arc<FakeSource>,
    pub writer: Arc<MemoryBlockWriter>,
    pub settings: Arc<MemorySettings>,
    pub orchestrator: ImportOrchestrator,
}

pub fn harness(source: FakeSource) -> Harness {
    let source = Arc::new(source);
    let writer = Arc::new(MemoryBlockWriter::new());
    let settings = Arc::new(MemorySettings::new());
    let orchestrator = ImportOrchestrator::new(
        source.clone(),
        writer.clone(),
        ImportTracker::new(settings.clone()),
    );
    Harness {
        source,
        writer,
        settings,
        orchestrator,
    }
}
