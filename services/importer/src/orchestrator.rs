use chrono::{Local, NaiveDate};
use serde::Serialize;
use shared::error::ApiError;
use shared::models::{PageCursor, SpeechSummary};
use shared::source::SpeechSource;
use shared::utils::generate_ulid;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::render::{render_note, RenderOptions, RenderedNote};
use crate::settings::SettingsError;
use crate::tracker::{dedup_by_id, filter_new, ImportTracker};
use crate::writer::{BlockWriter, WriteError};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Where auto-imported notes go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    /// Written after the existing children of this parent.
    Append(String),
    /// Returned in the report for the caller to place. Nothing is recorded
    /// until the caller passes the placements to
    /// [`ImportOrchestrator::record_collected`].
    Collect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    pub speech_id: String,
    pub message: String,
}

/// A rendered note waiting to be placed by the caller, with the block uid it
/// should be written under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectedNote {
    pub speech_id: String,
    pub block_uid: String,
    pub note: RenderedNote,
}

impl CollectedNote {
    pub fn placement(&self) -> (String, String) {
        (self.speech_id.clone(), self.block_uid.clone())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    /// Speeches written and recorded by this run.
    pub imported_count: usize,
    /// Speech id to block uid, for every speech recorded by this run.
    pub new_imported_ids: BTreeMap<String, String>,
    pub failures: Vec<ImportFailure>,
    /// Filled only for [`ImportTarget::Collect`].
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<CollectedNote>,
}

enum Placed {
    Written(String),
    Collected(RenderedNote),
}

pub struct ImportOrchestrator {
    source: Arc<dyn SpeechSource>,
    writer: Arc<dyn BlockWriter>,
    tracker: ImportTracker,
    today: Option<NaiveDate>,
}

impl ImportOrchestrator {
    pub fn new(source: Arc<dyn SpeechSource>, writer: Arc<dyn BlockWriter>, tracker: ImportTracker) -> Self {
        Self {
            source,
            writer,
            tracker,
            today: None,
        }
    }

    /// Pins the date used for `{today}` / `{tomorrow}`.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn tracker(&self) -> &ImportTracker {
        &self.tracker
    }

    /// Fetches one speech and renders it. Nothing is written or recorded.
    pub async fn import_one(&self, speech_id: &str, options: &RenderOptions) -> Result<RenderedNote, ApiError> {
        let detail = self.source.fetch_detail(speech_id).await?;
        Ok(render_note(&detail, options, self.today()))
    }

    /// Manual import: writes the note at `parent`/`order` and records it.
    pub async fn import_and_write(
        &self,
        speech_id: &str,
        options: &RenderOptions,
        parent: &str,
        order: usize,
    ) -> Result<String, ImportError> {
        let note = self.import_one(speech_id, options).await?;
        let block_uid = self.writer.write_block(parent, order, &note).await?;
        self.tracker.mark_imported(speech_id, &block_uid).await?;
        info!("Imported speech {} into {} as block {}", speech_id, parent, block_uid);
        Ok(block_uid)
    }

    /// Pages through the remote list (up to `page_budget` pages when given),
    /// then imports every speech not yet recorded, one at a time.
    ///
    /// Listing and settings failures abort; a failure on one speech is recorded
    /// in the report and the batch moves on.
    pub async fn import_all_new(
        &self,
        options: &RenderOptions,
        target: &ImportTarget,
        page_budget: Option<usize>,
    ) -> Result<ImportReport, ImportError> {
        let window = self.collect_window(page_budget).await?;
        let imported = self.tracker.imported_ids().await?;
        let candidates = filter_new(&window, &imported);

        info!(
            "{} speeches listed, {} not imported yet",
            window.len(),
            candidates.len()
        );

        let mut next_order = match target {
            ImportTarget::Append(parent) => self.writer.child_count(parent).await?,
            ImportTarget::Collect => 0,
        };

        let mut report = ImportReport::default();
        for candidate in candidates {
            match self.import_candidate(&candidate.id, options, target, next_order).await {
                Ok(Placed::Written(block_uid)) => {
                    next_order += 1;
                    report.imported_count += 1;
                    report.new_imported_ids.insert(candidate.id.clone(), block_uid);
                }
                Ok(Placed::Collected(note)) => report.notes.push(CollectedNote {
                    speech_id: candidate.id.clone(),
                    block_uid: generate_ulid(),
                    note,
                }),
                Err(e) => {
                    warn!("Failed to import speech {}: {}", candidate.id, e);
                    report.failures.push(ImportFailure {
                        speech_id: candidate.id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Records `(speech id, block uid)` pairs the caller placed after an
    /// [`ImportTarget::Collect`] run. Call only once the notes are written.
    pub async fn record_collected(&self, placed: &[(String, String)]) -> Result<(), ImportError> {
        self.tracker.mark_all(placed).await?;
        info!("Recorded {} collected speeches", placed.len());
        Ok(())
    }

    async fn import_candidate(
        &self,
        speech_id: &str,
        options: &RenderOptions,
        target: &ImportTarget,
        order: usize,
    ) -> Result<Placed, ImportError> {
        let note = self.import_one(speech_id, options).await?;
        match target {
            ImportTarget::Append(parent) => {
                let block_uid = self.writer.write_block(parent, order, &note).await?;
                self.tracker.mark_imported(speech_id, &block_uid).await?;
                debug!("Wrote speech {} as block {}", speech_id, block_uid);
                Ok(Placed::Written(block_uid))
            }
            ImportTarget::Collect => Ok(Placed::Collected(note)),
        }
    }

    async fn collect_window(&self, page_budget: Option<usize>) -> Result<Vec<SpeechSummary>, ImportError> {
        let mut items = Vec::new();
        let mut cursor: Option<PageCursor> = None;
        let mut pages = 0usize;

        loop {
            if page_budget.is_some_and(|budget| pages >= budget) {
                debug!("Page budget of {} reached", pages);
                break;
            }

            let page = self.source.list_page(cursor).await?;
            pages += 1;

            // A cursor that did not move would hand back the same page forever.
            let stalled = page.next_cursor == cursor.unwrap_or_default();
            if stalled && !page.next_cursor.end_of_list {
                warn!("Listing cursor did not advance after {} pages, stopping", pages);
            }
            items.extend(page.items);
            let end = page.next_cursor.end_of_list;
            cursor = Some(page.next_cursor);

            if end || stalled {
                break;
            }
        }

        debug!("Listed {} pages", pages);
        Ok(dedup_by_id(items))
    }
}
