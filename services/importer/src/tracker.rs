use serde_json::Value;
use shared::models::SpeechSummary;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::settings::{SettingsError, SettingsStore, IMPORTED_IDS_KEY};

/// Keeps the candidates whose id is not in `imported`, in their original order.
pub fn filter_new<K>(candidates: &[SpeechSummary], imported: &BTreeMap<String, K>) -> Vec<SpeechSummary> {
    candidates
        .iter()
        .filter(|c| !imported.contains_key(&c.id))
        .cloned()
        .collect()
}

/// Drops repeated ids, keeping the first occurrence.
pub fn dedup_by_id(items: Vec<SpeechSummary>) -> Vec<SpeechSummary> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}

/// Persistent map of imported speech id to the id of the block it was written to.
///
/// Entries are only ever added, and only after the block was written.
#[derive(Clone)]
pub struct ImportTracker {
    settings: Arc<dyn SettingsStore>,
    write_lock: Arc<Mutex<()>>,
}

impl ImportTracker {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            settings,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn imported_ids(&self) -> Result<BTreeMap<String, String>, SettingsError> {
        self.settings.get_string_map(IMPORTED_IDS_KEY).await
    }

    pub async fn is_imported(&self, speech_id: &str) -> Result<bool, SettingsError> {
        Ok(self.imported_ids().await?.contains_key(speech_id))
    }

    pub async fn mark_imported(&self, speech_id: &str, block_uid: &str) -> Result<(), SettingsError> {
        self.mark_all(&[(speech_id.to_string(), block_uid.to_string())]).await
    }

    /// Records several `(speech id, block uid)` pairs in one settings write.
    pub async fn mark_all(&self, placed: &[(String, String)]) -> Result<(), SettingsError> {
        if placed.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let mut ids = self.imported_ids().await?;
        for (speech, block) in placed {
            ids.insert(speech.clone(), block.clone());
        }

        let value = Value::Object(
            ids.into_iter()
                .map(|(speech, block)| (speech, Value::String(block)))
                .collect(),
        );
        self.settings.set(IMPORTED_IDS_KEY, value).await
    }
}
