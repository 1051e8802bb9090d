use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::{PageCursor, SpeechDetail, SpeechPage};

/// Read access to one user's speeches.
///
/// Implementations carry whatever authentication they need; callers never
/// pass credentials or cookies per call.
#[async_trait]
pub trait SpeechSource: Send + Sync {
    /// Fetches the page after `cursor`, or the first page when `cursor` is `None`.
    async fn list_page(&self, cursor: Option<PageCursor>) -> Result<SpeechPage, ApiError>;

    async fn fetch_detail(&self, speech_id: &str) -> Result<SpeechDetail, ApiError>;
}
