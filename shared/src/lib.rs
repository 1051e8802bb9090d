pub mod error;
pub mod models;
pub mod source;
pub mod telemetry;
pub mod utils;

pub use error::{ApiError, AuthError};
pub use models::{
    ForwardRequest, Operation, PageCursor, SealedPassword, SpeechDetail, SpeechPage,
    SpeechSummary, TranscriptSegment,
};
pub use source::SpeechSource;
