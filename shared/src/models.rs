use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const SPEECH_LINK_BASE: &str = "https://otter.ai/u";
pub const UNKNOWN_SPEAKER: &str = "Unknown";

/// One recording as it appears in the speech list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Unix seconds.
    #[serde(rename = "createdDate")]
    pub created_at: i64,
    #[serde(default)]
    pub summary: String,
    #[serde(rename = "link", default)]
    pub detail_link: String,
}

impl SpeechSummary {
    pub fn link_for(otid: &str) -> String {
        format!("{}/{}", SPEECH_LINK_BASE, otid)
    }
}

/// A transcript line. Offsets are milliseconds from the start of the recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    #[serde(rename = "start", default)]
    pub start_offset_ms: u64,
    #[serde(rename = "end", default)]
    pub end_offset_ms: u64,
    #[serde(rename = "speakerId", default, skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<String>,
    /// Display name joined from the speaker map, `Unknown` when unresolved.
    #[serde(rename = "speaker", default = "unknown_speaker")]
    pub speaker_name: String,
}

fn unknown_speaker() -> String {
    UNKNOWN_SPEAKER.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechDetail {
    #[serde(flatten)]
    pub summary: SpeechSummary,
    #[serde(rename = "transcripts", default)]
    pub segments: Vec<TranscriptSegment>,
    #[serde(default)]
    pub speakers: BTreeMap<String, String>,
}

impl SpeechDetail {
    pub fn id(&self) -> &str {
        &self.summary.id
    }
}

/// Resolves a speaker id against the speaker map of the same recording.
pub fn speaker_label(speakers: &BTreeMap<String, String>, speaker_id: Option<&str>) -> String {
    speaker_id
        .and_then(|id| speakers.get(id))
        .filter(|name| !name.is_empty())
        .cloned()
        .unwrap_or_else(unknown_speaker)
}

/// Resumable position in the remote speech list.
///
/// The cursor is timestamp based: the upstream resumes "after this point in
/// modification order", so items added concurrently are not skipped the way
/// an offset would skip them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageCursor {
    #[serde(rename = "lastLoad", default)]
    pub last_load_ts: f64,
    #[serde(rename = "lastModified", default)]
    pub last_modified_at: f64,
    #[serde(rename = "isEnd", default)]
    pub end_of_list: bool,
}

impl PageCursor {
    pub fn is_start(&self) -> bool {
        self.last_load_ts == 0.0 && self.last_modified_at == 0.0
    }

    /// Moves the cursor forward with the values reported by a page response.
    /// Timestamps never go backwards and `end_of_list` never resets.
    pub fn advance(&self, last_load_ts: f64, last_modified_at: f64, end_of_list: bool) -> Self {
        Self {
            last_load_ts: self.last_load_ts.max(last_load_ts),
            last_modified_at: self.last_modified_at.max(last_modified_at),
            end_of_list: self.end_of_list || end_of_list,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechPage {
    #[serde(rename = "speeches", default)]
    pub items: Vec<SpeechSummary>,
    #[serde(flatten)]
    pub next_cursor: PageCursor,
}

impl SpeechPage {
    /// The empty page returned for a cursor that already reached the end.
    pub fn exhausted(cursor: PageCursor) -> Self {
        Self {
            items: Vec::new(),
            next_cursor: PageCursor {
                end_of_list: true,
                ..cursor
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetSpeeches,
    GetSpeech,
    EncryptPassword,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::GetSpeeches => "GET_SPEECHES",
            Operation::GetSpeech => "GET_SPEECH",
            Operation::EncryptPassword => "ENCRYPT_PASSWORD",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET_SPEECHES" => Ok(Operation::GetSpeeches),
            "GET_SPEECH" => Ok(Operation::GetSpeech),
            "ENCRYPT_PASSWORD" => Ok(Operation::EncryptPassword),
            other => Err(other.to_string()),
        }
    }
}

/// Body of a call to the forwarding endpoint.
///
/// `operation` stays a plain string on the wire so that unknown operations
/// can be answered with a 400 instead of a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sealed_password: Option<String>,
    #[serde(default)]
    pub operation: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechParams {
    pub id: String,
}

/// Result of `ENCRYPT_PASSWORD`: the sealed password and the id of the key
/// that sealed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPassword {
    pub output: String,
    pub token: String,
}
