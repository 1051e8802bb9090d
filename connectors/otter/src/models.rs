use serde::Deserialize;
use shared::models::{speaker_label, SpeechDetail, SpeechSummary, TranscriptSegment};
use std::collections::BTreeMap;
use std::fmt;

/// Otter returns ids as numbers in some payloads and strings in others.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(i64),
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawId::Text(s) => f.write_str(s),
            RawId::Number(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub user: Option<OtterUser>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct OtterUser {
    pub id: Option<RawId>,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SpeechesResponse {
    #[serde(default)]
    pub speeches: Vec<OtterSpeech>,
    #[serde(default)]
    pub last_load_ts: Option<f64>,
    #[serde(default)]
    pub last_modified_at: Option<f64>,
    #[serde(default)]
    pub end_of_list: bool,
}

#[derive(Debug, Deserialize)]
pub struct SpeechResponse {
    pub speech: OtterSpeech,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtterSpeech {
    pub speech_id: String,
    pub otid: Option<String>,
    pub title: Option<String>,
    pub created_at: Option<i64>,
    pub summary: Option<String>,
    #[serde(default)]
    pub transcripts: Vec<OtterTranscript>,
    #[serde(default)]
    pub speakers: Vec<OtterSpeaker>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtterTranscript {
    #[serde(default)]
    pub transcript: String,
    pub start_offset: Option<f64>,
    pub end_offset: Option<f64>,
    pub speaker_id: Option<RawId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtterSpeaker {
    pub id: RawId,
    pub speaker_name: Option<String>,
}

fn offset_ms(offset: Option<f64>) -> u64 {
    offset.filter(|o| o.is_finite() && *o > 0.0).map(|o| o.round() as u64).unwrap_or(0)
}

impl OtterSpeech {
    /// Public share link. Falls back to the speech id when the payload has no otid.
    pub fn link(&self) -> String {
        SpeechSummary::link_for(self.otid.as_deref().unwrap_or(&self.speech_id))
    }

    pub fn to_summary(&self) -> SpeechSummary {
        SpeechSummary {
            id: self.speech_id.clone(),
            title: self.title.clone().unwrap_or_default(),
            created_at: self.created_at.unwrap_or_default(),
            summary: self.summary.clone().unwrap_or_default(),
            detail_link: self.link(),
        }
    }

    /// Joins each transcript line with the speaker list of the same payload.
    pub fn into_detail(self) -> SpeechDetail {
        let summary = self.to_summary();

        let speakers: BTreeMap<String, String> = self
            .speakers
            .into_iter()
            .filter_map(|s| s.speaker_name.map(|name| (s.id.to_string(), name)))
            .collect();

        let segments = self
            .transcripts
            .into_iter()
            .map(|t| {
                let speaker_id = t.speaker_id.map(|id| id.to_string());
                TranscriptSegment {
                    speaker_name: speaker_label(&speakers, speaker_id.as_deref()),
                    text: t.transcript,
                    start_offset_ms: offset_ms(t.start_offset),
                    end_offset_ms: offset_ms(t.end_offset),
                    speaker_id,
                }
            })
            .collect();

        SpeechDetail {
            summary,
            segments,
            speakers,
        }
    }
}
