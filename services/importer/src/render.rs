use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use shared::models::{SpeechDetail, TranscriptSegment};
use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_LABEL: &str = "{title} - {summary} ({created-date})";
pub const DEFAULT_TEMPLATE: &str = "{start} - {end} - {text}";

/// The note outline accepts at most 300 blocks in one write; the label and
/// the notice take the rest.
pub const MAX_IMPORTED_SEGMENTS: usize = 295;
pub const TRUNCATION_NOTICE: &str = "Only the first 295 transcript lines were imported because a \
single write is limited to 300 blocks. Contact support if you need longer transcripts imported.";

pub const UNTITLED: &str = "Untitled";
const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TOKEN_PATTERN: &str = r"\{([A-Za-z][A-Za-z-]*)(?::([^}]*))?\}";

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(TOKEN_PATTERN).expect("token pattern is a valid regex"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub label: String,
    pub template: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// A `{text, children}` tree ready to be handed to a block writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedNote {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RenderedNote>,
}

impl RenderedNote {
    pub fn leaf(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            children: Vec::new(),
        }
    }

    /// Number of blocks this note produces, itself included.
    pub fn block_count(&self) -> usize {
        1 + self.children.iter().map(RenderedNote::block_count).sum::<usize>()
    }
}

/// Values a template may reference. Tokens without a binding are left as written.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: HashMap<&'static str, String>,
    created_at: Option<DateTime<Utc>>,
    speaker: Option<String>,
    today: Option<NaiveDate>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, token: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(token, value.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn resolve(&self, name: &str, arg: Option<&str>) -> Option<String> {
        match (name, arg) {
            ("created-date", arg) => self.created_at.map(|at| format_created_date(at, arg)),
            ("speaker", None) => self.speaker.clone(),
            ("speaker", Some(arg)) if arg.eq_ignore_ascii_case("initials") => {
                self.speaker.as_deref().map(speaker_initials)
            }
            ("today", None) => self.today.map(|d| format!("[[{}]]", daily_page_title(d))),
            ("tomorrow", None) => self
                .today
                .and_then(|d| d.checked_add_days(Days::new(1)))
                .map(|d| format!("[[{}]]", daily_page_title(d))),
            (name, None) => self.values.get(name).cloned(),
            _ => None,
        }
    }
}

/// Substitutes every `{token}` / `{token:arg}` in one pass. Token names are
/// case-insensitive; substituted values are never rescanned.
///
/// `{today}` and `{tomorrow}` resolve in the same pass as every other token,
/// so a `{today}` that arrives inside a substituted title stays literal
/// instead of becoming a daily page link.
pub fn render(template: &str, bindings: &Bindings) -> String {
    token_regex()
        .replace_all(template, |caps: &Captures| {
            let name = caps[1].to_ascii_lowercase();
            let arg = caps.get(2).map(|m| m.as_str());
            bindings
                .resolve(&name, arg)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Renders a fetched speech into a note: the label block with one child per
/// transcript segment, capped at [`MAX_IMPORTED_SEGMENTS`].
pub fn render_note(detail: &SpeechDetail, options: &RenderOptions, today: NaiveDate) -> RenderedNote {
    let summary = &detail.summary;
    let title = if summary.title.trim().is_empty() {
        UNTITLED
    } else {
        summary.title.as_str()
    };

    let mut label_bindings = Bindings::new()
        .with("title", title)
        .with("summary", summary.summary.as_str())
        .with("link", summary.detail_link.as_str())
        .with_today(today);
    if let Some(created_at) = DateTime::from_timestamp(summary.created_at, 0) {
        label_bindings = label_bindings.with_created_at(created_at);
    }

    let mut children: Vec<RenderedNote> = detail
        .segments
        .iter()
        .take(MAX_IMPORTED_SEGMENTS)
        .map(|segment| RenderedNote::leaf(render_segment(segment, &options.template, today)))
        .collect();

    if detail.segments.len() > MAX_IMPORTED_SEGMENTS {
        children.push(RenderedNote::leaf(TRUNCATION_NOTICE));
    }

    RenderedNote {
        text: render(&options.label, &label_bindings),
        children,
    }
}

fn render_segment(segment: &TranscriptSegment, template: &str, today: NaiveDate) -> String {
    let bindings = Bindings::new()
        .with("start", format_offset(segment.start_offset_ms))
        .with("end", format_offset(segment.end_offset_ms))
        .with("text", segment.text.as_str())
        .with_speaker(segment.speaker_name.as_str())
        .with_today(today);
    render(template, &bindings)
}

/// `m:ss` from a millisecond offset. Zero renders as `00:00`.
pub fn format_offset(offset_ms: u64) -> String {
    if offset_ms == 0 {
        return "00:00".to_string();
    }
    let total_seconds = offset_ms.saturating_add(500) / 1000;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// `Grace Brewster Hopper` -> `G.B.H.`
pub fn speaker_initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|part| part.chars().next())
        .flat_map(|c| c.to_uppercase().chain(std::iter::once('.')))
        .collect()
}

/// Title of the daily note for `date`, e.g. `October 16th, 2026`.
pub fn daily_page_title(date: NaiveDate) -> String {
    format!("{} {}, {}", date.format("%B"), ordinal(date.day()), date.year())
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// `{created-date:<pattern>}` takes date-fns patterns (`MMMM do, yyyy`,
/// `EEE h:mm a`, quoted `'literal'` text). An empty or unsupported pattern
/// falls back to the default format.
fn format_created_date(at: DateTime<Utc>, pattern: Option<&str>) -> String {
    pattern
        .filter(|p| !p.is_empty())
        .and_then(|p| format_date_pattern(at, p))
        .unwrap_or_else(|| at.format(DEFAULT_DATE_FORMAT).to_string())
}

fn format_date_pattern(at: DateTime<Utc>, pattern: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.next_if_eq(&'\'').is_some() {
                out.push('\'');
                continue;
            }
            loop {
                match chars.next()? {
                    '\'' if chars.next_if_eq(&'\'').is_some() => out.push('\''),
                    '\'' => break,
                    literal => out.push(literal),
                }
            }
            continue;
        }
        if !c.is_ascii_alphabetic() {
            out.push(c);
            continue;
        }

        let mut width = 1;
        while chars.next_if_eq(&c).is_some() {
            width += 1;
        }
        if c == 'd' && width == 1 && chars.next_if_eq(&'o').is_some() {
            out.push_str(&ordinal(at.day()));
            continue;
        }

        let spec = match (c, width) {
            ('y', 1) | ('y', 4) => "%Y",
            ('y', 2) => "%y",
            ('M', 1) => "%-m",
            ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', 4) => "%B",
            ('d', 1) => "%-d",
            ('d', 2) => "%d",
            ('E', 1..=3) => "%a",
            ('E', 4) => "%A",
            ('H', 1) => "%-H",
            ('H', 2) => "%H",
            ('h', 1) => "%-I",
            ('h', 2) => "%I",
            ('m', 1) => "%-M",
            ('m', 2) => "%M",
            ('s', 1) => "%-S",
            ('s', 2) => "%S",
            ('a', 1..=3) => "%p",
            _ => return None,
        };
        out.push_str(&at.format(spec).to_string());
    }

    Some(out)
}
