use async_trait::async_trait;
use dashmap::DashMap;
use shared::utils::generate_ulid;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::render::RenderedNote;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to write page {page}: {source}")]
    Io {
        page: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Block rejected: {0}")]
    Rejected(String),
}

/// Destination for rendered notes in the host outline.
#[async_trait]
pub trait BlockWriter: Send + Sync {
    /// Number of top-level blocks under `parent`.
    async fn child_count(&self, parent: &str) -> Result<usize, WriteError>;

    /// Writes `note` as the `order`-th child of `parent` and returns the new block id.
    /// An order past the end appends.
    async fn write_block(&self, parent: &str, order: usize, note: &RenderedNote) -> Result<String, WriteError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenBlock {
    pub uid: String,
    pub note: RenderedNote,
}

#[derive(Debug, Default)]
pub struct MemoryBlockWriter {
    pages: DashMap<String, Vec<WrittenBlock>>,
}

impl MemoryBlockWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self, parent: &str) -> Vec<WrittenBlock> {
        self.pages
            .get(parent)
            .map(|blocks| blocks.value().clone())
            .unwrap_or_default()
    }

    /// Seeds `parent` with plain blocks, as if the user had written them.
    pub fn seed(&self, parent: &str, texts: &[&str]) {
        let mut page = self.pages.entry(parent.to_string()).or_default();
        for text in texts {
            page.push(WrittenBlock {
                uid: generate_ulid(),
                note: RenderedNote::leaf(*text),
            });
        }
    }
}

#[async_trait]
impl BlockWriter for MemoryBlockWriter {
    async fn child_count(&self, parent: &str) -> Result<usize, WriteError> {
        Ok(self.pages.get(parent).map(|blocks| blocks.len()).unwrap_or(0))
    }

    async fn write_block(&self, parent: &str, order: usize, note: &RenderedNote) -> Result<String, WriteError> {
        let uid = generate_ulid();
        let mut page = self.pages.entry(parent.to_string()).or_default();
        let at = order.min(page.len());
        page.insert(
            at,
            WrittenBlock {
                uid: uid.clone(),
                note: note.clone(),
            },
        );
        Ok(uid)
    }
}

/// Writes each parent page as a markdown outline file `<dir>/<page>.md`.
///
/// Top-level blocks start with `- ` at column zero and carry their id as a
/// trailing `^uid` reference; children are indented two spaces per level.
pub struct MarkdownPageWriter {
    root: PathBuf,
    lock: Mutex<()>,
}

impl MarkdownPageWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn page_path(&self, page: &str) -> PathBuf {
        self.root.join(format!("{}.md", page_file_stem(page)))
    }

    async fn read_blocks(&self, path: &Path, page: &str) -> Result<(String, Vec<String>), WriteError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(split_top_level(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok((String::new(), Vec::new())),
            Err(source) => Err(WriteError::Io {
                page: page.to_string(),
                source,
            }),
        }
    }
}

#[async_trait]
impl BlockWriter for MarkdownPageWriter {
    async fn child_count(&self, parent: &str) -> Result<usize, WriteError> {
        let _guard = self.lock.lock().await;
        let (_, blocks) = self.read_blocks(&self.page_path(parent), parent).await?;
        Ok(blocks.len())
    }

    async fn write_block(&self, parent: &str, order: usize, note: &RenderedNote) -> Result<String, WriteError> {
        if note.text.trim().is_empty() {
            return Err(WriteError::Rejected("block text is empty".to_string()));
        }

        let _guard = self.lock.lock().await;
        let path = self.page_path(parent);
        let (preamble, mut blocks) = self.read_blocks(&path, parent).await?;

        let uid = generate_ulid();
        let mut chunk = String::new();
        push_outline(&mut chunk, note, 0, Some(&uid));
        let at = order.min(blocks.len());
        blocks.insert(at, chunk);

        let io_err = |source| WriteError::Io {
            page: parent.to_string(),
            source,
        };
        tokio::fs::create_dir_all(&self.root).await.map_err(io_err)?;
        let content = format!("{}{}", preamble, blocks.concat());
        tokio::fs::write(&path, content).await.map_err(io_err)?;

        debug!("Wrote block {} to {} at position {}", uid, path.display(), at);
        Ok(uid)
    }
}

fn push_outline(out: &mut String, note: &RenderedNote, depth: usize, uid: Option<&str>) {
    out.push_str(&"  ".repeat(depth));
    out.push_str("- ");
    out.push_str(&single_line(&note.text));
    if let Some(uid) = uid {
        out.push_str(" ^");
        out.push_str(uid);
    }
    out.push('\n');
    for child in &note.children {
        push_outline(out, child, depth + 1, None);
    }
}

fn single_line(text: &str) -> String {
    text.lines().map(str::trim_end).collect::<Vec<_>>().join(" ")
}

/// Splits a page into the text before the first block and one chunk per
/// top-level block (each chunk keeps its trailing newline).
fn split_top_level(content: &str) -> (String, Vec<String>) {
    let mut preamble = String::new();
    let mut blocks: Vec<String> = Vec::new();

    for line in content.split_inclusive('\n') {
        if line.starts_with("- ") {
            blocks.push(line.to_string());
        } else if let Some(current) = blocks.last_mut() {
            current.push_str(line);
        } else {
            preamble.push_str(line);
        }
    }

    if let Some(last) = blocks.last_mut() {
        if !last.ends_with('\n') {
            last.push('\n');
        }
    }

    (preamble, blocks)
}

fn page_file_stem(page: &str) -> String {
    let stem: String = page
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    if stem.is_empty() {
        "Untitled".to_string()
    } else {
        stem
    }
}
