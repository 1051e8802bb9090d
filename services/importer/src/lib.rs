pub mod browser;
pub mod config;
pub mod credentials;
pub mod forwarding;
pub mod orchestrator;
pub mod render;
pub mod scheduler;
pub mod settings;
pub mod tracker;
pub mod writer;

pub use browser::SpeechBrowser;
pub use config::ImporterConfig;
pub use credentials::{CredentialSource, ImportCredentials, Password};
pub use forwarding::{ForwardingClient, ForwardingSource};
pub use orchestrator::{CollectedNote, ImportError, ImportOrchestrator, ImportReport, ImportTarget};
pub use render::{render, render_note, RenderOptions, RenderedNote};
pub use scheduler::AutoImportScheduler;
pub use settings::{JsonFileSettings, MemorySettings, SecretStore, SettingsStore};
pub use tracker::{filter_new, ImportTracker};
pub use writer::{BlockWriter, MarkdownPageWriter, MemoryBlockWriter};
