use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::orchestrator::{ImportError, ImportOrchestrator, ImportReport, ImportTarget};
use crate::render::{daily_page_title, RenderOptions, DEFAULT_LABEL, DEFAULT_TEMPLATE};
use crate::settings::{SettingsError, SettingsStore, AUTO_IMPORT_KEY, LABEL_KEY, TEMPLATE_KEY};

/// Label and template from the settings, defaults for anything unset or blank.
pub async fn load_render_options(settings: &dyn SettingsStore) -> Result<RenderOptions, SettingsError> {
    let label = settings
        .get_string(LABEL_KEY)
        .await?
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LABEL.to_string());
    let template = settings
        .get_string(TEMPLATE_KEY)
        .await?
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());
    Ok(RenderOptions { label, template })
}

/// Runs auto-import into today's daily page: once at startup when the
/// `auto-import` flag is set, then on every interval tick.
pub struct AutoImportScheduler {
    orchestrator: Arc<ImportOrchestrator>,
    settings: Arc<dyn SettingsStore>,
    interval: Option<Duration>,
    page_budget: Option<usize>,
}

impl AutoImportScheduler {
    pub fn new(
        orchestrator: Arc<ImportOrchestrator>,
        settings: Arc<dyn SettingsStore>,
        interval: Option<Duration>,
        page_budget: Option<usize>,
    ) -> Self {
        Self {
            orchestrator,
            settings,
            interval,
            page_budget,
        }
    }

    pub async fn run(&self) {
        match self.settings.get_flag(AUTO_IMPORT_KEY).await {
            Ok(true) => self.tick().await,
            Ok(false) => info!("Auto-import is disabled in the settings"),
            Err(e) => error!("Could not read the auto-import flag: {}", e),
        }

        let Some(period) = self.interval else {
            return;
        };

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately and the startup run already happened.
        ticker.tick().await;

        info!("Auto-import scheduler started, running every {} seconds", period.as_secs());

        loop {
            ticker.tick().await;
            match self.settings.get_flag(AUTO_IMPORT_KEY).await {
                Ok(true) => self.tick().await,
                Ok(false) => debug!("Auto-import disabled, skipping tick"),
                Err(e) => error!("Could not read the auto-import flag: {}", e),
            }
        }
    }

    async fn tick(&self) {
        let page = daily_page_title(self.orchestrator.today());
        match self.run_once(&page).await {
            Ok(report) => {
                info!(
                    "Imported {} latest otter recordings automatically to {}",
                    report.imported_count, page
                );
                if !report.failures.is_empty() {
                    warn!("{} recordings failed to import", report.failures.len());
                }
            }
            Err(e) => error!("Auto-import into {} failed: {}", page, e),
        }
    }

    pub async fn run_once(&self, page: &str) -> Result<ImportReport, ImportError> {
        let options = load_render_options(self.settings.as_ref()).await?;
        self.orchestrator
            .import_all_new(&options, &ImportTarget::Append(page.to_string()), self.page_budget)
            .await
    }
}
