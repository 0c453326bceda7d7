//! In-memory page driver.
//!
//! Models a single static page with a fixed height and a fixed set of
//! clickable targets. Used for dry runs and tests where no browser is
//! available.
//!
//! Variant changes are applied from a small set of recognised keys:
//! `title`, `visible_text`, `page_height_px` and `add_targets`. Anything else
//! in the payload is ignored.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::SessionError;
use crate::domain::models::{ActionType, AgentAction, PageSnapshot};
use crate::domain::ports::{PageDriver, PageDriverFactory};

/// Static description of the simulated page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    pub title: String,
    pub visible_text: String,
    pub clickable_targets: Vec<String>,
    pub page_height_px: u32,
    pub viewport_height_px: u32,
    pub load_time_ms: u64,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            title: "Landing page".to_string(),
            visible_text: "Ship faster with fewer meetings. Start your free trial today. \
                           Plans from $12 per seat. Trusted by 4,000 teams."
                .to_string(),
            clickable_targets: vec![
                "#signup".to_string(),
                "#pricing".to_string(),
                "a.learn-more".to_string(),
                "button[type=submit]".to_string(),
            ],
            page_height_px: 3_200,
            viewport_height_px: 800,
            load_time_ms: 350,
        }
    }
}

impl PageLayout {
    fn apply(&mut self, changes: &Value) {
        if let Some(title) = changes.get("title").and_then(Value::as_str) {
            self.title = title.to_string();
        }
        if let Some(text) = changes.get("visible_text").and_then(Value::as_str) {
            self.visible_text = text.to_string();
        }
        if let Some(height) = changes
            .get("page_height_px")
            .and_then(Value::as_u64)
            .and_then(|h| u32::try_from(h).ok())
        {
            self.page_height_px = height;
        }
        if let Some(targets) = changes.get("add_targets").and_then(Value::as_array) {
            self.clickable_targets
                .extend(targets.iter().filter_map(Value::as_str).map(str::to_string));
        }
    }

    fn max_scroll(&self) -> u32 {
        self.page_height_px.saturating_sub(self.viewport_height_px)
    }
}

/// One simulated browsing context.
#[derive(Debug)]
pub struct SimulatedPage {
    base: PageLayout,
    layout: PageLayout,
    url: Option<String>,
    scroll_position_px: u32,
}

impl SimulatedPage {
    pub fn new(layout: PageLayout) -> Self {
        Self {
            base: layout.clone(),
            layout,
            url: None,
            scroll_position_px: 0,
        }
    }

    fn snapshot(&self) -> Result<PageSnapshot, SessionError> {
        let url = self
            .url
            .clone()
            .ok_or_else(|| SessionError::Page("page is not open".to_string()))?;

        Ok(PageSnapshot {
            url,
            title: self.layout.title.clone(),
            visible_text: self.layout.visible_text.clone(),
            clickable_targets: self.layout.clickable_targets.clone(),
            scroll_position_px: self.scroll_position_px,
            page_height_px: self.layout.page_height_px,
            viewport_height_px: self.layout.viewport_height_px,
            load_time_ms: self.layout.load_time_ms,
        })
    }

    fn require_target<'a>(&self, action: &'a AgentAction) -> Result<&'a str, SessionError> {
        let target = action.target.as_deref().ok_or_else(|| {
            SessionError::Page(format!("{} needs a target", action.action_type))
        })?;
        if self
            .layout
            .clickable_targets
            .iter()
            .any(|t| t.eq_ignore_ascii_case(target))
        {
            Ok(target)
        } else {
            Err(SessionError::Page(format!("no element matches '{target}'")))
        }
    }
}

#[async_trait]
impl PageDriver for SimulatedPage {
    async fn open(&mut self, url: &str, changes: Option<&Value>) -> Result<PageSnapshot, SessionError> {
        if url.trim().is_empty() {
            return Err(SessionError::Page("empty URL".to_string()));
        }

        self.layout = self.base.clone();
        if let Some(changes) = changes {
            self.layout.apply(changes);
        }
        self.url = Some(url.to_string());
        self.scroll_position_px = 0;
        self.snapshot()
    }

    async fn perform(&mut self, action: &AgentAction) -> Result<PageSnapshot, SessionError> {
        if self.url.is_none() {
            return Err(SessionError::Page("page is not open".to_string()));
        }

        match action.action_type {
            ActionType::Scroll => {
                let step = self.layout.viewport_height_px * 4 / 5;
                self.scroll_position_px = self
                    .scroll_position_px
                    .saturating_add(step)
                    .min(self.layout.max_scroll());
            }
            ActionType::Navigate => {
                if let Some(target) = &action.target {
                    self.url = Some(target.clone());
                    self.scroll_position_px = 0;
                }
            }
            ActionType::Click | ActionType::Hover => {
                self.require_target(action)?;
            }
            ActionType::Read
            | ActionType::Wait
            | ActionType::Leave
            | ActionType::Convert => {}
        }

        self.snapshot()
    }
}

/// Hands out fresh simulated pages sharing one layout.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPageFactory {
    layout: PageLayout,
}

impl SimulatedPageFactory {
    pub fn new(layout: PageLayout) -> Self {
        Self { layout }
    }
}

impl PageDriverFactory for SimulatedPageFactory {
    fn create(&self) -> Box<dyn PageDriver> {
        Box::new(SimulatedPage::new(self.layout.clone()))
    }
}
