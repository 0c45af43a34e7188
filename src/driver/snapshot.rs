//! Driver over static HTML documents.
//!
//! Pages are registered by URL up front. Clicks on elements carrying
//! `data-href` (or `href` with `target="_blank"`) open a background tab on
//! that URL, which is how the dashboard's filing rows behave. Scripts are
//! recorded but not executed.

use std::collections::HashMap;

use ::scraper::{ElementRef, Html, Selector};

use super::{DriverError, ElementSnapshot, PageDriver, normalise_text};

/// Side effects observed by the driver, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Navigate(String),
    Click(String),
    ScriptClick(String),
    Script,
    TabOpened(String),
    TabSwitched(usize),
    TabClosed(String),
    Settle,
}

struct Tab {
    url: String,
    document: Html,
}

pub struct SnapshotDriver {
    pages: HashMap<String, String>,
    tabs: Vec<Tab>,
    active: usize,
    events: Vec<DriverEvent>,
}

impl SnapshotDriver {
    /// Driver with a single loaded page.
    pub fn from_html(url: &str, html: &str) -> Self {
        Self {
            pages: HashMap::from([(url.to_string(), html.to_string())]),
            tabs: vec![Tab {
                url: url.to_string(),
                document: Html::parse_document(html),
            }],
            active: 0,
            events: Vec::new(),
        }
    }

    /// Register a page reachable through `navigate` or a new-tab click.
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn events(&self) -> &[DriverEvent] {
        &self.events
    }

    fn document(&self) -> &Html {
        &self.tabs[self.active].document
    }

    fn parse_selector(selector: &str) -> Result<Selector, DriverError> {
        Selector::parse(selector).map_err(|_| DriverError::InvalidSelector(selector.to_string()))
    }

    fn first(&self, selector: &str) -> Result<Option<ElementRef<'_>>, DriverError> {
        let sel = Self::parse_selector(selector)?;
        Ok(self.document().select(&sel).next())
    }

    fn load(&self, url: &str) -> Result<Html, DriverError> {
        self.pages
            .get(url)
            .map(|html| Html::parse_document(html))
            .ok_or_else(|| DriverError::UnknownPage(url.to_string()))
    }

    fn activate(&mut self, selector: &str) -> Result<(), DriverError> {
        let target = {
            let el = self
                .first(selector)?
                .ok_or_else(|| DriverError::ElementNotFound(selector.to_string()))?;
            let attrs = el.value();
            attrs.attr("data-href").map(str::to_string).or_else(|| {
                (attrs.attr("target") == Some("_blank"))
                    .then(|| attrs.attr("href").map(str::to_string))
                    .flatten()
            })
        };

        if let Some(url) = target {
            let document = self.load(&url).unwrap_or_else(|_| Html::new_document());
            self.tabs.push(Tab { url: url.clone(), document });
            self.events.push(DriverEvent::TabOpened(url));
        }
        Ok(())
    }
}

fn snapshot(el: ElementRef<'_>) -> ElementSnapshot {
    ElementSnapshot {
        text: normalise_text(&el.text().collect::<String>()),
        attributes: el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

impl PageDriver for SnapshotDriver {
    fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        let document = self.load(url)?;
        let tab = &mut self.tabs[self.active];
        tab.url = url.to_string();
        tab.document = document;
        self.events.push(DriverEvent::Navigate(url.to_string()));
        Ok(())
    }

    fn click(&mut self, selector: &str) -> Result<(), DriverError> {
        self.activate(selector)?;
        self.events.push(DriverEvent::Click(selector.to_string()));
        Ok(())
    }

    fn click_via_script(&mut self, selector: &str) -> Result<(), DriverError> {
        self.activate(selector)?;
        self.events.push(DriverEvent::ScriptClick(selector.to_string()));
        Ok(())
    }

    fn run_script(&mut self, _script: &str) -> Result<(), DriverError> {
        self.events.push(DriverEvent::Script);
        Ok(())
    }

    fn read_text(&self, selector: &str) -> Result<String, DriverError> {
        Ok(self.first(selector)?.map(|el| snapshot(el).text).unwrap_or_default())
    }

    fn read_texts(&self, selector: &str) -> Result<Vec<String>, DriverError> {
        Ok(self.list_elements(selector)?.into_iter().map(|e| e.text).collect())
    }

    fn read_attribute(&self, selector: &str, name: &str) -> Result<Option<String>, DriverError> {
        Ok(self
            .first(selector)?
            .and_then(|el| el.value().attr(name).map(str::to_string)))
    }

    fn list_elements(&self, selector: &str) -> Result<Vec<ElementSnapshot>, DriverError> {
        let sel = Self::parse_selector(selector)?;
        Ok(self.document().select(&sel).map(snapshot).collect())
    }

    fn wait_for_stable_render(&mut self) {
        self.events.push(DriverEvent::Settle);
    }

    fn tab_count(&self) -> Result<usize, DriverError> {
        Ok(self.tabs.len())
    }

    fn switch_tab(&mut self, index: usize) -> Result<(), DriverError> {
        if index >= self.tabs.len() {
            return Err(DriverError::TabNotFound(index));
        }
        self.active = index;
        self.events.push(DriverEvent::TabSwitched(index));
        Ok(())
    }

    fn close_current_tab(&mut self) -> Result<(), DriverError> {
        if self.tabs.len() == 1 {
            return Err(DriverError::Browser("refusing to close the last tab".to_string()));
        }
        let tab = self.tabs.remove(self.active);
        self.active = self.active.min(self.tabs.len() - 1);
        self.events.push(DriverEvent::TabClosed(tab.url));
        Ok(())
    }

    fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.tabs[self.active].url.clone())
    }
}
