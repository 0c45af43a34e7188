//! Live Chrome session over the DevTools protocol.
//!
//! Reads go through `Runtime.evaluate` with a `JSON.stringify` round trip so
//! SVG nodes (no `innerText`) and absent elements come back as plain values.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::{Browser, LaunchOptions, Tab};
use rand::Rng;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::{DriverError, ElementSnapshot, PageDriver};
use crate::config::BrowserConfig;

const TAB_POLL: Duration = Duration::from_millis(250);

pub struct ChromeDriver {
    browser: Browser,
    tab: Arc<Tab>,
    settle: Duration,
    jitter_ms: u64,
    tab_settle: Duration,
}

fn browser_err(e: impl std::fmt::Display) -> DriverError {
    DriverError::Browser(e.to_string())
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

impl ChromeDriver {
    pub fn launch(config: &BrowserConfig) -> Result<Self, DriverError> {
        info!(
            "Launching Chrome (headless={}, profile={:?})",
            config.headless, config.chrome_folder
        );

        let options = LaunchOptions {
            headless: config.headless,
            sandbox: false,
            user_data_dir: config.chrome_folder.clone(),
            window_size: Some((1920, 1080)),
            idle_browser_timeout: Duration::from_secs(600),
            args: vec![OsStr::new("--disable-blink-features=AutomationControlled")],
            ..Default::default()
        };

        let browser = Browser::new(options).map_err(browser_err)?;
        let tab = browser.new_tab().map_err(browser_err)?;

        let driver = Self {
            browser,
            tab,
            settle: Duration::from_millis(config.settle_ms),
            jitter_ms: config.jitter_ms,
            tab_settle: Duration::from_millis(config.tab_settle_ms),
        };
        driver.close_other_tabs()?;
        Ok(driver)
    }

    /// Leave only the working tab open, so it is tab 0.
    fn close_other_tabs(&self) -> Result<(), DriverError> {
        for tab in self.tabs()? {
            if !Arc::ptr_eq(&tab, &self.tab) {
                tab.close(false).map_err(browser_err)?;
            }
        }
        let deadline = Instant::now() + self.tab_settle;
        while self.tabs()?.len() > 1 && Instant::now() < deadline {
            std::thread::sleep(TAB_POLL);
        }
        debug!("{} tab(s) open after launch", self.tabs()?.len());
        Ok(())
    }

    /// Evaluate an expression producing a JSON string and decode it.
    fn eval_json<T: DeserializeOwned>(&self, expression: &str) -> Result<T, DriverError> {
        let remote = self
            .tab
            .evaluate(&format!("JSON.stringify({expression})"), false)
            .map_err(browser_err)?;

        let raw = match remote.value {
            Some(serde_json::Value::String(s)) => s,
            other => {
                return Err(DriverError::Browser(format!(
                    "unexpected evaluation result: {other:?}"
                )));
            }
        };
        serde_json::from_str(&raw).map_err(browser_err)
    }

    fn tabs(&self) -> Result<Vec<Arc<Tab>>, DriverError> {
        let tabs = self
            .browser
            .get_tabs()
            .lock()
            .map_err(|_| DriverError::Browser("tab list lock poisoned".to_string()))?;
        Ok(tabs.clone())
    }
}

impl PageDriver for ChromeDriver {
    fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        debug!("GET {}", url);
        self.tab
            .navigate_to(url)
            .map_err(browser_err)?
            .wait_until_navigated()
            .map_err(browser_err)?;
        Ok(())
    }

    fn click(&mut self, selector: &str) -> Result<(), DriverError> {
        let el = self
            .tab
            .find_element(selector)
            .map_err(|_| DriverError::ElementNotFound(selector.to_string()))?;
        el.click().map_err(browser_err)?;
        Ok(())
    }

    fn click_via_script(&mut self, selector: &str) -> Result<(), DriverError> {
        let clicked: bool = self.eval_json(&format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el) return false; el.click(); return true; }})()",
            sel = js_string(selector)
        ))?;
        if clicked {
            Ok(())
        } else {
            Err(DriverError::ElementNotFound(selector.to_string()))
        }
    }

    fn run_script(&mut self, script: &str) -> Result<(), DriverError> {
        self.tab.evaluate(script, false).map_err(browser_err)?;
        Ok(())
    }

    fn read_text(&self, selector: &str) -> Result<String, DriverError> {
        self.eval_json(&format!(
            "(() => {{ const el = document.querySelector({sel}); return el ? (el.innerText ?? el.textContent ?? '').trim() : ''; }})()",
            sel = js_string(selector)
        ))
    }

    fn read_texts(&self, selector: &str) -> Result<Vec<String>, DriverError> {
        self.eval_json(&format!(
            "Array.from(document.querySelectorAll({sel})).map(el => (el.innerText ?? el.textContent ?? '').trim())",
            sel = js_string(selector)
        ))
    }

    fn read_attribute(&self, selector: &str, name: &str) -> Result<Option<String>, DriverError> {
        self.eval_json(&format!(
            "(() => {{ const el = document.querySelector({sel}); return el ? el.getAttribute({name}) : null; }})()",
            sel = js_string(selector),
            name = js_string(name)
        ))
    }

    fn list_elements(&self, selector: &str) -> Result<Vec<ElementSnapshot>, DriverError> {
        self.eval_json(&format!(
            "Array.from(document.querySelectorAll({sel})).map(el => ({{ \
                text: (el.innerText ?? el.textContent ?? '').trim(), \
                attributes: Object.fromEntries(Array.from(el.attributes).map(a => [a.name, a.value])) \
            }}))",
            sel = js_string(selector)
        ))
    }

    fn count(&self, selector: &str) -> Result<usize, DriverError> {
        self.eval_json(&format!(
            "document.querySelectorAll({sel}).length",
            sel = js_string(selector)
        ))
    }

    fn wait_for_stable_render(&mut self) {
        let jitter = rand::rng().random_range(0..=self.jitter_ms);
        std::thread::sleep(self.settle + Duration::from_millis(jitter));
    }

    fn tab_count(&self) -> Result<usize, DriverError> {
        Ok(self.tabs()?.len())
    }

    fn switch_tab(&mut self, index: usize) -> Result<(), DriverError> {
        // New tabs register with the browser asynchronously.
        let deadline = Instant::now() + self.tab_settle;
        loop {
            let tabs = self.tabs()?;
            if let Some(tab) = tabs.get(index) {
                self.tab = Arc::clone(tab);
                self.tab.activate().map_err(browser_err)?;
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::TabNotFound(index));
            }
            std::thread::sleep(TAB_POLL);
        }
    }

    fn close_current_tab(&mut self) -> Result<(), DriverError> {
        self.tab.close(true).map_err(browser_err)?;
        Ok(())
    }

    fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.tab.get_url())
    }
}
