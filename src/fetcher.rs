use crate::config::CrawlConfig;
use crate::delay_manager::interruptible_sleep;
use crate::error::{CrawlError, Result};
use log::{debug, warn};
use rand::seq::SliceRandom;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

/// A loaded page. Error statuses are kept as ordinary pages; whether the body
/// is usable is up to the caller.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Anything that can turn a URL into a page.
pub trait PageSource {
    fn fetch(&self, url: &str) -> Result<Page>;
}

impl<S: PageSource + ?Sized> PageSource for &S {
    fn fetch(&self, url: &str) -> Result<Page> {
        (**self).fetch(url)
    }
}

pub struct HttpFetcher {
    client: Client,
    max_attempts: u32,
    retry_delay: Duration,
    stop: Arc<AtomicBool>,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .timeout(config.navigation_timeout())
            .default_headers(headers)
            .cookie_store(true)
            .build()?;

        Ok(HttpFetcher {
            client,
            max_attempts: config.fetch_attempts,
            retry_delay: config.retry_delay(),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Give up between attempts once `stop` is raised.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    fn visit_page(&self, url: &str) -> std::result::Result<Page, reqwest::Error> {
        let mut request = self.client.get(url);
        if let Some(ua) = USER_AGENTS.choose(&mut rand::thread_rng()) {
            request = request.header(USER_AGENT, *ua);
        }
        let resp = request.send()?;

        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            debug!("{} answered {}", url, status);
        }
        Ok(Page {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

impl PageSource for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Page> {
        with_retries(url, self.max_attempts, self.retry_delay, &self.stop, |u| self.visit_page(u))
    }
}

/// Run `op` up to `attempts` times, sleeping `delay` between failures.
/// A raised `stop` ends the loop before the next attempt with `Interrupted`.
pub fn with_retries<T, E, F>(url: &str, attempts: u32, delay: Duration, stop: &AtomicBool, mut op: F) -> Result<T>
where
    E: Display,
    F: FnMut(&str) -> std::result::Result<T, E>,
{
    let mut last_error = String::from("no attempt made");
    for attempt in 1..=attempts {
        if stop.load(Ordering::SeqCst) {
            return Err(CrawlError::Interrupted(url.to_string()));
        }
        match op(url) {
            Ok(value) => return Ok(value),
            Err(e) => {
                last_error = e.to_string();
                if attempt < attempts {
                    warn!(
                        "Attempt {} to load {} failed: {}. Retrying in {:.1} seconds...",
                        attempt,
                        url,
                        e,
                        delay.as_secs_f64()
                    );
                    if !interruptible_sleep(delay, stop) {
                        return Err(CrawlError::Interrupted(url.to_string()));
                    }
                } else {
                    warn!("Attempt {} to load {} failed: {}. Giving up.", attempt, url, e);
                }
            }
        }
    }
    Err(CrawlError::FetchExhausted {
        url: url.to_string(),
        attempts,
        last_error,
    })
}
