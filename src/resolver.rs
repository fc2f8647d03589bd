//! Maps a roster name to its teammates-page URL.
//!
//! The site keys players by pids shaped like `jamesle01`: five letters of the
//! surname, two of the given name, then a two-digit counter that separates
//! players sharing the prefix. Known misfits come from the override table;
//! everyone else is found by walking the counter and checking the page
//! heading.

use crate::error::{CrawlError, Result};
use crate::extractor::heading_text;
use crate::fetcher::PageSource;
use crate::normalizer::{compact, normalize_name};
use crate::overrides::OverrideTable;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use url::Url;

const SURNAME_PREFIX: usize = 5;
const GIVEN_PREFIX: usize = 2;

static NEVER_STOP: AtomicBool = AtomicBool::new(false);

/// Split a roster name into (given name, surname). Three tokens mean a
/// two-word surname; longer names keep everything after the first token.
pub fn split_name(entity: &str) -> Result<(String, String)> {
    let tokens: Vec<&str> = entity.split_whitespace().collect();
    match tokens.as_slice() {
        [] | [_] => Err(CrawlError::InvalidName(entity.to_string())),
        [first, rest @ ..] => Ok((first.to_string(), rest.join(" "))),
    }
}

/// `surname[..5] + given[..2]` over letters only.
pub fn candidate_prefix(first_norm: &str, last_norm: &str) -> String {
    let last: String = compact(last_norm).chars().take(SURNAME_PREFIX).collect();
    let first: String = compact(first_norm).chars().take(GIVEN_PREFIX).collect();
    format!("{last}{first}")
}

pub fn candidate_id(prefix: &str, suffix: u32) -> String {
    format!("{prefix}{suffix:02}")
}

pub fn profile_url(base_url: &str, pid: &str) -> Result<String> {
    let url = Url::parse_with_params(base_url, &[("pid", pid), ("type", "t")])
        .map_err(|e| CrawlError::Config(format!("base_url {base_url:?}: {e}")))?;
    Ok(url.into())
}

/// Both names must appear in the heading; order and spacing don't matter.
fn heading_matches(heading_norm: &str, first_norm: &str, last_norm: &str) -> bool {
    let heading = compact(heading_norm);
    heading.contains(&compact(first_norm)) && heading.contains(&compact(last_norm))
}

pub struct Resolver<'a, S: PageSource + ?Sized> {
    source: &'a S,
    overrides: &'a OverrideTable,
    base_url: &'a str,
    max_suffix: u32,
    stop: &'a AtomicBool,
}

impl<'a, S: PageSource + ?Sized> Resolver<'a, S> {
    pub fn new(source: &'a S, overrides: &'a OverrideTable, base_url: &'a str, max_suffix: u32) -> Self {
        Resolver { source, overrides, base_url, max_suffix, stop: &NEVER_STOP }
    }

    /// Give up with `Interrupted` before the next candidate once `stop` is raised.
    pub fn with_stop_flag(mut self, stop: &'a AtomicBool) -> Self {
        self.stop = stop;
        self
    }

    pub fn resolve(&self, first: &str, last: &str) -> Result<String> {
        let first_norm = normalize_name(first);
        let last_norm = normalize_name(last);

        if let Some(pid) = self.overrides.lookup(&first_norm, &last_norm) {
            debug!("Using override {} for {} {}", pid, first, last);
            return profile_url(self.base_url, pid);
        }

        // Nothing to guess from; every heading would "contain" an empty surname.
        if compact(&last_norm).is_empty() {
            return Err(CrawlError::ResolutionFailure { first: first.to_string(), last: last.to_string() });
        }
        let prefix = candidate_prefix(&first_norm, &last_norm);

        for suffix in 1..=self.max_suffix {
            if self.stop.load(Ordering::SeqCst) {
                return Err(CrawlError::Interrupted(format!("{first} {last}")));
            }
            let pid = candidate_id(&prefix, suffix);
            let url = profile_url(self.base_url, &pid)?;
            let page = self.source.fetch(&url)?;
            let heading = normalize_name(&heading_text(&page.body));

            if heading_matches(&heading, &first_norm, &last_norm) {
                info!("Resolved {} {} to {}", first, last, pid);
                return Ok(url);
            }
            debug!("{} is {:?}, not {} {}", pid, heading, first, last);
        }

        Err(CrawlError::ResolutionFailure { first: first.to_string(), last: last.to_string() })
    }
}
