use crate::config::CrawlConfig;
use crate::delay_manager::{interruptible_sleep, DelayPolicy, Throttle};
use crate::error::{CrawlError, Result};
use crate::extractor::{extract_teammates, TableLocator};
use crate::fetcher::PageSource;
use crate::graph_store::GraphStore;
use crate::overrides::OverrideTable;
use crate::resolver::{split_name, Resolver};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// How one player's attempt ended. Only `Done` reaches the graph; the
/// failures leave the player out so the next run tries again.
#[derive(Debug)]
pub enum Outcome {
    Done { teammates: usize },
    ResolutionFailed(CrawlError),
    FetchFailed(CrawlError),
    Interrupted,
}

/// An interrupt is not the player's fault; keep it apart from real failures.
fn classify(e: CrawlError, failed: fn(CrawlError) -> Outcome) -> Outcome {
    match e {
        CrawlError::Interrupted(what) => {
            debug!("Stopped while working on {}", what);
            Outcome::Interrupted
        }
        other => failed(other),
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub total: usize,
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
    pub interrupted: bool,
}

pub struct Crawler<S: PageSource> {
    source: S,
    overrides: OverrideTable,
    config: CrawlConfig,
    locator: TableLocator,
    throttle: Box<dyn Throttle>,
    stop: Arc<AtomicBool>,
}

impl<S: PageSource> Crawler<S> {
    pub fn new(source: S, overrides: OverrideTable, config: CrawlConfig) -> Result<Self> {
        config.validate()?;
        let locator = TableLocator::new(&config.table_id)?;
        let delay = DelayPolicy { base: config.request_delay(), jitter: config.delay_jitter() };
        Ok(Crawler {
            source,
            overrides,
            config,
            locator,
            throttle: Box::new(delay),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Share a flag that stops the run between players when raised.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Replace the configured inter-player delay.
    pub fn with_throttle(mut self, throttle: impl Throttle + 'static) -> Self {
        self.throttle = Box::new(throttle);
        self
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Crawl every roster name not yet in `store`.
    ///
    /// Per-player failures are logged and skipped. The only error returned is
    /// a failed checkpoint flush, since nothing after it could be saved.
    pub fn run(&self, entities: &[String], store: &mut GraphStore) -> Result<CrawlSummary> {
        let total = entities.len();
        let mut summary = CrawlSummary { total, ..Default::default() };
        let mut since_checkpoint = 0;

        for (idx, entity) in entities.iter().enumerate() {
            let idx = idx + 1;
            if self.stopped() {
                summary.interrupted = true;
                break;
            }

            if store.contains(entity) {
                info!("[{}/{}] Skipped {} (already in map)", idx, total, entity);
                summary.skipped += 1;
                continue;
            }

            let outcome = match self.process_entity(entity) {
                Ok(teammates) => {
                    // Work finished after an interrupt is discarded, never half-kept.
                    if self.stopped() {
                        summary.interrupted = true;
                        break;
                    }
                    let count = teammates.len();
                    store.put(entity, teammates);
                    Outcome::Done { teammates: count }
                }
                Err(e) => e,
            };

            match &outcome {
                Outcome::Done { teammates } => {
                    info!("[{}/{}] Added {} with {} teammates", idx, total, entity, teammates);
                    summary.added += 1;
                    since_checkpoint += 1;
                    if self.config.checkpoint_every > 0 && since_checkpoint >= self.config.checkpoint_every {
                        store.flush_if_dirty()?;
                        since_checkpoint = 0;
                    }
                }
                Outcome::ResolutionFailed(e) | Outcome::FetchFailed(e) => {
                    error!("[{}/{}] Error processing {}: {}", idx, total, entity, e);
                    summary.failed += 1;
                }
                Outcome::Interrupted => {
                    summary.interrupted = true;
                    break;
                }
            }

            if !self.throttle.pause(&self.stop) {
                summary.interrupted = true;
                break;
            }
        }

        if summary.interrupted {
            warn!("Crawl interrupted; completed players are kept, the one in flight is dropped.");
        }
        info!(
            "Crawl finished: {} added, {} skipped, {} failed of {}.",
            summary.added, summary.skipped, summary.failed, total
        );
        Ok(summary)
    }

    /// Resolve then fetch one player. The error side already carries the
    /// stage that failed.
    fn process_entity(&self, entity: &str) -> std::result::Result<Vec<String>, Outcome> {
        let (first, last) = split_name(entity).map_err(Outcome::ResolutionFailed)?;

        let resolver = Resolver::new(&self.source, &self.overrides, &self.config.base_url, self.config.max_suffix)
            .with_stop_flag(&self.stop);
        let url = resolver
            .resolve(&first, &last)
            .map_err(|e| classify(e, Outcome::ResolutionFailed))?;

        self.fetch_teammates(entity, &url)
            .map_err(|e| classify(e, Outcome::FetchFailed))
    }

    /// Load the profile and wait (bounded by `table_timeout`) for the
    /// teammates table. A table that never shows up means no teammates.
    fn fetch_teammates(&self, entity: &str, url: &str) -> Result<Vec<String>> {
        let started = Instant::now();
        loop {
            let page = self.source.fetch(url)?;
            if let Some(table) = self.locator.find(&page.body) {
                return Ok(extract_teammates(&table));
            }

            if started.elapsed() >= self.config.table_timeout() || self.stopped() {
                let missing = CrawlError::MissingRelationshipTable {
                    entity: entity.to_string(),
                    table_id: self.locator.table_id().to_string(),
                };
                warn!("{} ({} answered {}); recording no teammates.", missing, page.url, page.status);
                return Ok(Vec::new());
            }

            debug!("No #{} yet for {}; checking again.", self.locator.table_id(), entity);
            interruptible_sleep(self.config.table_poll_interval(), &self.stop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BASE_URL;
    use crate::fetcher::mock::ScriptedSource;
    use crate::resolver::profile_url;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Counts pauses instead of sleeping.
    struct CountingThrottle(Rc<Cell<usize>>);

    impl Throttle for CountingThrottle {
        fn pause(&self, _stop: &AtomicBool) -> bool {
            self.0.set(self.0.get() + 1);
            true
        }
    }

    fn url(pid: &str) -> String {
        profile_url(DEFAULT_BASE_URL, pid).unwrap()
    }

    fn quick_config() -> CrawlConfig {
        CrawlConfig {
            request_delay_secs: 0.0,
            retry_delay_secs: 0.0,
            table_timeout_secs: 0.0,
            table_poll_secs: 0.0,
            checkpoint_every: 0,
            ..Default::default()
        }
    }

    fn profile(name: &str, teammates: &[&str]) -> String {
        let rows: String = teammates
            .iter()
            .map(|t| format!(r#"<tr><td data-stat="pid2"><a>{t}</a></td></tr>"#))
            .collect();
        format!(
            r#"<html><body><h1>{name} Teammates and Opponents</h1>
            <table id="teammates-and-opponents"><thead><tr><th>Teammate</th></tr></thead><tbody>{rows}</tbody></table>
            </body></html>"#
        )
    }

    fn roster(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builds_graph_for_two_players() {
        let source = ScriptedSource::new()
            .page(&url("jamesle01"), &profile("LeBron James", &["Anthony Davis", "Kyrie Irving*"]))
            .page(&url("davisan01"), &profile("Antonio Davis", &[]))
            .page(&url("davisan02"), &profile("Anthony Davis", &["LeBron James"]));
        let crawler = Crawler::new(&source, OverrideTable::default(), quick_config()).unwrap();
        let mut store = GraphStore::empty("unused.json");

        let summary = crawler.run(&roster(&["LeBron James", "Anthony Davis"]), &mut store).unwrap();

        assert_eq!(summary.added, 2);
        assert_eq!(store.get("LeBron James").unwrap(), ["Anthony Davis", "Kyrie Irving"]);
        assert_eq!(store.get("Anthony Davis").unwrap(), ["LeBron James"]);
        assert!(store.is_dirty());
    }

    #[test]
    fn stored_players_are_not_fetched() {
        let source = ScriptedSource::new();
        let crawler = Crawler::new(&source, OverrideTable::default(), quick_config()).unwrap();
        let mut store = GraphStore::empty("unused.json");
        store.put("LeBron James", vec!["Anthony Davis".into()]);
        store.flush_if_dirty().ok();

        let summary = crawler.run(&roster(&["LeBron James"]), &mut store).unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(source.request_count(), 0);
        assert_eq!(store.get("LeBron James").unwrap(), ["Anthony Davis"]);
    }

    #[test]
    fn failures_do_not_stop_the_run() {
        let source = ScriptedSource::new()
            .broken(&url("jamesle01"))
            .page(&url("davisan01"), &profile("Anthony Davis", &["LeBron James"]));
        let crawler = Crawler::new(&source, OverrideTable::default(), quick_config()).unwrap();
        let mut store = GraphStore::empty("unused.json");

        let summary = crawler
            .run(&roster(&["LeBron James", "Nene", "Zzz Nobody", "Anthony Davis"]), &mut store)
            .unwrap();

        assert_eq!(summary, CrawlSummary { total: 4, added: 1, skipped: 0, failed: 3, interrupted: false });
        assert!(!store.contains("LeBron James"));
        assert!(store.contains("Anthony Davis"));
    }

    #[test]
    fn missing_table_records_empty_list() {
        let source = ScriptedSource::new()
            .page(&url("jamesle01"), "<html><body><h1>LeBron James</h1><p>loading</p></body></html>");
        let crawler = Crawler::new(&source, OverrideTable::default(), quick_config()).unwrap();
        let mut store = GraphStore::empty("unused.json");

        crawler.run(&roster(&["LeBron James"]), &mut store).unwrap();

        assert_eq!(store.get("LeBron James").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn override_players_fetch_only_their_profile() {
        let source = ScriptedSource::new()
            .page(&url("pendeje02"), &profile("Jeff Pendergraph", &["Tim Duncan"]));
        let overrides = OverrideTable::bundled().unwrap();
        let crawler = Crawler::new(&source, overrides, quick_config()).unwrap();
        let mut store = GraphStore::empty("unused.json");

        crawler.run(&roster(&["Jeff Ayres"]), &mut store).unwrap();

        assert_eq!(*source.requests.borrow(), vec![url("pendeje02")]);
        assert_eq!(store.get("Jeff Ayres").unwrap(), ["Tim Duncan"]);
    }

    #[test]
    fn raised_stop_flag_ends_run_before_work() {
        let source = ScriptedSource::new();
        let stop = Arc::new(AtomicBool::new(true));
        let crawler = Crawler::new(&source, OverrideTable::default(), quick_config())
            .unwrap()
            .with_stop_flag(stop);
        let mut store = GraphStore::empty("unused.json");

        let summary = crawler.run(&roster(&["LeBron James"]), &mut store).unwrap();

        assert!(summary.interrupted);
        assert_eq!(source.request_count(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn checkpoints_flush_during_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player_map.json");
        let source = ScriptedSource::new()
            .page(&url("jamesle01"), &profile("LeBron James", &["Anthony Davis"]));
        let config = CrawlConfig { checkpoint_every: 1, ..quick_config() };
        let crawler = Crawler::new(&source, OverrideTable::default(), config).unwrap();
        let mut store = GraphStore::load(&path);

        crawler.run(&roster(&["LeBron James"]), &mut store).unwrap();

        assert!(!store.is_dirty());
        assert!(GraphStore::load(&path).contains("LeBron James"));
    }

    #[test]
    fn interrupt_during_suffix_search_stops_after_current_request() {
        let stop = Arc::new(AtomicBool::new(false));
        let source = ScriptedSource::new().raising(stop.clone());
        let crawler = Crawler::new(&source, OverrideTable::default(), quick_config())
            .unwrap()
            .with_stop_flag(stop);
        let mut store = GraphStore::empty("unused.json");

        let summary = crawler.run(&roster(&["Nobody Atall", "LeBron James"]), &mut store).unwrap();

        assert_eq!(source.request_count(), 1);
        assert_eq!(*source.requests.borrow(), vec![url("atallno01")]);
        assert!(summary.interrupted);
        assert_eq!(summary.failed, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn pauses_once_per_player_worked_on() {
        let pauses = Rc::new(Cell::new(0));
        let source = ScriptedSource::new()
            .page(&url("davisan01"), &profile("Anthony Davis", &["LeBron James"]));
        let crawler = Crawler::new(&source, OverrideTable::default(), quick_config())
            .unwrap()
            .with_throttle(CountingThrottle(pauses.clone()));
        let mut store = GraphStore::empty("unused.json");
        store.put("LeBron James", vec!["Anthony Davis".into()]);

        let summary = crawler
            .run(&roster(&["LeBron James", "Anthony Davis", "Nene"]), &mut store)
            .unwrap();

        assert_eq!(summary, CrawlSummary { total: 3, added: 1, skipped: 1, failed: 1, interrupted: false });
        assert_eq!(pauses.get(), 2);
    }

    #[test]
    fn skipped_players_never_pause() {
        let pauses = Rc::new(Cell::new(0));
        let source = ScriptedSource::new();
        let crawler = Crawler::new(&source, OverrideTable::default(), quick_config())
            .unwrap()
            .with_throttle(CountingThrottle(pauses.clone()));
        let mut store = GraphStore::empty("unused.json");
        store.put("LeBron James", Vec::new());
        store.put("Anthony Davis", Vec::new());

        crawler.run(&roster(&["LeBron James", "Anthony Davis"]), &mut store).unwrap();

        assert_eq!(pauses.get(), 0);
    }
}
