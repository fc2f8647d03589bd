//! End-to-end crawls against canned pages, persisted to a temp directory.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;

use teammate_graph_lib::config::DEFAULT_BASE_URL;
use teammate_graph_lib::resolver::profile_url;
use teammate_graph_lib::{CrawlConfig, CrawlError, Crawler, GraphStore, OverrideTable, Page, PageSource, StoreGuard};
use tempfile::tempdir;

#[derive(Default)]
struct CannedSite {
    pages: HashMap<String, String>,
    hits: RefCell<Vec<String>>,
}

impl CannedSite {
    fn with(mut self, pid: &str, name: &str, teammates: &[&str]) -> Self {
        let rows: String = teammates
            .iter()
            .map(|t| format!(r#"<tr><td data-stat="pid2"><a href="/players/x/x01.html">{t}</a></td><td data-stat="g">82</td></tr>"#))
            .collect();
        let body = format!(
            r#"<html><body><div id="info"><h1><span>{name} Teammates and Opponents</span></h1></div>
            <table id="teammates-and-opponents">
              <thead><tr><th data-stat="pid2">Teammate</th><th data-stat="g">G</th></tr></thead>
              <tbody>{rows}</tbody>
            </table></body></html>"#
        );
        self.pages.insert(url(pid), body);
        self
    }
}

impl PageSource for CannedSite {
    fn fetch(&self, url: &str) -> Result<Page, CrawlError> {
        self.hits.borrow_mut().push(url.to_string());
        let (status, body) = match self.pages.get(url) {
            Some(body) => (200, body.clone()),
            None => (404, "<html><body><h1>Page Not Found (404 error)</h1></body></html>".to_string()),
        };
        Ok(Page { url: url.to_string(), status, body })
    }
}

fn url(pid: &str) -> String {
    profile_url(DEFAULT_BASE_URL, pid).unwrap()
}

fn no_waiting() -> CrawlConfig {
    CrawlConfig {
        request_delay_secs: 0.0,
        retry_delay_secs: 0.0,
        table_timeout_secs: 0.0,
        table_poll_secs: 0.0,
        ..Default::default()
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn crawl_persists_and_resumes() {
    let dir = tempdir().unwrap();
    let graph_path = dir.path().join("player_map.json");
    let site = CannedSite::default()
        .with("jamesle01", "LeBron James", &["Anthony Davis", "Kyrie Irving"])
        .with("davisan02", "Anthony Davis", &["LeBron James"]);

    {
        let crawler = Crawler::new(&site, OverrideTable::bundled().unwrap(), no_waiting()).unwrap();
        let mut store = StoreGuard::new(GraphStore::load(&graph_path));
        let summary = crawler.run(&names(&["LeBron James", "Anthony Davis"]), &mut store).unwrap();
        assert_eq!(summary.added, 2);
        // Each added player is already on disk, so the final flush has nothing left.
        assert!(graph_path.exists());
        assert!(!store.finish().unwrap());
    }

    let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&graph_path).unwrap()).unwrap();
    assert_eq!(
        saved,
        serde_json::json!({
            "LeBron James": ["Anthony Davis", "Kyrie Irving"],
            "Anthony Davis": ["LeBron James"]
        })
    );

    // Second run: everything is already mapped, so no requests and no rewrite.
    let before = fs::metadata(&graph_path).unwrap().modified().unwrap();
    site.hits.borrow_mut().clear();
    let crawler = Crawler::new(&site, OverrideTable::bundled().unwrap(), no_waiting()).unwrap();
    let mut store = StoreGuard::new(GraphStore::load(&graph_path));
    let summary = crawler.run(&names(&["LeBron James", "Anthony Davis"]), &mut store).unwrap();

    assert_eq!(summary.skipped, 2);
    assert!(site.hits.borrow().is_empty());
    assert!(!store.finish().unwrap());
    assert_eq!(fs::metadata(&graph_path).unwrap().modified().unwrap(), before);
}

#[test]
fn unresolvable_roster_writes_nothing() {
    let dir = tempdir().unwrap();
    let graph_path = dir.path().join("player_map.json");
    let site = CannedSite::default();

    let crawler = Crawler::new(&site, OverrideTable::default(), no_waiting()).unwrap();
    let mut store = StoreGuard::new(GraphStore::load(&graph_path));
    let summary = crawler.run(&names(&["Ghost Player", "Another Ghost"]), &mut store).unwrap();

    assert_eq!(summary.failed, 2);
    assert!(store.is_empty());
    assert!(!store.finish().unwrap());
    assert!(!graph_path.exists());
    // 9 candidate pages per player, nothing else.
    assert_eq!(site.hits.borrow().len(), 18);
}

#[test]
fn overridden_compound_surname_is_crawled_directly() {
    let dir = tempdir().unwrap();
    let graph_path = dir.path().join("player_map.json");
    let site = CannedSite::default().with("batesbi01", "Billy Ray Bates", &["Mychal Thompson"]);

    let crawler = Crawler::new(&site, OverrideTable::bundled().unwrap(), no_waiting()).unwrap();
    let mut store = StoreGuard::new(GraphStore::load(&graph_path));
    crawler.run(&names(&["Billy Ray Bates"]), &mut store).unwrap();

    assert_eq!(*site.hits.borrow(), vec![url("batesbi01")]);
    assert_eq!(store.get("Billy Ray Bates").unwrap(), ["Mychal Thompson"]);
}

#[test]
fn corrupt_graph_is_replaced_after_a_crawl() {
    let dir = tempdir().unwrap();
    let graph_path = dir.path().join("player_map.json");
    fs::write(&graph_path, "not json at all").unwrap();
    let site = CannedSite::default().with("jamesle01", "LeBron James", &[]);

    let crawler = Crawler::new(&site, OverrideTable::default(), no_waiting()).unwrap();
    {
        let mut store = StoreGuard::new(GraphStore::load(&graph_path));
        crawler.run(&names(&["LeBron James"]), &mut store).unwrap();
        // dropped without finish(): the guard still flushes
    }

    let reloaded = GraphStore::load(&graph_path);
    assert_eq!(reloaded.get("LeBron James").unwrap(), Vec::<String>::new());
    assert!(dir.path().join("player_map.json.corrupt").exists());
}
