use crate::error::{CrawlError, Result};
use scraper::{Html, Selector};
use std::sync::LazyLock;

static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("static selector"));
static TEAMMATE_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"td[data-stat="pid2"]"#).expect("static selector"));
static HEADING: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("static selector"));

/// Teammate names from a relationship table, in row order.
///
/// `fragment` is the table's HTML (as returned by
/// [`TableLocator::find`]). Header and separator rows have no teammate cell
/// and are skipped. Repeated names are kept.
pub fn extract_teammates(fragment: &str) -> Vec<String> {
    // Bare rows parsed outside a <table> lose their tr/td tags.
    let document = if fragment.to_ascii_lowercase().contains("<table") {
        Html::parse_document(fragment)
    } else {
        Html::parse_document(&format!("<table>{fragment}</table>"))
    };

    let mut teammates = Vec::new();
    for row in document.select(&ROW) {
        if let Some(cell) = row.select(&TEAMMATE_CELL).next() {
            let text = cell.text().collect::<String>();
            let name = text.trim().replace('*', "");
            teammates.push(name.trim().to_string());
        }
    }
    teammates
}

/// Text of the first `h1` on the page, whitespace collapsed. Empty if none.
pub fn heading_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .select(&HEADING)
        .next()
        .map(|h| h.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

/// Finds the relationship table on a profile page by element id.
pub struct TableLocator {
    table_id: String,
    selector: Selector,
}

impl TableLocator {
    pub fn new(table_id: &str) -> Result<Self> {
        let selector = Selector::parse(&format!("#{table_id}"))
            .map_err(|e| CrawlError::Config(format!("table id {table_id:?}: {e}")))?;
        Ok(TableLocator { table_id: table_id.to_string(), selector })
    }

    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    /// Outer HTML of the table. The site ships some tables inside HTML
    /// comments and swaps them in with script, so comments are searched when
    /// the live DOM has no match.
    pub fn find(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        if let Some(element) = document.select(&self.selector).next() {
            return Some(element.html());
        }

        let needle = format!("id=\"{}\"", self.table_id);
        for node in document.tree.nodes() {
            let Some(comment) = node.value().as_comment() else { continue };
            let body: &str = &comment.comment;
            if !body.contains(&needle) {
                continue;
            }
            let inner = Html::parse_document(body);
            if let Some(element) = inner.select(&self.selector).next() {
                return Some(element.html());
            }
        }
        None
    }
}
