use crate::error::{CrawlError, Result};
use log::{info, warn};
use std::fs::{self, File};
use std::path::Path;

/// Columns accepted as the player name in a CSV roster.
const NAME_HEADERS: &[&str] = &["player", "name", "player name"];

/// Load the roster produced by the listing collaborator.
///
/// `.csv` files need a header row with a `Player` or `Name` column; anything
/// else is read as a JSON array of names. Blank names are dropped, order is
/// kept.
pub fn load_roster<P: AsRef<Path>>(filename: P) -> Result<Vec<String>> {
    let path = filename.as_ref();
    let is_csv = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));

    let names = if is_csv { load_csv(path)? } else { load_json(path)? };
    let names: Vec<String> = names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();

    info!("Loaded {} players from {:?}", names.len(), path);
    Ok(names)
}

fn roster_err(path: &Path, reason: impl ToString) -> CrawlError {
    CrawlError::Roster { path: path.to_path_buf(), reason: reason.to_string() }
}

fn load_json(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).map_err(|e| roster_err(path, e))?;
    serde_json::from_str(&text).map_err(|e| roster_err(path, e))
}

fn load_csv(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| roster_err(path, e))?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let headers = rdr.headers().map_err(|e| roster_err(path, e))?.clone();
    let column = headers
        .iter()
        .position(|h| NAME_HEADERS.contains(&h.to_lowercase().as_str()))
        .ok_or_else(|| roster_err(path, "header has no Player or Name column"))?;

    let mut names = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        match result {
            Ok(record) => {
                if let Some(name) = record.get(column) {
                    names.push(name.to_string());
                }
            }
            Err(e) => warn!("Skipping roster row {}: {}", line + 2, e),
        }
    }
    Ok(names)
}
