use std::sync::LazyLock;

use async_trait::async_trait;
use naner_schema::{ResolvedRelease, UNKNOWN_VERSION, file_name_from_url};
use regex::Regex;

use super::{ResolveError, Strategy};
use crate::io::transport::Transport;

static DOTTED_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[0-9]+(?:\.[0-9]+)+").ok());
static DIGITS_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[0-9]+").ok());

/// Version of a scraped file: the first dotted numeric run, else the longest
/// digit run, else `"unknown"`.
///
/// Scraped listings are often date-stamped snapshots whose names carry other
/// digits first (`msys2-base-x86_64-20241208.tar.xz` gives `20241208`).
fn scraped_version(file_name: &str) -> String {
    let dotted = DOTTED_RE.as_ref().and_then(|re| re.find(file_name));
    let longest = || {
        DIGITS_RE.as_ref().and_then(|re| {
            re.find_iter(file_name)
                .reduce(|best, m| if m.len() > best.len() { m } else { best })
        })
    };
    dotted
        .or_else(longest)
        .map_or_else(|| UNKNOWN_VERSION.to_string(), |m| m.as_str().to_string())
}

/// Regex over a page's raw HTML, group 1 joined onto a base URL.
pub struct ScrapeStrategy {
    page_url: String,
    pattern: String,
    base_url: String,
}

impl ScrapeStrategy {
    pub fn new(page_url: String, pattern: String, base_url: String) -> Self {
        Self {
            page_url,
            pattern,
            base_url,
        }
    }

    /// Absolute captures are taken as-is.
    fn join(&self, captured: &str) -> String {
        if captured.starts_with("https://") || captured.starts_with("http://") {
            return captured.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            captured.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Strategy for ScrapeStrategy {
    async fn resolve(&self, transport: &dyn Transport) -> Result<ResolvedRelease, ResolveError> {
        let re = Regex::new(&self.pattern)?;
        let html = transport.get_text(&self.page_url).await?;

        let captured = re
            .captures(&html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ResolveError::NoMatch(format!("'{}' not found on {}", self.pattern, self.page_url))
            })?;

        let url = self.join(captured);
        let file_name = file_name_from_url(&url).to_string();
        let version = scraped_version(&file_name);
        Ok(ResolvedRelease::resolved(url, file_name, version))
    }
}
