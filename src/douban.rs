use std::time::Duration;

use reqwest::header::{REFERER, USER_AGENT};
use scraper::{Html, Selector};
use tracing::{debug, info};

use crate::error::AppResult;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Douban search-page scraper. Best effort: the page is not an API and the
/// match is a loose substring test.
pub struct DoubanClient {
    client: reqwest::Client,
    base_url: String,
    delay: Duration,
}

impl DoubanClient {
    pub fn new(client: reqwest::Client, base_url: String, delay_ms: u64) -> Self {
        Self { client, base_url, delay: Duration::from_millis(delay_ms) }
    }

    /// Rating of the first rated search result matching `title` or `year`; 0 when
    /// nothing matches. Always waits the configured delay first.
    pub async fn rating(&self, title: &str, year: &str) -> AppResult<f64> {
        tokio::time::sleep(self.delay).await;

        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        debug!(title = %title, year = %year, "searching douban");
        let html = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_UA)
            .header(REFERER, "https://www.douban.com/")
            .query(&[("cat", "1002"), ("q", title)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let rating = match_rating(&html, title, year);
        if rating == 0.0 {
            info!(title = %title, year = %year, "no douban match");
        }
        Ok(rating)
    }
}

/// Walks `.result` entries; the first whose cast line mentions the year or
/// whose title contains the query and that carries a score wins. Unrated
/// matches are passed over.
pub fn match_rating(html: &str, title: &str, year: &str) -> f64 {
    let doc = Html::parse_document(html);
    let result_sel = Selector::parse(".result").unwrap();
    let title_sel = Selector::parse(".title a").unwrap();
    let meta_sel = Selector::parse(".subject-cast").unwrap();
    let rating_sel = Selector::parse(".rating_nums").unwrap();

    for result in doc.select(&result_sel) {
        let res_title = child_text(&result, &title_sel);
        let res_meta = child_text(&result, &meta_sel);
        if !(res_meta.contains(year) || res_title.contains(title)) {
            continue;
        }
        let rating = child_text(&result, &rating_sel).parse().unwrap_or(0.0);
        if rating > 0.0 {
            return rating;
        }
    }
    0.0
}

fn child_text(el: &scraper::ElementRef<'_>, sel: &Selector) -> String {
    el.select(sel).flat_map(|e| e.text()).collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div class="result-list">
          <div class="result">
            <div class="title"><a href="/x">完美的日子</a></div>
            <span class="subject-cast">原名:Perfect Days / 维姆·文德斯 / 2023</span>
            <span class="rating_nums">8.4</span>
          </div>
          <div class="result">
            <div class="title"><a href="/y">Perfect Days</a></div>
            <span class="subject-cast">2011</span>
            <span class="rating_nums">6.1</span>
          </div>
        </div>"#;

    #[test]
    fn year_match_wins_first() {
        assert_eq!(match_rating(PAGE, "Perfect Days", "2023"), 8.4);
    }

    #[test]
    fn title_match_when_year_differs() {
        assert_eq!(match_rating(PAGE, "Perfect Days", "1999"), 6.1);
    }

    #[test]
    fn unrated_match_falls_through_to_next() {
        let page = r#"
            <div class="result">
              <div class="title"><a href="/a">Perfect Days 幕后</a></div>
              <span class="subject-cast">2023</span>
            </div>
            <div class="result">
              <div class="title"><a href="/b">Perfect Days</a></div>
              <span class="subject-cast">2023</span>
              <span class="rating_nums">8.4</span>
            </div>"#;
        assert_eq!(match_rating(page, "Perfect Days", "2023"), 8.4);
    }

    #[test]
    fn no_match_is_zero() {
        assert_eq!(match_rating(PAGE, "Tár", "2022"), 0.0);
        assert_eq!(match_rating("<html></html>", "Tár", "2022"), 0.0);
    }
}
