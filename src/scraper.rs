use std::{collections::HashSet, sync::LazyLock};

use jiff::civil::Date;
use regex::Regex;
use reqwest::{
    Url,
    header::{REFERER, USER_AGENT},
};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::AppResult;

const SCRAPER_UA: &str = "TokyoCinePath/1.1 (schedule-sync)";

/// Full-width parenthetical annotations such as `（新宿区）`.
static ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"（.*?）").expect("valid regex"));

/// Cinema facts from a detail page.
#[derive(Clone, Debug, PartialEq)]
pub struct CinemaPage {
    pub name_jp: String,
    pub building_photo: String,
    pub website: String,
    pub address: String,
}

/// One cinema's weekly schedule, grouped per movie.
#[derive(Clone, Debug, PartialEq)]
pub struct SchedulePage {
    pub cinema_name: String,
    pub movies: Vec<MovieSection>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MovieSection {
    pub title_jp: String,
    pub days: Vec<ScheduleDay>,
}

/// A dated cell. `start_times` may be empty when every span was malformed;
/// the date still counts as seen.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduleDay {
    pub date: Date,
    pub start_times: Vec<String>,
}

pub async fn fetch_page(client: &reqwest::Client, url: &str) -> AppResult<String> {
    debug!(url = %url, "fetching page");
    let html = client
        .get(url)
        .header(USER_AGENT, SCRAPER_UA)
        .header(REFERER, url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(html)
}

/// Detail-page links from the region listing, absolute, restricted to
/// `region_path` and deduplicated in page order.
pub fn parse_theater_links(html: &str, page_url: &Url, region_path: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse(".theater-area-list a").unwrap();

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for el in doc.select(&selector) {
        let Some(href) = el.value().attr("href") else { continue };
        let Ok(link) = page_url.join(href.trim()) else { continue };
        let link = link.to_string();
        if link.contains(region_path) && seen.insert(link.clone()) {
            out.push(link);
        }
    }
    out
}

/// `None` when the page carries no cinema title.
pub fn parse_cinema_page(html: &str, page_url: &Url) -> Option<CinemaPage> {
    let doc = Html::parse_document(html);
    let main = main_element(&doc)?;

    let name_jp = cinema_title(&main)?;

    let img_sel = Selector::parse("img").unwrap();
    let building_photo = main
        .select(&img_sel)
        .filter_map(|img| img.value().attr("src"))
        .find(|src| src.contains("/theater/") && !src.contains("shared"))
        .unwrap_or_default()
        .to_string();

    let official_sel = Selector::parse("a.icon.official").unwrap();
    let website = main
        .select(&official_sel)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(|href| {
            if href.starts_with("http") {
                href.to_string()
            } else {
                page_url.join(href).map(|u| u.to_string()).unwrap_or_else(|_| href.to_string())
            }
        })
        .unwrap_or_default();

    let address_sel = Selector::parse(".location dd").unwrap();
    let address = main.select(&address_sel).next().map(|dd| text_of(&dd)).unwrap_or_default();

    Some(CinemaPage { name_jp, building_photo, website, address })
}

/// `None` when the page carries no cinema title. Sections without a title
/// and cells with unparseable dates are dropped.
pub fn parse_schedule_page(html: &str) -> Option<SchedulePage> {
    let doc = Html::parse_document(html);
    let main = main_element(&doc)?;
    let cinema_name = cinema_title(&main)?;

    let section_sel = Selector::parse("section[id^=m]").unwrap();
    let title_sel = Selector::parse("h2 a").unwrap();
    let cell_sel = Selector::parse("table.weekly-schedule td[data-date]").unwrap();
    let span_sel = Selector::parse("span").unwrap();

    let mut movies = Vec::new();
    for section in main.select(&section_sel) {
        let title_jp = section.select(&title_sel).map(|a| text_of(&a)).collect::<String>();
        let title_jp = title_jp.trim().to_string();
        if title_jp.is_empty() {
            continue;
        }

        let mut days = Vec::new();
        for cell in section.select(&cell_sel) {
            let Some(date) = cell.value().attr("data-date").and_then(parse_play_date) else {
                continue;
            };
            let start_times = cell
                .select(&span_sel)
                .filter_map(|sp| parse_start_time(&sp.text().collect::<String>()))
                .collect();
            days.push(ScheduleDay { date, start_times });
        }

        movies.push(MovieSection { title_jp, days });
    }

    Some(SchedulePage { cinema_name, movies })
}

/// `新宿ピカデリー（新宿区）` becomes `新宿ピカデリー`.
pub fn clean_cinema_name(raw: &str) -> String {
    ANNOTATION.replace_all(raw, "").trim().to_string()
}

/// Cell dates are exactly eight digits, `YYYYMMDD`.
pub fn parse_play_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    if raw.len() != 8 {
        return None;
    }
    Date::strptime("%Y%m%d", raw).ok()
}

/// Start time of a slot such as `18:05～20:00`; the end time is dropped.
pub fn parse_start_time(raw: &str) -> Option<String> {
    let text = raw.trim();
    let start = match text.find(['～', '~', ' ']) {
        Some(idx) => &text[..idx],
        None => text,
    };
    if start.len() < 4 || !start.contains(':') {
        return None;
    }
    Some(start.to_string())
}

fn main_element(doc: &Html) -> Option<ElementRef<'_>> {
    let main_sel = Selector::parse("main").unwrap();
    doc.select(&main_sel).next()
}

fn cinema_title(main: &ElementRef<'_>) -> Option<String> {
    let title_sel = Selector::parse("h1.page-title").unwrap();
    let raw = main.select(&title_sel).map(|h| text_of(&h)).collect::<String>();
    let name = clean_cinema_name(&raw);
    (!name.is_empty()).then_some(name)
}

fn text_of(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
