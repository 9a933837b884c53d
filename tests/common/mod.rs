#![allow(dead_code)]

use async_trait::async_trait;
use ironman_results::domain::ports::{BrowserSession, Clock, Locator};
use ironman_results::{EtlError, Result};
use scraper::{ElementRef, Html, Selector};
use std::sync::Mutex;
use std::time::Duration;

/// Records requested sleeps without waiting.
#[derive(Default)]
pub struct FakeClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Clock for FakeClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeDetail {
    /// (value, label) pairs rendered as info boxes.
    pub summary: Vec<(String, String)>,
    /// (data-id, cells) rows rendered in the segment table.
    pub segments: Vec<(String, Vec<String>)>,
    /// Loose text rendered in the panel instead of structured markup.
    pub text: Option<String>,
}

impl FakeDetail {
    pub fn standard(div_rank: &str, bib: &str) -> Self {
        let pair = |v: &str, l: &str| (v.to_string(), l.to_string());
        let cells = |c: &[&str]| c.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            summary: vec![
                pair(div_rank, "Div Rank"),
                pair("4", "Gender Rank"),
                pair("9", "Overall Rank"),
                pair("Finisher", "Designation"),
                pair(bib, "Bib"),
                pair("MPRO", "Division"),
                pair("-", "Points"),
            ],
            segments: vec![
                ("swim".to_string(), cells(&["Swim", "00:47:12", "3", "5", "12"])),
                ("transition 1".to_string(), cells(&["T1", "00:02:10", "-", "-", "-"])),
                ("bike".to_string(), cells(&["Bike", "04:10:02", "1", "1", "1"])),
                ("run".to_string(), cells(&["Run", "02:40:55", "-", "7", "20"])),
            ],
            text: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeRow {
    pub rank: String,
    pub name: String,
    pub country: Option<String>,
    pub finish: String,
    pub detail: Option<FakeDetail>,
    /// Whether the row renders its own expand button.
    pub expand_button: bool,
}

impl FakeRow {
    pub fn new(rank: usize, name: &str) -> Self {
        Self {
            rank: rank.to_string(),
            name: name.to_string(),
            country: Some("usa".to_string()),
            finish: format!("08:{:02}:00", rank % 60),
            detail: None,
            expand_button: true,
        }
    }

    /// Placeholder row the grid renders while data loads: no rank, no name.
    pub fn ghost() -> Self {
        Self {
            rank: "-".to_string(),
            name: String::new(),
            country: None,
            finish: "-".to_string(),
            detail: None,
            expand_button: false,
        }
    }

    pub fn with_detail(mut self, detail: FakeDetail) -> Self {
        self.detail = Some(detail);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FakeEvent {
    pub label: String,
    pub pages: Vec<Vec<FakeRow>>,
}

impl FakeEvent {
    /// `sizes[i]` rows on page i, athlete names prefixed with `tag`.
    pub fn with_pages(label: &str, tag: &str, sizes: &[usize]) -> Self {
        let mut rank = 0;
        let pages = sizes
            .iter()
            .map(|&n| {
                (0..n)
                    .map(|_| {
                        rank += 1;
                        FakeRow::new(rank, &format!("{} Athlete {}", tag, rank))
                    })
                    .collect()
            })
            .collect();
        Self {
            label: label.to_string(),
            pages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextControl {
    /// `disabled` attribute on the last page.
    DisabledAttribute,
    /// `aria-disabled="true"` on the last page.
    AriaDisabled,
    /// Never disabled; clicking on the last page stays there.
    AlwaysEnabled,
    /// No pagination control at all.
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowClick {
    Expands,
    Ignored,
    Intercepted,
}

#[derive(Debug, Clone)]
pub struct GridScript {
    pub events: Vec<FakeEvent>,
    pub next: NextControl,
    pub row_click: RowClick,
    /// After picking an option the dropdown updates but the rows do not.
    pub stale_after_select: bool,
    /// `page_source` fails while this (1-based) page is shown.
    pub fail_page_source_on: Option<usize>,
    /// Renders a "Division" combobox after the "Year" one, moved in front of
    /// it once an event option is picked.
    pub division_filter: bool,
}

impl GridScript {
    pub fn single(event: FakeEvent) -> Self {
        Self {
            events: vec![event],
            next: NextControl::DisabledAttribute,
            row_click: RowClick::Expands,
            stale_after_select: false,
            fail_page_source_on: None,
            division_filter: false,
        }
    }
}

#[derive(Debug, Default)]
struct ViewState {
    url: Option<String>,
    selected: usize,
    rows_event: usize,
    page: usize,
    expanded: Option<usize>,
    dropdown_open: bool,
    toolbar_reordered: bool,
    closed: usize,
    clicks: Vec<String>,
}

/// In-memory results site. Renders the grid as HTML from scripted state and
/// answers locator queries with the same CSS engine the extractor uses.
pub struct FakeBrowser {
    script: GridScript,
    state: Mutex<ViewState>,
}

impl FakeBrowser {
    pub fn new(script: GridScript) -> Self {
        Self {
            script,
            state: Mutex::new(ViewState::default()),
        }
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn current_page(&self) -> usize {
        self.state.lock().unwrap().page + 1
    }

    pub fn selected_label(&self) -> String {
        let state = self.state.lock().unwrap();
        self.script.events[state.selected].label.clone()
    }

    pub fn is_dropdown_open(&self) -> bool {
        self.state.lock().unwrap().dropdown_open
    }

    fn rows<'s>(&'s self, state: &ViewState) -> &'s [FakeRow] {
        self.script.events[state.rows_event]
            .pages
            .get(state.page)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn render(&self) -> String {
        let state = self.state.lock().unwrap();
        let event = &self.script.events[state.selected];
        let rows = self.rows(&state);
        let last_page = self.script.events[state.rows_event].pages.len().saturating_sub(1);

        let mut html = String::from("<html><head><title>Results</title></head><body>");
        let year = format!(
            r#"<div aria-label="Year"><div role="combobox">{}</div></div>"#,
            event.label
        );
        let division = if self.script.division_filter {
            r#"<div aria-label="Division"><div role="combobox">All divisions</div></div>"#
        } else {
            ""
        };
        let toolbar = if state.toolbar_reordered {
            format!("{}{}", division, year)
        } else {
            format!("{}{}", year, division)
        };
        html.push_str(&format!(r#"<div class="toolbar">{}</div>"#, toolbar));
        if state.dropdown_open {
            html.push_str(r#"<ul role="listbox">"#);
            for (i, e) in self.script.events.iter().enumerate() {
                html.push_str(&format!(
                    r#"<li role="option" data-event="{}">{}</li>"#,
                    i, e.label
                ));
            }
            html.push_str("</ul>");
        }

        html.push_str(r#"<div role="grid"><div role="row" class="header"><div role="columnheader">Athlete</div></div>"#);
        for (i, row) in rows.iter().enumerate() {
            render_row(&mut html, i, row, state.expanded == Some(i));
        }
        html.push_str("</div>");

        let disabled = state.page >= last_page;
        let next = match self.script.next {
            NextControl::DisabledAttribute if disabled => {
                r#"<button aria-label="Go to next page" disabled>&gt;</button>"#
            }
            NextControl::AriaDisabled if disabled => {
                r#"<button aria-label="Go to next page" aria-disabled="true">&gt;</button>"#
            }
            NextControl::Absent => "",
            _ => r#"<button aria-label="Go to next page">&gt;</button>"#,
        };
        html.push_str(&format!(
            r#"<div class="pagination"><button aria-label="Go to previous page">&lt;</button>{}</div>"#,
            next
        ));
        html.push_str("</body></html>");
        html
    }

    /// Attributes of the located element, or `None` when nothing matches.
    fn inspect<T>(&self, locator: &Locator, read: impl FnOnce(ElementRef<'_>) -> T) -> Result<Option<T>> {
        let html = self.render();
        let document = Html::parse_document(&html);
        let selector = parse(&locator.selector)?;
        let Some(element) = document.select(&selector).nth(locator.index) else {
            return Ok(None);
        };
        let element = match &locator.child {
            Some(child) => match element.select(&parse(child)?).next() {
                Some(found) => found,
                None => return Ok(None),
            },
            None => element,
        };
        Ok(Some(read(element)))
    }

    fn dispatch(&self, locator: &Locator, forced: bool) -> Result<()> {
        let target = self
            .inspect(locator, |el| {
                let v = el.value();
                (
                    v.name().to_string(),
                    v.attr("role").map(str::to_string),
                    v.attr("aria-label").map(str::to_string),
                    v.attr("data-rowindex").and_then(|s| s.parse::<usize>().ok()),
                    v.attr("data-event").and_then(|s| s.parse::<usize>().ok()),
                )
            })?
            .ok_or_else(|| EtlError::browser(format!("no such element: {}", locator)))?;
        let (tag, role, label, row_index, event_index) = target;

        let last_page = {
            let state = self.state.lock().unwrap();
            self.script.events[state.rows_event].pages.len().saturating_sub(1)
        };
        let mut state = self.state.lock().unwrap();
        state.clicks.push(format!("{}{}", if forced { "force:" } else { "" }, locator));

        match (tag.as_str(), role.as_deref(), label.as_deref()) {
            ("button", _, Some("Go to next page")) => {
                if state.page < last_page {
                    state.page += 1;
                    state.expanded = None;
                }
            }
            ("button", _, Some("Go to previous page")) => {}
            ("button", _, Some("Expand")) => {
                state.expanded = self.owning_row(locator);
            }
            ("button", _, Some("Collapse")) => {
                state.expanded = None;
            }
            (_, Some("row"), _) => {
                let index = row_index.unwrap_or(locator.index);
                if forced {
                    state.expanded = Some(index);
                } else {
                    match self.script.row_click {
                        RowClick::Expands => {
                            state.expanded = if state.expanded == Some(index) {
                                None
                            } else {
                                Some(index)
                            };
                        }
                        RowClick::Ignored => {}
                        RowClick::Intercepted => {
                            return Err(EtlError::browser(
                                "element click intercepted: other element would receive the click",
                            ));
                        }
                    }
                }
            }
            (_, Some("combobox"), _) => state.dropdown_open = true,
            (_, Some("option"), _) => {
                let index = event_index.unwrap_or(0);
                state.selected = index;
                if !self.script.stale_after_select {
                    state.rows_event = index;
                    state.page = 0;
                }
                state.expanded = None;
                state.dropdown_open = false;
                state.toolbar_reordered = self.script.division_filter;
            }
            ("body", _, _) => state.dropdown_open = false,
            _ => {}
        }
        Ok(())
    }

    fn owning_row(&self, locator: &Locator) -> Option<usize> {
        // Expand buttons are addressed through their row.
        locator.child.as_ref().map(|_| locator.index)
    }
}

fn render_row(html: &mut String, index: usize, row: &FakeRow, expanded: bool) {
    let button = match (row.expand_button, expanded) {
        (false, _) => String::new(),
        (true, false) => r#"<button aria-label="Expand" aria-expanded="false">+</button>"#.to_string(),
        (true, true) => r#"<button aria-label="Collapse" aria-expanded="true">-</button>"#.to_string(),
    };
    let avatar = match &row.country {
        Some(alt) => format!(r#"<img alt="{}" src="/flags/{}.png">"#, alt, alt),
        None => r#"<img alt="user-avatar" src="/avatar.png">"#.to_string(),
    };
    html.push_str(&format!(
        r#"<div role="row" data-rowindex="{i}" data-id="r{i}"><div role="gridcell" data-field="__detail_panel_toggle__">{button}</div><div role="gridcell" data-field="wtc_finishrankoverall">{rank}</div><div role="gridcell" data-field="athlete">{avatar}<span>{name}</span></div><div role="gridcell" data-field="wtc_swimtimeformatted">-</div><div role="gridcell" data-field="wtc_finishtimeformatted">{finish}</div></div>"#,
        i = index,
        button = button,
        rank = row.rank,
        avatar = avatar,
        name = row.name,
        finish = row.finish,
    ));

    if !expanded {
        return;
    }
    let Some(detail) = &row.detail else {
        return;
    };

    html.push_str(r#"<div class="MuiDataGrid-detailPanel">"#);
    if let Some(text) = &detail.text {
        html.push_str(&format!("<p>{}</p>", text));
    }
    for (value, label) in &detail.summary {
        html.push_str(&format!(
            r#"<div class="MuiBox-root css-1at62qq"><h6>{}</h6><h6>{}</h6></div>"#,
            value, label
        ));
    }
    for (id, cells) in &detail.segments {
        html.push_str(&format!(r#"<div role="row" data-id="{}">"#, id));
        for cell in cells {
            html.push_str(&format!(r#"<div role="gridcell">{}</div>"#, cell));
        }
        html.push_str("</div>");
    }
    html.push_str("</div>");
}

fn parse(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| EtlError::browser(format!("invalid selector {}: {:?}", selector, e)))
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        *state = ViewState {
            url: Some(url.to_string()),
            closed: state.closed,
            clicks: std::mem::take(&mut state.clicks),
            ..ViewState::default()
        };
        Ok(())
    }

    async fn page_source(&self) -> Result<String> {
        let page = self.current_page();
        if self.script.fail_page_source_on == Some(page) {
            return Err(EtlError::browser("target window already closed"));
        }
        Ok(self.render())
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let html = self.render();
        let document = Html::parse_document(&html);
        Ok(document.select(&parse(selector)?).count())
    }

    async fn text(&self, locator: &Locator) -> Result<Option<String>> {
        self.inspect(locator, |el| el.text().collect::<String>().trim().to_string())
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        Ok(self
            .inspect(locator, |el| el.value().attr(name).map(str::to_string))?
            .flatten())
    }

    async fn is_interactable(&self, locator: &Locator) -> Result<bool> {
        Ok(self.inspect(locator, |_| ())?.is_some())
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        self.dispatch(locator, false)
    }

    async fn force_click(&self, locator: &Locator) -> Result<()> {
        self.dispatch(locator, true)
    }

    async fn scroll_into_view(&self, locator: &Locator) -> Result<()> {
        self.inspect(locator, |_| ())?
            .ok_or_else(|| EtlError::browser(format!("no such element: {}", locator)))
    }

    async fn scroll_to_top(&self) -> Result<()> {
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// Scraper settings for fixtures: no delays, output under `dir`.
pub fn test_config(dir: &std::path::Path) -> ironman_results::ScrapeConfig {
    ironman_results::ScrapeConfig {
        url: "https://results.example.test/event/kona".to_string(),
        output_dir: dir.to_string_lossy().to_string(),
        timings: ironman_results::core::selectors::Timings::immediate(),
        expand_details: false,
        ..ironman_results::ScrapeConfig::default()
    }
}

pub fn read_csv(path: &std::path::Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (headers, rows)
}
