use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, error};

use crate::fetch::PageSource;
use crate::outcome::Outcome;
use crate::record::{CountryCode, RawPairs, GROUP_SEPARATOR};
use crate::settings::Endpoints;

static GUIDELINE_SECTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("section#guideline-tables").unwrap());
static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static HEADER_CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static DATA_CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static BOLD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("b").unwrap());

/// Fetch one country's guideline page and flatten its tables.
pub async fn extract_country(
    source: &dyn PageSource,
    endpoints: &Endpoints,
    code: &CountryCode,
) -> Outcome<RawPairs> {
    let url = endpoints.country_url(code);
    match source.fetch(&url).await {
        Ok(html) => {
            let pairs = parse_guideline_tables(&html);
            debug!("{}: {} raw pairs", code, pairs.len());
            Outcome::from_collected(pairs, RawPairs::is_empty)
        }
        Err(e) => {
            error!("Error scraping country {}: {}", code, e);
            Outcome::Failed(e.to_string())
        }
    }
}

/// Flatten every table inside the guideline section into key/value pairs.
///
/// Tables with several headers are keyed `<category> - <main key>`; the
/// rest are read as plain two-column tables. Rows with the wrong number of
/// cells are dropped.
pub fn parse_guideline_tables(html: &str) -> RawPairs {
    let doc = Html::parse_document(html);
    let mut pairs = RawPairs::new();

    for section in doc.select(&GUIDELINE_SECTION) {
        for table in section.select(&TABLE) {
            extract_table(table, &mut pairs);
        }
    }

    pairs
}

fn extract_table(table: ElementRef<'_>, pairs: &mut RawPairs) {
    let headers: Vec<String> = table.select(&HEADER_CELL).map(bold_or_text).collect();

    if headers.len() > 1 {
        let categories = &headers[1..];
        for row in table.select(&ROW) {
            let cells: Vec<ElementRef<'_>> = row.select(&DATA_CELL).collect();
            if cells.len() != headers.len() {
                continue;
            }
            let main_key = bold_or_text(cells[0]);
            for (category, cell) in categories.iter().zip(&cells[1..]) {
                pairs.insert(
                    format!("{}{}{}", category, GROUP_SEPARATOR, main_key),
                    text_of(*cell),
                );
            }
        }
    } else {
        for row in table.select(&ROW) {
            let cells: Vec<ElementRef<'_>> = row.select(&DATA_CELL).collect();
            if let [key, value] = cells.as_slice() {
                pairs.insert(bold_or_text(*key), text_of(*value));
            }
        }
    }
}

/// Text of the `<b>` inside a cell if it has any, else the whole cell.
fn bold_or_text(cell: ElementRef<'_>) -> String {
    let bold: String = cell.select(&BOLD).flat_map(|b| b.text()).collect();
    let bold = bold.trim();
    if bold.is_empty() {
        text_of(cell)
    } else {
        bold.to_string()
    }
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

// ── Tests ──
