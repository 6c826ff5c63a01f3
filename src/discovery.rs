use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::{error, info};

use crate::fetch::PageSource;
use crate::outcome::Outcome;
use crate::record::CountryCode;
use crate::settings::Endpoints;

static COUNTRY_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.card-icon__overlay").unwrap());

/// Path index of the country token in `/en-us/guidelines/<code>/sms`.
const CODE_SEGMENT: usize = 3;
const MIN_SEGMENTS: usize = 5;

/// Fetch the landing page and list every country it links to.
///
/// Never errors: a fetch failure comes back as [`Outcome::Failed`] and a page
/// without country links as [`Outcome::Empty`]. Either way there is nothing
/// to process.
pub async fn discover_codes(source: &dyn PageSource, endpoints: &Endpoints) -> Outcome<Vec<CountryCode>> {
    let url = endpoints.landing_url();
    info!("Fetching landing page: {}", url);

    match source.fetch(&url).await {
        Ok(html) => {
            let codes = parse_country_codes(&html);
            info!("Discovered {} country codes", codes.len());
            Outcome::from_collected(codes, Vec::is_empty)
        }
        Err(e) => {
            error!("Error retrieving country codes: {}", e);
            Outcome::Failed(e.to_string())
        }
    }
}

/// Country codes from the overlay links, deduplicated in first-seen order.
pub fn parse_country_codes(html: &str) -> Vec<CountryCode> {
    let doc = Html::parse_document(html);
    let mut codes: Vec<CountryCode> = Vec::new();

    for href in doc.select(&COUNTRY_LINK).filter_map(|a| a.value().attr("href")) {
        let Some(code) = code_from_href(href) else {
            continue;
        };
        if !codes.iter().any(|c| c.as_str() == code) {
            codes.push(CountryCode::new(code));
        }
    }

    codes
}

fn code_from_href(href: &str) -> Option<&str> {
    let parts: Vec<&str> = href.split('/').collect();
    if parts.len() < MIN_SEGMENTS {
        return None;
    }
    Some(parts[CODE_SEGMENT]).filter(|c| !c.is_empty())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;

    fn links(hrefs: &[&str]) -> String {
        let anchors: String = hrefs
            .iter()
            .map(|h| format!(r#"<a class="card-icon__overlay" href="{}"></a>"#, h))
            .collect();
        format!("<html><body>{}</body></html>", anchors)
    }

    #[test]
    fn dedups_in_first_seen_order() {
        let html = links(&[
            "/en-us/guidelines/us/sms",
            "/en-us/guidelines/us/sms",
            "/en-us/guidelines/ca/sms",
        ]);
        let codes = parse_country_codes(&html);
        assert_eq!(codes, vec![CountryCode::from("us"), CountryCode::from("ca")]);
    }

    #[test]
    fn skips_short_paths_and_other_anchors() {
        let html = format!(
            "{}{}",
            links(&["/en-us/guidelines", "/en-us//x/sms", "/en-us/guidelines/de/sms"]),
            r#"<a class="nav" href="/en-us/guidelines/fr/sms"></a><a class="card-icon__overlay"></a>"#
        );
        let codes = parse_country_codes(&html);
        assert_eq!(codes, vec![CountryCode::from("x"), CountryCode::from("de")]);
    }

    #[test]
    fn takes_fourth_segment_verbatim() {
        assert_eq!(code_from_href("/en-us/guidelines/gb/sms"), Some("gb"));
        assert_eq!(code_from_href("/a/b//c"), None);
        assert_eq!(code_from_href("/a/b/c"), None);
    }

    #[test]
    fn landing_fixture() {
        let html = std::fs::read_to_string("tests/fixtures/landing.html").unwrap();
        let codes = parse_country_codes(&html);
        let codes: Vec<&str> = codes.iter().map(CountryCode::as_str).collect();
        assert_eq!(codes, vec!["af", "de", "gb", "us"]);
    }

    struct Unreachable;

    #[async_trait]
    impl PageSource for Unreachable {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            })
        }
    }

    #[tokio::test]
    async fn fetch_failure_degrades_to_failed() {
        let outcome = discover_codes(&Unreachable, &Endpoints::default()).await;
        assert!(outcome.is_failed());
        assert_eq!(outcome.data(), None);
    }
}
