use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use crate::extract::extract_country;
use crate::fetch::PageSource;
use crate::normalize::normalize_outcome;
use crate::outcome::Outcome;
use crate::record::{CountryCode, NormalizedRecord};
use crate::settings::Endpoints;
use crate::store::{RecordStore, UpsertAction};

/// How one country's run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountryStatus {
    Created,
    Updated,
    /// Normalized but no datastore attached.
    Collected,
    NoData,
    MissingIsoCode,
    ExtractFailed(String),
    UpsertFailed(String),
}

pub struct CountryReport {
    pub code: CountryCode,
    pub status: CountryStatus,
}

/// Per-country results plus every record that was normalized.
#[derive(Default)]
pub struct BatchReport {
    pub countries: Vec<CountryReport>,
    pub records: Vec<(CountryCode, NormalizedRecord)>,
}

impl BatchReport {
    pub fn count(&self, pred: impl Fn(&CountryStatus) -> bool) -> usize {
        self.countries.iter().filter(|c| pred(&c.status)).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} countries: {} created, {} updated, {} collected, {} without data, {} without ISO code, {} extract errors, {} upsert errors",
            self.countries.len(),
            self.count(|s| *s == CountryStatus::Created),
            self.count(|s| *s == CountryStatus::Updated),
            self.count(|s| *s == CountryStatus::Collected),
            self.count(|s| *s == CountryStatus::NoData),
            self.count(|s| *s == CountryStatus::MissingIsoCode),
            self.count(|s| matches!(s, CountryStatus::ExtractFailed(_))),
            self.count(|s| matches!(s, CountryStatus::UpsertFailed(_))),
        )
    }
}

/// Fetch → extract → normalize → upsert, one country at a time.
pub struct Pipeline<'a> {
    source: &'a dyn PageSource,
    endpoints: &'a Endpoints,
    store: Option<&'a dyn RecordStore>,
    progress: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(source: &'a dyn PageSource, endpoints: &'a Endpoints) -> Self {
        Pipeline {
            source,
            endpoints,
            store: None,
            progress: false,
        }
    }

    pub fn with_store(mut self, store: &'a dyn RecordStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Process every code in order. Failures stay with their country.
    pub async fn run(&self, codes: &[CountryCode]) -> BatchReport {
        let pb = if self.progress {
            let pb = ProgressBar::new(codes.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("=> "));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut report = BatchReport::default();
        for code in codes {
            pb.set_message(code.to_string());
            let (status, record) = self.process_country(code).await;
            if let Some(record) = record {
                report.records.push((code.clone(), record));
            }
            report.countries.push(CountryReport {
                code: code.clone(),
                status,
            });
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!("{}", report.summary());
        report
    }

    /// Run one country through the whole pipeline.
    pub async fn process_country(&self, code: &CountryCode) -> (CountryStatus, Option<NormalizedRecord>) {
        info!("Processing country code: {}", code);

        let raw = extract_country(self.source, self.endpoints, code).await;
        let record = match normalize_outcome(raw) {
            Outcome::Data(record) => record,
            Outcome::Empty => {
                warn!("No data returned for country code: {}", code);
                return (CountryStatus::NoData, None);
            }
            Outcome::Failed(reason) => return (CountryStatus::ExtractFailed(reason), None),
        };

        let Some(iso_code) = record.iso_code().map(str::to_string) else {
            error!("No ISO code found in scraped data for {}. Skipping record.", code);
            return (CountryStatus::MissingIsoCode, Some(record));
        };

        let Some(store) = self.store else {
            return (CountryStatus::Collected, Some(record));
        };

        let status = match store.upsert(&iso_code, &record).await {
            Ok(UpsertAction::Created(_)) => CountryStatus::Created,
            Ok(UpsertAction::Updated(_)) => CountryStatus::Updated,
            Err(e) => {
                error!("Error updating datastore for ISO code {}: {}", iso_code, e);
                CountryStatus::UpsertFailed(e.to_string())
            }
        };
        (status, Some(record))
    }
}
