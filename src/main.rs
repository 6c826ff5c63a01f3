use std::fs::File;
use std::io::{self, BufWriter, IsTerminal};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::error;

use sms_guidelines::discovery::discover_codes;
use sms_guidelines::export;
use sms_guidelines::extract::extract_country;
use sms_guidelines::fetch::{HttpSource, PageSource};
use sms_guidelines::normalize::{normalize, normalize_outcome};
use sms_guidelines::outcome::Outcome;
use sms_guidelines::pipeline::{BatchReport, CountryStatus, Pipeline};
use sms_guidelines::record::{CountryCode, NormalizedRecord, RawPairs};
use sms_guidelines::settings::{self, AirtableSettings, ChainConfig, Endpoints, EnvConfig, StaticConfig};
use sms_guidelines::store::{AirtableStore, SqliteStore};

#[derive(Parser)]
#[command(name = "sms_guidelines", about = "Scrape SMS guideline tables and sync them by ISO code")]
struct Cli {
    /// Guideline site root
    #[arg(long, global = true, default_value = "https://www.twilio.com")]
    base_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the country codes linked from the landing page
    Codes,
    /// Scrape one country and print its normalized record
    Scrape {
        /// Country code as it appears in the page URL (e.g. "de")
        code: String,
    },
    /// Scrape every country and upsert the records
    Run {
        #[command(flatten)]
        selection: Selection,
        /// Where records go
        #[arg(long, value_enum, default_value = "airtable")]
        store: StoreKind,
        #[command(flatten)]
        airtable: AirtableArgs,
    },
    /// Scrape every country and write a CSV file
    Export {
        #[command(flatten)]
        selection: Selection,
        /// Write the local snapshot instead of scraping
        #[arg(long)]
        from_snapshot: bool,
        /// Output path
        #[arg(short, long, default_value = "sms_guidelines.csv")]
        out: PathBuf,
    },
    /// Show local snapshot statistics
    Stats,
    /// Print one record from the local snapshot
    Show {
        /// ISO code, e.g. "DE"
        iso_code: String,
    },
}

#[derive(Args)]
struct Selection {
    /// Comma-separated country codes; skips discovery
    #[arg(long, value_delimiter = ',')]
    codes: Option<Vec<String>>,
    /// Max countries to process
    #[arg(short = 'n', long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct AirtableArgs {
    /// Overrides AIRTABLE_BASE_ID
    #[arg(long)]
    airtable_base_id: Option<String>,
    /// Overrides AIRTABLE_TABLE_NAME
    #[arg(long)]
    airtable_table: Option<String>,
    /// Overrides AIRTABLE_API_TOKEN
    #[arg(long)]
    airtable_token: Option<String>,
}

impl AirtableArgs {
    fn provider(&self) -> ChainConfig {
        let flags = StaticConfig::new()
            .with_opt(settings::BASE_ID, self.airtable_base_id.clone())
            .with_opt(settings::TABLE_NAME, self.airtable_table.clone())
            .with_opt(settings::API_TOKEN, self.airtable_token.clone());
        ChainConfig::new(vec![Box::new(flags), Box::new(EnvConfig::load())])
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreKind {
    Airtable,
    Sqlite,
    /// Print records as JSON lines instead
    Stdout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let endpoints = Endpoints::new(&cli.base_url);

    let result = match cli.command {
        Commands::Codes => {
            let source = HttpSource::new()?;
            match discover_codes(&source, &endpoints).await {
                Outcome::Data(codes) => {
                    for code in &codes {
                        println!("{}", code);
                    }
                    println!("\n{} country codes", codes.len());
                }
                Outcome::Empty => println!("No country codes found on {}", endpoints.landing_url()),
                Outcome::Failed(reason) => println!("Could not fetch landing page: {}", reason),
            }
            Ok(())
        }
        Commands::Scrape { code } => {
            let source = HttpSource::new()?;
            let code = CountryCode::new(code);
            match normalize_outcome(extract_country(&source, &endpoints, &code).await) {
                Outcome::Data(record) => {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                    Ok(())
                }
                Outcome::Empty => {
                    println!("No guideline tables found for {}", code);
                    Ok(())
                }
                Outcome::Failed(reason) => bail!("scraping {} failed: {}", code, reason),
            }
        }
        Commands::Run {
            selection,
            store,
            airtable,
        } => {
            let source = HttpSource::new()?;
            let codes = select_codes(&source, &endpoints, &selection).await;
            if codes.is_empty() {
                println!("No country codes retrieved. Aborting.");
                return Ok(());
            }

            println!("Processing {} countries...", codes.len());
            let pipeline = Pipeline::new(&source, &endpoints).with_progress(io::stderr().is_terminal());
            let report = match store {
                StoreKind::Airtable => match AirtableSettings::resolve(&airtable.provider()) {
                    Ok(cfg) => {
                        let store = AirtableStore::new(&cfg)?;
                        pipeline.with_store(&store).run(&codes).await
                    }
                    Err(e) => {
                        error!("{}. Records will not be upserted.", e);
                        pipeline.run(&codes).await
                    }
                },
                StoreKind::Sqlite => {
                    let path = settings::db_path();
                    let store = SqliteStore::open(&path)
                        .with_context(|| format!("Failed to open {:?}", path))?;
                    pipeline.with_store(&store).run(&codes).await
                }
                StoreKind::Stdout => {
                    let report = pipeline.run(&codes).await;
                    for (code, record) in &report.records {
                        println!("{}: {}", code, serde_json::to_string(record)?);
                    }
                    report
                }
            };
            print_report(&report);
            Ok(())
        }
        Commands::Export {
            from_snapshot: true,
            out,
            ..
        } => {
            let store = SqliteStore::open(&settings::db_path())?;
            let records: Vec<(CountryCode, NormalizedRecord)> = store
                .all()?
                .into_iter()
                .map(|rec| {
                    let record = normalize(&rec.fields.into_iter().collect::<RawPairs>());
                    (CountryCode::new(rec.iso_code), record)
                })
                .collect();

            let file = File::create(&out).with_context(|| format!("Failed to create {:?}", out))?;
            export::write_csv(BufWriter::new(file), &records)?;
            println!("Wrote {} snapshot records to {:?}", records.len(), out);
            Ok(())
        }
        Commands::Export { selection, out, .. } => {
            let source = HttpSource::new()?;
            let codes = select_codes(&source, &endpoints, &selection).await;
            if codes.is_empty() {
                println!("No country codes retrieved. Aborting.");
                return Ok(());
            }

            println!("Scraping {} countries...", codes.len());
            let report = Pipeline::new(&source, &endpoints)
                .with_progress(io::stderr().is_terminal())
                .run(&codes)
                .await;

            let file = File::create(&out).with_context(|| format!("Failed to create {:?}", out))?;
            export::write_csv(BufWriter::new(file), &report.records)?;
            println!("Wrote {} records to {:?}", report.records.len(), out);
            print_report(&report);
            Ok(())
        }
        Commands::Stats => {
            let store = SqliteStore::open(&settings::db_path())?;
            let s = store.stats()?;
            println!("Records:      {}", s.records);
            println!("Fields:       {}", s.fields);
            println!("Oldest write: {}", s.oldest_update.as_deref().unwrap_or("-"));
            println!("Newest write: {}", s.newest_update.as_deref().unwrap_or("-"));
            Ok(())
        }
        Commands::Show { iso_code } => {
            let store = SqliteStore::open(&settings::db_path())?;
            match store.get(&iso_code)? {
                Some(rec) => {
                    println!("{} (created {}, updated {})", rec.iso_code, rec.created_at, rec.updated_at);
                    let width = rec.fields.keys().map(|k| k.chars().count()).max().unwrap_or(0);
                    for (key, value) in &rec.fields {
                        println!("  {:<width$} | {}", key, value, width = width);
                    }
                }
                None => println!("No snapshot for ISO code {}", iso_code),
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Explicit `--codes` win; otherwise discover from the landing page.
async fn select_codes(source: &dyn PageSource, endpoints: &Endpoints, selection: &Selection) -> Vec<CountryCode> {
    let codes = match &selection.codes {
        Some(given) => given
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(CountryCode::from)
            .collect(),
        None => discover_codes(source, endpoints).await.data().unwrap_or_default(),
    };

    match selection.limit {
        Some(n) => codes.into_iter().take(n).collect(),
        None => codes,
    }
}

fn print_report(report: &BatchReport) {
    for c in &report.countries {
        match &c.status {
            CountryStatus::ExtractFailed(reason) => println!("  {}: extract failed: {}", c.code, reason),
            CountryStatus::UpsertFailed(reason) => println!("  {}: upsert failed: {}", c.code, reason),
            CountryStatus::MissingIsoCode => println!("  {}: no ISO code, skipped", c.code),
            CountryStatus::NoData => println!("  {}: no data", c.code),
            _ => {}
        }
    }
    println!("{}", report.summary());
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
