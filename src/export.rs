use std::collections::BTreeSet;
use std::io::Write;

use anyhow::Result;

use crate::record::{CountryCode, FieldKey, NormalizedRecord};

/// Column order: by category (a simple key is its own category), then key.
pub fn columns<'a>(records: impl IntoIterator<Item = &'a NormalizedRecord>) -> Vec<String> {
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    for record in records {
        for key in record.keys() {
            let group = FieldKey::parse(key).category().unwrap_or(key).to_string();
            seen.insert((group, key.to_string()));
        }
    }
    seen.into_iter().map(|(_, key)| key).collect()
}

/// Write one fully quoted CSV row per country.
pub fn write_csv<W: Write>(out: W, records: &[(CountryCode, NormalizedRecord)]) -> Result<()> {
    let cols = columns(records.iter().map(|(_, r)| r));
    let mut wtr = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(out);

    let mut header = Vec::with_capacity(cols.len() + 1);
    header.push("country_code");
    header.extend(cols.iter().map(String::as_str));
    wtr.write_record(&header)?;

    for (code, record) in records {
        let mut row = Vec::with_capacity(cols.len() + 1);
        row.push(code.as_str());
        row.extend(cols.iter().map(|c| record.get(c).unwrap_or("")));
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::record::RawPairs;

    fn record(pairs: &[(&str, &str)]) -> NormalizedRecord {
        normalize(&pairs.iter().copied().collect::<RawPairs>())
    }

    #[test]
    fn columns_group_by_category() {
        let a = record(&[("Short code - b", "1"), ("ISO code", "DE"), ("Region", "EU")]);
        let b = record(&[("Short code - a", "2"), ("Dynamic - x", "3"), ("ISO code", "FR")]);
        assert_eq!(
            columns([&a, &b]),
            vec!["Dynamic - x", "ISO code", "Region", "Short code - a", "Short code - b"]
        );
    }

    #[test]
    fn csv_quotes_everything_and_fills_gaps() {
        let records = vec![
            (CountryCode::from("de"), record(&[("ISO code", "DE"), ("Region", "Europe")])),
            (CountryCode::from("fr"), record(&[("ISO code", "FR")])),
        ];
        let mut buf = Vec::new();
        write_csv(&mut buf, &records).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], r#""country_code","ISO code","Region""#);
        assert_eq!(lines[1], r#""de","DE","Europe""#);
        assert_eq!(lines[2], r#""fr","FR","""#);
    }
}
