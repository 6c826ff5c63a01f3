use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::outcome::Outcome;
use crate::record::{FieldKey, NormalizedRecord, RawPairs};

/// Leading `- ` left over when a category label is scraped with its bullet.
static LEADING_DASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*-\s*").unwrap());

/// Run-together labels seen on the source pages and their spaced form.
const SPACING_REPAIRS: &[(&str, &str)] = &[("DomesticPre-registration", "Domestic Pre-registration")];

/// Simple fields that lead every record, in this order.
pub const SIMPLE_KEY_ORDER: &[&str] = &[
    "Locale name",
    "ISO code",
    "Region",
    "Mobile country code",
    "Dialing code",
    "Two-way SMS supported",
    "Number portability available",
    "Twilio concatenated message support",
    "Message length",
    "Twilio MMS support",
    "Sending SMS to landline numbers",
    "Compliance considerations",
];

/// Categories placed ahead of any others, in this order.
pub const CATEGORY_ORDER: &[&str] = &[
    "International Pre-registration",
    "Domestic Pre-registration",
    "Dynamic",
    "Long code domestic",
    "Long code international",
    "Short code",
];

/// Degraded extractions pass through untouched.
pub fn normalize_outcome(raw: Outcome<RawPairs>) -> Outcome<NormalizedRecord> {
    raw.map(|pairs| normalize(&pairs))
}

/// Clean keys and order them: canonical simple keys, other simple keys
/// sorted, then category buckets (canonical first, others sorted) with
/// sorted keys inside each bucket.
pub fn normalize(raw: &RawPairs) -> NormalizedRecord {
    let mut cleaned: IndexMap<String, String> = IndexMap::with_capacity(raw.len());
    for (key, value) in raw.iter() {
        cleaned.insert(clean_key(key), value.to_string());
    }

    let mut simple: HashMap<String, String> = HashMap::new();
    let mut groups: HashMap<String, BTreeMap<String, String>> = HashMap::new();

    for (key, value) in cleaned {
        match FieldKey::parse(&key).category().map(repair_spacing) {
            None => {
                simple.insert(key, value);
            }
            Some(category) => {
                groups.entry(category).or_default().insert(key, value);
            }
        }
    }

    let mut record = NormalizedRecord::default();

    for name in SIMPLE_KEY_ORDER {
        if let Some((key, value)) = simple.remove_entry(*name) {
            record.push(key, value);
        }
    }
    let mut rest: Vec<(String, String)> = simple.into_iter().collect();
    rest.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, value) in rest {
        record.push(key, value);
    }

    let mut ordered_groups: Vec<BTreeMap<String, String>> = Vec::with_capacity(groups.len());
    for name in CATEGORY_ORDER {
        if let Some(bucket) = groups.remove(*name) {
            ordered_groups.push(bucket);
        }
    }
    let mut rest: Vec<(String, BTreeMap<String, String>)> = groups.into_iter().collect();
    rest.sort_by(|a, b| a.0.cmp(&b.0));
    ordered_groups.extend(rest.into_iter().map(|(_, bucket)| bucket));

    for bucket in ordered_groups {
        for (key, value) in bucket {
            record.push(key, value);
        }
    }

    record
}

/// Strip a leading dash artifact and repair run-together labels.
pub fn clean_key(key: &str) -> String {
    let stripped = LEADING_DASH.replace(key, "");
    repair_spacing(stripped.trim())
}

fn repair_spacing(key: &str) -> String {
    SPACING_REPAIRS
        .iter()
        .fold(key.to_string(), |acc, (from, to)| acc.replace(from, to))
}

// ── Tests ──
