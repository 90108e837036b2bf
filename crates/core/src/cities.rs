use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub coordinates: Option<Coordinates>,
}

// (lookup key, canonical name, latitude, longitude)
const BUILTIN_CITIES: &[(&str, &str, f64, f64)] = &[
    ("mumbai", "Mumbai", 19.0760, 72.8777),
    ("bombay", "Mumbai", 19.0760, 72.8777),
    ("delhi", "Delhi", 28.7041, 77.1025),
    ("new delhi", "Delhi", 28.7041, 77.1025),
    ("bangalore", "Bangalore", 12.9716, 77.5946),
    ("bengaluru", "Bangalore", 12.9716, 77.5946),
    ("hyderabad", "Hyderabad", 17.3850, 78.4867),
    ("chennai", "Chennai", 13.0827, 80.2707),
    ("madras", "Chennai", 13.0827, 80.2707),
    ("kolkata", "Kolkata", 22.5726, 88.3639),
    ("calcutta", "Kolkata", 22.5726, 88.3639),
    ("pune", "Pune", 18.5204, 73.8567),
    ("ahmedabad", "Ahmedabad", 23.0225, 72.5714),
    ("jaipur", "Jaipur", 26.9124, 75.7873),
    ("surat", "Surat", 21.1702, 72.8311),
    ("lucknow", "Lucknow", 26.8467, 80.9462),
    ("kanpur", "Kanpur", 26.4499, 80.3319),
    ("nagpur", "Nagpur", 21.1458, 79.0882),
    ("indore", "Indore", 22.7196, 75.8577),
    ("thane", "Thane", 19.2183, 72.9781),
    ("bhopal", "Bhopal", 23.2599, 77.4126),
    ("visakhapatnam", "Visakhapatnam", 17.6868, 83.2185),
    ("vizag", "Visakhapatnam", 17.6868, 83.2185),
    ("pimpri-chinchwad", "Pimpri-Chinchwad", 18.6298, 73.7997),
    ("patna", "Patna", 25.5941, 85.1376),
    ("gurgaon", "Gurgaon", 28.4595, 77.0266),
    ("gurugram", "Gurgaon", 28.4595, 77.0266),
    ("noida", "Noida", 28.5355, 77.3910),
    ("ghaziabad", "Ghaziabad", 28.6692, 77.4538),
];

static BUILTIN_TABLE: Lazy<CityTable> = Lazy::new(|| {
    let mut entries = HashMap::new();
    for (key, name, latitude, longitude) in BUILTIN_CITIES {
        entries.insert(
            normalize_city_key(key),
            City {
                name: (*name).to_string(),
                coordinates: Some(Coordinates {
                    latitude: *latitude,
                    longitude: *longitude,
                }),
            },
        );
    }
    CityTable { entries }
});

/// Normalized city name → canonical city. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CityTable {
    entries: HashMap<String, City>,
}

impl CityTable {
    pub fn builtin() -> &'static CityTable {
        &BUILTIN_TABLE
    }

    /// Restricts the table to the named cities. Known names keep their aliases
    /// and coordinates; unknown names are added without coordinates.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let builtin = Self::builtin();
        let mut entries = HashMap::new();

        for raw in names {
            let key = normalize_city_key(raw.as_ref());
            if key.is_empty() {
                continue;
            }

            match builtin.entries.get(&key) {
                Some(city) => {
                    for (alias, aliased) in &builtin.entries {
                        if aliased.name == city.name {
                            entries.insert(alias.clone(), aliased.clone());
                        }
                    }
                }
                None => {
                    entries.insert(
                        key,
                        City {
                            name: raw.as_ref().trim().to_string(),
                            coordinates: None,
                        },
                    );
                }
            }
        }

        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, raw: &str) -> Option<&City> {
        self.entries.get(&normalize_city_key(raw))
    }

    /// Typo-tolerant lookup: accepts a single best match within a small edit
    /// distance, and only when that match is unambiguous.
    pub fn fuzzy_lookup(&self, raw: &str) -> Option<&City> {
        let key = normalize_city_key(raw);
        let length = key.chars().count();
        if length < 4 {
            return None;
        }
        let max_distance = if length < 8 { 1 } else { 2 };

        let mut best: Option<(usize, &City)> = None;
        let mut ambiguous = false;
        for (candidate, city) in &self.entries {
            let distance = strsim::levenshtein(&key, candidate);
            if distance > max_distance {
                continue;
            }
            match best {
                Some((best_distance, _)) if distance > best_distance => {}
                Some((best_distance, best_city)) if distance == best_distance => {
                    if best_city.name != city.name {
                        ambiguous = true;
                    }
                }
                _ => {
                    best = Some((distance, city));
                    ambiguous = false;
                }
            }
        }

        if ambiguous {
            None
        } else {
            best.map(|(_, city)| city)
        }
    }

    pub fn contains_canonical(&self, name: &str) -> bool {
        self.entries
            .values()
            .any(|city| city.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn canonical(&self, name: &str) -> Option<&City> {
        self.lookup(name).or_else(|| {
            self.entries
                .values()
                .find(|city| city.name.eq_ignore_ascii_case(name.trim()))
        })
    }

    pub fn canonical_names(&self) -> Vec<String> {
        self.entries
            .values()
            .map(|city| city.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Lookup keys, longest first, for scanning free text.
    pub fn keys_longest_first(&self) -> Vec<&str> {
        let mut keys = self.entries.keys().map(String::as_str).collect::<Vec<_>>();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        keys
    }
}

pub fn normalize_city_key(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase().replace('-', " ");
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_end_matches('.');
    let without_country = trimmed
        .strip_suffix(", india")
        .or_else(|| trimmed.strip_suffix(" india"))
        .unwrap_or(trimmed);
    without_country.trim_end_matches(',').trim().to_string()
}
