/// Source configuration: which board page to scrape for each room category and weekday
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use url::Url;

use super::error::IngestError;

/// Built-in source table, used when no source file is configured.
const DEFAULT_SOURCES_JSON: &str = include_str!("../../../../config/sources.json");

/// The fixed set of room categories posted on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "스튜디오/랩/라운지")]
    StudioLabLounge,
    #[serde(rename = "일반 연습실")]
    PracticeRoom,
    #[serde(rename = "드럼 연습실")]
    DrumRoom,
}

impl Category {
    /// Every category, in the order an `all` run visits them.
    pub const ALL: [Category; 3] = [
        Category::StudioLabLounge,
        Category::PracticeRoom,
        Category::DrumRoom,
    ];

    /// The name stored in the `category` column and used by the board.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::StudioLabLounge => "스튜디오/랩/라운지",
            Category::PracticeRoom => "일반 연습실",
            Category::DrumRoom => "드럼 연습실",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or(())
    }
}

/// Which categories an ingestion run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryScope {
    All,
    One(Category),
    /// A name that is not one of the known categories. It never has a source
    /// mapping, so every pair it produces is skipped.
    Unknown(String),
}

impl CategoryScope {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return CategoryScope::All;
        }

        match s.parse::<Category>() {
            Ok(c) => CategoryScope::One(c),
            Err(()) => CategoryScope::Unknown(s.to_string()),
        }
    }
}

/// Immutable weekday -> board URL table, keyed by category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub categories: BTreeMap<Category, HashMap<Weekday, String>>,
}

impl SourceConfig {
    /// Loads the source table from a JSON file.
    ///
    /// # Arguments
    /// * `path` - Path to a JSON file shaped like `config/sources.json`
    ///
    /// # Returns
    /// * `Ok(SourceConfig)` - The validated table
    /// * `Err` - If the file can't be read, parsed, or holds an invalid URL
    pub fn load_from_file(path: &Path) -> Result<Self, IngestError> {
        let content = fs::read_to_string(path).map_err(|e| IngestError::Config {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_json(&content)
    }

    /// Parses and validates a JSON source table.
    pub fn from_json(content: &str) -> Result<Self, IngestError> {
        let config: SourceConfig =
            serde_json::from_str(content).map_err(|e| IngestError::Config {
                message: e.to_string(),
            })?;

        for (category, days) in &config.categories {
            for (day, raw_url) in days {
                // Blank entries are allowed and treated as missing.
                if raw_url.trim().is_empty() {
                    continue;
                }
                Url::parse(raw_url).map_err(|e| IngestError::Config {
                    message: format!("invalid URL for {} on {}: {}", category, day, e),
                })?;
            }
        }

        Ok(config)
    }

    /// The table compiled into the binary.
    pub fn builtin() -> Result<Self, IngestError> {
        Self::from_json(DEFAULT_SOURCES_JSON)
    }

    /// Creates an empty table
    pub fn empty() -> Self {
        SourceConfig {
            categories: BTreeMap::new(),
        }
    }

    /// Looks up the board URL for a category on a weekday.
    pub fn resolve(&self, category: Category, day: Weekday) -> Option<&str> {
        self.categories
            .get(&category)
            .and_then(|days| days.get(&day))
            .map(|url| url.as_str())
            .filter(|url| !url.trim().is_empty())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::empty()
    }
}
