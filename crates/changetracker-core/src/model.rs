use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Record key for the link captured from a row's detail surface
pub const URL_KEY: &str = "url";
/// Record key for the description captured from a row's detail surface
pub const DESCRIPTION_KEY: &str = "description";
/// Record key for the overview captured from a row's detail surface
pub const OVERVIEW_KEY: &str = "overview";
/// Column key the portal uses for a row's title
pub const TITLE_KEY: &str = "title";

/// A logical data view produced by one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum View {
    Roadmap,
    ChangeAnnouncements,
    WhatsNew,
}

impl View {
    /// All views in the order a run produces them
    pub const ALL: [View; 3] = [View::Roadmap, View::ChangeAnnouncements, View::WhatsNew];

    /// Views scraped from the portal through the browser
    pub const PORTAL: [View; 2] = [View::Roadmap, View::ChangeAnnouncements];

    /// Configuration key for this view
    pub fn key(&self) -> &'static str {
        match self {
            View::Roadmap => "roadmap",
            View::ChangeAnnouncements => "changeAnnouncements",
            View::WhatsNew => "whatsNew",
        }
    }

    /// Stem used for local JSON dumps
    pub fn file_stem(&self) -> &'static str {
        match self {
            View::Roadmap => "roadmap",
            View::ChangeAnnouncements => "change-announcements",
            View::WhatsNew => "whats-new",
        }
    }

    /// List name used when the configuration does not name one
    pub fn default_list_name(&self) -> &'static str {
        match self {
            View::Roadmap => "EntraRoadmapItems",
            View::ChangeAnnouncements => "EntraChangeAnnouncements",
            View::WhatsNew => "EntraWhatsNew",
        }
    }

    /// Parse a view from its configuration key or file stem
    pub fn parse(value: &str) -> Option<Self> {
        View::ALL
            .into_iter()
            .find(|v| v.key().eq_ignore_ascii_case(value) || v.file_stem() == value)
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            View::Roadmap => "Roadmap",
            View::ChangeAnnouncements => "Change announcements",
            View::WhatsNew => "What's new",
        };
        f.write_str(name)
    }
}

/// Fields read from a row's detail surface
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowDetails {
    pub url: String,
    pub description: String,
    pub overview: String,
}

impl RowDetails {
    /// Details with every field empty
    pub fn empty() -> Self {
        Self::default()
    }

    /// Trim surrounding whitespace from every field
    pub fn trimmed(self) -> Self {
        Self {
            url: self.url.trim().to_string(),
            description: self.description.trim().to_string(),
            overview: self.overview.trim().to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.url.is_empty() && self.description.is_empty() && self.overview.is_empty()
    }
}

/// One entry of a scraped list
///
/// `index` is the position the list reported for the row and is unique within
/// one view. Columns keep the order they were read in. The detail fields are
/// always present, possibly empty.
///
/// A row serializes as one flat JSON object: the columns, then `url`,
/// `description` and `overview`. Detail fields shadow same-named columns.
/// `index` is not serialized; readers assign it from the record position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub index: u32,
    pub fields: IndexMap<String, String>,
    pub url: String,
    pub description: String,
    pub overview: String,
}

impl Row {
    /// Create a row with column fields and empty details
    pub fn new<I>(index: u32, fields: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            index,
            fields: fields.into_iter().collect(),
            ..Default::default()
        }
    }

    /// The row's title column, or an empty string
    pub fn title(&self) -> &str {
        self.fields.get(TITLE_KEY).map(String::as_str).unwrap_or("")
    }

    /// Attach the fields read from the detail surface
    pub fn attach_details(&mut self, details: RowDetails) {
        self.url = details.url;
        self.description = details.description;
        self.overview = details.overview;
    }

    /// Look up a value by record key; detail fields shadow same-named columns
    pub fn value(&self, key: &str) -> Option<&str> {
        match key {
            URL_KEY => Some(&self.url),
            DESCRIPTION_KEY => Some(&self.description),
            OVERVIEW_KEY => Some(&self.overview),
            _ => self.fields.get(key).map(String::as_str),
        }
    }
}

fn is_detail_key(key: &str) -> bool {
    matches!(key, URL_KEY | DESCRIPTION_KEY | OVERVIEW_KEY)
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let columns: Vec<_> = self
            .fields
            .iter()
            .filter(|(key, _)| !is_detail_key(key))
            .collect();

        let mut map = serializer.serialize_map(Some(columns.len() + 3))?;
        for (key, value) in columns {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry(URL_KEY, &self.url)?;
        map.serialize_entry(DESCRIPTION_KEY, &self.description)?;
        map.serialize_entry(OVERVIEW_KEY, &self.overview)?;
        map.end()
    }
}

/// Non-string scalars are stringified and `null` becomes an empty string
impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = IndexMap::<String, Value>::deserialize(deserializer)?;

        let mut row = Row::default();
        for (key, value) in record {
            let text = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            match key.as_str() {
                URL_KEY => row.url = text,
                DESCRIPTION_KEY => row.description = text,
                OVERVIEW_KEY => row.overview = text,
                _ => {
                    row.fields.insert(key, text);
                }
            }
        }
        Ok(row)
    }
}

/// Rows produced by one run, per view
///
/// A view is `None` when it could not be scraped (tab missing, page
/// unreachable); it is `Some` with possibly zero rows otherwise.
#[derive(Debug, Clone, Default)]
pub struct ScrapeReport {
    roadmap: Option<Vec<Row>>,
    change_announcements: Option<Vec<Row>>,
    whats_new: Option<Vec<Row>>,
}

impl ScrapeReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, view: View) -> Option<&[Row]> {
        match view {
            View::Roadmap => self.roadmap.as_deref(),
            View::ChangeAnnouncements => self.change_announcements.as_deref(),
            View::WhatsNew => self.whats_new.as_deref(),
        }
    }

    pub fn set(&mut self, view: View, rows: Option<Vec<Row>>) {
        match view {
            View::Roadmap => self.roadmap = rows,
            View::ChangeAnnouncements => self.change_announcements = rows,
            View::WhatsNew => self.whats_new = rows,
        }
    }

    /// Views that produced data, in run order
    pub fn available(&self) -> impl Iterator<Item = (View, &[Row])> {
        View::ALL
            .into_iter()
            .filter_map(|view| self.get(view).map(|rows| (view, rows)))
    }
}
