use regex::{Regex, RegexBuilder};
use std::fmt;

/// Matches visible text against a configured landmark
///
/// Written as `/pattern/i` (or `/pattern/`) the landmark is a regular
/// expression; anything else is a case-insensitive substring match. Both forms
/// compare against whitespace-normalized text.
#[derive(Debug, Clone)]
pub enum TextMatch {
    /// Substring match; holds the normalized, lowercased needle and the source
    Contains { needle: String, source: String },
    /// Regular expression match; holds the compiled pattern and the source
    Pattern { regex: Regex, source: String },
}

impl TextMatch {
    /// Parse a landmark string
    pub fn parse(source: &str) -> crate::Result<Self> {
        if let Some((body, flags)) = split_pattern(source) {
            let case_insensitive = match flags {
                "" => false,
                "i" => true,
                other => {
                    return Err(crate::Error::InvalidPattern(format!(
                        "Unsupported flags '{}' in '{}'",
                        other, source
                    )));
                }
            };
            let regex = RegexBuilder::new(body)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|e| {
                    crate::Error::InvalidPattern(format!("Invalid pattern '{}': {}", source, e))
                })?;
            Ok(TextMatch::Pattern {
                regex,
                source: source.to_string(),
            })
        } else {
            Ok(Self::literal(source))
        }
    }

    /// Substring landmark, never interpreted as a pattern
    pub fn literal(text: &str) -> Self {
        TextMatch::Contains {
            needle: normalize(text).to_lowercase(),
            source: text.to_string(),
        }
    }

    /// Check whether visible text satisfies this landmark
    pub fn matches(&self, text: &str) -> bool {
        let text = normalize(text);
        match self {
            TextMatch::Contains { needle, .. } => text.to_lowercase().contains(needle.as_str()),
            TextMatch::Pattern { regex, .. } => regex.is_match(&text),
        }
    }

    /// Index of the first candidate that matches
    pub fn position<S: AsRef<str>>(&self, candidates: &[S]) -> Option<usize> {
        candidates.iter().position(|c| self.matches(c.as_ref()))
    }

    /// The landmark as it was written
    pub fn as_str(&self) -> &str {
        match self {
            TextMatch::Contains { source, .. } | TextMatch::Pattern { source, .. } => source,
        }
    }
}

impl fmt::Display for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq for TextMatch {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl TryFrom<String> for TextMatch {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        TextMatch::parse(&value)
    }
}

impl From<TextMatch> for String {
    fn from(value: TextMatch) -> Self {
        value.as_str().to_string()
    }
}

impl serde::Serialize for TextMatch {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for TextMatch {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        TextMatch::parse(&source).map_err(serde::de::Error::custom)
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn split_pattern(source: &str) -> Option<(&str, &str)> {
    let rest = source.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    let (body, flags) = (&rest[..end], &rest[end + 1..]);
    if body.is_empty() {
        return None;
    }
    Some((body, flags))
}
