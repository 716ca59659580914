//! Parser for the documentation "What's new" page.
//!
//! The page is prose: `h2` headings name a month, each `h3` under it starts an
//! entry, and the paragraphs and list items that follow carry labeled lines
//! (`Type:`, `Service category:`, `Product capability:`) and free description
//! text. Labeled lines usually share one paragraph, separated by `<br>`.
//! Release types are inferred from the title prefix ("General Availability -
//! ...") on a best-effort basis.

use crate::text_match::normalize;
use crate::Row;
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Node, Selector};
use std::fmt;
use url::Url;

lazy_static! {
    static ref MAIN: Selector = Selector::parse("main").unwrap();
    static ref BLOCKS: Selector = Selector::parse("h2, h3, p, li").unwrap();
    static ref LINKS: Selector = Selector::parse("a[href]").unwrap();
}

/// Release stage inferred from an entry title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseType {
    GeneralAvailability,
    PublicPreview,
    PlanForChange,
    Deprecated,
    Retirement,
    /// The title had no recognized prefix
    Unmapped,
}

impl ReleaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseType::GeneralAvailability => "General Availability",
            ReleaseType::PublicPreview => "Public Preview",
            ReleaseType::PlanForChange => "Plan for change",
            ReleaseType::Deprecated => "Deprecated",
            ReleaseType::Retirement => "Retirement",
            ReleaseType::Unmapped => "Unmapped",
        }
    }

    /// Infer the release type from a title such as `Public Preview - Foo`
    ///
    /// Unknown prefixes are logged and reported as [`ReleaseType::Unmapped`].
    pub fn from_title(title: &str) -> Self {
        let prefix = title
            .split([':', '-', '–', '—'])
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();

        let release = match prefix.as_str() {
            "general availability" | "generally available" | "ga" => {
                ReleaseType::GeneralAvailability
            }
            "public preview" | "preview" => ReleaseType::PublicPreview,
            "plan for change" | "planned change" => ReleaseType::PlanForChange,
            "deprecated" | "deprecation" => ReleaseType::Deprecated,
            "retirement" | "retired" | "retiring" => ReleaseType::Retirement,
            _ => ReleaseType::Unmapped,
        };

        if release == ReleaseType::Unmapped {
            tracing::warn!(title = title, "Unmapped release type for what's new entry");
        }
        release
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the What's new page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhatsNewEntry {
    pub title: String,
    pub month: String,
    pub release_type: ReleaseType,
    pub entry_type: String,
    pub service_category: String,
    pub product_capability: String,
    pub description: String,
    pub url: String,
}

impl WhatsNewEntry {
    fn new(title: String, month: String) -> Self {
        let release_type = ReleaseType::from_title(&title);
        Self {
            title,
            month,
            release_type,
            entry_type: String::new(),
            service_category: String::new(),
            product_capability: String::new(),
            description: String::new(),
            url: String::new(),
        }
    }

    /// Convert into a [`Row`] keyed the same way portal rows are
    pub fn into_row(self, index: u32) -> Row {
        let fields = [
            ("title", self.title),
            ("releaseDate", self.month),
            ("releaseType", self.release_type.as_str().to_string()),
            ("type", self.entry_type),
            ("serviceCategory", self.service_category),
            ("productCapability", self.product_capability),
        ];

        let mut row = Row::new(index, fields.map(|(key, value)| (key.to_string(), value)));
        row.url = self.url;
        row.description = self.description;
        row
    }

    fn absorb_block(&mut self, block: ElementRef<'_>, base: Option<&Url>) {
        let mut description = Vec::new();
        for line in block_lines(block) {
            if let Some(value) = labeled(&line, "Type:") {
                self.entry_type = value;
            } else if let Some(value) = labeled(&line, "Service category:") {
                self.service_category = value;
            } else if let Some(value) = labeled(&line, "Product capability:") {
                self.product_capability = value;
            } else {
                description.push(line);
            }
        }

        if !description.is_empty() {
            if !self.description.is_empty() {
                self.description.push_str("\n\n");
            }
            self.description.push_str(&description.join("\n"));
        }

        if self.url.is_empty() {
            if let Some(href) = first_link(block) {
                self.url = resolve(href, base);
            }
        }
    }
}

/// Parse every entry on the page, in page order
pub fn parse(html: &str, base: Option<&Url>) -> Vec<WhatsNewEntry> {
    let document = Html::parse_document(html);

    let root = document
        .select(&MAIN)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut entries = Vec::new();
    let mut month = String::new();
    let mut current: Option<WhatsNewEntry> = None;

    for element in root.select(&BLOCKS) {
        if inside_list_item(element) {
            continue;
        }
        let text = normalize(&element.text().collect::<String>());
        match element.value().name() {
            "h2" => {
                entries.extend(current.take());
                month = text;
            }
            "h3" => {
                entries.extend(current.take());
                if !text.is_empty() {
                    current = Some(WhatsNewEntry::new(text, month.clone()));
                }
            }
            _ => {
                if let Some(entry) = current.as_mut() {
                    entry.absorb_block(element, base);
                }
            }
        }
    }
    entries.extend(current);

    tracing::debug!("Parsed {} what's new entries", entries.len());
    entries
}

/// Parse the page straight into rows, indexed by page order
pub fn parse_rows(html: &str, base: Option<&Url>) -> Vec<Row> {
    parse(html, base)
        .into_iter()
        .enumerate()
        .map(|(i, entry)| entry.into_row(i as u32))
        .collect()
}

/// Text of a block split at `<br>`, normalized, without blank lines
fn block_lines(block: ElementRef<'_>) -> Vec<String> {
    let mut lines = vec![String::new()];
    for node in block.descendants() {
        match node.value() {
            Node::Text(text) => {
                if let Some(line) = lines.last_mut() {
                    line.push_str(text);
                }
            }
            Node::Element(element) if element.name() == "br" => lines.push(String::new()),
            _ => {}
        }
    }
    lines
        .iter()
        .map(|line| normalize(line))
        .filter(|line| !line.is_empty())
        .collect()
}

/// Blocks nested in a list item are read as part of that item
fn inside_list_item(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().name() == "li")
}

fn labeled(text: &str, label: &str) -> Option<String> {
    let head = text.get(..label.len())?;
    head.eq_ignore_ascii_case(label)
        .then(|| text[label.len()..].trim().to_string())
}

fn first_link(paragraph: ElementRef<'_>) -> Option<&str> {
    paragraph
        .select(&LINKS)
        .next()
        .and_then(|a| a.value().attr("href"))
}

fn resolve(href: &str, base: Option<&Url>) -> String {
    match base.and_then(|b| b.join(href).ok()) {
        Some(url) => url.to_string(),
        None => href.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <nav><h3>Navigation</h3></nav>
        <main>
          <h1>What's new in Microsoft Entra ID?</h1>
          <h2 id="march-2025">March 2025</h2>
          <h3>General Availability - Passkeys in Microsoft Authenticator</h3>
          <p><strong>Type:</strong> New feature</p>
          <p><strong>Service category:</strong> Authentications (Logins)</p>
          <p><strong>Product capability:</strong> User Authentication</p>
          <p>Users can now sign in with device-bound passkeys.</p>
          <p>For more information, see: <a href="/en-us/entra/identity/passkeys">Passkeys</a>.</p>
          <h3>Public Preview – Custom security attributes in audit logs</h3>
          <p><strong>Type:</strong> Changed feature</p>
          <h2 id="february-2025">February 2025</h2>
          <h3>Something unusual happened</h3>
          <p>Free text only.</p>
        </main>
        </body></html>
    "#;

    fn base() -> Url {
        Url::parse("https://learn.microsoft.com/en-us/entra/fundamentals/whats-new").unwrap()
    }

    #[test]
    fn test_parses_entries_in_page_order() {
        let base = base();
        let entries = parse(PAGE, Some(&base));
        assert_eq!(entries.len(), 3);

        let first = &entries[0];
        assert_eq!(first.title, "General Availability - Passkeys in Microsoft Authenticator");
        assert_eq!(first.month, "March 2025");
        assert_eq!(first.release_type, ReleaseType::GeneralAvailability);
        assert_eq!(first.entry_type, "New feature");
        assert_eq!(first.service_category, "Authentications (Logins)");
        assert_eq!(first.product_capability, "User Authentication");
        assert_eq!(
            first.description,
            "Users can now sign in with device-bound passkeys.\n\nFor more information, see: Passkeys."
        );
        assert_eq!(first.url, "https://learn.microsoft.com/en-us/entra/identity/passkeys");

        assert_eq!(entries[1].release_type, ReleaseType::PublicPreview);
        assert_eq!(entries[1].entry_type, "Changed feature");
        assert_eq!(entries[1].month, "March 2025");

        assert_eq!(entries[2].month, "February 2025");
        assert_eq!(entries[2].release_type, ReleaseType::Unmapped);
        assert_eq!(entries[2].url, "");
    }

    #[test]
    fn test_labels_separated_by_line_breaks() {
        let html = r#"
            <main>
              <h2>April 2025</h2>
              <h3>General Availability - Passkeys in Microsoft Authenticator</h3>
              <p><strong>Type:</strong> New feature<br>
                 <strong>Service category:</strong> Authentications (Logins)<br>
                 <strong>Product capability:</strong> User Authentication</p>
              <p>Users can now sign in with device-bound passkeys.</p>
            </main>
        "#;

        let entries = parse(html, None);
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.entry_type, "New feature");
        assert_eq!(entry.service_category, "Authentications (Logins)");
        assert_eq!(entry.product_capability, "User Authentication");
        assert_eq!(entry.description, "Users can now sign in with device-bound passkeys.");
    }

    #[test]
    fn test_list_items_join_the_description() {
        let html = r#"
            <main>
              <h2>April 2025</h2>
              <h3>Plan for change - Legacy MFA policies</h3>
              <p>Migrate before retirement:</p>
              <ul>
                <li><p>Export your <a href="https://example.com/policies">policies</a>.</p></li>
                <li>Enable the new methods policy.
                  <ul><li>Nested detail</li></ul>
                </li>
              </ul>
            </main>
        "#;

        let entries = parse(html, None);
        assert_eq!(
            entries[0].description,
            "Migrate before retirement:\n\nExport your policies.\n\nEnable the new methods policy. Nested detail"
        );
        assert_eq!(entries[0].url, "https://example.com/policies");
    }

    #[test]
    fn test_headings_outside_main_are_ignored() {
        let entries = parse(PAGE, None);
        assert!(entries.iter().all(|e| e.title != "Navigation"));
    }

    #[test]
    fn test_release_type_prefixes() {
        assert_eq!(
            ReleaseType::from_title("Plan for change - Legacy MFA policies"),
            ReleaseType::PlanForChange
        );
        assert_eq!(
            ReleaseType::from_title("Deprecated: Azure AD Graph"),
            ReleaseType::Deprecated
        );
        assert_eq!(
            ReleaseType::from_title("retirement — old portal"),
            ReleaseType::Retirement
        );
        assert_eq!(ReleaseType::from_title("No prefix at all"), ReleaseType::Unmapped);
    }

    #[test]
    fn test_rows_carry_release_fields() {
        let rows = parse_rows(PAGE, None);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].index, 1);
        assert_eq!(rows[0].fields["releaseType"], "General Availability");
        assert_eq!(rows[0].fields["releaseDate"], "March 2025");
        assert_eq!(rows[0].url, "/en-us/entra/identity/passkeys");
        assert_eq!(rows[0].overview, "");
    }

    #[test]
    fn test_page_without_main_uses_whole_document() {
        let html = "<h2>May 2024</h2><h3>Public Preview - X</h3><p>Body</p>";
        let entries = parse(html, None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "Body");
    }
}
