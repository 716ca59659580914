//! Field readers for an open detail surface.
//!
//! Each reader finds a heading by landmark text and reads content relative to
//! it. A missing landmark, a torn-down surface or a failed read all yield an
//! empty string.

use super::{DetailSurface, SectionTarget};
use crate::Result;
use changetracker_core::TextMatch;
use changetracker_core::config::TextPatterns;

/// Overview text: first span under the "Overview" heading's parent
pub async fn extract_overview<S>(surface: &S, patterns: &TextPatterns, row_index: u32) -> String
where
    S: DetailSurface + ?Sized,
{
    guarded(surface, row_index, "overview", async {
        read_section(
            surface,
            &patterns.overview,
            SectionTarget::ParentText("span"),
        )
        .await
    })
    .await
}

/// Link target: first anchor under the "Next steps" heading's parent
pub async fn extract_url<S>(surface: &S, patterns: &TextPatterns, row_index: u32) -> String
where
    S: DetailSurface + ?Sized,
{
    guarded(surface, row_index, "URL", async {
        read_section(
            surface,
            &patterns.next_steps,
            SectionTarget::ParentAttr {
                tag: "a",
                attr: "href",
            },
        )
        .await
    })
    .await
}

/// Description text
///
/// Change announcements carry it in the span following the "What is
/// changing" heading. Roadmap items have no such heading and carry it in the
/// first paragraph under the release-description heading instead.
pub async fn extract_description<S>(
    surface: &S,
    patterns: &TextPatterns,
    row_index: u32,
) -> String
where
    S: DetailSurface + ?Sized,
{
    guarded(surface, row_index, "description", async {
        let headings = surface.headings().await?;
        if let Some(heading) = patterns.what_is_changing.position(&headings) {
            return surface
                .section(heading, SectionTarget::FollowingSiblingText("span"))
                .await;
        }
        match patterns.roadmap_description.position(&headings) {
            Some(heading) => {
                surface
                    .section(heading, SectionTarget::ParentText("p"))
                    .await
            }
            None => Ok(None),
        }
    })
    .await
}

async fn read_section<S>(
    surface: &S,
    landmark: &TextMatch,
    target: SectionTarget,
) -> Result<Option<String>>
where
    S: DetailSurface + ?Sized,
{
    let headings = surface.headings().await?;
    match landmark.position(&headings) {
        Some(heading) => surface.section(heading, target).await,
        None => Ok(None),
    }
}

async fn guarded<S, F>(surface: &S, row_index: u32, field: &str, read: F) -> String
where
    S: DetailSurface + ?Sized,
    F: Future<Output = Result<Option<String>>>,
{
    if surface.is_detached().await {
        return String::new();
    }
    match read.await {
        Ok(text) => text.unwrap_or_default(),
        Err(e) => {
            tracing::warn!("Could not extract {} for row {}: {}", field, row_index, e);
            String::new()
        }
    }
}
