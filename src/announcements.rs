use uuid::Uuid;

use crate::models::{Announcement, Audience, Record};

/// Most announcements a feed ever shows.
pub const FEED_LIMIT: usize = 20;

/// Announcements addressed to `audience` (directly or via `all`) or to any of
/// `grades`, newest first, capped at [`FEED_LIMIT`].
pub fn visible_to(
    mut announcements: Vec<Record<Announcement>>,
    audience: Audience,
    grades: &[Uuid],
) -> Vec<Record<Announcement>> {
    announcements.retain(|a| {
        matches!(a.data.target_audience, Audience::All)
            || a.data.target_audience == audience
            || a.data.target_grades.iter().any(|g| grades.contains(g))
    });
    announcements.sort_by(|a, b| {
        b.data
            .published_at
            .cmp(&a.data.published_at)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    announcements.truncate(FEED_LIMIT);
    announcements
}
