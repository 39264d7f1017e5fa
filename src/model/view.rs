use super::*;

/// One deduplicated (viewer, post) view record. The record id is the
/// `viewer:post` pair key, so a record can exist at most once per pair and the
/// create-or-increment write is a single atomic statement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ViewRecord {
    pub post_id: PostId,
    pub viewer_id: UserId,
    pub first_viewed_at: Timestamp,
    pub last_viewed_at: Timestamp,
    pub view_count: i64,
}

impl ViewRecord {
    /// True when the upsert that produced this record created it.
    pub fn is_first_view(&self) -> bool {
        self.view_count == 1
    }
}
