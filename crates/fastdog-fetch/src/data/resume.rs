use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an interrupted transfer stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeData {
    /// Resource the snapshot belongs to.
    pub resource_id: String,

    /// Bytes already delivered to the sink, counted from offset 0.
    pub downloaded: u64,

    /// Resource length when the snapshot was taken. A different length on resume
    /// discards the snapshot.
    pub total: Option<u64>,

    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl ResumeData {
    pub fn new(resource_id: impl Into<String>, downloaded: u64, total: Option<u64>) -> Self {
        Self {
            resource_id: resource_id.into(),
            downloaded,
            total,
            timestamp: Utc::now(),
        }
    }

    /// Offset to continue `resource_id` from, if this snapshot belongs to it
    /// and the resource size has not changed.
    pub fn offset_for(&self, resource_id: &str, total: Option<u64>) -> Option<u64> {
        (self.resource_id == resource_id && self.total == total && self.downloaded > 0)
            .then_some(self.downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_matching_resources_resume() {
        let data = ResumeData::new("scene.fdg", 4096, Some(10_000));
        assert_eq!(data.offset_for("scene.fdg", Some(10_000)), Some(4096));
        assert_eq!(data.offset_for("other.fdg", Some(10_000)), None);
        assert_eq!(data.offset_for("scene.fdg", Some(9_999)), None);
    }

    #[test]
    fn serializes_for_persistence() {
        let data = ResumeData::new("scene.fdg", 1, None);
        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(serde_json::from_str::<ResumeData>(&json).unwrap(), data);
    }
}
