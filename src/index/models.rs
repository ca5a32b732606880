use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One program record from the remote index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub program_url: String,
    #[serde(rename = "URL")]
    pub url: String,
    pub count: i64,
    pub change: i64,
    pub is_new: bool,
    pub platform: String,
    pub bounty: bool,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_index_record() {
        let raw = r#"{
            "name": "Example",
            "program_url": "https://hackerone.com/example",
            "URL": "https://chaos-data.projectdiscovery.io/example.zip",
            "count": 42,
            "change": -3,
            "is_new": false,
            "platform": "hackerone",
            "bounty": true,
            "last_updated": "2024-03-01T12:30:00.123456Z"
        }"#;
        let entry: ManifestEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.url, "https://chaos-data.projectdiscovery.io/example.zip");
        assert_eq!(entry.change, -3);
        assert!(entry.bounty);

        let encoded = serde_json::to_value(&entry).unwrap();
        assert!(encoded.get("URL").is_some());
        assert!(encoded.get("url").is_none());
    }
}
