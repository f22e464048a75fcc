//! Object-store data model: storage classes, retrieval tiers, restore state.

use serde::{Deserialize, Serialize};

/// S3 storage class, limited to the classes curator transitions between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageClass {
    Standard,
    StandardIa,
    IntelligentTiering,
    Glacier,
    DeepArchive,
}

impl StorageClass {
    /// Whether objects in this class need a restore before they are readable.
    pub fn is_cold(&self) -> bool {
        matches!(self, StorageClass::Glacier | StorageClass::DeepArchive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageClass::Standard => "STANDARD",
            StorageClass::StandardIa => "STANDARD_IA",
            StorageClass::IntelligentTiering => "INTELLIGENT_TIERING",
            StorageClass::Glacier => "GLACIER",
            StorageClass::DeepArchive => "DEEP_ARCHIVE",
        }
    }
}

impl std::fmt::Display for StorageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StorageClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "STANDARD" => Ok(StorageClass::Standard),
            "STANDARD_IA" => Ok(StorageClass::StandardIa),
            "INTELLIGENT_TIERING" => Ok(StorageClass::IntelligentTiering),
            "GLACIER" => Ok(StorageClass::Glacier),
            "DEEP_ARCHIVE" => Ok(StorageClass::DeepArchive),
            other => Err(format!("unknown storage class: {}", other)),
        }
    }
}

/// Glacier retrieval tier for restore requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrievalTier {
    Expedited,
    Standard,
    Bulk,
}

impl RetrievalTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalTier::Expedited => "Expedited",
            RetrievalTier::Standard => "Standard",
            RetrievalTier::Bulk => "Bulk",
        }
    }
}

impl std::fmt::Display for RetrievalTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RetrievalTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expedited" => Ok(RetrievalTier::Expedited),
            "standard" => Ok(RetrievalTier::Standard),
            "bulk" => Ok(RetrievalTier::Bulk),
            other => Err(format!("unknown retrieval tier: {}", other)),
        }
    }
}

/// Restore state of one archived object, per the `Restore` response header:
/// absent ⇒ not restored, `ongoing-request="true"` ⇒ in progress,
/// `ongoing-request="false"` ⇒ restored copy available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStatus {
    NotRestored,
    InProgress,
    Restored,
}

impl RestoreStatus {
    /// Parse the raw `Restore` header value.
    pub fn from_header(header: Option<&str>) -> RestoreStatus {
        match header {
            None => RestoreStatus::NotRestored,
            Some(value) if value.contains("ongoing-request=\"true\"") => RestoreStatus::InProgress,
            Some(value) if value.contains("ongoing-request=\"false\"") => RestoreStatus::Restored,
            Some(_) => RestoreStatus::NotRestored,
        }
    }
}

/// One listed object.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
    pub storage_class: StorageClass,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_class_round_trip() {
        for class in [
            StorageClass::Standard,
            StorageClass::StandardIa,
            StorageClass::IntelligentTiering,
            StorageClass::Glacier,
            StorageClass::DeepArchive,
        ] {
            assert_eq!(class.as_str().parse::<StorageClass>().unwrap(), class);
        }
        assert!("REDUCED_REDUNDANCY".parse::<StorageClass>().is_err());
    }

    #[test]
    fn test_cold_classes() {
        assert!(StorageClass::Glacier.is_cold());
        assert!(StorageClass::DeepArchive.is_cold());
        assert!(!StorageClass::Standard.is_cold());
        assert!(!StorageClass::IntelligentTiering.is_cold());
    }

    #[test]
    fn test_restore_header_parsing() {
        assert_eq!(RestoreStatus::from_header(None), RestoreStatus::NotRestored);
        assert_eq!(
            RestoreStatus::from_header(Some("ongoing-request=\"true\"")),
            RestoreStatus::InProgress
        );
        assert_eq!(
            RestoreStatus::from_header(Some(
                "ongoing-request=\"false\", expiry-date=\"Fri, 21 Dec 2025 00:00:00 GMT\""
            )),
            RestoreStatus::Restored
        );
        assert_eq!(
            RestoreStatus::from_header(Some("garbage")),
            RestoreStatus::NotRestored
        );
    }
}
