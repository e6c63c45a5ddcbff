//! Journal dataset model.
//!
//! These are the records a backup archive carries. Field names serialize in
//! camelCase so archives stay readable by the mobile client.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use diaryvault_common::Result;

/// Emotion attached to a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Excited,
    Loved,
    Grateful,
    Peaceful,
    Sad,
    Angry,
    Frustrated,
    Anxious,
    Confused,
    #[default]
    Neutral,
    Mixed,
}

/// A journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// Plaintext body. Private entries are encrypted at rest by the
    /// selective encryption policy, never inside the dataset.
    pub content: String,
    pub mood: Mood,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Envelope string the mobile client keeps next to private content.
    /// Carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_content: Option<String>,
}

impl JournalEntry {
    /// Create an entry with a fresh id and current timestamps.
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: title.into(),
            content: content.into(),
            mood: Mood::default(),
            tags: Vec::new(),
            attachments: Vec::new(),
            is_private: false,
            location: None,
            weather: None,
            created_at: now,
            updated_at: now,
            encrypted_content: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    #[default]
    Image,
    Video,
    Audio,
    Document,
}

/// File attached to a journal entry. Only the reference travels in a
/// backup; the file itself stays where `uri` points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    #[serde(default)]
    pub diary_entry_id: String,
    #[serde(rename = "type", default)]
    pub kind: AttachmentKind,
    pub uri: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

/// Messaging platform a chat record was imported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatPlatform {
    Wechat,
    Qq,
    Telegram,
    Whatsapp,
    #[default]
    Manual,
}

/// Kind of chat message payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    Audio,
    Sticker,
    File,
}

/// One message in an imported conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    #[serde(default)]
    pub chat_record_id: String,
    pub sender: String,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_from_user: bool,
}

/// A conversation imported from a messaging platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    pub id: String,
    pub user_id: String,
    pub platform: ChatPlatform,
    pub contact_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub imported_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

/// Time span covered by an imported conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A user-defined tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub usage_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

/// Application preferences carried along in a backup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    pub theme: Theme,
    pub font_size: FontSize,
    pub biometric_enabled: bool,
    pub auto_backup: bool,
    pub privacy_mode: bool,
    pub notifications_enabled: bool,
}

/// Everything a backup archive contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDataset {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub entries: Vec<JournalEntry>,
    #[serde(default)]
    pub chat_records: Vec<ChatRecord>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub preferences: UserPreferences,
    pub created_at: DateTime<Utc>,
    /// Serialized size in bytes of entries, chat records and tags.
    #[serde(default)]
    pub size: u64,
    /// Whether private entries were included. Set by
    /// [`for_export`](BackupDataset::for_export); the codec never touches it.
    #[serde(default)]
    pub encrypted: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SizedContent<'a> {
    entries: &'a [JournalEntry],
    chat_records: &'a [ChatRecord],
    tags: &'a [Tag],
}

impl BackupDataset {
    /// Create an empty dataset for a user.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            entries: Vec::new(),
            chat_records: Vec::new(),
            tags: Vec::new(),
            preferences: UserPreferences::default(),
            created_at: Utc::now(),
            size: 0,
            encrypted: false,
        }
    }

    /// Snapshot of this dataset ready to hand to the backup codec.
    ///
    /// Without `include_private` every private entry is dropped. The snapshot
    /// gets a fresh id and creation time, `encrypted` mirrors
    /// `include_private`, and `size` is recomputed.
    pub fn for_export(&self, include_private: bool) -> Result<Self> {
        let mut snapshot = self.clone();
        if !include_private {
            snapshot.entries.retain(|entry| !entry.is_private);
        }
        snapshot.id = Uuid::new_v4().to_string();
        snapshot.created_at = Utc::now();
        snapshot.encrypted = include_private;
        snapshot.size = snapshot.content_size()?;
        Ok(snapshot)
    }

    /// Serialized size in bytes of entries, chat records and tags.
    pub fn content_size(&self) -> Result<u64> {
        let bytes = serde_json::to_vec(&SizedContent {
            entries: &self.entries,
            chat_records: &self.chat_records,
            tags: &self.tags,
        })?;
        Ok(bytes.len() as u64)
    }

    /// Counts of what the dataset holds.
    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            entries: self.entries.len(),
            private_entries: self.entries.iter().filter(|e| e.is_private).count(),
            chat_records: self.chat_records.len(),
            messages: self.chat_records.iter().map(|c| c.messages.len()).sum(),
            tags: self.tags.len(),
        }
    }

    /// Structural checks run on every imported dataset.
    ///
    /// Returns the first problem found.
    pub fn check(&self) -> std::result::Result<(), String> {
        if self.id.is_empty() {
            return Err("dataset id is empty".to_string());
        }
        if self.user_id.is_empty() {
            return Err("dataset user id is empty".to_string());
        }

        let mut seen = HashSet::new();
        for entry in &self.entries {
            self.check_owned("entry", &entry.id, &entry.user_id)?;
            if !seen.insert(entry.id.as_str()) {
                return Err(format!("duplicate entry id {}", entry.id));
            }
        }
        for tag in &self.tags {
            self.check_owned("tag", &tag.id, &tag.user_id)?;
        }
        for chat in &self.chat_records {
            self.check_owned("chat record", &chat.id, &chat.user_id)?;
        }
        Ok(())
    }

    fn check_owned(&self, kind: &str, id: &str, user_id: &str) -> std::result::Result<(), String> {
        if id.is_empty() {
            return Err(format!("{} with empty id", kind));
        }
        if user_id != self.user_id {
            return Err(format!("{} {} belongs to another user", kind, id));
        }
        Ok(())
    }
}

/// Record counts for a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DatasetSummary {
    pub entries: usize,
    pub private_entries: usize,
    pub chat_records: usize,
    pub messages: usize,
    pub tags: usize,
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries ({} private), {} chats ({} messages), {} tags",
            self.entries, self.private_entries, self.chat_records, self.messages, self.tags
        )
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_dataset;
    use super::*;

    #[test]
    fn test_summary() {
        let summary = sample_dataset().summary();
        assert_eq!(summary.entries, 2);
        assert_eq!(summary.private_entries, 1);
        assert_eq!(summary.chat_records, 1);
        assert_eq!(summary.messages, 1);
        assert_eq!(summary.tags, 1);
        assert_eq!(
            summary.to_string(),
            "2 entries (1 private), 1 chats (1 messages), 1 tags"
        );
    }

    #[test]
    fn test_serialization_uses_camel_case() {
        let json = serde_json::to_string(&sample_dataset()).unwrap();
        assert!(json.contains("\"userId\""));
        assert!(json.contains("\"chatRecords\""));
        assert!(json.contains("\"isPrivate\":true"));
        assert!(json.contains("\"mood\":\"peaceful\""));
        assert!(json.contains("\"platform\":\"telegram\""));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let dataset = sample_dataset();
        let json = serde_json::to_vec(&dataset).unwrap();
        let restored: BackupDataset = serde_json::from_slice(&json).unwrap();
        assert_eq!(restored, dataset);
    }

    #[test]
    fn test_mobile_client_fields_survive() {
        let json = r#"{
            "id": "1700000000000",
            "userId": "user-1",
            "entries": [{
                "id": "e1",
                "userId": "user-1",
                "title": "Trip",
                "content": "Beach day",
                "mood": "happy",
                "tags": [],
                "attachments": [{
                    "id": "a1",
                    "diaryEntryId": "e1",
                    "type": "image",
                    "uri": "file:///beach.jpg",
                    "fileName": "beach.jpg",
                    "fileSize": 2048,
                    "createdAt": "2024-05-01T10:00:00Z"
                }],
                "isPrivate": true,
                "createdAt": "2024-05-01T10:00:00Z",
                "updatedAt": "2024-05-01T10:00:00Z",
                "encryptedContent": "AAAA"
            }],
            "chatRecords": [{
                "id": "c1",
                "userId": "user-1",
                "platform": "wechat",
                "contactName": "Li",
                "contactId": "wx-9",
                "messages": [],
                "importedAt": "2024-05-02T10:00:00Z",
                "dateRange": {"start": "2024-04-01T00:00:00Z", "end": "2024-04-30T00:00:00Z"}
            }],
            "tags": [],
            "createdAt": "2024-05-03T10:00:00Z",
            "size": 1234,
            "encrypted": true
        }"#;

        let dataset: BackupDataset = serde_json::from_str(json).unwrap();
        assert_eq!(dataset.size, 1234);
        assert_eq!(dataset.entries[0].attachments[0].file_size, 2048);
        assert_eq!(dataset.entries[0].encrypted_content.as_deref(), Some("AAAA"));
        assert_eq!(dataset.chat_records[0].contact_id.as_deref(), Some("wx-9"));
        assert!(dataset.chat_records[0].date_range.is_some());

        let reserialized: serde_json::Value =
            serde_json::to_value(&dataset).unwrap();
        assert_eq!(reserialized["size"], 1234);
        assert_eq!(reserialized["entries"][0]["attachments"][0]["type"], "image");
        assert_eq!(reserialized["entries"][0]["attachments"][0]["fileName"], "beach.jpg");
        assert_eq!(reserialized["entries"][0]["encryptedContent"], "AAAA");
        assert_eq!(reserialized["chatRecords"][0]["contactId"], "wx-9");
        assert_eq!(
            serde_json::from_value::<BackupDataset>(reserialized).unwrap(),
            dataset
        );
    }

    #[test]
    fn test_for_export_without_private_entries() {
        let dataset = sample_dataset();
        let snapshot = dataset.for_export(false).unwrap();

        assert_eq!(snapshot.entries.len(), 1);
        assert!(snapshot.entries.iter().all(|e| !e.is_private));
        assert!(!snapshot.encrypted);
        assert_ne!(snapshot.id, dataset.id);
        assert_eq!(snapshot.user_id, dataset.user_id);
        assert_eq!(snapshot.tags, dataset.tags);
        assert_eq!(snapshot.chat_records, dataset.chat_records);
        assert!(snapshot.size > 0);
        assert!(snapshot.size < dataset.size);
        assert_eq!(snapshot.size, snapshot.content_size().unwrap());
        assert!(snapshot.check().is_ok());
    }

    #[test]
    fn test_for_export_with_private_entries() {
        let dataset = sample_dataset();
        let snapshot = dataset.for_export(true).unwrap();

        assert_eq!(snapshot.entries, dataset.entries);
        assert!(snapshot.encrypted);
        assert_eq!(snapshot.size, dataset.size);
    }

    #[test]
    fn test_check_accepts_sample() {
        assert!(sample_dataset().check().is_ok());
        assert!(BackupDataset::new("someone").check().is_ok());
    }

    #[test]
    fn test_check_rejects_empty_ids() {
        let mut dataset = sample_dataset();
        dataset.id.clear();
        assert!(dataset.check().is_err());

        let mut dataset = sample_dataset();
        dataset.user_id.clear();
        assert!(dataset.check().is_err());

        let mut dataset = sample_dataset();
        dataset.entries[0].id.clear();
        assert!(dataset.check().is_err());
    }

    #[test]
    fn test_check_rejects_foreign_records() {
        let mut dataset = sample_dataset();
        dataset.tags[0].user_id = "user-2".to_string();
        assert!(dataset.check().unwrap_err().contains("tag"));

        let mut dataset = sample_dataset();
        dataset.chat_records[0].user_id = "user-2".to_string();
        assert!(dataset.check().unwrap_err().contains("chat record"));
    }

    #[test]
    fn test_check_rejects_duplicate_entries() {
        let mut dataset = sample_dataset();
        let copy = dataset.entries[0].clone();
        dataset.entries.push(copy);
        assert!(dataset.check().unwrap_err().contains("duplicate"));
    }
}
