//! Wire types for the upstream faction endpoint and their conversion into
//! [`MemberRecord`]s.

use std::collections::HashMap;

use serde::Deserialize;
use warboard_core::target::MemberRecord;

/// Error envelope upstream returns instead of the requested data.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub error: String,
}

/// Response of `GET /faction/{id}?selections=basic`.
///
/// Only the fields the tracker needs are modelled; everything else is
/// ignored.
#[derive(Debug, Deserialize)]
pub struct FactionBasic {
    #[serde(rename = "ID", default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tag: String,
    /// Members keyed by their player id rendered as a string.
    #[serde(default)]
    pub members: HashMap<String, MemberPayload>,
}

#[derive(Debug, Deserialize)]
pub struct MemberPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: i32,
    #[serde(default)]
    pub status: StatusPayload,
    #[serde(default)]
    pub last_action: LastActionPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub until: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LastActionPayload {
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub relative: Option<String>,
}

impl FactionBasic {
    /// Convert the member map into records, skipping keys that are not ids.
    ///
    /// Records are returned in ascending id order so repeated polls of an
    /// unchanged roster produce identical input.
    pub fn into_members(self) -> Vec<MemberRecord> {
        let faction_id = self.id;
        let mut records: Vec<MemberRecord> = self
            .members
            .into_iter()
            .filter_map(|(key, member)| match key.parse::<i64>() {
                Ok(user_id) => Some(member.into_record(user_id)),
                Err(_) => {
                    tracing::warn!(faction_id, key = %key, "Skipping member with non-numeric id");
                    None
                }
            })
            .collect();
        records.sort_by_key(|r| r.user_id);
        records
    }
}

impl MemberPayload {
    fn into_record(self, user_id: i64) -> MemberRecord {
        MemberRecord {
            user_id,
            name: if self.name.is_empty() {
                "Unknown".to_string()
            } else {
                self.name
            },
            level: self.level,
            state: self.status.state,
            description: self.status.description,
            until: self.status.until.unwrap_or(0),
            last_action_ts: self.last_action.timestamp.filter(|ts| *ts > 0),
            last_action_relative: self
                .last_action
                .relative
                .unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
