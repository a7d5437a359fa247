//! Domain models for notifications and preferences.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

/// Kinds of notifications surfaced to portal users.
///
/// The wire/database form is the snake_case string (e.g. `post_liked`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PostLiked,
    PostCommented,
    CommentReplied,
    CommentLiked,
    EventCreated,
    EventInvitation,
    EventReminder,
    PtoCreated,
    PtoRequestStatus,
    ProjectAssignment,
    EmployeeRecognition,
    PollCreated,
    DepartmentAssignment,
    DepartmentRemoval,
    DepartmentTransfer,
    DepartmentCreated,
    EmployeeBirthday,
}

/// Which channel(s) a preference routes delivery to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    InApp,
    Email,
    Both,
}

impl NotificationChannel {
    /// True when the realtime adapter should be invoked.
    pub fn includes_in_app(&self) -> bool {
        matches!(self, NotificationChannel::InApp | NotificationChannel::Both)
    }

    /// True when the email adapter should be invoked.
    pub fn includes_email(&self) -> bool {
        matches!(self, NotificationChannel::Email | NotificationChannel::Both)
    }
}

/// A persisted notification record.
///
/// Created once per dispatch event; only the `read` flag is ever mutated
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: i64,
    pub sender_id: Option<i64>,
    pub kind: NotificationKind,
    pub title: String,
    pub content: String,
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a notification, produced by the template builders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub kind: NotificationKind,
    pub recipient_id: i64,
    pub sender_id: Option<i64>,
    pub title: String,
    pub content: String,
    pub data: serde_json::Value,
}

/// Per-(user, kind) delivery control.
///
/// At most one row per `(user_id, kind)`. Absence of a row is treated as
/// disabled for dispatch purposes; provisioning is expected to seed a row
/// per kind for every user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPreference {
    pub user_id: i64,
    pub kind: NotificationKind,
    pub channel: NotificationChannel,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl NotificationPreference {
    /// The default row seeded at provisioning time: both channels, enabled.
    pub fn default_for(user_id: i64, kind: NotificationKind) -> Self {
        Self {
            user_id,
            kind,
            channel: NotificationChannel::Both,
            enabled: true,
            updated_at: Utc::now(),
        }
    }
}

/// Upsert input for a preference row, keyed by `(user_id, kind)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceUpdate {
    pub user_id: i64,
    pub kind: NotificationKind,
    pub channel: NotificationChannel,
    pub enabled: bool,
}

// ============================================================================
// Entity snapshots carried in job payloads
//
// Some job kinds carry only an entity id (the handler re-queries fresh
// state); others carry these denormalized snapshots to avoid redundant
// queries. The choice is per job kind and deliberate.
// ============================================================================

/// Portal user reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
}

/// Employee snapshot with the linked portal user, when one exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeInfo {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub user: Option<UserInfo>,
    pub birthday: Option<NaiveDate>,
}

impl EmployeeInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Feed post snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostInfo {
    pub id: i64,
    pub author_id: i64,
    pub content: String,
}

/// Event snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    pub id: i64,
    pub title: String,
    pub organizer_user_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// PTO request snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtoRequestInfo {
    pub id: i64,
    pub employee: EmployeeInfo,
    pub status: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub request_type: Option<String>,
    pub reason: Option<String>,
}

/// Poll snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollInfo {
    pub id: i64,
    pub description: String,
}

/// Department snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentInfo {
    pub id: i64,
    pub name: String,
}

/// Project assignment snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: i64,
    pub name: String,
    pub role: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_kind_wire_form() {
        assert_eq!(NotificationKind::PostLiked.to_string(), "post_liked");
        assert_eq!(NotificationKind::PtoCreated.as_ref(), "pto_created");
        assert_eq!(
            NotificationKind::PtoRequestStatus.to_string(),
            "pto_request_status"
        );

        let kind: NotificationKind = "department_transfer".parse().unwrap();
        assert_eq!(kind, NotificationKind::DepartmentTransfer);
    }

    #[test]
    fn test_kind_covers_all_known_types() {
        assert_eq!(NotificationKind::iter().count(), 17);
    }

    #[test]
    fn test_channel_membership() {
        assert!(NotificationChannel::InApp.includes_in_app());
        assert!(!NotificationChannel::InApp.includes_email());

        assert!(!NotificationChannel::Email.includes_in_app());
        assert!(NotificationChannel::Email.includes_email());

        assert!(NotificationChannel::Both.includes_in_app());
        assert!(NotificationChannel::Both.includes_email());
    }

    #[test]
    fn test_channel_wire_form() {
        assert_eq!(NotificationChannel::InApp.to_string(), "in_app");
        let channel: NotificationChannel = "both".parse().unwrap();
        assert_eq!(channel, NotificationChannel::Both);
    }

    #[test]
    fn test_default_preference() {
        let pref = NotificationPreference::default_for(7, NotificationKind::PollCreated);
        assert_eq!(pref.channel, NotificationChannel::Both);
        assert!(pref.enabled);
    }

    #[test]
    fn test_employee_full_name() {
        let employee = EmployeeInfo {
            id: 1,
            first_name: "Ama".to_string(),
            last_name: "Mensah".to_string(),
            user: None,
            birthday: None,
        };
        assert_eq!(employee.full_name(), "Ama Mensah");
    }
}
