//! Queue and job-kind definitions for the notification engine.
//!
//! Two fixed queues exist: `notifications` (in-app/email fan-out of
//! domain events) and `emails` (digest and summary emails). Each job kind
//! carries either entity ids (the handler re-queries fresh state) or a
//! denormalized snapshot; the choice is per kind. See the payload
//! structs.

use chrono::NaiveDate;
use queue_worker::{BackoffPolicy, JobDefaults};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::models::{
    DepartmentInfo, EmployeeInfo, EventInfo, PollInfo, PostInfo, ProjectInfo, PtoRequestInfo,
    UserInfo,
};

/// The fixed queue set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum QueueName {
    Notifications,
    Emails,
}

impl QueueName {
    /// Default job options for this queue: 3 attempts, exponential
    /// backoff from a 1s base.
    pub fn defaults(&self) -> JobDefaults {
        JobDefaults {
            attempts: 3,
            backoff: BackoffPolicy::Exponential { delay_ms: 1000 },
        }
    }
}

/// Job kind discriminators, in their wire form (e.g. `post:liked`).
/// Always carried as the strum string, never serde-serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, AsRefStr, EnumString, EnumIter)]
pub enum JobKind {
    // Event notifications
    #[strum(serialize = "event:created")]
    EventCreated,
    #[strum(serialize = "event:invitation")]
    EventInvitation,
    #[strum(serialize = "event:reminder")]
    EventReminder,

    // Feed notifications
    #[strum(serialize = "post:liked")]
    PostLiked,
    #[strum(serialize = "post:commented")]
    PostCommented,
    #[strum(serialize = "comment:replied")]
    CommentReplied,
    #[strum(serialize = "comment:liked")]
    CommentLiked,

    // PTO notifications
    #[strum(serialize = "pto:created")]
    PtoCreated,
    #[strum(serialize = "pto:request:status")]
    PtoRequestStatus,

    // Project notifications
    #[strum(serialize = "project:assignment")]
    ProjectAssignment,

    // Employee notifications
    #[strum(serialize = "employee:recognition")]
    EmployeeRecognition,
    #[strum(serialize = "employee:birthday")]
    EmployeeBirthday,

    // Poll notifications
    #[strum(serialize = "poll:created")]
    PollCreated,

    // Department notifications
    #[strum(serialize = "department:assignment")]
    DepartmentAssignment,
    #[strum(serialize = "department:removal")]
    DepartmentRemoval,
    #[strum(serialize = "department:transfer")]
    DepartmentTransfer,
    #[strum(serialize = "department:created")]
    DepartmentCreated,

    // Email jobs
    #[strum(serialize = "email:event:summary")]
    EmailEventSummary,
    #[strum(serialize = "email:weekly:digest")]
    EmailWeeklyDigest,
}

// ============================================================================
// Typed job payloads
// ============================================================================

/// Id-only payload: the handler re-queries the event and the employee
/// list at processing time, trading query cost for freshness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCreatedJob {
    pub event_id: i64,
    pub organizer_id: i64,
}

/// Snapshot payload: the invitation fan-out is per employee and the
/// enqueuing service already holds both entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventInvitationJob {
    pub event: EventInfo,
    pub employee: EmployeeInfo,
}

/// Snapshot payload: the reminder scheduler resolves participants once
/// and fans out from the captured list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventReminderJob {
    pub event: EventInfo,
    pub participants: Vec<EmployeeInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostLikedJob {
    pub sender: UserInfo,
    pub post: PostInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostCommentedJob {
    pub sender: UserInfo,
    pub post: PostInfo,
    pub comment_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRepliedJob {
    pub sender: UserInfo,
    pub parent_comment_author_id: i64,
    pub comment_content: String,
    pub post_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentLikedJob {
    pub sender: UserInfo,
    pub comment_author_id: i64,
    pub comment_content: String,
    pub post_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtoCreatedJob {
    pub request: PtoRequestInfo,
    /// The reviewer (HR/manager) to notify.
    pub recipient_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtoStatusJob {
    pub request: PtoRequestInfo,
    pub updated_by: UserInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectAssignmentJob {
    pub employee: EmployeeInfo,
    pub project: ProjectInfo,
    pub assigned_by: UserInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeRecognitionJob {
    pub sender: UserInfo,
    pub recipient_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeBirthdayJob {
    pub employee: EmployeeInfo,
    pub birthday: NaiveDate,
    /// The colleague being told about the birthday.
    pub recipient_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollCreatedJob {
    pub poll: PollInfo,
    pub sender: UserInfo,
    pub target_user_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentAssignmentJob {
    pub employee: EmployeeInfo,
    pub department: DepartmentInfo,
    pub assigned_by: UserInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentRemovalJob {
    pub employee: EmployeeInfo,
    pub department: DepartmentInfo,
    pub removed_by: UserInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentTransferJob {
    pub employee: EmployeeInfo,
    pub from_department: DepartmentInfo,
    pub to_department: DepartmentInfo,
    pub transferred_by: UserInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentCreatedJob {
    pub department: DepartmentInfo,
    pub manager: EmployeeInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummaryEmailJob {
    pub event: EventInfo,
    pub organizer: EmployeeInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyDigestEmailJob {
    pub employee: EmployeeInfo,
    pub events: Vec<EventInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_names() {
        assert_eq!(QueueName::Notifications.as_ref(), "notifications");
        assert_eq!(QueueName::Emails.to_string(), "emails");
    }

    #[test]
    fn test_queue_defaults() {
        let defaults = QueueName::Notifications.defaults();
        assert_eq!(defaults.attempts, 3);
        assert_eq!(
            defaults.backoff,
            BackoffPolicy::Exponential { delay_ms: 1000 }
        );
    }

    #[test]
    fn test_job_kind_wire_form() {
        assert_eq!(JobKind::PostLiked.as_ref(), "post:liked");
        assert_eq!(JobKind::PtoRequestStatus.to_string(), "pto:request:status");
        assert_eq!(JobKind::EmailWeeklyDigest.as_ref(), "email:weekly:digest");

        let kind: JobKind = "event:reminder".parse().unwrap();
        assert_eq!(kind, JobKind::EventReminder);
    }

    #[test]
    fn test_snapshot_payload_roundtrip() {
        let job = PostLikedJob {
            sender: UserInfo {
                id: 2,
                username: "ama".to_string(),
            },
            post: PostInfo {
                id: 10,
                author_id: 1,
                content: "hello".to_string(),
            },
        };

        let value = serde_json::to_value(&job).unwrap();
        let decoded: PostLikedJob = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.post.id, 10);
        assert_eq!(decoded.sender.username, "ama");
    }
}
