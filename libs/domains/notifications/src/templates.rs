//! Notification template builders.
//!
//! Pure, deterministic functions mapping domain entity snapshots to
//! notification payloads, one per domain event. Recipient ids are passed
//! explicitly where the source entity's linked user is optional; callers
//! resolve that before building.

use chrono::NaiveDate;
use serde_json::json;

use crate::models::{
    DepartmentInfo, EmployeeInfo, EventInfo, NotificationKind, NotificationPayload, PollInfo,
    PostInfo, ProjectInfo, PtoRequestInfo, UserInfo,
};

/// Maximum length of free-text excerpts embedded in notification content.
const EXCERPT_LEN: usize = 50;

/// Truncate free text to the first 50 characters with a trailing ellipsis
/// when longer.
fn excerpt(text: &str) -> String {
    if text.chars().count() > EXCERPT_LEN {
        let head: String = text.chars().take(EXCERPT_LEN).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Plain 50-character prefix (no ellipsis), used for embedded titles.
fn prefix(text: &str) -> String {
    text.chars().take(EXCERPT_LEN).collect()
}

/// Builders for every notification-worthy domain event.
pub struct NotificationTemplates;

impl NotificationTemplates {
    pub fn post_liked(sender: &UserInfo, post: &PostInfo) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::PostLiked,
            recipient_id: post.author_id,
            sender_id: Some(sender.id),
            title: "New Like on Your Post".to_string(),
            content: format!("{} liked your post", sender.username),
            data: json!({
                "post_id": post.id,
                "post_title": prefix(&post.content),
            }),
        }
    }

    pub fn post_commented(
        sender: &UserInfo,
        post: &PostInfo,
        comment_content: &str,
    ) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::PostCommented,
            recipient_id: post.author_id,
            sender_id: Some(sender.id),
            title: "New Comment on Your Post".to_string(),
            content: format!(
                "{} commented on your post: \"{}\"",
                sender.username,
                excerpt(comment_content)
            ),
            data: json!({
                "post_id": post.id,
                "post_title": prefix(&post.content),
                "comment_content": comment_content,
            }),
        }
    }

    pub fn comment_replied(
        sender: &UserInfo,
        parent_comment_author_id: i64,
        comment_content: &str,
        post_id: i64,
    ) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::CommentReplied,
            recipient_id: parent_comment_author_id,
            sender_id: Some(sender.id),
            title: "New Reply to Your Comment".to_string(),
            content: format!(
                "{} replied to your comment: \"{}\"",
                sender.username,
                excerpt(comment_content)
            ),
            data: json!({
                "post_id": post_id,
                "comment_content": comment_content,
            }),
        }
    }

    pub fn comment_liked(
        sender: &UserInfo,
        comment_author_id: i64,
        comment_content: &str,
        post_id: i64,
    ) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::CommentLiked,
            recipient_id: comment_author_id,
            sender_id: Some(sender.id),
            title: "New Like on Your Comment".to_string(),
            content: format!(
                "{} liked your comment: \"{}\"",
                sender.username,
                excerpt(comment_content)
            ),
            data: json!({
                "post_id": post_id,
                "comment_content": comment_content,
            }),
        }
    }

    pub fn event_created(event: &EventInfo, recipient_id: i64) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::EventCreated,
            recipient_id,
            sender_id: Some(event.organizer_user_id),
            title: "New Event Created".to_string(),
            content: format!("A new event \"{}\" has been created", event.title),
            data: json!({
                "event_id": event.id,
                "event_title": event.title,
                "event_date": event.start_time,
                "location": event.location,
            }),
        }
    }

    pub fn event_invitation(event: &EventInfo, recipient_id: i64) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::EventInvitation,
            recipient_id,
            sender_id: Some(event.organizer_user_id),
            title: "Event Invitation".to_string(),
            content: format!("You have been invited to the event \"{}\"", event.title),
            data: json!({
                "event_id": event.id,
                "event_title": event.title,
                "event_date": event.start_time,
                "location": event.location,
            }),
        }
    }

    pub fn event_reminder(event: &EventInfo, recipient_id: i64) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::EventReminder,
            recipient_id,
            sender_id: Some(event.organizer_user_id),
            title: "Event Reminder".to_string(),
            content: format!("Reminder: {} is coming up soon!", event.title),
            data: json!({
                "event_id": event.id,
                "event_title": event.title,
                "event_date": event.start_time,
                "end_time": event.end_time,
                "location": event.location,
            }),
        }
    }

    pub fn pto_request_created(
        request: &PtoRequestInfo,
        recipient_id: i64,
    ) -> NotificationPayload {
        let requester = request
            .employee
            .user
            .as_ref()
            .map(|u| u.username.clone())
            .unwrap_or_else(|| request.employee.full_name());

        NotificationPayload {
            kind: NotificationKind::PtoCreated,
            recipient_id,
            sender_id: request.employee.user.as_ref().map(|u| u.id),
            title: "New PTO Request".to_string(),
            content: format!("{} has submitted a PTO request", requester),
            data: json!({
                "request_id": request.id,
                "employee_id": request.employee.id,
                "employee_name": requester,
                "start_date": request.start_date,
                "end_date": request.end_date,
                "type": request.request_type,
                "reason": request.reason,
            }),
        }
    }

    pub fn pto_request_status(
        request: &PtoRequestInfo,
        updated_by: &UserInfo,
        recipient_id: i64,
    ) -> NotificationPayload {
        // "approved" -> "Approved"
        let status_text = {
            let mut chars = request.status.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        };

        NotificationPayload {
            kind: NotificationKind::PtoRequestStatus,
            recipient_id,
            sender_id: Some(updated_by.id),
            title: "PTO Request Status Update".to_string(),
            content: format!("Your PTO request has been {}", status_text),
            data: json!({
                "request_id": request.id,
                "status": request.status,
                "start_date": request.start_date,
                "end_date": request.end_date,
            }),
        }
    }

    pub fn employee_recognition(
        sender: &UserInfo,
        recipient_id: i64,
        message: &str,
    ) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::EmployeeRecognition,
            recipient_id,
            sender_id: Some(sender.id),
            title: "Employee Recognition".to_string(),
            content: format!(
                "{} recognized your work: \"{}\"",
                sender.username,
                excerpt(message)
            ),
            data: json!({ "message": message }),
        }
    }

    pub fn employee_birthday(
        employee: &EmployeeInfo,
        birthday: NaiveDate,
        recipient_id: i64,
    ) -> NotificationPayload {
        let name = employee
            .user
            .as_ref()
            .map(|u| u.username.clone())
            .unwrap_or_else(|| employee.full_name());

        NotificationPayload {
            kind: NotificationKind::EmployeeBirthday,
            recipient_id,
            sender_id: employee.user.as_ref().map(|u| u.id),
            title: "Employee Birthday".to_string(),
            content: format!("{} has a birthday today", name),
            data: json!({
                "employee_id": employee.id,
                "employee_name": name,
                "birthday": birthday,
            }),
        }
    }

    pub fn poll_created(
        sender: &UserInfo,
        recipient_id: i64,
        poll: &PollInfo,
    ) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::PollCreated,
            recipient_id,
            sender_id: Some(sender.id),
            title: "New Poll Created".to_string(),
            content: format!("A new poll \"{}\" has been created", poll.description),
            data: json!({
                "poll_id": poll.id,
                "poll_title": poll.description,
            }),
        }
    }

    pub fn department_created(
        department: &DepartmentInfo,
        manager: &EmployeeInfo,
        recipient_id: i64,
    ) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::DepartmentCreated,
            recipient_id,
            sender_id: None,
            title: "Department Manager Assignment".to_string(),
            content: format!(
                "You have been assigned as manager of the new department \"{}\"",
                department.name
            ),
            data: json!({
                "department_id": department.id,
                "department_name": department.name,
                "manager_id": manager.id,
                "manager_name": manager.full_name(),
            }),
        }
    }

    pub fn department_assignment(
        employee: &EmployeeInfo,
        department: &DepartmentInfo,
        assigned_by: &UserInfo,
        recipient_id: i64,
    ) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::DepartmentAssignment,
            recipient_id,
            sender_id: Some(assigned_by.id),
            title: "Department Assignment".to_string(),
            content: format!("You have been assigned to department \"{}\"", department.name),
            data: json!({
                "department_id": department.id,
                "department_name": department.name,
                "employee_id": employee.id,
                "employee_name": employee.full_name(),
            }),
        }
    }

    pub fn department_removal(
        employee: &EmployeeInfo,
        department: &DepartmentInfo,
        removed_by: &UserInfo,
        recipient_id: i64,
    ) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::DepartmentRemoval,
            recipient_id,
            sender_id: Some(removed_by.id),
            title: "Department Removal".to_string(),
            content: format!("You have been removed from department \"{}\"", department.name),
            data: json!({
                "department_id": department.id,
                "department_name": department.name,
                "employee_id": employee.id,
                "employee_name": employee.full_name(),
            }),
        }
    }

    pub fn department_transfer(
        employee: &EmployeeInfo,
        from_department: &DepartmentInfo,
        to_department: &DepartmentInfo,
        transferred_by: &UserInfo,
        recipient_id: i64,
    ) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::DepartmentTransfer,
            recipient_id,
            sender_id: Some(transferred_by.id),
            title: "Department Transfer".to_string(),
            content: format!(
                "You have been transferred from department \"{}\" to \"{}\"",
                from_department.name, to_department.name
            ),
            data: json!({
                "from_department_id": from_department.id,
                "from_department_name": from_department.name,
                "to_department_id": to_department.id,
                "to_department_name": to_department.name,
                "employee_id": employee.id,
                "employee_name": employee.full_name(),
            }),
        }
    }

    pub fn project_assignment(
        employee: &EmployeeInfo,
        project: &ProjectInfo,
        assigned_by: &UserInfo,
        recipient_id: i64,
    ) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::ProjectAssignment,
            recipient_id,
            sender_id: Some(assigned_by.id),
            title: "Project Assignment".to_string(),
            content: format!("You have been assigned to project \"{}\"", project.name),
            data: json!({
                "project_id": project.id,
                "project_name": project.name,
                "role": project.role,
                "start_date": project.start_date,
                "end_date": project.end_date,
                "employee_id": employee.id,
            }),
        }
    }
}
