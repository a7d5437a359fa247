//! Per-kind job handlers and the registries that bind them to queues.
//!
//! The `notifications` queue fans domain events out into persisted,
//! preference-gated notifications; the `emails` queue renders and sends
//! digest/summary emails. Handlers are registered at startup; a kind
//! without a handler fails fast in the engine.
//!
//! Handlers run under at-least-once delivery: every one of them is safe
//! to re-run (re-creating a notification is benign duplication, not
//! corruption).

use queue_worker::{HandlerRegistry, Job, QueueError};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::directory::{EmployeeDirectory, RecipientDirectory};
use crate::error::NotificationResult;
use crate::jobs::*;
use crate::mailer::EmailTemplates;
use crate::models::EmployeeInfo;
use crate::providers::{EmailMessage, EmailProvider};
use crate::service::NotificationService;
use crate::templates::NotificationTemplates;

/// Handlers for the `notifications` queue.
pub struct NotificationJobs {
    service: NotificationService,
    directory: Arc<dyn EmployeeDirectory>,
}

impl NotificationJobs {
    pub fn new(service: NotificationService, directory: Arc<dyn EmployeeDirectory>) -> Self {
        Self { service, directory }
    }

    /// Create one notification, logging instead of failing the whole
    /// fan-out when a single recipient errors.
    async fn notify_or_log(&self, payload: crate::models::NotificationPayload) {
        let recipient_id = payload.recipient_id;
        if let Err(e) = self.service.create_notification(payload).await {
            warn!(
                recipient_id,
                error = %e,
                "Failed to create notification for recipient, continuing fan-out"
            );
        }
    }

    /// Id-only payload: re-queries the event and the current employee
    /// list, then notifies everyone except the organizer.
    pub async fn event_created(&self, job: EventCreatedJob) -> NotificationResult<()> {
        let Some(event) = self.directory.event_by_id(job.event_id).await? else {
            warn!(event_id = job.event_id, "Event not found for notification");
            return Ok(());
        };

        let employees = self.directory.employees_except(job.organizer_id).await?;

        for employee in &employees {
            if let Some(user) = &employee.user {
                self.notify_or_log(NotificationTemplates::event_created(&event, user.id))
                    .await;
            }
        }

        info!(event_id = job.event_id, "Processed event created notifications");
        Ok(())
    }

    pub async fn event_invitation(&self, job: EventInvitationJob) -> NotificationResult<()> {
        if let Some(user) = &job.employee.user {
            self.service
                .create_notification(NotificationTemplates::event_invitation(&job.event, user.id))
                .await?;
            info!(
                event_id = job.event.id,
                employee_id = job.employee.id,
                "Sent event invitation notification"
            );
        }
        Ok(())
    }

    /// Snapshot payload: the participant list was captured at enqueue
    /// time by the reminder scheduler.
    pub async fn event_reminder(&self, job: EventReminderJob) -> NotificationResult<()> {
        for participant in &job.participants {
            if let Some(user) = &participant.user {
                self.notify_or_log(NotificationTemplates::event_reminder(&job.event, user.id))
                    .await;
            }
        }

        info!(event_id = job.event.id, "Processed event reminder notifications");
        Ok(())
    }

    pub async fn post_liked(&self, job: PostLikedJob) -> NotificationResult<()> {
        self.service
            .create_notification(NotificationTemplates::post_liked(&job.sender, &job.post))
            .await?;
        Ok(())
    }

    pub async fn post_commented(&self, job: PostCommentedJob) -> NotificationResult<()> {
        self.service
            .create_notification(NotificationTemplates::post_commented(
                &job.sender,
                &job.post,
                &job.comment_content,
            ))
            .await?;
        Ok(())
    }

    pub async fn comment_replied(&self, job: CommentRepliedJob) -> NotificationResult<()> {
        self.service
            .create_notification(NotificationTemplates::comment_replied(
                &job.sender,
                job.parent_comment_author_id,
                &job.comment_content,
                job.post_id,
            ))
            .await?;
        Ok(())
    }

    pub async fn comment_liked(&self, job: CommentLikedJob) -> NotificationResult<()> {
        self.service
            .create_notification(NotificationTemplates::comment_liked(
                &job.sender,
                job.comment_author_id,
                &job.comment_content,
                job.post_id,
            ))
            .await?;
        Ok(())
    }

    pub async fn pto_created(&self, job: PtoCreatedJob) -> NotificationResult<()> {
        self.service
            .create_notification(NotificationTemplates::pto_request_created(
                &job.request,
                job.recipient_id,
            ))
            .await?;
        Ok(())
    }

    pub async fn pto_status(&self, job: PtoStatusJob) -> NotificationResult<()> {
        let Some(user) = &job.request.employee.user else {
            debug!(
                request_id = job.request.id,
                "PTO requester has no portal user, skipping status notification"
            );
            return Ok(());
        };

        self.service
            .create_notification(NotificationTemplates::pto_request_status(
                &job.request,
                &job.updated_by,
                user.id,
            ))
            .await?;
        Ok(())
    }

    pub async fn project_assignment(&self, job: ProjectAssignmentJob) -> NotificationResult<()> {
        let Some(user) = &job.employee.user else {
            return Ok(());
        };

        self.service
            .create_notification(NotificationTemplates::project_assignment(
                &job.employee,
                &job.project,
                &job.assigned_by,
                user.id,
            ))
            .await?;
        Ok(())
    }

    pub async fn employee_recognition(
        &self,
        job: EmployeeRecognitionJob,
    ) -> NotificationResult<()> {
        self.service
            .create_notification(NotificationTemplates::employee_recognition(
                &job.sender,
                job.recipient_id,
                &job.message,
            ))
            .await?;
        Ok(())
    }

    pub async fn employee_birthday(&self, job: EmployeeBirthdayJob) -> NotificationResult<()> {
        self.service
            .create_notification(NotificationTemplates::employee_birthday(
                &job.employee,
                job.birthday,
                job.recipient_id,
            ))
            .await?;
        Ok(())
    }

    pub async fn poll_created(&self, job: PollCreatedJob) -> NotificationResult<()> {
        for target_user_id in &job.target_user_ids {
            self.notify_or_log(NotificationTemplates::poll_created(
                &job.sender,
                *target_user_id,
                &job.poll,
            ))
            .await;
        }

        info!(poll_id = job.poll.id, "Processed poll created notifications");
        Ok(())
    }

    pub async fn department_assignment(
        &self,
        job: DepartmentAssignmentJob,
    ) -> NotificationResult<()> {
        let Some(user) = &job.employee.user else {
            return Ok(());
        };

        self.service
            .create_notification(NotificationTemplates::department_assignment(
                &job.employee,
                &job.department,
                &job.assigned_by,
                user.id,
            ))
            .await?;
        Ok(())
    }

    pub async fn department_removal(&self, job: DepartmentRemovalJob) -> NotificationResult<()> {
        let Some(user) = &job.employee.user else {
            return Ok(());
        };

        self.service
            .create_notification(NotificationTemplates::department_removal(
                &job.employee,
                &job.department,
                &job.removed_by,
                user.id,
            ))
            .await?;
        Ok(())
    }

    pub async fn department_transfer(&self, job: DepartmentTransferJob) -> NotificationResult<()> {
        let Some(user) = &job.employee.user else {
            return Ok(());
        };

        self.service
            .create_notification(NotificationTemplates::department_transfer(
                &job.employee,
                &job.from_department,
                &job.to_department,
                &job.transferred_by,
                user.id,
            ))
            .await?;
        Ok(())
    }

    pub async fn department_created(&self, job: DepartmentCreatedJob) -> NotificationResult<()> {
        let Some(user) = &job.manager.user else {
            return Ok(());
        };

        self.service
            .create_notification(NotificationTemplates::department_created(
                &job.department,
                &job.manager,
                user.id,
            ))
            .await?;
        Ok(())
    }
}

/// Decode a typed payload and run a `NotificationJobs` method.
macro_rules! route {
    ($registry:expr, $jobs:expr, $kind:expr, $payload:ty, $method:ident) => {{
        let jobs = Arc::clone(&$jobs);
        $registry.register_fn($kind.as_ref(), move |job: Job| {
            let jobs = Arc::clone(&jobs);
            async move {
                let payload: $payload = job.payload_as()?;
                jobs.$method(payload).await.map_err(QueueError::from)
            }
        });
    }};
}

/// Build the handler registry for the `notifications` queue.
pub fn notification_handlers(jobs: Arc<NotificationJobs>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    route!(registry, jobs, JobKind::EventCreated, EventCreatedJob, event_created);
    route!(registry, jobs, JobKind::EventInvitation, EventInvitationJob, event_invitation);
    route!(registry, jobs, JobKind::EventReminder, EventReminderJob, event_reminder);
    route!(registry, jobs, JobKind::PostLiked, PostLikedJob, post_liked);
    route!(registry, jobs, JobKind::PostCommented, PostCommentedJob, post_commented);
    route!(registry, jobs, JobKind::CommentReplied, CommentRepliedJob, comment_replied);
    route!(registry, jobs, JobKind::CommentLiked, CommentLikedJob, comment_liked);
    route!(registry, jobs, JobKind::PtoCreated, PtoCreatedJob, pto_created);
    route!(registry, jobs, JobKind::PtoRequestStatus, PtoStatusJob, pto_status);
    route!(registry, jobs, JobKind::ProjectAssignment, ProjectAssignmentJob, project_assignment);
    route!(registry, jobs, JobKind::EmployeeRecognition, EmployeeRecognitionJob, employee_recognition);
    route!(registry, jobs, JobKind::EmployeeBirthday, EmployeeBirthdayJob, employee_birthday);
    route!(registry, jobs, JobKind::PollCreated, PollCreatedJob, poll_created);
    route!(registry, jobs, JobKind::DepartmentAssignment, DepartmentAssignmentJob, department_assignment);
    route!(registry, jobs, JobKind::DepartmentRemoval, DepartmentRemovalJob, department_removal);
    route!(registry, jobs, JobKind::DepartmentTransfer, DepartmentTransferJob, department_transfer);
    route!(registry, jobs, JobKind::DepartmentCreated, DepartmentCreatedJob, department_created);

    registry
}

/// Handlers for the `emails` queue.
pub struct EmailJobs {
    provider: Arc<dyn EmailProvider>,
    directory: Arc<dyn RecipientDirectory>,
    templates: Arc<EmailTemplates>,
}

impl EmailJobs {
    pub fn new(
        provider: Arc<dyn EmailProvider>,
        directory: Arc<dyn RecipientDirectory>,
        templates: Arc<EmailTemplates>,
    ) -> Self {
        Self {
            provider,
            directory,
            templates,
        }
    }

    async fn address_for(&self, employee: &EmployeeInfo) -> NotificationResult<Option<String>> {
        let Some(user) = &employee.user else {
            return Ok(None);
        };
        self.directory.email_for_user(user.id).await
    }

    /// Post-event summary email for the organizer.
    pub async fn event_summary(&self, job: EventSummaryEmailJob) -> NotificationResult<()> {
        let Some(address) = self.address_for(&job.organizer).await? else {
            debug!(
                event_id = job.event.id,
                "Organizer has no email address, skipping event summary"
            );
            return Ok(());
        };

        let rendered = self
            .templates
            .render_event_summary(&job.event, &job.organizer.full_name())?;

        self.provider
            .send(&EmailMessage {
                to_email: address,
                to_name: job.organizer.full_name(),
                subject: rendered.subject,
                html_body: rendered.html,
                text_body: rendered.text,
            })
            .await?;

        info!(event_id = job.event.id, "Sent event summary email");
        Ok(())
    }

    /// Weekly digest of upcoming events for one employee.
    pub async fn weekly_digest(&self, job: WeeklyDigestEmailJob) -> NotificationResult<()> {
        let Some(address) = self.address_for(&job.employee).await? else {
            debug!(
                employee_id = job.employee.id,
                "Employee has no email address, skipping weekly digest"
            );
            return Ok(());
        };

        let rendered = self
            .templates
            .render_weekly_digest(&job.employee.full_name(), &job.events)?;

        self.provider
            .send(&EmailMessage {
                to_email: address,
                to_name: job.employee.full_name(),
                subject: rendered.subject,
                html_body: rendered.html,
                text_body: rendered.text,
            })
            .await?;

        info!(
            employee_id = job.employee.id,
            events = job.events.len(),
            "Sent weekly digest email"
        );
        Ok(())
    }
}

/// Build the handler registry for the `emails` queue.
pub fn email_handlers(jobs: Arc<EmailJobs>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    {
        let jobs = Arc::clone(&jobs);
        registry.register_fn(JobKind::EmailEventSummary.as_ref(), move |job: Job| {
            let jobs = Arc::clone(&jobs);
            async move {
                let payload: EventSummaryEmailJob = job.payload_as()?;
                jobs.event_summary(payload).await.map_err(QueueError::from)
            }
        });
    }

    {
        let jobs = Arc::clone(&jobs);
        registry.register_fn(JobKind::EmailWeeklyDigest.as_ref(), move |job: Job| {
            let jobs = Arc::clone(&jobs);
            async move {
                let payload: WeeklyDigestEmailJob = job.payload_as()?;
                jobs.weekly_digest(payload).await.map_err(QueueError::from)
            }
        });
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::MockDeliveryChannel;
    use crate::directory::{InMemoryEmployeeDirectory, InMemoryRecipientDirectory};
    use crate::models::{EventInfo, PostInfo, UserInfo};
    use crate::preferences::NotificationPreferenceService;
    use crate::providers::{MockEmailProvider, SentEmail};
    use crate::repository::{
        InMemoryNotificationRepository, InMemoryPreferenceRepository, NotificationRepository,
    };
    use chrono::Utc;
    use queue_worker::{JobDefaults, JobOptions};
    use serde_json::json;

    fn employee(id: i64, user_id: Option<i64>) -> EmployeeInfo {
        EmployeeInfo {
            id,
            first_name: format!("emp{}", id),
            last_name: "test".to_string(),
            user: user_id.map(|id| UserInfo {
                id,
                username: format!("user{}", id),
            }),
            birthday: None,
        }
    }

    fn event(id: i64) -> EventInfo {
        EventInfo {
            id,
            title: "All-Hands".to_string(),
            organizer_user_id: 100,
            start_time: Utc::now(),
            end_time: None,
            location: None,
            description: None,
        }
    }

    struct Fixture {
        jobs: Arc<NotificationJobs>,
        repository: Arc<InMemoryNotificationRepository>,
        directory: Arc<InMemoryEmployeeDirectory>,
    }

    /// No preference rows are seeded, so no channel is ever invoked; the
    /// mocks would panic on an unexpected call.
    fn fixture() -> Fixture {
        let repository = Arc::new(InMemoryNotificationRepository::new());
        let directory = Arc::new(InMemoryEmployeeDirectory::new());

        let service = NotificationService::new(
            repository.clone(),
            NotificationPreferenceService::new(Arc::new(InMemoryPreferenceRepository::new())),
            Arc::new(MockDeliveryChannel::new()),
            Arc::new(MockDeliveryChannel::new()),
        );

        Fixture {
            jobs: Arc::new(NotificationJobs::new(service, directory.clone())),
            repository,
            directory,
        }
    }

    fn make_job(kind: JobKind, payload: serde_json::Value) -> Job {
        Job::new(
            "notifications",
            kind.as_ref(),
            payload,
            &JobDefaults::default(),
            &JobOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_registry_covers_every_notification_kind() {
        let registry = notification_handlers(fixture().jobs);

        for kind in [
            JobKind::EventCreated,
            JobKind::EventInvitation,
            JobKind::EventReminder,
            JobKind::PostLiked,
            JobKind::PostCommented,
            JobKind::CommentReplied,
            JobKind::CommentLiked,
            JobKind::PtoCreated,
            JobKind::PtoRequestStatus,
            JobKind::ProjectAssignment,
            JobKind::EmployeeRecognition,
            JobKind::EmployeeBirthday,
            JobKind::PollCreated,
            JobKind::DepartmentAssignment,
            JobKind::DepartmentRemoval,
            JobKind::DepartmentTransfer,
            JobKind::DepartmentCreated,
        ] {
            assert!(registry.contains(kind.as_ref()), "missing {}", kind);
        }
    }

    #[tokio::test]
    async fn test_post_liked_dispatch_persists_notification() {
        let fixture = fixture();
        let registry = notification_handlers(fixture.jobs.clone());

        let payload = serde_json::to_value(PostLikedJob {
            sender: UserInfo {
                id: 2,
                username: "ama".to_string(),
            },
            post: PostInfo {
                id: 10,
                author_id: 1,
                content: "hello".to_string(),
            },
        })
        .unwrap();

        registry
            .dispatch(&make_job(JobKind::PostLiked, payload))
            .await
            .unwrap();

        let rows = fixture.repository.list_for_user(1).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "ama liked your post");
    }

    #[tokio::test]
    async fn test_event_created_fans_out_to_employees_with_users() {
        let fixture = fixture();

        fixture.directory.add_event(event(5)).await;
        // Organizer (id 1) is excluded; employee 3 has no portal user.
        fixture.directory.add_employee(employee(1, Some(100))).await;
        fixture.directory.add_employee(employee(2, Some(200))).await;
        fixture.directory.add_employee(employee(3, None)).await;
        fixture.directory.add_employee(employee(4, Some(400))).await;

        fixture
            .jobs
            .event_created(EventCreatedJob {
                event_id: 5,
                organizer_id: 1,
            })
            .await
            .unwrap();

        assert_eq!(fixture.repository.list_for_user(200).await.unwrap().len(), 1);
        assert_eq!(fixture.repository.list_for_user(400).await.unwrap().len(), 1);
        assert!(fixture.repository.list_for_user(100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_created_missing_event_is_a_noop() {
        let fixture = fixture();
        fixture.directory.add_employee(employee(2, Some(200))).await;

        fixture
            .jobs
            .event_created(EventCreatedJob {
                event_id: 999,
                organizer_id: 1,
            })
            .await
            .unwrap();

        assert!(fixture.repository.list_for_user(200).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_reminder_uses_captured_participant_list() {
        let fixture = fixture();

        fixture
            .jobs
            .event_reminder(EventReminderJob {
                event: event(5),
                participants: vec![employee(2, Some(200)), employee(3, None)],
            })
            .await
            .unwrap();

        let rows = fixture.repository.list_for_user(200).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].content.contains("coming up soon"));
    }

    #[tokio::test]
    async fn test_poll_created_targets_listed_users() {
        let fixture = fixture();

        fixture
            .jobs
            .poll_created(PollCreatedJob {
                poll: crate::models::PollInfo {
                    id: 8,
                    description: "Team lunch?".to_string(),
                },
                sender: UserInfo {
                    id: 1,
                    username: "hr".to_string(),
                },
                target_user_ids: vec![10, 20],
            })
            .await
            .unwrap();

        assert_eq!(fixture.repository.list_for_user(10).await.unwrap().len(), 1);
        assert_eq!(fixture.repository.list_for_user(20).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_a_permanent_error() {
        let registry = notification_handlers(fixture().jobs);

        let err = registry
            .dispatch(&make_job(JobKind::PostLiked, json!({"wrong": "shape"})))
            .await
            .unwrap_err();

        assert_eq!(err.category(), queue_worker::ErrorCategory::Permanent);
    }

    #[tokio::test]
    async fn test_weekly_digest_email_sends_via_provider() {
        let directory = Arc::new(InMemoryRecipientDirectory::new());
        directory.set_email(200, "emp2@example.com").await;

        let mut provider = MockEmailProvider::new();
        provider
            .expect_send()
            .times(1)
            .withf(|email: &EmailMessage| {
                email.to_email == "emp2@example.com" && email.html_body.contains("All-Hands")
            })
            .returning(|_| {
                Ok(SentEmail {
                    message_id: None,
                    accepted: true,
                })
            });

        let jobs = EmailJobs::new(
            Arc::new(provider),
            directory,
            Arc::new(EmailTemplates::new("RGT Portal").unwrap()),
        );

        jobs.weekly_digest(WeeklyDigestEmailJob {
            employee: employee(2, Some(200)),
            events: vec![event(5)],
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_event_summary_skips_organizer_without_email() {
        let mut provider = MockEmailProvider::new();
        provider.expect_send().times(0);

        let jobs = EmailJobs::new(
            Arc::new(provider),
            Arc::new(InMemoryRecipientDirectory::new()),
            Arc::new(EmailTemplates::new("RGT Portal").unwrap()),
        );

        jobs.event_summary(EventSummaryEmailJob {
            event: event(5),
            organizer: employee(1, Some(100)),
        })
        .await
        .unwrap();
    }
}
