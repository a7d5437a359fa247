//! Collaborator interfaces to the portal's domain services.
//!
//! The employee/user CRUD services live outside this crate; handlers see
//! them only through these traits. In-memory implementations back the
//! tests and local development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::NotificationResult;
use crate::models::{EmployeeInfo, EventInfo};

/// Lookup of employees and events, used by fan-out handlers that carry
/// only entity ids and re-query fresh state at processing time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    /// All employees except the given one (the actor is excluded from
    /// their own fan-outs).
    async fn employees_except(&self, employee_id: i64) -> NotificationResult<Vec<EmployeeInfo>>;

    /// Fetch an event by id; `None` when it no longer exists.
    async fn event_by_id(&self, event_id: i64) -> NotificationResult<Option<EventInfo>>;
}

/// Resolution of a user's email address for the email channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// The user's email address; `None` when the user is unknown or has
    /// no address on file.
    async fn email_for_user(&self, user_id: i64) -> NotificationResult<Option<String>>;
}

/// In-memory employee/event directory.
#[derive(Default)]
pub struct InMemoryEmployeeDirectory {
    employees: RwLock<Vec<EmployeeInfo>>,
    events: RwLock<HashMap<i64, EventInfo>>,
}

impl InMemoryEmployeeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_employee(&self, employee: EmployeeInfo) {
        self.employees.write().await.push(employee);
    }

    pub async fn add_event(&self, event: EventInfo) {
        self.events.write().await.insert(event.id, event);
    }
}

#[async_trait]
impl EmployeeDirectory for InMemoryEmployeeDirectory {
    async fn employees_except(&self, employee_id: i64) -> NotificationResult<Vec<EmployeeInfo>> {
        Ok(self
            .employees
            .read()
            .await
            .iter()
            .filter(|e| e.id != employee_id)
            .cloned()
            .collect())
    }

    async fn event_by_id(&self, event_id: i64) -> NotificationResult<Option<EventInfo>> {
        Ok(self.events.read().await.get(&event_id).cloned())
    }
}

/// In-memory email directory.
#[derive(Default)]
pub struct InMemoryRecipientDirectory {
    addresses: Arc<RwLock<HashMap<i64, String>>>,
}

impl InMemoryRecipientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_email(&self, user_id: i64, email: impl Into<String>) {
        self.addresses.write().await.insert(user_id, email.into());
    }
}

#[async_trait]
impl RecipientDirectory for InMemoryRecipientDirectory {
    async fn email_for_user(&self, user_id: i64) -> NotificationResult<Option<String>> {
        Ok(self.addresses.read().await.get(&user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_employees_except_filters_the_actor() {
        let directory = InMemoryEmployeeDirectory::new();
        for id in 1..=3 {
            directory
                .add_employee(EmployeeInfo {
                    id,
                    first_name: format!("emp{}", id),
                    last_name: "test".to_string(),
                    user: None,
                    birthday: None,
                })
                .await;
        }

        let others = directory.employees_except(2).await.unwrap();
        assert_eq!(others.len(), 2);
        assert!(others.iter().all(|e| e.id != 2));
    }

    #[tokio::test]
    async fn test_email_lookup() {
        let directory = InMemoryRecipientDirectory::new();
        directory.set_email(1, "ama@example.com").await;

        assert_eq!(
            directory.email_for_user(1).await.unwrap().as_deref(),
            Some("ama@example.com")
        );
        assert!(directory.email_for_user(2).await.unwrap().is_none());
    }
}
