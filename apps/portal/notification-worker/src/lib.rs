//! Notification worker wiring.
//!
//! Builds the queue manager once at startup (broker connections opened,
//! handlers registered), spawns the per-queue workers and the
//! health/admin endpoints, and tears everything down on SIGINT.

use core_config::redis::RedisConfig;
use core_config::server::ServerConfig;
use core_config::{Environment, FromEnv};
use database::common::RetryConfig;
use database::postgres::PostgresConfig;
use domain_notifications::{
    email_handlers, notification_handlers, EmailChannel, EmailJobs, EmailTemplates,
    InMemoryEmployeeDirectory, InMemoryRecipientDirectory, NotificationJobs,
    NotificationPreferenceService, NotificationService, PgNotificationRepository,
    PgPreferenceRepository, QueueName, RealtimeChannel, SessionRegistry, SmtpProvider,
};
use queue_worker::health::{health_router, HealthState};
use queue_worker::QueueManager;
use std::sync::Arc;
use tracing::info;

const APP_NAME: &str = "notification-worker";

pub async fn run() -> eyre::Result<()> {
    core_config::tracing::install_color_eyre();
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);
    queue_worker::metrics::init_metrics();

    info!(environment = ?environment, "Starting {}", APP_NAME);

    // Backing stores
    let redis_config = RedisConfig::from_env()?;
    let redis = database::redis::connect_with_retry(
        &redis_config.url,
        Some(RetryConfig::new().with_max_retries(5)),
    )
    .await?;

    let pg_config = PostgresConfig::from_env()?;
    let db = database::postgres::connect_from_config_with_retry(
        pg_config,
        Some(RetryConfig::new().with_max_retries(5)),
    )
    .await?;
    database::postgres::run_migrations::<migration::Migrator>(&db, APP_NAME).await?;

    // Notification store + preference resolver
    let notification_repo = Arc::new(PgNotificationRepository::new(db.clone()));
    let preferences =
        NotificationPreferenceService::new(Arc::new(PgPreferenceRepository::new(db.clone())));

    // Channel adapters. The session registry is where the portal's
    // realtime gateway registers live connections.
    let realtime = Arc::new(RealtimeChannel::new(Arc::new(SessionRegistry::new())));

    let company_name =
        std::env::var("COMPANY_NAME").unwrap_or_else(|_| "Employee Portal".to_string());
    let templates = Arc::new(EmailTemplates::new(company_name)?);
    let smtp = Arc::new(SmtpProvider::from_env()?);

    // The portal's employee/user services own these lookups in production;
    // the in-memory directories are the integration point until that
    // service is wired in.
    let recipient_directory = Arc::new(InMemoryRecipientDirectory::new());
    let employee_directory = Arc::new(InMemoryEmployeeDirectory::new());

    let email = Arc::new(EmailChannel::new(
        recipient_directory.clone(),
        smtp.clone(),
        templates.clone(),
    ));

    let service = NotificationService::new(notification_repo, preferences, realtime, email);

    // Queue manager with the fixed queue set and per-kind handlers
    let notification_jobs = Arc::new(NotificationJobs::new(service, employee_directory));
    let email_jobs = Arc::new(EmailJobs::new(smtp, recipient_directory, templates));

    let manager = Arc::new(
        QueueManager::builder(redis.clone())
            .queue(
                QueueName::Notifications.as_ref(),
                QueueName::Notifications.defaults(),
                notification_handlers(notification_jobs),
            )
            .queue(
                QueueName::Emails.as_ref(),
                QueueName::Emails.defaults(),
                email_handlers(email_jobs),
            )
            .build(),
    );
    manager.start().await;

    // Health/admin endpoints
    let server_config = ServerConfig::from_env()?;
    let state = HealthState::new(
        redis,
        APP_NAME,
        env!("CARGO_PKG_VERSION"),
        manager.clone(),
    );
    let listener = tokio::net::TcpListener::bind(server_config.address()).await?;
    info!(address = %server_config.address(), "Health endpoints listening");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, health_router(state)).await {
            tracing::error!(error = %e, "Health server exited");
        }
    });

    // Drain and close on SIGINT
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    manager.shutdown().await;
    server.abort();

    info!("{} stopped", APP_NAME);
    Ok(())
}
