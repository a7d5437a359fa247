//! Handlebars-based email rendering.
//!
//! Renders notification payloads (and the digest/summary emails built by
//! the emails queue) into HTML + plain-text bodies.

use handlebars::Handlebars;
use serde_json::json;

use crate::error::{NotificationError, NotificationResult};
use crate::models::{EventInfo, NotificationKind, NotificationPayload};

/// A rendered email body pair with its subject.
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

const NOTIFICATION_HTML: &str = r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <div style="background-color: #f8f9fa; padding: 20px; border-radius: 5px;">
    <h2 style="color: #2c3e50; margin-top: 0;">{{title}}</h2>
    <p style="color: #34495e; line-height: 1.6;">{{content}}</p>
  </div>
  <div style="color: #7f8c8d; font-size: 12px; text-align: center; margin-top: 20px;">
    <p>This is an automated message from {{company_name}}. Please do not reply to this email.</p>
  </div>
</div>"#;

const NOTIFICATION_TEXT: &str = r#"{{title}}

{{content}}

--
This is an automated message from {{company_name}}. Please do not reply."#;

const EVENT_HTML: &str = r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <div style="background-color: #f8f9fa; padding: 20px; border-radius: 5px;">
    <h2 style="color: #2c3e50; margin-top: 0;">{{title}}</h2>
    <p style="color: #34495e; line-height: 1.6;">{{content}}</p>
    <div style="margin-top: 20px; background-color: #fff; padding: 15px; border-radius: 3px; border: 1px solid #e0e0e0;">
      {{#if data.event_date}}<p><strong>Date:</strong> {{data.event_date}}</p>{{/if}}
      {{#if data.location}}<p><strong>Location:</strong> {{data.location}}</p>{{/if}}
    </div>
  </div>
  <div style="color: #7f8c8d; font-size: 12px; text-align: center; margin-top: 20px;">
    <p>This is an automated message from {{company_name}}. Please do not reply to this email.</p>
  </div>
</div>"#;

const PTO_HTML: &str = r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <div style="background-color: #f8f9fa; padding: 20px; border-radius: 5px;">
    <h2 style="color: #2c3e50; margin-top: 0;">{{title}}</h2>
    <p style="color: #34495e; line-height: 1.6;">{{content}}</p>
    <div style="margin-top: 20px; background-color: #fff; padding: 15px; border-radius: 3px; border: 1px solid #e0e0e0;">
      {{#if data.status}}<p><strong>Status:</strong> {{data.status}}</p>{{/if}}
      <p><strong>Start Date:</strong> {{data.start_date}}</p>
      <p><strong>End Date:</strong> {{data.end_date}}</p>
    </div>
  </div>
  <div style="color: #7f8c8d; font-size: 12px; text-align: center; margin-top: 20px;">
    <p>This is an automated message from {{company_name}}. Please do not reply to this email.</p>
  </div>
</div>"#;

const WEEKLY_DIGEST_HTML: &str = r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <div style="background-color: #f8f9fa; padding: 20px; border-radius: 5px;">
    <h2 style="color: #2c3e50; margin-top: 0;">Your week at {{company_name}}</h2>
    <p style="color: #34495e;">Hi {{employee_name}}, here is what's coming up:</p>
    <ul style="list-style-type: none; padding-left: 0;">
      {{#each events}}
      <li style="padding: 10px; background-color: #fff; margin-bottom: 5px; border-radius: 3px; border: 1px solid #e0e0e0;">
        <strong>{{this.title}}</strong> · {{this.start_time}}{{#if this.location}} @ {{this.location}}{{/if}}
      </li>
      {{/each}}
    </ul>
    {{#unless events}}<p style="color: #34495e;">No upcoming events this week.</p>{{/unless}}
  </div>
</div>"#;

const WEEKLY_DIGEST_TEXT: &str = r#"Hi {{employee_name}},

Your upcoming events:
{{#each events}}
- {{this.title}} ({{this.start_time}}{{#if this.location}}, {{this.location}}{{/if}})
{{/each}}
{{#unless events}}No upcoming events this week.{{/unless}}"#;

const EVENT_SUMMARY_HTML: &str = r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <div style="background-color: #f8f9fa; padding: 20px; border-radius: 5px;">
    <h2 style="color: #2c3e50; margin-top: 0;">Event summary: {{event.title}}</h2>
    <p style="color: #34495e;">Organized by {{organizer_name}}.</p>
    <div style="margin-top: 20px; background-color: #fff; padding: 15px; border-radius: 3px; border: 1px solid #e0e0e0;">
      <p><strong>Starts:</strong> {{event.start_time}}</p>
      {{#if event.end_time}}<p><strong>Ends:</strong> {{event.end_time}}</p>{{/if}}
      {{#if event.location}}<p><strong>Location:</strong> {{event.location}}</p>{{/if}}
      {{#if event.description}}<p>{{event.description}}</p>{{/if}}
    </div>
  </div>
</div>"#;

const EVENT_SUMMARY_TEXT: &str = r#"Event summary: {{event.title}}

Organized by {{organizer_name}}.
Starts: {{event.start_time}}
{{#if event.location}}Location: {{event.location}}{{/if}}"#;

/// Email template engine.
pub struct EmailTemplates {
    handlebars: Handlebars<'static>,
    company_name: String,
}

impl EmailTemplates {
    pub fn new(company_name: impl Into<String>) -> NotificationResult<Self> {
        let mut handlebars = Handlebars::new();

        let templates = [
            ("notification_html", NOTIFICATION_HTML),
            ("notification_text", NOTIFICATION_TEXT),
            ("event_html", EVENT_HTML),
            ("pto_html", PTO_HTML),
            ("weekly_digest_html", WEEKLY_DIGEST_HTML),
            ("weekly_digest_text", WEEKLY_DIGEST_TEXT),
            ("event_summary_html", EVENT_SUMMARY_HTML),
            ("event_summary_text", EVENT_SUMMARY_TEXT),
        ];

        for (name, source) in templates {
            handlebars
                .register_template_string(name, source)
                .map_err(|e| {
                    NotificationError::Template(format!("Failed to register {}: {}", name, e))
                })?;
        }

        Ok(Self {
            handlebars,
            company_name: company_name.into(),
        })
    }

    /// Render a notification payload into an email.
    ///
    /// Event and PTO kinds get their detail blocks; everything else uses
    /// the base title/content template. The subject is the notification
    /// title.
    pub fn render_notification(
        &self,
        payload: &NotificationPayload,
    ) -> NotificationResult<RenderedEmail> {
        let html_template = match payload.kind {
            NotificationKind::EventCreated
            | NotificationKind::EventInvitation
            | NotificationKind::EventReminder => "event_html",
            NotificationKind::PtoCreated | NotificationKind::PtoRequestStatus => "pto_html",
            _ => "notification_html",
        };

        let data = json!({
            "title": payload.title,
            "content": payload.content,
            "company_name": self.company_name,
            "data": payload.data,
        });

        let html = self.handlebars.render(html_template, &data)?;
        let text = self.handlebars.render("notification_text", &data)?;

        Ok(RenderedEmail {
            subject: payload.title.clone(),
            html,
            text,
        })
    }

    /// Render the weekly digest email for an employee.
    pub fn render_weekly_digest(
        &self,
        employee_name: &str,
        events: &[EventInfo],
    ) -> NotificationResult<RenderedEmail> {
        let data = json!({
            "employee_name": employee_name,
            "events": events,
            "company_name": self.company_name,
        });

        let html = self.handlebars.render("weekly_digest_html", &data)?;
        let text = self.handlebars.render("weekly_digest_text", &data)?;

        Ok(RenderedEmail {
            subject: format!("Your weekly digest from {}", self.company_name),
            html,
            text,
        })
    }

    /// Render the post-event summary email for the organizer.
    pub fn render_event_summary(
        &self,
        event: &EventInfo,
        organizer_name: &str,
    ) -> NotificationResult<RenderedEmail> {
        let data = json!({
            "event": event,
            "organizer_name": organizer_name,
        });

        let html = self.handlebars.render("event_summary_html", &data)?;
        let text = self.handlebars.render("event_summary_text", &data)?;

        Ok(RenderedEmail {
            subject: format!("Event summary: {}", event.title),
            html,
            text,
        })
    }
}
