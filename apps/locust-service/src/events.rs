// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! [`EventSink`] posting structured CloudEvents to the Keptn event broker.

use async_trait::async_trait;
use locust_service_api::{notification_event, CLOUDEVENTS_CONTENT_TYPE};
use locust_service_core::{EventSink, Notification, NotificationError, RunCorrelation};
use reqwest::header::CONTENT_TYPE;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone)]
pub struct HttpEventSink {
    client: reqwest::Client,
    url: String,
    source: String,
}

impl HttpEventSink {
    pub fn new(client: reqwest::Client, url: impl Into<String>, source: impl Into<String>) -> Self {
        Self { client, url: url.into(), source: source.into() }
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn send(
        &self,
        correlation: &RunCorrelation,
        notification: Notification,
    ) -> Result<(), NotificationError> {
        let kind = notification.kind();
        let error = |message: String| NotificationError { event: kind, message };

        let event = notification_event(
            Uuid::new_v4().to_string(),
            &self.source,
            OffsetDateTime::now_utc(),
            correlation,
            &notification,
        )
        .map_err(|e| error(e.to_string()))?;
        let body = serde_json::to_vec(&event).map_err(|e| error(e.to_string()))?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, CLOUDEVENTS_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| error(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(error(format!("event broker returned {status}: {body}")));
        }

        tracing::debug!(event_type = %event.event_type, id = %event.id, "Sent event");
        Ok(())
    }
}
