//! Prior history over the REST archive API.

use async_trait::async_trait;
use serde::Deserialize;
use yamcs_core::model::{CommandHistoryEntry, Event};

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Where the derived streams get the history that predates the subscription.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn list_commands(&self, instance: &str) -> Result<Vec<CommandHistoryEntry>, ClientError>;

    /// Oldest first.
    async fn list_events(&self, instance: &str) -> Result<Vec<Event>, ClientError>;
}

/// No prior history. Streams start from whatever the subscription delivers.
pub struct NoHistory;

#[async_trait]
impl HistorySource for NoHistory {
    async fn list_commands(&self, _instance: &str) -> Result<Vec<CommandHistoryEntry>, ClientError> {
        Ok(Vec::new())
    }

    async fn list_events(&self, _instance: &str) -> Result<Vec<Event>, ClientError> {
        Ok(Vec::new())
    }
}

#[derive(Deserialize)]
struct CommandsPage {
    #[serde(default)]
    commands: Vec<CommandHistoryEntry>,
}

#[derive(Deserialize)]
struct EventsPage {
    #[serde(default)]
    events: Vec<Event>,
}

/// Reads `/api/archive/{instance}/...`.
pub struct ArchiveClient {
    client: reqwest::Client,
    base_url: String,
    event_source: Option<String>,
    event_limit: u32,
}

impl ArchiveClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            client,
            base_url: config.http_base().to_string(),
            event_source: config.event_source.clone(),
            event_limit: config.event_limit,
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl HistorySource for ArchiveClient {
    async fn list_commands(&self, instance: &str) -> Result<Vec<CommandHistoryEntry>, ClientError> {
        let url = format!("{}/api/archive/{instance}/commands", self.base_url);
        let page: CommandsPage = self.get(self.client.get(&url)).await?;
        tracing::debug!(instance, count = page.commands.len(), "Fetched command history");
        Ok(page.commands)
    }

    async fn list_events(&self, instance: &str) -> Result<Vec<Event>, ClientError> {
        let url = format!("{}/api/archive/{instance}/events", self.base_url);
        let mut query: Vec<(&str, String)> = Vec::with_capacity(3);
        if let Some(source) = &self.event_source {
            query.push(("source", source.clone()));
        }
        query.push(("limit", self.event_limit.to_string()));
        query.push(("order", "asc".into()));

        let page: EventsPage = self.get(self.client.get(&url).query(&query)).await?;
        tracing::debug!(instance, count = page.events.len(), "Fetched event history");
        Ok(page.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn archive(server: &MockServer) -> ArchiveClient {
        ArchiveClient::new(&ClientConfig {
            url: format!("{}/", server.uri()),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn lists_commands() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/archive/ground_station/commands"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "commands": [{
                    "id": "c1",
                    "commandName": "/flight/arm",
                    "origin": "ops-1",
                    "generationTime": "2024-05-01T10:00:00Z",
                    "attr": [{"name": "CommandComplete_Status", "value": {"type": "STRING", "stringValue": "OK"}}]
                }]
            })))
            .mount(&server)
            .await;

        let commands = archive(&server).list_commands("ground_station").await.unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].id, "c1");
        assert_eq!(commands[0].attr.len(), 1);
    }

    #[tokio::test]
    async fn empty_page_has_no_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/archive/ground_station/commands"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let commands = archive(&server).list_commands("ground_station").await.unwrap();
        assert!(commands.is_empty());
    }

    #[tokio::test]
    async fn lists_events_with_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/archive/ground_station/events"))
            .and(query_param("source", "ASTRA"))
            .and(query_param("limit", "500"))
            .and(query_param("order", "asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "events": [{
                    "source": "ASTRA",
                    "generationTime": "2024-05-01T10:00:00Z",
                    "receptionTime": "2024-05-01T10:00:01Z",
                    "seqNumber": 1,
                    "message": "boot",
                    "severity": "INFO"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let events = archive(&server).list_events("ground_station").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "boot");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such instance"))
            .mount(&server)
            .await;

        let err = archive(&server).list_events("nowhere").await.unwrap_err();
        match err {
            ClientError::HttpStatus { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "no such instance");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn no_history_is_empty() {
        assert!(NoHistory.list_commands("gs").await.unwrap().is_empty());
        assert!(NoHistory.list_events("gs").await.unwrap().is_empty());
    }
}
