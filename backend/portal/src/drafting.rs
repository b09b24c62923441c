//! Client for the external text-drafting service.
//!
//! The service is asked for two kinds of text: prose for a cycle's financial
//! statement, and a description for a new project. Every request is a JSON
//! object tagged with `kind` and the reply is `{ "text": ... }`.
//!
//! The service is optional. When it is unset, slow, or failing, the methods
//! here return `None` and callers fall back to the built-in templates.

use std::time::Duration;

use reqwest::Client;
use sabil_funds::DistributionFacts;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum DraftRequest<'a> {
    Statement { facts: &'a DistributionFacts },
    ProjectDescription { title: &'a str },
}

#[derive(Debug, Deserialize)]
struct DraftResponse {
    text: Option<String>,
}

#[derive(Clone)]
pub struct Drafter {
    client: Client,
    url: Option<String>,
    timeout: Duration,
}

impl Drafter {
    pub fn new(client: Client, url: Option<String>, timeout: Duration) -> Self {
        Drafter {
            client,
            url,
            timeout,
        }
    }

    /// Drafter that always falls back to the template.
    pub fn disabled(client: Client) -> Self {
        Drafter::new(client, None, Duration::ZERO)
    }

    /// Prose for a cycle's statement. `None` means "use the template".
    pub async fn draft(&self, facts: &DistributionFacts) -> Option<String> {
        self.ask(&DraftRequest::Statement { facts }).await
    }

    /// Description for a project with the given title.
    pub async fn describe_project(&self, title: &str) -> Option<String> {
        self.ask(&DraftRequest::ProjectDescription { title }).await
    }

    async fn ask(&self, request: &DraftRequest<'_>) -> Option<String> {
        let url = self.url.as_deref()?;

        let resp = match self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!("Drafting service unavailable, using template: {e}");
                return None;
            }
        };

        match resp.json::<DraftResponse>().await {
            Ok(DraftResponse { text: Some(text) }) if !text.trim().is_empty() => {
                debug!("Drafting service returned {} chars", text.len());
                Some(text.trim().to_string())
            }
            Ok(_) => {
                warn!("Drafting service returned no text, using template");
                None
            }
            Err(e) => {
                warn!("Drafting service returned an unreadable body, using template: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use sabil_funds::Amount;
    use serde_json::{json, Value};

    /// Serve `app` on an ephemeral local port and return its base URL.
    pub(crate) async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    /// Drafting service that answers according to the request kind.
    pub(crate) async fn drafting_service() -> String {
        let app = Router::new().route(
            "/draft",
            post(|Json(body): Json<Value>| async move {
                let text = match body["kind"].as_str() {
                    Some("statement") => format!(
                        "Alhamdulillah, {} DZD were collected this week.",
                        body["facts"]["newlyCollected"]
                    ),
                    Some("projectDescription") => {
                        format!("Help us build the {}.", body["title"].as_str().unwrap_or(""))
                    }
                    _ => String::new(),
                };
                Json(json!({ "text": text }))
            }),
        );
        format!("{}/draft", serve(app).await)
    }

    fn drafter(url: String) -> Drafter {
        Drafter::new(Client::new(), Some(url), Duration::from_secs(5))
    }

    fn facts() -> DistributionFacts {
        DistributionFacts {
            newly_collected: Amount::from_major(10),
            prior_balance: Amount::ZERO,
            total_available: Amount::from_major(10),
            total_distributed: Amount::ZERO,
            new_balance: Amount::from_major(10),
            shares: vec![],
        }
    }

    #[tokio::test]
    async fn disabled_drafter_yields_nothing() {
        let drafter = Drafter::disabled(Client::new());
        assert_eq!(drafter.draft(&facts()).await, None);
        assert_eq!(drafter.describe_project("Roof").await, None);
    }

    #[tokio::test]
    async fn unreachable_service_falls_back() {
        let drafter = Drafter::new(
            Client::new(),
            Some("http://127.0.0.1:9/draft".to_string()),
            Duration::from_millis(500),
        );
        assert_eq!(drafter.draft(&facts()).await, None);
    }

    #[tokio::test]
    async fn statement_prose_is_returned() {
        let drafter = drafter(drafting_service().await);
        assert_eq!(
            drafter.draft(&facts()).await.as_deref(),
            Some("Alhamdulillah, 10.0 DZD were collected this week.")
        );
    }

    #[tokio::test]
    async fn project_description_is_returned() {
        let drafter = drafter(drafting_service().await);
        assert_eq!(
            drafter.describe_project("ablution room").await.as_deref(),
            Some("Help us build the ablution room.")
        );
    }

    #[tokio::test]
    async fn blank_text_falls_back() {
        let app = Router::new().route("/draft", post(|| async { Json(json!({ "text": "   " })) }));
        let drafter = drafter(format!("{}/draft", serve(app).await));
        assert_eq!(drafter.draft(&facts()).await, None);
    }

    #[tokio::test]
    async fn error_status_falls_back() {
        let app = Router::new().route(
            "/draft",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "text": "oops" }))) }),
        );
        let drafter = drafter(format!("{}/draft", serve(app).await));
        assert_eq!(drafter.describe_project("Roof").await, None);
    }
}
