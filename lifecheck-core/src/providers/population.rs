use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use lifecheck_model::{VitalCode, dates::to_buddhist_compact};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{PopulationRegistry, ProviderError};

#[derive(Debug, Serialize)]
struct PopulationRequest<'a> {
    id: &'a str,
    dob: String,
}

#[derive(Debug, Deserialize)]
struct PopulationResponse {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    status: Option<i64>,
}

/// Renders a JSON scalar the registry uses for codes as plain text.
pub(crate) fn scalar_to_code(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// HTTP client for the population registry check.
#[derive(Debug, Clone)]
pub struct HttpPopulationRegistry {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpPopulationRegistry {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl PopulationRegistry for HttpPopulationRegistry {
    async fn check(
        &self,
        cid: &str,
        birth_date: NaiveDate,
    ) -> Result<VitalCode, ProviderError> {
        let request = PopulationRequest {
            id: cid,
            dob: to_buddhist_compact(birth_date),
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: PopulationResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        if body.status != Some(200) {
            return Err(ProviderError::ApiError(format!(
                "population registry answered status {:?}: {}",
                body.status,
                body.desc.unwrap_or_default()
            )));
        }

        let code = body
            .code
            .as_ref()
            .and_then(scalar_to_code)
            .ok_or_else(|| {
                ProviderError::ParseError(
                    "population response without code".to_string(),
                )
            })?;

        debug!(target: "lifecheck::checkpop", code = %code, "population registry answered");
        Ok(VitalCode::from_code(&code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(server: &mockito::Server) -> HttpPopulationRegistry {
        let endpoint = Url::parse(&format!("{}/checkpop/", server.url()))
            .expect("endpoint");
        HttpPopulationRegistry::new(endpoint, Duration::from_secs(5))
            .expect("client")
    }

    #[tokio::test]
    async fn sends_buddhist_era_birth_date_and_reads_code() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/checkpop/")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "id": "1100400000001",
                "dob": "25280307"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"code":"1","desc":"dead","status":200}"#)
            .create_async()
            .await;

        let code = registry(&server)
            .check(
                "1100400000001",
                NaiveDate::from_ymd_opt(1985, 3, 7).expect("date"),
            )
            .await
            .expect("check");

        assert_eq!(code, VitalCode::Deceased);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn numeric_codes_are_accepted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/checkpop/")
            .with_status(200)
            .with_body(r#"{"ok":true,"code":0,"status":200}"#)
            .create_async()
            .await;

        let code = registry(&server)
            .check("1", NaiveDate::from_ymd_opt(1990, 1, 1).expect("date"))
            .await
            .expect("check");
        assert_eq!(code, VitalCode::Alive);
    }

    #[tokio::test]
    async fn non_200_payload_status_is_an_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/checkpop/")
            .with_status(200)
            .with_body(r#"{"ok":false,"desc":"busy","status":503}"#)
            .create_async()
            .await;

        let err = registry(&server)
            .check("1", NaiveDate::from_ymd_opt(1990, 1, 1).expect("date"))
            .await
            .expect_err("should fail");
        assert!(matches!(err, ProviderError::ApiError(_)));
    }

    #[tokio::test]
    async fn http_failure_is_a_network_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/checkpop/")
            .with_status(502)
            .create_async()
            .await;

        let err = registry(&server)
            .check("1", NaiveDate::from_ymd_opt(1990, 1, 1).expect("date"))
            .await
            .expect_err("should fail");
        assert!(matches!(err, ProviderError::NetworkError(_)));
    }
}
