use std::time::Duration;

use async_trait::async_trait;
use lifecheck_model::{VitalCode, dates::parse_buddhist_compact};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{CivilRecord, CivilRegistry, ProviderError, population::scalar_to_code};

/// Service id of the person status lookup inside a civil registry job.
const PERSON_STATUS_SERVICE: i64 = 1;
/// Companion house registration lookup requested alongside the status.
const HOUSE_REGISTRATION_SERVICE: i64 = 27;

/// Addresses of the civil registry gateway.
#[derive(Debug, Clone)]
pub struct CivilRegistryEndpoints {
    /// `{base}/api/center/request/`
    pub request_url: Url,
    /// Endpoint probed with the bearer token to check it is still accepted.
    pub token_check_url: Url,
    pub job_id: String,
}

impl CivilRegistryEndpoints {
    pub fn from_base(
        base: &str,
        token_check_url: Url,
        job_id: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let request_url = Url::parse(&format!(
            "{}/api/center/request/",
            base.trim_end_matches('/')
        ))?;
        Ok(Self {
            request_url,
            token_check_url,
            job_id: job_id.into(),
        })
    }
}

#[derive(Debug, Serialize)]
struct JobRequest<'a> {
    #[serde(rename = "jobID")]
    job_id: &'a str,
    data: Vec<ServiceQuery<'a>>,
}

#[derive(Debug, Serialize)]
struct ServiceQuery<'a> {
    #[serde(rename = "serviceID")]
    service_id: i64,
    query: PersonalQuery<'a>,
}

#[derive(Debug, Serialize)]
struct PersonalQuery<'a> {
    #[serde(rename = "personalID")]
    personal_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    #[serde(default)]
    data: Vec<ServiceResult>,
}

#[derive(Debug, Deserialize)]
struct ServiceResult {
    #[serde(rename = "serviceID")]
    service_id: i64,
    #[serde(rename = "responseStatus", default)]
    response_status: Option<serde_json::Value>,
    #[serde(rename = "responseData", default)]
    response_data: Option<PersonData>,
}

#[derive(Debug, Deserialize)]
struct PersonData {
    #[serde(rename = "dateOfBirth", default)]
    date_of_birth: Option<serde_json::Value>,
    #[serde(rename = "statusOfPersonCode", default)]
    status_of_person_code: Option<serde_json::Value>,
}

fn parse_job_response(body: JobResponse) -> Result<CivilRecord, ProviderError> {
    let person = body
        .data
        .into_iter()
        .find(|result| result.service_id == PERSON_STATUS_SERVICE)
        .ok_or_else(|| {
            ProviderError::ParseError(
                "civil registry response without person status service"
                    .to_string(),
            )
        })?;

    let status = person.response_status.as_ref().and_then(scalar_to_code);
    if status.as_deref() != Some("200") {
        return Err(ProviderError::ApiError(format!(
            "civil registry person status answered {}",
            status.unwrap_or_else(|| "no status".to_string())
        )));
    }

    let data = person.response_data.ok_or_else(|| {
        ProviderError::ParseError("person status without data".to_string())
    })?;

    let code = data
        .status_of_person_code
        .as_ref()
        .and_then(scalar_to_code)
        .ok_or_else(|| {
            ProviderError::ParseError(
                "person status without statusOfPersonCode".to_string(),
            )
        })?;

    let date_of_birth = data
        .date_of_birth
        .as_ref()
        .and_then(scalar_to_code)
        .and_then(|raw| parse_buddhist_compact(&raw));

    Ok(CivilRecord {
        status: VitalCode::from_code(&code),
        date_of_birth,
    })
}

/// HTTP client for the civil registry gateway.
#[derive(Debug, Clone)]
pub struct HttpCivilRegistry {
    client: reqwest::Client,
    endpoints: CivilRegistryEndpoints,
}

impl HttpCivilRegistry {
    pub fn new(
        endpoints: CivilRegistryEndpoints,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoints })
    }
}

#[async_trait]
impl CivilRegistry for HttpCivilRegistry {
    async fn lookup(
        &self,
        cid: &str,
        token: &str,
    ) -> Result<CivilRecord, ProviderError> {
        let request = JobRequest {
            job_id: &self.endpoints.job_id,
            data: [PERSON_STATUS_SERVICE, HOUSE_REGISTRATION_SERVICE]
                .into_iter()
                .map(|service_id| ServiceQuery {
                    service_id,
                    query: PersonalQuery { personal_id: cid },
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.endpoints.request_url.clone())
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: JobResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let record = parse_job_response(body)?;
        debug!(target: "lifecheck::lk", code = %record.status, "civil registry answered");
        Ok(record)
    }

    async fn token_accepted(&self, token: &str) -> bool {
        let result = self
            .client
            .get(self.endpoints.token_check_url.clone())
            .bearer_auth(token)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => true,
            Err(err) => {
                debug!(target: "lifecheck::lk", error = %err, "registry token not accepted");
                false
            }
        }
    }
}
