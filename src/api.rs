use std::time::Duration;

use log::{debug, warn};
use reqwest::{RequestBuilder, Url};
use serde::Serialize;
use serde_json::Value;

use crate::error::{ApiError, Result};
use crate::models::{decode_list, Company, Country, Institute, Occupation};

pub mod endpoints {
    pub const FILTER_ALL_JOBS: &str = "filter-all-jobs";
    pub const SEARCH_ALL_JOBS: &str = "search-all-jobs";
    pub const LAST_WEEK_JOBS: &str = "last-week-jobs";
    pub const OCCUPATION_WISE_JOBS: &str = "occupation-wise-jobs";
    pub const COUNTRY_WISE_JOBS: &str = "country-wise-jobs";
    pub const GET_OCCUPATIONS: &str = "get-occupations";
    pub const GET_COUNTRIES: &str = "get-countries";
    pub const LIST_TRAINING_INSTITUTES: &str = "list-training-institute";
    pub const LIST_COMPANIES: &str = "list-companies";
    pub const APPLY_JOB: &str = "apply-job-r";
    pub const SAVE_JOB: &str = "save-job-by-user";
    pub const SAVED_JOBS: &str = "user-saved-job-list";
    pub const APPLIED_JOBS: &str = "user-applied-job-list";
}

/// Thin wrapper over `reqwest::Client` bound to the backend base URL.
/// Cloning is cheap and shares the connection pool.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("overseas-jobs/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base: parse_base(base_url)?,
            token,
        })
    }

    pub fn with_token(&self, token: Option<String>) -> Self {
        Self {
            token,
            ..self.clone()
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Url(format!("{}: {}", path, e)))
    }

    pub async fn get_json(&self, path: &str) -> Result<Value> {
        let url = self.url(path)?;
        debug!("GET {}", url);
        self.send(self.http.get(url)).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        let url = self.url(path)?;
        debug!("POST {} (json)", url);
        self.send(self.http.post(url).json(body)).await
    }

    pub async fn post_form(&self, path: &str, fields: &[(String, String)]) -> Result<Value> {
        let url = self.url(path)?;
        debug!("POST {} (multipart, {} fields)", url, fields.len());
        let form = fields
            .iter()
            .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                form.text(name.clone(), value.clone())
            });
        self.send(self.http.post(url).multipart(form)).await
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value> {
        let builder = match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };
        let resp = builder.send().await?;
        let status = resp.status();
        let url = resp.url().clone();
        let text = resp.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            debug!("HTTP {} for {}", status, url);
            return Err(ApiError::Unauthorized { code: status.as_u16() });
        }
        if !status.is_success() {
            warn!("HTTP {} for {}", status, url);
            return Err(ApiError::Status {
                code: status.as_u16(),
                message: error_message(&text),
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn occupations(&self) -> Result<Vec<Occupation>> {
        let data = self.get_json(endpoints::GET_OCCUPATIONS).await?;
        Ok(decode_list(&data)?)
    }

    pub async fn countries(&self) -> Result<Vec<Country>> {
        let data = self.get_json(endpoints::GET_COUNTRIES).await?;
        Ok(decode_list(&data)?)
    }

    pub async fn institutes(&self) -> Result<Vec<Institute>> {
        let data = self.get_json(endpoints::LIST_TRAINING_INSTITUTES).await?;
        Ok(decode_list(&data)?)
    }

    pub async fn companies(&self) -> Result<Vec<Company>> {
        let data = self.get_json(endpoints::LIST_COMPANIES).await?;
        Ok(decode_list(&data)?)
    }
}

#[cfg(test)]
impl ApiClient {
    /// Client for a loopback test server; bypasses any proxy from the environment.
    pub(crate) fn local(base_url: &str, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::builder().no_proxy().build().unwrap(),
            base: parse_base(base_url).unwrap(),
            token,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(head_end) = text.find("\r\n\r\n") {
                let body_len = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse().ok())?
                    })
                    .unwrap_or(0usize);
                if buf.len() >= head_end + 4 + body_len {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Answers exactly one request with `status` and `body`, returning the
    /// API base URL to point a client at.
    pub async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{}/api/", addr)
    }
}

fn parse_base(base_url: &str) -> Result<Url> {
    // `Url::join` drops the last segment unless the base ends with '/'
    let normalized = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };
    Url::parse(&normalized).map_err(|e| ApiError::Url(format!("{}: {}", base_url, e)))
}

/// Pulls a human readable message out of an error body. The backend answers
/// with `{message}`, `{error}` or a validation map under `errors`.
pub fn error_message(body: &str) -> String {
    let fallback = || {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            "Request failed".to_string()
        } else {
            trimmed.chars().take(200).collect()
        }
    };

    let Ok(data) = serde_json::from_str::<Value>(body) else {
        return fallback();
    };

    for key in ["message", "error", "msg"] {
        if let Some(msg) = data.get(key).and_then(|v| v.as_str()) {
            if !msg.trim().is_empty() {
                return msg.trim().to_string();
            }
        }
    }

    if let Some(errors) = data.get("errors").and_then(|v| v.as_object()) {
        let first = errors.values().next().and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => items.first().and_then(|i| i.as_str()).map(String::from),
            _ => None,
        });
        if let Some(msg) = first {
            return msg;
        }
    }

    fallback()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join_keeps_api_prefix() {
        let client = ApiClient::new("https://backend.overseas.ai/api", None, Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.url("filter-all-jobs").unwrap().as_str(),
            "https://backend.overseas.ai/api/filter-all-jobs"
        );
        assert_eq!(
            client.url("/occupation-wise-jobs/3").unwrap().as_str(),
            "https://backend.overseas.ai/api/occupation-wise-jobs/3"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = ApiClient::new("not a url", None, Duration::from_secs(5));
        assert!(matches!(result, Err(ApiError::Url(_))));
    }

    #[test]
    fn test_token_switch() {
        let client = ApiClient::new("https://example.com/api/", None, Duration::from_secs(5)).unwrap();
        assert!(!client.has_token());
        assert!(client.with_token(Some("abc".to_string())).has_token());
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(error_message(r#"{"message":"Job not found"}"#), "Job not found");
        assert_eq!(error_message(r#"{"error":"Server busy"}"#), "Server busy");
        assert_eq!(
            error_message(r#"{"errors":{"jobId":["The job id field is required."]}}"#),
            "The job id field is required."
        );
        assert_eq!(error_message("<html>502 Bad Gateway</html>"), "<html>502 Bad Gateway</html>");
        assert_eq!(error_message("   "), "Request failed");
    }

    #[tokio::test]
    async fn test_refused_requests_are_unauthorized() {
        let base = testing::serve_once("401 Unauthorized", r#"{"message":"Unauthenticated."}"#).await;
        let result = ApiClient::local(&base, None).get_json("user-saved-job-list").await;
        assert!(matches!(result, Err(ApiError::Unauthorized { code: 401 })));

        let base = testing::serve_once("403 Forbidden", "").await;
        let result = ApiClient::local(&base, Some("stale".to_string())).get_json("user-applied-job-list").await;
        assert!(matches!(result, Err(ApiError::Unauthorized { code: 403 })));
    }

    #[tokio::test]
    async fn test_server_error_carries_body_message() {
        let base = testing::serve_once("500 Internal Server Error", r#"{"message":"Database down"}"#).await;
        let client = ApiClient::local(&base, None);
        match client.post_json("filter-all-jobs", &serde_json::json!({ "page": 1 })).await {
            Err(ApiError::Status { code, message }) => {
                assert_eq!(code, 500);
                assert_eq!(message, "Database down");
            }
            other => panic!("expected a status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_success_bodies() {
        let base = testing::serve_once("200 OK", "").await;
        assert_eq!(ApiClient::local(&base, None).get_json("get-occupations").await.unwrap(), Value::Null);

        let base = testing::serve_once("200 OK", r#"{"data":[{"id":3,"occupation":"Construction"}]}"#).await;
        let occupations = ApiClient::local(&base, None).occupations().await.unwrap();
        assert_eq!(occupations[0].title, "Construction");
    }
}
