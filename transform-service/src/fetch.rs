//! Live payload retrieval. One request per OEM per run; the raw
//! response body is handed to the transform untouched.

use crate::config::{HttpMethod, LiveConfig};

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("live config missing for '{0}'")]
    ConfigMissing(String),
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout {
        url: String,
        timeout: std::time::Duration,
    },
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {detail}")]
    Network { url: String, detail: String },
}

/// Fetch the raw payload described by a live configuration. Non-2xx
/// responses and timeouts are errors; the body is returned as text for
/// the transform to parse.
pub async fn fetch_payload(cfg: &LiveConfig) -> Result<String, FetchError> {
    let client = reqwest::Client::builder()
        .timeout(cfg.timeout)
        .build()
        .map_err(|e| FetchError::Network {
            url: cfg.url.clone(),
            detail: e.to_string(),
        })?;

    let mut request = match cfg.method {
        HttpMethod::Get => client.get(&cfg.url),
        HttpMethod::Post => client.post(&cfg.url),
    };
    for (name, value) in &cfg.headers {
        request = request.header(name, value);
    }
    if let Some(body) = &cfg.body {
        request = request.body(body.clone());
    }

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout {
                url: cfg.url.clone(),
                timeout: cfg.timeout,
            }
        } else {
            FetchError::Network {
                url: cfg.url.clone(),
                detail: e.to_string(),
            }
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: cfg.url.clone(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(|e| FetchError::Network {
        url: cfg.url.clone(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use crate::transform::TransformOptions;

    fn cfg(url: &str) -> LiveConfig {
        LiveConfig {
            url: url.to_string(),
            method: HttpMethod::Get,
            headers: BTreeMap::new(),
            body: None,
            timeout: Duration::from_millis(250),
            transform_options: TransformOptions::default(),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        // Reserved TEST-NET-1 address, nothing listens there.
        let err = fetch_payload(&cfg("http://192.0.2.1:9/telemetry"))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            FetchError::Network { .. } | FetchError::Timeout { .. }
        ));
    }

    #[test]
    fn errors_render_the_url() {
        let err = FetchError::Status {
            url: "https://api.example.com/t".to_string(),
            status: 503,
        };
        assert_eq!(
            err.to_string(),
            "request to https://api.example.com/t returned status 503"
        );
    }
}
