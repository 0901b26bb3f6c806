//! Transport boundary: turns [`ClientOptions`] into a `reqwest::Client`
//! and a [`CallRequest`] into one executed attempt.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::multipart;

use crate::{Body, CallError, CallRequest, ClientOptions, Result};

/// Builds the shared HTTP client for one drain.
///
/// A failure here (unreadable TLS material, invalid PEM) terminalizes the
/// whole queue; the caller turns the error into per-id results.
pub(crate) fn build_http_client(options: &ClientOptions) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(options.connect_timeout_secs));

    if !options.user_agent.is_empty() {
        builder = builder.user_agent(options.user_agent.clone());
    }

    let tls = &options.tls;
    if let Some(path) = &tls.ca_path {
        let pem = read_pem(path)?;
        let certificate = reqwest::Certificate::from_pem(&pem).map_err(|err| {
            CallError::Init(format!("invalid CA bundle {}: {err}", path.display()))
        })?;
        builder = builder.add_root_certificate(certificate);
    }
    if let Some(cert_path) = &tls.cert_path {
        let mut pem = read_pem(cert_path)?;
        if let Some(key_path) = &tls.key_path {
            pem.extend(read_pem(key_path)?);
        }
        let identity = reqwest::Identity::from_pem(&pem).map_err(|err| {
            CallError::Init(format!(
                "invalid client identity {}: {err}",
                cert_path.display()
            ))
        })?;
        builder = builder.identity(identity);
    }
    // rustls ties hostname checks to peer verification; verify_host = 0
    // therefore folds into disabling certificate verification.
    if !tls.verify_peer || tls.verify_host == 0 {
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|err| CallError::Init(format!("could not build HTTP client: {err}")))
}

fn read_pem(path: &PathBuf) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| CallError::File {
        path: path.display().to_string(),
        source,
    })
}

/// Runs a single attempt and returns the raw `(status, body)` outcome.
///
/// Any HTTP status is an `Ok`; `Err` means no response was received.
pub(crate) async fn send_request(
    http: &reqwest::Client,
    request: &CallRequest,
    options: &ClientOptions,
) -> Result<(u16, String)> {
    let url = reqwest::Url::parse(&request.url)
        .map_err(|err| CallError::Init(format!("invalid url {}: {err}", request.url)))?;
    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .map_err(|_| CallError::Init(format!("invalid method {}", request.method)))?;

    let mut headers = merged_headers(options, request);
    let mut builder = http
        .request(method, url)
        .timeout(total_timeout(request, options));

    match &request.body {
        Body::None => {}
        Body::UrlEncoded(pairs) => {
            if matches!(request.method.as_str(), "GET" | "HEAD") {
                builder = builder.query(pairs);
            } else {
                builder = builder.form(pairs);
                // Forced: a caller-supplied Content-Type must not survive a
                // form body.
                headers.insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                );
            }
        }
        Body::Json(value) => {
            builder = builder.json(value);
        }
        Body::Multipart { fields, files } => {
            // The boundary-bearing content type comes from reqwest.
            headers.remove(CONTENT_TYPE);
            builder = builder.multipart(build_multipart(fields, files).await?);
        }
        Body::Raw {
            content_type,
            bytes,
        } => {
            builder = builder.body(bytes.clone());
            if let Ok(value) = HeaderValue::from_str(content_type) {
                headers.insert(CONTENT_TYPE, value);
            }
        }
    }

    let response = builder
        .headers(headers)
        .send()
        .await
        .map_err(CallError::Transport)?;
    let status = response.status().as_u16();
    let body = response.text().await.map_err(CallError::Transport)?;
    Ok((status, body))
}

/// Merges default and request headers, request values winning, last write
/// wins per key. Names or values the header grammar rejects are dropped.
fn merged_headers(options: &ClientOptions, request: &CallRequest) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let pairs = options.default_headers.iter().chain(request.headers.iter());
    for (name, value) in pairs {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            #[cfg(feature = "tracing")]
            tracing::debug!("dropping header with invalid name {name:?}");
            continue;
        };
        let Ok(value) = HeaderValue::from_str(value) else {
            #[cfg(feature = "tracing")]
            tracing::debug!("dropping header {name} with invalid value");
            continue;
        };
        headers.insert(name, value);
    }
    headers
}

fn total_timeout(request: &CallRequest, options: &ClientOptions) -> Duration {
    for (key, value) in &request.options {
        if key == "timeout_ms" {
            if let Ok(ms) = value.parse::<u64>() {
                return Duration::from_millis(ms.max(1));
            }
        }
    }
    Duration::from_secs(options.total_timeout_secs)
}

async fn build_multipart(
    fields: &[(String, String)],
    files: &[(String, String)],
) -> Result<multipart::Form> {
    let mut form = multipart::Form::new();
    for (name, value) in fields {
        form = form.text(name.clone(), value.clone());
    }
    for (name, path) in files {
        let bytes = tokio::fs::read(path).await.map_err(|source| CallError::File {
            path: path.clone(),
            source,
        })?;
        let file_name = Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        form = form.part(name.clone(), multipart::Part::bytes(bytes).file_name(file_name));
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::{merged_headers, total_timeout};
    use crate::{CallRequest, ClientOptions};

    #[test]
    fn request_headers_win_over_defaults() {
        let mut options = ClientOptions::default();
        options.default_headers = vec![
            ("x-tenant".to_owned(), "one".to_owned()),
            ("x-env".to_owned(), "staging".to_owned()),
        ];
        let request = CallRequest::new("a", "http://localhost/", "GET").with_headers(vec![
            ("X-Tenant".to_owned(), "two".to_owned()),
            ("X-Tenant".to_owned(), "three".to_owned()),
        ]);

        let headers = merged_headers(&options, &request);
        assert_eq!(headers.get("x-tenant").unwrap(), "three");
        assert_eq!(headers.get("x-env").unwrap(), "staging");
    }

    #[test]
    fn invalid_header_names_are_dropped() {
        let request = CallRequest::new("a", "http://localhost/", "GET").with_headers(vec![
            ("bad name".to_owned(), "v".to_owned()),
            ("good".to_owned(), "v".to_owned()),
        ]);
        let headers = merged_headers(&ClientOptions::default(), &request);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("good"));
    }

    #[test]
    fn timeout_ms_option_overrides_the_configured_total() {
        let options = ClientOptions::default();
        let request = CallRequest::new("a", "http://localhost/", "GET")
            .with_options(vec![("timeout_ms".to_owned(), "250".to_owned())]);
        assert_eq!(total_timeout(&request, &options).as_millis(), 250);
    }

    #[test]
    fn unparseable_timeout_option_falls_back() {
        let options = ClientOptions::default();
        let request = CallRequest::new("a", "http://localhost/", "GET")
            .with_options(vec![("timeout_ms".to_owned(), "soon".to_owned())]);
        assert_eq!(
            total_timeout(&request, &options).as_secs(),
            options.total_timeout_secs
        );
    }
}
