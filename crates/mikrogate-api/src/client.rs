// RouterOS REST HTTP client
//
// Wraps `reqwest::Client` with REST path construction, basic-auth
// injection, and error-body parsing. All endpoint modules (hotspot,
// ppp, system) are implemented as inherent methods via separate files
// to keep this module focused on transport mechanics.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{RestError, RosIdentity};
use crate::transport::TransportConfig;

/// Raw HTTP client for a router's REST API.
///
/// Handles `/rest/{path}` URL construction, per-request basic auth,
/// and the `{error, message, detail}` error body. Methods return
/// decoded payloads -- callers never see HTTP plumbing.
pub struct RouterClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: String,
    /// Request budget in whole seconds (rounded up), quoted in timeout
    /// errors so logs name the real limit.
    timeout_secs: u64,
}

impl RouterClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the router root (e.g. `https://192.168.88.1` or
    /// `http://10.0.0.1:8080`). No request is made here -- call
    /// [`login()`](Self::login) to verify credentials and reachability.
    pub fn new(
        base_url: Url,
        username: impl Into<String>,
        password: impl Into<String>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let timeout_secs = transport.timeout.as_secs()
            + u64::from(transport.timeout.subsec_nanos() > 0);
        Ok(Self {
            http,
            base_url,
            username: username.into(),
            password: password.into(),
            timeout_secs,
        })
    }

    /// The router base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Verify credentials and reachability with an identity fetch.
    ///
    /// REST auth is per-request, so "login" is a probe: a 401 here means
    /// bad credentials (configuration error), a transport error means the
    /// router is unreachable. Returns the router's identity name.
    pub async fn login(&self) -> Result<String, Error> {
        let identity: RosIdentity = self.get(self.rest_url("system/identity")?).await?;
        debug!(identity = %identity.name, "router identity verified");
        Ok(identity.name)
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Build a full URL for a REST path: `{base}/rest/{path}`
    pub(crate) fn rest_url(&self, path: &str) -> Result<Url, Error> {
        let full = format!(
            "{}/rest/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path
        );
        Ok(Url::parse(&full)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON payload.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.parse_response(resp).await
    }

    /// Send a PUT request (RouterOS "add") and decode the created object.
    pub(crate) async fn put<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        debug!("PUT {}", url);

        let resp = self
            .http
            .put(url)
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.parse_response(resp).await
    }

    /// Send a PATCH request (RouterOS "set") and decode the updated object.
    pub(crate) async fn patch<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        debug!("PATCH {}", url);

        let resp = self
            .http
            .patch(url)
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.parse_response(resp).await
    }

    /// Send a DELETE request (RouterOS "remove"). Success is an empty 204.
    pub(crate) async fn delete(&self, url: Url) -> Result<(), Error> {
        debug!("DELETE {}", url);

        let resp = self
            .http
            .delete(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        Err(Self::parse_error(status, resp).await)
    }

    /// Classify a reqwest failure: deadline expiry gets its own variant
    /// carrying the configured budget, everything else stays raw.
    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Transport(err)
        }
    }

    /// Decode a successful JSON body, or turn a failure status into a
    /// typed error.
    async fn parse_response<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();

        if !status.is_success() {
            return Err(Self::parse_error(status, resp).await);
        }

        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// Parse the `{error, message, detail}` body from a failed response.
    ///
    /// A 401 becomes [`Error::Authentication`]; anything else becomes
    /// [`Error::DeviceApi`], keeping the raw body as detail when the
    /// router sent something unstructured.
    async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        let body = resp.text().await.unwrap_or_default();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Error::Authentication {
                message: "invalid user name or password".into(),
            };
        }

        match serde_json::from_str::<RestError>(&body) {
            Ok(rest) => Error::DeviceApi {
                message: if rest.message.is_empty() {
                    status.to_string()
                } else {
                    rest.message
                },
                detail: rest.detail,
                status: rest.error,
            },
            Err(_) => Error::DeviceApi {
                message: status.to_string(),
                detail: (!body.is_empty()).then_some(body),
                status: status.as_u16(),
            },
        }
    }
}
