//! Mechanisms to exchange data with an SCM endpoint.
//!
//! The [ScmClient] trait abstracts how the communication with the provider's
//! SSL Certificate Manager is done.
//! The clients that need to communicate only need to define their request using
//! the [ScmRequest] enum.
//!
//! An implementation using HTTP is available: [ScmHttpClient].

use std::collections::HashMap;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Response, StatusCode, Url};
use slog::{Logger, debug};
use thiserror::Error;

use crate::entities::ScmApiError;
use crate::{ScmError, ScmResult};

/// Error tied with the Scm client
#[derive(Error, Debug)]
pub enum ScmClientError {
    /// Error raised when querying the SCM endpoint returned a 5XX error.
    #[error("Internal error of the SCM endpoint")]
    RemoteServerTechnical(#[source] ScmError),

    /// Error raised when querying the SCM endpoint returned a 4XX error.
    #[error("Invalid request to the SCM endpoint")]
    RemoteServerLogical(#[source] ScmError),

    /// HTTP subsystem error
    #[error("HTTP subsystem error")]
    SubsystemError(#[source] ScmError),
}

/// What can be read from an [ScmClient].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ScmRequest {
    /// Lists the provider [certificates][crate::SslCertificate]
    ///
    /// The provider sorts by certificate expiry time, descending. `limit` and
    /// `offset` are sent verbatim: callers are expected to clamp them to the
    /// range the provider accepts (see
    /// [CertificateClient::list][crate::CertificateClient::list]).
    ListCertificates {
        /// Maximum number of records in the returned page
        limit: i32,
        /// Number of records to skip
        offset: i32,
    },
    /// Export a specific [certificate][crate::SslCertificate] with its
    /// certificate body and private key
    ExportCertificate {
        /// Id of the certificate to export
        id: String,
    },
}

impl ScmRequest {
    /// Get the request route relative to the SCM root endpoint.
    pub fn route(&self) -> String {
        match self {
            ScmRequest::ListCertificates { limit, offset } => {
                format!(
                    "scm/certificates?limit={limit}&offset={offset}&sort_key=certExpiredTime&sort_dir=DESC"
                )
            }
            ScmRequest::ExportCertificate { id } => {
                format!("scm/certificates/{id}/export")
            }
        }
    }

    /// Get the request body to send to the SCM endpoint
    ///
    /// The export call is a POST without parameters, so there is currently no
    /// request carrying a body.
    pub fn get_body(&self) -> Option<String> {
        None
    }
}

/// API that defines a client for the SCM endpoint
#[async_trait]
pub trait ScmClient: Sync + Send {
    /// Get the content back from the SCM endpoint
    async fn get_content(&self, request: ScmRequest) -> Result<String, ScmClientError>;

    /// Post information to the SCM endpoint
    async fn post_content(&self, request: ScmRequest) -> Result<String, ScmClientError>;
}

/// Responsible for HTTP transport against the SCM endpoint.
///
/// Authentication is not handled at this level: the enclosing deployment owns
/// the provider session and injects whatever auth headers it needs through the
/// custom headers.
pub struct ScmHttpClient {
    http_client: reqwest::Client,
    scm_endpoint: Url,
    logger: Logger,
    http_headers: HeaderMap,
}

impl ScmHttpClient {
    /// Constructs a new `ScmHttpClient`
    pub fn new(
        scm_endpoint: Url,
        logger: Logger,
        custom_headers: Option<HashMap<String, String>>,
    ) -> ScmResult<Self> {
        let http_client = reqwest::ClientBuilder::new()
            .build()
            .with_context(|| "Building http client for Scm client failed")?;

        // Trailing slash is significant because url::join
        // (https://docs.rs/url/latest/url/struct.Url.html#method.join) will remove
        // the 'path' part of the url if it doesn't end with a trailing slash.
        let scm_endpoint = if scm_endpoint.as_str().ends_with('/') {
            scm_endpoint
        } else {
            let mut url = scm_endpoint.clone();
            url.set_path(&format!("{}/", scm_endpoint.path()));
            url
        };

        let mut http_headers = HeaderMap::new();
        if let Some(headers) = custom_headers {
            for (key, value) in headers.iter() {
                http_headers.insert(
                    HeaderName::from_bytes(key.as_bytes())?,
                    HeaderValue::from_str(value)?,
                );
            }
        }

        Ok(Self {
            http_client,
            scm_endpoint,
            logger,
            http_headers,
        })
    }

    /// Perform a HTTP GET request on the SCM endpoint and return the response
    async fn get(&self, url: Url) -> Result<Response, ScmClientError> {
        debug!(self.logger, "GET url='{url}'.");
        let request_builder = self.http_client.get(url.clone()).headers(self.http_headers.clone());

        let response = request_builder.send().await.map_err(|e| {
            ScmClientError::SubsystemError(anyhow!(e).context(format!(
                "Cannot perform a GET against the SCM HTTP endpoint (url='{url}')"
            )))
        })?;

        match response.status() {
            StatusCode::OK => Ok(response),
            StatusCode::NOT_FOUND => Err(Self::not_found_error(url)),
            status_code if status_code.is_client_error() => {
                Err(Self::remote_logical_error(response).await)
            }
            _ => Err(Self::remote_technical_error(response).await),
        }
    }

    async fn post(&self, url: Url, json: &str) -> Result<Response, ScmClientError> {
        debug!(self.logger, "POST url='{url}'"; "json" => json);
        let request_builder = self
            .http_client
            .post(url.clone())
            .body(json.to_owned())
            .headers(self.http_headers.clone());

        let response = request_builder.send().await.map_err(|e| {
            ScmClientError::SubsystemError(
                anyhow!(e).context(format!("Error while POSTing data '{json}' to URL='{url}'.")),
            )
        })?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(response),
            StatusCode::NOT_FOUND => Err(Self::not_found_error(url)),
            status_code if status_code.is_client_error() => {
                Err(Self::remote_logical_error(response).await)
            }
            _ => Err(Self::remote_technical_error(response).await),
        }
    }

    fn get_url_for_route(&self, endpoint: &str) -> Result<Url, ScmClientError> {
        self.scm_endpoint
            .join(endpoint)
            .with_context(|| {
                format!(
                    "Invalid url when joining given endpoint, '{endpoint}', to SCM url '{}'",
                    self.scm_endpoint
                )
            })
            .map_err(ScmClientError::SubsystemError)
    }

    fn not_found_error(url: Url) -> ScmClientError {
        ScmClientError::RemoteServerLogical(anyhow!("Url='{url}' not found"))
    }

    async fn remote_logical_error(response: Response) -> ScmClientError {
        let status_code = response.status();
        let api_error = response
            .json::<ScmApiError>()
            .await
            .unwrap_or(ScmApiError::new(
                format!("Unhandled error {status_code}"),
                "",
            ));

        ScmClientError::RemoteServerLogical(anyhow!("{api_error}"))
    }

    async fn remote_technical_error(response: Response) -> ScmClientError {
        let status_code = response.status();
        let api_error = response
            .json::<ScmApiError>()
            .await
            .unwrap_or(ScmApiError::new(
                format!("Unhandled error {status_code}"),
                "",
            ));

        ScmClientError::RemoteServerTechnical(anyhow!("{api_error}"))
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
impl ScmClient for ScmHttpClient {
    async fn get_content(&self, request: ScmRequest) -> Result<String, ScmClientError> {
        let response = self.get(self.get_url_for_route(&request.route())?).await?;
        let content = format!("{response:?}");

        response.text().await.map_err(|e| {
            ScmClientError::SubsystemError(
                anyhow!(e)
                    .context(format!("Could not find a JSON body in the response '{content}'.")),
            )
        })
    }

    async fn post_content(&self, request: ScmRequest) -> Result<String, ScmClientError> {
        let response = self
            .post(
                self.get_url_for_route(&request.route())?,
                &request.get_body().unwrap_or_default(),
            )
            .await?;

        response.text().await.map_err(|e| {
            ScmClientError::SubsystemError(
                anyhow!(e).context("Could not find a text body in the response."),
            )
        })
    }
}
