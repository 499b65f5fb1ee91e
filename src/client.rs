//! Client facade and its builder.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use reqwest::Url;
use slog::{Logger, o};

use crate::certificate_client::CertificateClient;
use crate::scm_client::{ScmClient, ScmHttpClient};
use crate::ScmResult;

/// Structure that aggregates the available clients for the SCM resources.
///
/// Use the [ClientBuilder] to instantiate it easily.
pub struct Client {
    certificate_client: Arc<CertificateClient>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Get the client that fetches certificate records.
    pub fn certificate(&self) -> Arc<CertificateClient> {
        self.certificate_client.clone()
    }
}

/// Builder that can be used to create a [Client] easily or with custom dependencies.
pub struct ClientBuilder {
    scm_endpoint: Option<String>,
    scm_client: Option<Arc<dyn ScmClient>>,
    logger: Option<Logger>,
    custom_headers: Option<HashMap<String, String>>,
}

impl ClientBuilder {
    /// Construct a new [ClientBuilder] that fetches data from the SCM endpoint
    /// at the given url.
    pub fn endpoint(url: &str) -> ClientBuilder {
        Self {
            scm_endpoint: Some(url.to_string()),
            scm_client: None,
            logger: None,
            custom_headers: None,
        }
    }

    /// Construct a new [ClientBuilder] without any dependency set.
    ///
    /// Use [ClientBuilder::endpoint] if you don't need to set a custom
    /// [ScmClient] to request data from the SCM endpoint.
    pub fn new() -> ClientBuilder {
        Self {
            scm_endpoint: None,
            scm_client: None,
            logger: None,
            custom_headers: None,
        }
    }

    /// Returns a [Client] that uses the dependencies provided to the [ClientBuilder].
    ///
    /// For missing dependencies the builder will try to create them using
    /// default implementations if possible.
    pub fn build(self) -> ScmResult<Client> {
        let logger = match self.logger {
            Some(logger) => logger,
            None => Logger::root(slog::Discard, o!()),
        };

        let scm_client = match self.scm_client {
            None => {
                let url = self.scm_endpoint.ok_or(anyhow!(
                    "No SCM endpoint found: \
                    You must either provide an endpoint url or your own ScmClient implementation"
                ))?;
                let url =
                    Url::parse(&url).with_context(|| format!("Invalid SCM endpoint URL: '{url}'"))?;

                Arc::new(
                    ScmHttpClient::new(url, logger.clone(), self.custom_headers)
                        .with_context(|| "Building SCM client failed")?,
                ) as Arc<dyn ScmClient>
            }
            Some(client) => client,
        };

        let certificate_client = Arc::new(CertificateClient::new(scm_client, logger));

        Ok(Client { certificate_client })
    }

    /// Set the [ScmClient] that will be used to request data from the SCM endpoint.
    pub fn with_scm_client(mut self, scm_client: Arc<dyn ScmClient>) -> ClientBuilder {
        self.scm_client = Some(scm_client);
        self
    }

    /// Set the [Logger] to use.
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Set custom headers sent with every request, typically the provider auth
    /// headers owned by the enclosing session.
    pub fn with_custom_headers(mut self, custom_headers: HashMap<String, String>) -> Self {
        self.custom_headers = Some(custom_headers);
        self
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
