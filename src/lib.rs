#![warn(missing_docs)]

//! Define everything necessary to list and export SSL certificate records from
//! a cloud provider's SSL Certificate Manager (SCM) API.
//!
//! To request the SCM endpoint use the [ScmHttpClient] that implements the
//! [ScmClient] trait.
//!
//! To list certificate records, export a single record's detail (certificate
//! body + private key), or compute a record's fingerprint, use the
//! [CertificateClient].
//!
//! Most of the time, the [ClientBuilder] is the simplest way to get a working
//! [Client]:
//!
//! ```no_run
//! use scm_client::ClientBuilder;
//!
//! #[tokio::main]
//! async fn main() -> scm_client::ScmResult<()> {
//!     let client = ClientBuilder::endpoint("https://scm.example.com/v3/").build()?;
//!     let page = client.certificate().list(50, 0).await?;
//!
//!     for mut certificate in page.certificates {
//!         let fingerprint = client.certificate().fingerprint(&mut certificate).await?;
//!         println!("{} {fingerprint}", certificate.id);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod certificate_client;
mod client;
mod entities;
mod scm_client;

pub use certificate_client::CertificateClient;
pub use client::{Client, ClientBuilder};
pub use entities::{ScmApiError, SslCertificate, SslCertificateListPage};
pub use scm_client::{ScmClient, ScmClientError, ScmHttpClient, ScmRequest};

/// Scm client result type, an alias of [anyhow::Result]
pub type ScmResult<T> = anyhow::Result<T>;

/// Scm client error type, an alias of [anyhow::Error]
pub type ScmError = anyhow::Error;
