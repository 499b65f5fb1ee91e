//! High level calls over the certificate resource: paginated listing, detail
//! export, and the lazy loading of a record's sensitive fields.

use std::sync::Arc;

use anyhow::Context;
use slog::{Logger, crit, debug};

use crate::scm_client::{ScmClient, ScmRequest};
use crate::{ScmResult, SslCertificate, SslCertificateListPage};

/// The provider rejects list pages larger than this.
const MAX_PAGE_SIZE: i32 = 50;

/// Scm client for the certificate records
pub struct CertificateClient {
    scm_client: Arc<dyn ScmClient>,
    logger: Logger,
}

impl CertificateClient {
    /// Constructor
    pub(crate) fn new(scm_client: Arc<dyn ScmClient>, logger: Logger) -> Self {
        Self { scm_client, logger }
    }

    /// Fetch a page of certificate records, sorted by expiry time descending
    ///
    /// A `page_size` outside of `[1, 50]` is reset to 50 and a negative
    /// `offset` to 0 before the call is made. The returned records carry
    /// neither certificate body nor private key: use
    /// [ensure_details][Self::ensure_details] to populate them.
    pub async fn list(&self, page_size: i32, offset: i32) -> ScmResult<SslCertificateListPage> {
        let limit = if (1..=MAX_PAGE_SIZE).contains(&page_size) {
            page_size
        } else {
            MAX_PAGE_SIZE
        };
        let offset = offset.max(0);

        let response = self
            .scm_client
            .get_content(ScmRequest::ListCertificates { limit, offset })
            .await
            .with_context(|| "ScmClient can not get the certificate list")?;
        let page = serde_json::from_str::<SslCertificateListPage>(&response)
            .with_context(|| "ScmClient can not deserialize certificate list")?;

        Ok(page)
    }

    /// Export a single certificate record's full information, including the
    /// certificate body and the private key
    pub async fn get(&self, certificate_id: &str) -> ScmResult<SslCertificate> {
        let response = self
            .scm_client
            .post_content(ScmRequest::ExportCertificate {
                id: certificate_id.to_string(),
            })
            .await
            .with_context(|| {
                format!("ScmClient can not export the certificate '{certificate_id}'")
            })?;
        let mut certificate = serde_json::from_str::<SslCertificate>(&response).map_err(|e| {
            crit!(self.logger, "Could not create certificate from API message: {e}.");
            debug!(self.logger, "Certificate message = {response}");
            e
        })?;
        certificate.mark_details_loaded();

        Ok(certificate)
    }

    /// Populate the record's certificate body and private key, at most once
    /// per record instance
    ///
    /// A no-op when the details are already loaded. On failure the record is
    /// left unchanged and a later call is free to retry.
    pub async fn ensure_details(&self, certificate: &mut SslCertificate) -> ScmResult<()> {
        if certificate.details_loaded() {
            return Ok(());
        }

        let certificate_id = certificate.id().to_string();
        let full = self.get(&certificate_id).await.with_context(|| {
            format!("ScmClient can not load details of the certificate '{certificate_id}'")
        })?;
        certificate.load_details(full.certificate, full.private_key);

        Ok(())
    }

    /// The record's PEM-encoded certificate body, loading the details first
    /// when needed
    pub async fn certificate_body(&self, certificate: &mut SslCertificate) -> ScmResult<String> {
        self.ensure_details(certificate).await?;

        Ok(certificate.certificate_body().to_string())
    }

    /// The record's PEM-encoded private key, loading the details first when
    /// needed
    pub async fn private_key(&self, certificate: &mut SslCertificate) -> ScmResult<String> {
        self.ensure_details(certificate).await?;

        Ok(certificate.private_key().to_string())
    }

    /// The record's SHA-1 fingerprint, loading the details first when needed
    ///
    /// The fingerprint keeps the sentinel contract of
    /// [SslCertificate::fingerprint]: an undecodable body yields an empty
    /// string, not an error.
    pub async fn fingerprint(&self, certificate: &mut SslCertificate) -> ScmResult<String> {
        self.ensure_details(certificate).await?;

        Ok(certificate.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use mockall::predicate::eq;

    use crate::scm_client::{MockScmHttpClient, ScmClientError};
    use crate::test_utils;

    use super::*;

    fn build_client(scm_client: impl ScmClient + 'static) -> CertificateClient {
        CertificateClient::new(Arc::new(scm_client), test_utils::test_logger())
    }

    fn list_page_message(total_count: u64, ids: &[&str]) -> String {
        let page = SslCertificateListPage {
            certificates: ids
                .iter()
                .map(|id| {
                    let mut certificate = SslCertificate::dummy();
                    certificate.id = id.to_string();
                    certificate
                })
                .collect(),
            total_count,
        };
        serde_json::to_string(&page).unwrap()
    }

    fn exported_certificate_message(id: &str, certificate: &str, private_key: &str) -> String {
        let mut full = SslCertificate::dummy();
        full.id = id.to_string();
        full.certificate = certificate.to_string();
        full.private_key = private_key.to_string();
        serde_json::to_string(&full).unwrap()
    }

    #[tokio::test]
    async fn get_certificate_list() {
        let mut scm_client = MockScmHttpClient::new();
        scm_client
            .expect_get_content()
            .return_once(move |_| Ok(list_page_message(7, &["cert-id-123", "cert-id-456"])));
        let client = build_client(scm_client);

        let page = client.list(10, 0).await.unwrap();

        assert_eq!(7, page.total_count);
        assert_eq!(
            vec!["cert-id-123".to_string(), "cert-id-456".to_string()],
            page.certificates.iter().map(|c| c.id().to_string()).collect::<Vec<_>>()
        );
        for certificate in &page.certificates {
            assert_eq!("", certificate.certificate_body());
            assert_eq!("", certificate.private_key());
            assert!(!certificate.details_loaded());
        }
    }

    #[tokio::test]
    async fn get_certificate_empty_list() {
        let mut scm_client = MockScmHttpClient::new();
        scm_client
            .expect_get_content()
            .return_once(move |_| Ok(list_page_message(0, &[])));
        let client = build_client(scm_client);

        let page = client.list(50, 0).await.unwrap();

        assert!(page.certificates.is_empty());
        assert_eq!(0, page.total_count);
    }

    #[tokio::test]
    async fn list_resets_out_of_range_page_sizes_to_the_provider_maximum() {
        for page_size in [0, -5, 51, 1000] {
            let mut scm_client = MockScmHttpClient::new();
            scm_client
                .expect_get_content()
                .with(eq(ScmRequest::ListCertificates {
                    limit: 50,
                    offset: 0,
                }))
                .return_once(move |_| Ok(list_page_message(0, &[])))
                .times(1);
            let client = build_client(scm_client);

            client
                .list(page_size, 0)
                .await
                .unwrap_or_else(|_| panic!("list should succeed for page_size = {page_size}"));
        }
    }

    #[tokio::test]
    async fn list_keeps_in_range_page_sizes() {
        for page_size in [1, 25, 50] {
            let mut scm_client = MockScmHttpClient::new();
            scm_client
                .expect_get_content()
                .with(eq(ScmRequest::ListCertificates {
                    limit: page_size,
                    offset: 0,
                }))
                .return_once(move |_| Ok(list_page_message(0, &[])))
                .times(1);
            let client = build_client(scm_client);

            client
                .list(page_size, 0)
                .await
                .unwrap_or_else(|_| panic!("list should succeed for page_size = {page_size}"));
        }
    }

    #[tokio::test]
    async fn list_resets_negative_offsets_to_zero() {
        let mut scm_client = MockScmHttpClient::new();
        scm_client
            .expect_get_content()
            .with(eq(ScmRequest::ListCertificates {
                limit: 10,
                offset: 0,
            }))
            .return_once(move |_| Ok(list_page_message(0, &[])))
            .times(1);
        let client = build_client(scm_client);

        client.list(10, -42).await.expect("list should succeed");
    }

    #[tokio::test]
    async fn list_wraps_transport_errors() {
        let mut scm_client = MockScmHttpClient::new();
        scm_client
            .expect_get_content()
            .return_once(move |_| Err(ScmClientError::RemoteServerTechnical(anyhow!("an error"))));
        let client = build_client(scm_client);

        let error = client.list(10, 0).await.unwrap_err();

        assert!(error.to_string().contains("can not get the certificate list"));
    }

    #[tokio::test]
    async fn list_wraps_decode_errors() {
        let mut scm_client = MockScmHttpClient::new();
        scm_client
            .expect_get_content()
            .return_once(move |_| Ok("not a json".to_string()));
        let client = build_client(scm_client);

        let error = client.list(10, 0).await.unwrap_err();

        assert!(
            error.to_string().contains("can not deserialize certificate list"),
            "unexpected error: {error}"
        );
    }

    #[tokio::test]
    async fn get_certificate_detail_marks_the_record_details_loaded() {
        let mut scm_client = MockScmHttpClient::new();
        scm_client
            .expect_post_content()
            .with(eq(ScmRequest::ExportCertificate {
                id: "cert-id-123".to_string(),
            }))
            .return_once(move |_| {
                Ok(exported_certificate_message(
                    "cert-id-123",
                    "a certificate body",
                    "a private key",
                ))
            })
            .times(1);
        let client = build_client(scm_client);

        let certificate = client.get("cert-id-123").await.unwrap();

        assert!(certificate.details_loaded());
        assert_eq!("a certificate body", certificate.certificate_body());
        assert_eq!("a private key", certificate.private_key());
    }

    #[tokio::test]
    async fn get_certificate_detail_wraps_transport_errors() {
        let mut scm_client = MockScmHttpClient::new();
        scm_client
            .expect_post_content()
            .return_once(move |_| Err(ScmClientError::RemoteServerLogical(anyhow!("an error"))));
        let client = build_client(scm_client);

        let error = client.get("cert-id-123").await.unwrap_err();

        assert!(error.to_string().contains("can not export the certificate 'cert-id-123'"));
    }

    #[tokio::test]
    async fn ensure_details_issues_at_most_one_call_per_record() {
        let mut scm_client = MockScmHttpClient::new();
        scm_client
            .expect_post_content()
            .return_once(move |_| {
                Ok(exported_certificate_message(
                    "cert-id-123",
                    "a certificate body",
                    "a private key",
                ))
            })
            .times(1);
        let client = build_client(scm_client);
        let mut certificate = SslCertificate::dummy();
        certificate.id = "cert-id-123".to_string();

        client.ensure_details(&mut certificate).await.unwrap();
        client.ensure_details(&mut certificate).await.unwrap();

        assert!(certificate.details_loaded());
        assert_eq!("a certificate body", certificate.certificate_body());
        assert_eq!("a private key", certificate.private_key());
    }

    #[tokio::test]
    async fn ensure_details_leaves_the_record_unchanged_on_failure_and_can_be_retried() {
        let mut scm_client = MockScmHttpClient::new();
        let mut sequence = mockall::Sequence::new();
        scm_client
            .expect_post_content()
            .times(1)
            .in_sequence(&mut sequence)
            .return_once(move |_| Err(ScmClientError::RemoteServerTechnical(anyhow!("an error"))));
        scm_client
            .expect_post_content()
            .times(1)
            .in_sequence(&mut sequence)
            .return_once(move |_| {
                Ok(exported_certificate_message(
                    "cert-id-123",
                    "a certificate body",
                    "a private key",
                ))
            });
        let client = build_client(scm_client);
        let mut certificate = SslCertificate::dummy();
        certificate.id = "cert-id-123".to_string();

        client
            .ensure_details(&mut certificate)
            .await
            .expect_err("the first load should fail");
        assert!(!certificate.details_loaded());
        assert_eq!("", certificate.certificate_body());

        client
            .ensure_details(&mut certificate)
            .await
            .expect("the retry should succeed");
        assert!(certificate.details_loaded());
    }

    #[tokio::test]
    async fn lazy_accessors_load_the_details_once_then_read_from_the_record() {
        let mut scm_client = MockScmHttpClient::new();
        scm_client
            .expect_post_content()
            .return_once(move |_| {
                Ok(exported_certificate_message(
                    "cert-id-123",
                    "a certificate body",
                    "a private key",
                ))
            })
            .times(1);
        let client = build_client(scm_client);
        let mut certificate = SslCertificate::dummy();
        certificate.id = "cert-id-123".to_string();

        assert_eq!(
            "a certificate body",
            client.certificate_body(&mut certificate).await.unwrap()
        );
        assert_eq!("a private key", client.private_key(&mut certificate).await.unwrap());
    }

    #[tokio::test]
    async fn fingerprint_loads_the_details_then_hashes_the_certificate_body() {
        let mut scm_client = MockScmHttpClient::new();
        scm_client
            .expect_post_content()
            .return_once(move |_| {
                Ok(exported_certificate_message(
                    "cert-id-123",
                    "not a pem block",
                    "a private key",
                ))
            })
            .times(1);
        let client = build_client(scm_client);
        let mut certificate = SslCertificate::dummy();
        certificate.id = "cert-id-123".to_string();

        // Undecodable body: the sentinel empty fingerprint, not an error.
        assert_eq!("", client.fingerprint(&mut certificate).await.unwrap());
        assert!(certificate.details_loaded());
    }
}
