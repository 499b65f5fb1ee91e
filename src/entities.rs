//! Entities returned by the SCM endpoint.

use std::fmt::{Display, Formatter};

use chrono::{Months, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Format of the `expire_time` field, no timezone indicator.
const EXPIRE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Raw provider status of a hosted ("uploaded") certificate.
const STATUS_UPLOAD: &str = "UPLOAD";

/// SslCertificate represents one provider-side SSL certificate resource.
///
/// The record is created by deserializing a list or an export response. The
/// list payload omits `certificate` and `private_key`: those are populated at
/// most once per instance through
/// [CertificateClient::ensure_details][crate::CertificateClient::ensure_details].
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SslCertificate {
    /// Certificate id, unique per provider account
    pub id: String,

    /// Certificate display name
    pub name: String,

    /// Domain the certificate is bound to
    pub domain: String,

    /// Subject Alternative Name extension, raw provider-specific encoding
    pub sans: String,

    /// Signature algorithm of the certificate
    pub signature_algorithm: String,

    /// Certificate type (provider-defined values, e.g. `DV_SSL_CERT`,
    /// `EV_SSL_CERT`, `OV_SSL_CERT_PRO`), not locally validated
    #[serde(rename = "type")]
    pub certificate_type: String,

    /// Certificate brand (provider-defined values, e.g. `GLOBALSIGN`, `CFCA`)
    pub brand: String,

    /// Expiry time of the certificate, formatted as `YYYY-MM-DD HH:MM:SS`
    pub expire_time: String,

    /// Domain type (provider-defined values: `SINGLE_DOMAIN`, `WILDCARD`,
    /// `MULTI_DOMAIN`)
    pub domain_type: String,

    /// Validity period of the certificate, in months
    pub validity_period: u32,

    /// Raw provider lifecycle status (e.g. `PAID`, `ISSUED`, `CHECKING`,
    /// `EXPIRED`, `REVOKED`, `UPLOAD`), not locally validated
    pub status: String,

    /// Number of domains bound to the certificate
    pub domain_count: u32,

    /// Number of wildcard domains bound to the certificate
    pub wildcard_count: u32,

    /// Certificate description
    pub description: String,

    /// Enterprise project id, `"0"` for the default project
    pub enterprise_project_id: String,

    /// PEM-encoded certificate body, populated by the export call only
    pub certificate: String,

    /// PEM-encoded private key, populated by the export call only
    pub private_key: String,

    #[serde(skip)]
    details_loaded: bool,
}

impl SslCertificate {
    /// Certificate id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Global id of the certificate record
    ///
    /// The provider has no separate global namespace, so this is the [id][Self::id].
    pub fn global_id(&self) -> &str {
        &self.id
    }

    /// Certificate display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw Subject Alternative Name field
    pub fn sans(&self) -> &str {
        &self.sans
    }

    /// Common name of the certificate, the bound domain
    pub fn common_name(&self) -> &str {
        &self.domain
    }

    /// Issuer of the certificate, the provider-side brand
    pub fn issuer(&self) -> &str {
        &self.brand
    }

    /// Province of the certificate subject, not supplied by the provider
    pub fn province(&self) -> &str {
        ""
    }

    /// Country of the certificate subject, not supplied by the provider
    pub fn country(&self) -> &str {
        ""
    }

    /// City of the certificate subject, not supplied by the provider
    pub fn city(&self) -> &str {
        ""
    }

    /// Organization name of the certificate subject, not supplied by the provider
    pub fn org_name(&self) -> &str {
        ""
    }

    /// End of the validity window
    ///
    /// An unparsable `expire_time` silently yields the Unix epoch: callers must
    /// tolerate this degraded value.
    pub fn end_date(&self) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&self.expire_time, EXPIRE_TIME_FORMAT).unwrap_or_default()
    }

    /// Start of the validity window, computed as
    /// [end_date][Self::end_date] minus [validity_period][Self::validity_period] months
    ///
    /// When the expiry date could not be parsed this is the epoch minus
    /// `validity_period` months, the same degraded value contract as
    /// [end_date][Self::end_date].
    pub fn start_date(&self) -> NaiveDateTime {
        self.end_date()
            .checked_sub_months(Months::new(self.validity_period))
            .unwrap_or_default()
    }

    /// Tell if the certificate validity window is over
    pub fn is_expired(&self) -> bool {
        Utc::now().naive_utc() > self.end_date()
    }

    /// Status derived from the validity window: `"expired"` or `"normal"`
    ///
    /// This is distinct from the raw provider lifecycle state, which stays
    /// readable through the [status][Self::status] field.
    pub fn certificate_status(&self) -> &str {
        if self.is_expired() { "expired" } else { "normal" }
    }

    /// Tell if the certificate is hosted by the provider without having been
    /// issued by it (raw status exactly `UPLOAD`)
    pub fn is_upload(&self) -> bool {
        self.status == STATUS_UPLOAD
    }

    /// Tell if [certificate][Self::certificate] and
    /// [private_key][Self::private_key] have been populated
    pub fn details_loaded(&self) -> bool {
        self.details_loaded
    }

    /// PEM-encoded certificate body, empty until the details are loaded
    pub fn certificate_body(&self) -> &str {
        &self.certificate
    }

    /// PEM-encoded private key, empty until the details are loaded
    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// SHA-1 fingerprint of the certificate body: uppercase hex over the raw
    /// DER bytes, two characters per byte, no separator
    ///
    /// An empty or undecodable body yields an empty string, never an error. A
    /// decodable PEM block whose payload is not an X.509 certificate is still
    /// hashed as-is.
    pub fn fingerprint(&self) -> String {
        match pem::parse(self.certificate.as_bytes()) {
            Ok(block) => {
                let mut hasher = Sha1::new();
                hasher.update(block.contents());
                hex::encode_upper(hasher.finalize())
            }
            Err(_) => String::new(),
        }
    }

    pub(crate) fn load_details(&mut self, certificate: String, private_key: String) {
        self.certificate = certificate;
        self.private_key = private_key;
        self.details_loaded = true;
    }

    pub(crate) fn mark_details_loaded(&mut self) {
        self.details_loaded = true;
    }

    /// Return a dummy test entity (test-only).
    pub fn dummy() -> Self {
        Self {
            id: "scs1700000000000".to_string(),
            name: "dummy-certificate".to_string(),
            domain: "dummy.example.com".to_string(),
            sans: "dummy.example.com,www.dummy.example.com".to_string(),
            signature_algorithm: "SHA256WITHRSA".to_string(),
            certificate_type: "DV_SSL_CERT".to_string(),
            brand: "GLOBALSIGN".to_string(),
            expire_time: "2030-01-01 00:00:00".to_string(),
            domain_type: "MULTI_DOMAIN".to_string(),
            validity_period: 12,
            status: "ISSUED".to_string(),
            domain_count: 2,
            wildcard_count: 0,
            description: "a dummy certificate".to_string(),
            enterprise_project_id: "0".to_string(),
            certificate: "".to_string(),
            private_key: "".to_string(),
            details_loaded: false,
        }
    }
}

/// One page of the certificate list, with the account-wide record count
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SslCertificateListPage {
    /// Certificate records of the page, without certificate body nor private key
    pub certificates: Vec<SslCertificate>,

    /// Total number of records on the provider account, 0 when absent
    pub total_count: u64,
}

/// Representation of an error body raised by the SCM endpoint
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScmApiError {
    /// provider error code
    pub error_code: String,

    /// provider error message
    pub error_msg: String,
}

impl ScmApiError {
    /// ScmApiError factory
    pub fn new<C: Into<String>, M: Into<String>>(error_code: C, error_msg: M) -> ScmApiError {
        ScmApiError {
            error_code: error_code.into(),
            error_msg: error_msg.into(),
        }
    }
}

impl Display for ScmApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code, self.error_msg)
    }
}
