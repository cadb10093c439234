// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Self-signed certificate generation.
//!
//! The edge service terminates TLS with a self-signed certificate for the
//! configured domain. The subject is fixed apart from the common name, and
//! validity runs from the moment of generation for exactly the requested
//! number of days.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use chrono::Utc;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName, SubjectKeyIdentifier,
};
use openssl::x509::{X509, X509NameBuilder};
use thiserror::Error;
use tracing::info;

/// Certificate file name inside the certificate directory.
pub const CERT_FILE: &str = "wpstack.crt";

/// Private key file name inside the certificate directory.
pub const KEY_FILE: &str = "wpstack.key";

/// Fixed subject fields, in order.
const SUBJECT: [(Nid, &str); 5] = [
    (Nid::COUNTRYNAME, "FR"),
    (Nid::STATEORPROVINCENAME, "Ile-de-France"),
    (Nid::LOCALITYNAME, "Paris"),
    (Nid::ORGANIZATIONNAME, "wpstack"),
    (Nid::ORGANIZATIONALUNITNAME, "edge"),
];

const SECONDS_PER_DAY: i64 = 86_400;

/// Errors from certificate operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CertError {
    /// OpenSSL rejected an operation.
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] ErrorStack),

    /// The request cannot be satisfied.
    #[error("Invalid certificate request: {0}")]
    InvalidRequest(&'static str),

    /// The certificate has no common name.
    #[error("Certificate has no common name")]
    MissingCommonName,

    /// Reading or writing certificate material failed.
    #[error("Certificate I/O error on {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Result type for certificate operations.
pub type Result<T> = std::result::Result<T, CertError>;

/// What to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    /// Subject common name, also the single DNS subject alternative name.
    pub common_name: String,
    /// Validity in days.
    pub days: u32,
    /// RSA modulus size.
    pub key_bits: u32,
}

impl CertificateRequest {
    /// A 2048-bit, 365-day request for `common_name`.
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            days: 365,
            key_bits: 2048,
        }
    }
}

/// PEM-encoded certificate and private key.
#[derive(Clone)]
pub struct CertificatePair {
    /// Certificate, PEM.
    pub certificate_pem: Vec<u8>,
    /// PKCS#8 private key, PEM.
    pub private_key_pem: Vec<u8>,
}

impl fmt::Debug for CertificatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificatePair")
            .field("certificate_pem", &String::from_utf8_lossy(&self.certificate_pem))
            .field("private_key_pem", &"<redacted>")
            .finish()
    }
}

/// Facts read back from a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Subject common name.
    pub common_name: String,
    /// Public key size in bits.
    pub key_bits: u32,
    /// Length of the validity period.
    pub validity: chrono::Duration,
    /// Whole days until expiry, negative once expired.
    pub days_remaining: i32,
}

/// Generate a key pair and a self-signed certificate.
pub fn generate(request: &CertificateRequest) -> Result<CertificatePair> {
    if request.common_name.is_empty() {
        return Err(CertError::InvalidRequest("empty common name"));
    }
    if request.days == 0 {
        return Err(CertError::InvalidRequest("zero-day validity"));
    }
    if request.key_bits < 2048 {
        return Err(CertError::InvalidRequest("keys shorter than 2048 bits"));
    }

    let key = PKey::from_rsa(Rsa::generate(request.key_bits)?)?;

    let mut name = X509NameBuilder::new()?;
    for (nid, value) in SUBJECT {
        name.append_entry_by_nid(nid, value)?;
    }
    name.append_entry_by_nid(Nid::COMMONNAME, &request.common_name)?;
    let name = name.build();

    // 159 random bits keep the serial positive and within 20 octets.
    let mut serial = BigNum::new()?;
    serial.rand(159, MsbOption::MAYBE_ZERO, false)?;

    let now = Utc::now().timestamp();
    let not_before = Asn1Time::from_unix(now)?;
    let not_after = Asn1Time::from_unix(now + i64::from(request.days) * SECONDS_PER_DAY)?;

    let mut builder = X509::builder()?;
    builder.set_version(2)?;
    let serial = serial.to_asn1_integer()?;
    builder.set_serial_number(&serial)?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_pubkey(&key)?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;

    builder.append_extension(BasicConstraints::new().critical().build()?)?;
    builder.append_extension(
        KeyUsage::new()
            .critical()
            .digital_signature()
            .key_encipherment()
            .build()?,
    )?;
    builder.append_extension(ExtendedKeyUsage::new().server_auth().build()?)?;
    let san = SubjectAlternativeName::new()
        .dns(&request.common_name)
        .build(&builder.x509v3_context(None, None))?;
    builder.append_extension(san)?;
    let ski = SubjectKeyIdentifier::new().build(&builder.x509v3_context(None, None))?;
    builder.append_extension(ski)?;

    builder.sign(&key, MessageDigest::sha256())?;
    let certificate = builder.build();

    Ok(CertificatePair {
        certificate_pem: certificate.to_pem()?,
        private_key_pem: key.private_key_to_pem_pkcs8()?,
    })
}

/// Read back the facts of a PEM certificate.
pub fn inspect(certificate_pem: &[u8]) -> Result<CertificateInfo> {
    let certificate = X509::from_pem(certificate_pem)?;

    let common_name = certificate
        .subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .ok_or(CertError::MissingCommonName)?
        .data()
        .as_utf8()?
        .to_string();

    let key_bits = certificate.public_key()?.bits();

    let span = certificate.not_before().diff(certificate.not_after())?;
    let validity = chrono::Duration::days(i64::from(span.days))
        + chrono::Duration::seconds(i64::from(span.secs));

    let remaining = Asn1Time::days_from_now(0)?.diff(certificate.not_after())?;

    Ok(CertificateInfo {
        common_name,
        key_bits,
        validity,
        days_remaining: remaining.days,
    })
}

/// Paths of the certificate and key inside `dir`.
pub fn pair_paths(dir: &Path) -> (PathBuf, PathBuf) {
    (dir.join(CERT_FILE), dir.join(KEY_FILE))
}

/// Whether both files of a pair exist in `dir`.
pub fn pair_exists(dir: &Path) -> bool {
    let (cert, key) = pair_paths(dir);
    cert.is_file() && key.is_file()
}

/// Write a pair into `dir`: the certificate world-readable, the key owner-only.
pub fn write_pair(dir: &Path, pair: &CertificatePair) -> Result<(PathBuf, PathBuf)> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| CertError::Io { path, source }
    };

    fs::create_dir_all(dir).map_err(io_err(dir))?;
    let (cert_path, key_path) = pair_paths(dir);

    write_with_mode(&key_path, &pair.private_key_pem, 0o600).map_err(io_err(&key_path))?;
    write_with_mode(&cert_path, &pair.certificate_pem, 0o644).map_err(io_err(&cert_path))?;

    info!(
        cert = %cert_path.display(),
        key = %key_path.display(),
        "Wrote certificate pair"
    );
    Ok((cert_path, key_path))
}

fn write_with_mode(path: &Path, contents: &[u8], mode: u32) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?;
    // The mode above only applies to newly created files.
    file.set_permissions(fs::Permissions::from_mode(mode))?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Read and inspect the certificate in `dir`.
pub fn inspect_dir(dir: &Path) -> Result<CertificateInfo> {
    let (cert_path, _) = pair_paths(dir);
    let pem = fs::read(&cert_path).map_err(|source| CertError::Io {
        path: cert_path.clone(),
        source,
    })?;
    inspect(&pem)
}
