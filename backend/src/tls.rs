use std::fs::{self, File};
use std::path::{Path, PathBuf};

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslFiletype, SslMethod, SslVersion};
use openssl::x509::{X509, X509NameBuilder};

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] ErrorStack),
    #[error("Failed to load {path}: {source}")]
    Material {
        path: PathBuf,
        #[source]
        source: ErrorStack,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsMode {
    /// Operator-provided certificate and key, served over TLS 1.2 only.
    Provisioned { cert: PathBuf, key: PathBuf },
    /// Throwaway self-signed certificate generated at startup.
    AdHoc,
}

impl std::fmt::Display for TlsMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsMode::Provisioned { cert, .. } => write!(f, "provisioned ({})", cert.display()),
            TlsMode::AdHoc => write!(f, "ad hoc self-signed"),
        }
    }
}

/// Picks provisioned TLS when both files can be read, ad hoc otherwise.
pub fn select_mode(cert: &Path, key: &Path) -> TlsMode {
    for path in [cert, key] {
        if !is_readable_file(path) {
            log::warn!("Unable to locate {} or it is not readable.", path.display());
            return TlsMode::AdHoc;
        }
    }
    TlsMode::Provisioned {
        cert: cert.to_path_buf(),
        key: key.to_path_buf(),
    }
}

fn is_readable_file(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file()) && File::open(path).is_ok()
}

pub fn build_acceptor(mode: &TlsMode) -> Result<SslAcceptorBuilder, TlsError> {
    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server())?;
    match mode {
        TlsMode::Provisioned { cert, key } => {
            builder.set_min_proto_version(Some(SslVersion::TLS1_2))?;
            builder.set_max_proto_version(Some(SslVersion::TLS1_2))?;
            builder
                .set_certificate_chain_file(cert)
                .map_err(|source| TlsError::Material {
                    path: cert.clone(),
                    source,
                })?;
            builder
                .set_private_key_file(key, SslFiletype::PEM)
                .map_err(|source| TlsError::Material {
                    path: key.clone(),
                    source,
                })?;
        }
        TlsMode::AdHoc => {
            let (cert, key) = generate_adhoc_identity()?;
            builder.set_certificate(&cert)?;
            builder.set_private_key(&key)?;
        }
    }
    builder.check_private_key()?;
    Ok(builder)
}

/// RSA-2048 key and a self-signed SHA-256 certificate valid for one year.
pub fn generate_adhoc_identity() -> Result<(X509, PKey<Private>), ErrorStack> {
    let key = PKey::from_rsa(Rsa::generate(2048)?)?;

    let mut name_builder = X509NameBuilder::new()?;
    name_builder.append_entry_by_text("O", "Dummy Certificate")?;
    name_builder.append_entry_by_text("CN", "*")?;
    let name = name_builder.build();

    let mut cert_builder = X509::builder()?;
    cert_builder.set_version(2)?;

    let serial = {
        let mut bn = BigNum::new()?;
        bn.rand(128, MsbOption::MAYBE_ZERO, false)?;
        bn.to_asn1_integer()?
    };
    cert_builder.set_serial_number(&serial)?;

    cert_builder.set_subject_name(&name)?;
    cert_builder.set_issuer_name(&name)?;
    cert_builder.set_pubkey(&key)?;

    let not_before = Asn1Time::days_from_now(0)?;
    let not_after = Asn1Time::days_from_now(365)?;
    cert_builder.set_not_before(&not_before)?;
    cert_builder.set_not_after(&not_after)?;

    cert_builder.sign(&key, MessageDigest::sha256())?;
    Ok((cert_builder.build(), key))
}
