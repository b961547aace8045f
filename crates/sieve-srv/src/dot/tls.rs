//! Certificate loading for the DoT listener.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::SrvError;

/// Build a TLS acceptor from a PEM certificate chain and private key.
///
/// The key may be PKCS#8, PKCS#1 or SEC1.
pub fn load_acceptor(cert_path: &Path, key_path: &Path) -> crate::Result<TlsAcceptor> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| SrvError::Tls(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| SrvError::Tls(format!("certificate/key mismatch: {e}")))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_certs(path: &Path) -> crate::Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .map_err(|e| SrvError::Tls(format!("cannot open {}: {e}", path.display())))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SrvError::Tls(format!("invalid certificate in {}: {e}", path.display())))?;

    if certs.is_empty() {
        return Err(SrvError::Tls(format!("no certificates found in {}", path.display())));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> crate::Result<PrivateKeyDer<'static>> {
    let file = File::open(path)
        .map_err(|e| SrvError::Tls(format!("cannot open {}: {e}", path.display())))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| SrvError::Tls(format!("invalid private key in {}: {e}", path.display())))?
        .ok_or_else(|| SrvError::Tls(format!("no private key found in {}", path.display())))
}
