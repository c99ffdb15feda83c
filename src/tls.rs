// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use rustls_pemfile::{certs, private_key};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

use crate::error::{CallError, Result};

/// A root certificate chain given on the command line.
///
/// The PEM text is kept alongside the parsed roots: the direct path trusts the roots, while the
/// delegation path forwards the text untouched and lets the agent parse it.
#[derive(Debug, Clone)]
pub struct RootCertificate {
    pem: String,
    roots: RootCertStore,
}

impl RootCertificate {
    pub fn load(path: &Path) -> Result<Self> {
        let pem = std::fs::read_to_string(path).map_err(|e| {
            CallError::input(format!(
                "could not read root certificate \"{}\": {e}",
                path.display()
            ))
        })?;
        Self::from_pem(pem)
    }

    /// Parse a PEM chain. At least one certificate must be usable as a trust anchor.
    pub fn from_pem(pem: String) -> Result<Self> {
        let chain: Vec<CertificateDer<'static>> = certs(&mut pem.as_bytes())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| CallError::input(format!("unparsable root certificate chain: {e}")))?;

        let mut roots = RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(chain);
        if added == 0 {
            return Err(CallError::input("unparsable root certificate chain"));
        }
        if ignored > 0 {
            tracing::warn!("ignoring {ignored} unusable certificate(s) in root chain");
        }

        Ok(Self { pem, roots })
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }
}

/// Build a client TLS configuration that trusts only the given roots.
pub fn client_config(root: &RootCertificate) -> Result<Arc<ClientConfig>> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| CallError::input(format!("could not build TLS configuration: {e}")))?
        .with_root_certificates(root.roots.clone())
        .with_no_client_auth();
    Ok(Arc::new(config))
}

type BoxResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn load_private_key(path: &Path) -> BoxResult<PrivateKeyDer<'static>> {
    let key_file = File::open(path)?;
    let mut reader = BufReader::new(key_file);
    private_key(&mut reader)?.ok_or_else(|| "No private key found".into())
}

fn load_cert(path: &Path) -> BoxResult<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(File::open(path)?);
    let chain = certs(&mut reader).collect::<std::result::Result<_, _>>()?;
    Ok(chain)
}

/// Server side TLS for the test endpoints, from a certificate chain and private key on disk.
pub fn get_acceptor(cert_path: &Path, key_path: &Path) -> BoxResult<TlsAcceptor> {
    let server_cert = load_cert(cert_path)?;
    let server_key = load_private_key(key_path)?;

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(server_cert, server_key)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}
