use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use thiserror::Error;

use crate::config::TlsPaths;

#[derive(Error, Debug)]
pub enum TlsError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse PEM in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("No certificates found in {0}")]
    NoCertificates(PathBuf),
    #[error("No private key found in {0}")]
    NoPrivateKey(PathBuf),
    #[error("Certificate and key do not form a valid server config: {0}")]
    Rejected(#[from] rustls::Error),
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Open {
            path: path.to_path_buf(),
            source,
        })
}

pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Parse {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

/// Checks that the configured PEM files can actually back a TLS listener.
/// warp reads the files again itself, this only decides whether to serve
/// WSS or fall back to plain WS.
pub fn validate(paths: &TlsPaths) -> Result<ServerConfig, TlsError> {
    let certs = load_certs(&paths.cert)?;
    let key = load_private_key(&paths.key)?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(config)
}
