//! TLS credential loading.
//!
//! Credentials are configured as file paths and read once at bind time; a
//! missing or unreadable file fails server construction instead of the first
//! handshake.

use std::fs;
use std::path::Path;

use rpckit_config::TlsConfig;

use crate::error::ServerError;

/// PEM-encoded server credentials.
///
/// A present `ca_cert` means client certificates are required (mutual TLS).
#[derive(Clone)]
pub struct TlsCredentials {
    cert: Vec<u8>,
    key: Vec<u8>,
    ca_cert: Option<Vec<u8>>,
}

impl TlsCredentials {
    /// The PEM-encoded certificate chain.
    #[must_use]
    pub fn cert(&self) -> &[u8] {
        &self.cert
    }

    /// The PEM-encoded private key.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The PEM-encoded client CA certificate, when mutual TLS is configured.
    #[must_use]
    pub fn ca_cert(&self) -> Option<&[u8]> {
        self.ca_cert.as_deref()
    }

    /// Whether clients must present a certificate.
    #[must_use]
    pub fn client_auth_required(&self) -> bool {
        self.ca_cert.is_some()
    }
}

impl std::fmt::Debug for TlsCredentials {
    // key material stays out of logs
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsCredentials")
            .field("cert_len", &self.cert.len())
            .field("client_auth_required", &self.client_auth_required())
            .finish_non_exhaustive()
    }
}

/// Loads the credentials named by `config`.
///
/// Returns `Ok(None)` when TLS is not configured.
///
/// # Errors
///
/// Returns [`ServerError::TlsFile`] naming the offending path when any
/// configured file cannot be read.
pub fn load_credentials(config: &TlsConfig) -> Result<Option<TlsCredentials>, ServerError> {
    let (Some(cert_path), Some(key_path)) = (&config.cert, &config.key) else {
        return Ok(None);
    };

    let cert = read_pem(cert_path)?;
    let key = read_pem(key_path)?;
    let ca_cert = config
        .ca_cert
        .as_deref()
        .map(read_pem)
        .transpose()?;

    Ok(Some(TlsCredentials { cert, key, ca_cert }))
}

fn read_pem(path: &Path) -> Result<Vec<u8>, ServerError> {
    fs::read(path).map_err(|source| ServerError::tls_file(path, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_pem(dir: &TempDir, name: &str, body: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create file");
        file.write_all(body).expect("write file");
        path
    }

    #[test]
    fn test_unconfigured_tls_is_none() {
        let config = TlsConfig::default();
        assert!(load_credentials(&config).expect("no error").is_none());
    }

    #[test]
    fn test_loads_cert_and_key() {
        let dir = TempDir::new().expect("tempdir");
        let config = TlsConfig {
            cert: Some(write_pem(&dir, "server.pem", b"CERT")),
            key: Some(write_pem(&dir, "server.key", b"KEY")),
            ca_cert: None,
        };

        let credentials = load_credentials(&config)
            .expect("no error")
            .expect("configured");
        assert_eq!(credentials.cert(), b"CERT");
        assert_eq!(credentials.key(), b"KEY");
        assert!(!credentials.client_auth_required());
    }

    #[test]
    fn test_ca_cert_enables_client_auth() {
        let dir = TempDir::new().expect("tempdir");
        let config = TlsConfig {
            cert: Some(write_pem(&dir, "server.pem", b"CERT")),
            key: Some(write_pem(&dir, "server.key", b"KEY")),
            ca_cert: Some(write_pem(&dir, "ca.pem", b"CA")),
        };

        let credentials = load_credentials(&config)
            .expect("no error")
            .expect("configured");
        assert_eq!(credentials.ca_cert(), Some(b"CA".as_slice()));
        assert!(credentials.client_auth_required());
    }

    #[test]
    fn test_missing_key_file_fails_naming_path() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("absent.key");
        let config = TlsConfig {
            cert: Some(write_pem(&dir, "server.pem", b"CERT")),
            key: Some(missing.clone()),
            ca_cert: None,
        };

        match load_credentials(&config) {
            Err(ServerError::TlsFile { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected TlsFile error, got {other:?}"),
        }
    }

    #[test]
    fn test_debug_output_hides_key_material() {
        let dir = TempDir::new().expect("tempdir");
        let config = TlsConfig {
            cert: Some(write_pem(&dir, "server.pem", b"CERT")),
            key: Some(write_pem(&dir, "server.key", b"SECRET-KEY")),
            ca_cert: None,
        };
        let credentials = load_credentials(&config)
            .expect("no error")
            .expect("configured");
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("SECRET-KEY"));
    }
}
