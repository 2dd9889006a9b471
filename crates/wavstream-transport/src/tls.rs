use std::path::Path;
use wavstream_core::config::TlsConfig;
use wavstream_core::TransportError;

/// Build the secure channel factory handed to [`WsConnector`](crate::WsConnector).
///
/// With a CA file only the configured CA is trusted. With a client certificate
/// and key the client presents them, so a server requiring mutual
/// authentication accepts it. The key must be PKCS#8 PEM; PKCS#1
/// (`BEGIN RSA PRIVATE KEY`) files are rejected with [`TransportError::Tls`].
pub fn build_tls_connector(
    config: &TlsConfig,
) -> Result<tokio_tungstenite::Connector, TransportError> {
    let mut builder = native_tls::TlsConnector::builder();

    if let Some(ca_file) = &config.ca_file {
        let pem = read_pem(ca_file)?;
        let ca = native_tls::Certificate::from_pem(&pem)
            .map_err(|e| TransportError::Tls(format!("{}: {e}", ca_file.display())))?;
        builder.add_root_certificate(ca);
        builder.disable_built_in_roots(true);
    }

    match (&config.cert_file, &config.key_file) {
        (Some(cert_file), Some(key_file)) => {
            let cert = read_pem(cert_file)?;
            let key = read_pem(key_file)?;
            let identity = native_tls::Identity::from_pkcs8(&cert, &key)
                .map_err(|e| TransportError::Tls(format!("client identity: {e}")))?;
            builder.identity(identity);
        }
        (None, None) => {}
        _ => {
            return Err(TransportError::Tls(
                "client certificate and key must be configured together".to_string(),
            ))
        }
    }

    if config.accept_invalid_hostnames {
        tracing::warn!("TLS hostname verification disabled");
        builder.danger_accept_invalid_hostnames(true);
    }

    let connector = builder
        .build()
        .map_err(|e| TransportError::Tls(e.to_string()))?;
    Ok(tokio_tungstenite::Connector::NativeTls(connector))
}

fn read_pem(path: &Path) -> Result<Vec<u8>, TransportError> {
    std::fs::read(path).map_err(|e| TransportError::Tls(format!("{}: {e}", path.display())))
}
