use rcgen::generate_simple_self_signed;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::path::Path;
use std::sync::Arc;

use crate::error::PunchError;

/// Certificate chain and key presented to the rendezvous
pub struct LocalIdentity {
    pub certs: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

impl LocalIdentity {
    /// Generate a throwaway self-signed identity
    pub fn generate() -> Result<Self, PunchError> {
        let certified_key = generate_simple_self_signed(vec!["localhost".to_string()])
            .map_err(|e| PunchError::Identity(e.to_string()))?;
        let key = PrivatePkcs8KeyDer::from(certified_key.signing_key.serialize_der());
        let cert_der = CertificateDer::from(certified_key.cert.der().to_vec());
        Ok(Self {
            certs: vec![cert_der],
            key: key.into(),
        })
    }

    /// Load a PEM certificate chain and PEM private key
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, PunchError> {
        let certs = CertificateDer::pem_file_iter(cert_path)
            .and_then(|iter| iter.collect::<Result<Vec<_>, _>>())
            .map_err(|e| PunchError::Identity(format!("{:?}: {}", cert_path, e)))?;
        if certs.is_empty() {
            return Err(PunchError::Identity(format!(
                "{:?}: no certificates found",
                cert_path
            )));
        }

        let key = PrivateKeyDer::from_pem_file(key_path)
            .map_err(|e| PunchError::Identity(format!("{:?}: {}", key_path, e)))?;

        Ok(Self { certs, key })
    }
}

impl Clone for LocalIdentity {
    fn clone(&self) -> Self {
        Self {
            certs: self.certs.clone(),
            key: self.key.clone_key(),
        }
    }
}

/// How the rendezvous peer's certificate is checked.
///
/// `AcceptAny` is the intended trust model: whoever answers at the rendezvous
/// address is talked to, and identity is settled later by the shared password.
#[derive(Debug, Clone, Default)]
pub enum PeerVerification {
    #[default]
    AcceptAny,
    WebPki(Arc<RootCertStore>),
}

impl PeerVerification {
    pub fn from_pem_roots(path: &Path) -> Result<Self, PunchError> {
        let mut roots = RootCertStore::empty();
        let certs = CertificateDer::pem_file_iter(path)
            .and_then(|iter| iter.collect::<Result<Vec<_>, _>>())
            .map_err(|e| PunchError::Identity(format!("{:?}: {}", path, e)))?;
        for cert in certs {
            roots.add(cert)?;
        }
        Ok(Self::WebPki(Arc::new(roots)))
    }
}

/// Lowest TLS version the connector will negotiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsFloor {
    #[default]
    Tls12,
    Tls13,
}

/// Build the client configuration used for every rendezvous dial
pub fn client_config(
    identity: &LocalIdentity,
    verification: &PeerVerification,
    floor: TlsFloor,
) -> Result<Arc<ClientConfig>, PunchError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let versions: &[&rustls::SupportedProtocolVersion] = match floor {
        TlsFloor::Tls12 => &[&rustls::version::TLS13, &rustls::version::TLS12],
        TlsFloor::Tls13 => &[&rustls::version::TLS13],
    };

    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(versions)?;

    let builder = match verification {
        PeerVerification::AcceptAny => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider })),
        PeerVerification::WebPki(roots) => builder.with_root_certificates(roots.clone()),
    };

    let config = builder.with_client_auth_cert(identity.certs.clone(), identity.key.clone_key())?;
    Ok(Arc::new(config))
}

/// Skips chain validation but still checks handshake signatures against the
/// presented certificate.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
