use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info, warn};
use transhift_core::{AppConfig, NodeRole};

use crate::error::PunchError;
use crate::tls::{LocalIdentity, PeerVerification, TlsFloor, client_config};

/// Established rendezvous channel, buffered for the line-based handshake.
///
/// Writes pass straight through to the TLS stream.
pub type Channel = BufReader<TlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunchState {
    Idle,
    Dialing,
    RoleAnnounced,
    Ready,
    Failed,
}

/// Dials the rendezvous over TLS and announces this node's role
pub struct Puncher {
    host: String,
    port: u16,
    role: NodeRole,
    tls: Arc<ClientConfig>,
    connect_timeout: Option<Duration>,
    state: PunchState,
}

impl Puncher {
    pub fn new(host: impl Into<String>, port: u16, role: NodeRole, tls: Arc<ClientConfig>) -> Self {
        Self {
            host: host.into(),
            port,
            role,
            tls,
            connect_timeout: None,
            state: PunchState::Idle,
        }
    }

    /// Build a puncher from application config, generating an identity when
    /// no certificate is configured
    pub fn from_config(config: &AppConfig) -> Result<Self, PunchError> {
        let identity = match (&config.cert_path, &config.key_path) {
            (Some(cert), Some(key)) => LocalIdentity::from_pem_files(cert, key)?,
            (None, None) => {
                info!("No certificate configured, generating a self-signed identity");
                LocalIdentity::generate()?
            }
            _ => {
                return Err(PunchError::Identity(
                    "cert_path and key_path must be set together".to_string(),
                ));
            }
        };

        let verification = match &config.trusted_roots_path {
            Some(path) => PeerVerification::from_pem_roots(path)?,
            None => PeerVerification::AcceptAny,
        };

        let floor = if config.require_tls13 {
            TlsFloor::Tls13
        } else {
            TlsFloor::Tls12
        };

        let tls = client_config(&identity, &verification, floor)?;
        let mut puncher = Self::new(
            config.rendezvous_host.clone(),
            config.rendezvous_port,
            config.role,
            tls,
        );
        puncher.connect_timeout = config.connect_timeout();
        Ok(puncher)
    }

    /// Bound the TCP dial and TLS handshake together
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn state(&self) -> PunchState {
        self.state
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn addr(&self) -> String {
        join_host_port(&self.host, self.port)
    }

    /// Dial, complete TLS, announce the role and hand the channel over.
    ///
    /// The channel is returned only once the role byte is flushed; on any error
    /// the stream is dropped and the state is `Failed`. No retries.
    pub async fn connect(&mut self) -> Result<Channel, PunchError> {
        self.state = PunchState::Dialing;
        info!("Dialing rendezvous {} as {}", self.addr(), self.role);

        let mut stream = match self.dial().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Rendezvous dial failed: {}", e);
                self.state = PunchState::Failed;
                return Err(e);
            }
        };

        if let Err(e) = self.role.announce(&mut stream).await {
            warn!("Role announcement failed: {}", e);
            self.state = PunchState::Failed;
            return Err(e.into());
        }
        self.state = PunchState::RoleAnnounced;
        debug!("Announced role {}", self.role);

        self.state = PunchState::Ready;
        info!("Rendezvous channel to {} ready", self.addr());
        Ok(BufReader::new(stream))
    }

    async fn dial(&self) -> Result<TlsStream<TcpStream>, PunchError> {
        let addr = self.addr();
        let failed = |cause: String| PunchError::ConnectionFailed {
            addr: addr.clone(),
            cause,
        };

        let server_name = ServerName::try_from(self.host.clone())
            .map_err(|e| failed(format!("invalid server name {:?}: {}", self.host, e)))?;
        let connector = TlsConnector::from(self.tls.clone());

        let attempt = async {
            let tcp = TcpStream::connect(&addr)
                .await
                .map_err(|e| failed(e.to_string()))?;
            tcp.set_nodelay(true)
                .map_err(|e| failed(format!("set_nodelay: {}", e)))?;

            connector
                .connect(server_name, tcp)
                .await
                .map_err(|e| failed(format!("tls handshake: {}", e)))
        };

        match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .map_err(|_| failed(format!("timed out after {:?}", limit)))?,
            None => attempt.await,
        }
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
