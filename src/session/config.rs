//! Connection configuration (spec §4.6, §6 "Environment").

use std::time::Duration;

/// How the session secures its socket to the host.
#[derive(Debug, Clone)]
pub enum TlsMode {
    /// Trust the platform's native root certificate store.
    NativeRoots,
    /// Trust only the CA bundle at this path (`TN5250_TLS_CA_BUNDLE`).
    CaBundle(String),
}

/// Connection parameters for [`crate::session::Session::connect`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsMode>,
    pub device_name: String,
    pub ccsid: String,
    pub rows: usize,
    pub cols: usize,
    pub user: Option<String>,
    pub password: Option<String>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        SessionConfig {
            host: host.into(),
            port,
            tls: None,
            device_name: "IBM-3179-2".to_string(),
            ccsid: "037".to_string(),
            rows: 24,
            cols: 80,
            user: None,
            password: None,
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(900),
        }
    }

    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_device_name(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = device_name.into();
        self
    }

    pub fn with_ccsid(mut self, ccsid: impl Into<String>) -> Self {
        self.ccsid = ccsid.into();
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_dimensions(mut self, rows: usize, cols: usize) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    /// Reads `TN5250_TLS_CA_BUNDLE` and applies it as the TLS trust
    /// source if present, leaving `tls` untouched otherwise (spec §6
    /// "Environment").
    pub fn with_tls_env_override(mut self) -> Self {
        if let Ok(path) = std::env::var("TN5250_TLS_CA_BUNDLE") {
            self.tls = Some(TlsMode::CaBundle(path));
        }
        self
    }
}
