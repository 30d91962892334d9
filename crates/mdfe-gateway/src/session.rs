//! # Gateway Session
//!
//! [`GatewaySession`] owns an initialized gateway: opening it runs
//! `Initialize` and writes the configuration, dropping it runs `Finalize`.
//!
//! [`SharedGateway`] is the process-wide handle every lifecycle operation
//! goes through. The gateway is a single non-reentrant resource, so callers
//! [`acquire`](SharedGateway::acquire) an exclusive guard and hold it for an
//! entire call sequence (e.g. clear, load, validate, sign). Concurrent
//! requests queue on the lock; with a deadline, a caller that cannot enter
//! in time gets [`GatewayError::Timeout`] instead of waiting forever.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};

use crate::config::GatewayConfig;
use crate::contract::{GatewayResult, TransmissionGateway};
use crate::error::GatewayError;

/// An initialized, configured gateway.
pub struct GatewaySession {
    gateway: Box<dyn TransmissionGateway>,
    config: GatewayConfig,
    open: bool,
}

impl std::fmt::Debug for GatewaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySession")
            .field("gateway", &self.gateway.name())
            .field("environment", &self.config.environment)
            .field("open", &self.open)
            .finish()
    }
}

impl GatewaySession {
    /// Initialize `gateway` and apply `config`.
    ///
    /// If configuration fails the gateway is finalized again before the
    /// error is returned.
    pub fn open(
        mut gateway: Box<dyn TransmissionGateway>,
        config: &GatewayConfig,
    ) -> GatewayResult<Self> {
        let path = config.library_config_path.display().to_string();
        gateway.initialize(&path)?;
        if let Err(e) = config.apply(gateway.as_mut()) {
            if let Err(fin) = gateway.finalize() {
                tracing::warn!(error = %fin, "finalize after failed configuration");
            }
            return Err(e);
        }
        tracing::info!(
            gateway = gateway.name(),
            environment = ?config.environment,
            "gateway session opened"
        );
        Ok(Self {
            gateway,
            config: config.clone(),
            open: true,
        })
    }

    pub fn gateway(&mut self) -> &mut dyn TransmissionGateway {
        self.gateway.as_mut()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Write a new configuration into the live gateway.
    ///
    /// If any entry fails, the previous configuration is written back so the
    /// gateway and [`GatewaySession::config`] keep agreeing.
    pub fn reconfigure(&mut self, config: GatewayConfig) -> GatewayResult<()> {
        if let Err(e) = config.apply(self.gateway.as_mut()) {
            if let Err(restore) = self.config.apply(self.gateway.as_mut()) {
                tracing::warn!(
                    error = %restore,
                    "restoring the previous gateway configuration failed"
                );
            }
            return Err(e);
        }
        self.config = config;
        Ok(())
    }

    /// Finalize explicitly, surfacing the result code.
    pub fn close(mut self) -> GatewayResult<()> {
        self.open = false;
        self.gateway.finalize()
    }
}

impl Drop for GatewaySession {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.gateway.finalize() {
                tracing::warn!(error = %e, "gateway finalize on drop failed");
            }
        }
    }
}

/// Exclusive access to the session for one call sequence.
pub type GatewayGuard<'a> = MutexGuard<'a, GatewaySession>;

/// Cloneable, thread-safe handle to the single gateway session.
#[derive(Debug, Clone)]
pub struct SharedGateway {
    inner: Arc<Mutex<GatewaySession>>,
    default_timeout: Option<Duration>,
}

impl SharedGateway {
    /// Wrap a session; the default deadline comes from its configuration.
    pub fn new(session: GatewaySession) -> Self {
        let default_timeout = session.config().lock_timeout();
        Self {
            inner: Arc::new(Mutex::new(session)),
            default_timeout,
        }
    }

    /// Open a session over `gateway` and share it.
    pub fn open(
        gateway: Box<dyn TransmissionGateway>,
        config: &GatewayConfig,
    ) -> GatewayResult<Self> {
        GatewaySession::open(gateway, config).map(Self::new)
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Enter the exclusive section.
    ///
    /// `timeout` overrides the default deadline; with neither, waits
    /// indefinitely.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Timeout`] when the deadline passes first.
    pub fn acquire(&self, timeout: Option<Duration>) -> GatewayResult<GatewayGuard<'_>> {
        let Some(timeout) = timeout.or(self.default_timeout) else {
            return Ok(self.inner.lock());
        };
        let started = Instant::now();
        match self.inner.try_lock_for(timeout) {
            Some(guard) => {
                tracing::trace!(waited_ms = started.elapsed().as_millis() as u64, "gateway acquired");
                Ok(guard)
            }
            None => {
                let waited_ms = started.elapsed().as_millis() as u64;
                tracing::warn!(waited_ms, "gateway busy; giving up");
                Err(GatewayError::Timeout { waited_ms })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CertificateConfig, Environment, IssuerDefaults};
    use crate::contract::GatewayOperation;
    use crate::mock::MockGateway;
    use mdfe_core::{Cnpj, Uf};
    use std::path::PathBuf;

    fn config() -> GatewayConfig {
        GatewayConfig::new(
            "lib.ini",
            CertificateConfig {
                path: PathBuf::from("cert.pfx"),
                password: "pw".into(),
            },
            IssuerDefaults {
                cnpj: Cnpj::new("11222333000181").unwrap(),
                uf: Uf::SP,
            },
        )
    }

    #[test]
    fn open_initializes_and_configures() {
        let mock = MockGateway::new();
        let handle = mock.handle();
        let session = GatewaySession::open(Box::new(mock), &config()).unwrap();
        assert!(handle.is_initialized());
        assert_eq!(handle.config_value("DFe", "UF").as_deref(), Some("SP"));
        assert_eq!(handle.config_value("MDFe", "Ambiente").as_deref(), Some("2"));
        drop(session);
        assert!(!handle.is_initialized());
    }

    #[test]
    fn failed_configuration_finalizes() {
        let mock = MockGateway::new();
        let handle = mock.handle();
        handle.fail_next(GatewayOperation::ConfigWrite, 3, "chave invalida");
        let err = GatewaySession::open(Box::new(mock), &config()).unwrap_err();
        assert_eq!(err.code(), Some(3));
        assert!(!handle.is_initialized());
    }

    #[test]
    fn close_finalizes_once() {
        let mock = MockGateway::new();
        let handle = mock.handle();
        let session = GatewaySession::open(Box::new(mock), &config()).unwrap();
        session.close().unwrap();
        assert_eq!(handle.call_count(GatewayOperation::Finalize), 1);
    }

    #[test]
    fn reconfigure_writes_new_values() {
        let mock = MockGateway::new();
        let handle = mock.handle();
        let mut session = GatewaySession::open(Box::new(mock), &config()).unwrap();
        let mut next = config();
        next.issuer.uf = Uf::PR;
        session.reconfigure(next).unwrap();
        assert_eq!(session.config().issuer.uf, Uf::PR);
        assert_eq!(handle.config_value("DFe", "UF").as_deref(), Some("PR"));
    }

    #[test]
    fn failed_reconfigure_restores_previous_values() {
        let mock = MockGateway::new();
        let handle = mock.handle();
        let mut session = GatewaySession::open(Box::new(mock), &config()).unwrap();

        let mut next = config();
        next.issuer.uf = Uf::PR;
        next.certificate.path = PathBuf::from("new.pfx");
        next.environment = Environment::Production;
        handle.fail_config_write("MDFe", "Ambiente", 4, "chave protegida");

        let err = session.reconfigure(next).unwrap_err();
        assert_eq!(err.code(), Some(4));
        assert_eq!(session.config().issuer.uf, Uf::SP);
        assert_eq!(handle.config_value("DFe", "UF").as_deref(), Some("SP"));
        assert_eq!(handle.config_value("DFe", "ArquivoPFX").as_deref(), Some("cert.pfx"));
        assert_eq!(handle.config_value("MDFe", "Ambiente").as_deref(), Some("2"));
    }

    #[test]
    fn acquire_times_out_while_held() {
        let shared = SharedGateway::open(Box::new(MockGateway::new()), &config()).unwrap();
        let guard = shared.acquire(None).unwrap();
        let other = shared.clone();
        let err = std::thread::spawn(move || {
            other
                .acquire(Some(Duration::from_millis(20)))
                .map(|_| ())
                .unwrap_err()
        })
        .join()
        .unwrap();
        assert!(matches!(err, GatewayError::Timeout { waited_ms } if waited_ms >= 20));
        drop(guard);
        assert!(shared.acquire(Some(Duration::from_millis(20))).is_ok());
    }

    #[test]
    fn default_timeout_comes_from_config() {
        let mut cfg = config();
        cfg.lock_timeout_ms = Some(250);
        let shared = SharedGateway::open(Box::new(MockGateway::new()), &cfg).unwrap();
        assert_eq!(shared.default_timeout(), Some(Duration::from_millis(250)));
        let shared = shared.with_default_timeout(None);
        assert_eq!(shared.default_timeout(), None);
    }
}
