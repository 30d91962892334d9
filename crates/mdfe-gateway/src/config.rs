//! # Gateway Configuration
//!
//! Process-wide settings for the transmission gateway: certificate,
//! environment (production vs. homologation), issuer defaults. Loaded from a
//! YAML file and written into the gateway through `ConfigWrite` when a
//! session opens. Must be in place before any manifest lifecycle begins.
//!
//! ```yaml
//! library_config_path: /etc/mdfe/acbrlib.ini
//! environment: homologation
//! certificate:
//!   path: /etc/mdfe/certificado.pfx
//! issuer:
//!   cnpj: "11222333000181"
//!   uf: SP
//! emission_type: normal
//! lock_timeout_ms: 30000
//! ```
//!
//! The certificate password is taken from `MDFE_CERT_PASSWORD` when set,
//! overriding the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mdfe_core::{Cnpj, EmissionType, Uf};
use serde::Deserialize;

use crate::contract::{GatewayResult, TransmissionGateway};

/// Environment variable overriding `certificate.password`.
pub const CERT_PASSWORD_ENV: &str = "MDFE_CERT_PASSWORD";

/// Authority environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    #[default]
    Homologation,
}

impl Environment {
    /// Authority code (`tpAmb`): 1 production, 2 homologation.
    pub fn code(self) -> u8 {
        match self {
            Self::Production => 1,
            Self::Homologation => 2,
        }
    }
}

/// Digital certificate used to sign documents.
///
/// Custom `Debug` redacts the password.
#[derive(Clone, Deserialize)]
pub struct CertificateConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for CertificateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateConfig")
            .field("path", &self.path)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Issuer defaults applied to every document of this deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuerDefaults {
    pub cnpj: Cnpj,
    pub uf: Uf,
}

fn default_emission_type() -> EmissionType {
    EmissionType::Normal
}

/// Gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Path handed to the gateway's `Initialize` call.
    pub library_config_path: PathBuf,
    #[serde(default)]
    pub environment: Environment,
    pub certificate: CertificateConfig,
    pub issuer: IssuerDefaults,
    #[serde(default = "default_emission_type")]
    pub emission_type: EmissionType,
    /// Default deadline for acquiring the exclusive gateway section.
    /// Absent means wait indefinitely.
    #[serde(default)]
    pub lock_timeout_ms: Option<u64>,
}

impl GatewayConfig {
    /// Homologation configuration with no lock deadline.
    pub fn new(
        library_config_path: impl Into<PathBuf>,
        certificate: CertificateConfig,
        issuer: IssuerDefaults,
    ) -> Self {
        Self {
            library_config_path: library_config_path.into(),
            environment: Environment::Homologation,
            certificate,
            issuer,
            emission_type: EmissionType::Normal,
            lock_timeout_ms: None,
        }
    }

    /// Parse YAML, then apply the environment override.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        if let Ok(password) = std::env::var(CERT_PASSWORD_ENV) {
            config.certificate.password = password;
        }
        config.check()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.library_config_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "library_config_path must not be empty".into(),
            ));
        }
        if self.certificate.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("certificate.path must not be empty".into()));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    /// The `(section, key, value)` entries written into the gateway.
    pub fn entries(&self) -> Vec<(&'static str, &'static str, String)> {
        vec![
            ("DFe", "ArquivoPFX", self.certificate.path.display().to_string()),
            ("DFe", "Senha", self.certificate.password.clone()),
            ("DFe", "UF", self.issuer.uf.sigla().to_string()),
            ("MDFe", "Ambiente", self.environment.code().to_string()),
            ("MDFe", "FormaEmissao", self.emission_type.code().to_string()),
        ]
    }

    /// Write every entry into the gateway.
    pub fn apply(&self, gateway: &mut dyn TransmissionGateway) -> GatewayResult<()> {
        for (section, key, value) in self.entries() {
            gateway.config_write(section, key, &value)?;
        }
        tracing::debug!(
            gateway = gateway.name(),
            environment = ?self.environment,
            issuer = %self.issuer.cnpj,
            "gateway configuration applied"
        );
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const YAML: &str = r#"
library_config_path: /etc/mdfe/acbrlib.ini
environment: production
certificate:
  path: /etc/mdfe/cert.pfx
  password: secret
issuer:
  cnpj: "11.222.333/0001-81"
  uf: SP
emission_type: contingency
lock_timeout_ms: 1500
"#;

    #[test]
    fn parses_full_yaml() {
        let cfg = GatewayConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(cfg.environment, Environment::Production);
        assert_eq!(cfg.issuer.cnpj.as_str(), "11222333000181");
        assert_eq!(cfg.issuer.uf, Uf::SP);
        assert_eq!(cfg.emission_type, EmissionType::Contingency);
        assert_eq!(cfg.lock_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn defaults_are_homologation_and_normal() {
        let yaml = r#"
library_config_path: lib.ini
certificate:
  path: cert.pfx
issuer:
  cnpj: "11222333000181"
  uf: PR
"#;
        let cfg = GatewayConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.environment, Environment::Homologation);
        assert_eq!(cfg.emission_type, EmissionType::Normal);
        assert_eq!(cfg.lock_timeout(), None);
    }

    #[test]
    fn invalid_issuer_cnpj_is_rejected() {
        let yaml = YAML.replace("11.222.333/0001-81", "11.222.333/0001-80");
        assert!(matches!(
            GatewayConfig::from_yaml_str(&yaml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn empty_library_path_is_rejected() {
        let yaml = YAML.replace("/etc/mdfe/acbrlib.ini", "\"\"");
        assert!(matches!(
            GatewayConfig::from_yaml_str(&yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();
        let cfg = GatewayConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(cfg.issuer.uf, Uf::SP);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = GatewayConfig::from_yaml_file("/nonexistent/mdfe.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/mdfe.yaml"));
    }

    #[test]
    fn debug_redacts_password() {
        let cfg = GatewayConfig::from_yaml_str(YAML).unwrap();
        let text = format!("{cfg:?}");
        assert!(text.contains("[REDACTED]"));
        assert!(!text.contains("secret"));
    }

    #[test]
    fn entries_carry_environment_code() {
        let cfg = GatewayConfig::from_yaml_str(YAML).unwrap();
        let entries = cfg.entries();
        assert!(entries.contains(&("MDFe", "Ambiente", "1".to_string())));
        assert!(entries.contains(&("MDFe", "FormaEmissao", "2".to_string())));
        assert!(entries.contains(&("DFe", "UF", "SP".to_string())));
    }
}
