//! Configuração unificada via TOML.
//!
//! Um único `config.toml` ao lado do binário cobre listener, decodificador,
//! watchdog e exposição de métricas.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::decode::DecodeOptions;

/// Configuração do listener UDP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Porta UDP onde o hub transmite broadcast
    pub port: u16,
    /// IP local para bind (vazio = 0.0.0.0)
    pub bind_ip: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            port: 50222,
            bind_ip: String::new(),
        }
    }
}

/// Configuração do watchdog de expiração de séries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Segundos sem observação até remover a série. O hub reporta a cada
    /// 1–5 min conforme o deployment; o valor deve dar folga sobre essa
    /// cadência.
    pub timeout_secs: f64,
    /// Intervalo entre varreduras (ms)
    pub sweep_interval_ms: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 360.0,
            sweep_interval_ms: 500,
        }
    }
}

impl WatchdogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Configuração da exposição HTTP de métricas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Porta do endpoint `/metrics`
    pub port: u16,
    /// IP para bind do endpoint
    pub bind_ip: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_ip: "0.0.0.0".into(),
        }
    }
}

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub listener: ListenerConfig,
    pub decoder: DecodeOptions,
    pub watchdog: WatchdogConfig,
    pub exporter: ExporterConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.listener.port == 0 {
            errors.push("Porta do listener não pode ser 0".into());
        }
        if self.exporter.port == 0 {
            errors.push("Porta do exporter não pode ser 0".into());
        }
        if self.watchdog.timeout_secs <= 0.0 {
            errors.push(format!(
                "Timeout do watchdog inválido: {}",
                self.watchdog.timeout_secs
            ));
        }
        if self.watchdog.sweep_interval_ms == 0 {
            errors.push("Intervalo de varredura não pode ser 0".into());
        }
        // A varredura precisa ser bem mais curta que o timeout para que a
        // latência de remoção fique limitada
        if self.watchdog.sweep_interval_ms as f64 * 4.0 > self.watchdog.timeout_secs * 1000.0 {
            errors.push(format!(
                "Intervalo de varredura ({} ms) longo demais para o timeout ({} s)",
                self.watchdog.sweep_interval_ms, self.watchdog.timeout_secs
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::WireFormat;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
    }

    #[test]
    fn roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.listener.port, parsed.listener.port);
        assert_eq!(config.decoder, parsed.decoder);
        assert_eq!(config.watchdog.timeout_secs, parsed.watchdog.timeout_secs);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let partial = r#"
[watchdog]
timeout_secs = 120.0
"#;
        let config: AppConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.watchdog.timeout_secs, 120.0);
        // Outros campos devem ter valor padrão
        assert_eq!(config.watchdog.sweep_interval_ms, 500);
        assert_eq!(config.listener.port, 50222);
        assert_eq!(config.exporter.port, 8080);
    }

    #[test]
    fn decoder_section_parses_wire_format() {
        let partial = r#"
[decoder]
wire_format = "legacy"
correct_sensor_inversion = false
"#;
        let config: AppConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.decoder.wire_format, WireFormat::Legacy);
        assert!(!config.decoder.correct_sensor_inversion);
    }

    #[test]
    fn sweep_interval_must_be_shorter_than_timeout() {
        let config = AppConfig {
            watchdog: WatchdogConfig {
                timeout_secs: 1.0,
                sweep_interval_ms: 500,
            },
            ..Default::default()
        };
        assert!(!config.validate().is_empty());
    }
}
