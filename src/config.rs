//! Configuração do runner carregada a partir de `sequencer.toml`.
//!
//! A struct [`RunnerConfig`] é imutável durante uma execução.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `SEQUENCER_AUTO_START_DELAY_MS` tem precedência sobre o arquivo.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Arquivo de configuração procurado quando nenhum caminho é informado.
pub const DEFAULT_CONFIG_FILE: &str = "sequencer.toml";

/// Variável de ambiente que sobrescreve `auto_start_delay`.
pub const AUTO_START_DELAY_ENV: &str = "SEQUENCER_AUTO_START_DELAY_MS";

/// Opções de uma execução do runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Reservado. A fila é sempre consumida em ordem.
    pub sequential: bool,

    /// Ordena os itens por prioridade (maior primeiro) antes de executar.
    pub priority_based: bool,

    /// Permite `skip_current`.
    pub skip_allowed: bool,

    /// Começa a consumir a fila logo após `initialize`.
    pub auto_start: bool,

    /// Atraso em milissegundos antes do primeiro item.
    pub auto_start_delay: u64,

    /// Campos específicos de cada implementação.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            sequential: true,
            priority_based: false,
            skip_allowed: true,
            auto_start: true,
            auto_start_delay: 0,
            extra: Map::new(),
        }
    }
}

impl RunnerConfig {
    /// Carrega a configuração do caminho informado, ou de `sequencer.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Self::from_toml_str(&contents)
                .with_context(|| format!("invalid config in {}", path.display()))?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo de configuração.
        if let Ok(raw) = std::env::var(AUTO_START_DELAY_ENV)
            && !raw.is_empty()
        {
            config.auto_start_delay = raw
                .parse()
                .with_context(|| format!("{AUTO_START_DELAY_ENV} must be milliseconds"))?;
        }

        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let config = RunnerConfig::default();
        assert!(config.sequential);
        assert!(!config.priority_based);
        assert!(config.skip_allowed);
        assert!(config.auto_start);
        assert_eq!(config.auto_start_delay, 0);
        assert!(config.extra.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            priority_based = true
            auto_start_delay = 250
        "#;
        let config = RunnerConfig::from_toml_str(toml_str).unwrap();
        assert!(config.priority_based);
        assert_eq!(config.auto_start_delay, 250);
        assert!(config.skip_allowed);
        assert!(config.auto_start);
    }

    #[test]
    fn unknown_keys_land_in_extra() {
        let toml_str = r#"
            skip_allowed = false
            theme = "dark"
            volume = 3
        "#;
        let config = RunnerConfig::from_toml_str(toml_str).unwrap();
        assert!(!config.skip_allowed);
        assert_eq!(config.extra.get("theme"), Some(&Value::from("dark")));
        assert_eq!(config.extra.get("volume"), Some(&Value::from(3)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "auto_start = false").unwrap();
        let config = RunnerConfig::load(Some(file.path())).unwrap();
        assert!(!config.auto_start);
    }

    #[test]
    fn load_rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "auto_start = \"sometimes\"").unwrap();
        assert!(RunnerConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let config = RunnerConfig::load(Some(&missing)).unwrap();
        assert!(config.skip_allowed);
    }
}
