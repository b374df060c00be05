//! Configuração do jobscout carregada a partir de `jobscout.toml`.
//!
//! A struct [`ScoutConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! Variáveis de ambiente (`WEBDRIVER_URL`, `API_URL`, `WEBSITE_URL`,
//! `API_TOKEN`, `SECRET_KEY`) têm precedência sobre o arquivo; flags da CLI
//! têm precedência sobre ambos.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::driver::LocatorTable;
use crate::error::ScoutError;
use crate::extract::ExtractionSettings;
use crate::orchestrator::RunLimits;
use crate::retry::RetryPolicy;
use crate::session::LoginPacing;

/// Arquivo de configuração procurado no diretório atual.
pub const DEFAULT_CONFIG_FILE: &str = "jobscout.toml";

/// Configuração de nível superior carregada de `jobscout.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// Endereço do servidor WebDriver (chromedriver).
    pub webdriver_url: String,

    /// Executa o navegador sem janela.
    pub headless: bool,

    /// URL base do site de vagas.
    pub site_url: String,

    /// Arquivo declarativo de candidatos.
    pub candidates_file: PathBuf,

    /// Banco SQLite com vagas publicadas e ids já vistos.
    pub database_path: PathBuf,

    /// Diretório dos CSVs por candidato. `None` desativa a exportação.
    pub export_dir: Option<PathBuf>,

    /// Diretório raiz dos perfis persistentes do navegador.
    pub profiles_dir: PathBuf,

    /// Endpoint da API remota de vagas. `None` desativa o envio.
    pub positions_api_url: Option<String>,

    /// URL base do diretório remoto de candidatos.
    pub directory_url: String,

    /// Token Bearer do diretório de candidatos.
    pub api_token: Option<String>,

    /// Chave secreta enviada como `X-Secret-Key`/`X-API-Key`.
    pub secret_key: Option<String>,

    /// Reinícios de sessão tolerados por localização antes de pulá-la.
    pub max_session_restarts: u32,

    /// Atraso base em milissegundos antes de reiniciar uma sessão.
    pub restart_pause_ms: u64,

    /// Pausa entre localizações concluídas.
    pub location_pause_ms: u64,

    pub retry: RetryPolicy,
    pub extraction: ExtractionSettings,
    pub login: LoginPacing,
    pub locators: LocatorTable,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: false,
            site_url: "https://www.linkedin.com".to_string(),
            candidates_file: PathBuf::from("candidates.toml"),
            database_path: PathBuf::from("data/jobscout.db"),
            export_dir: Some(PathBuf::from("data/exports")),
            profiles_dir: PathBuf::from("data/profiles"),
            positions_api_url: None,
            directory_url: "https://whitebox-learning.com/".to_string(),
            api_token: None,
            secret_key: None,
            max_session_restarts: 3,
            restart_pause_ms: 5000,
            location_pause_ms: 5000,
            retry: RetryPolicy::default(),
            extraction: ExtractionSettings::default(),
            login: LoginPacing::default(),
            locators: LocatorTable::default(),
        }
    }
}

impl ScoutConfig {
    /// Carrega a configuração de `path` (ou `jobscout.toml` no diretório
    /// atual) e aplica as variáveis de ambiente.
    ///
    /// Um caminho explícito inexistente é erro; o arquivo padrão ausente
    /// resulta nos valores padrão.
    pub fn load(path: Option<&Path>) -> Result<Self, ScoutError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ScoutError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ScoutError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Variáveis de ambiente têm precedência sobre o arquivo. Valores vazios
    /// são ignorados.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("WEBDRIVER_URL") {
            self.webdriver_url = url;
        }
        if let Some(url) = get("API_URL") {
            self.positions_api_url = Some(url);
        }
        if let Some(url) = get("WEBSITE_URL") {
            self.directory_url = url;
        }
        if let Some(token) = get("API_TOKEN") {
            self.api_token = Some(token);
        }
        if let Some(secret) = get("SECRET_KEY") {
            self.secret_key = Some(secret);
        }
    }

    /// Limites do orquestrador derivados desta configuração.
    pub fn run_limits(&self) -> RunLimits {
        RunLimits {
            max_session_restarts: self.max_session_restarts,
            restart_pause_ms: self.restart_pause_ms,
            location_pause_ms: self.location_pause_ms,
        }
    }
}
