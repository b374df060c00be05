//! Interface de linha de comando do jobscout baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, candidates,
//! status) e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// jobscout: descoberta de vagas para múltiplos candidatos.
#[derive(Debug, Parser)]
#[command(name = "jobscout", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: `jobscout.toml`).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Executa a extração para todos os candidatos habilitados.
    Run {
        /// Processa apenas o candidato com este id.
        #[arg(long)]
        only: Option<String>,

        /// Executa o navegador sem janela.
        #[arg(long)]
        headless: bool,

        /// Não grava os CSVs por candidato.
        #[arg(long)]
        no_export: bool,

        /// Arquivo de candidatos, sobrepondo a configuração.
        #[arg(long)]
        candidates: Option<PathBuf>,
    },

    /// Lista os candidatos resolvidos sem abrir o navegador.
    Candidates,

    /// Mostra as contagens do banco local.
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from(["jobscout", "run", "--only", "c1", "--headless"]);
        match cli.command {
            Command::Run {
                only,
                headless,
                no_export,
                candidates,
            } => {
                assert_eq!(only.as_deref(), Some("c1"));
                assert!(headless);
                assert!(!no_export);
                assert!(candidates.is_none());
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from(["jobscout", "status", "--config", "alt.toml", "-v"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn cli_parses_candidates_subcommand() {
        let cli = Cli::parse_from(["jobscout", "candidates"]);
        assert!(matches!(cli.command, Command::Candidates));
        assert!(!cli.verbose);
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
