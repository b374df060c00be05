//! Interface de terminal do jobscout: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`RunProgress`] acompanha visualmente a
//! execução de um candidato no terminal.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::orchestrator::{CandidateOutcome, RunSummary};

/// Indicador visual de progresso para a execução de um candidato.
///
/// Exibe um spinner animado durante a busca e mensagens coloridas para
/// sucesso (verde), localização pulada (vermelho) e reinício (amarelo).
pub struct RunProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl RunProgress {
    /// Inicia o spinner para o candidato.
    pub fn start(candidate_id: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(format!("{candidate_id}: starting"));
        pb.enable_steady_tick(Duration::from_millis(100));
        Self::with_bar(pb)
    }

    /// Progresso sem saída, para testes e execuções não interativas.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(pb: ProgressBar) -> Self {
        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza a mensagem do spinner com a busca atual.
    pub fn searching(&self, candidate_id: &str, location: &str, radius: u32) {
        self.pb
            .set_message(format!("{candidate_id}: {location} within {radius} mi"));
    }

    /// Exibe um reinício de sessão com o número da tentativa e o motivo.
    pub fn restart(&self, attempt: u32, max: u32, reason: &str) {
        self.pb.println(format!(
            "  {} Restart {attempt}/{max}: {reason}",
            self.yellow.apply_to("↻")
        ));
    }

    pub fn skipped(&self, location: &str, reason: &str) {
        self.pb.println(format!(
            "  {} Skipped {location}: {reason}",
            self.red.apply_to("✗")
        ));
    }

    /// Finaliza o spinner e exibe o resumo do candidato.
    pub fn complete(&self, summary: &RunSummary) {
        self.pb.finish_and_clear();
        let mark = match summary.outcome {
            CandidateOutcome::Completed | CandidateOutcome::QuotaReached => {
                self.green.apply_to("✓")
            }
            CandidateOutcome::Disabled | CandidateOutcome::NoLocations => {
                self.yellow.apply_to("–")
            }
        };
        println!("  {mark} {}", summary_line(summary));
    }
}

/// Uma linha de resumo por candidato.
pub fn summary_line(summary: &RunSummary) -> String {
    format!(
        "{}: {} | {} published, {} locations done, {} skipped, {} restarts",
        summary.candidate_id,
        summary.outcome,
        summary.published,
        summary.locations_done,
        summary.locations_skipped,
        summary.session_restarts
    )
}

/// Imprime os totais da execução inteira.
pub fn print_totals(summaries: &[RunSummary]) {
    let bold = Style::new().bold();
    let published: u32 = summaries.iter().map(|s| s.published).sum();
    let skipped: u32 = summaries.iter().map(|s| s.locations_skipped).sum();
    let restarts: u32 = summaries.iter().map(|s| s.session_restarts).sum();
    println!();
    println!("{}", bold.apply_to("─── Run Summary ───"));
    println!("  candidates:         {}", summaries.len());
    println!("  postings published: {published}");
    println!("  locations skipped:  {skipped}");
    println!("  session restarts:   {restarts}");
}
