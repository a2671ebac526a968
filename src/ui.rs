//! Apresentação de itens no terminal: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`ConsolePresenter`] implementa
//! [`PresentationDelegate`] e acompanha visualmente cada item da fila.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::RunnerConfig;
use crate::delegate::{InteractionCallback, PresentationDelegate, StepOutcome};
use crate::runner::{RunState, WorkItem};

/// Delegate de terminal para o runner.
///
/// Exibe um spinner animado enquanto um item está em andamento e mensagens
/// coloridas para concluído (verde), pulado (amarelo) e erros (vermelho).
/// Todas as etapas terminam de forma síncrona; a `duration` de cada item
/// decide quando ele avança.
pub struct ConsolePresenter {
    // Spinner do item atual, se houver.
    pb: Mutex<Option<ProgressBar>>,
    // Itens exibidos até agora.
    shown: Mutex<usize>,
    // Estilo verde para itens concluídos.
    green: Style,
    // Estilo vermelho para erros.
    red: Style,
    // Estilo amarelo para itens pulados.
    yellow: Style,
    // Estilo para o cabeçalho e o resumo.
    dim: Style,
}

impl Default for ConsolePresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsolePresenter {
    pub fn new() -> Self {
        Self {
            pb: Mutex::new(None),
            shown: Mutex::new(0),
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    // Remove o spinner atual antes de imprimir uma linha fixa.
    fn clear_spinner(&self) {
        let pb = self.pb.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
    }
}

impl PresentationDelegate for ConsolePresenter {
    fn initialize(&self, config: &RunnerConfig, _interaction: InteractionCallback) -> StepOutcome {
        *self.shown.lock().unwrap_or_else(PoisonError::into_inner) = 0;
        let order = if config.priority_based { "priority" } else { "input" };
        println!("{}", self.dim.apply_to(format!("─── Runner ({order} order) ───")));
        StepOutcome::done()
    }

    fn show(&self, item: &WorkItem, _config: &RunnerConfig) -> StepOutcome {
        let index = {
            let mut shown = self.shown.lock().unwrap_or_else(PoisonError::into_inner);
            *shown += 1;
            *shown
        };

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("#{index} {}", item.label()));
        pb.enable_steady_tick(Duration::from_millis(100));

        let previous = self
            .pb
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(pb);
        if let Some(previous) = previous {
            previous.finish_and_clear();
        }
        StepOutcome::done()
    }

    fn hide(&self) -> StepOutcome {
        self.clear_spinner();
        StepOutcome::done()
    }

    fn update_content(&self, item: &WorkItem) -> StepOutcome {
        self.clear_spinner();
        println!("  {} {}", self.green.apply_to("✓"), item.label());
        StepOutcome::done()
    }

    fn skip(&self) -> StepOutcome {
        self.clear_spinner();
        println!("  {} skipped", self.yellow.apply_to("↷"));
        StepOutcome::done()
    }

    fn finish(&self, state: &RunState) -> StepOutcome {
        self.clear_spinner();
        for error in &state.errors {
            println!("  {} {}", self.red.apply_to("✗"), error.message);
        }
        println!(
            "{}",
            self.dim.apply_to(format!(
                "─── {} done, {} skipped, {} errors ───",
                state.completed_data.len(),
                state.skipped_data.len(),
                state.errors.len()
            ))
        );
        StepOutcome::done()
    }

    fn destroy(&self) -> StepOutcome {
        self.clear_spinner();
        StepOutcome::done()
    }
}
