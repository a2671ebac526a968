//! Interface de linha de comando do sequencer baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, order, demo)
//! e flags globais (--config, --priority, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// sequencer: Executa filas de itens em sequência com apresentação no terminal.
#[derive(Debug, Parser)]
#[command(name = "sequencer", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho para o arquivo de configuração TOML (padrão: sequencer.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Força a ordenação por prioridade, independente da configuração.
    #[arg(long, global = true, default_value_t = false)]
    pub priority: bool,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Executa os itens de um arquivo JSON ou TOML.
    Run {
        /// Caminho para o arquivo de itens.
        file: PathBuf,

        /// Delegate de apresentação registrado a usar.
        #[arg(long, default_value = "console")]
        delegate: String,
    },

    /// Mostra a ordem em que os itens seriam executados, sem executá-los.
    Order {
        /// Caminho para o arquivo de itens.
        file: PathBuf,
    },

    /// Executa a demonstração embutida do runner.
    Demo,
}
