//! The three backend sessions a run depends on

use crate::cli::{CliSession, ProcessCliInvoker};
use crate::graph::GraphSession;
use crate::shell::ShellSession;
use tenantscan_common::Config;
use tenantscan_core::Result;
use tracing::info;

/// Live handles on every backend, created once per run
pub struct Sessions {
    pub shell: ShellSession,
    pub cli: CliSession,
    pub graph: GraphSession,
}

impl Sessions {
    pub fn new(shell: ShellSession, cli: CliSession, graph: GraphSession) -> Self {
        Self { shell, cli, graph }
    }

    /// Create and verify every session in order: shell, CLI, graph.
    ///
    /// Any error returned here is fatal to the run.
    pub async fn establish(config: &Config) -> Result<Self> {
        let timeout = config.engine.command_timeout();

        info!("Creating the shell session");
        let shell = ShellSession::spawn(&config.shell, timeout)?;
        shell.bootstrap(&config.shell.setup).await?;
        shell.check_session().await?;
        info!("Shell session ready");

        info!("Creating the CLI session");
        let mut cli = CliSession::new(ProcessCliInvoker::new(&config.cli), timeout);
        cli.create_session(&config.cli).await?;
        cli.check_session().await?;
        info!("CLI session ready");

        info!("Creating the graph session");
        let graph = GraphSession::create_session(&cli, &config.graph).await?;
        graph.check_session()?;
        info!("Graph session ready");

        Ok(Self::new(shell, cli, graph))
    }
}
