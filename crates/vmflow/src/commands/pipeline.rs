use super::Context;
use crate::progress::StageProgress;
use crate::utils::{self, StdinConfirm};
use colored::Colorize;
use std::sync::Arc;
use tokio::sync::watch;
use vmflow_ansible::VarBag;
use vmflow_pipeline::{Entry, Outcome, exit_code};

/// Run one pipeline entry and return the process exit code
pub async fn handle(
    ctx: &Context,
    entry: Entry,
    overrides: VarBag,
    insecure: bool,
) -> anyhow::Result<i32> {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let orchestrator = ctx
        .orchestrator(insecure)?
        .with_observer(Arc::new(StageProgress::new()))
        .with_confirm(Arc::new(StdinConfirm))
        .with_overrides(overrides)
        .with_cancel(cancel_rx.clone());

    eprintln!(
        "{} {} in {}",
        "vmflow".cyan().bold(),
        entry.name().bold(),
        ctx.workspace.project_dir().display()
    );

    // The terminal delivers SIGINT to terraform and ansible as well. Let them
    // shut down on their own and stop before the next stage.
    let interrupts = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!();
        eprintln!(
            "{} finishing the current stage, press Ctrl-C again to abort",
            "Interrupted,".yellow().bold()
        );
        let _ = cancel_tx.send(true);

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(exit_code::CANCELLED);
        }
    });

    let report = orchestrator.run(entry).await;
    interrupts.abort();

    if matches!(report.outcome, Outcome::Cancelled) && *cancel_rx.borrow() {
        eprintln!();
        eprintln!(
            "{} re-run `vmflow {}` to continue from the current state",
            "Interrupted,".yellow().bold(),
            entry.name()
        );
        return Ok(exit_code::CANCELLED);
    }

    utils::print_report(&report);
    Ok(report.exit_code())
}
