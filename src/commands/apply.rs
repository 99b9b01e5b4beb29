//! `keel apply`: reconcile an environment until it matches its declaration
//!
//! A run that ends with a requeue request, or fails with a transient error,
//! is started again with backoff until it converges or the retry budget or
//! `--timeout` runs out.

use super::{Environment, Target, diff};
use crate::Context;
use crate::api::ApiClient;
use crate::cli::ApplyArgs;
use crate::progress::SpinnerReporter;
use crate::retry::{PrintCallback, RetryCallback, RetryConfig, with_retry};
use crate::ui;
use anyhow::{Context as _, Result};
use colored::Colorize;
use controller::{
    CompositeReconciler, Error, NoProgress, ProgressReporter, RefreshErrorPolicy, SyncAction,
    SynchronizeOpts, synchronize,
};
use std::sync::Arc;
use std::time::Duration;

pub fn run(ctx: &Context, target: Target, args: ApplyArgs) -> Result<()> {
    let settings = super::settings(ctx)?;
    let jobs = args.jobs.unwrap_or(settings.jobs).max(1);
    let run = args.timeout.map_or_else(controller::Context::new, |secs| {
        controller::Context::with_timeout(Duration::from_secs(secs))
    });

    let env = Environment::load(target, &args.file, settings, run)?;
    let plan = controller::plan(&env.plan_opts())
        .with_context(|| format!("Could not plan {}", env.title()))?;

    if !ctx.quiet {
        diff::display_plan(&env.title(), &plan);
    }
    let summary = plan.summary();
    if !summary.has_changes() {
        return Ok(());
    }
    if summary.delete > 0 {
        println!();
        ui::warn(&format!("{} resource(s) will be deleted", summary.delete));
    }

    if args.dry_run {
        println!();
        ui::info("Dry run - no changes made");
        return Ok(());
    }

    if !args.yes {
        println!();
        if !confirm_proceed()? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    if target == Target::Cluster {
        env.record_cluster_id()?;
    }

    let client = Arc::new(ApiClient::new(
        env.settings.api_url.as_str(),
        Arc::clone(&env.state),
        env.output.clone(),
    ));
    let progress: Arc<dyn ProgressReporter> = if ctx.quiet {
        Arc::new(NoProgress)
    } else {
        Arc::new(SpinnerReporter::new())
    };
    let mut registry = CompositeReconciler::standard(&client, client.addons(), progress);
    log::info!(
        "Applying {} declaration {} through {} with {jobs} job(s)",
        target.as_str(),
        args.file,
        client.api_base()
    );
    log::debug!("Artifacts are written to {}", env.output.root().display());

    let mut actions: Vec<SyncAction> = Vec::new();
    let callback = PrintCallback;
    let callback: Option<&dyn RetryCallback> = if ctx.quiet { None } else { Some(&callback) };

    let retry = if args.no_retry {
        RetryConfig::no_retry()
    } else {
        env.settings.retry.clone()
    };

    let result = with_retry(&retry, callback, || {
        let report = synchronize(SynchronizeOpts {
            plan: env.plan_opts(),
            reconciler: &mut registry,
            refresh_policy: RefreshErrorPolicy::Propagate,
            jobs,
        })?;
        actions.extend(report.actions);

        if report.requeue {
            return Err(Error::timeout("resources are not ready yet"));
        }
        Ok(())
    });

    print_summary(&env.title(), &actions, result.is_ok());
    if !ctx.quiet {
        ui::dim(&format!("State recorded in {}", env.state.path().display()));
    }
    result.with_context(|| format!("Could not apply {}", env.title()))
}

/// Ask for confirmation
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

fn print_summary(title: &str, actions: &[SyncAction], success: bool) {
    let created = actions.iter().filter(|a| a.state.is_present()).count();
    let deleted = actions.iter().filter(|a| a.state.is_absent()).count();

    println!();
    if success {
        println!("  {} {} applied successfully!", "✓".green().bold(), title);
    } else {
        println!("  {} {} applied with errors", "⚠".yellow().bold(), title);
    }

    if created > 0 {
        println!("    • {created} resources created");
    }
    if deleted > 0 {
        println!("    • {deleted} resources deleted");
    }
}
