//! Fetch, transfer and delete commands.
//!
//! Every command fetches both sides first, narrows the selection to the
//! requested workspaces, then hands off to the engine.

use std::io::{self, Write};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use clap::{Args, ValueEnum};
use console::style;
use serde::Serialize;
use tabled::Tabled;

use timehop::entity::{EntityCollection, EntityGroup, EntityStore, Side};
use timehop::service::{ServiceClient, ServiceKind};
use timehop::sync::{DateRange, RunReport, TransferEngine, TransferOptions};

use crate::config::Config;
use crate::progress::ProgressReporter;

/// Output format for the fetch summary.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// Time-entry window shared by all commands.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct RangeArgs {
    /// First day of time entries to include, YYYY-MM-DD (default: config since_days back)
    #[arg(long)]
    pub since: Option<NaiveDate>,

    /// Last day of time entries to include, YYYY-MM-DD, inclusive (default: now)
    #[arg(long)]
    pub until: Option<NaiveDate>,
}

/// Which records a transfer or delete touches.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct SelectionArgs {
    /// Only touch these workspaces, by name or id (repeatable)
    #[arg(short = 'w', long = "workspace")]
    pub workspaces: Vec<String>,

    /// Leave an entity group alone, e.g. "tags" or "time-entries" (repeatable)
    #[arg(short = 's', long = "skip")]
    pub skip: Vec<EntityGroup>,

    /// Also write users and user groups (overrides config)
    #[arg(short = 'u', long)]
    pub include_users: bool,

    /// Dry run - show what would be done without making changes
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct FetchArgs {
    /// Service to read from
    #[arg(short, long)]
    pub from: ServiceKind,

    /// Service to link against
    #[arg(short, long)]
    pub to: Option<ServiceKind>,

    #[command(flatten)]
    pub range: RangeArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct TransferArgs {
    /// Service to copy from
    #[arg(short, long)]
    pub from: ServiceKind,

    /// Service to copy to
    #[arg(short, long)]
    pub to: ServiceKind,

    #[command(flatten)]
    pub range: RangeArgs,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct DeleteArgs {
    /// Service to delete from
    #[arg(short, long)]
    pub from: ServiceKind,

    #[command(flatten)]
    pub range: RangeArgs,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Record counts for one group after a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub(crate) struct GroupSummary {
    #[tabled(rename = "Group")]
    pub group: String,
    #[tabled(rename = "Source")]
    pub source: usize,
    #[tabled(rename = "Target", display_with = "display_optional")]
    pub target: Option<usize>,
    #[tabled(rename = "Linked")]
    pub linked: usize,
    #[tabled(rename = "Selected")]
    pub selected: usize,
}

#[derive(Debug, Tabled)]
struct ReportRow {
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Processed")]
    processed: usize,
    #[tabled(rename = "Skipped")]
    skipped: usize,
    #[tabled(rename = "Planned")]
    planned: usize,
}

fn display_optional(value: &Option<usize>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Handle `timehop fetch`.
pub(crate) async fn handle_fetch(
    args: FetchArgs,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    ensure_distinct(args.from, args.to)?;

    let options = TransferOptions {
        range: date_range(&args.range, config.transfer.since_days, Utc::now())?,
        include_users: config.transfer.include_users,
        ..TransferOptions::default()
    };

    let reporter = Arc::new(ProgressReporter::new());
    let mut engine = build_engine(args.from, args.to, options, config, &reporter)?;
    engine.run_fetch().await?;
    reporter.finish();

    let rows = summarize(engine.store(), engine.target_kind().is_some());
    match args.output {
        OutputFormat::Table => print_table(rows),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
    }
    Ok(())
}

/// A target, when given, must be the other service.
fn ensure_distinct(from: ServiceKind, to: Option<ServiceKind>) -> Result<(), String> {
    match to {
        Some(to) if to == from => Err("Source and target must be different services.".to_string()),
        _ => Ok(()),
    }
}

/// Handle `timehop transfer`.
pub(crate) async fn handle_transfer(
    args: TransferArgs,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    ensure_distinct(args.from, Some(args.to))?;

    let options = transfer_options(&args.range, &args.selection, config)?;
    let reporter = Arc::new(ProgressReporter::new());
    let mut engine = build_engine(args.from, Some(args.to), options, config, &reporter)?;

    engine.run_fetch().await?;
    select_workspaces(&mut engine, &args.selection.workspaces)?;
    print_table(summarize(engine.store(), true));

    let report = engine.run_create().await?;
    reporter.finish();
    print_report(&report, args.selection.dry_run);
    Ok(())
}

/// Handle `timehop delete`.
pub(crate) async fn handle_delete(
    args: DeleteArgs,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = transfer_options(&args.range, &args.selection, config)?;
    let reporter = Arc::new(ProgressReporter::new());
    let mut engine = build_engine(args.from, None, options, config, &reporter)?;

    engine.run_fetch().await?;
    select_workspaces(&mut engine, &args.selection.workspaces)?;

    let groups = EntityGroup::delete_order(engine.options().include_users)
        .into_iter()
        .filter(|g| engine.options().writes(*g))
        .collect::<Vec<_>>();
    let rows: Vec<GroupSummary> = summarize(engine.store(), false)
        .into_iter()
        .filter(|row| groups.iter().any(|g| g.label() == row.group))
        .collect();
    let total: usize = rows.iter().map(|row| row.selected).sum();
    print_table(rows);

    if total == 0 {
        println!("Nothing to delete.");
        return Ok(());
    }
    if !args.yes && !args.selection.dry_run && !confirm_delete(args.from, total)? {
        println!("Aborted.");
        return Ok(());
    }

    let report = engine.run_delete().await?;
    reporter.finish();
    print_report(&report, args.selection.dry_run);
    Ok(())
}

fn transfer_options(
    range: &RangeArgs,
    selection: &SelectionArgs,
    config: &Config,
) -> Result<TransferOptions, String> {
    Ok(TransferOptions {
        range: date_range(range, config.transfer.since_days, Utc::now())?,
        include_users: selection.include_users || config.transfer.include_users,
        skip: selection.skip.clone(),
        dry_run: selection.dry_run,
    })
}

fn build_engine(
    from: ServiceKind,
    to: Option<ServiceKind>,
    options: TransferOptions,
    config: &Config,
    reporter: &Arc<ProgressReporter>,
) -> Result<TransferEngine, Box<dyn std::error::Error>> {
    let source = ServiceClient::new(&config.service_settings(from)?)?;
    let mut builder = TransferEngine::builder()
        .source(source)
        .options(options)
        .progress(reporter.as_callback());
    if let Some(to) = to {
        builder = builder.target(ServiceClient::new(&config.service_settings(to)?)?);
    }
    Ok(builder.build()?)
}

/// Time-entry window from the flags, falling back to `since_days` back from `now`.
pub(crate) fn date_range(
    range: &RangeArgs,
    since_days: i64,
    now: DateTime<Utc>,
) -> Result<DateRange, String> {
    let start = match range.since {
        Some(day) => day.and_time(NaiveTime::MIN).and_utc(),
        None => now - Duration::days(since_days),
    };
    let end = match range.until {
        Some(day) => day.and_time(NaiveTime::MIN).and_utc() + Duration::days(1),
        None => now,
    };
    if start >= end {
        return Err(format!(
            "Empty date range: {} is not before {}.",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        ));
    }
    Ok(DateRange::new(start, end))
}

/// Inclusion flag for every source workspace given the requested names or
/// ids, plus any request that matched nothing.
pub(crate) fn workspace_choices(
    workspaces: &EntityCollection,
    wanted: &[String],
) -> (Vec<(String, bool)>, Vec<String>) {
    let matches = |w: &str, id: &str, name: &str| w == id || w.eq_ignore_ascii_case(name);

    let choices = workspaces
        .iter()
        .map(|ws| {
            let included = wanted.iter().any(|w| matches(w, &ws.id, &ws.name));
            (ws.id.clone(), included)
        })
        .collect();
    let unknown = wanted
        .iter()
        .filter(|w| !workspaces.iter().any(|ws| matches(w, &ws.id, &ws.name)))
        .cloned()
        .collect();
    (choices, unknown)
}

fn select_workspaces(engine: &mut TransferEngine, wanted: &[String]) -> Result<(), String> {
    if wanted.is_empty() {
        return Ok(());
    }

    let workspaces = engine
        .store()
        .collection(EntityGroup::Workspaces, Side::Source);
    let (choices, unknown) = workspace_choices(workspaces, wanted);
    if !unknown.is_empty() {
        let available: Vec<&str> = workspaces.iter().map(|ws| ws.name.as_str()).collect();
        return Err(format!(
            "Unknown workspace(s): {}. Available: {}",
            unknown.join(", "),
            available.join(", ")
        ));
    }

    for (id, included) in choices {
        engine.set_workspace_included(&id, included);
    }
    Ok(())
}

/// Per-group counts; `selected` counts included records in included workspaces.
pub(crate) fn summarize(store: &EntityStore, with_target: bool) -> Vec<GroupSummary> {
    EntityGroup::FETCH_ORDER
        .into_iter()
        .map(|group| {
            let source = store.collection(group, Side::Source);
            let selected = source
                .iter()
                .filter(|r| r.is_included)
                .filter(|r| {
                    group == EntityGroup::Workspaces || store.is_workspace_included(&r.workspace_id)
                })
                .count();
            GroupSummary {
                group: group.label().to_string(),
                source: source.len(),
                target: with_target.then(|| store.collection(group, Side::Target).len()),
                linked: source.linked_count(),
                selected,
            }
        })
        .collect()
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    let mut table = tabled::Table::new(rows);
    table.with(tabled::settings::Style::rounded());
    println!("{}", table);
}

fn print_report(report: &RunReport, dry_run: bool) {
    let rows: Vec<ReportRow> = report
        .groups
        .iter()
        .filter(|g| g.processed > 0)
        .map(|g| ReportRow {
            group: g.group.label().to_string(),
            processed: g.processed,
            skipped: g.skipped,
            planned: g.planned,
        })
        .collect();

    if rows.is_empty() {
        println!("{} Nothing to {}.", style("✓").green().bold(), report.operation);
        return;
    }
    print_table(rows);

    let suffix = if dry_run { " (dry run)" } else { "" };
    println!(
        "{} {} {} record(s), {} skipped{}",
        style("✓").green().bold(),
        report.operation,
        report.total_processed(),
        report.total_skipped(),
        suffix
    );
}

fn confirm_delete(from: ServiceKind, total: usize) -> io::Result<bool> {
    println!(
        "{} About to delete {} record{} from {}",
        style("⚠").yellow().bold(),
        total,
        if total == 1 { "" } else { "s" },
        style(from).cyan()
    );
    print!("Continue? [y/N] ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
