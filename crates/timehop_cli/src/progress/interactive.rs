use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use timehop::entity::{EntityGroup, Operation};
use timehop::sync::{Outcome, SyncProgress};

#[derive(Default)]
struct ProgressState {
    /// One bar per group of the running operation.
    bars: HashMap<EntityGroup, ProgressBar>,
    /// Group currently being fetched, for page updates.
    fetching: Option<EntityGroup>,
    /// Last link result, shown once the group is fetched.
    linked: HashMap<EntityGroup, usize>,
}

/// Interactive progress reporter using indicatif.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    fn add_bar(&self, group: EntityGroup, total: Option<usize>) -> ProgressBar {
        let pb = match total {
            Some(len) => {
                let bar = self.multi.add(ProgressBar::new(len as u64));
                bar.set_style(Self::bar_style());
                bar
            }
            None => {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(Self::spinner_style());
                bar.enable_steady_tick(Duration::from_millis(100));
                bar
            }
        };
        pb.set_prefix(format!("{:14}", group.label()));
        pb
    }

    fn println(&self, line: String) {
        // Only fails when the terminal is gone.
        let _ = self.multi.println(line);
    }

    pub fn handle(&self, event: SyncProgress) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        match event {
            SyncProgress::OperationStarted { operation, groups } => {
                state.bars.clear();
                state.linked.clear();
                self.println(format!(
                    "{} {} ({} groups)",
                    style("▶").cyan().bold(),
                    verb(operation),
                    groups.len()
                ));
            }

            SyncProgress::ResolvingWorkspaces { pending } if pending > 0 => {
                self.println(format!(
                    "  {} creating {} missing workspace{}",
                    style("•").cyan(),
                    pending,
                    if pending == 1 { "" } else { "s" }
                ));
            }

            SyncProgress::GroupStarted {
                operation,
                group,
                total,
            } => {
                let pb = self.add_bar(group, total);
                pb.set_message(format!("{}...", verb(operation)));
                if operation == Operation::Fetch {
                    state.fetching = Some(group);
                }
                state.bars.insert(group, pb);
            }

            SyncProgress::PageFetched { page, count, .. } => {
                if let Some(group) = state.fetching
                    && let Some(pb) = state.bars.get(&group)
                {
                    pb.set_message(format!("page {page} ({count} rows)"));
                }
            }

            SyncProgress::Linked { group, linked, .. } => {
                state.linked.insert(group, linked);
            }

            SyncProgress::GroupFetched {
                group,
                source,
                target,
            } => {
                let linked = state.linked.get(&group).copied();
                if let Some(pb) = state.bars.get(&group) {
                    let msg = match (target, linked) {
                        (Some(target), Some(linked)) => {
                            format!("{source} source, {target} target, {linked} linked")
                        }
                        _ => format!("{source} records"),
                    };
                    pb.finish_with_message(msg);
                }
                state.fetching = None;
            }

            SyncProgress::RecordProcessed {
                group, completed, ..
            } => {
                if let Some(pb) = state.bars.get(&group) {
                    pb.set_position(completed as u64);
                }
            }

            SyncProgress::RecordSkipped {
                group, name, error, ..
            } => {
                self.println(format!(
                    "  {} skipped {} '{}': {}",
                    style("⚠").yellow().bold(),
                    group.label(),
                    name,
                    error
                ));
            }

            SyncProgress::GroupComplete {
                operation,
                group,
                completed,
            } => {
                if let Some(pb) = state.bars.get(&group) {
                    pb.finish_with_message(format!("{completed} {}", past(operation)));
                }
            }

            SyncProgress::RateLimitBackoff {
                service,
                retry_after_ms,
                attempt,
                ..
            } => {
                let active = state.bars.values().find(|pb| !pb.is_finished());
                let msg = format!(
                    "{service} rate limited, retrying in {}s (attempt {attempt})",
                    retry_after_ms / 1000
                );
                match active {
                    Some(pb) => pb.set_message(msg),
                    None => self.println(format!("  {} {msg}", style("⏳").yellow())),
                }
            }

            SyncProgress::OperationFinished { operation, outcome } => {
                for pb in state.bars.values() {
                    if !pb.is_finished() {
                        pb.abandon();
                    }
                }
                let mark = match outcome {
                    Outcome::Success => style("✓").green().bold(),
                    Outcome::Failed => style("✗").red().bold(),
                };
                self.println(format!("{mark} {} {}", verb(operation), outcome_word(outcome)));
            }

            SyncProgress::Warning { message } => {
                self.println(format!("  {} {message}", style("⚠").yellow().bold()));
            }

            _ => {}
        }
    }

    pub fn finish(&self) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        for pb in state.bars.values() {
            if !pb.is_finished() {
                pb.finish();
            }
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>4}/{len:4} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn verb(operation: Operation) -> &'static str {
    match operation {
        Operation::Fetch => "Fetching",
        Operation::Create => "Creating",
        Operation::Delete => "Deleting",
    }
}

fn past(operation: Operation) -> &'static str {
    match operation {
        Operation::Fetch => "fetched",
        Operation::Create => "created",
        Operation::Delete => "deleted",
    }
}

fn outcome_word(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Success => "finished",
        Outcome::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bars_follow_group_lifecycle() {
        let reporter = InteractiveReporter::new();
        reporter.multi.set_draw_target(indicatif::ProgressDrawTarget::hidden());

        reporter.handle(SyncProgress::GroupStarted {
            operation: Operation::Create,
            group: EntityGroup::Tags,
            total: Some(2),
        });
        reporter.handle(SyncProgress::RecordProcessed {
            operation: Operation::Create,
            group: EntityGroup::Tags,
            completed: 1,
            total: 2,
        });

        {
            let state = reporter.state.lock().unwrap();
            let pb = state.bars.get(&EntityGroup::Tags).expect("tags bar");
            assert_eq!(pb.position(), 1);
            assert_eq!(pb.length(), Some(2));
        }

        reporter.handle(SyncProgress::GroupComplete {
            operation: Operation::Create,
            group: EntityGroup::Tags,
            completed: 2,
        });
        let state = reporter.state.lock().unwrap();
        assert!(state.bars[&EntityGroup::Tags].is_finished());
    }

    #[test]
    fn test_fetch_tracks_current_group() {
        let reporter = InteractiveReporter::new();
        reporter.multi.set_draw_target(indicatif::ProgressDrawTarget::hidden());

        reporter.handle(SyncProgress::GroupStarted {
            operation: Operation::Fetch,
            group: EntityGroup::TimeEntries,
            total: None,
        });
        assert_eq!(
            reporter.state.lock().unwrap().fetching,
            Some(EntityGroup::TimeEntries)
        );

        reporter.handle(SyncProgress::GroupFetched {
            group: EntityGroup::TimeEntries,
            source: 3,
            target: None,
        });
        let state = reporter.state.lock().unwrap();
        assert!(state.fetching.is_none());
        assert!(state.bars[&EntityGroup::TimeEntries].is_finished());
    }

    #[test]
    fn test_verbs() {
        assert_eq!(verb(Operation::Delete), "Deleting");
        assert_eq!(past(Operation::Create), "created");
    }
}
