//! `timetable` CLI: inspect and rearrange a conference timetable stored as JSON.
//!
//! ## Usage
//!
//! ```sh
//! # List every day with its entries
//! timetable show -i conference.json
//!
//! # Check every placement rule
//! timetable validate -i conference.json
//!
//! # Earliest free 45 minutes inside a block on a day
//! timetable gap -i conference.json --day 2026-03-16 --minutes 45 --block 1
//!
//! # Swap an entry with the one after it and save the result
//! timetable swap -i conference.json -o conference.json --entry 4 --direction down
//!
//! # Lay out a day back to back with 5 minute gaps
//! timetable reschedule -i conference.json --day 2026-03-16 --mode time --gap 5
//! ```
//!
//! Mutating subcommands print the change report as JSON on stdout. Logs go to
//! stderr; `--verbose` or `RUST_LOG` controls how much.

mod config;

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand, ValueEnum};
use timetable_engine::dst::parse_timezone;
use timetable_engine::placement::{self, schedule_in_gap};
use timetable_engine::reorder::{self, move_with_shift, shift_following};
use timetable_engine::reschedule::reschedule;
use timetable_engine::timetable::{DayView, EntryView};
use timetable_engine::{
    find_earliest_gap, ChangeReport, ChangeScope, Container, ContributionId, Direction, EntryId,
    EntryKind, EntryObject, RescheduleMode, RescheduleOptions, RescheduleTarget, SessionFilter,
    SessionId, Timetable,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use config::{CliConfig, Policy};

#[derive(Parser)]
#[command(
    name = "timetable",
    version,
    about = "Inspect and rearrange conference timetables"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    common: Common,
}

#[derive(Args)]
struct Common {
    /// Timetable JSON file (reads from stdin if omitted)
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,
    /// Write the updated timetable here
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Principal to act as (overrides the config)
    #[arg(long, global = true)]
    principal: Option<String>,
    /// Log every mutation
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List every day with its entries
    Show {
        /// Print the day view as JSON
        #[arg(long)]
        json: bool,
        /// Render times in this IANA timezone instead of the event's
        #[arg(long)]
        tz: Option<String>,
    },
    /// Check every placement rule and list violations
    Validate,
    /// Find the earliest free slot on a day
    Gap {
        #[arg(long)]
        day: NaiveDate,
        #[arg(long)]
        minutes: i64,
        /// Look inside this session-block entry instead of the event
        #[arg(long)]
        block: Option<u64>,
    },
    /// Schedule a contribution at the earliest free slot on a day
    Schedule {
        #[arg(long)]
        contribution: u64,
        /// Session-block entry to schedule into
        #[arg(long)]
        block: Option<u64>,
        #[arg(long)]
        day: NaiveDate,
    },
    /// Move an entry to another day at the same time of day
    MoveDay {
        #[arg(long)]
        entry: u64,
        #[arg(long)]
        day: NaiveDate,
    },
    /// Append an entry to a session block
    MoveParent {
        #[arg(long)]
        entry: u64,
        #[arg(long)]
        parent: u64,
    },
    /// Unschedule an entry (and the children of a block)
    Delete {
        #[arg(long)]
        entry: u64,
    },
    /// Swap an entry with its neighbor
    Swap {
        #[arg(long)]
        entry: u64,
        #[arg(long, value_enum)]
        direction: DirectionArg,
        /// Only consider entries of the same session
        #[arg(long)]
        same_session: bool,
    },
    /// Shift the entries following an entry
    Shift {
        #[arg(long)]
        entry: u64,
        #[arg(long, allow_hyphen_values = true)]
        minutes: i64,
        /// Move the entry itself along with the ones after it
        #[arg(long)]
        with_entry: bool,
        #[arg(long)]
        same_session: bool,
    },
    /// Shrink a session block to its children
    Fit {
        #[arg(long)]
        entry: u64,
    },
    /// Give an entry a new start and duration, pushing colliding siblings aside
    Resize {
        #[arg(long)]
        entry: u64,
        /// RFC 3339 start, e.g. 2026-03-16T10:00:00Z
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        minutes: i64,
    },
    /// Lay out a day or a block again
    Reschedule {
        #[arg(long, conflicts_with = "block", required_unless_present = "block")]
        day: Option<NaiveDate>,
        #[arg(long)]
        block: Option<u64>,
        #[arg(long, value_enum, default_value_t = ModeArg::Time)]
        mode: ModeArg,
        /// Minutes between entries (overrides the config)
        #[arg(long)]
        gap: Option<i64>,
        #[arg(long)]
        fit_blocks: bool,
        /// Only reschedule entries of this session (day target only)
        #[arg(long)]
        session: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionArg {
    Up,
    Down,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Up => Direction::Up,
            DirectionArg::Down => Direction::Down,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    None,
    Time,
    Duration,
}

impl From<ModeArg> for RescheduleMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::None => RescheduleMode::None,
            ModeArg::Time => RescheduleMode::Time,
            ModeArg::Duration => RescheduleMode::Duration,
        }
    }
}

fn session_filter(same_session: bool) -> SessionFilter {
    if same_session {
        SessionFilter::SameSession
    } else {
        SessionFilter::Any
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.common.verbose);

    let mut config = CliConfig::load(cli.common.config.as_deref())?;
    if let Some(principal) = cli.common.principal.clone() {
        config.principal = principal;
    }
    let mut timetable = Timetable::from_json(&read_input(cli.common.input.as_deref())?)
        .context("Failed to parse timetable JSON")?;
    debug!(principal = %config.principal, entries = timetable.entries().count(), "loaded timetable");

    match cli.command {
        Commands::Show { json, tz } => {
            let days = timetable.day_view()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&days)?);
            } else {
                let tz = match tz {
                    Some(name) => parse_timezone(&name)?,
                    None => timetable.timezone(),
                };
                print!("{}", render_days(tz, &days));
            }
            return Ok(());
        }
        Commands::Validate => {
            let violations = timetable.validate();
            for violation in &violations {
                println!("{violation}");
            }
            if !violations.is_empty() {
                bail!("{} violation(s) found", violations.len());
            }
            println!("ok");
            return Ok(());
        }
        Commands::Gap { day, minutes, block } => {
            let container = block.map_or(Container::Event, |b| Container::Block(EntryId(b)));
            match find_earliest_gap(&timetable, container, day, minutes_to_duration(minutes)?)? {
                Some(slot) => println!("{}", serde_json::to_string(&slot)?),
                None => bail!("No free slot of {minutes} minutes on {day}"),
            }
            return Ok(());
        }
        command => {
            let report = run_mutation(&mut timetable, &config, command)?;
            info!(changed = report.len(), "change committed");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if let Some(path) = cli.common.output.as_deref() {
        std::fs::write(path, timetable.to_json()?)
            .with_context(|| format!("Failed to write file: {}", path.display()))?;
    }
    Ok(())
}

/// Run one mutating subcommand inside a change scope and commit it.
fn run_mutation(timetable: &mut Timetable, config: &CliConfig, command: Commands) -> Result<ChangeReport> {
    let policy = Policy::new(&config.scheduling, timetable);
    let mut scope = timetable
        .track_changes(config.principal.as_str(), &policy)
        .with_auto_extend(config.scheduling.auto_extend);
    apply(&mut scope, config, command)?;
    Ok(scope.commit()?)
}

fn apply(scope: &mut ChangeScope<'_>, config: &CliConfig, command: Commands) -> Result<()> {
    match command {
        Commands::Schedule {
            contribution,
            block,
            day,
        } => {
            let container = block.map_or(Container::Event, |b| Container::Block(EntryId(b)));
            let object = EntryObject::Contribution(ContributionId(contribution));
            let entry = schedule_in_gap(scope, object, container, day)?;
            debug!(%entry, "scheduled into earliest gap");
        }
        Commands::MoveDay { entry, day } => placement::move_to_day(scope, EntryId(entry), day)?,
        Commands::MoveParent { entry, parent } => {
            placement::move_to_parent(scope, EntryId(entry), EntryId(parent))?
        }
        Commands::Delete { entry } => placement::delete(scope, EntryId(entry))?,
        Commands::Swap {
            entry,
            direction,
            same_session,
        } => {
            let swapped = reorder::swap(
                scope,
                EntryId(entry),
                direction.into(),
                session_filter(same_session),
            )?;
            if swapped.is_none() {
                info!(entry, "nothing to swap with");
            }
        }
        Commands::Shift {
            entry,
            minutes,
            with_entry,
            same_session,
        } => {
            let entry = EntryId(entry);
            let delta = minutes_to_duration(minutes)?;
            let filter = session_filter(same_session);
            if with_entry {
                let start = scope.timetable().entry(entry)?.start + delta;
                move_with_shift(scope, entry, start, filter)?;
            } else {
                shift_following(scope, entry, delta, filter)?;
            }
        }
        Commands::Fit { entry } => {
            reorder::fit(scope, EntryId(entry))?;
        }
        Commands::Resize {
            entry,
            start,
            minutes,
        } => placement::resize(scope, EntryId(entry), start, minutes_to_duration(minutes)?)?,
        Commands::Reschedule {
            day,
            block,
            mode,
            gap,
            fit_blocks,
            session,
        } => {
            let target = match (day, block) {
                (_, Some(block)) => RescheduleTarget::Block(EntryId(block)),
                (Some(day), None) => RescheduleTarget::Day(day),
                (None, None) => bail!("reschedule needs --day or --block"),
            };
            let options = RescheduleOptions {
                mode: mode.into(),
                gap: minutes_to_duration(gap.unwrap_or(config.reschedule.gap_minutes))?,
                fit_blocks: fit_blocks || config.reschedule.fit_blocks,
                session: session.map(SessionId),
            };
            reschedule(scope, target, &options)?;
        }
        Commands::Show { .. } | Commands::Validate | Commands::Gap { .. } => {
            bail!("not a mutating command")
        }
    }
    Ok(())
}

fn minutes_to_duration(minutes: i64) -> Result<Duration> {
    Duration::try_minutes(minutes).with_context(|| format!("Duration out of range: {minutes} minutes"))
}

/// Plain-text day listing in the event's timezone.
fn render_days(tz: Tz, days: &[DayView]) -> String {
    let mut out = String::new();
    for day in days {
        out.push_str(&format!("{}\n", day.day));
        for entry in &day.entries {
            render_entry(tz, entry, 1, &mut out);
        }
    }
    out
}

fn render_entry(tz: Tz, entry: &EntryView, depth: usize, out: &mut String) {
    out.push_str(&format!(
        "{indent}{start}-{end}  #{id:<4} {kind:<14} {title}\n",
        indent = "  ".repeat(depth),
        kind = kind_label(entry.kind),
        start = entry.span.start.with_timezone(&tz).format("%H:%M"),
        end = entry.span.end.with_timezone(&tz).format("%H:%M"),
        id = entry.id.0,
        title = entry.title,
    ));
    for child in &entry.children {
        render_entry(tz, child, depth + 1, out);
    }
}

fn kind_label(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::SessionBlock => "session_block",
        EntryKind::Contribution => "contribution",
        EntryKind::Break => "break",
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_input(path: Option<&std::path::Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}
