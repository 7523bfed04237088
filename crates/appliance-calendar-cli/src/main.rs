//! `apcal` CLI: split, lay out and check appliance bookings from the command line.
//!
//! Input is a JSON array of bookings, each with at least `id`, `appliance.id`,
//! `user.id`, `time_start` and `time_end` (RFC 3339). Output is pretty-printed
//! JSON on stdout; logs go to stderr (`RUST_LOG`, default `warn`).
//!
//! ## Usage
//!
//! ```sh
//! # Per-day segments of every booking (stdin → stdout)
//! apcal split < bookings.json
//!
//! # Column layout of one day in a given zone
//! apcal --tz Asia/Vladivostok layout --date 2024-03-01 -i bookings.json
//!
//! # Approved bookings of an appliance colliding with a candidate range
//! apcal conflicts --appliance scope \
//!     --start 2024-03-01T09:00:00Z --end 2024-03-01T10:00:00Z -i bookings.json
//!
//! # Free time of an appliance on a day
//! apcal free-slots --appliance scope --date 2024-03-01 -i bookings.json
//! ```

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use appliance_calendar::conflict::SlotRequest;
use appliance_calendar::{
    arrange_events, day_bounds, find_booking_conflict, find_conflicts, find_free_slots,
    layout_day, sort_for_layout, split_events, ApplianceId, BookingStatus, CalendarEvent,
    EventId, PositionedEvent, Settings, SplitType, TimeOfDay,
};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "apcal", version, about = "Appliance booking calendar tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML); `APCAL_*` environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// IANA timezone for calendar dates, overriding the configured one
    #[arg(long, global = true)]
    tz: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Split bookings into per-day segments
    Split {
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Arrange one day's segments into columns
    Layout {
        /// Calendar date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List bookings overlapping a candidate range
    Conflicts {
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        end: DateTime<Utc>,
        /// Only approved bookings of this appliance count, as when booking it
        #[arg(long)]
        appliance: Option<String>,
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Free time of an appliance during one day
    FreeSlots {
        #[arg(long)]
        appliance: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct SegmentRow<'a> {
    id: &'a EventId,
    appliance: &'a ApplianceId,
    status: BookingStatus,
    split_type: SplitType,
    date: NaiveDate,
    start: TimeOfDay,
    end: TimeOfDay,
    col: usize,
    col_total: usize,
    col_span: usize,
}

impl<'a> From<&PositionedEvent<'a>> for SegmentRow<'a> {
    fn from(segment: &PositionedEvent<'a>) -> Self {
        Self {
            id: &segment.event.id,
            appliance: &segment.event.appliance.id,
            status: segment.event.status,
            split_type: segment.split_type,
            date: segment.date,
            start: segment.start,
            end: segment.end,
            col: segment.col,
            col_total: segment.col_total,
            col_span: segment.col_span,
        }
    }
}

#[derive(Serialize)]
struct ConflictRow<'a> {
    id: &'a EventId,
    appliance: &'a ApplianceId,
    status: BookingStatus,
    overlap_minutes: i64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let tz = resolve_timezone(cli.config.as_deref(), cli.tz.as_deref())?;
    tracing::debug!(%tz, "using timezone");

    match cli.command {
        Commands::Split { input, output } => {
            let events = read_events(input.as_deref())?;
            let mut segments = split_events(&events, &tz);
            sort_for_layout(&mut segments);
            let segments = arrange_events(segments);
            let rows: Vec<SegmentRow> = segments.iter().map(SegmentRow::from).collect();
            write_json(output.as_deref(), &rows)?;
        }
        Commands::Layout {
            date,
            input,
            output,
        } => {
            let events = read_events(input.as_deref())?;
            let segments = layout_day(&events, date, &tz);
            let rows: Vec<SegmentRow> = segments.iter().map(SegmentRow::from).collect();
            write_json(output.as_deref(), &rows)?;
        }
        Commands::Conflicts {
            start,
            end,
            appliance,
            input,
            output,
        } => {
            if start >= end {
                anyhow::bail!("--start ({start}) must be before --end ({end})");
            }
            let events = read_events(input.as_deref())?;
            let rows: Vec<ConflictRow> = match appliance {
                Some(appliance) => {
                    let appliance = ApplianceId::new(appliance);
                    let request = SlotRequest {
                        appliance_id: &appliance,
                        start,
                        end,
                        exclude: None,
                    };
                    // Booking is refused on the first approved collision.
                    find_booking_conflict(&request, &events)
                        .map(|event| conflict_row(event, start, end))
                        .into_iter()
                        .collect()
                }
                None => find_conflicts(start, end, &events)
                    .into_iter()
                    .map(|c| ConflictRow {
                        id: &c.booking.id,
                        appliance: &c.booking.appliance.id,
                        status: c.booking.status,
                        overlap_minutes: c.overlap_minutes,
                    })
                    .collect(),
            };
            write_json(output.as_deref(), &rows)?;
        }
        Commands::FreeSlots {
            appliance,
            date,
            input,
            output,
        } => {
            let appliance = ApplianceId::new(appliance);
            let events: Vec<CalendarEvent> = read_events(input.as_deref())?
                .into_iter()
                .filter(|e| e.appliance.id == appliance)
                .collect();
            let (window_start, window_end) = day_bounds(date, &tz);
            let slots = find_free_slots(&events, window_start, window_end);
            write_json(output.as_deref(), &slots)?;
        }
    }

    Ok(())
}

fn conflict_row(
    event: &CalendarEvent,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> ConflictRow<'_> {
    let overlap = end.min(event.time_end) - start.max(event.time_start);
    ConflictRow {
        id: &event.id,
        appliance: &event.appliance.id,
        status: event.status,
        overlap_minutes: overlap.num_minutes(),
    }
}

/// `--tz` wins over the settings file and environment.
fn resolve_timezone(config: Option<&std::path::Path>, tz: Option<&str>) -> Result<Tz> {
    let mut settings = Settings::load(config).context("Failed to load settings")?;
    if let Some(tz) = tz {
        settings.timezone = tz.to_string();
    }
    Ok(settings.timezone()?)
}

fn read_events(path: Option<&std::path::Path>) -> Result<Vec<CalendarEvent>> {
    let json = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            buf
        }
    };
    let events: Vec<CalendarEvent> =
        serde_json::from_str(&json).context("Failed to parse bookings JSON")?;
    tracing::debug!(count = events.len(), "bookings read");
    Ok(events)
}

fn write_json<T: Serialize + ?Sized>(path: Option<&std::path::Path>, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match path {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write file: {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
