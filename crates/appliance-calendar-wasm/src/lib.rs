//! WASM bindings for appliance-calendar.
//!
//! Exposes day splitting, column layout, conflict detection and free-slot
//! computation to the JavaScript renderer via `wasm-bindgen`. Bookings go in
//! as a JSON array of `CalendarEvent` objects; results come back as JSON
//! strings.
//!
//! ## Build process
//!
//! ```sh
//! cargo build -p appliance-calendar-wasm --target wasm32-unknown-unknown --release
//! wasm-bindgen --target web --out-dir pkg/ \
//!   target/wasm32-unknown-unknown/release/appliance_calendar_wasm.wasm
//! ```

use appliance_calendar::conflict::SlotRequest;
use appliance_calendar::{
    arrange_events, day_bounds, find_booking_conflict, find_conflicts, layout_day,
    sort_for_layout, split_events, ApplianceId, CalendarEvent, PositionedEvent, SplitType,
};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use wasm_bindgen::prelude::*;

// ---------------------------------------------------------------------------
// Serde-friendly DTOs for crossing the WASM boundary as JSON
// ---------------------------------------------------------------------------

/// A laid-out segment as the renderer consumes it. Times are local `HH:MM`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SegmentDto {
    event_id: String,
    appliance_id: String,
    color: u32,
    split_type: &'static str,
    date: String,
    start: String,
    end: String,
    col: usize,
    col_total: usize,
    col_span: usize,
}

impl From<&PositionedEvent<'_>> for SegmentDto {
    fn from(s: &PositionedEvent<'_>) -> Self {
        Self {
            event_id: s.event.id.to_string(),
            appliance_id: s.event.appliance.id.to_string(),
            color: s.event.appliance.color,
            split_type: match s.split_type {
                SplitType::None => "none",
                SplitType::Start => "start",
                SplitType::End => "end",
                SplitType::Both => "both",
            },
            date: s.date.to_string(),
            start: s.start.to_string(),
            end: s.end.to_string(),
            col: s.col,
            col_total: s.col_total,
            col_span: s.col_span,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConflictDto {
    event_id: String,
    overlap_minutes: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FreeSlotDto {
    start: String,
    end: String,
    duration_minutes: i64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn js_error(context: &str, e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{context}: {e}"))
}

fn parse_events_json(json: &str) -> Result<Vec<CalendarEvent>, JsValue> {
    serde_json::from_str(json).map_err(|e| js_error("Invalid events JSON", e))
}

fn parse_timezone(timezone: &str) -> Result<Tz, JsValue> {
    timezone
        .parse()
        .map_err(|_| JsValue::from_str(&format!("Invalid timezone: {timezone}")))
}

fn parse_date(s: &str) -> Result<NaiveDate, JsValue> {
    s.parse()
        .map_err(|e| js_error(&format!("Invalid date '{s}'"), e))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, JsValue> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| js_error(&format!("Invalid datetime '{s}'"), e))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| js_error("Serialization error", e))
}

fn segments_json(segments: &[PositionedEvent<'_>]) -> Result<String, JsValue> {
    let dtos: Vec<SegmentDto> = segments.iter().map(SegmentDto::from).collect();
    to_json(&dtos)
}

// ---------------------------------------------------------------------------
// WASM exports
// ---------------------------------------------------------------------------

/// Split every booking into per-day segments in `timezone` and arrange each
/// day into columns.
///
/// Returns a JSON array of segments ordered by date, start and booking id.
#[wasm_bindgen(js_name = "splitEvents")]
pub fn split_events_js(events_json: &str, timezone: &str) -> Result<String, JsValue> {
    let events = parse_events_json(events_json)?;
    let tz = parse_timezone(timezone)?;

    let mut segments = split_events(&events, &tz);
    sort_for_layout(&mut segments);
    segments_json(&arrange_events(segments))
}

/// Column layout of a single day (`YYYY-MM-DD`) in `timezone`.
#[wasm_bindgen(js_name = "layoutDay")]
pub fn layout_day_js(events_json: &str, date: &str, timezone: &str) -> Result<String, JsValue> {
    let events = parse_events_json(events_json)?;
    let date = parse_date(date)?;
    let tz = parse_timezone(timezone)?;

    segments_json(&layout_day(&events, date, &tz))
}

/// Bookings overlapping `[start, end)`.
///
/// With `appliance_id`, only the first approved booking of that appliance is
/// reported, which is what blocks a new booking; otherwise every overlap.
#[wasm_bindgen(js_name = "findConflicts")]
pub fn find_conflicts_js(
    events_json: &str,
    start: &str,
    end: &str,
    appliance_id: Option<String>,
) -> Result<String, JsValue> {
    let events = parse_events_json(events_json)?;
    let start = parse_datetime(start)?;
    let end = parse_datetime(end)?;

    let dtos: Vec<ConflictDto> = match appliance_id {
        Some(appliance) => {
            let appliance = ApplianceId::new(appliance);
            let request = SlotRequest {
                appliance_id: &appliance,
                start,
                end,
                exclude: None,
            };
            find_booking_conflict(&request, &events)
                .map(|event| ConflictDto {
                    event_id: event.id.to_string(),
                    overlap_minutes: (end.min(event.time_end) - start.max(event.time_start))
                        .num_minutes(),
                })
                .into_iter()
                .collect()
        }
        None => find_conflicts(start, end, &events)
            .iter()
            .map(|c| ConflictDto {
                event_id: c.booking.id.to_string(),
                overlap_minutes: c.overlap_minutes,
            })
            .collect(),
    };

    to_json(&dtos)
}

/// Free time of one appliance during the local day `date` in `timezone`.
#[wasm_bindgen(js_name = "findFreeSlots")]
pub fn find_free_slots_js(
    events_json: &str,
    appliance_id: &str,
    date: &str,
    timezone: &str,
) -> Result<String, JsValue> {
    let appliance = ApplianceId::new(appliance_id);
    let events: Vec<CalendarEvent> = parse_events_json(events_json)?
        .into_iter()
        .filter(|e| e.appliance.id == appliance)
        .collect();
    let (window_start, window_end) = day_bounds(parse_date(date)?, &parse_timezone(timezone)?);

    let slots = appliance_calendar::find_free_slots(&events, window_start, window_end);
    let dtos: Vec<FreeSlotDto> = slots
        .iter()
        .map(|s| FreeSlotDto {
            start: s.start.to_rfc3339(),
            end: s.end.to_rfc3339(),
            duration_minutes: s.duration_minutes,
        })
        .collect();

    to_json(&dtos)
}
