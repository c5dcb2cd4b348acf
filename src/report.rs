use std::fmt::Write;

use crate::models::{Event, Message, PositionStaffing};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaffingTotals {
    pub needed: i64,
    pub filled: i64,
    pub assigned: usize,
    pub arrived: usize,
    pub drifted_positions: usize,
}

pub fn summarize_staffing(staffing: &[PositionStaffing]) -> StaffingTotals {
    let mut totals = StaffingTotals::default();
    for position in staffing {
        totals.needed += i64::from(position.needed);
        totals.filled += i64::from(position.filled);
        totals.assigned += position.assigned;
        totals.arrived += position.arrived;
        if position.drift() != 0 {
            totals.drifted_positions += 1;
        }
    }
    totals
}

pub fn build_report(event: &Event, staffing: &[PositionStaffing], messages: &[Message]) -> String {
    let totals = summarize_staffing(staffing);
    let mut output = String::new();

    let _ = writeln!(output, "# Staffing Report: {}", event.name);
    let _ = writeln!(
        output,
        "{} at {}, {}",
        event.date,
        event.time.format("%H:%M"),
        event.location
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Positions");

    if staffing.is_empty() {
        let _ = writeln!(output, "No positions defined for this event.");
    } else {
        let _ = writeln!(output, "| Position | Needed | Filled | Assigned | Arrived | Drift |");
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for position in staffing {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {:+} |",
                position.position_name,
                position.needed,
                position.filled,
                position.assigned,
                position.arrived,
                position.drift()
            );
        }
        let _ = writeln!(
            output,
            "| **Total** | {} | {} | {} | {} | |",
            totals.needed, totals.filled, totals.assigned, totals.arrived
        );
    }

    let understaffed: Vec<&PositionStaffing> = staffing
        .iter()
        .filter(|position| position.filled < position.needed)
        .collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Understaffed");

    if understaffed.is_empty() {
        let _ = writeln!(output, "Every position is at or above its needed count.");
    } else {
        for position in understaffed {
            let _ = writeln!(
                output,
                "- {}: {} of {} filled",
                position.position_name, position.filled, position.needed
            );
        }
    }

    if totals.drifted_positions > 0 {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "{} position(s) have a filled count that differs from arrivals. \
             Run `reconcile --mode arrived` to recount.",
            totals.drifted_positions
        );
    }

    let open: Vec<&Message> = messages
        .iter()
        .filter(|message| message.status.is_open())
        .collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Open Messages");

    if open.is_empty() {
        let _ = writeln!(output, "No open messages.");
    } else {
        for message in open.iter().take(10) {
            let _ = writeln!(
                output,
                "- [{}] {}: {}",
                message.status, message.title, message.content
            );
        }
    }

    output
}
