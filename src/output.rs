//! Terminal rendering of pipeline event records.

use crate::pipeline::latency::format_duration;
use crate::pipeline::types::{Consistency, EventRecord, RecordKind};
use std::io::{self, Write};

const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Backlog above which the estimate is highlighted.
const BACKLOG_WARN_MS: u128 = 3000;

/// Formats a record as a single line, with ANSI colors when `color` is set.
///
/// ```text
/// [early] Hello world.   backlog 1.1s
/// [final OK] I am fine.   backlog 1.7s
/// ```
pub fn format_record(record: &EventRecord, color: bool) -> String {
    let paint = |code: &'static str| if color { code } else { "" };
    let reset = paint(RESET);

    let label = match (record.kind, record.consistency) {
        (RecordKind::Intermediate, _) => format!("{}[early]{reset}", paint(DIM)),
        (RecordKind::Final, Some(Consistency::Mismatch)) => {
            format!("{}[final MISMATCH]{reset}", paint(RED))
        }
        (RecordKind::Final, _) => format!("{}[final OK]{reset}", paint(GREEN)),
    };

    let text = if record.text.is_empty() {
        format!("{}(already spoken){reset}", paint(DIM))
    } else {
        record.text.trim_end().to_string()
    };

    let backlog_color = if record.estimated_backlog.as_millis() >= BACKLOG_WARN_MS {
        paint(YELLOW)
    } else {
        paint(DIM)
    };

    format!(
        "{label} {text}   {backlog_color}backlog {}{reset}",
        format_duration(record.estimated_backlog)
    )
}

/// Writes one record line to `out`.
pub fn write_record<W: Write>(out: &mut W, record: &EventRecord, color: bool) -> io::Result<()> {
    writeln!(out, "{}", format_record(record, color))
}

/// Renders a record to stderr. Write failures are ignored.
pub fn render_record(record: &EventRecord, color: bool) {
    let mut stderr = io::stderr().lock();
    write_record(&mut stderr, record, color).ok();
}
