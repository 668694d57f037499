use chrono::{DateTime, Utc};

/// Human-readable age of a timestamp: "5 minutes ago".
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);
    const STEPS: [(i64, &str); 5] = [
        (31_536_000, "year"),
        (2_592_000, "month"),
        (86_400, "day"),
        (3_600, "hour"),
        (60, "minute"),
    ];
    for (span, unit) in STEPS {
        let count = seconds / span;
        if count >= 1 {
            return counted(count, unit);
        }
    }
    counted(seconds, "second")
}

fn counted(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}
