use std::str::FromStr;

use chrono::Utc;
use cron::Schedule;

/// Builds a 6-field (sec min hr dom mon dow) cron schedule that fires once a
/// day at `hh:mm` local-clock time, expressed as `cron::Schedule` (which
/// treats unqualified schedules as UTC — the same adaptation the teacher's
/// ingestion scheduler makes for 5-field user input).
pub fn daily_schedule(hh_mm: &str) -> Result<Schedule, cron::error::Error> {
    let (hour, minute) = parse_hh_mm(hh_mm);
    let expr = format!("0 {minute} {hour} * * *");
    Schedule::from_str(&expr)
}

fn parse_hh_mm(hh_mm: &str) -> (u32, u32) {
    let mut parts = hh_mm.splitn(2, ':');
    let hour = parts.next().and_then(|h| h.parse().ok()).unwrap_or(8);
    let minute = parts.next().and_then(|m| m.parse().ok()).unwrap_or(30);
    (hour, minute)
}

/// Duration until the schedule's next fire time from now.
pub fn duration_until_next(schedule: &Schedule) -> std::time::Duration {
    match schedule.upcoming(Utc).next() {
        Some(next) => (next - Utc::now()).to_std().unwrap_or(std::time::Duration::from_secs(60)),
        None => std::time::Duration::from_secs(86_400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hh_mm_into_daily_fire_time() {
        let schedule = daily_schedule("08:30").unwrap();
        let next = schedule.upcoming(Utc).next().unwrap();
        assert_eq!(next.format("%H:%M:%S").to_string(), "08:30:00");
    }

    #[test]
    fn malformed_time_falls_back_to_default() {
        let schedule = daily_schedule("not-a-time").unwrap();
        let next = schedule.upcoming(Utc).next().unwrap();
        assert_eq!(next.format("%H:%M:%S").to_string(), "08:30:00");
    }

    #[test]
    fn duration_until_next_is_positive_and_bounded_by_a_day() {
        let schedule = daily_schedule("08:30").unwrap();
        let duration = duration_until_next(&schedule);
        assert!(duration.as_secs() > 0);
        assert!(duration.as_secs() <= 86_400);
    }
}
