//! Built-in date and time tools.
//!
//! Provides the local utility tools (`get_current_time`, `get_date_info`,
//! `calculate_date_difference`, `generate_date_range`, `parse_date`,
//! `get_yesterday_date`). Each tool is constructed via [`AgentTool::new`] and
//! returned as `Arc<dyn Tool>`; [`register_all`] adds them in a fixed order.
//!
//! # Usage
//!
//! ```rust
//! use concierge::tools::{builtin, ToolRegistry};
//!
//! let mut registry = ToolRegistry::new();
//! builtin::register_all(&mut registry, chrono_tz::Europe::Rome);
//! assert_eq!(registry.len(), 6);
//! ```

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;

use crate::error::{ConciergeError, Result};
use crate::tools::registry::ToolRegistry;
use crate::tools::tool::{AgentTool, Tool};
use crate::tools::types::ToolParameters;

const DATE_FORMAT: &str = "%Y-%m-%d";
const GMAIL_DATE_FORMAT: &str = "%Y/%m/%d";
const DEFAULT_MAX_DATES: i64 = 10;

/// Register every built-in tool in its canonical order.
pub fn register_all(registry: &mut ToolRegistry, tz: Tz) {
    for tool in all_tools(tz) {
        registry.register(tool);
    }
}

/// All built-in tools, in registration order.
pub fn all_tools(tz: Tz) -> Vec<Arc<dyn Tool>> {
    vec![
        current_time_tool(tz),
        date_info_tool(tz),
        date_difference_tool(),
        date_range_tool(),
        parse_date_tool(tz),
        yesterday_date_tool(tz),
    ]
}

fn now_in(tz: Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(&tz)
}

fn parse_day(name: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| ConciergeError::tool(name, format!("invalid date '{raw}' (expected YYYY-MM-DD): {e}")))
}

fn render<T: std::fmt::Display>(name: &str, formatted: T) -> Result<String> {
    let mut out = String::new();
    write!(out, "{formatted}").map_err(|_| ConciergeError::tool(name, "invalid format string"))?;
    Ok(out)
}

/// Create the `get_current_time` tool.
pub fn current_time_tool(tz: Tz) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "get_current_time",
        "Get the current time and date in the user's timezone",
        ToolParameters::object()
            .string("format", "Optional strftime format string (defaults to a readable timestamp)", false)
            .build(),
        move |args, _ctx| async move {
            let now = now_in(tz);
            match args.get_str_opt("format") {
                Some(format) => render("get_current_time", now.format(format)),
                None => Ok(format!("Current time: {}", now.format("%Y-%m-%d %H:%M:%S %Z"))),
            }
        },
    ))
}

/// Create the `get_date_info` tool.
pub fn date_info_tool(tz: Tz) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "get_date_info",
        "Get information about a specific date like day of week, week number, etc.",
        ToolParameters::object()
            .string("date", "Date in format YYYY-MM-DD (defaults to today)", false)
            .build(),
        move |args, _ctx| async move {
            let date = match args.get_str_opt("date") {
                Some(raw) => {
                    let day = parse_day("get_date_info", raw)?;
                    tz.from_local_datetime(&day.and_time(chrono::NaiveTime::MIN))
                        .earliest()
                        .ok_or_else(|| ConciergeError::tool("get_date_info", format!("{raw} does not exist in {tz}")))?
                }
                None => now_in(tz),
            };
            Ok(describe_date(&date))
        },
    ))
}

fn describe_date(date: &DateTime<Tz>) -> String {
    format!(
        "Date: {}\nDay of week: {}\nWeek number: {}\nMonth: {}\nDay of year: {}\nTimezone: {}",
        date.format(DATE_FORMAT),
        date.format("%A"),
        date.format("%U"),
        date.format("%B"),
        date.format("%j"),
        date.format("%Z"),
    )
}

/// Create the `calculate_date_difference` tool.
pub fn date_difference_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "calculate_date_difference",
        "Calculate the number of days, weeks, or months between two dates",
        ToolParameters::object()
            .string("start_date", "Start date in format YYYY-MM-DD", true)
            .string("end_date", "End date in format YYYY-MM-DD", true)
            .build(),
        |args, _ctx| async move {
            let name = "calculate_date_difference";
            let start_raw = args.get_str("start_date")?;
            let end_raw = args.get_str("end_date")?;
            let days = (parse_day(name, end_raw)? - parse_day(name, start_raw)?).num_days();
            Ok(format!(
                "Difference between {start_raw} and {end_raw}:\nDays: {days}\nWeeks: {}\nMonths (approximate): {}",
                days.div_euclid(7),
                days.div_euclid(30),
            ))
        },
    ))
}

/// Step between generated dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeInterval {
    Day,
    Week,
    Month,
}

impl RangeInterval {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            _ => None,
        }
    }

    fn step(self) -> Duration {
        match self {
            Self::Day => Duration::days(1),
            Self::Week => Duration::weeks(1),
            // months are approximated as 30 days
            Self::Month => Duration::days(30),
        }
    }
}

/// Create the `generate_date_range` tool.
pub fn date_range_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "generate_date_range",
        "Generate a range of dates between start and end dates",
        ToolParameters::object()
            .string("start_date", "Start date in format YYYY-MM-DD", true)
            .string("end_date", "End date in format YYYY-MM-DD", true)
            .string_enum("interval", "Interval between dates", &["day", "week", "month"], false)
            .integer("max_dates", "Maximum number of dates to generate", Some(DEFAULT_MAX_DATES), false)
            .build(),
        |args, _ctx| async move {
            let name = "generate_date_range";
            let start_raw = args.get_str("start_date")?;
            let end_raw = args.get_str("end_date")?;
            let interval_raw = args.get_str_opt("interval").unwrap_or("day");
            let max_dates = args.get_i64_opt("max_dates").unwrap_or(DEFAULT_MAX_DATES).max(0);
            let start = parse_day(name, start_raw)?;
            let end = parse_day(name, end_raw)?;
            if start > end {
                return Err(ConciergeError::tool(name, "Start date must be before end date."));
            }
            let interval = RangeInterval::parse(interval_raw).ok_or_else(|| {
                ConciergeError::tool(
                    name,
                    format!("Invalid interval '{interval_raw}'. Use 'day', 'week', or 'month'."),
                )
            })?;
            Ok(date_range(start_raw, end_raw, start, end, interval_raw, interval, max_dates))
        },
    ))
}

fn date_range(
    start_raw: &str,
    end_raw: &str,
    start: NaiveDate,
    end: NaiveDate,
    interval_raw: &str,
    interval: RangeInterval,
    max_dates: i64,
) -> String {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end && (dates.len() as i64) < max_dates {
        dates.push(current.format(DATE_FORMAT).to_string());
        current += interval.step();
    }
    let generated = dates.len();
    let truncated = current <= end;
    if truncated {
        dates.push("...".to_string());
    }
    let mut out = format!(
        "Date range from {start_raw} to {end_raw} by {interval_raw}:\n{}\nGenerated {generated} dates",
        dates.join(", ")
    );
    if truncated {
        out.push_str(&format!(" (limited to {max_dates})"));
    }
    out
}

/// Create the `parse_date` tool.
pub fn parse_date_tool(tz: Tz) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "parse_date",
        "Convert a natural language date description into a formatted date",
        ToolParameters::object()
            .string("date_text", "Natural language date description (e.g. \"tomorrow\", \"next Monday\")", true)
            .boolean("gmail_format", "Return the date as YYYY/MM/DD for Gmail searches", Some(false), false)
            .build(),
        move |args, _ctx| async move {
            let text = args.get_str("date_text")?;
            let gmail = args.get_bool_opt("gmail_format").unwrap_or(false);
            Ok(describe_parsed(text, resolve_relative_date(text, now_in(tz)), gmail))
        },
    ))
}

fn describe_parsed(text: &str, resolved: Option<DateTime<Tz>>, gmail: bool) -> String {
    let Some(date) = resolved else {
        return format!(
            "Could not parse '{text}'. Please provide a date in YYYY-MM-DD format or a clearer description."
        );
    };
    let formatted = date
        .format(if gmail { GMAIL_DATE_FORMAT } else { DATE_FORMAT })
        .to_string();
    let mut out = format!("'{text}' is {formatted} ({})", date.format("%A"));
    if gmail {
        out.push_str(&format!("\nFor Gmail API use: {formatted}"));
    }
    out
}

/// Resolve a relative date phrase against `now`.
///
/// Supports today/now, tomorrow, yesterday, next week, next month and
/// "next <weekday>". "next <weekday>" on that same weekday means a week ahead.
pub fn resolve_relative_date(text: &str, now: DateTime<Tz>) -> Option<DateTime<Tz>> {
    let matches = |pattern: &str| {
        Regex::new(pattern)
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    };

    if matches(r"(?i)\b(?:today|now)\b") {
        return Some(now);
    }
    if matches(r"(?i)\btomorrow\b") {
        return Some(now + Duration::days(1));
    }
    if matches(r"(?i)\byesterday\b") {
        return Some(now - Duration::days(1));
    }
    if matches(r"(?i)\bnext\s+week\b") {
        return Some(now + Duration::weeks(1));
    }
    if matches(r"(?i)\bnext\s+month\b") {
        return Some(now + Duration::days(30));
    }

    let weekday_re = Regex::new(r"(?i)\bnext\s+(\w+day)\b").ok()?;
    let day_name = weekday_re.captures(text)?.get(1)?.as_str().to_lowercase();
    let target = match day_name.as_str() {
        "monday" => 0,
        "tuesday" => 1,
        "wednesday" => 2,
        "thursday" => 3,
        "friday" => 4,
        "saturday" => 5,
        "sunday" => 6,
        _ => return None,
    };
    let today = i64::from(now.weekday().num_days_from_monday());
    let mut ahead = (target - today).rem_euclid(7);
    if ahead == 0 {
        ahead = 7;
    }
    Some(now + Duration::days(ahead))
}

/// Create the `get_yesterday_date` tool.
pub fn yesterday_date_tool(tz: Tz) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "get_yesterday_date",
        "Get yesterday's date in Gmail format (YYYY/MM/DD)",
        ToolParameters::empty(),
        move |_args, _ctx| async move {
            Ok((now_in(tz) - Duration::days(1)).format(GMAIL_DATE_FORMAT).to_string())
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::arguments::ToolArguments;
    use crate::tools::tool::ToolExecutionContext;

    async fn run(tool: Arc<dyn Tool>, raw: &str) -> Result<String> {
        tool.execute(&ToolArguments::parse(raw).unwrap(), &ToolExecutionContext::default())
            .await
    }

    fn rome_noon(y: i32, m: u32, d: u32) -> DateTime<Tz> {
        chrono_tz::Europe::Rome
            .with_ymd_and_hms(y, m, d, 12, 0, 0)
            .single()
            .unwrap()
    }

    #[tokio::test]
    async fn date_difference_floors_weeks_and_months() {
        let out = run(
            date_difference_tool(),
            r#"{"start_date": "2024-01-01", "end_date": "2024-03-01"}"#,
        )
        .await
        .unwrap();
        assert!(out.contains("Days: 60"));
        assert!(out.contains("Weeks: 8"));
        assert!(out.contains("Months (approximate): 2"));
    }

    #[tokio::test]
    async fn date_range_marks_truncation() {
        let out = run(
            date_range_tool(),
            r#"{"start_date": "2024-01-01", "end_date": "2024-01-10", "max_dates": 3}"#,
        )
        .await
        .unwrap();
        assert_eq!(
            out,
            "Date range from 2024-01-01 to 2024-01-10 by day:\n2024-01-01, 2024-01-02, 2024-01-03, ...\nGenerated 3 dates (limited to 3)"
        );
    }

    #[tokio::test]
    async fn date_range_rejects_unknown_interval() {
        let err = run(
            date_range_tool(),
            r#"{"start_date": "2024-01-01", "end_date": "2024-01-10", "interval": "year"}"#,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Invalid interval 'year'"));
    }

    #[tokio::test]
    async fn date_info_for_explicit_date() {
        let out = run(date_info_tool(chrono_tz::Europe::Rome), r#"{"date": "2024-07-04"}"#)
            .await
            .unwrap();
        assert!(out.starts_with("Date: 2024-07-04\nDay of week: Thursday"));
        assert!(out.contains("Month: July"));
        assert!(out.contains("Day of year: 186"));
    }

    #[test]
    fn next_weekday_on_same_weekday_is_a_week_ahead() {
        // 2024-07-01 is a Monday
        let now = rome_noon(2024, 7, 1);
        let next_monday = resolve_relative_date("next Monday", now).unwrap();
        assert_eq!(next_monday.date_naive(), NaiveDate::from_ymd_opt(2024, 7, 8).unwrap());

        let next_friday = resolve_relative_date("see you next friday", now).unwrap();
        assert_eq!(next_friday.date_naive(), NaiveDate::from_ymd_opt(2024, 7, 5).unwrap());
    }

    #[test]
    fn parsed_dates_render_in_gmail_format() {
        let now = rome_noon(2024, 7, 1);
        let out = describe_parsed("tomorrow", resolve_relative_date("tomorrow", now), true);
        assert_eq!(out, "'tomorrow' is 2024/07/02 (Tuesday)\nFor Gmail API use: 2024/07/02");

        let unknown = describe_parsed("someday", resolve_relative_date("someday", now), false);
        assert!(unknown.starts_with("Could not parse 'someday'"));
    }

    #[test]
    fn registration_order_is_stable() {
        let mut registry = ToolRegistry::new();
        register_all(&mut registry, chrono_tz::UTC);
        assert_eq!(
            registry.names(),
            vec![
                "get_current_time",
                "get_date_info",
                "calculate_date_difference",
                "generate_date_range",
                "parse_date",
                "get_yesterday_date",
            ]
        );
    }
}
