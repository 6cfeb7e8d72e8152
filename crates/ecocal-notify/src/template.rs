//! Rendering of alert messages for a channel's [`Markup`] dialect.
//!
//! Every function takes the display offset explicitly; nothing here reads
//! the process timezone.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use ecocal_common::types::{CategoryRule, EconomicEvent, Impact, LeadTime};
use std::fmt::Write;

const PLACEHOLDER: &str = "—";

/// Builds a [`FixedOffset`] from minutes east of UTC, falling back to UTC
/// when the value is out of range (more than ±24h).
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
}

/// "30 minutes", "2 hours", "1.5 hours".
pub fn describe_lead_time(lead: LeadTime) -> String {
    let secs = lead.as_secs();
    if secs < 3600 {
        let minutes = (secs as f64 / 60.0).round() as i64;
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{minutes} minutes")
        }
    } else if secs % 3600 == 0 {
        let hours = secs / 3600;
        if hours == 1 {
            "1 hour".to_string()
        } else {
            format!("{hours} hours")
        }
    } else {
        format!("{:.1} hours", lead.as_hours())
    }
}

pub fn impact_stars(impact: Impact) -> &'static str {
    match impact {
        Impact::High => "⭐⭐⭐",
        Impact::Medium => "⭐⭐",
        Impact::Low => "⭐",
    }
}

fn impact_dot(impact: Impact) -> &'static str {
    match impact {
        Impact::High => "🔴",
        Impact::Medium => "🟡",
        Impact::Low => "🟢",
    }
}

/// Text dialect a channel renders, matching Telegram's `parse_mode`.
///
/// Plain channels get no escaping and no emphasis markers.
///
/// # Examples
///
/// ```
/// use ecocal_notify::template::Markup;
///
/// assert_eq!(Markup::from_parse_mode(None), Ok(Markup::Plain));
/// let v2 = Markup::from_parse_mode(Some("MarkdownV2")).unwrap();
/// assert_eq!(v2.bold("1.5 hours"), r"*1\.5 hours*");
/// assert_eq!(Markup::Plain.bold("1.5 hours"), "1.5 hours");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Markup {
    #[default]
    Plain,
    /// Telegram's legacy `Markdown`.
    Markdown,
    MarkdownV2,
    Html,
}

impl Markup {
    /// Case-insensitive, as the Bot API accepts it.
    pub fn from_parse_mode(mode: Option<&str>) -> Result<Self, String> {
        let Some(mode) = mode.map(str::trim).filter(|m| !m.is_empty()) else {
            return Ok(Markup::Plain);
        };
        match mode.to_ascii_lowercase().as_str() {
            "markdown" => Ok(Markup::Markdown),
            "markdownv2" => Ok(Markup::MarkdownV2),
            "html" => Ok(Markup::Html),
            _ => Err(format!("unsupported parse_mode: {mode}")),
        }
    }

    /// Escapes `s` so it renders literally.
    pub fn escape(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            match self {
                Markup::Plain => {}
                Markup::Markdown => {
                    if matches!(c, '_' | '*' | '`' | '[') {
                        out.push('\\');
                    }
                }
                Markup::MarkdownV2 => {
                    if "_*[]()~`>#+-=|{}.!\\".contains(c) {
                        out.push('\\');
                    }
                }
                Markup::Html => match c {
                    '&' => {
                        out.push_str("&amp;");
                        continue;
                    }
                    '<' => {
                        out.push_str("&lt;");
                        continue;
                    }
                    '>' => {
                        out.push_str("&gt;");
                        continue;
                    }
                    _ => {}
                },
            }
            out.push(c);
        }
        out
    }

    pub fn bold(&self, s: &str) -> String {
        let text = self.escape(s);
        match self {
            Markup::Plain => text,
            Markup::Markdown | Markup::MarkdownV2 => format!("*{text}*"),
            Markup::Html => format!("<b>{text}</b>"),
        }
    }

    pub fn italic(&self, s: &str) -> String {
        let text = self.escape(s);
        match self {
            Markup::Plain => text,
            Markup::Markdown | Markup::MarkdownV2 => format!("_{text}_"),
            Markup::Html => format!("<i>{text}</i>"),
        }
    }
}

fn local_time(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%H:%M").to_string()
}

fn or_placeholder(value: &Option<String>) -> &str {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => v,
        _ => PLACEHOLDER,
    }
}

/// Renders one grouped alert: every event in `events` is due for `rule`.
///
/// Each line reads `HH:MM  stars  name  forecast  previous`, with the time
/// shown in `offset`.
pub fn render_grouped_alert(
    events: &[EconomicEvent],
    rule: &CategoryRule,
    offset: FixedOffset,
    markup: Markup,
) -> String {
    let mut message = format!("🚨 {}\n\n", markup.bold("ECONOMIC ALERTS"));
    let _ = writeln!(
        message,
        "⏰ In {}\n",
        markup.bold(&describe_lead_time(rule.lead_time))
    );

    for event in events {
        let _ = write!(
            message,
            "{}    {}    {}    {}    {}",
            local_time(event.scheduled_at, offset),
            impact_stars(event.impact),
            markup.escape(&event.name),
            markup.escape(or_placeholder(&event.forecast)),
            markup.escape(or_placeholder(&event.previous)),
        );
        if let Some(actual) = event.actual.as_deref().filter(|a| !a.trim().is_empty()) {
            let _ = write!(message, "    {}", markup.escape(actual));
        }
        message.push('\n');
    }

    let _ = write!(message, "\n💡 {}", markup.escape("Expect possible volatility!"));
    message
}

/// Renders the morning digest of the day's events. Returns `None` when
/// there is nothing to report.
pub fn render_daily_summary(
    events: &[EconomicEvent],
    offset: FixedOffset,
    markup: Markup,
) -> Option<String> {
    if events.is_empty() {
        return None;
    }

    let mut message = format!("☀️ {}\n\n", markup.bold("Good morning! Today's events:"));
    for event in events {
        let _ = writeln!(
            message,
            "{} {} {} {}",
            impact_dot(event.impact),
            local_time(event.scheduled_at, offset),
            markup.escape("-"),
            markup.bold(&event.name),
        );
    }
    let _ = write!(message, "\n{}", markup.italic("Have a great trading day!"));
    Some(message)
}
