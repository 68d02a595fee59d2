//! Command-line and environment configuration

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use teleglogger_logs::{DEFAULT_PATTERN, DEFAULT_TAIL, LineFilter, PumpSettings};

/// Teleglogger - forward matching Docker container log lines to Telegram
#[derive(Parser, Debug)]
#[command(name = "teleglogger")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Regex every log line is matched against
    #[arg(long, env = "MATCHRE", default_value = DEFAULT_PATTERN, value_parser = parse_pattern)]
    pub match_re: LineFilter,

    /// Historical lines to request per attachment, a number or "all"
    #[arg(long, env = "TAIL", default_value = DEFAULT_TAIL, value_parser = parse_tail)]
    pub tail: String,

    /// Reattach after this long without output, e.g. "30s" or "1m30s"; 0 disables
    #[arg(long, env = "INACTIVITY_TIMEOUT", default_value = "0", value_parser = parse_timeout)]
    pub inactivity_timeout: Duration,

    /// Also pump containers running with a TTY ("true" to enable)
    #[arg(
        long,
        env = "ALLOW_TTY",
        default_value = "false",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = parse_true
    )]
    pub allow_tty: bool,

    /// Replay output produced before teleglogger attached ("true" to enable)
    #[arg(
        long,
        env = "BACKLOG",
        default_value = "false",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = parse_true
    )]
    pub backlog: bool,

    /// Send notifications to Telegram (anything but empty or "0" enables)
    #[arg(
        long,
        env = "TG",
        default_value = "0",
        num_args = 0..=1,
        default_missing_value = "1",
        value_parser = parse_enabled
    )]
    pub tg: bool,

    /// Telegram chat id to send notifications to
    #[arg(long, env = "TG_CHAT", allow_negative_numbers = true)]
    pub tg_chat: Option<String>,

    /// Telegram bot token
    #[arg(long, env = "TG_TOKEN", hide_env_values = true)]
    pub tg_token: Option<String>,

    /// Log at debug level (any non-empty value enables)
    #[arg(long, env = "DEBUG", num_args = 0..=1, default_missing_value = "1")]
    pub debug: Option<String>,
}

/// Credentials for Telegram delivery
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: i64,
}

impl Args {
    pub fn pump_settings(&self) -> PumpSettings {
        PumpSettings {
            tail: self.tail.clone(),
            inactivity_timeout: (!self.inactivity_timeout.is_zero())
                .then_some(self.inactivity_timeout),
            allow_tty: self.allow_tty,
            backlog: self.backlog,
        }
    }

    /// Telegram credentials, or `None` when delivery is disabled
    pub fn telegram(&self) -> Result<Option<TelegramConfig>> {
        if !self.tg {
            return Ok(None);
        }
        let chat_id = match self.tg_chat.as_deref() {
            Some(chat) if !chat.is_empty() => chat
                .parse::<i64>()
                .with_context(|| format!("invalid TG_CHAT {:?}", chat))?,
            _ => bail!("TG_CHAT must be set when TG is enabled"),
        };
        let token = match self.tg_token.as_deref() {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => bail!("TG_TOKEN must be set when TG is enabled"),
        };
        Ok(Some(TelegramConfig { token, chat_id }))
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.as_deref().is_some_and(|value| !value.is_empty())
    }

    /// `RUST_LOG` wins; otherwise info, or debug when requested
    pub fn log_filter(&self) -> EnvFilter {
        let level = if self.debug_enabled() {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };
        EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy()
    }
}

// An empty value, e.g. `MATCHRE=` in a compose file, means "use the default"

fn parse_pattern(s: &str) -> Result<LineFilter, String> {
    if s.is_empty() {
        return Ok(LineFilter::default());
    }
    LineFilter::new(s).map_err(|e| e.to_string())
}

fn parse_tail(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Ok(DEFAULT_TAIL.to_string());
    }
    Ok(s.to_string())
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    if s.is_empty() {
        return Ok(Duration::ZERO);
    }
    parse_duration(s)
}

fn parse_true(s: &str) -> Result<bool, String> {
    Ok(s == "true")
}

fn parse_enabled(s: &str) -> Result<bool, String> {
    Ok(!s.is_empty() && s != "0")
}

/// Parse a duration such as "300ms", "90s", "1m30s" or "1.5h"
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let input = s.trim();
    if input == "0" {
        return Ok(Duration::ZERO);
    }
    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut rest = input;
    let mut total = Duration::ZERO;

    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !is_number(c))
            .ok_or_else(|| format!("missing unit in duration {:?}", input))?;
        if number_end == 0 {
            return Err(format!("invalid duration {:?}", input));
        }
        let value: f64 = rest[..number_end]
            .parse()
            .map_err(|_| format!("invalid duration {:?}", input))?;
        rest = &rest[number_end..];

        let unit_end = rest.find(is_number).unwrap_or(rest.len());
        let seconds = match &rest[..unit_end] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            unit => return Err(format!("unknown unit {:?} in duration {:?}", unit, input)),
        };
        total += Duration::try_from_secs_f64(value * seconds)
            .map_err(|_| format!("duration {:?} out of range", input))?;
        rest = &rest[unit_end..];
    }

    Ok(total)
}
