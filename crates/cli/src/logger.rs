use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use anyhow::{Result, anyhow};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{cursor, execute};
use owo_colors::OwoColorize;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::field::Visit;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::Registry;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum LogState {
    Success,
    Warning,
    Failed,
    Debug,
}

#[derive(Debug)]
pub struct CliLogger {
    pub level: LogLevel,
    spinner_step: AtomicUsize,
    loading_active: AtomicBool,
}

impl CliLogger {
    /// falls back to `info` on an unknown level, after saying so.
    pub fn new(level: &str) -> Self {
        match Self::parse(level) {
            Ok(logger) => logger,
            Err(err) => {
                let logger = Self::with_level(LogLevel::Info);
                logger.warn(format!("{err}; using info"));
                logger
            }
        }
    }

    fn parse(level: &str) -> Result<Self> {
        let level = LogLevel::parse(level).ok_or_else(|| {
            anyhow!("invalid log level: {level}. expected one of: error, warn, info, debug")
        })?;
        Ok(Self::with_level(level))
    }

    fn with_level(level: LogLevel) -> Self {
        Self {
            level,
            spinner_step: AtomicUsize::new(0),
            loading_active: AtomicBool::new(false),
        }
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level <= self.level
    }

    fn log(&self, level: LogLevel, state: LogState, message: impl AsRef<str>) {
        if !self.enabled(level) {
            return;
        }

        self.clear_loading_line();
        let icon: Box<dyn std::fmt::Display> = match state {
            LogState::Success => Box::new("✓".green()),
            LogState::Warning => Box::new("!".yellow()),
            LogState::Failed => Box::new("✗".red()),
            LogState::Debug => Box::new("λ".cyan()),
        };

        match state {
            LogState::Failed | LogState::Warning => eprintln!("{icon} {}", message.as_ref()),
            _ => println!("{icon} {}", message.as_ref()),
        }
    }

    pub fn success(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, LogState::Success, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, LogState::Warning, message);
    }

    pub fn failed(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, LogState::Failed, message);
    }

    pub fn debug(&self, context: impl AsRef<str>, message: impl AsRef<str>) {
        self.log(
            LogLevel::Debug,
            LogState::Debug,
            format!(
                "{:>22} {}",
                context.as_ref().bold().bright_purple(),
                message.as_ref()
            ),
        );
    }

    /// plain line on stdout, regardless of level. used for command output.
    pub fn print(&self, message: impl AsRef<str>) {
        self.clear_loading_line();
        println!("{}", message.as_ref());
    }

    /// awaits `future` while a spinner with `message` runs on the current line.
    pub async fn while_loading<F, T>(&self, message: impl Into<String>, future: F) -> T
    where
        F: Future<Output = T>,
    {
        if !self.enabled(LogLevel::Info) {
            return future.await;
        }

        let message = message.into();
        let mut ticker = tokio::time::interval(Duration::from_millis(120));
        let mut future = std::pin::pin!(future);

        loop {
            tokio::select! {
                result = &mut future => {
                    self.clear_loading_line();
                    return result;
                }
                _ = ticker.tick() => self.draw_loading_frame(&message),
            }
        }
    }

    fn draw_loading_frame(&self, message: &str) {
        let step = self.spinner_step.fetch_add(1, Ordering::Relaxed);
        let frame = SPINNER_FRAMES[step % SPINNER_FRAMES.len()];

        let mut stdout = std::io::stdout();
        self.loading_active.store(true, Ordering::Relaxed);
        let _ = execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine));
        let _ = write!(stdout, "{} {message}", frame.yellow());
        let _ = stdout.flush();
    }

    fn clear_loading_line(&self) {
        if self.loading_active.swap(false, Ordering::Relaxed) {
            let mut stdout = std::io::stdout();
            let _ = execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine));
            let _ = stdout.flush();
        }
    }
}

/// renders an event as `message key=value ...`.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn push(&mut self, name: &str, value: std::fmt::Arguments<'_>) {
        use std::fmt::Write as _;

        if name == "message" {
            let _ = self.message.write_fmt(value);
        } else {
            let _ = write!(self.fields, " {name}={value}");
        }
    }

    fn into_line(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (true, true) => "trace event".to_string(),
            (true, false) => self.fields.trim_start().to_string(),
            _ => self.message + &self.fields,
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.push(field.name(), format_args!("{value}"));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.push(field.name(), format_args!("{value:?}"));
    }
}

/// forwards library events into the cli logger.
///
/// warnings surface at warn level; everything else only with `--log-level debug`.
struct CliTracingLayer {
    logger: Arc<CliLogger>,
}

impl<S> Layer<S> for CliTracingLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let target = metadata.target();
        if !target.starts_with("anime3rb") {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        let line = visitor.into_line();

        if *metadata.level() <= Level::WARN && !self.logger.enabled(LogLevel::Debug) {
            self.logger.warn(line);
        } else {
            self.logger.debug(target, line);
        }
    }
}

pub fn init_tracing(logger: Arc<CliLogger>) {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let subscriber = Registry::default().with(CliTracingLayer {
            logger: Arc::clone(&logger),
        });

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            logger.debug(
                "logger",
                format!("failed to initialize tracing subscriber: {err}"),
            );
        }
    });
}
