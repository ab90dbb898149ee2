use std::fmt::Display;

use nu_ansi_term::Color::{self, Blue, Magenta, Red, Yellow};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{
        self,
        format::{FmtSpan, Writer},
        FmtContext, FormatEvent, FormatFields, MakeWriter,
    },
    registry::LookupSpan,
};

/// How log output should look.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// 1 = debug, 2+ = trace.
    pub verbose: u8,
    /// Errors only.
    pub quiet: bool,
    pub json: bool,
    pub no_color: bool,
}

impl LogOptions {
    pub fn level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else if self.verbose >= 2 {
            Level::TRACE
        } else if self.verbose == 1 {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}

struct Colored<T: Display>(bool, Color, T);

impl<T: Display> Display for Colored<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 {
            write!(f, "{}", self.1.prefix())?;
            self.2.fmt(f)?;
            write!(f, "{}", self.1.suffix())
        } else {
            self.2.fmt(f)
        }
    }
}

/// Collects the message and every other field as `name=value`.
#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
    fields: Vec<String>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }
}

/// One line per event: a coloured level tag (none for INFO), the message,
/// then the event's fields in declaration order.
pub struct CustomFormatter {
    pub color: bool,
}

impl<S, N> FormatEvent<S, N> for CustomFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        match *event.metadata().level() {
            Level::TRACE => write!(writer, "{} ", Colored(self.color, Magenta, "[TRACE]")),
            Level::DEBUG => write!(writer, "{} ", Colored(self.color, Blue, "[DEBUG]")),
            Level::INFO => Ok(()),
            Level::WARN => write!(writer, "{} ", Colored(self.color, Yellow, "[WARN]")),
            Level::ERROR => write!(writer, "{} ", Colored(self.color, Red, "[ERROR]")),
        }?;

        let mut parts = visitor.message.into_iter().chain(visitor.fields);
        if let Some(first) = parts.next() {
            write!(writer, "{first}")?;
        }
        for part in parts {
            write!(writer, " {part}")?;
        }
        writeln!(writer)
    }
}

/// Builds the subscriber used by [`setup_logging`], writing to `writer`.
pub fn build_subscriber<W>(options: &LogOptions, writer: W) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let builder = fmt::Subscriber::builder()
        .with_env_filter(format!("tessera={}", options.level()))
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(writer)
        .compact()
        .without_time();

    if options.json {
        Box::new(builder.json().flatten_event(true).finish())
    } else {
        Box::new(
            builder
                .event_format(CustomFormatter {
                    color: !options.no_color,
                })
                .finish(),
        )
    }
}

/// Installs the global subscriber, logging to stderr.
pub fn setup_logging(
    options: &LogOptions,
) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    tracing::subscriber::set_global_default(build_subscriber(options, std::io::stderr))
}
