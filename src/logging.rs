use std::str::FromStr;

use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, filter::Targets, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

#[macro_export]
macro_rules! log {
    ($level:expr, $span:expr, $($msg:expr),*) => {{
        let span = $crate::tracing::span!(target: "beacon", $level, $span);
        let _enter = span.enter();

        $crate::tracing::event!(target: "beacon", $level, $($msg),*)
    }};
}

/// Delivery attempts and their results
#[macro_export]
macro_rules! outgoing {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "outgoing", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::outgoing!(level = TRACE, $($msg),*)
    };
}

/// Worker lifecycle and queue bookkeeping
#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "internal", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::internal!(level = TRACE, $($msg),*)
    };
}

/// Level used when `LOG_LEVEL` is unset or unreadable.
const DEFAULT_LEVEL: LevelFilter = LevelFilter::WARN;

/// Install a global subscriber for everything logged under the `beacon` target.
///
/// Output goes to stderr so it never mixes with a program's own stdout. The
/// level is read from `LOG_LEVEL`. Libraries embedding this crate are
/// expected to install their own subscriber instead.
pub fn init() {
    let level = level(std::env::var("LOG_LEVEL").ok().as_deref());

    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact()
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_filter(Targets::new().with_target("beacon", level)),
        )
        .init();
}

fn level(value: Option<&str>) -> LevelFilter {
    value.map_or(DEFAULT_LEVEL, |value| {
        LevelFilter::from_str(value.trim()).unwrap_or_else(|_| {
            eprintln!("Invalid LOG_LEVEL {value}, using {DEFAULT_LEVEL}");
            DEFAULT_LEVEL
        })
    })
}
