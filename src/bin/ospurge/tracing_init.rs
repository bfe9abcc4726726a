// Initializes the tracing subscriber for the CLI binary.
//
// The HTTP stack logs every pooled connection and TLS handshake at debug and
// trace level. Those events are dropped unless `--http-tracing` is given, so
// `-vvv` stays readable.

use std::env;
use std::io::IsTerminal;

use tracing::{Level, Metadata};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;

use ospurge_rs::config::TracingConfig;

const EVENT_FILTER_ENV_VAR: &str = "RUST_LOG";

const HTTP_CLIENT_TARGETS: &[&str] = &["hyper", "hyper_util", "h2", "reqwest", "rustls"];

pub fn init_tracing(config: &TracingConfig) {
    let fmt_span = if config.span_events_tracing {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let (event_filter, show_target) = build_event_filter(
        config,
        env::var(EVENT_FILTER_ENV_VAR).ok().as_deref(),
    );

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(show_target)
        .with_ansi(!config.disable_color_tracing && std::io::stdout().is_terminal())
        .with_span_events(fmt_span);
    let fmt_layer = if config.json_tracing {
        fmt_layer.json().boxed()
    } else {
        fmt_layer.compact().boxed()
    };

    let http_tracing = config.http_tracing;
    tracing_subscriber::registry()
        .with(EnvFilter::new(event_filter))
        .with(fmt_layer.with_filter(filter_fn(move |metadata| {
            http_tracing || !is_http_client_noise(metadata)
        })))
        .init();
}

/// Directive string for the `EnvFilter` and whether targets are shown.
///
/// `RUST_LOG` wins over the verbosity flags unless `--http-tracing` asks for
/// the HTTP client's events explicitly.
fn build_event_filter(config: &TracingConfig, rust_log: Option<&str>) -> (String, bool) {
    let tracing_level = config.tracing_level;
    if config.http_tracing {
        return (
            format!(
                "ospurge_rs={tracing_level},ospurge={tracing_level},reqwest={tracing_level},hyper_util={tracing_level}"
            ),
            true,
        );
    }

    if let Some(rust_log) = rust_log {
        return (rust_log.to_string(), true);
    }

    (format!("ospurge_rs={tracing_level},ospurge={tracing_level}"), false)
}

fn is_http_client_noise(metadata: &Metadata<'_>) -> bool {
    is_noisy_target(metadata.target(), *metadata.level())
}

fn is_noisy_target(target: &str, level: Level) -> bool {
    if level == Level::ERROR {
        return false;
    }

    let root = target.split("::").next().unwrap_or(target);
    HTTP_CLIENT_TARGETS.contains(&root)
}
