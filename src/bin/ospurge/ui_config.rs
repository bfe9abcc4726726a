// Decides whether the progress line and the final summary are shown.

use ospurge_rs::config::Config;

/// Whether to show the live-updating progress line.
///
/// Hidden when the summary is suppressed, when verbosity is above Warn
/// (tracing takes over the terminal) and when logging JSON.
pub fn is_progress_indicator_needed(config: &Config) -> bool {
    if config.show_no_result {
        return false;
    }

    let Some(tracing_config) = config.tracing_config.as_ref() else {
        return true;
    };

    if log::Level::Warn < tracing_config.tracing_level {
        return false;
    }

    !tracing_config.json_tracing
}

/// Whether to show the dry-run inventory and the final summary line.
pub fn is_show_result_needed(config: &Config) -> bool {
    if config.show_no_result {
        return false;
    }

    config
        .tracing_config
        .as_ref()
        .is_none_or(|tracing_config| !tracing_config.json_tracing)
}
