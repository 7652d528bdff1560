//! Tracing setup.
//!
//! - LOG_LEVEL is either a bare level ("debug"), applied to this service's
//!   targets while dependencies stay at info, or full `EnvFilter` directives
//!   ("info,session=trace,store=debug"), used verbatim. Directives that do not
//!   parse fall back to the defaults with a warning.
//! - LOG_FORMAT: "pretty" (default, with file:line), "compact" or "json"
//!   (one object per event, current span included).
//!
//! Targets: `session` for gameplay transitions, `store` for persistence,
//! `assist` for text generation, `visuequation_backend` for the rest.

use tracing::warn;
use tracing_subscriber::EnvFilter;

const APP_TARGETS: [&str; 4] = ["visuequation_backend", "session", "store", "assist"];
const DEFAULT_DIRECTIVES: &str =
    "info,visuequation_backend=debug,session=debug,tower_http=info,axum=info";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            Some("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

fn directives(level: Option<&str>) -> String {
    let Some(level) = level.map(str::trim).filter(|l| !l.is_empty()) else {
        return DEFAULT_DIRECTIVES.to_string();
    };
    let bare = matches!(
        level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error" | "off"
    );
    if !bare {
        return level.to_string();
    }
    let mut out = String::from("info,tower_http=info,axum=info");
    for target in APP_TARGETS {
        out.push_str(&format!(",{target}={level}"));
    }
    out
}

pub fn init_tracing() {
    let level = std::env::var("LOG_LEVEL").ok();
    let wanted = directives(level.as_deref());
    let (filter, rejected) = match EnvFilter::try_new(&wanted) {
        Ok(f) => (f, None),
        Err(e) => (EnvFilter::new(DEFAULT_DIRECTIVES), Some(e)),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let format = LogFormat::parse(std::env::var("LOG_FORMAT").ok().as_deref());
    match format {
        LogFormat::Json => builder.json().with_current_span(true).init(),
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.with_file(true).with_line_number(true).init(),
    }

    if let Some(e) = rejected {
        warn!(target: "visuequation_backend", error = %e, directives = %wanted, "LOG_LEVEL rejected; using defaults");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_applies_to_service_targets_only() {
        let d = directives(Some("trace"));
        assert!(d.starts_with("info,"));
        for target in APP_TARGETS {
            assert!(d.contains(&format!("{target}=trace")), "{d}");
        }
        assert!(EnvFilter::try_new(&d).is_ok());
    }

    #[test]
    fn full_directives_pass_through() {
        assert_eq!(directives(Some(" warn,store=debug ")), "warn,store=debug");
        assert_eq!(directives(None), DEFAULT_DIRECTIVES);
        assert_eq!(directives(Some("  ")), DEFAULT_DIRECTIVES);
    }

    #[test]
    fn unknown_formats_are_pretty() {
        assert_eq!(LogFormat::parse(Some("JSON")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("compact")), LogFormat::Compact);
        assert_eq!(LogFormat::parse(Some("xml")), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(None), LogFormat::Pretty);
    }
}
