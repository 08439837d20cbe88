// src/logging.rs
use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "info";

/// Dependencies that are chatty at info/debug.
const QUIET: &[(&str, &str)] = &[
    ("hyper", "warn"),
    ("reqwest", "warn"),
    ("rustls", "warn"),
    ("rusqlite", "warn"),
];

/// `LOAN_DESK_LOG`, then `RUST_LOG`, then `info`, plus the quiet overrides.
pub fn filter_directives(configured: Option<&str>) -> String {
    let base = configured
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_LEVEL);

    let mut directives = vec![base.to_string()];
    for (target, level) in QUIET {
        if !base.contains(target) {
            directives.push(format!("{target}={level}"));
        }
    }
    directives.join(",")
}

pub fn init() {
    let configured = std::env::var("LOAN_DESK_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok();
    let directives = filter_directives(configured.as_deref());

    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        eprintln!("Invalid log filter '{directives}': {e}, falling back to {DEFAULT_LEVEL}");
        EnvFilter::new(DEFAULT_LEVEL)
    });

    // A second init (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init();
}
