use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `config_level` from config.toml is used.
pub fn init(config_level: &str) {
    let directive = choose_directive(std::env::var("RUST_LOG").ok(), config_level);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Invalid log filter '{directive}' ({e}); using info");
        EnvFilter::new("info")
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn choose_directive(env: Option<String>, config_level: &str) -> String {
    match env {
        Some(env) if !env.trim().is_empty() => env,
        _ => config_level.to_string(),
    }
}
