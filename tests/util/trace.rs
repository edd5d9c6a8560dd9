pub fn trace_init() {
    let level = std::env::var("TEST_LOG").unwrap_or_else(|_| "debug".to_string());

    // every test calls this, only the first one installs the subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level))
        .with_test_writer()
        .try_init();
}
