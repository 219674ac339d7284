fn main() {
    // Load .env file if present (for development convenience)
    // Silently ignore if not found - production uses system env vars
    let _ = dotenvy::dotenv();

    if let Err(e) = phase_session::run() {
        eprintln!("phase-session: {}", e);
        std::process::exit(1);
    }
}
