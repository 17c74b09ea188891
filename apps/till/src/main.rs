//! # RxDesk Till Entry Point
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging to stderr)
//! 2. Load configuration (file, then environment)
//! 3. Open the local database & run migrations
//! 4. Build the backend client and the state objects
//! 5. Run the shell on stdin
//!
//! The setup lives in `lib.rs` so the integration tests can reach it.

#[tokio::main]
async fn main() {
    if let Err(e) = rxdesk_till::run().await {
        eprintln!("rxdesk-till: {}", e);
        std::process::exit(1);
    }
}
