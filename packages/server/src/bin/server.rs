//! Line-based multi-user chat server.
//!
//! Clients connect over TCP, join with `#join <nickname>` and every chat line
//! they send is broadcast to all other members.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin salotto-server -- 4000
//! cargo run --bin salotto-server -- 4000 --host 127.0.0.1 --max-users 64
//! ```

use clap::Parser;
use salotto_server::{
    config::{DEFAULT_MAX_USERS, DEFAULT_QUEUE_CAPACITY, ServerConfig},
    ui::Server,
};
use salotto_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "salotto-server")]
#[command(about = "Multi-user TCP chat server with broadcast support", long_about = None)]
struct Args {
    /// TCP port to listen on (registered/dynamic range)
    #[arg(value_parser = clap::value_parser!(u16).range(1024..=49151))]
    port: u16,

    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Maximum number of users in the chatroom
    #[arg(long, default_value_t = DEFAULT_MAX_USERS)]
    max_users: usize,

    /// Messages waiting for broadcast before senders are held back
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(&[env!("CARGO_CRATE_NAME")], &args.log_level);

    let config = ServerConfig {
        max_users: args.max_users,
        queue_capacity: args.queue_capacity,
        ..ServerConfig::default()
    };

    let server = Server::new(config);
    if let Err(e) = server.run(&args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
