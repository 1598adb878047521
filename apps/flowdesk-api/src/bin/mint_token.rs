//! Prints a signed bearer credential for local development.
//!
//! Usage:
//!   cargo run -p flowdesk-api --bin mint-token -- <user_id> <name> [role] [email]
//!
//! `role` is one of reviewer, supervisor or admin (default reviewer). The
//! signing secret and lifetime come from JWT_SECRET and TOKEN_TTL_SECS.

use std::path::Path;

use flowdesk_api::auth::tokens;
use flowdesk_api::config::Config;
use flowdesk_api::models::user::{Principal, Role};

fn main() {
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        eprintln!("usage: mint-token <user_id> <name> [role] [email]");
        std::process::exit(2);
    }

    let role = match args.get(2).map(String::as_str) {
        None => Role::Reviewer,
        Some(raw) => match serde_json::from_value::<Role>(serde_json::Value::String(raw.to_string())) {
            Ok(role) => role,
            Err(_) => {
                eprintln!("unknown role: {raw}");
                std::process::exit(2);
            }
        },
    };

    let principal = Principal {
        id: args[0].clone(),
        name: args[1].clone(),
        role,
        email: args.get(3).cloned(),
    };

    let config = Config::from_env();
    match tokens::mint_token(&config.jwt_secret, &principal, config.token_ttl_secs) {
        Ok(token) => println!("{token}"),
        Err(e) => {
            eprintln!("failed to mint token: {e}");
            std::process::exit(1);
        }
    }
}
