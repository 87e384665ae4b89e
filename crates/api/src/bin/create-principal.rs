//! Create a principal of any role
//!
//! Administrators have no in-app sign-up, so the first accounts are created
//! from the command line against the configured database.
//!
//! Usage:
//!   create-principal <role> <email> <name> [password]
//!
//! When the password is omitted it is read from stdin, which keeps it out of
//! the process list.

use std::env;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use gymkeep_api::auth::{CredentialHasher, Registration, SessionManager, TokenService};
use gymkeep_api::Config;
use gymkeep_shared::{create_pool, run_migrations, PgPrincipalStore, Role};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let mut args = env::args().skip(1);
    let (Some(role), Some(email), Some(name)) = (args.next(), args.next(), args.next()) else {
        bail!("usage: create-principal <admin|manager|member|trainer> <email> <name> [password]");
    };

    let role: Role = role.parse().context("Unknown role")?;

    let password = match args.next() {
        Some(password) => password,
        None => {
            print!("Password for new {role}: ");
            io::stdout().flush()?;

            let mut password = String::new();
            io::stdin().read_line(&mut password)?;
            password.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    let config = Config::from_env().context("Invalid configuration")?;
    let pool = create_pool(&config.database_url, 1)
        .await
        .context("Failed to create database pool")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let sessions = SessionManager::new(
        Arc::new(PgPrincipalStore::new(pool, role)),
        Arc::new(TokenService::new(&config.token_settings())),
        CredentialHasher::default(),
    );

    let profile = sessions
        .register(Registration {
            name,
            email,
            password,
        })
        .await
        .context("Failed to create principal")?;

    println!("Created {} {} <{}> ({})", role, profile.name, profile.email, profile.id);
    Ok(())
}
