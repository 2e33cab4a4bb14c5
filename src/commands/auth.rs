//! Sign-in commands. An API key issued by `glor-admin` stands in for a
//! password: `login` checks it against the store and remembers it.

use glor_core::store::check_server;
use glor_core::{AuthState, IdentityProvider, RemoteStore};
use std::io::{self, Write};

use super::Context;
use crate::session::StoredSession;

/// Verifies the key with the server and stores the session.
pub async fn login(
    ctx: &Context,
    api_key: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let api_key = match api_key.or_else(|| ctx.config.api_key.as_ref().map(|k| k.value.clone())) {
        Some(key) => key,
        None => prompt_key()?,
    };
    if api_key.trim().is_empty() {
        return Err("API key cannot be empty".into());
    }

    let server_url = ctx.server_url();
    if !check_server(server_url).await {
        return Err(format!("Cannot reach glor-store at {}", server_url).into());
    }

    let user = RemoteStore::new(server_url, Some(api_key.trim().to_string()))
        .whoami()
        .await?;

    StoredSession::new(user.clone(), api_key.trim()).save(&ctx.config.data_dir.value)?;
    ctx.session.sign_in(user);
    println!("{}", capitalize(&ctx.session.current_user().to_string()));
    Ok(())
}

pub fn logout(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    if StoredSession::clear(&ctx.config.data_dir.value)? {
        ctx.session.sign_out();
        println!("Signed out.");
    } else {
        println!("Not signed in.");
    }
    Ok(())
}

pub fn whoami(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    match ctx.session.current_user() {
        AuthState::SignedIn(user) => {
            println!("Email: {}", user.email);
            println!("UID: {}", user.uid);
            if let Some(stored) = &ctx.stored {
                println!(
                    "Signed in: {}",
                    stored.signed_in_at.format("%Y-%m-%d %H:%M UTC")
                );
            }
            println!("Server: {}", ctx.server_url());
        }
        AuthState::SignedOut => println!("Not signed in."),
    }
    Ok(())
}

fn prompt_key() -> io::Result<String> {
    print!("Enter your API key: ");
    io::stdout().flush()?;
    let mut key = String::new();
    io::stdin().read_line(&mut key)?;
    Ok(key.trim().to_string())
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("signed in as a@b.c (u1)"), "Signed in as a@b.c (u1)");
        assert_eq!(capitalize(""), "");
    }
}
