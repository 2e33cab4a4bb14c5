//! GlorGames Admin CLI
//!
//! Issues and revokes the API keys staff use to write to the store server.
//!
//! # Usage
//!
//! ```bash
//! glor-admin key add editor@glorgames.com
//! glor-admin key list
//! glor-admin key remove editor@glorgames.com
//! ```
//!
//! # Environment Variables
//!
//! - `GLOR_STORE_CONFIG`: Server config file holding the keys (default: ~/.config/glor-store/config.yaml)
//!
//! The server reads keys at startup, so restart it after a change.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use clap::{Args, Parser, Subcommand};
use glorgames::server::{ApiKeyEntry, KeyFile, ServerConfig};
use rand::RngCore;
use std::path::Path;

/// Random bytes per generated key.
const KEY_BYTES: usize = 32;

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "glor-admin")]
#[command(version)]
#[command(about = "GlorGames store administration tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage staff API keys
    Key(KeyCommand),
}

#[derive(Args)]
struct KeyCommand {
    #[command(subcommand)]
    command: KeySubcommand,
}

#[derive(Subcommand)]
enum KeySubcommand {
    /// Issue a key for a staff member
    Add {
        /// Staff email address
        email: String,
        /// Stable user id (defaults to a fresh UUID)
        #[arg(long)]
        uid: Option<String>,
    },
    /// List issued keys
    List,
    /// Revoke every key issued to an email address
    Remove {
        /// Staff email address
        email: String,
    },
}

// ============================================================================
// Commands
// ============================================================================

fn generate_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn add_key(path: &Path, email: String, uid: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = KeyFile::read(path)?;

    if file.find_by_email(&email).is_some() {
        return Err(format!("A key for '{}' already exists", email).into());
    }

    let entry = ApiKeyEntry {
        key: generate_key(),
        uid: uid.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        email,
    };
    file.api_keys.push(entry.clone());
    file.write(path)?;

    println!("Added key for: {}", entry.email);
    println!("  UID: {}", entry.uid);
    println!("  Key: {}", entry.key);
    println!();
    println!("Restart glor-store to pick up the new key.");
    Ok(())
}

fn list_keys(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let file = KeyFile::read(path)?;

    if file.api_keys.is_empty() {
        println!("No keys issued.");
        return Ok(());
    }

    println!("{:<40} {:<38} KEY", "EMAIL", "UID");
    println!("{}", "-".repeat(90));
    for entry in &file.api_keys {
        println!("{:<40} {:<38} {}", entry.email, entry.uid, mask(&entry.key));
    }
    println!();
    println!("Total: {} key(s)", file.api_keys.len());
    Ok(())
}

fn remove_key(path: &Path, email: String) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = KeyFile::read(path)?;

    if file.remove_email(&email) == 0 {
        return Err(format!("No key found for '{}'", email).into());
    }
    file.write(path)?;

    println!("Removed key for: {}", email);
    Ok(())
}

/// Shows only the first few characters of a key.
fn mask(key: &str) -> String {
    let prefix: String = key.chars().take(6).collect();
    format!("{}...", prefix)
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let path = ServerConfig::config_path_from_env();

    let result = match cli.command {
        Commands::Key(key_cmd) => match key_cmd.command {
            KeySubcommand::Add { email, uid } => add_key(&path, email, uid),
            KeySubcommand::List => list_keys(&path),
            KeySubcommand::Remove { email } => remove_key(&path, email),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
