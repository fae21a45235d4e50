//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;
use dialoguer::Confirm;

use crate::authenticator::{AuthenticatorGateway, SoftwareAuthenticator, UserVerifier};
use crate::config::Settings;
use crate::custody::FileSessionCache;
use crate::errors::{Result, VaultError};
use crate::store::SqliteStore;
use crate::vault::Vault;

/// Env var that approves every passkey prompt without interaction.
pub const ASSUME_VERIFIED_ENV: &str = "HOUSEVAULT_ASSUME_VERIFIED";

/// House Vault CLI: passkey-protected credential vault.
#[derive(Parser)]
#[command(
    name = "housevault",
    about = "Passkey-protected credential vault for household accounts",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// User whose vault to open
    #[arg(short, long, env = "HOUSEVAULT_USER", default_value = "local", global = true)]
    pub user: String,

    /// Data directory (default: from .housevault.toml, else .housevault)
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Directory for the session key cache (default: $XDG_RUNTIME_DIR/housevault)
    #[arg(long, env = "HOUSEVAULT_SESSION_DIR", global = true)]
    pub session_dir: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Register a passkey on this device and unlock the vault
    Setup {
        /// Email shown on the passkey
        email: String,
    },

    /// Unlock the vault with a registered passkey
    Unlock,

    /// Lock the vault and forget the session key
    Lock,

    /// Show whether the vault is locked
    Status,

    /// Store credentials for an account (add or update)
    Set {
        /// Account id (e.g. netflix)
        account: String,

        /// Username for the account
        #[arg(long, default_value = "")]
        username: String,

        /// Password (omit for interactive prompt)
        #[arg(long)]
        password: Option<String>,

        /// Free-form notes
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Show an account's credentials
    Get {
        /// Account id
        account: String,

        /// Print the password instead of masking it
        #[arg(long)]
        show: bool,

        /// Copy the password to the clipboard
        #[arg(long)]
        copy: bool,
    },

    /// Delete an account's stored credentials
    Forget {
        /// Account id
        account: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Manage registered passkeys
    Passkeys {
        #[command(subcommand)]
        action: PasskeyAction,
    },

    /// Show the history of vault events
    Audit {
        /// Number of events to show
        #[arg(long, default_value = "50")]
        last: usize,

        /// Only events within this window (e.g. 7d, 12h, 1d12h)
        #[arg(long)]
        since: Option<String>,

        /// Only events that failed
        #[arg(long)]
        failures: bool,

        /// Include every user's events, not just --user
        #[arg(long)]
        all_users: bool,
    },

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Passkey subcommands.
#[derive(clap::Subcommand)]
pub enum PasskeyAction {
    /// List registered passkeys
    List,

    /// Remove a registered passkey
    Remove {
        /// Credential id (as shown by `passkeys list`)
        credential_id: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// The vault as the CLI runs it: SQLite store, file session cache, and the
/// software passkey authenticator confirmed on the console.
pub type CliVault = Vault<SqliteStore, FileSessionCache, SoftwareAuthenticator<ConsoleVerifier>>;

/// Approves passkey ceremonies with a console confirmation.
///
/// `HOUSEVAULT_ASSUME_VERIFIED=1` approves without asking (scripts, CI).
pub struct ConsoleVerifier;

impl UserVerifier for ConsoleVerifier {
    fn verify(&self, prompt: &str) -> bool {
        if std::env::var(ASSUME_VERIFIED_ENV).is_ok_and(|v| v == "1") {
            return true;
        }

        eprintln!("{prompt}\n");
        Confirm::new()
            .with_prompt("Approve with this device?")
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

/// Project settings from `<cwd>/.housevault.toml`.
pub fn load_settings() -> Result<Settings> {
    let cwd = std::env::current_dir()?;
    Settings::load(&cwd)
}

/// Resolve the data directory from `--data-dir` or settings.
///
/// Example: `<cwd>/.housevault`
pub fn data_dir(cli: &Cli, settings: &Settings) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(match &cli.data_dir {
        Some(dir) => cwd.join(dir),
        None => settings.data_path(&cwd),
    })
}

/// Resolve the session cache directory.
pub fn session_dir(cli: &Cli) -> PathBuf {
    cli.session_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(FileSessionCache::default_dir)
}

/// Build the vault for `cli.user` and run `init`.
pub async fn open_vault(cli: &Cli) -> Result<(CliVault, PathBuf)> {
    let settings = load_settings()?;
    let dir = data_dir(cli, &settings)?;
    ensure_private_dir(&dir)?;

    let store = SqliteStore::open(&dir.join("store.db"))?;
    let session = FileSessionCache::new(&session_dir(cli), &cli.user);
    let platform = SoftwareAuthenticator::open(&dir.join("passkeys.json"), ConsoleVerifier)?;
    let gateway =
        AuthenticatorGateway::new(platform, settings.relying_party(), settings.ceremony_timeout());

    let mut vault = Vault::new(cli.user.clone(), store, session, gateway);
    vault.init().await?;
    Ok((vault, dir))
}

/// Fail with a hint unless the vault is unlocked.
pub fn require_unlocked(vault: &CliVault) -> Result<()> {
    if vault.is_unlocked() {
        return Ok(());
    }
    output::tip("Run `housevault unlock` first.");
    Err(VaultError::VaultLocked)
}

/// Ask before a destructive action.  Returns `false` if the user declined.
pub fn confirm(prompt: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| VaultError::CommandFailed(format!("confirm prompt: {e}")))
}

fn ensure_private_dir(dir: &std::path::Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn globals_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "housevault",
            "status",
            "--user",
            "alice",
            "--data-dir",
            "vault",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.user, "alice");
        assert_eq!(cli.data_dir.as_deref(), Some("vault"));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn data_dir_flag_overrides_settings() {
        let cli = Cli::try_parse_from(["housevault", "status", "--data-dir", "custom"]).unwrap();
        let dir = data_dir(&cli, &Settings::default()).unwrap();
        assert!(dir.ends_with("custom"));

        let cli = Cli::try_parse_from(["housevault", "status"]).unwrap();
        let dir = data_dir(&cli, &Settings::default()).unwrap();
        assert!(dir.ends_with(".housevault"));
    }

    #[test]
    fn audit_flags_and_completion_shells_parse() {
        let cli = Cli::try_parse_from([
            "housevault",
            "audit",
            "--since",
            "1d12h",
            "--failures",
            "--all-users",
        ])
        .unwrap();
        match cli.command {
            Commands::Audit {
                last,
                since,
                failures,
                all_users,
            } => {
                assert_eq!(last, 50);
                assert_eq!(since.as_deref(), Some("1d12h"));
                assert!(failures && all_users);
            }
            _ => panic!("expected audit"),
        }

        assert!(Cli::try_parse_from(["housevault", "completions", "zsh"]).is_ok());
        assert!(Cli::try_parse_from(["housevault", "completions", "tcsh"]).is_err());
    }

    #[test]
    fn set_defaults_optional_fields() {
        let cli = Cli::try_parse_from(["housevault", "set", "netflix"]).unwrap();
        match cli.command {
            Commands::Set {
                account,
                username,
                password,
                notes,
            } => {
                assert_eq!(account, "netflix");
                assert!(username.is_empty());
                assert!(password.is_none());
                assert!(notes.is_empty());
            }
            _ => panic!("expected set"),
        }
    }
}
