//! `housevault set`: encrypt and store an account's credentials.

use std::io::{self, IsTerminal, Read};

use zeroize::Zeroizing;

use crate::audit::{self, AuditRecord, VaultEvent};
use crate::cli::output;
use crate::cli::{open_vault, require_unlocked, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `set` command.
pub async fn execute(
    cli: &Cli,
    account: &str,
    username: &str,
    password: Option<&str>,
    notes: &str,
) -> Result<()> {
    let (vault, data_dir) = open_vault(cli).await?;
    require_unlocked(&vault)?;

    // Determine the password from one of three sources.
    let password = if let Some(p) = password {
        // Source 1: Inline value on the command line.
        output::warning("Password provided on command line; it may appear in shell history.");
        Zeroizing::new(p.to_string())
    } else if !io::stdin().is_terminal() {
        // Source 2: Piped input (stdin is not a terminal).
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_to_string(&mut buf)?;
        Zeroizing::new(buf.trim_end().to_string())
    } else {
        // Source 3: Interactive secure prompt (default).
        let entered = dialoguer::Password::new()
            .with_prompt(format!("Password for {account}"))
            .allow_empty_password(true)
            .interact()
            .map_err(|e| VaultError::CommandFailed(format!("input prompt: {e}")))?;
        Zeroizing::new(entered)
    };

    let existed = vault.load_credentials(account).await?.is_some();
    let result = vault
        .save_credentials(account, username, &password, notes)
        .await;

    let detail = if existed { "updated" } else { "added" };
    audit::record(
        &data_dir,
        &AuditRecord::from_result(VaultEvent::CredentialsSaved, &cli.user, &result)
            .subject(account)
            .details(detail),
    );
    result?;

    output::success(&format!("Credentials for '{account}' {detail}."));
    Ok(())
}
