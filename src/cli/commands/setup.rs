//! `housevault setup`: register a passkey on this device and unlock.

use crate::audit::{self, AuditRecord, VaultEvent};
use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::Result;

/// Execute the `setup` command.
pub async fn execute(cli: &Cli, email: &str) -> Result<()> {
    let (mut vault, data_dir) = open_vault(cli).await?;
    let had_passkey = vault.status().has_passkey;

    output::info(&format!(
        "Registering a passkey with {}...",
        vault.gateway().display_name()
    ));
    let result = vault.setup(email).await;

    let details = if had_passkey {
        "additional passkey registered"
    } else {
        "first passkey registered"
    };
    audit::record(
        &data_dir,
        &AuditRecord::from_result(VaultEvent::Setup, &cli.user, &result).details(details),
    );
    result?;

    output::success(&format!("Passkey registered for {email}. Vault unlocked."));
    output::tip("Store credentials: housevault set <account> --username <name>");
    Ok(())
}
