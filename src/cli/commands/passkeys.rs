//! `housevault passkeys`: list and remove registered passkeys.

use crate::audit::{self, AuditRecord, VaultEvent};
use crate::cli::output;
use crate::cli::{confirm, open_vault, Cli};
use crate::errors::Result;

/// Execute `passkeys list`.
pub async fn execute_list(cli: &Cli) -> Result<()> {
    let (vault, _) = open_vault(cli).await?;
    let bindings = vault.authenticators().await?;
    output::print_passkeys_table(&bindings);
    Ok(())
}

/// Execute `passkeys remove`.
pub async fn execute_remove(cli: &Cli, credential_id: &str, force: bool) -> Result<()> {
    if !force
        && !confirm(&format!(
            "Remove passkey '{credential_id}'? This device will no longer unlock the vault with it."
        ))?
    {
        output::info("Cancelled.");
        return Ok(());
    }

    let (mut vault, data_dir) = open_vault(cli).await?;
    let result = vault.remove_authenticator(credential_id).await;
    audit::record(
        &data_dir,
        &AuditRecord::from_result(VaultEvent::PasskeyRemoved, &cli.user, &result)
            .subject(credential_id),
    );
    result?;

    output::success("Passkey removed.");
    if !vault.status().has_passkey {
        output::tip("No passkeys remain. Run `housevault setup <email>` to register one.");
    }
    Ok(())
}
