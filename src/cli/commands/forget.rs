//! `housevault forget`: delete an account's stored credentials.

use crate::audit::{self, AuditRecord, VaultEvent};
use crate::cli::output;
use crate::cli::{confirm, open_vault, Cli};
use crate::errors::Result;

/// Execute the `forget` command.
pub async fn execute(cli: &Cli, account: &str, force: bool) -> Result<()> {
    if !force && !confirm(&format!("Delete stored credentials for '{account}'?"))? {
        output::info("Cancelled.");
        return Ok(());
    }

    let (vault, data_dir) = open_vault(cli).await?;
    let result = vault.forget_credentials(account).await;
    audit::record(
        &data_dir,
        &AuditRecord::from_result(VaultEvent::CredentialsForgotten, &cli.user, &result)
            .subject(account),
    );
    result?;

    output::success(&format!("Deleted credentials for '{account}'"));
    Ok(())
}
