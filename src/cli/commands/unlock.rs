//! `housevault unlock`: prove presence with a passkey and cache the key
//! for this session.

use crate::audit::{self, AuditRecord, VaultEvent};
use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `unlock` command.
pub async fn execute(cli: &Cli) -> Result<()> {
    let (mut vault, data_dir) = open_vault(cli).await?;

    if vault.is_unlocked() {
        output::info("Vault is already unlocked for this session.");
        return Ok(());
    }

    let result = vault.unlock().await;
    audit::record(
        &data_dir,
        &AuditRecord::from_result(VaultEvent::Unlock, &cli.user, &result),
    );

    match result {
        Ok(()) => {
            output::success("Vault unlocked.");
            Ok(())
        }
        Err(e) => {
            match e {
                VaultError::NoPasskeyRegistered => {
                    output::tip("Run `housevault setup <email>` to register this device.")
                }
                VaultError::KeyMissing => output::tip(
                    "The passkey is valid but no vault key is stored; run `housevault setup <email>` again.",
                ),
                _ if e.is_retryable() => output::tip("Run `housevault unlock` to try again."),
                _ => {}
            }
            Err(e)
        }
    }
}
