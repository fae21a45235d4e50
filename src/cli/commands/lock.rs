//! `housevault lock`: forget the session key.

use crate::audit::{self, AuditRecord, VaultEvent};
use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::Result;

/// Execute the `lock` command.
pub async fn execute(cli: &Cli) -> Result<()> {
    let (mut vault, data_dir) = open_vault(cli).await?;
    let was_unlocked = vault.is_unlocked();

    let result = vault.lock();
    let record = AuditRecord::from_result(VaultEvent::Lock, &cli.user, &result);
    let record = if was_unlocked {
        record
    } else {
        record.details("already locked")
    };
    audit::record(&data_dir, &record);
    result?;

    output::success("Vault locked.");
    Ok(())
}
