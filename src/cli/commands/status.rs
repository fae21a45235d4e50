//! `housevault status`: show the session state.

use crate::audit::AuditLog;
use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::Result;
use crate::vault::VaultState;

/// Execute the `status` command.
pub async fn execute(cli: &Cli) -> Result<()> {
    let (vault, data_dir) = open_vault(cli).await?;
    let status = vault.status();
    output::print_status(vault.user_id(), &status);

    if AuditLog::db_path(&data_dir).exists() {
        // An unreadable audit trail only costs the warning.
        let failed = AuditLog::open(&data_dir)
            .and_then(|log| log.failed_unlocks_since_success(vault.user_id()))
            .unwrap_or(0);
        if failed > 0 {
            output::warning(&format!(
                "{failed} failed unlock attempt(s) since the last successful unlock. \
                 Check `housevault audit --failures`."
            ));
        }
    }

    match status.state {
        VaultState::NoAuthenticator => {
            output::tip("Run `housevault setup <email>` to register this device.");
        }
        VaultState::Locked => output::tip("Run `housevault unlock` to open the vault."),
        VaultState::Unlocked | VaultState::Uninitialized => {}
    }
    Ok(())
}
