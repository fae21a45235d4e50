//! `housevault get`: decrypt and show an account's credentials.

use crate::cli::output;
use crate::cli::{open_vault, require_unlocked, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `get` command.
pub async fn execute(cli: &Cli, account: &str, show: bool, copy: bool) -> Result<()> {
    let (vault, _) = open_vault(cli).await?;
    require_unlocked(&vault)?;

    let cred = vault
        .load_credentials(account)
        .await?
        .ok_or_else(|| VaultError::NotFound(format!("no credentials stored for '{account}'")))?;

    output::print_credential(account, &cred, show);

    if copy {
        let password = cred.password.as_str().ok_or_else(|| {
            VaultError::CommandFailed("password could not be decrypted".into())
        })?;
        copy_to_clipboard(password)?;
        output::success("Password copied to clipboard.");
    }
    Ok(())
}

fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new()
        .map_err(|e| VaultError::CommandFailed(format!("clipboard unavailable: {e}")))?;
    clipboard
        .set_text(text.to_string())
        .map_err(|e| VaultError::CommandFailed(format!("clipboard write failed: {e}")))
}
