//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::store::AuthenticatorBinding;
use crate::vault::{DecryptedCredential, VaultState, VaultStatus};

/// Mask shown instead of a password unless `--show` is given.
const MASK: &str = "********";

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print the session status.
pub fn print_status(user_id: &str, status: &VaultStatus) {
    let state = match status.state {
        VaultState::Unlocked => style(status.state.as_str()).green().bold(),
        VaultState::Locked => style(status.state.as_str()).yellow().bold(),
        VaultState::NoAuthenticator | VaultState::Uninitialized => {
            style(status.state.as_str()).red().bold()
        }
    };

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec!["User".to_string(), user_id.to_string()]);
    table.add_row(vec!["State".to_string(), state.to_string()]);
    table.add_row(vec![
        "Passkey".to_string(),
        if status.has_passkey { "registered" } else { "none" }.to_string(),
    ]);
    table.add_row(vec![
        "Authenticator".to_string(),
        status.authenticator_name.clone(),
    ]);
    if let Some(err) = &status.last_error {
        table.add_row(vec!["Last error".to_string(), err.clone()]);
    }
    println!("{table}");
}

/// Print one account's credentials.  The password is masked unless
/// `show_password` is set; unreadable fields show a placeholder.
pub fn print_credential(account_id: &str, cred: &DecryptedCredential, show_password: bool) {
    let password = match cred.password.as_str() {
        Some(text) if show_password => text.to_string(),
        Some("") => String::new(),
        Some(_) => MASK.to_string(),
        None => cred.password.display_text().to_string(),
    };

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Account".to_string(), account_id.to_string()]);
    table.add_row(vec![
        "Username".to_string(),
        cred.username.display_text().to_string(),
    ]);
    table.add_row(vec!["Password".to_string(), password]);
    table.add_row(vec!["Notes".to_string(), cred.notes.display_text().to_string()]);
    println!("{table}");

    if !cred.is_complete() {
        warning(&format!(
            "{} field(s) could not be decrypted",
            cred.unreadable_count()
        ));
    }
}

/// Print a table of registered passkeys (newest first).
pub fn print_passkeys_table(bindings: &[AuthenticatorBinding]) {
    if bindings.is_empty() {
        info("No passkeys registered yet.");
        tip("Run `housevault setup <email>` to register this device.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Credential", "Type", "Backed up", "Created", "Last used"]);

    for b in bindings {
        table.add_row(vec![
            b.credential_id.clone(),
            b.device_type.clone(),
            if b.backed_up { "yes" } else { "no" }.to_string(),
            b.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            b.last_used_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!("{table}");
}
