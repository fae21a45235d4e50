//! One module per subcommand.

pub mod audit_cmd;
pub mod completions;
pub mod forget;
pub mod get;
pub mod lock;
pub mod passkeys;
pub mod set;
pub mod setup;
pub mod status;
pub mod unlock;
