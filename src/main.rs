use clap::Parser;
use housevault::cli::commands;
use housevault::cli::{load_settings, Cli, Commands, PasskeyAction};
use housevault::errors::{Result, VaultError};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            housevault::cli::output::error(&format!("failed to start runtime: {e}"));
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(&cli)) {
        housevault::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    match cli.command {
        Commands::Setup { ref email } => commands::setup::execute(cli, email).await,
        Commands::Unlock => commands::unlock::execute(cli).await,
        Commands::Lock => commands::lock::execute(cli).await,
        Commands::Status => commands::status::execute(cli).await,
        Commands::Set {
            ref account,
            ref username,
            ref password,
            ref notes,
        } => commands::set::execute(cli, account, username, password.as_deref(), notes).await,
        Commands::Get {
            ref account,
            show,
            copy,
        } => commands::get::execute(cli, account, show, copy).await,
        Commands::Forget { ref account, force } => {
            commands::forget::execute(cli, account, force).await
        }
        Commands::Passkeys { ref action } => match action {
            PasskeyAction::List => commands::passkeys::execute_list(cli).await,
            PasskeyAction::Remove {
                ref credential_id,
                force,
            } => commands::passkeys::execute_remove(cli, credential_id, *force).await,
        },
        Commands::Audit {
            last,
            ref since,
            failures,
            all_users,
        } => commands::audit_cmd::execute(cli, last, since.as_deref(), failures, all_users),
        Commands::Completions { shell } => {
            commands::completions::execute(shell);
            Ok(())
        }
    }
}

/// Log to stderr.  `HOUSEVAULT_LOG` wins, then `-v`, then the configured level.
fn init_tracing(verbose: u8) {
    let filter = match std::env::var("HOUSEVAULT_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(match verbose {
            0 => load_settings()
                .map(|s| s.log_level)
                .unwrap_or_else(|_: VaultError| "warn".to_string()),
            1 => "info".to_string(),
            2 => "debug".to_string(),
            _ => "trace".to_string(),
        }),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
