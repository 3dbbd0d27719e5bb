use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use adlaw_detect::DetectClient;
use adlaw_store::{AnalysisStore, BackendClient, IdentityClient, RecordStore};

mod analyze;
mod display;

#[derive(Parser)]
#[command(name = "adlaw", version, about = "Solar panel defect inspection from the command line")]
struct Cli {
    /// Inference service base URL.
    #[arg(
        long,
        env = "ADLAW_DETECT_URL",
        default_value = "http://localhost:8000",
        global = true
    )]
    detect_url: String,

    /// Workspace backend base URL.
    #[arg(
        long,
        env = "ADLAW_BACKEND_URL",
        default_value = "http://localhost:4000",
        global = true
    )]
    backend_url: String,

    /// Session token from `adlaw login`.
    #[arg(long, env = "ADLAW_SESSION", global = true, hide_env_values = true)]
    session: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyse thermal images for panel defects.
    Analyze {
        /// Image files (JPEG or PNG, at most 5).
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Skip the liveness probe before detecting.
        #[arg(long)]
        no_ping: bool,
        /// Upload the images and persist one analysis record per image.
        #[arg(long)]
        save: bool,
    },
    /// Show the reconciled inspection history.
    History,
    /// Create a session and print its token.
    Login { email: String },
    /// Delete the current session.
    Logout,
    /// Show the signed-in account.
    Whoami,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    tracing::info!("adlaw v{}", env!("CARGO_PKG_VERSION"));

    let backend = {
        let client = BackendClient::new(cli.backend_url.clone());
        match &cli.session {
            Some(token) => client.with_session(token.clone()),
            None => client,
        }
    };

    match cli.command {
        Command::Analyze {
            images,
            no_ping,
            save,
        } => {
            let detect = DetectClient::new(cli.detect_url.clone());
            let opts = analyze::Options {
                ping: !no_ping,
                save,
            };
            let analysed = analyze::run(&detect, &backend, &images, opts).await?;
            for file in &analysed {
                display::print_analysis(file);
            }
        }
        Command::History => run_history(&backend).await?,
        Command::Login { email } => run_login(&backend, &email).await?,
        Command::Logout => {
            IdentityClient::new(backend).logout().await?;
            println!("Session deleted.");
        }
        Command::Whoami => {
            let user = IdentityClient::new(backend)
                .current_user()
                .await
                .context("fetching account")?;
            println!("{:<8} {}", "id", user.id);
            println!("{:<8} {}", "email", user.email);
            if !user.username.is_empty() {
                println!("{:<8} {}", "username", user.username);
            }
        }
    }
    Ok(())
}

async fn run_history(backend: &BackendClient) -> anyhow::Result<()> {
    let identity = IdentityClient::new(backend.clone());
    let user = identity.current_user().await.context("fetching account")?;

    let store = AnalysisStore::new(RecordStore::new(backend.clone()));
    let (defects, analyses) = tokio::try_join!(
        store.defect_history(&user.id),
        store.analysis_history(&user.id),
    )
    .context("fetching history")?;

    let feed = adlaw_core::reconcile(&defects, &analyses);
    display::print_history(&feed);
    Ok(())
}

async fn run_login(backend: &BackendClient, email: &str) -> anyhow::Result<()> {
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut password = String::new();
    io::stdin()
        .read_line(&mut password)
        .context("reading password")?;
    let password = password.trim_end_matches(['\r', '\n']);

    let identity = IdentityClient::new(backend.clone());
    let session = identity
        .login(email, password)
        .await
        .context("creating session")?;

    println!("Signed in as {email}.");
    println!("export ADLAW_SESSION={}", session.token);
    Ok(())
}
