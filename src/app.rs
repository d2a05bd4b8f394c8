use crate::api::ApiError;
use crate::console::AdminConsole;
use crate::directory::{PartnerQuery, SortDirection, UserQuery};
use crate::formatters::{
    render_dashboard, render_partners, render_profile, render_user, render_users,
};
use crate::logging;
use crate::settings::{ConsoleSettings, SettingsError};
use crate::state::SessionError;
use crate::types::{ConsoleView, Credentials, OperatorProfile, SessionState, UserStatus};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing::debug;

const MAX_CODE_ATTEMPTS: usize = 3;

/// Command-line front end for the LoyalBridge admin console
#[derive(Parser, Debug)]
#[command(name = "loyalbridge-console", version, about, long_about = None)]
struct Cli {
    /// Settings file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in, completing the emailed verification code when required
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Show the signed-in operator
    Whoami,
    /// Print the dashboard overview
    Dashboard,
    /// List loyalty program users
    Users(UsersArgs),
    /// Show one loyalty program user
    User { id: u64 },
    /// List integration partners
    Partners(PartnersArgs),
    /// Sign out and forget the stored session
    Logout,
}

#[derive(Args, Debug)]
struct PageArgs {
    #[arg(long, default_value_t = 0)]
    page: u32,
    #[arg(long, default_value_t = 10)]
    size: u32,
    #[arg(long)]
    sort_by: Option<String>,
    #[arg(long)]
    desc: bool,
}

impl PageArgs {
    fn sort_dir(&self) -> Option<SortDirection> {
        self.sort_by
            .as_ref()
            .map(|_| if self.desc { SortDirection::Desc } else { SortDirection::Asc })
    }
}

#[derive(Args, Debug)]
struct UsersArgs {
    #[command(flatten)]
    paging: PageArgs,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    status: Option<UserStatus>,
    #[arg(long)]
    high_risk: Option<bool>,
    #[arg(long)]
    verified: Option<bool>,
}

#[derive(Args, Debug)]
struct PartnersArgs {
    #[command(flatten)]
    paging: PageArgs,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    auth_method: Option<String>,
    #[arg(long)]
    active: Option<bool>,
}

#[derive(Debug, Error)]
enum CommandError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to read input: {0}")]
    Input(#[from] io::Error),
    #[error("Not signed in. Run `loyalbridge-console login` first.")]
    NotSignedIn,
    #[error("Your role ({0}) cannot open the {1} view.")]
    Forbidden(&'static str, &'static str),
    #[error("Too many invalid verification codes; sign in again.")]
    TooManyAttempts,
}

fn prompt_line(label: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{label}")?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn signed_in(console: &AdminConsole) -> Result<OperatorProfile, CommandError> {
    match console.session.restore().await {
        SessionState::Authenticated { profile } => Ok(profile),
        _ => Err(CommandError::NotSignedIn),
    }
}

fn require_view(
    profile: &OperatorProfile,
    view: ConsoleView,
    name: &'static str,
) -> Result<(), CommandError> {
    if profile.role.can_view(view) {
        Ok(())
    } else {
        Err(CommandError::Forbidden(profile.role.label(), name))
    }
}

async fn login(console: &AdminConsole, email: Option<String>) -> Result<(), CommandError> {
    if let SessionState::Authenticated { profile } = console.session.restore().await {
        println!("Already signed in as {}.", profile.display_name);
        return Ok(());
    }

    let email = match email {
        Some(email) => email,
        None => prompt_line("Email: ")?,
    };
    let password = rpassword::prompt_password("Password: ")?;

    let mut state = console
        .session
        .login(Credentials::new(email, password))
        .await?;

    let mut attempts = 0;
    while let SessionState::PendingTwoFactor {
        challenge_message, ..
    } = &state
    {
        if attempts == MAX_CODE_ATTEMPTS {
            console.session.logout().await;
            return Err(CommandError::TooManyAttempts);
        }
        attempts += 1;
        if attempts == 1 {
            println!("{challenge_message}");
        }

        let code = prompt_line("Verification code: ")?;
        match console.session.verify_two_factor(code.trim()).await {
            Ok(next) => state = next,
            Err(err) if err.is_auth_error() => eprintln!("{err}"),
            Err(err) => return Err(err.into()),
        }
    }

    if let Some(profile) = state.profile() {
        print!("{}", render_profile(profile));
    }
    Ok(())
}

async fn execute(command: Command, settings: ConsoleSettings) -> Result<(), CommandError> {
    let console = AdminConsole::start(settings).await?;
    debug!(?command, "running command");

    match command {
        Command::Login { email } => login(&console, email).await,
        Command::Whoami => {
            let profile = signed_in(&console).await?;
            print!("{}", render_profile(&profile));
            Ok(())
        }
        Command::Dashboard => {
            signed_in(&console).await?;
            let report = console.refresh_dashboard().await?;
            let refreshed_at = console.dashboard.last_refreshed_at();
            print!("{}", render_dashboard(&report.snapshot, refreshed_at.as_deref()));
            if !console.session.state().is_authenticated() {
                eprintln!("The session has expired; sign in again.");
            }
            Ok(())
        }
        Command::Users(args) => {
            let profile = signed_in(&console).await?;
            require_view(&profile, ConsoleView::Users, "users")?;
            let query = UserQuery {
                page: Some(args.paging.page),
                size: Some(args.paging.size),
                name: args.name,
                status: args.status,
                is_high_risk: args.high_risk,
                is_verified: args.verified,
                sort_dir: args.paging.sort_dir(),
                sort_by: args.paging.sort_by,
            };
            let page = console.directory.list_users(&query).await?;
            print!("{}", render_users(&page));
            Ok(())
        }
        Command::User { id } => {
            let profile = signed_in(&console).await?;
            require_view(&profile, ConsoleView::Users, "users")?;
            let user = console.directory.get_user(id).await?;
            print!("{}", render_user(&user));
            Ok(())
        }
        Command::Partners(args) => {
            let profile = signed_in(&console).await?;
            require_view(&profile, ConsoleView::Partners, "partners")?;
            let query = PartnerQuery {
                page: Some(args.paging.page),
                size: Some(args.paging.size),
                name: args.name,
                auth_method: args.auth_method,
                is_active: args.active,
                sort_dir: args.paging.sort_dir(),
                sort_by: args.paging.sort_by,
            };
            let page = console.directory.list_partners(&query).await?;
            print!("{}", render_partners(&page));
            Ok(())
        }
        Command::Logout => {
            console.session.logout().await;
            println!("Signed out.");
            Ok(())
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let settings = match ConsoleSettings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            logging::init(cli.debug, None);
            eprintln!("error: {}", CommandError::from(err));
            return ExitCode::from(2);
        }
    };
    logging::init(cli.debug, settings.log_level.as_deref());

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: failed to start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(cli.command, settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
