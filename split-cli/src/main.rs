use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use split_cli::app::{App, FormInput, OutputFormat, parse_currency};
use split_cli::config::AppConfig;
use split_cli::{csv_loader, logging, utils};
use split_core::{ConfigurationId, Currency, SharedExpense};

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Split shared expenses in proportion to two incomes.
///
/// The last form is kept in local storage, so running `calculate` with no
/// fields recalculates it.
#[derive(Debug, Parser)]
#[command(name = "fairshare", version)]
struct Cli {
    /// Config file. Defaults to `fairshare.toml` in the working directory
    /// when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database backend for named configurations.
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Database connection string.
    /// For SQLite this is a file path (e.g. `fairshare.db`) or `:memory:`.
    #[arg(long, global = true)]
    db: Option<String>,

    /// Directory for local storage and the default database.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Signed-in user for named configurations.
    #[arg(long, global = true)]
    user: Option<String>,

    /// Log level or filter directive. `RUST_LOG` wins when set.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also write logs to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Hide log output on stderr.
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Work out who pays what.
    Calculate {
        #[command(flatten)]
        form: FormArgs,

        /// Start from a share link instead of local storage.
        #[arg(long, conflicts_with_all = ["name1", "name2", "salary1", "salary2", "expense", "csv"])]
        from: Option<String>,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Load a share link, legacy link or saved configuration into the form.
    Restore {
        /// Full link or query string such as `?id=abc` or `?config=3`.
        /// Without one, the last local form is shown.
        link: Option<String>,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Create or open share links.
    #[command(subcommand)]
    Share(ShareCommand),

    /// Named configurations of the signed-in user.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Show or change the display currency.
    Currency {
        /// Currency code, e.g. `GBP`.
        code: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum ShareCommand {
    /// Create a link for the current form.
    Create {
        #[command(flatten)]
        form: FormArgs,
    },
    /// Print the form behind a share id.
    Open {
        id: String,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Save the last calculated form.
    Save {
        /// Defaults to today's date.
        #[arg(long)]
        name: Option<String>,
    },
    List {
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    Show {
        id: ConfigurationId,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    Rename {
        id: ConfigurationId,
        name: String,
    },
    Delete {
        id: ConfigurationId,
    },
}

/// Form fields. Any field given starts a fresh form.
#[derive(Debug, Args)]
struct FormArgs {
    #[arg(long)]
    name1: Option<String>,

    #[arg(long)]
    name2: Option<String>,

    /// Monthly take-home pay of person 1.
    #[arg(long)]
    salary1: Option<String>,

    /// Monthly take-home pay of person 2.
    #[arg(long)]
    salary2: Option<String>,

    /// `LABEL=AMOUNT` or `AMOUNT`. Repeatable.
    #[arg(long, short, value_parser = utils::parse_expense_arg)]
    expense: Vec<SharedExpense>,

    /// CSV file with `label,amount` columns.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Display currency for this calculation.
    #[arg(long, value_parser = parse_currency_arg)]
    currency: Option<Currency>,
}

fn parse_currency_arg(s: &str) -> Result<Currency, String> {
    parse_currency(s).map_err(|e| e.to_string())
}

impl FormArgs {
    fn into_input(self) -> anyhow::Result<(FormInput, Option<Currency>)> {
        let mut input = FormInput {
            name1: self.name1,
            name2: self.name2,
            salary1: self.salary1,
            salary2: self.salary2,
            expenses: self.expense,
        };
        if let Some(path) = &self.csv {
            let items = csv_loader::load_from_file(path)
                .with_context(|| format!("cannot load expenses from '{}'", path.display()))?;
            debug!(count = items.len(), "loaded expenses from csv");
            input.extend_expenses(&items);
        }
        Ok((input, self.currency))
    }
}

// ─── configuration ───────────────────────────────────────────────────────────

/// Layers flags over the config file.
fn resolve_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(backend) = &cli.backend {
        config.database.backend = Some(backend.clone());
    }
    if let Some(db) = &cli.db {
        config.database.connection_string = Some(db.clone());
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if let Some(user) = &cli.user {
        config.user = Some(user.clone());
    }
    if let Some(level) = &cli.log_level {
        config.log_level = Some(level.clone());
    }
    if let Some(file) = &cli.log_file {
        config.log_file = Some(file.clone());
    }
    Ok(config)
}

fn log_settings(
    config: &AppConfig,
    quiet: bool,
) -> logging::LogSettings {
    logging::LogSettings {
        level: config.log_level.clone(),
        file: config.log_file.clone(),
        quiet,
    }
}

// ─── entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    logging::init_logging(&log_settings(&config, cli.quiet));

    let app = App::from_config(config);
    debug!(user = ?app.user(), "starting");

    let output = match cli.command {
        Command::Calculate { form, from, format } => {
            let (input, currency) = form.into_input()?;
            app.calculate(&input, from.as_deref(), currency, format).await?
        }
        Command::Restore { link, format } => app.restore(link.as_deref(), format).await?,
        Command::Share(ShareCommand::Create { form }) => {
            let (input, currency) = form.into_input()?;
            app.share_create(&input, currency).await?
        }
        Command::Share(ShareCommand::Open { id, format }) => app.share_open(&id, format).await?,
        Command::Config(ConfigCommand::Save { name }) => app.config_save(name.as_deref()).await?,
        Command::Config(ConfigCommand::List { format }) => app.config_list(format).await?,
        Command::Config(ConfigCommand::Show { id, format }) => app.config_show(id, format).await?,
        Command::Config(ConfigCommand::Rename { id, name }) => app.config_rename(id, &name).await?,
        Command::Config(ConfigCommand::Delete { id }) => app.config_delete(id).await?,
        Command::Currency { code } => app.currency_command(code.as_deref()).await?,
    };

    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }
    Ok(())
}
