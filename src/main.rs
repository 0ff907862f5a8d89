use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use leto_talks::classifier::{self, ToxicityModel, HOLDOUT_FRACTION};
use leto_talks::config::Config;
use leto_talks::error::GateError;
use leto_talks::import;
use leto_talks::models::CHARACTERISTICS;
use leto_talks::moderation::{Action, Moderator, MODEL_FILE};
use leto_talks::render::{render, stars};
use leto_talks::session::{SessionStore, StubPolicy};
use leto_talks::storage::DirStore;
use leto_talks::store::{parse_vote, RatingStore, StoreOptions};
use leto_talks::views::{self, build_router, ViewContext};

#[derive(Parser)]
#[command(name = "leto-talks")]
#[command(about = "Browse and rate teachers, stored in a local key-value store", long_about = None)]
struct Cli {
    /// Directory holding the persisted blobs (overrides LETOTALKS_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with the configured student identity
    Login,
    /// Forget the current session
    Logout,
    /// Log out if logged in, log in otherwise
    Toggle,
    /// Show who is logged in
    Whoami,
    /// Resolve a route path such as /top/clarity or /search?q=...
    Open { path: String },
    /// Rank all teachers by one characteristic
    Top { key: String },
    /// List a department's teachers
    Department { name: String },
    /// Search teachers by name
    Search { query: String },
    /// Show a teacher profile
    Teacher { id: String },
    /// Rate a teacher on one characteristic (1-5)
    Rate {
        teacher: String,
        key: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Leave an anonymous comment
    Comment { teacher: String, text: String },
    /// Import teachers from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List the rateable characteristics
    Characteristics,
    /// Train or try the comment moderation model
    Moderation {
        #[command(subcommand)]
        command: ModerationCommand,
    },
}

#[derive(Subcommand)]
enum ModerationCommand {
    /// Train from a CSV with text,label columns
    Train {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show the decision for a piece of text without logging it
    Check { text: String },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("invalid configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let storage = DirStore::open(&config.data_dir)
        .with_context(|| format!("cannot open data directory {}", config.data_dir.display()))?;
    let mut sessions = SessionStore::new(
        storage.clone(),
        Box::new(StubPolicy::new(config.student_email.clone())),
    );
    let options = StoreOptions {
        comment_max_chars: config.comment_max_chars,
    };

    match cli.command {
        Commands::Login => {
            let session = sessions.login()?;
            println!("Logged in as {}.", session.user_id());
        }
        Commands::Logout => {
            sessions.logout()?;
            println!("Logged out.");
        }
        Commands::Toggle => match sessions.toggle()? {
            state if state.logged_in => {
                println!("Logged in as {}.", state.email.unwrap_or_default());
            }
            _ => println!("Logged out."),
        },
        Commands::Whoami => match sessions.state()? {
            state if state.logged_in => {
                println!("{}", state.email.unwrap_or_default());
            }
            _ => println!("Not logged in."),
        },
        Commands::Characteristics => {
            for c in CHARACTERISTICS {
                println!("{} - {}", c.key, c.name);
            }
        }
        Commands::Moderation { command } => {
            moderation(command, &config)?;
        }
        Commands::Rate {
            teacher,
            key,
            value,
        } => {
            let session = sessions.context()?;
            let value = parse_vote(&value)?;
            let mut store = RatingStore::open(storage, options).context("failed to load store")?;
            let aggregate = store.cast_vote(session.user_id(), &teacher, &key, value)?;
            println!(
                "Recorded {value} for {key}: now {} across {} votes.",
                stars(aggregate.average()),
                aggregate.count
            );
            show(&store, Some(session.user_id()), &views::teacher_path(&teacher));
        }
        Commands::Comment { teacher, text } => {
            let session = sessions.context()?;
            let mut store = RatingStore::open(storage, options).context("failed to load store")?;
            let moderator = Moderator::from_dir(&config.data_dir, config.thresholds)
                .context("failed to load moderation model")?;
            let text = store.check_comment(&teacher, &text)?;
            let decision = moderator
                .moderate(&text, &teacher)
                .context("failed to write moderation log")?;
            if decision.action == Action::Block {
                return Err(GateError::CommentRejected(decision.reason.to_string()).into());
            }
            store.add_comment(&teacher, &text)?;
            if decision.action == Action::Flag {
                println!("Comment posted and queued for review ({}).", decision.reason);
            } else {
                println!("Comment posted.");
            }
            show(&store, Some(session.user_id()), &views::teacher_path(&teacher));
        }
        Commands::Import { csv } => {
            let records = import::read_records_from_path(&csv)?;
            let mut store = RatingStore::open(storage, options).context("failed to load store")?;
            let ids = store.bulk_import(records)?;
            println!("Imported {} teachers from {}.", ids.len(), csv.display());
        }
        view => {
            let path = match view {
                Commands::Open { path } => path,
                Commands::Top { key } => views::top_path(&key),
                Commands::Department { name } => views::department_path(&name),
                Commands::Search { query } => views::search_path(&query),
                Commands::Teacher { id } => views::teacher_path(&id),
                _ => "/".to_string(),
            };
            let store = RatingStore::open(storage, options).context("failed to load store")?;
            let session = sessions.context().ok();
            show(&store, session.as_ref().map(|s| s.user_id()), &path);
        }
    }

    Ok(())
}

fn show(store: &RatingStore<DirStore>, viewer: Option<&str>, path: &str) {
    let mut router = build_router();
    let mut ctx = ViewContext { store, viewer };
    let view = router.navigate(&mut ctx, path);
    print!("{}", render(&view));
}

fn moderation(command: ModerationCommand, config: &Config) -> anyhow::Result<()> {
    match command {
        ModerationCommand::Train { csv } => {
            let file = std::fs::File::open(&csv)
                .with_context(|| format!("cannot open {}", csv.display()))?;
            let samples = classifier::read_samples(file)?;
            let (model, evaluation) = ToxicityModel::train_with_holdout(samples, HOLDOUT_FRACTION)?;
            let out = config.data_dir.join(MODEL_FILE);
            model.save(&out)?;
            print!("{evaluation}");
            println!("Model written to {}.", out.display());
        }
        ModerationCommand::Check { text } => {
            let model = ToxicityModel::load(&config.data_dir.join(MODEL_FILE))?;
            let decision = Moderator::new(model, config.thresholds).decide(&text);
            match decision.probability {
                Some(p) => println!("{:?} ({}, p={p:.3})", decision.action, decision.reason),
                None => println!("{:?} ({})", decision.action, decision.reason),
            }
        }
    }
    Ok(())
}
