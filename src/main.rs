use std::path::PathBuf;

use podcast_catalog::models::{Episode, Show};
use podcast_catalog::{App, AppError, Config, Result};

const USAGE: &str = "\
Usage: podcatalog [--config PATH] [COMMAND]

Commands:
  (none)                       run the hourly refresh until Ctrl-C
  --ingest URL                 ingest one feed now
  --import FILE.opml           ingest every feed in an OPML file
  --approve SHOW_ID            make a show public
  --delete SHOW_ID             remove a show and its episodes
  --list [N] [--all]           newest shows, approved only unless --all
  --show SHOW_ID               show details
  --episodes SHOW_ID           episodes of a show, newest first
  --search QUERY [--show-id ID]  search shows, or episodes of one show
  --refresh                    refresh every approved show once and exit
  --reset                      drop and recreate the catalog";

#[derive(Debug, PartialEq)]
enum Command {
    Serve,
    Ingest(String),
    Import(PathBuf),
    Approve(String),
    Delete(String),
    List { limit: usize, all: bool },
    Show(String),
    Episodes(String),
    Search { query: String, show_id: Option<String> },
    Refresh,
    Reset,
}

fn parse_args(mut args: Vec<String>) -> std::result::Result<(Option<PathBuf>, Command), String> {
    let config_path = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let path = args.remove(i + 1);
            args.remove(i);
            Some(PathBuf::from(path))
        }
        Some(_) => return Err("--config needs a path".into()),
        None => None,
    };

    let value = |i: usize, flag: &str| {
        args.get(i)
            .cloned()
            .ok_or_else(|| format!("{flag} needs a value"))
    };

    let command = match args.first().map(String::as_str) {
        None => Command::Serve,
        Some("--ingest") => Command::Ingest(value(1, "--ingest")?),
        Some("--import") => Command::Import(PathBuf::from(value(1, "--import")?)),
        Some("--approve") => Command::Approve(value(1, "--approve")?),
        Some("--delete") => Command::Delete(value(1, "--delete")?),
        Some("--show") => Command::Show(value(1, "--show")?),
        Some("--episodes") => Command::Episodes(value(1, "--episodes")?),
        Some("--refresh") => Command::Refresh,
        Some("--reset") => Command::Reset,
        Some("--list") => {
            let all = args.iter().any(|a| a == "--all");
            let limit = match args.get(1).filter(|a| *a != "--all") {
                Some(n) => n.parse().map_err(|_| format!("invalid count {n:?}"))?,
                None => 15,
            };
            Command::List { limit, all }
        }
        Some("--search") => {
            let query = value(1, "--search")?;
            let show_id = match args.iter().position(|a| a == "--show-id") {
                Some(i) => Some(value(i + 1, "--show-id")?),
                None => None,
            };
            Command::Search { query, show_id }
        }
        Some(other) => return Err(format!("unknown argument {other:?}")),
    };

    Ok((config_path, command))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "podcast_catalog=info,podcatalog=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let (config_path, command) = match parse_args(std::env::args().skip(1).collect()) {
        Ok(parsed) => parsed,
        Err(msg) => {
            eprintln!("{msg}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    let config = match config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    let app = App::new(&config).await?;

    match command {
        Command::Serve => serve(&app, &config).await?,
        Command::Ingest(url) => {
            let report = app.ingest(&url).await?;
            println!(
                "{} {}: {} new episodes",
                if report.show_created { "Added" } else { "Updated" },
                report.show_id,
                report.new_episodes
            );
        }
        Command::Import(path) => {
            let summary = app.import_opml(&path).await?;
            println!(
                "Imported feeds from {:?}: {} ok, {} failed",
                path, summary.succeeded, summary.failed
            );
        }
        Command::Approve(id) => {
            app.approve(&id).await?;
            println!("Approved {id}");
        }
        Command::Delete(id) => {
            app.delete(&id).await?;
            println!("Deleted {id}");
        }
        Command::List { limit, all } => {
            for show in app.list_top_shows(limit, all).await? {
                print_show_line(&show);
            }
        }
        Command::Show(id) => match app.get_show(&id).await {
            Ok(show) => print_show(&show),
            Err(AppError::NotFound { .. }) => println!("No show {id}"),
            Err(e) => return Err(e),
        },
        Command::Episodes(show_id) => {
            for episode in app.list_episodes(&show_id).await? {
                print_episode_line(&episode);
            }
        }
        Command::Search { query, show_id: Some(show_id) } => {
            for episode in app.search_episodes(Some(&show_id), &query).await? {
                print_episode_line(&episode);
            }
        }
        Command::Search { query, show_id: None } => {
            for show in app.search_shows(&query).await? {
                print_show_line(&show);
            }
        }
        Command::Refresh => {
            let summary = app.refresh_all().await?;
            println!(
                "Refreshed {} feeds ({} failed)",
                summary.succeeded + summary.failed,
                summary.failed
            );
        }
        Command::Reset => {
            app.repository().reset().await?;
            println!("Catalog reset");
        }
    }

    Ok(())
}

async fn serve(app: &App, config: &Config) -> Result<()> {
    if !config.seed_feeds.is_empty() {
        let summary = app.ingest_all(&config.seed_feeds).await;
        tracing::info!(
            "Seeded {} feeds ({} failed)",
            summary.succeeded,
            summary.failed
        );
    }

    let scheduler = app.start_scheduler();
    tokio::signal::ctrl_c().await?;
    scheduler.shutdown().await;
    Ok(())
}

fn print_show_line(show: &Show) {
    println!(
        "{}  {}{}  ({})",
        show.id,
        show.title,
        if show.approved { "" } else { " [pending]" },
        show.added_at.format("%Y-%m-%d")
    );
}

fn print_show(show: &Show) {
    println!("{}", show.title);
    println!("  id:         {}", show.id);
    println!("  by:         {}", show.creator);
    println!("  feed:       {}", show.feed_url);
    println!("  link:       {}", show.link);
    println!("  categories: {}", show.categories.join(", "));
    println!("  approved:   {}", show.approved);
    println!();
    println!("{}", html_to_text(&show.description));
}

fn print_episode_line(episode: &Episode) {
    println!(
        "{}  {}  {}  {}",
        episode.id,
        episode.published_at.format("%Y-%m-%d"),
        episode.title,
        episode.media_url
    );
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 80).unwrap_or_else(|_| html.to_string())
}
