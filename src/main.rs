use clap::{Parser, Subcommand};
use color_eyre::{eyre::WrapErr, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use entity_cache::cache::{CachePolicy, EntityUpdate, IdTypeRegistry, RangeCache};
use entity_cache::config::{Config, LogConfig};
use entity_cache::rest::{HttpRemoteStore, Id, JsonEntity, TypeRef};

#[derive(Parser, Debug)]
#[command(name = "entity-cache")]
#[command(about = "Read-through cache for a REST entity store")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/entity-cache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Read a single entity
  Get {
    /// Entity type as app/Type, e.g. tutanota/Mail
    type_ref: TypeRef,
    id: String,
    /// List the entity belongs to
    #[arg(short, long)]
    list: Option<String>,
  },
  /// Read a range of list elements
  Range {
    type_ref: TypeRef,
    list: String,
    /// Exclusive start id (default: the smallest id, or the largest with --reverse)
    #[arg(short, long)]
    start: Option<String>,
    #[arg(short = 'n', long, default_value_t = 100)]
    count: usize,
    #[arg(short, long)]
    reverse: bool,
    /// Run the same read this many times
    #[arg(long, default_value_t = 1)]
    repeat: usize,
  },
  /// Load a list, apply change notifications from a JSON-lines file and
  /// print the cached range
  Replay {
    type_ref: TypeRef,
    list: String,
    events: PathBuf,
    #[arg(short = 'n', long, default_value_t = 100)]
    count: usize,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let _guard = init_tracing(&config.log)?;

  let remote = HttpRemoteStore::new(&config)?;
  let mut cache: RangeCache<JsonEntity, _> =
    RangeCache::new(remote, IdTypeRegistry::from(&config.cache))
      .with_policy(CachePolicy::from(&config.cache));

  match args.command {
    Command::Get { type_ref, id, list } => {
      let list_id = list.map(Id::new);
      let entity = cache.load(&type_ref, list_id.as_ref(), &Id::new(id)).await?;
      print_json(&entity.body)?;
    }
    Command::Range {
      type_ref,
      list,
      start,
      count,
      reverse,
      repeat,
    } => {
      let list_id = Id::new(list);
      let start = start.map(Id::new).unwrap_or_else(|| default_start(reverse));
      let mut entities = Vec::new();
      for round in 1..=repeat {
        entities = cache
          .load_range(&type_ref, &list_id, &start, count, reverse)
          .await?;
        info!(round, loaded = entities.len(), "Range read done");
      }
      print_entities(&entities)?;
    }
    Command::Replay {
      type_ref,
      list,
      events,
      count,
    } => {
      let list_id = Id::new(list);
      cache
        .load_range(&type_ref, &list_id, &Id::min(), count, false)
        .await?;

      let updates = read_updates(&events)?;
      info!(count = updates.len(), "Applying change notifications");
      cache.apply_events(&updates).await?;

      let entities: Vec<JsonEntity> = cache
        .storage()
        .range(&type_ref, &list_id)
        .map(|record| {
          record
            .ids()
            .iter()
            .filter_map(|id| record.get(id).cloned())
            .collect()
        })
        .unwrap_or_default();
      print_entities(&entities)?;
    }
  }

  Ok(())
}

fn default_start(reverse: bool) -> Id {
  if reverse {
    Id::max()
  } else {
    Id::min()
  }
}

/// Log to stderr, or to a daily file when a log directory is configured.
fn init_tracing(log: &LogConfig) -> Result<Option<WorkerGuard>> {
  let filter = match &log.filter {
    Some(filter) => EnvFilter::try_new(filter).wrap_err("Invalid log filter")?,
    None => EnvFilter::try_from_default_env()
      .unwrap_or_else(|_| EnvFilter::new("entity_cache=info")),
  };

  match &log.directory {
    Some(directory) => {
      let appender = tracing_appender::rolling::daily(directory, "entity-cache.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      Ok(None)
    }
  }
}

fn read_updates(path: &Path) -> Result<Vec<EntityUpdate>> {
  let contents = std::fs::read_to_string(path)
    .wrap_err_with(|| format!("Failed to read events file: {}", path.display()))?;

  contents
    .lines()
    .enumerate()
    .filter(|(_, line)| !line.trim().is_empty())
    .map(|(n, line)| {
      serde_json::from_str(line)
        .wrap_err_with(|| format!("Invalid change notification on line {}", n + 1))
    })
    .collect()
}

fn print_entities(entities: &[JsonEntity]) -> Result<()> {
  let bodies: Vec<&Value> = entities.iter().map(|entity| &entity.body).collect();
  print_json(&bodies)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
