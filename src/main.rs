use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cayenne::access::DataNode;
use cayenne::adapter::{adapter_for_name, AdapterDetector, DbAdapter, JdbcAdapter};
use cayenne::config::NodeConfig;
use cayenne::db::{reverse_engineer, DataSource, PgDataSource};
use cayenne::exp::parse_qualifier;
use cayenne::export::{render, OutputFormat};
use cayenne::map::DataMap;
use cayenne::query::{Ordering, QueryRoot, SelectQuery};
use cayenne::translator::translate_select;

/// SQL translation and primary key tooling over a data map
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Node configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data map file, .toml or .json (overrides the configured one)
    #[arg(long, global = true)]
    map: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct SelectArgs {
    /// Object entity name, or `db:TABLE` for a table root
    entity: String,

    /// Qualifier, e.g. "artistName like 'M%' and paintingArray.paintingTitle = 'X'"
    #[arg(long = "where")]
    qualifier: Option<String>,

    /// Ordering path, with optional `:desc` and `:ci` suffixes; repeatable
    #[arg(long = "order")]
    orderings: Vec<String>,

    #[arg(long)]
    limit: Option<usize>,

    #[arg(long)]
    distinct: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the SQL and bindings for a select, without connecting
    Translate {
        #[command(flatten)]
        select: SelectArgs,

        /// Adapter to translate for (generic, postgres, oracle, mysql, ...)
        #[arg(long)]
        adapter: Option<String>,
    },
    /// Run a select and print the rows
    Select {
        #[command(flatten)]
        select: SelectArgs,

        /// table, csv, tsv, json or insert
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Connect and report the adapter picked for the database
    Detect,
    /// Write a node configuration file
    Init {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        #[arg(long)]
        database: Option<String>,

        #[arg(long)]
        user: Option<String>,

        /// Adapter name, or `auto` to detect it on connect
        #[arg(long)]
        adapter: Option<String>,

        #[arg(long)]
        pk_cache_size: Option<usize>,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
    /// Generate primary keys for a table
    Pk {
        table: String,

        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Manage the AUTO_PK_SUPPORT table
    PkSupport {
        #[command(subcommand)]
        action: PkSupportAction,
    },
    /// Build a data map from a live schema and print it as TOML
    Reverse {
        #[arg(long, default_value = "public")]
        schema: String,

        #[arg(long, default_value = "reversed")]
        name: String,

        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum PkSupportAction {
    /// Create the table if needed and seed rows for the given tables
    Create { tables: Vec<String> },
    /// Delete the rows of the given tables
    Drop { tables: Vec<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    // logs go to stderr so query output can be piped
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(NodeConfig::default_path);
    let mut config = NodeConfig::load(&config_path)?;
    if let Some(map) = &cli.map {
        config.map = Some(map.clone());
    }

    match cli.command {
        Command::Translate { select, adapter } => {
            let map = load_map(&config)?;
            let adapter: Arc<dyn DbAdapter> = match adapter {
                Some(name) => adapter_for_name(&name)
                    .with_context(|| format!("unknown adapter {:?}", name))?,
                None => config
                    .fixed_adapter()?
                    .unwrap_or_else(|| Arc::new(JdbcAdapter::new())),
            };
            let query = build_select(&select)?;
            let translated = translate_select(adapter.as_ref(), &map, &query)?;
            println!("{}", translated.sql);
            for (i, value) in translated.values().iter().enumerate() {
                println!("  {} = {}", adapter.parameter_placeholder(i + 1), value);
            }
        }
        Command::Select { select, format } => {
            let node = connect(&mut config).await?;
            let query = build_select(&select)?;
            let table = match &query.root {
                QueryRoot::Db(table) => table.clone(),
                QueryRoot::Obj(name) => node.map().require_obj_entity(name)?.db_entity.clone(),
            };
            let result = node.select(&query).await?;
            print!("{}", render(&result, format, &table));
        }
        Command::Detect => {
            config.resolve_password()?;
            let data_source = PgDataSource::new(&config.connection, config.pool_size)?;
            let adapter = AdapterDetector::default()
                .detect_adapter(&data_source)
                .await?;
            println!("{}", adapter.name());
        }
        Command::Init {
            host,
            port,
            database,
            user,
            adapter,
            pk_cache_size,
            force,
        } => {
            if config_path.exists() && !force {
                bail!("{} exists; pass --force to replace it", config_path.display());
            }
            if let Some(host) = host {
                config.connection.host = host;
            }
            if let Some(port) = port {
                config.connection.port = port;
            }
            if let Some(database) = database {
                config.connection.database = database;
            }
            if let Some(user) = user {
                config.connection.username = user;
            }
            if adapter.is_some() {
                config.adapter = adapter;
            }
            if let Some(size) = pk_cache_size {
                config.pk_cache_size = size;
            }
            // unknown adapter names fail here rather than on the next connect
            config.fixed_adapter()?;
            config.save(&config_path)?;
            println!("wrote {}", config_path.display());
        }
        Command::Pk { table, count } => {
            let node = connect(&mut config).await?;
            for _ in 0..count {
                println!("{}", node.generate_pk(&table).await?);
            }
        }
        Command::PkSupport { action } => {
            let node = connect(&mut config).await?;
            match action {
                PkSupportAction::Create { tables } => {
                    let tables = table_names(&node, &tables);
                    node.create_auto_pk_support(&tables).await?;
                    println!("AUTO_PK_SUPPORT ready for {}", tables.join(", "));
                }
                PkSupportAction::Drop { tables } => {
                    let tables = table_names(&node, &tables);
                    node.drop_auto_pk_support(&tables).await?;
                    println!("AUTO_PK_SUPPORT rows removed for {}", tables.join(", "));
                }
            }
        }
        Command::Reverse {
            schema,
            name,
            output,
        } => {
            config.resolve_password()?;
            let data_source = PgDataSource::new(&config.connection, config.pool_size)?;
            let map = {
                let mut conn = data_source.connection().await?;
                reverse_engineer(&mut conn, &schema, &name).await?
            };
            let text = map.to_toml()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("writing {}", path.display()))?;
                    eprintln!("{} tables written to {}", map.db_entities.len(), path.display());
                }
                None => print!("{}", text),
            }
        }
    }

    Ok(())
}

fn load_map(config: &NodeConfig) -> Result<DataMap> {
    match &config.map {
        Some(path) => DataMap::load(path),
        None => bail!("no data map: pass --map or set `map` in the node config"),
    }
}

async fn connect(config: &mut NodeConfig) -> Result<DataNode<PgDataSource>> {
    let map = load_map(config)?;
    config.resolve_password()?;
    let data_source = PgDataSource::new(&config.connection, config.pool_size)?;
    let node = match config.fixed_adapter()? {
        Some(adapter) => DataNode::new(config.name.clone(), data_source, adapter, map),
        None => {
            DataNode::detected(config.name.clone(), data_source, map, &AdapterDetector::default())
                .await?
        }
    };
    Ok(node.with_pk_cache_size(config.pk_cache_size))
}

/// Every table of the map when none are named.
fn table_names<'a, D: DataSource>(node: &'a DataNode<D>, given: &'a [String]) -> Vec<&'a str> {
    if given.is_empty() {
        node.map().db_entities.iter().map(|e| e.name.as_str()).collect()
    } else {
        given.iter().map(String::as_str).collect()
    }
}

fn build_select(args: &SelectArgs) -> Result<SelectQuery> {
    let mut query = match args.entity.strip_prefix("db:") {
        Some(table) => SelectQuery::for_table(table),
        None => SelectQuery::new(&args.entity),
    };
    if let Some(text) = &args.qualifier {
        query = query.with_qualifier(parse_qualifier(text)?);
    }
    for text in &args.orderings {
        query = query.order_by(parse_ordering(text)?);
    }
    if let Some(limit) = args.limit {
        query = query.fetch_limit(limit);
    }
    if args.distinct {
        query = query.distinct();
    }
    Ok(query)
}

fn parse_ordering(text: &str) -> Result<Ordering> {
    let mut parts = text.split(':');
    let path = parts.next().unwrap_or_default();
    if path.is_empty() {
        bail!("empty ordering path in {:?}", text);
    }
    let mut ordering = Ordering::asc(path);
    for flag in parts {
        ordering = match flag {
            "asc" => ordering,
            "desc" => Ordering {
                ascending: false,
                ..ordering
            },
            "ci" => ordering.ignore_case(),
            other => bail!("unknown ordering flag {:?}", other),
        };
    }
    Ok(ordering)
}
