use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::chain::{Chain, DEFAULT_TRACE_DEPTH, DEFAULT_TREE_DEPTH};
use crate::config::{load_config, open_store};
use crate::provider::{ExportFormat, Provider, TokenDraft};
use crate::token::TokenState;
use crate::token_store::{TokenFilter, DEFAULT_FIND_LIMIT};

/// Top-level CLI interface for the TIBET provenance log
#[derive(Parser)]
#[command(
    name = "tibetctl",
    version,
    about = "Tamper-evident provenance tokens: record, trace, verify"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a new action token
    Record {
        /// Action name, e.g. "user_login"
        #[arg(short, long)]
        action: String,
        /// Action content as inline JSON
        #[arg(long)]
        erin: Option<String>,
        /// Reference ids (repeatable)
        #[arg(long = "ref")]
        refs: Vec<String>,
        /// Intent/reason for the action
        #[arg(long)]
        erachter: Option<String>,
        /// Override the configured actor
        #[arg(long)]
        actor: Option<String>,
        /// Explicit parent token id
        #[arg(long)]
        parent: Option<String>,
        /// Initial state (created|detected|classified|mitigated|resolved)
        #[arg(long)]
        state: Option<String>,
    },

    /// Print one token by id
    Show {
        #[arg(short, long)]
        id: String,
    },

    /// Walk the provenance chain backwards from a token
    Trace {
        #[arg(short, long)]
        id: String,
        #[arg(long, default_value_t = DEFAULT_TRACE_DEPTH)]
        max_depth: usize,
    },

    /// Verify the integrity of a whole chain
    Verify {
        #[arg(short, long)]
        id: String,
    },

    /// Summarize a chain: length, validity, actors, time span
    Summary {
        #[arg(short, long)]
        id: String,
    },

    /// Build the forward tree from a root token
    Tree {
        #[arg(short, long)]
        id: String,
        #[arg(long, default_value_t = DEFAULT_TREE_DEPTH)]
        max_depth: usize,
    },

    /// Find tokens matching filters
    Find {
        #[arg(long)]
        action: Option<String>,
        #[arg(long)]
        actor: Option<String>,
        /// ISO-8601 lower bound on timestamps
        #[arg(long)]
        since: Option<String>,
        #[arg(long, default_value_t = DEFAULT_FIND_LIMIT)]
        limit: usize,
    },

    /// Export the whole store
    Export {
        /// Output format: json | jsonl
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Count stored tokens
    Count,

    /// Verify every stored token and report corrupted ids
    Audit,

    /// Delete every stored token (irreversible)
    Clear {
        /// Confirm the destructive operation
        #[arg(long)]
        yes: bool,
    },
}

pub fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config = load_config().context("loading configuration")?;
    let store = open_store(&config.store).context("opening token store")?;

    match cli.command {
        Commands::Record {
            action,
            erin,
            refs,
            erachter,
            actor,
            parent,
            state,
        } => {
            let mut provider = Provider::new(config.actor.clone())
                .with_store(store)
                .with_auto_chain(config.auto_chain);

            let mut draft = TokenDraft::new(action);
            if let Some(raw) = erin {
                let value: Value =
                    serde_json::from_str(&raw).context("parsing --erin as JSON")?;
                draft = draft.with_erin(value);
            }
            if !refs.is_empty() {
                draft = draft.with_references(refs);
            }
            if let Some(erachter) = erachter {
                draft = draft.with_erachter(erachter);
            }
            if let Some(actor) = actor {
                draft = draft.with_actor(actor);
            }
            if let Some(parent) = parent {
                draft = draft.with_parent(parent);
            }
            if let Some(state) = state {
                draft = draft.with_state(state.parse::<TokenState>()?);
            }

            let token = provider.create(draft)?;
            println!("{}", serde_json::to_string_pretty(&token.to_value()?)?);
        }

        Commands::Show { id } => match store.get(&id)? {
            Some(token) => println!("{}", serde_json::to_string_pretty(&token.to_value()?)?),
            None => println!("no token with id {id}"),
        },

        Commands::Trace { id, max_depth } => {
            let chain = Chain::new(store.as_ref());
            let trace = chain.trace(&id, max_depth)?;
            if trace.is_empty() {
                println!("no chain found for {id}");
            } else {
                for token in &trace {
                    println!(
                        "{}  {}  {}  {}",
                        token.timestamp, token.action, token.actor, token.token_id
                    );
                }
            }
        }

        Commands::Verify { id } => {
            let chain = Chain::new(store.as_ref());
            let length = chain.trace(&id, DEFAULT_TRACE_DEPTH)?.len();
            if chain.verify(&id)? {
                println!("chain intact ({length} tokens verified)");
            } else {
                println!("chain verification FAILED for {id}");
                std::process::exit(1);
            }
        }

        Commands::Summary { id } => {
            let chain = Chain::new(store.as_ref());
            let summary = chain.summary(&id)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::Tree { id, max_depth } => {
            let chain = Chain::new(store.as_ref());
            let tree = chain.tree(&id, max_depth)?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
        }

        Commands::Find {
            action,
            actor,
            since,
            limit,
        } => {
            let mut filter = TokenFilter::new().with_limit(limit);
            if let Some(action) = action {
                filter = filter.with_action(action);
            }
            if let Some(actor) = actor {
                filter = filter.with_actor(actor);
            }
            if let Some(since) = since {
                filter = filter.with_since(since);
            }
            for token in store.find(&filter)? {
                println!(
                    "{}  {}  {}  {}",
                    token.timestamp, token.action, token.actor, token.token_id
                );
            }
        }

        Commands::Export { format } => {
            let provider = Provider::new(config.actor.clone()).with_store(store);
            let format = match format.as_str() {
                "json" => ExportFormat::Json,
                "jsonl" => ExportFormat::JsonLines,
                other => anyhow::bail!("unknown export format: {other} (expected json or jsonl)"),
            };
            println!("{}", provider.export(format)?);
        }

        Commands::Count => {
            println!("{}", store.count()?);
        }

        Commands::Audit => {
            let provider = Provider::new(config.actor.clone()).with_store(store);
            let report = provider.integrity_report()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.intact {
                std::process::exit(1);
            }
        }

        Commands::Clear { yes } => {
            if !yes {
                eprintln!("refusing to clear the store without --yes (irreversible)");
                std::process::exit(1);
            }
            let mut store = store;
            store.clear()?;
            println!("store cleared");
        }
    }

    Ok(())
}
