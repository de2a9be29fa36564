// SPDX-License-Identifier: MIT OR Apache-2.0
//! `livegraph`: inspect and edit livegraph documents from the command line.
//!
//! Set `RUST_LOG=livegraph_core=debug` to trace propagation.

use clap::{Parser, Subcommand};
use livegraph_core::{Catalog, ChangeTarget, EngineConfig, Graph, GraphRecord, NodeId, Value};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

/// Inspect and edit livegraph documents.
#[derive(Parser, Debug)]
#[command(name = "livegraph", version)]
struct Cli {
    /// Engine settings file (RON)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered attribute types
    Types,

    /// List node classes
    Nodes {
        /// Only show classes whose name or description contains this text
        #[arg(long, value_name = "QUERY")]
        search: Option<String>,
    },

    /// Load a graph and print every node with its inputs, state and outputs
    Inspect {
        /// Graph document (JSON)
        file: PathBuf,
    },

    /// Load a graph and write it back out
    Roundtrip {
        /// Graph document (JSON)
        file: PathBuf,

        /// Write here instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Edit one state field, propagate, and print the resulting outputs
    Set {
        /// Graph document (JSON)
        file: PathBuf,
        /// Node id
        node: String,
        /// State field
        key: String,
        /// New value (JSON, or plain text)
        value: String,

        /// Save the edited graph here
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error reading {}: {}", path.display(), e);
                process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli.command, &config) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(command: Command, config: &EngineConfig) -> Result<(), Box<dyn Error>> {
    let catalog = Catalog::with_builtins()?;
    tracing::debug!(
        types = catalog.types.len(),
        nodes = catalog.nodes.len(),
        "catalog ready"
    );

    match command {
        Command::Types => {
            for ty in catalog.types.iter() {
                println!(
                    "{:<12} {:<10} {}",
                    ty.name(),
                    format!("{:?}", ty.kind()).to_lowercase(),
                    ty.type_description().unwrap_or_default()
                );
            }
        }
        Command::Nodes { search } => {
            for class in catalog.nodes.search(search.as_deref().unwrap_or_default()) {
                println!(
                    "{:<12} {:<8} {}",
                    class.registry_name(),
                    format!("{:?}", class.category()),
                    class.description()
                );
            }
        }
        Command::Inspect { file } => {
            let graph = load(&file, &catalog, config)?;
            print_graph(&graph);
        }
        Command::Roundtrip { file, out } => {
            let graph = load(&file, &catalog, config)?;
            let json = serde_json::to_string_pretty(&graph.serialize(&graph.name))?;
            write_or_print(out.as_deref(), &json)?;
        }
        Command::Set {
            file,
            node,
            key,
            value,
            out,
        } => {
            let mut graph = load(&file, &catalog, config)?;
            let raw = serde_json::from_str(&value).unwrap_or(Value::String(value));
            graph.apply_change(&NodeId(node), &ChangeTarget::State(key), &raw)?;
            print_outputs(&graph);
            if let Some(path) = out {
                write_or_print(Some(&path), &graph.to_json()?)?;
            }
        }
    }
    Ok(())
}

/// Load a document; unnamed graphs take the configured default name
fn load(path: &Path, catalog: &Catalog, config: &EngineConfig) -> Result<Graph, Box<dyn Error>> {
    let json = fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let record: GraphRecord = serde_json::from_str(&json)?;
    Ok(Graph::load_named(&record, &catalog.nodes, &config.default_graph_name)?)
}

fn write_or_print(path: Option<&Path>, text: &str) -> Result<(), Box<dyn Error>> {
    match path {
        Some(path) => {
            fs::write(path, text)?;
            tracing::info!("Wrote {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn print_graph(graph: &Graph) {
    println!("{} ({} nodes, {} edges)", graph.name, graph.node_count(), graph.edge_count());
    for entry in graph.nodes() {
        let core = entry.node.core();
        println!(
            "\n{} [{}] at ({}, {}){}",
            core.id(),
            core.class().registry_name(),
            entry.pos[0],
            entry.pos[1],
            if core.is_live() { "" } else { " (not live)" }
        );
        for group in core.changeables() {
            println!("  {}", group.title);
            for item in group.items {
                println!("    {:<10} {:<10} {}", item.title, item.type_name, item.value);
            }
        }
    }
}

fn print_outputs(graph: &Graph) {
    for entry in graph.nodes() {
        let core = entry.node.core();
        for (key, value) in core.output_cache().iter() {
            println!("{}.{} = {}", core.id(), key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_set_arguments() {
        let cli = Cli::try_parse_from(["livegraph", "set", "g.json", "n", "value", "7", "--out", "o.json"]).unwrap();
        match cli.command {
            Command::Set { node, key, value, out, .. } => {
                assert_eq!((node.as_str(), key.as_str(), value.as_str()), ("n", "value", "7"));
                assert_eq!(out, Some(PathBuf::from("o.json")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
