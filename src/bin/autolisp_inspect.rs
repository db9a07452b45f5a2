// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command-line inspector for AutoLISP documents
//!
//! Prints the source model, symbol table, export flags and scope tree of one
//! or more files.

use autolisp_model::{
    HostId, LispDocument, ModelConfig, ModelResult, ScopeTree, SymbolBroker, analyzer::ScopeItem,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "autolisp-inspect")]
#[command(about = "Inspect the source model and scopes of AutoLISP files")]
#[command(version)]
struct Cli {
    /// JSON configuration file (cache settings and keyword source)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize atoms, symbols, exports and scopes of each file
    Summary {
        /// AutoLISP files to inspect
        files: Vec<PathBuf>,
        /// Emit JSON instead of text
        #[arg(short, long)]
        json: bool,
    },
    /// List every occurrence of a symbol
    Symbol {
        /// Symbol name, case-insensitive
        name: String,
        /// AutoLISP files to search
        files: Vec<PathBuf>,
    },
    /// Print the scope tree of a file
    Scopes {
        /// AutoLISP file to inspect
        file: PathBuf,
    },
}

#[derive(Serialize)]
struct Summary {
    file: String,
    atoms: usize,
    linefeed: String,
    symbols: usize,
    exported: Vec<String>,
    hosts: usize,
    references: usize,
}

fn main() {
    human_panic::setup_panic!();
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> ModelResult<()> {
    let config = match &cli.config {
        Some(path) => ModelConfig::from_json_file(path)?,
        None => ModelConfig::default(),
    };
    let keywords = Arc::new(config.load_keywords()?);
    let broker = SymbolBroker::with_config(config.cache.clone(), keywords.clone());

    match cli.command {
        Commands::Summary { files, json } => {
            for path in files {
                let document = LispDocument::open_with(&path, keywords.as_ref())?;
                let summary = summarize(&broker, &document);
                if json {
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                } else {
                    print_summary(&summary);
                }
            }
        }
        Commands::Symbol { name, files } => {
            let key = name.to_lowercase();
            for path in files {
                let document = LispDocument::open_with(&path, keywords.as_ref())?;
                let atoms = document.model().flatten();
                for &index in document.model().occurrences(&key) {
                    let atom = &atoms[index];
                    let flag = if atom.has_export_flag() { " @Global" } else { "" };
                    println!("{}:{}{}", document.file_name(), atom.range(), flag);
                }
            }
        }
        Commands::Scopes { file } => {
            let document = LispDocument::open_with(&file, keywords.as_ref())?;
            let tree = broker.get_scope_tree(&document, false);
            print_host(&tree, tree.root(), 0);
        }
    }
    Ok(())
}

fn summarize(broker: &SymbolBroker, document: &LispDocument) -> Summary {
    let model = document.model();
    let atoms = model.flatten();
    let mut exported: Vec<String> = atoms
        .iter()
        .filter(|atom| atom.has_export_flag())
        .map(|atom| atom.symbol().to_lowercase())
        .collect();
    exported.sort();
    exported.dedup();
    let tree = broker.get_scope_tree(document, false);

    Summary {
        file: document.file_name().to_string(),
        atoms: model.len(),
        linefeed: format!("{:?}", model.linefeed()),
        symbols: model.symbol_table().len(),
        exported,
        hosts: tree.host_count(),
        references: tree.reference_count(),
    }
}

fn print_summary(summary: &Summary) {
    println!("{}", summary.file);
    println!("  atoms:      {}", summary.atoms);
    println!("  linefeed:   {}", summary.linefeed);
    println!("  symbols:    {}", summary.symbols);
    println!("  hosts:      {}", summary.hosts);
    println!("  references: {}", summary.references);
    if !summary.exported.is_empty() {
        println!("  exported:   {}", summary.exported.join(", "));
    }
}

fn print_host(tree: &ScopeTree, id: HostId, depth: usize) {
    let Some(host) = tree.host(id) else {
        return;
    };
    let indent = "  ".repeat(depth);
    let name = tree.host_name(id).unwrap_or("");
    println!("{indent}{:?} {name} [{}]", host.kind(), host.range());
    for item in host.items() {
        match item {
            ScopeItem::Reference(reference_id) => {
                if let Some(reference) = tree.reference(*reference_id) {
                    let marker = if reference.is_localization() { " (local)" } else { "" };
                    println!("{indent}  {} {}{marker}", reference.id(), reference.range());
                }
            }
            ScopeItem::Host(child) => print_host(tree, *child, depth + 1),
        }
    }
}
