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

//! Command-line interface for parsing and binding OData URIs
//!
//! Prints the syntactic tree, the bound `ODataUri`, or the URI rebuilt from
//! the bound tree, as JSON or text.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use odata_uri_parser::model::ModelDefinition;
use odata_uri_parser::{
    ExpandSyntax, InMemoryModel, ODataUriParser, ParserSettings, UriBuilder, UrlConvention,
    parse_syntactic_tree,
};
use std::fs;
use std::process;

#[derive(Parser)]
#[command(name = "odata-uri")]
#[command(about = "Parse and bind OData URIs against an EDM model")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Cli {
    /// Log binding stages to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SettingsArgs {
    /// Depth limit for every recursive grammar
    #[arg(long, default_value_t = odata_uri_parser::DEFAULT_MAX_DEPTH)]
    max_depth: usize,
    /// Parse `$expand`/`$select` with the legacy path-only grammar
    #[arg(long)]
    legacy: bool,
    /// Accept keys written as path segments (`Customers/1`)
    #[arg(long)]
    key_as_segment: bool,
}

impl SettingsArgs {
    fn settings(&self) -> ParserSettings {
        let syntax = if self.legacy {
            ExpandSyntax::Legacy
        } else {
            ExpandSyntax::Options
        };
        let convention = if self.key_as_segment {
            UrlConvention::KeyAsSegment
        } else {
            UrlConvention::Parentheses
        };
        ParserSettings::default()
            .with_max_depth(self.max_depth)
            .with_expand_syntax(syntax)
            .with_url_convention(convention)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a URI into its syntactic tree, without a model
    Parse {
        /// Relative URI, e.g. "Orders?$filter=Amount gt 100"
        uri: String,
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Parse and bind a URI against a JSON model definition
    Bind {
        uri: String,
        /// JSON model definition file
        #[arg(short, long)]
        model: String,
        /// Absolute service root ending with '/'
        #[arg(long)]
        service_root: Option<String>,
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Bind a URI and print it rebuilt from the bound tree
    Rebuild {
        uri: String,
        #[arg(short, long)]
        model: String,
        #[arg(long)]
        service_root: Option<String>,
        #[command(flatten)]
        settings: SettingsArgs,
    },
}

fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(err) = run(cli.command) {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Parse { uri, settings } => {
            let (path, query) = match uri.split_once('?') {
                Some((path, query)) => (path, Some(query)),
                None => (uri.as_str(), None),
            };
            let tree = parse_syntactic_tree(path, query, &settings.settings())?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
        }
        Commands::Bind {
            uri,
            model,
            service_root,
            settings,
        } => {
            let model = load_model(&model)?;
            let parser = ODataUriParser::new(&model).with_settings(settings.settings());
            let bound = parser.parse_uri(&uri, service_root.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&bound)?);
        }
        Commands::Rebuild {
            uri,
            model,
            service_root,
            settings,
        } => {
            let model = load_model(&model)?;
            let parser = ODataUriParser::new(&model).with_settings(settings.settings());
            let bound = parser.parse_uri(&uri, service_root.as_deref())?;
            println!("{}", UriBuilder::build_uri(&bound)?);
        }
    }
    Ok(())
}

fn load_model(path: &str) -> Result<InMemoryModel> {
    let text = fs::read_to_string(path).with_context(|| format!("reading model file '{path}'"))?;
    let definition: ModelDefinition =
        serde_json::from_str(&text).with_context(|| format!("parsing model file '{path}'"))?;
    log::debug!("loaded model '{}' from {path}", definition.namespace);
    Ok(InMemoryModel::from_definition(definition)?)
}
