//! dt-circom
//!
//! Compile a trained decision tree into a Circom circuit, print its rules,
//! prepare witness inputs and check the circuit against the float model.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dt_circom::rules::{extract_rules, render_tree};
use dt_circom::{simulate, CircuitInput, ClassNames, Compiler, CompilerOptions, DecisionTree};

mod config;

use config::{split_list, Config};

#[derive(Parser)]
#[command(name = "dt-circom")]
#[command(about = "Decision tree to Circom circuit compiler")]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the circuit for a tree
    Compile {
        /// Tree artifact (JSON)
        #[arg(short, long)]
        tree: PathBuf,

        /// Output .circom file
        #[arg(short, long)]
        out: PathBuf,

        #[command(flatten)]
        circuit: CircuitFlags,
    },

    /// Print the tree and one rule per leaf
    Rules {
        /// Tree artifact (JSON)
        #[arg(short, long)]
        tree: PathBuf,

        /// Class display names, comma separated (e.g. "No Failure,Failure")
        #[arg(long)]
        classes: Option<String>,
    },

    /// Encode a sample as the circuit's input.json
    Input {
        /// Tree artifact (JSON)
        #[arg(short, long)]
        tree: PathBuf,

        /// Sample as {"feature name": standardized value}
        #[arg(short, long)]
        sample: PathBuf,

        /// Output input.json
        #[arg(short, long)]
        out: PathBuf,

        #[command(flatten)]
        circuit: CircuitFlags,
    },

    /// Evaluate the circuit on a sample and compare with the tree
    Simulate {
        /// Tree artifact (JSON)
        #[arg(short, long)]
        tree: PathBuf,

        /// Sample as {"feature name": standardized value}
        #[arg(short, long)]
        sample: PathBuf,

        #[command(flatten)]
        circuit: CircuitFlags,
    },
}

/// Overrides for the DT_* environment settings
#[derive(Args)]
struct CircuitFlags {
    /// Fixed-point multiplier (power of ten)
    #[arg(long)]
    multiplier: Option<u64>,

    /// Comparator operand width in bits
    #[arg(long)]
    bits: Option<u32>,

    /// Offset added to scaled thresholds and inputs
    #[arg(long)]
    offset: Option<u64>,

    /// Binary (one-hot) feature names, comma separated
    #[arg(long)]
    binary: Option<String>,

    /// Circom template name
    #[arg(long)]
    template: Option<String>,

    /// Include path of circomlib's comparators.circom
    #[arg(long)]
    include: Option<String>,

    /// Constrain the leaf-active signals to sum to 1
    #[arg(long)]
    assert_single_leaf: bool,
}

impl CircuitFlags {
    fn apply(&self, mut config: Config) -> Config {
        if let Some(multiplier) = self.multiplier {
            config.multiplier = multiplier;
        }
        if let Some(bits) = self.bits {
            config.comparator_bits = bits;
        }
        if let Some(offset) = self.offset {
            config.threshold_offset = offset;
        }
        if let Some(binary) = &self.binary {
            config.binary_features = split_list(binary);
        }
        if let Some(template) = &self.template {
            config.template_name = template.clone();
        }
        if let Some(include) = &self.include {
            config.include_path = include.clone();
        }
        config.assert_single_leaf |= self.assert_single_leaf;
        config
    }

    fn options(&self, config: &Config) -> CompilerOptions {
        self.apply(config.clone()).compiler_options()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "dt_circom=debug" } else { "dt_circom=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Compile { tree, out, circuit } => {
            let model = load_tree(&tree)?;
            let compiler = Compiler::new(circuit.options(&config))?;
            let source = compiler.compile_to_circom(&model)?;

            fs::write(&out, source).with_context(|| format!("Failed to write {}", out.display()))?;
            info!(path = %out.display(), "Wrote circuit");

            println!("Circuit written to {}", out.display());
            println!("  Features:    {}", model.features().len());
            println!("  Comparators: {}", model.split_count());
            println!("  Leaves:      {}", model.leaf_count());
            println!("  Depth:       {}", model.depth());
            println!("  Fingerprint: sha256:{}", model.fingerprint());
        }

        Commands::Rules { tree, classes } => {
            let model = load_tree(&tree)?;
            let classes = classes
                .map(|list| ClassNames::new(split_list(&list)))
                .unwrap_or_default();

            println!("Decision tree ({} nodes, depth {}):\n", model.node_count(), model.depth());
            for line in render_tree(&model, &classes) {
                println!("{}", line);
            }
            println!("\nRules:\n");
            for (i, rule) in extract_rules(&model, &classes).iter().enumerate() {
                println!("Rule {}: {}", i + 1, rule);
            }
        }

        Commands::Input {
            tree,
            sample,
            out,
            circuit,
        } => {
            let model = load_tree(&tree)?;
            let options = circuit.options(&config);
            options.validate()?;
            let values = load_sample(&sample)?;

            let input = CircuitInput::prepare(model.features(), &values, &options)?;
            let json = input.to_json().context("Failed to serialize circuit input")?;
            fs::write(&out, json).with_context(|| format!("Failed to write {}", out.display()))?;

            println!("Circuit input written to {}", out.display());
            println!("  features: {:?}", input.features);
        }

        Commands::Simulate {
            tree,
            sample,
            circuit,
        } => {
            let model = load_tree(&tree)?;
            let compiler = Compiler::new(circuit.options(&config))?;
            let values = load_sample(&sample)?;

            let input = CircuitInput::prepare(model.features(), &values, compiler.options())?;
            let program = compiler.compile(&model)?;
            let result = simulate(&program, &input.features)?;

            let ordered = model
                .features()
                .iter()
                .map(|name| {
                    values
                        .get(name)
                        .copied()
                        .with_context(|| format!("Missing feature {}", name))
                })
                .collect::<Result<Vec<f64>>>()?;
            let expected = model.predict(&ordered)?;
            let agree = result.output == i128::from(expected);

            println!("Circuit output:   {}", result.output);
            println!("Model prediction: {}", expected);
            println!("Active leaves:    {:?}", result.active_leaves);
            println!("Agreement:        {}", if agree { "YES" } else { "NO" });

            if !agree {
                anyhow::bail!(
                    "Circuit output {} differs from model prediction {}",
                    result.output,
                    expected
                );
            }
        }
    }

    Ok(())
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn load_tree(path: &Path) -> Result<DecisionTree> {
    DecisionTree::from_json(&read(path)?)
        .with_context(|| format!("Invalid tree artifact {}", path.display()))
}

fn load_sample(path: &Path) -> Result<BTreeMap<String, f64>> {
    serde_json::from_str(&read(path)?)
        .with_context(|| format!("Invalid sample {}", path.display()))
}
