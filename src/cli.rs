use crate::config::load_config;
use crate::layout::compute_layout;
use crate::layout_dump::{LayoutDump, write_layout_dump};
use crate::orientation::Orientation;
use crate::tree::{Node, Tree};
use anyhow::Result;
use clap::Parser;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "mindgraph", version, about = "Mindmap tree layout engine")]
pub struct Args {
    /// Input tree JSON (array of nodes) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for the layout dump. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Orientation (overrides the config file)
    #[arg(short = 'r', long = "orientation", value_enum)]
    pub orientation: Option<Orientation>,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(orientation) = args.orientation {
        config.orientation = orientation;
    }

    let input = read_input(args.input.as_deref())?;
    let nodes: Vec<Node> = serde_json::from_str(&input)?;
    let tree = Tree::new(nodes)?;

    let layout = compute_layout(&tree, config.orientation, &config.layout);
    for warning in &layout.warnings {
        eprintln!("warning: {warning}");
    }

    match args.output.as_deref() {
        Some(path) => write_layout_dump(path, &layout, &tree)?,
        None => {
            let dump = LayoutDump::from_layout(&layout, &tree);
            println!("{}", serde_json::to_string_pretty(&dump)?);
        }
    }
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return Ok(std::fs::read_to_string(path)?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
