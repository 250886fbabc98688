use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "meme-forge",
    version,
    about = "Burn text and sticker overlays into a meme at full resolution"
)]
struct Cli {
    /// Base image to draw on
    #[arg(short = 'b', long = "base")]
    base: Option<PathBuf>,

    /// Scene JSON (container size, density, overlays)
    #[arg(short = 's', long = "scene")]
    scene: Option<PathBuf>,

    /// Write the result here instead of the saved-memes folder
    #[arg(short = 'o', long = "out")]
    out: Option<PathBuf>,

    /// Also export the result to the gallery
    #[arg(short = 'g', long = "gallery")]
    gallery: bool,

    /// List saved memes, newest first, and exit
    #[arg(long = "list")]
    list: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    meme_forge::logging::init(cli.verbose)?;
    let config = meme_forge::Config {
        base: cli.base,
        scene: cli.scene,
        out_path: cli.out,
        gallery: cli.gallery,
        list: cli.list,
        settings_path: cli.read_settings,
    };
    let output = meme_forge::run(config)?;
    println!("{}", output);
    Ok(())
}
