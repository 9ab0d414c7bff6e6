use std::path::PathBuf;

use clap::{
    Parser,
    Subcommand,
};
use mtd_env_tool::{
    EnvFile,
    Layout,
    DEFAULT_PAD,
};

#[derive(Parser)]
#[command(name = "mtd-env-tool")]
#[command(about = "Bootloader environment image generator and parser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate environment image from text file
    Generate {
        /// Input text file path, one name=value per line
        input: PathBuf,

        /// Output binary file path
        output: PathBuf,

        /// Image size in bytes, including the header
        #[arg(short, long, value_parser = parse_size)]
        size: usize,

        /// Generate an image for redundant environments, carrying the flags byte
        #[arg(short, long)]
        redundant: bool,

        /// Byte to fill the unused part of the image with
        #[arg(short, long, value_parser = parse_byte, default_value_t = DEFAULT_PAD)]
        pad: u8,
    },
    /// Parse environment image to text file
    Parse {
        /// Input binary file path
        input: PathBuf,

        /// Output text file path
        output: PathBuf,

        /// The image carries the flags byte of redundant environments
        #[arg(short, long)]
        redundant: bool,
    },
}

fn parse_size(s: &str) -> Result<usize, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).map_err(|e| e.to_string())
    } else {
        s.parse::<usize>().map_err(|e| e.to_string())
    }
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let value = parse_size(s)?;
    u8::try_from(value).map_err(|e| e.to_string())
}

fn layout(redundant: bool) -> Layout {
    if redundant {
        Layout::Redundant
    } else {
        Layout::Single
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            input,
            output,
            size,
            redundant,
            pad,
        } => {
            println!("Parsing text file: {}", input.display());
            let env = EnvFile::from_text_file(&input)?;
            println!("Found {} variables", env.table.len());

            println!("Generating {} image...", layout(redundant));
            env.generate_image_file(&output, size, layout(redundant), pad)?;

            println!("Successfully generated environment image: {}", output.display());
            println!(
                "Size: {} bytes ({} bytes used)",
                size,
                env.table.binary_len() + layout(redundant).header_size()
            );

            Ok(())
        }
        Commands::Parse {
            input,
            output,
            redundant,
        } => {
            println!("Parsing binary file: {}", input.display());
            let env = EnvFile::parse_image_file(&input, layout(redundant))?;
            println!("Found {} variables", env.table.len());

            println!("Writing text file...");
            env.to_text_file(&output)?;

            println!("Successfully parsed environment image to: {}", output.display());

            Ok(())
        }
    }
}
