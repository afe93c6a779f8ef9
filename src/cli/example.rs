//! Code related to the bundled demo models and the CLI commands for interacting with them.
use super::{TranslateOpts, get_output_path, handle_translate_command};
use crate::input::{COMPONENT_FILE_EXTENSION, MODEL_FILE_EXTENSION};
use crate::settings::Settings;
use anyhow::{Context, Result, ensure};
use clap::Subcommand;
use include_dir::{Dir, DirEntry, File, include_dir};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The directory containing the demo models.
static EXAMPLES_DIR: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/demos");

/// The available subcommands for managing example models.
#[derive(Subcommand)]
pub enum ExampleSubcommands {
    /// List available examples.
    List,
    /// Provide information about the specified example.
    Info {
        /// The name of the example.
        name: String,
    },
    /// Extract an example model to a new directory.
    Extract {
        /// The name of the example to extract.
        name: String,
        /// The destination folder for the example.
        new_path: Option<PathBuf>,
    },
    /// Translate an example to the current version.
    Translate {
        /// The name of the example to translate.
        name: String,
        /// Directory for the translated file
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Whether to overwrite the translated file if it already exists
        #[arg(long)]
        overwrite: bool,
    },
}

impl ExampleSubcommands {
    /// Execute the supplied example subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::List => handle_example_list_command(),
            Self::Info { name } => handle_example_info_command(&name)?,
            Self::Extract {
                name,
                new_path: dest,
            } => handle_example_extract_command(&name, dest.as_deref())?,
            Self::Translate {
                name,
                output_dir,
                overwrite,
            } => handle_example_translate_command(&name, output_dir.as_deref(), overwrite, None)?,
        }

        Ok(())
    }
}

/// The names of all bundled examples
pub fn example_names() -> impl Iterator<Item = &'static str> {
    EXAMPLES_DIR
        .dirs()
        .filter_map(|dir| dir.path().to_str())
}

/// Handle the `example list` command.
fn handle_example_list_command() {
    for name in example_names() {
        println!("{name}");
    }
}

/// Handle the `example info` command.
fn handle_example_info_command(name: &str) -> Result<()> {
    let path: PathBuf = [name, "README.txt"].iter().collect();
    let readme = EXAMPLES_DIR
        .get_file(path)
        .context("Example not found.")?
        .contents_utf8()
        .expect("README.txt is not UTF-8 encoded");

    println!("{readme}");

    Ok(())
}

/// The model or component file of an example
fn example_model_file(sub_dir: &'static Dir<'static>) -> Result<&'static File<'static>> {
    sub_dir
        .files()
        .find(|file| {
            file.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == MODEL_FILE_EXTENSION || ext == COMPONENT_FILE_EXTENSION)
        })
        .context("Example contains no model or component file")
}

/// Handle the `example extract` command
fn handle_example_extract_command(name: &str, dest: Option<&Path>) -> Result<()> {
    let dest = dest.unwrap_or(Path::new(name));
    let model_path = extract_example(name, dest)?;
    println!("Extracted {}", model_path.display());

    Ok(())
}

/// Extract the specified example to a new directory, returning the path of its model file
pub fn extract_example(name: &str, new_path: &Path) -> Result<PathBuf> {
    let sub_dir = EXAMPLES_DIR.get_dir(name).context("Example not found.")?;
    let model_file = example_model_file(sub_dir)?;

    ensure!(
        !new_path.exists(),
        "Destination directory {} already exists",
        new_path.display()
    );

    fs::create_dir(new_path)?;
    for entry in sub_dir.entries() {
        match entry {
            DirEntry::Dir(_) => panic!("Subdirectories in examples not supported"),
            DirEntry::File(f) => {
                let file_name = f.path().file_name().unwrap();
                let file_path = new_path.join(file_name);
                fs::write(&file_path, f.contents())?;
            }
        }
    }

    Ok(new_path.join(model_file.path().file_name().unwrap()))
}

/// Handle the `example translate` command.
///
/// The translated file is written to `output_dir`, or the current directory if not given.
pub fn handle_example_translate_command(
    name: &str,
    output_dir: Option<&Path>,
    overwrite: bool,
    settings: Option<Settings>,
) -> Result<()> {
    let temp_dir = TempDir::new().context("Failed to create temporary directory.")?;
    let model_path = extract_example(name, &temp_dir.path().join(name))?;

    let output_file_name = get_output_path(&model_path)?
        .file_name()
        .context("Invalid output path")?
        .to_owned();
    let output = output_dir.unwrap_or(Path::new(".")).join(output_file_name);
    let opts = TranslateOpts {
        output: Some(output),
        overwrite,
        ..Default::default()
    };
    handle_translate_command(&model_path, &opts, settings)
}
