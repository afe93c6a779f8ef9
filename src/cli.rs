//! The command line interface for the translator.
use crate::idf::IdfFile;
use crate::input::{COMPONENT_FILE_EXTENSION, MODEL_FILE_EXTENSION, input_err_msg};
use crate::log;
use crate::model::{Component, Model};
use crate::report::{get_report_dir, summarise_changes, write_report};
use crate::settings::Settings;
use crate::translator::VersionTranslator;
use crate::translator::updates::START_VERSIONS;
use crate::version::{CURRENT_VERSION, DEFAULT_FILE_VERSION, OLDEST_VERSION, VersionString};
use ::log::{info, warn};
use anyhow::{Context, Result, ensure};
use clap::{Args, CommandFactory, Parser, Subcommand};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

pub mod example;
use example::ExampleSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// The suffix added to an input file's stem to give the default output path
const OUTPUT_FILE_SUFFIX: &str = "_updated";

/// The command line interface for the translator.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the translate command
#[derive(Args, Default)]
pub struct TranslateOpts {
    /// Path for the translated file [default: `<stem>_updated.<ext>` next to the input]
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Whether to overwrite the output file if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Refuse files from versions newer than the current one
    #[arg(long)]
    pub strict: bool,
    /// Folder to write a report of the translation to
    #[arg(long)]
    pub report_dir: Option<PathBuf>,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Translate a model (.osm) or component (.osc) file to the current version.
    Translate {
        /// Path to the file to translate.
        path: PathBuf,
        /// Other translation options
        #[command(flatten)]
        opts: TranslateOpts,
    },
    /// Show the version of a file and whether it needs translating.
    Info {
        /// Path to the model or component file.
        path: PathBuf,
    },
    /// List the versions which can be translated (2.6.0 up to the current version).
    Versions,
    /// Manage example models.
    Example {
        /// The available subcommands for managing example models.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Translate { path, opts } => handle_translate_command(&path, &opts, None),
            Self::Info { path } => handle_info_command(&path),
            Self::Versions => {
                handle_versions_command();
                Ok(())
            }
            Self::Example { subcommand } => subcommand.execute(),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and run the requested command
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ osversion --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// The default path for the translated version of `input_path`: `<stem>_updated.<ext>`
pub fn get_output_path(input_path: &Path) -> Result<PathBuf> {
    let stem = input_path
        .file_stem()
        .context("Input path has no file name")?
        .to_str()
        .context("Invalid chars in input file name")?;
    let mut file_name = format!("{stem}{OUTPUT_FILE_SUFFIX}");
    if let Some(ext) = input_path.extension().and_then(|ext| ext.to_str()) {
        file_name.push('.');
        file_name.push_str(ext);
    }

    Ok(input_path.with_file_name(file_name))
}

/// Whether `path` names a component file
fn is_component_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(COMPONENT_FILE_EXTENSION))
}

/// Handle the `translate` command.
pub fn handle_translate_command(
    input_path: &Path,
    opts: &TranslateOpts,
    settings: Option<Settings>,
) -> Result<()> {
    // Load program settings, if not provided
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    if !log::is_logger_initialised() {
        log::init(Some(settings.log_level.as_str()), None)
            .context("Failed to initialise logging.")?;
    }

    let output_path = match &opts.output {
        Some(path) => path.clone(),
        None => get_output_path(input_path)?,
    };
    let overwrite = opts.overwrite || settings.overwrite;
    ensure!(
        overwrite || !output_path.exists(),
        "Output file {} already exists. Use --overwrite to replace it.",
        output_path.display()
    );

    let mut translator = VersionTranslator::new();
    translator.set_allow_newer_versions(settings.allow_newer_versions && !opts.strict);
    translator.set_progress_callback(|version, step, num_steps| {
        info!("Translating to version {version} (step {step} of {num_steps})");
    });

    let result = if is_component_file(input_path) {
        translator
            .load_component(input_path)
            .map(Component::into_model)
    } else {
        translator.load_model(input_path)
    };

    // The report is written even if translation failed, as its messages explain why
    let report_dir = match &opts.report_dir {
        Some(dir) => Some(dir.clone()),
        None if settings.write_report => Some(get_report_dir(&output_path)?),
        None => None,
    };
    if let Some(report_dir) = report_dir {
        let final_version = result.as_ref().ok().and_then(Model::version);
        write_report(&report_dir, input_path, &translator, final_version)
            .context("Failed to write report.")?;
        info!("Report written to {}", report_dir.display());
    }

    let model =
        result.with_context(|| format!("Failed to translate {}.", input_path.display()))?;
    for (kind, count) in summarise_changes(&translator) {
        if count > 0 {
            let kind: &str = kind.into();
            info!("{count} {kind} object(s)");
        }
    }
    let num_warnings = translator.warnings().len();
    if num_warnings > 0 {
        warn!("Translation raised {num_warnings} warning(s)");
    }

    model.save(&output_path, overwrite)?;
    info!(
        "Translated {} from version {} to {CURRENT_VERSION}. Saved to {}",
        input_path.display(),
        translator.original_version(),
        output_path.display()
    );

    Ok(())
}

/// Describe a file's version and whether it needs translating
pub fn describe_version(version: Option<VersionString>) -> String {
    let Some(version) = version else {
        return format!(
            "No version found, {DEFAULT_FILE_VERSION} assumed. Translation to {CURRENT_VERSION} \
            is needed."
        );
    };

    match version.cmp(&CURRENT_VERSION) {
        Ordering::Less => {
            format!("Version {version}. Translation to {CURRENT_VERSION} is needed.")
        }
        Ordering::Equal => format!("Version {version}. File is up to date."),
        Ordering::Greater => {
            format!("Version {version}, which is newer than the current version {CURRENT_VERSION}.")
        }
    }
}

/// The number of objects of each type, in order of first appearance
pub fn count_objects_by_type(idf: &IdfFile) -> IndexMap<&str, usize> {
    let mut counts = IndexMap::new();
    for object in idf.objects() {
        *counts.entry(object.type_name()).or_default() += 1;
    }

    counts
}

/// Handle the `info` command.
pub fn handle_info_command(path: &Path) -> Result<()> {
    let text = fs::read_to_string(path).with_context(|| input_err_msg(path))?;
    let kind = if is_component_file(path) {
        "Component"
    } else {
        "Model"
    };
    println!(
        "{kind}: {}\n{}",
        path.display(),
        describe_version(IdfFile::load_version_only(&text))
    );

    // The version can be read even from files which don't fully parse
    match IdfFile::parse(&text) {
        Ok(idf) => {
            println!("{} objects", idf.num_objects());
            for (type_name, count) in count_objects_by_type(&idf) {
                println!("  {type_name}: {count}");
            }
        }
        Err(err) => println!("Unable to read objects: {err:#}"),
    }

    Ok(())
}

/// The versions which can be translated, as printed by the `versions` command
pub fn describe_supported_versions() -> String {
    let mut out = format!(
        "Files from {OLDEST_VERSION} to {CURRENT_VERSION} can be translated. Older files are \
        not supported.\nVersions which can be translated from:\n"
    );
    for version in START_VERSIONS {
        out.push_str(&format!("  {version}\n"));
    }
    out.push_str(&format!("Current version: {CURRENT_VERSION}\n"));
    out.push_str(&format!(
        "Supported file extensions: .{MODEL_FILE_EXTENSION}, .{COMPONENT_FILE_EXTENSION}\n"
    ));

    out
}

/// Handle the `versions` command.
pub fn handle_versions_command() {
    print!("{}", describe_supported_versions());
}
