use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use aushell_core::{
    ComponentDescription, FourCc, PluginStateCodec, PresetDomain, PresetRecord, PresetRoots,
    PresetStore, SessionConfig, StateBlob,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = match &cli.roots.config {
        Some(path) => SessionConfig::load_from(path),
        None => SessionConfig::load(),
    };
    let mut roots = config.preset_roots();
    if let Some(user) = cli.roots.user_root.clone() {
        roots.user = user;
    }
    if let Some(local) = cli.roots.local_root.clone() {
        roots.local = local;
    }
    debug!(user = %roots.user.display(), local = %roots.local.display(), "preset roots");

    match cli.command {
        Commands::List(args) => {
            execute_list(PresetStore::new(args.component.describe(), roots), args)
        }
        Commands::Inspect(args) => execute_inspect(args),
        Commands::Install(args) => execute_install(roots, args),
        Commands::Export(args) => {
            execute_export(PresetStore::new(args.target.component.describe(), roots), args)
        }
        Commands::Delete(args) => {
            execute_delete(PresetStore::new(args.target.component.describe(), roots), args)
        }
    }
}

#[derive(Parser)]
#[command(author, version, about = "Preset tools for AuShell audio unit hosts")]
struct Cli {
    #[command(flatten)]
    roots: RootArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List user and local presets stored for a plugin.
    List(ListArgs),
    /// Print the contents of a preset file.
    Inspect(InspectArgs),
    /// Copy a preset file into the user or local preset directory.
    Install(InstallArgs),
    /// Write a stored preset to an arbitrary file.
    Export(ExportArgs),
    /// Remove a stored preset.
    Delete(DeleteArgs),
}

#[derive(Args)]
struct RootArgs {
    /// Session configuration file to read instead of the default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the per-user preset directory.
    #[arg(long, global = true)]
    user_root: Option<PathBuf>,
    /// Override the system-wide preset directory.
    #[arg(long, global = true)]
    local_root: Option<PathBuf>,
}

#[derive(Args)]
struct ComponentArgs {
    /// Component type code, e.g. `aufx`.
    #[arg(long = "type")]
    kind: FourCc,
    /// Component subtype code.
    #[arg(long)]
    subtype: FourCc,
    /// Manufacturer code.
    #[arg(long)]
    manufacturer: FourCc,
}

impl ComponentArgs {
    fn describe(&self) -> ComponentDescription {
        ComponentDescription::new(self.kind, self.subtype, self.manufacturer)
    }
}

#[derive(Args)]
struct ListArgs {
    #[command(flatten)]
    component: ComponentArgs,
    /// Restrict the listing to one domain.
    #[arg(long, value_enum)]
    domain: Option<DomainArg>,
    /// Print the listing as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct InspectArgs {
    /// Preset file to read.
    path: PathBuf,
    /// Print the decoded state as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct InstallArgs {
    /// Preset file to install.
    path: PathBuf,
    #[arg(long, value_enum, default_value_t = DomainArg::User)]
    domain: DomainArg,
    /// Name to store the preset under; defaults to the name inside the file.
    #[arg(long)]
    name: Option<String>,
}

#[derive(Args)]
struct StoredPresetArgs {
    #[command(flatten)]
    component: ComponentArgs,
    #[arg(long, value_enum, default_value_t = DomainArg::User)]
    domain: DomainArg,
    /// Name of the stored preset.
    #[arg(long)]
    name: String,
}

#[derive(Args)]
struct ExportArgs {
    #[command(flatten)]
    target: StoredPresetArgs,
    /// Destination file.
    #[arg(long)]
    out: PathBuf,
    /// Name written into the exported file; defaults to the stored name.
    #[arg(long)]
    rename: Option<String>,
}

#[derive(Args)]
struct DeleteArgs {
    #[command(flatten)]
    target: StoredPresetArgs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DomainArg {
    User,
    Local,
}

impl From<DomainArg> for PresetDomain {
    fn from(value: DomainArg) -> Self {
        match value {
            DomainArg::User => PresetDomain::User,
            DomainArg::Local => PresetDomain::Local,
        }
    }
}

#[derive(Serialize)]
struct ListedPreset {
    domain: PresetDomain,
    name: String,
    path: Option<PathBuf>,
}

fn execute_list(store: PresetStore, args: ListArgs) -> Result<()> {
    let domains: Vec<PresetDomain> = match args.domain {
        Some(domain) => vec![domain.into()],
        None => vec![PresetDomain::User, PresetDomain::Local],
    };
    let mut listed = Vec::new();
    for domain in domains {
        let presets = store
            .list_domain(domain)
            .with_context(|| format!("failed to list {} presets", domain.label()))?;
        listed.extend(presets.into_iter().map(|preset| ListedPreset {
            domain,
            name: preset.name().to_string(),
            path: preset.path().map(PathBuf::from),
        }));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }
    if listed.is_empty() {
        println!("No presets stored for {}", store.component());
        return Ok(());
    }
    let mut current = None;
    for preset in listed {
        if current != Some(preset.domain) {
            println!("{}:", preset.domain.label());
            current = Some(preset.domain);
        }
        println!("  {}", preset.name);
    }
    Ok(())
}

fn execute_inspect(args: InspectArgs) -> Result<()> {
    let bytes = fs::read(&args.path)
        .with_context(|| format!("failed to read preset file {}", args.path.display()))?;
    let info = PluginStateCodec::new()
        .decode(&StateBlob::from(bytes))
        .with_context(|| format!("{} is not a valid preset", args.path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }
    println!("Name:       {}", info.name);
    println!("Component:  {}", info.component);
    println!("Version:    {}", info.version);
    println!("Parameters: {}", info.parameters.len());
    for param in &info.parameters {
        println!(
            "  #{:<5} {:?}[{}] = {}",
            param.id, param.scope, param.element, param.value
        );
    }
    println!("Data:       {} bytes", info.data.len());
    Ok(())
}

fn execute_install(roots: PresetRoots, args: InstallArgs) -> Result<()> {
    let bytes = fs::read(&args.path)
        .with_context(|| format!("failed to read preset file {}", args.path.display()))?;
    let blob = StateBlob::from(bytes);
    let codec = PluginStateCodec::new();
    let info = codec
        .decode(&blob)
        .with_context(|| format!("{} is not a valid preset", args.path.display()))?;
    let name = args.name.unwrap_or(info.name);

    let store = PresetStore::new(info.component, roots);
    let record = store
        .save(&blob, args.domain.into(), &name)
        .with_context(|| format!("failed to install preset '{name}'"))?;
    print_location("Installed", &record);
    Ok(())
}

fn execute_export(store: PresetStore, args: ExportArgs) -> Result<()> {
    let record = find_stored(&store, &args.target)?;
    let Some(state) = record.state() else {
        bail!("preset '{}' has no stored state", record.name());
    };
    let name = args.rename.as_deref().unwrap_or(record.name());
    store
        .save_to_file(state, name, &args.out)
        .with_context(|| format!("failed to export to {}", args.out.display()))?;
    println!("Exported '{}' to {}", name, args.out.display());
    Ok(())
}

fn execute_delete(store: PresetStore, args: DeleteArgs) -> Result<()> {
    let record = find_stored(&store, &args.target)?;
    store
        .delete(&record)
        .with_context(|| format!("failed to delete preset '{}'", record.name()))?;
    print_location("Deleted", &record);
    Ok(())
}

fn find_stored(store: &PresetStore, target: &StoredPresetArgs) -> Result<PresetRecord> {
    let domain = PresetDomain::from(target.domain);
    let presets = store
        .list_domain(domain)
        .with_context(|| format!("failed to list {} presets", domain.label()))?;
    match presets.into_iter().find(|preset| preset.name() == target.name) {
        Some(record) => Ok(record),
        None => bail!(
            "no {} preset named '{}' for {}",
            domain.label().to_lowercase(),
            target.name,
            store.component()
        ),
    }
}

fn print_location(action: &str, record: &PresetRecord) {
    match record.path() {
        Some(path) => println!("{action} '{}' at {}", record.name(), path.display()),
        None => println!("{action} '{}'", record.name()),
    }
}
