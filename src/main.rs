mod address;
mod asa;
mod client;
mod config;
mod devices;
mod error;
mod model;
mod objects;
mod output;
mod prompts;
mod reconcile;
mod report;
mod rules;
mod session;
mod store;

use crate::client::FmcClient;
use crate::config::{Config, Scope};
use crate::devices::DeviceRegistration;
use crate::model::{ObjectKind, PolicyRef};
use crate::output::{OutputFormat, RenderOpts};
use crate::reconcile::{AllowList, GroupReconciler};
use crate::report::SyncReport;
use crate::rules::{AccessPolicy, AccessRule, ExportRow, PolicySelection, PrefilterRule};
use crate::session::Session;
use crate::store::ObjectStore;
use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "fmctl",
    version,
    about = "CLI for the Cisco Firepower Management Center API"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "FMCTL_SERVER",
        value_name = "HOST",
        help = "FMC host name or URL (otherwise read from config)"
    )]
    server: Option<String>,

    #[arg(long, global = true, env = "FMCTL_USERNAME", help = "API user name")]
    username: Option<String>,

    #[arg(
        long,
        global = true,
        env = "FMCTL_PASSWORD",
        hide_env_values = true,
        help = "API password (prompted for when missing)"
    )]
    password: Option<String>,

    #[arg(
        long,
        global = true,
        env = "FMCTL_DOMAIN",
        value_name = "NAME|UUID",
        help = "Domain to operate in when the FMC has several"
    )]
    domain: Option<String>,

    #[arg(long, global = true, help = "Verify the FMC's TLS certificate")]
    verify_tls: bool,

    #[arg(
        long,
        short = 'o',
        value_enum,
        default_value_t = OutputFormat::Pretty,
        global = true,
        help = "Output format (propagates to subcommands)"
    )]
    output: OutputFormat,

    #[arg(long, global = true, help = "Do not truncate long IDs in table output")]
    full_ids: bool,

    #[arg(
        long,
        value_name = "COL1,COL2",
        global = true,
        help = "Override table columns (comma-separated)"
    )]
    columns: Option<String>,

    #[arg(
        long,
        value_name = "COLUMN",
        global = true,
        help = "Sort table rows by column (ascending)"
    )]
    sort_by: Option<String>,

    #[arg(
        long,
        value_name = "TEXT",
        global = true,
        help = "Filter rows containing TEXT (case-insensitive)"
    )]
    filter: Option<String>,

    #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Log more (-v info, -vv debug); RUST_LOG takes precedence"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Persist the connection flags given on this command line
    Configure {
        #[arg(
            long,
            value_enum,
            default_value_t = ScopeArg::User,
            help = "Where to write the config (project dir or user config dir)"
        )]
        scope: ScopeArg,
    },
    /// Show current configuration (secrets masked)
    ConfigShow,
    /// Check that the configured credentials can log in
    Validate,
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
    /// List the domains visible to this user
    Domains,
    /// GET any API path and print or save the response
    Get {
        /// Path below the server root, e.g. /api/fmc_config/v1/domain/{uuid}/object/hosts
        path: String,
        #[arg(long, help = "Ask for expanded items")]
        expanded: bool,
        #[arg(long, help = "Page size for collection paths")]
        limit: Option<usize>,
        #[arg(long, value_name = "FILE", help = "Write the JSON response to FILE")]
        save: Option<PathBuf>,
    },
    /// Address object operations
    #[command(subcommand)]
    Objects(ObjectsCommand),
    /// Network group operations
    #[command(subcommand)]
    Group(GroupCommand),
    /// Access rule operations
    #[command(subcommand)]
    Rules(RulesCommand),
    /// Prefilter policy operations
    #[command(subcommand)]
    Prefilter(PrefilterCommand),
    /// Device, cluster and HA pair inventory
    Inventory {
        #[arg(long, value_name = "FILE", help = "Save the inventory as JSON")]
        json: Option<PathBuf>,
        #[arg(long, value_name = "FILE", help = "Save one CSV row per device")]
        csv: Option<PathBuf>,
    },
    /// Register an FTD with this FMC
    Register {
        #[arg(long, help = "Display name of the device")]
        name: String,
        #[arg(long, value_name = "HOST", help = "Management address of the device")]
        host: String,
        #[arg(long, default_value = "cisco123", help = "NAT id shared with the device")]
        nat_id: String,
        #[arg(long, help = "Registration key (random when omitted)")]
        reg_key: Option<String>,
        #[arg(long, value_name = "NAME", help = "Access policy to assign")]
        policy: Option<String>,
    },
}

#[derive(Subcommand)]
enum ObjectsCommand {
    /// List objects of one kind
    List {
        #[arg(long, value_enum, default_value_t = KindArg::Network)]
        kind: KindArg,
    },
    /// Bulk-create objects from a headerless name,value CSV
    Create {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
    /// Create objects and groups from ASA `show run object` output
    ImportAsa {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum GroupCommand {
    /// Reconcile a network group with an allow-list file
    Sync {
        #[arg(long, value_name = "NAME", help = "Network group name (exact match)")]
        group: String,
        #[arg(long, value_name = "FILE", help = "One IPv4 address or CIDR per line")]
        file: PathBuf,
        #[arg(long, help = "Show the changes without applying them")]
        dry_run: bool,
        #[arg(long, value_name = "FILE", help = "Also write the report as JSON")]
        report_json: Option<PathBuf>,
        #[arg(long, value_name = "FILE", help = "Also write the diff as CSV")]
        report_csv: Option<PathBuf>,
    },
    /// Show a network group's members
    Show {
        #[arg(long, value_name = "NAME")]
        group: String,
    },
}

#[derive(Subcommand)]
enum RulesCommand {
    /// Set the intrusion and/or file policy on ALLOW rules
    SetPolicies {
        #[arg(long, value_name = "NAME", help = "Access policy to update")]
        policy: Option<String>,
        #[command(flatten)]
        inspection: InspectionArgs,
        #[arg(long, help = "Touch every ALLOW rule, not only those already inspected")]
        all: bool,
    },
    /// Export access and prefilter rules to CSV
    Export {
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum PrefilterCommand {
    /// Copy prefilter rules into the access policy as access rules
    Migrate {
        #[arg(long, value_name = "NAME", help = "Access policy owning the prefilter policy")]
        policy: Option<String>,
        #[command(flatten)]
        inspection: InspectionArgs,
    },
}

#[derive(clap::Args)]
struct InspectionArgs {
    #[arg(long, value_name = "NAME", help = "Intrusion policy to apply")]
    ips: Option<String>,
    #[arg(long, value_name = "NAME", default_value = rules::DEFAULT_VARIABLE_SET)]
    variable_set: String,
    #[arg(long, value_name = "NAME", help = "File policy to apply")]
    file_policy: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScopeArg {
    Project,
    User,
}

impl From<ScopeArg> for Scope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Project => Scope::Project,
            ScopeArg::User => Scope::User,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Host,
    Range,
    Network,
    Fqdn,
}

impl From<KindArg> for ObjectKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Host => ObjectKind::Host,
            KindArg::Range => ObjectKind::Range,
            KindArg::Network => ObjectKind::Network,
            KindArg::Fqdn => ObjectKind::Fqdn,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let cwd = std::env::current_dir().context("reading current directory")?;
    let render_opts = RenderOpts {
        columns_override: RenderOpts::parse_columns(cli.columns.as_deref()),
        sort_by: cli.sort_by.clone(),
        filter: cli.filter.clone(),
        full_ids: cli.full_ids,
    };

    match &cli.command {
        Commands::Configure { scope } => {
            let mut existing = config::load_scope((*scope).into(), &cwd)?;
            existing = existing.overlay(cli.overrides());
            let path = config::save((*scope).into(), &existing, &cwd)?;
            println!("Saved configuration to {}", path.display());
        }
        Commands::ConfigShow => {
            let merged = config::load(&cwd)?;
            println!("{}", serde_json::to_string_pretty(&merged.masked())?);
        }
        Commands::Validate => {
            let session = connect(&cli, &cwd)?;
            println!(
                "FMC {}: ok (domain {}, {} domain(s) visible)",
                session.client.server_name(),
                session.domain.name,
                session.client.domains().len()
            );
        }
        Commands::Completion { shell } => {
            use clap_complete::{generate, shells};
            let mut cmd = Cli::command();
            let bin = cmd.get_name().to_string();
            let out = &mut io::stdout();
            match shell {
                CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin, out),
                CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin, out),
                CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin, out),
                CompletionShell::PowerShell => generate(shells::PowerShell, &mut cmd, bin, out),
            }
        }
        Commands::Domains => {
            let client = login(&cli, &cwd)?;
            let domains = serde_json::to_value(client.domains())?;
            output::render(&domains, cli.output, &render_opts, Some(&["name", "uuid"]))?;
        }
        Commands::Get {
            path,
            expanded,
            limit,
            save,
        } => {
            let client = login(&cli, &cwd)?;
            run_get(&client, path, *expanded, *limit, save.as_deref(), cli.output, &render_opts)?;
        }
        Commands::Objects(command) => {
            let session = connect(&cli, &cwd)?;
            handle_objects(&session, command, cli.output, &render_opts)?;
        }
        Commands::Group(command) => {
            let session = connect(&cli, &cwd)?;
            handle_group(&session, command, cli.output, &render_opts)?;
        }
        Commands::Rules(RulesCommand::SetPolicies {
            policy,
            inspection,
            all,
        }) => {
            let session = connect(&cli, &cwd)?;
            set_policies(&session, policy.as_deref(), inspection, *all)?;
        }
        Commands::Rules(RulesCommand::Export { file }) => {
            let session = connect(&cli, &cwd)?;
            export_rules(&session, file.clone())?;
        }
        Commands::Prefilter(PrefilterCommand::Migrate { policy, inspection }) => {
            let session = connect(&cli, &cwd)?;
            migrate_prefilter(&session, policy.as_deref(), inspection)?;
        }
        Commands::Inventory { json, csv } => {
            let session = connect(&cli, &cwd)?;
            inventory(&session, json.as_deref(), csv.as_deref(), cli.output, &render_opts)?;
        }
        Commands::Register {
            name,
            host,
            nat_id,
            reg_key,
            policy,
        } => {
            let session = connect(&cli, &cwd)?;
            let policies = session.access_policies()?;
            if policies.is_empty() {
                bail!("no access policy configured on this FMC; create one before registering devices");
            }
            let acp = prompts::select("access policy", &policies, policy.as_deref())?;
            let reg_key = reg_key.clone().unwrap_or_else(devices::registration_key);
            let registration =
                DeviceRegistration::new(name, host, nat_id, &reg_key, &policy_ref(acp));
            let response = session.register_device(&registration)?;
            info!(device = %name, policy = %acp.name, "registration submitted");
            if cli.output != OutputFormat::Pretty {
                output::render(&response, cli.output, &render_opts, None)?;
            }
            println!("Device {name} submitted for registration with access policy {}.", acp.name);
            println!("Run on the device to complete registration:");
            println!("  {}", registration.manager_command(session.client.server_name()));
        }
    }

    Ok(())
}

impl Cli {
    fn overrides(&self) -> Config {
        Config {
            server: self.server.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            domain: self.domain.clone(),
            verify_tls: self.verify_tls.then_some(true),
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn login_with(cli: &Cli, cwd: &Path) -> Result<(FmcClient, Option<String>)> {
    let effective = config::resolve(cwd, cli.overrides())?;
    let password = match effective.password {
        Some(password) => password,
        None => prompts::prompt_password(&effective.username, &effective.server)?,
    };
    let client = FmcClient::login(
        &effective.server,
        &effective.username,
        &password,
        effective.verify_tls,
    )
    .with_context(|| format!("logging in to {}", effective.server))?;
    Ok((client, effective.domain))
}

fn login(cli: &Cli, cwd: &Path) -> Result<FmcClient> {
    login_with(cli, cwd).map(|(client, _)| client)
}

/// Logs in and settles on one domain.
fn connect(cli: &Cli, cwd: &Path) -> Result<Session> {
    let (client, wanted) = login_with(cli, cwd)?;
    let domain = prompts::select("domain", client.domains(), wanted.as_deref())?.clone();
    info!(domain = %domain.name, uuid = %domain.uuid, "using domain");
    Ok(Session::new(client, domain))
}

fn run_get(
    client: &FmcClient,
    path: &str,
    expanded: bool,
    limit: Option<usize>,
    save: Option<&Path>,
    output: OutputFormat,
    render_opts: &RenderOpts,
) -> Result<()> {
    let path = path.trim_end_matches('/');
    let mut query = Vec::new();
    let is_item = path.rsplit('/').next().is_some_and(looks_like_uuid);
    if !is_item {
        if expanded {
            query.push(("expanded", "true".to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
    }
    let response = client.get(path, &query)?;
    info!(path, status = response.status, "fetched");
    let value = response.json.unwrap_or(Value::String(response.body));

    if let Some(file) = save {
        report::write_json(file, &value)?;
        println!("Saved response to {}", file.display());
        return Ok(());
    }
    output::render(&value, output, render_opts, Some(&["name", "type", "value"]))?;
    Ok(())
}

fn looks_like_uuid(segment: &str) -> bool {
    segment.len() == 36
        && segment.char_indices().all(|(idx, c)| match idx {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        })
}

fn handle_objects(
    session: &Session,
    command: &ObjectsCommand,
    output: OutputFormat,
    render_opts: &RenderOpts,
) -> Result<()> {
    let domain = session.domain_id();
    match command {
        ObjectsCommand::List { kind } => {
            let objects = session.client.list_objects(domain, (*kind).into())?;
            let value = serde_json::to_value(&objects)?;
            output::render(&value, output, render_opts, Some(&["name", "type", "value"]))?;
        }
        ObjectsCommand::Create { kind, file } => {
            let reader =
                File::open(file).with_context(|| format!("opening {}", file.display()))?;
            let (items, anomalies) = objects::read_csv(reader, (*kind).into());
            if items.is_empty() {
                bail!("{} holds no name,value rows", file.display());
            }
            let created = session.client.bulk_create(domain, (*kind).into(), &items)?;
            println!(
                "Created {} of {} object(s) ({} row(s) skipped)",
                created.len(),
                items.len(),
                anomalies.len()
            );
        }
        ObjectsCommand::ImportAsa { file } => {
            let text =
                fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
            let (parsed, anomalies) = asa::parse(&text);
            info!(
                objects = parsed.objects.len(),
                groups = parsed.groups.len(),
                skipped = anomalies.len(),
                "parsed ASA configuration"
            );
            let summary = asa::import(&session.client, domain, &parsed)?;
            println!(
                "Created {} object(s) and {} group(s)",
                summary.objects.len(),
                summary.groups.len()
            );
            for name in &summary.unresolved {
                println!("  unresolved: {name}");
            }
        }
    }
    Ok(())
}

fn handle_group(
    session: &Session,
    command: &GroupCommand,
    output: OutputFormat,
    render_opts: &RenderOpts,
) -> Result<()> {
    let domain = session.domain_id();
    match command {
        GroupCommand::Show { group } => {
            let group = session.client.find_group(domain, group)?;
            let members = serde_json::to_value(group.members())?;
            output::render(&members, output, render_opts, Some(&["type", "value", "name"]))?;
        }
        GroupCommand::Sync {
            group,
            file,
            dry_run,
            report_json,
            report_csv,
        } => {
            let text =
                fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
            let (allow, anomalies) = AllowList::parse(&text);
            if !anomalies.is_empty() {
                warn!(skipped = anomalies.len(), "allow-list has malformed entries");
            }
            if allow.is_empty() {
                bail!("{} has no valid entries; refusing to empty the group", file.display());
            }
            info!(entries = allow.len(), "loaded allow-list");

            let group = session.client.find_group(domain, group)?;
            let networks = session.client.list_objects(domain, ObjectKind::Network)?;
            let hosts = session.client.list_objects(domain, ObjectKind::Host)?;
            let plan = GroupReconciler::new(&networks, &hosts).plan(&allow, &group);
            let group_name = group.name.clone();

            let report = if *dry_run {
                SyncReport::planned(&group_name, &plan)
            } else {
                match reconcile::apply(&session.client, domain, group, plan.clone()) {
                    Ok(result) => SyncReport::applied(&plan, &result),
                    Err(err) => {
                        let report = SyncReport::failed(&group_name, &plan, &err);
                        report.write(&mut io::stdout(), output)?;
                        report.save(report_json.as_deref(), report_csv.as_deref())?;
                        return Err(anyhow!(err).context(format!("syncing network group {group_name}")));
                    }
                }
            };

            report.write(&mut io::stdout(), output)?;
            report.save(report_json.as_deref(), report_csv.as_deref())?;
        }
    }
    Ok(())
}

fn policy_ref(policy: &AccessPolicy) -> PolicyRef {
    PolicyRef {
        id: policy.id.clone(),
        name: Some(policy.name.clone()),
        kind: Some("AccessPolicy".into()),
    }
}

/// Resolves the named intrusion policy, variable set and file policy.
fn inspection_selection(session: &Session, args: &InspectionArgs) -> Result<PolicySelection> {
    let mut selection = PolicySelection::default();
    if let Some(ips) = &args.ips {
        let policies = session.intrusion_policies()?;
        selection.ips = Some(prompts::select("intrusion policy", &policies, Some(ips.as_str()))?.into());
        let sets = session.variable_sets()?;
        selection.variable_set =
            Some(prompts::select("variable set", &sets, Some(args.variable_set.as_str()))?.into());
    }
    if let Some(file) = &args.file_policy {
        let policies = session.file_policies()?;
        selection.file_policy = Some(prompts::select("file policy", &policies, Some(file.as_str()))?.into());
    }
    Ok(selection)
}

fn set_policies(
    session: &Session,
    policy: Option<&str>,
    inspection: &InspectionArgs,
    all: bool,
) -> Result<()> {
    if inspection.ips.is_none() && inspection.file_policy.is_none() {
        bail!("nothing to do: pass --ips and/or --file-policy");
    }
    let policies = session.access_policies()?;
    let acp = prompts::select("access policy", &policies, policy)?;
    let selection = inspection_selection(session, inspection)?;

    let current: Vec<AccessRule> = session.access_rules(&acp.id)?;
    let total = current.len();
    let updated = rules::apply_policies(current, &selection, all);
    if updated.is_empty() {
        println!("No ALLOW rules to update in {} ({total} rule(s) checked)", acp.name);
        return Ok(());
    }
    let count = session.update_rules(&acp.id, &updated)?;
    println!("Updated {count} of {total} rule(s) in {}", acp.name);
    Ok(())
}

fn migrate_prefilter(session: &Session, policy: Option<&str>, inspection: &InspectionArgs) -> Result<()> {
    let policies = session.access_policies()?;
    let acp = prompts::select("access policy", &policies, policy)?;
    let prefilter = acp
        .prefilter_policy_setting
        .as_ref()
        .ok_or_else(|| anyhow!("access policy {} has no prefilter policy", acp.name))?;

    let fetched: Vec<PrefilterRule> = session.prefilter_rules(&prefilter.id)?;
    let pending: Vec<PrefilterRule> = fetched.into_iter().filter(|r| !r.is_tunnel()).collect();
    if pending.is_empty() {
        println!("No prefilter rules to migrate in {}", acp.name);
        return Ok(());
    }

    let selection = inspection_selection(session, inspection)?;
    let sets = session.variable_sets()?;
    let default_vset = sets
        .iter()
        .find(|s| s.name == rules::DEFAULT_VARIABLE_SET)
        .map(PolicyRef::from);
    let converted =
        rules::convert_prefilter(pending, &selection, default_vset.as_ref(), &timestamp());
    let count = session.create_rules(&acp.id, &converted)?;
    println!("Created {count} access rule(s) in {} from prefilter rules", acp.name);
    Ok(())
}

fn export_rules(session: &Session, file: Option<PathBuf>) -> Result<()> {
    let fmc_name = session.client.server_name().to_string();
    let mut rows = Vec::new();
    for policy in session.access_policies()? {
        let access: Vec<Value> = session.access_rules(&policy.id)?;
        rows.extend(access.iter().map(|r| ExportRow::from_rule(&fmc_name, &policy, r)));
        if let Some(prefilter) = &policy.prefilter_policy_setting {
            let prefilter_rules: Vec<Value> = session.prefilter_rules(&prefilter.id)?;
            rows.extend(prefilter_rules.iter().map(|r| ExportRow::from_rule(&fmc_name, &policy, r)));
        }
    }

    let path = file.unwrap_or_else(|| PathBuf::from(format!("acp_rule_export_{}.csv", timestamp())));
    let out = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    rules::write_export(out, &rows)?;
    println!("Exported {} rule(s) to {}", rows.len(), path.display());
    Ok(())
}

fn inventory(
    session: &Session,
    json_file: Option<&Path>,
    csv_file: Option<&Path>,
    output: OutputFormat,
    render_opts: &RenderOpts,
) -> Result<()> {
    let inventory = session.inventory()?;
    if let Some(path) = json_file {
        report::write_json(path, &inventory)?;
        println!("Saved inventory to {}", path.display());
    }
    if let Some(path) = csv_file {
        let out = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        inventory.write_csv(out)?;
        println!("Saved device CSV to {}", path.display());
    }
    if json_file.is_none() && csv_file.is_none() {
        let value = match output {
            OutputFormat::Pretty => serde_json::to_value(&inventory.devices)?,
            _ => serde_json::to_value(&inventory)?,
        };
        output::render(
            &value,
            output,
            render_opts,
            Some(&["name", "model", "sw_version", "healthStatus", "ftdMode", "deviceSerialNumber"]),
        )?;
    }
    Ok(())
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d_%H%M").to_string()
}
