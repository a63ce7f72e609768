
use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ArgAction};
use log::{info, trace, warn};
use serde_json::{json, Value};
use thiserror::Error;

use eveng::{Config, EveSession, Phase, Proceed};
use eveng::config::ConfigError;
use eveng::node_yaml::NodeFile;
use eveng::orchestrate::{self, AlwaysProceed, Created, NeverProceed, NodeAction, Orchestrator, RunReport};
use eveng::rest::ProbeResult;
use eveng::rt::{NodeId, NodeTemplate};

/// Endpoints worth poking at when finding out what a server exposes.
const PROBE_DEFAULTS: &[&str] = &[
	"/api/labs",
	"/api/labs/",
	"/api/labs/status",
	"/api/status",
	"/api/folders",
	"/api/folders/",
	"/api/",
	"/api",
];

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Eve(#[from] eveng::Error),
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error("No lab given: pass --lab or set `lab.target_lab` in the configuration")]
	NoLab,
	#[error("No nodes to provision: pass --nodes or list them under `nodes` in the configuration")]
	NoTemplates,
	#[error("{0} operation(s) failed")]
	Partial(usize),
	#[error("Unable to encode output: {0}")]
	Json(#[from] serde_json::Error),
}

#[derive(Parser)]
#[command(version, about = "Provision and manage EVE-NG lab nodes over the REST API")]
pub struct Args {
	/// YAML configuration file. Defaults to $EVE_HOST and friends, then ./config.yaml
	#[arg(short, long, global = true)]
	config: Option<PathBuf>,

	/// Emit JSON instead of text
	#[arg(short, long, global = true)]
	json: bool,

	/// More logging (-v info, -vv debug, -vvv trace)
	#[arg(short, long, action = ArgAction::Count, global = true)]
	verbose: u8,

	#[command(subcommand)]
	rootsubcmd: SubCmdRoot,
}
impl Args {
	pub fn log_level(&self) -> log::LevelFilter {
		match self.verbose {
			0 => log::LevelFilter::Warn,
			1 => log::LevelFilter::Info,
			2 => log::LevelFilter::Debug,
			_ => log::LevelFilter::Trace,
		}
	}

	/// Loads configuration, logs in, and runs the subcommand.
	pub async fn run(&self) -> Result<(), CliError> {
		let config = Config::load(self.config.as_deref())?;
		trace!("logging in");
		let session = config.authenticate().login().await?;
		self.handle(&config, &session).await
	}

	pub async fn handle(&self, config: &Config, session: &EveSession) -> Result<(), CliError> {
		match &self.rootsubcmd {
			SubCmdRoot::Labs { path } => self.labs(session, path).await,
			SubCmdRoot::Lab(lab) => self.lab(session, &lab.resolve(config)?).await,
			SubCmdRoot::NodeTypes => {
				let types = session.node_types().await?;
				if self.json {
					println!("{}", serde_json::to_string(&types)?);
				} else {
					println!("{}", types.join("\n"));
				}
				Ok(())
			},
			SubCmdRoot::Templates { node_type } => {
				let templates = session.templates(node_type).await?;
				if self.json {
					println!("{}", serde_json::to_string(&templates)?);
				} else if templates.is_empty() {
					println!("No available templates for type {}", node_type);
				} else {
					for t in templates {
						let label = t.name.or(t.description).unwrap_or_default();
						println!("{:<20} {}", t.id, label);
					}
				}
				Ok(())
			},
			SubCmdRoot::Nodes(lab) => self.nodes(session, &lab.resolve(config)?).await,
			SubCmdRoot::Provision(p) => p.handle(self, config, session).await,
			SubCmdRoot::Start(a) => a.handle(self, config, session, Phase::Start).await,
			SubCmdRoot::Stop(a) => a.handle(self, config, session, Phase::Stop).await,
			SubCmdRoot::Delete(a) => a.handle(self, config, session, Phase::Delete).await,
			SubCmdRoot::Probe { paths } => {
				let results = if paths.is_empty() {
					session.probe(PROBE_DEFAULTS).await
				} else {
					session.probe(paths.as_slice()).await
				};
				self.print_probe(&results);
				Ok(())
			},
		}
	}

	async fn labs(&self, session: &EveSession, path: &str) -> Result<(), CliError> {
		let listing = session.folder(path).await?;
		if self.json {
			println!("{}", serde_json::to_string(&listing)?);
		} else if listing.labs.is_empty() && listing.folders.is_empty() {
			println!("No labs found.");
		} else {
			for folder in &listing.folders {
				println!("{}/", folder.path);
			}
			for lab in &listing.labs {
				match &lab.mtime {
					Some(mtime) => println!("{} (Path: {}, Modified: {})", lab.file, lab.path, mtime),
					None => println!("{} (Path: {})", lab.file, lab.path),
				}
			}
		}
		Ok(())
	}

	async fn lab(&self, session: &EveSession, lab: &str) -> Result<(), CliError> {
		let result = session.lab(lab).await?;
		match (self.json, result) {
			(true, Some(l)) => println!("{}", serde_json::to_string(&l)?),
			(true, None) => println!("{}", serde_json::to_string(&Value::Null)?),
			(false, None) => println!("No lab found named {}", lab),
			(false, Some(l)) => {
				println!("Lab \"{}\" ({})", l.name.as_deref().unwrap_or(lab), l.filename.as_deref().unwrap_or(lab));
				if let Some(author) = &l.author {
					println!("Author: {}", author);
				}
				if let Some(version) = &l.version {
					println!("Version: {}", version);
				}
				if let Some(description) = l.description.as_deref().filter(|d| !d.trim().is_empty()) {
					println!("Description:");
					termimad::print_text(description.trim());
				}
			},
		}
		Ok(())
	}

	async fn nodes(&self, session: &EveSession, lab: &str) -> Result<(), CliError> {
		let nodes = session.lab_nodes(lab).await?;
		if self.json {
			println!("{}", serde_json::to_string(&nodes)?);
		} else if nodes.is_empty() {
			println!("No nodes in {}", lab);
		} else {
			for n in nodes {
				let status = n.status.map(|s| s.to_string()).unwrap_or_else(|| "?".into());
				let template = n.template.as_deref().or(n.kind.as_deref()).unwrap_or("");
				println!("{:>4}  {:<20} {:<12} {}", n.id, n.name, template, status);
			}
		}
		Ok(())
	}

	fn print_probe(&self, results: &[ProbeResult]) {
		if self.json {
			let out: Vec<Value> = results.iter()
				.map(|r| match &r.result {
					Ok((status, body)) => json!({"path": r.path, "status": status, "body": body}),
					Err(e) => json!({"path": r.path, "error": e.to_string()}),
				})
				.collect();
			println!("{}", Value::Array(out));
			return;
		}

		for r in results {
			println!("Endpoint: {}", r.path);
			match &r.result {
				Ok((status, body)) => {
					println!("Status: {}", status);
					println!("Response: {}...", body);
				},
				Err(e) => println!("Error: {}", e),
			}
			println!("{}", "-".repeat(30));
		}
	}
}

#[derive(Subcommand)]
pub enum SubCmdRoot {
	/// List labs and subfolders of a folder
	Labs {
		#[arg(default_value = "")]
		path: String,
	},
	/// Show a lab's details
	Lab(LabArg),
	/// List the node types the server offers
	NodeTypes,
	/// List the available templates of a node type
	Templates {
		node_type: String,
	},
	/// List the nodes of a lab
	Nodes(LabArg),
	/// Create nodes from templates, then optionally start, stop and delete them
	Provision(SubCmdProvision),
	/// Start nodes by id
	Start(SubCmdNodes),
	/// Stop nodes by id
	Stop(SubCmdNodes),
	/// Delete nodes by id
	Delete(SubCmdNodes),
	/// GET a set of endpoints and show what each returns
	Probe {
		paths: Vec<String>,
	},
}

#[derive(clap::Args)]
pub struct LabArg {
	/// Lab name, eg. `demo.unl`. Defaults to `lab.target_lab`
	#[arg(short, long)]
	lab: Option<String>,
}
impl LabArg {
	fn resolve(&self, config: &Config) -> Result<String, CliError> {
		self.lab.clone()
			.or_else(|| config.lab.target_lab.clone())
			.ok_or(CliError::NoLab)
	}
}

#[derive(clap::Args)]
pub struct SubCmdProvision {
	#[command(flatten)]
	lab: LabArg,

	/// YAML file with a `nodes` list (and optionally a `lab`)
	#[arg(short, long)]
	nodes: Option<PathBuf>,

	/// Run every phase without asking
	#[arg(short, long, conflicts_with = "create_only")]
	yes: bool,

	/// Only create the nodes
	#[arg(long)]
	create_only: bool,
}
impl SubCmdProvision {
	async fn handle(&self, args: &Args, config: &Config, session: &EveSession) -> Result<(), CliError> {
		let (file_lab, templates): (Option<String>, Vec<NodeTemplate>) = match &self.nodes {
			Some(path) => {
				let file = NodeFile::load(path)?;
				(file.lab, file.nodes)
			},
			None => (None, config.nodes.clone()),
		};
		if templates.is_empty() {
			return Err(CliError::NoTemplates);
		}
		let lab = match (&self.lab.lab, file_lab) {
			(Some(lab), _) => lab.clone(),
			(None, Some(lab)) => lab,
			(None, None) => self.lab.resolve(config)?,
		};

		info!("provisioning {} node(s) in {}", templates.len(), lab);
		let orchestrator = Orchestrator::new(session, lab);
		let report = if self.create_only {
			orchestrator.run(templates, &mut NeverProceed).await
		} else if self.yes {
			orchestrator.run(templates, &mut AlwaysProceed).await
		} else {
			orchestrator.run(templates, &mut Prompt::stdin()).await
		};

		args.print_report(&report);
		match report.failures() {
			0 => Ok(()),
			n => Err(CliError::Partial(n)),
		}
	}
}

#[derive(clap::Args)]
pub struct SubCmdNodes {
	#[command(flatten)]
	lab: LabArg,

	#[arg(required = true)]
	ids: Vec<NodeId>,
}
impl SubCmdNodes {
	async fn handle(&self, args: &Args, config: &Config, session: &EveSession, phase: Phase) -> Result<(), CliError> {
		let lab = self.lab.resolve(config)?;
		let actions = orchestrate::run_phase(session, &lab, phase, &self.ids).await;
		args.print_actions(phase, &actions);
		match actions.iter().filter(|a| a.result.is_err()).count() {
			0 => Ok(()),
			n => Err(CliError::Partial(n)),
		}
	}
}

impl Args {
	fn print_report(&self, report: &RunReport) {
		if self.json {
			let phase = |p: Phase| report.phase(p).map(actions_json);
			println!("{}", json!({
				"created": report.created.iter().map(created_json).collect::<Vec<_>>(),
				"start": phase(Phase::Start),
				"stop": phase(Phase::Stop),
				"delete": phase(Phase::Delete),
			}));
			return;
		}

		for c in &report.created {
			match &c.result {
				Ok(id) => println!("created {} as node {}", c.template, id),
				Err(e) => println!("failed to create {}: {}", c.template, e),
			}
		}
		for phase in Phase::ALL {
			if let Some(actions) = report.phase(phase) {
				self.print_actions(phase, actions);
			}
		}
		println!("{}", report.summary());
	}

	fn print_actions(&self, phase: Phase, actions: &[NodeAction]) {
		if self.json {
			println!("{}", actions_json(actions));
			return;
		}
		for a in actions {
			match &a.result {
				Ok(()) => println!("{} node {}: ok", phase, a.id),
				Err(e) => println!("{} node {}: failed: {}", phase, a.id, e),
			}
		}
	}
}

fn created_json(c: &Created) -> Value {
	json!({
		"template": c.template,
		"id": c.id(),
		"error": c.result.as_ref().err().map(|e| e.to_string()),
	})
}

fn actions_json(actions: &[NodeAction]) -> Value {
	actions.iter()
		.map(|a| json!({
			"id": a.id,
			"ok": a.result.is_ok(),
			"error": a.result.as_ref().err().map(|e| e.to_string()),
		}))
		.collect()
}

/// Asks on `output` (stderr from the command line, keeping stdout clean for `-j`) and reads a yes/no answer from `input`.
pub struct Prompt<R, W> {
	input: R,
	output: W,
}
impl Prompt<std::io::StdinLock<'static>, std::io::Stderr> {
	pub fn stdin() -> Self {
		Prompt { input: std::io::stdin().lock(), output: std::io::stderr() }
	}
}
impl<R: BufRead, W: Write> Prompt<R, W> {
	pub fn new(input: R, output: W) -> Self {
		Prompt { input, output }
	}
}
impl<R: BufRead, W: Write> Proceed for Prompt<R, W> {
	fn proceed(&mut self, phase: Phase, ids: &[NodeId]) -> bool {
		let list: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
		let asked = write!(self.output, "{} {} node(s) [{}]? [y/N] ", phase, ids.len(), list.join(", "))
			.and_then(|_| self.output.flush());
		if let Err(e) = asked {
			warn!("unable to write prompt: {}", e);
		}

		let mut answer = String::new();
		match self.input.read_line(&mut answer) {
			Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
			Err(e) => {
				warn!("unable to read answer, treating as no: {}", e);
				false
			},
		}
	}
}
