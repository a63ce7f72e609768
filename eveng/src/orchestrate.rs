//! Batch node lifecycle: create a set of nodes from templates, then start, stop and
//! delete them by id. Every node is attempted on its own; one failure never stops the batch.

use std::fmt;

use log::{info, warn};

use crate::rest::{EveSession, RResult};
use crate::rest_types::{NodeId, NodeTemplate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
	Start,
	Stop,
	Delete,
}
impl Phase {
	pub const ALL: [Phase; 3] = [Phase::Start, Phase::Stop, Phase::Delete];
}
impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Phase::Start => "start",
			Phase::Stop => "stop",
			Phase::Delete => "delete",
		})
	}
}

/// Decides whether a lifecycle phase runs, eg. by asking the operator.
pub trait Proceed {
	fn proceed(&mut self, phase: Phase, ids: &[NodeId]) -> bool;
}
impl<F: FnMut(Phase, &[NodeId]) -> bool> Proceed for F {
	fn proceed(&mut self, phase: Phase, ids: &[NodeId]) -> bool {
		self(phase, ids)
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysProceed;
impl Proceed for AlwaysProceed {
	fn proceed(&mut self, _: Phase, _: &[NodeId]) -> bool { true }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverProceed;
impl Proceed for NeverProceed {
	fn proceed(&mut self, _: Phase, _: &[NodeId]) -> bool { false }
}

/// What happened to one template.
#[derive(Debug)]
pub struct Created {
	pub template: NodeTemplate,
	pub result: RResult<NodeId>,
}
impl Created {
	pub fn id(&self) -> Option<NodeId> {
		self.result.as_ref().ok().copied()
	}

	/// Ids of the nodes that were created, in input order.
	pub fn ids(created: &[Created]) -> Vec<NodeId> {
		created.iter().filter_map(Created::id).collect()
	}
}

/// What happened to one node during a start, stop or delete phase.
#[derive(Debug)]
pub struct NodeAction {
	pub id: NodeId,
	pub result: RResult<()>,
}

/// Creates every template in order. The result holds one entry per template.
pub async fn create_nodes<II: IntoIterator<Item = NodeTemplate>>(session: &EveSession, lab: &str, templates: II) -> Vec<Created> {
	let mut created = Vec::new();
	for template in templates {
		let result = session.create_node(lab, &template).await;
		match &result {
			Ok(id) => info!("{}: created node {} as id {}", lab, template, id),
			Err(e) => warn!("{}: failed to create node {}: {}", lab, template, e),
		}
		created.push(Created { template, result });
	}
	created
}

pub async fn start_nodes(session: &EveSession, lab: &str, ids: &[NodeId]) -> Vec<NodeAction> {
	run_phase(session, lab, Phase::Start, ids).await
}

pub async fn stop_nodes(session: &EveSession, lab: &str, ids: &[NodeId]) -> Vec<NodeAction> {
	run_phase(session, lab, Phase::Stop, ids).await
}

pub async fn delete_nodes(session: &EveSession, lab: &str, ids: &[NodeId]) -> Vec<NodeAction> {
	run_phase(session, lab, Phase::Delete, ids).await
}

pub async fn run_phase(session: &EveSession, lab: &str, phase: Phase, ids: &[NodeId]) -> Vec<NodeAction> {
	let mut actions = Vec::with_capacity(ids.len());
	for &id in ids {
		let result = match phase {
			Phase::Start => session.start_node(lab, id).await,
			Phase::Stop => session.stop_node(lab, id).await,
			Phase::Delete => session.delete_node(lab, id).await,
		};
		match &result {
			Ok(()) => info!("{}: {} node {}: ok", lab, phase, id),
			Err(e) => warn!("{}: {} node {} failed: {}", lab, phase, id, e),
		}
		actions.push(NodeAction { id, result });
	}
	actions
}

/// Successes and failures of one phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
	pub ok: usize,
	pub failed: usize,
}
impl fmt::Display for Tally {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ok, {} failed", self.ok, self.failed)
	}
}

#[derive(Debug, Default)]
pub struct RunReport {
	pub created: Vec<Created>,
	/// `None` when the phase was declined or there was nothing to act on
	pub started: Option<Vec<NodeAction>>,
	pub stopped: Option<Vec<NodeAction>>,
	pub deleted: Option<Vec<NodeAction>>,
}
impl RunReport {
	pub fn phase(&self, phase: Phase) -> Option<&[NodeAction]> {
		match phase {
			Phase::Start => self.started.as_deref(),
			Phase::Stop => self.stopped.as_deref(),
			Phase::Delete => self.deleted.as_deref(),
		}
	}

	fn phase_mut(&mut self, phase: Phase) -> &mut Option<Vec<NodeAction>> {
		match phase {
			Phase::Start => &mut self.started,
			Phase::Stop => &mut self.stopped,
			Phase::Delete => &mut self.deleted,
		}
	}

	pub fn created_tally(&self) -> Tally {
		let ok = self.created.iter().filter(|c| c.result.is_ok()).count();
		Tally { ok, failed: self.created.len() - ok }
	}

	pub fn phase_tally(&self, phase: Phase) -> Option<Tally> {
		self.phase(phase).map(|actions| {
			let ok = actions.iter().filter(|a| a.result.is_ok()).count();
			Tally { ok, failed: actions.len() - ok }
		})
	}

	pub fn failures(&self) -> usize {
		self.created_tally().failed
			+ Phase::ALL.iter().filter_map(|&p| self.phase_tally(p)).map(|t| t.failed).sum::<usize>()
	}

	pub fn summary(&self) -> String {
		let mut s = format!("created: {}", self.created_tally());
		for phase in Phase::ALL {
			match self.phase_tally(phase) {
				Some(t) => s += &format!("; {}: {}", phase, t),
				None => s += &format!("; {}: skipped", phase),
			}
		}
		s
	}
}

/// Runs the whole create/start/stop/delete sequence against one lab.
#[derive(Debug, Clone)]
pub struct Orchestrator<'s> {
	session: &'s EveSession,
	lab: String,
}
impl<'s> Orchestrator<'s> {
	pub fn new(session: &'s EveSession, lab: impl Into<String>) -> Orchestrator<'s> {
		Orchestrator { session, lab: lab.into() }
	}

	pub fn lab(&self) -> &str {
		&self.lab
	}

	/// Creates the nodes, then asks `policy` before each of start, stop and delete.
	/// Later phases are still offered after a declined one. With nothing created, nothing is asked.
	pub async fn run<P: Proceed>(&self, templates: Vec<NodeTemplate>, policy: &mut P) -> RunReport {
		let mut report = RunReport {
			created: create_nodes(self.session, &self.lab, templates).await,
			..RunReport::default()
		};

		let ids = Created::ids(&report.created);
		if ids.is_empty() {
			warn!("{}: no nodes were created", self.lab);
			return report;
		}

		for phase in Phase::ALL {
			if policy.proceed(phase, &ids) {
				let actions = run_phase(self.session, &self.lab, phase, &ids).await;
				*report.phase_mut(phase) = Some(actions);
			} else {
				info!("{}: skipping {}", self.lab, phase);
			}
		}

		report
	}
}
