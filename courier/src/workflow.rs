//! The send, check, resend cycle.
//!
//! ```text
//!  Idle --send--> Sent --scan--> Scanned --resend--> Resent
//! ```
//!
//! Sending and scanning are allowed from any stage. Resending needs a scan
//! that found something.

use std::future::Future;

use log::info;
use thiserror::Error;

use crate::{
	bounce::{self, BounceSet, ScanError},
	config::Config,
	dispatch::{self, DispatchError, DispatchResult, Progress},
	loader::Template,
	Credentials,
};

/// Something that can send mail and look for bounces.
pub trait Mailer {
	fn dispatch(
		&self,
		template: &Template,
		recipients: &[String],
		progress: &mut dyn FnMut(Progress),
	) -> impl Future<Output = Result<DispatchResult, DispatchError>>;

	fn scan(&self, known: &[String]) -> impl Future<Output = Result<BounceSet, ScanError>>;
}

/// The real thing: one mail account on the configured servers.
pub struct Provider<C> {
	config: C,
	credentials: Credentials,
}

impl<C: Config> Provider<C> {
	pub fn new(config: C, credentials: Credentials) -> Self {
		Self { config, credentials }
	}
}

impl<C: Config> Mailer for Provider<C> {
	async fn dispatch(
		&self,
		template: &Template,
		recipients: &[String],
		progress: &mut dyn FnMut(Progress),
	) -> Result<DispatchResult, DispatchError> {
		dispatch::dispatch(&self.config, &self.credentials, template, recipients, progress).await
	}

	async fn scan(&self, known: &[String]) -> Result<BounceSet, ScanError> {
		bounce::scan_bounces(&self.config, &self.credentials, known).await
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stage {
	Idle,
	Sent(DispatchResult),
	Scanned(BounceSet),
	Resent(DispatchResult),
}

pub struct Workflow<M> {
	mailer: M,
	recipients: Vec<String>,
	stage: Stage,
}

impl<M: Mailer> Workflow<M> {
	pub fn new(mailer: M, recipients: Vec<String>) -> Self {
		Self {
			mailer,
			recipients,
			stage: Stage::Idle,
		}
	}

	pub fn stage(&self) -> &Stage {
		&self.stage
	}

	/// What the last scan or restore found.
	pub fn bounced(&self) -> Option<&BounceSet> {
		match &self.stage {
			Stage::Scanned(bounced) => Some(bounced),
			_ => None,
		}
	}

	/// Sends to every loaded recipient. On error the stage is left alone.
	pub async fn send(
		&mut self,
		template: &Template,
		progress: &mut dyn FnMut(Progress),
	) -> Result<DispatchResult, WorkflowError> {
		let result = self
			.mailer
			.dispatch(template, &self.recipients, progress)
			.await?;

		self.stage = Stage::Sent(result);
		Ok(result)
	}

	/// Looks for bounce notices about the loaded recipients.
	pub async fn scan(&mut self) -> Result<BounceSet, WorkflowError> {
		let bounced = self.mailer.scan(&self.recipients).await?;

		self.stage = Stage::Scanned(bounced.clone());
		Ok(bounced)
	}

	/// Takes a bounce set found earlier, a saved report for instance, as if a
	/// scan had just found it. Addresses that aren't loaded recipients are
	/// dropped. Returns how many were kept.
	pub fn restore(&mut self, bounced: BounceSet) -> usize {
		let kept: BounceSet = bounced
			.into_iter()
			.filter(|address| self.recipients.contains(address))
			.collect();

		let count = kept.len();
		self.stage = Stage::Scanned(kept);
		count
	}

	/// Sends `template` again, only to the addresses the last scan found.
	pub async fn resend(
		&mut self,
		template: &Template,
		progress: &mut dyn FnMut(Progress),
	) -> Result<DispatchResult, WorkflowError> {
		let bounced: Vec<String> = match &self.stage {
			Stage::Scanned(bounced) if !bounced.is_empty() => bounced.iter().cloned().collect(),
			Stage::Scanned(_) => return Err(WorkflowError::NothingToResend),
			_ => return Err(WorkflowError::NotScanned),
		};

		info!("resending to {} bounced recipients", bounced.len());
		let result = self.mailer.dispatch(template, &bounced, progress).await?;

		self.stage = Stage::Resent(result);
		Ok(result)
	}
}

#[derive(Debug, Error)]
pub enum WorkflowError {
	#[error("sending failed: {0}")]
	Dispatch(#[from] DispatchError),
	#[error("checking for bounces failed: {0}")]
	Scan(#[from] ScanError),
	#[error("no bounced emails to resend")]
	NothingToResend,
	#[error("check for bounces before resending")]
	NotScanned,
}

#[cfg(test)]
mod test {
	use std::{cell::RefCell, collections::HashSet};

	use super::*;
	use crate::net::NetError;

	/// Refuses the addresses in `rejects` and finds the bounce notices in
	/// `inbox`.
	#[derive(Default)]
	struct Scripted {
		rejects: HashSet<&'static str>,
		inbox: Vec<String>,
		offline: bool,
		sent: RefCell<Vec<Vec<String>>>,
	}

	impl Mailer for Scripted {
		async fn dispatch(
			&self,
			_template: &Template,
			recipients: &[String],
			progress: &mut dyn FnMut(Progress),
		) -> Result<DispatchResult, DispatchError> {
			if self.offline {
				return Err(DispatchError::Connect(NetError::ConnectionClosed));
			}

			let mut result = DispatchResult::default();
			for (idx, recipient) in recipients.iter().enumerate() {
				if self.rejects.contains(recipient.as_str()) {
					result.failure += 1;
				} else {
					result.success += 1;
				}
				progress(Progress {
					completed: idx + 1,
					total: recipients.len(),
				});
			}

			self.sent.borrow_mut().push(recipients.to_vec());
			Ok(result)
		}

		async fn scan(&self, known: &[String]) -> Result<BounceSet, ScanError> {
			if self.offline {
				return Err(ScanError::Connect(NetError::ConnectionClosed));
			}
			Ok(bounce::reconcile(&self.inbox, known))
		}
	}

	fn notice(address: &str) -> String {
		format!("Subject: failure\r\n\r\nYour message wasn't delivered to {}.\r\n", address)
	}

	fn workflow(mailer: Scripted, recipients: &[&str]) -> Workflow<Scripted> {
		Workflow::new(mailer, recipients.iter().map(|r| r.to_string()).collect())
	}

	fn template() -> Template {
		Template {
			subject: String::from("Hi"),
			body: String::from("Hello"),
		}
	}

	fn set(addresses: &[&str]) -> BounceSet {
		addresses.iter().map(|a| a.to_string()).collect()
	}

	#[tokio::test]
	async fn send_check_resend() {
		let mailer = Scripted {
			inbox: vec![notice("b@x.com"), notice("b@x.com"), notice("z@y.com")],
			..Default::default()
		};
		let mut flow = workflow(mailer, &["a@x.com", "b@x.com", "c@x.com"]);

		let mut seen = vec![];
		let sent = flow.send(&template(), &mut |p| seen.push(p)).await.unwrap();
		assert_eq!(sent, DispatchResult { success: 3, failure: 0 });
		assert_eq!(seen.last(), Some(&Progress { completed: 3, total: 3 }));
		assert_eq!(flow.stage(), &Stage::Sent(sent));

		let bounced = flow.scan().await.unwrap();
		assert_eq!(bounced, set(&["b@x.com"]));

		let resent = flow.resend(&template(), &mut |_| ()).await.unwrap();
		assert_eq!(resent, DispatchResult { success: 1, failure: 0 });
		assert_eq!(flow.stage(), &Stage::Resent(resent));
		assert_eq!(flow.mailer.sent.borrow()[1], vec!["b@x.com"]);
	}

	#[tokio::test]
	async fn failures_are_counted() {
		let mailer = Scripted {
			rejects: HashSet::from(["b@x.com"]),
			..Default::default()
		};
		let mut flow = workflow(mailer, &["a@x.com", "b@x.com"]);

		assert_eq!(
			flow.send(&template(), &mut |_| ()).await.unwrap(),
			DispatchResult { success: 1, failure: 1 }
		);
	}

	#[tokio::test]
	async fn resend_needs_bounces() {
		let mut flow = workflow(Scripted::default(), &["a@x.com"]);

		assert!(matches!(flow.resend(&template(), &mut |_| ()).await, Err(WorkflowError::NotScanned)));

		assert!(flow.scan().await.unwrap().is_empty());
		assert!(matches!(flow.resend(&template(), &mut |_| ()).await, Err(WorkflowError::NothingToResend)));
		assert!(flow.mailer.sent.borrow().is_empty());
	}

	#[tokio::test]
	async fn restored_report_can_be_resent() {
		let mut flow = workflow(Scripted::default(), &["a@x.com", "b@x.com"]);

		assert_eq!(flow.restore(set(&["b@x.com", "gone@x.com"])), 1);
		assert_eq!(flow.bounced(), Some(&set(&["b@x.com"])));

		flow.resend(&template(), &mut |_| ()).await.unwrap();
		assert_eq!(flow.mailer.sent.borrow()[0], vec!["b@x.com"]);
	}

	#[tokio::test]
	async fn failed_scan_keeps_stage() {
		let mailer = Scripted {
			offline: true,
			..Default::default()
		};
		let mut flow = workflow(mailer, &["a@x.com"]);

		assert!(matches!(flow.scan().await, Err(WorkflowError::Scan(_))));
		assert!(matches!(flow.send(&template(), &mut |_| ()).await, Err(WorkflowError::Dispatch(_))));
		assert_eq!(flow.stage(), &Stage::Idle);
	}
}
