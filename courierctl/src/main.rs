mod config;

use std::{io::Write, process::ExitCode};

use config::{Action, ConfigError, CourierConfig, Invocation};

use courier::{
	read_report, write_report, Credentials, CredentialsError, DispatchResult, LoadError, Progress,
	Provider, ReportError, ScanError, Workflow, WorkflowError,
};
use env_logger::Env;
use log::info;
use secrecy::SecretString;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

const PASSWORD_VAR: &str = "COURIER_PASSWORD";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
	env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

	let invocation = match Invocation::get() {
		Ok(Some(invocation)) => invocation,
		Ok(None) => return ExitCode::SUCCESS,
		Err(err) => {
			eprintln!("{}", err);
			return ExitCode::FAILURE;
		}
	};

	match run(invocation).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			eprintln!("{}", err);
			ExitCode::FAILURE
		}
	}
}

async fn run(invocation: Invocation) -> Result<(), RunError> {
	let Invocation {
		action,
		recipients,
		template,
		from_report,
		config,
	} = invocation;

	let recipients = courier::load_recipients(&recipients)?;
	println!("Loaded {} email addresses successfully.", recipients.len());

	let template = match template {
		Some(path) => {
			let template = courier::load_template(path)?;
			println!("Subject: {}", template.subject);
			println!("Body: {}", template.body);
			Some(template)
		}
		None => None,
	};

	info!(
		"submitting through {}, reading bounces from {}",
		config.submission, config.mailbox
	);

	let output = config.output.clone();
	let credentials = credentials(&config).await?;
	let mut workflow = Workflow::new(Provider::new(config, credentials), recipients);

	match (action, template) {
		(Action::Send, Some(template)) => {
			let result = workflow.send(&template, &mut print_progress).await?;
			print_result(result);
		}
		(Action::Check, _) => {
			let bounced = workflow.scan().await?;
			print_bounces(&bounced);

			if !bounced.is_empty() {
				let report = write_report(&output, &bounced)?;
				println!("Report saved to {} ({})", report.path.display(), report.mime);
			}
		}
		(Action::Resend, Some(template)) => {
			let bounced = match from_report {
				Some(path) => {
					let kept = workflow.restore(read_report(path)?);
					println!("{} addresses from the report are loaded recipients.", kept);
					workflow.bounced().cloned().unwrap_or_default()
				}
				None => {
					let bounced = workflow.scan().await?;
					if !bounced.is_empty() {
						let report = write_report(&output, &bounced)?;
						println!("Report saved to {} ({})", report.path.display(), report.mime);
					}
					bounced
				}
			};
			print_bounces(&bounced);

			if bounced.is_empty() {
				return Ok(());
			}

			let result = workflow.resend(&template, &mut print_progress).await?;
			print_result(result);
		}
		(_, None) => return Err(RunError::Config(ConfigError::Required("--template"))),
	}

	Ok(())
}

async fn credentials(config: &CourierConfig) -> Result<Credentials, RunError> {
	let user = config.user.as_deref().ok_or(RunError::NoUser)?;

	let secret = match std::env::var(PASSWORD_VAR) {
		Ok(secret) => secret,
		Err(_) => {
			eprint!("Password for {}: ", user);
			std::io::stderr().flush()?;

			let mut line = String::new();
			BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
			line.trim_end_matches(['\r', '\n']).to_owned()
		}
	};

	Ok(Credentials::new(user, SecretString::new(secret))?)
}

fn print_progress(progress: Progress) {
	eprint!(
		"\rSending {}/{} ({:.0}%)",
		progress.completed,
		progress.total,
		progress.fraction() * 100.0
	);

	if progress.completed == progress.total {
		eprintln!();
	}
}

fn print_result(result: DispatchResult) {
	println!("Emails sent: {}", result.success);
	if result.failure > 0 {
		println!("Failed to send to {} recipients.", result.failure);
	}
}

fn print_bounces(bounced: &courier::BounceSet) {
	if bounced.is_empty() {
		println!("No bounced emails found.");
		return;
	}

	println!("Bounced Emails Found:");
	for address in bounced {
		println!("{}", address);
	}
}

#[derive(Debug, Error)]
enum RunError {
	#[error("{0}")]
	Config(ConfigError),
	#[error("Error reading files: {0}")]
	Files(#[from] LoadError),
	#[error("Error checking inbox: {0}")]
	Inbox(ScanError),
	#[error("Something went wrong: {0}")]
	Workflow(WorkflowError),
	#[error("Something went wrong with the report: {0}")]
	Report(#[from] ReportError),
	#[error("{0}")]
	Credentials(#[from] CredentialsError),
	#[error("could not read the password: {0}")]
	Password(#[from] std::io::Error),
	#[error("no account to use, pass --user or set User in the config file")]
	NoUser,
}

impl From<WorkflowError> for RunError {
	fn from(err: WorkflowError) -> Self {
		match err {
			WorkflowError::Scan(err) => RunError::Inbox(err),
			other => RunError::Workflow(other),
		}
	}
}
