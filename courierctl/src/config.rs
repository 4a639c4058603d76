use std::{
	path::{Path, PathBuf},
	str::FromStr,
};

use confindent::Confindent;
use courier::{
	config::{Config, Endpoint, Security, BOUNCE_SENDER, DEFAULT_MAILBOX},
	report::REPORT_FILENAME,
};
use getopts::{Matches, Options};
use thiserror::Error;

const DEFAULT_CONFIG: &str = "/etc/courier/courier.conf";
const FALLBACK_CONFIG: &str = "courier.conf";

pub struct CourierConfig {
	pub submission: Endpoint,
	pub mailbox: Endpoint,
	pub mailbox_name: String,
	pub bounce_sender: String,
	pub user: Option<String>,
	pub output: PathBuf,
}

impl Config for CourierConfig {
	fn submission(&self) -> &Endpoint {
		&self.submission
	}

	fn mailbox(&self) -> &Endpoint {
		&self.mailbox
	}

	fn mailbox_name(&self) -> &str {
		&self.mailbox_name
	}

	fn bounce_sender(&self) -> &str {
		&self.bounce_sender
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
	Send,
	Check,
	Resend,
}

impl FromStr for Action {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"send" => Ok(Action::Send),
			"check" => Ok(Action::Check),
			"resend" => Ok(Action::Resend),
			_ => Err(ConfigError::UnknownAction(s.into())),
		}
	}
}

/// Everything one run of the program was asked to do.
pub struct Invocation {
	pub action: Action,
	pub recipients: PathBuf,
	pub template: Option<PathBuf>,
	pub from_report: Option<PathBuf>,
	pub config: CourierConfig,
}

impl Invocation {
	fn options() -> Options {
		let mut opts = Options::new();
		opts.optflag("h", "help", "Print this help message");
		opts.optopt("r", "recipients", "The csv or spreadsheet with an \"Email Address\" column", "PATH");
		opts.optopt(
			"t",
			"template",
			"The csv or spreadsheet with \"Subject\" and \"Body\" columns\nNeeded by send and resend",
			"PATH",
		);
		opts.optopt(
			"",
			"from-report",
			"Resend to the addresses in an earlier report instead of checking the inbox",
			"PATH",
		);
		opts.optopt(
			"c",
			"config",
			"An alternate location to read the config from\nDefault: /etc/courier/courier.conf",
			"PATH",
		);
		opts.optopt("u", "user", "The account to send from and check", "ADDRESS");
		opts.optopt(
			"o",
			"output",
			"Where the bounce report is written\nDefault: bounced_emails.xlsx",
			"PATH",
		);
		opts.optopt("", "smtp-host", "Default: smtp.gmail.com", "HOST");
		opts.optopt("", "smtp-port", "Default: 587", "PORT");
		opts.optopt("", "smtp-security", "none, starttls or tls\nDefault: starttls", "MODE");
		opts.optopt("", "imap-host", "Default: imap.gmail.com", "HOST");
		opts.optopt("", "imap-port", "Default: 993", "PORT");
		opts.optopt("", "imap-security", "none, starttls or tls\nDefault: tls", "MODE");
		opts.optopt("", "mailbox", "The folder to look for bounces in\nDefault: INBOX", "NAME");
		opts.optopt(
			"",
			"bounce-sender",
			"Who bounce notices come from\nDefault: Mail Delivery Subsystem",
			"NAME",
		);
		opts
	}

	fn print_usage<S: AsRef<str>>(prgm: S, opts: &Options) {
		let brief = format!("Usage: {} send|check|resend [options]", prgm.as_ref());
		println!("{}", opts.usage(&brief));
	}

	/// `Ok(None)` when there's nothing to do, like after printing the help.
	pub fn get() -> Result<Option<Self>, ConfigError> {
		let args: Vec<String> = std::env::args().collect();
		let prgm = args.first().map(String::as_str).unwrap_or("courierctl");

		let opts = Self::options();
		let matches = opts.parse(args.iter().skip(1))?;

		if matches.opt_present("help") {
			Self::print_usage(prgm, &opts);
			return Ok(None);
		}

		let action: Action = match matches.free.first() {
			Some(action) => action.parse()?,
			None => {
				Self::print_usage(prgm, &opts);
				return Err(ConfigError::NoAction);
			}
		};

		let file = Self::config_file(matches.opt_str("config"))?;
		Self::from_matches(action, &matches, file.as_ref()).map(Some)
	}

	// An explicitly named file has to exist, the default ones don't.
	fn config_file(named: Option<String>) -> Result<Option<Confindent>, ConfigError> {
		let candidates = match named {
			Some(path) => {
				if !Path::new(&path).exists() {
					return Err(ConfigError::MissingFile(path));
				}
				vec![path]
			}
			None => vec![DEFAULT_CONFIG.to_owned(), FALLBACK_CONFIG.to_owned()],
		};

		for path in candidates {
			if !Path::new(&path).exists() {
				continue;
			}

			return match Confindent::from_file(&path) {
				Ok(conf) => Ok(Some(conf)),
				Err(err) => Err(ConfigError::File {
					path,
					reason: err.to_string(),
				}),
			};
		}

		Ok(None)
	}

	fn from_matches(
		action: Action,
		matches: &Matches,
		file: Option<&Confindent>,
	) -> Result<Self, ConfigError> {
		// Options specified on the command line take priority. The config key
		// is the option name in title case, "smtp-host" is read as "SmtpHost".
		let find_value = |cli_key: &str| -> Option<String> {
			let conf_key: String = cli_key
				.split('-')
				.map(|word| {
					let mut c = word.chars();
					match c.next() {
						None => String::new(),
						Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
					}
				})
				.collect();

			matches.opt_str(cli_key).or_else(|| {
				file.and_then(|conf| conf.child_value(conf_key))
					.map(String::from)
			})
		};

		let value = |cli_key: &str, default: &str| -> String {
			find_value(cli_key).unwrap_or_else(|| default.to_owned())
		};

		let port = |cli_key: &'static str, default: u16| -> Result<u16, ConfigError> {
			match find_value(cli_key) {
				None => Ok(default),
				Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
					key: cli_key,
					value,
				}),
			}
		};

		let security = |cli_key: &'static str, default: Security| -> Result<Security, ConfigError> {
			match find_value(cli_key) {
				None => Ok(default),
				Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
					key: cli_key,
					value,
				}),
			}
		};

		let submission_default = Endpoint::default_submission();
		let submission = Endpoint::new(
			value("smtp-host", &submission_default.host),
			port("smtp-port", submission_default.port)?,
			security("smtp-security", submission_default.security)?,
		);

		let mailbox_default = Endpoint::default_mailbox();
		let mailbox = Endpoint::new(
			value("imap-host", &mailbox_default.host),
			port("imap-port", mailbox_default.port)?,
			security("imap-security", mailbox_default.security)?,
		);

		let config = CourierConfig {
			submission,
			mailbox,
			mailbox_name: value("mailbox", DEFAULT_MAILBOX),
			bounce_sender: value("bounce-sender", BOUNCE_SENDER),
			user: find_value("user"),
			output: PathBuf::from(value("output", REPORT_FILENAME)),
		};

		let recipients = matches
			.opt_str("recipients")
			.map(PathBuf::from)
			.ok_or(ConfigError::Required("--recipients"))?;

		let template = matches.opt_str("template").map(PathBuf::from);
		let from_report = matches.opt_str("from-report").map(PathBuf::from);

		match action {
			Action::Send | Action::Resend if template.is_none() => {
				return Err(ConfigError::Required("--template"))
			}
			Action::Send | Action::Check if from_report.is_some() => {
				return Err(ConfigError::ResendOnly("--from-report"))
			}
			_ => (),
		}

		Ok(Self {
			action,
			recipients,
			template,
			from_report,
			config,
		})
	}
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("{0}")]
	Options(#[from] getopts::Fail),
	#[error("expected one of send, check or resend")]
	NoAction,
	#[error("'{0}' is not an action, expected one of send, check or resend")]
	UnknownAction(String),
	#[error("the config file {0} does not exist")]
	MissingFile(String),
	#[error("failed to parse conf file {path}: {reason}")]
	File { path: String, reason: String },
	#[error("failed to parse '{value}' as {key}")]
	Invalid { key: &'static str, value: String },
	#[error("{0} is required for this action")]
	Required(&'static str),
	#[error("{0} only makes sense with resend")]
	ResendOnly(&'static str),
}
