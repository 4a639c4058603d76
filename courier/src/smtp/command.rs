use super::args::{Domain, Path};

/// SASL mechanisms we know how to speak.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mechanism {
	Plain,
	Login,
}

impl std::fmt::Display for Mechanism {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Mechanism::Plain => write!(f, "PLAIN"),
			Mechanism::Login => write!(f, "LOGIN"),
		}
	}
}

/// The commands a submission client sends.
#[derive(Clone, Debug)]
pub enum Command {
	Ehlo(Domain),
	StartTls,
	Auth(Mechanism, Option<String>),
	/// A bare base64 line answering a 334 challenge
	AuthResponse(String),
	Mail(Path),
	Rcpt(Path),
	Data,
	Rset,
	Quit,
}

impl Command {
	/// Like Display but with credentials blanked, for logging.
	pub fn redacted(&self) -> String {
		match self {
			Command::Auth(mechanism, Some(_)) => format!("AUTH {} <redacted>", mechanism),
			Command::AuthResponse(_) => String::from("<redacted>"),
			other => other.to_string(),
		}
	}
}

impl std::fmt::Display for Command {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Command::Ehlo(domain) => write!(f, "EHLO {}", domain),
			Command::StartTls => write!(f, "STARTTLS"),
			Command::Auth(mechanism, None) => write!(f, "AUTH {}", mechanism),
			Command::Auth(mechanism, Some(initial)) => write!(f, "AUTH {} {}", mechanism, initial),
			Command::AuthResponse(line) => write!(f, "{}", line),
			Command::Mail(path) => write!(f, "MAIL FROM:{}", path),
			Command::Rcpt(path) => write!(f, "RCPT TO:{}", path),
			Command::Data => write!(f, "DATA"),
			Command::Rset => write!(f, "RSET"),
			Command::Quit => write!(f, "QUIT"),
		}
	}
}
