/// The handful of commands the bounce scan needs.
#[derive(Clone, Debug)]
pub enum Command {
	StartTls,
	Login { username: String, password: String },
	Select(String),
	SearchFrom(String),
	/// Fetches the whole message without setting \Seen
	Fetch(u32),
	Logout,
}

impl Command {
	pub fn tagged(&self, tag: &str) -> String {
		format!("{} {}\r\n", tag, self)
	}

	pub fn redacted(&self) -> String {
		match self {
			Command::Login { username, .. } => format!("LOGIN {} <redacted>", quote(username)),
			other => other.to_string(),
		}
	}
}

impl std::fmt::Display for Command {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Command::StartTls => write!(f, "STARTTLS"),
			Command::Login { username, password } => {
				write!(f, "LOGIN {} {}", quote(username), quote(password))
			}
			Command::Select(mailbox) => write!(f, "SELECT {}", quote(mailbox)),
			Command::SearchFrom(sender) => write!(f, "SEARCH FROM {}", quote(sender)),
			Command::Fetch(id) => write!(f, "FETCH {} BODY.PEEK[]", id),
			Command::Logout => write!(f, "LOGOUT"),
		}
	}
}

/// RFC 3501 quoted string. CR and LF cannot appear in one at all.
fn quote(value: &str) -> String {
	let mut quoted = String::with_capacity(value.len() + 2);
	quoted.push('"');

	for c in value.chars() {
		match c {
			'"' | '\\' => {
				quoted.push('\\');
				quoted.push(c);
			}
			'\r' | '\n' => (),
			_ => quoted.push(c),
		}
	}

	quoted.push('"');
	quoted
}

/// Hands out `a1`, `a2`, ...
#[derive(Default)]
pub struct Tagger {
	issued: u32,
}

impl Tagger {
	pub fn next(&mut self) -> String {
		self.issued += 1;
		format!("a{}", self.issued)
	}
}
