use super::Validator;
use std::{
	fmt::Display,
	net::{AddrParseError, IpAddr},
};
use thiserror::Error;

/// The right hand side of an address. Either a hostname or a bracketed IP literal.
#[derive(Clone, Hash, PartialEq, Eq, Debug)]
pub enum Domain {
	Name(String),
	Literal(IpAddr),
}

impl Domain {
	/// The name this machine should greet a server with. Falls back to
	/// `localhost` when the system hostname is not a valid domain.
	pub fn local() -> Self {
		let hostname = gethostname::gethostname().to_string_lossy().into_owned();

		hostname
			.parse()
			.unwrap_or_else(|_| Self::Name(String::from("localhost")))
	}
}

impl Display for Domain {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Name(name) => write!(f, "{}", name),
			Self::Literal(IpAddr::V4(ip)) => write!(f, "[{}]", ip),
			Self::Literal(IpAddr::V6(ip)) => write!(f, "[IPv6:{}]", ip),
		}
	}
}

impl std::str::FromStr for Domain {
	type Err = ParseDomainError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if Validator::validate_domain(s) {
			return Ok(Self::Name(s.into()));
		}

		let literal = s
			.strip_prefix('[')
			.and_then(|s| s.strip_suffix(']'))
			.ok_or(ParseDomainError::InvalidDomain)?;

		// Only parse ipv6 if it claims to be one
		let ip = match literal.strip_prefix("IPv6:") {
			Some(v6) => IpAddr::V6(v6.parse()?),
			None => IpAddr::V4(literal.parse()?),
		};

		Ok(Self::Literal(ip))
	}
}

#[derive(Error, Debug)]
pub enum ParseDomainError {
	#[error("failed to parse address literal")]
	AddrParseError(#[from] AddrParseError),
	#[error("invalid domain or address")]
	InvalidDomain,
}
