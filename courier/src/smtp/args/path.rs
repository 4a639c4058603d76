use super::{
	localpart::{InvalidLocalPart, LocalPart},
	Domain, ParseDomainError,
};
use std::{
	fmt::{Display, Formatter},
	str::FromStr,
};
use thiserror::Error;

/// A mailbox as it appears in MAIL FROM and RCPT TO.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
	pub local_part: LocalPart,
	pub domain: Domain,
}

impl Path {
	pub fn new(local_part: LocalPart, domain: Domain) -> Self {
		Self { local_part, domain }
	}

	/// The address without angle brackets, suitable for a header.
	pub fn address(&self) -> String {
		format!("{}@{}", self.local_part, self.domain)
	}

	fn parse_naked_path(naked: &str) -> Result<Self, ParsePathError> {
		let (local_part, domain) = naked.rsplit_once('@').ok_or(ParsePathError::NoAtSign)?;

		Ok(Self {
			local_part: local_part.parse()?,
			domain: domain.parse()?,
		})
	}
}

impl Display for Path {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "<{}>", self.address())
	}
}

impl FromStr for Path {
	type Err = ParsePathError;

	/// Accepts both `<user@example.com>` and a bare `user@example.com`.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.strip_prefix('<') {
			Some(open) => {
				let naked = open.strip_suffix('>').ok_or(ParsePathError::Brackets)?;
				Self::parse_naked_path(naked)
			}
			None if s.ends_with('>') => Err(ParsePathError::Brackets),
			None => Self::parse_naked_path(s),
		}
	}
}

#[derive(Error, Debug)]
pub enum ParsePathError {
	#[error("unbalanced angle brackets")]
	Brackets,
	#[error("no @")]
	NoAtSign,
	#[error("invalid local part")]
	InvalidLocalPart(#[from] InvalidLocalPart),
	#[error("invalid domain")]
	InvalidDomain(#[from] ParseDomainError),
}
