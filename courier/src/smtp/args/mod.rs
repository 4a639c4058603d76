mod domain;
mod localpart;
mod path;
mod validator;

pub use domain::*;
pub use localpart::*;
pub use path::*;
pub use validator::*;

#[cfg(test)]
mod test {
	use std::str::FromStr;

	use super::*;

	fn valid_hostnames() -> Vec<String> {
		let labels = ["gmail", "x", "mail-1", "1mail", "a--b"];
		let mut valid: Vec<String> = labels.iter().map(|l| l.to_string()).collect();

		for first in labels {
			for second in labels {
				valid.push(format!("{}.{}", first, second));
			}
		}

		valid
	}

	fn invalid_domains() -> Vec<String> {
		let mut invalid = vec![
			String::from(""),
			String::from("exa mple.com"),
			String::from("example..com"),
			String::from("under_score.com"),
			String::from("[10.0.0.0"),
			String::from("[192.168.1.256]"),
			String::from("[IPv6:10.0.0.1]"),
			String::from("[fe80::1]"),
		];

		for name in valid_hostnames() {
			invalid.push(format!(".{}", name));
			invalid.push(format!("{}.", name));
			invalid.push(format!("-{}", name));
			invalid.push(format!("{}-", name));
		}

		invalid
	}

	fn valid_localparts() -> Vec<&'static str> {
		vec![
			"a",
			"first.last",
			"first+tag",
			"o'brien",
			"x_y-z",
			"\"\"",
			"\"two words\"",
			"\"escaped \\\" quote\"",
		]
	}

	fn invalid_localparts() -> Vec<&'static str> {
		vec!["", ".lead", "trail.", "dou..ble", "sp ace", "\"", "\"open", "\"bad\\\""]
	}

	#[test]
	fn domain_pass() {
		for name in valid_hostnames() {
			assert_eq!(Domain::from_str(&name).ok(), Some(Domain::Name(name.clone())));
		}

		assert!(Domain::from_str("[127.0.0.1]").is_ok());
		assert!(Domain::from_str("[IPv6:fe80::1]").is_ok());
	}

	#[test]
	fn domain_fail() {
		for domain in invalid_domains() {
			assert!(Domain::from_str(&domain).is_err(), "passed on {}", domain)
		}
	}

	#[test]
	fn domain_literal_display() {
		let v4: Domain = "[10.1.2.3]".parse().unwrap();
		let v6: Domain = "[IPv6:fe80::1]".parse().unwrap();

		assert_eq!(v4.to_string(), "[10.1.2.3]");
		assert_eq!(v6.to_string(), "[IPv6:fe80::1]");
	}

	#[test]
	fn localpart_pass_and_fail() {
		for local in valid_localparts() {
			assert!(LocalPart::from_str(local).is_ok(), "failed on {}", local);
		}

		for local in invalid_localparts() {
			assert!(LocalPart::from_str(local).is_err(), "passed on {}", local);
		}
	}

	#[test]
	fn path_bare_and_bracketed() {
		let bare: Path = "a@x.com".parse().unwrap();
		let bracketed: Path = "<a@x.com>".parse().unwrap();

		assert_eq!(bare, bracketed);
		assert_eq!(bare.address(), "a@x.com");
		assert_eq!(bare.to_string(), "<a@x.com>");
	}

	#[test]
	fn path_uses_last_at_sign() {
		let path: Path = "\"odd@local\"@x.com".parse().unwrap();

		assert_eq!(path.domain, Domain::Name(String::from("x.com")));
		assert_eq!(path.local_part.to_string(), "\"odd@local\"");
	}

	#[test]
	fn path_fail() {
		for bad in ["", "nobody", "<a@x.com", "a@x.com>", "a@", "@x.com", "a b@x.com", "a@x..com"] {
			assert!(Path::from_str(bad).is_err(), "passed on {}", bad);
		}
	}
}
