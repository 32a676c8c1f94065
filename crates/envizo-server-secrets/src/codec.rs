// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Export/import formats for a flat key to plaintext snapshot.
//!
//! Encoding always emits keys in ascending order. Decoding rejects duplicate
//! keys, invalid keys and non-scalar values; numbers and booleans become
//! their string form.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use envizo_common_secret::SecretString;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::validate_key;

/// A decoded or to-be-encoded snapshot, keyed and sorted by secret key.
pub type Snapshot = BTreeMap<String, SecretString>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
	Dotenv,
	Json,
	Yaml,
}

impl Format {
	pub fn all() -> &'static [Format] {
		&[Format::Dotenv, Format::Json, Format::Yaml]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Format::Dotenv => "dotenv",
			Format::Json => "json",
			Format::Yaml => "yaml",
		}
	}
}

impl fmt::Display for Format {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Format {
	type Err = CodecError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"dotenv" | "env" | ".env" => Ok(Format::Dotenv),
			"json" => Ok(Format::Json),
			"yaml" | "yml" => Ok(Format::Yaml),
			other => Err(CodecError::UnknownFormat(other.to_string())),
		}
	}
}

#[derive(Debug, Error)]
pub enum CodecError {
	#[error("unknown format '{0}': expected dotenv, json or yaml")]
	UnknownFormat(String),

	#[error("line {line}: {message}")]
	Dotenv { line: usize, message: String },

	#[error("invalid json: {0}")]
	Json(String),

	#[error("invalid yaml: {0}")]
	Yaml(String),

	#[error("input is not valid UTF-8")]
	Utf8,
}

/// Serialize a snapshot. Output carries plaintext.
pub fn encode(snapshot: &Snapshot, format: Format) -> Result<Vec<u8>, CodecError> {
	let plain: BTreeMap<&str, &str> = snapshot
		.iter()
		.map(|(k, v)| (k.as_str(), v.expose().as_str()))
		.collect();

	match format {
		Format::Dotenv => Ok(encode_dotenv(&plain).into_bytes()),
		Format::Json => {
			let mut out = serde_json::to_vec_pretty(&plain).map_err(|e| CodecError::Json(e.to_string()))?;
			out.push(b'\n');
			Ok(out)
		}
		Format::Yaml => serde_yaml::to_string(&plain)
			.map(String::into_bytes)
			.map_err(|e| CodecError::Yaml(e.to_string())),
	}
}

/// Parse a snapshot. Nothing is returned unless the whole input is valid.
pub fn decode(bytes: &[u8], format: Format) -> Result<Snapshot, CodecError> {
	let text = std::str::from_utf8(bytes).map_err(|_| CodecError::Utf8)?;
	let entries = match format {
		Format::Dotenv => decode_dotenv(text)?,
		Format::Json => {
			if text.trim().is_empty() {
				BTreeMap::new()
			} else {
				serde_json::from_str::<FlatMap>(text)
					.map_err(|e| CodecError::Json(e.to_string()))?
					.0
			}
		}
		Format::Yaml => {
			if text.trim().is_empty() {
				BTreeMap::new()
			} else {
				serde_yaml::from_str::<FlatMap>(text)
					.map_err(|e| CodecError::Yaml(e.to_string()))?
					.0
			}
		}
	};
	Ok(entries
		.into_iter()
		.map(|(k, v)| (k, SecretString::new(v)))
		.collect())
}

// ---------------------------------------------------------------------------
// dotenv
// ---------------------------------------------------------------------------

fn needs_quotes(value: &str) -> bool {
	value.is_empty()
		|| !value
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || "_-./:@+,%".contains(c))
}

fn encode_dotenv(entries: &BTreeMap<&str, &str>) -> String {
	let mut out = String::new();
	for (key, value) in entries {
		out.push_str(key);
		out.push('=');
		if needs_quotes(value) {
			out.push('"');
			for c in value.chars() {
				match c {
					'\\' => out.push_str("\\\\"),
					'"' => out.push_str("\\\""),
					'\n' => out.push_str("\\n"),
					'\r' => out.push_str("\\r"),
					'\t' => out.push_str("\\t"),
					'$' => out.push_str("\\$"),
					other => out.push(other),
				}
			}
			out.push('"');
		} else {
			out.push_str(value);
		}
		out.push('\n');
	}
	out
}

fn decode_dotenv(text: &str) -> Result<BTreeMap<String, String>, CodecError> {
	let mut entries = BTreeMap::new();

	for (idx, raw) in text.lines().enumerate() {
		let line_no = idx + 1;
		let err = |message: String| CodecError::Dotenv {
			line: line_no,
			message,
		};

		let line = raw.trim();
		if line.is_empty() || line.starts_with('#') {
			continue;
		}
		let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

		let (key, rest) = line
			.split_once('=')
			.ok_or_else(|| err("expected KEY=VALUE".to_string()))?;
		let key = key.trim();
		validate_key(key).map_err(|e| err(e.to_string()))?;

		let value = parse_dotenv_value(rest.trim_start()).map_err(err)?;

		if entries.insert(key.to_string(), value).is_some() {
			return Err(err(format!("duplicate key '{key}'")));
		}
	}

	Ok(entries)
}

fn parse_dotenv_value(rest: &str) -> Result<String, String> {
	if let Some(body) = rest.strip_prefix('"') {
		let mut value = String::new();
		let mut chars = body.chars();
		loop {
			match chars.next() {
				None => return Err("unterminated double-quoted value".to_string()),
				Some('"') => break,
				Some('\\') => match chars.next() {
					Some('n') => value.push('\n'),
					Some('r') => value.push('\r'),
					Some('t') => value.push('\t'),
					Some('\\') => value.push('\\'),
					Some('"') => value.push('"'),
					Some('$') => value.push('$'),
					Some(other) => {
						value.push('\\');
						value.push(other);
					}
					None => return Err("unterminated escape".to_string()),
				},
				Some(c) => value.push(c),
			}
		}
		ensure_trailing_comment(chars.as_str())?;
		Ok(value)
	} else if let Some(body) = rest.strip_prefix('\'') {
		let (value, tail) = body
			.split_once('\'')
			.ok_or_else(|| "unterminated single-quoted value".to_string())?;
		ensure_trailing_comment(tail)?;
		Ok(value.to_string())
	} else {
		// Unquoted: an inline comment needs whitespace before '#'.
		let value = match rest.find(" #").or_else(|| rest.find("\t#")) {
			Some(pos) => &rest[..pos],
			None => rest,
		};
		Ok(value.trim_end().to_string())
	}
}

fn ensure_trailing_comment(tail: &str) -> Result<(), String> {
	let tail = tail.trim();
	if tail.is_empty() || tail.starts_with('#') {
		Ok(())
	} else {
		Err(format!("unexpected characters after closing quote: '{tail}'"))
	}
}

// ---------------------------------------------------------------------------
// json / yaml
// ---------------------------------------------------------------------------

/// A flat string map that refuses duplicate keys and nested values.
struct FlatMap(BTreeMap<String, String>);

struct Scalar(String);

impl<'de> Deserialize<'de> for FlatMap {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		struct FlatMapVisitor;

		impl<'de> Visitor<'de> for FlatMapVisitor {
			type Value = FlatMap;

			fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str("a map of keys to scalar values")
			}

			fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FlatMap, A::Error> {
				let mut entries = BTreeMap::new();
				while let Some(key) = access.next_key::<String>()? {
					validate_key(&key).map_err(de::Error::custom)?;
					let Scalar(value) = access
						.next_value()
						.map_err(|e| de::Error::custom(format!("key '{key}': {e}")))?;
					if entries.insert(key.clone(), value).is_some() {
						return Err(de::Error::custom(format!("duplicate key '{key}'")));
					}
				}
				Ok(FlatMap(entries))
			}
		}

		deserializer.deserialize_map(FlatMapVisitor)
	}
}

impl<'de> Deserialize<'de> for Scalar {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		struct ScalarVisitor;

		impl<'de> Visitor<'de> for ScalarVisitor {
			type Value = Scalar;

			fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str("a string, number or boolean")
			}

			fn visit_str<E: de::Error>(self, v: &str) -> Result<Scalar, E> {
				Ok(Scalar(v.to_string()))
			}

			fn visit_string<E: de::Error>(self, v: String) -> Result<Scalar, E> {
				Ok(Scalar(v))
			}

			fn visit_bool<E: de::Error>(self, v: bool) -> Result<Scalar, E> {
				Ok(Scalar(v.to_string()))
			}

			fn visit_i64<E: de::Error>(self, v: i64) -> Result<Scalar, E> {
				Ok(Scalar(v.to_string()))
			}

			fn visit_u64<E: de::Error>(self, v: u64) -> Result<Scalar, E> {
				Ok(Scalar(v.to_string()))
			}

			fn visit_f64<E: de::Error>(self, v: f64) -> Result<Scalar, E> {
				Ok(Scalar(v.to_string()))
			}
		}

		deserializer.deserialize_any(ScalarVisitor)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn snapshot(pairs: &[(&str, &str)]) -> Snapshot {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), SecretString::from(*v)))
			.collect()
	}

	fn plain(s: &Snapshot) -> Vec<(String, String)> {
		s.iter().map(|(k, v)| (k.clone(), v.expose().clone())).collect()
	}

	#[test]
	fn format_parses_aliases() {
		assert_eq!("YML".parse::<Format>().unwrap(), Format::Yaml);
		assert_eq!(".env".parse::<Format>().unwrap(), Format::Dotenv);
		assert!(matches!("toml".parse::<Format>(), Err(CodecError::UnknownFormat(_))));
	}

	#[test]
	fn json_export_is_sorted_plaintext() {
		let s = snapshot(&[("Z_KEY", "z"), ("API_KEY", "abc"), ("DATABASE_URL", "postgres://db")]);
		let out = String::from_utf8(encode(&s, Format::Json).unwrap()).unwrap();
		let api = out.find("API_KEY").unwrap();
		let db = out.find("DATABASE_URL").unwrap();
		let z = out.find("Z_KEY").unwrap();
		assert!(api < db && db < z);
		assert!(out.contains("\"postgres://db\""));
	}

	#[test]
	fn dotenv_quotes_when_needed() {
		let s = snapshot(&[("A", "plain"), ("B", "has space"), ("C", "line\nbreak"), ("D", "")]);
		let out = String::from_utf8(encode(&s, Format::Dotenv).unwrap()).unwrap();
		assert_eq!(out, "A=plain\nB=\"has space\"\nC=\"line\\nbreak\"\nD=\"\"\n");
	}

	#[test]
	fn dotenv_parses_comments_exports_and_quotes() {
		let input = br#"
# comment
export API_KEY=abc123
DATABASE_URL="postgres://u:p@db/app" # trailing
SINGLE='it''s'
PLAIN=value # inline
HASH=abc#def
ESCAPED="a\"b\\c"
"#;
		let err = decode(input, Format::Dotenv).unwrap_err();
		// SINGLE has text after its closing quote
		assert!(matches!(err, CodecError::Dotenv { line: 5, .. }));

		let input = br#"
# comment
export API_KEY=abc123
DATABASE_URL="postgres://u:p@db/app" # trailing
SINGLE='literal $HOME \n'
PLAIN=value # inline
HASH=abc#def
ESCAPED="a\"b\\c"
"#;
		let s = decode(input, Format::Dotenv).unwrap();
		assert_eq!(s["API_KEY"].expose(), "abc123");
		assert_eq!(s["DATABASE_URL"].expose(), "postgres://u:p@db/app");
		assert_eq!(s["SINGLE"].expose(), "literal $HOME \\n");
		assert_eq!(s["PLAIN"].expose(), "value");
		assert_eq!(s["HASH"].expose(), "abc#def");
		assert_eq!(s["ESCAPED"].expose(), "a\"b\\c");
	}

	#[test]
	fn dotenv_rejects_duplicates_with_line_number() {
		let err = decode(b"A=1\nB=2\nA=3\n", Format::Dotenv).unwrap_err();
		match err {
			CodecError::Dotenv { line, message } => {
				assert_eq!(line, 3);
				assert!(message.contains("duplicate"));
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[test]
	fn dotenv_rejects_missing_equals_and_bad_keys() {
		assert!(matches!(
			decode(b"JUSTAKEY\n", Format::Dotenv),
			Err(CodecError::Dotenv { line: 1, .. })
		));
		assert!(matches!(
			decode(b"BAD KEY=1\n", Format::Dotenv),
			Err(CodecError::Dotenv { line: 1, .. })
		));
		assert!(matches!(
			decode(b"A=\"open\n", Format::Dotenv),
			Err(CodecError::Dotenv { line: 1, .. })
		));
	}

	#[test]
	fn json_scalars_become_strings() {
		let s = decode(br#"{"PORT": 8080, "DEBUG": true, "RATIO": 0.5, "NAME": "x"}"#, Format::Json).unwrap();
		assert_eq!(s["PORT"].expose(), "8080");
		assert_eq!(s["DEBUG"].expose(), "true");
		assert_eq!(s["RATIO"].expose(), "0.5");
		assert_eq!(s["NAME"].expose(), "x");
	}

	#[test]
	fn json_rejects_nested_null_and_duplicates() {
		assert!(matches!(decode(br#"{"A": {"B": 1}}"#, Format::Json), Err(CodecError::Json(_))));
		assert!(matches!(decode(br#"{"A": null}"#, Format::Json), Err(CodecError::Json(_))));
		assert!(matches!(decode(br#"{"A": [1]}"#, Format::Json), Err(CodecError::Json(_))));
		assert!(matches!(decode(br#"{"A": "1", "A": "2"}"#, Format::Json), Err(CodecError::Json(_))));
		assert!(matches!(decode(br#"["A"]"#, Format::Json), Err(CodecError::Json(_))));
	}

	#[test]
	fn yaml_roundtrip_preserves_string_types() {
		let s = snapshot(&[("PORT", "8080"), ("FLAG", "true"), ("EMPTY", ""), ("URL", "http://x:1/y")]);
		let out = encode(&s, Format::Yaml).unwrap();
		assert_eq!(plain(&decode(&out, Format::Yaml).unwrap()), plain(&s));
	}

	#[test]
	fn yaml_rejects_nested() {
		assert!(matches!(decode(b"A:\n  B: 1\n", Format::Yaml), Err(CodecError::Yaml(_))));
	}

	#[test]
	fn empty_inputs_decode_to_empty() {
		for format in Format::all() {
			assert!(decode(b"", *format).unwrap().is_empty());
		}
	}

	#[test]
	fn invalid_utf8_rejected() {
		assert!(matches!(decode(&[0xff, 0xfe], Format::Dotenv), Err(CodecError::Utf8)));
	}

	proptest! {
		#[test]
		fn prop_roundtrip_all_formats(
			entries in proptest::collection::btree_map("[A-Za-z_][A-Za-z0-9_]{0,16}", "[ -~\n\t]{0,32}", 0..12)
		) {
			let s: Snapshot = entries
				.iter()
				.map(|(k, v)| (k.clone(), SecretString::from(v.as_str())))
				.collect();
			for format in Format::all() {
				let out = encode(&s, *format).unwrap();
				let back = decode(&out, *format).unwrap();
				prop_assert_eq!(plain(&back), plain(&s));
			}
		}
	}
}
