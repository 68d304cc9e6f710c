//! Command tokeniser.
//!
//! Turns `svctask mkvdisk -name v1 -mdiskgrp "pool" -size 1 -unit gb` into a
//! [`ParsedCommand`] holding the verb, the optional object operand and one
//! entry per flag. Which flags take a value is a fixed property of the
//! device grammar, recorded in [`FLAGS`].

use std::collections::BTreeMap;

use thiserror::Error;

/// How many tokens a flag consumes after itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Bare switch (`-force`).
    Nullary,
    /// Always followed by a value (`-size 10`).
    Unary,
    /// Takes the next token unless it is another flag or the end of input
    /// (`-autoexpand` vs `-autoexpand on`).
    OptionalUnary,
}

/// Every flag the simulator understands.
pub const FLAGS: &[(&str, Arity)] = &[
    ("access", Arity::Nullary),
    ("activeactive", Arity::Nullary),
    ("bytes", Arity::Nullary),
    ("compressed", Arity::Nullary),
    ("force", Arity::Nullary),
    ("force_unmap", Arity::Nullary),
    ("global", Arity::Nullary),
    ("noauxchange", Arity::Nullary),
    ("nochapsecret", Arity::Nullary),
    ("noconsistgrp", Arity::Nullary),
    ("nofmtdisk", Arity::Nullary),
    ("nohdr", Arity::Nullary),
    ("nomasterchange", Arity::Nullary),
    ("novolumegroup", Arity::Nullary),
    ("prep", Arity::Nullary),
    ("removefcmaps", Arity::Nullary),
    ("removehostmappings", Arity::Nullary),
    ("removercrelationships", Arity::Nullary),
    ("start", Arity::Nullary),
    ("stop", Arity::Nullary),
    ("thin", Arity::Nullary),
    ("aux", Arity::Unary),
    ("auxchange", Arity::Unary),
    ("backgroundcopyrate", Arity::Unary),
    ("buffersize", Arity::Unary),
    ("chapsecret", Arity::Unary),
    ("cleanrate", Arity::Unary),
    ("cluster", Arity::Unary),
    ("clusterip", Arity::Unary),
    ("consistgrp", Arity::Unary),
    ("copies", Arity::Unary),
    ("copy", Arity::Unary),
    ("copyrate", Arity::Unary),
    ("cycleperiodseconds", Arity::Unary),
    ("cyclingmode", Arity::Unary),
    ("delim", Arity::Unary),
    ("easytier", Arity::Unary),
    ("filtervalue", Arity::Unary),
    ("grainsize", Arity::Unary),
    ("hbawwpn", Arity::Unary),
    ("host", Arity::Unary),
    ("iogrp", Arity::Unary),
    ("iscsiname", Arity::Unary),
    ("linkbandwidthmbits", Arity::Unary),
    ("master", Arity::Unary),
    ("masterchange", Arity::Unary),
    ("mdiskgrp", Arity::Unary),
    ("name", Arity::Unary),
    ("pool", Arity::Unary),
    ("portset", Arity::Unary),
    ("primary", Arity::Unary),
    ("rsize", Arity::Unary),
    ("scsi", Arity::Unary),
    ("site", Arity::Unary),
    ("size", Arity::Unary),
    ("snapshot", Arity::Unary),
    ("source", Arity::Unary),
    ("target", Arity::Unary),
    ("type", Arity::Unary),
    ("udid", Arity::Unary),
    ("unit", Arity::Unary),
    ("vdisk", Arity::Unary),
    ("volumegroup", Arity::Unary),
    ("warning", Arity::Unary),
    ("wwpn", Arity::Unary),
    ("autodelete", Arity::OptionalUnary),
    ("autoexpand", Arity::OptionalUnary),
];

pub fn arity(flag: &str) -> Option<Arity> {
    FLAGS
        .iter()
        .find(|(name, _)| *name == flag)
        .map(|(_, arity)| *arity)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("Empty command line")]
    EmptyCommand,

    #[error("Unrecognized argument -{0}")]
    UnknownFlag(String),

    #[error("{cmd}: flag -{flag} requires a value")]
    MissingArgument { cmd: String, flag: String },

    #[error("Unexpected operand {operand} after {obj}")]
    ExtraOperand { obj: String, operand: String },
}

/// Value recorded for one flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    Switch,
    Value(String),
}

/// A tokenised command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedCommand {
    pub cmd: String,
    pub obj: Option<String>,
    /// Node id given to `lsnode`.
    pub node_id: Option<String>,
    flags: BTreeMap<String, FlagValue>,
}

impl ParsedCommand {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            ..Default::default()
        }
    }

    pub fn with_obj(mut self, obj: impl Into<String>) -> Self {
        self.obj = Some(obj.into());
        self
    }

    pub fn with_flag(mut self, name: &str, value: impl Into<String>) -> Self {
        self.flags
            .insert(name.to_string(), FlagValue::Value(value.into()));
        self
    }

    pub fn with_switch(mut self, name: &str) -> Self {
        self.flags.insert(name.to_string(), FlagValue::Switch);
        self
    }

    /// True when the flag was given, with or without a value.
    pub fn has(&self, flag: &str) -> bool {
        self.flags.contains_key(flag)
    }

    /// The flag's value; `None` when absent or given as a bare switch.
    pub fn value(&self, flag: &str) -> Option<&str> {
        match self.flags.get(flag) {
            Some(FlagValue::Value(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn obj(&self) -> Option<&str> {
        self.obj.as_deref()
    }

    pub fn flags(&self) -> impl Iterator<Item = (&str, &FlagValue)> {
        self.flags.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn strip_name_quotes(token: &str) -> &str {
    if token.len() >= 2
        && token.starts_with('"')
        && token.ends_with('"')
        && (token.contains("volume") || token.contains("snapshot"))
    {
        &token[1..token.len() - 1]
    } else {
        token
    }
}

/// Tokenise one invocation.
pub fn tokenize<S: AsRef<str>>(tokens: &[S]) -> Result<ParsedCommand, TokenizeError> {
    let mut rest = tokens.iter().map(AsRef::as_ref).peekable();

    let mut verb = rest.next().ok_or(TokenizeError::EmptyCommand)?;
    if verb == "svcinfo" || verb == "svctask" {
        verb = rest.next().ok_or(TokenizeError::EmptyCommand)?;
    }

    let mut parsed = ParsedCommand::new(verb);
    while let Some(token) = rest.next() {
        let token = strip_name_quotes(token);
        match token.strip_prefix('-').filter(|flag| !flag.is_empty()) {
            Some(flag) => {
                let value = match arity(flag) {
                    None => return Err(TokenizeError::UnknownFlag(flag.to_string())),
                    Some(Arity::Nullary) => FlagValue::Switch,
                    Some(Arity::Unary) => match rest.next() {
                        Some(value) => FlagValue::Value(value.to_string()),
                        None => {
                            return Err(TokenizeError::MissingArgument {
                                cmd: parsed.cmd.clone(),
                                flag: flag.to_string(),
                            })
                        }
                    },
                    Some(Arity::OptionalUnary) => match rest.peek() {
                        Some(next) if !next.starts_with('-') => {
                            FlagValue::Value(rest.next().unwrap_or_default().to_string())
                        }
                        _ => FlagValue::Switch,
                    },
                };
                parsed.flags.insert(flag.to_string(), value);
            }
            None => match &parsed.obj {
                Some(obj) => {
                    return Err(TokenizeError::ExtraOperand {
                        obj: obj.clone(),
                        operand: token.to_string(),
                    })
                }
                None => parsed.obj = Some(token.to_string()),
            },
        }
    }

    if parsed.cmd == "lsnode" {
        match parsed.obj.take() {
            Some(node) => parsed.node_id = Some(node),
            None => parsed.cmd = "lsnodecanister".to_string(),
        }
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_prefix_and_flags() {
        let parsed = tokenize(&[
            "svctask", "mkvdisk", "-name", "v1", "-mdiskgrp", "\"openstack\"", "-size", "1",
            "-unit", "gb", "-nofmtdisk",
        ])
        .unwrap();
        assert_eq!(parsed.cmd, "mkvdisk");
        assert_eq!(parsed.value("name"), Some("v1"));
        assert_eq!(parsed.value("mdiskgrp"), Some("\"openstack\""));
        assert!(parsed.has("nofmtdisk"));
        assert_eq!(parsed.value("nofmtdisk"), None);
        assert!(parsed.obj().is_none());
    }

    #[test]
    fn test_obj_and_no_prefix() {
        let parsed = tokenize(&["rmvdisk", "-force", "vol1"]).unwrap();
        assert_eq!(parsed.cmd, "rmvdisk");
        assert_eq!(parsed.obj(), Some("vol1"));
        assert!(parsed.has("force"));
    }

    #[test]
    fn test_optional_unary() {
        let parsed = tokenize(&["chfcmap", "-autodelete", "on", "3"]).unwrap();
        assert_eq!(parsed.value("autodelete"), Some("on"));
        assert_eq!(parsed.obj(), Some("3"));

        let parsed = tokenize(&["mkfcmap", "-autodelete", "-source", "a"]).unwrap();
        assert!(parsed.has("autodelete"));
        assert_eq!(parsed.value("autodelete"), None);

        let parsed = tokenize(&["mkvdisk", "-autoexpand"]).unwrap();
        assert!(parsed.has("autoexpand"));
    }

    #[test]
    fn test_lsnode_rewrite() {
        let parsed = tokenize(&["svcinfo", "lsnode", "-delim", "!"]).unwrap();
        assert_eq!(parsed.cmd, "lsnodecanister");
        assert_eq!(parsed.value("delim"), Some("!"));

        let parsed = tokenize(&["svcinfo", "lsnode", "-delim", "!", "1"]).unwrap();
        assert_eq!(parsed.cmd, "lsnode");
        assert_eq!(parsed.node_id.as_deref(), Some("1"));
        assert!(parsed.obj().is_none());
    }

    #[test]
    fn test_quoted_volume_names_are_stripped() {
        let parsed = tokenize(&["rmvdisk", "\"volume-1234\""]).unwrap();
        assert_eq!(parsed.obj(), Some("volume-1234"));

        let parsed = tokenize(&["rmhost", "\"host1\""]).unwrap();
        assert_eq!(parsed.obj(), Some("\"host1\""));
    }

    #[test]
    fn test_errors() {
        let empty: [&str; 0] = [];
        assert_eq!(tokenize(&empty), Err(TokenizeError::EmptyCommand));
        assert_eq!(tokenize(&["svcinfo"]), Err(TokenizeError::EmptyCommand));
        assert_eq!(
            tokenize(&["lsvdisk", "-bogus"]),
            Err(TokenizeError::UnknownFlag("bogus".into()))
        );
        assert_eq!(
            tokenize(&["mkvdisk", "-size"]),
            Err(TokenizeError::MissingArgument {
                cmd: "mkvdisk".into(),
                flag: "size".into()
            })
        );
        assert!(matches!(
            tokenize(&["rmvdisk", "a", "b"]),
            Err(TokenizeError::ExtraOperand { .. })
        ));
    }

    #[test]
    fn test_flag_table_has_no_duplicates() {
        let mut names: Vec<&str> = FLAGS.iter().map(|(name, _)| *name).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }

    proptest! {
        #[test]
        fn prop_tokenize_never_panics(tokens in proptest::collection::vec("[-a-z0-9\"!=]{0,8}", 0..8)) {
            let _ = tokenize(&tokens);
        }
    }
}
