use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

use crate::error::{StoreError, StoreResult};

/// A single store mutation, as queued in a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Set { key: String, value: Bytes },
    Append { key: String, value: Bytes },
    Rename { src: String, dst: String },
    Del { key: String },
}

/// Outcome of an applied [`Command`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// The command succeeded with no payload.
    Ok,
    /// New length after an append.
    Length(u64),
    /// Whether a deleted key existed.
    Deleted(bool),
}

impl Command {
    /// Apply this command to a key space.
    pub(crate) fn apply(&self, data: &mut HashMap<String, Vec<u8>>) -> StoreResult<Reply> {
        match self {
            Command::Set { key, value } => {
                data.insert(key.clone(), value.to_vec());
                Ok(Reply::Ok)
            }
            Command::Append { key, value } => {
                let entry = data.entry(key.clone()).or_default();
                entry.extend_from_slice(value);
                Ok(Reply::Length(entry.len() as u64))
            }
            Command::Rename { src, dst } => {
                let value = data
                    .remove(src)
                    .ok_or_else(|| StoreError::NoSuchKey(src.clone()))?;
                data.insert(dst.clone(), value);
                Ok(Reply::Ok)
            }
            Command::Del { key } => Ok(Reply::Deleted(data.remove(key).is_some())),
        }
    }

    /// Short command name, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Set { .. } => "SET",
            Command::Append { .. } => "APPEND",
            Command::Rename { .. } => "RENAME",
            Command::Del { .. } => "DEL",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Set { key, value } => write!(f, "SET {key} ({} bytes)", value.len()),
            Command::Append { key, value } => write!(f, "APPEND {key} ({} bytes)", value.len()),
            Command::Rename { src, dst } => write!(f, "RENAME {src} {dst}"),
            Command::Del { key } => write!(f, "DEL {key}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_creates_and_extends() {
        let mut data = HashMap::new();
        let cmd = Command::Append {
            key: "k".into(),
            value: Bytes::from_static(b"ab"),
        };
        assert_eq!(cmd.apply(&mut data).unwrap(), Reply::Length(2));
        assert_eq!(cmd.apply(&mut data).unwrap(), Reply::Length(4));
        assert_eq!(data["k"], b"abab");
    }

    #[test]
    fn rename_overwrites_destination() {
        let mut data = HashMap::new();
        data.insert("src".to_string(), b"new".to_vec());
        data.insert("dst".to_string(), b"old".to_vec());

        let cmd = Command::Rename {
            src: "src".into(),
            dst: "dst".into(),
        };
        assert_eq!(cmd.apply(&mut data).unwrap(), Reply::Ok);
        assert_eq!(data["dst"], b"new");
        assert!(!data.contains_key("src"));
    }

    #[test]
    fn rename_missing_source_fails() {
        let mut data = HashMap::new();
        let cmd = Command::Rename {
            src: "gone".into(),
            dst: "dst".into(),
        };
        assert_eq!(
            cmd.apply(&mut data).unwrap_err(),
            StoreError::NoSuchKey("gone".into())
        );
        assert!(data.is_empty());
    }

    #[test]
    fn display_and_name() {
        let cmd = Command::Set {
            key: "k".into(),
            value: Bytes::from_static(b"xyz"),
        };
        assert_eq!(cmd.name(), "SET");
        assert_eq!(cmd.to_string(), "SET k (3 bytes)");
        assert_eq!(Command::Del { key: "k".into() }.to_string(), "DEL k");
    }
}
