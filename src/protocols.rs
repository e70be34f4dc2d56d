//! Wire types for the PATCH command surface.
//!
//! PATCH requests carry a JSON body naming a server-side command and,
//! for two-path operations, the URL path of the second operand.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchRequest {
    pub command: PatchCommand,
    #[serde(rename = "otherPath", default, skip_serializing_if = "Option::is_none")]
    pub other_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchCommand {
    /// Is-directory probe; responds "1" for directories, "" otherwise
    #[serde(rename = "-d")]
    IsDir,
    #[serde(rename = "mv")]
    Move,
    #[serde(rename = "cp")]
    Copy,
    #[serde(rename = "zip")]
    Zip,
    #[serde(rename = "unzip")]
    Unzip,
    #[serde(rename = "ls")]
    List,
    #[serde(rename = "mkdir")]
    MkDir,
    #[serde(rename = "md5")]
    Md5,
    #[serde(rename = "sha256")]
    Sha256,
}

impl PatchCommand {
    /// Two-path commands require `otherPath` and lock both paths
    /// atomically.
    pub fn needs_other_path(&self) -> bool {
        matches!(
            self,
            PatchCommand::Move | PatchCommand::Copy | PatchCommand::Zip | PatchCommand::Unzip
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_path_command() {
        let body: PatchRequest =
            serde_json::from_str(r#"{"command": "mv", "otherPath": "/files/new"}"#).unwrap();
        assert_eq!(body.command, PatchCommand::Move);
        assert_eq!(body.other_path.as_deref(), Some("/files/new"));
        assert!(body.command.needs_other_path());
    }

    #[test]
    fn test_parse_single_path_command() {
        let body: PatchRequest = serde_json::from_str(r#"{"command": "-d"}"#).unwrap();
        assert_eq!(body.command, PatchCommand::IsDir);
        assert!(body.other_path.is_none());
        assert!(!body.command.needs_other_path());
    }

    #[test]
    fn test_unknown_command_rejected() {
        let result = serde_json::from_str::<PatchRequest>(r#"{"command": "chmod"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_hash_commands_are_single_path() {
        for raw in ["md5", "sha256", "ls", "mkdir"] {
            let body: PatchRequest =
                serde_json::from_str(&format!(r#"{{"command": "{raw}"}}"#)).unwrap();
            assert!(!body.command.needs_other_path());
        }
    }
}
