//! Permission levels for Starlight operations

use serde::{Deserialize, Serialize};
use std::fmt;

/// Permission levels granted in a session token
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum PermissionLevel {
    /// Regular player
    #[default]
    Player = 0,
    /// Star and quest authoring
    Admin = 1,
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionLevel::Player => write!(f, "PLAYER"),
            PermissionLevel::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Check if a granted level satisfies the required one
pub fn is_allowed(granted: PermissionLevel, required: PermissionLevel) -> bool {
    granted >= required
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(is_allowed(PermissionLevel::Admin, PermissionLevel::Player));
        assert!(is_allowed(PermissionLevel::Player, PermissionLevel::Player));
        assert!(!is_allowed(PermissionLevel::Player, PermissionLevel::Admin));
    }

    #[test]
    fn test_serde_uppercase() {
        let json = serde_json::to_string(&PermissionLevel::Admin).unwrap();
        assert_eq!(json, "\"ADMIN\"");
    }
}
