//! Role-based authorization rules.
//!
//! Access restrictions are loaded from a JSON rules file with two lists:
//! `paths` maps logical path prefixes to the roles required to access
//! them, `addresses` maps client address prefixes to the roles a client
//! holds just by connecting from there. The pseudo-role `ALL` on an
//! address grants everything.
//!
//! ```json
//! {
//!   "paths": [
//!     { "path": "archive/restricted", "roles": ["staff"] }
//!   ],
//!   "addresses": [
//!     { "ip": "10.0", "roles": ["staff"] },
//!     { "ip": "127.0.0.1", "roles": ["ALL"] }
//!   ]
//! }
//! ```
//!
//! Matching is by longest prefix on whole segments: `/` for paths, `.`
//! for addresses.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// The role that disables checking for an address.
const ROLE_ALL: &str = "ALL";

/// Errors loading the rules file.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("cannot read auth rules {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse auth rules {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct PathRule {
    path: String,
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AddressRule {
    ip: String,
    roles: Vec<String>,
}

/// Authorization rules: path requirements and address grants.
#[derive(Debug, Default, Deserialize)]
pub struct AuthRules {
    #[serde(default)]
    paths: Vec<PathRule>,

    #[serde(default)]
    addresses: Vec<AddressRule>,
}

impl AuthRules {
    /// Load rules from a JSON file.
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let raw = fs::read_to_string(path).map_err(|source| AuthError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let rules: AuthRules =
            serde_json::from_str(&raw).map_err(|source| AuthError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        debug!(
            "loaded {} path rules and {} address rules from {}",
            rules.paths.len(),
            rules.addresses.len(),
            path.display()
        );
        Ok(rules)
    }

    /// Roles still required to access a path from a client address.
    ///
    /// `None` means the request is free to proceed: the path is
    /// unrestricted, the address holds `ALL`, or one of the address's
    /// roles already satisfies the requirement. `Some(roles)` lists the
    /// unsatisfied requirement.
    pub fn roles_for_path(&self, path: &str, client: &str) -> Option<Vec<String>> {
        let provided = self.match_address(client);
        if let Some(provided) = &provided {
            if provided.iter().any(|r| r == ROLE_ALL) {
                return None;
            }
        }
        let required = self.match_path(path)?;
        if let Some(provided) = &provided {
            if provided.iter().any(|p| required.contains(p)) {
                return None;
            }
        }
        Some(required)
    }

    /// True if one of `held` satisfies `required`.
    pub fn is_authorized(required: &[String], held: &[String]) -> bool {
        held.iter().any(|r| required.contains(r))
    }

    fn match_path(&self, path: &str) -> Option<Vec<String>> {
        longest_prefix_match(
            self.paths.iter().map(|r| (r.path.as_str(), &r.roles)),
            path.trim_matches('/'),
            '/',
        )
    }

    fn match_address(&self, client: &str) -> Option<Vec<String>> {
        longest_prefix_match(
            self.addresses.iter().map(|r| (r.ip.as_str(), &r.roles)),
            client,
            '.',
        )
    }
}

/// The roles of the rule whose segment prefix matches `target` with the
/// most segments.
fn longest_prefix_match<'a>(
    rules: impl Iterator<Item = (&'a str, &'a Vec<String>)>,
    target: &str,
    sep: char,
) -> Option<Vec<String>> {
    let target_segments: Vec<&str> = target.split(sep).collect();
    let mut best: Option<(usize, &Vec<String>)> = None;
    for (prefix, roles) in rules {
        let prefix_segments: Vec<&str> = prefix.trim_matches(sep).split(sep).collect();
        if prefix_segments.len() > target_segments.len() {
            continue;
        }
        if prefix_segments
            .iter()
            .zip(&target_segments)
            .all(|(a, b)| a == b)
            && best.map(|(n, _)| prefix_segments.len() > n).unwrap_or(true)
        {
            best = Some((prefix_segments.len(), roles));
        }
    }
    best.map(|(_, roles)| roles.clone())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> AuthRules {
        serde_json::from_str(
            r#"{
                "paths": [
                    { "path": "archive/restricted", "roles": ["staff"] },
                    { "path": "archive/restricted/secret", "roles": ["admin"] }
                ],
                "addresses": [
                    { "ip": "10.0", "roles": ["staff"] },
                    { "ip": "127.0.0.1", "roles": ["ALL"] }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_unrestricted_path_is_free() {
        let rules = rules();
        assert_eq!(rules.roles_for_path("public/p001", "192.168.0.1"), None);
    }

    #[test]
    fn test_restricted_path_requires_roles() {
        let rules = rules();
        let required = rules
            .roles_for_path("archive/restricted/book", "192.168.0.1")
            .unwrap();
        assert_eq!(required, vec!["staff".to_string()]);
    }

    #[test]
    fn test_most_specific_path_rule_wins() {
        let rules = rules();
        let required = rules
            .roles_for_path("archive/restricted/secret/p1", "192.168.0.1")
            .unwrap();
        assert_eq!(required, vec!["admin".to_string()]);
    }

    #[test]
    fn test_address_role_satisfies_requirement() {
        let rules = rules();
        assert_eq!(
            rules.roles_for_path("archive/restricted/book", "10.0.3.7"),
            None
        );
        // but not a requirement it does not hold
        assert!(rules
            .roles_for_path("archive/restricted/secret/p1", "10.0.3.7")
            .is_some());
    }

    #[test]
    fn test_all_role_disables_checking() {
        let rules = rules();
        assert_eq!(
            rules.roles_for_path("archive/restricted/secret/p1", "127.0.0.1"),
            None
        );
    }

    #[test]
    fn test_prefix_matches_whole_segments_only() {
        let rules = rules();
        // "archive/restrictedX" is not under "archive/restricted"
        assert_eq!(rules.roles_for_path("archive/restrictedX", "1.2.3.4"), None);
    }

    #[test]
    fn test_is_authorized() {
        let required = vec!["staff".to_string(), "admin".to_string()];
        assert!(AuthRules::is_authorized(&required, &["admin".to_string()]));
        assert!(!AuthRules::is_authorized(&required, &["guest".to_string()]));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = AuthRules::load(Path::new("/nonexistent/rules.json")).unwrap_err();
        assert!(matches!(err, AuthError::Io { .. }));
    }

    #[test]
    fn test_load_bad_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        fs::write(&path, "{not json").unwrap();
        let err = AuthRules::load(&path).unwrap_err();
        assert!(matches!(err, AuthError::Parse { .. }));
    }
}
