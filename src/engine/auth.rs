//! Registry credentials.
//!
//! Credentials are read from the Docker client configuration
//! (`$DOCKER_CONFIG/config.json`, else `~/.docker/config.json`):
//!
//! ```json
//! { "auths": { "https://index.docker.io/v1/": { "auth": "dXNlcjpwYXNz" } } }
//! ```

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default registry server.
pub const DOCKER_HUB: &str = "https://index.docker.io/v1/";

/// Credentials for one registry.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub server: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct DockerConfigFile {
    #[serde(default)]
    auths: BTreeMap<String, AuthEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthEntry {
    auth: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

/// Registry server for a repository user.
///
/// A user that looks like a host (contains `.` or `:`, or is `localhost`)
/// names its own registry; anything else is on Docker Hub.
pub fn registry_for(user: &str) -> String {
    let host = user.split('/').next().unwrap_or(user);
    if host.contains('.') || host.contains(':') || host == "localhost" {
        host.to_string()
    } else {
        DOCKER_HUB.to_string()
    }
}

/// Location of the Docker client configuration.
pub fn docker_config_path() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("DOCKER_CONFIG") {
        return Some(PathBuf::from(dir).join("config.json"));
    }
    dirs::home_dir().map(|home| home.join(".docker").join("config.json"))
}

/// Load credentials for `server` from a Docker client config file.
///
/// Returns `Ok(None)` when the file or the server entry is missing.
pub fn load_credentials(path: &Path, server: &str) -> Result<Option<Credentials>> {
    if !path.is_file() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    let config: DockerConfigFile =
        serde_json::from_str(&content).map_err(|e| Error::ConfigParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let Some((key, entry)) = config
        .auths
        .iter()
        .find(|(key, _)| same_server(key, server))
    else {
        return Ok(None);
    };

    if let (Some(username), Some(password)) = (&entry.username, &entry.password) {
        return Ok(Some(Credentials {
            server: key.clone(),
            username: username.clone(),
            password: password.clone(),
        }));
    }

    let Some(auth) = &entry.auth else {
        return Ok(None);
    };

    let decoded = BASE64_STANDARD
        .decode(auth.trim())
        .map_err(|e| Error::ConfigParseError {
            path: path.to_path_buf(),
            message: format!("invalid auth for {}: {}", key, e),
        })?;
    let decoded = String::from_utf8_lossy(&decoded);
    let Some((username, password)) = decoded.split_once(':') else {
        return Err(Error::ConfigParseError {
            path: path.to_path_buf(),
            message: format!("auth for {} is not user:password", key),
        });
    };

    Ok(Some(Credentials {
        server: key.clone(),
        username: username.to_string(),
        password: password.to_string(),
    }))
}

fn same_server(key: &str, server: &str) -> bool {
    key == server || host_of(key) == host_of(server)
}

fn host_of(server: &str) -> &str {
    let without_scheme = server
        .strip_prefix("https://")
        .or_else(|| server.strip_prefix("http://"))
        .unwrap_or(server);
    without_scheme.split('/').next().unwrap_or(without_scheme)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(temp: &TempDir, content: &str) -> PathBuf {
        let path = temp.path().join("config.json");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn registry_for_plain_user_is_docker_hub() {
        assert_eq!(registry_for("acme"), DOCKER_HUB);
    }

    #[test]
    fn registry_for_host_user() {
        assert_eq!(registry_for("quay.io"), "quay.io");
        assert_eq!(registry_for("localhost:5000"), "localhost:5000");
        assert_eq!(registry_for("localhost"), "localhost");
    }

    #[test]
    fn decodes_base64_auth() {
        let temp = TempDir::new().unwrap();
        // "jane:hunter2"
        let path = write_config(
            &temp,
            r#"{"auths": {"https://index.docker.io/v1/": {"auth": "amFuZTpodW50ZXIy"}}}"#,
        );

        let creds = load_credentials(&path, DOCKER_HUB).unwrap().unwrap();
        assert_eq!(creds.username, "jane");
        assert_eq!(creds.password, "hunter2");
        assert_eq!(creds.server, DOCKER_HUB);
    }

    #[test]
    fn matches_server_by_host() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            r#"{"auths": {"quay.io": {"username": "bot", "password": "token"}}}"#,
        );

        let creds = load_credentials(&path, "https://quay.io/v2/").unwrap().unwrap();
        assert_eq!(creds.username, "bot");
    }

    #[test]
    fn missing_file_or_entry_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(load_credentials(&temp.path().join("nope.json"), DOCKER_HUB)
            .unwrap()
            .is_none());

        let path = write_config(&temp, r#"{"credsStore": "desktop"}"#);
        assert!(load_credentials(&path, DOCKER_HUB).unwrap().is_none());
    }

    #[test]
    fn malformed_auth_is_an_error() {
        let temp = TempDir::new().unwrap();
        // "nocolon"
        let path = write_config(&temp, r#"{"auths": {"quay.io": {"auth": "bm9jb2xvbg=="}}}"#);
        assert!(load_credentials(&path, "quay.io").is_err());
    }

    #[test]
    fn debug_hides_password() {
        let creds = Credentials {
            server: DOCKER_HUB.into(),
            username: "jane".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
