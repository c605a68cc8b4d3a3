use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::Config;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub created_at: String,
}

fn session_path() -> Result<PathBuf> {
    Ok(Config::config_dir()?.join("session.json"))
}

pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn save_session_at(path: &Path, session: &Session) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
            }
        }
    }
    let json = serde_json::to_string_pretty(session)?;
    fs::write(path, json)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

fn load_session_at(path: &Path) -> Option<Session> {
    if !path.exists() {
        return None;
    }
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

pub fn load_session() -> Option<Session> {
    session_path().ok().and_then(|p| load_session_at(&p))
}

pub fn clear_session() -> Result<bool> {
    let path = session_path()?;
    if path.exists() {
        fs::remove_file(path)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Gate for every report command and the TUI.
pub fn require() -> Result<Session> {
    load_session().context("not logged in, run 'salescope login' first")
}

pub fn login(config: &Config) -> Result<()> {
    use colored::Colorize;

    if let Some(session) = load_session() {
        println!(
            "\n  {}",
            format!("Already logged in as {}", session.username.bold()).yellow()
        );
        println!("{}", "  Run 'salescope logout' to sign out first.\n".bright_black());
        return Ok(());
    }

    println!("\n  {}\n", "Salescope - Login".cyan());

    print!("  Username: ");
    std::io::stdout().flush()?;
    let mut username = String::new();
    std::io::stdin().read_line(&mut username)?;
    let username = username.trim();

    let password = rpassword::prompt_password("  Password: ")?;

    if username != config.operator.username
        || !sha256_hex(&password).eq_ignore_ascii_case(&config.operator.password_sha256)
    {
        anyhow::bail!("invalid username or password");
    }

    let session = Session {
        username: username.to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    save_session_at(&session_path()?, &session)?;

    println!(
        "\n  {}\n",
        format!("Success! Logged in as {}", username.bold()).green()
    );
    Ok(())
}

pub fn logout() -> Result<()> {
    use colored::Colorize;

    let session = match load_session() {
        Some(s) => s,
        None => {
            println!("\n  {}\n", "Not logged in.".yellow());
            return Ok(());
        }
    };

    if clear_session()? {
        println!(
            "\n  {}\n",
            format!("Logged out from {}", session.username.bold()).green()
        );
    } else {
        anyhow::bail!("failed to clear session");
    }
    Ok(())
}

pub fn whoami() -> Result<()> {
    use colored::Colorize;

    let session = match load_session() {
        Some(s) => s,
        None => {
            println!("\n  {}", "Not logged in.".yellow());
            println!("{}", "  Run 'salescope login' to authenticate.\n".bright_black());
            return Ok(());
        }
    };

    println!("\n  {}\n", "Salescope - Account Info".cyan());
    println!("{}", format!("  Username:  {}", session.username.bold()).white());
    if let Ok(created) = chrono::DateTime::parse_from_rfc3339(&session.created_at) {
        println!(
            "{}",
            format!("  Logged in: {}", created.format("%Y-%m-%d")).bright_black()
        );
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sha256_hex_matches_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn session_round_trips_on_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/session.json");
        let session = Session {
            username: "admin".to_string(),
            created_at: "2025-08-01T00:00:00+00:00".to_string(),
        };

        save_session_at(&path, &session).unwrap();
        let loaded = load_session_at(&path).unwrap();
        assert_eq!(loaded.username, "admin");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn missing_session_file_loads_as_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load_session_at(&tmp.path().join("absent.json")).is_none());
    }
}
