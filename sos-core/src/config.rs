//! Configuration-file loading for the blob-server registry.
//!
//! The list of blob-servers is read from `/etc/sos.conf` plus
//! `~/.sos.conf`. The simple form is a literal list of servers:
//!
//! ```text
//! http://node1.example.com:3333/
//! http://node2.example.com:3333/
//! ```
//!
//! Past a couple of servers the file becomes an INI file, one section per
//! logical group of blob-servers:
//!
//! ```text
//! [1]
//! http://node1.example.com:1234/
//! http://mirror1-1.example.com:1234/
//!
//! [2]
//! http://node2.example.com:1234/
//! ```
//!
//! Any line containing `[` flips the whole file into INI mode. A missing
//! file is silently skipped; a malformed INI header is the one fatal
//! configuration error.

use crate::registry::ServerRegistry;
use crate::{Result, SosError};
use std::path::Path;

/// The implicit group for servers configured without one.
pub const DEFAULT_GROUP: &str = "default";

/// Populate `registry` from the standard config-file locations.
pub fn init_servers(registry: &mut ServerRegistry) -> Result<()> {
    load_file(registry, Path::new("/etc/sos.conf"))?;
    if let Some(home) = dirs::home_dir() {
        load_file(registry, &home.join(".sos.conf"))?;
    }
    Ok(())
}

/// Load one config file into `registry`. A file that cannot be read is
/// skipped; later files append to whatever was loaded before.
pub fn load_file(registry: &mut ServerRegistry, path: &Path) -> Result<()> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) => {
            tracing::debug!(path = %path.display(), %error, "skipping unreadable config file");
            return Ok(());
        }
    };

    for (group, location) in parse_servers(&contents)? {
        registry.add_server(group, location);
    }
    Ok(())
}

/// Parse a config file into `(group, location)` pairs.
fn parse_servers(contents: &str) -> Result<Vec<(String, String)>> {
    if contents.lines().any(|line| line.contains('[')) {
        parse_ini(contents)
    } else {
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("http"))
            .map(|line| (DEFAULT_GROUP.to_string(), line.to_string()))
            .collect())
    }
}

fn parse_ini(contents: &str) -> Result<Vec<(String, String)>> {
    let mut entries = Vec::new();
    let mut section: Option<String> = None;

    for (number, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.contains('[') {
            let name = line
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
                .filter(|name| !name.is_empty() && !name.contains('[') && !name.contains(']'))
                .ok_or_else(|| {
                    SosError::Config(format!(
                        "malformed section header on line {}: {}",
                        number + 1,
                        raw
                    ))
                })?;
            section = Some(name.to_string());
            continue;
        }

        match &section {
            // Entries before any section header, and the DEFAULT section,
            // are ignored.
            Some(name) if name != "DEFAULT" => entries.push((name.clone(), line.to_string())),
            _ => {}
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(contents: &str) -> Vec<(String, String)> {
        parse_servers(contents).unwrap()
    }

    #[test]
    fn flat_lines_join_the_default_group() {
        let entries = parsed(
            "http://node1.example.com:3333/\n\
             # a comment\n\
             http://node2.example.com:3333/\n",
        );

        assert_eq!(
            entries,
            vec![
                ("default".to_string(), "http://node1.example.com:3333/".to_string()),
                ("default".to_string(), "http://node2.example.com:3333/".to_string()),
            ]
        );
    }

    #[test]
    fn non_url_lines_are_ignored_in_flat_mode() {
        let entries = parsed("hello\nhttp://node1.example.com:3333/\n\n");
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn a_bracket_flips_the_file_to_ini() {
        let entries = parsed(
            "[1]\n\
             http://node1.example.com:1234/\n\
             http://mirror1-1.example.com:1234/\n\
             \n\
             [2]\n\
             http://node2.example.com:1234/\n",
        );

        assert_eq!(
            entries,
            vec![
                ("1".to_string(), "http://node1.example.com:1234/".to_string()),
                ("1".to_string(), "http://mirror1-1.example.com:1234/".to_string()),
                ("2".to_string(), "http://node2.example.com:1234/".to_string()),
            ]
        );
    }

    #[test]
    fn default_section_is_ignored() {
        let entries = parsed(
            "[DEFAULT]\n\
             http://ignored.example.com:1/\n\
             [live]\n\
             http://node1.example.com:1234/\n",
        );

        assert_eq!(
            entries,
            vec![("live".to_string(), "http://node1.example.com:1234/".to_string())]
        );
    }

    #[test]
    fn entries_before_the_first_section_are_ignored() {
        let entries = parsed(
            "http://orphan.example.com:1/\n\
             [live]\n\
             http://node1.example.com:1234/\n",
        );

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "live");
    }

    #[test]
    fn malformed_section_header_is_an_error() {
        assert!(parse_servers("[unclosed\nhttp://a.example.com/\n").is_err());
        assert!(parse_servers("[]\n").is_err());
    }

    #[test]
    fn missing_file_is_silently_skipped() {
        let mut registry = ServerRegistry::new();
        load_file(&mut registry, Path::new("/nonexistent/sos.conf")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn loaded_entries_land_in_the_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sos.conf");
        std::fs::write(&path, "http://node1.example.com:3333/\n").unwrap();

        let mut registry = ServerRegistry::new();
        load_file(&mut registry, &path).unwrap();

        assert_eq!(registry.servers().len(), 1);
        assert_eq!(registry.servers()[0].group, "default");
        assert_eq!(registry.servers()[0].location, "http://node1.example.com:3333");
    }
}
