//! Migration file discovery, version normalization, and checksums.

use super::types::{ChecksumAlgorithm, Migration, MigrationConfig};
use chrono::Utc;
use md5::Md5;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Accepts both the 6-digit ordinal form (000001) and the 14-digit
/// timestamp form (YYYYMMDDHHMMSS).
static FILE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{6}|\d{14})_([a-zA-Z0-9_]+)\.(up|down)\.sql$").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("invalid migration filename: {0}")]
    InvalidFilename(String),

    #[error("DOWN file required but missing: {0}")]
    MissingDownFile(String),

    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Read and sort every migration pair under the configured directory.
pub fn load_from_disk(config: &MigrationConfig) -> Result<Vec<Migration>, FileError> {
    let dir = &config.migrations_path;
    if !dir.exists() {
        tracing::warn!(path = %dir.display(), "migrations directory does not exist");
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir).map_err(|source| FileError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut migrations = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name.ends_with(".up.sql") {
            continue;
        }

        match parse_migration_file(&path, config) {
            Ok(migration) => migrations.push(migration),
            Err(err) => {
                if config.require_down_files {
                    return Err(err);
                }
                tracing::warn!(file = file_name, error = %err, "skipping unparseable migration file");
            }
        }
    }

    migrations.sort_by_key(|m| m.version);

    if config.verbose {
        tracing::info!(count = migrations.len(), "migration files loaded");
    }
    Ok(migrations)
}

fn parse_migration_file(up_path: &Path, config: &MigrationConfig) -> Result<Migration, FileError> {
    let file_name = up_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let captures = FILE_PATTERN
        .captures(file_name)
        .ok_or_else(|| FileError::InvalidFilename(file_name.to_string()))?;

    let version_str = &captures[1];
    let version = normalize_version(version_str);
    let name = title_case(&captures[2].replace('_', " "));

    let up_sql = fs::read_to_string(up_path).map_err(|source| FileError::Io {
        path: up_path.display().to_string(),
        source,
    })?;
    let up_file_size = up_sql.len() as i64;

    let down_path = up_path
        .to_str()
        .map(|p| p.replace(".up.sql", ".down.sql"))
        .unwrap_or_default();
    let down_path = Path::new(&down_path);

    let (down_sql, has_down_file) = match fs::read_to_string(down_path) {
        Ok(content) => (content, true),
        Err(_) => (String::new(), false),
    };

    if config.require_down_files && !has_down_file {
        return Err(FileError::MissingDownFile(down_path.display().to_string()));
    }

    let up_checksum = checksum(&up_sql, config.checksum_algorithm);
    let down_checksum = if has_down_file {
        checksum(&down_sql, config.checksum_algorithm)
    } else {
        String::new()
    };
    let description = extract_description(&up_sql);
    let down_file_size = down_sql.len() as i64;

    Ok(Migration {
        version,
        name,
        up_sql,
        down_sql,
        applied: false,
        applied_at: None,
        up_checksum,
        down_checksum,
        up_file_size,
        down_file_size,
        description,
        has_down_file,
    })
}

/// Lift a 6-digit ordinal into the 14-digit space by prefixing today's
/// date: 000001 -> YYYYMMDD000001. 14-digit versions pass through.
pub fn normalize_version(version: &str) -> i64 {
    if version.len() == 6 {
        let today = Utc::now().format("%Y%m%d");
        format!("{today}{version}").parse().unwrap_or(0)
    } else {
        version.parse().unwrap_or(0)
    }
}

pub fn checksum(content: &str, algorithm: ChecksumAlgorithm) -> String {
    match algorithm {
        ChecksumAlgorithm::Md5 => {
            let mut hasher = Md5::new();
            hasher.update(content.as_bytes());
            hex::encode(hasher.finalize())
        }
        ChecksumAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(content.as_bytes());
            hex::encode(hasher.finalize())
        }
    }
}

/// First meaningful `--` header line, with the `Migration:` /
/// `Description:` markers stripped.
fn extract_description(sql: &str) -> String {
    for line in sql.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix("--") {
            let text = comment
                .trim()
                .trim_start_matches("Migration:")
                .trim_start_matches("Description:")
                .trim();
            if !text.is_empty() && !text.starts_with("Version:") {
                return text.to_string();
            }
        } else {
            break;
        }
    }
    String::new()
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_pattern() {
        assert!(FILE_PATTERN.is_match("000001_create_users.up.sql"));
        assert!(FILE_PATTERN.is_match("20250101000001_create_users.up.sql"));
        assert!(FILE_PATTERN.is_match("20250101000001_create_users.down.sql"));

        assert!(!FILE_PATTERN.is_match("0001_short.up.sql"));
        assert!(!FILE_PATTERN.is_match("20250101000001-dashes.up.sql"));
        assert!(!FILE_PATTERN.is_match("create_users.up.sql"));
        assert!(!FILE_PATTERN.is_match("20250101000001_x.sql"));
    }

    #[test]
    fn test_normalize_version() {
        assert_eq!(
            normalize_version("20250101000001"),
            20_250_101_000_001_i64
        );

        let normalized = normalize_version("000099");
        let today: i64 = Utc::now().format("%Y%m%d").to_string().parse().unwrap();
        assert_eq!(normalized, today * 1_000_000 + 99);
    }

    #[test]
    fn test_checksum_algorithms_differ_and_are_stable() {
        let content = "CREATE TABLE t(id INT);";
        let sha = checksum(content, ChecksumAlgorithm::Sha256);
        let md5 = checksum(content, ChecksumAlgorithm::Md5);

        assert_eq!(sha.len(), 64);
        assert_eq!(md5.len(), 32);
        assert_eq!(sha, checksum(content, ChecksumAlgorithm::Sha256));
        assert_ne!(
            sha,
            checksum("CREATE TABLE t(id INT); ", ChecksumAlgorithm::Sha256)
        );
    }

    #[test]
    fn test_extract_description() {
        let sql = "-- Migration: create users table\n-- Description: detail\nCREATE TABLE u;";
        assert_eq!(extract_description(sql), "create users table");

        let sql = "\n\n-- Description: only detail\nSELECT 1;";
        assert_eq!(extract_description(sql), "only detail");

        assert_eq!(extract_description("CREATE TABLE t;"), "");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("create users table"), "Create Users Table");
        assert_eq!(title_case("add_index".replace('_', " ").as_str()), "Add Index");
    }

    #[test]
    fn test_load_from_disk_sorts_and_checksums() {
        let dir = std::env::temp_dir().join(format!("paygate-mig-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        fs::write(
            dir.join("20250102000001_second.up.sql"),
            "CREATE TABLE b(id INT);",
        )
        .unwrap();
        fs::write(
            dir.join("20250101000001_first.up.sql"),
            "-- Migration: first table\nCREATE TABLE a(id INT);",
        )
        .unwrap();
        fs::write(dir.join("20250101000001_first.down.sql"), "DROP TABLE a;").unwrap();

        let config = MigrationConfig {
            migrations_path: dir.clone(),
            ..Default::default()
        };
        let migrations = load_from_disk(&config).unwrap();

        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].name, "First");
        assert!(migrations[0].has_down_file);
        assert!(!migrations[0].up_checksum.is_empty());
        assert_eq!(migrations[0].description, "first table");
        assert_eq!(migrations[1].name, "Second");
        assert!(!migrations[1].has_down_file);
        assert!(migrations[0].version < migrations[1].version);

        fs::remove_dir_all(&dir).unwrap();
    }
}
