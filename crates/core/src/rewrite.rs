// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Rewrites script references inside a locust parameter file.
//!
//! Parameter files point at their script with a repository-relative path
//! (`locustfile = locust/load.py`), but the script is materialized flat into the
//! scratch directory. Pointing the directive at the scratch copy lets the load
//! test resolve it regardless of its working directory.

use std::path::Path;

/// Directive naming the script file in a locust parameter file.
pub const SCRIPT_DIRECTIVE: &str = "locustfile";

/// Rewrites every script directive of the file at `conf_path` in place.
///
/// # Errors
///
/// Returns an error if the file cannot be read or written back.
pub async fn rewrite(conf_path: &Path, scratch_dir: &Path) -> std::io::Result<()> {
    let input = tokio::fs::read_to_string(conf_path).await?;
    let output = rewrite_content(&input, scratch_dir);
    if output != input {
        tokio::fs::write(conf_path, output).await?;
        tracing::debug!(conf = %conf_path.display(), "Rewrote script directive");
    }
    Ok(())
}

/// Rewrites script directives in `content`; every other line is kept byte for byte.
pub fn rewrite_content(content: &str, scratch_dir: &Path) -> String {
    content
        .split('\n')
        .map(|line| match script_reference(line) {
            Some(value) => {
                let file_name = value.rsplit('/').next().unwrap_or(value);
                format!("{SCRIPT_DIRECTIVE} = {}", scratch_dir.join(file_name).display())
            },
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Returns the value of a script directive line, if `line` is one.
///
/// Locust reads `key = value`, `key: value` and `key value` alike.
fn script_reference(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix(SCRIPT_DIRECTIVE)?;
    let separated = rest.trim_start();
    let value = match separated.strip_prefix(['=', ':']) {
        Some(value) => value,
        None if separated.len() < rest.len() => separated,
        None => return None,
    };
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrites_directive_to_scratch_dir() {
        let out = rewrite_content("locustfile = repo/path/script.py", Path::new("/tmp/abc"));
        assert_eq!(out, "locustfile = /tmp/abc/script.py");
    }

    #[test]
    fn test_unrelated_lines_are_untouched() {
        let input = "host = http://ignored\r\nlocustfile = locust/load.py\nusers = 5\n\n\
                     # locustfile is set above\nlocustfile_dir = locust\n";
        let out = rewrite_content(input, Path::new("/tmp/abc"));

        let before: Vec<&str> = input.split('\n').collect();
        let after: Vec<&str> = out.split('\n').collect();
        assert_eq!(before.len(), after.len());
        for (i, (b, a)) in before.iter().zip(&after).enumerate() {
            if i == 1 {
                assert_eq!(*a, "locustfile = /tmp/abc/load.py");
            } else {
                assert_eq!(b, a);
            }
        }
    }

    #[test]
    fn test_plain_file_name_and_odd_spacing() {
        let out = rewrite_content("  locustfile=load.py  ", Path::new("/tmp/abc"));
        assert_eq!(out, "locustfile = /tmp/abc/load.py");
    }

    #[test]
    fn test_colon_and_space_separated_directives() {
        let out = rewrite_content("locustfile: locust/load.py\nusers = 5", Path::new("/tmp/abc"));
        assert_eq!(out, "locustfile = /tmp/abc/load.py\nusers = 5");

        let out = rewrite_content("locustfile   locust/load.py", Path::new("/tmp/abc"));
        assert_eq!(out, "locustfile = /tmp/abc/load.py");
    }

    #[test]
    fn test_directive_without_value_is_untouched() {
        for line in ["locustfile =", "locustfile:", "locustfile"] {
            assert_eq!(rewrite_content(line, Path::new("/tmp/abc")), line);
        }
    }

    #[tokio::test]
    async fn test_rewrite_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("load.conf");
        std::fs::write(&conf, "users = 10\nlocustfile = locust/load.py\n").unwrap();

        rewrite(&conf, dir.path()).await.unwrap();

        let expected =
            format!("users = 10\nlocustfile = {}\n", dir.path().join("load.py").display());
        assert_eq!(std::fs::read_to_string(&conf).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_rewrite_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(rewrite(&dir.path().join("missing.conf"), dir.path()).await.is_err());
    }
}
