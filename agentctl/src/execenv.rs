//! Execution environment overrides
//!
//! Assembles the optional environment block attached to a submission:
//! variables from an env file merged with `--env` flags (flags win), a
//! validated working directory, secret names, and a timeout.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use controlplane::entities::ExecutionEnvironmentOverride;

use crate::error::{CliError, CliResult};

/// Raw override inputs gathered from CLI flags
#[derive(Debug, Clone, Default)]
pub struct ExecEnvArgs {
    pub env_vars: Vec<String>,
    pub env_file: Option<PathBuf>,
    pub working_dir: Option<String>,
    pub secrets: Vec<String>,
    pub timeout_seconds: Option<u64>,
}

/// Build the submission override; `None` when nothing was requested
pub fn build_override(args: &ExecEnvArgs) -> CliResult<Option<ExecutionEnvironmentOverride>> {
    if args.env_vars.is_empty()
        && args.env_file.is_none()
        && args.working_dir.is_none()
        && args.secrets.is_empty()
        && args.timeout_seconds.is_none()
    {
        return Ok(None);
    }

    let mut env = ExecutionEnvironmentOverride::default();

    let mut merged = HashMap::new();
    if let Some(path) = &args.env_file {
        merged.extend(load_env_file(path)?);
    }
    for pair in &args.env_vars {
        let (key, value) = parse_env_var(pair)?;
        // CLI flags win over the env file
        merged.insert(key, value);
    }
    if !merged.is_empty() {
        env.env_vars = Some(merged);
    }

    if let Some(dir) = &args.working_dir {
        validate_working_dir(dir)?;
        env.working_dir = Some(dir.clone());
    }
    if !args.secrets.is_empty() {
        env.secrets = Some(args.secrets.clone());
    }
    env.timeout_seconds = args.timeout_seconds;

    Ok(Some(env))
}

fn parse_env_var(pair: &str) -> CliResult<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(CliError::ConfigurationError {
            message: format!("invalid environment variable {pair:?}, expected KEY=VALUE"),
        }),
    }
}

fn load_env_file(path: &Path) -> CliResult<HashMap<String, String>> {
    let iter = dotenv::from_path_iter(path).map_err(|e| CliError::ConfigurationError {
        message: format!("failed to load env file {}: {e}", path.display()),
    })?;

    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| CliError::ConfigurationError {
            message: format!("failed to parse env file {}: {e}", path.display()),
        })?;
        vars.insert(key, value);
    }
    Ok(vars)
}

fn validate_working_dir(dir: &str) -> CliResult<()> {
    if !Path::new(dir).is_dir() {
        return Err(CliError::ConfigurationError {
            message: format!("working directory does not exist: {dir}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_no_inputs_yield_no_override() {
        assert!(build_override(&ExecEnvArgs::default()).unwrap().is_none());
    }

    #[test]
    fn test_cli_vars_win_over_the_env_file() {
        let dir = tempdir().unwrap();
        let env_file = dir.path().join("test.env");
        std::fs::write(&env_file, "SHARED=from_file\nFILE_ONLY=yes\n").unwrap();

        let args = ExecEnvArgs {
            env_vars: vec!["SHARED=from_flag".to_string(), "FLAG_ONLY=1".to_string()],
            env_file: Some(env_file),
            ..ExecEnvArgs::default()
        };
        let env = build_override(&args).unwrap().unwrap();
        let vars = env.env_vars.unwrap();

        assert_eq!(vars["SHARED"], "from_flag");
        assert_eq!(vars["FILE_ONLY"], "yes");
        assert_eq!(vars["FLAG_ONLY"], "1");
    }

    #[test]
    fn test_malformed_env_var_is_rejected() {
        let args = ExecEnvArgs {
            env_vars: vec!["NO_EQUALS_SIGN".to_string()],
            ..ExecEnvArgs::default()
        };
        assert!(build_override(&args).is_err());
    }

    #[test]
    fn test_working_dir_must_exist() {
        let dir = tempdir().unwrap();

        let ok = ExecEnvArgs {
            working_dir: Some(dir.path().to_string_lossy().into_owned()),
            ..ExecEnvArgs::default()
        };
        let env = build_override(&ok).unwrap().unwrap();
        assert!(env.working_dir.is_some());

        let missing = ExecEnvArgs {
            working_dir: Some("/definitely/not/a/real/path".to_string()),
            ..ExecEnvArgs::default()
        };
        assert!(build_override(&missing).is_err());
    }

    #[test]
    fn test_secrets_and_timeout_pass_through() {
        let args = ExecEnvArgs {
            secrets: vec!["DB_PASSWORD".to_string()],
            timeout_seconds: Some(120),
            ..ExecEnvArgs::default()
        };
        let env = build_override(&args).unwrap().unwrap();
        assert_eq!(env.secrets.unwrap(), vec!["DB_PASSWORD".to_string()]);
        assert_eq!(env.timeout_seconds, Some(120));
    }
}
