//! Machine configuration.
//!
//! Defaults suit ordinary PL/0 programs. Embedders override fields with the
//! `with_*` setters or read them from the environment with
//! [`VmConfig::from_env`]:
//!
//! | Variable            | Field            | Format                       |
//! |---------------------|------------------|------------------------------|
//! | `PL0_VM_STACK_SIZE` | `max_stack_size` | cell count, at least 3       |
//! | `PL0_VM_TRACE`      | `trace`          | `1`/`true`/`on`, `0`/`false`/`off` |
//! | `PL0_VM_STEP_LIMIT` | `step_limit`     | instruction count            |

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::vm::FRAME_HEADER_SIZE;

/// Stack capacity, in cells, of a default machine.
pub const DEFAULT_STACK_SIZE: usize = 1024;

pub const ENV_STACK_SIZE: &str = "PL0_VM_STACK_SIZE";
pub const ENV_TRACE: &str = "PL0_VM_TRACE";
pub const ENV_STEP_LIMIT: &str = "PL0_VM_STEP_LIMIT";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VmConfig {
    /// Maximum number of stack cells, global frame included.
    pub max_stack_size: usize,
    /// Record an execution trace.
    pub trace: bool,
    /// Fault with `StepLimitExceeded` once this many instructions have run.
    pub step_limit: Option<u64>,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_stack_size: DEFAULT_STACK_SIZE,
            trace: false,
            step_limit: None,
        }
    }
}

impl VmConfig {
    pub fn with_max_stack_size(mut self, max_stack_size: usize) -> Self {
        self.max_stack_size = max_stack_size;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_step_limit(mut self, step_limit: Option<u64>) -> Self {
        self.step_limit = step_limit;
        self
    }

    /// Builds a configuration from the `PL0_VM_*` environment variables,
    /// keeping defaults for unset ones.
    pub fn from_env() -> Result<Self, VMError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a caller-supplied variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, VMError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_STACK_SIZE) {
            config.max_stack_size = parse_number(ENV_STACK_SIZE, &value)?;
        }
        if let Some(value) = lookup(ENV_TRACE) {
            config.trace = parse_flag(ENV_TRACE, &value)?;
        }
        if let Some(value) = lookup(ENV_STEP_LIMIT) {
            config.step_limit = Some(parse_number(ENV_STEP_LIMIT, &value)?);
        }
        config.validate()?;
        Ok(config)
    }

    /// Rejects a stack too small to hold the global frame.
    pub fn validate(&self) -> Result<(), VMError> {
        if self.max_stack_size < FRAME_HEADER_SIZE {
            return Err(VMError::InvalidConfig {
                key: ENV_STACK_SIZE,
                value: self.max_stack_size.to_string(),
            });
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, VMError> {
    value.trim().parse().map_err(|_| VMError::InvalidConfig {
        key,
        value: value.to_string(),
    })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, VMError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "" | "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(VMError::InvalidConfig {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = VmConfig::default();
        assert_eq!(config.max_stack_size, 1024);
        assert!(!config.trace);
        assert_eq!(config.step_limit, None);
        assert_eq!(VmConfig::from_lookup(lookup(&[])).unwrap(), config);
    }

    #[test]
    fn reads_every_variable() {
        let config = VmConfig::from_lookup(lookup(&[
            (ENV_STACK_SIZE, "64"),
            (ENV_TRACE, "on"),
            (ENV_STEP_LIMIT, " 500 "),
        ]))
        .unwrap();
        assert_eq!(
            config,
            VmConfig::default()
                .with_max_stack_size(64)
                .with_trace(true)
                .with_step_limit(Some(500))
        );
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = VmConfig::from_lookup(lookup(&[(ENV_STACK_SIZE, "lots")])).unwrap_err();
        assert_eq!(
            err,
            VMError::InvalidConfig {
                key: ENV_STACK_SIZE,
                value: "lots".into()
            }
        );
        assert!(VmConfig::from_lookup(lookup(&[(ENV_TRACE, "maybe")])).is_err());
        assert!(VmConfig::from_lookup(lookup(&[(ENV_STEP_LIMIT, "-1")])).is_err());
    }

    #[test]
    fn stack_must_fit_global_frame() {
        assert!(VmConfig::from_lookup(lookup(&[(ENV_STACK_SIZE, "2")])).is_err());
        assert!(VmConfig::default().with_max_stack_size(3).validate().is_ok());
    }
}
