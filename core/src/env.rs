//! External key/value environments that feed global flags.

use std::collections::{BTreeMap, HashMap};

/// An enumerable key/value mapping, such as the process environment.
pub trait EnvSource: Send + Sync {
    fn entries(&self) -> Vec<(String, String)>;
}

/// The variables of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn entries(&self) -> Vec<(String, String)> {
        // Non-UTF-8 entries cannot name a flag.
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }
}

impl EnvSource for HashMap<String, String> {
    fn entries(&self) -> Vec<(String, String)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn entries(&self) -> Vec<(String, String)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl EnvSource for Vec<(String, String)> {
    fn entries(&self) -> Vec<(String, String)> {
        self.clone()
    }
}
