//! Target environments a gadget backend can run in.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Environment the gadget backend is reached through.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Gadgets run inside a Kubernetes cluster reached through the API server.
    #[default]
    Kubernetes,
    /// Gadgets run on a single Linux host reached through a remote address.
    Linux,
}

impl Environment {
    /// Returns the canonical lowercase name used in cache file names and
    /// tool descriptions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kubernetes => "kubernetes",
            Self::Linux => "linux",
        }
    }

    /// Returns `true` when deployment of the backend is managed in-cluster.
    #[must_use]
    pub const fn is_kubernetes(self) -> bool {
        matches!(self, Self::Kubernetes)
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kubernetes" => Ok(Self::Kubernetes),
            "linux" => Ok(Self::Linux),
            _ => Err(Error::UnsupportedEnvironment { name: s.to_owned() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_environments() {
        assert_eq!("kubernetes".parse::<Environment>().unwrap(), Environment::Kubernetes);
        assert_eq!(" Linux ".parse::<Environment>().unwrap(), Environment::Linux);
        assert!(matches!(
            "docker".parse::<Environment>(),
            Err(Error::UnsupportedEnvironment { name }) if name == "docker"
        ));
    }
}
