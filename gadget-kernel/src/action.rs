//! Closed action sets multiplexed by the lifecycle tools.

use std::fmt;
use std::str::FromStr;

use gadget_tools::{Arguments, ToolResponse};
use serde_json::Value;

/// Argument carrying the action name.
pub const ACTION_ARG: &str = "action";

/// A closed set of actions selectable through the `action` argument.
pub trait Action: Copy + FromStr + 'static {
    /// Every action, in the order they are listed to callers.
    const ALL: &'static [Self];

    /// Returns the wire name of the action.
    fn as_str(self) -> &'static str;

    /// Returns the comma separated list of valid action names.
    #[must_use]
    fn listing() -> String {
        Self::ALL
            .iter()
            .map(|action| action.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Reads and validates the action of a lifecycle tool call.
///
/// # Errors
///
/// Returns the response to send instead of dispatching: a plain text response
/// when no action was given, an error response for an unknown action.
pub fn parse_action<A: Action>(arguments: &Arguments) -> Result<A, ToolResponse> {
    let action = arguments
        .get(ACTION_ARG)
        .and_then(Value::as_str)
        .unwrap_or_default();
    if action.is_empty() {
        return Err(ToolResponse::text(format!(
            "No action specified, must be one of: {}",
            A::listing()
        )));
    }
    action.parse().map_err(|_| {
        ToolResponse::error(format!(
            "Invalid action specified, must be one of: {}",
            A::listing()
        ))
    })
}

/// Error returned when an action name is outside the closed set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action `{}`", self.0)
    }
}

impl std::error::Error for UnknownAction {}

macro_rules! action_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl Action for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownAction;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(UnknownAction(other.to_owned())),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

action_enum! {
    /// Actions of the deployment tool.
    DeployAction {
        /// Install the gadget chart.
        Deploy => "deploy",
        /// Remove the gadget chart.
        Undeploy => "undeploy",
        /// Upgrade the installed chart.
        Upgrade => "upgrade",
        /// Report whether gadget pods exist.
        IsDeployed => "is_deployed",
    }
}

action_enum! {
    /// Actions of the running-instance tool.
    InstanceAction {
        /// Sample the output of a detached instance.
        GetResults => "get_results",
        /// Stop a detached instance.
        StopGadget => "stop_gadget",
        /// List detached instances.
        ListRunningGadgets => "list_running_gadgets",
    }
}
