use std::path::Path;

use procura_core::domain::subscription::{Fetched, Subscription, TrialWindow};
use procura_core::domain::user::User;
use procura_core::entitlement::{
    resolve_entitlement, role_workspace, route, Entitlement, RouteDecision, RouteInput, Workspace,
};
use serde::{Deserialize, Serialize};

use super::{input_failure, load_config, read_input, CommandResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntitlementSnapshot {
    user: User,
    #[serde(default)]
    subscription: Option<Subscription>,
    #[serde(default)]
    trial: Option<TrialWindow>,
    /// Treat subscription and trial as still being fetched.
    #[serde(default)]
    loading: bool,
    #[serde(default = "default_location")]
    location: String,
}

fn default_location() -> String {
    "/".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EntitlementReport {
    entitlement: Entitlement,
    role_workspace: Option<Workspace>,
    route: RouteDecision,
}

pub fn run(path: &Path) -> CommandResult {
    let config = match load_config("entitlement") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let snapshot: EntitlementSnapshot = match read_input(path) {
        Ok(snapshot) => snapshot,
        Err(error) => return input_failure("entitlement", &error),
    };

    let (subscription, trial) = if snapshot.loading {
        (Fetched::Loading, Fetched::Loading)
    } else {
        (Fetched::from(snapshot.subscription), Fetched::from(snapshot.trial))
    };

    let decision = route(
        &RouteInput {
            user: &snapshot.user,
            subscription: &subscription,
            trial: &trial,
            location: &snapshot.location,
        },
        &config.routing,
    );

    CommandResult::report(
        "entitlement",
        EntitlementReport {
            entitlement: resolve_entitlement(&subscription, &trial),
            role_workspace: role_workspace(&snapshot.user),
            route: decision,
        },
    )
}
