use std::path::Path;

use chrono::Utc;
use procura_core::domain::approval::{ApprovalItem, ApprovalStatus, SlaState};
use procura_core::domain::user::User;
use procura_core::permissions::{ActionSet, PermissionMatrix};
use serde::{Deserialize, Serialize};

use super::{input_failure, load_config, read_input, CommandResult};

#[derive(Debug, Deserialize)]
struct ActionsSnapshot {
    user: User,
    #[serde(default)]
    items: Vec<ApprovalItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemActions {
    id: String,
    current_stage: String,
    status: ApprovalStatus,
    sla: SlaState,
    actions: ActionSet,
}

pub fn run(path: &Path) -> CommandResult {
    let config = match load_config("actions") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let snapshot: ActionsSnapshot = match read_input(path) {
        Ok(snapshot) => snapshot,
        Err(error) => return input_failure("actions", &error),
    };

    let matrix = PermissionMatrix::standard();
    let now = Utc::now();
    let warning = config.approvals.sla_warning_window();

    let rows: Vec<ItemActions> = snapshot
        .items
        .iter()
        .map(|item| ItemActions {
            id: item.id.0.clone(),
            current_stage: item.current_stage.clone(),
            status: item.status,
            sla: item.sla_state(now, warning),
            actions: matrix.evaluate_for_user(&snapshot.user, item),
        })
        .collect();

    CommandResult::report("actions", rows)
}
