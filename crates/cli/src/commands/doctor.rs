use std::collections::HashMap;

use procura_client::HttpProcurementBackend;
use procura_core::backend::{BackendError, ProcurementBackend};
use procura_core::config::{AppConfig, LoadOptions};
use procura_core::domain::role::normalize_role;
use procura_core::permissions::PermissionMatrix;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = vec![check_permission_matrix(&PermissionMatrix::standard())];

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_backend_credential(&config));
            checks.push(check_backend_reachability(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "backend_credential",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "backend_reachability",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Every role must land in exactly one group, or evaluation order would
/// silently decide its permissions.
fn check_permission_matrix(matrix: &PermissionMatrix) -> DoctorCheck {
    let mut owners: HashMap<String, Vec<String>> = HashMap::new();
    for policy in matrix.policies() {
        for role in &policy.roles {
            owners
                .entry(normalize_role(role))
                .or_default()
                .push(format!("{:?}", policy.group));
        }
    }

    let mut overlaps: Vec<String> = owners
        .into_iter()
        .filter(|(_, groups)| groups.len() > 1)
        .map(|(role, groups)| format!("`{role}` in {}", groups.join(", ")))
        .collect();
    overlaps.sort();

    if overlaps.is_empty() {
        DoctorCheck {
            name: "permission_matrix",
            status: CheckStatus::Pass,
            details: format!("{} role groups with disjoint role lists", matrix.policies().count()),
        }
    } else {
        DoctorCheck {
            name: "permission_matrix",
            status: CheckStatus::Fail,
            details: format!("roles assigned to several groups: {}", overlaps.join("; ")),
        }
    }
}

fn check_backend_credential(config: &AppConfig) -> DoctorCheck {
    if config.backend.api_token.is_some() {
        DoctorCheck {
            name: "backend_credential",
            status: CheckStatus::Pass,
            details: "bearer credential configured".to_string(),
        }
    } else {
        DoctorCheck {
            name: "backend_credential",
            status: CheckStatus::Fail,
            details: "set PROCURA_BACKEND_API_TOKEN or backend.api_token".to_string(),
        }
    }
}

fn check_backend_reachability(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "backend_reachability",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let backend = HttpProcurementBackend::new(&config.backend)?;
        backend.subscription().await?;
        Ok::<(), BackendError>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "backend_reachability",
            status: CheckStatus::Pass,
            details: format!("subscription lookup succeeded at `{}`", config.backend.base_url),
        },
        Err(BackendError::SessionExpired { status }) => DoctorCheck {
            name: "backend_reachability",
            status: CheckStatus::Fail,
            details: format!("backend reachable but rejected the credential (status {status})"),
        },
        Err(error) => DoctorCheck {
            name: "backend_reachability",
            status: CheckStatus::Fail,
            details: format!("backend at `{}` failed: {error}", config.backend.base_url),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
