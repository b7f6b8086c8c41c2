use std::sync::Arc;

use chrono::Utc;
use procura_client::HttpProcurementBackend;
use procura_core::approvals::{ApprovalError, ApprovalInbox};
use procura_core::audit::TracingAuditSink;
use procura_core::backend::BackendError;
use procura_core::config::AppConfig;
use procura_core::domain::user::{User, UserId};
use procura_core::errors::ApplicationError;

use super::{load_config, CommandResult, EXIT_BACKEND};

#[derive(Debug, Clone)]
pub struct PendingArgs {
    pub user_id: String,
    pub role: String,
    pub department: Option<String>,
    pub email: String,
}

pub fn run(args: PendingArgs) -> CommandResult {
    let config = match load_config("pending") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "pending",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_BACKEND,
            );
        }
    };

    runtime.block_on(execute(&config, args))
}

pub async fn execute(config: &AppConfig, args: PendingArgs) -> CommandResult {
    let backend = match HttpProcurementBackend::new(&config.backend) {
        Ok(backend) => backend,
        Err(error) => return backend_failure(error),
    };

    let user = User {
        id: UserId(args.user_id),
        role: args.role,
        position: None,
        department: args.department,
        email: args.email,
    };
    let mut inbox = ApprovalInbox::new(Arc::new(backend), Arc::new(TracingAuditSink), user);

    match inbox.refresh().await {
        Ok(_) => CommandResult::report(
            "pending",
            inbox.entries(Utc::now(), config.approvals.sla_warning_window()),
        ),
        Err(ApprovalError::Backend(error)) => backend_failure(error),
        Err(error) => CommandResult::failure("pending", "approval", error.to_string(), EXIT_BACKEND),
    }
}

fn backend_failure(error: BackendError) -> CommandResult {
    let error_class = error.error_class();
    let correlation_id = format!("cli-{}", Utc::now().timestamp_millis());
    let interface = ApplicationError::from(error).into_interface(correlation_id);
    let message = format!(
        "{} ({interface}; correlation id {})",
        interface.user_message(),
        interface.correlation_id()
    );
    CommandResult::failure("pending", error_class, message, EXIT_BACKEND)
}
