use procura_core::permissions::PermissionMatrix;

pub fn run() -> super::CommandResult {
    super::CommandResult::report("matrix", PermissionMatrix::standard())
}
