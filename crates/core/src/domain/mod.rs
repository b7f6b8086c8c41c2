pub mod amount;
pub mod approval;
pub mod rfq;
pub mod role;
pub mod subscription;
pub mod tender;
pub mod user;
