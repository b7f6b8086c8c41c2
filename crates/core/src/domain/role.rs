//! Closed catalog of business roles.
//!
//! Role strings arrive from the identity backend verbatim. Every comparison in
//! the engine goes through [`role_matches`], which trims and ignores ASCII case.

pub const VENDOR: &str = "Vendor";

pub const ADMIN_ROLES: &[&str] = &["Admin", "System Admin"];

pub const EXECUTIVE_ROLES: &[&str] = &["CEO", "COO", "Enterprise"];

pub const DEPARTMENT_MANAGEMENT_ROLES: &[&str] = &["Department Head", "Manager", "Senior Manager"];

pub const FINANCE_ROLES: &[&str] = &[
    "Finance Officer",
    "Finance Manager",
    "Finance Director",
    "CFO",
    "Accountant",
    "Finance Analyst",
];

pub const PROCUREMENT_ROLES: &[&str] = &[
    "Procurement Officer",
    "Procurement Manager",
    "Senior Procurement Officer",
    "Procurement Specialist",
    "Buyer",
    "Supply Chain Manager",
    "Supply Chain Officer",
];

/// Procurement roles that may also hand an item to a colleague.
pub const PROCUREMENT_DELEGATING_ROLES: &[&str] =
    &["Procurement Manager", "Senior Procurement Officer"];

pub const IT_ROLES: &[&str] = &["IT Manager", "IT Director", "IT Officer"];

pub const LEGAL_ROLES: &[&str] = &["Legal Counsel", "Legal Officer", "Compliance Officer"];

pub const HR_ROLES: &[&str] = &["HR Manager", "HR Officer"];

pub const SALES_MARKETING_ROLES: &[&str] = &["Sales Manager", "Marketing Manager"];

/// Roles routed to the management workspace on sign-in.
pub const MANAGEMENT_WORKSPACE_ROLES: &[&str] =
    &["Admin", "System Admin", "CEO", "COO", "CFO", "Enterprise", "Finance Director"];

/// Roles routed to the employee workspace on sign-in.
pub const EMPLOYEE_WORKSPACE_ROLES: &[&str] = &[
    "Employee",
    "Department Head",
    "Manager",
    "Senior Manager",
    "Finance Officer",
    "Finance Manager",
    "Accountant",
    "Finance Analyst",
    "Procurement Officer",
    "Procurement Manager",
    "Senior Procurement Officer",
    "Procurement Specialist",
    "Buyer",
    "Supply Chain Manager",
    "Supply Chain Officer",
    "IT Manager",
    "IT Director",
    "IT Officer",
    "Legal Counsel",
    "Legal Officer",
    "Compliance Officer",
    "HR Manager",
    "HR Officer",
    "Sales Manager",
    "Marketing Manager",
];

pub fn normalize_role(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

pub fn role_matches(candidate: &str, expected: &str) -> bool {
    candidate.trim().eq_ignore_ascii_case(expected.trim())
}

pub fn role_in(candidate: &str, roles: &[&str]) -> bool {
    roles.iter().any(|role| role_matches(candidate, role))
}

#[cfg(test)]
mod tests {
    use super::{role_in, role_matches, EMPLOYEE_WORKSPACE_ROLES, FINANCE_ROLES, VENDOR};

    #[test]
    fn matching_ignores_case_and_padding() {
        assert!(role_matches(" vendor ", VENDOR));
        assert!(role_in("finance analyst", FINANCE_ROLES));
        assert!(!role_in("Finance", FINANCE_ROLES));
    }

    #[test]
    fn vendor_is_not_an_employee_role() {
        assert!(!role_in(VENDOR, EMPLOYEE_WORKSPACE_ROLES));
    }
}
