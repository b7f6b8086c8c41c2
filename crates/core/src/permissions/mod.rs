//! Role-permission matrix for approval items.
//!
//! The policy is a table: each role group carries one [`Condition`] per
//! action, evaluated against the item's stage, department, category and
//! review flags. Groups are matched in table order; a role outside every
//! group gets the fallback policy.

use serde::{Deserialize, Serialize};

use crate::domain::approval::{stage, ApprovalItem, ApprovalStatus};
use crate::domain::role::{
    self, ADMIN_ROLES, DEPARTMENT_MANAGEMENT_ROLES, EXECUTIVE_ROLES, FINANCE_ROLES, HR_ROLES,
    IT_ROLES, LEGAL_ROLES, PROCUREMENT_DELEGATING_ROLES, PROCUREMENT_ROLES, SALES_MARKETING_ROLES,
};
use crate::domain::user::User;

pub const IT_CATEGORIES: &[&str] =
    &["IT", "IT Equipment", "IT Services", "Software", "Hardware", "Technology"];
pub const HR_CATEGORY: &str = "HR Related";
pub const HR_DEPARTMENT: &str = "Human Resources";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleGroup {
    Admin,
    Executive,
    Finance,
    Procurement,
    DepartmentManagement,
    It,
    Legal,
    Hr,
    SalesMarketing,
    Default,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "when", content = "values", rename_all = "snake_case")]
pub enum Condition {
    Always,
    Never,
    StageIn(Vec<String>),
    /// Case-insensitive substring match on the stage tag.
    StageContains(Vec<String>),
    DepartmentIn(Vec<String>),
    DepartmentContains(Vec<String>),
    CategoryIn(Vec<String>),
    /// Item department equals the acting user's department.
    SameDepartment,
    ItReviewRequired,
    LegalReviewRequired,
    RoleIn(Vec<String>),
    AllOf(Vec<Condition>),
    AnyOf(Vec<Condition>),
}

/// Facts a condition is evaluated against.
#[derive(Clone, Copy, Debug)]
pub struct PermissionContext<'a> {
    pub role: &'a str,
    pub item: &'a ApprovalItem,
    pub same_department: bool,
}

impl Condition {
    pub fn holds(&self, context: &PermissionContext<'_>) -> bool {
        let item = context.item;
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::StageIn(stages) => stages.iter().any(|stage| item.stage_is(stage)),
            Self::StageContains(fragments) => contains_any(&item.current_stage, fragments),
            Self::DepartmentIn(departments) => equals_any(&item.department, departments),
            Self::DepartmentContains(fragments) => contains_any(&item.department, fragments),
            Self::CategoryIn(categories) => equals_any(&item.category, categories),
            Self::SameDepartment => context.same_department,
            Self::ItReviewRequired => item.require_it_review,
            Self::LegalReviewRequired => item.require_legal_review,
            Self::RoleIn(roles) => roles.iter().any(|role| role::role_matches(context.role, role)),
            Self::AllOf(conditions) => conditions.iter().all(|condition| condition.holds(context)),
            Self::AnyOf(conditions) => conditions.iter().any(|condition| condition.holds(context)),
        }
    }
}

fn equals_any(value: &str, candidates: &[String]) -> bool {
    let value = value.trim();
    candidates.iter().any(|candidate| candidate.trim().eq_ignore_ascii_case(value))
}

fn contains_any(value: &str, fragments: &[String]) -> bool {
    let value = value.to_ascii_lowercase();
    fragments.iter().any(|fragment| value.contains(&fragment.to_ascii_lowercase()))
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPolicy {
    pub group: RoleGroup,
    pub roles: Vec<String>,
    /// Governs both approve and reject.
    pub decide: Condition,
    pub delegate: Condition,
    pub request_info: Condition,
    pub adjust_budget: Condition,
    pub approve_rfq: Condition,
}

impl GroupPolicy {
    fn new(group: RoleGroup, roles: &[&str]) -> Self {
        Self {
            group,
            roles: strings(roles),
            decide: Condition::Never,
            delegate: Condition::Never,
            request_info: Condition::Never,
            adjust_budget: Condition::Never,
            approve_rfq: Condition::Never,
        }
    }

    fn covers(&self, role: &str) -> bool {
        self.roles.iter().any(|candidate| role::role_matches(role, candidate))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSet {
    pub approve: bool,
    pub reject: bool,
    pub comment: bool,
    pub delegate: bool,
    pub request_info: bool,
    pub adjust_budget: bool,
    pub approve_rfq: bool,
    pub view_details: bool,
}

impl ActionSet {
    /// Communication actions that stay open to anyone who can see the item.
    pub fn read_only() -> Self {
        Self { comment: true, view_details: true, ..Self::default() }
    }

    pub fn everything() -> Self {
        Self {
            approve: true,
            reject: true,
            comment: true,
            delegate: true,
            request_info: true,
            adjust_budget: true,
            approve_rfq: true,
            view_details: true,
        }
    }

    pub fn can_decide(&self) -> bool {
        self.approve || self.reject || self.approve_rfq
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PermissionRequest<'a> {
    pub role: &'a str,
    pub item: &'a ApprovalItem,
    pub same_department: bool,
    /// Whether the caller is listed among the current stage's approvers.
    pub is_current_approver: bool,
}

impl<'a> PermissionRequest<'a> {
    pub fn for_user(user: &'a User, item: &'a ApprovalItem) -> Self {
        Self {
            role: &user.role,
            item,
            same_department: user.same_department(&item.department),
            is_current_approver: item.is_approver(user),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionMatrix {
    policies: Vec<GroupPolicy>,
    fallback: GroupPolicy,
}

impl Default for PermissionMatrix {
    fn default() -> Self {
        Self::standard()
    }
}

impl PermissionMatrix {
    pub fn new(policies: Vec<GroupPolicy>, fallback: GroupPolicy) -> Self {
        Self { policies, fallback }
    }

    /// The procurement approval policy.
    pub fn standard() -> Self {
        use Condition::{AllOf, Always, AnyOf, SameDepartment};

        let own_department_stage =
            AllOf(vec![SameDepartment, Condition::StageIn(strings(&[stage::DEPARTMENT_APPROVAL]))]);

        let admin = GroupPolicy {
            decide: Always,
            delegate: Always,
            request_info: Always,
            adjust_budget: Always,
            approve_rfq: Always,
            ..GroupPolicy::new(RoleGroup::Admin, ADMIN_ROLES)
        };

        let executive = GroupPolicy {
            decide: Condition::StageIn(strings(&[
                stage::EXECUTIVE_APPROVAL,
                stage::FINAL_APPROVAL,
                stage::CFO_APPROVAL,
            ])),
            delegate: Always,
            ..GroupPolicy::new(RoleGroup::Executive, EXECUTIVE_ROLES)
        };

        let finance = GroupPolicy {
            decide: Condition::StageIn(strings(&[
                stage::FINANCE_APPROVAL,
                stage::BUDGET_REVIEW,
                stage::PAYMENT_APPROVAL,
            ])),
            request_info: Always,
            adjust_budget: Always,
            ..GroupPolicy::new(RoleGroup::Finance, FINANCE_ROLES)
        };

        let procurement_scope = AnyOf(vec![
            Condition::StageContains(strings(&["procurement", "vendor", "rfq", "po"])),
            Condition::DepartmentContains(strings(&["procurement", "supply chain"])),
        ]);
        let procurement = GroupPolicy {
            decide: procurement_scope.clone(),
            request_info: procurement_scope,
            delegate: Condition::RoleIn(strings(PROCUREMENT_DELEGATING_ROLES)),
            approve_rfq: Always,
            ..GroupPolicy::new(RoleGroup::Procurement, PROCUREMENT_ROLES)
        };

        let department_management = GroupPolicy {
            decide: own_department_stage.clone(),
            delegate: Always,
            request_info: Always,
            ..GroupPolicy::new(RoleGroup::DepartmentManagement, DEPARTMENT_MANAGEMENT_ROLES)
        };

        let it = GroupPolicy {
            decide: AllOf(vec![
                Condition::StageIn(strings(&[stage::IT_REVIEW])),
                AnyOf(vec![Condition::CategoryIn(strings(IT_CATEGORIES)), Condition::ItReviewRequired]),
            ]),
            ..GroupPolicy::new(RoleGroup::It, IT_ROLES)
        };

        let legal = GroupPolicy {
            decide: AllOf(vec![
                Condition::StageIn(strings(&[stage::LEGAL_REVIEW])),
                Condition::LegalReviewRequired,
            ]),
            ..GroupPolicy::new(RoleGroup::Legal, LEGAL_ROLES)
        };

        let hr = GroupPolicy {
            decide: AnyOf(vec![
                Condition::CategoryIn(strings(&[HR_CATEGORY])),
                Condition::DepartmentIn(strings(&[HR_DEPARTMENT])),
            ]),
            ..GroupPolicy::new(RoleGroup::Hr, HR_ROLES)
        };

        let sales_marketing = GroupPolicy {
            decide: AllOf(vec![
                Condition::StageIn(strings(&[stage::DEPARTMENT_APPROVAL])),
                Condition::DepartmentIn(strings(&["Sales", "Marketing"])),
            ]),
            ..GroupPolicy::new(RoleGroup::SalesMarketing, SALES_MARKETING_ROLES)
        };

        let fallback =
            GroupPolicy { decide: own_department_stage, ..GroupPolicy::new(RoleGroup::Default, &[]) };

        Self::new(
            vec![
                admin,
                executive,
                finance,
                procurement,
                department_management,
                it,
                legal,
                hr,
                sales_marketing,
            ],
            fallback,
        )
    }

    pub fn policies(&self) -> impl Iterator<Item = &GroupPolicy> {
        self.policies.iter().chain(std::iter::once(&self.fallback))
    }

    pub fn policy_for(&self, role: &str) -> &GroupPolicy {
        self.policies.iter().find(|policy| policy.covers(role)).unwrap_or(&self.fallback)
    }

    pub fn group_for(&self, role: &str) -> RoleGroup {
        self.policy_for(role).group
    }

    pub fn evaluate(&self, request: &PermissionRequest<'_>) -> ActionSet {
        if !request.is_current_approver || request.item.status.is_terminal() {
            return ActionSet::read_only();
        }

        let policy = self.policy_for(request.role);
        let context = PermissionContext {
            role: request.role,
            item: request.item,
            same_department: request.same_department,
        };
        let decide = policy.decide.holds(&context);

        let mut actions = ActionSet {
            approve: decide,
            reject: decide,
            comment: true,
            delegate: policy.delegate.holds(&context),
            request_info: policy.request_info.holds(&context),
            adjust_budget: policy.adjust_budget.holds(&context),
            approve_rfq: policy.approve_rfq.holds(&context),
            view_details: true,
        };

        if request.item.status == ApprovalStatus::ApprovedRfq {
            actions.approve_rfq = false;
        }

        actions
    }

    pub fn evaluate_for_user(&self, user: &User, item: &ApprovalItem) -> ActionSet {
        self.evaluate(&PermissionRequest::for_user(user, item))
    }
}
