//! Entitlement resolution and sign-in routing.
//!
//! Routing runs in two tiers. A recognised role (vendor, management, employee)
//! decides the workspace regardless of billing state. Only users without a
//! recognised role fall through to the entitlement gate, which keeps them in
//! the billing area until they have access.

use serde::{Deserialize, Serialize};

use crate::config::RoutingConfig;
use crate::domain::role::{self, EMPLOYEE_WORKSPACE_ROLES, MANAGEMENT_WORKSPACE_ROLES};
use crate::domain::subscription::{Fetched, Subscription, TrialWindow};
use crate::domain::user::User;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementTier {
    Paid,
    Trial,
    Expired,
    Free,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    #[serde(rename = "type")]
    pub tier: EntitlementTier,
    pub has_access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_days: Option<u32>,
}

impl Entitlement {
    fn without_access(tier: EntitlementTier) -> Self {
        Self { tier, has_access: false, remaining_days: None }
    }
}

/// First matching rule wins: paid subscription, running trial, lapsed trial
/// plan, then free.
pub fn resolve_entitlement(
    subscription: &Fetched<Subscription>,
    trial: &Fetched<TrialWindow>,
) -> Entitlement {
    let subscription = subscription.present();
    let trial = trial.present();

    if let Some(subscription) = subscription {
        if subscription.status.is_live() && !subscription.is_trial_plan() {
            return Entitlement { tier: EntitlementTier::Paid, has_access: true, remaining_days: None };
        }
    }

    if let Some(trial) = trial {
        if trial.is_active && trial.remaining_days > 0 {
            return Entitlement {
                tier: EntitlementTier::Trial,
                has_access: true,
                remaining_days: Some(trial.remaining_days),
            };
        }
    }

    let on_trial_plan = subscription.is_some_and(Subscription::is_trial_plan);
    let trial_lapsed = trial.map_or(true, |trial| !trial.is_active);
    if on_trial_plan && trial_lapsed {
        return Entitlement::without_access(EntitlementTier::Expired);
    }

    Entitlement::without_access(EntitlementTier::Free)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workspace {
    Vendor,
    Management,
    Employee,
    Billing,
    Default,
}

impl Workspace {
    pub fn path(self, routing: &RoutingConfig) -> &str {
        match self {
            Self::Vendor => &routing.vendor_path,
            Self::Management => &routing.management_path,
            Self::Employee => &routing.employee_path,
            Self::Billing => &routing.billing_path,
            Self::Default => &routing.default_path,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RouteDecision {
    Stay,
    Redirect { workspace: Workspace, path: String },
    /// No role matched and subscription data is still in flight.
    AwaitingEntitlement,
}

/// Workspace a user is pinned to by role, if any.
pub fn role_workspace(user: &User) -> Option<Workspace> {
    if user.has_role_label(|label| role::role_matches(label, role::VENDOR)) {
        return Some(Workspace::Vendor);
    }
    if user.has_role_label(|label| role::role_in(label, MANAGEMENT_WORKSPACE_ROLES)) {
        return Some(Workspace::Management);
    }
    if user.has_role_label(|label| role::role_in(label, EMPLOYEE_WORKSPACE_ROLES)) {
        return Some(Workspace::Employee);
    }
    None
}

pub struct RouteInput<'a> {
    pub user: &'a User,
    pub subscription: &'a Fetched<Subscription>,
    pub trial: &'a Fetched<TrialWindow>,
    pub location: &'a str,
}

pub fn route(input: &RouteInput<'_>, routing: &RoutingConfig) -> RouteDecision {
    if let Some(workspace) = role_workspace(input.user) {
        return redirect_unless_under(workspace, input.location, routing);
    }

    if input.subscription.is_loading() || input.trial.is_loading() {
        return RouteDecision::AwaitingEntitlement;
    }

    let entitlement = resolve_entitlement(input.subscription, input.trial);
    entitlement_route(&entitlement, input.location, routing)
}

/// Billing gate for users without a recognised role.
pub fn entitlement_route(
    entitlement: &Entitlement,
    location: &str,
    routing: &RoutingConfig,
) -> RouteDecision {
    let in_billing = is_under(location, &routing.billing_path);
    match (entitlement.has_access, in_billing) {
        (false, false) => redirect(Workspace::Billing, routing),
        (true, true) => redirect(Workspace::Default, routing),
        _ => RouteDecision::Stay,
    }
}

fn redirect_unless_under(
    workspace: Workspace,
    location: &str,
    routing: &RoutingConfig,
) -> RouteDecision {
    if is_under(location, workspace.path(routing)) {
        RouteDecision::Stay
    } else {
        redirect(workspace, routing)
    }
}

fn redirect(workspace: Workspace, routing: &RoutingConfig) -> RouteDecision {
    RouteDecision::Redirect { workspace, path: workspace.path(routing).to_owned() }
}

fn is_under(location: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    match location.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(['/', '?', '#']),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        entitlement_route, resolve_entitlement, route, Entitlement, EntitlementTier,
        RouteDecision, RouteInput, Workspace,
    };
    use crate::config::RoutingConfig;
    use crate::domain::subscription::{Fetched, Subscription, SubscriptionStatus, TrialWindow};
    use crate::domain::user::{User, UserId};

    fn subscription(status: SubscriptionStatus, plan: &str) -> Fetched<Subscription> {
        Fetched::Present(Subscription {
            status,
            plan: plan.to_owned(),
            current_period_start: None,
            current_period_end: None,
        })
    }

    fn trial(is_active: bool, remaining_days: u32) -> Fetched<TrialWindow> {
        Fetched::Present(TrialWindow { is_active, remaining_days, end_date: None })
    }

    fn user(role: &str) -> User {
        User {
            id: UserId("u-7".to_owned()),
            role: role.to_owned(),
            position: None,
            department: None,
            email: "someone@example.com".to_owned(),
        }
    }

    #[test]
    fn resolution_grid_follows_priority_order() {
        use EntitlementTier::{Free, Paid, Trial};
        use SubscriptionStatus::{Active, Canceled};

        let cases = [
            (Some(Active), true, Paid),
            (Some(Active), false, Paid),
            (Some(Canceled), true, Trial),
            (Some(Canceled), false, Free),
            (None, true, Trial),
            (None, false, Free),
        ];

        for (status, trial_active, expected) in cases {
            let subscription = match status {
                Some(status) => subscription(status, "professional"),
                None => Fetched::Missing,
            };
            let trial = trial(trial_active, if trial_active { 9 } else { 0 });
            let entitlement = resolve_entitlement(&subscription, &trial);

            assert_eq!(entitlement.tier, expected, "status {status:?}, trial {trial_active}");
            assert_eq!(entitlement.has_access, matches!(expected, Paid | Trial));
        }
    }

    #[test]
    fn absent_subscription_ignores_status_dimension() {
        for loading in [true, false] {
            let subscription = if loading { Fetched::Loading } else { Fetched::Missing };
            assert_eq!(
                resolve_entitlement(&subscription, &trial(true, 3)).tier,
                EntitlementTier::Trial
            );
            assert_eq!(
                resolve_entitlement(&subscription, &trial(false, 0)).tier,
                EntitlementTier::Free
            );
        }
    }

    #[test]
    fn trial_plan_is_never_paid() {
        let entitlement = resolve_entitlement(
            &subscription(SubscriptionStatus::Trialing, "trial"),
            &trial(true, 4),
        );
        assert_eq!(
            entitlement,
            Entitlement { tier: EntitlementTier::Trial, has_access: true, remaining_days: Some(4) }
        );
    }

    #[test]
    fn lapsed_trial_plan_is_expired() {
        let plan = subscription(SubscriptionStatus::Trialing, "trial");
        assert_eq!(resolve_entitlement(&plan, &trial(false, 0)).tier, EntitlementTier::Expired);
        assert_eq!(resolve_entitlement(&plan, &Fetched::Missing).tier, EntitlementTier::Expired);
        assert_eq!(resolve_entitlement(&plan, &Fetched::Loading).tier, EntitlementTier::Expired);
    }

    #[test]
    fn active_trial_with_no_days_left_on_trial_plan_is_free() {
        // Trial flagged active but exhausted: rule 2 misses and rule 3 needs
        // an inactive or absent trial, so it falls through.
        let plan = subscription(SubscriptionStatus::Trialing, "trial");
        assert_eq!(resolve_entitlement(&plan, &trial(true, 0)).tier, EntitlementTier::Free);
    }

    #[test]
    fn vendor_with_expired_subscription_goes_to_vendor_workspace() {
        let routing = RoutingConfig::default();
        let vendor = user("Vendor");
        let decision = route(
            &RouteInput {
                user: &vendor,
                subscription: &subscription(SubscriptionStatus::Canceled, "trial"),
                trial: &trial(false, 0),
                location: "/billing",
            },
            &routing,
        );

        assert_eq!(
            decision,
            RouteDecision::Redirect {
                workspace: Workspace::Vendor,
                path: routing.vendor_path.clone()
            }
        );
    }

    #[test]
    fn position_and_case_insensitive_roles_are_recognised() {
        let routing = RoutingConfig::default();
        let mut executive = user("Unlisted Title");
        executive.position = Some("ceo".to_owned());
        let decision = route(
            &RouteInput {
                user: &executive,
                subscription: &Fetched::Missing,
                trial: &Fetched::Missing,
                location: "/management/reports",
            },
            &routing,
        );
        assert_eq!(decision, RouteDecision::Stay);

        let employee = user("procurement officer");
        let decision = route(
            &RouteInput {
                user: &employee,
                subscription: &Fetched::Loading,
                trial: &Fetched::Loading,
                location: "/",
            },
            &routing,
        );
        assert!(matches!(decision, RouteDecision::Redirect { workspace: Workspace::Employee, .. }));
    }

    #[test]
    fn unrecognised_role_is_billing_gated() {
        let routing = RoutingConfig::default();
        let guest = user("Guest");

        let to_billing = route(
            &RouteInput {
                user: &guest,
                subscription: &Fetched::Missing,
                trial: &Fetched::Missing,
                location: "/dashboard",
            },
            &routing,
        );
        assert!(matches!(to_billing, RouteDecision::Redirect { workspace: Workspace::Billing, .. }));

        let out_of_billing = route(
            &RouteInput {
                user: &guest,
                subscription: &subscription(SubscriptionStatus::Active, "professional"),
                trial: &Fetched::Missing,
                location: "/billing/plans",
            },
            &routing,
        );
        assert!(matches!(
            out_of_billing,
            RouteDecision::Redirect { workspace: Workspace::Default, .. }
        ));
    }

    #[test]
    fn unrecognised_role_waits_for_entitlement_data() {
        let routing = RoutingConfig::default();
        let guest = user("Guest");
        let decision = route(
            &RouteInput {
                user: &guest,
                subscription: &Fetched::Loading,
                trial: &Fetched::Missing,
                location: "/dashboard",
            },
            &routing,
        );
        assert_eq!(decision, RouteDecision::AwaitingEntitlement);
    }

    #[test]
    fn billing_prefix_matches_on_path_boundaries() {
        let routing = RoutingConfig::default();
        let no_access = Entitlement {
            tier: EntitlementTier::Free,
            has_access: false,
            remaining_days: None,
        };
        assert_eq!(entitlement_route(&no_access, "/billing", &routing), RouteDecision::Stay);
        assert_eq!(entitlement_route(&no_access, "/billing?plan=pro", &routing), RouteDecision::Stay);
        assert!(matches!(
            entitlement_route(&no_access, "/billingx", &routing),
            RouteDecision::Redirect { workspace: Workspace::Billing, .. }
        ));
    }
}
