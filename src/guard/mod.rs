//! Route guard: decides, before a view renders, whether the current session may see it.
//!
//! [`decide`] is the pure decision function. [`RouteGuard`] wraps it with the central
//! [`RouteTable`], turns non-render decisions into [`Navigation`]s and hands them to a
//! [`Navigator`]. The guard reads the session; it never mutates it.

mod table;

use serde::Serialize;
use tracing::debug;

use crate::identity::{home_path_for, normalize};
use crate::session::Session;

pub use table::{path_segments, Access, RouteRule, RouteTable};

pub const INVALID_ROLE_MESSAGE: &str = "invalid role";
pub const NO_PERMISSION_MESSAGE: &str = "You do not have permission to view this page";
pub const DEFAULT_LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "detail", rename_all = "snake_case")]
pub enum Decision {
    /// Session still restoring; show a placeholder.
    Loading,
    Render,
    RedirectToLogin,
    RedirectToLoginWithError(String),
    RedirectToRoleHome(String),
}

impl Decision {
    pub fn is_redirect(&self) -> bool {
        !matches!(self, Decision::Loading | Decision::Render)
    }
}

/// Decide whether `session` may view a route with the given allow-list.
/// `None` means any authenticated user. Rules are applied in order; first match wins.
pub fn decide<S: AsRef<str>>(session: &Session, allowed_roles: Option<&[S]>) -> Decision {
    if session.is_loading {
        return Decision::Loading;
    }
    if !session.has_token() {
        return Decision::RedirectToLogin;
    }
    let Some(role) = session.role() else {
        return Decision::RedirectToLoginWithError(INVALID_ROLE_MESSAGE.to_string());
    };
    let Some(allowed) = allowed_roles else {
        return Decision::Render;
    };
    let role = normalize(Some(role));
    if !role.is_empty() && allowed.iter().any(|a| normalize(Some(a.as_ref())) == role) {
        return Decision::Render;
    }
    Decision::RedirectToRoleHome(home_path_for(&role).to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavigationState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A redirect: target path plus the state the target view receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub path: String,
    pub state: NavigationState,
}

impl Navigation {
    /// Target path with the state folded into query parameters, for transports
    /// (HTTP `Location`, terminal output) that cannot carry a side payload.
    pub fn location(&self) -> String {
        let mut params: Vec<String> = Vec::new();
        if let Some(from) = &self.state.from {
            params.push(format!("from={}", urlencoding::encode(from)));
        }
        if let Some(err) = &self.state.error {
            params.push(format!("error={}", urlencoding::encode(err)));
        }
        if params.is_empty() { self.path.clone() } else { format!("{}?{}", self.path, params.join("&")) }
    }
}

/// Receives navigation side effects for non-render decisions.
pub trait Navigator {
    fn navigate(&mut self, to: &Navigation);
}

impl Navigator for Vec<Navigation> {
    fn navigate(&mut self, to: &Navigation) {
        self.push(to.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardOutcome {
    pub path: String,
    pub route: String,
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation: Option<Navigation>,
}

pub struct RouteGuard {
    table: RouteTable,
    login_path: String,
}

impl RouteGuard {
    pub fn new(table: RouteTable) -> Self {
        Self { table, login_path: DEFAULT_LOGIN_PATH.to_string() }
    }

    pub fn with_login_path(mut self, login_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self
    }

    pub fn table(&self) -> &RouteTable { &self.table }

    pub fn login_path(&self) -> &str { &self.login_path }

    /// Evaluate a navigation to `path`. `None` when no route matches.
    pub fn check(&self, path: &str, session: &Session) -> Option<GuardOutcome> {
        let rule = self.table.lookup(path)?;
        let decision = if rule.is_public() {
            Decision::Render
        } else {
            decide(session, rule.access.allowed_roles())
        };
        let navigation = self.navigation_for(path, &decision);
        debug!(target: "guard", "path={} route={} decision={:?}", path, rule.name, decision);
        Some(GuardOutcome { path: path.to_string(), route: rule.name.clone(), decision, navigation })
    }

    /// Like [`RouteGuard::check`], and performs the redirect through `navigator`.
    pub fn enforce(&self, path: &str, session: &Session, navigator: &mut dyn Navigator) -> Option<Decision> {
        let outcome = self.check(path, session)?;
        if let Some(nav) = &outcome.navigation {
            navigator.navigate(nav);
        }
        Some(outcome.decision)
    }

    fn navigation_for(&self, requested: &str, decision: &Decision) -> Option<Navigation> {
        match decision {
            Decision::Loading | Decision::Render => None,
            Decision::RedirectToLogin => Some(Navigation {
                path: self.login_path.clone(),
                state: NavigationState { from: Some(requested.to_string()), error: None },
            }),
            Decision::RedirectToLoginWithError(msg) => Some(Navigation {
                path: self.login_path.clone(),
                state: NavigationState { from: Some(requested.to_string()), error: Some(msg.clone()) },
            }),
            Decision::RedirectToRoleHome(home) => Some(Navigation {
                path: home.clone(),
                state: NavigationState { from: None, error: Some(NO_PERMISSION_MESSAGE.to_string()) },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Principal, Role};

    fn signed_in(role: &str) -> Session {
        Session::authenticated("tok", Principal { role: role.into(), ..Default::default() })
    }

    fn undecodable() -> Session {
        Session { raw_token: Some("tok".into()), principal: None, is_loading: false }
    }

    #[test]
    fn loading_comes_first() {
        assert_eq!(decide(&Session::loading(), Some(&["doctor"][..])), Decision::Loading);
    }

    #[test]
    fn scenario_no_token_redirects_to_login() {
        assert_eq!(decide(&Session::empty(), Some(&["doctor"][..])), Decision::RedirectToLogin);
        assert_eq!(decide::<&str>(&Session::empty(), None), Decision::RedirectToLogin);
    }

    #[test]
    fn scenario_allowed_role_renders() {
        assert_eq!(decide(&signed_in("doctor"), Some(&["doctor", "nurse"][..])), Decision::Render);
    }

    #[test]
    fn scenario_disallowed_role_goes_home() {
        assert_eq!(
            decide(&signed_in("patient"), Some(&["super_admin"][..])),
            Decision::RedirectToRoleHome("/patient".into())
        );
    }

    #[test]
    fn scenario_undecodable_role() {
        assert_eq!(
            decide(&undecodable(), Some(&["doctor"][..])),
            Decision::RedirectToLoginWithError("invalid role".into())
        );
        assert_eq!(decide::<&str>(&undecodable(), None), Decision::RedirectToLoginWithError("invalid role".into()));
    }

    #[test]
    fn absent_allow_list_admits_any_role() {
        assert_eq!(decide::<&str>(&signed_in("night_janitor"), None), Decision::Render);
    }

    #[test]
    fn allow_list_entries_are_normalized() {
        assert_eq!(decide(&signed_in("clinician_admin"), Some(&["Clinician-Admin"][..])), Decision::Render);
        assert_eq!(decide(&signed_in("lab_technician"), Some(&["Lab Tech"][..])), Decision::Render);
    }

    #[test]
    fn unknown_role_falls_back_to_default_home() {
        assert_eq!(decide(&signed_in("janitor"), Some(&["doctor"][..])), Decision::RedirectToRoleHome("/".into()));
    }

    #[test]
    fn every_role_outside_allow_list_never_renders() {
        for role in Role::ALL {
            let others: Vec<&str> = Role::ALL.iter().filter(|r| **r != role).map(|r| r.as_str()).collect();
            let d = decide(&signed_in(role.as_str()), Some(others.as_slice()));
            assert_eq!(d, Decision::RedirectToRoleHome(role.home_path().into()));
            assert_eq!(decide(&signed_in(role.as_str()), Some(&[role.as_str()][..])), Decision::Render);
        }
    }

    fn guard() -> RouteGuard {
        let table = RouteTable::new(vec![
            RouteRule::public("/login", "login").unwrap(),
            RouteRule::roles("/doctor/*", "doctor", &[Role::Doctor]).unwrap(),
            RouteRule::authenticated("/profile", "profile").unwrap(),
        ])
        .unwrap();
        RouteGuard::new(table)
    }

    #[test]
    fn public_routes_ignore_session() {
        let out = guard().check("/login", &Session::loading()).unwrap();
        assert_eq!(out.decision, Decision::Render);
        assert!(out.navigation.is_none());
    }

    #[test]
    fn unknown_paths_are_not_routes() {
        assert!(guard().check("/nowhere", &Session::empty()).is_none());
    }

    #[test]
    fn redirect_to_login_preserves_origin() {
        let mut nav: Vec<Navigation> = Vec::new();
        let d = guard().enforce("/doctor/schedule", &Session::empty(), &mut nav).unwrap();
        assert_eq!(d, Decision::RedirectToLogin);
        assert_eq!(nav.len(), 1);
        assert_eq!(nav[0].path, "/login");
        assert_eq!(nav[0].state.from.as_deref(), Some("/doctor/schedule"));
        assert_eq!(nav[0].location(), "/login?from=%2Fdoctor%2Fschedule");
    }

    #[test]
    fn role_home_redirect_carries_permission_message() {
        let mut nav: Vec<Navigation> = Vec::new();
        let d = guard().enforce("/doctor", &signed_in("nurse"), &mut nav).unwrap();
        assert_eq!(d, Decision::RedirectToRoleHome("/nurse".into()));
        assert_eq!(nav[0].state.error.as_deref(), Some(NO_PERMISSION_MESSAGE));
        assert!(nav[0].state.from.is_none());
    }

    #[test]
    fn render_and_loading_do_not_navigate() {
        let mut nav: Vec<Navigation> = Vec::new();
        guard().enforce("/doctor", &signed_in("doctor"), &mut nav);
        guard().enforce("/profile", &Session::loading(), &mut nav);
        assert!(nav.is_empty());
    }

    #[test]
    fn custom_login_path() {
        let g = guard().with_login_path("/signin");
        let out = g.check("/profile", &undecodable()).unwrap();
        let nav = out.navigation.unwrap();
        assert_eq!(nav.location(), "/signin?from=%2Fprofile&error=invalid%20role");
    }

    #[test]
    fn decision_serialization() {
        let v = serde_json::to_value(Decision::RedirectToRoleHome("/patient".into())).unwrap();
        assert_eq!(v, serde_json::json!({"decision": "redirect_to_role_home", "detail": "/patient"}));
        let v = serde_json::to_value(Decision::Render).unwrap();
        assert_eq!(v, serde_json::json!({"decision": "render"}));
    }
}
