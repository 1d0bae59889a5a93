//! Terminal client: signs in against the clinic API, keeps the token in the local
//! storage file and asks the route guard what a navigation would do.
//!
//! Every command returns its output as a string so the binary and the REPL can
//! print it and tests can assert on it.

mod table;

use std::sync::Arc;

use tracing::debug;

use crate::config::GateConfig;
use crate::error::{AppError, AppResult};
use crate::guard::{Access, Decision, RouteGuard};
use crate::identity::{Principal, Role};
use crate::routes::clinic_routes;
use crate::session::{Credentials, FileStorage, HttpCredentialExchange, SessionStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: String, password: String },
    Logout,
    Whoami,
    Check { path: String },
    Routes,
    /// Sign a development token locally; `store` also signs in with it.
    Mint { role: String, email: Option<String>, subject: Option<String>, store: bool },
    Help,
}

pub const USAGE: &str = "Usage:
  clinic_gate_cli login <email> <password>   exchange credentials for a token and store it
  clinic_gate_cli logout                     forget the stored token
  clinic_gate_cli whoami                     show the signed-in principal
  clinic_gate_cli check <path>               what the guard does when navigating to <path>
  clinic_gate_cli routes                     list the routing table
  clinic_gate_cli mint <role> [--email E] [--subject S] [--store]
                                             sign a local token (needs a JWT secret)
  clinic_gate_cli --repl                     interactive mode; same commands, one per line

Flags: --api-base URL, --token-file PATH, --jwt-secret S, --login-path P, --no-verify";

/// Flags that take a value; skipped when collecting positional arguments.
const VALUE_FLAGS: &[&str] = &[
    "--http-port", "--bind", "--api-base", "--jwt-secret", "--token-file", "--access-ttl-minutes",
    "--refresh-ttl-days", "--storage-poll-ms", "--login-path", "--request-timeout-secs", "--email", "--subject",
];

fn positionals(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let a = args[i].as_str();
        if VALUE_FLAGS.contains(&a) {
            i += 2;
            continue;
        }
        if !a.starts_with("--") { out.push(a); }
        i += 1;
    }
    out
}

/// Parse a command from arguments with the program name already removed.
pub fn parse_command(args: &[String]) -> AppResult<Command> {
    let pos = positionals(args);
    let missing = |what: &str| AppError::config("usage", format!("missing {}\n\n{}", what, USAGE));
    let Some(verb) = pos.first() else { return Ok(Command::Help) };
    let cmd = match verb.to_ascii_lowercase().as_str() {
        "login" => Command::Login {
            email: pos.get(1).ok_or_else(|| missing("<email>"))?.to_string(),
            password: pos.get(2).ok_or_else(|| missing("<password>"))?.to_string(),
        },
        "logout" => Command::Logout,
        "whoami" | "status" => Command::Whoami,
        "check" => Command::Check { path: pos.get(1).ok_or_else(|| missing("<path>"))?.to_string() },
        "routes" => Command::Routes,
        "mint" => Command::Mint {
            role: pos.get(1).ok_or_else(|| missing("<role>"))?.to_string(),
            email: crate::config::flag_value(args, "--email").map(str::to_string),
            subject: crate::config::flag_value(args, "--subject").map(str::to_string),
            store: crate::config::has_flag(args, "--store"),
        },
        "help" => Command::Help,
        other => return Err(AppError::config("usage", format!("unknown command '{}'\n\n{}", other, USAGE))),
    };
    Ok(cmd)
}

pub struct Cli {
    config: GateConfig,
    store: Arc<SessionStore>,
    guard: RouteGuard,
}

impl Cli {
    /// Open the storage file named by `config` and restore whatever session it holds.
    pub fn open(config: GateConfig) -> AppResult<Self> {
        let storage = Arc::new(FileStorage::new(config.token_file.clone()));
        let store = Arc::new(SessionStore::open(storage, config.decoder()));
        let guard = RouteGuard::new(clinic_routes()?).with_login_path(config.login_path.clone());
        Ok(Self { config, store, guard })
    }

    pub fn store(&self) -> &Arc<SessionStore> { &self.store }

    pub async fn run(&self, cmd: Command) -> AppResult<String> {
        debug!(target: "cli", "command={:?}", cmd);
        match cmd {
            Command::Help => Ok(USAGE.to_string()),
            Command::Login { email, password } => {
                let exchange = HttpCredentialExchange::new(&self.config.api_base, self.config.request_timeout())?;
                let p = self.store.login_with(&exchange, &Credentials::new(email, password)).await?;
                Ok(signed_in_line(&p))
            }
            Command::Logout => {
                self.store.logout()?;
                Ok("signed out".to_string())
            }
            Command::Whoami => Ok(self.whoami()),
            Command::Check { path } => self.check(&path),
            Command::Routes => Ok(self.routes()),
            Command::Mint { role, email, subject, store } => self.mint(&role, email, subject, store),
        }
    }

    fn whoami(&self) -> String {
        let s = self.store.snapshot();
        match &s.principal {
            Some(p) => {
                let mut line = signed_in_line(p);
                if let Some(exp) = p.expires_at {
                    line.push_str(&format!("; expires {}", exp.to_rfc3339()));
                }
                line
            }
            None => "not signed in".to_string(),
        }
    }

    fn check(&self, path: &str) -> AppResult<String> {
        let session = self.store.snapshot();
        let outcome = self
            .guard
            .check(path, &session)
            .ok_or_else(|| AppError::config("no_route", format!("no screen at {}", path)))?;
        let verdict = match &outcome.decision {
            Decision::Loading => "loading".to_string(),
            Decision::Render => "render".to_string(),
            Decision::RedirectToLogin => "redirect to login".to_string(),
            Decision::RedirectToLoginWithError(e) => format!("redirect to login ({})", e),
            Decision::RedirectToRoleHome(home) => format!("redirect to role home {}", home),
        };
        let mut line = format!("{} [{}]: {}", path, outcome.route, verdict);
        if let Some(nav) = &outcome.navigation {
            line.push_str(&format!(" -> {}", nav.location()));
        }
        Ok(line)
    }

    fn routes(&self) -> String {
        let rows: Vec<Vec<String>> = self
            .guard
            .table()
            .rules()
            .iter()
            .map(|r| {
                let access = match &r.access {
                    Access::Public => "public".to_string(),
                    Access::Authenticated => "any signed-in user".to_string(),
                    Access::Roles(roles) => roles.join(", "),
                };
                vec![r.pattern.clone(), r.name.clone(), access]
            })
            .collect();
        table::render(&["pattern", "screen", "access"], &rows)
    }

    fn mint(&self, role: &str, email: Option<String>, subject: Option<String>, store: bool) -> AppResult<String> {
        let issuer = self
            .config
            .issuer()
            .ok_or_else(|| AppError::config("missing_secret", "minting tokens requires a JWT secret (--jwt-secret)"))?;
        let role = Role::parse(role).ok_or_else(|| AppError::config("unknown_role", format!("'{}' is not a clinic role", role)))?;
        let principal = Principal {
            subject: subject.or_else(|| email.clone()),
            email,
            role: role.as_str().to_string(),
            ..Default::default()
        };
        let pair = issuer.issue_pair(&principal)?;
        if store {
            let p = self.store.login(&pair.access_token)?;
            return Ok(signed_in_line(&p));
        }
        serde_json::to_string_pretty(&pair).map_err(|e| AppError::internal("serialize", e.to_string()))
    }
}

fn signed_in_line(p: &Principal) -> String {
    format!("signed in as {} ({}); home {}", p.display_name(), p.role, crate::identity::home_path_for(&p.role))
}
