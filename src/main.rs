//!
//! clinic-gate server binary
//! -------------------------
//! Starts the HTTP gate. Configuration comes from `CLINIC_GATE_*` environment
//! variables, overridden by command-line flags.

use std::env;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use clinic_gate::config::{has_flag, GateConfig};

const HELP: &str = "clinic-gate server

USAGE:
  clinic-gate [--http-port N] [--bind ADDR] [--jwt-secret S] [--login-path P] [--verify|--no-verify]

OPTIONS:
  --http-port N        HTTP port (env: CLINIC_GATE_HTTP_PORT, default 8080)
  --bind ADDR          Bind address (env: CLINIC_GATE_BIND, default 0.0.0.0)
  --jwt-secret S       HS256 secret; enables signature checks and /auth/refresh (env: CLINIC_GATE_JWT_SECRET)
  --login-path P       Where unauthenticated navigations are sent (env: CLINIC_GATE_LOGIN_PATH, default /login)
  --access-ttl-minutes N, --refresh-ttl-days N
                       Lifetimes of refreshed tokens (defaults 60 minutes / 7 days)
  --verify | --no-verify
                       Force signature verification on or off (env: CLINIC_GATE_VERIFY_TOKENS)
";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", HELP);
        return Ok(());
    }

    let config = GateConfig::from_env().apply_args(&args)?;
    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(target: "gate", "clinic-gate starting: RUST_LOG='{}', config={:?}", rust_log, redacted(&config));

    clinic_gate::server::run(config).await
}

fn redacted(config: &GateConfig) -> GateConfig {
    GateConfig { jwt_secret: config.jwt_secret.as_ref().map(|_| "<set>".to_string()), ..config.clone() }
}
