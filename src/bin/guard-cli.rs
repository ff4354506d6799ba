use std::path::PathBuf;

use axum::http::{Method, Uri};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use reqwest::header::{CONTENT_SECURITY_POLICY, SERVER};

use web_guard::config::{load_config, validate_config, AppConfig, ConfigError};
use web_guard::routing::{GuardTable, Resolution};
use web_guard::security::{CspNonce, CsrfExemptions, HeaderPolicy, UrlSigner};

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Inspect and exercise the web-guard request pipeline", long_about = None)]
struct Cli {
    /// Configuration file. Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the Content-Security-Policy value
    Csp {
        /// Nonce to place in script-src
        #[arg(long)]
        nonce: Option<String>,
    },
    /// List routes in match order with their guards
    Routes,
    /// Show which route a request resolves to
    Resolve {
        method: String,
        /// Path or absolute URL
        target: String,
    },
    /// Generate a signed URL for a route
    Sign {
        route: String,
        /// Route parameter as name=value
        #[arg(short, long = "param")]
        params: Vec<String>,
        /// Expire the link after this many minutes
        #[arg(long)]
        expires_in: Option<i64>,
    },
    /// Fetch a URL and report its security headers
    Probe { url: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = AppConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            config
        }
    };

    match cli.command {
        Commands::Csp { nonce } => {
            let policy = HeaderPolicy::from_config(&config.headers)?;
            let nonce = nonce.as_deref().map(CspNonce::from);
            println!("{}", policy.content_security_policy(nonce.as_ref()));
        }
        Commands::Routes => {
            let table = GuardTable::from_config(config.routes.iter())?;
            for route in table.routes() {
                println!(
                    "{:<7} {:<36} {:<22} {}",
                    route.method,
                    route.pattern.as_str(),
                    route.name,
                    route.guards.names().join(", ")
                );
            }
        }
        Commands::Resolve { method, target } => {
            let table = GuardTable::from_config(config.routes.iter())?;
            let method: Method = method.to_ascii_uppercase().parse()?;
            let uri: Uri = target.parse()?;

            match table.resolve(&method, uri.path()) {
                Resolution::Matched { route, params } => {
                    println!("route:  {}", route.name);
                    println!("guards: {}", route.guards.names().join(", "));
                    for (name, value) in params {
                        println!("param:  {} = {}", name, value);
                    }
                }
                Resolution::MethodNotAllowed => println!("405 Method Not Allowed"),
                Resolution::NotFound => println!("404 Not Found"),
            }

            let exemptions = CsrfExemptions::new(&config.csrf.except);
            let scheme = uri.scheme_str().unwrap_or("http");
            println!(
                "csrf exempt: {}",
                exemptions.is_exempt(&uri, uri.host(), scheme)
            );
        }
        Commands::Sign {
            route,
            params,
            expires_in,
        } => {
            let table = GuardTable::from_config(config.routes.iter())?;
            let route = table
                .get(&route)
                .ok_or_else(|| format!("no route named '{}'", route))?;

            let pairs: Vec<(&str, &str)> = params
                .iter()
                .map(|p| p.split_once('=').ok_or_else(|| format!("expected name=value, got '{}'", p)))
                .collect::<Result<_, _>>()?;
            let path = route
                .pattern
                .url(&pairs)
                .ok_or_else(|| format!("missing parameters for {}", route.pattern.as_str()))?;

            if config.app.key.is_empty() {
                return Err("app.key is not set; the server would reject this signature".into());
            }
            let signer = UrlSigner::new(&config.app.key);
            let url = match expires_in {
                Some(minutes) => signer.temporary(&path, &[], Duration::minutes(minutes), Utc::now()),
                None => signer.sign(&path, &[], None),
            };
            println!("{}", url);
        }
        Commands::Probe { url } => {
            let res = reqwest::Client::new().get(&url).send().await?;
            println!("status: {}", res.status());

            let headers = res.headers();
            for name in &config.headers.remove {
                let state = if headers.contains_key(name.as_str()) { "PRESENT" } else { "ok" };
                println!("removed {:<24} {}", name, state);
            }
            for name in &config.headers.blank {
                let state = match headers.get(name.as_str()) {
                    Some(v) if v.is_empty() => "ok",
                    Some(_) => "NOT BLANK",
                    None => "MISSING",
                };
                println!("blank   {:<24} {}", name, state);
            }
            match headers.get(CONTENT_SECURITY_POLICY) {
                Some(csp) => println!("csp     {}", csp.to_str().unwrap_or("<non-ascii>")),
                None => println!("csp     MISSING"),
            }
            if let Some(server) = headers.get(SERVER) {
                println!("server  {:?}", server);
            }
        }
    }

    Ok(())
}
