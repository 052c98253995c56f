use clap::{Parser, Subcommand, ValueEnum};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Client for the authentication gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080", env = "GATEWAY_URL")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the gateway answers
    Ping,
    /// Mint a signed token for the demo user
    Token,
    /// Fetch the profile resolved from a credential
    Profile {
        #[arg(short, long, value_enum)]
        scheme: Scheme,

        #[arg(short, long)]
        credential: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Scheme {
    Jwt,
    Apikey,
    Oauth,
    Bearer,
}

impl Scheme {
    fn path(self) -> &'static str {
        match self {
            Scheme::Jwt => "/api/v1/jwt/profile",
            Scheme::Apikey => "/api/v1/apikey/profile",
            Scheme::Oauth => "/api/v1/oauth/profile",
            Scheme::Bearer => "/api/v1/profile",
        }
    }

    fn headers(self, credential: &str) -> Result<HeaderMap, Box<dyn std::error::Error>> {
        let mut headers = HeaderMap::new();
        match self {
            Scheme::Apikey => {
                headers.insert("x-api-key", HeaderValue::from_str(credential)?);
            }
            Scheme::Jwt | Scheme::Oauth => {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {credential}"))?,
                );
            }
            // Introspection tokens are forwarded verbatim.
            Scheme::Bearer => {
                headers.insert(AUTHORIZATION, HeaderValue::from_str(credential)?);
            }
        }
        Ok(headers)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Ping => {
            let res = client.get(format!("{base}/api/v1/ping")).send().await?;
            print_response(res).await?;
        }
        Commands::Token => {
            let res = client.get(format!("{base}/api/v1/token")).send().await?;
            print_response(res).await?;
        }
        Commands::Profile { scheme, credential } => {
            let res = client
                .get(format!("{base}{}", scheme.path()))
                .headers(scheme.headers(&credential)?)
                .send()
                .await?;
            if let Some(cache) = res.headers().get("x-token-cache") {
                eprintln!("X-Token-Cache: {}", cache.to_str().unwrap_or("?"));
            }
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: gateway returned status {status}");
        eprintln!("Response: {text}");
        return Ok(());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}
