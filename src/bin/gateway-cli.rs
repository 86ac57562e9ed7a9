use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the security gateway admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway system status
    Status,
    /// List active security alerts
    Alerts,
    /// Resolve an alert by id
    Resolve { id: String },
    /// View security metrics for a trailing window
    Metrics {
        #[arg(short, long, default_value_t = 60)]
        window_mins: u64,
    },
    /// Query the audit trail
    Audit {
        /// Filter by event name
        #[arg(short, long)]
        event: Option<String>,
        /// Filter by client IP
        #[arg(short, long)]
        client_ip: Option<String>,
        #[arg(short, long)]
        page: Option<usize>,
    },
    /// Ban an IP
    Ban {
        ip: String,
        #[arg(short, long, default_value = "manual ban via cli")]
        reason: String,
        #[arg(short, long, default_value_t = 3600)]
        duration_secs: u64,
    },
    /// Lift a ban
    Unban { ip: String },
    /// Show rate limiter usage
    Usage,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Alerts => {
            let res = client.get(format!("{}/admin/alerts", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Resolve { id } => {
            let res = client.post(format!("{}/admin/alerts/{}/resolve", cli.url, id))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Metrics { window_mins } => {
            let res = client.get(format!("{}/admin/metrics", cli.url))
                .query(&[("window_mins", window_mins)])
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Audit { event, client_ip, page } => {
            let mut query: Vec<(&str, String)> = Vec::new();
            if let Some(event) = event {
                query.push(("event", event));
            }
            if let Some(client_ip) = client_ip {
                query.push(("client_ip", client_ip));
            }
            if let Some(page) = page {
                query.push(("page", page.to_string()));
            }
            let res = client.get(format!("{}/admin/audit", cli.url))
                .query(&query)
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Ban { ip, reason, duration_secs } => {
            let res = client.post(format!("{}/admin/bans", cli.url))
                .headers(headers)
                .json(&serde_json::json!({
                    "ip": ip,
                    "reason": reason,
                    "duration_secs": duration_secs,
                }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Unban { ip } => {
            let res = client.delete(format!("{}/admin/bans/{}", cli.url, ip))
                .headers(headers)
                .send()
                .await?;
            let status = res.status();
            if status.is_success() {
                println!("Ban lifted");
            } else {
                eprintln!("Error: Admin API returned status {}", status);
            }
        }
        Commands::Usage => {
            let res = client.get(format!("{}/admin/limits/usage", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
