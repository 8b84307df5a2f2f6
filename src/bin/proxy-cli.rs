use clap::{Parser, Subcommand};
use reqwest::header::{HeaderValue, HOST};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for the rewriting proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:6688")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop and reload every site bundle
    ReloadAll,
    /// Reload one site bundle by directory name
    Reload {
        name: String,
    },
    /// Reload the bundle that serves a front host
    ReloadHost {
        host: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder().no_proxy().build()?;

    let res = match cli.command {
        Commands::ReloadAll => {
            client
                .post(format!("{}/reload_all_configs", cli.url))
                .send()
                .await?
        }
        Commands::Reload { name } => {
            client
                .post(format!("{}/reload_specific_config", cli.url))
                .query(&[("config_name", name)])
                .send()
                .await?
        }
        Commands::ReloadHost { host } => {
            client
                .post(format!("{}/reload_config", cli.url))
                .header(HOST, HeaderValue::from_str(&host)?)
                .send()
                .await?
        }
    };
    print_response(res).await?;

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: proxy returned status {}", status);
        eprintln!("Response: {}", text);
        return Ok(());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
