use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the proof-of-work ledger node")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct Node {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    node: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a transaction
    Submit {
        #[command(flatten)]
        node: Node,
        /// Sender
        #[arg(long)]
        from: String,
        /// Recipient
        #[arg(long)]
        to: String,
        /// Amount, must be positive
        #[arg(long)]
        amount: f64,
    },
    /// List pending transactions
    Pending {
        #[command(flatten)]
        node: Node,
    },
    /// Mine a block from pending transactions
    Mine {
        #[command(flatten)]
        node: Node,
        /// Maximum transactions to include (0 = all pending)
        #[arg(long)]
        max_txs: Option<i64>,
        /// Reward recipient
        #[arg(long)]
        miner: Option<String>,
    },
    /// Print the full chain
    Chain {
        #[command(flatten)]
        node: Node,
    },
    /// Re-validate the chain on the node
    Validate {
        #[command(flatten)]
        node: Node,
    },
    /// Pending-inclusive balance of an address
    Balance {
        #[command(flatten)]
        node: Node,
        address: String,
    },
    /// Check that the node is up
    Ping {
        #[command(flatten)]
        node: Node,
    },
}

#[derive(Serialize)]
struct Tx {
    from: String,
    to: String,
    amount: f64,
}

#[derive(Serialize)]
struct MineReq {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_txs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    miner: Option<String>,
}

async fn print_response(res: reqwest::Response) -> Result<()> {
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    debug!(cmd = ?cli.cmd, "dispatching");
    let res = match cli.cmd {
        Command::Submit {
            node,
            from,
            to,
            amount,
        } => {
            let tx = Tx { from, to, amount };
            client
                .post(format!("{}/transactions", node.node))
                .json(&tx)
                .send()
                .await?
        }
        Command::Pending { node } => client.get(format!("{}/mempool", node.node)).send().await?,
        Command::Mine {
            node,
            max_txs,
            miner,
        } => {
            client
                .post(format!("{}/mine", node.node))
                .json(&MineReq { max_txs, miner })
                .send()
                .await?
        }
        Command::Chain { node } => client.get(format!("{}/chain", node.node)).send().await?,
        Command::Validate { node } => {
            client
                .get(format!("{}/chain/validate", node.node))
                .send()
                .await?
        }
        Command::Balance { node, address } => {
            client
                .get(format!("{}/balance/{address}", node.node))
                .send()
                .await?
        }
        Command::Ping { node } => client.get(format!("{}/ping", node.node)).send().await?,
    };
    print_response(res).await
}
