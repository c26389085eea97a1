use clap::Parser;
use ledger_core::{
    constants::{
        DEFAULT_BLOCK_REWARD, DEFAULT_DIFFICULTY_HEX_DIGITS, DEFAULT_MAX_TXS, DEFAULT_MINER,
        MAX_ZERO_BITS, MAX_ZERO_HEX_DIGITS, REWARD_SENDER,
    },
    CancelToken, Difficulty, LedgerConfig, MiningCoordinator,
};
use ledger_node::{constants::DEFAULT_LISTEN, router, AppState};
use std::net::SocketAddr;
use tracing::{info, Level};

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = DEFAULT_LISTEN)]
    listen: String,

    /// Leading zero hex digits every mined block hash needs
    #[arg(
        long,
        default_value_t = DEFAULT_DIFFICULTY_HEX_DIGITS,
        value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_ZERO_HEX_DIGITS))
    )]
    difficulty: u32,

    /// Leading zero bits instead of hex digits; overrides --difficulty
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_ZERO_BITS)))]
    difficulty_bits: Option<u32>,

    /// Amount paid to the miner of each block
    #[arg(long, default_value_t = DEFAULT_BLOCK_REWARD)]
    reward: f64,

    /// Reward recipient when a mine request names none
    #[arg(long, default_value = DEFAULT_MINER)]
    miner: String,

    /// Transactions per block when a mine request names no limit (0 = all pending)
    #[arg(long, default_value_t = DEFAULT_MAX_TXS)]
    max_txs: usize,
}

impl Args {
    fn ledger_config(&self) -> anyhow::Result<LedgerConfig> {
        let difficulty = match self.difficulty_bits {
            Some(bits) => Difficulty::ZeroBits(bits),
            None => Difficulty::ZeroHexDigits(self.difficulty),
        };
        anyhow::ensure!(
            difficulty.is_satisfiable(),
            "difficulty {difficulty} can never be met"
        );
        Ok(LedgerConfig {
            difficulty,
            block_reward: self.reward,
            reward_sender: REWARD_SENDER.to_string(),
            default_miner: self.miner.clone(),
            default_max_txs: self.max_txs,
        })
    }
}

async fn shutdown_signal(token: CancelToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down, cancelling in-flight mining");
    token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = args.ledger_config()?;
    info!(difficulty = %config.difficulty, reward = config.block_reward, "starting ledger");

    let coordinator = MiningCoordinator::from_config(config);
    let shutdown = coordinator.shutdown_token();
    let app = router(AppState::new(coordinator));

    let addr: SocketAddr = args.listen.parse()?;
    info!("ledger-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_flags_map_to_config() {
        let args = Args::try_parse_from(["ledger-node"]).unwrap();
        let config = args.ledger_config().unwrap();
        assert_eq!(config.difficulty, Difficulty::ZeroHexDigits(3));

        let args = Args::try_parse_from(["ledger-node", "--difficulty-bits", "256"]).unwrap();
        let config = args.ledger_config().unwrap();
        assert_eq!(config.difficulty, Difficulty::ZeroBits(256));

        let args = Args::try_parse_from(["ledger-node", "--difficulty", "64"]).unwrap();
        assert!(args.ledger_config().is_ok());
    }

    #[test]
    fn unreachable_difficulty_is_rejected() {
        assert!(Args::try_parse_from(["ledger-node", "--difficulty-bits", "257"]).is_err());
        assert!(Args::try_parse_from(["ledger-node", "--difficulty", "65"]).is_err());
        assert!(Args::try_parse_from(["ledger-node", "--difficulty", "-1"]).is_err());
    }
}
