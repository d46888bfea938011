use super::*;

#[derive(Clone, Debug, Parser)]
#[command(
    name = "stope",
    about = "Solo Bitcoin mining pool: a Stratum V1 work server backed by a local full node."
)]
pub(crate) struct Options {
    #[arg(long, env = "STRATUM_ADDRESS", help = "Listen at <STRATUM_ADDRESS>.")]
    pub(crate) stratum_address: Option<String>,
    #[arg(long, env = "STRATUM_PORT", help = "Listen on <STRATUM_PORT>.")]
    pub(crate) stratum_port: Option<u16>,
    #[arg(
        long,
        env = "POOL_NAME",
        help = "Tag coinbases with <POOL_NAME>, framed in forward slashes."
    )]
    pub(crate) pool_name: Option<String>,
    #[arg(
        long,
        env = "DIFFICULTY",
        help = "Give <DIFFICULTY> to newly subscribed clients."
    )]
    pub(crate) difficulty: Option<String>,
    #[arg(
        long,
        env = "UPDATE_INTERVAL",
        help = "Fetch a fresh block template every <UPDATE_INTERVAL> seconds."
    )]
    pub(crate) update_interval: Option<u64>,
    #[arg(long, env = "NETWORK", help = "Mine on <NETWORK>.")]
    pub(crate) network: Option<Chain>,
    #[arg(
        long,
        env = "BITCOIN_RPC_HOST",
        help = "Reach bitcoind at <BITCOIN_RPC_HOST>."
    )]
    pub(crate) bitcoin_rpc_host: Option<String>,
    #[arg(
        long,
        env = "BITCOIN_RPC_PORT",
        help = "Reach bitcoind on <BITCOIN_RPC_PORT>."
    )]
    pub(crate) bitcoin_rpc_port: Option<u16>,
    #[arg(
        long,
        env = "BITCOIN_RPC_USER",
        help = "Authenticate to bitcoind as <BITCOIN_RPC_USER>."
    )]
    pub(crate) bitcoin_rpc_user: Option<String>,
    #[arg(
        long,
        env = "BITCOIN_RPC_PASSWORD",
        help = "Authenticate to bitcoind with <BITCOIN_RPC_PASSWORD>."
    )]
    pub(crate) bitcoin_rpc_password: Option<String>,
}

impl Options {
    pub(crate) fn stratum_address(&self) -> String {
        self.stratum_address
            .clone()
            .unwrap_or_else(|| "0.0.0.0".into())
    }

    pub(crate) fn stratum_port(&self) -> u16 {
        self.stratum_port.unwrap_or(3333)
    }

    pub(crate) fn pool_name(&self) -> String {
        self.pool_name.clone().unwrap_or_else(|| "stope".into())
    }

    pub(crate) fn difficulty(&self) -> Difficulty {
        self.difficulty
            .as_deref()
            .and_then(|difficulty| difficulty.parse().ok())
            .unwrap_or_else(|| Difficulty::from(64))
    }

    pub(crate) fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval.unwrap_or(10))
    }

    pub(crate) fn chain(&self) -> Chain {
        self.network.unwrap_or_default()
    }

    pub(crate) fn bitcoin_rpc_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.bitcoin_rpc_host.as_deref().unwrap_or("127.0.0.1"),
            self.bitcoin_rpc_port
                .unwrap_or_else(|| self.chain().default_rpc_port()),
        )
    }

    pub(crate) fn bitcoin_credentials(&self) -> Result<Auth> {
        match (&self.bitcoin_rpc_user, &self.bitcoin_rpc_password) {
            (Some(user), Some(password)) => Ok(Auth::UserPass(user.clone(), password.clone())),
            (None, None) => Ok(Auth::None),
            _ => bail!("BITCOIN_RPC_USER and BITCOIN_RPC_PASSWORD must be given together"),
        }
    }

    pub(crate) fn bitcoin_rpc_client(&self) -> Result<bitcoincore_rpc::Client> {
        let url = self.bitcoin_rpc_url();
        bitcoincore_rpc::Client::new(&url, self.bitcoin_credentials()?)
            .with_context(|| format!("failed to connect to bitcoind at {url}"))
    }
}
