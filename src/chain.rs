use super::*;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Chain {
    #[default]
    Mainnet,
    Testnet,
    Signet,
    Regtest,
}

impl Chain {
    pub(crate) fn default_rpc_port(self) -> u16 {
        match self {
            Self::Mainnet => 8332,
            Self::Testnet => 18332,
            Self::Signet => 38332,
            Self::Regtest => 18443,
        }
    }
}

impl Display for Chain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Mainnet => "mainnet",
                Self::Testnet => "testnet",
                Self::Signet => "signet",
                Self::Regtest => "regtest",
            }
        )
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mainnet" | "main" | "bitcoin" => Ok(Self::Mainnet),
            "testnet" | "testnet4" | "test" => Ok(Self::Testnet),
            "signet" => Ok(Self::Signet),
            "regtest" => Ok(Self::Regtest),
            _ => bail!("unknown network `{s}`"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str() {
        assert_eq!("mainnet".parse::<Chain>().unwrap(), Chain::Mainnet);
        assert_eq!("regtest".parse::<Chain>().unwrap(), Chain::Regtest);
        assert!("florin".parse::<Chain>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for chain in [Chain::Mainnet, Chain::Testnet, Chain::Signet, Chain::Regtest] {
            assert_eq!(chain.to_string().parse::<Chain>().unwrap(), chain);
        }
    }
}
