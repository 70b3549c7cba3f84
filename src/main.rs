use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use chatbot_market::{
    chat::{ChatUsage, CompletionClient, OpenAiCompletionClient},
    config::{ContractAddresses, Network, NetworkConfig, DEFAULT_WALLET_POLL},
    events::EventBus,
    gateway::parse_address_input,
    image::{ImageLimits, ImageNormalizer},
    metadata::ChatbotMetadata,
    routes,
    state::AppState,
    Gateway, HttpProvider, Provider, WalletConnector,
};

#[derive(Debug, Parser)]
#[command(name = "chatbot-market")]
#[command(about = "Chatbot marketplace wallet, contract and chat backend")]
struct Cli {
    #[command(flatten)]
    chain: ChainArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ChainArgs {
    /// Network preset. Only the chain settings change: the contract
    /// addresses stay the XRPL EVM deployments unless overridden with
    /// --nft-address, --token-address and --factory-address.
    #[arg(long, env = "NETWORK", value_enum, default_value = "xrpl-evm", global = true)]
    network: Network,

    /// JSON-RPC URL for read-only queries (overrides the preset).
    #[arg(long, env = "RPC_URL", global = true)]
    rpc_url: Option<String>,

    /// JSON-RPC endpoint holding the signing accounts (e.g. a local Hardhat node).
    #[arg(long, env = "WALLET_URL", global = true)]
    wallet_url: Option<String>,

    /// Chain id the wallet must be on (overrides the preset).
    #[arg(long, env = "CHAIN_ID", global = true)]
    chain_id: Option<u64>,

    #[arg(long, env = "NFT_ADDRESS", global = true)]
    nft_address: Option<String>,

    #[arg(long, env = "TOKEN_ADDRESS", global = true)]
    token_address: Option<String>,

    #[arg(long, env = "FACTORY_ADDRESS", global = true)]
    factory_address: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the local API and WebSocket server.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "3000")]
        port: u16,

        /// Directory containing the built UI static files.
        #[arg(long, default_value = "./ui")]
        ui_dir: PathBuf,

        /// OpenAI-compatible API base URL, e.g. https://api.openai.com/v1.
        #[arg(long, env = "CHAT_API_URL")]
        chat_api_url: Option<String>,

        #[arg(long, env = "CHAT_API_KEY", hide_env_values = true)]
        chat_api_key: Option<String>,

        #[arg(long, env = "CHAT_MODEL", default_value = "gpt-4o-mini")]
        chat_model: String,

        /// Size limits applied to uploaded chatbot images.
        #[arg(long, value_enum, default_value = "avatar")]
        image_preset: ImagePreset,
    },
    /// Normalize an image file and print it as a data URI.
    Compress {
        file: PathBuf,

        #[arg(long, value_enum, default_value = "avatar")]
        preset: ImagePreset,

        /// Write the data URI here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print a chatbot's metadata, owner and mint status.
    Show { address: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ImagePreset {
    Avatar,
    Detail,
}

impl From<ImagePreset> for ImageLimits {
    fn from(preset: ImagePreset) -> Self {
        match preset {
            ImagePreset::Avatar => ImageLimits::avatar(),
            ImagePreset::Detail => ImageLimits::detail(),
        }
    }
}

impl ChainArgs {
    fn network(&self) -> NetworkConfig {
        let mut network = NetworkConfig::preset(self.network);
        if let Some(ref url) = self.rpc_url {
            network.rpc_url = url.clone();
        }
        if let Some(id) = self.chain_id {
            network.chain_id = id;
        }
        network
    }

    fn addresses(&self) -> Result<ContractAddresses> {
        ContractAddresses::xrpl_evm().with_overrides(
            self.nft_address.as_deref(),
            self.token_address.as_deref(),
            self.factory_address.as_deref(),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatbot_market=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            port,
            ui_dir,
            chat_api_url,
            chat_api_key,
            chat_model,
            image_preset,
        } => {
            let completion = chat_api_url.map(|url| {
                tracing::info!(url = %url, model = %chat_model, "chat completion configured");
                Arc::new(OpenAiCompletionClient::new(url, chat_api_key, chat_model))
                    as Arc<dyn CompletionClient>
            });
            serve(&cli.chain, port, ui_dir, completion, image_preset.into()).await
        }
        Command::Compress {
            file,
            preset,
            output,
        } => compress(file, preset.into(), output),
        Command::Show { address } => show(&cli.chain, &address).await,
    }
}

async fn serve(
    chain: &ChainArgs,
    port: u16,
    ui_dir: PathBuf,
    completion: Option<Arc<dyn CompletionClient>>,
    image_limits: ImageLimits,
) -> Result<()> {
    let network = chain.network();
    let addresses = chain.addresses()?;
    tracing::info!(chain = %network.name, chain_id = network.chain_id, rpc_url = %network.rpc_url, "starting chatbot-market");

    let events = EventBus::new(64);

    let wallet_http = chain.wallet_url.as_ref().map(|url| {
        tracing::info!(wallet_url = %url, "wallet endpoint configured");
        Arc::new(HttpProvider::new(url.clone()))
    });
    if wallet_http.is_none() {
        tracing::warn!("no wallet endpoint configured; transactions are disabled");
    }
    let _wallet_poller = wallet_http.as_ref().map(|p| p.watch(DEFAULT_WALLET_POLL));
    let wallet: Option<Arc<dyn Provider>> = wallet_http.map(|p| p as Arc<dyn Provider>);

    let connector = WalletConnector::new(wallet.clone(), network.clone(), Some(events.clone()));
    let _subscription = connector.attach();
    let status = connector.refresh().await;
    tracing::info!(connected = status.connected, address = ?status.address, "wallet status");

    let reader: Arc<dyn Provider> = Arc::new(HttpProvider::new(network.rpc_url.clone()));
    let gateway = Gateway::new(reader, wallet, addresses).with_events(events.clone());

    let state = Arc::new(AppState {
        ui_dir,
        network,
        events,
        wallet: connector,
        gateway: Arc::new(gateway),
        completion,
        chat_usage: ChatUsage::new(),
        image_limits,
    });

    let app = routes::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "server listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn compress(file: PathBuf, limits: ImageLimits, output: Option<PathBuf>) -> Result<()> {
    let bytes = std::fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;

    let normalized = ImageNormalizer::new(limits)
        .normalize_bytes(&bytes)
        .with_context(|| format!("failed to normalize {}", file.display()))?;

    tracing::info!(
        width = normalized.width,
        height = normalized.height,
        quality = normalized.quality,
        passes = normalized.passes,
        size = normalized.data_uri.len(),
        within_budget = normalized.within_budget,
        "image normalized"
    );
    if normalized.data_uri.len() > limits.fallback_bytes() {
        tracing::warn!("image exceeds the fallback size; the UI will use a generated avatar");
    }

    match output {
        Some(path) => std::fs::write(&path, &normalized.data_uri)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", normalized.data_uri),
    }
    Ok(())
}

async fn show(chain: &ChainArgs, address: &str) -> Result<()> {
    let network = chain.network();
    let reader: Arc<dyn Provider> = Arc::new(HttpProvider::new(network.rpc_url.clone()));
    let gateway = Gateway::new(reader, None, chain.addresses()?);

    let chatbot = parse_address_input(address)?;
    let raw = gateway
        .chatbot_prompt_template(chatbot)
        .await
        .context("failed to read prompt template")?;
    let contract = gateway
        .chatbot_ref(chatbot)
        .await
        .context("failed to read chatbot contract")?;

    let out = serde_json::json!({
        "contract": contract,
        "metadata": ChatbotMetadata::from_prompt_template(&raw),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
