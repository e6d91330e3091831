use cipher_loot::{
    Address,
    auth::{
        address_of,
        parse_signing_key,
    },
    prizes::Rarity,
};
use clap::{
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use ed25519_dalek::SigningKey;
use loot_cli::{
    DEFAULT_NODE_URL,
    NodeClient,
    reveal_draw,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Draw and reveal encrypted loot", long_about = None)]
struct Cli {
    #[arg(long, default_value = DEFAULT_NODE_URL)]
    node_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the address owned by a secret key
    Account {
        #[arg(long, value_parser = parse_key)]
        secret_key: SigningKey,
    },
    /// Draw one encrypted loot box
    Draw {
        #[arg(long, value_parser = parse_key)]
        secret_key: SigningKey,
    },
    /// Show the encrypted handles of one draw
    Result { player: Address, draw_id: u64 },
    /// Show the player's most recent draw
    Latest { player: Address },
    History {
        player: Address,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long, default_value_t = 10)]
        limit: u64,
    },
    Count { player: Address },
    Stats,
    /// Print the drop rates of each tier
    Odds,
    /// Decrypt a draw and show the card it resolved to (latest by default)
    Decrypt {
        #[arg(long, value_parser = parse_key)]
        secret_key: SigningKey,
        draw_id: Option<u64>,
    },
}

fn parse_key(raw: &str) -> Result<SigningKey, String> {
    parse_signing_key(raw).map_err(|e| format!("invalid secret key: {e}"))
}

fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_some() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();
    let cli = Cli::parse();
    let client = NodeClient::new(&cli.node_url)?;

    match cli.command {
        Command::Account { secret_key } => {
            println!("{}", address_of(&secret_key.verifying_key()));
        }
        Command::Draw { secret_key } => {
            let record = client.draw(&secret_key).await?;
            println!(
                "Draw #{} for {} mined in block {} at {}",
                record.event.draw_id,
                record.event.player,
                record.block_height,
                record.event.timestamp
            );
            println!("  rarity  {}", record.event.rarity_handle);
            println!("  variant {}", record.event.variant_handle);
        }
        Command::Result { player, draw_id } => {
            match client.encrypted_result(&player, draw_id).await? {
                Some(result) => {
                    println!("Draw #{draw_id} at {}", result.timestamp);
                    println!("  rarity  {}", result.rarity);
                    println!("  variant {}", result.variant);
                }
                None => println!("{player} has no draw #{draw_id}"),
            }
        }
        Command::Latest { player } => {
            let latest = client.latest(&player).await?;
            if latest.draw_id == 0 {
                println!("{player} has not drawn yet");
            } else {
                println!("Draw #{} at {}", latest.draw_id, latest.timestamp);
                println!("  rarity  {}", latest.rarity);
                println!("  variant {}", latest.variant);
            }
        }
        Command::History {
            player,
            offset,
            limit,
        } => {
            let history = client.history(&player, offset, limit).await?;
            if history.is_empty() {
                println!("No draws for {player} from offset {offset}");
            }
            for (i, timestamp) in history.timestamps.iter().enumerate() {
                println!(
                    "#{:<4} {timestamp}  {}  {}",
                    offset + i as u64 + 1,
                    history.rarities[i],
                    history.variants[i]
                );
            }
        }
        Command::Count { player } => {
            let count = client.draw_count(&player).await?;
            println!("{count}");
        }
        Command::Stats => {
            let stats = client.stats().await?;
            println!("contract     {}", stats.contract);
            println!("protocol id  {}", stats.protocol_id);
            println!("total draws  {}", stats.total_draws);
            println!("block height {}", stats.block_height);
        }
        Command::Odds => {
            let config = client
                .probability_config()
                .await
                .wrap_err("could not read probability config")?;
            for rarity in Rarity::ALL {
                let meta = rarity.meta();
                println!(
                    "{:<4} {:>6.2}%  {}",
                    rarity.to_string(),
                    config.percent(rarity),
                    meta.title
                );
            }
        }
        Command::Decrypt {
            secret_key,
            draw_id,
        } => {
            let player = address_of(&secret_key.verifying_key());
            match reveal_draw(&client, &secret_key, draw_id).await? {
                Some(loot) => {
                    println!(
                        "Draw #{}: {} {} ({})",
                        loot.draw_id, loot.meta.rarity, loot.card.name, loot.card.codename
                    );
                    println!("  {}", loot.card.description);
                }
                None => println!("Nothing to decrypt for {player}"),
            }
        }
    }
    Ok(())
}
