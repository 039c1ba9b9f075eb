use anyhow::{anyhow, Result};
use game_session_rust::{Collaborators, ServiceConfig, SessionController, SessionHandle, SessionSnapshot};
use log::{error, info};
use modsim_rust_core::clients::fact_check::verdict;
use modsim_rust_core::upgrades;
use modsim_rust_core::{FeedSpeed, ModerationAction};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
commands:
  start [hashtag]         load tweets and begin a session
  feed                    show the visible feed and score
  flag|approve|check <id> moderate a tweet
  speed slow|normal|fast  change the feed speed
  shop                    list upgrades
  buy <upgrade>           purchase the next level of an upgrade
  again                   return to the welcome screen after game over
  quit";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    info!("Starting game_session_rust...");

    let config = ServiceConfig::from_env()?;
    info!(
        "Backend {} | feed speed {} | {}s sessions",
        config.api_base_url,
        config.feed_speed.as_str(),
        config.game.game_duration_ms / 1000
    );

    let collaborators = Collaborators::http(&config);
    let mut handle = SessionController::spawn(config.game.clone(), config.feed_speed, collaborators.clone())?;

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(report) = handle.next_report() => {
                println!("{}", serde_json::to_string_pretty(&report.stats)?);
                println!("type `again` to play another round");
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match run_command(&handle, &collaborators, &config, line.trim()).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => error!("{:#}", e),
                }
            }
        }
    }

    handle.stop();
    info!("game_session_rust stopped");
    Ok(())
}

/// Returns `false` when the player quits
async fn run_command(
    handle: &SessionHandle,
    collaborators: &Collaborators,
    config: &ServiceConfig,
    line: &str,
) -> Result<bool> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(true);
    };
    let arg = parts.next();

    match command {
        "start" => {
            let hashtag = arg.map(str::to_string).or_else(|| config.hashtag.clone());
            handle.start(hashtag).await?;
            println!("loading tweets...");
        }
        "feed" | "status" => print_snapshot(&handle.snapshot()),
        "flag" | "approve" | "check" => {
            let id = arg.ok_or_else(|| anyhow!("usage: {} <tweet id>", command))?;
            let action = match command {
                "flag" => ModerationAction::Flag,
                "approve" => ModerationAction::Approve,
                _ => ModerationAction::FactCheck,
            };
            match handle.moderate(id, action).await? {
                Some(outcome) => println!("{} {} -> {:?}", action, id, outcome.scored),
                None => println!("tweet {} is not in the feed", id),
            }
        }
        "speed" => {
            let speed = arg
                .ok_or_else(|| anyhow!("usage: speed slow|normal|fast"))?
                .parse::<FeedSpeed>()
                .map_err(|e| anyhow!("{}", e))?;
            handle.set_speed(speed).await?;
        }
        "shop" => {
            let wallet = collaborators.profile.fetch_wallet().await?;
            println!("money: {}", wallet.money);
            for offer in upgrades::offers(&wallet.upgrades, wallet.money) {
                let price = offer
                    .next_price
                    .map_or_else(|| "max".to_string(), |p| p.to_string());
                println!(
                    "  {:<24} level {}/{}  next {}{}",
                    offer.id,
                    offer.current_level,
                    offer.max_level,
                    price,
                    if offer.can_purchase { "" } else { " (locked)" }
                );
            }
        }
        "buy" => {
            let id = arg.ok_or_else(|| anyhow!("usage: buy <upgrade id>"))?;
            let receipt = handle.purchase(id).await?;
            println!(
                "{} is now level {} ({} left)",
                receipt.id, receipt.new_level, receipt.money
            );
        }
        "again" => handle.play_again().await?,
        "quit" | "exit" => return Ok(false),
        _ => println!("{}", HELP),
    }
    Ok(true)
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    println!(
        "[{}] {}s left | score {} ({} base + {} time) | fact checks {}",
        snapshot.phase,
        snapshot.time_remaining_ms / 1000,
        snapshot.score,
        snapshot.base_score,
        snapshot.time_score,
        snapshot.fact_checks_remaining
    );
    if let Some(error) = &snapshot.last_error {
        println!("error: {}", error);
    }
    for entry in &snapshot.feed {
        let marker = if entry.is_new { "*" } else { " " };
        println!("{} {:>8}  {}", marker, entry.tweet.id, entry.tweet.content);
        if let Some(check) = snapshot.fact_checks.get(&entry.tweet.id) {
            match &check.message {
                Some(message) => println!("            fact check: {}", message),
                None => println!(
                    "            fact check: {} reviews, {} articles",
                    check.claims.len(),
                    check.articles.len()
                ),
            }
            match verdict(check) {
                Some(true) => println!("            rated: likely misinformation"),
                Some(false) => println!("            rated: no misinformation found"),
                None => {}
            }
        }
    }
}
