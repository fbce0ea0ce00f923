use clap::Parser;
use shared::{messages, AuthChoice, Connection, EndChoice, GameMode};
use tokio::net::TcpStream;

/// Scripted player for smoke-testing a running server
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    server: String,
    #[arg(short, long)]
    username: String,
    #[arg(short, long, default_value = "password")]
    password: String,
    /// Create the account instead of logging in
    #[arg(short, long)]
    register: bool,
    /// Play ranked games instead of simple ones
    #[arg(long)]
    ranked: bool,
    /// Number of games to play before disconnecting
    #[arg(short, long, default_value = "1")]
    games: u32,
}

/// The last message of a game: the simple marker or the ranked points report.
fn is_game_over(text: &str) -> bool {
    text == messages::SIMPLE_MARKER || text.contains("rank points")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let stream = TcpStream::connect(&args.server).await?;
    println!("Connected to {}", args.server);
    let mut conn = Connection::new(stream);

    let choice = if args.register {
        AuthChoice::Register
    } else {
        AuthChoice::Login
    };
    conn.send_int(choice.into()).await?;
    conn.send_text(&args.username).await?;
    conn.send_text(&args.password).await?;

    let reply = conn.recv_text().await?;
    println!("{}", reply);
    if !reply.starts_with(messages::OK_PREFIX) {
        return Err(format!("authentication refused: {}", reply).into());
    }

    let mode = if args.ranked {
        GameMode::Ranked
    } else {
        GameMode::Simple
    };
    conn.send_int(mode.into()).await?;

    let mut interval = (0, 0);
    let mut played = 0;

    loop {
        let text = conn.recv_text().await?;
        println!("{}", text);

        if let Some(bounds) = messages::parse_interval(&text) {
            interval = bounds;
        } else if text == messages::YOUR_TURN {
            let guess = (interval.0 + interval.1) / 2;
            println!("Guessing {}", guess);
            conn.send_int(guess).await?;
        } else if is_game_over(&text) {
            played += 1;
            if played >= args.games {
                conn.send_int(EndChoice::Disconnect.into()).await?;
                break;
            }
            conn.send_int(EndChoice::PlayAgain.into()).await?;
            conn.send_int(mode.into()).await?;
        }
    }

    println!("Played {} games, disconnecting", played);
    conn.shutdown().await?;
    Ok(())
}
