use anyhow::Result;
use clap::{Parser, Subcommand};
use drone_cli::{ControlClient, DirectoryClient};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory URL
    #[arg(long, default_value = "http://localhost:8081")]
    directory_url: String,

    /// Control socket URL
    #[arg(long, default_value = "ws://localhost:8765")]
    control_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the fleet directory
    List,
    /// Take control of a drone and forward stdin lines as commands
    Control {
        /// Drone id, e.g. drn001
        drone_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::List => {
            let directory = DirectoryClient::new(args.directory_url);
            for drone in directory.list_drones().await? {
                println!("{}\t{}", drone.id, drone.name);
            }
        }
        Command::Control { drone_id } => {
            let mut client = ControlClient::connect(&args.control_url).await?;
            println!("{}", client.select(&drone_id).await?);
            println!("Type commands (takeoff, land, rotate 90, undo, ...); Ctrl-D to quit.");

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                tokio::select! {
                    line = lines.next_line() => {
                        let Some(line) = line? else { break };
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        println!("{}", client.request(line).await?);
                    }
                    result = client.keep_alive() => result?,
                }
            }
            client.close().await?;
        }
    }

    Ok(())
}
