//! Check and update a modpack from the command line, then print the
//! launch command.
//!
//! cargo run --example update_pack -- <launcher.json> <data dir> [username password]

use std::path::PathBuf;

use anyhow::{bail, Result};

use mcz_lib::auth::{Account, YggdrasilClient};
use mcz_lib::config::{LauncherConfig, Settings};
use mcz_lib::game::installer::config::AUTH_SERVER_URL;
use mcz_lib::game::launcher::{Environment, FeatureSet};
use mcz_lib::{
    ChannelProgressReporter, CheckOutcome, InstallLayout, ProgressEvent, UpdateOutcome, Updater,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        bail!("usage: update_pack <launcher.json> <data dir> [username password]");
    }
    let config = LauncherConfig::load(&PathBuf::from(&args[0])).await?;
    let data_root = PathBuf::from(&args[1]);
    let mut settings = Settings::load_or_default(&data_root.join("settings.json")).await?;

    let layout = InstallLayout::new(&data_root, &config.id);
    let environment = Environment::current(FeatureSet {
        is_demo_user: false,
        has_custom_resolution: true,
    });
    let mut updater = Updater::new(layout, &config.definition, environment)?;

    match updater.check().await? {
        CheckOutcome::UpToDate { version } => println!("{} is up to date ({})", config.name, version),
        CheckOutcome::UpdateAvailable { installed, available } => {
            println!("Updating {} from {:?} to {}", config.name, installed, available);

            let (reporter, mut events, cancel) = ChannelProgressReporter::channel();
            let printer = tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    match event {
                        ProgressEvent::Stage { stage, current, total } => {
                            println!("[{}/{}] {}", current, total, stage)
                        }
                        ProgressEvent::Message(msg) => println!("  {}", msg),
                        ProgressEvent::Substep { name, current, total } => {
                            log::debug!("  {:?} {:?}/{:?}", name, current, total)
                        }
                        ProgressEvent::Finished { success, message } => {
                            println!("finished: success={} {:?}", success, message)
                        }
                    }
                }
            });
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = cancel.send(true);
                }
            });

            let outcome = updater.update(&reporter).await?;
            drop(reporter);
            let _ = printer.await;
            if outcome == UpdateOutcome::Cancelled {
                println!("Update cancelled");
                return Ok(());
            }
        }
    }

    let account = match args.get(2..4) {
        Some([username, password]) => {
            let client = YggdrasilClient::new(AUTH_SERVER_URL, settings.client_token.clone())?;
            let account = client.authenticate(username, password).await?;
            settings.upsert_account(account.clone());
            settings.save(&data_root.join("settings.json")).await?;
            account
        }
        _ => Account {
            id: "offline".into(),
            uuid: "00000000000000000000000000000000".into(),
            email: "Player".into(),
            username: "Player".into(),
            access_token: "0".into(),
        },
    };

    let command = updater.launch_command(&account, &settings, &config.name).await?;
    println!("{:?} {}", command.program, command.args.join(" "));
    Ok(())
}
