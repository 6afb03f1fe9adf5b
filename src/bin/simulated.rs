//! KeyDeck demo on a simulated StreamDeck Original
//!
//! Pre-labels two keys, then a script thread presses a few keys and finally
//! the exit key. Pass a TOML config path as the first argument to override
//! the defaults; set `RUST_LOG` to change verbosity and `KEYDECK_PID` (hex,
//! e.g. `0063`) to simulate another model.

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use embedded_graphics::pixelcolor::Rgb888;
use keydeck::config::DeckConfig;
use keydeck::device::{DeckModel, SimulatedDeck, SimulatedManager};
use keydeck::{DeckController, DeckError};
use log::{error, info};

fn load_config() -> Result<DeckConfig, DeckError> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| DeckError::Config(format!("{}: {}", path, e)))?;
            DeckConfig::from_toml_str(&text)
        }
        None => Ok(DeckConfig::default()),
    }
}

fn select_model() -> Result<DeckModel, DeckError> {
    let Ok(pid) = std::env::var("KEYDECK_PID") else {
        return Ok(DeckModel::Original);
    };
    u16::from_str_radix(pid.trim_start_matches("0x"), 16)
        .ok()
        .and_then(DeckModel::from_pid)
        .ok_or_else(|| DeckError::Config(format!("unknown deck PID {}", pid)))
}

async fn preseed(controller: &mut DeckController<SimulatedDeck>) -> Result<(), DeckError> {
    controller.set_key_color(2, Rgb888::new(0, 0, 255)).await?;
    controller.set_key_label(2, Some("tomten")).await?;
    controller.set_key_color(3, Rgb888::new(255, 0, 0)).await?;
    controller.set_key_label(3, Some("är röd")).await
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let model = match select_model() {
        Ok(model) => model,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let deck = SimulatedDeck::new(model);
    let keys = deck.keys();
    let mut manager = SimulatedManager::new(vec![deck]);

    futures::executor::block_on(async move {
        let mut controller = match DeckController::initialize_from(&mut manager, config).await {
            Ok(controller) => controller,
            Err(e) => {
                error!("Startup failed: {}", e);
                return ExitCode::FAILURE;
            }
        };

        if let Err(e) = preseed(&mut controller).await {
            error!("Pre-seeding keys failed: {}", e);
        }

        let exit_key = controller.exit_key() as u8;
        let script = thread::spawn(move || {
            for key in [0u8, 1, 3] {
                thread::sleep(Duration::from_millis(300));
                keys.tap(key);
            }
            thread::sleep(Duration::from_millis(500));
            info!("Script pressing exit key {}", exit_key);
            keys.press(exit_key);
        });

        let result = controller.run().await;
        if script.join().is_err() {
            error!("Key script thread panicked");
        }

        match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Session ended with error: {}", e);
                ExitCode::FAILURE
            }
        }
    })
}
