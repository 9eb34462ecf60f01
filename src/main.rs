mod demo;

use std::process::ExitCode;
use std::rc::Rc;

use image::{Rgba, RgbaImage};

use jclient::ClientConfig;
use jclient::app;
use jclient::session::SessionBuilder;
use jclient::viewport::ImageBackground;

use demo::DemoLoader;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Sky-to-grass gradient with a brick band, used when no background PNG is
/// configured. Wider than tall so the aspect-preserving scale is visible.
fn placeholder_background() -> RgbaImage {
    const W: u32 = 320;
    const H: u32 = 180;
    RgbaImage::from_fn(W, H, |x, y| {
        if y >= H - 24 {
            let brick = ((x / 8) + (y / 6)) % 2 == 0;
            if brick { Rgba([0x82, 0x74, 0x66, 0xFF]) } else { Rgba([0x4A, 0x48, 0x45, 0xFF]) }
        } else {
            let t = y as f32 / H as f32;
            Rgba([(90.0 + 80.0 * t) as u8, (150.0 + 60.0 * t) as u8, 235, 0xFF])
        }
    })
}

fn main() -> ExitCode {
    init_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => match ClientConfig::load(&path) {
            Ok(config) => config,
            Err(error) => {
                tracing::error!(%error, "could not load config");
                return ExitCode::FAILURE;
            }
        },
        None => ClientConfig::default(),
    };

    let mut builder = match SessionBuilder::from_config(&config) {
        Ok(builder) => builder,
        Err(error) => {
            tracing::error!(%error, "invalid config");
            return ExitCode::FAILURE;
        }
    };
    if config.background.is_none() {
        builder = builder.with_background(Rc::new(ImageBackground::from_image(placeholder_background())));
    }

    let margins = config.margins;
    match app::run(config, builder, |window| DemoLoader::new(window, margins)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "client exited with an error");
            ExitCode::FAILURE
        }
    }
}
