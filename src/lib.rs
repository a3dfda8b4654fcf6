pub mod app;
pub mod camera;
pub mod content;
pub mod platform;
pub mod renderer;
pub mod settings;

use tracing::info;

use settings::RenderSettings;

/// Load the settings named on the command line and run the demo window until
/// it is closed.
pub fn lumen_main() -> anyhow::Result<()> {
    let settings = RenderSettings::from_args(std::env::args())?;
    info!("starting with settings {settings:?}");

    app::run(settings)
}
