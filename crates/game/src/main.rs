use tracing::error;

mod app;

fn main() {
    let wiring = match app::bootstrap::build_app() {
        Ok(wiring) => wiring,
        Err(err) => {
            error!(error = %err, "bootstrap_failed");
            std::process::exit(1);
        }
    };

    if let Err(err) = lanternvale_engine::run_app(wiring.config, wiring.scene) {
        error!(error = %err, "startup_failed");
        std::process::exit(1);
    }
}
