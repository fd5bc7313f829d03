/// Sets up the desktop logging backend. Safe to call more than once; later
/// calls are no-ops (the host app may have installed its own logger already).
pub fn init_logging() {
    let init_result = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init();
    if init_result.is_ok() {
        soundloom_debug!("Logging initialized");
    }
}
