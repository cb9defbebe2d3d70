use log::error;
use std::panic;

/// Install a panic hook that logs the panic before the pretty backtrace.
///
/// Render and cache workers run on their own threads, so a panic there is
/// otherwise only visible on stderr.
pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let thread = std::thread::current();
        let name = thread.name().unwrap_or("<unnamed>");
        error!("Panic in thread '{name}': {panic_info}");
        log::logger().flush();

        default_hook(panic_info);
    }));
}
