use log::LevelFilter;
use once_cell::sync::OnceCell;

static INSTALLED: OnceCell<LevelFilter> = OnceCell::new();

#[cfg(target_arch = "wasm32")]
mod console {
    use log::{Level, Log, Metadata, Record};
    use wasm_bindgen::JsValue;

    /// 将日志转发到浏览器控制台。
    pub struct ConsoleLogger;

    pub static LOGGER: ConsoleLogger = ConsoleLogger;

    impl Log for ConsoleLogger {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &Record) {
            if !self.enabled(record.metadata()) {
                return;
            }
            let line = JsValue::from_str(&format!("[{}] {}", record.level(), record.args()));
            match record.level() {
                Level::Error => web_sys::console::error_1(&line),
                Level::Warn => web_sys::console::warn_1(&line),
                Level::Info => web_sys::console::info_1(&line),
                Level::Debug | Level::Trace => web_sys::console::debug_1(&line),
            }
        }

        fn flush(&self) {}
    }
}

/// 安装日志输出，返回实际生效的级别。重复调用时保留第一次的结果。
pub fn init_logging(level: LevelFilter) -> LevelFilter {
    *INSTALLED.get_or_init(|| install(level))
}

#[cfg(target_arch = "wasm32")]
fn install(level: LevelFilter) -> LevelFilter {
    match log::set_logger(&console::LOGGER) {
        Ok(()) => {
            log::set_max_level(level);
            level
        }
        Err(_) => log::max_level(),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn install(level: LevelFilter) -> LevelFilter {
    match env_logger::builder()
        .filter_level(level)
        .format_target(false)
        .try_init()
    {
        Ok(()) => level,
        Err(_) => log::max_level(),
    }
}

#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
pub fn set_panic_hook() {}
