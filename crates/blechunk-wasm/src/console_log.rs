//! `log` ファサードのブラウザコンソール出力
//!
//! transport / session クレートは `log` マクロで出力するだけなので、
//! WASM ではここでコンソールへの出力先を登録する。

use log::{Level, LevelFilter, Log, Metadata, Record};
use wasm_bindgen::prelude::*;
use web_sys::console;

/// `log` のレコードを `console.*` に書き出すロガー
pub struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = JsValue::from_str(&format!(
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        ));

        match record.level() {
            Level::Error => console::error_1(&line),
            Level::Warn => console::warn_1(&line),
            Level::Info => console::info_1(&line),
            Level::Debug | Level::Trace => console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

/// コンソールロガーを登録し、出力レベルを設定する
///
/// 2 回目以降の呼び出しはレベルの変更のみ行う。
///
/// # 引数
/// - `level`: `"off" | "error" | "warn" | "info" | "debug" | "trace"`。省略時は `"info"`
///
/// # エラー
/// - レベル文字列が不正
#[wasm_bindgen(js_name = "initLogger")]
pub fn init_logger(level: Option<String>) -> Result<(), JsError> {
    let filter = parse_level(level.as_deref())?;

    // 既に登録済みなら Err が返るが、レベル変更だけ反映すればよい
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(filter);
    Ok(())
}

fn parse_level(level: Option<&str>) -> Result<LevelFilter, JsError> {
    level
        .unwrap_or("info")
        .parse::<LevelFilter>()
        .map_err(|e| JsError::new(&format!("Invalid log level: {}", e)))
}
