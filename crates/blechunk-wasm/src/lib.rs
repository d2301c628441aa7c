//! # blechunk-wasm
//!
//! wasm-bindgen エクスポート：Web Bluetooth 等の JS 側から呼び出す公開 API。
//!
//! ## 使用方法（TypeScript）
//!
//! ```typescript
//! import { BleSender, BleReceiver, init_panic_hook, initLogger } from '../blechunk-wasm-pkg/blechunk_wasm';
//!
//! init_panic_hook();
//! initLogger("debug");
//!
//! // 送信（MTU ネゴシエーション後のバジェットを渡す。省略時は 20）
//! const sender = new BleSender(185);
//! sender.enqueue(new TextEncoder().encode(json));
//! let packet;
//! while ((packet = sender.nextPacket()) !== undefined) {
//!     await characteristic.writeValueWithoutResponse(packet);
//! }
//!
//! // 受信
//! const receiver = new BleReceiver();
//! characteristic.addEventListener('characteristicvaluechanged', (ev) => {
//!     const view = ev.target.value;
//!     const payload = receiver.pushPacket(new Uint8Array(view.buffer));
//!     if (payload !== undefined) {
//!         onMessage(receiver.lastMessageId(), payload);
//!     }
//! });
//! ```

use wasm_bindgen::prelude::*;

pub mod console_log;
pub mod receiver;
pub mod sender;

pub use console_log::{init_logger, ConsoleLogger};
pub use receiver::BleReceiver;
pub use sender::BleSender;

/// パニック時にブラウザコンソールにスタックトレースを出力する
///
/// 開発時に必ず呼び出すこと。本番ビルドでは feature flag で無効化可能。
#[wasm_bindgen]
pub fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Rust のバイト列を JS の Uint8Array にコピーする
pub(crate) fn to_uint8_array(bytes: &[u8]) -> js_sys::Uint8Array {
    let arr = js_sys::Uint8Array::new_with_length(bytes.len() as u32);
    arr.copy_from(bytes);
    arr
}
