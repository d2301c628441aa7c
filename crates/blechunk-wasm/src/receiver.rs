//! BleReceiver wasm-bindgen エクスポート
//!
//! 通知・書き込みで届いたパケットを渡し、完成したペイロードを受け取る。

use wasm_bindgen::prelude::*;

use blechunk_session::{Inbox, InboxConfig};

use crate::to_uint8_array;

/// 受信側セッション
#[wasm_bindgen]
pub struct BleReceiver {
    inbox: Inbox,
    /// 最後に完成したメッセージの ID
    last_message_id: Option<u16>,
}

#[wasm_bindgen]
impl BleReceiver {
    /// 受信側セッションを生成する
    ///
    /// # 引数
    /// - `max_in_flight`: 同時に組み立て中にできるメッセージ数。省略時は 8。
    #[wasm_bindgen(constructor)]
    pub fn new(max_in_flight: Option<u32>) -> BleReceiver {
        let mut config = InboxConfig::default();
        if let Some(max) = max_in_flight {
            config.max_in_flight = max as usize;
        }

        BleReceiver {
            inbox: Inbox::new(config),
            last_message_id: None,
        }
    }

    /// 受信したパケットを処理する
    ///
    /// # 戻り値
    /// このパケットでメッセージが完成した場合はそのペイロード。それ以外は `undefined`。
    ///
    /// # エラー
    /// - パケットが壊れている（ヘッダー長不足、ヘッダー値の矛盾）
    #[wasm_bindgen(js_name = "pushPacket")]
    pub fn push_packet(&mut self, bytes: &[u8]) -> Result<Option<js_sys::Uint8Array>, JsError> {
        let received = self
            .inbox
            .push_packet(bytes)
            .map_err(|e| JsError::new(&format!("Packet rejected: {}", e)))?;

        Ok(received.map(|message| {
            self.last_message_id = Some(message.message_id.raw());
            to_uint8_array(&message.payload)
        }))
    }

    /// 最後に完成したメッセージの ID（まだなければ `undefined`）
    #[wasm_bindgen(js_name = "lastMessageId")]
    pub fn last_message_id(&self) -> Option<u16> {
        self.last_message_id
    }

    /// 組み立て中のメッセージ数
    #[wasm_bindgen(js_name = "inFlight")]
    pub fn in_flight(&self) -> usize {
        self.inbox.stats().in_flight
    }

    /// 接続が切れたときに組み立て中の状態を破棄する
    pub fn clear(&mut self) {
        self.inbox.clear();
    }

    /// 受信統計を JSON 文字列で返す
    ///
    /// ```json
    /// {"in_flight":1,"completed":12,"late_dropped":0,"evicted":0,"malformed":0}
    /// ```
    #[wasm_bindgen(js_name = "getStats")]
    pub fn get_stats(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.inbox.stats())
            .map_err(|e| JsError::new(&format!("Stats serialization failed: {}", e)))
    }
}
