//! BleSender wasm-bindgen エクスポート
//!
//! 送信するペイロードをキューに積み、キャラクタリスティックに書き込むパケットを
//! 1 つずつ返す。

use wasm_bindgen::prelude::*;

use blechunk_session::Outbox;
use blechunk_transport::TransferSettings;

use crate::to_uint8_array;

/// 送信側セッション
///
/// ## スレッド安全性
///
/// WASM はシングルスレッドのため、JS からは単一スレッドで呼び出される前提。
#[wasm_bindgen]
pub struct BleSender {
    outbox: Outbox,
}

#[wasm_bindgen]
impl BleSender {
    /// 送信側セッションを生成する
    ///
    /// # 引数
    /// - `budget`: 1 パケットの最大バイト数（ネゴシエーション済み MTU - 3）。省略時は 20。
    ///
    /// # エラー
    /// - バジェットが 11 バイト以下
    ///
    /// # 例（TypeScript）
    /// ```typescript
    /// const sender = new BleSender();      // 20 バイト
    /// const sender2 = new BleSender(244);  // MTU 247 ネゴシエーション後
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(budget: Option<u32>) -> Result<BleSender, JsError> {
        let settings = settings_from(budget)?;
        Ok(BleSender {
            outbox: Outbox::new(settings),
        })
    }

    /// バジェットを変更する（送信中のメッセージには影響せず、次のメッセージから有効）
    #[wasm_bindgen(js_name = "setBudget")]
    pub fn set_budget(&mut self, budget: u32) -> Result<(), JsError> {
        self.outbox.set_settings(settings_from(Some(budget))?);
        Ok(())
    }

    /// ペイロードを送信キューに積み、採番したメッセージ ID を返す
    pub fn enqueue(&mut self, data: &[u8]) -> u16 {
        self.outbox.enqueue(data).raw()
    }

    /// 次に書き込むパケットを返す（なければ `undefined`）
    #[wasm_bindgen(js_name = "nextPacket")]
    pub fn next_packet(&mut self) -> Result<Option<js_sys::Uint8Array>, JsError> {
        let packet = self
            .outbox
            .next_packet()
            .map_err(|e| JsError::new(&format!("Segmentation failed: {}", e)))?;
        Ok(packet.as_deref().map(to_uint8_array))
    }

    /// 送信待ちのパケットをすべて返す
    #[wasm_bindgen(js_name = "drainPackets")]
    pub fn drain_packets(&mut self) -> Result<js_sys::Array, JsError> {
        let packets = self
            .outbox
            .drain()
            .map_err(|e| JsError::new(&format!("Segmentation failed: {}", e)))?;

        let result = js_sys::Array::new();
        for packet in packets {
            result.push(&to_uint8_array(&packet));
        }
        Ok(result)
    }

    /// 送信が終わっていないメッセージ数
    #[wasm_bindgen(js_name = "pendingMessages")]
    pub fn pending_messages(&self) -> usize {
        self.outbox.pending_messages()
    }

    /// 送信統計を JSON 文字列で返す
    ///
    /// ```json
    /// {"messages_enqueued":3,"messages_sent":2,"packets_sent":27,"bytes_sent":512}
    /// ```
    #[wasm_bindgen(js_name = "getStats")]
    pub fn get_stats(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.outbox.stats())
            .map_err(|e| JsError::new(&format!("Stats serialization failed: {}", e)))
    }
}

fn settings_from(budget: Option<u32>) -> Result<TransferSettings, JsError> {
    match budget {
        Some(budget) => TransferSettings::new(budget)
            .map_err(|e| JsError::new(&format!("Invalid budget: {}", e))),
        None => Ok(TransferSettings::default()),
    }
}
