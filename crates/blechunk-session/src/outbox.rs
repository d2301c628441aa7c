//! 送信キュー
//!
//! 送信待ちのペイロードをメッセージ単位で保持し、1 パケットずつ取り出す。
//! BLE のキャラクタリスティック書き込みは 1 回 1 パケットなので、呼び出し側は
//! 書き込み完了コールバックのたびに `next_packet()` を呼ぶ。

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;

use log::{debug, warn};
use serde::Serialize;

use blechunk_transport::{
    MessageId, MessageIdSource, Segmenter, TransferSettings, TransportError, GLOBAL_MESSAGE_IDS,
};

/// 送信統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutboxStats {
    /// キューに積まれたメッセージ数
    pub messages_enqueued: u64,
    /// 全パケットを送り出したメッセージ数
    pub messages_sent: u64,
    /// 送り出したパケット数
    pub packets_sent: u64,
    /// 送り出したバイト数（ヘッダー込み）
    pub bytes_sent: u64,
}

/// 送信中のメッセージ
///
/// バジェットは送信開始時に固定する（途中で変えると packet_count が合わなくなる）。
struct InProgress {
    segmenter: Segmenter,
    budget: u32,
    packet_count: u32,
    next_index: u32,
}

/// メッセージ単位の送信キュー
pub struct Outbox {
    /// ID の採番元
    ids: Arc<dyn MessageIdSource>,
    /// 次に送信を開始するメッセージに適用する設定
    settings: TransferSettings,
    /// 送信待ちメッセージ
    queue: VecDeque<Segmenter>,
    /// 送信中のメッセージ
    current: Option<InProgress>,
    stats: OutboxStats,
}

impl Outbox {
    /// プロセス共有のカウンタで ID を採番する Outbox を生成する
    pub fn new(settings: TransferSettings) -> Self {
        Self::with_id_source(settings, Arc::new(&GLOBAL_MESSAGE_IDS))
    }

    /// ID の採番元を指定して生成する
    pub fn with_id_source(settings: TransferSettings, ids: Arc<dyn MessageIdSource>) -> Self {
        Outbox {
            ids,
            settings,
            queue: VecDeque::new(),
            current: None,
            stats: OutboxStats::default(),
        }
    }

    /// ペイロードを送信キューに積み、採番した ID を返す
    pub fn enqueue(&mut self, payload: impl Into<Vec<u8>>) -> MessageId {
        let segmenter = Segmenter::with_source(payload, self.ids.as_ref());
        let id = segmenter.message_id();
        debug!("message {}: enqueued ({} bytes)", id, segmenter.len());

        self.queue.push_back(segmenter);
        self.stats.messages_enqueued += 1;
        id
    }

    /// 次に送信するパケットを返す
    ///
    /// # 戻り値
    /// - `Some(bytes)`: 送信すべきパケット
    /// - `None`: 送信待ちのメッセージがない
    ///
    /// # エラー
    /// - `TransportError::PayloadTooLarge`: ヘッダーに収まらないペイロード（そのメッセージは破棄する）
    pub fn next_packet(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.current.is_none() {
            let Some(segmenter) = self.queue.pop_front() else {
                return Ok(None);
            };
            self.current = Some(self.start(segmenter)?);
        }

        let Some(current) = self.current.as_mut() else {
            return Ok(None);
        };

        let packet = current
            .segmenter
            .packet_at(current.budget, current.next_index)?;
        current.next_index += 1;

        if current.next_index >= current.packet_count {
            debug!(
                "message {}: all {} packets handed out",
                current.segmenter.message_id(),
                current.packet_count
            );
            self.current = None;
            self.stats.messages_sent += 1;
        }

        if let Some(packet) = &packet {
            self.stats.packets_sent += 1;
            self.stats.bytes_sent += packet.len() as u64;
        }
        Ok(packet)
    }

    fn start(&self, segmenter: Segmenter) -> Result<InProgress, TransportError> {
        let budget = self.settings.budget();
        let packet_count = segmenter.packet_count(budget).map_err(|e| {
            warn!("message {}: dropped: {}", segmenter.message_id(), e);
            e
        })?;

        Ok(InProgress {
            segmenter,
            budget,
            packet_count,
            next_index: 0,
        })
    }

    /// 送信待ちのパケットをすべて取り出す
    pub fn drain(&mut self) -> Result<Vec<Vec<u8>>, TransportError> {
        let mut packets = Vec::new();
        while let Some(packet) = self.next_packet()? {
            packets.push(packet);
        }
        Ok(packets)
    }

    /// 転送設定を変更する（次に送信を開始するメッセージから有効）
    pub fn set_settings(&mut self, settings: TransferSettings) {
        self.settings = settings;
    }

    pub fn settings(&self) -> TransferSettings {
        self.settings
    }

    /// 送信中を含む、送信が終わっていないメッセージ数
    pub fn pending_messages(&self) -> usize {
        self.queue.len() + usize::from(self.current.is_some())
    }

    /// 送信すべきものがないか
    pub fn is_idle(&self) -> bool {
        self.pending_messages() == 0
    }

    pub fn stats(&self) -> OutboxStats {
        self.stats
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new(TransferSettings::default())
    }
}
