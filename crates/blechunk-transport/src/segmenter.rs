//! ペイロードのパケット分割（送信側）
//!
//! `Segmenter` はペイロード 1 つにつき 1 つ生成する。生成時に ID を採番する以外は
//! 不変で、`packet_at(budget, index)` は引数だけで決まる純粋関数。
//!
//! ```text
//! max_chunk    = budget - 11
//! packet_count = 1 + ceil(len / max_chunk)
//!
//! index 0               → 設定パケット（packet_count, data_size = len）
//! index 1..packet_count → データパケット（payload[(index-1)*max_chunk ..] の最大 max_chunk バイト）
//! index >= packet_count → None（終端）
//! ```

use alloc::vec::Vec;

use crate::error::TransportError;
use crate::message_id::{MessageId, MessageIdSource, GLOBAL_MESSAGE_IDS};
use crate::settings::check_budget;
use crate::wire::{DataPacket, SettingsPacket, DATA_HEADER_LEN};

/// ペイロードをパケット列に分割する
#[derive(Debug, Clone)]
pub struct Segmenter {
    message_id: MessageId,
    payload: Vec<u8>,
}

impl Segmenter {
    /// プロセス共有のカウンタから ID を採番して生成する
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self::with_source(payload, &GLOBAL_MESSAGE_IDS)
    }

    /// 指定した採番元から ID を採番して生成する
    pub fn with_source(payload: impl Into<Vec<u8>>, source: &dyn MessageIdSource) -> Self {
        Self::with_message_id(payload, source.next_id())
    }

    /// ID を直接指定して生成する
    pub fn with_message_id(payload: impl Into<Vec<u8>>, message_id: MessageId) -> Self {
        Segmenter {
            message_id,
            payload: payload.into(),
        }
    }

    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// 1 データパケットに載る最大バイト数
    ///
    /// # エラー
    /// - `TransportError::BudgetTooSmall`: バジェットがデータヘッダー以下
    pub fn max_chunk(budget: u32) -> Result<usize, TransportError> {
        check_budget(budget)?;
        Ok(budget as usize - DATA_HEADER_LEN)
    }

    /// 設定パケットを含む総パケット数
    ///
    /// # エラー
    /// - `TransportError::BudgetTooSmall`: バジェットがデータヘッダー以下
    /// - `TransportError::PayloadTooLarge`: 長さかパケット数が u32 に収まらない
    pub fn packet_count(&self, budget: u32) -> Result<u32, TransportError> {
        let max_chunk = Self::max_chunk(budget)?;
        self.packet_count_for(max_chunk)
    }

    fn packet_count_for(&self, max_chunk: usize) -> Result<u32, TransportError> {
        let too_large = TransportError::PayloadTooLarge {
            len: self.payload.len(),
        };
        if u32::try_from(self.payload.len()).is_err() {
            return Err(too_large);
        }

        let data_packets = self.payload.len().div_ceil(max_chunk);
        data_packets
            .checked_add(1)
            .and_then(|count| u32::try_from(count).ok())
            .ok_or(too_large)
    }

    /// `index` 番目のパケットを Wire Format で返す
    ///
    /// # 戻り値
    /// - `Some(bytes)`: パケット
    /// - `None`: `index >= packet_count`（終端）
    pub fn packet_at(&self, budget: u32, index: u32) -> Result<Option<Vec<u8>>, TransportError> {
        let max_chunk = Self::max_chunk(budget)?;
        let packet_count = self.packet_count_for(max_chunk)?;
        Ok(self.encode_packet(max_chunk, packet_count, index))
    }

    fn encode_packet(&self, max_chunk: usize, packet_count: u32, index: u32) -> Option<Vec<u8>> {
        if index >= packet_count {
            return None;
        }

        if index == 0 {
            return Some(
                SettingsPacket {
                    message_id: self.message_id,
                    packet_count,
                    // packet_count_for で u32 に収まることを確認済み
                    data_size: self.payload.len() as u32,
                }
                .encode(),
            );
        }

        // 最後のチャンクは残り全部（割り切れる場合は max_chunk ちょうど）
        let start = (index as usize - 1) * max_chunk;
        let end = (start + max_chunk).min(self.payload.len());

        Some(
            DataPacket {
                message_id: self.message_id,
                position: index,
                has_next: index != packet_count - 1,
                chunk: &self.payload[start..end],
            }
            .encode(),
        )
    }

    /// 全パケットを順番に返すイテレータ
    ///
    /// バジェットとペイロード長の検証はここで一度だけ行う。
    pub fn packets(&self, budget: u32) -> Result<Packets<'_>, TransportError> {
        let max_chunk = Self::max_chunk(budget)?;
        let packet_count = self.packet_count_for(max_chunk)?;
        Ok(Packets {
            segmenter: self,
            max_chunk,
            packet_count,
            next_index: 0,
        })
    }
}

/// `Segmenter::packets` のイテレータ
#[derive(Debug, Clone)]
pub struct Packets<'a> {
    segmenter: &'a Segmenter,
    max_chunk: usize,
    packet_count: u32,
    next_index: u32,
}

impl Packets<'_> {
    /// 総パケット数
    pub fn packet_count(&self) -> u32 {
        self.packet_count
    }
}

impl Iterator for Packets<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        let packet =
            self.segmenter
                .encode_packet(self.max_chunk, self.packet_count, self.next_index)?;
        self.next_index += 1;
        Some(packet)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.packet_count.saturating_sub(self.next_index) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Packets<'_> {}
