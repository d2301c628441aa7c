//! パケットからのペイロード再組み立て（受信側）
//!
//! `Reassembler` は論理メッセージ 1 つ分の受信を担当する。パケットは任意の順序で届き、
//! 無関係な別メッセージのパケットが混在してもよい。
//!
//! ## 状態遷移
//!
//! ```text
//! Empty ──データ──→ Reserved ──同じ ID の設定──→ Active ──全スロット充足──→ Finished
//!   │                  (保留分をリプレイ)          ↑
//!   └────────────────設定───────────────────────────┘
//! ```
//!
//! - 設定パケットより先に届いたデータパケットは、最初に見た ID に限り保留する
//! - 保留中の ID と異なる設定パケットは受け付けない（保留を横取りさせない）
//! - Active になった後の別 ID のパケットは `CompetingMessage` として呼び出し側に返す
//! - Finished 以降は何も受け付けない（自動リセットはしない）
//!
//! ## スレッド安全性
//!
//! `add_packet` は `&mut self` を取るので、複数スレッドから配送する場合は
//! 呼び出し側で直列化すること（接続ごとの Mutex、単一の配送キュー等）。

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;

use log::{debug, trace, warn};

use crate::error::{MalformedKind, TransportError};
use crate::message_id::MessageId;
use crate::wire::{DataPacket, Packet, SettingsPacket};

/// `Reassembler::add_packet` の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddPacketStatus {
    /// 受け付けた（まだ完成していない）
    Success,
    /// このパケットでメッセージが完成した
    MessageComplete,
    /// 完成済みなので破棄した
    AlreadyFinished,
    /// 空のパケット
    NoData,
    /// 別メッセージのパケット（呼び出し側が別の `Reassembler` に回すか破棄する）
    CompetingMessage(MessageId),
}

/// 設定パケットより先に届いたデータパケット
#[derive(Debug)]
struct ReservedPacket {
    position: u32,
    has_next: bool,
    chunk: Vec<u8>,
}

impl ReservedPacket {
    fn from_data(data: &DataPacket<'_>) -> Self {
        ReservedPacket {
            position: data.position,
            has_next: data.has_next,
            chunk: data.chunk.to_vec(),
        }
    }
}

/// 設定パケット適用後の受信状況
#[derive(Debug)]
struct ActiveMessage {
    message_id: MessageId,
    data_size: u32,
    /// データスロット数（= packet_count - 1）
    slot_count: u32,
    /// packet_position → chunk（届いた分だけ持つ）
    slots: BTreeMap<u32, Vec<u8>>,
    /// 未受信スロット数（has_next == 0 または 0 到達時に数え直す）
    remaining_slots: u32,
}

impl ActiveMessage {
    fn new(settings: &SettingsPacket) -> Self {
        let slot_count = settings.slot_count();

        ActiveMessage {
            message_id: settings.message_id,
            data_size: settings.data_size,
            slot_count,
            slots: BTreeMap::new(),
            remaining_slots: slot_count,
        }
    }

    /// チャンクをスロットに格納する
    ///
    /// # 戻り値
    /// - `Ok(true)`: すべてのスロットが埋まった
    /// - `Ok(false)`: まだ空きがある
    ///
    /// # エラー
    /// - `MalformedKind::PositionOutOfRange`: 位置がスロット数を超えている（状態は変えない）
    fn store(&mut self, position: u32, has_next: bool, chunk: Vec<u8>) -> Result<bool, TransportError> {
        if position == 0 || position > self.slot_count {
            return Err(MalformedKind::PositionOutOfRange {
                position,
                slot_count: self.slot_count,
            }
            .into());
        }

        if self.slots.contains_key(&position) {
            // 重複パケットは最初のものを残す
            debug!(
                "message {}: duplicate packet at position {} ignored",
                self.message_id, position
            );
            return Ok(self.remaining_slots == 0);
        }

        self.slots.insert(position, chunk);
        self.remaining_slots = self.remaining_slots.saturating_sub(1);

        if self.remaining_slots == 0 || !has_next {
            // 最後のパケットが途中のパケットより先に届くことがあるので数え直す
            self.remaining_slots = self.rescan();
            trace!(
                "message {}: rescan after position {} → {} slots left",
                self.message_id,
                position,
                self.remaining_slots
            );
        }

        Ok(self.remaining_slots == 0)
    }

    fn rescan(&self) -> u32 {
        self.slot_count - self.slots.len() as u32
    }

    fn is_complete(&self) -> bool {
        self.remaining_slots == 0
    }

    fn into_payload(self) -> Vec<u8> {
        // data_size は宣言値なので、確保量は実際に届いた長さから決める
        let len = self.slots.values().map(Vec::len).sum();
        let mut payload = Vec::with_capacity(len);
        for chunk in self.slots.into_values() {
            payload.extend_from_slice(&chunk);
        }
        payload
    }
}

#[derive(Debug)]
enum State {
    /// 何も受け取っていない
    Empty,
    /// 設定パケット待ちのデータパケットを保留中
    Reserved {
        message_id: MessageId,
        buffer: VecDeque<ReservedPacket>,
    },
    /// 設定パケット適用済み
    Active(ActiveMessage),
    /// 完成済み（ペイロードは結合済み）
    Finished {
        message_id: MessageId,
        /// 設定パケットが宣言した値（実際の長さと異なりうる）
        data_size: u32,
        slot_count: u32,
        payload: Vec<u8>,
    },
}

/// 1 つの論理メッセージをパケットから再組み立てする
///
/// # 例
///
/// ```
/// use blechunk_transport::{AddPacketStatus, MessageId, Reassembler, Segmenter};
///
/// let segmenter = Segmenter::with_message_id(b"hello, peripheral".to_vec(), MessageId(3));
/// let mut reassembler = Reassembler::new();
///
/// for packet in segmenter.packets(20).unwrap() {
///     reassembler.add_packet(&packet).unwrap();
/// }
///
/// assert!(reassembler.is_completed());
/// assert_eq!(reassembler.data(), Some(&b"hello, peripheral"[..]));
/// assert_eq!(reassembler.add_packet(&[1]), Ok(AddPacketStatus::AlreadyFinished));
/// ```
#[derive(Debug)]
pub struct Reassembler {
    state: State,
}

impl Reassembler {
    pub fn new() -> Self {
        Reassembler { state: State::Empty }
    }

    /// 受信パケットを 1 つ追加する
    ///
    /// # 戻り値
    /// - `NoData`: 空のバイト列
    /// - `AlreadyFinished`: 完成済み（パケットは破棄）
    /// - `CompetingMessage(id)`: 採用済みのメッセージとは別 ID のパケット（状態は変えない）
    /// - `MessageComplete`: このパケットで完成した
    /// - `Success`: それ以外で受け付けた（保留・別 ID の保留による破棄も含む）
    ///
    /// # エラー
    /// - `TransportError::TooShort` / `TransportError::Malformed`: パケットが壊れている（状態は変えない）
    pub fn add_packet(&mut self, bytes: &[u8]) -> Result<AddPacketStatus, TransportError> {
        if bytes.is_empty() {
            return Ok(AddPacketStatus::NoData);
        }
        if self.is_completed() {
            return Ok(AddPacketStatus::AlreadyFinished);
        }

        match Packet::parse(bytes)? {
            Packet::Settings(settings) => Ok(self.apply_settings(settings)),
            Packet::Data(data) => self.apply_data(&data),
        }
    }

    fn apply_settings(&mut self, settings: SettingsPacket) -> AddPacketStatus {
        let mut work = match &mut self.state {
            State::Finished { .. } => return AddPacketStatus::AlreadyFinished,
            State::Active(active) => {
                if active.message_id == settings.message_id {
                    debug!("message {}: duplicate settings packet ignored", settings.message_id);
                    return AddPacketStatus::Success;
                }
                return AddPacketStatus::CompetingMessage(settings.message_id);
            }
            State::Reserved { message_id, .. } if *message_id != settings.message_id => {
                debug!(
                    "settings for {} rejected: {} is reserved",
                    settings.message_id, message_id
                );
                return AddPacketStatus::Success;
            }
            State::Reserved { buffer, .. } => core::mem::take(buffer),
            State::Empty => VecDeque::new(),
        };

        debug!(
            "message {}: settings applied ({} packets, {} bytes, {} reserved)",
            settings.message_id,
            settings.packet_count,
            settings.data_size,
            work.len()
        );

        let mut active = ActiveMessage::new(&settings);

        // 保留分を到着順にリプレイする（再帰させない）
        while let Some(reserved) = work.pop_front() {
            let position = reserved.position;
            if let Err(e) = active.store(reserved.position, reserved.has_next, reserved.chunk) {
                warn!(
                    "message {}: reserved packet at position {} dropped: {}",
                    settings.message_id, position, e
                );
            }
        }

        if active.is_complete() {
            self.finish(active);
            AddPacketStatus::MessageComplete
        } else {
            self.state = State::Active(active);
            AddPacketStatus::Success
        }
    }

    fn apply_data(&mut self, data: &DataPacket<'_>) -> Result<AddPacketStatus, TransportError> {
        match &mut self.state {
            State::Finished { .. } => Ok(AddPacketStatus::AlreadyFinished),
            State::Empty => {
                trace!("message {}: reserved before settings", data.message_id);
                let mut buffer = VecDeque::new();
                buffer.push_back(ReservedPacket::from_data(data));
                self.state = State::Reserved {
                    message_id: data.message_id,
                    buffer,
                };
                Ok(AddPacketStatus::Success)
            }
            State::Reserved { message_id, buffer } => {
                if *message_id == data.message_id {
                    buffer.push_back(ReservedPacket::from_data(data));
                } else {
                    debug!(
                        "packet for {} dropped: {} is reserved",
                        data.message_id, message_id
                    );
                }
                Ok(AddPacketStatus::Success)
            }
            State::Active(active) => {
                if active.message_id != data.message_id {
                    return Ok(AddPacketStatus::CompetingMessage(data.message_id));
                }
                if !active.store(data.position, data.has_next, data.chunk.to_vec())? {
                    return Ok(AddPacketStatus::Success);
                }
                if let State::Active(active) = core::mem::replace(&mut self.state, State::Empty) {
                    self.finish(active);
                }
                Ok(AddPacketStatus::MessageComplete)
            }
        }
    }

    fn finish(&mut self, active: ActiveMessage) {
        let message_id = active.message_id;
        let data_size = active.data_size;
        let slot_count = active.slot_count;
        let payload = active.into_payload();

        if payload.len() != data_size as usize {
            warn!(
                "message {}: reassembled {} bytes but settings declared {}",
                message_id,
                payload.len(),
                data_size
            );
        }
        debug!("message {}: complete ({} bytes)", message_id, payload.len());

        self.state = State::Finished {
            message_id,
            data_size,
            slot_count,
            payload,
        };
    }

    /// 完成しているか
    pub fn is_completed(&self) -> bool {
        matches!(self.state, State::Finished { .. })
    }

    /// 完成したペイロード（未完成なら `None`）
    pub fn data(&self) -> Option<&[u8]> {
        match &self.state {
            State::Finished { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// 完成したペイロードを取り出す（未完成なら `None`）
    pub fn into_data(self) -> Option<Vec<u8>> {
        match self.state {
            State::Finished { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// 採用済みの ID（設定パケット前なら保留中の ID）
    pub fn message_id(&self) -> Option<MessageId> {
        match &self.state {
            State::Empty => None,
            State::Reserved { message_id, .. } | State::Finished { message_id, .. } => {
                Some(*message_id)
            }
            State::Active(active) => Some(active.message_id),
        }
    }

    /// 設定パケットが宣言したペイロード長
    pub fn expected_len(&self) -> Option<u32> {
        match &self.state {
            State::Active(active) => Some(active.data_size),
            State::Finished { data_size, .. } => Some(*data_size),
            _ => None,
        }
    }

    /// 設定パケットを含む総パケット数（設定パケット適用後のみ）
    pub fn packet_count(&self) -> Option<u32> {
        match &self.state {
            State::Active(active) => Some(active.slot_count + 1),
            State::Finished { slot_count, .. } => Some(slot_count + 1),
            _ => None,
        }
    }

    /// 未受信のデータスロット数（設定パケット適用後のみ）
    pub fn remaining_slots(&self) -> Option<u32> {
        match &self.state {
            State::Active(active) => Some(active.remaining_slots),
            State::Finished { .. } => Some(0),
            _ => None,
        }
    }

    /// 設定パケット待ちで保留しているパケット数
    pub fn reserved_len(&self) -> usize {
        match &self.state {
            State::Reserved { buffer, .. } => buffer.len(),
            _ => 0,
        }
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenter::Segmenter;
    use crate::wire::HAS_NEXT_OFFSET;

    fn packets_of(segmenter: &Segmenter, budget: u32) -> Vec<Vec<u8>> {
        segmenter.packets(budget).unwrap().collect()
    }

    #[test]
    fn test_in_order_hundred_bytes() {
        let segmenter = Segmenter::with_message_id(alloc::vec![b'A'; 100], MessageId(1));
        let packets = packets_of(&segmenter, 20);
        assert_eq!(packets.len(), 13);

        let mut reassembler = Reassembler::new();
        for (i, packet) in packets.iter().enumerate() {
            assert!(!reassembler.is_completed());
            let status = reassembler.add_packet(packet).unwrap();
            if i == 12 {
                assert_eq!(status, AddPacketStatus::MessageComplete);
            } else {
                assert_eq!(status, AddPacketStatus::Success);
            }
        }

        assert!(reassembler.is_completed());
        assert_eq!(reassembler.data(), Some(&[b'A'; 100][..]));
        assert_eq!(reassembler.message_id(), Some(MessageId(1)));
    }

    #[test]
    fn test_empty_and_finished() {
        let mut reassembler = Reassembler::new();
        assert_eq!(reassembler.add_packet(&[]), Ok(AddPacketStatus::NoData));
        assert_eq!(reassembler.message_id(), None);

        let segmenter = Segmenter::with_message_id(alloc::vec![1, 2, 3], MessageId(4));
        let packets = packets_of(&segmenter, 20);
        for packet in &packets {
            reassembler.add_packet(packet).unwrap();
        }
        assert!(reassembler.is_completed());

        // 完成後は何を渡しても AlreadyFinished
        for packet in &packets {
            assert_eq!(reassembler.add_packet(packet), Ok(AddPacketStatus::AlreadyFinished));
        }
        assert_eq!(reassembler.add_packet(&[0u8; 3]), Ok(AddPacketStatus::AlreadyFinished));
        assert_eq!(reassembler.add_packet(&[]), Ok(AddPacketStatus::NoData));
        assert_eq!(reassembler.data(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_empty_payload_completes_on_settings() {
        let segmenter = Segmenter::with_message_id(Vec::new(), MessageId(2));
        let packets = packets_of(&segmenter, 20);
        assert_eq!(packets.len(), 1);

        let mut reassembler = Reassembler::new();
        assert_eq!(
            reassembler.add_packet(&packets[0]),
            Ok(AddPacketStatus::MessageComplete)
        );
        assert_eq!(reassembler.data(), Some(&[][..]));
    }

    #[test]
    fn test_data_before_settings_is_reserved_and_replayed() {
        let payload: Vec<u8> = (0u8..50).collect();
        let segmenter = Segmenter::with_message_id(payload.clone(), MessageId(8));
        let packets = packets_of(&segmenter, 20);

        let mut reassembler = Reassembler::new();
        for packet in &packets[1..] {
            assert_eq!(reassembler.add_packet(packet), Ok(AddPacketStatus::Success));
        }
        assert!(!reassembler.is_completed());
        assert_eq!(reassembler.reserved_len(), packets.len() - 1);
        assert_eq!(reassembler.message_id(), Some(MessageId(8)));

        // 設定パケットで保留分がリプレイされて完成する
        assert_eq!(
            reassembler.add_packet(&packets[0]),
            Ok(AddPacketStatus::MessageComplete)
        );
        assert_eq!(reassembler.into_data(), Some(payload));
    }

    #[test]
    fn test_partial_reservation_then_remaining() {
        let payload: Vec<u8> = (0u8..90).collect();
        let segmenter = Segmenter::with_message_id(payload.clone(), MessageId(3));
        let packets = packets_of(&segmenter, 20); // 1 + 10

        let mut reassembler = Reassembler::new();
        reassembler.add_packet(&packets[4]).unwrap();
        reassembler.add_packet(&packets[2]).unwrap();
        assert_eq!(reassembler.add_packet(&packets[0]), Ok(AddPacketStatus::Success));
        assert_eq!(reassembler.reserved_len(), 0);
        assert_eq!(reassembler.packet_count(), Some(11));
        assert_eq!(reassembler.remaining_slots(), Some(8));
        assert_eq!(reassembler.expected_len(), Some(90));

        for (i, packet) in packets.iter().enumerate() {
            if i == 0 || i == 2 || i == 4 {
                continue;
            }
            reassembler.add_packet(packet).unwrap();
        }
        assert_eq!(reassembler.data(), Some(&payload[..]));
    }

    #[test]
    fn test_last_packet_before_interior_packets() {
        let payload: Vec<u8> = (0u8..40).collect();
        let segmenter = Segmenter::with_message_id(payload.clone(), MessageId(6));
        let packets = packets_of(&segmenter, 20); // 1 + 5
        assert_eq!(packets.last().unwrap()[HAS_NEXT_OFFSET], 0);

        let mut reassembler = Reassembler::new();
        reassembler.add_packet(&packets[0]).unwrap();
        // has_next == 0 が先に届いても完成扱いにしない
        assert_eq!(reassembler.add_packet(&packets[5]), Ok(AddPacketStatus::Success));
        assert_eq!(reassembler.remaining_slots(), Some(4));

        for packet in packets[1..5].iter().rev() {
            reassembler.add_packet(packet).unwrap();
        }
        assert_eq!(reassembler.data(), Some(&payload[..]));
    }

    #[test]
    fn test_competing_message_after_adoption() {
        let a = Segmenter::with_message_id(alloc::vec![b'a'; 30], MessageId(0));
        let b = Segmenter::with_message_id(alloc::vec![b'b'; 30], MessageId(1));
        let a_packets = packets_of(&a, 20);
        let b_packets = packets_of(&b, 20);

        let mut reassembler = Reassembler::new();
        reassembler.add_packet(&a_packets[0]).unwrap();

        assert_eq!(
            reassembler.add_packet(&b_packets[0]),
            Ok(AddPacketStatus::CompetingMessage(MessageId(1)))
        );
        assert_eq!(
            reassembler.add_packet(&b_packets[1]),
            Ok(AddPacketStatus::CompetingMessage(MessageId(1)))
        );
        assert_eq!(reassembler.message_id(), Some(MessageId(0)));
        assert_eq!(reassembler.remaining_slots(), Some(4));
    }

    #[test]
    fn test_competing_id_zero_distinct_from_success() {
        let a = Segmenter::with_message_id(alloc::vec![1u8; 5], MessageId(10));
        let b = Segmenter::with_message_id(alloc::vec![2u8; 5], MessageId(0));

        let mut reassembler = Reassembler::new();
        reassembler.add_packet(&a.packet_at(20, 0).unwrap().unwrap()).unwrap();
        let status = reassembler
            .add_packet(&b.packet_at(20, 1).unwrap().unwrap())
            .unwrap();

        assert_eq!(status, AddPacketStatus::CompetingMessage(MessageId(0)));
        assert_ne!(status, AddPacketStatus::Success);
    }

    #[test]
    fn test_reservation_not_hijacked() {
        let a = Segmenter::with_message_id(alloc::vec![b'a'; 25], MessageId(20));
        let b = Segmenter::with_message_id(alloc::vec![b'b'; 25], MessageId(21));
        let a_packets = packets_of(&a, 20);
        let b_packets = packets_of(&b, 20);

        let mut reassembler = Reassembler::new();
        reassembler.add_packet(&a_packets[1]).unwrap();
        // 別 ID のデータは破棄、別 ID の設定は拒否
        reassembler.add_packet(&b_packets[1]).unwrap();
        assert_eq!(reassembler.add_packet(&b_packets[0]), Ok(AddPacketStatus::Success));
        assert_eq!(reassembler.message_id(), Some(MessageId(20)));
        assert_eq!(reassembler.packet_count(), None);
        assert_eq!(reassembler.reserved_len(), 1);

        reassembler.add_packet(&a_packets[0]).unwrap();
        for packet in &a_packets[2..] {
            reassembler.add_packet(packet).unwrap();
        }
        assert_eq!(reassembler.data(), Some(&[b'a'; 25][..]));
    }

    #[test]
    fn test_malformed_leaves_state_untouched() {
        let segmenter = Segmenter::with_message_id(alloc::vec![9u8; 20], MessageId(1));
        let packets = packets_of(&segmenter, 20); // 1 + 3

        let mut reassembler = Reassembler::new();
        reassembler.add_packet(&packets[0]).unwrap();

        assert_eq!(reassembler.add_packet(&packets[1][..5]), Err(TransportError::TooShort));

        let mut out_of_range = packets[1].clone();
        out_of_range[6..10].copy_from_slice(&9u32.to_be_bytes());
        assert_eq!(
            reassembler.add_packet(&out_of_range),
            Err(TransportError::Malformed(MalformedKind::PositionOutOfRange {
                position: 9,
                slot_count: 3,
            }))
        );
        assert_eq!(reassembler.remaining_slots(), Some(3));

        for packet in &packets[1..] {
            reassembler.add_packet(packet).unwrap();
        }
        assert_eq!(reassembler.data(), Some(&[9u8; 20][..]));
    }

    #[test]
    fn test_reserved_out_of_range_dropped_on_replay() {
        let segmenter = Segmenter::with_message_id(alloc::vec![3u8; 9], MessageId(2));
        let packets = packets_of(&segmenter, 20); // 1 + 1

        let mut bogus = packets[1].clone();
        bogus[6..10].copy_from_slice(&4u32.to_be_bytes());

        let mut reassembler = Reassembler::new();
        reassembler.add_packet(&bogus).unwrap();
        reassembler.add_packet(&packets[1]).unwrap();
        assert_eq!(reassembler.reserved_len(), 2);

        assert_eq!(
            reassembler.add_packet(&packets[0]),
            Ok(AddPacketStatus::MessageComplete)
        );
        assert_eq!(reassembler.data(), Some(&[3u8; 9][..]));
    }

    #[test]
    fn test_duplicate_packets_ignored() {
        let segmenter = Segmenter::with_message_id(alloc::vec![5u8; 27], MessageId(1));
        let packets = packets_of(&segmenter, 20); // 1 + 3

        let mut reassembler = Reassembler::new();
        reassembler.add_packet(&packets[0]).unwrap();
        reassembler.add_packet(&packets[1]).unwrap();
        reassembler.add_packet(&packets[1]).unwrap();
        assert_eq!(reassembler.add_packet(&packets[0]), Ok(AddPacketStatus::Success));
        assert_eq!(reassembler.remaining_slots(), Some(2));

        reassembler.add_packet(&packets[2]).unwrap();
        assert_eq!(
            reassembler.add_packet(&packets[3]),
            Ok(AddPacketStatus::MessageComplete)
        );
    }

    #[test]
    fn test_finished_keeps_declared_settings() {
        let segmenter = Segmenter::with_message_id(alloc::vec![b'A'; 100], MessageId(1));
        let mut reassembler = Reassembler::new();
        for packet in packets_of(&segmenter, 20) {
            reassembler.add_packet(&packet).unwrap();
        }
        assert!(reassembler.is_completed());
        assert_eq!(reassembler.packet_count(), Some(13));
        assert_eq!(reassembler.remaining_slots(), Some(0));
        assert_eq!(reassembler.expected_len(), Some(100));

        // 宣言された長さと実際の長さが食い違っても、宣言値を返す
        let settings = SettingsPacket {
            message_id: MessageId(2),
            packet_count: 2,
            data_size: 10,
        }
        .encode();
        let data = DataPacket {
            message_id: MessageId(2),
            position: 1,
            has_next: false,
            chunk: &[1, 2, 3],
        }
        .encode();

        let mut short = Reassembler::new();
        short.add_packet(&settings).unwrap();
        assert_eq!(short.add_packet(&data), Ok(AddPacketStatus::MessageComplete));
        assert_eq!(short.data(), Some(&[1u8, 2, 3][..]));
        assert_eq!(short.expected_len(), Some(10));
        assert_eq!(short.packet_count(), Some(2));
        assert_eq!(short.remaining_slots(), Some(0));
    }

    #[test]
    fn test_huge_declared_count_allocates_lazily() {
        let settings = SettingsPacket {
            message_id: MessageId(4),
            packet_count: u32::MAX,
            data_size: u32::MAX,
        }
        .encode();
        let data = crate::wire::DataPacket {
            message_id: MessageId(4),
            position: 1,
            has_next: true,
            chunk: &[1, 2, 3],
        }
        .encode();

        let mut reassembler = Reassembler::new();
        assert_eq!(reassembler.add_packet(&settings), Ok(AddPacketStatus::Success));
        assert_eq!(reassembler.add_packet(&data), Ok(AddPacketStatus::Success));
        assert_eq!(reassembler.packet_count(), Some(u32::MAX));
        assert_eq!(reassembler.remaining_slots(), Some(u32::MAX - 2));
    }

    /// 2 メッセージを交互に流し、設定パケットは A → B の順で先に流す
    #[test]
    fn test_interleaved_settings_first() {
        let a_payload = alloc::vec![b'x'; 64];
        let b_payload = alloc::vec![b'y'; 97];
        let a = Segmenter::with_message_id(a_payload.clone(), MessageId(100));
        let b = Segmenter::with_message_id(b_payload, MessageId(101));

        for budget in [20u32, 21, 22] {
            let mut reassembler = Reassembler::new();
            reassembler.add_packet(&a.packet_at(budget, 0).unwrap().unwrap()).unwrap();
            assert_eq!(
                reassembler.add_packet(&b.packet_at(budget, 0).unwrap().unwrap()),
                Ok(AddPacketStatus::CompetingMessage(MessageId(101)))
            );

            let mut competing = 0;
            for index in 1..200 {
                for segmenter in [&b, &a] {
                    if let Some(packet) = segmenter.packet_at(budget, index).unwrap() {
                        if let AddPacketStatus::CompetingMessage(id) =
                            reassembler.add_packet(&packet).unwrap()
                        {
                            assert_eq!(id, MessageId(101));
                            competing += 1;
                        }
                    }
                }
            }

            assert!(competing > 0);
            assert_eq!(reassembler.data(), Some(&a_payload[..]));
        }
    }

    /// 2 メッセージを逆順に交互に流し、設定パケットを最後に流す
    ///
    /// 最初に届いたデータパケット（パケット数の多い方）の ID が保留され、そのメッセージが完成する。
    #[test]
    fn test_interleaved_settings_last() {
        let short = Segmenter::with_message_id(alloc::vec![b's'; 30], MessageId(7));
        let long_payload: Vec<u8> = (0..120u32).map(|i| i as u8).collect();
        let long = Segmenter::with_message_id(long_payload.clone(), MessageId(8));

        for budget in [20u32, 21, 22] {
            let mut reassembler = Reassembler::new();
            for index in (1..200).rev() {
                for segmenter in [&long, &short] {
                    if let Some(packet) = segmenter.packet_at(budget, index).unwrap() {
                        assert!(!reassembler.is_completed());
                        reassembler.add_packet(&packet).unwrap();
                    }
                }
            }
            assert_eq!(reassembler.message_id(), Some(MessageId(8)));

            for segmenter in [&short, &long] {
                reassembler
                    .add_packet(&segmenter.packet_at(budget, 0).unwrap().unwrap())
                    .unwrap();
            }

            assert!(reassembler.is_completed());
            assert_eq!(reassembler.data(), Some(&long_payload[..]));
        }
    }
}
