//! パケットの Wire Format
//!
//! ## 共通ヘッダー（10 bytes）
//! ```text
//! [message_id: u16 BE (0..2)][packet_size: u32 BE (2..6)][packet_position: u32 BE (6..10)]
//! ```
//!
//! ## 設定パケット（packet_position == 0、18 bytes 固定）
//! ```text
//! [共通ヘッダー][packet_count: u32 BE (10..14)][data_size: u32 BE (14..18)]
//! ```
//! packet_count は設定パケット自身を含む総パケット数。
//!
//! ## データパケット（packet_position >= 1）
//! ```text
//! [共通ヘッダー][has_next: u8 (10)][chunk: (11..packet_size)]
//! ```
//! has_next: 0 = 最後のデータパケット、1 = 後続あり

use alloc::vec::Vec;

use crate::error::{MalformedKind, TransportError};
use crate::message_id::MessageId;

pub const MESSAGE_ID_OFFSET: usize = 0;
pub const PACKET_SIZE_OFFSET: usize = 2;
pub const PACKET_POSITION_OFFSET: usize = 6;
/// 共通ヘッダー長
pub const COMMON_HEADER_LEN: usize = 10;

pub const PACKET_COUNT_OFFSET: usize = 10;
pub const DATA_SIZE_OFFSET: usize = 14;
/// 設定パケットのヘッダー長（= 設定パケットの全長）
pub const SETTINGS_HEADER_LEN: usize = 18;

pub const HAS_NEXT_OFFSET: usize = 10;
/// データパケットのヘッダー長（chunk はこの直後から始まる）
pub const DATA_HEADER_LEN: usize = 11;

/// has_next: 最後のデータパケット
pub const HAS_NEXT_LAST: u8 = 0;
/// has_next: 後続のデータパケットあり
pub const HAS_NEXT_MORE: u8 = 1;

/// 設定パケットの位置
pub const SETTINGS_POSITION: u32 = 0;

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_be_bytes(buf)
}

/// 全パケット共通のヘッダー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub message_id: MessageId,
    /// このパケットの wire 上の全長
    pub packet_size: u32,
    /// 0 = 設定パケット、1 以上 = データパケット
    pub packet_position: u32,
}

impl PacketHeader {
    /// 共通ヘッダーだけを読み取る（種別ごとの検証はしない）
    ///
    /// # エラー
    /// - `TransportError::TooShort`: 10 バイト未満
    pub fn peek(bytes: &[u8]) -> Result<Self, TransportError> {
        if bytes.len() < COMMON_HEADER_LEN {
            return Err(TransportError::TooShort);
        }

        Ok(PacketHeader {
            message_id: MessageId(read_u16(bytes, MESSAGE_ID_OFFSET)),
            packet_size: read_u32(bytes, PACKET_SIZE_OFFSET),
            packet_position: read_u32(bytes, PACKET_POSITION_OFFSET),
        })
    }

    /// 設定パケットかどうか
    pub fn is_settings(&self) -> bool {
        self.packet_position == SETTINGS_POSITION
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.message_id.raw().to_be_bytes());
        out.extend_from_slice(&self.packet_size.to_be_bytes());
        out.extend_from_slice(&self.packet_position.to_be_bytes());
    }
}

/// 設定パケット（メッセージごとに 1 つ）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsPacket {
    pub message_id: MessageId,
    /// 設定パケットを含む総パケット数
    pub packet_count: u32,
    /// ペイロードの総バイト数
    pub data_size: u32,
}

impl SettingsPacket {
    /// データスロット数（= packet_count - 1）
    pub fn slot_count(&self) -> u32 {
        self.packet_count.saturating_sub(1)
    }

    /// packet_count と data_size の整合性を検証する
    ///
    /// データパケットは最低 1 バイトを運ぶので、スロット数は data_size を超えない。
    /// data_size が 0 のときは設定パケットのみ（packet_count == 1）。
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.packet_count == 0 {
            return Err(MalformedKind::ZeroPacketCount.into());
        }

        let slots = self.slot_count();
        let consistent = if self.data_size == 0 {
            slots == 0
        } else {
            slots >= 1 && slots <= self.data_size
        };

        if consistent {
            Ok(())
        } else {
            Err(MalformedKind::InconsistentSettings {
                packet_count: self.packet_count,
                data_size: self.data_size,
            }
            .into())
        }
    }

    /// Wire Format に変換する（常に 18 バイト）
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(SETTINGS_HEADER_LEN);
        PacketHeader {
            message_id: self.message_id,
            packet_size: SETTINGS_HEADER_LEN as u32,
            packet_position: SETTINGS_POSITION,
        }
        .write_to(&mut bytes);
        bytes.extend_from_slice(&self.packet_count.to_be_bytes());
        bytes.extend_from_slice(&self.data_size.to_be_bytes());
        bytes
    }
}

/// データパケット（ペイロードの連続した一部を運ぶ）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPacket<'a> {
    pub message_id: MessageId,
    /// 1 始まりの位置（スロット番号 + 1）
    pub position: u32,
    /// 後続のデータパケットがあるか
    pub has_next: bool,
    pub chunk: &'a [u8],
}

impl DataPacket<'_> {
    /// Wire Format に変換する
    ///
    /// `chunk` の長さはヘッダー込みで u32 に収まること（呼び出し側で保証）。
    pub fn encode(&self) -> Vec<u8> {
        let packet_size = DATA_HEADER_LEN + self.chunk.len();
        let mut bytes = Vec::with_capacity(packet_size);
        PacketHeader {
            message_id: self.message_id,
            packet_size: packet_size as u32,
            packet_position: self.position,
        }
        .write_to(&mut bytes);
        bytes.push(if self.has_next { HAS_NEXT_MORE } else { HAS_NEXT_LAST });
        bytes.extend_from_slice(self.chunk);
        bytes
    }
}

/// 受信したパケット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet<'a> {
    Settings(SettingsPacket),
    Data(DataPacket<'a>),
}

impl<'a> Packet<'a> {
    /// 受信バイト列をパースし、ヘッダー値の境界を検証する
    ///
    /// データパケットの packet_size より後ろのバイトは無視する。
    /// has_next は 0 以外を「後続あり」として扱う。
    ///
    /// # エラー
    /// - `TransportError::TooShort`: 種別ごとのヘッダー長に満たない
    /// - `TransportError::Malformed`: packet_size / packet_count / data_size の矛盾
    pub fn parse(bytes: &'a [u8]) -> Result<Self, TransportError> {
        let header = PacketHeader::peek(bytes)?;

        if header.is_settings() {
            if bytes.len() < SETTINGS_HEADER_LEN {
                return Err(TransportError::TooShort);
            }
            let settings = SettingsPacket {
                message_id: header.message_id,
                packet_count: read_u32(bytes, PACKET_COUNT_OFFSET),
                data_size: read_u32(bytes, DATA_SIZE_OFFSET),
            };
            settings.validate()?;
            return Ok(Packet::Settings(settings));
        }

        if bytes.len() < DATA_HEADER_LEN {
            return Err(TransportError::TooShort);
        }

        let packet_size = header.packet_size as usize;
        if packet_size < DATA_HEADER_LEN || packet_size > bytes.len() {
            return Err(MalformedKind::PacketSizeOutOfRange {
                packet_size: header.packet_size,
                buffer_len: bytes.len(),
            }
            .into());
        }

        Ok(Packet::Data(DataPacket {
            message_id: header.message_id,
            position: header.packet_position,
            has_next: bytes[HAS_NEXT_OFFSET] != HAS_NEXT_LAST,
            chunk: &bytes[DATA_HEADER_LEN..packet_size],
        }))
    }

    pub fn message_id(&self) -> MessageId {
        match self {
            Packet::Settings(s) => s.message_id,
            Packet::Data(d) => d.message_id,
        }
    }
}
