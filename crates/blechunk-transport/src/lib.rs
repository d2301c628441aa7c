//! # blechunk-transport
//!
//! 極小 MTU のリンク（BLE キャラクタリスティック等）向けチャンク転送プロトコル。
//!
//! 任意長のペイロードを固定バジェットのパケット列に分割し（[`Segmenter`]）、
//! 別メッセージのパケットが混在する受信列から元のペイロードを復元する（[`Reassembler`]）。
//!
//! ## Wire Format（すべて big-endian）
//!
//! ```text
//! 共通ヘッダー:
//!   [message_id: u16][packet_size: u32][packet_position: u32]
//!
//! 設定パケット（packet_position == 0）:
//!   [共通ヘッダー][packet_count: u32][data_size: u32]          = 18 bytes
//!
//! データパケット（packet_position >= 1）:
//!   [共通ヘッダー][has_next: u8][chunk: packet_size - 11 bytes]
//! ```
//!
//! ## データフロー
//!
//! ```text
//! payload + budget → Segmenter → packet[0..N) → (BLE 等) → Reassembler::add_packet() × N → data()
//! ```

#![no_std]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod message_id;
pub mod reassembler;
pub mod segmenter;
pub mod settings;
pub mod wire;

pub use error::{MalformedKind, TransportError};
pub use message_id::{MessageId, MessageIdCounter, MessageIdSource, GLOBAL_MESSAGE_IDS};
pub use reassembler::{AddPacketStatus, Reassembler};
pub use segmenter::{Packets, Segmenter};
pub use settings::TransferSettings;
pub use wire::{DataPacket, Packet, PacketHeader, SettingsPacket};
