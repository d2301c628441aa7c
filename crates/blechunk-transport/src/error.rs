//! blechunk-transport エラー型

/// パケットのヘッダー値が矛盾している理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedKind {
    /// packet_size がデータヘッダー長未満、またはバッファ長を超えている
    PacketSizeOutOfRange { packet_size: u32, buffer_len: usize },
    /// 設定パケットの packet_count が 0（設定パケット自身を含むので最低 1）
    ZeroPacketCount,
    /// packet_count と data_size が整合しない
    InconsistentSettings { packet_count: u32, data_size: u32 },
    /// データパケットの位置がスロット数を超えている
    PositionOutOfRange { position: u32, slot_count: u32 },
}

/// トランスポート層のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// パケットがヘッダー長に満たない
    TooShort,
    /// ヘッダーの値が不正
    Malformed(MalformedKind),
    /// 送信バジェットがデータヘッダーすら載せられない
    BudgetTooSmall { budget: u32, min: u32 },
    /// ペイロード長・パケット数が 4 バイトのヘッダーフィールドに収まらない
    PayloadTooLarge { len: usize },
}

impl core::fmt::Display for MalformedKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MalformedKind::PacketSizeOutOfRange { packet_size, buffer_len } => write!(
                f,
                "packet_size {} out of range for {} byte buffer",
                packet_size, buffer_len
            ),
            MalformedKind::ZeroPacketCount => write!(f, "packet_count is zero"),
            MalformedKind::InconsistentSettings { packet_count, data_size } => write!(
                f,
                "packet_count {} inconsistent with data_size {}",
                packet_count, data_size
            ),
            MalformedKind::PositionOutOfRange { position, slot_count } => write!(
                f,
                "packet_position {} exceeds {} data slots",
                position, slot_count
            ),
        }
    }
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TransportError::TooShort => write!(f, "Packet too short"),
            TransportError::Malformed(kind) => write!(f, "Malformed packet: {}", kind),
            TransportError::BudgetTooSmall { budget, min } => write!(
                f,
                "Transmission budget {} too small (must be at least {})",
                budget, min
            ),
            TransportError::PayloadTooLarge { len } => {
                write!(f, "Payload of {} bytes cannot be encoded", len)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransportError {}

impl From<MalformedKind> for TransportError {
    fn from(kind: MalformedKind) -> Self {
        TransportError::Malformed(kind)
    }
}
