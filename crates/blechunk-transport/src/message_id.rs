//! メッセージ ID（16ビット）と採番カウンタ
//!
//! 同一チャンネル上で同時に流れている論理メッセージを区別するための ID。
//! 一意性は「同時に転送中のメッセージ間」でのみ保証され、値は循環する。

use core::sync::atomic::{AtomicU16, Ordering};

/// 既存ピア互換の最大 ID
///
/// 既存の実装は ID を符号付き 16 ビットとして扱い、`0x7FFF` の次を 0 に戻す。
pub const LEGACY_MAX_MESSAGE_ID: u16 = 0x7FFF;

/// 論理メッセージの ID（wire 上は 2 バイト big-endian）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u16);

impl MessageId {
    /// 生の u16 値を返す
    pub fn raw(&self) -> u16 {
        self.0
    }
}

impl From<u16> for MessageId {
    fn from(val: u16) -> Self {
        MessageId(val)
    }
}

impl core::fmt::Display for MessageId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// メッセージ ID の採番元
///
/// テストで ID を固定したい場合や、接続ごとに独立した系列を使いたい場合に差し替える。
pub trait MessageIdSource: Send + Sync {
    /// 次の ID を払い出す
    fn next_id(&self) -> MessageId;
}

/// アトミックに増加し、最大値の次で 0 に戻る ID カウンタ
///
/// 複数スレッドから同時に `Segmenter` を生成しても ID が重複しない。
#[derive(Debug)]
pub struct MessageIdCounter {
    /// 次に払い出す ID
    next: AtomicU16,
    /// 払い出す ID の最大値（これを払い出した次は 0）
    max: u16,
}

impl MessageIdCounter {
    /// 既存ピア互換（`0..=0x7FFF` で循環）のカウンタを生成する
    pub const fn new() -> Self {
        Self::starting_at(0, LEGACY_MAX_MESSAGE_ID)
    }

    /// u16 の全範囲（`0..=0xFFFF`）で循環するカウンタを生成する
    pub const fn full_range() -> Self {
        Self::starting_at(0, u16::MAX)
    }

    /// 開始値と最大値を指定してカウンタを生成する
    pub const fn starting_at(start: u16, max: u16) -> Self {
        MessageIdCounter {
            next: AtomicU16::new(start),
            max,
        }
    }

    /// 払い出す ID の最大値
    pub fn max(&self) -> u16 {
        self.max
    }

    /// 次に払い出される ID を覗く（払い出しはしない）
    pub fn peek(&self) -> MessageId {
        MessageId(self.clamp(self.next.load(Ordering::Acquire)))
    }

    fn clamp(&self, raw: u16) -> u16 {
        if raw > self.max {
            0
        } else {
            raw
        }
    }
}

impl MessageIdSource for MessageIdCounter {
    fn next_id(&self) -> MessageId {
        let result = self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let current = self.clamp(current);
                Some(if current >= self.max { 0 } else { current + 1 })
            });
        // クロージャは常に Some を返すので Err にはならない
        let previous = match result {
            Ok(prev) | Err(prev) => prev,
        };
        MessageId(self.clamp(previous))
    }
}

impl<T: MessageIdSource + ?Sized> MessageIdSource for &T {
    fn next_id(&self) -> MessageId {
        (**self).next_id()
    }
}

impl Default for MessageIdCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// プロセス全体で共有する既定のカウンタ
pub static GLOBAL_MESSAGE_IDS: MessageIdCounter = MessageIdCounter::new();
