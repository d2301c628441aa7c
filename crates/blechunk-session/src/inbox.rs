//! 受信パケットの振り分け
//!
//! 1 本の接続に複数メッセージのパケットが混在して届くので、MessageId ごとに
//! `Reassembler` を割り当てて並行に組み立てる。完成したものから順に返す。
//!
//! - 完成済みの ID は直近 `recent_capacity` 件だけ覚えておき、遅れて届いた
//!   パケット（再送・重複）で新しい組み立てを始めないようにする
//! - 組み立て中のメッセージが `max_in_flight` を超えたら最も古いものを捨てる
//!
//! 相手がカウンタを 0 からやり直した場合（アプリの再起動等）、新しいメッセージの ID が
//! 完成済みの記録と重なり、遅れて届いたパケットとして捨てられる。再接続時は必ず
//! `Inbox::clear()` を呼ぶこと。

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;

use log::{debug, trace, warn};
use serde::Serialize;

use blechunk_transport::{AddPacketStatus, MessageId, PacketHeader, Reassembler, TransportError};

use crate::{DEFAULT_MAX_IN_FLIGHT, DEFAULT_RECENT_CAPACITY};

/// 受信側の設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboxConfig {
    /// 同時に組み立て中にできるメッセージ数（0 は 1 として扱う）
    pub max_in_flight: usize,
    /// 完成済みとして覚えておく ID の数（0 なら覚えない）
    pub recent_capacity: usize,
}

impl Default for InboxConfig {
    fn default() -> Self {
        InboxConfig {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            recent_capacity: DEFAULT_RECENT_CAPACITY,
        }
    }
}

/// 受信統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InboxStats {
    /// 組み立て中のメッセージ数
    pub in_flight: usize,
    /// 完成したメッセージ数
    pub completed: u64,
    /// 完成済みメッセージ宛てで破棄したパケット数
    pub late_dropped: u64,
    /// 上限超過で破棄した組み立て中メッセージ数
    pub evicted: u64,
    /// 壊れていたパケット数
    pub malformed: u64,
}

/// 完成したメッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub payload: Vec<u8>,
}

struct InFlight {
    reassembler: Reassembler,
    /// 組み立て開始順（退避対象の選択用）
    opened: u64,
}

/// MessageId ごとに `Reassembler` を割り当てる受信口
pub struct Inbox {
    config: InboxConfig,
    in_flight: BTreeMap<MessageId, InFlight>,
    /// 直近に完成した ID（古い順）
    recent: VecDeque<MessageId>,
    next_opened: u64,
    stats: InboxStats,
}

impl Inbox {
    pub fn new(config: InboxConfig) -> Self {
        Inbox {
            config,
            in_flight: BTreeMap::new(),
            recent: VecDeque::new(),
            next_opened: 0,
            stats: InboxStats::default(),
        }
    }

    /// 受信したパケットを 1 つ処理する
    ///
    /// # 戻り値
    /// - `Some(message)`: このパケットでメッセージが完成した
    /// - `None`: まだ完成していない（または破棄した）
    ///
    /// # エラー
    /// - `TransportError::TooShort` / `TransportError::Malformed`: パケットが壊れている
    pub fn push_packet(&mut self, bytes: &[u8]) -> Result<Option<ReceivedMessage>, TransportError> {
        if bytes.is_empty() {
            return Ok(None);
        }

        // 振り分けには共通ヘッダーだけで足りる（本体の検証は Reassembler が行う）
        let message_id = match PacketHeader::peek(bytes) {
            Ok(header) => header.message_id,
            Err(e) => return Err(self.reject(None, e)),
        };

        if self.recent.contains(&message_id) {
            trace!("message {}: late packet dropped", message_id);
            self.stats.late_dropped += 1;
            return Ok(None);
        }

        let status = if let Some(entry) = self.in_flight.get_mut(&message_id) {
            match entry.reassembler.add_packet(bytes) {
                Ok(status) => status,
                Err(e) => return Err(self.reject(Some(message_id), e)),
            }
        } else {
            // 壊れたパケットでは組み立てを始めない（他のメッセージを退避させない）
            let mut reassembler = Reassembler::new();
            let status = match reassembler.add_packet(bytes) {
                Ok(status) => status,
                Err(e) => return Err(self.reject(Some(message_id), e)),
            };

            self.make_room();
            debug!("message {}: reassembly started", message_id);
            self.in_flight.insert(
                message_id,
                InFlight {
                    reassembler,
                    opened: self.next_opened,
                },
            );
            self.next_opened += 1;
            status
        };

        match status {
            AddPacketStatus::MessageComplete => Ok(self.complete(message_id)),
            AddPacketStatus::CompetingMessage(other) => {
                // ID ごとに振り分けているので通常は起きない
                warn!("message {}: unexpected competing packet for {}", message_id, other);
                Ok(None)
            }
            AddPacketStatus::Success
            | AddPacketStatus::AlreadyFinished
            | AddPacketStatus::NoData => Ok(None),
        }
    }

    fn reject(&mut self, message_id: Option<MessageId>, error: TransportError) -> TransportError {
        self.stats.malformed += 1;
        match message_id {
            Some(id) => warn!("message {}: malformed packet dropped: {}", id, error),
            None => warn!("malformed packet dropped: {}", error),
        }
        error
    }

    fn complete(&mut self, message_id: MessageId) -> Option<ReceivedMessage> {
        let entry = self.in_flight.remove(&message_id)?;
        let payload = entry.reassembler.into_data()?;

        self.remember(message_id);
        self.stats.completed += 1;

        Some(ReceivedMessage {
            message_id,
            payload,
        })
    }

    fn remember(&mut self, message_id: MessageId) {
        if self.config.recent_capacity == 0 {
            return;
        }
        while self.recent.len() >= self.config.recent_capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(message_id);
    }

    /// 新しい組み立てを 1 つ始められるよう、上限に達していれば古いものを捨てる
    fn make_room(&mut self) {
        let limit = self.config.max_in_flight.max(1);
        while self.in_flight.len() >= limit {
            let oldest = self
                .in_flight
                .iter()
                .min_by_key(|(_, entry)| entry.opened)
                .map(|(id, _)| *id);

            let Some(oldest) = oldest else {
                break;
            };
            warn!("message {}: evicted before completion", oldest);
            self.in_flight.remove(&oldest);
            self.stats.evicted += 1;
        }
    }

    /// 組み立て中の ID（昇順）
    pub fn in_flight_ids(&self) -> Vec<MessageId> {
        self.in_flight.keys().copied().collect()
    }

    /// 指定 ID の組み立てを破棄する（呼び出し側のタイムアウト処理用）
    ///
    /// # 戻り値
    /// 組み立て中だった場合 `true`
    pub fn discard(&mut self, message_id: MessageId) -> bool {
        self.in_flight.remove(&message_id).is_some()
    }

    /// 接続が切れたときなどに、組み立て中・完成済みの記録をすべて消す
    ///
    /// 統計は残す。
    pub fn clear(&mut self) {
        self.in_flight.clear();
        self.recent.clear();
    }

    pub fn config(&self) -> InboxConfig {
        self.config
    }

    pub fn stats(&self) -> InboxStats {
        InboxStats {
            in_flight: self.in_flight.len(),
            ..self.stats
        }
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new(InboxConfig::default())
    }
}
