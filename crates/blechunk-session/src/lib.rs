//! # blechunk-session
//!
//! 接続 1 本分の送受信をまとめるオーケストレーション層。
//!
//! `blechunk-transport` の `Segmenter` / `Reassembler` は 1 メッセージ単位の部品なので、
//! 複数メッセージの送信キューと、混在して届くパケットの振り分けをここで担当する。
//!
//! ## 構成
//!
//! ```text
//! 送信: enqueue(payload) → Outbox ──next_packet()──→ キャラクタリスティック書き込み
//!                          （メッセージ単位で順番に Segmenter を消化）
//!
//! 受信: 通知 / 書き込み受信 → Inbox::push_packet()
//!                          （MessageId ごとに Reassembler を割り当て、完成したら返す）
//! ```
//!
//! 接続の確立・切断・タイムアウトは呼び出し側の責任。切断時は `Inbox::clear()` を呼ぶ。
//! 相手がカウンタを 0 からやり直す（再起動する）と、clear しない限り再利用された ID の
//! メッセージは完成済み扱いで捨てられる。

#![no_std]
extern crate alloc;

pub mod inbox;
pub mod outbox;

pub use inbox::{Inbox, InboxConfig, InboxStats, ReceivedMessage};
pub use outbox::{Outbox, OutboxStats};

/// 同時に組み立て中にできるメッセージ数の既定値
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// 完成済みとして覚えておく ID の数の既定値（遅れて届いたパケットの破棄用）
pub const DEFAULT_RECENT_CAPACITY: usize = 16;
