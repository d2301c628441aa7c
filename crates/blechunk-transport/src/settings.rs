//! 転送設定

use crate::error::TransportError;
use crate::wire::DATA_HEADER_LEN;

/// 既定の送信バジェット（バイト）
///
/// BLE 4.0 の既定 ATT ペイロード長（MTU 23 - ATT ヘッダー 3）。
/// MTU ネゴシエーション前でも必ず送れるサイズ。
pub const DEFAULT_BUDGET: u32 = 20;

/// 送信バジェットの最小値（データヘッダー + 1 バイト）
///
/// バジェットはデータパケットの上限。設定パケットは常に 18 バイトなので、
/// 18 未満のバジェットでは設定パケットだけがバジェットを超える。
/// リンクは最低 18 バイトを 1 回で運べること。
pub const MIN_BUDGET: u32 = DATA_HEADER_LEN as u32 + 1;

/// 送信側の転送設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSettings {
    /// 1 パケットの最大バイト数（ネゴシエーション済み MTU から決まる）
    budget: u32,
}

impl TransferSettings {
    /// バジェットを検証して設定を生成する
    ///
    /// # エラー
    /// - `TransportError::BudgetTooSmall`: データヘッダー（11 バイト）以下
    pub fn new(budget: u32) -> Result<Self, TransportError> {
        check_budget(budget)?;
        Ok(TransferSettings { budget })
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// 1 データパケットに載るペイロードの最大バイト数
    pub fn max_chunk(&self) -> usize {
        self.budget as usize - DATA_HEADER_LEN
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        TransferSettings {
            budget: DEFAULT_BUDGET,
        }
    }
}

pub(crate) fn check_budget(budget: u32) -> Result<(), TransportError> {
    if budget < MIN_BUDGET {
        return Err(TransportError::BudgetTooSmall {
            budget,
            min: MIN_BUDGET,
        });
    }
    Ok(())
}
