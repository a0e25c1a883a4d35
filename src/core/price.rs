use crate::domain::model::{AdjustmentKind, AdjustmentPolicy};
use rust_decimal::Decimal;

/// 依調價策略計算實際售價
///
/// - `none`: 原價
/// - `percentage`: `base + base * (value / 100)`，負值代表降價
/// - `fixed`: `base + value`
///
/// 結果最低為 0，不會產生負價格。
/// 超出 `Decimal` 可表示範圍時回傳 `None`。
pub fn adjust(base: Decimal, policy: &AdjustmentPolicy) -> Option<Decimal> {
    let adjusted = match policy.kind {
        AdjustmentKind::None => base,
        AdjustmentKind::Percentage => {
            let delta = base.checked_mul(policy.value.checked_div(Decimal::ONE_HUNDRED)?)?;
            base.checked_add(delta)?
        }
        AdjustmentKind::Fixed => base.checked_add(policy.value)?,
    };

    Some(adjusted.max(Decimal::ZERO))
}
