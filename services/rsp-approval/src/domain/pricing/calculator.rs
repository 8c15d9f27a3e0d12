//! RSP 价格瀑布计算
//!
//! 计算过程中不做任何舍入，只在存储/展示边界调用 [`PricingResult::rounded`]。

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::{PricingError, PricingInputs, PricingResultOf, RateSet};

/// 金额保留的小数位
pub const MONEY_SCALE: u32 = 2;

/// 完整价格瀑布
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingResult {
    pub rsp: Decimal,
    pub rsp_without_vat: Decimal,
    pub rsp_per_case: Decimal,
    pub retail_markup: Decimal,
    pub bptt: Decimal,
    pub dplc: Decimal,
    pub cif: Decimal,
    pub gsv: Decimal,
    pub tts_percentage: Decimal,
    pub tts: Decimal,
    /// Trade output
    pub to: Decimal,
    pub gp: Decimal,
    pub gm_percentage: Decimal,
    pub cogs_per_case: Decimal,
}

/// TTS 调整后重算的尾段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSpendBreakdown {
    pub tts_percentage: Decimal,
    pub tts: Decimal,
    pub to: Decimal,
    pub gp: Decimal,
    pub gm_percentage: Decimal,
}

/// 银行家舍入到两位小数
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

impl PricingResult {
    /// 存储/展示边界的两位小数版本
    pub fn rounded(&self) -> Self {
        Self {
            rsp: round_money(self.rsp),
            rsp_without_vat: round_money(self.rsp_without_vat),
            rsp_per_case: round_money(self.rsp_per_case),
            retail_markup: round_money(self.retail_markup),
            bptt: round_money(self.bptt),
            dplc: round_money(self.dplc),
            cif: round_money(self.cif),
            gsv: round_money(self.gsv),
            tts_percentage: round_money(self.tts_percentage),
            tts: round_money(self.tts),
            to: round_money(self.to),
            gp: round_money(self.gp),
            gm_percentage: round_money(self.gm_percentage),
            cogs_per_case: round_money(self.cogs_per_case),
        }
    }

    /// 用新的 TTS 尾段替换
    pub fn with_trade_spend(mut self, breakdown: TradeSpendBreakdown) -> Self {
        self.tts_percentage = breakdown.tts_percentage;
        self.tts = breakdown.tts;
        self.to = breakdown.to;
        self.gp = breakdown.gp;
        self.gm_percentage = breakdown.gm_percentage;
        self
    }
}

impl TradeSpendBreakdown {
    pub fn rounded(&self) -> Self {
        Self {
            tts_percentage: round_money(self.tts_percentage),
            tts: round_money(self.tts),
            to: round_money(self.to),
            gp: round_money(self.gp),
            gm_percentage: round_money(self.gm_percentage),
        }
    }
}

fn overflow(what: &str) -> PricingError {
    PricingError::InvalidInput(format!("{} overflowed", what))
}

fn divide(numerator: Decimal, denominator: Decimal, what: &'static str) -> PricingResultOf<Decimal> {
    if denominator.is_zero() {
        return Err(PricingError::DivisionByZero(what));
    }
    numerator.checked_div(denominator).ok_or_else(|| overflow(what))
}

fn multiply(lhs: Decimal, rhs: Decimal, what: &str) -> PricingResultOf<Decimal> {
    lhs.checked_mul(rhs).ok_or_else(|| overflow(what))
}

fn add(lhs: Decimal, rhs: Decimal, what: &str) -> PricingResultOf<Decimal> {
    lhs.checked_add(rhs).ok_or_else(|| overflow(what))
}

fn subtract(lhs: Decimal, rhs: Decimal, what: &str) -> PricingResultOf<Decimal> {
    lhs.checked_sub(rhs).ok_or_else(|| overflow(what))
}

fn ensure_positive(value: Decimal, name: &str) -> PricingResultOf<()> {
    if value <= Decimal::ZERO {
        return Err(PricingError::InvalidInput(format!(
            "'{}' must be positive, got {}",
            name, value
        )));
    }
    Ok(())
}

fn ensure_non_negative(value: Decimal, name: &str) -> PricingResultOf<()> {
    if value < Decimal::ZERO {
        return Err(PricingError::InvalidInput(format!(
            "'{}' must be non-negative, got {}",
            name, value
        )));
    }
    Ok(())
}

/// 由建议零售价计算完整价格瀑布
pub fn calculate(inputs: &PricingInputs, rsp: Decimal) -> PricingResultOf<PricingResult> {
    ensure_positive(rsp, "rsp")?;
    ensure_positive(inputs.pieces_per_case, "pieces_per_case")?;
    ensure_non_negative(inputs.cogs_per_case, "cogs_per_case")?;
    inputs.rates.validate()?;

    let rates = &inputs.rates;
    let one = Decimal::ONE;

    let rsp_without_vat = divide(rsp, add(one, rates.vat, "vat")?, "vat")?;
    let rsp_per_case = multiply(rsp_without_vat, inputs.pieces_per_case, "rsp per case")?;
    let retail_markup = divide(rsp_per_case, add(one, rates.rm, "retail markup")?, "retail markup")?;
    let bptt = divide(retail_markup, add(one, rates.wsm, "wholesale markup")?, "wholesale markup")?;
    let dplc = divide(bptt, add(one, rates.dm, "distributor markup")?, "distributor markup")?;
    let landed = add(add(one, rates.duty, "duty")?, rates.clearing_charges, "duty")?;
    let cif = subtract(divide(dplc, landed, "duty")?, rates.bd, "cif")?;
    let gsv = divide(cif, add(one, rates.cpp, "cpp")?, "cpp")?;

    let trade = recompute_tts(gsv, inputs.cogs_per_case, inputs.tts_percentage)?;

    Ok(PricingResult {
        rsp,
        rsp_without_vat,
        rsp_per_case,
        retail_markup,
        bptt,
        dplc,
        cif,
        gsv,
        tts_percentage: trade.tts_percentage,
        tts: trade.tts,
        to: trade.to,
        gp: trade.gp,
        gm_percentage: trade.gm_percentage,
        cogs_per_case: inputs.cogs_per_case,
    })
}

/// 固定 GSV 和 COGS，只按新的 TTS 百分比重算尾段
pub fn recompute_tts(
    gsv: Decimal,
    cogs_per_case: Decimal,
    tts_percentage: Decimal,
) -> PricingResultOf<TradeSpendBreakdown> {
    ensure_non_negative(tts_percentage, "tts_percentage")?;

    let tts = multiply(gsv, divide(tts_percentage, Decimal::ONE_HUNDRED, "tts")?, "tts")?;
    let to = subtract(gsv, tts, "trade output")?;
    let gp = subtract(to, cogs_per_case, "gross profit")?;
    let gm_percentage = multiply(
        divide(gp, to, "trade output")?,
        Decimal::ONE_HUNDRED,
        "gross margin",
    )?;

    Ok(TradeSpendBreakdown {
        tts_percentage,
        tts,
        to,
        gp,
        gm_percentage,
    })
}

/// 每箱本币 COGS
///
/// `cogs_local = round(cogs_usd * rate)`，`cogs_per_case = round(cogs_local / case_per_ton)`，
/// 两步都舍入到整数。
pub fn derive_cogs_per_case(
    cogs_usd: Decimal,
    currency_rate: Decimal,
    case_per_ton: Decimal,
) -> PricingResultOf<Decimal> {
    ensure_non_negative(cogs_usd, "cogs_usd")?;
    ensure_non_negative(currency_rate, "currency_rate")?;
    if case_per_ton.is_zero() {
        return Err(PricingError::DivisionByZero("case per ton"));
    }
    ensure_positive(case_per_ton, "case_per_ton")?;

    let cogs_local = multiply(cogs_usd, currency_rate, "local cogs")?.round();
    Ok(divide(cogs_local, case_per_ton, "case per ton")?.round())
}

/// 由 BPTT 反推 RSP
pub fn rsp_from_bptt(
    rates: &RateSet,
    pieces_per_case: Decimal,
    bptt: Decimal,
) -> PricingResultOf<Decimal> {
    ensure_positive(pieces_per_case, "pieces_per_case")?;
    rates.validate()?;

    let one = Decimal::ONE;
    let retail_markup = multiply(bptt, add(one, rates.wsm, "wholesale markup")?, "retail markup")?;
    let rsp_per_case = multiply(retail_markup, add(one, rates.rm, "retail markup")?, "rsp per case")?;
    let rsp_without_vat = divide(rsp_per_case, pieces_per_case, "pieces per case")?;
    multiply(rsp_without_vat, add(one, rates.vat, "vat")?, "rsp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_inputs() -> PricingInputs {
        PricingInputs {
            rates: RateSet {
                vat: dec!(0.05),
                rm: dec!(0.20),
                wsm: dec!(0.10),
                dm: dec!(0.08),
                duty: dec!(0.05),
                clearing_charges: dec!(0.02),
                bd: dec!(0.01),
                cpp: dec!(0.03),
            },
            pieces_per_case: dec!(24),
            tts_percentage: dec!(5),
            cogs_per_case: dec!(40.00),
        }
    }

    #[test]
    fn test_no_rounding_mid_chain() {
        let result = calculate(&sample_inputs(), dec!(10.00)).unwrap();
        // 未舍入的中间值保留完整精度
        assert!(result.rsp_without_vat.scale() > MONEY_SCALE);
        assert_eq!(result.rounded().rsp_without_vat, dec!(9.52));
    }

    #[test]
    fn test_negative_rate_rejected() {
        let mut inputs = sample_inputs();
        inputs.rates.dm = dec!(-1);
        assert!(matches!(
            calculate(&inputs, dec!(10)),
            Err(PricingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_non_positive_rsp_and_pieces_rejected() {
        let inputs = sample_inputs();
        assert!(matches!(
            calculate(&inputs, Decimal::ZERO),
            Err(PricingError::InvalidInput(_))
        ));

        let mut inputs = sample_inputs();
        inputs.pieces_per_case = Decimal::ZERO;
        assert!(matches!(
            calculate(&inputs, dec!(10)),
            Err(PricingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_full_trade_spend_is_division_by_zero() {
        let mut inputs = sample_inputs();
        inputs.tts_percentage = dec!(100);
        assert_eq!(
            calculate(&inputs, dec!(10)),
            Err(PricingError::DivisionByZero("trade output"))
        );
    }

    #[test]
    fn test_cogs_per_case_rounds_each_step() {
        // 1234.4 * 3.75 = 4629 -> 4629 / 100 = 46.29 -> 46
        assert_eq!(
            derive_cogs_per_case(dec!(1234.4), dec!(3.75), dec!(100)).unwrap(),
            dec!(46)
        );
        assert_eq!(
            derive_cogs_per_case(dec!(1000), dec!(3.75), Decimal::ZERO),
            Err(PricingError::DivisionByZero("case per ton"))
        );
    }

    #[test]
    fn test_overflow_is_invalid_input() {
        assert_eq!(
            calculate(&sample_inputs(), Decimal::MAX),
            Err(PricingError::InvalidInput("rsp per case overflowed".to_string()))
        );

        let mut inputs = sample_inputs();
        inputs.rates.vat = Decimal::MAX;
        assert!(matches!(
            calculate(&inputs, dec!(10)),
            Err(PricingError::InvalidInput(_))
        ));

        assert!(matches!(
            derive_cogs_per_case(Decimal::MAX, dec!(3.64), dec!(91)),
            Err(PricingError::InvalidInput(_))
        ));
        assert!(matches!(
            rsp_from_bptt(&sample_inputs().rates, dec!(24), Decimal::MAX),
            Err(PricingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_round_money_is_bankers_rounding() {
        assert_eq!(round_money(dec!(2.345)), dec!(2.34));
        assert_eq!(round_money(dec!(2.355)), dec!(2.36));
        assert_eq!(round_money(dec!(-2.345)), dec!(-2.34));
    }
}
