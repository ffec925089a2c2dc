//! Per-token prices for the models the classifier is usually pointed at.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// USD per million tokens, (input, output).
const PRICES_PER_MILLION: &[(&str, Decimal, Decimal)] = &[
    ("gpt-4o-mini", dec!(0.15), dec!(0.60)),
    ("gpt-4o", dec!(2.50), dec!(10.00)),
    ("gpt-4.1-mini", dec!(0.40), dec!(1.60)),
    ("gpt-4.1", dec!(2.00), dec!(8.00)),
    ("gpt-4", dec!(30.00), dec!(60.00)),
    ("claude-3-5-haiku", dec!(0.80), dec!(4.00)),
    ("claude-sonnet-4", dec!(3.00), dec!(15.00)),
    ("claude-3-5-sonnet", dec!(3.00), dec!(15.00)),
];

/// Look up (input, output) cost per token for a model.
///
/// Matches on the longest known prefix so dated snapshots
/// (`gpt-4o-2024-08-06`) resolve to their family. Unknown models cost zero.
pub fn model_cost(model: &str) -> (Decimal, Decimal) {
    let million = dec!(1_000_000);
    PRICES_PER_MILLION
        .iter()
        .filter(|(prefix, _, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _, _)| prefix.len())
        .map(|(_, input, output)| (input / million, output / million))
        .unwrap_or((Decimal::ZERO, Decimal::ZERO))
}

/// Total cost of one call.
pub fn call_cost(costs: (Decimal, Decimal), input_tokens: u32, output_tokens: u32) -> Decimal {
    costs.0 * Decimal::from(input_tokens) + costs.1 * Decimal::from(output_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        let (input, _) = model_cost("gpt-4o-mini-2024-07-18");
        assert_eq!(input, dec!(0.15) / dec!(1_000_000));
    }

    #[test]
    fn unknown_model_is_free() {
        assert_eq!(model_cost("local-llama"), (Decimal::ZERO, Decimal::ZERO));
    }

    #[test]
    fn call_cost_sums_both_directions() {
        let cost = call_cost(model_cost("gpt-4o"), 1_000_000, 100_000);
        assert_eq!(cost, dec!(3.50));
    }
}
