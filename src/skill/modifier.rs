//! Payloads of inline modify events. Listeners adjust them in place and the
//! raising operation reads the folded result back.

use super::DamageInfo;
use crate::game::actions::ActionInfo;
use crate::state::types::{DamageType, DiceType};
use crate::state::Who;

/// Ceiling division for a positive divisor.
pub fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    -((-numerator).div_euclid(denominator))
}

/// Additive bonus, exact multiplier and trailing decrease, folded as
/// `ceil((base + increase) * multiplier) - decrease`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueAdjust {
    pub increase: i64,
    pub multiplier_num: i64,
    pub multiplier_den: i64,
    pub decrease: i64,
}

impl Default for ValueAdjust {
    fn default() -> Self {
        ValueAdjust {
            increase: 0,
            multiplier_num: 1,
            multiplier_den: 1,
            decrease: 0,
        }
    }
}

impl ValueAdjust {
    pub fn apply(&self, base: i64) -> i64 {
        ceil_div((base + self.increase) * self.multiplier_num, self.multiplier_den) - self.decrease
    }

    fn multiply(&mut self, num: i64, den: i64) {
        if den <= 0 {
            return;
        }
        self.multiplier_num *= num;
        self.multiplier_den *= den;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamageModifier {
    pub damage: DamageInfo,
    pub adjust: ValueAdjust,
}

impl DamageModifier {
    pub fn new(damage: DamageInfo) -> Self {
        DamageModifier {
            damage,
            adjust: ValueAdjust::default(),
        }
    }

    pub fn damage_type(&self) -> DamageType {
        self.damage.damage_type
    }

    /// Only meaningful in the first stage; later stages see the type fixed.
    pub fn change_type(&mut self, damage_type: DamageType) {
        self.damage.damage_type = damage_type;
    }

    pub fn increase_damage(&mut self, value: i64) {
        self.adjust.increase += value;
    }

    pub fn multiply_damage(&mut self, num: i64, den: i64) {
        self.adjust.multiply(num, den);
    }

    pub fn decrease_damage(&mut self, value: i64) {
        self.adjust.decrease += value;
    }

    pub fn final_value(&self) -> i64 {
        self.adjust.apply(self.damage.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealModifier {
    pub heal: DamageInfo,
    pub adjust: ValueAdjust,
}

impl HealModifier {
    pub fn new(heal: DamageInfo) -> Self {
        HealModifier {
            heal,
            adjust: ValueAdjust::default(),
        }
    }

    pub fn increase_heal(&mut self, value: i64) {
        self.adjust.increase += value;
    }

    pub fn multiply_heal(&mut self, num: i64, den: i64) {
        self.adjust.multiply(num, den);
    }

    pub fn decrease_heal(&mut self, value: i64) {
        self.adjust.decrease += value;
    }

    pub fn final_value(&self) -> i64 {
        self.adjust.apply(self.heal.value).max(0)
    }
}

/// Raised for a lethal hit before the defeat is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZeroHealthModifier {
    pub damage: DamageInfo,
    pub immune_health: Option<i64>,
}

impl ZeroHealthModifier {
    pub fn new(damage: DamageInfo) -> Self {
        ZeroHealthModifier {
            damage,
            immune_health: None,
        }
    }

    /// Cancel the defeat and leave the character at `health`.
    pub fn immune(&mut self, health: i64) {
        self.immune_health = Some(health);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollModifier {
    pub who: Who,
    pub fixed_dice: Vec<DiceType>,
    pub extra_reroll: u32,
}

impl RollModifier {
    pub fn new(who: Who) -> Self {
        RollModifier {
            who,
            fixed_dice: vec![],
            extra_reroll: 0,
        }
    }

    pub fn fix_dice(&mut self, dice: DiceType, count: usize) {
        self.fixed_dice.extend(std::iter::repeat(dice).take(count));
    }

    pub fn add_reroll(&mut self, count: u32) {
        self.extra_reroll += count;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceActionModifier {
    pub who: Who,
    pub replaced: bool,
}

impl ReplaceActionModifier {
    pub fn new(who: Who) -> Self {
        ReplaceActionModifier {
            who,
            replaced: false,
        }
    }

    pub fn replace(&mut self) {
        self.replaced = true;
    }
}

/// Cost and speed adjustments applied to a candidate action.
#[derive(Debug, Clone)]
pub struct ActionModifier {
    pub action: ActionInfo,
    pub completed: bool,
}

impl ActionModifier {
    pub fn new(action: ActionInfo) -> Self {
        ActionModifier {
            action,
            completed: true,
        }
    }

    /// Remove up to `count` dice of `dice` from the cost. Deducting `Void` or
    /// `Omni` takes any non-energy entry once exact matches run out.
    pub fn deduct_cost(&mut self, dice: DiceType, count: usize) {
        let wildcard = matches!(dice, DiceType::Void | DiceType::Omni);
        for _ in 0..count {
            let cost = &mut self.action.cost;
            let position = cost.iter().position(|d| *d == dice).or_else(|| {
                if wildcard {
                    cost.iter().position(|d| *d != DiceType::Energy)
                } else {
                    None
                }
            });
            match position {
                Some(i) => {
                    cost.remove(i);
                }
                None => break,
            }
        }
    }

    pub fn add_cost(&mut self, dice: DiceType, count: usize) {
        self.action
            .cost
            .extend(std::iter::repeat(dice).take(count));
    }

    pub fn set_fast(&mut self, fast: bool) {
        self.action.fast = fast;
    }

    /// Abort the action outright.
    pub fn cancel(&mut self) {
        self.completed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_div_rounds_up() {
        assert_eq!(ceil_div(7, 2), 4);
        assert_eq!(ceil_div(6, 2), 3);
        assert_eq!(ceil_div(-3, 2), -1);
        assert_eq!(ceil_div(0, 5), 0);
    }

    #[test]
    fn adjust_folds_additive_then_multiplicative_then_decrease() {
        let adjust = ValueAdjust {
            increase: 1,
            multiplier_num: 3,
            multiplier_den: 2,
            decrease: 1,
        };
        // ceil((2 + 1) * 1.5) - 1 = ceil(4.5) - 1 = 4
        assert_eq!(adjust.apply(2), 4);
    }

    #[test]
    fn roll_modifier_fixes_dice() {
        let mut m = RollModifier::new(Who::First);
        m.fix_dice(DiceType::Omni, 2);
        m.add_reroll(1);
        assert_eq!(m.fixed_dice, vec![DiceType::Omni, DiceType::Omni]);
        assert_eq!(m.extra_reroll, 1);
    }
}
