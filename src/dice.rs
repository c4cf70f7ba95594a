//! Dice cost checking and selection.

use crate::state::types::DiceType;
use std::collections::HashMap;

/// Energy entries of a cost; paid from the active character, not with dice.
pub fn energy_cost(cost: &[DiceType]) -> i64 {
    cost.iter().filter(|d| **d == DiceType::Energy).count() as i64
}

fn dice_cost(cost: &[DiceType]) -> impl Iterator<Item = &DiceType> {
    cost.iter().filter(|d| **d != DiceType::Energy)
}

/// Whether `used` pays exactly for the dice part of `cost`.
///
/// Specific elements take matching dice or Omni, `Aligned` entries take dice
/// of one kind (Omni counts as any kind) and `Void` entries take anything.
pub fn check_dice(cost: &[DiceType], used: &[DiceType]) -> bool {
    let needed: Vec<DiceType> = dice_cost(cost).copied().collect();
    if needed.len() != used.len() {
        return false;
    }
    let mut remaining: Vec<DiceType> = used.to_vec();
    let mut aligned = 0usize;
    let mut void = 0usize;
    for d in needed {
        match d {
            DiceType::Void => void += 1,
            DiceType::Aligned => aligned += 1,
            DiceType::Omni => {
                if !take(&mut remaining, DiceType::Omni) {
                    return false;
                }
            }
            element => {
                if !take(&mut remaining, element) && !take(&mut remaining, DiceType::Omni) {
                    return false;
                }
            }
        }
    }
    if aligned > 0 {
        let omni = remaining.iter().filter(|d| **d == DiceType::Omni).count();
        let non_omni: Vec<DiceType> = remaining
            .iter()
            .copied()
            .filter(|d| *d != DiceType::Omni)
            .collect();
        let best = most_common(&non_omni);
        let best_count = best.map_or(0, |(_, n)| n);
        if best_count + omni < aligned {
            return false;
        }
        let kind = best.map(|(k, _)| k);
        let mut taken = 0;
        if let Some(kind) = kind {
            while taken < aligned && take(&mut remaining, kind) {
                taken += 1;
            }
        }
        while taken < aligned && take(&mut remaining, DiceType::Omni) {
            taken += 1;
        }
    }
    remaining.len() == void
}

fn take(pool: &mut Vec<DiceType>, dice: DiceType) -> bool {
    match pool.iter().position(|d| *d == dice) {
        Some(i) => {
            pool.remove(i);
            true
        }
        None => false,
    }
}

fn most_common(dice: &[DiceType]) -> Option<(DiceType, usize)> {
    let mut counts: HashMap<DiceType, usize> = HashMap::new();
    for d in dice {
        *counts.entry(*d).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
}

/// Whether every die in `used` is held in `dice` (as a multiset).
pub fn contains_all(dice: &[DiceType], used: &[DiceType]) -> bool {
    let mut pool = dice.to_vec();
    used.iter().all(|d| take(&mut pool, *d))
}

/// Remove `used` from `dice`.
pub fn subtract(dice: &[DiceType], used: &[DiceType]) -> Vec<DiceType> {
    let mut pool = dice.to_vec();
    for d in used {
        take(&mut pool, *d);
    }
    pool
}

/// Display order: Omni, then the active character's element, then the other
/// elements by how many are held, ties by element order.
pub fn sort_dice(dice: &[DiceType], active_element: Option<DiceType>) -> Vec<DiceType> {
    let mut counts: HashMap<DiceType, usize> = HashMap::new();
    for d in dice {
        *counts.entry(*d).or_insert(0) += 1;
    }
    let rank = |d: &DiceType| -> (u8, std::cmp::Reverse<usize>, DiceType) {
        let group = if *d == DiceType::Omni {
            0
        } else if Some(*d) == active_element {
            1
        } else {
            2
        };
        (group, std::cmp::Reverse(counts[d]), *d)
    };
    let mut sorted = dice.to_vec();
    sorted.sort_by_key(|d| rank(d));
    sorted
}

/// Pick dice that pay for `cost`, preferring to keep Omni and the active
/// element. `None` when the dice cannot pay.
pub fn select_dice_for_cost(
    cost: &[DiceType],
    dice: &[DiceType],
    active_element: Option<DiceType>,
) -> Option<Vec<DiceType>> {
    let mut pool = sort_dice(dice, active_element);
    let needed: Vec<DiceType> = dice_cost(cost).copied().collect();
    for d in needed.iter().filter(|d| d.is_element()) {
        if !(take(&mut pool, *d) || take(&mut pool, DiceType::Omni)) {
            return None;
        }
    }
    for _ in needed.iter().filter(|d| **d == DiceType::Omni) {
        if !take(&mut pool, DiceType::Omni) {
            return None;
        }
    }
    let aligned = needed.iter().filter(|d| **d == DiceType::Aligned).count();
    if aligned > 0 {
        let non_omni: Vec<DiceType> = pool
            .iter()
            .copied()
            .filter(|d| *d != DiceType::Omni)
            .collect();
        let kind = most_common(&non_omni).map(|(k, _)| k);
        for _ in 0..aligned {
            let ok = kind.map_or(false, |k| take(&mut pool, k)) || take(&mut pool, DiceType::Omni);
            if !ok {
                return None;
            }
        }
    }
    let void = needed.iter().filter(|d| **d == DiceType::Void).count();
    for _ in 0..void {
        // least valuable die sits at the end of the sorted pool
        if pool.pop().is_none() {
            return None;
        }
    }
    Some(subtract(dice, &pool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use DiceType::*;

    #[test]
    fn element_cost_accepts_matching_or_omni() {
        assert!(check_dice(&[Pyro, Pyro, Pyro], &[Pyro, Omni, Pyro]));
        assert!(!check_dice(&[Pyro, Pyro, Pyro], &[Pyro, Hydro, Pyro]));
        assert!(!check_dice(&[Pyro, Pyro], &[Pyro]));
    }

    #[test]
    fn aligned_cost_needs_one_kind() {
        assert!(check_dice(&[Aligned, Aligned], &[Geo, Omni]));
        assert!(check_dice(&[Aligned, Aligned], &[Geo, Geo]));
        assert!(!check_dice(&[Aligned, Aligned], &[Geo, Cryo]));
    }

    #[test]
    fn void_and_energy() {
        assert!(check_dice(&[Void, Void, Energy, Energy], &[Geo, Cryo]));
        assert_eq!(energy_cost(&[Pyro, Energy, Energy]), 2);
        assert!(check_dice(&[], &[]));
    }

    #[test]
    fn sorting_puts_omni_then_active_element_first() {
        let sorted = sort_dice(&[Cryo, Pyro, Omni, Geo, Geo], Some(Pyro));
        assert_eq!(sorted, vec![Omni, Pyro, Geo, Geo, Cryo]);
    }

    #[test]
    fn selection_pays_and_checks() {
        let dice = [Omni, Pyro, Pyro, Geo, Cryo];
        let chosen = select_dice_for_cost(&[Pyro, Pyro, Void], &dice, Some(Pyro)).expect("payable");
        assert!(check_dice(&[Pyro, Pyro, Void], &chosen));
        assert!(contains_all(&dice, &chosen));
        assert!(!chosen.contains(&Omni));
        assert!(select_dice_for_cost(&[Hydro, Hydro], &[Pyro, Geo], None).is_none());
    }
}
