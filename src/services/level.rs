/// XP needed per level band; level `n` starts at `XP_PER_LEVEL_UNIT * (n-1)^2`.
pub const XP_PER_LEVEL_UNIT: i64 = 100;

/// `floor(sqrt(total_xp / 100)) + 1`, computed without floating point.
pub fn level_for_xp(total_xp: i64) -> i32 {
    let units = total_xp.max(0) / XP_PER_LEVEL_UNIT;
    ((units as u64).isqrt() + 1) as i32
}

/// XP still missing before the next level is reached.
pub fn xp_to_next_level(total_xp: i64) -> i64 {
    let level = level_for_xp(total_xp) as i64;
    XP_PER_LEVEL_UNIT
        .saturating_mul(level * level)
        .saturating_sub(total_xp.max(0))
}
