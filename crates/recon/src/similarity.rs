use rapidfuzz::distance::indel;

/// Whole-string similarity in 0..=100: the insertion/deletion (indel)
/// ratio `(len_a + len_b - indel) / (len_a + len_b)`, scaled and rounded
/// half-to-even. Lengths count Unicode scalar values. Two empty strings
/// score 100.
pub fn ratio(a: &str, b: &str) -> u8 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 100;
    }
    let distance = indel::distance(a.chars(), b.chars());
    round_half_even(100 * (total - distance), total) as u8
}

/// True when the shorter (non-empty) name occurs as a contiguous span of the
/// longer one.
pub fn contains(a: &str, b: &str) -> bool {
    let (short, long) = if a.chars().count() <= b.chars().count() { (a, b) } else { (b, a) };
    !short.is_empty() && long.contains(short)
}

fn round_half_even(num: usize, den: usize) -> usize {
    let q = num / den;
    let r2 = 2 * (num % den);
    if r2 > den || (r2 == den && q % 2 == 1) {
        q + 1
    } else {
        q
    }
}
